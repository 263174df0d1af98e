//!
//! # PostgreSQL support
//!
//! Implements [`Session`], [`Connection`] and [`Transaction`](crate::Transaction) for the
//! [`postgres`](https://crates.io/crates/postgres) crate, and opens connections from a [`Config`].
//!
//! ## Transaction Safety
//!
//! PostgreSQL supports transactional DDL, so with
//! [`TransactionMode::Shared`](crate::TransactionMode::Shared) a failed run leaves the database
//! as it was. The exceptions are statements PostgreSQL refuses inside a transaction block, such as
//! `CREATE DATABASE` or `CREATE INDEX CONCURRENTLY`; trees containing those need
//! [`TransactionMode::AutoCommit`](crate::TransactionMode::AutoCommit).
//!
//! ## Guard support
//!
//! Unquoted identifiers are folded to lower case before the catalog is searched, matching how
//! PostgreSQL stores them.
//!
//! | Guard | Catalog |
//! |-------|---------|
//! | table | `pg_catalog.pg_tables` |
//! | column | `information_schema.columns` |
//! | constraint | `pg_catalog.pg_constraint` |
//! | index | `pg_catalog.pg_indexes` |
//! | role | `pg_catalog.pg_roles` |
//!
//! ## Example
//!
//! ```no_run
//! use stepwise::{group, statements, Config, Guard, Runner, Step};
//!
//! let root = group![
//!     Step::new(
//!         Guard::table_not_exists("users"),
//!         statements!["CREATE TABLE users (id SERIAL PRIMARY KEY, name TEXT)"],
//!     ),
//!     Step::new(
//!         Guard::role_not_exists("reporting"),
//!         statements!["CREATE ROLE reporting"],
//!     ),
//! ]
//! .with_abort_on_error(true);
//!
//! let config = Config::from_env();
//! let stats = Runner::new().apply_with_config(&root, &config)?;
//! println!("{}", stats);
//! # Ok::<(), stepwise::Error>(())
//! ```

use crate::config::Config;
use crate::error::Error;
use crate::session::{Connection, Dialect, Session, Value};
use bytes::BytesMut;
use postgres::types::{IsNull, ToSql, Type};
use postgres::{GenericClient, NoTls};
use std::time::Instant;

// Re-export postgres types for use in step bodies
pub use postgres::Client as PostgresClient;
pub use postgres::Transaction as PostgresTransaction;

impl ToSql for Value {
    fn to_sql(
        &self,
        ty: &Type,
        out: &mut BytesMut,
    ) -> Result<IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(v) => v.to_sql_checked(ty, out),
            Value::Int(v) => v.to_sql_checked(ty, out),
            Value::BigInt(v) => v.to_sql_checked(ty, out),
            Value::Double(v) => v.to_sql_checked(ty, out),
            Value::Text(v) => v.to_sql_checked(ty, out),
        }
    }

    // the wrapped value checks the type itself
    fn accepts(_ty: &Type) -> bool {
        true
    }

    postgres::types::to_sql_checked!();
}

fn as_params(params: &[Value]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|v| v as &(dyn ToSql + Sync)).collect()
}

fn execute_on<C: GenericClient>(
    client: &mut C,
    statement: &str,
    params: &[Value],
) -> Result<(), Error> {
    let started = Instant::now();
    if params.is_empty() {
        client.batch_execute(statement)?;
    } else {
        client.execute(statement, &as_params(params))?;
    }
    tracing::debug!(
        kind = "execute",
        statement,
        params = params.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Statement executed"
    );
    Ok(())
}

fn query_is_empty_on<C: GenericClient>(
    client: &mut C,
    statement: &str,
    params: &[Value],
) -> Result<bool, Error> {
    let started = Instant::now();
    let rows = client.query(statement, &as_params(params))?;
    let empty = rows.is_empty();
    tracing::debug!(
        kind = "query",
        statement,
        params = params.len(),
        empty,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Query executed"
    );
    Ok(empty)
}

impl Session for postgres::Client {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute(&mut self, statement: &str, params: &[Value]) -> Result<(), Error> {
        execute_on(self, statement, params)
    }

    fn query_is_empty(&mut self, statement: &str, params: &[Value]) -> Result<bool, Error> {
        query_is_empty_on(self, statement, params)
    }
}

impl Session for postgres::Transaction<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
    }

    fn execute(&mut self, statement: &str, params: &[Value]) -> Result<(), Error> {
        execute_on(self, statement, params)
    }

    fn query_is_empty(&mut self, statement: &str, params: &[Value]) -> Result<bool, Error> {
        query_is_empty_on(self, statement, params)
    }
}

impl crate::session::Transaction for postgres::Transaction<'_> {
    fn commit(self) -> Result<(), Error> {
        postgres::Transaction::commit(self)?;
        Ok(())
    }

    fn rollback(self) -> Result<(), Error> {
        postgres::Transaction::rollback(self)?;
        Ok(())
    }
}

impl Connection for postgres::Client {
    type Transaction<'conn> = postgres::Transaction<'conn>;

    fn begin(&mut self) -> Result<Self::Transaction<'_>, Error> {
        Ok(postgres::Client::transaction(self)?)
    }
}

/// Open a connection described by `config`.
///
/// When a schema is configured it is put first on the `search_path`, so unqualified names in
/// steps and guards resolve there. TLS is not negotiated; use `sslmode=disable` or `prefer`.
pub fn connect(config: &Config) -> Result<postgres::Client, Error> {
    config.validate()?;
    let mut client = postgres::Client::connect(&config.dsn(), NoTls)?;

    if let Some(schema) = config.schema() {
        client.batch_execute(&format!("SET search_path TO {},public", schema))?;
    }

    // fail here rather than in the first guard
    client.batch_execute("SELECT 1")?;

    tracing::debug!(
        host = config.host(),
        database = config.database(),
        schema = config.schema().unwrap_or_default(),
        "Connected to PostgreSQL"
    );
    Ok(client)
}
