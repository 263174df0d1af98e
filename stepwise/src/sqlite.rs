//!
//! # SQLite support
//!
//! Implements [`Session`], [`Connection`] and [`Transaction`](crate::Transaction) for the
//! [`rusqlite`](https://crates.io/crates/rusqlite) crate.
//!
//! SQLite supports transactional DDL, so a tree applied with
//! [`TransactionMode::Shared`](crate::TransactionMode::Shared) either lands completely or not at
//! all.
//!
//! ## Guard support
//!
//! | Guard | Catalog |
//! |-------|---------|
//! | table | `sqlite_master` |
//! | column | `pragma_table_info(table)` |
//! | index | `sqlite_master` |
//! | constraint | `CONSTRAINT <name>` in the table DDL stored in `sqlite_master` |
//! | role | not supported, evaluates to an error |
//!
//! ## Example
//!
//! ```
//! use stepwise::{group, statements, Guard, Runner, Step};
//! use rusqlite::Connection;
//!
//! let root = group![
//!     Step::new(
//!         Guard::table_not_exists("users"),
//!         statements!["CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"],
//!     ),
//!     Step::new(
//!         Guard::column_not_exists("users", "email"),
//!         statements!["ALTER TABLE users ADD COLUMN email TEXT"],
//!     ),
//! ];
//!
//! let mut conn = Connection::open_in_memory().unwrap();
//! let stats = Runner::new().apply(&root, &mut conn).unwrap();
//! assert_eq!(stats.applied, 2);
//!
//! // every guard now holds, so a second run changes nothing
//! let stats = Runner::new().apply(&root, &mut conn).unwrap();
//! assert_eq!(stats.skipped, 2);
//! ```

use crate::error::Error;
use crate::session::{Connection, Dialect, Session, Value};
use rusqlite::params_from_iter;
use rusqlite::types::{ToSql, ToSqlOutput};
use std::time::Instant;

// Re-export rusqlite types for use in step bodies
pub use rusqlite::Connection as SqliteConnection;
pub use rusqlite::Transaction as SqliteTransaction;

impl ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Owned(rusqlite::types::Value::Null),
            Value::Bool(v) => ToSqlOutput::from(*v),
            Value::Int(v) => ToSqlOutput::from(*v),
            Value::BigInt(v) => ToSqlOutput::from(*v),
            Value::Double(v) => ToSqlOutput::from(*v),
            Value::Text(v) => ToSqlOutput::from(v.as_str()),
        })
    }
}

fn execute_on(conn: &rusqlite::Connection, statement: &str, params: &[Value]) -> Result<(), Error> {
    let started = Instant::now();
    if params.is_empty() {
        conn.execute_batch(statement)?;
    } else {
        conn.execute(statement, params_from_iter(params.iter()))?;
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

fn query_is_empty_on(
    conn: &rusqlite::Connection,
    statement: &str,
    params: &[Value],
) -> Result<bool, Error> {
    let started = Instant::now();
    let mut stmt = conn.prepare(statement)?;
    let mut rows = stmt.query(params_from_iter(params.iter()))?;
    let empty = rows.next()?.is_none();
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

impl Session for rusqlite::Connection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, statement: &str, params: &[Value]) -> Result<(), Error> {
        execute_on(self, statement, params)
    }

    fn query_is_empty(&mut self, statement: &str, params: &[Value]) -> Result<bool, Error> {
        query_is_empty_on(self, statement, params)
    }
}

impl Session for rusqlite::Transaction<'_> {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn execute(&mut self, statement: &str, params: &[Value]) -> Result<(), Error> {
        execute_on(self, statement, params)
    }

    fn query_is_empty(&mut self, statement: &str, params: &[Value]) -> Result<bool, Error> {
        query_is_empty_on(self, statement, params)
    }
}

impl crate::session::Transaction for rusqlite::Transaction<'_> {
    fn commit(self) -> Result<(), Error> {
        rusqlite::Transaction::commit(self)?;
        Ok(())
    }

    fn rollback(self) -> Result<(), Error> {
        rusqlite::Transaction::rollback(self)?;
        Ok(())
    }
}

impl Connection for rusqlite::Connection {
    type Transaction<'conn> = rusqlite::Transaction<'conn>;

    fn begin(&mut self) -> Result<Self::Transaction<'_>, Error> {
        Ok(rusqlite::Connection::transaction(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_without_params_runs_a_batch() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        Session::execute(
            &mut conn,
            "CREATE TABLE a (id INTEGER); CREATE TABLE b (id INTEGER);",
            &[],
        )
        .unwrap();
        assert!(!conn
            .query_is_empty("SELECT 1 FROM sqlite_master WHERE name = 'b'", &[])
            .unwrap());
    }

    #[test]
    fn query_is_empty_binds_params() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        Session::execute(&mut conn, "CREATE TABLE vocab (id INTEGER, word TEXT)", &[]).unwrap();
        Session::execute(
            &mut conn,
            "INSERT INTO vocab (id, word) VALUES (?1, ?2)",
            &[4.into(), "foo".into()],
        )
        .unwrap();

        let found = conn
            .query_is_empty("SELECT 1 FROM vocab WHERE word = ?1", &["foo".into()])
            .unwrap();
        assert!(!found);
        let missing = conn
            .query_is_empty("SELECT 1 FROM vocab WHERE id = ?1", &[101.into()])
            .unwrap();
        assert!(missing);
    }

    #[test]
    fn statements_are_traced() {
        use tracing_test::traced_test;

        #[traced_test]
        fn run_test() {
            let mut conn = rusqlite::Connection::open_in_memory().unwrap();
            Session::execute(&mut conn, "CREATE TABLE traced (id INTEGER)", &[]).unwrap();
            conn.query_is_empty("SELECT 1 FROM traced WHERE id = ?1", &[1.into()])
                .unwrap();

            assert!(logs_contain("Statement executed"));
            assert!(logs_contain("kind=\"execute\""));
            assert!(logs_contain("CREATE TABLE traced (id INTEGER)"));
            assert!(logs_contain("Query executed"));
            assert!(logs_contain("kind=\"query\""));
            assert!(logs_contain("empty=true"));
            assert!(logs_contain("elapsed_ms="));
        }

        run_test();
    }

    #[test]
    fn rollback_discards_and_commit_keeps() {
        let mut conn = rusqlite::Connection::open_in_memory().unwrap();
        {
            let mut tx = conn.begin().unwrap();
            Session::execute(&mut tx, "CREATE TABLE t (id INTEGER)", &[]).unwrap();
            tx.rollback().unwrap();
        }
        assert!(conn
            .query_is_empty("SELECT 1 FROM sqlite_master WHERE name = 't'", &[])
            .unwrap());

        let mut tx = conn.begin().unwrap();
        Session::execute(&mut tx, "CREATE TABLE t (id INTEGER)", &[]).unwrap();
        tx.commit().unwrap();
        assert!(!conn
            .query_is_empty("SELECT 1 FROM sqlite_master WHERE name = 't'", &[])
            .unwrap());
    }
}
