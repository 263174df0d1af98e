//! The narrow database surface the engine runs against.
//!
//! Guards and invocables only ever see a [`Session`]: something that can execute a statement and
//! tell whether a query returned any rows. The [`Runner`](crate::Runner) additionally needs a
//! [`Connection`] to open the [`Transaction`] a whole tree is applied in.
//!
//! Implementations for `rusqlite` and `postgres` live in the [`sqlite`](crate::sqlite) and
//! [`postgres`](crate::postgres) modules.

use crate::error::Error;
use std::fmt;

/// The SQL dialect spoken by a session. Decides which catalog queries the schema guards issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgres,
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::Sqlite => f.write_str("sqlite"),
            Dialect::Postgres => f.write_str("postgres"),
        }
    }
}

/// A statement parameter, converted to the driver's own parameter type at execution time.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    BigInt(i64),
    Double(f64),
    Text(String),
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Int(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::BigInt(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

/// Statement execution, either on a bare connection (auto-commit) or inside a transaction.
pub trait Session {
    /// The dialect of the underlying database.
    fn dialect(&self) -> Dialect;

    /// Execute a statement.
    ///
    /// Without parameters the statement is run as a batch, so it may contain several
    /// `;`-separated statements.
    fn execute(&mut self, statement: &str, params: &[Value]) -> Result<(), Error>;

    /// Run a query and report whether it returned zero rows.
    fn query_is_empty(&mut self, statement: &str, params: &[Value]) -> Result<bool, Error>;
}

/// A transaction opened by [`Connection::begin`]. Dropping it without committing rolls back.
pub trait Transaction: Session {
    fn commit(self) -> Result<(), Error>;
    fn rollback(self) -> Result<(), Error>;
}

/// A session that can open a transaction.
pub trait Connection: Session {
    type Transaction<'conn>: Transaction
    where
        Self: 'conn;

    fn begin(&mut self) -> Result<Self::Transaction<'_>, Error>;
}
