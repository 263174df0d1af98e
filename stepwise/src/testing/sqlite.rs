//! Testing utilities for SQLite migration trees.
//!
//! [`SqliteTestHarness`] owns a database, applies trees to it and offers assertions on the
//! resulting schema, so a test reads as "apply, then check".

use crate::reporter::Stats;
use crate::{Error, Group, Runner, TransactionMode};
use rusqlite::Connection;

/// A test harness for SQLite migration trees with schema assertion helpers.
///
/// # Example
///
/// ```
/// use stepwise::testing::sqlite::SqliteTestHarness;
/// use stepwise::{group, statements, Guard, Step};
///
/// fn schema() -> stepwise::Group {
///     group![
///         Step::new(
///             Guard::table_not_exists("users"),
///             statements!["CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)"],
///         ),
///         Step::new(
///             Guard::column_not_exists("users", "email"),
///             statements!["ALTER TABLE users ADD COLUMN email TEXT"],
///         ),
///     ]
/// }
///
/// let mut harness = SqliteTestHarness::new()?;
/// assert_eq!(harness.apply(&schema())?.applied, 2);
/// harness.assert_table_exists("users")?;
/// harness.assert_column_exists("users", "email")?;
///
/// // applying again is a no-op
/// harness.assert_idempotent(&schema())?;
/// # Ok::<(), stepwise::Error>(())
/// ```
pub struct SqliteTestHarness {
    conn: Connection,
    transaction_mode: TransactionMode,
}

/// A column as reported by `pragma_table_info`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    pub type_name: String,
    pub not_null: bool,
    pub primary_key: bool,
}

impl SqliteTestHarness {
    /// Create a harness over a fresh in-memory database.
    pub fn new() -> Result<Self, Error> {
        Ok(Self::with_connection(Connection::open_in_memory()?))
    }

    /// Create a harness over an existing connection, e.g. a file-based database.
    pub fn with_connection(conn: Connection) -> Self {
        Self {
            conn,
            transaction_mode: TransactionMode::default(),
        }
    }

    pub fn with_transaction_mode(mut self, transaction_mode: TransactionMode) -> Self {
        self.transaction_mode = transaction_mode;
        self
    }

    /// Apply `root` with a default [`Runner`].
    pub fn apply(&mut self, root: &Group) -> Result<Stats, Error> {
        Runner::new()
            .with_transaction_mode(self.transaction_mode)
            .apply(root, &mut self.conn)
    }

    /// Dry-run `root`; the database is left unchanged.
    pub fn dry_run(&mut self, root: &Group) -> Result<Stats, Error> {
        Runner::new().dry_run(root, &mut self.conn)
    }

    /// Apply `root` and check that nothing is left to do, i.e. every step is skipped.
    pub fn assert_idempotent(&mut self, root: &Group) -> Result<(), Error> {
        let stats = self.apply(root)?;
        if stats.applied > 0 || stats.failed > 0 {
            return Err(Error::Generic(format!(
                "Tree is not idempotent, second run: {}",
                stats
            )));
        }
        Ok(())
    }

    /// Execute SQL (for setting up test data).
    pub fn execute(&mut self, sql: &str) -> Result<(), Error> {
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Query a single value from the database.
    pub fn query_one<T>(&mut self, sql: &str) -> Result<T, Error>
    where
        T: rusqlite::types::FromSql,
    {
        let result = self.conn.query_row(sql, [], |row| row.get(0))?;
        Ok(result)
    }

    /// Query all values from a single-column result.
    pub fn query_all<T>(&mut self, sql: &str) -> Result<Vec<T>, Error>
    where
        T: rusqlite::types::FromSql,
    {
        let mut stmt = self.conn.prepare(sql)?;
        let results = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<T>, _>>()?;
        Ok(results)
    }

    /// Columns of `table_name` in declaration order.
    pub fn columns(&mut self, table_name: &str) -> Result<Vec<ColumnInfo>, Error> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type, \"notnull\", pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map([table_name], |row| {
                Ok(ColumnInfo {
                    name: row.get(0)?,
                    type_name: row.get(1)?,
                    not_null: row.get::<_, i64>(2)? != 0,
                    primary_key: row.get::<_, i64>(3)? > 0,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    pub fn assert_table_exists(&mut self, table_name: &str) -> Result<(), Error> {
        if !self.has("table", table_name)? {
            return Err(Error::Generic(format!(
                "Table '{}' does not exist",
                table_name
            )));
        }
        Ok(())
    }

    pub fn assert_table_not_exists(&mut self, table_name: &str) -> Result<(), Error> {
        if self.has("table", table_name)? {
            return Err(Error::Generic(format!(
                "Table '{}' exists but should not",
                table_name
            )));
        }
        Ok(())
    }

    pub fn assert_column_exists(
        &mut self,
        table_name: &str,
        column_name: &str,
    ) -> Result<(), Error> {
        let columns = self.columns(table_name)?;
        if !columns.iter().any(|c| c.name == column_name) {
            return Err(Error::Generic(format!(
                "Column '{}' does not exist in table '{}'",
                column_name, table_name
            )));
        }
        Ok(())
    }

    pub fn assert_index_exists(&mut self, index_name: &str) -> Result<(), Error> {
        if !self.has("index", index_name)? {
            return Err(Error::Generic(format!(
                "Index '{}' does not exist",
                index_name
            )));
        }
        Ok(())
    }

    /// Get a reference to the underlying connection for advanced usage.
    pub fn connection(&mut self) -> &mut Connection {
        &mut self.conn
    }

    fn has(&self, kind: &str, name: &str) -> Result<bool, Error> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = ?1 AND name = ?2",
            [kind, name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{group, statements, Guard, Invocable, Step};

    fn schema() -> Group {
        group![
            Step::new(
                Guard::table_not_exists("users"),
                statements!["CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL)"],
            ),
            Step::new(
                Guard::column_not_exists("users", "email"),
                statements!["ALTER TABLE users ADD COLUMN email TEXT"],
            ),
            Step::new(
                Guard::index_not_exists("users", "ix_users_email"),
                statements!["CREATE INDEX ix_users_email ON users (email)"],
            ),
        ]
    }

    #[test]
    fn apply_then_assert_schema() {
        let mut harness = SqliteTestHarness::new().unwrap();
        let stats = harness.apply(&schema()).unwrap();
        assert_eq!(stats.applied, 3);

        harness.assert_table_exists("users").unwrap();
        harness.assert_column_exists("users", "email").unwrap();
        harness.assert_index_exists("ix_users_email").unwrap();
        harness.assert_idempotent(&schema()).unwrap();

        let columns = harness.columns("users").unwrap();
        assert_eq!(
            columns,
            vec![
                ColumnInfo {
                    name: "id".to_string(),
                    type_name: "INTEGER".to_string(),
                    not_null: false,
                    primary_key: true,
                },
                ColumnInfo {
                    name: "name".to_string(),
                    type_name: "TEXT".to_string(),
                    not_null: true,
                    primary_key: false,
                },
                ColumnInfo {
                    name: "email".to_string(),
                    type_name: "TEXT".to_string(),
                    not_null: false,
                    primary_key: false,
                },
            ]
        );
    }

    #[test]
    fn failed_assertions_name_the_object() {
        let mut harness = SqliteTestHarness::new().unwrap();
        let err = harness.assert_table_exists("users").unwrap_err();
        assert_eq!(err.to_string(), "Table 'users' does not exist");
        harness.assert_table_not_exists("users").unwrap();

        harness.execute("CREATE TABLE users (id INTEGER)").unwrap();
        assert!(harness.assert_column_exists("users", "email").is_err());
        assert!(harness.assert_index_exists("ix_users_email").is_err());
    }

    #[test]
    fn dry_run_leaves_database_untouched() {
        let mut harness = SqliteTestHarness::new().unwrap();
        assert_eq!(harness.dry_run(&schema()).unwrap().applied, 3);
        harness.assert_table_not_exists("users").unwrap();
    }

    #[test]
    fn non_idempotent_tree_is_reported() {
        let mut harness = SqliteTestHarness::new().unwrap();
        harness.execute("CREATE TABLE log (line TEXT)").unwrap();
        let tree = group![Step::new(
            Guard::always(),
            Invocable::statements(["INSERT INTO log VALUES ('again')"]),
        )];
        harness.apply(&tree).unwrap();

        let err = harness.assert_idempotent(&tree).unwrap_err();
        assert!(err.to_string().contains("1 applied 0 skipped 0 failed"));
        let lines: Vec<String> = harness.query_all("SELECT line FROM log").unwrap();
        assert_eq!(lines.len(), 2);
        let count: i64 = harness.query_one("SELECT COUNT(*) FROM log").unwrap();
        assert_eq!(count, 2);
    }
}
