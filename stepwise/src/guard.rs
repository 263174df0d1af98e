use crate::error::Error;
use crate::session::{Dialect, Session, Value};
use std::fmt;

/// Custom guard logic. Returns `true` when the step still needs to run.
pub type Predicate = Box<dyn Fn(&mut dyn Session) -> Result<bool, Error> + Send + Sync>;

/// SQLite keeps no catalog of constraint names, only the `CREATE TABLE` text. The DDL is lowered,
/// whitespace runs of up to 64 are collapsed to one space and `,`/`(` padded, so `?1` (lower
/// case) can be matched exactly as a bare or quoted identifier following `constraint`.
const SQLITE_CONSTRAINT_LOOKUP: &str = r#"SELECT 1 FROM (
    SELECT ' ' || replace(replace(replace(replace(replace(replace(replace(replace(replace(
        replace(replace(lower(sql), char(10), ' '), char(13), ' '), char(9), ' '), ',', ' , '),
        '(', ' ( '), '  ', ' '), '  ', ' '), '  ', ' '), '  ', ' '), '  ', ' '), '  ', ' ')
        || ' ' AS ddl
    FROM sqlite_master
    WHERE type = 'table' AND sql IS NOT NULL
)
WHERE instr(ddl, ' constraint ' || ?1 || ' ') > 0
    OR instr(ddl, ' constraint "' || ?1 || '"') > 0
    OR instr(ddl, ' constraint `' || ?1 || '`') > 0
    OR instr(ddl, ' constraint [' || ?1 || ']') > 0
    OR instr(ddl, ' constraint ''' || ?1 || '''') > 0"#;

/// A schema object a guard can look up in the database catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaObject {
    Table { name: String },
    Column { table: String, column: String },
    Constraint { name: String },
    Index { table: String, name: String },
    Role { name: String },
}

impl SchemaObject {
    /// The catalog query answering "does this object exist" in `dialect`, with its parameters.
    /// The query returns at least one row exactly when the object exists.
    pub fn lookup(&self, dialect: Dialect) -> Result<(&'static str, Vec<Value>), Error> {
        match dialect {
            Dialect::Sqlite => self.sqlite_lookup(),
            Dialect::Postgres => Ok(self.postgres_lookup()),
        }
    }

    /// Whether the object currently exists.
    pub fn exists(&self, session: &mut dyn Session) -> Result<bool, Error> {
        let (query, params) = self.lookup(session.dialect())?;
        Ok(!session.query_is_empty(query, &params)?)
    }

    fn sqlite_lookup(&self) -> Result<(&'static str, Vec<Value>), Error> {
        Ok(match self {
            SchemaObject::Table { name } => (
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1",
                vec![name.as_str().into()],
            ),
            SchemaObject::Column { table, column } => (
                "SELECT 1 FROM pragma_table_info(?1) WHERE name = ?2",
                vec![table.as_str().into(), column.as_str().into()],
            ),
            SchemaObject::Constraint { name } => (
                SQLITE_CONSTRAINT_LOOKUP,
                vec![Value::Text(name.to_lowercase())],
            ),
            SchemaObject::Index { table, name } => (
                "SELECT 1 FROM sqlite_master WHERE type = 'index' AND tbl_name = ?1 AND name = ?2",
                vec![table.as_str().into(), name.as_str().into()],
            ),
            SchemaObject::Role { .. } => {
                return Err(Error::Unsupported {
                    what: "role lookup".to_string(),
                    dialect: Dialect::Sqlite.to_string(),
                })
            }
        })
    }

    // postgres folds unquoted identifiers to lower case, so names are compared that way too.
    fn postgres_lookup(&self) -> (&'static str, Vec<Value>) {
        let folded = |name: &str| Value::Text(name.to_lowercase());
        match self {
            SchemaObject::Table { name } => (
                "SELECT 1 FROM pg_catalog.pg_tables WHERE tablename = $1",
                vec![folded(name)],
            ),
            SchemaObject::Column { table, column } => (
                "SELECT 1 FROM information_schema.columns \
                 WHERE table_name::text = $1 AND column_name::text = $2",
                vec![folded(table), folded(column)],
            ),
            SchemaObject::Constraint { name } => (
                "SELECT 1 FROM pg_catalog.pg_constraint WHERE conname = $1",
                vec![folded(name)],
            ),
            SchemaObject::Index { table, name } => (
                "SELECT 1 FROM pg_catalog.pg_indexes WHERE tablename = $1 AND indexname = $2",
                vec![folded(table), folded(name)],
            ),
            SchemaObject::Role { name } => (
                "SELECT 1 FROM pg_catalog.pg_roles WHERE rolname = $1",
                vec![folded(name)],
            ),
        }
    }
}

impl fmt::Display for SchemaObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchemaObject::Table { name } => write!(f, "table {}", name),
            SchemaObject::Column { table, column } => write!(f, "column {}.{}", table, column),
            SchemaObject::Constraint { name } => write!(f, "constraint {}", name),
            SchemaObject::Index { table, name } => write!(f, "index {}.{}", table, name),
            SchemaObject::Role { name } => write!(f, "role {}", name),
        }
    }
}

/// A guard built from caller-supplied logic.
pub struct DynamicGuard {
    label: String,
    predicate: Predicate,
}

impl fmt::Debug for DynamicGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicGuard")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// The precondition of a [`Step`](crate::Step).
///
/// [`Guard::evaluate`] returns `true` when the desired state is not reached yet and the step's
/// invocable must run, and `false` when the step can be skipped. Guards never modify the
/// database and can be evaluated any number of times.
///
/// Every existence guard has an inverse (`table_exists` / `table_not_exists`, ...); on the same
/// database state at most one of the pair evaluates to `true`.
#[derive(Debug)]
pub enum Guard {
    /// Run when the object exists.
    Exists(SchemaObject),
    /// Run when the object does not exist.
    NotExists(SchemaObject),
    /// Run when the predicate says so.
    Dynamic(DynamicGuard),
    /// Always run. The invocable is expected to be idempotent on its own.
    Always,
}

impl Guard {
    pub fn table_exists(name: impl Into<String>) -> Self {
        Guard::Exists(SchemaObject::Table { name: name.into() })
    }

    pub fn table_not_exists(name: impl Into<String>) -> Self {
        Guard::NotExists(SchemaObject::Table { name: name.into() })
    }

    pub fn column_exists(table: impl Into<String>, column: impl Into<String>) -> Self {
        Guard::Exists(SchemaObject::Column {
            table: table.into(),
            column: column.into(),
        })
    }

    pub fn column_not_exists(table: impl Into<String>, column: impl Into<String>) -> Self {
        Guard::NotExists(SchemaObject::Column {
            table: table.into(),
            column: column.into(),
        })
    }

    pub fn constraint_exists(name: impl Into<String>) -> Self {
        Guard::Exists(SchemaObject::Constraint { name: name.into() })
    }

    pub fn constraint_not_exists(name: impl Into<String>) -> Self {
        Guard::NotExists(SchemaObject::Constraint { name: name.into() })
    }

    pub fn index_exists(table: impl Into<String>, name: impl Into<String>) -> Self {
        Guard::Exists(SchemaObject::Index {
            table: table.into(),
            name: name.into(),
        })
    }

    pub fn index_not_exists(table: impl Into<String>, name: impl Into<String>) -> Self {
        Guard::NotExists(SchemaObject::Index {
            table: table.into(),
            name: name.into(),
        })
    }

    pub fn role_exists(name: impl Into<String>) -> Self {
        Guard::Exists(SchemaObject::Role { name: name.into() })
    }

    pub fn role_not_exists(name: impl Into<String>) -> Self {
        Guard::NotExists(SchemaObject::Role { name: name.into() })
    }

    /// A guard running caller-supplied logic.
    ///
    /// # Example
    ///
    /// ```
    /// use stepwise::Guard;
    ///
    /// let guard = Guard::dynamic("vocab has no foo", |session| {
    ///     session.query_is_empty("SELECT 1 FROM vocab WHERE word = $1", &["foo".into()])
    /// });
    /// assert_eq!(guard.label(), "vocab has no foo");
    /// ```
    pub fn dynamic<F>(label: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&mut dyn Session) -> Result<bool, Error> + Send + Sync + 'static,
    {
        Guard::Dynamic(DynamicGuard {
            label: label.into(),
            predicate: Box::new(predicate),
        })
    }

    /// A dynamic guard that runs the step while `query` returns no rows.
    pub fn if_empty(
        label: impl Into<String>,
        query: impl Into<String>,
        params: Vec<Value>,
    ) -> Self {
        let query = query.into();
        Guard::dynamic(label, move |session| session.query_is_empty(&query, &params))
    }

    pub fn always() -> Self {
        Guard::Always
    }

    /// Describes what the guard checks, e.g. `table widgets not exists`.
    pub fn label(&self) -> String {
        match self {
            Guard::Exists(object) => format!("{} exists", object),
            Guard::NotExists(object) => format!("{} not exists", object),
            Guard::Dynamic(dynamic) => dynamic.label.clone(),
            Guard::Always => "always".to_string(),
        }
    }

    /// Decide whether the step still needs to run.
    pub fn evaluate(&self, session: &mut dyn Session) -> Result<bool, Error> {
        match self {
            Guard::Exists(object) => object.exists(session),
            Guard::NotExists(object) => Ok(!object.exists(session)?),
            Guard::Dynamic(dynamic) => (dynamic.predicate)(session),
            Guard::Always => Ok(true),
        }
    }
}
