use crate::error::Error;
use crate::session::Session;
use std::fmt;
use std::path::PathBuf;

/// Custom step logic with full access to the session.
pub type Body = Box<dyn Fn(&mut dyn Session) -> Result<(), Error> + Send + Sync>;

/// The work a [`Step`](crate::Step) performs once its guard says the change is needed.
pub enum Invocable {
    /// Statements executed one after another, stopping at the first failure.
    Statements(Vec<String>),
    /// A SQL file, read when invoked and executed as one batch.
    Script(PathBuf),
    /// Arbitrary logic, for changes that are not flat SQL.
    Body(Body),
}

impl Invocable {
    pub fn statements<I, S>(statements: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Invocable::Statements(statements.into_iter().map(Into::into).collect())
    }

    pub fn script(path: impl Into<PathBuf>) -> Self {
        Invocable::Script(path.into())
    }

    /// # Example
    ///
    /// ```
    /// use stepwise::Invocable;
    ///
    /// let insert = Invocable::body(|session| {
    ///     session.execute("INSERT INTO vocab (word) VALUES ($1)", &["foo".into()])
    /// });
    /// ```
    pub fn body<F>(body: F) -> Self
    where
        F: Fn(&mut dyn Session) -> Result<(), Error> + Send + Sync + 'static,
    {
        Invocable::Body(Box::new(body))
    }

    pub fn invoke(&self, session: &mut dyn Session) -> Result<(), Error> {
        match self {
            Invocable::Statements(statements) => {
                for statement in statements {
                    session.execute(statement, &[])?;
                }
                Ok(())
            }
            Invocable::Script(path) => {
                let script = std::fs::read_to_string(path).map_err(|e| {
                    Error::Generic(format!("Failed to read script {}: {}", path.display(), e))
                })?;
                session.execute(&script, &[])
            }
            Invocable::Body(body) => body(session),
        }
    }
}

impl fmt::Debug for Invocable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invocable::Statements(statements) => {
                f.debug_tuple("Statements").field(statements).finish()
            }
            Invocable::Script(path) => f.debug_tuple("Script").field(path).finish(),
            Invocable::Body(_) => f.write_str("Body(..)"),
        }
    }
}
