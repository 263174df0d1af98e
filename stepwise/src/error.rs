/// Error type for the stepwise crate.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[cfg(feature = "sqlite")]
    #[error("{0}")]
    Rusqlite(rusqlite::Error),
    #[cfg(feature = "postgres")]
    #[error("{0}")]
    Postgres(#[from] postgres::Error),
    #[error("{0}")]
    Generic(String),
    /// The session's dialect has no way to answer the request.
    #[error("{what} is not supported by {dialect}")]
    Unsupported { what: String, dialect: String },
    #[error("configuration error: {0}")]
    Config(String),
    /// A guard's introspection query (or custom predicate) failed.
    #[error("guard `{guard}` could not be evaluated: {source}")]
    Guard {
        guard: String,
        #[source]
        source: Box<Error>,
    },
    /// A step's statements, script or body failed.
    #[error("`{guard}` step failed: {source}")]
    Invocation {
        guard: String,
        #[source]
        source: Box<Error>,
    },
    /// A group configured to abort on error stopped at a failing child.
    #[error("aborted: {source}")]
    Aborted {
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn guard(guard: impl Into<String>, source: Error) -> Self {
        Self::Guard {
            guard: guard.into(),
            source: Box::new(source),
        }
    }

    pub(crate) fn invocation(guard: impl Into<String>, source: Error) -> Self {
        Self::Invocation {
            guard: guard.into(),
            source: Box::new(source),
        }
    }

    /// Wrap in [`Error::Aborted`] unless a nested group already did.
    pub(crate) fn aborted(self) -> Self {
        match self {
            aborted @ Self::Aborted { .. } => aborted,
            other => Self::Aborted {
                source: Box::new(other),
            },
        }
    }

    /// True when the error stopped the run early rather than being collected.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted { .. })
    }

    /// The driver or custom error at the bottom of the wrapping chain.
    pub fn root_cause(&self) -> &Error {
        match self {
            Self::Guard { source, .. }
            | Self::Invocation { source, .. }
            | Self::Aborted { source } => source.root_cause(),
            other => other,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for Error {
    fn from(value: rusqlite::Error) -> Self {
        Self::Rusqlite(value)
    }
}

impl From<String> for Error {
    fn from(value: String) -> Self {
        Self::Generic(value)
    }
}

impl From<&str> for Error {
    fn from(value: &str) -> Self {
        Self::Generic(value.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Generic(value.to_string())
    }
}

// Manual PartialEq implementation because postgres::Error doesn't implement PartialEq
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            #[cfg(feature = "sqlite")]
            (Self::Rusqlite(a), Self::Rusqlite(b)) => a == b,
            #[cfg(feature = "postgres")]
            (Self::Postgres(a), Self::Postgres(b)) => a.to_string() == b.to_string(),
            (Self::Generic(a), Self::Generic(b)) => a == b,
            (
                Self::Unsupported { what, dialect },
                Self::Unsupported {
                    what: other_what,
                    dialect: other_dialect,
                },
            ) => what == other_what && dialect == other_dialect,
            (Self::Config(a), Self::Config(b)) => a == b,
            (
                Self::Guard { guard, source },
                Self::Guard {
                    guard: other_guard,
                    source: other_source,
                },
            ) => guard == other_guard && source == other_source,
            (
                Self::Invocation { guard, source },
                Self::Invocation {
                    guard: other_guard,
                    source: other_source,
                },
            ) => guard == other_guard && source == other_source,
            (Self::Aborted { source }, Self::Aborted { source: other }) => source == other,
            _ => false,
        }
    }
}
