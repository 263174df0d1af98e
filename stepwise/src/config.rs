use crate::error::Error;
use serde::Deserialize;

/// Environment variable holding a full connection string. Takes precedence over the others.
pub const ENV_DATABASE_URL: &str = "DATABASE_URL";
pub const ENV_HOST: &str = "DB_HOST";
pub const ENV_PORT: &str = "DB_PORT";
pub const ENV_DATABASE: &str = "DB_NAME";
pub const ENV_SCHEMA: &str = "DB_SCHEMA";
pub const ENV_USERNAME: &str = "DB_USER";
pub const ENV_PASSWORD: &str = "DB_PASSWORD";
pub const ENV_SSL_MODE: &str = "DB_SSLMODE";

pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: &str = "5432";
/// `postgres` rather than a template database, so nothing gets polluted by accident.
pub const DEFAULT_DATABASE: &str = "postgres";
pub const DEFAULT_SSL_MODE: &str = "disable";

/// Connection settings for a PostgreSQL database.
///
/// Every field is optional; getters fall back to the `DEFAULT_*` constants. A configured
/// [`dsn`](Config::dsn) is used as-is and ignores the other fields except `schema`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub dsn: Option<String>,
    pub host: Option<String>,
    pub port: Option<String>,
    pub database: Option<String>,
    /// Schema put first on the `search_path` after connecting.
    pub schema: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: Option<String>,
}

impl Config {
    /// Read the configuration from the process environment.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `DATABASE_URL` | dsn |
    /// | `DB_HOST` | host |
    /// | `DB_PORT` | port |
    /// | `DB_NAME` | database |
    /// | `DB_SCHEMA` | schema |
    /// | `DB_USER` | username |
    /// | `DB_PASSWORD` | password |
    /// | `DB_SSLMODE` | ssl_mode |
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`Config::from_env`], reading variables through `lookup`. Empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.is_empty());
        Self {
            dsn: var(ENV_DATABASE_URL),
            host: var(ENV_HOST),
            port: var(ENV_PORT),
            database: var(ENV_DATABASE),
            schema: var(ENV_SCHEMA),
            username: var(ENV_USERNAME),
            password: var(ENV_PASSWORD),
            ssl_mode: var(ENV_SSL_MODE),
        }
    }

    pub fn with_dsn(mut self, dsn: impl Into<String>) -> Self {
        self.dsn = Some(dsn.into());
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn with_port(mut self, port: impl Into<String>) -> Self {
        self.port = Some(port.into());
        self
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        self.schema = Some(schema.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_ssl_mode(mut self, ssl_mode: impl Into<String>) -> Self {
        self.ssl_mode = Some(ssl_mode.into());
        self
    }

    pub fn host(&self) -> &str {
        self.host.as_deref().unwrap_or(DEFAULT_HOST)
    }

    pub fn port(&self) -> &str {
        self.port.as_deref().unwrap_or(DEFAULT_PORT)
    }

    pub fn database(&self) -> &str {
        self.database.as_deref().unwrap_or(DEFAULT_DATABASE)
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn ssl_mode(&self) -> &str {
        self.ssl_mode.as_deref().unwrap_or(DEFAULT_SSL_MODE)
    }

    /// Check the settings before connecting.
    ///
    /// The schema is always checked, as it ends up in a `SET search_path` statement.
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(schema) = self.schema() {
            let valid = !schema.is_empty()
                && schema.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                return Err(Error::Config(format!("invalid schema name `{}`", schema)));
            }
        }
        if self.dsn.is_none() && self.port().parse::<u16>().is_err() {
            return Err(Error::Config(format!("invalid port `{}`", self.port())));
        }
        Ok(())
    }

    /// The connection string: the configured DSN, or a `postgres://` URL built from the fields.
    pub fn dsn(&self) -> String {
        if let Some(dsn) = &self.dsn {
            return dsn.clone();
        }

        let credentials = match (self.username.as_deref(), self.password.as_deref()) {
            (Some(username), Some(password)) => {
                format!("{}:{}@", escape(username), escape(password))
            }
            (Some(username), None) => format!("{}@", escape(username)),
            _ => String::new(),
        };

        format!(
            "postgres://{}{}:{}/{}?sslmode={}",
            credentials,
            self.host(),
            self.port(),
            self.database(),
            escape(self.ssl_mode())
        )
    }
}

fn escape(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
