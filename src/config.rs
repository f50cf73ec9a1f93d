//! Cookie and parameter settings for the gate, and the service bootstrap
//! settings read from the environment.

use std::net::SocketAddr;
use std::num::ParseIntError;

use actix_web::cookie::time::Duration;
use actix_web::cookie::Cookie;
use thiserror::Error;

/// Name of the cookie carrying the session id.
pub const DEFAULT_SESSION_COOKIE_NAME: &str = "SESSION_ID";
/// Name of the query parameter carrying the CSRF token on the protected path.
pub const DEFAULT_TOKEN_PARAM_NAME: &str = "token";
/// Seven days.
pub const DEFAULT_SESSION_MAX_AGE: Duration = Duration::days(7);

/// How the session cookie is named and scoped, and where the CSRF token is
/// looked up.
///
/// The defaults reproduce the demo's cookie exactly:
/// `SESSION_ID=...; Max-Age=604800; Path=/; Secure; HttpOnly`.
///
/// ```
/// use csrf_demo::GateConfig;
///
/// let config = GateConfig::new().secure(false).cookie_name("DEV_SESSION");
/// assert_eq!(config.session_cookie_name(), "DEV_SESSION");
/// ```
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct GateConfig {
    cookie_name: String,
    token_param: String,
    max_age: Duration,
    path: String,
    secure: bool,
    http_only: bool,
}

impl GateConfig {
    /// Creates a config with the demo defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the session cookie name.
    #[must_use]
    pub fn cookie_name<T: Into<String>>(mut self, name: T) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Sets the name of the query parameter holding the CSRF token.
    #[must_use]
    pub fn token_param<T: Into<String>>(mut self, name: T) -> Self {
        self.token_param = name.into();
        self
    }

    /// Sets the `Max-Age` attribute on the session cookie.
    #[must_use]
    pub const fn max_age(mut self, max_age: Duration) -> Self {
        self.max_age = max_age;
        self
    }

    /// Sets the `Path` attribute on the session cookie.
    #[must_use]
    pub fn path<T: Into<String>>(mut self, path: T) -> Self {
        self.path = path.into();
        self
    }

    /// Sets the `Secure` attribute on the session cookie.
    #[must_use]
    pub const fn secure(mut self, enabled: bool) -> Self {
        self.secure = enabled;
        self
    }

    /// Sets the `HttpOnly` attribute on the session cookie.
    #[must_use]
    pub const fn http_only(mut self, enabled: bool) -> Self {
        self.http_only = enabled;
        self
    }

    /// Name of the session cookie.
    #[must_use]
    pub fn session_cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Name of the query parameter carrying the CSRF token.
    #[must_use]
    pub fn token_param_name(&self) -> &str {
        &self.token_param
    }

    pub(crate) fn session_cookie(&self, session_id: &str) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), session_id.to_owned())
            .max_age(self.max_age)
            .path(self.path.clone())
            .secure(self.secure)
            .http_only(self.http_only)
            .finish()
    }
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            cookie_name: DEFAULT_SESSION_COOKIE_NAME.to_owned(),
            token_param: DEFAULT_TOKEN_PARAM_NAME.to_owned(),
            max_age: DEFAULT_SESSION_MAX_AGE,
            path: "/".to_owned(),
            secure: true,
            http_only: true,
        }
    }
}

const BIND_VAR: &str = "CSRF_DEMO_BIND";
const DATABASE_URL_VAR: &str = "CSRF_DEMO_DATABASE_URL";
const MAX_CONNECTIONS_VAR: &str = "CSRF_DEMO_MAX_CONNECTIONS";

const DEFAULT_BIND: &str = "127.0.0.1:8080";
const DEFAULT_DATABASE_URL: &str = "sqlite::memory:";

/// Errors raised while reading the service settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The bind address could not be parsed.
    #[error("CSRF_DEMO_BIND is not a socket address: {0}")]
    InvalidBind(#[from] std::net::AddrParseError),
    /// The connection limit could not be parsed.
    #[error("CSRF_DEMO_MAX_CONNECTIONS is not a number: {0}")]
    InvalidMaxConnections(#[from] ParseIntError),
    /// A pool needs at least one connection.
    #[error("CSRF_DEMO_MAX_CONNECTIONS must be at least 1")]
    ZeroConnections,
}

/// Where the service listens and which database it stores messages in.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ServerConfig {
    /// Address the HTTP server binds to.
    pub bind: SocketAddr,
    /// sqlx connection URL for the message store.
    pub database_url: String,
    /// Upper bound on pooled connections.
    pub max_connections: u32,
}

impl ServerConfig {
    /// Reads `CSRF_DEMO_BIND`, `CSRF_DEMO_DATABASE_URL` and
    /// `CSRF_DEMO_MAX_CONNECTIONS`, falling back to defaults for unset ones.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env), with an arbitrary variable
    /// source.
    ///
    /// # Errors
    ///
    /// Returns an error if a provided value does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind = lookup(BIND_VAR)
            .as_deref()
            .unwrap_or(DEFAULT_BIND)
            .parse()?;
        let database_url =
            lookup(DATABASE_URL_VAR).unwrap_or_else(|| DEFAULT_DATABASE_URL.to_owned());

        // Every connection to `sqlite::memory:` opens its own database, so an
        // in-memory store must stay on a single connection.
        let max_connections = match lookup(MAX_CONNECTIONS_VAR) {
            Some(value) => value.trim().parse()?,
            None if is_in_memory(&database_url) => 1,
            None => 5,
        };
        if max_connections == 0 {
            return Err(ConfigError::ZeroConnections);
        }

        Ok(Self {
            bind,
            database_url,
            max_connections,
        })
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}
