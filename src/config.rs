use anyhow::{Context, Result};
use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use zeroize::Zeroizing;

use crate::db::connection::ConnectParams;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The database host name.
    pub db_host: String,
    /// The database port.
    pub db_port: u16,
    /// The database user.
    pub db_user: String,
    /// The database password.
    pub db_password: Zeroizing<String>,
    /// The database name.
    pub db_name: String,
    /// The maximum number of pooled connections.
    pub db_pool_size: usize,
    /// How long opening a connection may take.
    pub db_connect_timeout: Duration,
    /// How long a single statement may take.
    pub db_statement_timeout: Duration,
    /// How long a session may sit idle before it expires.
    pub session_inactivity: chrono::TimeDelta,
    /// The address the HTTP server binds to.
    pub bind_addr: SocketAddr,
    /// How long dispatching one request may take.
    pub request_timeout: Duration,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("db_host", &self.db_host)
            .field("db_port", &self.db_port)
            .field("db_user", &self.db_user)
            .field("db_password", &"<redacted>")
            .field("db_name", &self.db_name)
            .field("db_pool_size", &self.db_pool_size)
            .field("session_inactivity", &self.session_inactivity)
            .field("bind_addr", &self.bind_addr)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_host: "localhost".to_string(),
            db_port: 5432,
            db_user: "postgres".to_string(),
            db_password: Zeroizing::new(String::new()),
            db_name: "hospital_db".to_string(),
            db_pool_size: 10,
            db_connect_timeout: Duration::from_secs(5),
            db_statement_timeout: Duration::from_secs(10),
            session_inactivity: chrono::TimeDelta::hours(24),
            bind_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Reads and parses an optional variable.
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    lookup(name)
        .map(|raw| raw.trim().parse().with_context(|| format!("Invalid {}", name)))
        .transpose()
}

/// Reads a whole-second timeout. Zero is rejected: it would fail every call.
fn parse_timeout(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: Duration,
) -> Result<Duration> {
    match parse_var::<u64>(lookup, name)? {
        Some(0) => anyhow::bail!("{} must be at least 1 second", name),
        Some(secs) => Ok(Duration::from_secs(secs)),
        None => Ok(default),
    }
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Builds a `Config` from any variable source.
    ///
    /// # Arguments
    ///
    /// * `lookup` - Returns the raw value of a variable, or `None` when unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let db_pool_size = parse_var(&lookup, "DB_POOL_SIZE")?.unwrap_or(defaults.db_pool_size);
        if db_pool_size == 0 {
            anyhow::bail!("DB_POOL_SIZE must be at least 1");
        }

        let session_hours: i64 = parse_var(&lookup, "SESSION_INACTIVITY_HOURS")?.unwrap_or(24);
        if session_hours <= 0 {
            anyhow::bail!("SESSION_INACTIVITY_HOURS must be positive");
        }
        let session_inactivity = chrono::TimeDelta::try_hours(session_hours)
            .context("SESSION_INACTIVITY_HOURS is out of range")?;

        Ok(Self {
            db_host: lookup("DB_HOST").unwrap_or(defaults.db_host),
            db_port: parse_var(&lookup, "DB_PORT")?.unwrap_or(defaults.db_port),
            db_user: lookup("DB_USER").unwrap_or(defaults.db_user),
            db_password: Zeroizing::new(lookup("DB_PASSWORD").unwrap_or_default()),
            db_name: lookup("DB_NAME").unwrap_or(defaults.db_name),
            db_pool_size,
            db_connect_timeout: parse_timeout(
                &lookup,
                "DB_CONNECT_TIMEOUT_SECS",
                defaults.db_connect_timeout,
            )?,
            db_statement_timeout: parse_timeout(
                &lookup,
                "DB_STATEMENT_TIMEOUT_SECS",
                defaults.db_statement_timeout,
            )?,
            session_inactivity,
            bind_addr: parse_var(&lookup, "BIND_ADDR")?.unwrap_or(defaults.bind_addr),
            request_timeout: parse_timeout(
                &lookup,
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout,
            )?,
        })
    }

    /// The connection parameters handed to the pool.
    pub fn connect_params(&self) -> ConnectParams {
        ConnectParams {
            host: self.db_host.clone(),
            port: self.db_port,
            user: self.db_user.clone(),
            password: self.db_password.clone(),
            database: self.db_name.clone(),
            connect_timeout: self.db_connect_timeout,
            statement_timeout: self.db_statement_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.db_port, 5432);
        assert_eq!(config.db_name, "hospital_db");
        assert_eq!(config.db_pool_size, 10);
        assert_eq!(config.session_inactivity, chrono::TimeDelta::hours(24));
        assert_eq!(config.bind_addr.to_string(), "127.0.0.1:8080");
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn unset_variables_keep_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.db_pool_size, 10);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn variables_override_defaults() {
        let config = Config::from_lookup(lookup(&[
            ("DB_HOST", "db.internal"),
            ("DB_POOL_SIZE", " 4 "),
            ("SESSION_INACTIVITY_HOURS", "2"),
            ("REQUEST_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.db_host, "db.internal");
        assert_eq!(config.db_pool_size, 4);
        assert_eq!(config.session_inactivity, chrono::TimeDelta::hours(2));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn out_of_range_session_hours_is_an_error() {
        for hours in ["9223372036854775807", "3000000000000000", "0", "-1", "soon"] {
            let result = Config::from_lookup(lookup(&[("SESSION_INACTIVITY_HOURS", hours)]));
            assert!(result.is_err(), "{hours}");
        }
    }

    #[test]
    fn zero_timeouts_are_rejected() {
        for name in [
            "REQUEST_TIMEOUT_SECS",
            "DB_CONNECT_TIMEOUT_SECS",
            "DB_STATEMENT_TIMEOUT_SECS",
        ] {
            let result = Config::from_lookup(lookup(&[(name, "0")]));
            assert!(result.is_err(), "{name}");
        }
    }

    #[test]
    fn debug_redacts_password() {
        let config = Config {
            db_password: Zeroizing::new("hunter2".to_string()),
            ..Config::default()
        };
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("hunter2"));
        assert!(!format!("{:?}", config.connect_params()).contains("hunter2"));
    }
}
