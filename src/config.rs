//! Process configuration, read once at startup from the environment (and `.env`).

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
pub const DEFAULT_ROLES_DATABASE: &str = "admin";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid BIND_ADDR '{value}': {source}")]
    BindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("unknown APP_ENV '{0}' (expected development or production)")]
    Environment(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunningEnvironment {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub bind_addr: SocketAddr,
    /// Database `rolesInfo` runs against when listing permission sets.
    pub roles_database: String,
    pub environment: RunningEnvironment,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 3000)),
            roles_database: DEFAULT_ROLES_DATABASE.to_string(),
            environment: RunningEnvironment::Development,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Missing .env is fine
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind.parse::<SocketAddr>().map_err(|source| ConfigError::BindAddr {
            value: bind.clone(),
            source,
        })?;

        let roles_database = lookup("MONGODB_DB_NAME")
            .filter(|db| !db.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLES_DATABASE.to_string());

        let environment = match lookup("APP_ENV").as_deref() {
            None | Some("") | Some("dev") | Some("development") => RunningEnvironment::Development,
            Some("prod") | Some("production") => RunningEnvironment::Production,
            Some(other) => return Err(ConfigError::Environment(other.to_string())),
        };

        Ok(Self {
            bind_addr,
            roles_database,
            environment,
        })
    }

    /// Session cookies carry the Secure flag outside development.
    pub fn secure_cookies(&self) -> bool {
        self.environment == RunningEnvironment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let settings = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(settings.bind_addr.to_string(), DEFAULT_BIND_ADDR);
        assert_eq!(settings.roles_database, "admin");
        assert!(!settings.secure_cookies());
    }

    #[test]
    fn test_production_enables_secure_cookies() {
        let settings = Settings::from_lookup(lookup(&[
            ("APP_ENV", "production"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("MONGODB_DB_NAME", "ops"),
        ]))
        .unwrap();
        assert!(settings.secure_cookies());
        assert_eq!(settings.bind_addr.port(), 8080);
        assert_eq!(settings.roles_database, "ops");
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            Settings::from_lookup(lookup(&[("BIND_ADDR", "nowhere")])),
            Err(ConfigError::BindAddr { .. })
        ));
        assert!(matches!(
            Settings::from_lookup(lookup(&[("APP_ENV", "staging")])),
            Err(ConfigError::Environment(_))
        ));
    }
}
