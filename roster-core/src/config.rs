use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Environment variables that name the store, mapped onto `database.*`.
pub const STORE_ENV_VARS: [(&str, &str); 4] = [
    ("DB_HOST", "database.host"),
    ("DB_USER", "database.user"),
    ("DB_PASS", "database.password"),
    ("DB_NAME", "database.name"),
];

#[derive(Debug, Deserialize, Clone)]
pub struct RosterConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Store connection settings. The four identity fields have no defaults;
/// leaving one unset is not a load error.
#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub host: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u64,
    #[serde(default = "default_close_timeout")]
    pub close_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: None,
            user: None,
            password: None,
            name: None,
            port: default_port(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
            close_timeout_seconds: default_close_timeout(),
        }
    }
}

fn default_port() -> u16 {
    5432
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u64 {
    30
}

fn default_close_timeout() -> u64 {
    10
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    pub public_dir: String,
    pub body_limit_bytes: usize,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_dir: "public".to_string(),
            body_limit_bytes: 100 * 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub exchange_dir: String,
    pub request_log_enabled: bool,
    pub request_log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            exchange_dir: "logs".to_string(),
            request_log_enabled: false,
            request_log_file: "logs/api_logs.txt".to_string(),
        }
    }
}

impl RosterConfig {
    /// Load from an optional TOML file, `ROSTER__*` overrides and the
    /// `DB_*` store variables, in increasing order of precedence.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// Same as [`RosterConfig::load`], with the `DB_*` lookup injected.
    pub fn load_with<F>(path: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(
                Environment::with_prefix("ROSTER")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        for (var, key) in STORE_ENV_VARS {
            builder = builder.set_override_option(key, lookup(var))?;
        }

        builder.build()?.try_deserialize()
    }

    /// Listener address in `host:port` form.
    pub fn http_addr(&self) -> String {
        format!("{}:{}", self.http.host, self.http.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_store_vars_map_onto_database_section() {
        let config = RosterConfig::load_with(
            "does-not-exist.toml",
            lookup_from(&[
                ("DB_HOST", "db.internal"),
                ("DB_USER", "roster"),
                ("DB_PASS", "secret"),
                ("DB_NAME", "school"),
            ]),
        )
        .expect("config should load from store vars alone");

        assert_eq!(config.database.host.as_deref(), Some("db.internal"));
        assert_eq!(config.database.user.as_deref(), Some("roster"));
        assert_eq!(config.database.password.as_deref(), Some("secret"));
        assert_eq!(config.database.name.as_deref(), Some("school"));
    }

    #[test]
    fn test_defaults_apply_without_file() {
        let config = RosterConfig::load_with(
            "does-not-exist.toml",
            lookup_from(&[("DB_HOST", "localhost")]),
        )
        .unwrap();

        assert_eq!(config.database.port, 5432);
        assert_eq!(config.database.max_connections, 5);
        assert_eq!(config.database.acquire_timeout_seconds, 30);
        assert_eq!(config.database.close_timeout_seconds, 10);
        assert_eq!(config.http.port, 3000);
        assert_eq!(config.http.public_dir, "public");
        assert_eq!(config.http.body_limit_bytes, 102_400);
        assert_eq!(config.logging.exchange_dir, "logs");
        assert!(!config.logging.request_log_enabled);
        assert_eq!(config.logging.request_log_file, "logs/api_logs.txt");
        assert_eq!(config.http_addr(), "0.0.0.0:3000");
    }

    #[test]
    fn test_missing_store_vars_stay_unset() {
        let config =
            RosterConfig::load_with("does-not-exist.toml", lookup_from(&[("DB_HOST", "h")]))
                .unwrap();
        assert!(config.database.user.is_none());
        assert!(config.database.password.is_none());
        assert!(config.database.name.is_none());
    }
}
