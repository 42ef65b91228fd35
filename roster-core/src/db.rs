use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::error::RosterError;
use sqlx::{
    postgres::{PgConnectOptions, PgPoolOptions},
    PgPool,
};

impl DatabaseConfig {
    /// Build connect options from whatever store identity is configured.
    ///
    /// Unset fields keep the driver defaults (`PG*` variables, then
    /// localhost and the OS user), so an incomplete identity surfaces as a
    /// connection error on the first query.
    pub fn connect_options(&self) -> PgConnectOptions {
        let mut options = PgConnectOptions::new().port(self.port);

        for (var, value) in self.identity() {
            if value.is_none() {
                tracing::warn!("{} is not set; the first query will likely fail", var);
            }
        }

        if let Some(host) = self.host.as_deref() {
            options = options.host(host);
        }
        if let Some(user) = self.user.as_deref() {
            options = options.username(user);
        }
        if let Some(password) = self.password.as_deref() {
            options = options.password(password);
        }
        if let Some(name) = self.name.as_deref() {
            options = options.database(name);
        }
        options
    }

    fn identity(&self) -> [(&'static str, Option<&str>); 4] {
        [
            ("DB_HOST", self.host.as_deref()),
            ("DB_USER", self.user.as_deref()),
            ("DB_PASS", self.password.as_deref()),
            ("DB_NAME", self.name.as_deref()),
        ]
    }
}

/// Create the shared pool. No connection is opened until the first query.
pub fn create_pool(config: &DatabaseConfig) -> PgPool {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .connect_lazy_with(config.connect_options())
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

/// Close every connection in the pool, bounded by `timeout`.
pub async fn release(pool: &PgPool, timeout: Duration) -> Result<(), RosterError> {
    tokio::time::timeout(timeout, pool.close())
        .await
        .map_err(|_| RosterError::Release(format!("close did not finish within {:?}", timeout)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_config() -> DatabaseConfig {
        DatabaseConfig {
            host: Some("localhost".to_string()),
            user: Some("roster".to_string()),
            password: Some("roster_dev".to_string()),
            name: Some("roster".to_string()),
            ..DatabaseConfig::default()
        }
    }

    #[test]
    fn test_connect_options_tolerate_missing_store_settings() {
        let mut config = full_config();
        config.password = None;
        config.name = None;
        let options = config.connect_options();
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_username(), "roster");
    }

    #[test]
    fn test_connect_options_carry_configured_values() {
        let options = full_config().connect_options();
        assert_eq!(options.get_host(), "localhost");
        assert_eq!(options.get_port(), 5432);
        assert_eq!(options.get_username(), "roster");
        assert_eq!(options.get_database(), Some("roster"));
    }

    #[tokio::test]
    async fn test_lazy_pool_releases_without_connecting() {
        let pool = create_pool(&full_config());
        release(&pool, Duration::from_secs(1)).await.unwrap();
        assert!(pool.is_closed());
    }

    #[tokio::test]
    async fn test_pool_without_store_settings_builds_lazily() {
        let pool = create_pool(&DatabaseConfig::default());
        assert_eq!(pool.size(), 0);
        release(&pool, Duration::from_secs(1)).await.unwrap();
    }
}
