//! roster-migrate — one-shot schema initialization for the students store
//!
//! Brings the store to the target schema version, seeding sample rows on a
//! fresh store, then releases the pool and exits.
//!
//! Exit status:
//! - 0 when the pool is released cleanly, including after a logged
//!   initialization error
//! - 1 when the configuration cannot be loaded or the pool fails to release

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use roster_core::migrate::{self, MigrationOutcome};
use roster_core::{db, RosterConfig, RosterError};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Debug, Parser)]
#[command(
    name = "roster-migrate",
    version,
    about = "Create and seed the students schema, then exit"
)]
struct Cli {
    /// Config file (DB_HOST, DB_USER, DB_PASS, DB_NAME override it)
    #[arg(short, long, env = "ROSTER_CONFIG", default_value = "roster.toml")]
    config: String,
}

fn describe(outcome: &MigrationOutcome) -> String {
    match outcome {
        MigrationOutcome::UpToDate { version } => format!("already at version {}", version),
        MigrationOutcome::Initialized { seeded } => {
            format!("initialized, {} sample rows inserted", seeded)
        }
        MigrationOutcome::Upgraded { from } => {
            format!("upgraded from version {} to {}", from, migrate::TARGET_VERSION)
        }
    }
}

/// Only a release failure is returned; a failed migration is logged and
/// the pool is still released.
async fn run(config: RosterConfig) -> Result<(), RosterError> {
    let pool = db::create_pool(&config.database);

    match migrate::migrate(&pool).await {
        Ok(outcome) => tracing::info!("Migration finished: {}", describe(&outcome)),
        Err(e) => tracing::error!("Error initializing database: {}", e.client_message()),
    }

    // Release regardless of how the migration went.
    tracing::info!("Closing the database connection.");
    let timeout = Duration::from_secs(config.database.close_timeout_seconds);
    db::release(&pool, timeout).await?;
    tracing::info!("Database connection closed.");
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match RosterConfig::load(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("roster-migrate: failed to load config from {}: {}", cli.config, e);
            return ExitCode::FAILURE;
        }
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    fmt().with_env_filter(env_filter).init();

    ExitCode::from(exit_status(&run(config).await))
}

fn exit_status(result: &Result<(), RosterError>) -> u8 {
    match result {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!("Error while closing the database connection: {}", e);
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_outcomes() {
        assert_eq!(
            describe(&MigrationOutcome::UpToDate { version: 1 }),
            "already at version 1"
        );
        assert_eq!(
            describe(&MigrationOutcome::Initialized { seeded: 3 }),
            "initialized, 3 sample rows inserted"
        );
        assert_eq!(
            describe(&MigrationOutcome::Upgraded { from: 0 }),
            format!("upgraded from version 0 to {}", migrate::TARGET_VERSION)
        );
    }

    #[test]
    fn test_cli_defaults_config_path() {
        let cli = Cli::try_parse_from(["roster-migrate"]).unwrap();
        if std::env::var("ROSTER_CONFIG").is_err() {
            assert_eq!(cli.config, "roster.toml");
        }
    }

    fn unreachable_config(lookup: &[(&str, &str)]) -> RosterConfig {
        let pairs: Vec<(String, String)> = lookup
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let mut config = RosterConfig::load_with("does-not-exist.toml", move |key: &str| {
            pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v.clone())
        })
        .unwrap();
        config.database.port = 1;
        config.database.acquire_timeout_seconds = 1;
        config
    }

    #[tokio::test]
    async fn test_missing_store_settings_still_release_cleanly() {
        let config = unreachable_config(&[]);
        assert!(run(config).await.is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_logged_and_exits_zero() {
        let config = unreachable_config(&[
            ("DB_HOST", "127.0.0.1"),
            ("DB_USER", "nobody"),
            ("DB_PASS", "nothing"),
            ("DB_NAME", "nowhere"),
        ]);
        let result = run(config).await;
        assert!(result.is_ok());
        assert_eq!(exit_status(&result), 0);
    }

    #[test]
    fn test_release_failure_exits_one() {
        let result = Err(RosterError::Release("close did not finish within 1s".to_string()));
        assert_eq!(exit_status(&result), 1);
    }
}
