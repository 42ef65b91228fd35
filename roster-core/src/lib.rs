pub mod config;
pub mod db;
pub mod error;
pub mod exchange;
pub mod migrate;
pub mod models;
pub mod students;

pub use config::RosterConfig;
pub use error::RosterError;
pub use exchange::{ExchangeCapture, ExchangeLog, ExchangeRecord, RequestSummary};
pub use migrate::{MigrationOutcome, TARGET_VERSION};
pub use models::{Student, StudentInput};
