use thiserror::Error;

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to release database pool: {0}")]
    Release(String),
}

impl RosterError {
    /// Text surfaced to HTTP callers in the `error` field.
    ///
    /// Store errors carry the driver's own message, unclassified.
    pub fn client_message(&self) -> String {
        match self {
            RosterError::Database(sqlx::Error::Database(db_err)) => db_err.message().to_string(),
            RosterError::Database(e) => e.to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_message_for_non_database_errors_is_display_text() {
        let err = RosterError::Release("close did not finish within 1s".to_string());
        assert_eq!(
            err.client_message(),
            "Failed to release database pool: close did not finish within 1s"
        );
    }

    #[test]
    fn test_client_message_for_driver_errors_without_db_message() {
        let err = RosterError::Database(sqlx::Error::RowNotFound);
        assert_eq!(err.client_message(), sqlx::Error::RowNotFound.to_string());
    }
}
