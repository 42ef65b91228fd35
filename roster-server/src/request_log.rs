//! Free-text request log. Disabled unless `logging.request_log_enabled`.

use std::path::PathBuf;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};
use roster_core::exchange::iso_millis;
use roster_core::RosterError;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

use crate::capture::original_url;

#[derive(Debug, Clone)]
pub struct RequestLog {
    path: PathBuf,
}

impl RequestLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn format_line(ts: &DateTime<Utc>, method: &str, url: &str) -> String {
        format!("[{}] {} {}", iso_millis(ts), method, url)
    }

    pub async fn append(&self, line: &str) -> Result<(), RosterError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(format!("{}\n", line).as_bytes()).await?;
        Ok(())
    }
}

pub async fn log_request(
    State(log): State<Arc<RequestLog>>,
    request: Request,
    next: Next,
) -> Response {
    let line = RequestLog::format_line(
        &Utc::now(),
        request.method().as_str(),
        &original_url(request.uri(), request.extensions()),
    );
    tracing::info!("{}", line);

    // Fire and forget; the request does not wait on the append.
    tokio::spawn(async move {
        if let Err(e) = log.append(&line).await {
            tracing::warn!(error = %e, "Failed to write to the log file");
        }
    });

    next.run(request).await
}
