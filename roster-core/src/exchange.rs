//! Exchange capture — buffering of response output and the per-request
//! exchange record.
//!
//! `ExchangeCapture` collects response chunks in the order they are written.
//! When the response ends it is turned into an `ExchangeRecord`, which
//! `ExchangeLog` emits to the console and writes to `<dir>/<timestamp>.log`.
//!
//! Log files are named by completion time at millisecond resolution. Two
//! exchanges finishing in the same millisecond write to the same file and
//! the later one wins.

use std::fs;
use std::path::{Path, PathBuf};

use bytes::{Bytes, BytesMut};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::RosterError;

/// ISO-8601 UTC with millisecond precision, e.g. `2026-02-23T10:00:00.123Z`.
pub fn iso_millis(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn serialize_iso_millis<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&iso_millis(ts))
}

/// What the capture stage knows about the request before the handler runs.
#[derive(Debug, Clone)]
pub struct RequestSummary {
    pub method: String,
    /// Original path including the query string.
    pub url: String,
    /// Request body as parsed by the body-reading stage.
    pub body: Value,
}

/// One completed request/response pair. Immutable once built.
#[derive(Debug, Clone, Serialize)]
pub struct ExchangeRecord {
    #[serde(serialize_with = "serialize_iso_millis")]
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub url: String,
    pub body: Value,
    pub response: String,
}

/// Ordered buffer of the response bytes of one exchange.
#[derive(Debug)]
pub struct ExchangeCapture {
    request: RequestSummary,
    chunks: Vec<Bytes>,
}

impl ExchangeCapture {
    pub fn new(request: RequestSummary) -> Self {
        Self {
            request,
            chunks: Vec::new(),
        }
    }

    /// Append one written chunk. `Bytes` clones share the allocation.
    pub fn record_chunk(&mut self, chunk: &Bytes) {
        self.chunks.push(chunk.clone());
    }

    pub fn captured_len(&self) -> usize {
        self.chunks.iter().map(Bytes::len).sum()
    }

    /// Close the capture. A trailing payload carried by the final write is
    /// appended before the body is reconstructed.
    pub fn finish(mut self, trailing: Option<Bytes>) -> ExchangeRecord {
        if let Some(last) = trailing {
            self.chunks.push(last);
        }

        let mut joined = BytesMut::with_capacity(self.captured_len());
        for chunk in &self.chunks {
            joined.extend_from_slice(chunk);
        }

        ExchangeRecord {
            timestamp: Utc::now(),
            method: self.request.method,
            url: self.request.url,
            body: self.request.body,
            response: String::from_utf8_lossy(&joined).into_owned(),
        }
    }
}

/// Writes exchange records to the console and to one file per exchange.
#[derive(Debug, Clone)]
pub struct ExchangeLog {
    dir: PathBuf,
}

impl ExchangeLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ensure_dir(&self) -> Result<(), RosterError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }

    pub fn path_for(&self, record: &ExchangeRecord) -> PathBuf {
        self.dir.join(format!("{}.log", iso_millis(&record.timestamp)))
    }

    /// Best-effort persistence. The caller decides what a failure means;
    /// nothing here touches the response.
    pub fn persist(&self, record: &ExchangeRecord) -> Result<PathBuf, RosterError> {
        tracing::info!(
            target: "roster::exchange",
            timestamp = %iso_millis(&record.timestamp),
            method = %record.method,
            url = %record.url,
            body = %record.body,
            response = %record.response,
            "exchange completed"
        );

        let path = self.path_for(record);
        let pretty = serde_json::to_string_pretty(record)?;
        fs::write(&path, pretty)?;
        Ok(path)
    }
}
