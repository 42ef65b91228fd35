//! Response-capture middleware
//!
//! `capture_exchange` reads the request body once (so it can be logged in
//! parsed form), hands an identical request to the next stage, and wraps the
//! response body in a [`CaptureBody`]. The wrapper forwards every frame to the
//! client untouched while copying data frames into an [`ExchangeCapture`].
//! When the last frame has been produced the exchange record is persisted,
//! and only then is that frame (or end-of-stream) released to the client.
//!
//! Persistence is best-effort: a failed write is reported with `warn!` and
//! the response carries on.

use std::error::Error as StdError;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use axum::extract::{OriginalUri, Request, State};
use axum::http::{header, Extensions, HeaderMap, StatusCode, Uri};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::LengthLimitError;
use roster_core::{ExchangeCapture, ExchangeLog, RequestSummary};
use serde_json::{json, Value};

#[derive(Clone)]
pub struct CaptureState {
    pub log: Arc<ExchangeLog>,
    pub body_limit: usize,
}

impl CaptureState {
    pub fn new(log: ExchangeLog, body_limit: usize) -> Self {
        Self {
            log: Arc::new(log),
            body_limit,
        }
    }
}

/// Path and query as the client sent them, even under nested routers.
pub(crate) fn original_url(uri: &Uri, extensions: &Extensions) -> String {
    let uri = extensions
        .get::<OriginalUri>()
        .map(|original| &original.0)
        .unwrap_or(uri);
    uri.path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string())
}

/// JSON bodies are logged as parsed values; anything else logs as `{}`.
pub(crate) fn parsed_body(headers: &HeaderMap, bytes: &Bytes) -> Value {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.contains("json"))
        .unwrap_or(false);

    if bytes.is_empty() || !is_json {
        return json!({});
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| json!({}))
}

/// True when buffering stopped at the configured body limit.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source = Some(err as &(dyn StdError + 'static));
    while let Some(e) = source {
        if e.is::<LengthLimitError>() {
            return true;
        }
        source = e.source();
    }
    false
}

pub async fn capture_exchange(
    State(state): State<CaptureState>,
    request: Request,
    next: Next,
) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, state.body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let status = if exceeds_limit(&e) {
                StatusCode::PAYLOAD_TOO_LARGE
            } else {
                StatusCode::BAD_REQUEST
            };
            tracing::warn!(error = %e, %status, "failed to read request body");
            return (status, Json(json!({ "error": e.to_string() }))).into_response();
        }
    };

    let summary = RequestSummary {
        method: parts.method.to_string(),
        url: original_url(&parts.uri, &parts.extensions),
        body: parsed_body(&parts.headers, &bytes),
    };

    let response = next.run(Request::from_parts(parts, Body::from(bytes))).await;

    let (parts, body) = response.into_parts();
    let body = CaptureBody::new(body, ExchangeCapture::new(summary), state.log.clone());
    Response::from_parts(parts, Body::new(body))
}

// ============================================================================
// Capturing body
// ============================================================================

/// Response body decorator that records what it forwards.
pub struct CaptureBody {
    inner: Body,
    capture: Option<ExchangeCapture>,
    log: Arc<ExchangeLog>,
}

impl CaptureBody {
    pub fn new(inner: Body, capture: ExchangeCapture, log: Arc<ExchangeLog>) -> Self {
        Self {
            inner,
            capture: Some(capture),
            log,
        }
    }

    fn finish(&mut self, trailing: Option<Bytes>) {
        let Some(capture) = self.capture.take() else {
            return;
        };
        let record = capture.finish(trailing);
        if let Err(e) = self.log.persist(&record) {
            tracing::warn!(
                error = %e,
                method = %record.method,
                url = %record.url,
                "failed to persist exchange log"
            );
        }
    }
}

impl HttpBody for CaptureBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();

        match Pin::new(&mut this.inner).poll_frame(cx) {
            Poll::Ready(Some(Ok(frame))) => {
                let last = this.inner.is_end_stream();
                match frame.data_ref() {
                    // The final write carries a payload: record it, then persist.
                    Some(data) if last => this.finish(Some(data.clone())),
                    Some(data) => {
                        if let Some(capture) = this.capture.as_mut() {
                            capture.record_chunk(data);
                        }
                    }
                    None if last => this.finish(None),
                    None => {}
                }
                Poll::Ready(Some(Ok(frame)))
            }
            Poll::Ready(None) => {
                this.finish(None);
                Poll::Ready(None)
            }
            other => other,
        }
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CaptureBody {
    fn drop(&mut self) {
        // Bodies that are empty from the start may never be polled. A body
        // dropped mid-stream is an aborted exchange and is not logged.
        if self.capture.is_some() && self.inner.is_end_stream() {
            self.finish(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn json_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    #[test]
    fn test_parsed_body_json() {
        let body = parsed_body(&json_headers(), &Bytes::from_static(br#"{"name":"Eve","age":30}"#));
        assert_eq!(body, json!({"name": "Eve", "age": 30}));
    }

    #[test]
    fn test_parsed_body_defaults_to_empty_object() {
        assert_eq!(parsed_body(&json_headers(), &Bytes::new()), json!({}));
        assert_eq!(
            parsed_body(&HeaderMap::new(), &Bytes::from_static(b"name=Eve")),
            json!({})
        );
        assert_eq!(
            parsed_body(&json_headers(), &Bytes::from_static(b"{not json")),
            json!({})
        );
    }

    #[tokio::test]
    async fn test_exceeds_limit_only_for_length_errors() {
        let err = axum::body::to_bytes(Body::from("x".repeat(16)), 8)
            .await
            .unwrap_err();
        assert!(exceeds_limit(&err));

        let other = axum::Error::new(std::io::Error::other("reset"));
        assert!(!exceeds_limit(&other));
    }

    #[test]
    fn test_original_url_keeps_query_string() {
        let uri: Uri = "/students/3?verbose=true".parse().unwrap();
        assert_eq!(original_url(&uri, &Extensions::new()), "/students/3?verbose=true");
    }

    #[test]
    fn test_original_url_prefers_original_uri_extension() {
        let nested: Uri = "/3".parse().unwrap();
        let mut extensions = Extensions::new();
        extensions.insert(OriginalUri("/students/3".parse().unwrap()));
        assert_eq!(original_url(&nested, &extensions), "/students/3");
    }
}
