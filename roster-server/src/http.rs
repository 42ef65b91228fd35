//! Roster HTTP REST API
//!
//! Axum server exposing the `students` table.
//!
//! Architecture: each endpoint has a thin axum handler that delegates to a pure
//! inner function returning `(StatusCode, Value)`. The inner functions are
//! directly testable without axum dispatch machinery.
//!
//! Endpoints:
//! - GET    /              — static landing page (from `http.public_dir`)
//! - GET    /students      — list every student
//! - POST   /students      — create a student
//! - GET    /students/:id  — fetch one student
//! - PUT    /students/:id  — overwrite name and age
//! - DELETE /students/:id  — delete one student
//!
//! The `/students` routes and unmatched paths run behind the capture
//! middleware; files served from `public_dir` do not.

use std::sync::Arc;

use anyhow::Result;
use axum::extract::{OriginalUri, Path, State};
use axum::http::{Method, StatusCode};
use axum::middleware;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use roster_core::{students, ExchangeLog, RosterConfig, RosterError, StudentInput};
use serde_json::{json, Value};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::capture::{capture_exchange, CaptureState};
use crate::request_log::{log_request, RequestLog};

pub const NOT_FOUND_MESSAGE: &str = "Student not found";
pub const DELETED_MESSAGE: &str = "Student deleted successfully!";

/// Shared state for all HTTP handlers
#[derive(Clone)]
pub struct HttpState {
    pub pool: PgPool,
    pub config: RosterConfig,
}

/// Build the Axum router with all endpoints
pub fn build_router(state: Arc<HttpState>) -> Router {
    let logging = &state.config.logging;
    let capture = CaptureState::new(
        ExchangeLog::new(&logging.exchange_dir),
        state.config.http.body_limit_bytes,
    );
    let request_log = logging
        .request_log_enabled
        .then(|| Arc::new(RequestLog::new(&logging.request_log_file)));
    let public_dir = state.config.http.public_dir.clone();

    let mut api = Router::new()
        .route(
            "/students",
            get(list_students_handler).post(create_student_handler),
        )
        .route(
            "/students/:id",
            get(get_student_handler)
                .put(update_student_handler)
                .delete(delete_student_handler),
        )
        .with_state(state);

    if let Some(request_log) = request_log {
        api = api.layer(middleware::from_fn_with_state(request_log, log_request));
    }
    let api = api.layer(middleware::from_fn_with_state(
        capture.clone(),
        capture_exchange,
    ));

    // Files found under `public_dir` are served as-is; anything else falls
    // through to a captured 404.
    let unmatched = Router::new()
        .fallback(unmatched_handler)
        .layer(middleware::from_fn_with_state(capture, capture_exchange));
    let static_files = ServeDir::new(public_dir)
        .call_fallback_on_method_not_allowed(true)
        .fallback(unmatched);

    Router::new()
        .merge(api)
        .fallback_service(static_files)
        .layer(TraceLayer::new_for_http())
}

/// Plain-text 404 for paths that match neither a route nor a file.
pub async fn unmatched_handler(
    method: Method,
    OriginalUri(uri): OriginalUri,
) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, format!("Cannot {} {}", method, uri.path()))
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down on Ctrl+C.
pub async fn start_http_server(pool: PgPool, config: RosterConfig) -> Result<()> {
    ExchangeLog::new(&config.logging.exchange_dir).ensure_dir()?;
    if config.logging.request_log_enabled {
        if let Some(parent) = std::path::Path::new(&config.logging.request_log_file).parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let addr = config.http_addr();
    let port = config.http.port;
    let state = Arc::new(HttpState { pool, config });

    let app = build_router(state);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server running on http://localhost:{}", port);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                return;
            }
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Store failures become a 500 carrying the store's own message.
fn store_error(e: RosterError) -> (StatusCode, Value) {
    tracing::error!(error = %e, "store query failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        json!({ "error": e.client_message() }),
    )
}

pub async fn list_students_inner(pool: &PgPool) -> (StatusCode, Value) {
    match students::list(pool).await {
        Ok(rows) => (StatusCode::OK, json!(rows)),
        Err(e) => store_error(e),
    }
}

pub async fn create_student_inner(pool: &PgPool, input: StudentInput) -> (StatusCode, Value) {
    match students::insert(pool, &input).await {
        Ok(id) => (
            StatusCode::OK,
            json!({ "id": id, "name": input.name, "age": input.age }),
        ),
        Err(e) => store_error(e),
    }
}

pub async fn get_student_inner(pool: &PgPool, id: i32) -> (StatusCode, Value) {
    match students::get(pool, id).await {
        Ok(Some(student)) => (StatusCode::OK, json!(student)),
        Ok(None) => (StatusCode::NOT_FOUND, json!({ "error": NOT_FOUND_MESSAGE })),
        Err(e) => store_error(e),
    }
}

/// Echoes the input whether or not a row matched.
pub async fn update_student_inner(
    pool: &PgPool,
    id: i32,
    input: StudentInput,
) -> (StatusCode, Value) {
    match students::update(pool, id, &input).await {
        Ok(_) => (
            StatusCode::OK,
            json!({ "id": id, "name": input.name, "age": input.age }),
        ),
        Err(e) => store_error(e),
    }
}

/// Confirms deletion whether or not a row matched.
pub async fn delete_student_inner(pool: &PgPool, id: i32) -> (StatusCode, Value) {
    match students::delete(pool, id).await {
        Ok(_) => (StatusCode::OK, json!({ "message": DELETED_MESSAGE })),
        Err(e) => store_error(e),
    }
}

// ============================================================================
// Axum handler wrappers (thin — delegate to inner functions)
// ============================================================================

pub async fn list_students_handler(State(state): State<Arc<HttpState>>) -> impl IntoResponse {
    let (status, body) = list_students_inner(&state.pool).await;
    (status, Json(body))
}

pub async fn create_student_handler(
    State(state): State<Arc<HttpState>>,
    Json(input): Json<StudentInput>,
) -> impl IntoResponse {
    let (status, body) = create_student_inner(&state.pool, input).await;
    (status, Json(body))
}

pub async fn get_student_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let (status, body) = get_student_inner(&state.pool, id).await;
    (status, Json(body))
}

pub async fn update_student_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i32>,
    Json(input): Json<StudentInput>,
) -> impl IntoResponse {
    let (status, body) = update_student_inner(&state.pool, id, input).await;
    (status, Json(body))
}

pub async fn delete_student_handler(
    State(state): State<Arc<HttpState>>,
    Path(id): Path<i32>,
) -> impl IntoResponse {
    let (status, body) = delete_student_inner(&state.pool, id).await;
    (status, Json(body))
}
