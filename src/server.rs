//! Worksheet REST API.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`    | `/health` | `{status, timestamp}` |
//! | `GET`    | `/worksheets` | Paged listing (`page`, `limit`, `search`) |
//! | `GET`    | `/worksheets/{id}` | One worksheet |
//! | `GET`    | `/worksheets/subject/{subject}` | Listing scoped to a subject (`page`, `limit`) |
//! | `GET`    | `/worksheets/recent/{days}` | Newest worksheets from the last `days` days |
//! | `GET`    | `/subjects` | Sorted distinct subjects |
//! | `DELETE` | `/worksheets/{id}` | Delete one worksheet |
//!
//! # Error Contract
//!
//! ```json
//! { "error": "Worksheet not found" }
//! { "error": "Internal server error", "details": "document store unavailable: ..." }
//! ```
//!
//! 400 for malformed ids, 404 for missing worksheets and unknown routes,
//! 500 for store failures and handler panics.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser clients can
//! call the API directly.

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::any::Any;
use std::sync::Arc;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db;
use crate::error::RetrievalError;
use crate::migrate;
use crate::models::{format_timestamp, PaginationEnvelope, WorksheetDocument, WorksheetRecord};
use crate::query::PageRequest;
use crate::retrieval::RetrievalService;
use crate::store::{sqlite::SqliteStore, DocumentStore};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
struct AppState {
    service: RetrievalService,
}

/// Starts the HTTP server and runs until Ctrl-C.
///
/// Opens the store once, verifies it answers, and fails fast otherwise.
/// The pool is closed after the server drains.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let store = Arc::new(SqliteStore::new(pool));
    store.ping().await?;

    let service = RetrievalService::new(store.clone(), config.pagination.clone());
    let app = router(service);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "worksheet API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    store.close().await;
    tracing::info!("server stopped");
    Ok(())
}

/// Builds the router over `service`. Exposed for embedding and tests.
pub fn router(service: RetrievalService) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/health", get(handle_health))
        .route("/worksheets", get(handle_list))
        .route("/worksheets/subject/{subject}", get(handle_by_subject))
        .route("/worksheets/recent/{days}", get(handle_recent))
        .route("/worksheets/{id}", get(handle_get).delete(handle_delete))
        .route("/subjects", get(handle_subjects))
        .fallback(handle_not_found)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { service })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C; shutdown only by termination");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

/// Error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl AppError {
    fn internal(details: impl Into<String>) -> Self {
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            error: "Internal server error".to_string(),
            details: Some(details.into()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.error,
            details: self.details,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<RetrievalError> for AppError {
    fn from(err: RetrievalError) -> Self {
        match err {
            RetrievalError::InvalidIdentifier(_) => AppError {
                status: StatusCode::BAD_REQUEST,
                error: "Invalid worksheet ID".to_string(),
                details: None,
            },
            RetrievalError::NotFound(_) => AppError {
                status: StatusCode::NOT_FOUND,
                error: "Worksheet not found".to_string(),
                details: None,
            },
            RetrievalError::StoreUnavailable(_) => {
                tracing::error!(error = %err, "request failed");
                AppError::internal(err.to_string())
            }
        }
    }
}

fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let details = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "handler panicked".to_string()
    };
    tracing::error!(details = %details, "handler panicked");
    AppError::internal(details).into_response()
}

async fn handle_not_found() -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        error: "Route not found".to_string(),
        details: None,
    }
}

/// Decoded query pairs, or the reason they could not be read.
type QueryPairs = Result<Query<Vec<(String, String)>>, QueryRejection>;

/// Paging parameters never fail a request: repeated keys keep their first
/// value and an unreadable query string means defaults.
fn page_request(query: QueryPairs) -> PageRequest {
    match query {
        Ok(Query(pairs)) => PageRequest::from_pairs(pairs),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "ignoring unreadable query string");
            PageRequest::default()
        }
    }
}

fn to_wire(records: &[WorksheetRecord]) -> Vec<WorksheetDocument> {
    records.iter().map(WorksheetDocument::from).collect()
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    timestamp: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: format_timestamp(&chrono::Utc::now()),
    })
}

// ============ GET /worksheets ============

async fn handle_list(
    State(state): State<AppState>,
    query: QueryPairs,
) -> Result<Json<PaginationEnvelope<WorksheetDocument>>, AppError> {
    let page = state.service.list_worksheets(&page_request(query)).await?;
    Ok(Json(page.map(|r| WorksheetDocument::from(&r))))
}

// ============ GET /worksheets/{id} ============

async fn handle_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorksheetDocument>, AppError> {
    let record = state.service.get_worksheet_by_id(&id).await?;
    Ok(Json(WorksheetDocument::from(&record)))
}

// ============ GET /worksheets/subject/{subject} ============

async fn handle_by_subject(
    State(state): State<AppState>,
    Path(subject): Path<String>,
    query: QueryPairs,
) -> Result<Json<Vec<WorksheetDocument>>, AppError> {
    let records = state
        .service
        .list_worksheets_by_subject(&subject, &page_request(query))
        .await?;
    Ok(Json(to_wire(&records)))
}

// ============ GET /worksheets/recent/{days} ============

async fn handle_recent(
    State(state): State<AppState>,
    Path(days): Path<String>,
) -> Result<Json<Vec<WorksheetDocument>>, AppError> {
    let records = state.service.list_recent_worksheets(Some(&days)).await?;
    Ok(Json(to_wire(&records)))
}

// ============ GET /subjects ============

async fn handle_subjects(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.service.list_distinct_subjects().await?))
}

// ============ DELETE /worksheets/{id} ============

#[derive(Serialize)]
struct DeleteResponse {
    message: String,
}

async fn handle_delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResponse>, AppError> {
    state.service.delete_worksheet(&id).await?;
    Ok(Json(DeleteResponse {
        message: "Worksheet deleted successfully".to_string(),
    }))
}
