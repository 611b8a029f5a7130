//! HTTP lookup API
//!
//! - `GET /streams/:name/records/:id`: the record as stored, `200`
//! - `GET /health`: `OK`
//!
//! Failures answer `{"err": "<message>"}` with `404` when nothing holds the record, `400` for
//! a malformed id or name and `500` for storage failures.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use tracing::info;

use crate::error::{FinderError, Result};
use crate::finder::Finder;

/// Create router with all API endpoints
pub fn router(finder: Arc<Finder>) -> Router {
    Router::new()
        .route("/streams/:name/records/:id", get(get_record))
        .route("/health", get(health_check))
        .with_state(finder)
}

/// Serve the API on `listener` until `shutdown` resolves.
pub async fn serve<F>(finder: Arc<Finder>, listener: tokio::net::TcpListener, shutdown: F) -> Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(addr = %addr, "Finder API listening");

    axum::serve(listener, router(finder))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn get_record(
    State(finder): State<Arc<Finder>>,
    Path((name, id)): Path<(String, String)>,
) -> Result<Response> {
    let record = finder.find_record(&name, &id).await?;
    Ok(([(header::CONTENT_TYPE, "application/json")], record).into_response())
}

async fn health_check() -> &'static str {
    "OK"
}

impl IntoResponse for FinderError {
    fn into_response(self) -> Response {
        let status = match &self {
            FinderError::NotFound => StatusCode::NOT_FOUND,
            FinderError::InvalidIdentifier(_) | FinderError::InvalidStreamName(_) => {
                StatusCode::BAD_REQUEST
            }
            FinderError::ListTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Lookup failed");
        }

        let body = serde_json::json!({ "err": self.to_string() });
        (status, Json(body)).into_response()
    }
}
