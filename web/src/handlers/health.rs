//! Health check endpoint, used by load balancers and monitoring.

use axum::http::StatusCode;

/// Liveness probe. Always `200 ok` while the process serves requests.
#[allow(clippy::unused_async)] // Axum handler signature requires async
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}
