//! Router configuration.

use crate::handlers::{auth, dashboard, health_check, tickets, websocket};
use crate::middleware::request_id;
use crate::state::AppState;
use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use helpdesk_runtime::metrics::MetricsServer;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the application router.
///
/// - `/health`: liveness
/// - `/api/tickets`, `/api/ws`: public (customer) surface
/// - `/api/auth/*`: staff sessions
/// - `/api/dashboard/*`: staff only (bearer token)
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        // Public
        .route("/tickets", post(tickets::submit))
        .route("/tickets/:protocol/chat", get(tickets::chat_view))
        .route("/ws", get(websocket::handle))
        // Staff sessions
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/auth/register", post(auth::register))
        // Dashboard
        .route("/dashboard/tickets", get(dashboard::list_tickets))
        .route(
            "/dashboard/tickets/:protocol",
            get(dashboard::ticket_detail).post(dashboard::update_ticket),
        );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes)
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(request_id))
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        )
        .with_state(state)
}

/// Router for the Prometheus scrape endpoint, served on its own address.
pub fn metrics_router(metrics: Arc<MetricsServer>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(metrics)
}

async fn render_metrics(State(metrics): State<Arc<MetricsServer>>) -> Response {
    match metrics.render() {
        Some(body) => body.into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "metrics recorder not installed").into_response(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_metrics_unavailable_before_start() {
        let server = Arc::new(MetricsServer::new("127.0.0.1:0".parse().unwrap()));
        let response = metrics_router(server)
            .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
