//! Read-only control API over localhost HTTP.
//!
//! Every endpoint is a point-in-time view of daemon state; none of them
//! mutate anything. Bound to 127.0.0.1 only.

pub mod handlers;

use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};

pub use handlers::ApiState;

/// Build the route tree. Split out from `serve` so tests can bind the
/// router on an ephemeral port.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/peer-id", get(handlers::handle_peer_id))
        .route("/peers", get(handlers::handle_peers))
        .route("/status", get(handlers::handle_status))
        .route("/health", get(handlers::handle_health))
        .with_state(state);

    Router::new().nest("/api", api_routes).layer(cors)
}

pub async fn serve(state: ApiState, port: u16) -> anyhow::Result<()> {
    let app = router(state);
    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port)).await?;
    tracing::info!(port, "control API listening on 127.0.0.1");
    axum::serve(listener, app).await?;
    Ok(())
}
