pub mod error;
pub mod routes;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use shopper_core::config::ShopperConfig;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// CORS for the storefront widget. A configured origin list allows
/// credentials; an empty list allows any origin without them.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_credentials(true)
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
}

/// Build the axum Router with all API routes and middleware.
/// Used by `serve()` and available for integration testing.
///
/// Chat routes share one parameter name in their first segment: it is the
/// user id or the session id depending on the action that follows.
pub fn build_router(app_state: AppState, allowed_origins: &[String]) -> Router {
    Router::new()
        // Chat (agent runtime)
        .route(
            "/api/chat/{id}/create-session",
            post(routes::chat::create_session),
        )
        .route(
            "/api/chat/{id}/inject-agent-message",
            post(routes::chat::inject_agent_message),
        )
        .route(
            "/api/chat/{id}/{session_id}/send-message",
            post(routes::chat::send_message),
        )
        .route(
            "/api/chat/{id}/latest-session",
            get(routes::chat::latest_session),
        )
        .route("/api/chat/{id}/history", get(routes::chat::history))
        // Product cache tools
        .route(
            "/api/tools/{session_id}/products",
            post(routes::tools::cache_products).delete(routes::tools::end_session),
        )
        .route(
            "/api/tools/{session_id}/products/lookup",
            post(routes::tools::lookup_products),
        )
        // Agents
        .route("/api/agents", get(routes::agents::list_agents))
        .route("/api/agents/{name}", get(routes::agents::get_agent))
        .layer(cors_layer(allowed_origins))
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Start the backend on a pre-bound listener, so the caller can report the
/// actual port (e.g. when binding port 0).
pub async fn serve_on(config: ShopperConfig, listener: tokio::net::TcpListener) -> anyhow::Result<()> {
    let app_state = AppState::from_config(&config)?;
    let app = build_router(app_state, &config.server.allowed_origins);

    let port = listener.local_addr()?.port();
    tracing::info!(
        origins = ?config.server.allowed_origins,
        "shopper backend listening on http://localhost:{port}"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
