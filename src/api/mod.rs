//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All business endpoints are mounted under `/api/v1`; `/health` and the
//! event stream at `/ws` sit at the root.

pub mod api_docs;
pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::app_state::AppState;
use crate::ws::handler::ws_handler;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// Builds the full application: REST, WebSocket, OpenAPI document and the
/// tracing and CORS layers, bound to `state`.
pub fn app(state: AppState) -> Router {
    let router = Router::new()
        .merge(build_router())
        .route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", <api_docs::ApiDoc as utoipa::OpenApi>::openapi()),
    );

    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(<api_docs::ApiDoc as utoipa::OpenApi>::openapi()) }),
    );

    router
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
