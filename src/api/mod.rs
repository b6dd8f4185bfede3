//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints are mounted under `/api/v1`. The OpenAPI document is served
//! at `/api-docs/openapi.json`, with Swagger UI at `/swagger-ui` when the
//! `swagger-ui` feature is enabled.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;
use openapi::ApiDoc;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    let router = Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes());
    with_docs(router)
}

#[cfg(feature = "swagger-ui")]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    )
}

#[cfg(not(feature = "swagger-ui"))]
fn with_docs(router: Router<AppState>) -> Router<AppState> {
    router.route(
        "/api-docs/openapi.json",
        axum::routing::get(|| async { axum::Json(ApiDoc::openapi()) }),
    )
}
