//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for the attachment lifecycle
//! - Authentication middleware
//! - JSON error responses

pub mod error;
pub mod middleware;
pub mod routes;

use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use ferry_core::attachment::AttachmentService;
use ferry_core::storage::StorageService;
use ferry_db::AttachmentRepository;
use ferry_shared::JwtService;

/// Attachment service wired to the production storage gateway and repository.
pub type Attachments = AttachmentService<StorageService, AttachmentRepository>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// JWT service for token validation.
    pub jwt_service: Arc<JwtService>,
    /// Attachment lifecycle service.
    pub attachments: Arc<Attachments>,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes_with_state(state.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
