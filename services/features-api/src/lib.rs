//! Features API Service Library
//!
//! This crate provides the HTTP front service for the OS NGD Features API
//! request pipelines: one route per pipeline variant, the latest-collections
//! endpoints, and health/metrics.

pub mod handlers;
pub mod params;
pub mod state;

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use handlers::method_not_allowed;
use state::AppState;

/// Build the service router.
///
/// Every route answers non-GET methods with a 405 error record.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        // Latest collections
        .route(
            "/catalyst/features/latest-collections",
            get(handlers::collections::latest_collections_handler).fallback(method_not_allowed),
        )
        .route(
            "/catalyst/features/latest-collections/:collection",
            get(handlers::collections::latest_collection_handler).fallback(method_not_allowed),
        )
        // Multi-collection items
        .route(
            "/catalyst/features/multi-collection/items/:variant",
            get(handlers::items::multi_collection_handler).fallback(method_not_allowed),
        )
        // Single-collection items
        .route(
            "/catalyst/features/:collection/items",
            get(handlers::items::items_handler).fallback(method_not_allowed),
        )
        .route(
            "/catalyst/features/:collection/items/:variant",
            get(handlers::items::items_variant_handler).fallback(method_not_allowed),
        )
        // Health and metrics
        .route("/health", get(handlers::health::health_handler))
        .route("/metrics", get(handlers::health::metrics_handler))
        // Middleware
        .layer(Extension(state))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
