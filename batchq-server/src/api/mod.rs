//! API Module
//!
//! HTTP API layer of the queue server.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod job;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::service::JobService;

/// Create the main API router with all endpoints
pub fn create_router(service: Arc<JobService>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Queue endpoints
        .route("/submit", post(job::submit_job))
        .route("/status", get(job::get_status))
        .route("/queue-stats", get(job::queue_stats))
        .route("/process-next", post(job::process_next))
        .route("/cancel", post(job::cancel_job))
        // Add state and middleware
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}
