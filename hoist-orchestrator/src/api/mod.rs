//! API Module
//!
//! HTTP API layer for the orchestrator.
//! Each submodule handles endpoints for a specific domain.

pub mod error;
pub mod health;
pub mod run;
pub mod webhook;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::service::run::RunService;

/// Create the main API router with all endpoints
pub fn create_router(service: Arc<RunService>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Triggers
        .route("/github-webhook/", post(webhook::github_webhook))
        .route("/deploy", post(run::trigger_deploy))
        // Run inspection
        .route("/run/list", get(run::list_runs))
        .route("/run/{id}", get(run::get_run))
        .route("/run/{id}/logs", get(run::get_run_logs))
        // Add state and middleware
        .with_state(service)
        .layer(TraceLayer::new_for_http())
}
