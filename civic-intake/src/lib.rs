//! civic-intake library interface
//!
//! Civic issue intake: duplicate detection (visual + spatial), department
//! routing, priority scoring and the submission pipeline, exposed over a thin
//! HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod fusion;
pub mod index;
pub mod services;
pub mod spatial;
pub mod types;
pub mod workflow;

pub use crate::error::{ApiError, ApiResult};
pub use crate::workflow::IssueIngestionPipeline;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

/// Largest accepted request body (base64 images)
const MAX_BODY_BYTES: usize = 16 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<IssueIngestionPipeline>,
    /// Secret the gateway presents with staff identity headers
    pub staff_secret: Option<String>,
    /// Directory served under `/uploads`
    pub uploads_dir: Option<PathBuf>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(pipeline: Arc<IssueIngestionPipeline>, staff_secret: Option<String>) -> Self {
        Self {
            pipeline,
            staff_secret: staff_secret.filter(|s| !s.trim().is_empty()),
            uploads_dir: None,
            startup_time: Utc::now(),
        }
    }

    pub fn with_uploads_dir(mut self, dir: PathBuf) -> Self {
        self.uploads_dir = Some(dir);
        self
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    let mut router = Router::new()
        .merge(api::health_routes())
        .merge(api::issue_routes())
        .merge(api::engagement_routes())
        .merge(api::notification_routes());

    if let Some(dir) = &state.uploads_dir {
        router = router.nest_service("/uploads", ServeDir::new(dir));
    }

    router
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
