//! HTTP API handlers for civic-intake
//!
//! Thin wrappers: decode the request, call the pipeline, map errors.

pub mod actor;
pub mod engagement;
pub mod health;
pub mod issues;
pub mod notifications;

pub use engagement::engagement_routes;
pub use health::health_routes;
pub use issues::issue_routes;
pub use notifications::notification_routes;
