//! # Civic Common Library
//!
//! Shared code for the civic issue services:
//! - Error type
//! - Bootstrap configuration loading and root folder resolution
//! - Database initialization and closed domain enums
//! - Timestamp helpers

pub mod config;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod models;
pub mod time;

pub use error::{Error, Result};
pub use models::{Department, IssueStatus, NotificationType, VoteType};
