//! SQLite repositories
//!
//! Free functions over a `SqlitePool` (or an open transaction) per table.
//! Schema creation lives in `civic_common::db`.

pub mod comments;
pub mod issues;
pub mod notifications;
pub mod settings;
pub mod votes;

pub use comments::Comment;
pub use issues::{Issue, IssueFilter, NewIssue};
pub use notifications::{Notification, NotificationCounts};
