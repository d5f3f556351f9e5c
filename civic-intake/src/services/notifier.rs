//! Notification delivery
//!
//! Notifications are recorded in the `notifications` table, where citizens
//! poll for them with their tracking token.

use crate::db::notifications;
use crate::types::{CollaboratorError, NotificationSink, OutgoingNotification};
use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::info;

/// [`NotificationSink`] backed by the notifications table
pub struct DbNotificationSink {
    db: SqlitePool,
}

impl DbNotificationSink {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl NotificationSink for DbNotificationSink {
    async fn send(&self, notification: OutgoingNotification) -> Result<(), CollaboratorError> {
        let id = notifications::insert_notification(
            &self.db,
            notification.issue_id,
            notification.citizen_token.as_deref(),
            notification.kind,
            &notification.message,
            &civic_common::time::now(),
        )
        .await?;

        info!(
            notification_id = id,
            issue_id = notification.issue_id,
            kind = %notification.kind,
            "Notification recorded"
        );
        Ok(())
    }
}
