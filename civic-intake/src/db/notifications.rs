//! Notification database operations
//!
//! Rows are addressed to a citizen token; every query is scoped to one token.

use crate::types::IssueId;
use chrono::{DateTime, Utc};
use civic_common::time::{parse_timestamp, to_db_string};
use civic_common::{Error, NotificationType, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub id: i64,
    pub issue_id: IssueId,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationCounts {
    pub total: i64,
    pub unread: i64,
}

pub async fn insert_notification(
    pool: &SqlitePool,
    issue_id: IssueId,
    citizen_token: Option<&str>,
    kind: NotificationType,
    message: &str,
    now: &DateTime<Utc>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO notifications (issue_id, type, message, is_read, citizen_token, created_at)
        VALUES (?, ?, ?, 0, ?, ?)
        "#,
    )
    .bind(issue_id)
    .bind(kind.as_str())
    .bind(message)
    .bind(citizen_token)
    .bind(to_db_string(now))
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

/// Newest-first notifications for a token
pub async fn list_for_token(
    pool: &SqlitePool,
    citizen_token: &str,
    limit: i64,
) -> Result<Vec<Notification>> {
    let rows = sqlx::query(
        r#"
        SELECT id, issue_id, type, message, is_read, created_at
        FROM notifications
        WHERE citizen_token = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ?
        "#,
    )
    .bind(citizen_token)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    rows.iter().map(notification_from_row).collect()
}

pub async fn counts_for_token(pool: &SqlitePool, citizen_token: &str) -> Result<NotificationCounts> {
    let (total, unread): (i64, Option<i64>) = sqlx::query_as(
        "SELECT COUNT(*), SUM(CASE WHEN is_read = 0 THEN 1 ELSE 0 END) FROM notifications WHERE citizen_token = ?",
    )
    .bind(citizen_token)
    .fetch_one(pool)
    .await?;

    Ok(NotificationCounts {
        total,
        unread: unread.unwrap_or(0),
    })
}

/// Owner token of a notification; `None` when the row does not exist
pub async fn owner_of(pool: &SqlitePool, notification_id: i64) -> Result<Option<Option<String>>> {
    let owner: Option<Option<String>> =
        sqlx::query_scalar("SELECT citizen_token FROM notifications WHERE id = ?")
            .bind(notification_id)
            .fetch_optional(pool)
            .await?;
    Ok(owner)
}

pub async fn mark_read(pool: &SqlitePool, notification_id: i64) -> Result<()> {
    sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?")
        .bind(notification_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Mark every unread notification of a token as read; returns how many changed
pub async fn mark_all_read(pool: &SqlitePool, citizen_token: &str) -> Result<u64> {
    let result =
        sqlx::query("UPDATE notifications SET is_read = 1 WHERE citizen_token = ? AND is_read = 0")
            .bind(citizen_token)
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

fn notification_from_row(row: &SqliteRow) -> Result<Notification> {
    let kind: String = row.try_get("type")?;
    let created_at: String = row.try_get("created_at")?;
    let created_at = parse_timestamp(&created_at)
        .ok_or_else(|| Error::Internal(format!("Unparsable created_at '{}'", created_at)))?;

    Ok(Notification {
        id: row.try_get("id")?,
        issue_id: row.try_get("issue_id")?,
        kind: kind
            .parse()
            .map_err(|e| Error::Internal(format!("Corrupt notification row: {}", e)))?,
        message: row.try_get("message")?,
        is_read: row.try_get("is_read")?,
        created_at,
    })
}
