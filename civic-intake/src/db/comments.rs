//! Comment database operations

use crate::types::IssueId;
use chrono::{DateTime, Utc};
use civic_common::time::{parse_timestamp, to_db_string};
use civic_common::{Error, Result};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

/// Comment on an issue
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comment {
    pub id: i64,
    pub issue_id: IssueId,
    pub text: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing)]
    pub citizen_token: String,
}

pub async fn insert_comment(
    pool: &SqlitePool,
    issue_id: IssueId,
    citizen_token: &str,
    text: &str,
    now: &DateTime<Utc>,
) -> Result<Comment> {
    let result = sqlx::query(
        "INSERT INTO comments (issue_id, citizen_token, text, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(issue_id)
    .bind(citizen_token)
    .bind(text)
    .bind(to_db_string(now))
    .execute(pool)
    .await?;

    Ok(Comment {
        id: result.last_insert_rowid(),
        issue_id,
        text: text.to_string(),
        created_at: *now,
        citizen_token: citizen_token.to_string(),
    })
}

/// Newest-first page of an issue's comments
pub async fn list_comments(
    pool: &SqlitePool,
    issue_id: IssueId,
    skip: i64,
    limit: i64,
) -> Result<Vec<Comment>> {
    let rows = sqlx::query(
        r#"
        SELECT id, issue_id, citizen_token, text, created_at
        FROM comments
        WHERE issue_id = ?
        ORDER BY created_at DESC, id DESC
        LIMIT ? OFFSET ?
        "#,
    )
    .bind(issue_id)
    .bind(limit)
    .bind(skip)
    .fetch_all(pool)
    .await?;

    rows.iter().map(comment_from_row).collect()
}

pub async fn get_comment(pool: &SqlitePool, comment_id: i64) -> Result<Option<Comment>> {
    let row = sqlx::query(
        "SELECT id, issue_id, citizen_token, text, created_at FROM comments WHERE id = ?",
    )
    .bind(comment_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(comment_from_row).transpose()
}

pub async fn delete_comment(pool: &SqlitePool, comment_id: i64) -> Result<()> {
    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(comment_id)
        .execute(pool)
        .await?;
    Ok(())
}

fn comment_from_row(row: &SqliteRow) -> Result<Comment> {
    let created_at: String = row.try_get("created_at")?;
    let created_at = parse_timestamp(&created_at)
        .ok_or_else(|| Error::Internal(format!("Unparsable created_at '{}'", created_at)))?;

    Ok(Comment {
        id: row.try_get("id")?,
        issue_id: row.try_get("issue_id")?,
        text: row.try_get("text")?,
        created_at,
        citizen_token: row.try_get("citizen_token")?,
    })
}
