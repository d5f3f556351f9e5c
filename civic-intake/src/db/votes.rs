//! Vote database operations
//!
//! One row per (issue, citizen token). Callers run these inside the
//! transaction that also rewrites the issue's vote totals.

use crate::types::IssueId;
use chrono::{DateTime, Utc};
use civic_common::time::to_db_string;
use civic_common::{Result, VoteType};
use sqlx::{Executor, Sqlite, SqliteConnection};

/// Insert the citizen's vote, or overwrite its type if one exists
pub async fn upsert_vote(
    conn: &mut SqliteConnection,
    issue_id: IssueId,
    citizen_token: &str,
    vote_type: VoteType,
    now: &DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO votes (issue_id, citizen_token, vote_type, created_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(issue_id, citizen_token) DO UPDATE SET
            vote_type = excluded.vote_type
        "#,
    )
    .bind(issue_id)
    .bind(citizen_token)
    .bind(vote_type.as_str())
    .bind(to_db_string(now))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Delete the citizen's vote; returns whether a row existed
pub async fn delete_vote(
    conn: &mut SqliteConnection,
    issue_id: IssueId,
    citizen_token: &str,
) -> Result<bool> {
    let result = sqlx::query("DELETE FROM votes WHERE issue_id = ? AND citizen_token = ?")
        .bind(issue_id)
        .bind(citizen_token)
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn count_upvotes<'e, E>(executor: E, issue_id: IssueId) -> Result<i64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM votes WHERE issue_id = ? AND vote_type = 'upvote'")
            .bind(issue_id)
            .fetch_one(executor)
            .await?;

    Ok(count)
}

/// The citizen's current vote on an issue, if any
pub async fn get_vote<'e, E>(
    executor: E,
    issue_id: IssueId,
    citizen_token: &str,
) -> Result<Option<VoteType>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let vote: Option<String> =
        sqlx::query_scalar("SELECT vote_type FROM votes WHERE issue_id = ? AND citizen_token = ?")
            .bind(issue_id)
            .bind(citizen_token)
            .fetch_optional(executor)
            .await?;

    vote.map(|v| v.parse()).transpose()
}
