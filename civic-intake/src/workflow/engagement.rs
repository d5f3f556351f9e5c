//! Citizen engagement: votes, comments and notification inbox
//!
//! Every vote mutation rewrites the vote row, the recounted upvote total and
//! the priority score in one transaction.

use super::{page_limit, validate_citizen_token, IssueIngestionPipeline, VoteStatus};
use crate::db::comments::{self, Comment};
use crate::db::notifications::{self, Notification, NotificationCounts};
use crate::db::{issues, votes};
use crate::services::priority;
use crate::types::IssueId;
use civic_common::time::now;
use civic_common::{Error, Result, VoteType};
use sqlx::SqliteConnection;
use tracing::{debug, info};

const MAX_COMMENT_CHARS: usize = 1000;
const DEFAULT_COMMENT_LIMIT: i64 = 50;
const MAX_COMMENT_LIMIT: i64 = 100;
const DEFAULT_NOTIFICATION_LIMIT: i64 = 50;
const MAX_NOTIFICATION_LIMIT: i64 = 100;

impl IssueIngestionPipeline {
    // ========================================================================
    // Votes
    // ========================================================================

    /// Cast or change the citizen's vote
    pub async fn cast_vote(
        &self,
        issue_id: IssueId,
        citizen_token: &str,
        vote_type: VoteType,
    ) -> Result<VoteStatus> {
        let token = validate_citizen_token(citizen_token)?;

        let mut tx = self.db.begin().await?;
        issues::lock_issue(&mut tx, issue_id).await?;
        votes::upsert_vote(&mut tx, issue_id, token, vote_type, &now()).await?;
        let status = recompute_vote_totals(&mut tx, issue_id).await?;
        tx.commit().await?;

        info!(
            issue_id,
            vote = %vote_type,
            upvotes = status.upvote_count,
            priority_score = status.priority_score,
            "Vote recorded"
        );
        Ok(VoteStatus {
            user_vote: Some(vote_type),
            ..status
        })
    }

    /// Withdraw the citizen's vote; `NotFound` if there is none
    pub async fn remove_vote(&self, issue_id: IssueId, citizen_token: &str) -> Result<VoteStatus> {
        let token = validate_citizen_token(citizen_token)?;

        let mut tx = self.db.begin().await?;
        issues::lock_issue(&mut tx, issue_id).await?;
        if !votes::delete_vote(&mut tx, issue_id, token).await? {
            return Err(Error::NotFound(format!(
                "No vote on issue {} for this token",
                issue_id
            )));
        }
        let status = recompute_vote_totals(&mut tx, issue_id).await?;
        tx.commit().await?;

        info!(issue_id, upvotes = status.upvote_count, "Vote removed");
        Ok(status)
    }

    /// Current totals, plus the caller's own vote when a token is given
    pub async fn vote_status(
        &self,
        issue_id: IssueId,
        citizen_token: Option<&str>,
    ) -> Result<VoteStatus> {
        let issue = issues::require_issue(&self.db, issue_id).await?;
        let user_vote = match citizen_token {
            Some(token) => {
                let token = validate_citizen_token(token)?;
                votes::get_vote(&self.db, issue_id, token).await?
            }
            None => None,
        };

        Ok(VoteStatus {
            issue_id,
            upvote_count: issue.upvote_count,
            priority_score: issue.priority_score,
            user_vote,
        })
    }

    // ========================================================================
    // Comments
    // ========================================================================

    pub async fn add_comment(
        &self,
        issue_id: IssueId,
        citizen_token: &str,
        text: &str,
    ) -> Result<Comment> {
        let token = validate_citizen_token(citizen_token)?;
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::InvalidInput("comment must not be empty".to_string()));
        }
        if text.chars().count() > MAX_COMMENT_CHARS {
            return Err(Error::InvalidInput(format!(
                "comment must be at most {} characters",
                MAX_COMMENT_CHARS
            )));
        }

        issues::require_issue(&self.db, issue_id).await?;
        let comment = comments::insert_comment(&self.db, issue_id, token, text, &now()).await?;
        debug!(issue_id, comment_id = comment.id, "Comment added");
        Ok(comment)
    }

    pub async fn list_comments(
        &self,
        issue_id: IssueId,
        skip: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Vec<Comment>> {
        let skip = skip.unwrap_or(0);
        if skip < 0 {
            return Err(Error::InvalidInput("skip must not be negative".to_string()));
        }
        let limit = page_limit(limit, DEFAULT_COMMENT_LIMIT, MAX_COMMENT_LIMIT)?;

        issues::require_issue(&self.db, issue_id).await?;
        comments::list_comments(&self.db, issue_id, skip, limit).await
    }

    /// Delete a comment; only its author may
    pub async fn delete_comment(
        &self,
        issue_id: IssueId,
        comment_id: i64,
        citizen_token: &str,
    ) -> Result<()> {
        let token = validate_citizen_token(citizen_token)?;

        let comment = comments::get_comment(&self.db, comment_id)
            .await?
            .filter(|c| c.issue_id == issue_id)
            .ok_or_else(|| Error::NotFound(format!("Comment {} not found", comment_id)))?;

        if comment.citizen_token != token {
            return Err(Error::Unauthorized(
                "Only the author may delete a comment".to_string(),
            ));
        }

        comments::delete_comment(&self.db, comment_id).await?;
        debug!(issue_id, comment_id, "Comment deleted");
        Ok(())
    }

    // ========================================================================
    // Notifications
    // ========================================================================

    pub async fn list_notifications(
        &self,
        citizen_token: &str,
        limit: Option<i64>,
    ) -> Result<Vec<Notification>> {
        let token = validate_citizen_token(citizen_token)?;
        let limit = page_limit(limit, DEFAULT_NOTIFICATION_LIMIT, MAX_NOTIFICATION_LIMIT)?;
        notifications::list_for_token(&self.db, token, limit).await
    }

    pub async fn notification_counts(&self, citizen_token: &str) -> Result<NotificationCounts> {
        let token = validate_citizen_token(citizen_token)?;
        notifications::counts_for_token(&self.db, token).await
    }

    /// Mark one notification read; it must belong to the token
    pub async fn mark_notification_read(
        &self,
        notification_id: i64,
        citizen_token: &str,
    ) -> Result<()> {
        let token = validate_citizen_token(citizen_token)?;

        match notifications::owner_of(&self.db, notification_id).await? {
            None => Err(Error::NotFound(format!(
                "Notification {} not found",
                notification_id
            ))),
            Some(owner) if owner.as_deref() != Some(token) => Err(Error::Unauthorized(
                "Notification belongs to another token".to_string(),
            )),
            Some(_) => notifications::mark_read(&self.db, notification_id).await,
        }
    }

    /// Mark every notification of the token read; returns how many changed
    pub async fn mark_all_notifications_read(&self, citizen_token: &str) -> Result<u64> {
        let token = validate_citizen_token(citizen_token)?;
        notifications::mark_all_read(&self.db, token).await
    }
}

/// Recount upvotes and rewrite the issue's totals inside the caller's transaction
async fn recompute_vote_totals(conn: &mut SqliteConnection, issue_id: IssueId) -> Result<VoteStatus> {
    let issue = issues::require_issue(&mut *conn, issue_id).await?;
    let upvote_count = votes::count_upvotes(&mut *conn, issue_id).await?;
    let priority_score = priority::score(issue.status, upvote_count, &issue.created_at, &now());
    issues::update_vote_totals(conn, issue_id, upvote_count, priority_score).await?;

    Ok(VoteStatus {
        issue_id,
        upvote_count,
        priority_score,
        user_vote: None,
    })
}
