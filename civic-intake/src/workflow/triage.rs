//! Staff triage: status changes, department reassignment, listings and
//! visual similarity lookups

use super::{page_limit, IssueIngestionPipeline, SimilarIssue};
use crate::db::issues::{self, Issue, IssueFilter};
use crate::index::{IndexError, VisualMatch};
use crate::services::priority;
use crate::types::{Actor, IssueId};
use civic_common::time::now;
use civic_common::{Department, Error, IssueStatus, NotificationType, Result};
use std::sync::Arc;
use tracing::{info, warn};

const DEFAULT_LIST_LIMIT: i64 = 100;
const MAX_LIST_LIMIT: i64 = 100;
const DEFAULT_SIMILAR_LIMIT: usize = 5;
const MAX_SIMILAR_LIMIT: usize = 50;

impl IssueIngestionPipeline {
    pub async fn get_issue(&self, issue_id: IssueId) -> Result<Issue> {
        issues::require_issue(&self.db, issue_id).await
    }

    /// Change an issue's status and recompute its priority in one transaction
    pub async fn update_status(
        &self,
        actor: &Actor,
        issue_id: IssueId,
        status: IssueStatus,
    ) -> Result<Issue> {
        let mut tx = self.db.begin().await?;
        issues::lock_issue(&mut tx, issue_id).await?;
        let issue = issues::require_issue(&mut *tx, issue_id).await?;

        if !actor.can_update_status(issue.department) {
            return Err(Error::Unauthorized(format!(
                "Not allowed to update issues of department {}",
                issue.department
            )));
        }

        let timestamp = now();
        let score = priority::score(status, issue.upvote_count, &issue.created_at, &timestamp);
        issues::update_status(&mut tx, issue_id, status, score, &timestamp).await?;
        tx.commit().await?;

        info!(
            issue_id,
            from = %issue.status,
            to = %status,
            priority_score = score,
            "Issue status updated"
        );

        if status != issue.status {
            let (kind, message) = if status == IssueStatus::Resolved {
                (
                    NotificationType::IssueResolved,
                    format!("Great news! Your issue #{} has been marked as Resolved.", issue_id),
                )
            } else {
                (
                    NotificationType::StatusUpdated,
                    format!("Your issue #{} status changed to {}.", issue_id, status),
                )
            };
            self.notify(issue_id, Some(issue.citizen_token.clone()), kind, message)
                .await;
        }

        issues::require_issue(&self.db, issue_id).await
    }

    /// Move an issue to another department (super admin only)
    pub async fn reassign_department(
        &self,
        actor: &Actor,
        issue_id: IssueId,
        department: Department,
    ) -> Result<Issue> {
        if !actor.can_reassign() {
            return Err(Error::Unauthorized(
                "Only super admins may reassign departments".to_string(),
            ));
        }

        let mut tx = self.db.begin().await?;
        issues::lock_issue(&mut tx, issue_id).await?;
        let issue = issues::require_issue(&mut *tx, issue_id).await?;
        issues::update_department(&mut tx, issue_id, department, &now()).await?;
        tx.commit().await?;

        info!(
            issue_id,
            from = %issue.department,
            to = %department,
            "Issue reassigned"
        );

        if department != issue.department {
            self.notify(
                issue_id,
                Some(issue.citizen_token.clone()),
                NotificationType::IssueAssigned,
                format!("Your issue #{} has been assigned to {}.", issue_id, department),
            )
            .await;
        }

        issues::require_issue(&self.db, issue_id).await
    }

    /// Newest-first listing scoped to what the caller may see
    ///
    /// `None` is the public listing. Officials only see their own department;
    /// asking for another one is rejected rather than silently narrowed.
    pub async fn list_issues(
        &self,
        actor: Option<&Actor>,
        department: Option<Department>,
        status: Option<IssueStatus>,
        limit: Option<i64>,
        offset: Option<i64>,
    ) -> Result<Vec<Issue>> {
        let department = match actor {
            Some(Actor::Official { department: own }) => match department {
                Some(requested) if requested != *own => {
                    return Err(Error::Unauthorized(format!(
                        "Officials of {} cannot list {} issues",
                        own, requested
                    )));
                }
                _ => Some(*own),
            },
            _ => department,
        };

        let offset = offset.unwrap_or(0);
        if offset < 0 {
            return Err(Error::InvalidInput("offset must not be negative".to_string()));
        }

        let filter = IssueFilter {
            department,
            status,
            limit: page_limit(limit, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT)?,
            offset,
        };
        issues::list_issues(&self.db, &filter).await
    }

    /// Issues visually similar to an existing one, best first
    ///
    /// Uses the issue's own indexed embedding. An issue without one has no
    /// similar issues.
    pub async fn find_similar(
        &self,
        issue_id: IssueId,
        threshold: Option<f32>,
        limit: Option<usize>,
    ) -> Result<Vec<SimilarIssue>> {
        issues::require_issue(&self.db, issue_id).await?;

        let threshold = threshold.unwrap_or(self.settings.similar_default_threshold);
        if !threshold.is_finite() || !(-1.0..=1.0).contains(&threshold) {
            return Err(Error::InvalidInput(format!(
                "threshold must be within [-1, 1], got {}",
                threshold
            )));
        }
        let limit = match limit {
            None => DEFAULT_SIMILAR_LIMIT,
            Some(l) if (1..=MAX_SIMILAR_LIMIT).contains(&l) => l,
            Some(l) => {
                return Err(Error::InvalidInput(format!(
                    "limit must be between 1 and {}, got {}",
                    MAX_SIMILAR_LIMIT, l
                )))
            }
        };

        let index = Arc::clone(&self.visual_index);
        let matches = tokio::task::spawn_blocking(move || -> std::result::Result<Vec<VisualMatch>, IndexError> {
            let Some(embedding) = index.embedding_of(issue_id)? else {
                return Ok(Vec::new());
            };
            // One extra slot for the issue itself
            index.search(Some(&embedding), limit + 1, threshold)
        })
        .await
        .map_err(|e| Error::Internal(format!("Similarity task failed: {}", e)))?
        .map_err(|e| Error::Internal(format!("Visual index error: {}", e)))?;

        let mut similar = Vec::new();
        for m in matches.into_iter().filter(|m| m.issue_id != issue_id).take(limit) {
            match issues::get_issue(&self.db, m.issue_id).await? {
                Some(issue) => similar.push(SimilarIssue {
                    issue,
                    similarity: m.score,
                }),
                None => warn!(issue_id = m.issue_id, "Indexed issue missing from database"),
            }
        }
        Ok(similar)
    }
}
