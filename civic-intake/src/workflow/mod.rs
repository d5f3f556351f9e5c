//! Issue intake workflow
//!
//! Orchestrates one submission through its stages:
//!
//! ```text
//! Received → ImageStored → EmbeddedCaptioned → DuplicateChecked
//!          → Routed → Persisted → Indexed → Notified
//! ```
//!
//! Only input validation and image storage can fail a submission. Every
//! later degraded step (captioner, embedder, index, notifications) is logged
//! and skipped.
//!
//! The same pipeline owns the mutations that feed derived state: status
//! changes, department reassignment, votes. Comment and notification
//! queries sit alongside as thin repository wrappers.

pub mod engagement;
pub mod pipeline;
pub mod triage;

pub use pipeline::{Collaborators, IssueIngestionPipeline};

use crate::db::Issue;
use crate::types::{DuplicateVerdict, IssueId};
use civic_common::{Error, Result, VoteType};
use serde::Serialize;
use std::fmt;

/// Stages of one submission, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SubmissionStage {
    Received,
    ImageStored,
    EmbeddedCaptioned,
    DuplicateChecked,
    Routed,
    Persisted,
    Indexed,
    Notified,
}

impl fmt::Display for SubmissionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SubmissionStage::Received => "received",
            SubmissionStage::ImageStored => "image_stored",
            SubmissionStage::EmbeddedCaptioned => "embedded_captioned",
            SubmissionStage::DuplicateChecked => "duplicate_checked",
            SubmissionStage::Routed => "routed",
            SubmissionStage::Persisted => "persisted",
            SubmissionStage::Indexed => "indexed",
            SubmissionStage::Notified => "notified",
        };
        f.write_str(name)
    }
}

/// A citizen's report as received
#[derive(Debug, Clone)]
pub struct NewSubmission {
    pub title: Option<String>,
    pub description: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub image: Vec<u8>,
    pub content_type: Option<String>,
}

/// Result returned to the submitter
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionOutcome {
    pub issue: Issue,
    pub duplicate: DuplicateVerdict,
    /// Nearby issues that were not judged duplicates
    pub nearby_issue_ids: Vec<IssueId>,
    /// Tracking token; only the submitter ever receives it
    pub citizen_token: String,
}

/// Vote totals for an issue, plus the caller's own vote
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoteStatus {
    pub issue_id: IssueId,
    pub upvote_count: i64,
    pub priority_score: i64,
    pub user_vote: Option<VoteType>,
}

/// An issue and its visual similarity to the queried one
#[derive(Debug, Clone, Serialize)]
pub struct SimilarIssue {
    pub issue: Issue,
    pub similarity: f32,
}

/// Minimum citizen token length accepted on token-scoped operations
pub const MIN_TOKEN_LENGTH: usize = 10;

pub(crate) fn validate_citizen_token(token: &str) -> Result<&str> {
    let token = token.trim();
    if token.len() < MIN_TOKEN_LENGTH {
        return Err(Error::InvalidInput(format!(
            "citizen token must be at least {} characters",
            MIN_TOKEN_LENGTH
        )));
    }
    Ok(token)
}

/// Clamp an optional page size into `1..=max`
pub(crate) fn page_limit(requested: Option<i64>, default: i64, max: i64) -> Result<i64> {
    match requested {
        None => Ok(default),
        Some(limit) if (1..=max).contains(&limit) => Ok(limit),
        Some(limit) => Err(Error::InvalidInput(format!(
            "limit must be between 1 and {}, got {}",
            max, limit
        ))),
    }
}
