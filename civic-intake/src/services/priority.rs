//! Priority Scoring
//!
//! ```text
//! score = max(upvotes * 10 + status_bonus - min(age_days, 30), 0)
//! status_bonus: Open 50, In Progress 25, otherwise 0
//! ```
//!
//! Recomputed whenever votes or status change.

use chrono::{DateTime, Utc};
use civic_common::time::days_between;
use civic_common::IssueStatus;

const POINTS_PER_UPVOTE: i64 = 10;
const MAX_AGE_PENALTY_DAYS: i64 = 30;

fn status_bonus(status: IssueStatus) -> i64 {
    match status {
        IssueStatus::Open => 50,
        IssueStatus::InProgress => 25,
        IssueStatus::Resolved | IssueStatus::Closed => 0,
    }
}

/// Ranking score, never negative
///
/// A `created_at` in the future (clock skew) counts as age zero.
pub fn score(
    status: IssueStatus,
    upvote_count: i64,
    created_at: &DateTime<Utc>,
    now: &DateTime<Utc>,
) -> i64 {
    let age_penalty = days_between(created_at, now).clamp(0, MAX_AGE_PENALTY_DAYS);
    let base = upvote_count.max(0).saturating_mul(POINTS_PER_UPVOTE);
    base.saturating_add(status_bonus(status))
        .saturating_sub(age_penalty)
        .max(0)
}
