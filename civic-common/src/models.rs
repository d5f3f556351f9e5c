//! Closed domain enums
//!
//! Every value the database stores as a string has exactly one variant here,
//! with an explicit mapping to and from its external string form. Unknown
//! strings are rejected rather than coerced.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status of an issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueStatus {
    #[serde(rename = "Open")]
    Open,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Resolved")]
    Resolved,
    #[serde(rename = "Closed")]
    Closed,
}

impl IssueStatus {
    pub const ALL: [IssueStatus; 4] = [
        IssueStatus::Open,
        IssueStatus::InProgress,
        IssueStatus::Resolved,
        IssueStatus::Closed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueStatus::Open => "Open",
            IssueStatus::InProgress => "In Progress",
            IssueStatus::Resolved => "Resolved",
            IssueStatus::Closed => "Closed",
        }
    }
}

impl FromStr for IssueStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        IssueStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "Invalid status '{}'. Must be one of: Open, In Progress, Resolved, Closed",
                    s
                ))
            })
    }
}

impl fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Municipal department an issue is routed to
///
/// The external forms are the short codes the municipal bodies use
/// (`kseb` for the power board, `pwd` for public works).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Department {
    Municipality,
    WaterAuthority,
    #[serde(rename = "kseb")]
    PowerBoard,
    #[serde(rename = "pwd")]
    PublicWorks,
    Other,
}

impl Department {
    pub const ALL: [Department; 5] = [
        Department::Municipality,
        Department::WaterAuthority,
        Department::PowerBoard,
        Department::PublicWorks,
        Department::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Department::Municipality => "municipality",
            Department::WaterAuthority => "water_authority",
            Department::PowerBoard => "kseb",
            Department::PublicWorks => "pwd",
            Department::Other => "other",
        }
    }
}

impl FromStr for Department {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Department::ALL
            .into_iter()
            .find(|dept| dept.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown department '{}'", s)))
    }
}

impl fmt::Display for Department {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Direction of a citizen vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteType {
    Upvote,
    Downvote,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteType::Upvote => "upvote",
            VoteType::Downvote => "downvote",
        }
    }
}

impl FromStr for VoteType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "upvote" => Ok(VoteType::Upvote),
            "downvote" => Ok(VoteType::Downvote),
            other => Err(Error::InvalidInput(format!(
                "vote_type must be 'upvote' or 'downvote', got '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for VoteType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of citizen notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    IssueCreated,
    StatusUpdated,
    IssueResolved,
    DuplicateDetected,
    IssueAssigned,
}

impl NotificationType {
    pub const ALL: [NotificationType; 5] = [
        NotificationType::IssueCreated,
        NotificationType::StatusUpdated,
        NotificationType::IssueResolved,
        NotificationType::DuplicateDetected,
        NotificationType::IssueAssigned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::IssueCreated => "issue_created",
            NotificationType::StatusUpdated => "status_updated",
            NotificationType::IssueResolved => "issue_resolved",
            NotificationType::DuplicateDetected => "duplicate_detected",
            NotificationType::IssueAssigned => "issue_assigned",
        }
    }
}

impl FromStr for NotificationType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        NotificationType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown notification type '{}'", s)))
    }
}

impl fmt::Display for NotificationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
