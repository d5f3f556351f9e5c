//! Core Types and Collaborator Traits
//!
//! Defines the value types that flow through the intake pipeline and the
//! narrow contracts of its external collaborators:
//! - **EmbeddingExtractor**: image bytes → normalized vector (or nothing)
//! - **Captioner**: image bytes → caption + classification tags (or safe default)
//! - **ImageStore**: image bytes → public URL (failure is fatal to a submission)
//! - **NotificationSink**: fire-and-forget citizen notifications
//!
//! Collaborators are constructed once at startup and injected into the
//! pipeline as trait objects.

use civic_common::{Department, Error, NotificationType, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

/// Issue identity as stored in the `issues` table
pub type IssueId = i64;

/// Dimension of image embeddings produced by the embedding model
pub const EMBEDDING_DIM: usize = 512;

// ============================================================================
// Embedding
// ============================================================================

/// L2-normalized image embedding
///
/// Normalized once at construction and immutable afterwards, so the inner
/// product of two embeddings is their cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    values: Vec<f32>,
}

impl Embedding {
    /// Normalize a raw model output.
    ///
    /// Returns `None` for empty vectors, non-finite components, or a zero
    /// norm; such output cannot be compared meaningfully.
    pub fn from_raw(mut values: Vec<f32>) -> Option<Self> {
        if values.is_empty() || values.iter().any(|v| !v.is_finite()) {
            return None;
        }

        let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return None;
        }

        for v in values.iter_mut() {
            *v /= norm;
        }
        Some(Self { values })
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// Inner product with another embedding (cosine similarity, in [-1, 1])
    pub fn similarity(&self, other: &Embedding) -> f32 {
        dot(&self.values, &other.values)
    }
}

/// Inner product of two equal-length slices
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

// ============================================================================
// Coordinate
// ============================================================================

/// WGS84 position in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Validated constructor: both components finite and within range
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(Error::InvalidInput(format!(
                "latitude must be within [-90, 90], got {}",
                latitude
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(Error::InvalidInput(format!(
                "longitude must be within [-180, 180], got {}",
                longitude
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

// ============================================================================
// Duplicate verdict
// ============================================================================

/// Strength of a duplicate verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateConfidence {
    /// Visual and spatial signals agree on the same issue
    Definite,
    /// Visual match only
    Possible,
    None,
}

impl DuplicateConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            DuplicateConfidence::Definite => "definite",
            DuplicateConfidence::Possible => "possible",
            DuplicateConfidence::None => "none",
        }
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value {
            "definite" => Ok(DuplicateConfidence::Definite),
            "possible" => Ok(DuplicateConfidence::Possible),
            "none" => Ok(DuplicateConfidence::None),
            other => Err(Error::Internal(format!(
                "Unknown duplicate confidence '{}' in database",
                other
            ))),
        }
    }
}

/// Duplicate annotation for a new submission (never blocks creation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateVerdict {
    pub matched_issue_id: Option<IssueId>,
    pub confidence: DuplicateConfidence,
}

impl DuplicateVerdict {
    pub fn none() -> Self {
        Self {
            matched_issue_id: None,
            confidence: DuplicateConfidence::None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        self.confidence != DuplicateConfidence::None
    }
}

// ============================================================================
// Actors
// ============================================================================

/// Who is performing an action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// Anonymous citizen identified by their tracking token
    Citizen { token: String },
    /// Department official; may act on their own department's issues only
    Official { department: Department },
    /// Unrestricted administrator
    SuperAdmin,
}

impl Actor {
    /// Whether this actor may change the status of an issue in `department`
    pub fn can_update_status(&self, department: Department) -> bool {
        match self {
            Actor::SuperAdmin => true,
            Actor::Official { department: own } => *own == department,
            Actor::Citizen { .. } => false,
        }
    }

    /// Only super admins may move issues between departments
    pub fn can_reassign(&self) -> bool {
        matches!(self, Actor::SuperAdmin)
    }
}

// ============================================================================
// Collaborators
// ============================================================================

/// Caption and classification tags for an image
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptionResult {
    pub caption: String,
    pub tags: Vec<String>,
}

impl CaptionResult {
    /// Placeholder caption used when the provider is unavailable
    pub const UNAVAILABLE: &'static str = "unavailable";

    /// Safe default returned when captioning fails
    pub fn unavailable() -> Self {
        Self {
            caption: Self::UNAVAILABLE.to_string(),
            tags: Vec::new(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.caption == Self::UNAVAILABLE && self.tags.is_empty()
    }
}

/// Notification handed to a [`NotificationSink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingNotification {
    pub issue_id: IssueId,
    pub citizen_token: Option<String>,
    pub kind: NotificationType,
    pub message: String,
}

/// Failure inside a collaborator client
///
/// Only [`ImageStore::upload`] surfaces this to the pipeline; the other
/// collaborators absorb it into their documented defaults.
#[derive(Debug, ThisError)]
pub enum CollaboratorError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Not configured: {0}")]
    NotConfigured(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Database error: {0}")]
    Database(#[from] civic_common::Error),
}

/// Turns an image into a normalized embedding
#[async_trait::async_trait]
pub trait EmbeddingExtractor: Send + Sync {
    /// Returns `None` on any decode or model failure; never errors
    async fn embed(&self, image: &[u8]) -> Option<Embedding>;
}

/// Captions an image and proposes classification tags
#[async_trait::async_trait]
pub trait Captioner: Send + Sync {
    /// Returns [`CaptionResult::unavailable`] on failure; never errors
    async fn analyze(&self, image: &[u8], content_type: Option<&str>) -> CaptionResult;
}

/// Durable image storage
#[async_trait::async_trait]
pub trait ImageStore: Send + Sync {
    /// Store the image and return its public URL
    async fn upload(
        &self,
        image: &[u8],
        content_type: Option<&str>,
    ) -> std::result::Result<String, CollaboratorError>;
}

/// Delivers citizen notifications
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    async fn send(
        &self,
        notification: OutgoingNotification,
    ) -> std::result::Result<(), CollaboratorError>;
}
