//! Issue Ingestion Pipeline
//!
//! # Stages
//! - **Received**: validate coordinate and image (fatal on failure)
//! - **ImageStored**: upload the image (fatal on failure, nothing written)
//! - **EmbeddedCaptioned**: embedding and caption in parallel (degrade)
//! - **DuplicateChecked**: visual and spatial search in parallel, then fuse
//! - **Routed**: tags → department
//! - **Persisted**: one issue row
//! - **Indexed**: embedding appended to the visual index (skipped when absent)
//! - **Notified**: creation and duplicate notices (failures logged)

use super::{NewSubmission, SubmissionOutcome, SubmissionStage};
use crate::config::IntakeSettings;
use crate::db::issues::{self, NewIssue};
use crate::fusion::DuplicateResolver;
use crate::index::{VisualIndex, VisualMatch};
use crate::services::{priority, routing};
use crate::spatial::SpatialIndex;
use crate::types::{
    Captioner, Coordinate, Embedding, EmbeddingExtractor, ImageStore, IssueId, NotificationSink,
    OutgoingNotification,
};
use civic_common::time::now;
use civic_common::{Error, IssueStatus, NotificationType, Result};
use sqlx::SqlitePool;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// External collaborators, constructed once at startup
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn EmbeddingExtractor>,
    pub captioner: Arc<dyn Captioner>,
    pub image_store: Arc<dyn ImageStore>,
    pub notifier: Arc<dyn NotificationSink>,
}

/// Submission pipeline and the mutations of derived issue state
pub struct IssueIngestionPipeline {
    pub(super) db: SqlitePool,
    pub(super) visual_index: Arc<VisualIndex>,
    pub(super) spatial_index: Arc<dyn SpatialIndex>,
    resolver: DuplicateResolver,
    collaborators: Collaborators,
    pub(super) settings: IntakeSettings,
}

impl IssueIngestionPipeline {
    pub fn new(
        db: SqlitePool,
        visual_index: Arc<VisualIndex>,
        spatial_index: Arc<dyn SpatialIndex>,
        collaborators: Collaborators,
        settings: IntakeSettings,
    ) -> Self {
        Self {
            db,
            visual_index,
            spatial_index,
            resolver: DuplicateResolver::new(),
            collaborators,
            settings,
        }
    }

    pub fn db(&self) -> &SqlitePool {
        &self.db
    }

    pub fn visual_index(&self) -> &Arc<VisualIndex> {
        &self.visual_index
    }

    pub fn settings(&self) -> &IntakeSettings {
        &self.settings
    }

    /// Run one submission through every stage
    pub async fn submit(&self, submission: NewSubmission) -> Result<SubmissionOutcome> {
        // Received
        let coordinate = Coordinate::new(submission.latitude, submission.longitude)?;
        if submission.image.is_empty() {
            return Err(Error::InvalidInput("image is required".to_string()));
        }
        let content_type = submission.content_type.as_deref();
        log_stage(SubmissionStage::Received, None);

        // ImageStored
        let image_url = self
            .collaborators
            .image_store
            .upload(&submission.image, content_type)
            .await
            .map_err(|e| {
                error!(error = %e, "Image upload failed; submission rejected");
                Error::Internal(format!("Image upload failed: {}", e))
            })?;
        log_stage(SubmissionStage::ImageStored, None);

        // EmbeddedCaptioned
        let (embedding, caption) = tokio::join!(
            self.collaborators.extractor.embed(&submission.image),
            self.collaborators
                .captioner
                .analyze(&submission.image, content_type),
        );
        if embedding.is_none() {
            warn!("No embedding for submission; visual duplicate check skipped");
        }
        log_stage(SubmissionStage::EmbeddedCaptioned, None);

        // DuplicateChecked
        let (visual_matches, spatial_ids) = tokio::join!(
            self.visual_candidates(embedding.as_ref()),
            self.spatial_candidates(coordinate),
        );
        let resolution = self.resolver.resolve(&visual_matches, &spatial_ids);
        log_stage(SubmissionStage::DuplicateChecked, None);

        // Routed
        let department = routing::assign_department(&caption.tags);
        log_stage(SubmissionStage::Routed, None);

        // Persisted
        let created_at = now();
        let citizen_token = Uuid::new_v4().simple().to_string();
        let title = non_blank(submission.title).or_else(|| {
            (!caption.is_unavailable()).then(|| caption.caption.clone())
        });
        let new_issue = NewIssue {
            title,
            description: non_blank(submission.description),
            image_url,
            caption: (!caption.is_unavailable()).then(|| caption.caption.clone()),
            tags: caption.tags.clone(),
            coordinate,
            department,
            priority_score: priority::score(IssueStatus::Open, 0, &created_at, &created_at),
            citizen_token: citizen_token.clone(),
            verdict: resolution.verdict,
            created_at,
        };
        let issue_id = issues::insert_issue(&self.db, &new_issue).await?;
        log_stage(SubmissionStage::Persisted, Some(issue_id));

        info!(
            issue_id,
            department = %department,
            duplicate = resolution.verdict.confidence.as_str(),
            matched_issue_id = ?resolution.verdict.matched_issue_id,
            "Issue created"
        );

        // Indexed
        if let Some(embedding) = embedding {
            self.index_embedding(embedding, issue_id).await;
            log_stage(SubmissionStage::Indexed, Some(issue_id));
        }

        // Notified
        self.notify(
            issue_id,
            Some(citizen_token.clone()),
            NotificationType::IssueCreated,
            format!(
                "Your issue #{} has been submitted and routed to {}.",
                issue_id, department
            ),
        )
        .await;
        if let Some(matched) = resolution.verdict.matched_issue_id {
            self.notify(
                issue_id,
                Some(citizen_token.clone()),
                NotificationType::DuplicateDetected,
                format!(
                    "Your issue #{} looks like a {} duplicate of issue #{}.",
                    issue_id,
                    resolution.verdict.confidence.as_str(),
                    matched
                ),
            )
            .await;
        }
        log_stage(SubmissionStage::Notified, Some(issue_id));

        let issue = issues::require_issue(&self.db, issue_id).await?;
        Ok(SubmissionOutcome {
            issue,
            duplicate: resolution.verdict,
            nearby_issue_ids: resolution.informational_neighbors,
            citizen_token,
        })
    }

    /// Visual duplicate candidates above the submission threshold
    async fn visual_candidates(&self, embedding: Option<&Embedding>) -> Vec<VisualMatch> {
        let Some(embedding) = embedding.cloned() else {
            return Vec::new();
        };
        let index = Arc::clone(&self.visual_index);
        let k = self.settings.duplicate_search_k;
        let threshold = self.settings.duplicate_similarity_threshold;

        let result = tokio::task::spawn_blocking(move || {
            index.search(Some(&embedding), k, threshold)
        })
        .await;

        match result {
            Ok(Ok(matches)) => matches,
            Ok(Err(e)) => {
                warn!(error = %e, "Visual search failed; continuing without visual matches");
                Vec::new()
            }
            Err(e) => {
                warn!(error = %e, "Visual search task failed");
                Vec::new()
            }
        }
    }

    /// Issue ids within the duplicate radius
    async fn spatial_candidates(&self, coordinate: Coordinate) -> Vec<IssueId> {
        match self
            .spatial_index
            .find_within(coordinate, self.settings.duplicate_radius_meters, None)
            .await
        {
            Ok(found) => found.into_iter().map(|issue| issue.id).collect(),
            Err(e) => {
                warn!(error = %e, "Spatial search failed; continuing without spatial matches");
                Vec::new()
            }
        }
    }

    async fn index_embedding(&self, embedding: Embedding, issue_id: IssueId) {
        let index = Arc::clone(&self.visual_index);
        let result =
            tokio::task::spawn_blocking(move || index.insert(Some(&embedding), issue_id)).await;

        match result {
            Ok(Ok(slot)) => debug!(issue_id, slot = ?slot, "Issue indexed"),
            Ok(Err(e)) => warn!(issue_id, error = %e, "Visual index insert failed"),
            Err(e) => warn!(issue_id, error = %e, "Visual index insert task failed"),
        }
    }

    /// Fire-and-forget notification
    pub(super) async fn notify(
        &self,
        issue_id: IssueId,
        citizen_token: Option<String>,
        kind: NotificationType,
        message: String,
    ) {
        let notification = OutgoingNotification {
            issue_id,
            citizen_token,
            kind,
            message,
        };
        if let Err(e) = self.collaborators.notifier.send(notification).await {
            warn!(issue_id, kind = %kind, error = %e, "Notification delivery failed");
        }
    }
}

fn log_stage(stage: SubmissionStage, issue_id: Option<IssueId>) {
    debug!(stage = %stage, issue_id = ?issue_id, "Submission stage committed");
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
