//! Duplicate Resolver
//!
//! Fuses the visual and spatial signals for a new submission into a
//! [`DuplicateVerdict`].
//!
//! # Policy
//! Evaluated in order, first match wins:
//! 1. Top visual match also among the spatial matches → **definite**
//! 2. Any visual match → **possible** (top visual match)
//! 3. Spatial matches only → **none**; neighbours reported as informational
//! 4. Nothing → **none**
//!
//! The verdict only annotates the new issue. Submission is never blocked.

use crate::index::VisualMatch;
use crate::types::{DuplicateConfidence, DuplicateVerdict, IssueId};
use tracing::{debug, info};

/// Verdict plus spatial neighbours that did not drive it
#[derive(Debug, Clone, PartialEq)]
pub struct DuplicateResolution {
    pub verdict: DuplicateVerdict,
    /// Nearby issues reported alongside a `none` verdict
    pub informational_neighbors: Vec<IssueId>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DuplicateResolver;

impl DuplicateResolver {
    pub fn new() -> Self {
        Self
    }

    /// # Arguments
    /// * `visual_matches` - ordered best first, already thresholded
    /// * `spatial_matches` - issue ids within the duplicate radius
    pub fn resolve(
        &self,
        visual_matches: &[VisualMatch],
        spatial_matches: &[IssueId],
    ) -> DuplicateResolution {
        if let Some(top) = visual_matches.first() {
            let confidence = if spatial_matches.contains(&top.issue_id) {
                DuplicateConfidence::Definite
            } else {
                DuplicateConfidence::Possible
            };

            debug!(
                matched_issue_id = top.issue_id,
                score = top.score,
                spatial_agrees = confidence == DuplicateConfidence::Definite,
                "Duplicate verdict: {}",
                confidence.as_str()
            );

            return DuplicateResolution {
                verdict: DuplicateVerdict {
                    matched_issue_id: Some(top.issue_id),
                    confidence,
                },
                informational_neighbors: Vec::new(),
            };
        }

        if !spatial_matches.is_empty() {
            info!(
                neighbors = ?spatial_matches,
                "Nearby issues without a visual match; not treated as duplicates"
            );
        }

        DuplicateResolution {
            verdict: DuplicateVerdict::none(),
            informational_neighbors: spatial_matches.to_vec(),
        }
    }
}
