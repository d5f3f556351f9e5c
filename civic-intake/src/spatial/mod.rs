//! Spatial proximity queries over stored issues
//!
//! The store narrows candidates with an indexed latitude/longitude box; the
//! exact ellipsoidal distance then decides membership.

pub mod geodesic;

use crate::db::issues::{self, Issue};
use crate::types::{Coordinate, IssueId};
use async_trait::async_trait;
use civic_common::{Error, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// "All issues within R meters of P"
#[async_trait]
pub trait SpatialIndex: Send + Sync {
    /// Issues whose geodesic distance to `center` is at most `radius_meters`,
    /// nearest first, optionally excluding one issue
    async fn find_within(
        &self,
        center: Coordinate,
        radius_meters: f64,
        exclude: Option<IssueId>,
    ) -> Result<Vec<Issue>>;
}

/// [`SpatialIndex`] over the `issues` table
pub struct SqliteSpatialIndex {
    db: SqlitePool,
}

impl SqliteSpatialIndex {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SpatialIndex for SqliteSpatialIndex {
    async fn find_within(
        &self,
        center: Coordinate,
        radius_meters: f64,
        exclude: Option<IssueId>,
    ) -> Result<Vec<Issue>> {
        if !radius_meters.is_finite() || radius_meters < 0.0 {
            return Err(Error::InvalidInput(format!(
                "radius must be a non-negative number of meters, got {}",
                radius_meters
            )));
        }

        let (min_lat, max_lat, min_lon, max_lon) = geodesic::bounding_box(&center, radius_meters);
        let candidates =
            issues::list_in_bounding_box(&self.db, min_lat, max_lat, min_lon, max_lon, exclude)
                .await?;
        let candidate_count = candidates.len();

        let mut within: Vec<(f64, Issue)> = candidates
            .into_iter()
            .map(|issue| (geodesic::distance_meters(&center, &issue.coordinate()), issue))
            .filter(|(distance, _)| *distance <= radius_meters)
            .collect();
        within.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.id.cmp(&b.1.id)));

        debug!(
            latitude = center.latitude,
            longitude = center.longitude,
            radius_meters,
            candidates = candidate_count,
            matches = within.len(),
            "Spatial proximity query"
        );

        Ok(within.into_iter().map(|(_, issue)| issue).collect())
    }
}
