//! Visual Index
//!
//! Exhaustive inner-product search over L2-normalized image embeddings.
//!
//! # Concurrency
//! Vector rows and the slot → issue id array live in one struct behind one
//! `RwLock`. Inserts take the write lock for the paired append and the
//! snapshot flush; searches share the read lock, so a search can never
//! observe a half-applied insert.
//!
//! # Slots
//! Slots are assigned 0, 1, 2, … in insertion order and never reused.
//! There is no removal.
//!
//! # Persistence
//! When constructed with a snapshot directory, every insert flushes the
//! pair to disk before releasing the write lock. A failed flush is logged;
//! the in-memory entry stays and the next successful flush catches up.

use super::snapshot::{self, IndexSnapshot};
use super::IndexError;
use crate::types::{dot, Embedding, IssueId};
use serde::Serialize;
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, info, warn};

/// One search hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisualMatch {
    pub issue_id: IssueId,
    /// Cosine similarity in [-1, 1]
    pub score: f32,
}

/// Owned nearest-neighbour index over image embeddings
pub struct VisualIndex {
    snapshot_dir: Option<PathBuf>,
    state: RwLock<IndexSnapshot>,
}

impl VisualIndex {
    /// Memory-only index (nothing is persisted)
    pub fn in_memory(dimension: usize) -> Self {
        Self {
            snapshot_dir: None,
            state: RwLock::new(IndexSnapshot::empty(dimension)),
        }
    }

    /// Open a persistent index, restoring the snapshot pair in `dir` if one
    /// exists.
    ///
    /// A corrupt pair or a dimension change is logged and the index starts
    /// empty; one artifact is never loaded without the other.
    pub fn open(dir: &Path, dimension: usize) -> Self {
        let restored = match snapshot::load(dir) {
            Ok(Some(snapshot)) if snapshot.dimension == dimension => {
                info!(
                    entries = snapshot.len(),
                    dir = %dir.display(),
                    "Visual index restored from snapshot"
                );
                snapshot
            }
            Ok(Some(snapshot)) => {
                warn!(
                    snapshot_dimension = snapshot.dimension,
                    dimension,
                    "Visual index snapshot has a different dimension; starting empty"
                );
                IndexSnapshot::empty(dimension)
            }
            Ok(None) => {
                info!(dir = %dir.display(), "No visual index snapshot; starting empty");
                IndexSnapshot::empty(dimension)
            }
            Err(e) => {
                error!(error = %e, dir = %dir.display(), "Visual index snapshot unusable; starting empty");
                IndexSnapshot::empty(dimension)
            }
        };

        Self {
            snapshot_dir: Some(dir.to_path_buf()),
            state: RwLock::new(restored),
        }
    }

    /// Embedding dimension this index accepts
    pub fn dimension(&self) -> usize {
        self.read().map(|s| s.dimension).unwrap_or(0)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append `embedding` as a new slot bound to `issue_id`.
    ///
    /// Returns the assigned slot, or `None` (no-op) when there is no
    /// embedding.
    pub fn insert(
        &self,
        embedding: Option<&Embedding>,
        issue_id: IssueId,
    ) -> Result<Option<usize>, IndexError> {
        let Some(embedding) = embedding else {
            debug!(issue_id, "No embedding; skipping visual index insert");
            return Ok(None);
        };

        let mut state = self.write()?;
        check_dimension(state.dimension, embedding)?;

        let slot = state.issue_ids.len();
        state.vectors.extend_from_slice(embedding.as_slice());
        state.issue_ids.push(issue_id);

        if let Some(dir) = &self.snapshot_dir {
            if let Err(e) = snapshot::save(dir, &state) {
                error!(
                    issue_id,
                    slot,
                    error = %e,
                    "Visual index flush failed; snapshot lags memory"
                );
            }
        }

        debug!(issue_id, slot, "Visual index entry added");
        Ok(Some(slot))
    }

    /// Up to `k` entries scoring at least `threshold`, best first.
    ///
    /// Equal scores keep insertion order (lower slot first).
    pub fn search(
        &self,
        embedding: Option<&Embedding>,
        k: usize,
        threshold: f32,
    ) -> Result<Vec<VisualMatch>, IndexError> {
        let Some(embedding) = embedding else {
            return Ok(Vec::new());
        };
        if k == 0 {
            return Ok(Vec::new());
        }

        let state = self.read()?;
        if state.is_empty() {
            return Ok(Vec::new());
        }
        check_dimension(state.dimension, embedding)?;

        let query = embedding.as_slice();
        let mut hits: Vec<(usize, f32)> = state
            .vectors
            .chunks_exact(state.dimension)
            .enumerate()
            .map(|(slot, row)| (slot, dot(query, row)))
            .filter(|(_, score)| *score >= threshold)
            .collect();

        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        hits.truncate(k);

        Ok(hits
            .into_iter()
            .map(|(slot, score)| VisualMatch {
                issue_id: state.issue_ids[slot],
                score,
            })
            .collect())
    }

    /// Stored embedding of the earliest slot bound to `issue_id`
    pub fn embedding_of(&self, issue_id: IssueId) -> Result<Option<Embedding>, IndexError> {
        let state = self.read()?;
        let Some(slot) = state.issue_ids.iter().position(|id| *id == issue_id) else {
            return Ok(None);
        };
        let start = slot * state.dimension;
        let row = state.vectors[start..start + state.dimension].to_vec();
        Ok(Embedding::from_raw(row))
    }

    /// Consistent copy of the current contents
    pub fn snapshot(&self) -> Result<IndexSnapshot, IndexError> {
        Ok(self.read()?.clone())
    }

    /// Replace the contents with `snapshot` (validated first)
    pub fn restore(&self, snapshot: IndexSnapshot) -> Result<(), IndexError> {
        snapshot.validate()?;
        let mut state = self.write()?;
        if snapshot.dimension != state.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: state.dimension,
                actual: snapshot.dimension,
            });
        }
        *state = snapshot;
        Ok(())
    }

    /// Write the snapshot pair now (no-op for memory-only indexes)
    pub fn flush(&self) -> Result<(), IndexError> {
        let Some(dir) = &self.snapshot_dir else {
            return Ok(());
        };
        // Write lock keeps a concurrent insert from racing its own flush
        let state = self.write()?;
        snapshot::save(dir, &state)
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, IndexSnapshot>, IndexError> {
        self.state.read().map_err(|_| IndexError::LockPoisoned)
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, IndexSnapshot>, IndexError> {
        self.state.write().map_err(|_| IndexError::LockPoisoned)
    }
}

fn check_dimension(expected: usize, embedding: &Embedding) -> Result<(), IndexError> {
    if embedding.dimension() != expected {
        return Err(IndexError::DimensionMismatch {
            expected,
            actual: embedding.dimension(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn unit(dimension: usize, axis: usize) -> Embedding {
        let mut values = vec![0.0; dimension];
        values[axis] = 1.0;
        Embedding::from_raw(values).unwrap()
    }

    #[test]
    fn test_empty_index_search_returns_nothing() {
        let index = VisualIndex::in_memory(4);
        let hits = index.search(Some(&unit(4, 0)), 5, 0.0).unwrap();
        assert!(hits.is_empty());
    }

    #[test]
    fn test_absent_embedding_is_noop() {
        let index = VisualIndex::in_memory(4);
        assert_eq!(index.insert(None, 1).unwrap(), None);
        assert_eq!(index.len(), 0);
        assert!(index.search(None, 5, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_slots_assigned_in_insertion_order() {
        let index = VisualIndex::in_memory(4);
        assert_eq!(index.insert(Some(&unit(4, 0)), 10).unwrap(), Some(0));
        assert_eq!(index.insert(Some(&unit(4, 1)), 11).unwrap(), Some(1));
        assert_eq!(index.insert(Some(&unit(4, 2)), 12).unwrap(), Some(2));

        let snapshot = index.snapshot().unwrap();
        assert_eq!(snapshot.issue_ids, vec![10, 11, 12]);
        assert_eq!(snapshot.vectors.len(), 3 * 4);
    }

    #[test]
    fn test_search_orders_by_score_and_applies_threshold() {
        let index = VisualIndex::in_memory(2);
        let close = Embedding::from_raw(vec![0.9, 0.1]).unwrap();
        let far = Embedding::from_raw(vec![0.1, 0.9]).unwrap();
        let exact = Embedding::from_raw(vec![1.0, 0.0]).unwrap();
        index.insert(Some(&far), 1).unwrap();
        index.insert(Some(&close), 2).unwrap();
        index.insert(Some(&exact), 3).unwrap();

        let hits = index.search(Some(&exact), 5, 0.5).unwrap();
        let ids: Vec<_> = hits.iter().map(|h| h.issue_id).collect();
        assert_eq!(ids, vec![3, 2]);
        assert!(hits[0].score >= hits[1].score);
    }

    #[test]
    fn test_search_respects_k() {
        let index = VisualIndex::in_memory(2);
        for id in 0..10 {
            index.insert(Some(&unit(2, 0)), id).unwrap();
        }
        assert_eq!(index.search(Some(&unit(2, 0)), 3, 0.0).unwrap().len(), 3);
        assert!(index.search(Some(&unit(2, 0)), 0, 0.0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_prefer_earlier_insert() {
        let index = VisualIndex::in_memory(3);
        index.insert(Some(&unit(3, 1)), 50).unwrap();
        index.insert(Some(&unit(3, 0)), 20).unwrap();
        index.insert(Some(&unit(3, 0)), 10).unwrap();

        let hits = index.search(Some(&unit(3, 0)), 2, 0.9).unwrap();
        assert_eq!(hits[0].issue_id, 20);
        assert_eq!(hits[1].issue_id, 10);
    }

    #[test]
    fn test_dimension_mismatch_rejected_without_mutation() {
        let index = VisualIndex::in_memory(4);
        let err = index.insert(Some(&unit(3, 0)), 1).unwrap_err();
        assert!(matches!(
            err,
            IndexError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
        assert_eq!(index.len(), 0);
    }

    #[test]
    fn test_embedding_of_returns_stored_vector() {
        let index = VisualIndex::in_memory(3);
        index.insert(Some(&unit(3, 2)), 77).unwrap();
        assert_eq!(index.embedding_of(77).unwrap(), Some(unit(3, 2)));
        assert_eq!(index.embedding_of(78).unwrap(), None);
    }

    #[test]
    fn test_restore_rejects_other_dimension() {
        let index = VisualIndex::in_memory(3);
        let other = IndexSnapshot {
            dimension: 2,
            vectors: vec![1.0, 0.0],
            issue_ids: vec![1],
        };
        assert!(index.restore(other).is_err());
    }

    #[test]
    fn test_insert_flushes_and_reopen_restores() {
        let dir = TempDir::new().unwrap();
        {
            let index = VisualIndex::open(dir.path(), 4);
            index.insert(Some(&unit(4, 0)), 5).unwrap();
            index.insert(Some(&unit(4, 3)), 9).unwrap();
        }

        let reopened = VisualIndex::open(dir.path(), 4);
        assert_eq!(reopened.len(), 2);
        let hits = reopened.search(Some(&unit(4, 3)), 1, 0.9).unwrap();
        assert_eq!(hits[0].issue_id, 9);
    }

    #[test]
    fn test_reopen_with_other_dimension_starts_empty() {
        let dir = TempDir::new().unwrap();
        VisualIndex::open(dir.path(), 4)
            .insert(Some(&unit(4, 0)), 5)
            .unwrap();

        let reopened = VisualIndex::open(dir.path(), 8);
        assert!(reopened.is_empty());
        assert_eq!(reopened.dimension(), 8);
    }

    #[test]
    fn test_identical_embedding_scores_as_self_match() {
        let index = VisualIndex::in_memory(6);
        let stored = Embedding::from_raw(vec![0.3, -1.2, 4.0, 0.01, 2.5, -0.7]).unwrap();
        index.insert(Some(&stored), 42).unwrap();

        let query = stored.clone();
        let hits = index.search(Some(&query), 1, 0.0).unwrap();
        assert_eq!(hits[0].issue_id, 42);
        assert!(hits[0].score >= 0.999, "self match scored {}", hits[0].score);
    }

    #[test]
    fn test_concurrent_inserts_and_searches_stay_consistent() {
        const DIM: usize = 8;
        const WRITERS: i64 = 4;
        const PER_WRITER: i64 = 50;
        const READERS: usize = 3;

        let index = Arc::new(VisualIndex::in_memory(DIM));

        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    for n in 0..PER_WRITER {
                        let id = w * PER_WRITER + n;
                        let axis = (id as usize) % DIM;
                        index.insert(Some(&unit(DIM, axis)), id).unwrap();
                    }
                })
            })
            .collect();

        let readers: Vec<_> = (0..READERS)
            .map(|r| {
                let index = Arc::clone(&index);
                std::thread::spawn(move || {
                    let mut seen = Vec::new();
                    for _ in 0..200 {
                        let hits = index.search(Some(&unit(DIM, r % DIM)), 10, 0.5).unwrap();
                        seen.extend(hits.into_iter().map(|h| h.issue_id));
                    }
                    seen
                })
            })
            .collect();

        for writer in writers {
            writer.join().unwrap();
        }
        let total = WRITERS * PER_WRITER;
        for reader in readers {
            for id in reader.join().unwrap() {
                assert!((0..total).contains(&id), "search returned unknown id {id}");
            }
        }

        let snapshot = index.snapshot().unwrap();
        assert_eq!(snapshot.issue_ids.len(), total as usize);
        assert_eq!(snapshot.vectors.len(), snapshot.issue_ids.len() * DIM);

        let mut ids = snapshot.issue_ids.clone();
        ids.sort_unstable();
        assert_eq!(ids, (0..total).collect::<Vec<_>>());
    }
}
