//! Visual similarity index over image embeddings
//!
//! An owned, exhaustive inner-product index: a flat vector array and a
//! parallel slot → issue id array behind one lock, persisted as a pair.

pub mod snapshot;
pub mod visual;

pub use snapshot::IndexSnapshot;
pub use visual::{VisualIndex, VisualMatch};

use thiserror::Error;

/// Visual index errors
#[derive(Debug, Error)]
pub enum IndexError {
    /// Embedding dimension differs from the index dimension
    #[error("Embedding dimension mismatch: index holds {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Snapshot file I/O failed
    #[error("Snapshot IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Id-map (de)serialization failed
    #[error("Snapshot metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    /// The snapshot pair is inconsistent or malformed
    #[error("Snapshot corrupt: {0}")]
    Corrupt(String),

    /// A thread panicked while holding the index lock
    #[error("Visual index lock poisoned")]
    LockPoisoned,
}
