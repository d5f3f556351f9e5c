//! Visual index snapshot persistence
//!
//! A snapshot is two co-located artifacts:
//! - `visual_index.<generation>.vectors`: binary header + little-endian f32 rows
//! - `visual_index.ids.json`: dimension, count, SHA-256 of the vectors file,
//!   the vectors file name, and the slot-ordered issue ids
//!
//! The id-map is the commit record. A save writes a fresh vectors file under a
//! new generation name, then atomically renames the id-map into place, then
//! removes the previous generation. A crash at any point leaves an id-map
//! that names a complete vectors file whose checksum matches.

use super::IndexError;
use crate::types::IssueId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, warn};

/// Id-map file name
pub const IDS_FILE: &str = "visual_index.ids.json";

const VECTORS_PREFIX: &str = "visual_index.";
const VECTORS_SUFFIX: &str = ".vectors";
const MAGIC: &[u8; 4] = b"CVIX";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

/// In-memory copy of the index contents, slot-ordered
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSnapshot {
    pub dimension: usize,
    /// Row-major, `issue_ids.len() * dimension` values
    pub vectors: Vec<f32>,
    pub issue_ids: Vec<IssueId>,
}

impl IndexSnapshot {
    pub fn empty(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
            issue_ids: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.issue_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.issue_ids.is_empty()
    }

    /// Vector and id arrays describe the same number of slots
    pub fn validate(&self) -> Result<(), IndexError> {
        if self.dimension == 0 {
            return Err(IndexError::Corrupt("dimension is zero".to_string()));
        }
        if self.vectors.len() != self.issue_ids.len() * self.dimension {
            return Err(IndexError::Corrupt(format!(
                "{} vector values for {} ids at dimension {}",
                self.vectors.len(),
                self.issue_ids.len(),
                self.dimension
            )));
        }
        Ok(())
    }
}

/// Id-map file contents
#[derive(Debug, Serialize, Deserialize)]
struct IdMap {
    version: u32,
    generation: u64,
    dimension: usize,
    count: usize,
    vectors_file: String,
    vectors_sha256: String,
    issue_ids: Vec<IssueId>,
}

/// Write the snapshot pair into `dir`
pub fn save(dir: &Path, snapshot: &IndexSnapshot) -> Result<(), IndexError> {
    snapshot.validate()?;
    std::fs::create_dir_all(dir)?;

    let previous = read_id_map(dir).ok().flatten();
    let generation = previous.as_ref().map_or(1, |map| map.generation + 1);
    let vectors_file = vectors_file_name(generation);

    let bytes = encode_vectors(snapshot);
    let checksum = format!("{:x}", Sha256::digest(&bytes));

    write_synced(&dir.join(&vectors_file), &bytes)?;

    let id_map = IdMap {
        version: FORMAT_VERSION,
        generation,
        dimension: snapshot.dimension,
        count: snapshot.len(),
        vectors_file: vectors_file.clone(),
        vectors_sha256: checksum,
        issue_ids: snapshot.issue_ids.clone(),
    };
    let tmp_ids = dir.join(format!("{}.tmp", IDS_FILE));
    write_synced(&tmp_ids, &serde_json::to_vec_pretty(&id_map)?)?;
    std::fs::rename(&tmp_ids, dir.join(IDS_FILE))?;

    // Old generation is unreachable once the id-map is committed
    if let Some(old) = previous {
        if old.vectors_file != vectors_file {
            if let Err(e) = std::fs::remove_file(dir.join(&old.vectors_file)) {
                debug!(file = %old.vectors_file, error = %e, "Could not remove previous vectors file");
            }
        }
    }

    debug!(
        generation,
        count = snapshot.len(),
        dir = %dir.display(),
        "Visual index snapshot saved"
    );
    Ok(())
}

/// Load the snapshot pair from `dir`.
///
/// `Ok(None)` when no snapshot has been committed yet. Any disagreement
/// between the two artifacts is reported as [`IndexError::Corrupt`].
pub fn load(dir: &Path) -> Result<Option<IndexSnapshot>, IndexError> {
    let id_map = match read_id_map(dir)? {
        Some(map) => map,
        None => {
            if has_orphan_vectors(dir) {
                warn!(dir = %dir.display(), "Vectors file present without id-map; ignoring");
            }
            return Ok(None);
        }
    };

    if id_map.version != FORMAT_VERSION {
        return Err(IndexError::Corrupt(format!(
            "unsupported snapshot version {}",
            id_map.version
        )));
    }
    if id_map.count != id_map.issue_ids.len() {
        return Err(IndexError::Corrupt(format!(
            "id-map count {} but {} ids listed",
            id_map.count,
            id_map.issue_ids.len()
        )));
    }

    let vectors_path = dir.join(&id_map.vectors_file);
    let bytes = std::fs::read(&vectors_path).map_err(|e| {
        IndexError::Corrupt(format!(
            "id-map references unreadable vectors file {}: {}",
            vectors_path.display(),
            e
        ))
    })?;

    let checksum = format!("{:x}", Sha256::digest(&bytes));
    if checksum != id_map.vectors_sha256 {
        return Err(IndexError::Corrupt(
            "vectors file checksum does not match id-map".to_string(),
        ));
    }

    let (dimension, vectors) = decode_vectors(&bytes)?;
    let snapshot = IndexSnapshot {
        dimension,
        vectors,
        issue_ids: id_map.issue_ids,
    };

    if snapshot.dimension != id_map.dimension {
        return Err(IndexError::Corrupt(format!(
            "vectors dimension {} but id-map dimension {}",
            snapshot.dimension, id_map.dimension
        )));
    }
    snapshot.validate()?;

    Ok(Some(snapshot))
}

fn read_id_map(dir: &Path) -> Result<Option<IdMap>, IndexError> {
    let path = dir.join(IDS_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read(&path)?;
    Ok(Some(serde_json::from_slice(&content)?))
}

fn has_orphan_vectors(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries.filter_map(|e| e.ok()).any(|e| {
                let name = e.file_name().to_string_lossy().to_string();
                name.starts_with(VECTORS_PREFIX) && name.ends_with(VECTORS_SUFFIX)
            })
        })
        .unwrap_or(false)
}

fn vectors_file_name(generation: u64) -> String {
    format!("{}{:010}{}", VECTORS_PREFIX, generation, VECTORS_SUFFIX)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<(), IndexError> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

fn encode_vectors(snapshot: &IndexSnapshot) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + snapshot.vectors.len() * 4);
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
    bytes.extend_from_slice(&(snapshot.dimension as u32).to_le_bytes());
    bytes.extend_from_slice(&(snapshot.len() as u64).to_le_bytes());
    for value in &snapshot.vectors {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

fn decode_vectors(bytes: &[u8]) -> Result<(usize, Vec<f32>), IndexError> {
    if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
        return Err(IndexError::Corrupt("vectors file header invalid".to_string()));
    }

    let version = u32::from_le_bytes(read_array(&bytes[4..8]));
    if version != FORMAT_VERSION {
        return Err(IndexError::Corrupt(format!(
            "unsupported vectors version {}",
            version
        )));
    }
    let dimension = u32::from_le_bytes(read_array(&bytes[8..12])) as usize;
    let count = u64::from_le_bytes(read_array(&bytes[12..20])) as usize;

    let body = &bytes[HEADER_LEN..];
    let expected = count
        .checked_mul(dimension)
        .and_then(|n| n.checked_mul(4))
        .ok_or_else(|| IndexError::Corrupt("vectors header overflows".to_string()))?;
    if body.len() != expected {
        return Err(IndexError::Corrupt(format!(
            "vectors body is {} bytes, header implies {}",
            body.len(),
            expected
        )));
    }

    let vectors = body
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes(read_array(chunk)))
        .collect();
    Ok((dimension, vectors))
}

fn read_array<const N: usize>(slice: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&slice[..N]);
    out
}
