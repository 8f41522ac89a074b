use crate::locate::DatasetKind;
use cosmo_chunk::ChunkError;
use std::path::PathBuf;

/// Dataset-layer error taxonomy.
///
/// Every variant carries the offending path, category, field, or index so
/// callers can inspect failures programmatically. Nothing in this crate
/// downgrades an error to a warning or returns partial data.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    #[error("No chunk files for {kind} {number} under {base:?}")]
    NotFound {
        kind: DatasetKind,
        number: u32,
        base: PathBuf,
    },

    #[error("Inconsistent dataset at {path:?}: {reason}")]
    InconsistentDataset { path: PathBuf, reason: String },

    #[error("Field {field:?} not present in category {category:?}")]
    MissingField { category: String, field: String },

    #[error("Schema mismatch for {category:?}/{field:?} in chunk {path:?}: expected {expected}, got {actual}")]
    SchemaMismatch {
        category: String,
        field: String,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("Index {index} out of range for category {category:?} with {total} records")]
    IndexOutOfRange {
        category: String,
        index: u64,
        total: u64,
    },

    #[error("Cyclic tree link: node {index} visited twice")]
    CyclicTree { index: u64 },

    #[error("Unknown category {category:?}")]
    UnknownCategory { category: String },

    #[error("Dataset kind {kind} has no tree structure")]
    NotATree { kind: DatasetKind },

    #[error("Chunk {path:?}: {source}")]
    ChunkIo {
        path: PathBuf,
        source: ChunkError,
    },
}

impl SimError {
    pub(crate) fn chunk_io(path: impl Into<PathBuf>, source: ChunkError) -> Self {
        Self::ChunkIo {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SimError>;
