//! Chunk file location and ordering.
//!
//! One logical dataset is stored as N chunk files in a single directory,
//! named `{prefix}_{number:03}.{chunk_index}.cchk`. [`locate`] enumerates the
//! chunk files for a `(kind, number)` pair, ordered strictly by ascending
//! embedded chunk index. A duplicate chunk index or a gap in the sequence is
//! a hard error: a gap means a missing or corrupted dataset, and silently
//! skipping it would hand the caller structurally wrong data.

use crate::errors::{Result, SimError};
use cosmo_chunk::CHUNK_EXTENSION;
use std::fmt;
use std::path::{Path, PathBuf};

/// The four logical dataset kinds, each with its own filename prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// Per-particle snapshot data (`snap`).
    Snapshot,
    /// Halo/subhalo group catalog (`groups`).
    GroupCatalog,
    /// Pointer-table merger tree (`tree`).
    MergerTree,
    /// Fixed-schema legacy merger tree (`forest`).
    LegacyTree,
}

impl DatasetKind {
    pub fn prefix(self) -> &'static str {
        match self {
            Self::Snapshot => "snap",
            Self::GroupCatalog => "groups",
            Self::MergerTree => "tree",
            Self::LegacyTree => "forest",
        }
    }

    /// Whether this kind carries merger-tree link structure.
    pub fn is_tree(self) -> bool {
        matches!(self, Self::MergerTree | Self::LegacyTree)
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Snapshot => "snapshot",
            Self::GroupCatalog => "group catalog",
            Self::MergerTree => "merger tree",
            Self::LegacyTree => "legacy tree",
        };
        write!(f, "{}", name)
    }
}

/// Filename of one chunk under the fixed naming template.
pub fn chunk_filename(kind: DatasetKind, number: u32, chunk_index: u32) -> String {
    format!(
        "{}_{:03}.{}.{}",
        kind.prefix(),
        number,
        chunk_index,
        CHUNK_EXTENSION
    )
}

/// Enumerate the chunk files of dataset `(kind, number)` under `base`,
/// ordered by ascending embedded chunk index.
///
/// # Errors
/// [`SimError::NotFound`] when no chunk matches;
/// [`SimError::InconsistentDataset`] on a duplicate or non-contiguous chunk
/// index sequence.
pub fn locate(base: &Path, kind: DatasetKind, number: u32) -> Result<Vec<PathBuf>> {
    let not_found = || SimError::NotFound {
        kind,
        number,
        base: base.to_path_buf(),
    };

    if !base.is_dir() {
        return Err(not_found());
    }

    let needle = format!("{}_{:03}.", kind.prefix(), number);
    let suffix = format!(".{}", CHUNK_EXTENSION);

    let entries = std::fs::read_dir(base)
        .map_err(|e| SimError::chunk_io(base, cosmo_chunk::ChunkError::Io(e)))?;

    let mut found: Vec<(u32, PathBuf)> = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| SimError::chunk_io(base, cosmo_chunk::ChunkError::Io(e)))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(rest) = name.strip_prefix(&needle) else {
            continue;
        };
        let Some(index_str) = rest.strip_suffix(&suffix) else {
            continue;
        };
        // Foreign files that merely resemble the template are skipped.
        let Ok(index) = index_str.parse::<u32>() else {
            continue;
        };
        found.push((index, entry.path()));
    }

    if found.is_empty() {
        return Err(not_found());
    }

    found.sort_by_key(|(index, _)| *index);

    for (position, (index, path)) in found.iter().enumerate() {
        let position = position as u32;
        if *index == position {
            continue;
        }
        if position > 0 && *index == found[position as usize - 1].0 {
            return Err(SimError::InconsistentDataset {
                path: path.clone(),
                reason: format!("duplicate chunk index {}", index),
            });
        }
        return Err(SimError::InconsistentDataset {
            path: base.to_path_buf(),
            reason: format!(
                "chunk index gap: expected {}, found {} ({} chunks present)",
                position,
                index,
                found.len()
            ),
        });
    }

    Ok(found.into_iter().map(|(_, path)| path).collect())
}
