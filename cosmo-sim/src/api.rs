//! Convenience read API for callers that do not hold a dataset handle.
//!
//! Each function opens the dataset(s) it needs, runs one query, and returns;
//! nothing is cached between calls. Long-lived callers issuing repeated
//! queries should open a [`Dataset`] once and query it directly — these
//! wrappers rebuild the offset tables on every call.

use crate::dataset::Dataset;
use crate::errors::{Result, SimError};
use crate::locate::DatasetKind;
use crate::tree::TreeWalker;
use cosmo_chunk::FieldArray;
use std::collections::HashMap;
use std::path::Path;

/// Number of particle categories (`parttype0`..`parttype5`) a group
/// catalog's per-type columns cover.
pub const NUM_PART_TYPES: usize = 6;

/// Group-catalog category holding the halos.
pub const GROUP_CATEGORY: &str = "Group";
/// Per-type particle counts of each halo, shape `[6]`, i64.
pub const GROUP_LEN_TYPE: &str = "GroupLenType";
/// Per-type global start index of each halo's particles, shape `[6]`, i64.
pub const GROUP_OFFSET_TYPE: &str = "GroupOffsetType";

/// Pseudo-category accepted by [`load_related`] for descendant-chain
/// queries against the merger tree.
pub const DESCENDANTS: &str = "descendants";

/// Load a whole category. `fields = None` selects every field.
pub fn load_subset(
    base: impl AsRef<Path>,
    kind: DatasetKind,
    number: u32,
    category: &str,
    fields: Option<&[&str]>,
) -> Result<HashMap<String, FieldArray>> {
    Dataset::open(base, kind, number)?.read_all(category, fields)
}

/// Load a single entity by Global Index.
pub fn load_entity(
    base: impl AsRef<Path>,
    kind: DatasetKind,
    number: u32,
    category: &str,
    index: u64,
    fields: Option<&[&str]>,
) -> Result<HashMap<String, FieldArray>> {
    Dataset::open(base, kind, number)?.read_one(category, fields, index)
}

/// Load the entities related to a parent entity.
///
/// - `child_category` = a particle category (`parttype0`..`parttype5`):
///   `parent_id` names a halo in the group catalog; returns that halo's
///   particle slice of the snapshot with the same dataset number, exactly
///   the records `[offset, offset + len)` declared by the halo's
///   [`GROUP_OFFSET_TYPE`] / [`GROUP_LEN_TYPE`] columns.
/// - `child_category` = [`DESCENDANTS`]: `parent_id` names a tree node;
///   returns the node's descendant chain (the node first). The pointer-table
///   tree is used when present, else the legacy tree.
pub fn load_related(
    base: impl AsRef<Path>,
    number: u32,
    parent_id: u64,
    child_category: &str,
    fields: Option<&[&str]>,
) -> Result<HashMap<String, FieldArray>> {
    let base = base.as_ref();

    if child_category == DESCENDANTS {
        return load_descendants(base, number, parent_id, fields);
    }
    if let Some(part_type) = parse_part_type(child_category) {
        return load_halo_particles(base, number, parent_id, part_type, child_category, fields);
    }
    Err(SimError::UnknownCategory {
        category: child_category.to_string(),
    })
}

/// `parttypeN` → `N`, for N below [`NUM_PART_TYPES`].
fn parse_part_type(category: &str) -> Option<usize> {
    let n: usize = category.strip_prefix("parttype")?.parse().ok()?;
    (n < NUM_PART_TYPES).then_some(n)
}

fn load_halo_particles(
    base: &Path,
    number: u32,
    halo_id: u64,
    part_type: usize,
    category: &str,
    fields: Option<&[&str]>,
) -> Result<HashMap<String, FieldArray>> {
    let groups = Dataset::open(base, DatasetKind::GroupCatalog, number)?;
    let halo = groups.read_one(
        GROUP_CATEGORY,
        Some(&[GROUP_LEN_TYPE, GROUP_OFFSET_TYPE]),
        halo_id,
    )?;

    let slice = |name: &str| -> Result<i64> {
        let column = halo[name].as_i64().ok_or_else(|| SimError::SchemaMismatch {
            category: GROUP_CATEGORY.to_string(),
            field: name.to_string(),
            path: base.to_path_buf(),
            expected: "i64[6]".to_string(),
            actual: halo[name].dtype().to_string(),
        })?;
        column
            .get(part_type)
            .copied()
            .ok_or_else(|| SimError::SchemaMismatch {
                category: GROUP_CATEGORY.to_string(),
                field: name.to_string(),
                path: base.to_path_buf(),
                expected: format!("i64[{}]", NUM_PART_TYPES),
                actual: format!("i64[{}]", column.len()),
            })
    };
    let len = slice(GROUP_LEN_TYPE)?;
    let offset = slice(GROUP_OFFSET_TYPE)?;
    if len < 0 || offset < 0 {
        return Err(SimError::InconsistentDataset {
            path: base.to_path_buf(),
            reason: format!(
                "halo {} declares negative particle slice ({}, {}) for {}",
                halo_id, offset, len, category
            ),
        });
    }

    let snapshot = Dataset::open(base, DatasetKind::Snapshot, number)?;
    snapshot.read_range(category, fields, offset as u64, offset as u64 + len as u64)
}

fn load_descendants(
    base: &Path,
    number: u32,
    node: u64,
    fields: Option<&[&str]>,
) -> Result<HashMap<String, FieldArray>> {
    let tree = match Dataset::open(base, DatasetKind::MergerTree, number) {
        Err(SimError::NotFound { .. }) => Dataset::open(base, DatasetKind::LegacyTree, number)?,
        other => other?,
    };
    let walker = TreeWalker::new(&tree)?;
    walker.load_descendant_chain(node, fields)
}
