//! End-to-end tests over a synthetic multi-file simulation output: a
//! three-chunk snapshot with an empty middle chunk, a group catalog whose
//! halos point into the snapshot, and a two-chunk merger tree.

use cosmo_sim::{
    chunk_filename, load_entity, load_related, load_subset, DType, Dataset, DatasetKind,
    FieldArray, FieldData, SimError, TreeWalker,
};
use cosmo_chunk::ChunkWriter;
use std::path::Path;
use tempfile::TempDir;

const NUMBER: u32 = 7;
const GAS_COUNTS: [u64; 3] = [600, 0, 900];

fn f32s(shape: Vec<u32>, values: Vec<f32>) -> FieldArray {
    FieldArray::new(shape, FieldData::F32(values)).unwrap()
}

fn i64s(shape: Vec<u32>, values: Vec<i64>) -> FieldArray {
    FieldArray::new(shape, FieldData::I64(values)).unwrap()
}

fn u64s(values: Vec<u64>) -> FieldArray {
    FieldArray::new(vec![], FieldData::U64(values)).unwrap()
}

/// Gas particle g: Coordinates = (g, g+0.25, g+0.5), ParticleIDs = g.
fn write_snapshot(dir: &Path) {
    let total: u64 = GAS_COUNTS.iter().sum();
    let mut global = 0u64;
    for (i, &count) in GAS_COUNTS.iter().enumerate() {
        let coords: Vec<f32> = (global..global + count)
            .flat_map(|g| [g as f32, g as f32 + 0.25, g as f32 + 0.5])
            .collect();
        let ids: Vec<u64> = (global..global + count).collect();
        global += count;

        let path = dir.join(chunk_filename(DatasetKind::Snapshot, NUMBER, i as u32));
        ChunkWriter::new(i as u32, GAS_COUNTS.len() as u32)
            .category("parttype0", count, total)
            .field("Coordinates", f32s(vec![3], coords))
            .field("ParticleIDs", u64s(ids))
            .write(&path)
            .unwrap();
    }
}

/// Two halos: halo 0 owns gas [0, 1000), halo 1 owns gas [1000, 1050).
fn write_groups(dir: &Path) {
    let path = dir.join(chunk_filename(DatasetKind::GroupCatalog, NUMBER, 0));
    ChunkWriter::new(0, 1)
        .category("Group", 2, 2)
        .field(
            "GroupLenType",
            i64s(vec![6], vec![1000, 0, 0, 0, 0, 0, 50, 0, 0, 0, 0, 0]),
        )
        .field(
            "GroupOffsetType",
            i64s(vec![6], vec![0, 0, 0, 0, 0, 0, 1000, 0, 0, 0, 0, 0]),
        )
        .write(&path)
        .unwrap();
}

/// Four-node chain 3 → 2 → 1 → 0 (descendants toward 0), split 2 + 2.
fn write_tree(dir: &Path) {
    let descendant = [-1i64, 0, 1, 2];
    let first_progenitor = [1i64, 2, 3, -1];
    let next_progenitor = [-1i64, -1, -1, -1];

    for (i, range) in [(0u32, 0..2usize), (1u32, 2..4)] {
        let path = dir.join(chunk_filename(DatasetKind::MergerTree, NUMBER, i));
        ChunkWriter::new(i, 2)
            .category("Node", 2, 4)
            .field("DescendantIndex", i64s(vec![], descendant[range.clone()].to_vec()))
            .field(
                "FirstProgenitorIndex",
                i64s(vec![], first_progenitor[range.clone()].to_vec()),
            )
            .field(
                "NextProgenitorIndex",
                i64s(vec![], next_progenitor[range.clone()].to_vec()),
            )
            .field(
                "SubhaloMass",
                f32s(vec![], range.map(|k| 10.0 + k as f32).collect()),
            )
            .write(&path)
            .unwrap();
    }
}

fn write_all() -> TempDir {
    let dir = TempDir::new().unwrap();
    write_snapshot(dir.path());
    write_groups(dir.path());
    write_tree(dir.path());
    dir
}

#[test]
fn test_straddle_read_crosses_empty_chunk() {
    let dir = write_all();
    let snap = Dataset::open(dir.path(), DatasetKind::Snapshot, NUMBER).unwrap();

    assert_eq!(snap.total_count("parttype0").unwrap(), 1500);

    let result = snap
        .read_range("parttype0", Some(&["ParticleIDs"]), 599, 601)
        .unwrap();
    // First record is chunk 0's last, second is chunk 2's first; the empty
    // chunk 1 contributes nothing.
    assert_eq!(result["ParticleIDs"].as_u64().unwrap(), &[599, 600]);
}

#[test]
fn test_whole_category_equals_sequential_chunk_reads() {
    let dir = write_all();
    let snap = Dataset::open(dir.path(), DatasetKind::Snapshot, NUMBER).unwrap();

    let all = snap.read_all("parttype0", None).unwrap();
    assert_eq!(all["Coordinates"].records(), 1500);

    let mut direct = FieldArray::empty(DType::F32, &[3]);
    for i in 0..GAS_COUNTS.len() as u32 {
        let path = dir
            .path()
            .join(chunk_filename(DatasetKind::Snapshot, NUMBER, i));
        let chunk = cosmo_chunk::ChunkFile::open(&path).unwrap();
        let count = chunk.meta().count("parttype0");
        direct.append(&chunk.read_rows("parttype0", "Coordinates", 0, count).unwrap());
    }
    assert_eq!(all["Coordinates"], direct);
}

#[test]
fn test_repeated_queries_are_bit_identical() {
    let dir = write_all();
    let snap = Dataset::open(dir.path(), DatasetKind::Snapshot, NUMBER).unwrap();

    let a = snap.read_range("parttype0", None, 137, 1203).unwrap();
    let b = snap.read_range("parttype0", None, 137, 1203).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_load_related_matches_read_range() {
    let dir = write_all();

    // Halo 1 declares gas slice (start=1000, len=50).
    let related = load_related(dir.path(), NUMBER, 1, "parttype0", None).unwrap();
    assert_eq!(related["ParticleIDs"].records(), 50);

    let snap = Dataset::open(dir.path(), DatasetKind::Snapshot, NUMBER).unwrap();
    let direct = snap.read_range("parttype0", None, 1000, 1050).unwrap();
    assert_eq!(related, direct);
}

#[test]
fn test_load_related_descendant_chain() {
    let dir = write_all();

    let chain = load_related(dir.path(), NUMBER, 3, "descendants", Some(&["SubhaloMass"])).unwrap();
    // Chain 3 → 2 → 1 → 0; masses are 10 + k with k global.
    assert_eq!(
        chain["SubhaloMass"].as_f32().unwrap(),
        &[13.0, 12.0, 11.0, 10.0]
    );
}

#[test]
fn test_load_subset_and_entity() {
    let dir = write_all();

    let subset = load_subset(
        dir.path(),
        DatasetKind::Snapshot,
        NUMBER,
        "parttype0",
        Some(&["ParticleIDs"]),
    )
    .unwrap();
    assert_eq!(subset["ParticleIDs"].records(), 1500);

    let entity = load_entity(
        dir.path(),
        DatasetKind::Snapshot,
        NUMBER,
        "parttype0",
        600,
        None,
    )
    .unwrap();
    assert_eq!(entity["ParticleIDs"].as_u64().unwrap(), &[600]);
    assert_eq!(
        entity["Coordinates"].as_f32().unwrap(),
        &[600.0, 600.25, 600.5]
    );
}

#[test]
fn test_principal_branch_over_chunk_boundary() {
    let dir = write_all();
    let tree = Dataset::open(dir.path(), DatasetKind::MergerTree, NUMBER).unwrap();
    let walker = TreeWalker::new(&tree).unwrap();

    let branch: Vec<u64> = walker
        .principal_branch(0)
        .collect::<cosmo_sim::Result<_>>()
        .unwrap();
    assert_eq!(branch, vec![0, 1, 2, 3]);
}

#[test]
fn test_schema_mismatch_names_offending_chunk() {
    let dir = TempDir::new().unwrap();
    let paths: Vec<_> = (0..3u32)
        .map(|i| dir.path().join(chunk_filename(DatasetKind::Snapshot, 0, i)))
        .collect();

    ChunkWriter::new(0, 3)
        .category("parttype0", 2, 5)
        .field("Velocities", f32s(vec![3], vec![0.0; 6]))
        .write(&paths[0])
        .unwrap();
    // Same shape, integer elements.
    ChunkWriter::new(1, 3)
        .category("parttype0", 1, 5)
        .field("Velocities", i64s(vec![3], vec![0; 3]))
        .write(&paths[1])
        .unwrap();
    ChunkWriter::new(2, 3)
        .category("parttype0", 2, 5)
        .field("Velocities", f32s(vec![3], vec![0.0; 6]))
        .write(&paths[2])
        .unwrap();

    match Dataset::open(dir.path(), DatasetKind::Snapshot, 0) {
        Err(SimError::SchemaMismatch { path, .. }) => assert_eq!(path, paths[1]),
        other => panic!(
            "expected SchemaMismatch, got {:?}",
            other.map(|d| d.chunk_count())
        ),
    }
}

#[test]
fn test_missing_chunk_is_inconsistent_dataset() {
    let dir = write_all();
    // Remove the middle snapshot chunk to create an index gap.
    std::fs::remove_file(
        dir.path()
            .join(chunk_filename(DatasetKind::Snapshot, NUMBER, 1)),
    )
    .unwrap();

    let result = Dataset::open(dir.path(), DatasetKind::Snapshot, NUMBER);
    assert!(matches!(
        result,
        Err(SimError::InconsistentDataset { .. })
    ));
}

#[test]
fn test_missing_dataset_is_not_found() {
    let dir = write_all();
    let result = Dataset::open(dir.path(), DatasetKind::Snapshot, NUMBER + 1);
    assert!(matches!(result, Err(SimError::NotFound { .. })));
}
