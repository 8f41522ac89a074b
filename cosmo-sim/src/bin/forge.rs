//! Synthetic dataset generator.
//!
//! Writes a small deterministic simulation output — snapshot, group catalog,
//! and pointer-table merger tree for one dataset number — so `simquery` and
//! downstream tooling can be exercised without real data. Values follow
//! simple closed forms of the global index, making any record checkable by
//! eye.

use clap::Parser;
use cosmo_sim::{chunk_filename, DatasetKind, FieldArray, FieldData};
use cosmo_chunk::ChunkWriter;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "forge")]
#[command(about = "Generate a synthetic chunked simulation dataset")]
struct Cli {
    /// Output directory (created if missing)
    #[arg(long)]
    out: PathBuf,

    /// Dataset number to write
    #[arg(long, default_value = "99")]
    number: u32,

    /// Gas particles per snapshot chunk
    #[arg(long, default_value = "1000")]
    particles_per_chunk: u64,

    /// Number of snapshot chunks
    #[arg(long, default_value = "4")]
    chunks: u32,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    std::fs::create_dir_all(&cli.out)?;

    write_snapshot(&cli)?;
    write_groups(&cli)?;
    write_tree(&cli)?;

    println!(
        "Wrote dataset {} ({} snapshot chunks) to {:?}",
        cli.number, cli.chunks, cli.out
    );
    Ok(())
}

/// Gas particles: Coordinates = (g, 2g, 3g) scaled, Masses = 1/(g+1),
/// ParticleIDs = g.
fn write_snapshot(cli: &Cli) -> anyhow::Result<()> {
    let per_chunk = cli.particles_per_chunk;
    let total = per_chunk * cli.chunks as u64;

    for chunk in 0..cli.chunks {
        let first = chunk as u64 * per_chunk;
        let globals = first..first + per_chunk;

        let coords: Vec<f32> = globals
            .clone()
            .flat_map(|g| {
                let g = g as f32;
                [g * 0.1, g * 0.2, g * 0.3]
            })
            .collect();
        let masses: Vec<f32> = globals.clone().map(|g| 1.0 / (g as f32 + 1.0)).collect();
        let ids: Vec<u64> = globals.collect();

        let path = cli
            .out
            .join(chunk_filename(DatasetKind::Snapshot, cli.number, chunk));
        ChunkWriter::new(chunk, cli.chunks)
            .category("parttype0", per_chunk, total)
            .field(
                "Coordinates",
                FieldArray::new(vec![3], FieldData::F32(coords))?,
            )
            .field("Masses", FieldArray::new(vec![], FieldData::F32(masses))?)
            .field("ParticleIDs", FieldArray::new(vec![], FieldData::U64(ids))?)
            .write(&path)?;
    }
    Ok(())
}

/// One halo per 500 gas particles, consecutive non-overlapping slices.
fn write_groups(cli: &Cli) -> anyhow::Result<()> {
    let total_particles = cli.particles_per_chunk * cli.chunks as u64;
    let halo_size = 500u64.min(total_particles.max(1));
    let halos = total_particles / halo_size;

    let mut len_type = Vec::new();
    let mut offset_type = Vec::new();
    let mut masses = Vec::new();
    for halo in 0..halos {
        // Only parttype0 is populated; the other five types are empty.
        len_type.extend_from_slice(&[halo_size as i64, 0, 0, 0, 0, 0]);
        offset_type.extend_from_slice(&[(halo * halo_size) as i64, 0, 0, 0, 0, 0]);
        masses.push((halos - halo) as f64);
    }

    let path = cli
        .out
        .join(chunk_filename(DatasetKind::GroupCatalog, cli.number, 0));
    ChunkWriter::new(0, 1)
        .category("Group", halos, halos)
        .field(
            "GroupLenType",
            FieldArray::new(vec![6], FieldData::I64(len_type))?,
        )
        .field(
            "GroupOffsetType",
            FieldArray::new(vec![6], FieldData::I64(offset_type))?,
        )
        .field("GroupMass", FieldArray::new(vec![], FieldData::F64(masses))?)
        .write(&path)?;
    Ok(())
}

/// A binary merger tree: node k has progenitors 2k+1 and 2k+2 while they
/// fit, split across two chunks.
fn write_tree(cli: &Cli) -> anyhow::Result<()> {
    let nodes = 31u64; // complete binary tree of depth 5
    let link = |n: u64| -> i64 {
        if n < nodes {
            n as i64
        } else {
            -1
        }
    };

    let descendant: Vec<i64> = (0..nodes)
        .map(|k| if k == 0 { -1 } else { ((k - 1) / 2) as i64 })
        .collect();
    let first_progenitor: Vec<i64> = (0..nodes).map(|k| link(2 * k + 1)).collect();
    let next_progenitor: Vec<i64> = (0..nodes)
        .map(|k| {
            if k == 0 || k % 2 == 0 {
                -1
            } else {
                link(k + 1)
            }
        })
        .collect();
    let masses: Vec<f32> = (0..nodes).map(|k| (nodes - k) as f32).collect();

    let split = (nodes / 2) as usize;
    for (chunk, range) in [(0u32, 0..split), (1u32, split..nodes as usize)] {
        let count = range.len() as u64;
        let path = cli
            .out
            .join(chunk_filename(DatasetKind::MergerTree, cli.number, chunk));
        ChunkWriter::new(chunk, 2)
            .category("Node", count, nodes)
            .field(
                "DescendantIndex",
                FieldArray::new(vec![], FieldData::I64(descendant[range.clone()].to_vec()))?,
            )
            .field(
                "FirstProgenitorIndex",
                FieldArray::new(
                    vec![],
                    FieldData::I64(first_progenitor[range.clone()].to_vec()),
                )?,
            )
            .field(
                "NextProgenitorIndex",
                FieldArray::new(
                    vec![],
                    FieldData::I64(next_progenitor[range.clone()].to_vec()),
                )?,
            )
            .field(
                "Mass",
                FieldArray::new(vec![], FieldData::F32(masses[range].to_vec()))?,
            )
            .write(&path)?;
    }
    Ok(())
}
