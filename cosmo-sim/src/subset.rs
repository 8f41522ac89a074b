//! Subset assembly: contiguous, type-correct field arrays from scattered chunks.
//!
//! A query names a category, a field selection, and either a global index
//! range or an explicit index list. Assembly resolves the request against the
//! offset table, plans at most one visit per chunk, reads only the
//! intersecting local row runs of each requested field, and concatenates (or
//! scatters, for index lists) into entity-major output arrays.
//!
//! Chunk visits are independent and run on the rayon pool; each visit fills
//! exactly one slot of the plan-ordered result vector, so no synchronization
//! beyond the final collect is needed. Any failed visit aborts the whole
//! call — partial results are never returned.

use crate::errors::{Result, SimError};
use crate::offsets::OffsetTable;
use crate::schema::CategorySchema;
use cosmo_chunk::{ChunkFile, ChunkMeta, FieldArray};
use rayon::prelude::*;
use std::collections::HashMap;

/// A contiguous run of local rows within one chunk.
#[derive(Debug, Clone, Copy)]
struct Run {
    local_start: u64,
    rows: u64,
}

/// All work for one chunk: the runs to read, and for index queries the
/// output record positions of each row, aligned with the concatenated runs.
#[derive(Debug)]
struct ChunkJob {
    pos: usize,
    runs: Vec<Run>,
    out: Option<Vec<usize>>,
}

impl ChunkJob {
    fn rows(&self) -> u64 {
        self.runs.iter().map(|r| r.rows).sum()
    }
}

/// Read a contiguous global index range `[start, end)`.
///
/// Output arrays preserve chunk order and in-chunk record order; every field
/// holds exactly `end - start` records.
pub fn read_range(
    chunks: &[ChunkMeta],
    table: &OffsetTable,
    schema: &CategorySchema,
    fields: Option<&[&str]>,
    start: u64,
    end: u64,
) -> Result<HashMap<String, FieldArray>> {
    if start > end {
        return Err(table.out_of_range(start));
    }
    if end > table.total() {
        return Err(table.out_of_range(end));
    }
    let names = schema.resolve(fields)?;

    let mut jobs = Vec::new();
    for pos in 0..table.chunks() {
        let chunk_start = table.start_of(pos);
        let chunk_end = chunk_start + table.count(pos);
        let lo = start.max(chunk_start);
        let hi = end.min(chunk_end);
        if lo < hi {
            jobs.push(ChunkJob {
                pos,
                runs: vec![Run {
                    local_start: lo - chunk_start,
                    rows: hi - lo,
                }],
                out: None,
            });
        }
    }

    let per_chunk = run_jobs(chunks, schema, &names, &jobs)?;

    let mut result = HashMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let decl = schema.field(name).unwrap();
        let mut out = FieldArray::with_capacity(decl.dtype, &decl.shape, (end - start) as usize);
        for arrays in &per_chunk {
            out.append(&arrays[i]);
        }
        result.insert(name.clone(), out);
    }
    Ok(result)
}

/// Read an explicit list of global indices, in the caller's order.
///
/// Indices may repeat; each occurrence yields its own output record. Work is
/// still grouped per chunk, with consecutive rows coalesced into single
/// reads.
pub fn read_by_indices(
    chunks: &[ChunkMeta],
    table: &OffsetTable,
    schema: &CategorySchema,
    fields: Option<&[&str]>,
    indices: &[u64],
) -> Result<HashMap<String, FieldArray>> {
    let names = schema.resolve(fields)?;

    // (chunk pos, local row, output record) for every requested index.
    let mut rows = Vec::with_capacity(indices.len());
    for (out_pos, &index) in indices.iter().enumerate() {
        let (pos, local) = table.locate(index)?;
        rows.push((pos, local, out_pos));
    }
    rows.sort_unstable();

    let mut jobs: Vec<ChunkJob> = Vec::new();
    for &(pos, local, out_pos) in &rows {
        let extend = match jobs.last_mut() {
            Some(job) if job.pos == pos => {
                let run = job.runs.last_mut().unwrap();
                if local == run.local_start + run.rows {
                    run.rows += 1;
                    None
                } else {
                    Some(false)
                }
            }
            _ => Some(true),
        };
        match extend {
            None => {}
            Some(false) => {
                let job = jobs.last_mut().unwrap();
                job.runs.push(Run {
                    local_start: local,
                    rows: 1,
                });
            }
            Some(true) => jobs.push(ChunkJob {
                pos,
                runs: vec![Run {
                    local_start: local,
                    rows: 1,
                }],
                out: Some(Vec::new()),
            }),
        }
        jobs.last_mut().unwrap().out.as_mut().unwrap().push(out_pos);
    }

    let per_chunk = run_jobs(chunks, schema, &names, &jobs)?;

    let mut result = HashMap::with_capacity(names.len());
    for (i, name) in names.iter().enumerate() {
        let decl = schema.field(name).unwrap();
        let mut out = FieldArray::zeroed(decl.dtype, &decl.shape, indices.len());
        for (job, arrays) in jobs.iter().zip(&per_chunk) {
            let outs = job.out.as_ref().unwrap();
            for (row, &out_pos) in outs.iter().enumerate() {
                out.set_record(out_pos, &arrays[i], row);
            }
        }
        result.insert(name.clone(), out);
    }
    Ok(result)
}

/// Execute the per-chunk jobs in parallel. Each worker opens its chunk file
/// once, reads every requested field's runs, and returns the arrays in field
/// order. The first failure aborts the call.
fn run_jobs(
    chunks: &[ChunkMeta],
    schema: &CategorySchema,
    names: &[String],
    jobs: &[ChunkJob],
) -> Result<Vec<Vec<FieldArray>>> {
    jobs.par_iter()
        .map(|job| {
            let meta = &chunks[job.pos];
            let chunk =
                ChunkFile::open(&meta.path).map_err(|e| SimError::chunk_io(&meta.path, e))?;

            let mut arrays = Vec::with_capacity(names.len());
            for name in names {
                let decl = schema.field(name).unwrap();
                let mut array =
                    FieldArray::with_capacity(decl.dtype, &decl.shape, job.rows() as usize);
                for run in &job.runs {
                    let part = chunk
                        .read_rows(schema.category(), name, run.local_start, run.rows)
                        .map_err(|e| SimError::chunk_io(&meta.path, e))?;
                    array.append(&part);
                }
                arrays.push(array);
            }
            Ok(arrays)
        })
        .collect()
}
