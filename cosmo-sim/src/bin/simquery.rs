use clap::{Parser, Subcommand, ValueEnum};
use cosmo_sim::{Dataset, DatasetKind, FieldArray, TreeWalker};
use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    Snapshot,
    Groups,
    Tree,
    Forest,
}

impl From<KindArg> for DatasetKind {
    fn from(value: KindArg) -> Self {
        match value {
            KindArg::Snapshot => DatasetKind::Snapshot,
            KindArg::Groups => DatasetKind::GroupCatalog,
            KindArg::Tree => DatasetKind::MergerTree,
            KindArg::Forest => DatasetKind::LegacyTree,
        }
    }
}

#[derive(Parser)]
#[command(name = "simquery")]
#[command(about = "Inspect and read chunked simulation datasets")]
struct Cli {
    /// Directory holding the chunk files
    #[arg(long)]
    base: PathBuf,

    /// Dataset kind
    #[arg(long, value_enum)]
    kind: KindArg,

    /// Dataset number (snapshot number, tree number, ...)
    #[arg(long)]
    number: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print chunk count, categories, totals, and schemas
    Info,
    /// Read a global index range of one category
    Read {
        /// Category to read (e.g. parttype0, Group, Node)
        category: String,
        /// Comma-separated field names; all fields when omitted
        #[arg(long)]
        fields: Option<String>,
        /// First global index
        #[arg(long, default_value = "0")]
        start: u64,
        /// Number of records; to the end of the category when omitted
        #[arg(long)]
        count: Option<u64>,
        /// Print query timing
        #[arg(long)]
        timing: bool,
    },
    /// Walk the principal branch of a tree node
    Branch {
        /// Starting node (global index)
        start: u64,
    },
    /// Walk the full subtree of a tree node
    Subtree {
        /// Starting node (global index)
        start: u64,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let dataset = Dataset::open(&cli.base, cli.kind.into(), cli.number)?;

    match cli.command {
        Commands::Info => info(&dataset)?,
        Commands::Read {
            category,
            fields,
            start,
            count,
            timing,
        } => {
            let names: Option<Vec<&str>> = fields.as_deref().map(|f| f.split(',').collect());
            let total = dataset.total_count(&category)?;
            let end = match count {
                Some(count) => start.checked_add(count).ok_or_else(|| {
                    anyhow::anyhow!("record range {} + {} overflows", start, count)
                })?,
                None => total,
            };

            let started = Instant::now();
            let result = dataset.read_range(&category, names.as_deref(), start, end)?;
            let elapsed = started.elapsed();

            print_records(&result, start, end - start);
            if timing {
                println!(
                    "\nRead {} of {} records in {:.3?}",
                    end - start,
                    total,
                    elapsed
                );
            }
        }
        Commands::Branch { start } => {
            let walker = TreeWalker::new(&dataset)?;
            let nodes: Vec<u64> = walker
                .principal_branch(start)
                .collect::<cosmo_sim::Result<_>>()?;
            print_walk("Principal branch", &nodes);
        }
        Commands::Subtree { start } => {
            let walker = TreeWalker::new(&dataset)?;
            let nodes: Vec<u64> = walker
                .full_subtree(start)
                .collect::<cosmo_sim::Result<_>>()?;
            print_walk("Full subtree", &nodes);
        }
    }

    Ok(())
}

fn info(dataset: &Dataset) -> anyhow::Result<()> {
    println!(
        "{} {} under {:?}",
        dataset.kind(),
        dataset.number(),
        dataset.base()
    );
    println!("Chunks: {}", dataset.chunk_count());

    for category in dataset.categories() {
        let total = dataset.total_count(category)?;
        let schema = dataset.schema(category)?;
        println!("\n[{}] {} records", category, total);
        for name in schema.field_names() {
            println!("  {:<24} {}", name, schema.field(name).unwrap());
        }
    }
    Ok(())
}

fn print_records(result: &HashMap<String, FieldArray>, start: u64, count: u64) {
    let mut names: Vec<&String> = result.keys().collect();
    names.sort();

    println!("{:<10} {}", "index", names.iter().map(|n| format!("{:<24}", n)).collect::<String>());
    for rec in 0..count as usize {
        let mut line = format!("{:<10} ", start + rec as u64);
        for name in &names {
            line.push_str(&format!("{:<24}", format_record(&result[*name], rec)));
        }
        println!("{}", line.trim_end());
    }
}

fn format_record(array: &FieldArray, rec: usize) -> String {
    let elems = array.record_elems();
    let lo = rec * elems;
    let one = |i: usize| -> String {
        match array.data() {
            cosmo_sim::FieldData::I32(v) => v[i].to_string(),
            cosmo_sim::FieldData::I64(v) => v[i].to_string(),
            cosmo_sim::FieldData::U32(v) => v[i].to_string(),
            cosmo_sim::FieldData::U64(v) => v[i].to_string(),
            cosmo_sim::FieldData::F32(v) => format!("{:.6}", v[i]),
            cosmo_sim::FieldData::F64(v) => format!("{:.6}", v[i]),
        }
    };
    if elems == 1 {
        one(lo)
    } else {
        let parts: Vec<String> = (lo..lo + elems).map(one).collect();
        format!("[{}]", parts.join(", "))
    }
}

fn print_walk(label: &str, nodes: &[u64]) {
    println!("{}: {} nodes", label, nodes.len());
    for node in nodes {
        println!("  {}", node);
    }
}
