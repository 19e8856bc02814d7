//! Partmerge: merge, enrich and partition COCO part-segmentation exports.
//!
//! Independently exported annotation collections are validated, given
//! corpus-unique ids, unified by category name and enriched with per-image,
//! per-category instance numbers. The result can be written as one merged
//! document or partitioned into train/val/test and packaged for upload.
//!
//! # Modules
//!
//! - [`ir`]: Dataset model and COCO JSON reading/writing
//! - [`validation`]: Per-source schema and reference checks
//! - [`merge`]: Id remapping and category unification
//! - [`enrich`]: Instance ids and composite keys
//! - [`index`]: In-memory lookup by (image, category)
//! - [`split`]: Split assignment and partitioning
//! - [`emit`]: Package writer
//! - [`pipeline`]: The stages wired together
//! - [`error`]: Error types for partmerge operations

pub mod emit;
pub mod enrich;
pub mod error;
pub mod index;
pub mod ir;
pub mod merge;
pub mod pipeline;
pub mod split;
pub mod validation;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use error::PartmergeError;

use emit::{EmitMode, EmitOptions, DEFAULT_MAX_IMAGES};
use index::InstanceIndex;
use pipeline::{BundleOptions, SplitStrategy};
use split::{PartitionOptions, Split, SplitRatios};

/// The partmerge CLI application.
#[derive(Parser)]
#[command(name = "partmerge")]
#[command(version, author, about)]
#[command(propagate_version = true)]
struct Cli {
    /// Log at debug level (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Check source collections for broken references and duplicates.
    Validate(ValidateArgs),
    /// Merge and enrich sources into one COCO document.
    Merge(MergeArgs),
    /// Merge, enrich, partition into splits and write a package.
    Bundle(BundleArgs),
    /// Look up the instances of a category in one image of a merged file.
    Lookup(LookupArgs),
}

/// Arguments for the validate subcommand.
#[derive(clap::Args)]
struct ValidateArgs {
    /// Source COCO JSON files.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Output format for the report ('text' or 'json').
    #[arg(long, default_value = "text")]
    output: String,
}

/// Arguments for the merge subcommand.
#[derive(clap::Args)]
struct MergeArgs {
    /// Source files or directories of *.json files, merged in this order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Merged COCO JSON file to write.
    #[arg(short, long)]
    output: PathBuf,
}

/// Arguments for the bundle subcommand.
#[derive(clap::Args)]
struct BundleArgs {
    /// Source files or directories of *.json files, merged in this order.
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Package directory.
    #[arg(long, env = "PARTMERGE_OUT")]
    out: PathBuf,

    /// 'annotations-only' or 'full'.
    #[arg(long, env = "PARTMERGE_MODE", default_value = "annotations-only")]
    mode: String,

    /// JSON or CSV file mapping original file names to splits.
    #[arg(long, conflicts_with_all = ["derive_splits", "ratios"])]
    split_map: Option<PathBuf>,

    /// Take splits from train/val/test directories in file names (default).
    #[arg(long)]
    derive_splits: bool,

    /// Random split ratios as train,val,test.
    #[arg(long, conflicts_with = "derive_splits")]
    ratios: Option<String>,

    /// Seed for --ratios.
    #[arg(long, default_value_t = 0, requires = "ratios")]
    seed: u64,

    /// Split for images no other rule assigns.
    #[arg(long)]
    fallback_split: Option<String>,

    /// Emit only this split.
    #[arg(long)]
    only: Option<String>,

    /// Images per annotation file before chunking (0 disables chunking).
    #[arg(long, default_value_t = DEFAULT_MAX_IMAGES)]
    max_images: usize,

    /// Directory image payloads are copied from in full mode.
    #[arg(long)]
    images_root: Option<PathBuf>,

    /// Also write <out>.zip.
    #[arg(long)]
    zip: bool,

    /// Annotation file prefix (defaults to the package directory name).
    #[arg(long)]
    name: Option<String>,
}

/// Arguments for the lookup subcommand.
#[derive(clap::Args)]
struct LookupArgs {
    /// Merged COCO JSON file.
    input: PathBuf,

    /// Image id in the merged corpus.
    #[arg(long)]
    image: u64,

    /// Category id.
    #[arg(long, conflicts_with = "category", required_unless_present = "category")]
    category_id: Option<u64>,

    /// Category name.
    #[arg(long)]
    category: Option<String>,

    /// Print only this instance.
    #[arg(long)]
    instance: Option<u32>,
}

/// Run the partmerge CLI.
///
/// This is the main entry point for the CLI, called from `main.rs`.
pub fn run() -> Result<(), PartmergeError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Validate(args)) => run_validate(args),
        Some(Commands::Merge(args)) => run_merge(args),
        Some(Commands::Bundle(args)) => run_bundle(args),
        Some(Commands::Lookup(args)) => run_lookup(args),
        None => {
            println!("partmerge {}", env!("CARGO_PKG_VERSION"));
            println!();
            println!("Merge, enrich and partition COCO part-segmentation exports.");
            println!();
            println!("Run 'partmerge --help' for usage information.");
            Ok(())
        }
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .try_init();
}

fn stdout_json<T: serde::Serialize>(value: &T) -> Result<(), PartmergeError> {
    let json =
        serde_json::to_string_pretty(value).map_err(|source| PartmergeError::CocoJsonWrite {
            path: PathBuf::from("<stdout>"),
            source,
        })?;
    println!("{}", json);
    Ok(())
}

/// Execute the validate subcommand.
fn run_validate(args: ValidateArgs) -> Result<(), PartmergeError> {
    if args.output != "text" && args.output != "json" {
        return Err(PartmergeError::InvalidOptions {
            message: format!("unknown report format '{}' (supported: text, json)", args.output),
        });
    }

    let mut reports = Vec::with_capacity(args.inputs.len());
    for path in &args.inputs {
        let source = ir::io_coco_json::read_source(path)?;
        reports.push(validation::validate_dataset(&source.name, &source.dataset));
    }

    if args.output == "json" {
        stdout_json(&reports)?;
    } else {
        for report in &reports {
            print!("{}", report);
        }
    }

    let error_count: usize = reports.iter().map(|r| r.error_count()).sum();
    let warning_count: usize = reports.iter().map(|r| r.warning_count()).sum();
    if error_count > 0 {
        Err(PartmergeError::ValidationFailed {
            error_count,
            warning_count,
        })
    } else {
        Ok(())
    }
}

/// Execute the merge subcommand.
fn run_merge(args: MergeArgs) -> Result<(), PartmergeError> {
    let sources = ir::io_coco_json::read_sources(&args.inputs)?;
    let corpus = pipeline::build_corpus(&sources)?;
    ir::io_coco_json::write_coco_json(&args.output, &corpus.dataset)?;

    print!("{}", corpus.merge);
    println!(
        "Enriched {} annotations over {} image/category pairs",
        corpus.enrich.annotations, corpus.enrich.keys
    );
    println!("Wrote {}", args.output.display());
    Ok(())
}

fn parse_split(value: Option<&str>) -> Result<Option<Split>, PartmergeError> {
    value.map(str::parse::<Split>).transpose()
}

/// Turns bundle arguments into options, rejecting bad combinations before
/// any source is read.
fn bundle_options(args: &BundleArgs) -> Result<BundleOptions, PartmergeError> {
    let mode: EmitMode = args.mode.parse()?;

    let strategy = match (&args.split_map, &args.ratios, args.derive_splits) {
        (Some(path), _, _) => SplitStrategy::MapFile(path.clone()),
        (None, Some(ratios), false) => SplitStrategy::Random {
            ratios: ratios.parse::<SplitRatios>()?,
            seed: args.seed,
        },
        _ => SplitStrategy::Paths,
    };

    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .out
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "dataset".to_string()),
    };

    if mode == EmitMode::Full && args.images_root.is_none() {
        return Err(PartmergeError::InvalidOptions {
            message: "--mode full requires --images-root".to_string(),
        });
    }
    if mode == EmitMode::AnnotationsOnly && args.images_root.is_some() {
        log::warn!("--images-root is ignored in annotations-only mode");
    }

    let mut emit = EmitOptions::new(&args.out, name);
    emit.mode = mode;
    emit.max_images = args.max_images;
    emit.only = parse_split(args.only.as_deref())?;
    emit.images_root = args.images_root.clone();
    emit.zip = args.zip;

    Ok(BundleOptions {
        strategy,
        partition: PartitionOptions {
            fallback: parse_split(args.fallback_split.as_deref())?,
        },
        emit,
    })
}

/// Execute the bundle subcommand.
fn run_bundle(args: BundleArgs) -> Result<(), PartmergeError> {
    let options = bundle_options(&args)?;
    let sources = ir::io_coco_json::read_sources(&args.inputs)?;
    let report = pipeline::bundle(&sources, &options)?;
    print!("{}", report);
    Ok(())
}

/// Execute the lookup subcommand.
fn run_lookup(args: LookupArgs) -> Result<(), PartmergeError> {
    let mut dataset = ir::io_coco_json::read_coco_json(&args.input)?;
    // Recomputing is a no-op on an enriched file and fills the fields on one
    // that was never enriched.
    enrich::enrich_dataset(&mut dataset)?;
    let index = InstanceIndex::build(&dataset);

    let lookup = match (&args.category, args.category_id) {
        (Some(name), _) => index.by_name(args.image, name),
        (None, Some(id)) => index.by_ids(args.image, id),
        (None, None) => {
            return Err(PartmergeError::InvalidOptions {
                message: "one of --category or --category-id is required".to_string(),
            })
        }
    };

    match args.instance {
        Some(instance) => {
            let found: Vec<_> = index.instance(lookup, instance).into_iter().collect();
            stdout_json(&found)
        }
        None => stdout_json(&index.get(lookup)),
    }
}
