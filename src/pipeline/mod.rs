//! End-to-end runs: merge and enrich a set of sources, then optionally
//! partition and emit them.
//!
//! Each stage reads everything it needs before it starts and writes only
//! after it finishes, so a failure leaves no half-written package behind
//! except for emission itself.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

use crate::emit::{emit, EmitOptions, Manifest};
use crate::enrich::{enrich_dataset, EnrichSummary};
use crate::error::PartmergeError;
use crate::ir::{Dataset, Source};
use crate::merge::{merge_sources, MergeReport};
use crate::split::{
    partition, read_split_map, PartitionOptions, Split, SplitAssignment, SplitRatios,
};

/// A merged and enriched corpus.
#[derive(Clone, Debug)]
pub struct Corpus {
    pub dataset: Dataset,
    pub merge: MergeReport,
    pub enrich: EnrichSummary,
}

/// Merges `sources` in order and enriches the result.
pub fn build_corpus(sources: &[Source]) -> Result<Corpus, PartmergeError> {
    let outcome = merge_sources(sources)?;
    let mut dataset = outcome.dataset;
    let enrich = enrich_dataset(&mut dataset)?;
    Ok(Corpus {
        dataset,
        merge: outcome.report,
        enrich,
    })
}

/// Where split assignments come from.
#[derive(Clone, Debug, PartialEq)]
pub enum SplitStrategy {
    /// `train`/`val`/`test` directory segments in file names.
    Paths,
    /// A JSON or CSV map keyed by original file name.
    MapFile(PathBuf),
    /// Seeded random draw.
    Random { ratios: SplitRatios, seed: u64 },
}

impl SplitStrategy {
    /// Builds the assignment for `dataset`.
    pub fn assign(&self, dataset: &Dataset) -> Result<SplitAssignment, PartmergeError> {
        match self {
            SplitStrategy::Paths => Ok(SplitAssignment::from_paths(dataset)),
            SplitStrategy::MapFile(path) => {
                let map = read_split_map(path)?;
                log::info!("read {} split map entr(ies) from {}", map.len(), path.display());
                Ok(SplitAssignment::from_file_names(dataset, &map))
            }
            SplitStrategy::Random { ratios, seed } => {
                SplitAssignment::random(dataset, *ratios, *seed)
            }
        }
    }
}

/// Options for [`bundle`].
#[derive(Clone, Debug)]
pub struct BundleOptions {
    pub strategy: SplitStrategy,
    pub partition: PartitionOptions,
    pub emit: EmitOptions,
}

/// Result of a bundle run.
#[derive(Clone, Debug, Serialize)]
pub struct BundleReport {
    pub merge: MergeReport,
    pub enrich: EnrichSummary,
    /// Images placed per split, in train/val/test order.
    pub split_images: Vec<(Split, usize)>,
    pub manifest: Manifest,
}

impl fmt::Display for BundleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.merge)?;
        writeln!(
            f,
            "Enriched {} annotations over {} image/category pairs (max {} instances per pair)",
            self.enrich.annotations, self.enrich.keys, self.enrich.max_instances
        )?;
        let splits: Vec<String> = self
            .split_images
            .iter()
            .map(|(split, n)| format!("{} {}", split, n))
            .collect();
        writeln!(f, "Split images: {}", splits.join(", "))?;
        write!(f, "{}", self.manifest)
    }
}

/// Merges, enriches, partitions and emits `sources`.
pub fn bundle(sources: &[Source], options: &BundleOptions) -> Result<BundleReport, PartmergeError> {
    let corpus = build_corpus(sources)?;

    let assignment = options.strategy.assign(&corpus.dataset)?;
    log::info!(
        "assigned {} of {} image(s) to splits",
        assignment.len(),
        corpus.dataset.images.len()
    );

    let collections = partition(&corpus.dataset, &assignment, &options.partition)?;
    let split_images = collections
        .iter()
        .map(|c| (c.split, c.image_count()))
        .collect();

    let manifest = emit(&collections, &options.emit)?;

    Ok(BundleReport {
        merge: corpus.merge,
        enrich: corpus.enrich,
        split_images,
        manifest,
    })
}
