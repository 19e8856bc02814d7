//! Train/val/test partitioning.
//!
//! An assignment maps merged image ids to splits; [`partition`] turns an
//! enriched corpus plus an assignment into one collection per split.

mod assignment;
mod partition;

pub use assignment::{read_split_map, split_from_path, Split, SplitAssignment, SplitRatios};
pub use partition::{partition, PartitionOptions, SplitChunk, SplitCollection};
