use std::path::PathBuf;
use thiserror::Error;

use crate::ir::{AnnotationId, ImageId};
use crate::split::Split;

/// The main error type for partmerge operations.
///
/// The first four variants are data-integrity faults raised at a stage
/// boundary; they are never retried. Fix the source data or split map and
/// re-run the whole pipeline.
#[derive(Debug, Error)]
pub enum PartmergeError {
    #[error("Validation failed for source '{source_name}' at {record}: {message}")]
    Validation {
        source_name: String,
        record: String,
        message: String,
    },

    #[error(
        "Category '{name}' conflicts across sources: '{first_source}' has {first}, '{conflicting_source}' has {conflicting}"
    )]
    CategoryConflict {
        name: String,
        first_source: String,
        first: String,
        conflicting_source: String,
        conflicting: String,
    },

    #[error("Image {image_id} ('{file_name}') is referenced by annotations but has no split assignment")]
    Coverage { image_id: ImageId, file_name: String },

    #[error("Duplicate file name '{file_name}' in split {split} (images {first} and {second})")]
    DuplicateFileName {
        split: Split,
        file_name: String,
        first: ImageId,
        second: ImageId,
    },

    #[error("Annotation {annotation_id} has a dangling reference: {message}")]
    DanglingReference {
        annotation_id: AnnotationId,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse COCO JSON from {path}: {source}")]
    CocoJsonParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write COCO JSON to {path}: {source}")]
    CocoJsonWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read split map {path}: {message}")]
    SplitMapParse { path: PathBuf, message: String },

    #[error("Unsupported mode: '{0}' (supported: annotations-only, full)")]
    UnsupportedMode(String),

    #[error("Unsupported split: '{0}' (supported: train, val, test)")]
    UnsupportedSplit(String),

    #[error("Image payload not found: {path}")]
    PayloadMissing { path: PathBuf },

    #[error("Failed to write archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Invalid options: {message}")]
    InvalidOptions { message: String },

    #[error("No source collections were given")]
    NoSources,

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
    },
}
