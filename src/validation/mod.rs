//! Schema validation of single source collections.
//!
//! Every later stage assumes closed references inside each source, so this
//! gate runs before any id is remapped. [`validate_dataset`] collects every
//! issue for reporting; [`ensure_valid`] is the merge gate and fails on the
//! first error without attempting repair.

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use std::collections::{HashMap, HashSet};

use crate::error::PartmergeError;
use crate::ir::{AnnotationId, CategoryId, Dataset, ImageId, Source};

/// Validates one source and returns every issue found.
pub fn validate_dataset(name: &str, dataset: &Dataset) -> ValidationReport {
    let mut report = ValidationReport::new(name);

    if dataset.is_empty() {
        report.add(ValidationIssue::warning(
            IssueCode::EmptySource,
            "Source holds no images, categories or annotations",
            IssueContext::Source,
        ));
        return report;
    }

    validate_images(dataset, &mut report);
    validate_categories(dataset, &mut report);
    validate_annotations(dataset, &mut report);

    report
}

/// Validates a source and fails with [`PartmergeError::Validation`] naming
/// the first offending record.
pub fn ensure_valid(source: &Source) -> Result<ValidationReport, PartmergeError> {
    let report = validate_dataset(&source.name, &source.dataset);

    if let Some(issue) = report.first_error() {
        return Err(PartmergeError::Validation {
            source_name: source.name.clone(),
            record: issue.context.to_string(),
            message: issue.message.clone(),
        });
    }

    for issue in &report.issues {
        log::warn!("{}: {}", source.name, issue);
    }
    Ok(report)
}

fn validate_images(dataset: &Dataset, report: &mut ValidationReport) {
    let mut seen_ids: HashMap<ImageId, usize> = HashMap::new();
    let mut seen_names: HashMap<&str, ImageId> = HashMap::new();

    for (idx, image) in dataset.images.iter().enumerate() {
        let id = image.id.as_u64();

        if let Some(first_idx) = seen_ids.get(&image.id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateImageId,
                format!(
                    "Duplicate image ID {} (first seen at index {})",
                    id, first_idx
                ),
                IssueContext::Image { id },
            ));
        } else {
            seen_ids.insert(image.id, idx);
        }

        if image.width == 0 || image.height == 0 {
            report.add(ValidationIssue::error(
                IssueCode::InvalidImageDimensions,
                format!(
                    "Invalid dimensions {}x{} (must be positive)",
                    image.width, image.height
                ),
                IssueContext::Image { id },
            ));
        }

        if image.file_name.is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::EmptyFileName,
                "Empty filename",
                IssueContext::Image { id },
            ));
            continue;
        }

        if let Some(first_id) = seen_names.get(image.file_name.as_str()) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateFileName,
                format!(
                    "File name '{}' is also used by image {}",
                    image.file_name, first_id
                ),
                IssueContext::Image { id },
            ));
        } else {
            seen_names.insert(&image.file_name, image.id);
        }
    }
}

fn validate_categories(dataset: &Dataset, report: &mut ValidationReport) {
    let mut seen_ids: HashMap<CategoryId, usize> = HashMap::new();
    let mut seen_names: HashMap<&str, CategoryId> = HashMap::new();

    for (idx, category) in dataset.categories.iter().enumerate() {
        let id = category.id.as_u64();

        if let Some(first_idx) = seen_ids.get(&category.id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateCategoryId,
                format!(
                    "Duplicate category ID {} (first seen at index {})",
                    id, first_idx
                ),
                IssueContext::Category { id },
            ));
        } else {
            seen_ids.insert(category.id, idx);
        }

        if category.name.is_empty() {
            report.add(ValidationIssue::warning(
                IssueCode::EmptyCategoryName,
                "Empty category name",
                IssueContext::Category { id },
            ));
        } else if let Some(first_id) = seen_names.get(category.name.as_str()) {
            report.add(ValidationIssue::warning(
                IssueCode::DuplicateCategoryName,
                format!(
                    "Duplicate category name '{}' (also used by category {})",
                    category.name, first_id
                ),
                IssueContext::Category { id },
            ));
        } else {
            seen_names.insert(&category.name, category.id);
        }
    }
}

fn validate_annotations(dataset: &Dataset, report: &mut ValidationReport) {
    let image_dims: HashMap<ImageId, (u32, u32)> = dataset
        .images
        .iter()
        .map(|i| (i.id, (i.width, i.height)))
        .collect();
    let category_ids: HashSet<CategoryId> = dataset.categories.iter().map(|c| c.id).collect();
    let mut seen_ids: HashMap<AnnotationId, usize> = HashMap::new();

    for (idx, annotation) in dataset.annotations.iter().enumerate() {
        let id = annotation.id.as_u64();

        if let Some(first_idx) = seen_ids.get(&annotation.id) {
            report.add(ValidationIssue::error(
                IssueCode::DuplicateAnnotationId,
                format!(
                    "Duplicate annotation ID {} (first seen at index {})",
                    id, first_idx
                ),
                IssueContext::Annotation { id },
            ));
        } else {
            seen_ids.insert(annotation.id, idx);
        }

        match image_dims.get(&annotation.image_id) {
            None => report.add(ValidationIssue::error(
                IssueCode::MissingImageRef,
                format!("References non-existent image {}", annotation.image_id),
                IssueContext::Annotation { id },
            )),
            Some(&(width, height)) => {
                let mask_size = annotation.segmentation.as_ref().and_then(|s| s.rle_size());
                if let Some([mask_h, mask_w]) = mask_size {
                    if mask_h != height || mask_w != width {
                        report.add(ValidationIssue::warning(
                            IssueCode::MaskSizeMismatch,
                            format!(
                                "Mask size {}x{} differs from image {} ({}x{})",
                                mask_w, mask_h, annotation.image_id, width, height
                            ),
                            IssueContext::Annotation { id },
                        ));
                    }
                }
            }
        }

        if !category_ids.contains(&annotation.category_id) {
            report.add(ValidationIssue::error(
                IssueCode::MissingCategoryRef,
                format!(
                    "References non-existent category {}",
                    annotation.category_id
                ),
                IssueContext::Annotation { id },
            ));
        }
    }
}
