//! Merging independently exported sources into one consistent corpus.
//!
//! Order of work: validate every source, remap ids source by source, unify
//! categories by name, then concatenate. The merged annotation list keeps
//! source order and within-source order; instance numbering depends on it.

mod remap;
mod report;
mod unify;

pub use remap::{remap_source, HighWaterMarks, IdMap, RemappedSource, SourceRemap};
pub use report::{MergeReport, SourceSummary};
pub use unify::{unify_categories, CategoryTable};

use std::collections::HashMap;

use crate::error::PartmergeError;
use crate::ir::{Dataset, Source};
use crate::validation;

/// Everything a merge produces.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    /// The merged corpus, not yet enriched.
    pub dataset: Dataset,
    /// Id tables, one per source in input order.
    pub remaps: Vec<SourceRemap>,
    /// The canonical category table.
    pub categories: CategoryTable,
    pub report: MergeReport,
}

/// Validates, remaps and unifies `sources` in the given order.
///
/// `info` and `licenses` are copied verbatim from the first source.
///
/// # Errors
/// [`PartmergeError::Validation`] if any source is malformed (checked for
/// every source before any id is assigned), [`PartmergeError::CategoryConflict`]
/// if a category name carries divergent metadata, [`PartmergeError::NoSources`]
/// for an empty input list.
pub fn merge_sources(sources: &[Source]) -> Result<MergeOutcome, PartmergeError> {
    if sources.is_empty() {
        return Err(PartmergeError::NoSources);
    }

    for source in sources {
        validation::ensure_valid(source)?;
    }

    let mut marks = HighWaterMarks::default();
    let remapped = sources
        .iter()
        .map(|source| remap_source(source, &mut marks))
        .collect::<Result<Vec<_>, _>>()?;

    let table = unify_categories(&remapped)?;

    let mut dataset = Dataset {
        info: sources[0].dataset.info.clone(),
        licenses: sources[0].dataset.licenses.clone(),
        images: Vec::with_capacity(marks.images as usize),
        categories: table.categories.clone(),
        annotations: Vec::with_capacity(marks.annotations as usize),
    };

    let mut report = MergeReport::default();
    let mut remaps = Vec::with_capacity(remapped.len());

    for part in remapped {
        report.sources.push(SourceSummary {
            name: part.name.clone(),
            images: part.dataset.images.len(),
            annotations: part.dataset.annotations.len(),
            categories: part.dataset.categories.len(),
            image_ids: part
                .remap
                .images
                .range()
                .map(|(lo, hi)| (lo.as_u64(), hi.as_u64())),
            annotation_ids: part
                .remap
                .annotations
                .range()
                .map(|(lo, hi)| (lo.as_u64(), hi.as_u64())),
        });

        dataset.images.extend(part.dataset.images);
        for mut annotation in part.dataset.annotations {
            annotation.category_id = table.canonical_id(annotation.category_id).ok_or_else(|| {
                PartmergeError::DanglingReference {
                    annotation_id: annotation.id,
                    message: format!(
                        "category {} has no canonical entry",
                        annotation.category_id
                    ),
                }
            })?;
            dataset.annotations.push(annotation);
        }
        remaps.push(part.remap);
    }

    report.images = dataset.images.len();
    report.annotations = dataset.annotations.len();
    report.categories = dataset.categories.len();
    report.folded_categories = table.folded();
    report.shared_file_names = count_shared_file_names(&dataset);

    log::info!(
        "merged {} source(s) into {} images, {} annotations, {} categories",
        sources.len(),
        report.images,
        report.annotations,
        report.categories
    );

    Ok(MergeOutcome {
        dataset,
        remaps,
        categories: table,
        report,
    })
}

fn count_shared_file_names(dataset: &Dataset) -> usize {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for image in &dataset.images {
        *counts.entry(image.file_name.as_str()).or_insert(0) += 1;
    }
    counts.values().filter(|&&n| n > 1).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, Category, CategoryId, Image, ImageId};
    use std::collections::HashSet;

    fn source_a() -> Source {
        Source::new(
            "A",
            Dataset {
                info: Some(serde_json::json!({"description": "first"})),
                licenses: vec![serde_json::json!({"id": 1, "name": "CC"})],
                images: vec![
                    Image::new(1u64, "a/1.jpg", 100, 100),
                    Image::new(2u64, "a/2.jpg", 100, 100),
                ],
                categories: vec![Category::new(1u64, "Leg")],
                annotations: vec![
                    Annotation::new(1u64, 1u64, 1u64),
                    Annotation::new(2u64, 1u64, 1u64),
                    Annotation::new(3u64, 2u64, 1u64),
                ],
            },
        )
    }

    fn source_b() -> Source {
        Source::new(
            "B",
            Dataset {
                info: Some(serde_json::json!({"description": "second"})),
                images: vec![
                    Image::new(1u64, "b/1.jpg", 100, 100),
                    Image::new(2u64, "b/2.jpg", 100, 100),
                ],
                categories: vec![Category::new(5u64, "Arm"), Category::new(6u64, "Leg")],
                annotations: vec![
                    Annotation::new(1u64, 1u64, 6u64),
                    Annotation::new(2u64, 2u64, 5u64),
                ],
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_merge_assigns_unique_ids() {
        let outcome = merge_sources(&[source_a(), source_b()]).unwrap();
        let ds = &outcome.dataset;

        assert_eq!(ds.images.len(), 4);
        assert_eq!(ds.annotations.len(), 5);
        let image_ids: HashSet<_> = ds.images.iter().map(|i| i.id).collect();
        let ann_ids: HashSet<_> = ds.annotations.iter().map(|a| a.id).collect();
        assert_eq!(image_ids.len(), 4);
        assert_eq!(ann_ids.len(), 5);
    }

    #[test]
    fn test_merge_unifies_categories_and_rewrites_references() {
        let outcome = merge_sources(&[source_a(), source_b()]).unwrap();
        let ds = &outcome.dataset;

        assert_eq!(ds.categories.len(), 2);
        assert_eq!(ds.categories[0].name, "Leg");
        assert_eq!(ds.categories[1].name, "Arm");

        // B's first annotation was "Leg" on B#1, which became image 3.
        let b_first = &ds.annotations[3];
        assert_eq!(b_first.image_id, ImageId(3));
        assert_eq!(b_first.category_id, CategoryId(1));
        assert_eq!(ds.annotations[4].category_id, CategoryId(2));
        assert_eq!(outcome.report.folded_categories, 1);
    }

    #[test]
    fn test_merge_copies_info_from_first_source() {
        let outcome = merge_sources(&[source_a(), source_b()]).unwrap();
        assert_eq!(
            outcome.dataset.info,
            Some(serde_json::json!({"description": "first"}))
        );
        assert_eq!(outcome.dataset.licenses.len(), 1);
    }

    #[test]
    fn test_invalid_source_blocks_merge_before_remap() {
        let mut broken = source_b();
        broken
            .dataset
            .annotations
            .push(Annotation::new(9u64, 99u64, 5u64));

        let err = merge_sources(&[source_a(), broken]).unwrap_err();
        assert!(matches!(
            err,
            PartmergeError::Validation { ref source_name, .. } if source_name == "B"
        ));
    }

    #[test]
    fn test_empty_source_is_skipped() {
        let outcome =
            merge_sources(&[source_a(), Source::new("E", Dataset::default()), source_b()])
                .unwrap();
        assert_eq!(outcome.remaps.len(), 3);
        assert_eq!(outcome.report.sources[2].image_ids, Some((3, 4)));
    }

    #[test]
    fn test_no_sources_is_an_error() {
        assert!(matches!(merge_sources(&[]), Err(PartmergeError::NoSources)));
    }

    #[test]
    fn test_shared_file_names_are_reported_not_rejected() {
        let mut b = source_b();
        b.dataset.images[0].file_name = "a/1.jpg".into();
        let outcome = merge_sources(&[source_a(), b]).unwrap();
        assert_eq!(outcome.report.shared_file_names, 1);
    }
}
