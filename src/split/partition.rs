//! Partitioning an enriched corpus into per-split collections.

use std::collections::{BTreeMap, HashSet};

use crate::error::PartmergeError;
use crate::ir::{Dataset, ImageId};

use super::assignment::{Split, SplitAssignment};

/// How unassigned images are treated.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PartitionOptions {
    /// Split for images the assignment does not cover. Without one, an
    /// unassigned image with annotations is a coverage error and an
    /// unassigned image without annotations is dropped.
    pub fallback: Option<Split>,
}

/// The images and annotations of one split, with the full category table.
#[derive(Clone, Debug)]
pub struct SplitCollection {
    pub split: Split,
    pub dataset: Dataset,
}

impl SplitCollection {
    pub fn image_count(&self) -> usize {
        self.dataset.images.len()
    }

    pub fn annotation_count(&self) -> usize {
        self.dataset.annotations.len()
    }

    /// Cuts the collection into chunks of at most `max_images` images, each
    /// carrying the annotations of its images. A collection that fits in one
    /// chunk yields a single unnumbered chunk; `max_images == 0` disables
    /// chunking.
    pub fn chunks(&self, max_images: usize) -> Vec<SplitChunk> {
        let images = &self.dataset.images;
        if max_images == 0 || images.len() <= max_images {
            return vec![SplitChunk {
                split: self.split,
                index: None,
                dataset: self.dataset.clone(),
            }];
        }

        images
            .chunks(max_images)
            .enumerate()
            .map(|(index, slice)| {
                let ids: HashSet<ImageId> = slice.iter().map(|i| i.id).collect();
                SplitChunk {
                    split: self.split,
                    index: Some(index),
                    dataset: Dataset {
                        info: self.dataset.info.clone(),
                        licenses: self.dataset.licenses.clone(),
                        images: slice.to_vec(),
                        categories: self.dataset.categories.clone(),
                        annotations: self
                            .dataset
                            .annotations
                            .iter()
                            .filter(|a| ids.contains(&a.image_id))
                            .cloned()
                            .collect(),
                    },
                }
            })
            .collect()
    }
}

/// One emitted annotation file. `index` is 0-based and set only when the
/// split was chunked.
#[derive(Clone, Debug)]
pub struct SplitChunk {
    pub split: Split,
    pub index: Option<usize>,
    pub dataset: Dataset,
}

impl SplitChunk {
    /// Annotation file stem, e.g. `parts_train` or `parts_train0`.
    pub fn file_stem(&self, name: &str) -> String {
        match self.index {
            Some(index) => format!("{}_{}{}", name, self.split, index),
            None => format!("{}_{}", name, self.split),
        }
    }
}

/// Splits `dataset` into one collection per split, in train/val/test order.
///
/// Every collection carries the full category table, and ids are kept as
/// they are in the corpus. Images keep their corpus order, as do
/// annotations, so instance ids stay valid inside each split.
///
/// # Errors
/// [`PartmergeError::Coverage`] for the first annotated image that has no
/// split and no fallback applies.
pub fn partition(
    dataset: &Dataset,
    assignment: &SplitAssignment,
    options: &PartitionOptions,
) -> Result<Vec<SplitCollection>, PartmergeError> {
    let split_of = |image_id: ImageId| assignment.get(image_id).or(options.fallback);

    let annotated: HashSet<ImageId> = dataset.annotations.iter().map(|a| a.image_id).collect();

    let mut placed: BTreeMap<ImageId, Split> = BTreeMap::new();
    let mut dropped = 0usize;
    for image in &dataset.images {
        match split_of(image.id) {
            Some(split) => {
                placed.insert(image.id, split);
            }
            None if annotated.contains(&image.id) => {
                return Err(PartmergeError::Coverage {
                    image_id: image.id,
                    file_name: image.file_name.clone(),
                });
            }
            None => {
                log::warn!(
                    "image {} ('{}') has no split and no annotations; skipping it",
                    image.id,
                    image.file_name
                );
                dropped += 1;
            }
        }
    }

    let mut collections: Vec<SplitCollection> = Split::ALL
        .iter()
        .map(|&split| SplitCollection {
            split,
            dataset: Dataset {
                info: dataset.info.clone(),
                licenses: dataset.licenses.clone(),
                images: Vec::new(),
                categories: dataset.categories.clone(),
                annotations: Vec::new(),
            },
        })
        .collect();

    let slot = |split: Split| Split::ALL.iter().position(|s| *s == split).unwrap_or(0);

    for image in &dataset.images {
        if let Some(split) = placed.get(&image.id) {
            collections[slot(*split)].dataset.images.push(image.clone());
        }
    }
    for annotation in &dataset.annotations {
        // Annotations pointing at unknown images are rejected upstream.
        if let Some(split) = placed.get(&annotation.image_id) {
            collections[slot(*split)]
                .dataset
                .annotations
                .push(annotation.clone());
        }
    }

    for collection in &collections {
        log::info!(
            "{} split: {} image(s), {} annotation(s)",
            collection.split,
            collection.image_count(),
            collection.annotation_count()
        );
    }
    if dropped > 0 {
        log::warn!("{} unassigned image(s) without annotations were dropped", dropped);
    }

    Ok(collections)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Annotation, Category, Image};

    fn corpus() -> Dataset {
        Dataset {
            images: vec![
                Image::new(1u64, "train/a.jpg", 10, 10),
                Image::new(2u64, "val/b.jpg", 10, 10),
                Image::new(3u64, "c.jpg", 10, 10),
            ],
            categories: vec![Category::new(1u64, "Leg"), Category::new(2u64, "Arm")],
            annotations: vec![
                Annotation::new(1u64, 1u64, 1u64),
                Annotation::new(2u64, 2u64, 2u64),
                Annotation::new(3u64, 1u64, 2u64),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_partition_places_images_and_annotations() {
        let ds = corpus();
        let assignment = SplitAssignment::from_paths(&ds);
        let parts = partition(&ds, &assignment, &PartitionOptions::default()).unwrap();

        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].split, Split::Train);
        assert_eq!(parts[0].image_count(), 1);
        assert_eq!(parts[0].annotation_count(), 2);
        assert_eq!(parts[1].annotation_count(), 1);
        assert_eq!(parts[2].image_count(), 0);

        // Every split sees the full category table.
        assert!(parts.iter().all(|p| p.dataset.categories.len() == 2));
    }

    #[test]
    fn test_unassigned_annotated_image_is_a_coverage_error() {
        let mut ds = corpus();
        ds.annotations.push(Annotation::new(4u64, 3u64, 1u64));
        let assignment = SplitAssignment::from_paths(&ds);

        let err = partition(&ds, &assignment, &PartitionOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            PartmergeError::Coverage { image_id, .. } if image_id == ImageId(3)
        ));
    }

    #[test]
    fn test_fallback_covers_unassigned_images() {
        let mut ds = corpus();
        ds.annotations.push(Annotation::new(4u64, 3u64, 1u64));
        let assignment = SplitAssignment::from_paths(&ds);
        let options = PartitionOptions {
            fallback: Some(Split::Test),
        };

        let parts = partition(&ds, &assignment, &options).unwrap();
        assert_eq!(parts[2].image_count(), 1);
        assert_eq!(parts[2].annotation_count(), 1);
    }

    #[test]
    fn test_unannotated_unassigned_image_is_dropped() {
        let ds = corpus();
        let assignment = SplitAssignment::from_paths(&ds);
        let parts = partition(&ds, &assignment, &PartitionOptions::default()).unwrap();
        let total: usize = parts.iter().map(SplitCollection::image_count).sum();
        assert_eq!(total, 2);
    }

    #[test]
    fn test_chunks_keep_annotations_with_their_images() {
        let mut ds = Dataset::default();
        for i in 1..=5u64 {
            ds.images.push(Image::new(i, format!("{i}.jpg"), 10, 10));
            ds.annotations.push(Annotation::new(i, i, 1u64));
        }
        let collection = SplitCollection {
            split: Split::Train,
            dataset: ds,
        };

        let chunks = collection.chunks(2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].dataset.images.len(), 1);
        assert_eq!(chunks[2].dataset.annotations[0].image_id, ImageId(5));
        assert_eq!(chunks[0].file_stem("parts"), "parts_train0");
        assert_eq!(chunks[2].file_stem("parts"), "parts_train2");

        let single = collection.chunks(150);
        assert_eq!(single.len(), 1);
        assert_eq!(single[0].file_stem("parts"), "parts_train");
    }
}
