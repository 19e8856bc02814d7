//! Instance enrichment of a merged corpus.
//!
//! One pass over the annotations in stored order fills three derived fields:
//! the category name, the composite `image_category` key, and the instance
//! id, a running 0-based counter per key. Appearance order is authoritative,
//! so "instance 0" always means the first mask recorded for that image and
//! category, and recomputing on the same input gives the same ids.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::PartmergeError;
use crate::ir::{CategoryId, Dataset, ImageId};

/// Separator between the two halves of a composite key. Both halves are
/// decimal integers, so it can never appear inside either.
pub const KEY_DELIMITER: char = '_';

/// The (image, category) pair that instance numbering is scoped to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct CompositeKey {
    pub image_id: ImageId,
    pub category_id: CategoryId,
}

impl CompositeKey {
    pub fn new(image_id: impl Into<ImageId>, category_id: impl Into<CategoryId>) -> Self {
        Self {
            image_id: image_id.into(),
            category_id: category_id.into(),
        }
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.image_id, KEY_DELIMITER, self.category_id)
    }
}

impl FromStr for CompositeKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (image, category) = s
            .split_once(KEY_DELIMITER)
            .ok_or_else(|| format!("'{}' has no '{}' delimiter", s, KEY_DELIMITER))?;
        let image: u64 = image
            .parse()
            .map_err(|_| format!("'{}' is not a valid image id", image))?;
        let category: u64 = category
            .parse()
            .map_err(|_| format!("'{}' is not a valid category id", category))?;
        Ok(Self::new(image, category))
    }
}

/// Counts produced by [`enrich_dataset`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct EnrichSummary {
    pub annotations: usize,
    /// Distinct (image, category) pairs.
    pub keys: usize,
    /// Largest number of instances sharing one key.
    pub max_instances: u32,
}

/// Fills `category_name`, `image_category_key` and `instance_id` on every
/// annotation, overwriting whatever was there.
///
/// # Errors
/// [`PartmergeError::DanglingReference`] if an annotation's image or
/// category is not in the dataset.
pub fn enrich_dataset(dataset: &mut Dataset) -> Result<EnrichSummary, PartmergeError> {
    let Dataset {
        images,
        categories,
        annotations,
        ..
    } = dataset;

    let image_ids: HashSet<ImageId> = images.iter().map(|i| i.id).collect();
    let names: HashMap<CategoryId, &str> = categories
        .iter()
        .map(|c| (c.id, c.name.as_str()))
        .collect();
    let mut counters: HashMap<CompositeKey, u32> = HashMap::new();

    for annotation in annotations.iter_mut() {
        if !image_ids.contains(&annotation.image_id) {
            return Err(PartmergeError::DanglingReference {
                annotation_id: annotation.id,
                message: format!("image {} is not in the dataset", annotation.image_id),
            });
        }
        let name = names.get(&annotation.category_id).ok_or_else(|| {
            PartmergeError::DanglingReference {
                annotation_id: annotation.id,
                message: format!("category {} is not in the dataset", annotation.category_id),
            }
        })?;

        let key = CompositeKey::new(annotation.image_id, annotation.category_id);
        let counter = counters.entry(key).or_insert(0);

        annotation.category_name = Some((*name).to_string());
        annotation.image_category_key = Some(key.to_string());
        annotation.instance_id = Some(*counter);
        *counter += 1;
    }

    let summary = EnrichSummary {
        annotations: annotations.len(),
        keys: counters.len(),
        max_instances: counters.values().copied().max().unwrap_or(0),
    };
    log::info!(
        "enriched {} annotation(s) across {} image/category pair(s)",
        summary.annotations,
        summary.keys
    );
    Ok(summary)
}
