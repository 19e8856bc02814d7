//! In-memory instance index over an enriched corpus.
//!
//! Maps each composite key to its annotations ordered by instance id. The
//! index borrows the dataset and is never persisted; rebuild it whenever the
//! annotations change.
//!
//! Both access patterns, by category id and by category name, go through one
//! [`InstanceLookup`] so there is a single code path over the key.

use std::collections::HashMap;

use crate::enrich::CompositeKey;
use crate::ir::{Annotation, CategoryId, Dataset, ImageId};

/// A resolved query against an [`InstanceIndex`].
///
/// Built with [`InstanceIndex::by_ids`] or [`InstanceIndex::by_name`]. A
/// category name the index does not know resolves to a lookup that matches
/// nothing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InstanceLookup {
    key: Option<CompositeKey>,
}

impl InstanceLookup {
    /// The composite key this lookup targets, if the category resolved.
    pub fn key(&self) -> Option<CompositeKey> {
        self.key
    }
}

/// Composite key → annotations, plus a category name → id reverse table.
#[derive(Debug)]
pub struct InstanceIndex<'a> {
    entries: HashMap<CompositeKey, Vec<&'a Annotation>>,
    category_ids: HashMap<&'a str, CategoryId>,
}

impl<'a> InstanceIndex<'a> {
    /// Builds the index from the dataset's annotations.
    pub fn build(dataset: &'a Dataset) -> Self {
        let mut entries: HashMap<CompositeKey, Vec<&'a Annotation>> = HashMap::new();
        for annotation in &dataset.annotations {
            entries
                .entry(CompositeKey::new(annotation.image_id, annotation.category_id))
                .or_default()
                .push(annotation);
        }
        // Already ascending when built from an enriched corpus; the stable
        // sort keeps appearance order for annotations that were never enriched.
        for list in entries.values_mut() {
            list.sort_by_key(|a| a.instance_id);
        }

        let category_ids = dataset
            .categories
            .iter()
            .map(|c| (c.name.as_str(), c.id))
            .collect();

        log::info!("built instance index with {} key(s)", entries.len());
        Self {
            entries,
            category_ids,
        }
    }

    /// Lookup by (image id, category id).
    pub fn by_ids(
        &self,
        image_id: impl Into<ImageId>,
        category_id: impl Into<CategoryId>,
    ) -> InstanceLookup {
        InstanceLookup {
            key: Some(CompositeKey::new(image_id, category_id)),
        }
    }

    /// Lookup by (image id, category name), resolving the name first.
    pub fn by_name(&self, image_id: impl Into<ImageId>, category_name: &str) -> InstanceLookup {
        let image_id = image_id.into();
        InstanceLookup {
            key: self
                .category_ids
                .get(category_name)
                .map(|&category_id| CompositeKey::new(image_id, category_id)),
        }
    }

    /// Annotations matching `lookup`, ordered by instance id. Empty when
    /// nothing matches.
    pub fn get(&self, lookup: InstanceLookup) -> &[&'a Annotation] {
        lookup
            .key
            .and_then(|key| self.entries.get(&key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// One instance of a lookup.
    pub fn instance(&self, lookup: InstanceLookup, instance_id: u32) -> Option<&'a Annotation> {
        self.get(lookup)
            .iter()
            .copied()
            .find(|a| a.instance_id == Some(instance_id))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
