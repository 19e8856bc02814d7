//! Identifier remapping into one global id space.
//!
//! Each source is numbered independently, so ids collide across sources.
//! Sources are remapped strictly in caller order: a source's entities get
//! `mark + 1 ..= mark + count` (in their within-source order) and the mark
//! then advances by `count`. The first source therefore always owns the
//! lowest range and the same source order always yields the same ids.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;

use crate::error::PartmergeError;
use crate::ir::{AnnotationId, CategoryId, Dataset, ImageId, Source};

/// Running high-water mark per entity kind.
///
/// Threaded explicitly through every [`remap_source`] call; this is the only
/// state shared between sources, so remapping is the single sequential step.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct HighWaterMarks {
    pub images: u64,
    pub annotations: u64,
    /// Provisional only; the category unifier assigns the final ids.
    pub categories: u64,
}

/// Bidirectional original ↔ new id table for one source and one entity kind.
#[derive(Clone, Debug)]
pub struct IdMap<T> {
    forward: HashMap<T, T>,
    reverse: HashMap<T, T>,
    first: Option<T>,
    last: Option<T>,
}

impl<T> Default for IdMap<T> {
    fn default() -> Self {
        Self {
            forward: HashMap::new(),
            reverse: HashMap::new(),
            first: None,
            last: None,
        }
    }
}

impl<T> IdMap<T>
where
    T: Copy + Eq + Hash + From<u64>,
{
    /// Assigns `mark + 1, mark + 2, ...` to `originals` in order and advances
    /// `mark` by their count.
    fn assign(originals: impl IntoIterator<Item = T>, mark: &mut u64) -> Self {
        let mut map = Self::default();
        for original in originals {
            *mark += 1;
            let new = T::from(*mark);
            map.forward.insert(original, new);
            map.reverse.insert(new, original);
            map.first.get_or_insert(new);
            map.last = Some(new);
        }
        map
    }

    /// The new id assigned to `original`.
    pub fn new_id(&self, original: T) -> Option<T> {
        self.forward.get(&original).copied()
    }

    /// The original id that became `new`.
    pub fn original_id(&self, new: T) -> Option<T> {
        self.reverse.get(&new).copied()
    }

    /// Inclusive range of new ids, or `None` for an empty source.
    pub fn range(&self) -> Option<(T, T)> {
        self.first.zip(self.last)
    }

    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }
}

/// The id tables produced for one source.
#[derive(Clone, Debug, Default)]
pub struct SourceRemap {
    pub source: String,
    pub images: IdMap<ImageId>,
    pub annotations: IdMap<AnnotationId>,
    /// Source category id → provisional merged id.
    pub categories: IdMap<CategoryId>,
}

/// A source rewritten into the global id space.
#[derive(Clone, Debug)]
pub struct RemappedSource {
    pub name: String,
    pub dataset: Dataset,
    pub remap: SourceRemap,
}

/// Remaps one validated source and advances `marks`.
///
/// Derived enrichment fields carried by the source are dropped here; they are
/// recomputed once the canonical category table exists.
pub fn remap_source(
    source: &Source,
    marks: &mut HighWaterMarks,
) -> Result<RemappedSource, PartmergeError> {
    let dataset = &source.dataset;

    if dataset.is_empty() {
        log::debug!("{}: empty source, nothing to remap", source.name);
    }

    let images = IdMap::assign(dataset.images.iter().map(|i| i.id), &mut marks.images);
    let categories = IdMap::assign(
        dataset.categories.iter().map(|c| c.id),
        &mut marks.categories,
    );
    let annotations = IdMap::assign(
        dataset.annotations.iter().map(|a| a.id),
        &mut marks.annotations,
    );

    let mut out = dataset.clone();

    for image in &mut out.images {
        image.id = images.new_id(image.id).unwrap_or(image.id);
    }
    for category in &mut out.categories {
        category.id = categories.new_id(category.id).unwrap_or(category.id);
    }
    for annotation in &mut out.annotations {
        let original = annotation.id;
        annotation.id = annotations.new_id(original).unwrap_or(original);
        annotation.image_id = images.new_id(annotation.image_id).ok_or_else(|| {
            PartmergeError::DanglingReference {
                annotation_id: original,
                message: format!(
                    "image {} is not in source '{}'",
                    annotation.image_id, source.name
                ),
            }
        })?;
        annotation.category_id = categories.new_id(annotation.category_id).ok_or_else(|| {
            PartmergeError::DanglingReference {
                annotation_id: original,
                message: format!(
                    "category {} is not in source '{}'",
                    annotation.category_id, source.name
                ),
            }
        })?;
        annotation.clear_enrichment();
    }

    log::debug!(
        "{}: remapped {} image(s), {} annotation(s), {} category(ies)",
        source.name,
        images.len(),
        annotations.len(),
        categories.len()
    );

    Ok(RemappedSource {
        name: source.name.clone(),
        dataset: out,
        remap: SourceRemap {
            source: source.name.clone(),
            images,
            annotations,
            categories,
        },
    })
}
