//! Category unification across remapped sources.
//!
//! Names are the join key: exact, case-sensitive match. The first source that
//! mentions a name fixes its canonical entry; later mentions reuse it. Any
//! metadata divergence (currently the supercategory, including casing) is a
//! [`PartmergeError::CategoryConflict`] for a human to reconcile.

use std::collections::HashMap;

use crate::error::PartmergeError;
use crate::ir::{Category, CategoryId};

use super::remap::RemappedSource;

/// The canonical category table plus the provisional → canonical mapping.
#[derive(Clone, Debug, Default)]
pub struct CategoryTable {
    /// Canonical categories, ids `1..=len` in first-appearance order.
    pub categories: Vec<Category>,
    by_name: HashMap<String, usize>,
    origin: Vec<String>,
    provisional: HashMap<CategoryId, CategoryId>,
    folded: usize,
}

impl CategoryTable {
    /// Canonical id for a provisional (remapped) category id.
    pub fn canonical_id(&self, provisional: CategoryId) -> Option<CategoryId> {
        self.provisional.get(&provisional).copied()
    }

    /// Canonical id for a category name.
    pub fn id_for_name(&self, name: &str) -> Option<CategoryId> {
        self.by_name.get(name).map(|&idx| self.categories[idx].id)
    }

    /// Name of the source that introduced `name`.
    pub fn origin_of(&self, name: &str) -> Option<&str> {
        self.by_name.get(name).map(|&idx| self.origin[idx].as_str())
    }

    /// Number of source category entries that reused an existing name.
    pub fn folded(&self) -> usize {
        self.folded
    }

    fn admit(&mut self, source: &str, category: &Category) -> Result<CategoryId, PartmergeError> {
        if let Some(&idx) = self.by_name.get(&category.name) {
            let canonical = &self.categories[idx];
            if canonical.supercategory != category.supercategory {
                return Err(PartmergeError::CategoryConflict {
                    name: category.name.clone(),
                    first_source: self.origin[idx].clone(),
                    first: describe_supercategory(&canonical.supercategory),
                    conflicting_source: source.to_string(),
                    conflicting: describe_supercategory(&category.supercategory),
                });
            }
            self.folded += 1;
            return Ok(canonical.id);
        }

        let id = CategoryId::new(self.categories.len() as u64 + 1);
        self.by_name.insert(category.name.clone(), self.categories.len());
        self.origin.push(source.to_string());
        self.categories.push(Category {
            id,
            name: category.name.clone(),
            supercategory: category.supercategory.clone(),
        });
        Ok(id)
    }
}

fn describe_supercategory(supercategory: &Option<String>) -> String {
    match supercategory {
        Some(s) => format!("supercategory '{}'", s),
        None => "no supercategory".to_string(),
    }
}

/// Builds the canonical table from every source's categories, in source
/// order then within-source order.
pub fn unify_categories(sources: &[RemappedSource]) -> Result<CategoryTable, PartmergeError> {
    let mut table = CategoryTable::default();

    for source in sources {
        for category in &source.dataset.categories {
            let canonical = table.admit(&source.name, category)?;
            table.provisional.insert(category.id, canonical);
        }
    }

    log::info!(
        "unified {} category entries into {} canonical categories",
        table.provisional.len(),
        table.categories.len()
    );
    Ok(table)
}
