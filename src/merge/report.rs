//! Merge report: what each source contributed and where its ids landed.

use serde::Serialize;
use std::fmt;

/// Per-source contribution to a merge.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SourceSummary {
    pub name: String,
    pub images: usize,
    pub annotations: usize,
    pub categories: usize,
    /// Inclusive merged image id range.
    pub image_ids: Option<(u64, u64)>,
    /// Inclusive merged annotation id range.
    pub annotation_ids: Option<(u64, u64)>,
}

/// Summary of one merge run.
#[derive(Clone, Debug, Default, Serialize)]
pub struct MergeReport {
    pub sources: Vec<SourceSummary>,
    pub images: usize,
    pub annotations: usize,
    pub categories: usize,
    /// Source category entries that reused an existing canonical name.
    pub folded_categories: usize,
    /// File names used by images from more than one source. These only
    /// become fatal if they end up in the same emitted split.
    pub shared_file_names: usize,
}

impl fmt::Display for MergeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Merged {} source(s): {} images, {} categories, {} annotations",
            self.sources.len(),
            self.images,
            self.categories,
            self.annotations
        )?;

        for source in &self.sources {
            write!(
                f,
                "  {}: {} images, {} annotations, {} categories",
                source.name, source.images, source.annotations, source.categories
            )?;
            match source.image_ids {
                Some((lo, hi)) => writeln!(f, " (image ids {}..={})", lo, hi)?,
                None => writeln!(f, " (empty)")?,
            }
        }

        if self.folded_categories > 0 {
            writeln!(
                f,
                "  {} category entr(ies) folded into existing names",
                self.folded_categories
            )?;
        }
        if self.shared_file_names > 0 {
            writeln!(
                f,
                "  {} file name(s) appear in more than one source",
                self.shared_file_names
            )?;
        }

        Ok(())
    }
}
