//! Package manifest and the human-readable documents written beside it.

use std::fmt;
use std::fmt::Write as _;

use serde::Serialize;

use super::EmitMode;
use crate::ir::Category;
use crate::split::Split;

/// One annotation file in the package.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ManifestEntry {
    pub split: Split,
    /// 0-based chunk number, present only for chunked splits.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,
    /// Path relative to the package root.
    pub annotation_file: String,
    pub images: usize,
    pub annotations: usize,
    pub categories: usize,
}

/// Summary of an emitted package, written as `manifest.json`.
#[derive(Clone, Debug, Serialize)]
pub struct Manifest {
    pub name: String,
    pub mode: EmitMode,
    pub max_images: usize,
    pub entries: Vec<ManifestEntry>,
    pub categories: Vec<Category>,
    /// Archive path, when one was written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive: Option<String>,
}

impl Manifest {
    pub fn new(name: impl Into<String>, mode: EmitMode, max_images: usize) -> Self {
        Self {
            name: name.into(),
            mode,
            max_images,
            entries: Vec::new(),
            categories: Vec::new(),
            archive: None,
        }
    }

    pub fn image_count(&self) -> usize {
        self.entries.iter().map(|e| e.images).sum()
    }

    pub fn annotation_count(&self) -> usize {
        self.entries.iter().map(|e| e.annotations).sum()
    }

    /// Renders `dataset_info.txt`.
    pub fn dataset_info(&self) -> String {
        let mut out = String::new();
        let title = format!("Dataset package: {} ({})", self.name, self.mode.describe());
        let _ = writeln!(out, "{}", title);
        let _ = writeln!(out, "{}", "=".repeat(title.len()));
        let _ = writeln!(out);
        let _ = writeln!(out, "Mode: {}", self.mode);
        let _ = writeln!(out, "Max images per file: {}", self.max_images);
        let _ = writeln!(out, "Images: {}", self.image_count());
        let _ = writeln!(out, "Annotations: {}", self.annotation_count());
        let _ = writeln!(out, "Categories: {}", self.categories.len());
        let _ = writeln!(out);

        let _ = writeln!(out, "Annotation files:");
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "- {} [{}]: {} images, {} annotations, {} categories",
                entry.annotation_file,
                entry.split,
                entry.images,
                entry.annotations,
                entry.categories
            );
        }
        let _ = writeln!(out);

        let _ = writeln!(out, "Package structure:");
        let _ = writeln!(out, "├── annotations/");
        let _ = writeln!(out, "├── manifest.json");
        let _ = writeln!(out, "├── README.md");
        if self.mode == EmitMode::Full {
            let _ = writeln!(out, "├── images/<split>/");
        }
        let _ = writeln!(out, "└── dataset_info.txt   (this file)");
        let _ = writeln!(out);

        let _ = writeln!(out, "Category information:");
        for category in &self.categories {
            let _ = writeln!(out, "- {} (ID: {})", category.name, category.id);
        }
        out
    }

    /// Renders `README.md`.
    pub fn readme(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "# {} ({})", self.name, self.mode.describe());
        let _ = writeln!(out);
        match self.mode {
            EmitMode::AnnotationsOnly => {
                let _ = writeln!(
                    out,
                    "COCO annotation files only. Image entries keep their file name and \
                     dimensions but reference no pixel data."
                );
            }
            EmitMode::Full => {
                let _ = writeln!(
                    out,
                    "COCO annotation files with image payloads under `images/<split>/`."
                );
            }
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "## Splits");
        let _ = writeln!(out);
        let _ = writeln!(out, "| File | Split | Images | Annotations |");
        let _ = writeln!(out, "|------|-------|--------|-------------|");
        for entry in &self.entries {
            let _ = writeln!(
                out,
                "| `{}` | {} | {} | {} |",
                entry.annotation_file, entry.split, entry.images, entry.annotations
            );
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "## Categories");
        let _ = writeln!(out);
        let names: Vec<&str> = self.categories.iter().map(|c| c.name.as_str()).collect();
        let _ = writeln!(out, "{}", names.join(", "));
        let _ = writeln!(out);
        let _ = writeln!(out, "## Instance fields");
        let _ = writeln!(out);
        let _ = writeln!(
            out,
            "Every annotation carries `category_name`, `instance_id` (0-based, in order of \
             appearance per image and category) and `image_category_key` (`<image_id>_<category_id>`)."
        );
        out
    }
}

impl fmt::Display for Manifest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Emitted '{}' ({}): {} images, {} annotations, {} categories",
            self.name,
            self.mode,
            self.image_count(),
            self.annotation_count(),
            self.categories.len()
        )?;
        for entry in &self.entries {
            writeln!(
                f,
                "  {}: {} images, {} annotations",
                entry.annotation_file, entry.images, entry.annotations
            )?;
        }
        if let Some(archive) = &self.archive {
            writeln!(f, "  archive: {}", archive)?;
        }
        Ok(())
    }
}
