//! Writing split collections out as a self-describing package.
//!
//! Layout under the output directory:
//!
//! ```text
//! manifest.json
//! dataset_info.txt
//! README.md
//! annotations/<name>_<split>[<chunk>].json
//! images/<split>/<file>            (full mode only)
//! ```
//!
//! Every image's `file_name` is rewritten to `<split>/<basename>` so files
//! from different splits never collide once uploaded into one namespace.

mod archive;
mod manifest;

pub use archive::{archive_path, write_archive};
pub use manifest::{Manifest, ManifestEntry};

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Serialize;

use crate::error::PartmergeError;
use crate::ir::io_coco_json::write_coco_json;
use crate::ir::{Dataset, ImageId};
use crate::split::{Split, SplitCollection};

/// Largest number of images written to one annotation file.
pub const DEFAULT_MAX_IMAGES: usize = 150;

/// Whether image payloads travel with the annotations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmitMode {
    /// Image entries keep name and dimensions; no pixel data is written or
    /// referenced.
    #[default]
    AnnotationsOnly,
    /// Payloads are copied into `images/<split>/`.
    Full,
}

impl EmitMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmitMode::AnnotationsOnly => "annotations-only",
            EmitMode::Full => "full",
        }
    }

    /// Title-case label used in documents and descriptions.
    pub fn describe(&self) -> &'static str {
        match self {
            EmitMode::AnnotationsOnly => "Annotations Only",
            EmitMode::Full => "Full",
        }
    }
}

impl fmt::Display for EmitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EmitMode {
    type Err = PartmergeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "annotations-only" => Ok(EmitMode::AnnotationsOnly),
            "full" => Ok(EmitMode::Full),
            other => Err(PartmergeError::UnsupportedMode(other.to_string())),
        }
    }
}

/// Options for [`emit`].
#[derive(Clone, Debug)]
pub struct EmitOptions {
    pub mode: EmitMode,
    /// Package directory.
    pub out_dir: PathBuf,
    /// Prefix of every annotation file name.
    pub name: String,
    /// Chunk size; 0 writes each split as one file.
    pub max_images: usize,
    /// Emit only this split.
    pub only: Option<Split>,
    /// Directory image payloads are read from in full mode.
    pub images_root: Option<PathBuf>,
    /// Also write `<out_dir>.zip`.
    pub zip: bool,
}

impl EmitOptions {
    pub fn new(out_dir: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        Self {
            mode: EmitMode::default(),
            out_dir: out_dir.into(),
            name: name.into(),
            max_images: DEFAULT_MAX_IMAGES,
            only: None,
            images_root: None,
            zip: false,
        }
    }

    fn check(&self) -> Result<(), PartmergeError> {
        if self.name.trim().is_empty() || self.name.contains(['/', '\\']) {
            return Err(PartmergeError::InvalidOptions {
                message: format!("'{}' is not a usable package name", self.name),
            });
        }
        if self.mode == EmitMode::Full && self.images_root.is_none() {
            return Err(PartmergeError::InvalidOptions {
                message: "full mode needs an images root to copy payloads from".to_string(),
            });
        }
        Ok(())
    }
}

/// An image whose payload has to be copied in full mode.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Payload {
    image_id: ImageId,
    original: String,
    rewritten: String,
    width: u32,
    height: u32,
}

/// A split with rewritten file names, ready to be chunked and written.
#[derive(Clone, Debug)]
struct PreparedSplit {
    collection: SplitCollection,
    payloads: Vec<Payload>,
}

/// `<split>/<basename>` for an image, where the basename drops any URL query
/// or fragment. Names without an extension become `image_<id>.jpg`.
pub fn rewrite_file_name(split: Split, image_id: ImageId, file_name: &str) -> String {
    let base = basename(file_name);
    let has_extension = Path::new(base)
        .extension()
        .map(|ext| !ext.is_empty())
        .unwrap_or(false);
    if has_extension {
        format!("{}/{}", split, base)
    } else {
        format!("{}/image_{}.jpg", split, image_id)
    }
}

fn strip_query(file_name: &str) -> &str {
    file_name.split(['?', '#']).next().unwrap_or(file_name)
}

fn basename(file_name: &str) -> &str {
    let path = strip_query(file_name);
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Where a payload lives below the images root. URL names resolve to their
/// path component.
fn payload_relative_path(file_name: &str) -> PathBuf {
    let path = strip_query(file_name);
    let path = match path.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, p)| p).unwrap_or(""),
        None => path,
    };
    path.split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect()
}

fn describe_split(info: Option<&serde_json::Value>, split: Split, mode: EmitMode) -> serde_json::Value {
    let suffix = match mode {
        EmitMode::AnnotationsOnly => format!("{} Split (Annotations Only)", split.title()),
        EmitMode::Full => format!("{} Split", split.title()),
    };

    let mut info = match info {
        Some(serde_json::Value::Object(map)) => map.clone(),
        _ => serde_json::Map::new(),
    };
    let description = match info.get("description").and_then(|d| d.as_str()) {
        Some(existing) if !existing.is_empty() => format!("{} - {}", existing, suffix),
        _ => suffix,
    };
    info.insert("description".into(), serde_json::Value::String(description));
    serde_json::Value::Object(info)
}

fn prepare_split(collection: &SplitCollection, mode: EmitMode) -> Result<PreparedSplit, PartmergeError> {
    let split = collection.split;
    let mut dataset = collection.dataset.clone();
    let mut seen: HashMap<String, ImageId> = HashMap::with_capacity(dataset.images.len());
    let mut payloads = Vec::with_capacity(dataset.images.len());

    for image in &mut dataset.images {
        let rewritten = rewrite_file_name(split, image.id, &image.file_name);
        if let Some(&first) = seen.get(&rewritten) {
            return Err(PartmergeError::DuplicateFileName {
                split,
                file_name: rewritten,
                first,
                second: image.id,
            });
        }
        seen.insert(rewritten.clone(), image.id);

        payloads.push(Payload {
            image_id: image.id,
            original: std::mem::replace(&mut image.file_name, rewritten.clone()),
            rewritten,
            width: image.width,
            height: image.height,
        });

        if mode == EmitMode::AnnotationsOnly {
            image.strip_payload_references();
        }
    }

    dataset.info = Some(describe_split(dataset.info.as_ref(), split, mode));

    Ok(PreparedSplit {
        collection: SplitCollection { split, dataset },
        payloads,
    })
}

fn payload_source(images_root: &Path, payload: &Payload) -> PathBuf {
    images_root.join(payload_relative_path(&payload.original))
}

fn check_payloads(payloads: &[Payload], images_root: &Path) -> Result<(), PartmergeError> {
    for payload in payloads {
        let source = payload_source(images_root, payload);
        if !source.is_file() {
            return Err(PartmergeError::PayloadMissing { path: source });
        }
    }
    Ok(())
}

fn copy_payloads(payloads: &[Payload], images_root: &Path, out_dir: &Path) -> Result<(), PartmergeError> {
    for payload in payloads {
        let source = payload_source(images_root, payload);

        match imagesize::size(&source) {
            Ok(size) if size.width != payload.width as usize || size.height != payload.height as usize => {
                log::warn!(
                    "image {} ('{}') is {}x{} on disk but {}x{} in the annotations",
                    payload.image_id,
                    payload.original,
                    size.width,
                    size.height,
                    payload.width,
                    payload.height
                );
            }
            Ok(_) => {}
            Err(err) => {
                log::warn!(
                    "could not read dimensions of {}: {}",
                    source.display(),
                    err
                );
            }
        }

        let target = out_dir.join("images").join(&payload.rewritten);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&source, &target)?;
    }
    log::debug!("copied {} payload(s) from {}", payloads.len(), images_root.display());
    Ok(())
}

fn write_text(path: &Path, contents: &str) -> Result<(), PartmergeError> {
    std::fs::write(path, contents)?;
    Ok(())
}

/// Removes what an earlier emit left under `out_dir`, so the package holds
/// exactly what the new manifest lists.
fn clear_previous_output(out_dir: &Path) -> Result<(), PartmergeError> {
    for dir in ["annotations", "images"] {
        let path = out_dir.join(dir);
        if path.is_dir() {
            log::debug!("removing stale {}", path.display());
            std::fs::remove_dir_all(&path)?;
        }
    }
    Ok(())
}

/// Writes `collections` as one package and returns its manifest.
///
/// Empty splits are skipped. Nothing is written until every selected split
/// has had its file names rewritten and checked and, in full mode, every
/// payload has been found. Annotation and image directories left by an
/// earlier emit into the same directory are replaced.
///
/// # Errors
/// [`PartmergeError::DuplicateFileName`] if two images of a split end up with
/// the same rewritten name, [`PartmergeError::PayloadMissing`] in full mode
/// when a payload is absent, plus IO and archive failures.
pub fn emit(collections: &[SplitCollection], options: &EmitOptions) -> Result<Manifest, PartmergeError> {
    options.check()?;

    let selected: Vec<&SplitCollection> = collections
        .iter()
        .filter(|c| options.only.map(|only| only == c.split).unwrap_or(true))
        .collect();

    // Check every split before anything touches the disk.
    let mut prepared = Vec::with_capacity(selected.len());
    for collection in selected {
        if collection.dataset.images.is_empty() {
            log::info!("{} split is empty; nothing to emit", collection.split);
            continue;
        }
        let part = prepare_split(collection, options.mode)?;
        if options.mode == EmitMode::Full {
            if let Some(root) = &options.images_root {
                check_payloads(&part.payloads, root)?;
            }
        }
        prepared.push(part);
    }

    let out_dir = &options.out_dir;
    clear_previous_output(out_dir)?;
    std::fs::create_dir_all(out_dir.join("annotations"))?;

    let mut manifest = Manifest::new(&options.name, options.mode, options.max_images);
    manifest.categories = collections
        .first()
        .map(|c| c.dataset.categories.clone())
        .unwrap_or_default();

    for part in &prepared {
        if options.mode == EmitMode::Full {
            if let Some(root) = &options.images_root {
                copy_payloads(&part.payloads, root, out_dir)?;
            }
        }

        for chunk in part.collection.chunks(options.max_images) {
            let annotation_file = format!("annotations/{}.json", chunk.file_stem(&options.name));
            write_coco_json(&out_dir.join(&annotation_file), &chunk.dataset)?;
            log::debug!("wrote {}", annotation_file);

            manifest.entries.push(ManifestEntry {
                split: chunk.split,
                chunk: chunk.index,
                annotation_file,
                images: chunk.dataset.images.len(),
                annotations: chunk.dataset.annotations.len(),
                categories: chunk.dataset.categories.len(),
            });
        }
    }

    let manifest_path = out_dir.join("manifest.json");
    let json = serde_json::to_string_pretty(&manifest).map_err(|source| {
        PartmergeError::CocoJsonWrite {
            path: manifest_path.clone(),
            source,
        }
    })?;
    write_text(&manifest_path, &format!("{}\n", json))?;
    write_text(&out_dir.join("dataset_info.txt"), &manifest.dataset_info())?;
    write_text(&out_dir.join("README.md"), &manifest.readme())?;

    if options.zip {
        // `.` and `..` have no name to build `<dir>.zip` from.
        let package_dir = std::fs::canonicalize(out_dir)?;
        let zip_path = archive_path(&package_dir);
        write_archive(&package_dir, &zip_path)?;
        manifest.archive = Some(zip_path.display().to_string());
    }

    log::info!(
        "emitted {} annotation file(s) to {}",
        manifest.entries.len(),
        out_dir.display()
    );
    Ok(manifest)
}

/// Reads back the annotation files listed in a manifest, for inspection and
/// tests.
pub fn read_emitted(out_dir: &Path, manifest: &Manifest) -> Result<Vec<(ManifestEntry, Dataset)>, PartmergeError> {
    manifest
        .entries
        .iter()
        .map(|entry| {
            let dataset =
                crate::ir::io_coco_json::read_coco_json(&out_dir.join(&entry.annotation_file))?;
            Ok((entry.clone(), dataset))
        })
        .collect()
}
