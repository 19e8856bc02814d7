//! COCO JSON reader and writer.
//!
//! The model is already COCO-shaped, so reading and writing is a direct serde
//! pass. The writer never re-sorts: list order in a merged corpus is what
//! instance numbering depends on, so it is written exactly as held.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::model::Dataset;
use crate::error::PartmergeError;

/// A source collection together with the name used in error messages and
/// reports (the file stem of the export).
#[derive(Clone, Debug)]
pub struct Source {
    pub name: String,
    pub dataset: Dataset,
}

impl Source {
    /// Wraps an already-parsed dataset.
    pub fn new(name: impl Into<String>, dataset: Dataset) -> Self {
        Self {
            name: name.into(),
            dataset,
        }
    }
}

/// Reads a dataset from a COCO JSON file.
///
/// # Errors
/// Returns an error if the file cannot be read or is not a COCO document
/// with `images`, `categories` and `annotations`.
///
/// # Example
/// ```no_run
/// use std::path::Path;
/// use partmerge::ir::io_coco_json::read_coco_json;
///
/// let dataset = read_coco_json(Path::new("BipedArm_coco.json"))?;
/// # Ok::<(), partmerge::PartmergeError>(())
/// ```
pub fn read_coco_json(path: &Path) -> Result<Dataset, PartmergeError> {
    let file = File::open(path).map_err(PartmergeError::Io)?;
    let reader = BufReader::new(file);

    serde_json::from_reader(reader).map_err(|source| PartmergeError::CocoJsonParse {
        path: path.to_path_buf(),
        source,
    })
}

/// Reads one source collection, naming it after the file stem.
pub fn read_source(path: &Path) -> Result<Source, PartmergeError> {
    let dataset = read_coco_json(path)?;
    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(Source::new(name, dataset))
}

/// Writes a dataset to a pretty-printed COCO JSON file, creating parent
/// directories as needed.
pub fn write_coco_json(path: &Path, dataset: &Dataset) -> Result<(), PartmergeError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(path).map_err(PartmergeError::Io)?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, dataset).map_err(|source| {
        PartmergeError::CocoJsonWrite {
            path: path.to_path_buf(),
            source,
        }
    })?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Reads a dataset from a COCO JSON string.
///
/// Useful for testing without file I/O.
pub fn from_coco_str(json: &str) -> Result<Dataset, serde_json::Error> {
    serde_json::from_str(json)
}

/// Reads a dataset from a COCO JSON byte slice.
pub fn from_coco_slice(bytes: &[u8]) -> Result<Dataset, serde_json::Error> {
    serde_json::from_slice(bytes)
}

/// Writes a dataset to a pretty-printed COCO JSON string.
pub fn to_coco_string(dataset: &Dataset) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(dataset)
}

/// Expands the given inputs into an ordered list of source files.
///
/// Files are kept in the order given. A directory expands to every `.json`
/// file beneath it, sorted by path, so the same directory always yields the
/// same source order.
pub fn discover_sources(inputs: &[PathBuf]) -> Result<Vec<PathBuf>, PartmergeError> {
    let mut files = Vec::new();

    for input in inputs {
        if input.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(input)
                .follow_links(true)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|path| {
                    path.extension()
                        .map(|ext| ext.eq_ignore_ascii_case("json"))
                        .unwrap_or(false)
                })
                .collect();
            found.sort();
            log::debug!("found {} source file(s) in {}", found.len(), input.display());
            files.extend(found);
        } else if input.is_file() {
            files.push(input.clone());
        } else {
            return Err(PartmergeError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("source not found: {}", input.display()),
            )));
        }
    }

    if files.is_empty() {
        return Err(PartmergeError::NoSources);
    }
    Ok(files)
}

/// Discovers and reads every source, preserving discovery order.
pub fn read_sources(inputs: &[PathBuf]) -> Result<Vec<Source>, PartmergeError> {
    let sources = discover_sources(inputs)?
        .iter()
        .map(|path| read_source(path))
        .collect::<Result<Vec<_>, _>>()?;
    log::info!("loaded {} source collection(s)", sources.len());
    Ok(sources)
}
