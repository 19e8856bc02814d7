//! Zipping an emitted package directory.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::PartmergeError;

/// The archive path for a package directory: `<dir>.zip` beside it.
///
/// Pass a canonical path; `.` or `..` have no file name and fall back to
/// `package.zip` inside the directory.
pub fn archive_path(package_dir: &Path) -> PathBuf {
    let mut name = package_dir
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "package".into());
    name.push(".zip");
    package_dir.with_file_name(name)
}

/// Writes every file under `package_dir` into a deflated zip at `zip_path`.
/// Entries are stored relative to `package_dir`, in sorted order. The archive
/// itself is skipped if it lies inside `package_dir`.
pub fn write_archive(package_dir: &Path, zip_path: &Path) -> Result<usize, PartmergeError> {
    let archive_error = |source: zip::result::ZipError| PartmergeError::Archive {
        path: zip_path.to_path_buf(),
        source,
    };

    if let Some(parent) = zip_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let file = File::create(zip_path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut written = 0usize;
    for entry in WalkDir::new(package_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| PartmergeError::Io(e.into()))?;
        if !entry.file_type().is_file() || entry.path() == zip_path {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(package_dir)
            .unwrap_or(entry.path());
        // Zip entry names always use forward slashes.
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");

        zip.start_file(name, options).map_err(archive_error)?;
        let bytes = std::fs::read(entry.path())?;
        zip.write_all(&bytes)?;
        written += 1;
    }

    zip.finish().map_err(archive_error)?;
    log::info!("wrote {} file(s) to {}", written, zip_path.display());
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_archive_path_sits_beside_the_directory() {
        assert_eq!(
            archive_path(Path::new("out/parts")),
            PathBuf::from("out/parts.zip")
        );
    }

    #[test]
    fn test_archive_of_canonical_parent_dir_lands_beside_it() {
        let temp = tempfile::tempdir().unwrap();
        let package = temp.path().join("pkg");
        std::fs::create_dir_all(package.join("sub")).unwrap();

        let dotted = package.join("sub/..");
        assert_eq!(archive_path(&dotted).file_name().unwrap(), "package.zip");

        let canonical = std::fs::canonicalize(&dotted).unwrap();
        let zip_path = archive_path(&canonical);
        assert_eq!(zip_path.file_name().unwrap(), "pkg.zip");
        assert!(!zip_path.starts_with(&canonical));
    }

    #[test]
    fn test_write_archive_skips_itself() {
        let temp = tempfile::tempdir().unwrap();
        let package = temp.path().join("pkg");
        std::fs::create_dir_all(&package).unwrap();
        std::fs::write(package.join("manifest.json"), "{}").unwrap();

        let inside = package.join("package.zip");
        assert_eq!(write_archive(&package, &inside).unwrap(), 1);
    }

    #[test]
    fn test_write_archive_includes_nested_files() {
        let temp = tempfile::tempdir().unwrap();
        let package = temp.path().join("pkg");
        std::fs::create_dir_all(package.join("annotations")).unwrap();
        std::fs::write(package.join("manifest.json"), "{}").unwrap();
        std::fs::write(package.join("annotations/a_train.json"), "{}").unwrap();

        let zip_path = archive_path(&package);
        assert_eq!(write_archive(&package, &zip_path).unwrap(), 2);
        assert!(zip_path.is_file());

        let bytes = std::fs::read(&zip_path).unwrap();
        let haystack = String::from_utf8_lossy(&bytes);
        assert!(haystack.contains("annotations/a_train.json"));
    }
}
