//! Zip packaging of a bag directory.

use crate::{BagError, BagResult};
use std::fs::File;
use std::io::{self, BufWriter};
use std::path::Path;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

/// Zips `source_dir` into `output`, storing paths relative to the parent of `source_dir`.
///
/// Every directory gets an explicit entry, so empty payload folders survive the round
/// trip. Entries are written in sorted order. The output file is written to a `.partial`
/// sibling and renamed into place once the archive is complete.
pub fn zip_directory(source_dir: &Path, output: &Path) -> BagResult<()> {
    if !source_dir.is_dir() {
        return Err(BagError::InvalidBag(format!(
            "{} is not a directory",
            source_dir.display()
        )));
    }
    let base = source_dir.parent().unwrap_or_else(|| Path::new(""));

    let partial = output.with_extension("zip.partial");
    let result = write_archive(source_dir, base, &partial);
    if let Err(e) = result {
        let _ = std::fs::remove_file(&partial);
        return Err(e);
    }
    std::fs::rename(&partial, output)?;

    tracing::debug!(
        source = %source_dir.display(),
        output = %output.display(),
        "bag zipped"
    );
    Ok(())
}

fn write_archive(source_dir: &Path, base: &Path, partial: &Path) -> BagResult<()> {
    let file = File::create(partial)?;
    let mut zip = zip::ZipWriter::new(BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| BagError::Io(io::Error::other(e)))?;
        let relative = entry
            .path()
            .strip_prefix(base)
            .map_err(|_| BagError::InvalidPayloadPath(entry.path().display().to_string()))?;
        let name = archive_name(relative)?;

        if entry.file_type().is_dir() {
            zip.add_directory(format!("{}/", name), options)?;
        } else if entry.file_type().is_file() {
            zip.start_file(name, options)?;
            let mut input = File::open(entry.path())?;
            io::copy(&mut input, &mut zip)?;
        }
    }

    zip.finish()?;
    Ok(())
}

/// Joins path components with `/` regardless of platform.
fn archive_name(relative: &Path) -> BagResult<String> {
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| BagError::InvalidPayloadPath(relative.display().to_string()))?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn zips_relative_to_parent_with_directory_entries() {
        let temp = TempDir::new().unwrap();
        let bag = temp.path().join("staging").join("2024.05.06.07.08.09");
        fs::create_dir_all(bag.join("data/visualization")).unwrap();
        fs::create_dir_all(bag.join("data/contents")).unwrap();
        fs::write(bag.join("data/contents/a.txt"), b"hello").unwrap();

        let output = temp.path().join("out.zip");
        zip_directory(&bag, &output).unwrap();
        assert!(!temp.path().join("out.zip.partial").exists());

        let mut archive = zip::ZipArchive::new(File::open(&output).unwrap()).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_owned())
            .collect();

        assert_eq!(names[0], "2024.05.06.07.08.09/");
        assert!(names.contains(&"2024.05.06.07.08.09/data/visualization/".to_owned()));

        let mut body = String::new();
        archive
            .by_name("2024.05.06.07.08.09/data/contents/a.txt")
            .unwrap()
            .read_to_string(&mut body)
            .unwrap();
        assert_eq!(body, "hello");
    }

    #[test]
    fn rejects_missing_source() {
        let temp = TempDir::new().unwrap();
        let result = zip_directory(&temp.path().join("nope"), &temp.path().join("x.zip"));
        assert!(matches!(result, Err(BagError::InvalidBag(_))));
    }
}
