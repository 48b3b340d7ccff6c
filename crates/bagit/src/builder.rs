//! Bag staging: payload files, tag files and manifests.

use crate::manifest::{self, md5_bytes, MANIFEST_FILENAME, TAG_MANIFEST_FILENAME};
use crate::{BagError, BagResult, BAGIT_VERSION, PAYLOAD_DIR};
use hsr_uuid::Md5Hash;
use md5::{Digest, Md5};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

const BAGIT_TXT: &str = "bagit.txt";
const BAG_INFO_TXT: &str = "bag-info.txt";

pub(crate) const LABEL_BAGGING_DATE: &str = "Bagging-Date";
pub(crate) const LABEL_SOFTWARE_AGENT: &str = "Bag-Software-Agent";
pub(crate) const LABEL_PAYLOAD_OXUM: &str = "Payload-Oxum";

/// Ordered `label: value` pairs written to `bag-info.txt`.
///
/// Labels may repeat, as BagIt allows.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BagInfo {
    fields: Vec<(String, String)>,
}

impl BagInfo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a field after validating that it can be written as a single tag line.
    pub fn insert(&mut self, label: impl Into<String>, value: impl Into<String>) -> BagResult<()> {
        let label = label.into();
        let value = value.into();

        if label.trim().is_empty() || label.contains(':') || label.contains(['\r', '\n']) {
            return Err(BagError::InvalidBagInfo(format!("label '{}'", label)));
        }
        if value.contains(['\r', '\n']) {
            return Err(BagError::InvalidBagInfo(format!(
                "value for '{}' contains a line break",
                label
            )));
        }

        self.fields.push((label.trim().to_owned(), value.trim().to_owned()));
        Ok(())
    }

    /// Builder-style [`BagInfo::insert`].
    pub fn with(mut self, label: impl Into<String>, value: impl Into<String>) -> BagResult<Self> {
        self.insert(label, value)?;
        Ok(self)
    }

    /// Returns the first value recorded under `label`, compared case-insensitively.
    pub fn get(&self, label: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(l, _)| l.eq_ignore_ascii_case(label))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, label: &str) -> bool {
        self.get(label).is_some()
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Renders the tag file body, sorted by label. Fields sharing a label keep their order.
    pub(crate) fn render(&self) -> String {
        let mut sorted: Vec<&(String, String)> = self.fields.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(&b.0));

        let mut out = String::new();
        for (label, value) in sorted {
            out.push_str(label);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Parses a tag file body. Indented lines continue the previous value.
    pub(crate) fn parse(text: &str) -> BagResult<Self> {
        let mut fields: Vec<(String, String)> = Vec::new();
        for line in text.lines() {
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with([' ', '\t']) {
                let Some(last) = fields.last_mut() else {
                    return Err(BagError::InvalidBag(format!(
                        "continuation line without a label: '{}'",
                        line
                    )));
                };
                last.1.push(' ');
                last.1.push_str(line.trim());
                continue;
            }
            let (label, value) = line
                .split_once(':')
                .ok_or_else(|| BagError::InvalidBag(format!("malformed tag line: '{}'", line)))?;
            fields.push((label.trim().to_owned(), value.trim().to_owned()));
        }
        Ok(Self { fields })
    }
}

/// Payload size summary recorded as `Payload-Oxum: <bytes>.<files>`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PayloadOxum {
    pub bytes: u64,
    pub files: u64,
}

impl fmt::Display for PayloadOxum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.bytes, self.files)
    }
}

impl FromStr for PayloadOxum {
    type Err = BagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BagError::InvalidBag(format!("invalid Payload-Oxum '{}'", s));
        let (bytes, files) = s.trim().split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            bytes: bytes.parse().map_err(|_| invalid())?,
            files: files.parse().map_err(|_| invalid())?,
        })
    }
}

/// A finished bag on disk.
#[derive(Debug)]
pub struct Bag {
    payload_oxum: PayloadOxum,
    manifest: Vec<(String, Md5Hash)>,
}

impl Bag {
    pub fn payload_oxum(&self) -> PayloadOxum {
        self.payload_oxum
    }

    /// Payload manifest entries as `(data/<path>, md5)`.
    pub fn manifest(&self) -> &[(String, Md5Hash)] {
        &self.manifest
    }
}

/// Stages payload under `<bag_dir>/data/` and writes the tag files on [`BagBuilder::finish`].
///
/// Payload paths are relative to the payload directory and use `/` separators, e.g.
/// `contents/streamflow.csv`.
#[derive(Debug)]
pub struct BagBuilder {
    root: PathBuf,
    payload: Vec<(String, Md5Hash, u64)>,
    seen: BTreeSet<String>,
}

impl BagBuilder {
    /// Creates `bag_dir` and its payload directory.
    ///
    /// # Errors
    ///
    /// Returns [`BagError::BagDirectoryExists`] if `bag_dir` is already present.
    pub fn create(bag_dir: &Path) -> BagResult<Self> {
        if bag_dir.exists() {
            return Err(BagError::BagDirectoryExists(bag_dir.display().to_string()));
        }
        fs::create_dir_all(bag_dir.join(PAYLOAD_DIR))?;

        Ok(Self {
            root: bag_dir.to_path_buf(),
            payload: Vec::new(),
            seen: BTreeSet::new(),
        })
    }

    /// Creates an (initially empty) directory inside the payload.
    pub fn add_directory(&mut self, relative: &str) -> BagResult<()> {
        let target = self.payload_path(relative)?;
        fs::create_dir_all(target)?;
        Ok(())
    }

    /// Writes `bytes` to a payload file.
    pub fn add_bytes(&mut self, relative: &str, bytes: &[u8]) -> BagResult<()> {
        let target = self.claim(relative)?;
        fs::write(&target, bytes)?;
        self.payload
            .push((manifest_path(relative), md5_bytes(bytes), bytes.len() as u64));
        Ok(())
    }

    /// Copies `source` into the payload, hashing while copying.
    pub fn add_file(&mut self, relative: &str, source: &Path) -> BagResult<()> {
        let target = self.claim(relative)?;
        let mut input = File::open(source)?;
        let mut output = HashingWriter::new(File::create(&target)?);
        let copied = io::copy(&mut input, &mut output)?;
        let hash = output.finish()?;
        self.payload.push((manifest_path(relative), hash, copied));
        Ok(())
    }

    /// Writes `bagit.txt`, `bag-info.txt` and both MD5 manifests.
    ///
    /// `Bagging-Date`, `Bag-Software-Agent` and `Payload-Oxum` are filled in unless the caller
    /// already supplied them.
    pub fn finish(self, mut info: BagInfo) -> BagResult<Bag> {
        let payload_oxum = PayloadOxum {
            bytes: self.payload.iter().map(|(_, _, size)| size).sum(),
            files: self.payload.len() as u64,
        };

        if !info.contains(LABEL_BAGGING_DATE) {
            info.insert(
                LABEL_BAGGING_DATE,
                chrono::Utc::now().format("%Y-%m-%d").to_string(),
            )?;
        }
        if !info.contains(LABEL_SOFTWARE_AGENT) {
            info.insert(
                LABEL_SOFTWARE_AGENT,
                format!("hsr-bagit v{}", env!("CARGO_PKG_VERSION")),
            )?;
        }
        if !info.contains(LABEL_PAYLOAD_OXUM) {
            info.insert(LABEL_PAYLOAD_OXUM, payload_oxum.to_string())?;
        }

        let manifest: Vec<(String, Md5Hash)> = self
            .payload
            .into_iter()
            .map(|(path, hash, _)| (path, hash))
            .collect();

        let bagit_txt = format!(
            "BagIt-Version: {}\nTag-File-Character-Encoding: UTF-8\n",
            BAGIT_VERSION
        );
        let bag_info_txt = info.render();
        let manifest_txt = manifest::render(&manifest);

        let mut tag_entries = Vec::new();
        for (name, body) in [
            (BAGIT_TXT, &bagit_txt),
            (BAG_INFO_TXT, &bag_info_txt),
            (MANIFEST_FILENAME, &manifest_txt),
        ] {
            fs::write(self.root.join(name), body)?;
            tag_entries.push((name.to_owned(), md5_bytes(body.as_bytes())));
        }
        fs::write(
            self.root.join(TAG_MANIFEST_FILENAME),
            manifest::render(&tag_entries),
        )?;

        tracing::debug!(
            bag = %self.root.display(),
            payload_oxum = %payload_oxum,
            "bag written"
        );

        Ok(Bag {
            payload_oxum,
            manifest,
        })
    }

    /// Validates a payload-relative path and returns its location on disk.
    fn payload_path(&self, relative: &str) -> BagResult<PathBuf> {
        let invalid = || BagError::InvalidPayloadPath(relative.to_owned());
        if relative.is_empty() || relative.starts_with('/') || relative.contains('\\') {
            return Err(invalid());
        }

        let mut path = self.root.join(PAYLOAD_DIR);
        for component in relative.split('/') {
            if component.is_empty() || component == "." || component == ".." {
                return Err(invalid());
            }
            path.push(component);
        }
        Ok(path)
    }

    /// Reserves a payload file path, creating its parent directories.
    fn claim(&mut self, relative: &str) -> BagResult<PathBuf> {
        let target = self.payload_path(relative)?;
        if !self.seen.insert(relative.to_owned()) {
            return Err(BagError::InvalidPayloadPath(format!(
                "{} (added twice)",
                relative
            )));
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(target)
    }
}

fn manifest_path(relative: &str) -> String {
    format!("{}/{}", PAYLOAD_DIR, relative)
}

struct HashingWriter<W> {
    inner: W,
    hasher: Md5,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Md5::new(),
        }
    }

    fn finish(mut self) -> io::Result<Md5Hash> {
        self.inner.flush()?;
        let digest: [u8; 16] = self.hasher.finalize().into();
        Ok(Md5Hash::from_bytes(&digest))
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(&buf[..written]);
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finish_writes_tag_files_and_manifests() {
        let temp = TempDir::new().unwrap();
        let bag_dir = temp.path().join("2024.01.02.03.04.05");

        let mut builder = BagBuilder::create(&bag_dir).unwrap();
        builder.add_directory("visualization").unwrap();
        builder.add_bytes("contents/a.csv", b"date,cfs\n").unwrap();
        builder
            .add_bytes("resourcemetadata.json", b"{\"title\":\"x\"}")
            .unwrap();

        let info = BagInfo::new().with("title", "Logan River").unwrap();
        let bag = builder.finish(info).unwrap();

        assert_eq!(bag.payload_oxum(), PayloadOxum { bytes: 22, files: 2 });
        assert!(bag_dir.join("data/visualization").is_dir());

        let bagit = fs::read_to_string(bag_dir.join("bagit.txt")).unwrap();
        assert!(bagit.starts_with("BagIt-Version: 0.97\n"));

        let info = fs::read_to_string(bag_dir.join("bag-info.txt")).unwrap();
        assert!(info.contains("title: Logan River\n"));
        assert!(info.contains("Payload-Oxum: 22.2\n"));

        let manifest = fs::read_to_string(bag_dir.join(MANIFEST_FILENAME)).unwrap();
        assert_eq!(manifest.lines().count(), 2);
        assert!(manifest.contains(&format!(
            "{}  data/contents/a.csv",
            md5_bytes(b"date,cfs\n")
        )));

        let tags = fs::read_to_string(bag_dir.join(TAG_MANIFEST_FILENAME)).unwrap();
        assert_eq!(tags.lines().count(), 3);
    }

    #[test]
    fn add_file_copies_and_hashes() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("source.bin");
        fs::write(&source, b"payload bytes").unwrap();

        let mut builder = BagBuilder::create(&temp.path().join("bag")).unwrap();
        builder.add_file("contents/source.bin", &source).unwrap();
        let bag = builder.finish(BagInfo::new()).unwrap();

        assert_eq!(bag.manifest()[0].1, md5_bytes(b"payload bytes"));
        let info = fs::read_to_string(temp.path().join("bag/bag-info.txt")).unwrap();
        assert!(info.contains("Bagging-Date: "));
    }

    #[test]
    fn rejects_escaping_and_duplicate_paths() {
        let temp = TempDir::new().unwrap();
        let mut builder = BagBuilder::create(&temp.path().join("bag")).unwrap();

        assert!(builder.add_bytes("../evil", b"x").is_err());
        assert!(builder.add_bytes("/abs", b"x").is_err());
        assert!(builder.add_bytes("a//b", b"x").is_err());

        builder.add_bytes("contents/x", b"x").unwrap();
        assert!(builder.add_bytes("contents/x", b"y").is_err());
    }

    #[test]
    fn create_refuses_existing_directory() {
        let temp = TempDir::new().unwrap();
        let err = BagBuilder::create(temp.path()).unwrap_err();
        assert!(matches!(err, BagError::BagDirectoryExists(_)));
    }

    #[test]
    fn bag_info_rejects_line_breaks() {
        let mut info = BagInfo::new();
        assert!(info.insert("title", "two\nlines").is_err());
        assert!(info.insert("bad:label", "v").is_err());
        info.insert("author", "  Jane Doe ").unwrap();
        assert_eq!(info.get("AUTHOR"), Some("Jane Doe"));
    }

    #[test]
    fn bag_info_parse_joins_continuations() {
        let info = BagInfo::parse("title: A long\n  title\nslug: a-long-title\n").unwrap();
        assert_eq!(info.get("title"), Some("A long title"));
        assert_eq!(info.get("slug"), Some("a-long-title"));
    }

    #[test]
    fn payload_oxum_parses() {
        let oxum: PayloadOxum = "1024.3".parse().unwrap();
        assert_eq!(oxum, PayloadOxum { bytes: 1024, files: 3 });
        assert!("1024".parse::<PayloadOxum>().is_err());
    }
}
