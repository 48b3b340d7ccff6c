//! MD5 hashing and manifest line formatting.

use crate::{BagError, BagResult};
use hsr_uuid::Md5Hash;
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Payload manifest file name.
pub const MANIFEST_FILENAME: &str = "manifest-md5.txt";

/// Tag manifest file name.
pub const TAG_MANIFEST_FILENAME: &str = "tagmanifest-md5.txt";

/// Computes the MD5 digest of a byte slice.
pub fn md5_bytes(bytes: &[u8]) -> Md5Hash {
    let digest: [u8; 16] = Md5::digest(bytes).into();
    Md5Hash::from_bytes(&digest)
}

/// Computes the MD5 digest of a file, streaming its contents.
pub fn md5_file(path: &Path) -> BagResult<Md5Hash> {
    let file = File::open(path)?;
    let (hash, _) = md5_reader(file)?;
    Ok(hash)
}

/// Streams a reader through MD5, returning the digest and the number of bytes read.
pub(crate) fn md5_reader<R: Read>(mut reader: R) -> BagResult<(Md5Hash, u64)> {
    let mut hasher = Md5::new();
    let copied = io::copy(&mut reader, &mut hasher)?;
    let digest: [u8; 16] = hasher.finalize().into();
    Ok((Md5Hash::from_bytes(&digest), copied))
}

/// Percent-encodes the characters a manifest path may not contain literally.
pub(crate) fn encode_path(path: &str) -> String {
    path.replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

fn decode_path(path: &str) -> String {
    path.replace("%0D", "\r")
        .replace("%0A", "\n")
        .replace("%25", "%")
}

/// Renders manifest entries as `<md5>  <path>` lines, sorted by path.
pub(crate) fn render(entries: &[(String, Md5Hash)]) -> String {
    let mut sorted: Vec<&(String, Md5Hash)> = entries.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = String::new();
    for (path, hash) in sorted {
        out.push_str(hash.as_str());
        out.push_str("  ");
        out.push_str(&encode_path(path));
        out.push('\n');
    }
    out
}

/// Parses manifest text into `(path, digest)` pairs.
pub(crate) fn parse(text: &str) -> BagResult<Vec<(String, Md5Hash)>> {
    let mut entries = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let (digest, path) = line.split_once(char::is_whitespace).ok_or_else(|| {
            BagError::InvalidBag(format!("malformed manifest line {}", line_no + 1))
        })?;
        let hash = Md5Hash::parse(&digest.to_ascii_lowercase()).map_err(|e| {
            BagError::InvalidBag(format!("manifest line {}: {}", line_no + 1, e))
        })?;
        let path = path.trim_start();
        if path.is_empty() {
            return Err(BagError::InvalidBag(format!(
                "manifest line {} has no path",
                line_no + 1
            )));
        }
        entries.push((decode_path(path), hash));
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_of_empty_input() {
        assert_eq!(md5_bytes(b"").as_str(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn render_sorts_and_parse_reads_back() {
        let entries = vec![
            ("data/b.txt".to_owned(), md5_bytes(b"b")),
            ("data/a 100%.txt".to_owned(), md5_bytes(b"a")),
        ];
        let text = render(&entries);
        let first = text.lines().next().unwrap();
        assert!(first.ends_with("  data/a 100%25.txt"));

        let parsed = parse(&text).unwrap();
        assert_eq!(parsed[0].0, "data/a 100%.txt");
        assert_eq!(parsed[1].1, md5_bytes(b"b"));
    }

    #[test]
    fn parse_rejects_bad_digest() {
        let err = parse("nothex  data/x\n").unwrap_err();
        assert!(matches!(err, BagError::InvalidBag(_)));
    }
}
