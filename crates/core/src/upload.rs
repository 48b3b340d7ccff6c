//! Base64 file fields used to carry uploads inside JSON bodies.
//!
//! The wire shape is:
//!
//! ```json
//! { "name": "streamflow.csv", "file": "ZGF0ZSxjZnMK", "content_type": "text/csv" }
//! ```
//!
//! `content-type` is accepted as an alias for `content_type`, and the content type may be
//! omitted entirely.

use crate::constants::DEFAULT_CONTENT_TYPE;
use crate::{ResourceError, ResourceResult};
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

/// A file encoded for transport in a JSON document.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Base64File {
    pub name: String,
    pub file: String,
    #[serde(default, alias = "content-type", skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// A decoded upload ready to be stored.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl UploadedFile {
    /// Builds an upload from raw bytes, guessing the content type from `name`.
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let name = name.into();
        let content_type = guess_content_type(&name);
        Self {
            name,
            bytes,
            content_type,
        }
    }

    /// Overrides the content type. Blank values fall back to `application/octet-stream`.
    pub fn with_content_type(mut self, content_type: impl AsRef<str>) -> Self {
        let ct = content_type.as_ref().trim();
        self.content_type = if ct.is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            ct.to_string()
        };
        self
    }
}

impl Base64File {
    /// Encodes `bytes` for transport, guessing the content type from `name`.
    pub fn encode(name: impl Into<String>, bytes: &[u8]) -> Self {
        let name = name.into();
        let content_type = Some(guess_content_type(&name));
        Self {
            name,
            file: general_purpose::STANDARD.encode(bytes),
            content_type,
        }
    }

    /// Decodes the payload.
    ///
    /// Whitespace inside the base64 text (line-wrapped encoders) is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidContent`] if the name is blank or the payload is not
    /// valid base64.
    pub fn decode(&self) -> ResourceResult<UploadedFile> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ResourceError::InvalidContent(
                "uploaded file must have a name".into(),
            ));
        }

        let compact: String = self
            .file
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        let bytes = general_purpose::STANDARD.decode(compact).map_err(|e| {
            ResourceError::InvalidContent(format!("file '{}' is not valid base64: {}", name, e))
        })?;

        let upload = UploadedFile {
            name: name.to_string(),
            bytes,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
        };
        Ok(match self.content_type.as_deref() {
            Some(ct) => upload.with_content_type(ct),
            None => upload,
        })
    }
}

/// Guesses a media type from a file name, defaulting to `application/octet-stream`.
pub fn guess_content_type(name: &str) -> String {
    mime_guess::from_path(name)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
