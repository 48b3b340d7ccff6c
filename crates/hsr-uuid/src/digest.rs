//! Validated lowercase hex digests.

use crate::{UuidError, UuidResult};
use std::fmt;

fn validate_hex(input: &str, expected_len: usize, algorithm: &str) -> UuidResult<()> {
    if input.len() != expected_len
        || !input
            .bytes()
            .all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
    {
        return Err(UuidError::InvalidInput(format!(
            "{} digest must be {} lowercase hex characters, got: '{}'",
            algorithm, expected_len, input
        )));
    }
    Ok(())
}

macro_rules! hex_digest {
    ($(#[$meta:meta])* $name:ident, $bytes:expr, $algorithm:expr) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(String);

        impl $name {
            /// Hex length of this digest.
            pub const HEX_LEN: usize = $bytes * 2;

            /// Parses a lowercase hex digest.
            pub fn parse(input: &str) -> UuidResult<Self> {
                validate_hex(input, Self::HEX_LEN, $algorithm)?;
                Ok(Self(input.to_owned()))
            }

            /// Builds the digest from raw digest bytes.
            pub fn from_bytes(bytes: &[u8; $bytes]) -> Self {
                Self(hex::encode(bytes))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        #[cfg(feature = "serde")]
        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                serializer.serialize_str(&self.0)
            }
        }

        #[cfg(feature = "serde")]
        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                let s = String::deserialize(deserializer)?;
                $name::parse(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_digest!(
    /// SHA-256 digest used for content-addressed payload storage.
    Sha256Hash,
    32,
    "sha256"
);

hex_digest!(
    /// MD5 digest used in bag manifests and bag checksums.
    Md5Hash,
    16,
    "md5"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_from_bytes_is_lowercase_hex() {
        let hash = Sha256Hash::from_bytes(&[0xab; 32]);
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash.as_str().starts_with("abab"));
    }

    #[test]
    fn md5_parse_checks_length_and_case() {
        assert!(Md5Hash::parse("d41d8cd98f00b204e9800998ecf8427e").is_ok());
        assert!(Md5Hash::parse("D41D8CD98F00B204E9800998ECF8427E").is_err());
        assert!(Md5Hash::parse("d41d8cd98f00b204").is_err());
    }
}
