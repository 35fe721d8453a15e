//! Content digests in the `algorithm:hex` form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{ImageError, Result};

/// The only algorithm accepted for content this crate produces or verifies.
pub const SHA256: &str = "sha256";

/// A content digest such as `sha256:a4dce48a...`.
///
/// The wire form is kept verbatim: deserialization is permissive so that a
/// malformed digest in remote metadata surfaces as a typed error at its use
/// site (via [`Digest::validate`]) instead of a deserialization failure.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Digest(String);

impl Digest {
    /// Builds a digest from an algorithm and a hex-encoded hash.
    #[must_use]
    pub fn from_encoded(algorithm: &str, encoded: impl AsRef<str>) -> Self {
        Self(format!("{algorithm}:{}", encoded.as_ref()))
    }

    /// Builds a sha256 digest from a hex-encoded hash.
    #[must_use]
    pub fn sha256(encoded: impl AsRef<str>) -> Self {
        Self::from_encoded(SHA256, encoded)
    }

    /// The algorithm portion, or an empty string when there is none.
    #[must_use]
    pub fn algorithm(&self) -> &str {
        self.0.split_once(':').map_or("", |(algorithm, _)| algorithm)
    }

    /// The hex portion after the algorithm separator.
    #[must_use]
    pub fn encoded(&self) -> &str {
        self.0
            .split_once(':')
            .map_or(self.0.as_str(), |(_, encoded)| encoded)
    }

    /// Checks the `algorithm:hex` lexical form.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidDigestFormat`] when the separator is
    /// missing, either side is empty, or the hash is not lowercase hex.
    pub fn validate(&self) -> Result<()> {
        let Some((algorithm, encoded)) = self.0.split_once(':') else {
            return Err(ImageError::InvalidDigestFormat);
        };
        if algorithm.is_empty() || encoded.is_empty() {
            return Err(ImageError::InvalidDigestFormat);
        }
        let algorithm_ok = algorithm
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || matches!(b, b'+' | b'.' | b'_' | b'-'));
        let encoded_ok = encoded.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !algorithm_ok || !encoded_ok {
            return Err(ImageError::InvalidDigestFormat);
        }
        Ok(())
    }

    /// Ensures the digest is well formed and uses sha256.
    ///
    /// # Errors
    ///
    /// Returns [`ImageError::InvalidDigestFormat`] for malformed digests and
    /// [`ImageError::DigestAlgorithm`] for any algorithm other than sha256.
    pub fn require_sha256(&self) -> Result<()> {
        self.validate()?;
        if self.algorithm() != SHA256 {
            return Err(ImageError::DigestAlgorithm {
                algorithm: self.algorithm().to_string(),
            });
        }
        Ok(())
    }
}

impl From<&str> for Digest {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for Digest {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accessors() {
        let digest = Digest::sha256("abc123");
        assert_eq!(digest.algorithm(), "sha256");
        assert_eq!(digest.encoded(), "abc123");
        assert_eq!(digest.to_string(), "sha256:abc123");
    }

    #[test]
    fn test_validate_accepts_well_formed_digests() {
        assert!(Digest::sha256("cc6c955cadf2").validate().is_ok());
        assert!(Digest::from_encoded("sha384", &"a".repeat(96)).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed_digests() {
        for bad in ["not-a-digest", ":abcdef", "sha256:", "sha256:XYZ", "sha256:abcdeg"] {
            let err = Digest::from(bad).validate().unwrap_err();
            assert!(
                matches!(err, ImageError::InvalidDigestFormat),
                "{bad}: {err:?}"
            );
            assert_eq!(err.to_string(), "invalid checksum digest format");
        }
    }

    #[test]
    fn test_require_sha256_rejects_other_algorithms() {
        let digest = Digest::from_encoded("sha384", &"a".repeat(96));
        let err = digest.require_sha256().unwrap_err();
        assert!(matches!(err, ImageError::DigestAlgorithm { algorithm } if algorithm == "sha384"));
    }

    #[test]
    fn test_serde_round_trip() {
        let digest = Digest::sha256("abc123");
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, "\"sha256:abc123\"");
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, digest);
    }

    #[test]
    fn test_deserialization_is_permissive() {
        // Malformed digests parse; validation happens at use sites.
        let digest: Digest = serde_json::from_str("\"not-a-digest\"").unwrap();
        assert!(digest.validate().is_err());
    }
}
