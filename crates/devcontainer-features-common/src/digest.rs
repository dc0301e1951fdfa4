//! Content digests (`sha256:<hex>`), as used for OCI blobs and manifests.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct ContentDigest {
    algorithm: String,
    hex: String,
}

impl ContentDigest {
    /// Computes the canonical `sha256:` digest of the given bytes.
    pub fn sha256(bytes: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        Self {
            algorithm: "sha256".to_string(),
            hex: format!("{:x}", hasher.finalize()),
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

impl std::str::FromStr for ContentDigest {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, hex) = s.split_once(':').ok_or_else(|| crate::Error::IdentifierInvalid {
            identifier: s.to_string(),
            reason: "expected `<algorithm>:<hex>`".into(),
        })?;
        if algorithm != "sha256" {
            return Err(crate::Error::IdentifierInvalid {
                identifier: s.to_string(),
                reason: format!("unsupported digest algorithm `{algorithm}`"),
            });
        }
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase())
        {
            return Err(crate::Error::IdentifierInvalid {
                identifier: s.to_string(),
                reason: "expected 64 lowercase hex characters".into(),
            });
        }
        Ok(Self {
            algorithm: algorithm.to_string(),
            hex: hex.to_string(),
        })
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ContentDigest> for String {
    fn from(value: ContentDigest) -> Self {
        value.to_string()
    }
}

/// The fixed zero-byte config digest used for every manifest's `config`
/// descriptor (§4.5).
pub const EMPTY_DEVCONTAINER_CONFIG_DIGEST: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_matches_known_constant() {
        let digest = ContentDigest::sha256(b"");
        assert_eq!(digest.to_string(), EMPTY_DEVCONTAINER_CONFIG_DIGEST);
    }

    #[test]
    fn round_trips_through_display_and_parse() {
        let digest = ContentDigest::sha256(b"hello world");
        let parsed: ContentDigest = digest.to_string().parse().unwrap();
        assert_eq!(digest, parsed);
    }

    #[test]
    fn rejects_non_sha256() {
        assert!("sha512:abcd".parse::<ContentDigest>().is_err());
    }

    #[test]
    fn rejects_uppercase_hex() {
        let bad = format!("sha256:{}", "A".repeat(64));
        assert!(bad.parse::<ContentDigest>().is_err());
    }
}
