//! Regex-validated identifier newtypes.
//!
//! Mirrors `wasm-pkg-common::label::Label` (a validated `TryFrom<String>`
//! newtype with `Display`) but backs three distinct grammars: registry
//! path segments, references (tags/digests), and inner tarball feature
//! names.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static PATH_SEGMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*$").unwrap());

static PATH_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9]+(?:[._-][a-z0-9]+)*(?:/[a-z0-9]+(?:[._-][a-z0-9]+)*)*$").unwrap()
});

static REFERENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$").unwrap());

static INNER_NAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]*$").unwrap());

/// A single OCI path segment, e.g. `my-ns` in `registry/my-ns/name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct PathSegment(String);

impl PathSegment {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PathSegment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for PathSegment {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !PATH_SEGMENT_RE.is_match(&value) {
            return Err(crate::Error::IdentifierInvalid {
                identifier: value,
                reason: "path segments must match ^[a-z0-9]+([._-][a-z0-9]+)*$".into(),
            });
        }
        Ok(Self(value))
    }
}

impl From<PathSegment> for String {
    fn from(value: PathSegment) -> Self {
        value.0
    }
}

impl std::str::FromStr for PathSegment {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.to_owned().try_into()
    }
}

/// A full OCI repository path (one or more slash-separated segments).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct RepositoryPath(String);

impl RepositoryPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RepositoryPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for RepositoryPath {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !PATH_RE.is_match(&value) {
            return Err(crate::Error::IdentifierInvalid {
                identifier: value,
                reason:
                    "path must match ^[a-z0-9]+([._-][a-z0-9]+)*(/[a-z0-9]+([._-][a-z0-9]+)*)*$"
                        .into(),
            });
        }
        Ok(Self(value))
    }
}

impl From<RepositoryPath> for String {
    fn from(value: RepositoryPath) -> Self {
        value.0
    }
}

/// A tag or digest reference string.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Reference(String);

impl Reference {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Reference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for Reference {
    type Error = crate::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !REFERENCE_RE.is_match(&value) {
            return Err(crate::Error::IdentifierInvalid {
                identifier: value,
                reason: "reference must match ^[A-Za-z0-9_][A-Za-z0-9._-]{0,127}$".into(),
            });
        }
        Ok(Self(value))
    }
}

impl From<Reference> for String {
    fn from(value: Reference) -> Self {
        value.0
    }
}

/// Validates the `#name` suffix of a tarball identifier.
pub fn validate_inner_feature_name(name: &str) -> crate::Result<()> {
    if !INNER_NAME_RE.is_match(name) {
        return Err(crate::Error::IdentifierInvalid {
            identifier: name.to_string(),
            reason: "inner feature name must match ^[A-Za-z0-9_-]*$".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn path_segment_accepts_dotted_words() {
        assert!(PathSegment::try_from("my-ns.sub_part-1".to_string()).is_ok());
    }

    #[test]
    fn path_segment_rejects_uppercase() {
        assert!(PathSegment::try_from("MyNs".to_string()).is_err());
    }

    #[test]
    fn repository_path_accepts_multi_segment() {
        assert!(RepositoryPath::try_from("ns/sub/name".to_string()).is_ok());
    }

    #[test]
    fn reference_rejects_empty() {
        assert!(Reference::try_from(String::new()).is_err());
    }

    #[test]
    fn reference_accepts_digest_like_string() {
        assert!(Reference::try_from("sha256-abcdef".to_string()).is_ok());
    }

    #[test]
    fn inner_feature_name_allows_empty() {
        assert!(validate_inner_feature_name("").is_ok());
    }

    #[test]
    fn inner_feature_name_rejects_slash() {
        assert!(validate_inner_feature_name("a/b").is_err());
    }
}
