//! Feature identifier parsing (§3, §4.6): turns a user-supplied string
//! into a tagged [`SourceDescriptor`].

use crate::label::{validate_inner_feature_name, PathSegment, Reference, RepositoryPath};
use crate::registry::Registry;
use crate::{Error, Result};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SourceDescriptor {
    Local {
        name: String,
    },
    Tarball {
        url: String,
        inner_name: String,
    },
    FilePath {
        path: String,
        is_relative: bool,
        name: String,
    },
    Oci {
        registry: Registry,
        namespace: Option<RepositoryPath>,
        name: PathSegment,
        reference: Reference,
        is_digest: bool,
        resource: String,
    },
    GitHubRelease {
        owner: String,
        repo: String,
        name: String,
        tag: String,
    },
}

impl SourceDescriptor {
    /// Whether this source kind participates in the modern dependency
    /// graph (§4.7): `OCI`, `FilePath`, `Tarball`.
    pub fn is_dependency_capable(&self) -> bool {
        matches!(
            self,
            SourceDescriptor::Oci { .. } | SourceDescriptor::FilePath { .. } | SourceDescriptor::Tarball { .. }
        )
    }
}

/// Parses a raw Feature identifier into a [`SourceDescriptor`] following
/// the six-step algorithm of §4.6.
pub fn parse_identifier(raw: &str) -> Result<SourceDescriptor> {
    let lowered = raw.to_lowercase();

    // Step 2: no slash or backslash => Local.
    if !lowered.contains('/') && !lowered.contains('\\') {
        return Ok(SourceDescriptor::Local { name: lowered });
    }

    // Step 3: http(s) tarball.
    if lowered.starts_with("http://") || lowered.starts_with("https://") {
        let trimmed = lowered.trim_end_matches('/');
        let (url, inner_name) = match trimmed.rsplit_once('#') {
            Some((url, name)) => (url.to_string(), name.to_string()),
            None => (trimmed.to_string(), String::new()),
        };
        validate_inner_feature_name(&inner_name)?;
        return Ok(SourceDescriptor::Tarball {
            url,
            inner_name,
        });
    }

    // Step 4: filesystem path.
    if lowered.starts_with("./") || lowered.starts_with("../") || is_absolute_path(&lowered) {
        let is_relative = lowered.starts_with("./") || lowered.starts_with("../");
        let name = lowered
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or(&lowered)
            .to_string();
        return Ok(SourceDescriptor::FilePath {
            path: lowered,
            is_relative,
            name,
        });
    }

    // Step 5: registry reference. Attempted first; a validation failure
    // (e.g. a `@version` suffix, which is not valid OCI path/reference
    // grammar) falls through to step 6 rather than erroring immediately.
    if let Some(descriptor) = try_parse_oci(&lowered) {
        return descriptor;
    }

    // Step 6: legacy GitHub release source.
    let (path_part, tag) = match lowered.split_once('@') {
        Some((path, tag)) => (path, tag.to_string()),
        None => (lowered.as_str(), "latest".to_string()),
    };
    let segments: Vec<&str> = path_part.split('/').collect();
    if segments.len() == 3 {
        return Ok(SourceDescriptor::GitHubRelease {
            owner: segments[0].to_string(),
            repo: segments[1].to_string(),
            name: segments[2].to_string(),
            tag,
        });
    }

    Err(Error::IdentifierInvalid {
        identifier: raw.to_string(),
        reason: "did not match any recognized identifier shape".into(),
    })
}

/// Attempts the step-5 OCI-reference parse. Returns `None` (rather than
/// `Some(Err(..))`) when the string simply isn't OCI-shaped, so the
/// caller can fall through to the step-6 GitHub-release parse; returns
/// `Some(Err(..))` only for a validation failure inside an otherwise
/// OCI-shaped identifier (e.g. a malformed registry host).
fn try_parse_oci(lowered: &str) -> Option<Result<SourceDescriptor>> {
    let first_slash = lowered.find('/')?;
    // The last ':' is a tag delimiter only if it occurs after the first '/'.
    let tag_colon = lowered.rfind(':').filter(|&idx| idx > first_slash);
    let (path_part, reference_str) = match tag_colon {
        Some(idx) => (&lowered[..idx], lowered[idx + 1..].to_string()),
        None => (lowered, "latest".to_string()),
    };

    let mut segments: Vec<&str> = path_part.split('/').collect();
    let registry_str = segments.remove(0);
    let registry: Registry = registry_str.parse().ok()?;
    // Unreachable-looking hosts (no dot, not `localhost`) are not treated
    // as registries; fall through to the step-6 GitHub-release parse.
    if !registry.looks_reachable() {
        return None;
    }

    let build = || -> Result<SourceDescriptor> {
        if segments.len() >= 2 {
            let mut segments = segments.clone();
            let name_str = segments.pop().unwrap();
            let namespace_str = segments.join("/");
            let namespace = RepositoryPath::try_from(namespace_str.clone())?;
            let name = PathSegment::try_from(name_str.to_string())?;
            let is_digest = reference_str.starts_with("sha256:");
            let reference = Reference::try_from(reference_str.clone())?;
            let resource = format!("{registry}/{namespace_str}/{name_str}");
            Ok(SourceDescriptor::Oci {
                registry: registry.clone(),
                namespace: Some(namespace),
                name,
                reference,
                is_digest,
                resource,
            })
        } else if segments.len() == 1 {
            let name_str = segments[0];
            let name = PathSegment::try_from(name_str.to_string())?;
            let is_digest = reference_str.starts_with("sha256:");
            let reference = Reference::try_from(reference_str.clone())?;
            let resource = format!("{registry}/{name_str}");
            Ok(SourceDescriptor::Oci {
                registry: registry.clone(),
                namespace: None,
                name,
                reference,
                is_digest,
                resource,
            })
        } else {
            Err(Error::IdentifierInvalid {
                identifier: path_part.to_string(),
                reason: "registry reference requires at least one path segment".into(),
            })
        }
    };

    match build() {
        Ok(descriptor) => Some(Ok(descriptor)),
        Err(_) => None,
    }
}

fn is_absolute_path(s: &str) -> bool {
    s.starts_with('/') || (s.len() > 2 && s.as_bytes()[1] == b':' && s.as_bytes()[2] == b'\\')
}
