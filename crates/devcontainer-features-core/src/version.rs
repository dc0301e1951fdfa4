//! C9's version half (§4.9): publish tag fan-out and install resolution,
//! grounded on `wasm-pkg-core::resolver`'s `find_latest_release` — the
//! same filter-then-`max_by` idiom, applied to fan-out ranges instead of
//! a single version requirement.

use semver::{Comparator, Op, Version, VersionReq};

use devcontainer_features_common::{Error, Result};

/// The tags a publish of `version` should be pushed under, in addition
/// to `version` itself (§4.9 "Publish tag fan-out"). Errors if `version`
/// is already present in `published`.
pub fn publish_tags(version: &Version, published: &[Version]) -> Result<Vec<String>> {
    if published.contains(version) {
        return Err(Error::Other(format!(
            "version `{version}` has already been published"
        )));
    }

    let mut tags = vec![version.to_string()];

    if is_max_under(version, published, |v| v.major == version.major) {
        tags.push(version.major.to_string());
    }
    if is_max_under(version, published, |v| v.major == version.major && v.minor == version.minor) {
        tags.push(format!("{}.{}", version.major, version.minor));
    }
    if is_max_under(version, published, |_| true) {
        tags.push("latest".to_string());
    }
    Ok(tags)
}

/// `maxIn(range) == nil || V > maxIn` for the given membership predicate.
fn is_max_under(version: &Version, published: &[Version], in_range: impl Fn(&Version) -> bool) -> bool {
    match published.iter().filter(|v| in_range(v)).max() {
        Some(max) => version > max,
        None => true,
    }
}

/// A tag resolved to an installable target (§4.9 "Install resolution").
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolvedVersion {
    Version(Version),
    Digest(String),
}

impl std::fmt::Display for ResolvedVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedVersion::Version(v) => write!(f, "{v}"),
            ResolvedVersion::Digest(d) => write!(f, "{d}"),
        }
    }
}

/// Resolves a user-supplied tag against the registry's published tag
/// list: `latest` picks the strict-sorted-descending top (`latest`
/// itself dropped from consideration), a concrete tag is matched by
/// semver range semantics, and a digest-pinned reference is retained
/// verbatim.
pub fn resolve_install_version(requested: &str, published_tags: &[String]) -> Result<ResolvedVersion> {
    if requested.starts_with("sha256:") {
        return Ok(ResolvedVersion::Digest(requested.to_string()));
    }

    let mut versions: Vec<Version> = published_tags
        .iter()
        .filter(|t| t.as_str() != "latest")
        .filter_map(|t| Version::parse(t).ok())
        .collect();
    versions.sort_by(|a, b| b.cmp(a));

    if requested == "latest" {
        return versions
            .into_iter()
            .next()
            .map(ResolvedVersion::Version)
            .ok_or_else(|| Error::Other("no published version to resolve `latest` against".into()));
    }

    let requirement = parse_requirement(requested)?;
    versions
        .into_iter()
        .find(|v| requirement.matches(v))
        .map(ResolvedVersion::Version)
        .ok_or_else(|| Error::Other(format!("no published version satisfies `{requested}`")))
}

/// An exact-match requirement for a locked version, used when a lockfile
/// entry should be preferred over a fresh range resolution.
pub fn exact_requirement(version: &Version) -> VersionReq {
    VersionReq {
        comparators: vec![Comparator {
            op: Op::Exact,
            major: version.major,
            minor: Some(version.minor),
            patch: Some(version.patch),
            pre: version.pre.clone(),
        }],
    }
}

fn parse_requirement(raw: &str) -> Result<VersionReq> {
    VersionReq::parse(raw).map_err(|e| Error::IdentifierInvalid {
        identifier: raw.to_string(),
        reason: e.to_string(),
    })
}
