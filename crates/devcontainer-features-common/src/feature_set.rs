//! A resolved Feature: its source, the OCI manifest if one was fetched,
//! and its parsed `devcontainer-feature.json` metadata (§3).

use crate::digest::ContentDigest;
use crate::identifier::SourceDescriptor;
use crate::manifest::OciManifest;
use crate::metadata::FeatureMetadata;
use crate::option_value::OptionsMap;

#[derive(Clone, Debug, PartialEq)]
pub struct FeatureSet {
    pub source: SourceDescriptor,
    pub manifest: Option<OciManifest>,
    pub manifest_digest: Option<ContentDigest>,
    pub metadata: FeatureMetadata,
    pub supplied_options: OptionsMap,
    /// The identifier string the user (or a dependency/override list)
    /// actually wrote, before §4.6 parsing — the lockfile keys on this,
    /// not on `source`'s canonicalized form. Empty until the graph
    /// builder attaches it with [`FeatureSet::with_user_id`].
    pub user_id: String,
}

impl FeatureSet {
    pub fn new(source: SourceDescriptor, metadata: FeatureMetadata, supplied_options: OptionsMap) -> Self {
        Self {
            source,
            manifest: None,
            manifest_digest: None,
            metadata,
            supplied_options,
            user_id: String::new(),
        }
    }

    pub fn with_manifest(mut self, manifest: OciManifest, digest: ContentDigest) -> Self {
        self.manifest = Some(manifest);
        self.manifest_digest = Some(digest);
        self
    }

    pub fn with_user_id(mut self, user_id: String) -> Self {
        self.user_id = user_id;
        self
    }
}
