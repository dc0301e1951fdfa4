//! C4 (OCI client) and the pull half of C5 (artifact codec): manifest and
//! blob transfer against an OCI Distribution Spec registry, and safe tar
//! extraction of the resulting blobs.

mod client;
mod extract;

pub use client::{OciClient, RepositoryRef, UploadSession};
pub use extract::extract_tar;

pub use devcontainer_features_common::manifest::{
    digest_layer, OciDescriptor, OciManifest, COLLECTION_LAYER_MEDIA_TYPE,
    DEVCONTAINER_CONFIG_MEDIA_TYPE, FEATURE_LAYER_MEDIA_TYPE, MANIFEST_MEDIA_TYPE,
};
pub use devcontainer_features_common::{Error, Result};
