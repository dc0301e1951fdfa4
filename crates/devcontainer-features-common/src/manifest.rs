//! OCI image manifest types and the canonical (byte-exact) serialization
//! used to compute the manifest's content digest.
//!
//! §4.5 requires the serialized bytes to be wire-exact, so the manifest
//! is built by hand-assembling a `serde_json::Map` with insertion order
//! preserved (the `serde_json/preserve_order` feature) rather than
//! relying on derive-order, which would be fragile against field
//! reordering during later edits.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::digest::{ContentDigest, EMPTY_DEVCONTAINER_CONFIG_DIGEST};

pub const MANIFEST_MEDIA_TYPE: &str = "application/vnd.oci.image.manifest.v1+json";
pub const DEVCONTAINER_CONFIG_MEDIA_TYPE: &str = "application/vnd.devcontainers";
pub const FEATURE_LAYER_MEDIA_TYPE: &str = "application/vnd.devcontainers.layer.v1+tar";
pub const COLLECTION_LAYER_MEDIA_TYPE: &str =
    "application/vnd.devcontainers.collection.layer.v1+json";
pub const IMAGE_TITLE_ANNOTATION: &str = "org.opencontainers.image.title";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciDescriptor {
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub digest: String,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<std::collections::BTreeMap<String, String>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OciManifest {
    #[serde(rename = "schemaVersion")]
    pub schema_version: u32,
    #[serde(rename = "mediaType")]
    pub media_type: String,
    pub config: OciDescriptor,
    pub layers: Vec<OciDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<std::collections::BTreeMap<String, String>>,
}

impl OciManifest {
    pub fn config_mediatype_matches(&self) -> bool {
        self.config.media_type == DEVCONTAINER_CONFIG_MEDIA_TYPE
    }
}

/// Builds a layer descriptor for the given bytes (§4.5 `digestLayer`).
pub fn digest_layer(bytes: &[u8], media_type: &str, title: &str) -> OciDescriptor {
    let digest = ContentDigest::sha256(bytes);
    let mut annotations = std::collections::BTreeMap::new();
    annotations.insert(IMAGE_TITLE_ANNOTATION.to_string(), title.to_string());
    OciDescriptor {
        media_type: media_type.to_string(),
        digest: digest.to_string(),
        size: bytes.len() as u64,
        annotations: Some(annotations),
    }
}

fn zero_byte_config_descriptor() -> OciDescriptor {
    OciDescriptor {
        media_type: DEVCONTAINER_CONFIG_MEDIA_TYPE.to_string(),
        digest: EMPTY_DEVCONTAINER_CONFIG_DIGEST.to_string(),
        size: 0,
        annotations: None,
    }
}

fn descriptor_to_json(desc: &OciDescriptor) -> Value {
    let mut map = Map::new();
    map.insert("mediaType".to_string(), Value::String(desc.media_type.clone()));
    map.insert("digest".to_string(), Value::String(desc.digest.clone()));
    map.insert("size".to_string(), Value::Number(desc.size.into()));
    if let Some(annotations) = &desc.annotations {
        let mut amap = Map::new();
        for (k, v) in annotations {
            amap.insert(k.clone(), Value::String(v.clone()));
        }
        map.insert("annotations".to_string(), Value::Object(amap));
    }
    Value::Object(map)
}

/// Builds the manifest bytes and its canonical content digest (§4.5,
/// §6 fixture). Key order is exactly `schemaVersion, mediaType, config,
/// layers[, annotations]`.
pub fn build_manifest(
    data_layer: &OciDescriptor,
    annotations: Option<&std::collections::BTreeMap<String, String>>,
) -> (Vec<u8>, ContentDigest) {
    let mut map = Map::new();
    map.insert("schemaVersion".to_string(), Value::Number(2.into()));
    map.insert(
        "mediaType".to_string(),
        Value::String(MANIFEST_MEDIA_TYPE.to_string()),
    );
    map.insert("config".to_string(), descriptor_to_json(&zero_byte_config_descriptor()));
    map.insert(
        "layers".to_string(),
        Value::Array(vec![descriptor_to_json(data_layer)]),
    );
    if let Some(annotations) = annotations {
        if !annotations.is_empty() {
            let mut amap = Map::new();
            for (k, v) in annotations {
                amap.insert(k.clone(), Value::String(v.clone()));
            }
            map.insert("annotations".to_string(), Value::Object(amap));
        }
    }
    let value = Value::Object(map);
    let bytes = serde_json::to_vec(&value).expect("manifest serialization cannot fail");
    let digest = ContentDigest::sha256(&bytes);
    (bytes, digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    // §6's canonical manifest fixture.
    #[test]
    fn canonical_fixture_digest_matches() {
        let data_layer = OciDescriptor {
            media_type: FEATURE_LAYER_MEDIA_TYPE.to_string(),
            digest: "sha256:b2006e7647191f7b47222ae48df049c6e21a4c5a04acfad0c4ef614d819de4c5"
                .to_string(),
            size: 15872,
            annotations: Some(std::collections::BTreeMap::from([(
                IMAGE_TITLE_ANNOTATION.to_string(),
                "go.tgz".to_string(),
            )])),
        };
        let (_, digest) = build_manifest(&data_layer, None);
        assert_eq!(
            digest.to_string(),
            "sha256:9726054859c13377c4c3c3c73d15065de59d0c25d61d5652576c0125f2ea8ed3"
        );
    }

    #[test]
    fn config_descriptor_is_fixed_zero_byte() {
        let data_layer = digest_layer(b"hello", FEATURE_LAYER_MEDIA_TYPE, "x.tgz");
        let (bytes, _) = build_manifest(&data_layer, None);
        let parsed: OciManifest = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed.config.size, 0);
        assert_eq!(parsed.config.digest, EMPTY_DEVCONTAINER_CONFIG_DIGEST);
        assert!(parsed.config_mediatype_matches());
    }

    #[test]
    fn key_order_is_exact() {
        let data_layer = digest_layer(b"hello", FEATURE_LAYER_MEDIA_TYPE, "x.tgz");
        let (bytes, _) = build_manifest(&data_layer, None);
        let text = String::from_utf8(bytes).unwrap();
        let schema_idx = text.find("schemaVersion").unwrap();
        let media_idx = text.find("mediaType").unwrap();
        let config_idx = text.find("\"config\"").unwrap();
        let layers_idx = text.find("\"layers\"").unwrap();
        assert!(schema_idx < media_idx);
        assert!(media_idx < config_idx);
        assert!(config_idx < layers_idx);
    }
}
