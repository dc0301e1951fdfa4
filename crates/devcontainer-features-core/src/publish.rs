//! C10's publish half (§4.10): blob upload with skip-if-present, then a
//! `putManifest` per tag in the fan-out.

use devcontainer_features_common::digest::ContentDigest;
use devcontainer_features_common::manifest::{
    build_manifest, digest_layer, COLLECTION_LAYER_MEDIA_TYPE, FEATURE_LAYER_MEDIA_TYPE,
    EMPTY_DEVCONTAINER_CONFIG_DIGEST,
};
use devcontainer_features_common::{Error, Result};
use devcontainer_features_oci::{OciClient, RepositoryRef};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PublishKind {
    Feature,
    Template,
    Collection,
}

impl PublishKind {
    fn data_layer_media_type(&self) -> &'static str {
        match self {
            PublishKind::Feature | PublishKind::Template => FEATURE_LAYER_MEDIA_TYPE,
            PublishKind::Collection => COLLECTION_LAYER_MEDIA_TYPE,
        }
    }

    fn ghcr_package_type(&self) -> String {
        match self {
            PublishKind::Feature => "devcontainer_feature".to_string(),
            PublishKind::Template => "devcontainer_template".to_string(),
            PublishKind::Collection => "devcontainer_collection".to_string(),
        }
    }
}

/// Publishes `data_layer_bytes` to `repo`, tagged with every entry in
/// `tags` (§4.9 "Publish tag fan-out" supplies these for Features and
/// Templates; Collections are always published under `latest` alone —
/// the caller is responsible for that fan-out decision). Returns the
/// manifest's content digest.
pub async fn publish(
    client: &OciClient,
    repo: &RepositoryRef,
    kind: PublishKind,
    data_layer_bytes: &[u8],
    data_layer_title: &str,
    tags: &[String],
) -> Result<ContentDigest> {
    if tags.is_empty() {
        return Err(Error::Other("publish requires at least one tag".into()));
    }

    let data_layer = digest_layer(data_layer_bytes, kind.data_layer_media_type(), data_layer_title);

    ensure_blob_uploaded(client, repo, EMPTY_DEVCONTAINER_CONFIG_DIGEST, Vec::new()).await?;
    ensure_blob_uploaded(client, repo, &data_layer.digest, data_layer_bytes.to_vec()).await?;

    let annotations = if repo.registry.host() == "ghcr.io" {
        let mut map = std::collections::BTreeMap::new();
        map.insert("com.github.package.type".to_string(), kind.ghcr_package_type());
        Some(map)
    } else {
        None
    };
    let (manifest_bytes, content_digest) = build_manifest(&data_layer, annotations.as_ref());

    let mut last_digest = content_digest;
    for tag in tags {
        last_digest = client.put_manifest(repo, &manifest_bytes, tag).await?;
    }
    Ok(last_digest)
}

/// Uploads `bytes` under `digest` unless the registry already has it
/// (§4.4 `blobExists` skip-reupload rule).
async fn ensure_blob_uploaded(
    client: &OciClient,
    repo: &RepositoryRef,
    digest: &str,
    bytes: Vec<u8>,
) -> Result<()> {
    if client.blob_exists(repo, digest).await? {
        return Ok(());
    }
    let session = client.begin_upload(repo).await?;
    client.put_blob(repo, &session, digest, bytes).await
}

#[cfg(test)]
mod tests {
    use devcontainer_features_common::registry::Registry;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn repo(base: &str, repo_path: &str) -> RepositoryRef {
        let host = base.trim_start_matches("http://");
        RepositoryRef::new(host.parse::<Registry>().unwrap(), repo_path.to_string())
    }

    #[tokio::test]
    async fn skips_reupload_when_both_blobs_already_present() {
        let server = MockServer::start().await;
        let repo_ref = repo(&server.uri(), "ns/name");

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v2/ns/name/manifests/1.0.0"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = OciClient::new().unwrap();
        let digest = publish(
            &client,
            &repo_ref,
            PublishKind::Feature,
            b"tarball bytes",
            "node.tgz",
            &["1.0.0".to_string()],
        )
        .await
        .unwrap();
        assert_eq!(digest.algorithm(), "sha256");
    }

    #[tokio::test]
    async fn uploads_missing_blobs_before_manifest() {
        let server = MockServer::start().await;
        let repo_ref = repo(&server.uri(), "ns/name");

        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v2/ns/name/blobs/uploads/"))
            .respond_with(ResponseTemplate::new(202).insert_header("location", "/v2/ns/name/blobs/uploads/1"))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v2/ns/name/blobs/uploads/1"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v2/ns/name/manifests/1.0.0"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v2/ns/name/manifests/1"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v2/ns/name/manifests/latest"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let client = OciClient::new().unwrap();
        publish(
            &client,
            &repo_ref,
            PublishKind::Feature,
            b"tarball bytes",
            "node.tgz",
            &["1.0.0".to_string(), "1".to_string(), "latest".to_string()],
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn publish_requires_at_least_one_tag() {
        let server = MockServer::start().await;
        let repo_ref = repo(&server.uri(), "ns/name");
        let client = OciClient::new().unwrap();
        let err = publish(&client, &repo_ref, PublishKind::Collection, b"{}", "index.json", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Other(_)));
    }
}
