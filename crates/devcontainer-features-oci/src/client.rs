//! The hand-rolled OCI Distribution Spec client (C4).
//!
//! Grounded on the shape of `krustlet`'s `oci_distribution::client::Client`
//! (the closest hand-rolled client in the retrieval pack) for the
//! fetch-manifest / pull-layer / push-layer flow, adapted to this
//! workspace's exact header and status-code contract rather than copied.

use std::sync::Arc;

use devcontainer_features_common::digest::ContentDigest;
use devcontainer_features_common::manifest::{OciManifest, DEVCONTAINER_CONFIG_MEDIA_TYPE, MANIFEST_MEDIA_TYPE};
use devcontainer_features_common::registry::Registry;
use devcontainer_features_common::{Error, Result};
use devcontainer_features_transport::{AuthNegotiator, HttpTransport};
use http::{HeaderMap, HeaderValue, Method};

/// The repository half of an OCI reference: `registry/namespace.../name`,
/// without the tag or digest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RepositoryRef {
    pub registry: Registry,
    pub path: String,
}

impl RepositoryRef {
    pub fn new(registry: Registry, path: impl Into<String>) -> Self {
        Self {
            registry,
            path: path.into(),
        }
    }

    fn base_url(&self) -> String {
        let scheme = if self.registry.host().starts_with("localhost")
            || self.registry.host().starts_with("127.0.0.1")
        {
            "http"
        } else {
            "https"
        };
        match self.registry.port() {
            Some(port) => format!("{scheme}://{}:{port}", self.registry.registry_host()),
            None => format!("{scheme}://{}", self.registry.registry_host()),
        }
    }

    fn manifests_url(&self, reference: &str) -> String {
        format!("{}/v2/{}/manifests/{reference}", self.base_url(), self.path)
    }

    fn tags_list_url(&self) -> String {
        format!("{}/v2/{}/tags/list", self.base_url(), self.path)
    }

    fn blobs_url(&self, digest: &str) -> String {
        format!("{}/v2/{}/blobs/{digest}", self.base_url(), self.path)
    }

    fn uploads_url(&self) -> String {
        format!("{}/v2/{}/blobs/uploads/", self.base_url(), self.path)
    }
}

/// Returned by [`OciClient::begin_upload`]: the `Location` URI a blob PUT
/// must be sent to, merging in the `digest` query parameter.
#[derive(Clone, Debug)]
pub struct UploadSession {
    pub location: String,
}

#[derive(serde::Deserialize)]
struct TagList {
    #[serde(default)]
    tags: Vec<String>,
}

pub struct OciClient {
    transport: Arc<HttpTransport>,
    auth: AuthNegotiator,
}

impl OciClient {
    pub fn new() -> Result<Self> {
        Ok(Self {
            transport: Arc::new(HttpTransport::new()?),
            auth: AuthNegotiator::new(),
        })
    }

    pub fn with_transport(transport: Arc<HttpTransport>) -> Self {
        Self {
            transport,
            auth: AuthNegotiator::new(),
        }
    }

    async fn authed(
        &self,
        repo: &RepositoryRef,
        method: Method,
        url: &str,
        headers: HeaderMap,
        body: Option<Vec<u8>>,
    ) -> Result<devcontainer_features_transport::HttpResponse> {
        self.auth
            .authenticated_request(&self.transport, repo.registry.host(), method, url, headers, body)
            .await
    }

    /// `fetchManifest` (§4.4): `None` if the registry is unreachable-shaped
    /// (no dot, not `localhost`) or the manifest is missing (404).
    pub async fn fetch_manifest(
        &self,
        repo: &RepositoryRef,
        reference: &str,
    ) -> Result<Option<(OciManifest, Vec<u8>, ContentDigest)>> {
        if !repo.registry.looks_reachable() {
            return Ok(None);
        }
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::ACCEPT,
            HeaderValue::from_static(MANIFEST_MEDIA_TYPE),
        );
        let response = self
            .authed(repo, Method::GET, &repo.manifests_url(reference), headers, None)
            .await?;
        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(Error::RegistryError {
                registry: repo.registry.to_string(),
                reason: format!("manifest fetch returned status {}", response.status),
            });
        }
        let manifest: OciManifest = serde_json::from_slice(&response.body)?;
        if manifest.config.media_type != DEVCONTAINER_CONFIG_MEDIA_TYPE {
            return Err(Error::ManifestMediaTypeMismatch {
                reference: format!("{}:{reference}", repo.path),
                found: manifest.config.media_type.clone(),
            });
        }
        let digest = ContentDigest::sha256(&response.body);
        Ok(Some((manifest, response.body.to_vec(), digest)))
    }

    /// `listTags` (§4.4): 404 maps to an empty list.
    pub async fn list_tags(&self, repo: &RepositoryRef) -> Result<Vec<String>> {
        let response = self
            .authed(repo, Method::GET, &repo.tags_list_url(), HeaderMap::new(), None)
            .await?;
        if response.status == 404 {
            return Ok(Vec::new());
        }
        if !response.is_success() {
            return Err(Error::RegistryError {
                registry: repo.registry.to_string(),
                reason: format!("tag list returned status {}", response.status),
            });
        }
        let parsed: TagList = serde_json::from_slice(&response.body)?;
        Ok(parsed.tags)
    }

    /// `blobExists` (§4.4): HEAD, 200 means present.
    pub async fn blob_exists(&self, repo: &RepositoryRef, digest: &str) -> Result<bool> {
        let response = self
            .authed(repo, Method::HEAD, &repo.blobs_url(digest), HeaderMap::new(), None)
            .await?;
        Ok(response.status == 200)
    }

    /// Fetches a blob's raw bytes (used before extraction or re-digesting).
    pub async fn fetch_blob(&self, repo: &RepositoryRef, digest: &str) -> Result<Vec<u8>> {
        let response = self
            .authed(repo, Method::GET, &repo.blobs_url(digest), HeaderMap::new(), None)
            .await?;
        if !response.is_success() {
            return Err(Error::BlobFetchFailed {
                reference: repo.path.clone(),
                digest: digest.to_string(),
                reason: format!("status {}", response.status),
            });
        }
        Ok(response.body.to_vec())
    }

    /// `beginUpload` (§4.4): POST, require 202, read `Location`.
    pub async fn begin_upload(&self, repo: &RepositoryRef) -> Result<UploadSession> {
        let response = self
            .authed(repo, Method::POST, &repo.uploads_url(), HeaderMap::new(), None)
            .await?;
        if response.status != 202 {
            return Err(Error::BlobPutFailed {
                reference: repo.path.clone(),
                digest: String::new(),
                reason: format!("upload session POST returned status {}", response.status),
            });
        }
        let location = response
            .header("location")
            .ok_or_else(|| Error::BlobPutFailed {
                reference: repo.path.clone(),
                digest: String::new(),
                reason: "upload session response missing Location header".into(),
            })?
            .to_string();
        Ok(UploadSession { location })
    }

    /// `putBlob` (§4.4): PUT `location?digest=...` (merging query strings),
    /// requires 201.
    pub async fn put_blob(
        &self,
        repo: &RepositoryRef,
        session: &UploadSession,
        digest: &str,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let url = merge_digest_query(&session.location, digest);
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/octet-stream"),
        );
        headers.insert(
            http::header::CONTENT_LENGTH,
            HeaderValue::from_str(&bytes.len().to_string()).expect("integer length header value"),
        );
        let response = self.authed(repo, Method::PUT, &url, headers, Some(bytes)).await?;
        if response.status != 201 {
            return Err(Error::BlobPutFailed {
                reference: repo.path.clone(),
                digest: digest.to_string(),
                reason: format!("status {}", response.status),
            });
        }
        Ok(())
    }

    /// `putManifest` (§4.4): PUT with the manifest content type; on 429,
    /// sleeps 2s and retries once; requires 201.
    pub async fn put_manifest(
        &self,
        repo: &RepositoryRef,
        manifest_bytes: &[u8],
        tag: &str,
    ) -> Result<ContentDigest> {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static(MANIFEST_MEDIA_TYPE),
        );
        let url = repo.manifests_url(tag);
        let mut response = self
            .authed(repo, Method::PUT, &url, headers.clone(), Some(manifest_bytes.to_vec()))
            .await?;
        if response.status == 429 {
            tokio::time::sleep(std::time::Duration::from_secs(2)).await;
            response = self
                .authed(repo, Method::PUT, &url, headers, Some(manifest_bytes.to_vec()))
                .await?;
        }
        if response.status != 201 {
            return Err(Error::RegistryError {
                registry: repo.registry.to_string(),
                reason: format!("manifest PUT returned status {}", response.status),
            });
        }
        match response
            .header("docker-content-digest")
            .map(|s| s.parse::<ContentDigest>())
        {
            Some(Ok(digest)) => Ok(digest),
            _ => Ok(ContentDigest::sha256(manifest_bytes)),
        }
    }
}

impl Default for OciClient {
    fn default() -> Self {
        Self::new().expect("default OCI client configuration is always valid")
    }
}

/// Merges `digest=<digest>` into a location URI that may already carry its
/// own query string (per §4.4's "merge query strings" rule).
fn merge_digest_query(location: &str, digest: &str) -> String {
    let separator = if location.contains('?') { '&' } else { '?' };
    format!("{location}{separator}digest={digest}")
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn repo(base: &str, path: &str) -> RepositoryRef {
        let host = base.trim_start_matches("http://");
        RepositoryRef::new(host.parse().unwrap(), path.to_string())
    }

    #[test]
    fn merges_digest_into_bare_location() {
        assert_eq!(
            merge_digest_query("https://reg/uploads/123", "sha256:abc"),
            "https://reg/uploads/123?digest=sha256:abc"
        );
    }

    #[test]
    fn merges_digest_into_location_with_existing_query() {
        assert_eq!(
            merge_digest_query("https://reg/uploads/123?foo=bar", "sha256:abc"),
            "https://reg/uploads/123?foo=bar&digest=sha256:abc"
        );
    }

    #[tokio::test]
    async fn missing_manifest_returns_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/ns/name/manifests/latest"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = OciClient::new().unwrap();
        let repo = repo(&server.uri(), "ns/name");
        let result = client.fetch_manifest(&repo, "latest").await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn list_tags_maps_404_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v2/ns/name/tags/list"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = OciClient::new().unwrap();
        let repo = repo(&server.uri(), "ns/name");
        let tags = client.list_tags(&repo).await.unwrap();
        assert!(tags.is_empty());
    }

    #[tokio::test]
    async fn blob_exists_true_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/v2/ns/name/blobs/sha256:abc"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let client = OciClient::new().unwrap();
        let repo = repo(&server.uri(), "ns/name");
        assert!(client.blob_exists(&repo, "sha256:abc").await.unwrap());
    }
}
