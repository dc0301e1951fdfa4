//! C6's resolve half (§4.6): fetches and parses `devcontainer-feature.json`
//! metadata for each source kind, returning a [`FeatureSet`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use devcontainer_features_common::feature_set::FeatureSet;
use devcontainer_features_common::identifier::SourceDescriptor;
use devcontainer_features_common::metadata::FeatureMetadata;
use devcontainer_features_common::option_value::OptionsMap;
use devcontainer_features_common::{Error, Result};
use devcontainer_features_oci::{extract_tar, OciClient, RepositoryRef};
use devcontainer_features_transport::HttpTransport;
use http::{HeaderMap, HeaderValue, Method};

const METADATA_ANNOTATION: &str = "dev.containers.metadata";
const METADATA_FILENAME: &str = "devcontainer-feature.json";

/// Resolves a parsed [`SourceDescriptor`] into a [`FeatureSet`], the
/// collaborator the graph builder (§4.7) calls for every node it pops
/// off the worklist.
#[async_trait]
pub trait FeatureResolver: Send + Sync {
    async fn resolve(&self, source: &SourceDescriptor, options: &OptionsMap) -> Result<FeatureSet>;
}

#[derive(serde::Deserialize)]
struct GithubRelease {
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(serde::Deserialize)]
struct GithubAsset {
    name: String,
    url: String,
    browser_download_url: String,
}

/// The network/filesystem-backed [`FeatureResolver`] used outside of
/// tests: dispatches on source kind to the OCI client, an HTTP
/// download, a local read, or the GitHub releases API.
pub struct Resolver {
    oci: OciClient,
    transport: Arc<HttpTransport>,
    local_features_dir: Option<PathBuf>,
}

impl Resolver {
    pub fn new() -> Result<Self> {
        let transport = Arc::new(HttpTransport::new()?);
        Ok(Self {
            oci: OciClient::with_transport(transport.clone()),
            transport,
            local_features_dir: None,
        })
    }

    pub fn with_local_features_dir(mut self, dir: PathBuf) -> Self {
        self.local_features_dir = Some(dir);
        self
    }
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new().expect("default resolver configuration is always valid")
    }
}

#[async_trait]
impl FeatureResolver for Resolver {
    async fn resolve(&self, source: &SourceDescriptor, options: &OptionsMap) -> Result<FeatureSet> {
        match source {
            SourceDescriptor::Oci { .. } => self.resolve_oci(source, options).await,
            SourceDescriptor::FilePath { path, .. } => self.resolve_file_path(source, path, options).await,
            SourceDescriptor::Tarball { url, inner_name } => {
                self.resolve_tarball(source, url, inner_name, options).await
            }
            SourceDescriptor::GitHubRelease { owner, repo, name, tag } => {
                self.resolve_github_release(source, owner, repo, name, tag, options).await
            }
            SourceDescriptor::Local { name } => self.resolve_local(source, name, options).await,
        }
    }
}

impl Resolver {
    async fn resolve_oci(&self, source: &SourceDescriptor, options: &OptionsMap) -> Result<FeatureSet> {
        let (registry, namespace, name, reference, resource) = match source {
            SourceDescriptor::Oci {
                registry,
                namespace,
                name,
                reference,
                resource,
                ..
            } => (registry.clone(), namespace.clone(), name.clone(), reference.clone(), resource.clone()),
            _ => unreachable!("resolve_oci called with a non-OCI source"),
        };
        let path = match &namespace {
            Some(ns) => format!("{}/{}", ns.as_str(), name.as_str()),
            None => name.as_str().to_string(),
        };
        let repo = RepositoryRef::new(registry, path);

        let (manifest, _bytes, digest) = self
            .oci
            .fetch_manifest(&repo, reference.as_str())
            .await?
            .ok_or_else(|| Error::ManifestNotFound { reference: resource.clone() })?;

        let metadata = match manifest.annotations.as_ref().and_then(|a| a.get(METADATA_ANNOTATION)) {
            Some(raw) => FeatureMetadata::parse(raw, &resource)?,
            None => {
                let layer = manifest.layers.first().ok_or_else(|| Error::MetadataParseError {
                    identifier: resource.clone(),
                    reason: "manifest has no layers".into(),
                })?;
                let blob = self.oci.fetch_blob(&repo, &layer.digest).await?;
                self.extract_and_parse_metadata(&blob, &resource).await?
            }
        };

        Ok(FeatureSet::new(source.clone(), metadata, options.clone()).with_manifest(manifest, digest))
    }

    async fn resolve_file_path(&self, source: &SourceDescriptor, path: &str, options: &OptionsMap) -> Result<FeatureSet> {
        let metadata_path = Path::new(path).join(METADATA_FILENAME);
        let contents = tokio::fs::read_to_string(&metadata_path)
            .await
            .map_err(|e| Error::MetadataParseError { identifier: path.to_string(), reason: e.to_string() })?;
        let metadata = FeatureMetadata::parse(&contents, path)?;
        Ok(FeatureSet::new(source.clone(), metadata, options.clone()))
    }

    async fn resolve_tarball(
        &self,
        source: &SourceDescriptor,
        url: &str,
        inner_name: &str,
        options: &OptionsMap,
    ) -> Result<FeatureSet> {
        let response = self.transport.request(Method::GET, url, HeaderMap::new(), None).await?;
        if !response.is_success() {
            return Err(Error::DependencyUnresolved {
                identifier: url.to_string(),
                dependency: url.to_string(),
                reason: format!("tarball download returned status {}", response.status),
            });
        }
        let dest = tempfile::tempdir()?;
        extract_tar(&response.body, dest.path(), |_, _| true)?;
        let base = if inner_name.is_empty() {
            dest.path().to_path_buf()
        } else {
            dest.path().join(inner_name)
        };
        let contents = tokio::fs::read_to_string(base.join(METADATA_FILENAME))
            .await
            .map_err(|e| Error::MetadataParseError { identifier: url.to_string(), reason: e.to_string() })?;
        let metadata = FeatureMetadata::parse(&contents, url)?;
        Ok(FeatureSet::new(source.clone(), metadata, options.clone()))
    }

    async fn resolve_github_release(
        &self,
        source: &SourceDescriptor,
        owner: &str,
        repo: &str,
        name: &str,
        tag: &str,
        options: &OptionsMap,
    ) -> Result<FeatureSet> {
        let identifier = format!("{owner}/{repo}/{name}");
        let api_url = if tag == "latest" {
            format!("https://api.github.com/repos/{owner}/{repo}/releases/latest")
        } else {
            format!("https://api.github.com/repos/{owner}/{repo}/releases/tags/{tag}")
        };
        let github_token = std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.is_empty());

        let mut headers = HeaderMap::new();
        headers.insert(http::header::USER_AGENT, HeaderValue::from_static("devcontainer"));
        if let Some(token) = &github_token {
            headers.insert(
                http::header::AUTHORIZATION,
                HeaderValue::from_str(&format!("token {token}")).map_err(|e| Error::Other(e.to_string()))?,
            );
        }

        let response = self.transport.request(Method::GET, &api_url, headers, None).await?;
        if !response.is_success() {
            return Err(Error::DependencyUnresolved {
                identifier: identifier.clone(),
                dependency: api_url,
                reason: format!("github release lookup returned status {}", response.status),
            });
        }
        let release: GithubRelease = serde_json::from_slice(&response.body)?;

        let preferred_name = format!("{name}.tgz");
        let asset = release
            .assets
            .iter()
            .find(|a| a.name == preferred_name)
            .or_else(|| release.assets.iter().find(|a| a.name == "devcontainer-features.tgz"))
            .ok_or_else(|| Error::DependencyUnresolved {
                identifier: identifier.clone(),
                dependency: preferred_name.clone(),
                reason: "release has no matching tarball asset".into(),
            })?;

        let bytes = if let Some(token) = &github_token {
            let mut asset_headers = HeaderMap::new();
            asset_headers.insert(http::header::ACCEPT, HeaderValue::from_static("application/octet-stream"));
            asset_headers.insert(
                http::header::AUTHORIZATION,
                HeaderValue::from_str(&format!("token {token}")).map_err(|e| Error::Other(e.to_string()))?,
            );
            asset_headers.insert(http::header::USER_AGENT, HeaderValue::from_static("devcontainer"));
            self.transport.request(Method::GET, &asset.url, asset_headers, None).await?.body
        } else {
            self.transport
                .request(Method::GET, &asset.browser_download_url, HeaderMap::new(), None)
                .await?
                .body
        };

        let metadata = self.extract_and_parse_metadata(&bytes, &identifier).await?;
        Ok(FeatureSet::new(source.clone(), metadata, options.clone()))
    }

    async fn resolve_local(&self, source: &SourceDescriptor, name: &str, options: &OptionsMap) -> Result<FeatureSet> {
        let dir = self.local_features_dir.as_ref().ok_or_else(|| Error::DependencyUnresolved {
            identifier: name.to_string(),
            dependency: name.to_string(),
            reason: "no local features directory is configured".into(),
        })?;
        let contents = tokio::fs::read_to_string(dir.join(name).join(METADATA_FILENAME))
            .await
            .map_err(|e| Error::MetadataParseError { identifier: name.to_string(), reason: e.to_string() })?;
        let metadata = FeatureMetadata::parse(&contents, name)?;
        Ok(FeatureSet::new(source.clone(), metadata, options.clone()))
    }

    async fn extract_and_parse_metadata(&self, archive_bytes: &[u8], identifier: &str) -> Result<FeatureMetadata> {
        let dest = tempfile::tempdir()?;
        let written = extract_tar(archive_bytes, dest.path(), |path, _| {
            path.file_name().map(|n| n == METADATA_FILENAME).unwrap_or(false)
        })?;
        let metadata_path = written.first().ok_or_else(|| Error::MetadataParseError {
            identifier: identifier.to_string(),
            reason: format!("archive did not contain {METADATA_FILENAME}"),
        })?;
        let contents = std::fs::read_to_string(dest.path().join(metadata_path))
            .map_err(|e| Error::MetadataParseError { identifier: identifier.to_string(), reason: e.to_string() })?;
        FeatureMetadata::parse(&contents, identifier)
    }
}
