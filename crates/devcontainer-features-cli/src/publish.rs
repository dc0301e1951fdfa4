use std::path::PathBuf;

use clap::{Args, ValueEnum};
use devcontainer_features_common::registry::Registry;
use devcontainer_features_common::{Error, Result};
use devcontainer_features_core::publish::PublishKind;
use devcontainer_features_core::version::publish_tags;
use devcontainer_features_oci::{OciClient, RepositoryRef};
use semver::Version;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Kind {
    Feature,
    Template,
    Collection,
}

impl From<Kind> for PublishKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Feature => PublishKind::Feature,
            Kind::Template => PublishKind::Template,
            Kind::Collection => PublishKind::Collection,
        }
    }
}

#[derive(Args, Debug)]
pub struct PublishArgs {
    /// Packed artifact (or collection JSON) to publish
    #[arg(long = "archive")]
    archive: PathBuf,

    #[arg(long = "kind", value_enum)]
    kind: Kind,

    /// `registry/namespace.../name`
    #[arg(long = "repository")]
    repository: String,

    /// Semver version to publish under, fanned out to major/minor/latest tags.
    /// Collections ignore this and publish under `latest` alone.
    #[arg(long = "version")]
    version: Option<String>,
}

impl PublishArgs {
    pub async fn run(self) -> Result<()> {
        let (registry_str, path) = self
            .repository
            .split_once('/')
            .ok_or_else(|| Error::IdentifierInvalid {
                identifier: self.repository.clone(),
                reason: "expected registry/namespace.../name".into(),
            })?;
        let registry: Registry = registry_str.parse()?;
        let repo = RepositoryRef::new(registry, path.to_string());
        let bytes = tokio::fs::read(&self.archive).await?;
        let title = self
            .archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.archive.display().to_string());

        let client = OciClient::new()?;
        let kind: PublishKind = self.kind.into();

        let tags = match kind {
            PublishKind::Collection => vec!["latest".to_string()],
            PublishKind::Feature | PublishKind::Template => {
                let raw = self.version.ok_or_else(|| Error::Other("--version is required for feature/template publish".into()))?;
                let version = Version::parse(&raw).map_err(|e| Error::IdentifierInvalid {
                    identifier: raw.clone(),
                    reason: e.to_string(),
                })?;
                let published: Vec<Version> = client
                    .list_tags(&repo)
                    .await?
                    .iter()
                    .filter_map(|t| Version::parse(t).ok())
                    .collect();
                publish_tags(&version, &published)?
            }
        };

        let digest = devcontainer_features_core::publish::publish(&client, &repo, kind, &bytes, &title, &tags).await?;
        println!("{digest}");
        Ok(())
    }
}
