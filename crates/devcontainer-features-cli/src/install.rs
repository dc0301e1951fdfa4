use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Args;
use devcontainer_features_common::identifier::SourceDescriptor;
use devcontainer_features_common::option_value::{OptionValue, OptionsMap};
use devcontainer_features_common::{Error, Result};
use devcontainer_features_core::lockfile::{LockFile, LockedFeature};
use devcontainer_features_resolver::{build_graph, schedule, Resolver};

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// A Feature identifier to install; may be repeated
    #[arg(long = "feature", required = true)]
    features: Vec<String>,

    /// An option for one of the identifiers above, as `identifier::key=value`
    #[arg(long = "option")]
    options: Vec<String>,

    /// Soft install-order hint, in priority order
    #[arg(long = "override-install-order", value_delimiter = ',')]
    override_install_order: Vec<String>,

    /// Where to read/write the lockfile
    #[arg(long = "lockfile", default_value = devcontainer_features_core::lockfile::LOCKFILE_NAME)]
    lockfile: PathBuf,

    /// Fail rather than rewrite the lockfile if the resolved graph differs
    #[arg(long)]
    frozen: bool,
}

impl InstallArgs {
    pub async fn run(self) -> Result<()> {
        let mut options_by_id: BTreeMap<String, OptionsMap> = BTreeMap::new();
        for raw in &self.options {
            let (id, rest) = raw.split_once("::").ok_or_else(|| Error::Other(format!("malformed --option `{raw}`, expected identifier::key=value")))?;
            let (key, value) = rest.split_once('=').ok_or_else(|| Error::Other(format!("malformed --option `{raw}`, expected identifier::key=value")))?;
            options_by_id
                .entry(id.to_string())
                .or_default()
                .insert(key.to_string(), OptionValue::String(value.to_string()));
        }

        let inputs: Vec<(String, OptionsMap)> = self
            .features
            .iter()
            .map(|id| (id.clone(), options_by_id.get(id).cloned().unwrap_or_default()))
            .collect();

        let resolver = Resolver::new()?;
        let build = build_graph(&resolver, inputs, &self.override_install_order).await?;
        let plan = schedule(build, &self.override_install_order)?;

        // Only OCI sources carry the content digest the lockfile schema
        // requires as `integrity`; other source kinds are pinned by the
        // identifier itself and have nothing to lock.
        let mut locked = BTreeMap::new();
        for feature_set in plan.iter().filter(|f| matches!(f.source, SourceDescriptor::Oci { .. })) {
            let resource = resource_of(&feature_set.source);
            let digest = feature_set
                .manifest_digest
                .as_ref()
                .map(|d| d.to_string())
                .unwrap_or_default();
            let resolved = if digest.is_empty() {
                resource.clone()
            } else {
                format!("{resource}@{digest}")
            };
            locked.insert(
                feature_set.user_id.clone(),
                LockedFeature {
                    version: feature_set.metadata.version.clone().unwrap_or_else(|| "0.0.0".to_string()),
                    resolved,
                    integrity: digest,
                },
            );
        }
        let lock = LockFile::new(locked);
        lock.write(&self.lockfile, self.frozen).await?;

        for feature_set in &plan {
            println!("{}", resource_of(&feature_set.source));
        }
        Ok(())
    }
}

fn resource_of(source: &devcontainer_features_common::identifier::SourceDescriptor) -> String {
    use devcontainer_features_common::identifier::SourceDescriptor;
    match source {
        SourceDescriptor::Oci { resource, .. } => resource.clone(),
        SourceDescriptor::FilePath { path, .. } => path.clone(),
        SourceDescriptor::Tarball { url, .. } => url.clone(),
        SourceDescriptor::GitHubRelease { owner, repo, name, .. } => format!("{owner}/{repo}/{name}"),
        SourceDescriptor::Local { name } => name.clone(),
    }
}
