use std::path::PathBuf;

use clap::{Args, ValueEnum};
use devcontainer_features_common::Result;
use devcontainer_features_core::pack::{archive_filename, ArtifactKind};

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Kind {
    Feature,
    Template,
}

impl From<Kind> for ArtifactKind {
    fn from(kind: Kind) -> Self {
        match kind {
            Kind::Feature => ArtifactKind::Feature,
            Kind::Template => ArtifactKind::Template,
        }
    }
}

#[derive(Args, Debug)]
pub struct PackArgs {
    /// Directory containing the Feature or Template to pack
    #[arg(long = "path")]
    path: PathBuf,

    #[arg(long = "kind", value_enum)]
    kind: Kind,

    /// The Feature or Template id, used to name the archive
    #[arg(long = "id")]
    id: String,

    /// Directory to write the archive into
    #[arg(long = "output", default_value = ".")]
    output: PathBuf,
}

impl PackArgs {
    pub async fn run(self) -> Result<()> {
        let kind: ArtifactKind = self.kind.into();
        let bytes = devcontainer_features_core::pack::pack(&self.path, kind, &self.id)?;
        let output_path = self.output.join(archive_filename(kind, &self.id));
        tokio::fs::write(&output_path, bytes).await?;
        println!("{}", output_path.display());
        Ok(())
    }
}
