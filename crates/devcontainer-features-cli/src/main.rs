//! Command-line front end: install (resolve + schedule + lock), pack, and
//! publish, dispatching into `devcontainer-features-core`/`-resolver`/`-oci`.
//!
//! Grounded on `wkg`'s `Cli`/`Commands`/per-subcommand `Args::run()` layout.

mod install;
mod pack;
mod publish;

use clap::{Parser, Subcommand};
use tracing::level_filters::LevelFilter;

#[derive(Parser, Debug)]
#[command(name = "devcontainer-features", version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve a set of Feature identifiers into an install plan and lockfile
    Install(install::InstallArgs),
    /// Tar and gzip a Feature or Template directory
    Pack(pack::PackArgs),
    /// Publish a packed artifact (or collection) to an OCI registry
    Publish(publish::PublishArgs),
}

/// Maps the shared error taxonomy to the exit codes in the external
/// interface: 1 validation/config, 2 auth, 3 registry, 4 dependency
/// resolution, 5 lockfile mismatch.
fn exit_code_for(err: &devcontainer_features_common::Error) -> i32 {
    use devcontainer_features_common::Error;
    match err {
        Error::IdentifierInvalid { .. } | Error::MetadataParseError { .. } | Error::TarExtractError { .. } => 1,
        Error::AuthMissingChallenge { .. } | Error::AuthUnsupported { .. } | Error::AuthFetchFailed { .. } => 2,
        Error::RegistryUnreachable { .. }
        | Error::ManifestNotFound { .. }
        | Error::ManifestMediaTypeMismatch { .. }
        | Error::BlobFetchFailed { .. }
        | Error::BlobPutFailed { .. }
        | Error::RegistryError { .. } => 3,
        Error::DependencyUnresolved { .. } | Error::CyclicDependency { .. } => 4,
        Error::LockfileMissing { .. } | Error::LockfileMismatch { .. } => 5,
        Error::Io(_) | Error::Json(_) | Error::Other(_) => 1,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Install(args) => args.run().await,
        Commands::Pack(args) => args.run().await,
        Commands::Publish(args) => args.run().await,
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(exit_code_for(&err));
    }
}
