/// The error taxonomy shared by every crate in the workspace.
///
/// Each site that can fail returns one of these variants rather than a
/// bare string; the CLI maps them to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid feature identifier `{identifier}`: {reason}")]
    IdentifierInvalid { identifier: String, reason: String },

    #[error("registry `{registry}` is unreachable")]
    RegistryUnreachable { registry: String },

    #[error("registry `{registry}` sent a 401 response with no WWW-Authenticate header")]
    AuthMissingChallenge { registry: String },

    #[error("registry `{registry}` requested an unsupported auth scheme `{scheme}`")]
    AuthUnsupported { registry: String, scheme: String },

    #[error("failed to fetch a bearer token for `{registry}`: {reason}")]
    AuthFetchFailed { registry: String, reason: String },

    #[error("manifest not found for `{reference}`")]
    ManifestNotFound { reference: String },

    #[error("manifest for `{reference}` has config mediaType `{found}`, expected `application/vnd.devcontainers`")]
    ManifestMediaTypeMismatch { reference: String, found: String },

    #[error("failed to fetch blob `{digest}` from `{reference}`: {reason}")]
    BlobFetchFailed {
        reference: String,
        digest: String,
        reason: String,
    },

    #[error("failed to put blob `{digest}` to `{reference}`: {reason}")]
    BlobPutFailed {
        reference: String,
        digest: String,
        reason: String,
    },

    #[error("failed to extract tar archive into `{dest}`: {reason}")]
    TarExtractError { dest: String, reason: String },

    #[error("failed to parse metadata for `{identifier}`: {reason}")]
    MetadataParseError { identifier: String, reason: String },

    #[error("dependency `{dependency}` of `{identifier}` could not be resolved: {reason}")]
    DependencyUnresolved {
        identifier: String,
        dependency: String,
        reason: String,
    },

    #[error("circular dependency detected among: {}", .nodes.join(", "))]
    CyclicDependency { nodes: Vec<String> },

    #[error("lockfile `{path}` is missing and frozen mode is enabled")]
    LockfileMissing { path: String },

    #[error("lockfile `{path}` does not match the resolved graph (frozen mode)")]
    LockfileMismatch { path: String },

    #[error("registry `{registry}` returned an error: {reason}")]
    RegistryError { registry: String, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
