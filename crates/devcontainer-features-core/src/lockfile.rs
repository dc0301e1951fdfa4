//! C9's lockfile half (§4.9, §6): `[.]devcontainer-lock.json`.
//!
//! Unlike `wasm-pkg-core::lock::LockFile` (an flock-guarded file kept
//! open for the resolver's lifetime), this lockfile is written
//! atomically — write-to-temp, then rename — since a devcontainer
//! install is a single short-lived pass rather than a held editing
//! session.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

use devcontainer_features_common::{Error, Result};
use serde::{Deserialize, Serialize};

pub const LOCKFILE_NAME: &str = ".devcontainer-lock.json";

/// A single locked Feature entry, keyed by the user-supplied identifier
/// in [`LockFile::features`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedFeature {
    pub version: String,
    pub resolved: String,
    pub integrity: String,
}

/// The `[.]devcontainer-lock.json` schema: a map from user-supplied
/// Feature identifier to its locked resolution, serialized with sorted
/// keys (a `BTreeMap` gives this for free) and 2-space indentation.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LockFile {
    pub features: BTreeMap<String, LockedFeature>,
}

impl LockFile {
    pub fn new(features: impl IntoIterator<Item = (String, LockedFeature)>) -> Self {
        Self {
            features: features.into_iter().collect(),
        }
    }

    pub fn to_pretty_json(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"  ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.serialize(&mut ser)?;
        Ok(buf)
    }

    pub async fn read(path: &Path) -> Result<Option<Self>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes the lockfile to `path` (§4.9, §5 "written atomically").
    /// In frozen mode, a mismatch against the existing file fails with
    /// `LockfileMismatch`, and a missing file fails with
    /// `LockfileMissing` — the caller never gets a silent write. In
    /// non-frozen mode, the file is left untouched when the computed
    /// bytes already match what's on disk.
    pub async fn write(&self, path: &Path, frozen: bool) -> Result<()> {
        let computed = self.to_pretty_json()?;
        let existing = tokio::fs::read(path).await.ok();

        if frozen {
            return match existing {
                Some(bytes) if bytes == computed => Ok(()),
                Some(_) => Err(Error::LockfileMismatch {
                    path: path.display().to_string(),
                }),
                None => Err(Error::LockfileMissing {
                    path: path.display().to_string(),
                }),
            };
        }

        if existing.as_deref() == Some(computed.as_slice()) {
            return Ok(());
        }

        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
            temp.write_all(&computed)?;
            temp.persist(&path).map_err(|e| Error::Io(e.error))?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Other(format!("lockfile write task panicked: {e}")))??;
        Ok(())
    }
}
