//! C10's pack half (§4.10): tar+gzip a Feature or Template directory into
//! `devcontainer-{kind}-{id}.tgz`, after validating the files required
//! for its kind are present.

use std::io::Write;
use std::path::{Path, PathBuf};

use devcontainer_features_common::{Error, Result};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactKind {
    Feature,
    Template,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Feature => "feature",
            ArtifactKind::Template => "template",
        }
    }
}

pub fn archive_filename(kind: ArtifactKind, id: &str) -> String {
    format!("devcontainer-{}-{}.tgz", kind.as_str(), id)
}

/// Validates the presence of the files §4.10 requires for `kind`, then
/// tars and gzips `dir` into the archive bytes. Dotfiles are excluded
/// except the template's own `.devcontainer[.json]`, and any `.tgz` is
/// excluded so a prior build artifact left in the directory never ends
/// up inside its own archive (§6 "no dotfiles, no self-reference, no
/// prior archive").
pub fn pack(dir: &Path, kind: ArtifactKind, id: &str) -> Result<Vec<u8>> {
    validate_required_files(dir, kind, id)?;

    let mut tar_bytes = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut tar_bytes);
        append_dir(&mut builder, dir, Path::new(""))?;
        builder.finish().map_err(|e| tar_error(dir, e))?;
    }

    let mut gz_bytes = Vec::new();
    let mut encoder = flate2::write::GzEncoder::new(&mut gz_bytes, flate2::Compression::default());
    encoder.write_all(&tar_bytes).map_err(Error::Io)?;
    encoder.finish().map_err(Error::Io)?;
    Ok(gz_bytes)
}

fn validate_required_files(dir: &Path, kind: ArtifactKind, id: &str) -> Result<()> {
    let metadata_file = format!("devcontainer-{}.json", kind.as_str());
    if !dir.join(&metadata_file).is_file() {
        return Err(Error::MetadataParseError {
            identifier: id.to_string(),
            reason: format!("missing {metadata_file}"),
        });
    }
    match kind {
        ArtifactKind::Feature => {
            if !dir.join("install.sh").is_file() {
                return Err(Error::MetadataParseError {
                    identifier: id.to_string(),
                    reason: "missing install.sh".into(),
                });
            }
        }
        ArtifactKind::Template => {
            let flat = dir.join(".devcontainer.json").is_file();
            let nested = dir.join(".devcontainer").join("devcontainer.json").is_file();
            if !flat && !nested {
                return Err(Error::MetadataParseError {
                    identifier: id.to_string(),
                    reason: "missing .devcontainer.json or .devcontainer/devcontainer.json".into(),
                });
            }
        }
    }
    Ok(())
}

fn should_include(rel_path: &Path) -> bool {
    for component in rel_path.components() {
        if let std::path::Component::Normal(name) = component {
            let name = name.to_string_lossy();
            if name.starts_with('.') && name != ".devcontainer.json" && name != ".devcontainer" {
                return false;
            }
        }
    }
    rel_path.extension().map(|ext| ext != "tgz").unwrap_or(true)
}

fn append_dir<W: std::io::Write>(builder: &mut tar::Builder<W>, base: &Path, rel: &Path) -> Result<()> {
    let full = base.join(rel);
    let mut entries: Vec<PathBuf> = std::fs::read_dir(&full)?
        .map(|entry| entry.map(|e| e.file_name().into()))
        .collect::<std::io::Result<Vec<PathBuf>>>()?;
    entries.sort();

    for name in entries {
        let entry_rel = rel.join(&name);
        if !should_include(&entry_rel) {
            continue;
        }
        let entry_full = base.join(&entry_rel);
        let file_type = std::fs::symlink_metadata(&entry_full)?.file_type();
        if file_type.is_dir() {
            append_dir(builder, base, &entry_rel)?;
        } else if file_type.is_file() {
            builder
                .append_path_with_name(&entry_full, &entry_rel)
                .map_err(|e| tar_error(base, e))?;
        }
    }
    Ok(())
}

fn tar_error(dir: &Path, e: std::io::Error) -> Error {
    Error::TarExtractError {
        dest: dir.display().to_string(),
        reason: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_file(path: &Path, contents: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[test]
    fn packs_a_valid_feature_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("devcontainer-feature.json"), r#"{"id":"node"}"#);
        write_file(&dir.path().join("install.sh"), "#!/bin/sh\necho hi\n");
        write_file(&dir.path().join("src/lib.sh"), "echo lib\n");

        let bytes = pack(dir.path(), ArtifactKind::Feature, "node").unwrap();
        assert!(bytes.starts_with(&[0x1f, 0x8b]));
    }

    #[test]
    fn feature_missing_install_sh_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("devcontainer-feature.json"), r#"{"id":"node"}"#);
        let err = pack(dir.path(), ArtifactKind::Feature, "node").unwrap_err();
        assert!(matches!(err, Error::MetadataParseError { .. }));
    }

    #[test]
    fn template_accepts_nested_devcontainer_json() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("devcontainer-template.json"), r#"{"id":"node"}"#);
        write_file(&dir.path().join(".devcontainer/devcontainer.json"), r#"{}"#);

        let bytes = pack(dir.path(), ArtifactKind::Template, "node").unwrap();
        assert!(bytes.starts_with(&[0x1f, 0x8b]));
    }

    #[test]
    fn excludes_dotfiles_and_prior_archives() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("devcontainer-feature.json"), r#"{"id":"node"}"#);
        write_file(&dir.path().join("install.sh"), "echo hi\n");
        write_file(&dir.path().join(".git/HEAD"), "ref: refs/heads/main\n");
        write_file(&dir.path().join("devcontainer-feature-node.tgz"), "stale");

        let bytes = pack(dir.path(), ArtifactKind::Feature, "node").unwrap();
        let decoder = flate2::read::GzDecoder::new(bytes.as_slice());
        let mut archive = tar::Archive::new(decoder);
        let names: Vec<String> = archive
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();
        assert!(!names.iter().any(|n| n.contains(".git")));
        assert!(!names.iter().any(|n| n.ends_with(".tgz")));
        assert!(names.iter().any(|n| n == "install.sh"));
    }
}
