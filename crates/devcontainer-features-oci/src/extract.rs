//! Safe tar extraction (part of C5): rejects absolute paths, `..` path
//! traversal, and symlinks that escape the destination directory, and
//! lets the caller filter entries by path and node kind.
//!
//! Grounded on the devcontainer-feature-download reference's
//! `safe_unpack`: the same three checks (absolute path, parent-dir
//! component, symlink escape) before every entry is unpacked.

use std::io::Read;
use std::path::{Component, Path};

use devcontainer_features_common::{Error, Result};

/// What kind of filesystem node a tar entry represents, passed to the
/// caller's filter predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Other,
}

/// Extracts `bytes` (a tar or gzip-compressed tar, auto-detected by the
/// gzip magic number) into `dest`, skipping any entry for which
/// `filter(path, kind)` returns `false`. Returns the list of paths that
/// were actually written, relative to `dest`.
pub fn extract_tar(
    bytes: &[u8],
    dest: &Path,
    mut filter: impl FnMut(&Path, EntryKind) -> bool,
) -> Result<Vec<std::path::PathBuf>> {
    std::fs::create_dir_all(dest)?;
    if is_gzip(bytes) {
        let decoder = flate2::read::GzDecoder::new(bytes);
        unpack(tar::Archive::new(decoder), dest, &mut filter)
    } else {
        unpack(tar::Archive::new(bytes), dest, &mut filter)
    }
}

fn unpack<R: Read>(
    mut archive: tar::Archive<R>,
    dest: &Path,
    filter: &mut impl FnMut(&Path, EntryKind) -> bool,
) -> Result<Vec<std::path::PathBuf>> {
    let mut written = Vec::new();
    let entries = archive.entries().map_err(|e| Error::TarExtractError {
        dest: dest.display().to_string(),
        reason: e.to_string(),
    })?;
    for entry in entries {
        let mut entry = entry.map_err(|e| Error::TarExtractError {
            dest: dest.display().to_string(),
            reason: e.to_string(),
        })?;
        let path = entry
            .path()
            .map_err(|e| Error::TarExtractError {
                dest: dest.display().to_string(),
                reason: e.to_string(),
            })?
            .into_owned();

        if path.is_absolute() {
            return Err(Error::TarExtractError {
                dest: dest.display().to_string(),
                reason: format!("archive entry has an absolute path: {}", path.display()),
            });
        }
        if path.components().any(|c| matches!(c, Component::ParentDir)) {
            return Err(Error::TarExtractError {
                dest: dest.display().to_string(),
                reason: format!("archive entry traverses outside the destination: {}", path.display()),
            });
        }

        let is_symlink = entry.header().entry_type().is_symlink();
        if is_symlink {
            if let Ok(Some(target)) = entry.link_name() {
                if target.components().any(|c| matches!(c, Component::ParentDir)) {
                    return Err(Error::TarExtractError {
                        dest: dest.display().to_string(),
                        reason: format!(
                            "symlink escapes the destination: {} -> {}",
                            path.display(),
                            target.display()
                        ),
                    });
                }
            }
        }

        let kind = if is_symlink {
            EntryKind::Symlink
        } else if entry.header().entry_type().is_dir() {
            EntryKind::Directory
        } else if entry.header().entry_type().is_file() {
            EntryKind::File
        } else {
            EntryKind::Other
        };

        if !filter(&path, kind) {
            continue;
        }

        let target = dest.join(&path);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        entry.unpack(&target).map_err(|e| Error::TarExtractError {
            dest: dest.display().to_string(),
            reason: e.to_string(),
        })?;
        written.push(path);
    }
    Ok(written)
}

fn is_gzip(bytes: &[u8]) -> bool {
    bytes.len() >= 2 && bytes[0] == 0x1f && bytes[1] == 0x8b
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_tar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let buf = Vec::new();
        let mut archive = tar::Builder::new(buf);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            archive.append_data(&mut header, name, *data).unwrap();
        }
        archive.into_inner().unwrap()
    }

    #[test]
    fn extracts_plain_files() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = build_tar(&[("install.sh", b"echo hi"), ("nested/file.txt", b"x")]);
        let written = extract_tar(&bytes, tmp.path(), |_, _| true).unwrap();
        assert_eq!(written.len(), 2);
        assert!(tmp.path().join("install.sh").exists());
        assert!(tmp.path().join("nested/file.txt").exists());
    }

    #[test]
    fn filter_skips_entries() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = build_tar(&[("keep.txt", b"a"), ("skip.txt", b"b")]);
        let written = extract_tar(&bytes, tmp.path(), |path, _| path.to_str() != Some("skip.txt"))
            .unwrap();
        assert_eq!(written, vec![std::path::PathBuf::from("keep.txt")]);
        assert!(!tmp.path().join("skip.txt").exists());
    }

    #[test]
    fn rejects_absolute_path() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = raw_tar_with_name("/etc/passwd");
        let err = extract_tar(&bytes, tmp.path(), |_, _| true).unwrap_err();
        assert!(matches!(err, Error::TarExtractError { .. }));
    }

    #[test]
    fn rejects_parent_dir_traversal() {
        let tmp = tempfile::tempdir().unwrap();
        let bytes = raw_tar_with_name("../escape.txt");
        let err = extract_tar(&bytes, tmp.path(), |_, _| true).unwrap_err();
        assert!(matches!(err, Error::TarExtractError { .. }));
    }

    /// Hand-builds a single-entry GNU tar so a forbidden path (e.g. an
    /// absolute path) can be encoded even though `tar::Builder` would
    /// otherwise normalize it.
    fn raw_tar_with_name(name: &str) -> Vec<u8> {
        let data = b"x";
        let mut header = [0u8; 512];
        let name_bytes = name.as_bytes();
        header[..name_bytes.len()].copy_from_slice(name_bytes);
        header[100..108].copy_from_slice(b"0000644\0");
        header[108..116].copy_from_slice(b"0001000\0");
        header[116..124].copy_from_slice(b"0001000\0");
        let size_str = format!("{:011o}\0", data.len());
        header[124..136].copy_from_slice(size_str.as_bytes());
        header[136..148].copy_from_slice(b"00000000000\0");
        header[156] = b'0';
        header[257..263].copy_from_slice(b"ustar\0");
        header[263..265].copy_from_slice(b"00");
        header[148..156].copy_from_slice(b"        ");
        let cksum: u32 = header.iter().map(|&b| b as u32).sum();
        let cksum_str = format!("{:06o}\0 ", cksum);
        header[148..156].copy_from_slice(cksum_str.as_bytes());

        let mut buf = Vec::new();
        buf.extend_from_slice(&header);
        buf.extend_from_slice(data);
        let padding = (512 - (data.len() % 512)) % 512;
        buf.extend(std::iter::repeat(0u8).take(padding));
        buf.extend(std::iter::repeat(0u8).take(1024));
        buf
    }
}
