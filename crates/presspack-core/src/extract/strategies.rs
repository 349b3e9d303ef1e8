//! Library-backed and external-tool extraction strategies.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::process::Command;

use zip::ZipArchive;

use super::{sanitize_entry_path, ExtractionStrategy};
use crate::errors::{InstallError, InstallResult};

/// Strategy 1: the `zip` crate's whole-archive extraction.
pub struct WholeArchiveExtractor;

impl ExtractionStrategy for WholeArchiveExtractor {
    fn name(&self) -> &'static str {
        "zip-archive"
    }

    fn extract(&self, archive: &Path, dest: &Path) -> InstallResult<()> {
        let file = File::open(archive)?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| InstallError::Validation(format!("failed to open archive: {}", e)))?;
        zip.extract(dest)
            .map_err(|e| InstallError::Validation(format!("bulk extraction failed: {}", e)))
    }
}

/// Strategy 2: walk the archive entry by entry.
///
/// A distinct code path from [`WholeArchiveExtractor`]: it tolerates entries
/// the bulk path refuses, skips anything unsafe, and rejects symlink
/// entries outright.
pub struct EntryWalkExtractor;

impl ExtractionStrategy for EntryWalkExtractor {
    fn name(&self) -> &'static str {
        "zip-entry-walk"
    }

    fn extract(&self, archive: &Path, dest: &Path) -> InstallResult<()> {
        let file = File::open(archive)?;
        let mut zip = ZipArchive::new(file)
            .map_err(|e| InstallError::Validation(format!("failed to open archive: {}", e)))?;

        for index in 0..zip.len() {
            let mut entry = zip
                .by_index(index)
                .map_err(|e| InstallError::Validation(format!("failed to read entry {}: {}", index, e)))?;

            let name = entry.name().to_string();
            let rel = sanitize_entry_path(&name)?;

            if let Some(mode) = entry.unix_mode() {
                if mode & 0o170000 == 0o120000 {
                    return Err(InstallError::Validation(format!(
                        "archive contains a symlink entry: {}",
                        name
                    )));
                }
            }

            let out_path = dest.join(&rel);
            if entry.is_dir() {
                fs::create_dir_all(&out_path)?;
                continue;
            }

            if let Some(parent) = out_path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut out = File::create(&out_path)?;
            io::copy(&mut entry, &mut out)?;
        }
        Ok(())
    }
}

/// Strategy 4: a system `unzip` invocation, when the host has one.
pub struct ShellUnzipExtractor;

impl ExtractionStrategy for ShellUnzipExtractor {
    fn name(&self) -> &'static str {
        "system-unzip"
    }

    fn available(&self) -> bool {
        which::which("unzip").is_ok()
    }

    fn extract(&self, archive: &Path, dest: &Path) -> InstallResult<()> {
        let unzip = which::which("unzip")
            .map_err(|_| InstallError::Storage("unzip binary not found".to_string()))?;

        let output = Command::new(unzip)
            .arg("-o")
            .arg(archive)
            .arg("-d")
            .arg(dest)
            .output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InstallError::Validation(format!(
                "unzip exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_zip_file;
    use tempfile::tempdir;

    fn fixture_entries() -> Vec<(&'static str, &'static [u8])> {
        vec![
            ("widgets/", b"".as_slice()),
            ("widgets/style.css", b"/* Theme Name: Widgets */".as_slice()),
            ("widgets/assets/app.js", b"console.log(1);".as_slice()),
        ]
    }

    #[test]
    fn test_whole_archive_extraction() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip_file(&archive, &fixture_entries());

        let dest = dir.path().join("out");
        std::fs::create_dir(&dest).unwrap();
        WholeArchiveExtractor.extract(&archive, &dest).unwrap();

        assert!(dest.join("widgets/style.css").is_file());
        assert!(dest.join("widgets/assets/app.js").is_file());
    }

    #[test]
    fn test_entry_walk_extraction() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip_file(&archive, &fixture_entries());

        let dest = dir.path().join("out");
        std::fs::create_dir(&dest).unwrap();
        EntryWalkExtractor.extract(&archive, &dest).unwrap();

        let css = std::fs::read_to_string(dest.join("widgets/style.css")).unwrap();
        assert_eq!(css, "/* Theme Name: Widgets */");
    }

    #[test]
    fn test_entry_walk_rejects_garbage() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        std::fs::write(&archive, b"definitely not a zip").unwrap();

        let err = EntryWalkExtractor.extract(&archive, dir.path()).unwrap_err();
        assert!(matches!(err, InstallError::Validation(_)));
    }

    #[test]
    fn test_shell_unzip_when_present() {
        let extractor = ShellUnzipExtractor;
        if !extractor.available() {
            return;
        }

        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip_file(&archive, &fixture_entries());

        let dest = dir.path().join("out");
        std::fs::create_dir(&dest).unwrap();
        extractor.extract(&archive, &dest).unwrap();
        assert!(dest.join("widgets/style.css").is_file());
    }
}
