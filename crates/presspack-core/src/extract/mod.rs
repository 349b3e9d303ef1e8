//! Archive extraction with a cascade of fallback strategies.
//!
//! Upstream archives are unpredictable: some trip the primary library parse,
//! some only open with an external tool. Strategies are tried in a fixed
//! order until one succeeds; each failure is recorded, never fatal on its
//! own. A later strategy may overwrite files left behind by an earlier failed
//! attempt, which is fine because a failed attempt's output carries no
//! meaning.

mod raw;
mod strategies;

use std::path::{Component, Path, PathBuf};

use crate::errors::{InstallError, InstallResult};

pub use raw::RawFormatExtractor;
pub use strategies::{EntryWalkExtractor, ShellUnzipExtractor, WholeArchiveExtractor};

/// A single way of unpacking an archive into a directory.
pub trait ExtractionStrategy: Send + Sync {
    /// Short identifier used in logs and the diagnostic trail.
    fn name(&self) -> &'static str;

    /// Whether this strategy can run on the current host.
    fn available(&self) -> bool {
        true
    }

    fn extract(&self, archive: &Path, dest: &Path) -> InstallResult<()>;
}

/// Which strategy succeeded and what was tried before it.
#[derive(Debug)]
pub struct ExtractionReport {
    pub strategy: &'static str,
    /// One line per strategy that failed or was unavailable, in order.
    pub attempts: Vec<String>,
}

/// The standard cascade, in priority order.
pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(WholeArchiveExtractor),
        Box::new(EntryWalkExtractor),
        Box::new(RawFormatExtractor),
        Box::new(ShellUnzipExtractor),
    ]
}

/// Extract `archive` into `dest` using the standard cascade.
pub fn extract_archive(archive: &Path, dest: &Path) -> InstallResult<ExtractionReport> {
    run_strategies(&default_strategies(), archive, dest)
}

/// Try each strategy in order until one succeeds.
///
/// Exhausting the list yields [`InstallError::ExtractionFailed`] carrying
/// every attempt; the caller decides whether to retain the archive for
/// offline diagnosis.
pub fn run_strategies(
    strategies: &[Box<dyn ExtractionStrategy>],
    archive: &Path,
    dest: &Path,
) -> InstallResult<ExtractionReport> {
    let mut attempts = Vec::new();

    for strategy in strategies {
        if !strategy.available() {
            log::debug!("extraction strategy '{}' unavailable", strategy.name());
            attempts.push(format!("{}: unavailable on this host", strategy.name()));
            continue;
        }

        log::debug!("trying extraction strategy '{}'", strategy.name());
        match strategy.extract(archive, dest) {
            Ok(()) => {
                log::info!(
                    "extracted {} with strategy '{}'",
                    archive.display(),
                    strategy.name()
                );
                return Ok(ExtractionReport {
                    strategy: strategy.name(),
                    attempts,
                });
            }
            Err(err) => {
                log::warn!("extraction strategy '{}' failed: {}", strategy.name(), err);
                attempts.push(format!("{}: {}", strategy.name(), err));
            }
        }
    }

    Err(InstallError::ExtractionFailed {
        archive: archive.display().to_string(),
        attempts,
    })
}

/// Turn an archive entry name into a safe relative path.
///
/// Strips a leading slash and rejects parent traversal; zip names always use
/// forward slashes.
pub(crate) fn sanitize_entry_path(name: &str) -> InstallResult<PathBuf> {
    let trimmed = name.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(InstallError::Validation(
            "archive entry has an empty path".to_string(),
        ));
    }

    let mut out = PathBuf::new();
    for component in Path::new(trimmed).components() {
        match component {
            Component::Prefix(_) | Component::RootDir => {
                return Err(InstallError::Validation(format!(
                    "archive entry has an absolute path: {}",
                    name
                )));
            }
            Component::ParentDir => {
                return Err(InstallError::Validation(format!(
                    "archive entry contains '..': {}",
                    name
                )));
            }
            Component::CurDir => {}
            Component::Normal(segment) => out.push(segment),
        }
    }

    if out.as_os_str().is_empty() {
        return Err(InstallError::Validation(format!(
            "archive entry has an invalid path: {}",
            name
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::write_zip_file;
    use tempfile::tempdir;

    struct FailingStrategy(&'static str);

    impl ExtractionStrategy for FailingStrategy {
        fn name(&self) -> &'static str {
            self.0
        }
        fn extract(&self, _archive: &Path, _dest: &Path) -> InstallResult<()> {
            Err(InstallError::Validation("simulated failure".to_string()))
        }
    }

    struct UnavailableStrategy;

    impl ExtractionStrategy for UnavailableStrategy {
        fn name(&self) -> &'static str {
            "absent-tool"
        }
        fn available(&self) -> bool {
            false
        }
        fn extract(&self, _archive: &Path, _dest: &Path) -> InstallResult<()> {
            unreachable!("unavailable strategies are never run")
        }
    }

    struct SucceedingStrategy;

    impl ExtractionStrategy for SucceedingStrategy {
        fn name(&self) -> &'static str {
            "always-works"
        }
        fn extract(&self, _archive: &Path, dest: &Path) -> InstallResult<()> {
            std::fs::write(dest.join("marker.txt"), b"ok")?;
            Ok(())
        }
    }

    #[test]
    fn test_default_strategy_order() {
        let names: Vec<&str> = default_strategies().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["zip-archive", "zip-entry-walk", "raw-format", "system-unzip"]
        );
    }

    #[test]
    fn test_later_strategy_recovers_from_earlier_failures() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        write_zip_file(&archive, &[("a.txt", b"a".as_slice())]);

        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(FailingStrategy("first")),
            Box::new(FailingStrategy("second")),
            Box::new(UnavailableStrategy),
            Box::new(SucceedingStrategy),
        ];
        let report = run_strategies(&strategies, &archive, dir.path()).unwrap();

        assert_eq!(report.strategy, "always-works");
        assert_eq!(report.attempts.len(), 3);
        assert!(report.attempts[0].starts_with("first:"));
        assert!(report.attempts[2].contains("unavailable"));
        assert!(dir.path().join("marker.txt").exists());
    }

    #[test]
    fn test_exhausted_cascade_reports_every_attempt() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("pkg.zip");
        std::fs::write(&archive, b"garbage").unwrap();

        let strategies: Vec<Box<dyn ExtractionStrategy>> = vec![
            Box::new(FailingStrategy("first")),
            Box::new(FailingStrategy("second")),
        ];
        let err = run_strategies(&strategies, &archive, dir.path()).unwrap_err();

        match err {
            InstallError::ExtractionFailed { attempts, .. } => {
                assert_eq!(attempts.len(), 2);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_sanitize_entry_path() {
        assert_eq!(
            sanitize_entry_path("widgets/style.css").unwrap(),
            PathBuf::from("widgets/style.css")
        );
        assert_eq!(
            sanitize_entry_path("./widgets/a.php").unwrap(),
            PathBuf::from("widgets/a.php")
        );
        assert!(sanitize_entry_path("../evil.txt").is_err());
        assert!(sanitize_entry_path("a/../../evil.txt").is_err());
        assert!(sanitize_entry_path("").is_err());
        assert!(sanitize_entry_path("/").is_err());
    }
}
