//! Data model for the installation pipeline.

use std::path::{Path, PathBuf};

use tempfile::TempPath;

/// The kind of package being installed.
///
/// Threaded explicitly through every call; nothing in the pipeline infers the
/// kind from its surroundings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PackageKind {
    Theme,
    Plugin,
}

impl PackageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageKind::Theme => "theme",
            PackageKind::Plugin => "plugin",
        }
    }
}

impl std::fmt::Display for PackageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single installation request, created by the caller and consumed once.
#[derive(Debug, Clone)]
pub struct PackageRequest {
    pub kind: PackageKind,
    /// Repository owner or organization.
    pub owner: String,
    /// Repository name.
    pub name: String,
    /// Version tag or branch name; `None` selects the latest release.
    pub version: Option<String>,
    /// Directory name to install under; derived from the archive when absent.
    pub slug: Option<String>,
}

impl PackageRequest {
    pub fn new(kind: PackageKind, owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            kind,
            owner: owner.into(),
            name: name.into(),
            version: None,
            slug: None,
        }
    }

    /// Pin a specific version tag or branch.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Request a specific installation directory name.
    pub fn with_slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }
}

/// A concrete download location produced by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    pub download_url: String,
    /// Human-readable version: a tag with any leading `v` stripped, or a
    /// branch name.
    pub version_label: String,
}

/// A downloaded archive on disk.
///
/// The backing file is deleted when this value is dropped; [`persist`] opts
/// out for diagnostic retention after an extraction failure.
///
/// [`persist`]: DownloadedArchive::persist
#[derive(Debug)]
pub struct DownloadedArchive {
    path: TempPath,
    pub size_bytes: u64,
}

impl DownloadedArchive {
    pub(crate) fn new(path: TempPath, size_bytes: u64) -> Self {
        Self { path, size_bytes }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Keep the archive on disk and return its final location.
    pub fn persist(self) -> PathBuf {
        match self.path.keep() {
            Ok(path) => path,
            Err(err) => {
                log::warn!("could not disable cleanup for retained archive: {}", err.error);
                err.path.to_path_buf()
            }
        }
    }
}

/// An extracted directory tree, mutated in place by the normalizer.
#[derive(Debug)]
pub struct ExtractedTree {
    pub root: PathBuf,
}

/// How an extracted tree relates to the required canonical layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutClassification {
    /// Marker files sit directly at the tree root.
    Flat,
    /// A single subdirectory already carries the desired slug and a marker.
    NestedCorrect,
    /// Exactly one subdirectory holds the package but under the wrong name.
    NestedMisnamed { existing: String },
    /// Zero or multiple candidates, or no marker at the expected depth.
    Indeterminate,
}

/// Terminal result of an installation attempt.
///
/// `installed` is the slug for themes and `slug/entry-file.php` for plugins;
/// `diagnostics` records every stage, retry, and fallback in order.
#[derive(Debug)]
pub struct InstallationOutcome {
    pub success: bool,
    pub installed: Option<String>,
    pub diagnostics: Vec<String>,
}
