//! In-place structure normalization of extracted trees.
//!
//! After normalization the tree root contains exactly one top-level directory
//! named with the desired slug, holding the package contents. Rewrites go
//! through a freshly named staging directory and are swapped in whole, never
//! renamed across the same entries the classifier just walked.

use std::fs;
use std::path::Path;

use crate::errors::{InstallError, InstallResult};
use crate::layout;
use crate::types::{ExtractedTree, LayoutClassification, PackageKind};

/// Version-control and dependency directories never carried into an install.
const EXCLUDED_DIRS: [&str; 7] = [
    ".git",
    ".github",
    ".gitlab",
    ".svn",
    ".hg",
    "node_modules",
    "vendor",
];

/// Repository-hosting metadata left behind unless allowlisted below.
const METADATA_FILES: [&str; 5] = [
    "README.md",
    "LICENSE",
    "CHANGELOG.md",
    "composer.json",
    "package.json",
];

/// Files always carried, even when their names collide with the metadata
/// list.
const IMPORTANT_FILES: [&str; 5] = [
    "style.css",
    "functions.php",
    "index.php",
    "screenshot.png",
    "readme.txt",
];

/// Rewrite `tree` so its root holds a single directory named `slug`.
///
/// - `NestedCorrect` is a no-op.
/// - `NestedMisnamed` renames the wrapping directory via a staging copy.
/// - `Flat` and `Indeterminate` rebuild the tree under a fresh `slug`
///   directory, dropping version-control and repository-metadata entries.
///
/// An `Indeterminate` tree that still has no marker after the rebuild is
/// reported as [`InstallError::AmbiguousLayout`].
pub fn normalize(
    tree: &ExtractedTree,
    classification: &LayoutClassification,
    slug: &str,
    kind: PackageKind,
) -> InstallResult<()> {
    match classification {
        LayoutClassification::NestedCorrect => {
            log::debug!("tree already has the correct layout, nothing to do");
        }
        LayoutClassification::NestedMisnamed { existing } => {
            log::info!("renaming package directory '{}' to '{}'", existing, slug);
            rename_via_staging(&tree.root, existing, slug)?;
        }
        LayoutClassification::Flat | LayoutClassification::Indeterminate => {
            log::info!("rebuilding tree under package directory '{}'", slug);
            rebuild_with_slug(&tree.root, slug)?;
            if matches!(classification, LayoutClassification::Indeterminate)
                && !layout::has_marker(&tree.root.join(slug), kind)?
            {
                return Err(InstallError::AmbiguousLayout(format!(
                    "no {} marker file found after restructuring",
                    kind
                )));
            }
        }
    }

    let package_dir = tree.root.join(slug);
    if !package_dir.is_dir() {
        return Err(InstallError::Storage(format!(
            "normalized package directory missing: {}",
            package_dir.display()
        )));
    }
    Ok(())
}

/// Copy `root/existing` into a staged `slug` directory, then swap the staged
/// layout in as the new tree contents.
fn rename_via_staging(root: &Path, existing: &str, slug: &str) -> InstallResult<()> {
    let staging = staging_dir(root)?;
    let staged_package = staging.path().join(slug);
    fs::create_dir(&staged_package)?;
    copy_dir_recursive(&root.join(existing), &staged_package)?;
    swap_contents(root, staging.path())
}

/// Copy every kept top-level entry into a staged `slug` directory, then swap
/// the staged layout in.
fn rebuild_with_slug(root: &Path, slug: &str) -> InstallResult<()> {
    let staging = staging_dir(root)?;
    let staged_package = staging.path().join(slug);
    fs::create_dir(&staged_package)?;

    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if should_skip(&name) {
            log::debug!("skipping excluded entry '{}'", name);
            continue;
        }

        let target = staged_package.join(&name);
        if entry.path().is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }

    swap_contents(root, staging.path())
}

fn should_skip(name: &str) -> bool {
    if name.starts_with('.') || EXCLUDED_DIRS.contains(&name) {
        return true;
    }
    METADATA_FILES.contains(&name) && !IMPORTANT_FILES.contains(&name)
}

fn staging_dir(root: &Path) -> InstallResult<tempfile::TempDir> {
    let parent = root.parent().ok_or_else(|| {
        InstallError::Storage(format!("tree root has no parent: {}", root.display()))
    })?;
    Ok(tempfile::Builder::new()
        .prefix(".restructure-")
        .tempdir_in(parent)?)
}

/// Replace every top-level entry of `root` with the entries of `staging`.
fn swap_contents(root: &Path, staging: &Path) -> InstallResult<()> {
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        if entry.path().is_dir() {
            fs::remove_dir_all(entry.path())?;
        } else {
            fs::remove_file(entry.path())?;
        }
    }

    for entry in fs::read_dir(staging)? {
        let entry = entry?;
        let target = root.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

pub(crate) fn copy_dir_recursive(src: &Path, dest: &Path) -> InstallResult<()> {
    fs::create_dir_all(dest)?;
    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.path().is_dir() {
            copy_dir_recursive(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
