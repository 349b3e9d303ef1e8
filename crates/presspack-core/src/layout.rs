//! Layout classification and slug derivation for extracted trees.
//!
//! A tree is *flat* when marker files sit at its root, *nested* when a single
//! top-level directory wraps them. Markers are `style.css` for themes and any
//! root-level PHP file carrying the standard plugin comment header.

use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::errors::InstallResult;
use crate::types::{LayoutClassification, PackageKind};

/// How much of a file the header scan reads.
const HEADER_SCAN_BYTES: usize = 8192;

/// Parsed plugin comment header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginHeader {
    pub name: String,
    pub version: Option<String>,
}

/// Extract the plugin header from file contents, if one is present.
///
/// Only the leading portion of the file is considered, and the `Plugin Name`
/// field must be non-empty.
pub fn parse_plugin_header(contents: &str) -> Option<PluginHeader> {
    let mut end = contents.len().min(HEADER_SCAN_BYTES);
    while !contents.is_char_boundary(end) {
        end -= 1;
    }
    let head = &contents[..end];

    let mut name = None;
    let mut version = None;
    for line in head.lines() {
        if name.is_none() {
            name = header_value(line, "Plugin Name:");
        }
        if version.is_none() {
            version = header_value(line, "Version:");
        }
    }

    name.filter(|n| !n.is_empty())
        .map(|name| PluginHeader { name, version })
}

/// Read the value of `key` from a header comment line.
///
/// The key may be preceded by comment decoration (`*`, `/`, `#`, `@`,
/// whitespace) only.
fn header_value(line: &str, key: &str) -> Option<String> {
    let pos = line.find(key)?;
    let prefix_ok = line[..pos]
        .chars()
        .all(|c| c.is_whitespace() || matches!(c, '*' | '/' | '#' | '@'));
    if !prefix_ok {
        return None;
    }
    let value = line[pos + key.len()..].trim().trim_end_matches("*/").trim();
    Some(value.to_string())
}

/// Whether `path` is a PHP file whose header identifies it as a plugin entry
/// point.
pub fn file_has_plugin_header(path: &Path) -> bool {
    match fs::read(path) {
        Ok(bytes) => parse_plugin_header(&String::from_utf8_lossy(&bytes)).is_some(),
        Err(_) => false,
    }
}

/// Find the plugin entry point among the top-level PHP files of `dir`.
///
/// Files are visited in name order; the first one with a plugin header wins.
pub fn find_plugin_entry(dir: &Path) -> InstallResult<Option<(String, PluginHeader)>> {
    let mut php_files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "php") {
            php_files.push(path);
        }
    }
    php_files.sort();

    for path in php_files {
        let contents = match fs::read(&path) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(_) => continue,
        };
        if let Some(header) = parse_plugin_header(&contents) {
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(Some((file_name, header)));
        }
    }
    Ok(None)
}

/// Whether `dir` directly contains the marker appropriate to `kind`.
pub fn has_marker(dir: &Path, kind: PackageKind) -> InstallResult<bool> {
    match kind {
        PackageKind::Theme => Ok(dir.join("style.css").is_file()),
        PackageKind::Plugin => Ok(find_plugin_entry(dir)?.is_some()),
    }
}

/// Classify the top level of an extracted tree against the desired layout.
pub fn classify(
    root: &Path,
    kind: PackageKind,
    slug: &str,
) -> InstallResult<LayoutClassification> {
    if has_marker(root, kind)? {
        log::debug!("marker found at tree root, layout is flat");
        return Ok(LayoutClassification::Flat);
    }

    let mut directories = Vec::new();
    for entry in fs::read_dir(root)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        // Hidden directories never wrap a package.
        if entry.path().is_dir() && !name.starts_with('.') {
            directories.push(name);
        }
    }
    directories.sort();

    for name in &directories {
        if name == slug && has_marker(&root.join(name), kind)? {
            log::debug!("found correctly named package directory '{}'", name);
            return Ok(LayoutClassification::NestedCorrect);
        }
    }

    if directories.len() == 1 {
        let name = &directories[0];
        if has_marker(&root.join(name), kind)? {
            log::debug!("single package directory '{}' needs renaming to '{}'", name, slug);
            return Ok(LayoutClassification::NestedMisnamed {
                existing: name.clone(),
            });
        }
    }

    log::debug!(
        "no recognizable layout ({} top-level directories)",
        directories.len()
    );
    Ok(LayoutClassification::Indeterminate)
}

fn hash_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"-[0-9a-f]{7,}$").expect("hash suffix pattern is valid"))
}

fn version_suffix() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"-v?\d+(\.\d+)*$").expect("version suffix pattern is valid"))
}

fn bare_version() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^v?\d+(\.\d+)*$").expect("bare version pattern is valid"))
}

/// Derive an installation slug from an archive's existing directory name.
///
/// Source archives name their wrapping directory after the repository plus a
/// ref suffix (`owner-repo-a1b2c3d`, `repo-v2.3.1`, `repo-main`). The suffix
/// stripping and segment selection below is a heuristic, not a guaranteed
/// parse of arbitrary repository names.
pub fn derive_slug(existing: &str) -> String {
    let mut slug = existing.to_string();
    slug = hash_suffix().replace(&slug, "").into_owned();
    slug = version_suffix().replace(&slug, "").into_owned();
    for branch in ["-master", "-main"] {
        if let Some(stripped) = slug.strip_suffix(branch) {
            slug = stripped.to_string();
            break;
        }
    }

    if let Some(pos) = slug.rfind('.') {
        slug = slug[pos + 1..].to_string();
    }

    if slug.contains('-') {
        let parts: Vec<&str> = slug.split('-').collect();
        if parts.len() >= 2 {
            let last = parts[parts.len() - 1];
            if last != "master" && last != "main" && !bare_version().is_match(last) {
                slug = last.to_string();
            } else {
                slug = parts[1..].join("-");
            }
        }
    }

    sanitize_slug(&slug)
}

/// Reduce a candidate name to a filesystem-safe slug.
pub fn sanitize_slug(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter_map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                Some(c)
            } else if c.is_whitespace() {
                Some('-')
            } else {
                None
            }
        })
        .collect();
    cleaned.trim_matches(|c| c == '.' || c == '-').to_string()
}
