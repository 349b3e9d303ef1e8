//! Package acquisition pipeline for GitHub-hosted themes and plugins.
//!
//! This crate fetches a versioned source archive from the GitHub API and
//! installs it into a destination tree that follows the one-directory-per-slug
//! convention used by theme and plugin hosts. The pipeline chains URL
//! resolution, authenticated downloading, archive verification, a cascade of
//! extraction strategies, layout classification, and in-place structure
//! normalization, and reports a single outcome with a full diagnostic trail.
//!
//! # Architecture Overview
//!
//! - **Resolution**: release assets, source archives by tag, and branch
//!   archives, with a fixed preference order
//! - **Downloading**: streamed to uniquely named temp files with bearer
//!   authentication and a one-shot alternate-mechanism retry
//! - **Extraction**: four strategies tried in order, from the `zip` crate's
//!   whole-archive path down to a system `unzip` invocation
//! - **Normalization**: rewrites flat, misnamed, or ambiguous trees into a
//!   single correctly named package directory
//!
//! The settings store, admin surface, and activation mechanics of the host
//! stay outside the crate and are reached through the seams in [`traits`].

pub mod config;
pub mod download;
pub mod errors;
pub mod extract;
pub mod github;
pub mod installer;
pub mod layout;
pub mod normalize;
pub mod traits;
pub mod types;

pub use config::InstallerConfig;
pub use download::Downloader;
pub use errors::{InstallError, InstallResult};
pub use github::GitHubClient;
pub use installer::Installer;
pub use traits::{Activator, CredentialProvider, TargetResolver};
pub use types::{
    DownloadedArchive, ExtractedTree, InstallationOutcome, LayoutClassification, PackageKind,
    PackageRequest, ResolvedSource,
};

#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod integration_tests;
