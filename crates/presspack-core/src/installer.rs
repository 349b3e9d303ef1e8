//! Installation orchestration.
//!
//! The only component with cross-cutting knowledge: it sequences resolution,
//! download, extraction, classification, normalization, and placement, and
//! reduces every path to a single [`InstallationOutcome`]. All temporary
//! state is removed on every path except the diagnostic retention of an
//! archive that defeated every extraction strategy.

use std::fs;
use std::path::Path;

use crate::config::InstallerConfig;
use crate::download::Downloader;
use crate::errors::{InstallError, InstallResult};
use crate::extract;
use crate::github::GitHubClient;
use crate::layout;
use crate::normalize;
use crate::traits::{Activator, CredentialProvider, TargetResolver};
use crate::types::{
    ExtractedTree, InstallationOutcome, LayoutClassification, PackageKind, PackageRequest,
};

/// Installs packages from GitHub repositories into the destination roots
/// supplied by the host.
pub struct Installer {
    config: InstallerConfig,
    credentials: Box<dyn CredentialProvider>,
    targets: Box<dyn TargetResolver>,
    activator: Option<Box<dyn Activator>>,
}

impl Installer {
    pub fn new(
        config: InstallerConfig,
        credentials: Box<dyn CredentialProvider>,
        targets: Box<dyn TargetResolver>,
    ) -> Self {
        Self {
            config,
            credentials,
            targets,
            activator: None,
        }
    }

    /// Attach the host's activation mechanism.
    pub fn with_activator(mut self, activator: Box<dyn Activator>) -> Self {
        self.activator = Some(activator);
        self
    }

    /// Run one installation attempt to its terminal outcome.
    ///
    /// Never returns an error: failures are folded into the outcome together
    /// with the diagnostic trail of everything attempted.
    pub async fn install(&self, request: &PackageRequest, activate: bool) -> InstallationOutcome {
        log::info!(
            "installing {} {}/{}",
            request.kind,
            request.owner,
            request.name
        );

        let mut diagnostics = Vec::new();
        match self.run(request, activate, &mut diagnostics).await {
            Ok(installed) => {
                log::info!("installed '{}'", installed);
                InstallationOutcome {
                    success: true,
                    installed: Some(installed),
                    diagnostics,
                }
            }
            Err(err) => {
                log::warn!(
                    "installation of {}/{} failed: {}",
                    request.owner,
                    request.name,
                    err
                );
                diagnostics.push(err.to_string());
                InstallationOutcome {
                    success: false,
                    installed: None,
                    diagnostics,
                }
            }
        }
    }

    async fn run(
        &self,
        request: &PackageRequest,
        activate: bool,
        diagnostics: &mut Vec<String>,
    ) -> InstallResult<String> {
        let destination = self.targets.destination_root(request.kind);
        let token = self.credentials.token();

        let client = GitHubClient::new(self.config.clone(), token.clone())?;
        let source = client
            .resolve(&request.owner, &request.name, request.version.as_deref())
            .await?;
        diagnostics.push(format!(
            "resolved {}/{} version {} -> {}",
            request.owner, request.name, source.version_label, source.download_url
        ));

        let downloader = Downloader::new(self.config.clone(), token)?;
        let archive = downloader.download(&source.download_url).await?;
        diagnostics.push(format!("downloaded {} bytes", archive.size_bytes));

        let workdir = tempfile::Builder::new()
            .prefix("presspack-install-")
            .tempdir()?;
        let tree = ExtractedTree {
            root: workdir.path().to_path_buf(),
        };

        match extract::extract_archive(archive.path(), &tree.root) {
            Ok(report) => {
                for attempt in &report.attempts {
                    diagnostics.push(format!("extraction attempt failed: {}", attempt));
                }
                diagnostics.push(format!("extracted with strategy '{}'", report.strategy));
            }
            Err(err) => {
                if let InstallError::ExtractionFailed { attempts, .. } = &err {
                    for attempt in attempts {
                        diagnostics.push(format!("extraction attempt failed: {}", attempt));
                    }
                }
                // Keep the archive so the failure can be diagnosed offline.
                let retained = archive.persist();
                diagnostics.push(format!(
                    "archive retained for inspection at {}",
                    retained.display()
                ));
                return Err(err);
            }
        }
        drop(archive);

        let slug = self.determine_slug(request, &tree)?;
        diagnostics.push(format!("using slug '{}'", slug));

        let classification = layout::classify(&tree.root, request.kind, &slug)?;
        diagnostics.push(format!(
            "layout classified as {}",
            describe_classification(&classification)
        ));

        normalize::normalize(&tree, &classification, &slug, request.kind)?;

        let package_dir = tree.root.join(&slug);
        let installed = match request.kind {
            PackageKind::Theme => slug.clone(),
            PackageKind::Plugin => {
                let (file, header) =
                    layout::find_plugin_entry(&package_dir)?.ok_or_else(|| {
                        InstallError::AmbiguousLayout(
                            "no plugin entry point found in the installed package".to_string(),
                        )
                    })?;
                diagnostics.push(format!("plugin entry point {} ({})", file, header.name));
                format!("{}/{}", slug, file)
            }
        };

        self.place(&package_dir, &destination, &slug, diagnostics)?;
        diagnostics.push(format!(
            "installed into {}",
            destination.join(&slug).display()
        ));

        if activate {
            match &self.activator {
                Some(activator) => match activator.activate(request.kind, &installed).await {
                    Ok(()) => diagnostics.push(format!("activated '{}'", installed)),
                    Err(err) => {
                        diagnostics.push(format!(
                            "package installed but activation failed: {}",
                            err
                        ));
                        return Err(err);
                    }
                },
                None => {
                    diagnostics
                        .push("activation requested but no activator is configured".to_string());
                }
            }
        }

        Ok(installed)
    }

    /// Settle the installation slug: the caller's request wins, then a name
    /// derived from a single wrapping directory, then the repository name.
    fn determine_slug(&self, request: &PackageRequest, tree: &ExtractedTree) -> InstallResult<String> {
        if let Some(requested) = &request.slug {
            let slug = layout::sanitize_slug(requested);
            if !slug.is_empty() {
                return Ok(slug);
            }
        }

        let mut directories = Vec::new();
        for entry in fs::read_dir(&tree.root)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if entry.path().is_dir() && !name.starts_with('.') {
                directories.push(name);
            }
        }

        let derived = if directories.len() == 1 {
            layout::derive_slug(&directories[0])
        } else {
            layout::sanitize_slug(&request.name)
        };

        if derived.is_empty() {
            Ok(format!("github-{}", request.kind))
        } else {
            Ok(derived)
        }
    }

    /// Move the normalized package directory under the destination root,
    /// replacing a previous installation of the same slug.
    fn place(
        &self,
        package_dir: &Path,
        destination: &Path,
        slug: &str,
        diagnostics: &mut Vec<String>,
    ) -> InstallResult<()> {
        fs::create_dir_all(destination)?;

        let target = destination.join(slug);
        if target.exists() {
            log::info!("replacing existing installation at {}", target.display());
            diagnostics.push(format!("replacing existing '{}'", slug));
            fs::remove_dir_all(&target)?;
        }

        if fs::rename(package_dir, &target).is_err() {
            // The working directory can sit on a different filesystem than
            // the destination root.
            normalize::copy_dir_recursive(package_dir, &target)?;
            fs::remove_dir_all(package_dir)?;
        }

        if !target.is_dir() {
            return Err(InstallError::Storage(format!(
                "installed package directory missing: {}",
                target.display()
            )));
        }
        Ok(())
    }
}

fn describe_classification(classification: &LayoutClassification) -> String {
    match classification {
        LayoutClassification::Flat => "flat".to_string(),
        LayoutClassification::NestedCorrect => "nested, correctly named".to_string(),
        LayoutClassification::NestedMisnamed { existing } => {
            format!("nested under '{}'", existing)
        }
        LayoutClassification::Indeterminate => "indeterminate".to_string(),
    }
}
