//! Seams to the host's collaborators.
//!
//! The settings store, destination layout, and activation mechanics live
//! outside this crate; the orchestrator reaches them only through these
//! traits.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::errors::InstallResult;
use crate::types::PackageKind;

/// Read-only access to the stored API credential.
pub trait CredentialProvider: Send + Sync {
    /// Returns the personal access token, if one is configured.
    fn token(&self) -> Option<String>;
}

/// Maps a package kind to the root directory packages of that kind install
/// into.
pub trait TargetResolver: Send + Sync {
    fn destination_root(&self, kind: PackageKind) -> PathBuf;
}

/// Host-specific activation of an installed package.
#[async_trait]
pub trait Activator: Send + Sync {
    /// `identifier` is the installed slug for themes and
    /// `slug/entry-file.php` for plugins.
    async fn activate(&self, kind: PackageKind, identifier: &str) -> InstallResult<()>;
}

/// A fixed, possibly absent token.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl CredentialProvider for StaticToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Destination roots held directly as paths.
#[derive(Debug, Clone)]
pub struct FixedRoots {
    pub themes: PathBuf,
    pub plugins: PathBuf,
}

impl TargetResolver for FixedRoots {
    fn destination_root(&self, kind: PackageKind) -> PathBuf {
        match kind {
            PackageKind::Theme => self.themes.clone(),
            PackageKind::Plugin => self.plugins.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_token() {
        assert_eq!(StaticToken::default().token(), None);
        let provider = StaticToken(Some("ghp_abc".to_string()));
        assert_eq!(provider.token().as_deref(), Some("ghp_abc"));
    }

    #[test]
    fn test_fixed_roots() {
        let roots = FixedRoots {
            themes: PathBuf::from("/srv/content/themes"),
            plugins: PathBuf::from("/srv/content/plugins"),
        };
        assert_eq!(
            roots.destination_root(PackageKind::Theme),
            PathBuf::from("/srv/content/themes")
        );
        assert_eq!(
            roots.destination_root(PackageKind::Plugin),
            PathBuf::from("/srv/content/plugins")
        );
    }
}
