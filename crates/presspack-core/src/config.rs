//! Configuration for the installation pipeline.

use std::time::Duration;

/// Default timeout for API metadata requests (10 seconds).
const DEFAULT_API_TIMEOUT_SECS: u64 = 10;

/// Default timeout for archive body downloads (5 minutes).
const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Maximum redirects followed when fetching an archive.
const DEFAULT_REDIRECT_LIMIT: usize = 5;

/// Files smaller than this cannot be a real archive.
const MIN_ARCHIVE_BYTES: u64 = 100;

/// Tunables shared by the resolver, downloader, and orchestrator.
///
/// The defaults target the public GitHub API; tests point `api_base` and
/// `web_base` at an in-process server instead.
#[derive(Debug, Clone)]
pub struct InstallerConfig {
    /// Base URL of the hosting API (`https://api.github.com`).
    pub api_base: String,
    /// Base URL for direct archive downloads (`https://github.com`).
    pub web_base: String,
    /// User-Agent header sent with every request.
    pub user_agent: String,
    /// Timeout for metadata requests and redirect probes.
    pub api_timeout: Duration,
    /// Timeout for the archive body fetch.
    pub download_timeout: Duration,
    /// Redirect depth bound for archive fetches.
    pub redirect_limit: usize,
    /// Minimum plausible archive size in bytes.
    pub min_archive_bytes: u64,
}

impl Default for InstallerConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".to_string(),
            web_base: "https://github.com".to_string(),
            user_agent: format!("presspack/{}", env!("CARGO_PKG_VERSION")),
            api_timeout: Duration::from_secs(DEFAULT_API_TIMEOUT_SECS),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
            redirect_limit: DEFAULT_REDIRECT_LIMIT,
            min_archive_bytes: MIN_ARCHIVE_BYTES,
        }
    }
}

impl InstallerConfig {
    /// Override both base URLs, for pointing the pipeline at a mock host.
    pub fn with_base_urls(mut self, api_base: impl Into<String>, web_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self.web_base = web_base.into();
        self
    }

    /// Override the archive body timeout.
    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.download_timeout = timeout;
        self
    }
}
