//! GitHub API client and download-URL resolution.
//!
//! Consumes the read-only hosting API surface: repository metadata, release
//! lookups, search, and the credential check. [`GitHubClient::resolve`]
//! implements the download-source preference order: release asset, release
//! source archive, tag-derived archive URL, default-branch archive URL.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

use crate::config::InstallerConfig;
use crate::errors::{InstallError, InstallResult};
use crate::types::ResolvedSource;

const GITHUB_ACCEPT: &str = "application/vnd.github.v3+json";

/// Repository metadata.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Repository {
    pub name: String,
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default = "Repository::default_branch_fallback")]
    pub default_branch: String,
    #[serde(default)]
    pub updated_at: Option<String>,
    #[serde(default)]
    pub stargazers_count: Option<u64>,
}

impl Repository {
    fn default_branch_fallback() -> String {
        "main".to_string()
    }
}

/// A published release.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub zipball_url: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

/// A file attached to a release.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub size: u64,
}

/// Result page from the repository search endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchResults {
    pub total_count: u64,
    pub items: Vec<Repository>,
}

/// The authenticated account, used to verify a stored token.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Account {
    pub login: String,
}

/// Client for the GitHub REST API.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    config: InstallerConfig,
    token: Option<String>,
    client: reqwest::Client,
}

impl GitHubClient {
    pub fn new(config: InstallerConfig, token: Option<String>) -> InstallResult<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.api_timeout)
            .build()?;
        Ok(Self {
            config,
            token,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> InstallResult<T> {
        log::debug!("GitHub API request: {}", url);
        let mut request = self.client.get(url).header(ACCEPT, GITHUB_ACCEPT);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        log::debug!("GitHub API response: HTTP {} for {}", status.as_u16(), url);

        if status == StatusCode::NOT_FOUND {
            return Err(InstallError::NotFound(format!("{} (HTTP 404)", url)));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(String::from))
                .unwrap_or_else(|| status.to_string());
            return Err(InstallError::Network(format!(
                "GitHub API error (HTTP {}): {}",
                status.as_u16(),
                message
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| InstallError::Network(format!("invalid JSON response from {}: {}", url, e)))
    }

    /// Fetch repository metadata.
    pub async fn repository(&self, owner: &str, repo: &str) -> InstallResult<Repository> {
        let url = format!("{}/repos/{}/{}", self.config.api_base, owner, repo);
        self.get_json(&url).await
    }

    /// List all releases, newest first.
    pub async fn releases(&self, owner: &str, repo: &str) -> InstallResult<Vec<Release>> {
        let url = format!("{}/repos/{}/{}/releases", self.config.api_base, owner, repo);
        self.get_json(&url).await
    }

    /// Fetch the latest published release.
    pub async fn latest_release(&self, owner: &str, repo: &str) -> InstallResult<Release> {
        let url = format!(
            "{}/repos/{}/{}/releases/latest",
            self.config.api_base, owner, repo
        );
        self.get_json(&url).await
    }

    /// Search public repositories.
    pub async fn search_repositories(
        &self,
        query: &str,
        page: u32,
        per_page: u32,
    ) -> InstallResult<SearchResults> {
        let url = format!(
            "{}/search/repositories?q={}&page={}&per_page={}",
            self.config.api_base,
            urlencoding::encode(query),
            page,
            per_page
        );
        self.get_json(&url).await
    }

    /// Verify the configured token by fetching the authenticated account.
    pub async fn verify_credentials(&self) -> InstallResult<Account> {
        let url = format!("{}/user", self.config.api_base);
        self.get_json(&url).await
    }

    /// Determine the concrete download URL for `owner/repo` at `version`.
    ///
    /// With an explicit version no API call is made: the version is
    /// classified as a tag or a branch and the matching archive URL is built
    /// directly. Without one, the latest release is consulted, preferring a
    /// zip release asset, then the release's source archive, then a URL
    /// derived from the release tag; a repository without releases resolves
    /// to its default branch archive.
    pub async fn resolve(
        &self,
        owner: &str,
        repo: &str,
        version: Option<&str>,
    ) -> InstallResult<ResolvedSource> {
        if let Some(version) = version {
            let download_url = if is_version_tag(version) {
                self.tag_archive_url(owner, repo, version)
            } else {
                self.branch_archive_url(owner, repo, version)
            };
            return Ok(ResolvedSource {
                download_url,
                version_label: version_label(version),
            });
        }

        let release = match self.latest_release(owner, repo).await {
            Ok(release) => release,
            Err(InstallError::NotFound(_)) => {
                // No releases published. Fall back to the default branch;
                // this is a supported path, not a failure.
                let repository = self.repository(owner, repo).await?;
                let branch = repository.default_branch;
                log::info!(
                    "no releases for {}/{}, falling back to default branch '{}'",
                    owner,
                    repo,
                    branch
                );
                return Ok(ResolvedSource {
                    download_url: self.branch_archive_url(owner, repo, &branch),
                    version_label: branch,
                });
            }
            Err(err) => return Err(err),
        };

        let label = version_label(&release.tag_name);

        if let Some(asset) = release.assets.iter().find(|a| {
            a.name.contains(".zip") || a.content_type.as_deref() == Some("application/zip")
        }) {
            log::debug!("selected release asset '{}'", asset.name);
            return Ok(ResolvedSource {
                download_url: asset.browser_download_url.clone(),
                version_label: label,
            });
        }

        if let Some(zipball_url) = &release.zipball_url {
            return Ok(ResolvedSource {
                download_url: normalize_zipball_url(zipball_url),
                version_label: label,
            });
        }

        if !release.tag_name.is_empty() {
            return Ok(ResolvedSource {
                download_url: self.tag_archive_url(owner, repo, &release.tag_name),
                version_label: label,
            });
        }

        Err(InstallError::NotFound(format!(
            "no download URL in release information for {}/{}",
            owner, repo
        )))
    }

    fn tag_archive_url(&self, owner: &str, repo: &str, tag: &str) -> String {
        format!(
            "{}/{}/{}/archive/refs/tags/{}.zip",
            self.config.web_base, owner, repo, tag
        )
    }

    fn branch_archive_url(&self, owner: &str, repo: &str, branch: &str) -> String {
        format!(
            "{}/{}/{}/archive/refs/heads/{}.zip",
            self.config.web_base, owner, repo, branch
        )
    }
}

/// Whether a requested version names a tag (an optional `v` followed by
/// dot-separated digit groups) rather than a branch.
pub fn is_version_tag(version: &str) -> bool {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^v?\d+(\.\d+)*$").expect("version tag pattern is valid"))
        .is_match(version)
}

/// Strip the conventional `v` prefix from version tags for reporting.
fn version_label(version: &str) -> String {
    if is_version_tag(version) {
        version.trim_start_matches('v').to_string()
    } else {
        version.to_string()
    }
}

/// Rewrite an API-style zipball URL into a directly fetchable archive URL.
///
/// API zipball URLs omit the `.zip` suffix and point at the API host; some
/// proxies mangle them. The rewritten form targets the web host's
/// tag-archive path.
fn normalize_zipball_url(url: &str) -> String {
    if !url.contains("api.github.com") || url.contains(".zip") {
        return url.to_string();
    }

    let mut normalized = url.replace("api.github.com/repos/", "github.com/");
    if normalized.contains("/zipball/") {
        normalized = normalized.replace("/zipball/", "/archive/refs/tags/");
        normalized.push_str(".zip");
    }
    normalized
}
