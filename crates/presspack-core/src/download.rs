//! Archive downloading and validation.
//!
//! Streams the archive body to a uniquely named temporary file, attaching a
//! bearer credential for GitHub hosts. API-hosted asset URLs get a
//! metadata-only probe first to resolve the redirect to the real asset
//! location. A transport failure triggers exactly one retry through a system
//! `curl` invocation before the error becomes terminal.

use std::io::{Read, Write};
use std::path::Path;

use reqwest::header::{ACCEPT, LOCATION};
use reqwest::StatusCode;
use tempfile::NamedTempFile;

use crate::config::InstallerConfig;
use crate::errors::{InstallError, InstallResult};
use crate::types::DownloadedArchive;

/// Local-file-header signature every zip archive starts with.
pub(crate) const ZIP_LOCAL_HEADER: [u8; 4] = [0x50, 0x4B, 0x03, 0x04];

const OCTET_STREAM: &str = "application/octet-stream";

/// Downloads archives described by resolved source URLs.
#[derive(Debug, Clone)]
pub struct Downloader {
    config: InstallerConfig,
    token: Option<String>,
    /// Body fetches follow redirects up to the configured bound.
    body_client: reqwest::Client,
    /// The probe client never follows redirects; it reads `Location` itself.
    probe_client: reqwest::Client,
}

/// How the primary body fetch failed, so the retry policy can tell a
/// transport fault from an HTTP rejection or local disk trouble.
enum StreamFailure {
    Transport(reqwest::Error),
    Status(StatusCode),
    Disk(std::io::Error),
}

impl Downloader {
    pub fn new(config: InstallerConfig, token: Option<String>) -> InstallResult<Self> {
        let body_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.download_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.redirect_limit))
            .build()?;
        let probe_client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(config.api_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;
        Ok(Self {
            config,
            token,
            body_client,
            probe_client,
        })
    }

    /// Download `url` to a temporary file and validate it as an archive.
    ///
    /// The returned [`DownloadedArchive`] deletes its file on drop, so every
    /// error path below leaves nothing behind.
    pub async fn download(&self, url: &str) -> InstallResult<DownloadedArchive> {
        log::info!("downloading archive from {}", url);

        let mut url = url.to_string();
        let mut accept_octet = is_api_url(&url);

        if accept_octet {
            // API asset URLs answer with a redirect to the storage backend;
            // resolve it up front so the body fetch hits the final location.
            url = self.resolve_api_location(&url).await?;
            accept_octet = is_api_url(&url);
            log::debug!("resolved asset location: {}", url);
        }

        let mut temp = tempfile::Builder::new()
            .prefix("presspack-download-")
            .suffix(".zip")
            .tempfile()?;

        match self.stream_body(&url, accept_octet, &mut temp).await {
            Ok(()) => {}
            Err(StreamFailure::Status(status)) => {
                return Err(InstallError::Network(format!(
                    "download failed, server returned HTTP {} for {}",
                    status.as_u16(),
                    url
                )));
            }
            Err(StreamFailure::Disk(err)) => {
                // Not a transport fault; retrying would hit the same disk.
                return Err(InstallError::Storage(err.to_string()));
            }
            Err(StreamFailure::Transport(err)) => {
                log::warn!("download transport failure ({}), retrying via curl", err);
                self.fetch_with_curl(&url, accept_octet, temp.path())
                    .await
                    .map_err(|fallback| {
                        InstallError::Network(format!(
                            "download failed: {}; curl fallback: {}",
                            err, fallback
                        ))
                    })?;
            }
        }

        let size_bytes = temp.as_file().metadata()?.len();
        if size_bytes < self.config.min_archive_bytes {
            return Err(InstallError::Validation(format!(
                "downloaded file is too small to be an archive ({} bytes)",
                size_bytes
            )));
        }

        if !is_valid_archive(temp.path()) {
            return Err(InstallError::Validation(
                "downloaded file is not a valid zip archive".to_string(),
            ));
        }

        log::info!("downloaded {} bytes to {}", size_bytes, temp.path().display());
        Ok(DownloadedArchive::new(temp.into_temp_path(), size_bytes))
    }

    /// Probe an API asset URL and return the redirect target, if any.
    async fn resolve_api_location(&self, url: &str) -> InstallResult<String> {
        let mut request = self.probe_client.head(url).header(ACCEPT, OCTET_STREAM);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_redirection() {
            if let Some(location) = response
                .headers()
                .get(LOCATION)
                .and_then(|v| v.to_str().ok())
            {
                return Ok(location.to_string());
            }
        }
        if status.is_success() {
            return Ok(url.to_string());
        }
        Err(InstallError::Network(format!(
            "GitHub API returned status code {} while resolving {}",
            status.as_u16(),
            url
        )))
    }

    async fn stream_body(
        &self,
        url: &str,
        accept_octet: bool,
        temp: &mut NamedTempFile,
    ) -> Result<(), StreamFailure> {
        let mut request = self.body_client.get(url);
        if accept_octet {
            request = request.header(ACCEPT, OCTET_STREAM);
        }
        if let (Some(token), true) = (&self.token, is_github_host(url)) {
            request = request.bearer_auth(token);
        }

        let mut response = request.send().await.map_err(StreamFailure::Transport)?;
        if !response.status().is_success() {
            return Err(StreamFailure::Status(response.status()));
        }

        while let Some(chunk) = response.chunk().await.map_err(StreamFailure::Transport)? {
            temp.as_file_mut()
                .write_all(&chunk)
                .map_err(StreamFailure::Disk)?;
        }
        Ok(())
    }

    /// Alternate fetch mechanism used once after a transport failure.
    async fn fetch_with_curl(
        &self,
        url: &str,
        accept_octet: bool,
        dest: &Path,
    ) -> InstallResult<()> {
        let curl = which::which("curl").map_err(|_| {
            InstallError::Network("curl is not available on this host".to_string())
        })?;

        let mut command = tokio::process::Command::new(curl);
        command
            .arg("-fsSL")
            .arg("--max-redirs")
            .arg(self.config.redirect_limit.to_string())
            .arg("-A")
            .arg(&self.config.user_agent)
            .arg("-o")
            .arg(dest);
        if accept_octet {
            command.arg("-H").arg(format!("Accept: {}", OCTET_STREAM));
        }
        if let (Some(token), true) = (&self.token, is_github_host(url)) {
            command.arg("-H").arg(format!("Authorization: Bearer {}", token));
        }
        command.arg(url);

        let output = command
            .output()
            .await
            .map_err(|e| InstallError::Network(format!("failed to run curl: {}", e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(InstallError::Network(format!(
                "curl exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

/// Whether a downloaded file is a well-formed compressed archive.
///
/// The full central-directory parse is authoritative; when it rejects the
/// file, the four-byte local-file-header signature decides, since the later
/// extraction strategies can handle archives the primary parser cannot.
pub fn is_valid_archive(path: &Path) -> bool {
    let file = match std::fs::File::open(path) {
        Ok(file) => file,
        Err(err) => {
            log::debug!("archive validation failed to open {}: {}", path.display(), err);
            return false;
        }
    };

    match zip::ZipArchive::new(file) {
        Ok(archive) => {
            log::debug!("archive validation passed: {} entries", archive.len());
            true
        }
        Err(err) => {
            log::debug!("central directory parse failed ({}), checking signature", err);
            has_zip_signature(path)
        }
    }
}

fn has_zip_signature(path: &Path) -> bool {
    let mut signature = [0u8; 4];
    match std::fs::File::open(path).and_then(|mut f| f.read_exact(&mut signature)) {
        Ok(()) => signature == ZIP_LOCAL_HEADER,
        Err(_) => false,
    }
}

fn is_api_url(url: &str) -> bool {
    url.contains("api.github.com")
}

fn is_github_host(url: &str) -> bool {
    url.contains("github.com")
}
