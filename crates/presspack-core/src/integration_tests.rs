//! End-to-end tests for the installation pipeline.
//!
//! Every test runs against an in-process HTTP server standing in for the
//! hosting API and archive storage; nothing here touches the network.

use std::path::Path;
use std::sync::{Arc, Mutex};

use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tempfile::tempdir;

use crate::config::InstallerConfig;
use crate::download::Downloader;
use crate::errors::{InstallError, InstallResult};
use crate::github::GitHubClient;
use crate::installer::Installer;
use crate::test_utils::{build_zip, plugin_source};
use crate::traits::{Activator, FixedRoots, StaticToken};
use crate::types::{PackageKind, PackageRequest};

fn init_logs() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Serve `app` on an ephemeral port and return its base URL.
async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config_for(base: &str) -> InstallerConfig {
    InstallerConfig::default().with_base_urls(base, base)
}

fn installer_for(base: &str, roots: &Path) -> Installer {
    Installer::new(
        config_for(base),
        Box::new(StaticToken::default()),
        Box::new(FixedRoots {
            themes: roots.join("themes"),
            plugins: roots.join("plugins"),
        }),
    )
}

fn zip_route(bytes: Vec<u8>) -> axum::routing::MethodRouter {
    get(move || {
        let bytes = bytes.clone();
        async move { bytes }
    })
}

struct RecordingActivator(Arc<Mutex<Vec<String>>>);

#[async_trait::async_trait]
impl Activator for RecordingActivator {
    async fn activate(&self, kind: PackageKind, identifier: &str) -> InstallResult<()> {
        self.0.lock().unwrap().push(format!("{}:{}", kind, identifier));
        Ok(())
    }
}

#[tokio::test]
async fn test_install_theme_from_release_zipball() {
    init_logs();

    let archive = build_zip(
        &[
            ("acme-widgets-1a2b3c4/", b"".as_slice()),
            (
                "acme-widgets-1a2b3c4/style.css",
                b"/* Theme Name: Widgets */".as_slice(),
            ),
            ("acme-widgets-1a2b3c4/functions.php", b"<?php".as_slice()),
        ],
        false,
    );

    let placeholder = Arc::new(Mutex::new(String::new()));
    let base_holder = placeholder.clone();
    let app = Router::new()
        .route(
            "/repos/acme/widgets/releases/latest",
            get(move || {
                let base = base_holder.lock().unwrap().clone();
                async move {
                    Json(json!({
                        "tag_name": "v1.2.0",
                        "name": "1.2.0",
                        "zipball_url": format!("{}/zipball/acme/widgets/v1.2.0", base),
                        "assets": []
                    }))
                }
            }),
        )
        .route("/zipball/acme/widgets/v1.2.0", zip_route(archive));
    let base = serve(app).await;
    *placeholder.lock().unwrap() = base.clone();

    let roots = tempdir().unwrap();
    let installer = installer_for(&base, roots.path());
    let request = PackageRequest::new(PackageKind::Theme, "acme", "widgets");
    let outcome = installer.install(&request, false).await;

    assert!(outcome.success, "diagnostics: {:?}", outcome.diagnostics);
    assert_eq!(outcome.installed.as_deref(), Some("widgets"));
    let installed = roots.path().join("themes/widgets");
    assert_eq!(
        std::fs::read_to_string(installed.join("style.css")).unwrap(),
        "/* Theme Name: Widgets */"
    );
    assert!(installed.join("functions.php").is_file());
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.contains("version 1.2.0")));
}

#[tokio::test]
async fn test_install_plugin_from_flat_archive() {
    init_logs();

    let archive = build_zip(
        &[
            ("widget-tools.php", plugin_source("Widget Tools").as_bytes()),
            ("helper.php", b"<?php // no header".as_slice()),
            ("README.md", b"# docs".as_slice()),
            (".github/", b"".as_slice()),
            (".github/workflows.yml", b"on: push".as_slice()),
        ],
        false,
    );

    let app = Router::new()
        .route(
            "/repos/acme/widget-tools/releases/latest",
            get(|| async {
                Json(json!({
                    "tag_name": "2.0.0",
                    "assets": [],
                    "zipball_url": serde_json::Value::Null,
                }))
            }),
        )
        .route(
            "/acme/widget-tools/archive/refs/tags/2.0.0.zip",
            zip_route(archive),
        );
    let base = serve(app).await;

    let roots = tempdir().unwrap();
    let installer = installer_for(&base, roots.path());
    let request = PackageRequest::new(PackageKind::Plugin, "acme", "widget-tools");
    let outcome = installer.install(&request, false).await;

    assert!(outcome.success, "diagnostics: {:?}", outcome.diagnostics);
    assert_eq!(
        outcome.installed.as_deref(),
        Some("widget-tools/widget-tools.php")
    );
    let installed = roots.path().join("plugins/widget-tools");
    assert!(installed.join("widget-tools.php").is_file());
    assert!(installed.join("helper.php").is_file());
    assert!(!installed.join("README.md").exists());
    assert!(!installed.join(".github").exists());
}

#[tokio::test]
async fn test_release_asset_preferred_over_zipball() {
    init_logs();

    let asset_archive = build_zip(
        &[("widgets/", b"".as_slice()), ("widgets/style.css", b"/* from asset */".as_slice())],
        false,
    );
    let zipball_archive = build_zip(
        &[("widgets/", b"".as_slice()), ("widgets/style.css", b"/* from zipball */".as_slice())],
        false,
    );

    let placeholder = Arc::new(Mutex::new(String::new()));
    let base_holder = placeholder.clone();
    let app = Router::new()
        .route(
            "/repos/acme/widgets/releases/latest",
            get(move || {
                let base = base_holder.lock().unwrap().clone();
                async move {
                    Json(json!({
                        "tag_name": "v1.0.0",
                        "zipball_url": format!("{}/zipball/acme/widgets/v1.0.0", base),
                        "assets": [{
                            "name": "widgets-1.0.0.zip",
                            "browser_download_url": format!("{}/assets/widgets-1.0.0.zip", base),
                            "content_type": "application/zip",
                            "size": 512
                        }]
                    }))
                }
            }),
        )
        .route("/assets/widgets-1.0.0.zip", zip_route(asset_archive))
        .route("/zipball/acme/widgets/v1.0.0", zip_route(zipball_archive));
    let base = serve(app).await;
    *placeholder.lock().unwrap() = base.clone();

    let roots = tempdir().unwrap();
    let installer = installer_for(&base, roots.path());
    let request = PackageRequest::new(PackageKind::Theme, "acme", "widgets").with_slug("widgets");
    let outcome = installer.install(&request, false).await;

    assert!(outcome.success, "diagnostics: {:?}", outcome.diagnostics);
    assert_eq!(
        std::fs::read_to_string(roots.path().join("themes/widgets/style.css")).unwrap(),
        "/* from asset */"
    );
}

#[tokio::test]
async fn test_no_releases_falls_back_to_default_branch() {
    init_logs();

    let archive = build_zip(
        &[
            ("widgets-develop/", b"".as_slice()),
            ("widgets-develop/style.css", b"/* develop */".as_slice()),
        ],
        false,
    );

    let app = Router::new()
        .route(
            "/repos/acme/widgets/releases/latest",
            get(|| async {
                (
                    StatusCode::NOT_FOUND,
                    Json(json!({"message": "Not Found"})),
                )
            }),
        )
        .route(
            "/repos/acme/widgets",
            get(|| async {
                Json(json!({
                    "name": "widgets",
                    "default_branch": "develop",
                    "updated_at": "2024-05-01T00:00:00Z"
                }))
            }),
        )
        .route(
            "/acme/widgets/archive/refs/heads/develop.zip",
            zip_route(archive),
        );
    let base = serve(app).await;

    let roots = tempdir().unwrap();
    let installer = installer_for(&base, roots.path());
    let request = PackageRequest::new(PackageKind::Theme, "acme", "widgets").with_slug("widgets");
    let outcome = installer.install(&request, false).await;

    assert!(outcome.success, "diagnostics: {:?}", outcome.diagnostics);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.contains("refs/heads/develop")));
    assert_eq!(
        std::fs::read_to_string(roots.path().join("themes/widgets/style.css")).unwrap(),
        "/* develop */"
    );
}

#[tokio::test]
async fn test_pinned_version_skips_release_lookup() {
    init_logs();

    let archive = build_zip(
        &[
            ("widgets-1.4.0/", b"".as_slice()),
            ("widgets-1.4.0/style.css", b"/* 1.4.0 */".as_slice()),
        ],
        false,
    );

    // No API routes at all: resolving a pinned version must not call the API.
    let app = Router::new().route(
        "/acme/widgets/archive/refs/tags/1.4.0.zip",
        zip_route(archive),
    );
    let base = serve(app).await;

    let roots = tempdir().unwrap();
    let installer = installer_for(&base, roots.path());
    let request = PackageRequest::new(PackageKind::Theme, "acme", "widgets")
        .with_version("1.4.0")
        .with_slug("widgets");
    let outcome = installer.install(&request, false).await;

    assert!(outcome.success, "diagnostics: {:?}", outcome.diagnostics);
    assert!(outcome
        .diagnostics
        .iter()
        .any(|d| d.contains("refs/tags/1.4.0.zip")));
}

#[tokio::test]
async fn test_activation_runs_after_install() {
    init_logs();

    let archive = build_zip(
        &[("widget-tools.php", plugin_source("Widget Tools").as_bytes())],
        false,
    );

    let app = Router::new().route(
        "/acme/widget-tools/archive/refs/tags/1.0.0.zip",
        zip_route(archive),
    );
    let base = serve(app).await;

    let activations = Arc::new(Mutex::new(Vec::new()));
    let roots = tempdir().unwrap();
    let installer = installer_for(&base, roots.path())
        .with_activator(Box::new(RecordingActivator(activations.clone())));

    let request = PackageRequest::new(PackageKind::Plugin, "acme", "widget-tools")
        .with_version("1.0.0");
    let outcome = installer.install(&request, true).await;

    assert!(outcome.success, "diagnostics: {:?}", outcome.diagnostics);
    assert_eq!(
        activations.lock().unwrap().as_slice(),
        ["plugin:widget-tools/widget-tools.php"]
    );
}

#[tokio::test]
async fn test_downloader_rejects_non_archive_body() {
    init_logs();

    let body = "<html>".to_string() + &"padding ".repeat(50) + "</html>";
    let app = Router::new().route(
        "/archive.zip",
        get(move || {
            let body = body.clone();
            async move { body }
        }),
    );
    let base = serve(app).await;

    let downloader = Downloader::new(config_for(&base), None).unwrap();
    let err = downloader
        .download(&format!("{}/archive.zip", base))
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Validation(_)));
}

#[tokio::test]
async fn test_downloader_rejects_tiny_body() {
    init_logs();

    let app = Router::new().route("/tiny.zip", get(|| async { b"PK\x03\x04".to_vec() }));
    let base = serve(app).await;

    let downloader = Downloader::new(config_for(&base), None).unwrap();
    let err = downloader
        .download(&format!("{}/tiny.zip", base))
        .await
        .unwrap_err();
    match err {
        InstallError::Validation(message) => assert!(message.contains("too small")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_download_failure_is_reported_in_outcome() {
    init_logs();

    let app = Router::new(); // every route 404s
    let base = serve(app).await;

    let roots = tempdir().unwrap();
    let installer = installer_for(&base, roots.path());
    let request = PackageRequest::new(PackageKind::Theme, "acme", "missing");
    let outcome = installer.install(&request, false).await;

    assert!(!outcome.success);
    assert!(outcome.installed.is_none());
    assert!(!outcome.diagnostics.is_empty());
}

#[tokio::test]
async fn test_client_surfaces_not_found() {
    init_logs();

    let app = Router::new();
    let base = serve(app).await;

    let client = GitHubClient::new(config_for(&base), None).unwrap();
    let err = client.latest_release("acme", "ghost").await.unwrap_err();
    assert!(matches!(err, InstallError::NotFound(_)));
}

#[tokio::test]
async fn test_client_repository_and_search() {
    init_logs();

    let app = Router::new()
        .route(
            "/repos/acme/widgets",
            get(|| async {
                Json(json!({
                    "name": "widgets",
                    "full_name": "acme/widgets",
                    "description": "Widget theme",
                    "default_branch": "main",
                    "stargazers_count": 42
                }))
            }),
        )
        .route(
            "/repos/acme/widgets/releases",
            get(|| async {
                Json(json!([
                    {"tag_name": "v2.0.0", "assets": []},
                    {"tag_name": "v1.0.0", "assets": []}
                ]))
            }),
        )
        .route(
            "/search/repositories",
            get(|| async {
                Json(json!({
                    "total_count": 1,
                    "items": [{"name": "widgets", "default_branch": "main"}]
                }))
            }),
        )
        .route("/user", get(|| async { Json(json!({"login": "octocat"})) }));
    let base = serve(app).await;

    let client = GitHubClient::new(config_for(&base), Some("token".to_string())).unwrap();

    let repository = client.repository("acme", "widgets").await.unwrap();
    assert_eq!(repository.default_branch, "main");
    assert_eq!(repository.stargazers_count, Some(42));

    let releases = client.releases("acme", "widgets").await.unwrap();
    assert_eq!(releases.len(), 2);
    assert_eq!(releases[0].tag_name, "v2.0.0");

    let results = client.search_repositories("widgets theme", 1, 10).await.unwrap();
    assert_eq!(results.total_count, 1);
    assert_eq!(results.items[0].name, "widgets");

    let account = client.verify_credentials().await.unwrap();
    assert_eq!(account.login, "octocat");
}

#[tokio::test]
async fn test_reinstall_replaces_previous_version() {
    init_logs();

    let archive_v2 = build_zip(
        &[
            ("widgets/", b"".as_slice()),
            ("widgets/style.css", b"/* v2 */".as_slice()),
        ],
        false,
    );

    let app = Router::new().route(
        "/acme/widgets/archive/refs/tags/2.0.0.zip",
        zip_route(archive_v2),
    );
    let base = serve(app).await;

    let roots = tempdir().unwrap();
    let previous = roots.path().join("themes/widgets");
    std::fs::create_dir_all(&previous).unwrap();
    std::fs::write(previous.join("style.css"), "/* v1 */").unwrap();
    std::fs::write(previous.join("stale.css"), "/* gone after update */").unwrap();

    let installer = installer_for(&base, roots.path());
    let request = PackageRequest::new(PackageKind::Theme, "acme", "widgets")
        .with_version("2.0.0")
        .with_slug("widgets");
    let outcome = installer.install(&request, false).await;

    assert!(outcome.success, "diagnostics: {:?}", outcome.diagnostics);
    assert_eq!(
        std::fs::read_to_string(previous.join("style.css")).unwrap(),
        "/* v2 */"
    );
    assert!(!previous.join("stale.css").exists());
}
