#![warn(clippy::pedantic)]

//! Release lookups and checksum fetches against a local HTTP server.

mod common;

use common::{Route, TestServer};
use dropkit::release::ReleaseClient;
use dropkit::verify::verify_with_url;
use dropkit::{Error, Platform, RepoRef};
use tempfile::TempDir;

const HELLO_SHA256: &str = "a948904f2f0f479b8f8197694b30184b0d2ed1c1cd2a1ec0fb85d299a192a447";

fn release_json(tag: &str, base: &str) -> String {
    format!(
        r#"{{
            "tag_name": "{tag}",
            "name": "Release {tag}",
            "draft": false,
            "assets": [
                {{"name": "tool-linux-amd64.tar.gz", "browser_download_url": "{base}/dl/tool-linux-amd64.tar.gz", "size": 10}},
                {{"name": "tool-darwin-arm64.zip", "browser_download_url": "{base}/dl/tool-darwin-arm64.zip", "size": 11}},
                {{"name": "SHA256SUMS", "browser_download_url": "{base}/dl/SHA256SUMS", "size": 12}}
            ]
        }}"#
    )
}

fn repo() -> RepoRef {
    RepoRef::parse("acme/tool").unwrap()
}

/// Verifies that `latest` hits the latest-release endpoint and decodes it.
#[tokio::test]
async fn fetches_latest_release() {
    let server = TestServer::start();
    server.route(
        "/repos/acme/tool/releases/latest",
        Route::json(release_json("v2.0.0", &server.base_url())),
    );

    let client = ReleaseClient::new(reqwest::Client::new(), server.base_url());
    let release = client.release(&repo(), "latest").await.unwrap();

    assert_eq!(release.tag_name, "v2.0.0");
    assert_eq!(release.name.as_deref(), Some("Release v2.0.0"));
    assert_eq!(release.assets.len(), 3);

    let asset = release
        .asset_for_platform(&Platform::parse("linux-amd64").unwrap())
        .unwrap();
    assert_eq!(
        asset.browser_download_url,
        server.url("/dl/tool-linux-amd64.tar.gz")
    );
    assert_eq!(
        release.signature_asset(&asset.name).map(|a| a.name.as_str()),
        Some("SHA256SUMS")
    );

    let request = &server.requests()[0];
    assert_eq!(request.header("accept"), Some("application/vnd.github+json"));
    assert_eq!(request.header("authorization"), None);
}

/// Verifies tag lookups and that the token is sent as a bearer credential.
#[tokio::test]
async fn fetches_release_by_tag_with_token() {
    let server = TestServer::start();
    server.route(
        "/repos/acme/tool/releases/tags/v1.4.2",
        Route::json(release_json("v1.4.2", &server.base_url())),
    );

    let client = ReleaseClient::new(reqwest::Client::new(), server.base_url())
        .with_token(Some("secret".to_string()));
    let release = client.release(&repo(), "v1.4.2").await.unwrap();

    assert_eq!(release.tag_name, "v1.4.2");
    assert_eq!(
        server.requests()[0].header("authorization"),
        Some("Bearer secret")
    );
}

/// Verifies that an unknown tag reports the HTTP status.
#[tokio::test]
async fn missing_release_is_a_status_error() {
    let server = TestServer::start();
    let client = ReleaseClient::new(reqwest::Client::new(), server.base_url());

    let err = client.by_tag(&repo(), "v0.0.0").await.unwrap_err();

    assert!(
        matches!(err, Error::Status { status: 404, .. }),
        "unexpected error: {err}"
    );
}

/// Verifies that malformed JSON is a decode error rather than a panic.
#[tokio::test]
async fn malformed_release_is_a_decode_error() {
    let server = TestServer::start();
    server.route("/repos/acme/tool/releases/latest", Route::json("{\"assets\": 3"));
    let client = ReleaseClient::new(reqwest::Client::new(), server.base_url());

    let err = client.latest(&repo()).await.unwrap_err();

    assert!(matches!(err, Error::Decode { .. }), "unexpected error: {err}");
}

/// Verifies a checksum file fetched over HTTP against a local file.
#[tokio::test]
async fn verifies_against_remote_checksum_file() {
    let server = TestServer::start();
    server.route(
        "/dl/SHA256SUMS",
        Route::json(format!("{}  other.zip\n{HELLO_SHA256}  hello.txt\n", "0".repeat(64))),
    );
    server.route("/dl/bad.sha256", Route::json("0".repeat(64)));

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("hello.txt");
    std::fs::write(&file, b"hello world\n").unwrap();

    let client = reqwest::Client::new();
    let digest = verify_with_url(&client, &file, &server.url("/dl/SHA256SUMS"))
        .await
        .unwrap();
    assert_eq!(digest, HELLO_SHA256);

    let err = verify_with_url(&client, &file, &server.url("/dl/bad.sha256"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ChecksumMismatch { .. }));

    let err = verify_with_url(&client, &file, &server.url("/dl/none"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Status { status: 404, .. }));
}
