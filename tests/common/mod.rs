//! Shared integration-test helpers: temp config files and a `wiremock`-backed
//! fixture for standing up a fake device and opening a [`wfctl::Session`]
//! against it.
//!
//! `Session` is a blocking, synchronous client (`reqwest::blocking::Client`)
//! while `wiremock::MockServer` is async, so every helper that touches both
//! runs the blocking half on `tokio::task::spawn_blocking`.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wfctl::Session;

#[allow(dead_code)]
pub fn temp_config_file(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, contents).expect("failed to write config file");
    (temp_dir, config_path)
}

/// Split a `wiremock` server's URI into the bare host and port `Session`
/// expects (it reconstructs `http://{host}:{port}/api/...` itself).
#[allow(dead_code)]
pub fn host_port(server: &MockServer) -> (String, u16) {
    let uri = server.uri();
    let rest = uri.trim_start_matches("http://");
    let mut parts = rest.splitn(2, ':');
    let host = parts.next().unwrap().to_string();
    let port: u16 = parts.next().unwrap().parse().unwrap();
    (host, port)
}

/// Register the two requests every `Session::connect` makes: the root
/// `HEAD` probe and the `GET env/devname` handshake.
#[allow(dead_code)]
pub async fn mock_handshake(server: &MockServer, devname: &str) {
    Mock::given(method("HEAD"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/env/devname"))
        .respond_with(ResponseTemplate::new(200).set_body_string(devname))
        .mount(server)
        .await;
}

/// Stand up a mock server with a working handshake already mounted, and
/// open a `Session` against it on a blocking thread.
#[allow(dead_code)]
pub async fn connected_session(devname: &str) -> (MockServer, Session) {
    let server = MockServer::start().await;
    mock_handshake(&server, devname).await;
    let (host, port) = host_port(&server);

    let session = tokio::task::spawn_blocking(move || {
        Session::connect(
            host,
            port,
            true,
            false,
            Vec::new(),
            Duration::from_secs(5),
            Duration::from_secs(5),
        )
    })
    .await
    .expect("connect task panicked")
    .expect("session handshake failed");

    (server, session)
}
