//! End-to-end scenarios driving `Session` against a mocked device, mirroring
//! the transcripts in the specification's worked examples: a plain push, a
//! coalesced transaction commit, `exist`/`jtest` status mapping, forbidden
//! commands inside a transaction, and `$N` variable resolution.

mod common;

use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{connected_session, host_port, mock_handshake};

#[tokio::test]
async fn connect_reports_devname_from_handshake() {
    let (_server, _session) = connected_session("switch-04").await;
}

#[tokio::test]
async fn push_outside_transaction_sends_put_immediately() {
    let server = MockServer::start().await;
    mock_handshake(&server, "dev01").await;

    Mock::given(method("OPTIONS"))
        .and(path("/api/cfg/net"))
        .respond_with(ResponseTemplate::new(204).insert_header("allow", "GET, PUT"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/cfg/net"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (host, port) = host_port(&server);
    tokio::task::spawn_blocking(move || {
        let mut session = wfctl::Session::connect(
            host,
            port,
            true,
            false,
            Vec::new(),
            std::time::Duration::from_secs(5),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        session.dispatch_line(r#"push cfg/net {"ip": "10.0.0.1"}"#).unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn push_forbidden_by_capabilities_is_bad_command() {
    let server = MockServer::start().await;
    mock_handshake(&server, "dev01").await;

    Mock::given(method("OPTIONS"))
        .and(path("/api/cfg/net"))
        .respond_with(ResponseTemplate::new(204).insert_header("allow", "GET"))
        .mount(&server)
        .await;

    let (host, port) = host_port(&server);
    tokio::task::spawn_blocking(move || {
        let mut session = wfctl::Session::connect(
            host,
            port,
            true,
            false,
            Vec::new(),
            std::time::Duration::from_secs(5),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        let err = session.dispatch_line(r#"push cfg/net {"ip": "10.0.0.1"}"#).unwrap_err();
        assert!(err.to_string().contains("forbidden for 'cfg/net'"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn transaction_coalesces_consecutive_patches_into_one_batch_request() {
    let server = MockServer::start().await;
    mock_handshake(&server, "dev01").await;

    Mock::given(method("OPTIONS"))
        .and(path("/api/cfg/net"))
        .respond_with(ResponseTemplate::new(204).insert_header("allow", "GET, PUT, PATCH"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cfg/net"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ip": "10.0.0.1", "mtu": 1500})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/batch"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (host, port) = host_port(&server);
    tokio::task::spawn_blocking(move || {
        let mut session = wfctl::Session::connect(
            host,
            port,
            true,
            false,
            Vec::new(),
            std::time::Duration::from_secs(5),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        session.dispatch_line("transact").unwrap();
        session.dispatch_line(r#"jp cfg/net replace /ip "10.0.0.2""#).unwrap();
        session.dispatch_line(r#"jp cfg/net replace /mtu 9000"#).unwrap();
        session.dispatch_line("commit").unwrap();
        assert!(!session.is_transacting());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn transaction_collapses_consecutive_pushes_into_one_put() {
    let server = MockServer::start().await;
    mock_handshake(&server, "dev01").await;

    Mock::given(method("OPTIONS"))
        .and(path("/api/cfg/host"))
        .respond_with(ResponseTemplate::new(204).insert_header("allow", "GET, PUT"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/cfg/host"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!("dev00")))
        .mount(&server)
        .await;

    let (host, port) = host_port(&server);
    let expected_batch = serde_json::json!([{
        "method": "PUT",
        "url": "/api/cfg/host",
        "body": "\"dev01\"",
        "headers": {
            "Accept": "application/json",
            "User-Agent": "wfctl/0.2",
            "Host": format!("{}:{}", host, port),
            "Content-Type": "application/json",
            "Content-Length": "7",
        }
    }]);
    Mock::given(method("POST"))
        .and(path("/api/batch"))
        .and(wiremock::matchers::body_json(expected_batch))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    tokio::task::spawn_blocking(move || {
        let mut session = wfctl::Session::connect(
            host,
            port,
            true,
            false,
            Vec::new(),
            std::time::Duration::from_secs(5),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        session.dispatch_line("transact").unwrap();
        session.dispatch_line(r#"push cfg/host "dev00""#).unwrap();
        session.dispatch_line(r#"push cfg/host "dev01""#).unwrap();
        // If the two pushes were not collapsed, the batch body would carry
        // two PUT descriptors and fail to match `expected_batch` above,
        // causing the mock server to 404 and this `unwrap()` to panic.
        session.dispatch_line("commit").unwrap();
        assert!(!session.is_transacting());
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn exist_reports_404_as_status_line_not_error() {
    let server = MockServer::start().await;
    mock_handshake(&server, "dev01").await;

    Mock::given(method("HEAD"))
        .and(path_regex(r"^/api/cfg/net$"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (host, port) = host_port(&server);
    tokio::task::spawn_blocking(move || {
        let mut session = wfctl::Session::connect(
            host,
            port,
            true,
            false,
            Vec::new(),
            std::time::Duration::from_secs(5),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        session.dispatch_line("exist cfg/net /ip").unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn start_is_forbidden_while_a_transaction_is_open() {
    let (_server, mut session) = connected_session("dev01").await;
    tokio::task::spawn_blocking(move || {
        session.dispatch_line("transact").unwrap();
        let err = session.dispatch_line("start capture0").unwrap_err();
        assert!(err.to_string().contains("forbidden inside an open transaction"));
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn dollar_variable_is_resolved_from_globargs() {
    let server = MockServer::start().await;
    mock_handshake(&server, "dev01").await;

    Mock::given(method("OPTIONS"))
        .and(path("/api/cfg/net"))
        .respond_with(ResponseTemplate::new(204).insert_header("allow", "GET, PUT"))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/cfg/net"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let (host, port) = host_port(&server);
    tokio::task::spawn_blocking(move || {
        let mut session = wfctl::Session::connect(
            host,
            port,
            true,
            false,
            vec!["cfg/net".to_string()],
            std::time::Duration::from_secs(5),
            std::time::Duration::from_secs(5),
        )
        .unwrap();
        session.dispatch_line(r#"push $0 {"ip": "10.0.0.1"}"#).unwrap();
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn abort_discards_staged_changes_without_contacting_the_server() {
    let (_server, mut session) = connected_session("dev01").await;
    tokio::task::spawn_blocking(move || {
        session.dispatch_line("transact").unwrap();
        session.dispatch_line("abort").unwrap();
        assert!(!session.is_transacting());
    })
    .await
    .unwrap();
}
