//! End-to-end tests against the live mock server.
//!
//! # Design
//! Each test starts the mock server on a random port and drives it through
//! `ReqwestTransport`, so URL joining, header defaults, status
//! classification and body decoding are checked over real HTTP.

use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;
use tracker_core::{
    Body, CancellationToken, ClientConfig, ErrorKind, Network, ProjectInput, ProjectService,
    RequestOptions,
};

/// Starts the mock server and returns its API base URL.
async fn start_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    format!("http://{addr}/api/")
}

/// Accepts connections and never answers them.
async fn start_silent_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    format!("http://{addr}")
}

#[tokio::test(flavor = "multi_thread")]
async fn project_lifecycle() {
    let base = start_server().await;
    let network = Network::new(&base).unwrap();
    let projects = ProjectService::new(network.clone());

    // Step 1: list is empty.
    assert!(projects.list().await.unwrap().is_empty());

    // Step 2: add reports the status code.
    let status = projects.add(&ProjectInput::new("Atlas", "Planned")).await;
    assert_eq!(status, 201);

    // Step 3: create returns the stored record.
    let mut input = ProjectInput::new("Borealis", "Active");
    input.stack = Some("rust".to_string());
    let created = projects.create(&input).await.unwrap();
    assert_eq!(created.name, "Borealis");
    assert_eq!(created.stack.as_deref(), Some("rust"));

    // Step 4: list has both.
    let listed = projects.list().await.unwrap();
    assert_eq!(listed.len(), 2);

    // Step 5: patch through the raw client.
    let endpoint = format!("projects/{}", created.id);
    let res = network
        .patch(&endpoint, Some(Body::from(json!({"status": "Done"}))), None)
        .await
        .unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.data.as_json().unwrap()["data"]["status"], "Done");

    // Step 6: delete yields an empty payload.
    let res = network.delete(&endpoint, None).await.unwrap();
    assert_eq!(res.status, 204);
    assert!(res.data.is_empty());

    // Step 7: get after delete is a structured 404.
    let err = network.get(&endpoint, None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Status);
    assert_eq!(err.status, 404);
    assert_eq!(err.response_body.unwrap()["errors"]["detail"], "Not Found");
}

#[tokio::test(flavor = "multi_thread")]
async fn bulk_import_partial_success() {
    let base = start_server().await;
    let projects = ProjectService::new(Network::new(&base).unwrap());

    let inputs = tracker_core::parse_import(
        r#"[
            {"name": "Atlas", "status": "Planned", "priority": "medium"},
            {"status": "Planned"},
            {"name": "Borealis", "status": "Active"},
            {"name": "", "status": "Done"},
            {"name": "Cirrus", "status": "Planned"}
        ]"#,
    )
    .unwrap();

    let report = projects.bulk_import(&inputs).await;
    assert_eq!(report.success_count, 3);
    assert_eq!(report.failure_count, 2);
    assert_eq!(report.failures[0].index, 1);
    assert_eq!(report.failures[1].index, 3);
    for failure in &report.failures {
        assert_eq!(failure.status, 422);
        assert_eq!(failure.message, "name: can't be blank");
    }

    assert_eq!(projects.list().await.unwrap().len(), 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn absolute_endpoint_bypasses_base_url() {
    let base = start_server().await;
    let network = Network::new("http://127.0.0.1:9/unused/").unwrap();
    let res = network.get(&format!("{base}projects"), None).await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.data.as_json().unwrap()["data"], json!([]));
}

#[tokio::test(flavor = "multi_thread")]
async fn connection_refused_is_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let network = Network::new(&format!("http://{addr}")).unwrap();
    let err = network.get("projects", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Transport);
    assert_eq!(err.status, 0);
    assert_eq!(err.status_text, "Network Error");
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_server_times_out() {
    let base = start_silent_server().await;
    let network = Network::with_config(
        ClientConfig::new(base).with_timeout(Duration::from_millis(200)),
    );

    let err = network.get("projects", None).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Timeout);
    assert_eq!(err.status, 408);
}

#[tokio::test(flavor = "multi_thread")]
async fn caller_token_aborts_in_flight_request() {
    let base = start_silent_server().await;
    let network = Network::new(&base).unwrap();

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = std::time::Instant::now();
    let options = RequestOptions::new().cancel_token(token);
    let err = network.get("projects", Some(options)).await.unwrap_err();
    assert_eq!(err.status, 408);
    assert!(started.elapsed() < Duration::from_secs(10));
}
