//! HTTP tests for the supervisor API against a live server.

use std::sync::Arc;
use std::time::Duration;

use tempest_assignments::{Assignment, SupervisorAssignments, RECEIVE_ASSIGNMENTS_PATH};
use tempest_id::{JobId, NodeId};
use tempest_supervisor::api::{ErrorBody, HealthResponse};
use tempest_supervisor::{RunningServer, Supervisor};

async fn start(node: &str) -> (Arc<Supervisor>, RunningServer) {
    let supervisor = Arc::new(Supervisor::new(NodeId::parse(node).unwrap()));
    let server = RunningServer::spawn("127.0.0.1:0".parse().unwrap(), supervisor.clone())
        .await
        .unwrap();
    (supervisor, server)
}

fn payload(node: &str, host: &str) -> SupervisorAssignments {
    let mut assignment = Assignment {
        master_code_dir: "/nimbus/wc-1".to_string(),
        ..Default::default()
    };
    assignment
        .node_host
        .insert(NodeId::parse(node).unwrap(), host.to_string());
    SupervisorAssignments::new().with_assignment(JobId::parse("wc-1").unwrap(), assignment)
}

#[tokio::test]
async fn healthz_reports_node() {
    let (_supervisor, server) = start("sup-1").await;
    let url = format!("http://{}/healthz", server.local_addr());

    let health: HealthResponse = reqwest::get(&url).await.unwrap().json().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.node, "sup-1");
    assert_eq!(health.receipts, 0);

    server.shutdown().await;
}

#[tokio::test]
async fn push_is_stored() {
    let (supervisor, server) = start("sup-1").await;
    let url = format!("http://{}{}", server.local_addr(), RECEIVE_ASSIGNMENTS_PATH);
    let sent = payload("sup-1", "127.0.0.1");

    let response = reqwest::Client::new()
        .post(&url)
        .json(&sent)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::NO_CONTENT);

    assert!(supervisor.wait_for_receipts(1, Duration::from_secs(5)).await);
    assert_eq!(supervisor.latest_assignments().as_deref(), Some(&sent));

    server.shutdown().await;
}

#[tokio::test]
async fn stopped_supervisor_returns_unavailable() {
    let (supervisor, server) = start("sup-1").await;
    supervisor.stop();
    let url = format!("http://{}{}", server.local_addr(), RECEIVE_ASSIGNMENTS_PATH);

    let response = reqwest::Client::new()
        .post(&url)
        .json(&payload("sup-1", "127.0.0.1"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), reqwest::StatusCode::SERVICE_UNAVAILABLE);
    let body: ErrorBody = response.json().await.unwrap();
    assert_eq!(body.code, "supervisor_stopped");

    server.shutdown().await;
}

#[tokio::test]
async fn malformed_payload_is_rejected() {
    let (supervisor, server) = start("sup-1").await;
    let url = format!("http://{}{}", server.local_addr(), RECEIVE_ASSIGNMENTS_PATH);

    let response = reqwest::Client::new()
        .post(&url)
        .header("content-type", "application/json")
        .body(r#"{"storm_assignment": {"wc-1": 7}}"#)
        .send()
        .await
        .unwrap();
    assert!(response.status().is_client_error());
    assert_eq!(supervisor.receipt_count(), 0);

    server.shutdown().await;
}
