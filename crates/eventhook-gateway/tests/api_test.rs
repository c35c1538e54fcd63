//! Tests for health, status, state publication and the hooks toggle.


use axum::http::StatusCode;
use serde_json::json;

use test_helpers::TestApp;

fn elected_state(version: u64) -> serde_json::Value {
    json!({
        "version": version,
        "cluster_name": "test-cluster",
        "nodes": {
            "master_node_id": "n1",
            "nodes": {
                "n1": {"id": "n1", "name": "node-1"},
                "n2": {"id": "n2", "name": "node-2"}
            }
        }
    })
}

#[tokio::test]
async fn test_health() {
    let app = TestApp::new(None);
    let (status, body) = app.call("GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn test_status_reports_local_view() {
    let app = TestApp::new(None);
    let (status, body) = app.call("GET", "/api/v1/status", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cluster_name"], "test-cluster");
    assert_eq!(body["state_version"], 0);
    assert_eq!(body["is_master"], false);
    assert_eq!(body["hooks_enabled"], true);
    assert_eq!(body["local_node"]["id"], "n1");
}

#[tokio::test]
async fn test_published_state_runs_master_hooks() {
    let mut app = TestApp::new(None);

    let (status, body) = app
        .call(
            "POST",
            "/api/v1/cluster/state",
            None,
            Some(json!({
                "source": "elected-as-master ([1] nodes joined)",
                "state": elected_state(5)
            })),
        )
        .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["version"], 5);
    assert!(body["accepted_at"].is_string());

    let (event_type, is_master) = app.next_execution().await;
    assert_eq!(event_type, "on_master");
    assert!(is_master);

    let (_, body) = app.call("GET", "/api/v1/status", None, None).await;
    assert_eq!(body["is_master"], true);
    assert_eq!(body["state_version"], 5);
}

#[tokio::test]
async fn test_publish_rejects_malformed_body() {
    let app = TestApp::new(None);
    let (status, _) = app
        .call(
            "POST",
            "/api/v1/cluster/state",
            None,
            Some(json!({"source": "missing state"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_toggle_hooks() {
    let app = TestApp::new(None);

    let (status, body) = app
        .call(
            "PUT",
            "/api/v1/hooks/enabled",
            None,
            Some(json!({"enabled": false})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enabled"], false);

    let (_, body) = app.call("GET", "/api/v1/status", None, None).await;
    assert_eq!(body["hooks_enabled"], false);
}

#[tokio::test]
async fn test_auth_required_on_api_but_not_health() {
    let app = TestApp::new(Some("secret-token"));

    let (status, _) = app.call("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.call("GET", "/api/v1/status", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = app
        .call("GET", "/api/v1/status", Some("wrong-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call("GET", "/api/v1/status", Some("secret-token"), None)
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[test]
fn test_empty_token_disables_auth() {
    assert!(!eventhook_gateway::AuthConfig::new(Some(String::new())).is_enabled());
    assert!(eventhook_gateway::AuthConfig::new(Some("t".into())).is_enabled());
}
