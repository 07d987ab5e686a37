// Integration tests: HTTP endpoints over a scripted host

mod common;

use axum_test::TestServer;
use common::{FakeContainers, FakeProbe, GB, container};
use hostagent::agent::{Agent, AgentDeps};
use hostagent::config::AgentConfig;
use hostagent::routes;
use std::collections::HashMap;
use std::sync::Arc;

const KEY: &str = "test-key";

fn test_server() -> TestServer {
    let probe = FakeProbe::new()
        .partition("/dev/sda1", "/")
        .disk("sda1", 0, 0)
        .nic("eth0", 1, 1)
        .usage("/", 50 * GB, 10 * GB);
    let agent = Agent::new(
        AgentDeps {
            probe: Arc::new(probe),
            containers: Some(Arc::new(FakeContainers::with(HashMap::from([(
                "abc123def456".to_string(),
                container("web", 2.5),
            )])))),
            gpu: None,
        },
        &AgentConfig::default(),
    );
    let app = routes::app(Arc::new(agent), KEY.as_bytes().to_vec());
    TestServer::new(app)
}

#[tokio::test]
async fn test_root_endpoint() {
    let server = test_server();
    let response = server.get("/").await;
    response.assert_status_ok();
    response.assert_text("hostagent: monitoring agent");
}

#[tokio::test]
async fn test_version_endpoint() {
    let server = test_server();
    let response = server.get("/version").await;
    response.assert_status_ok();
    let json: serde_json::Value = response.json();
    assert_eq!(json.get("name").and_then(|v| v.as_str()), Some("hostagent"));
    assert!(json.get("version").and_then(|v| v.as_str()).is_some());
}

#[tokio::test]
async fn test_stats_requires_key() {
    let server = test_server();
    server
        .get("/api/stats")
        .expect_failure()
        .await
        .assert_status_unauthorized();
    server
        .get("/api/stats")
        .authorization_bearer("wrong")
        .expect_failure()
        .await
        .assert_status_unauthorized();
}

#[tokio::test]
async fn test_stats_returns_snapshot() {
    let server = test_server();
    let response = server.get("/api/stats").authorization_bearer(KEY).await;
    response.assert_status_ok();

    let json: serde_json::Value = response.json();
    assert_eq!(json["info"]["hostname"], "testhost");
    assert_eq!(json["info"]["agentVersion"], hostagent::version::VERSION);
    assert_eq!(json["stats"]["diskTotalGb"], 50.0);
    assert_eq!(json["stats"]["diskPercent"], 20.0);
    assert_eq!(json["containers"]["abc123def456"]["name"], "web");
    assert_eq!(json["containers"]["abc123def456"]["cpu"], 2.5);
    assert!(json["stats"].get("gpus").is_none());
    assert!(json["stats"].get("extraFs").is_none());
}
