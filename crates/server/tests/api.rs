//! Integration tests for the domplay REST API.

use std::sync::Arc;

use axum_test::TestServer;
use domplay_server::{build_router, AppState, ServerConfig};
use http::StatusCode;
use serde_json::{json, Value};

const DEMO: &str = r#"<html><body><p id="demo">hi</p></body></html>"#;

fn test_server() -> TestServer {
    let config = ServerConfig {
        tick_interval: None,
        ..Default::default()
    };
    let state = Arc::new(AppState::new(config));
    let app = build_router(state);
    TestServer::new(app).unwrap()
}

async fn put_demo(server: &TestServer, id: &str) {
    server
        .put(&format!("/api/instances/{id}"))
        .json(&json!({ "source": DEMO }))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn health_returns_ok() {
    let server = test_server();
    let res = server.get("/health").await;
    res.assert_status_ok();
    res.assert_text("ok");
}

#[tokio::test]
async fn create_assigns_an_id() {
    let server = test_server();
    let res = server.post("/api/instances").json(&json!({})).await;
    res.assert_status(StatusCode::CREATED);
    let body: Value = res.json();
    let id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["state"], "idle");
    assert_eq!(body["tree_visible"], true);
    assert_eq!(body["preview"]["status"], "blank");

    let list: Vec<String> = server.get("/api/instances").await.json();
    assert_eq!(list, vec![id]);
}

#[tokio::test]
async fn run_renders_graph_and_scene() {
    let server = test_server();
    put_demo(&server, "editor-1").await;

    let res = server.post("/api/instances/editor-1/run").await;
    res.assert_status_ok();
    res.assert_json(&json!({ "outcome": "rendered", "nodes": 6, "edges": 5 }));

    let graph: Value = server.get("/api/instances/editor-1/graph").await.json();
    let names: Vec<&str> = graph["nodes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Document", "html", "body", "p", "id=\"demo\"", "\"hi\""]);
    assert_eq!(graph["edges"][0], json!({ "source": 0, "target": 1 }));

    let scene: Value = server.get("/api/instances/editor-1/scene").await.json();
    assert_eq!(scene["nodes"].as_array().unwrap().len(), 6);
    assert_eq!(scene["links"].as_array().unwrap().len(), 5);

    let svg = server.get("/api/instances/editor-1/svg").await;
    svg.assert_status_ok();
    assert!(svg.text().starts_with("<svg"));
}

#[tokio::test]
async fn hidden_instance_skips_extraction() {
    let server = test_server();
    server
        .put("/api/instances/e")
        .json(&json!({ "source": DEMO, "tree_visible": false }))
        .await
        .assert_status_ok();

    let res = server.post("/api/instances/e/run").await;
    res.assert_json(&json!({ "outcome": "hidden" }));

    let graph: Value = server.get("/api/instances/e/graph").await.json();
    assert_eq!(graph, json!({ "nodes": [], "edges": [] }));
    server
        .get("/api/instances/e/svg")
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let res = server
        .post("/api/instances/e/toggle")
        .json(&json!({ "visible": true }))
        .await;
    res.assert_json(&json!({ "outcome": "rendered", "nodes": 6, "edges": 5 }));
}

#[tokio::test]
async fn script_error_is_reported_in_preview() {
    let server = test_server();
    server
        .put("/api/instances/e")
        .json(&json!({ "source": "<script>throw new Error('boom')</script>" }))
        .await
        .assert_status_ok();

    let res = server.post("/api/instances/e/run").await;
    res.assert_json(&json!({ "outcome": "execution_failed", "message": "Error: boom" }));

    let preview: Value = server.get("/api/instances/e/preview").await.json();
    assert_eq!(preview["status"], "failed");
    assert!(preview["banner"].as_str().unwrap().contains("<strong>Error:</strong>"));
}

#[tokio::test]
async fn deeply_nested_source_fails_the_run_only() {
    let server = test_server();
    server
        .put("/api/instances/e")
        .json(&json!({ "source": "<div>".repeat(3_000) }))
        .await
        .assert_status_ok();

    let res = server.post("/api/instances/e/run").await;
    res.assert_json(&json!({
        "outcome": "execution_failed",
        "message": "document nesting depth 3002 exceeds sandbox limit 512"
    }));
    server.get("/health").await.assert_status_ok();
}

#[tokio::test]
async fn tick_and_drag() {
    let server = test_server();
    put_demo(&server, "e").await;
    server.post("/api/instances/e/run").await.assert_status_ok();

    let res = server
        .post("/api/instances/e/tick")
        .json(&json!({ "steps": 5 }))
        .await;
    res.assert_json(&json!({ "running": true, "ticks": 5 }));

    server
        .post("/api/instances/e/drag")
        .json(&json!({ "phase": "start", "node": 3 }))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .post("/api/instances/e/drag")
        .json(&json!({ "phase": "move", "node": 3, "x": 10.0, "y": 20.0 }))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .post("/api/instances/e/tick")
        .json(&json!({}))
        .await
        .assert_status_ok();

    let graph: Value = server.get("/api/instances/e/graph").await.json();
    assert_eq!(graph["nodes"][3]["x"], 10.0);
    assert_eq!(graph["nodes"][3]["y"], 20.0);

    server
        .post("/api/instances/e/drag")
        .json(&json!({ "phase": "move", "node": 3 }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .post("/api/instances/e/drag")
        .json(&json!({ "phase": "end", "node": 3 }))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .post("/api/instances/e/drag")
        .json(&json!({ "phase": "start", "node": 42 }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn resize_changes_scene_size() {
    let server = test_server();
    put_demo(&server, "e").await;
    server.post("/api/instances/e/run").await.assert_status_ok();

    server
        .post("/api/instances/e/resize")
        .json(&json!({ "width": 1216.0, "height": 600.0 }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let scene: Value = server.get("/api/instances/e/scene").await.json();
    assert_eq!(scene["width"], 1216.0);
    assert_eq!(scene["height"], 600.0);
}

#[tokio::test]
async fn unknown_instance_returns_404() {
    let server = test_server();
    let res = server.post("/api/instances/missing/run").await;
    res.assert_status(StatusCode::NOT_FOUND);
    res.assert_json(&json!({ "error": "unknown instance: missing" }));

    server
        .get("/api/instances/missing/state")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    server
        .delete("/api/instances/missing")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn delete_removes_instance() {
    let server = test_server();
    put_demo(&server, "e").await;
    server
        .delete("/api/instances/e")
        .await
        .assert_status(StatusCode::NO_CONTENT);
    server
        .get("/api/instances/e/graph")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn state_reports_generation() {
    let server = test_server();
    put_demo(&server, "e").await;
    server.post("/api/instances/e/run").await.assert_status_ok();
    server.post("/api/instances/e/run").await.assert_status_ok();

    let state: Value = server.get("/api/instances/e/state").await.json();
    assert_eq!(state["generation"], 2);
    assert_eq!(state["state"], "idle");
    assert_eq!(state["preview"], json!({ "status": "ready", "generation": 2 }));
}

#[tokio::test]
async fn unknown_route_returns_404() {
    let server = test_server();
    server
        .get("/api/nothing")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}
