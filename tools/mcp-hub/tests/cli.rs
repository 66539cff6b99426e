use assert_cmd::Command;
use axum::{Json, Router, routing::post};
use serde_json::{Value, json};
use std::fs;
use tempfile::tempdir;
use tokio::net::TcpListener;

fn discover_cmd() -> Command {
    let mut cmd = Command::cargo_bin("mcp-hub-discover").expect("binary built");
    let config_dir = tempdir().expect("tempdir");
    cmd.env("APP_CONFIG_DIR", config_dir.path().join("missing"))
        .env_remove("MCP_HUB_BACKEND_URL")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_the_review_flags() {
    let output = discover_cmd().arg("--help").assert().success();
    let stdout = String::from_utf8_lossy(&output.get_output().stdout).to_string();
    assert!(stdout.contains("--take-discovered"));
    assert!(stdout.contains("--existing"));
}

#[test]
fn stdio_without_command_prints_existing_tools() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tools.json");
    fs::write(
        &path,
        json!([{"name": "forecast", "description": "Weather", "parameters": []}]).to_string(),
    )
    .unwrap();

    let output = discover_cmd()
        .args(["--transport", "stdio", "--existing"])
        .arg(&path)
        .assert()
        .success();

    let tools: Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(tools[0]["name"], "forecast");
    let stderr = String::from_utf8_lossy(&output.get_output().stderr).to_string();
    assert!(stderr.contains("invalid_descriptor"), "{stderr}");
}

#[test]
fn create_mode_without_target_prints_empty_list() {
    let output = discover_cmd()
        .args(["--transport", "sse"])
        .assert()
        .success();
    let tools: Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(tools, json!([]));
}

#[test]
fn malformed_env_flag_is_rejected() {
    discover_cmd().args(["--env", "NOEQUALS"]).assert().failure();
}

#[test]
fn save_rewrites_an_existing_record_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("server.json");
    fs::write(
        &path,
        json!({
            "id": "srv-9",
            "name": "weather",
            "status": "approved",
            "tools": [{"name": "forecast", "description": "", "parameters": []}]
        })
        .to_string(),
    )
    .unwrap();

    discover_cmd()
        .args(["--existing"])
        .arg(&path)
        .args(["--tags", "geo, weather", "--save"])
        .assert()
        .success();

    let stored: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(stored["id"], "srv-9");
    assert_eq!(stored["status"], "approved");
    assert_eq!(stored["tags"], json!(["geo", "weather"]));
    assert_eq!(stored["tools"][0]["name"], "forecast");
}

#[tokio::test(flavor = "multi_thread")]
async fn take_discovered_resolves_conflicts() {
    let app = Router::new().route(
        "/api/mcp/discover",
        post(|| async {
            Json(json!({
                "success": true,
                "tools": [
                    {"name": "forecast", "description": "new", "inputSchema": {
                        "properties": {"city": {"type": "string"}}, "required": ["city"]
                    }},
                    {"name": "radar"}
                ]
            }))
        }),
    );
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let dir = tempdir().unwrap();
    let path = dir.path().join("tools.json");
    fs::write(
        &path,
        json!([
            {"name": "forecast", "description": "old", "parameters": []},
            {"name": "alerts", "description": "", "parameters": []}
        ])
        .to_string(),
    )
    .unwrap();

    let output = tokio::task::spawn_blocking(move || {
        discover_cmd()
            .args(["--backend-url", &format!("http://{addr}")])
            .args(["--transport", "sse", "--url", "http://localhost:3001/sse"])
            .arg("--existing")
            .arg(&path)
            .args(["--take-discovered", "forecast"])
            .assert()
            .success()
            .get_output()
            .clone()
    })
    .await
    .unwrap();

    let tools: Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = tools
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["alerts", "forecast", "radar"]);
    assert_eq!(tools[1]["description"], "new");
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    assert!(stderr.contains("keeping discovered"), "{stderr}");
}
