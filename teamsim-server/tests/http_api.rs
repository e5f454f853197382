//! HTTP API acceptance tests against a running server with a scripted model.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use serde_json::{Value, json};
use teamsim_agents::{AgentRole, GenerationError, ScriptedGenerator};
use teamsim_server::config::ServerConfig;
use teamsim_server::server::Server;

fn test_config() -> ServerConfig {
    ServerConfig {
        web_addr: "127.0.0.1:0".to_string(),
        ..Default::default()
    }
}

async fn start_server(generator: &Arc<ScriptedGenerator>, config: ServerConfig) -> String {
    let server = Server::with_generator(config, generator.clone());
    let (addr, _handle) = server.start().await.unwrap();
    format!("http://{addr}")
}

async fn post_json(url: &str, body: Value) -> (StatusCode, Value) {
    let resp = reqwest::Client::new().post(url).json(&body).send().await.unwrap();
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
    (status, resp.json().await.unwrap())
}

async fn get_json(url: &str) -> (StatusCode, Value) {
    let resp = reqwest::get(url).await.unwrap();
    let status = StatusCode::from_u16(resp.status().as_u16()).unwrap();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_reports_ok() {
    let generator = Arc::new(ScriptedGenerator::new());
    let base = start_server(&generator, test_config()).await;
    let (status, body) = get_json(&format!("{base}/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["github"], false);
    assert!(body["version"].is_string());
}

#[tokio::test]
async fn interact_returns_composite_reply() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_reply(AgentRole::Pm, "Scope agreed.\nDeveloper -> Task for Developer [size the API]")
            .with_reply(AgentRole::Dev, "About three days of work."),
    );
    let base = start_server(&generator, test_config()).await;

    let (status, body) = post_json(
        &format!("{base}/interact"),
        json!({"message": "We need a public API"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["agents"], json!(["pm", "dev"]));
    let text = body["response"].as_str().unwrap();
    assert!(text.starts_with("PM: Scope agreed."));
    assert!(text.ends_with("\n\nDEVELOPER: About three days of work."));
}

#[tokio::test]
async fn interact_rejects_bad_input() {
    let generator = Arc::new(ScriptedGenerator::new());
    let base = start_server(&generator, test_config()).await;
    let url = format!("{base}/interact");

    let resp = reqwest::Client::new()
        .post(&url)
        .header("content-type", "text/plain")
        .body("hello")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Content-Type must be application/json");

    let resp = reqwest::Client::new()
        .post(&url)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);

    let (status, body) = post_json(&url, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Request body is empty");

    let (status, body) = post_json(&url, json!({"message": "   ", "agent": "dev"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Message field is required");

    let (status, body) = post_json(&url, json!({"message": "hi", "agent": "architect"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Invalid agent type: architect");

    let (status, body) = post_json(&url, json!({"message": "hi", "project": 999})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Project not found");

    assert!(generator.calls().is_empty());
}

#[tokio::test]
async fn starting_agent_failure_is_500_with_details() {
    let generator = Arc::new(
        ScriptedGenerator::new()
            .with_failure(AgentRole::Tester, GenerationError::RateLimited("429".into())),
    );
    let base = start_server(&generator, test_config()).await;

    let (status, body) = post_json(
        &format!("{base}/interact"),
        json!({"message": "Run the suite", "agent": "tester"}),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "An error occurred while processing your request");
    assert!(body["details"].as_str().unwrap().contains("rate limit"));
}

#[tokio::test]
async fn project_lifecycle() {
    let generator = Arc::new(ScriptedGenerator::new());
    let base = start_server(&generator, test_config()).await;
    let projects = format!("{base}/api/projects");

    let (status, body) = post_json(&projects, json!({"description": "no name"})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Project name is required");

    let (status, created) = post_json(
        &projects,
        json!({"name": "Atlas", "description": "Travel planner"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["status"], "active");
    let id = created["id"].as_i64().unwrap();

    let (_, list) = get_json(&projects).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["name"], "Atlas");

    let (status, ctx) = get_json(&format!("{base}/api/project/{id}/context")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ctx["success"], true);
    assert_eq!(ctx["project"]["description"], "Travel planner");
    assert!(ctx["welcome"].as_str().unwrap().contains("Atlas"));

    let (status, body) = get_json(&format!("{base}/api/project/{}/context", id + 1)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn project_exchanges_are_stored_and_sessions_are_separate() {
    let generator = Arc::new(ScriptedGenerator::new());
    let base = start_server(&generator, test_config()).await;
    let projects = format!("{base}/api/projects");
    let (_, a) = post_json(&projects, json!({"name": "Alpha"})).await;
    let (_, b) = post_json(&projects, json!({"name": "Beta"})).await;
    let (a, b) = (a["id"].as_i64().unwrap(), b["id"].as_i64().unwrap());
    let url = format!("{base}/interact");

    post_json(&url, json!({"message": "alpha kickoff", "agent": "ba", "project": a})).await;
    post_json(&url, json!({"message": "beta kickoff", "agent": "ba", "project": b.to_string()})).await;
    post_json(&url, json!({"message": "alpha follow-up", "agent": "ba", "project": a})).await;

    let calls = generator.calls();
    assert_eq!(calls.len(), 3);
    assert!(calls[0].prompt.contains("Name: Alpha"));
    assert!(!calls[1].prompt.contains("alpha kickoff"));
    assert!(calls[2].prompt.contains("User: alpha kickoff"));
    assert!(!calls[2].prompt.contains("beta kickoff"));

    let (status, body) = get_json(&format!("{base}/api/project/{a}/messages")).await;
    assert_eq!(status, StatusCode::OK);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[0]["speaker"], "user");
    assert_eq!(messages[0]["content"], "alpha kickoff");
    assert_eq!(messages[1]["speaker"], "team");
    assert!(messages[1]["content"].as_str().unwrap().starts_with("BUSINESS ANALYST: "));
}

#[tokio::test]
async fn github_init_unavailable_without_token() {
    let generator = Arc::new(ScriptedGenerator::new());
    let base = start_server(&generator, test_config()).await;
    let (status, body) = post_json(&format!("{base}/github/init"), json!({"repo_name": "x"})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
}

async fn mock_user() -> Json<Value> {
    Json(json!({"login": "octo"}))
}

async fn mock_missing_repo(Path((_, _)): Path<(String, String)>) -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({"message": "Not Found"})))
}

async fn mock_create_repo(Json(body): Json<Value>) -> impl IntoResponse {
    let name = body["name"].as_str().unwrap_or_default().to_string();
    (
        StatusCode::CREATED,
        Json(json!({
            "name": name,
            "full_name": format!("octo/{name}"),
            "description": body["description"],
            "html_url": format!("https://github.com/octo/{name}"),
            "clone_url": format!("https://github.com/octo/{name}.git"),
        })),
    )
}

#[tokio::test]
async fn github_init_creates_default_repository() {
    let app = Router::new()
        .route("/user", get(mock_user))
        .route("/user/repos", post(mock_create_repo))
        .route("/repos/{owner}/{repo}", get(mock_missing_repo));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let github_addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let generator = Arc::new(ScriptedGenerator::new());
    let config = ServerConfig {
        github_token: Some("ghp_test".to_string()),
        github_api_url: format!("http://{github_addr}"),
        ..test_config()
    };
    let base = start_server(&generator, config).await;

    let (_, health) = get_json(&format!("{base}/api/health")).await;
    assert_eq!(health["github"], true);

    let (status, body) = post_json(&format!("{base}/github/init"), json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["repo_url"], "https://github.com/octo/ai-team-simulation");
    assert_eq!(body["repo_info"]["description"], "AI team simulation powered by LLM agents");
}
