//! LlmClient against an in-process mock of the model APIs.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::post;
use teamsim_agents::llm::GenerationRequest;
use teamsim_agents::{AgentRole, GenerationError, LlmClient, LlmConfig, Provider, TextGenerator};

#[derive(Default)]
struct Mock {
    hits: AtomicUsize,
    /// Number of leading requests answered with `fail_status`.
    failures: usize,
    fail_status: u16,
}

async fn chat_completions(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    Json(body): Json<serde_json::Value>,
) -> impl IntoResponse {
    let n = mock.hits.fetch_add(1, Ordering::SeqCst);
    if n < mock.failures {
        let status = StatusCode::from_u16(mock.fail_status).unwrap();
        return (status, Json(serde_json::json!({"error": {"message": "try later"}}))).into_response();
    }
    assert_eq!(headers.get("authorization").unwrap(), "Bearer sk-test");
    assert_eq!(body["model"], "gpt-4");
    let prompt = body["messages"][0]["content"].as_str().unwrap_or_default();
    Json(serde_json::json!({
        "choices": [{ "message": { "role": "assistant", "content": format!("echo: {prompt}") } }]
    }))
    .into_response()
}

async fn messages(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    mock.hits.fetch_add(1, Ordering::SeqCst);
    assert_eq!(headers.get("x-api-key").unwrap(), "sk-test");
    Json(serde_json::json!({
        "content": [
            { "type": "text", "text": "Part one, " },
            { "type": "thinking", "thinking": "hidden" },
            { "type": "text", "text": "part two." }
        ]
    }))
}

async fn start(mock: Arc<Mock>) -> String {
    let app = Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/v1/messages", post(messages))
        .with_state(mock);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client(provider: Provider, base_url: String, max_retries: u32) -> LlmClient {
    let mut config = LlmConfig::new(provider, "sk-test".to_string());
    config.base_url = Some(base_url);
    config.max_retries = max_retries;
    config.initial_backoff = Duration::from_millis(5);
    config.max_backoff = Duration::from_millis(20);
    LlmClient::new(config).unwrap()
}

fn request() -> GenerationRequest {
    GenerationRequest {
        role: AgentRole::Pm,
        prompt: "plan the sprint".to_string(),
        temperature: 0.7,
    }
}

#[tokio::test]
async fn openai_reply_is_extracted() {
    let mock = Arc::new(Mock::default());
    let llm = client(Provider::OpenAi, start(mock.clone()).await, 0);
    let text = llm.generate(&request()).await.unwrap();
    assert_eq!(text, "echo: plan the sprint");
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn rate_limit_is_retried_with_backoff() {
    let mock = Arc::new(Mock {
        failures: 2,
        fail_status: 429,
        ..Default::default()
    });
    let llm = client(Provider::OpenAi, start(mock.clone()).await, 3);
    let text = llm.generate(&request()).await.unwrap();
    assert!(text.starts_with("echo:"));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn retries_are_bounded() {
    let mock = Arc::new(Mock {
        failures: 10,
        fail_status: 503,
        ..Default::default()
    });
    let llm = client(Provider::OpenAi, start(mock.clone()).await, 2);
    let err = llm.generate(&request()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Api { status: 503, .. }));
    assert_eq!(mock.hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn client_errors_are_not_retried() {
    let mock = Arc::new(Mock {
        failures: 10,
        fail_status: 401,
        ..Default::default()
    });
    let llm = client(Provider::OpenAi, start(mock.clone()).await, 3);
    let err = llm.generate(&request()).await.unwrap_err();
    assert_eq!(err, GenerationError::InvalidApiKey);
    assert_eq!(mock.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn anthropic_text_blocks_are_joined() {
    let mock = Arc::new(Mock::default());
    let llm = client(Provider::Anthropic, start(mock.clone()).await, 0);
    let text = llm.generate(&request()).await.unwrap();
    assert_eq!(text, "Part one, part two.");
}
