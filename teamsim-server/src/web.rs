//! HTTP API.
//!
//! JSON endpoints for talking to the team, managing projects and
//! bootstrapping a GitHub repository, plus an optional static web client.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use teamsim_agents::{DEFAULT_SESSION, OrchestrationError, ProjectContext};
use teamsim_github::Outcome;
use tower_http::cors::{Any, CorsLayer};

use crate::db::{Project, StoreError, StoredMessage};
use crate::server::SharedState;

const DEFAULT_REPO_NAME: &str = "ai-team-simulation";
const DEFAULT_MESSAGE_LIMIT: usize = 50;

pub fn router(state: Arc<SharedState>) -> Router {
    let mut app = Router::new()
        .route("/interact", post(interact))
        .route("/api/health", get(api_health))
        .route("/api/projects", get(api_list_projects).post(api_create_project))
        .route("/api/project/{id}/context", get(api_project_context))
        .route("/api/project/{id}/messages", get(api_project_messages))
        .route("/github/init", post(github_init));

    if let Some(ref static_dir) = state.config.static_dir {
        let dir = std::path::PathBuf::from(static_dir);
        if dir.exists() {
            tracing::info!("Serving web client from {}", dir.display());
            let serve = tower_http::services::ServeDir::new(&dir)
                .append_index_html_on_directories(true);
            app = app.fallback_service(serve);
        } else {
            tracing::warn!("Web static dir not found: {}", dir.display());
        }
    }

    // Outermost, so static files get CORS headers too.
    app.with_state(state).layer(
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any),
    )
}

// ── Errors ─────────────────────────────────────────────────────────────

/// `{success: false, error, details?}` with a status code.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    error: String,
    details: Option<String>,
}

impl ApiError {
    fn new(status: StatusCode, error: impl Into<String>) -> Self {
        Self {
            status,
            error: error.into(),
            details: None,
        }
    }

    fn bad_request(error: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, error)
    }

    fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut body = json!({ "success": false, "error": self.error });
        if let Some(details) = self.details {
            body["details"] = Value::String(details);
        }
        (self.status, Json(body)).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::EmptyName => ApiError::bad_request(e.to_string()),
            StoreError::Sqlite(_) => {
                tracing::error!("Database error: {e}");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
            }
        }
    }
}

impl From<OrchestrationError> for ApiError {
    fn from(e: OrchestrationError) -> Self {
        match &e {
            OrchestrationError::StartingAgent { source, .. } => {
                tracing::error!(error = %e, "Interaction failed");
                ApiError::new(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An error occurred while processing your request",
                )
                .with_details(source.user_message())
            }
            _ => ApiError::bad_request(e.to_string()),
        }
    }
}

/// Parses a JSON request body, rejecting other content types and empty
/// bodies.
fn json_body<T: serde::de::DeserializeOwned>(headers: &HeaderMap, body: &Bytes) -> Result<T, ApiError> {
    optional_json_body(headers, body)?.ok_or_else(|| ApiError::bad_request("Request body is empty"))
}

/// Like [`json_body`], but a blank body, `{}` or `null` yields `None`.
fn optional_json_body<T: serde::de::DeserializeOwned>(
    headers: &HeaderMap,
    body: &Bytes,
) -> Result<Option<T>, ApiError> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().to_ascii_lowercase().starts_with("application/json"));
    if !is_json {
        return Err(ApiError::bad_request("Content-Type must be application/json"));
    }
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let value: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))?;
    if value.as_object().is_some_and(|o| o.is_empty()) || value.is_null() {
        return Ok(None);
    }
    serde_json::from_value(value)
        .map(Some)
        .map_err(|e| ApiError::bad_request(format!("Invalid request: {e}")))
}

/// Project ids arrive as JSON numbers or numeric strings.
fn project_id(value: &Value) -> Result<i64, ApiError> {
    let id = match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    id.ok_or_else(|| ApiError::bad_request("Invalid project id"))
}

fn project_context(project: &Project) -> ProjectContext {
    ProjectContext {
        name: project.name.clone(),
        description: project.description.clone(),
        status: project.status.clone(),
        ..Default::default()
    }
}

fn welcome_message(project: &Project) -> String {
    let mut text = format!("Welcome to {}!", project.name);
    if !project.description.trim().is_empty() {
        text.push_str(&format!(" {}", project.description.trim()));
    }
    text.push_str(" The team is ready to help. Pick an agent and describe what you need.");
    text
}

// ── /interact ──────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct InteractRequest {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    agent: Option<String>,
    #[serde(default)]
    project: Option<Value>,
}

#[derive(Serialize)]
struct InteractResponse {
    success: bool,
    response: String,
    agents: Vec<&'static str>,
}

async fn interact(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<InteractResponse>, ApiError> {
    let req: InteractRequest = json_body(&headers, &body)?;
    let message = req.message.unwrap_or_default();
    if message.trim().is_empty() {
        return Err(OrchestrationError::EmptyMessage.into());
    }
    let agent = req.agent.unwrap_or_else(|| "pm".to_string());

    let project = match req.project.as_ref().filter(|v| !v.is_null()) {
        Some(v) => {
            let id = project_id(v)?;
            let project = state
                .with_db(|db| db.get_project(id))?
                .ok_or_else(|| ApiError::bad_request("Project not found"))?;
            Some(project)
        }
        None => None,
    };

    let session_key = project
        .as_ref()
        .map(|p| p.id.to_string())
        .unwrap_or_else(|| DEFAULT_SESSION.to_string());
    let context = project.as_ref().map(project_context);

    let session = state.sessions.session(&session_key);
    let reply = {
        let mut session = session.lock().await;
        state
            .orchestrator
            .handle_message(&mut session, &message, &agent, context.as_ref())
            .await?
    };
    let text = reply.text();

    if let Some(p) = &project {
        let stored = state.with_db(|db| {
            db.insert_message(p.id, "user", &message)?;
            db.insert_message(p.id, "team", &text)
        });
        if let Err(e) = stored {
            tracing::warn!(project = p.id, error = %e, "Failed to store exchange");
        }
    }

    tracing::info!(
        session = %session_key,
        agents = reply.contributions.len(),
        "Interaction complete"
    );
    Ok(Json(InteractResponse {
        success: true,
        response: text,
        agents: reply.roles().into_iter().map(|r| r.key()).collect(),
    }))
}

// ── Projects ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct CreateProject {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

async fn api_list_projects(
    State(state): State<Arc<SharedState>>,
) -> Result<Json<Vec<Project>>, ApiError> {
    Ok(Json(state.with_db(|db| db.list_projects())?))
}

async fn api_create_project(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let req: CreateProject = json_body(&headers, &body)?;
    let name = req.name.unwrap_or_default();
    let description = req.description.unwrap_or_default();
    let project = state.with_db(|db| db.create_project(&name, &description, req.status.as_deref()))?;
    tracing::info!(project = project.id, name = %project.name, "Created project");
    Ok((StatusCode::CREATED, Json(project)))
}

fn find_project(state: &SharedState, id: i64) -> Result<Project, ApiError> {
    state
        .with_db(|db| db.get_project(id))?
        .ok_or_else(|| ApiError::new(StatusCode::NOT_FOUND, "Project not found"))
}

#[derive(Serialize)]
struct ProjectContextResponse {
    success: bool,
    project: Project,
    welcome: String,
}

async fn api_project_context(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<i64>,
) -> Result<Json<ProjectContextResponse>, ApiError> {
    let project = find_project(&state, id)?;
    Ok(Json(ProjectContextResponse {
        success: true,
        welcome: welcome_message(&project),
        project,
    }))
}

#[derive(Deserialize)]
struct MessagesQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct MessagesResponse {
    success: bool,
    messages: Vec<StoredMessage>,
}

async fn api_project_messages(
    State(state): State<Arc<SharedState>>,
    Path(id): Path<i64>,
    Query(q): Query<MessagesQuery>,
) -> Result<Json<MessagesResponse>, ApiError> {
    find_project(&state, id)?;
    let limit = q.limit.unwrap_or(DEFAULT_MESSAGE_LIMIT).min(500);
    let messages = state.with_db(|db| db.get_messages(id, limit))?;
    Ok(Json(MessagesResponse {
        success: true,
        messages,
    }))
}

// ── Health ─────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    github: bool,
}

async fn api_health(State(state): State<Arc<SharedState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        github: state.github.is_some(),
    })
}

// ── GitHub ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Default)]
struct GitHubInitRequest {
    #[serde(default)]
    repo_name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

async fn github_init(
    State(state): State<Arc<SharedState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(github) = state.github.as_ref() else {
        return Err(ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            "GitHub integration is not configured",
        ));
    };
    // Every field has a default, so an empty body is a valid request.
    let req: GitHubInitRequest = optional_json_body(&headers, &body)?.unwrap_or_default();
    let repo_name = req.repo_name.unwrap_or_else(|| DEFAULT_REPO_NAME.to_string());
    let description = req.description.unwrap_or_default();

    let outcome: Outcome<_> = github
        .initialize_repository(&repo_name, &description)
        .await
        .into();
    if let Outcome::Failure(f) = &outcome {
        tracing::warn!(repo = %repo_name, code = f.error_code.as_str(), "GitHub init failed");
    }
    Ok(Json(outcome).into_response())
}
