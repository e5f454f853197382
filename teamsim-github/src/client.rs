//! Thin typed wrapper over the GitHub REST endpoints we use.
//!
//! Every call goes through [`RetryPolicy::run`], so rate limits and 5xx
//! responses are retried while client errors surface immediately.

use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, HeaderMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::GitHubError;
use crate::retry::RetryPolicy;

pub const DEFAULT_API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = "teamsim-github";
const API_VERSION: &str = "2022-11-28";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub html_url: String,
    pub clone_url: String,
    #[serde(default)]
    pub ssh_url: Option<String>,
    #[serde(default)]
    pub default_branch: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ShaRef {
    pub sha: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitRef {
    #[serde(rename = "ref")]
    pub name: String,
    pub object: ShaRef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitCommit {
    pub sha: String,
    pub tree: ShaRef,
}

#[derive(Debug, Clone, Serialize)]
pub struct TreeEntry {
    pub path: String,
    pub mode: &'static str,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub sha: String,
}

impl TreeEntry {
    pub fn blob(path: String, sha: String) -> Self {
        Self {
            path,
            mode: "100644",
            kind: "blob",
            sha,
        }
    }
}

#[derive(Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    retry: RetryPolicy,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, api_url: impl Into<String>) -> Result<Self, GitHubError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The user owning the token. Fails with 401 for a bad token.
    pub async fn authenticated_user(&self) -> Result<User, GitHubError> {
        self.send(Method::GET, "/user", None).await
    }

    pub async fn get_repo(&self, owner: &str, name: &str) -> Result<Repository, GitHubError> {
        self.send(Method::GET, &format!("/repos/{owner}/{name}"), None).await
    }

    /// Creates a repository for the authenticated user, with an initial commit
    /// so the default branch exists.
    pub async fn create_repo(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> Result<Repository, GitHubError> {
        let body = json!({
            "name": name,
            "description": description,
            "private": private,
            "auto_init": true,
            "has_issues": true,
            "has_wiki": true,
        });
        self.send(Method::POST, "/user/repos", Some(&body)).await
    }

    pub async fn get_branch_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
    ) -> Result<GitRef, GitHubError> {
        let path = format!("/repos/{owner}/{repo}/git/ref/heads/{branch}");
        self.send(Method::GET, &path, None).await
    }

    pub async fn get_commit(&self, owner: &str, repo: &str, sha: &str) -> Result<GitCommit, GitHubError> {
        let path = format!("/repos/{owner}/{repo}/git/commits/{sha}");
        self.send(Method::GET, &path, None).await
    }

    pub async fn create_blob(
        &self,
        owner: &str,
        repo: &str,
        content_base64: &str,
    ) -> Result<ShaRef, GitHubError> {
        let body = json!({ "content": content_base64, "encoding": "base64" });
        let path = format!("/repos/{owner}/{repo}/git/blobs");
        self.send(Method::POST, &path, Some(&body)).await
    }

    pub async fn create_tree(
        &self,
        owner: &str,
        repo: &str,
        base_tree: &str,
        entries: &[TreeEntry],
    ) -> Result<ShaRef, GitHubError> {
        let body = json!({ "base_tree": base_tree, "tree": entries });
        let path = format!("/repos/{owner}/{repo}/git/trees");
        self.send(Method::POST, &path, Some(&body)).await
    }

    pub async fn create_commit(
        &self,
        owner: &str,
        repo: &str,
        message: &str,
        tree: &str,
        parents: &[String],
    ) -> Result<GitCommit, GitHubError> {
        let body = json!({ "message": message, "tree": tree, "parents": parents });
        let path = format!("/repos/{owner}/{repo}/git/commits");
        self.send(Method::POST, &path, Some(&body)).await
    }

    pub async fn update_branch_ref(
        &self,
        owner: &str,
        repo: &str,
        branch: &str,
        sha: &str,
    ) -> Result<GitRef, GitHubError> {
        let body = json!({ "sha": sha, "force": false });
        let path = format!("/repos/{owner}/{repo}/git/refs/heads/{branch}");
        self.send(Method::PATCH, &path, Some(&body)).await
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T, GitHubError> {
        let url = format!("{}{}", self.api_url, path);
        let url = url.as_str();
        let what = format!("{method} {path}");
        self.retry
            .run(&what, move || self.send_once(method.clone(), url, body))
            .await
    }

    async fn send_once<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
    ) -> Result<T, GitHubError> {
        let mut req = self
            .http
            .request(method, url)
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let headers = resp.headers().clone();
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(
                status.as_u16(),
                &headers,
                &text,
                chrono::Utc::now().timestamp(),
            ));
        }
        resp.json::<T>()
            .await
            .map_err(|e| GitHubError::Decode(e.to_string()))
    }
}

/// Builds the error for a non-2xx response. `now` is unix seconds, used to
/// turn `x-ratelimit-reset` into a wait.
pub(crate) fn status_error(status: u16, headers: &HeaderMap, body: &str, now: i64) -> GitHubError {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string());

    let exhausted = header("x-ratelimit-remaining") == Some("0");
    let rate_limited = status == 429
        || (status == 403 && (exhausted || message.to_lowercase().contains("rate limit")));

    let retry_after = header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .or_else(|| {
            if !exhausted {
                return None;
            }
            let reset = header("x-ratelimit-reset")?.trim().parse::<i64>().ok()?;
            Some(Duration::from_secs((reset - now).max(0) as u64))
        });

    GitHubError::Status {
        status,
        message,
        rate_limited,
        retry_after,
    }
}
