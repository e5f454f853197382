//! Shared server state and lifecycle.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use teamsim_agents::{LlmClient, MarkerParser, Orchestrator, SessionRoster, TextGenerator};
use teamsim_github::{GitHubClient, GitHubIntegration};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::config::{MEMORY_DB, ServerConfig};
use crate::db::{Db, StoreResult};

/// State shared by every request handler.
pub struct SharedState {
    pub config: ServerConfig,
    pub orchestrator: Orchestrator,
    /// One agent-state bundle per conversation key.
    pub sessions: SessionRoster,
    db: Mutex<Db>,
    /// Present only when a valid GitHub token was configured.
    pub github: Option<GitHubIntegration>,
}

impl SharedState {
    /// Run `f` with the database. The lock is released when `f` returns, so
    /// never call this across an await.
    pub fn with_db<F, R>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&Db) -> StoreResult<R>,
    {
        let db = self.db.lock();
        f(&db)
    }
}

pub struct Server {
    config: ServerConfig,
    generator: Option<Arc<dyn TextGenerator>>,
    github: Option<GitHubIntegration>,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            generator: None,
            github: None,
        }
    }

    /// Create a server with a custom text generator (for testing and offline
    /// demos).
    pub fn with_generator(config: ServerConfig, generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            config,
            generator: Some(generator),
            github: None,
        }
    }

    /// Use an already-connected GitHub integration instead of the token.
    pub fn with_github(mut self, github: GitHubIntegration) -> Self {
        self.github = Some(github);
        self
    }

    async fn build_state(&self) -> Result<Arc<SharedState>> {
        let db = if self.config.db_path == MEMORY_DB {
            Db::open_memory()
        } else {
            tracing::info!("Opening database: {}", self.config.db_path);
            Db::open(&self.config.db_path)
        }
        .context("Failed to open database")?;

        let generator: Arc<dyn TextGenerator> = match &self.generator {
            Some(g) => Arc::clone(g),
            None => {
                if self.config.llm_api_key.trim().is_empty() {
                    anyhow::bail!("An LLM API key is required (--llm-api-key or OPENAI_API_KEY)");
                }
                let client = LlmClient::new(self.config.llm_config())
                    .context("Failed to build LLM client")?;
                tracing::info!(
                    provider = %client.provider(),
                    model = client.model(),
                    "Using hosted model"
                );
                Arc::new(client)
            }
        };

        let github = match (&self.github, &self.config.github_token) {
            (Some(g), _) => Some(g.clone()),
            (None, Some(token)) if !token.trim().is_empty() => self.connect_github(token).await,
            _ => {
                tracing::info!("No GitHub token configured, GitHub routes disabled");
                None
            }
        };

        let parser = MarkerParser::new(!self.config.no_legacy_markers);
        Ok(Arc::new(SharedState {
            config: self.config.clone(),
            orchestrator: Orchestrator::new(generator, parser),
            sessions: SessionRoster::new(),
            db: Mutex::new(db),
            github,
        }))
    }

    async fn connect_github(&self, token: &str) -> Option<GitHubIntegration> {
        let client = match GitHubClient::new(token, self.config.github_api_url.as_str()) {
            Ok(c) => c,
            Err(e) => {
                tracing::warn!(error = %e, "GitHub client setup failed, GitHub routes disabled");
                return None;
            }
        };
        match GitHubIntegration::connect(client).await {
            Ok(g) => Some(g),
            Err(e) => {
                tracing::warn!(
                    code = e.code().as_str(),
                    error = %e,
                    "GitHub token rejected, GitHub routes disabled"
                );
                None
            }
        }
    }

    /// Serve until the listener fails.
    pub async fn run(self) -> Result<()> {
        let (addr, handle) = self.start().await?;
        tracing::info!("teamsim ready on http://{addr}");
        handle.await.context("HTTP server task panicked")?
    }

    /// Start the server and return the bound address + task handle (for testing).
    pub async fn start(self) -> Result<(SocketAddr, JoinHandle<Result<()>>)> {
        let state = self.build_state().await?;
        let listener = TcpListener::bind(&self.config.web_addr)
            .await
            .with_context(|| format!("binding {}", self.config.web_addr))?;
        let addr = listener.local_addr()?;
        tracing::info!("HTTP listener on {addr}");

        let router = crate::web::router(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, router).await?;
            Ok(())
        });
        Ok((addr, handle))
    }
}
