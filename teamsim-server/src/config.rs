//! Server configuration.

use clap::Parser;
use teamsim_agents::{LlmConfig, Provider};
use teamsim_github::DEFAULT_API_URL;

/// Database path that selects an in-memory store.
pub const MEMORY_DB: &str = ":memory:";

#[derive(Parser, Debug, Clone)]
#[command(name = "teamsim-server", about = "Simulated software team over HTTP")]
pub struct ServerConfig {
    /// Address for the HTTP API
    #[arg(long, env = "TEAMSIM_WEB_ADDR", default_value = "0.0.0.0:5000")]
    pub web_addr: String,

    /// SQLite database path (`:memory:` for a throwaway store)
    #[arg(long, env = "TEAMSIM_DB_PATH", default_value = "teamsim.db")]
    pub db_path: String,

    /// Directory of static web client files, served as the fallback route
    #[arg(long, env = "TEAMSIM_STATIC_DIR")]
    pub static_dir: Option<String>,

    /// Hosted model API: openai or anthropic
    #[arg(long, env = "TEAMSIM_LLM_PROVIDER", default_value = "openai")]
    pub llm_provider: Provider,

    /// Model name (defaults to gpt-4 for openai)
    #[arg(long, env = "TEAMSIM_MODEL")]
    pub model: Option<String>,

    /// API key for the model provider
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, default_value = "")]
    pub llm_api_key: String,

    /// Override the provider's base URL
    #[arg(long, env = "TEAMSIM_LLM_BASE_URL")]
    pub llm_base_url: Option<String>,

    /// Per-request timeout for model calls (seconds)
    #[arg(long, default_value = "90")]
    pub llm_timeout_secs: u64,

    /// Retries for rate-limited or failed model calls
    #[arg(long, default_value = "3")]
    pub llm_max_retries: u32,

    /// Token limit per model reply
    #[arg(long, default_value = "4096")]
    pub max_tokens: u32,

    /// GitHub token; GitHub routes are disabled without one
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    pub github_api_url: String,

    /// Only accept the `Role -> Task for Role [..]` marker form
    #[arg(long)]
    pub no_legacy_markers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            web_addr: "127.0.0.1:5000".to_string(),
            db_path: MEMORY_DB.to_string(),
            static_dir: None,
            llm_provider: Provider::OpenAi,
            model: None,
            llm_api_key: String::new(),
            llm_base_url: None,
            llm_timeout_secs: 90,
            llm_max_retries: 3,
            max_tokens: 4096,
            github_token: None,
            github_api_url: DEFAULT_API_URL.to_string(),
            no_legacy_markers: false,
        }
    }
}

impl ServerConfig {
    pub fn llm_config(&self) -> LlmConfig {
        let mut llm = LlmConfig::new(self.llm_provider, self.llm_api_key.clone());
        if let Some(model) = &self.model {
            llm.model = model.clone();
        }
        llm.base_url = self.llm_base_url.clone();
        llm.timeout = std::time::Duration::from_secs(self.llm_timeout_secs);
        llm.max_retries = self.llm_max_retries;
        llm.max_tokens = self.max_tokens;
        llm
    }
}
