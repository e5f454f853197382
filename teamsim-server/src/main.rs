use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Use JSON logs in production (TEAMSIM_LOG_JSON=1), human-readable otherwise
    let json_logs = std::env::var("TEAMSIM_LOG_JSON").unwrap_or_default() == "1";
    let filter = EnvFilter::from_default_env()
        .add_directive("teamsim_server=info".parse()?)
        .add_directive("teamsim_agents=info".parse()?)
        .add_directive("teamsim_github=info".parse()?);
    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .init();
    }

    let config = teamsim_server::config::ServerConfig::parse();
    tracing::info!(
        web_addr = %config.web_addr,
        db = %config.db_path,
        provider = %config.llm_provider,
        github = config.github_token.is_some(),
        "Starting teamsim"
    );

    let server = teamsim_server::server::Server::new(config);
    server.run().await
}
