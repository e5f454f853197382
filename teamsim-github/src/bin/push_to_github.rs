//! Push a project directory to a GitHub repository.
//!
//! Finds or creates the repository for the token's owner, then commits every
//! project file, in batches by default.
//!
//! Usage:
//!   GITHUB_TOKEN=ghp_... cargo run --bin push-to-github -- --repo-name my-project --root .

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use teamsim_github::push::{BatchResult, DEFAULT_BATCH_SIZE};
use teamsim_github::{
    DEFAULT_API_URL, GitHubClient, GitHubIntegration, MAX_PUSH_FILE_BYTES, PushOptions,
    collect_project_files, push_files,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "push-to-github", about = "Push project files to a GitHub repository")]
struct Args {
    /// GitHub personal access token
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    token: String,

    /// Repository to push into (created if missing)
    #[arg(long, default_value = "ai-team-simulation")]
    repo_name: String,

    /// Description used when the repository is created
    #[arg(long, default_value = "AI Team Simulation Project")]
    description: String,

    /// Project root to push
    #[arg(long, default_value = ".")]
    root: PathBuf,

    /// Files per commit
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Seconds to wait between batches
    #[arg(long, default_value = "2")]
    pause_secs: u64,

    /// Push everything as one commit
    #[arg(long)]
    single_commit: bool,

    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("teamsim_github=warn".parse()?),
        )
        .init();

    let args = Args::parse();

    let files = collect_project_files(&args.root, MAX_PUSH_FILE_BYTES)
        .with_context(|| format!("reading {}", args.root.display()))?;
    println!("Found {} files to push from {}", files.len(), args.root.display());
    if files.is_empty() {
        println!("Nothing to push");
        return Ok(ExitCode::FAILURE);
    }

    let client = GitHubClient::new(args.token, args.api_url)?;
    let github = match GitHubIntegration::connect(client).await {
        Ok(g) => g,
        Err(e) => {
            println!("GitHub authentication failed: {}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("Authenticated as {}", github.owner());

    let repo = match github
        .initialize_repository(&args.repo_name, &args.description)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            println!("Failed to initialize repository: {}", e.user_message());
            return Ok(ExitCode::FAILURE);
        }
    };
    println!("{}: {}", repo.message, repo.repo_url);

    let options = PushOptions {
        batch_size: args.batch_size,
        pause: Duration::from_secs(args.pause_secs),
        single_commit: args.single_commit,
    };
    let summary = push_files(&github, &args.repo_name, &args.root, &files, &options).await;

    let total = summary.batches.len();
    for (i, batch) in summary.batches.iter().enumerate() {
        match batch {
            BatchResult::Committed { sha, files } => {
                println!("  batch {}/{total}: committed {files} files ({sha})", i + 1)
            }
            BatchResult::Failed { error } => println!("  batch {}/{total}: failed: {error}", i + 1),
        }
    }

    if summary.any_committed() {
        println!(
            "Pushed {} files to {} ({} failed batches)",
            summary.committed_files(),
            repo.repo_url,
            summary.failed_batches()
        );
        Ok(ExitCode::SUCCESS)
    } else {
        println!("No files were pushed");
        Ok(ExitCode::FAILURE)
    }
}
