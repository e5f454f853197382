//! Batched push of a project tree into a repository.

use std::path::Path;
use std::time::Duration;

use crate::files::ProjectFile;
use crate::integration::GitHubIntegration;

pub const DEFAULT_BATCH_SIZE: usize = 10;
pub const DEFAULT_BATCH_PAUSE: Duration = Duration::from_secs(2);
pub const SINGLE_COMMIT_MESSAGE: &str = "Initial commit: Add all project files";

#[derive(Debug, Clone)]
pub struct PushOptions {
    pub batch_size: usize,
    /// Wait between batches, to stay clear of secondary rate limits.
    pub pause: Duration,
    pub single_commit: bool,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            pause: DEFAULT_BATCH_PAUSE,
            single_commit: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResult {
    Committed { sha: String, files: usize },
    Failed { error: String },
}

#[derive(Debug, Clone, Default)]
pub struct PushSummary {
    /// One entry per batch, in order.
    pub batches: Vec<BatchResult>,
}

impl PushSummary {
    pub fn committed_files(&self) -> usize {
        self.batches
            .iter()
            .map(|b| match b {
                BatchResult::Committed { files, .. } => *files,
                BatchResult::Failed { .. } => 0,
            })
            .sum()
    }

    pub fn failed_batches(&self) -> usize {
        self.batches
            .iter()
            .filter(|b| matches!(b, BatchResult::Failed { .. }))
            .count()
    }

    /// True when at least one batch landed.
    pub fn any_committed(&self) -> bool {
        self.committed_files() > 0
    }
}

pub fn batch_message(index: usize, total: usize) -> String {
    format!("Update project files (batch {index}/{total})")
}

/// Commits `files` in batches. A failed batch is recorded and the push
/// continues with the next one.
pub async fn push_files(
    github: &GitHubIntegration,
    repo: &str,
    root: &Path,
    files: &[ProjectFile],
    options: &PushOptions,
) -> PushSummary {
    let mut summary = PushSummary::default();
    if files.is_empty() {
        return summary;
    }

    if options.single_commit {
        let result = github
            .commit_files(repo, root, files, SINGLE_COMMIT_MESSAGE)
            .await;
        summary.batches.push(batch_result(result));
        return summary;
    }

    let size = options.batch_size.max(1);
    let total = files.len().div_ceil(size);
    for (i, chunk) in files.chunks(size).enumerate() {
        let index = i + 1;
        let message = batch_message(index, total);
        tracing::info!(batch = index, total, files = chunk.len(), "Pushing batch");
        let result = github.commit_files(repo, root, chunk, &message).await;
        if let Err(e) = &result {
            tracing::warn!(batch = index, error = %e, "Batch failed");
        }
        summary.batches.push(batch_result(result));
        if index < total && !options.pause.is_zero() {
            tokio::time::sleep(options.pause).await;
        }
    }
    summary
}

fn batch_result(
    result: Result<crate::integration::CommitReport, crate::error::GitHubError>,
) -> BatchResult {
    match result {
        Ok(report) => BatchResult::Committed {
            sha: report.commit_sha,
            files: report.processed_files.len(),
        },
        Err(e) => BatchResult::Failed {
            error: e.user_message(),
        },
    }
}
