//! Repository bootstrap and multi-file commits for the token's owner.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::Serialize;

use crate::client::{GitHubClient, Repository, TreeEntry};
use crate::error::{ErrorCode, GitHubError};
use crate::files::ProjectFile;

/// Blobs above this size are rejected by the git data API.
pub const MAX_BLOB_BYTES: u64 = 100 * 1024 * 1024;

pub const DEFAULT_DESCRIPTION: &str = "AI team simulation powered by LLM agents";

const BRANCHES: [&str; 2] = ["main", "master"];

#[derive(Debug, Clone, Serialize)]
pub struct RepoReport {
    pub success: bool,
    pub message: String,
    pub repo_url: String,
    pub clone_url: String,
    pub repo_info: Repository,
}

impl RepoReport {
    fn new(message: impl Into<String>, repo: Repository) -> Self {
        Self {
            success: true,
            message: message.into(),
            repo_url: repo.html_url.clone(),
            clone_url: repo.clone_url.clone(),
            repo_info: repo,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommitReport {
    pub success: bool,
    pub message: String,
    pub commit_sha: String,
    pub branch: String,
    pub processed_files: Vec<String>,
    pub skipped_files: Vec<SkippedFile>,
}

/// Error body reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct Failure {
    pub success: bool,
    pub error: String,
    pub error_code: ErrorCode,
}

impl From<&GitHubError> for Failure {
    fn from(e: &GitHubError) -> Self {
        Self {
            success: false,
            error: e.user_message(),
            error_code: e.code(),
        }
    }
}

/// Either a report or a [`Failure`], serialized flat.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Outcome<T> {
    Success(T),
    Failure(Failure),
}

impl<T> From<Result<T, GitHubError>> for Outcome<T> {
    fn from(r: Result<T, GitHubError>) -> Self {
        match r {
            Ok(v) => Outcome::Success(v),
            Err(e) => Outcome::Failure(Failure::from(&e)),
        }
    }
}

/// GitHub operations scoped to the user owning the token.
#[derive(Clone)]
pub struct GitHubIntegration {
    client: GitHubClient,
    owner: String,
}

impl GitHubIntegration {
    /// Validates the token by fetching the authenticated user.
    pub async fn connect(client: GitHubClient) -> Result<Self, GitHubError> {
        let user = client.authenticated_user().await?;
        tracing::info!(owner = %user.login, "GitHub token validated");
        Ok(Self {
            client,
            owner: user.login,
        })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub async fn get_repository(&self, name: &str) -> Result<RepoReport, GitHubError> {
        let repo = self.client.get_repo(&self.owner, name).await?;
        Ok(RepoReport::new("Repository found", repo))
    }

    pub async fn create_repository(
        &self,
        name: &str,
        description: &str,
        private: bool,
    ) -> Result<RepoReport, GitHubError> {
        let name = valid_name(name)?;
        let description = match description.trim() {
            "" => DEFAULT_DESCRIPTION,
            d => d,
        };
        let repo = self.client.create_repo(name, description, private).await?;
        tracing::info!(repo = %repo.full_name, "Created repository");
        Ok(RepoReport::new(format!("Repository '{name}' created successfully"), repo))
    }

    /// Reuses the repository if it exists, otherwise creates it publicly.
    pub async fn initialize_repository(
        &self,
        name: &str,
        description: &str,
    ) -> Result<RepoReport, GitHubError> {
        let name = valid_name(name)?;
        match self.client.get_repo(&self.owner, name).await {
            Ok(repo) => Ok(RepoReport::new("Using existing repository", repo)),
            Err(e) if e.code() == ErrorCode::NotFound => {
                self.create_repository(name, description, false).await
            }
            Err(e) => Err(e),
        }
    }

    /// Commits `files` (relative to `root`) as one commit on main, or master
    /// when main does not exist.
    ///
    /// Missing, oversized and whitespace-only files are skipped and reported,
    /// as are files whose blob upload fails. If nothing is left the call fails
    /// with [`GitHubError::NoFiles`].
    pub async fn commit_files(
        &self,
        repo_name: &str,
        root: &Path,
        files: &[ProjectFile],
        message: &str,
    ) -> Result<CommitReport, GitHubError> {
        let repo = valid_name(repo_name)?;
        // Refs of a missing repo are 404 too; report the repo, not the branch.
        self.client.get_repo(&self.owner, repo).await?;

        let mut contents = Vec::new();
        let mut skipped = Vec::new();
        for file in files {
            match read_for_commit(root, &file.path).await {
                Ok(bytes) => contents.push((file.path.clone(), bytes)),
                Err(reason) => {
                    tracing::debug!(path = %file.path, %reason, "Skipping file");
                    skipped.push(SkippedFile {
                        path: file.path.clone(),
                        reason,
                    });
                }
            }
        }
        if contents.is_empty() {
            return Err(GitHubError::NoFiles);
        }

        let (branch, head) = self.resolve_branch(repo).await?;
        let base = self.client.get_commit(&self.owner, repo, &head).await?;

        let mut entries = Vec::with_capacity(contents.len());
        let mut processed = Vec::with_capacity(contents.len());
        for (path, bytes) in contents {
            match self
                .client
                .create_blob(&self.owner, repo, &BASE64.encode(&bytes))
                .await
            {
                Ok(blob) => {
                    entries.push(TreeEntry::blob(path.clone(), blob.sha));
                    processed.push(path);
                }
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Blob upload failed, skipping file");
                    skipped.push(SkippedFile {
                        path,
                        reason: e.user_message(),
                    });
                }
            }
        }
        if entries.is_empty() {
            return Err(GitHubError::NoFiles);
        }

        let tree = self
            .client
            .create_tree(&self.owner, repo, &base.tree.sha, &entries)
            .await?;
        let commit = self
            .client
            .create_commit(&self.owner, repo, message, &tree.sha, &[head])
            .await?;
        self.client
            .update_branch_ref(&self.owner, repo, branch, &commit.sha)
            .await?;

        tracing::info!(
            repo,
            branch,
            commit = %commit.sha,
            files = processed.len(),
            skipped = skipped.len(),
            "Committed files"
        );
        Ok(CommitReport {
            success: true,
            message: format!("Successfully committed {} files", processed.len()),
            commit_sha: commit.sha,
            branch: branch.to_string(),
            processed_files: processed,
            skipped_files: skipped,
        })
    }

    async fn resolve_branch(&self, repo: &str) -> Result<(&'static str, String), GitHubError> {
        for branch in BRANCHES {
            match self.client.get_branch_ref(&self.owner, repo, branch).await {
                Ok(r) => return Ok((branch, r.object.sha)),
                Err(e) if e.code() == ErrorCode::NotFound => continue,
                Err(e) => return Err(e),
            }
        }
        Err(GitHubError::BranchNotFound)
    }
}

fn valid_name(name: &str) -> Result<&str, GitHubError> {
    let name = name.trim();
    if name.is_empty() {
        Err(GitHubError::InvalidName)
    } else {
        Ok(name)
    }
}

async fn read_for_commit(root: &Path, rel: &str) -> Result<Vec<u8>, String> {
    let path = root.join(rel);
    let meta = tokio::fs::metadata(&path)
        .await
        .map_err(|_| "file does not exist".to_string())?;
    if !meta.is_file() {
        return Err("not a regular file".into());
    }
    if meta.len() > MAX_BLOB_BYTES {
        return Err(format!("file too large ({} bytes)", meta.len()));
    }
    let bytes = tokio::fs::read(&path).await.map_err(|e| e.to_string())?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Err("empty file".into());
    }
    Ok(bytes)
}
