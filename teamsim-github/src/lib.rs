//! teamsim-github: push a simulated team's project into a GitHub repository.
//!
//! [`GitHubIntegration`] validates a token, finds or creates a repository
//! and commits files through the git data API. [`push::push_files`] splits
//! large trees into batches.

pub mod client;
pub mod error;
pub mod files;
pub mod integration;
pub mod push;
pub mod retry;

pub use client::{DEFAULT_API_URL, GitHubClient, Repository};
pub use error::{ErrorCode, GitHubError};
pub use files::{MAX_PUSH_FILE_BYTES, ProjectFile, collect_project_files};
pub use integration::{CommitReport, Failure, GitHubIntegration, Outcome, RepoReport};
pub use push::{PushOptions, PushSummary, push_files};
pub use retry::RetryPolicy;
