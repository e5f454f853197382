//! GitHub failure taxonomy.

use std::time::Duration;

use serde::Serialize;

/// Stable codes reported to API callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    AuthFailed,
    PermissionDenied,
    RateLimited,
    NotFound,
    Conflict,
    InvalidRepo,
    InvalidName,
    BranchNotFound,
    NoFiles,
    ApiError,
    UnexpectedError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::AuthFailed => "AUTH_FAILED",
            ErrorCode::PermissionDenied => "PERMISSION_DENIED",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::InvalidRepo => "INVALID_REPO",
            ErrorCode::InvalidName => "INVALID_NAME",
            ErrorCode::BranchNotFound => "BRANCH_NOT_FOUND",
            ErrorCode::NoFiles => "NO_FILES",
            ErrorCode::ApiError => "API_ERROR",
            ErrorCode::UnexpectedError => "UNEXPECTED_ERROR",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GitHubError {
    #[error("GitHub API returned {status}: {message}")]
    Status {
        status: u16,
        message: String,
        /// Set when the response says the rate limit is exhausted.
        rate_limited: bool,
        /// Server-suggested wait before the next attempt.
        retry_after: Option<Duration>,
    },
    #[error("request to GitHub failed: {0}")]
    Transport(String),
    #[error("could not decode GitHub response: {0}")]
    Decode(String),
    #[error("Repository name cannot be empty")]
    InvalidName,
    #[error("Could not find main or master branch")]
    BranchNotFound,
    #[error("No valid files to commit")]
    NoFiles,
}

impl GitHubError {
    pub fn status(&self) -> Option<u16> {
        match self {
            GitHubError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            GitHubError::Status { rate_limited: true, .. } => ErrorCode::RateLimited,
            GitHubError::Status { status, .. } => match status {
                401 => ErrorCode::AuthFailed,
                403 => ErrorCode::PermissionDenied,
                404 => ErrorCode::NotFound,
                409 => ErrorCode::Conflict,
                422 => ErrorCode::InvalidRepo,
                429 => ErrorCode::RateLimited,
                _ => ErrorCode::ApiError,
            },
            GitHubError::Transport(_) | GitHubError::Decode(_) => ErrorCode::UnexpectedError,
            GitHubError::InvalidName => ErrorCode::InvalidName,
            GitHubError::BranchNotFound => ErrorCode::BranchNotFound,
            GitHubError::NoFiles => ErrorCode::NoFiles,
        }
    }

    /// Rate limits, 5xx and transport failures; never other client errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            GitHubError::Status { status, rate_limited, .. } => {
                *rate_limited || *status == 429 || *status >= 500
            }
            GitHubError::Transport(_) => true,
            _ => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            GitHubError::Status { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Message shown to users alongside the code.
    pub fn user_message(&self) -> String {
        match self.code() {
            ErrorCode::AuthFailed => "Authentication failed. Please check your GitHub token.".into(),
            ErrorCode::PermissionDenied => {
                "Permission denied. Your token might not have the required permissions.".into()
            }
            ErrorCode::RateLimited => "GitHub API rate limit exceeded. Please try again later.".into(),
            ErrorCode::NotFound => "Resource not found on GitHub.".into(),
            ErrorCode::Conflict => format!("GitHub reported a conflict: {self}"),
            ErrorCode::InvalidRepo => "Repository already exists or invalid repository name.".into(),
            ErrorCode::InvalidName | ErrorCode::BranchNotFound | ErrorCode::NoFiles => self.to_string(),
            ErrorCode::ApiError => format!("GitHub API error: {self}"),
            ErrorCode::UnexpectedError => format!("Unexpected error: {self}"),
        }
    }
}

impl From<reqwest::Error> for GitHubError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            GitHubError::Decode(e.to_string())
        } else {
            GitHubError::Transport(e.to_string())
        }
    }
}
