use thiserror::Error;

pub type Result<T> = std::result::Result<T, GitHubError>;

#[derive(Debug, Error)]
pub enum GitHubError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited (status {status}, resets at {reset:?})")]
    RateLimited { status: u16, reset: Option<u64> },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Content decode error: {0}")]
    Decode(String),
}

impl GitHubError {
    /// Whether a retry could plausibly succeed. Validation failures (422),
    /// auth failures and missing resources are the caller's problem.
    pub fn is_transient(&self) -> bool {
        match self {
            GitHubError::Network(_) | GitHubError::RateLimited { .. } => true,
            GitHubError::Api { status, .. } => *status >= 500,
            GitHubError::NotFound(_) | GitHubError::Parse(_) | GitHubError::Decode(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GitHubError::NotFound(_))
    }
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        GitHubError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for GitHubError {
    fn from(err: serde_json::Error) -> Self {
        GitHubError::Parse(err.to_string())
    }
}
