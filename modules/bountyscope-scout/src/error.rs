use bountyscope_common::BountyError;
use github_client::GitHubError;
use thiserror::Error;

use crate::resilience::RetryError;

/// Failures that escalate out of the scout. Per-source and per-file failures
/// are absorbed and logged where they happen; these are the ones that aren't.
#[derive(Error, Debug)]
pub enum ScoutError {
    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("invalid repository reference {0:?}, expected owner/name")]
    InvalidRepository(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("GitHub request failed: {0}")]
    GitHub(#[from] RetryError<GitHubError>),

    #[error(transparent)]
    Common(#[from] BountyError),

    #[error("run cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ScoutError>;

impl ScoutError {
    /// Page-fetch errors worth another attempt. Bad input and definitive
    /// client errors are not.
    pub fn is_transient(&self) -> bool {
        match self {
            ScoutError::HttpStatus { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            ScoutError::GitHub(RetryError::Failed(e)) => e.is_transient(),
            ScoutError::InvalidUrl(_)
            | ScoutError::InvalidRepository(_)
            | ScoutError::RepositoryNotFound(_)
            | ScoutError::Common(_)
            | ScoutError::Cancelled => false,
            ScoutError::GitHub(_) => false,
        }
    }
}

/// Retry predicate for `anyhow` page-fetch errors: transport failures retry,
/// typed caller-input failures don't.
pub fn is_retryable(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<ScoutError>() {
        Some(scout) => scout.is_transient(),
        None => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_errors_are_not_retried() {
        let not_found = anyhow::Error::new(ScoutError::HttpStatus {
            url: "https://bugcrowd.com/programs".into(),
            status: 404,
        });
        assert!(!is_retryable(&not_found));

        let bad_url = anyhow::Error::new(ScoutError::InvalidUrl("ftp://x".into()));
        assert!(!is_retryable(&bad_url));
    }

    #[test]
    fn server_errors_and_transport_failures_are_retried() {
        let unavailable = anyhow::Error::new(ScoutError::HttpStatus {
            url: "https://code4rena.com/contests".into(),
            status: 503,
        });
        assert!(is_retryable(&unavailable));
        assert!(is_retryable(&anyhow::anyhow!("connection reset")));
    }
}
