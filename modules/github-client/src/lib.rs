pub mod error;
pub mod types;

pub use error::{GitHubError, Result};
pub use types::{
    CodeItem, IssueItem, Owner, RepoItem, RepoSearch, RepoSort, SearchPage, SortOrder,
};

use std::time::Duration;

use base64::Engine;
use serde::de::DeserializeOwned;
use types::{ContentsPayload, FileContent};

const BASE_URL: &str = "https://api.github.com";

const DEFAULT_USER_AGENT: &str = "bountyscope/0.1 (+research-bot)";

pub struct GitHubClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl GitHubClient {
    pub fn new(token: Option<&str>, user_agent: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent.unwrap_or(DEFAULT_USER_AGENT))
            .build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            token: token.filter(|t| !t.is_empty()).map(String::from),
        })
    }

    /// Point the client at a different API root (GitHub Enterprise, local stubs).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// One page of `/search/repositories`.
    pub async fn search_repositories(&self, search: &RepoSearch) -> Result<SearchPage<RepoItem>> {
        let per_page = search.per_page.to_string();
        let page = search.page.to_string();
        tracing::debug!(query = %search.query, page = search.page, "GitHub repository search");
        self.get_json(
            "/search/repositories",
            &[
                ("q", search.query.as_str()),
                ("sort", search.sort.as_str()),
                ("order", search.order.as_str()),
                ("per_page", per_page.as_str()),
                ("page", page.as_str()),
            ],
        )
        .await
    }

    /// One page of `/search/code`. The query carries qualifiers such as
    /// `extension:sol repo:owner/name`.
    pub async fn search_code(&self, query: &str, per_page: u32) -> Result<SearchPage<CodeItem>> {
        let per_page = per_page.clamp(1, 100).to_string();
        tracing::debug!(query, "GitHub code search");
        self.get_json(
            "/search/code",
            &[("q", query), ("per_page", per_page.as_str())],
        )
        .await
    }

    /// One page of `/search/issues`.
    pub async fn search_issues(&self, query: &str, per_page: u32) -> Result<SearchPage<IssueItem>> {
        let per_page = per_page.clamp(1, 100).to_string();
        tracing::debug!(query, "GitHub issue search");
        self.get_json(
            "/search/issues",
            &[("q", query), ("per_page", per_page.as_str())],
        )
        .await
    }

    /// Repository metadata. A missing repository is `GitHubError::NotFound`.
    pub async fn repository(&self, owner: &str, repo: &str) -> Result<RepoItem> {
        self.get_json(&format!("/repos/{owner}/{repo}"), &[]).await
    }

    /// Decoded text of a file. Returns `Ok(None)` when the path does not exist
    /// or names a directory.
    pub async fn file_content(&self, owner: &str, repo: &str, path: &str) -> Result<Option<String>> {
        let endpoint = format!("/repos/{owner}/{repo}/contents/{}", path.trim_start_matches('/'));
        let payload: ContentsPayload = match self.get_json(&endpoint, &[]).await {
            Ok(payload) => payload,
            Err(GitHubError::NotFound(_)) => return Ok(None),
            Err(e) => return Err(e),
        };

        match payload {
            ContentsPayload::Directory(_) => Ok(None),
            ContentsPayload::File(FileContent { content: None, .. }) => Ok(None),
            ContentsPayload::File(FileContent {
                content: Some(content),
                encoding,
            }) => match encoding.as_deref() {
                Some("base64") | None => decode_content(&content).map(Some),
                Some(other) => Err(GitHubError::Decode(format!("unsupported encoding: {other}"))),
            },
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        let mut req = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", "2022-11-28")
            .query(query);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }

        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let remaining = header_u64(&resp, "x-ratelimit-remaining");
            let reset = header_u64(&resp, "x-ratelimit-reset");
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_failure(status.as_u16(), remaining, reset, endpoint, body));
        }

        let bytes = resp.bytes().await?;
        parse_body(&bytes)
    }
}

/// A success body that doesn't match the expected shape is a parse failure,
/// not a transport one.
pub(crate) fn parse_body<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
}

fn header_u64(resp: &reqwest::Response, name: &str) -> Option<u64> {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Map a non-success response to an error. GitHub signals primary rate limits
/// with 403 and an exhausted `x-ratelimit-remaining`, secondary ones with 429.
fn classify_failure(
    status: u16,
    remaining: Option<u64>,
    reset: Option<u64>,
    endpoint: &str,
    body: String,
) -> GitHubError {
    match status {
        404 => GitHubError::NotFound(endpoint.to_string()),
        429 => GitHubError::RateLimited { status, reset },
        403 if remaining == Some(0) || body.to_lowercase().contains("rate limit") => {
            GitHubError::RateLimited { status, reset }
        }
        _ => GitHubError::Api {
            status,
            message: body,
        },
    }
}

/// GitHub wraps base64 file content at 60 columns.
pub(crate) fn decode_content(raw: &str) -> Result<String> {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| GitHubError::Decode(e.to_string()))?;
    String::from_utf8(bytes).map_err(|e| GitHubError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_wrapped_base64() {
        // "pragma solidity ^0.8.0;\n" split across lines the way the API returns it
        let raw = "cHJhZ21hIHNvbGlkaXR5\nIF4wLjguMDsK\n";
        assert_eq!(decode_content(raw).unwrap(), "pragma solidity ^0.8.0;\n");
    }

    #[test]
    fn rejects_invalid_base64() {
        assert!(matches!(decode_content("%%%"), Err(GitHubError::Decode(_))));
    }

    #[test]
    fn mismatched_success_body_is_a_parse_error() {
        let err = parse_body::<RepoItem>(br#"{"unexpected":true}"#).unwrap_err();
        assert!(matches!(err, GitHubError::Parse(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn well_formed_body_parses() {
        let item: RepoItem = parse_body(
            br#"{"name":"vault","full_name":"acme/vault","owner":{"login":"acme"},
                "description":null,"language":"Solidity","html_url":"https://github.com/acme/vault"}"#,
        )
        .unwrap();
        assert_eq!(item.full_name, "acme/vault");
        assert_eq!(item.stargazers_count, 0);
    }

    #[test]
    fn classifies_missing_resources() {
        let err = classify_failure(404, None, None, "/repos/a/b", String::new());
        assert!(err.is_not_found());
    }

    #[test]
    fn classifies_exhausted_quota_as_rate_limit() {
        let err = classify_failure(403, Some(0), Some(1_700_000_000), "/search/code", String::new());
        assert!(matches!(
            err,
            GitHubError::RateLimited {
                status: 403,
                reset: Some(1_700_000_000)
            }
        ));
        assert!(err.is_transient());
    }

    #[test]
    fn forbidden_without_rate_limit_is_api_error() {
        let err = classify_failure(403, Some(12), None, "/repos/a/b", "Bad credentials".into());
        assert!(matches!(err, GitHubError::Api { status: 403, .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn repo_search_clamps_page_size() {
        let search = RepoSearch::new("smart contract").per_page(500).page(0);
        assert_eq!(search.per_page, 100);
        assert_eq!(search.page, 1);
    }
}
