use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};
use typed_builder::TypedBuilder;

use bountyscope_common::GitHubRepo;
use github_client::{GitHubError, IssueItem, RepoSearch};

use crate::code_host::{repo_from_item, CodeHost};
use crate::resilience::{RequestPolicy, RetryError};

const BOUNTY_CLAUSE: &str = r#""bug bounty" OR "bounty program" OR "security bounty""#;

/// The API's page-size ceiling.
const MAX_PER_PAGE: usize = 100;

/// Search never serves results past the first thousand.
pub const MAX_SEARCH_RESULTS: usize = 1_000;

const ISSUES_PER_TERM: u32 = 20;

pub const DEFAULT_ISSUE_TERMS: [&str; 3] = ["bug", "vulnerability", "security"];

#[derive(Debug, Clone, TypedBuilder)]
pub struct RepoSearchOptions {
    #[builder(default = "solidity".to_string(), setter(into))]
    pub language: String,
    #[builder(default = 10)]
    pub min_stars: u32,
    #[builder(default = 50)]
    pub max_results: usize,
    #[builder(default = false)]
    pub has_bounty: bool,
}

impl Default for RepoSearchOptions {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Search query text: the caller's terms plus language, stars and
/// (optionally) bounty-phrase qualifiers.
pub fn build_query(query: &str, options: &RepoSearchOptions) -> String {
    let mut q = format!("{} language:{}", query.trim(), options.language);
    if options.min_stars > 0 {
        q.push_str(&format!(" stars:>={}", options.min_stars));
    }
    if options.has_bounty {
        q.push(' ');
        q.push_str(BOUNTY_CLAUSE);
    }
    q
}

/// Repository and issue search over a [`CodeHost`].
pub struct RepoScanner {
    host: Arc<dyn CodeHost>,
    policy: RequestPolicy,
}

impl RepoScanner {
    pub fn new(host: Arc<dyn CodeHost>, policy: RequestPolicy) -> Self {
        Self { host, policy }
    }

    /// Repositories for `query`, most-starred first, up to
    /// `options.max_results` (at most [`MAX_SEARCH_RESULTS`]). A failure on the
    /// first page propagates; a later page failing ends the search with what
    /// was already collected.
    pub async fn search(
        &self,
        query: &str,
        options: &RepoSearchOptions,
    ) -> Result<Vec<GitHubRepo>, RetryError<GitHubError>> {
        let q = build_query(query, options);
        let max_results = options.max_results.min(MAX_SEARCH_RESULTS);
        let per_page = max_results.clamp(1, MAX_PER_PAGE);
        let mut repos = Vec::new();
        let mut page = 1;

        while repos.len() < max_results {
            if self.policy.is_cancelled() {
                if page == 1 {
                    return Err(RetryError::Cancelled);
                }
                break;
            }
            let search = RepoSearch::new(q.clone()).per_page(per_page as u32).page(page);
            let result = match self
                .policy
                .call_if(|| self.host.search_repositories(&search), GitHubError::is_transient)
                .await
            {
                Ok(result) => result,
                Err(e) if page > 1 => {
                    warn!(
                        query = %q,
                        page,
                        collected = repos.len(),
                        error = %e,
                        "Repository search page failed, keeping earlier pages"
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            let received = result.items.len();
            let remaining = max_results - repos.len();
            repos.extend(result.items.into_iter().take(remaining).map(repo_from_item));

            if received < per_page {
                break;
            }
            page += 1;
        }

        info!(query = %q, found = repos.len(), "Repository search complete");
        Ok(repos)
    }

    /// [`RepoScanner::search`] with failures logged and reported as no results.
    pub async fn find_smart_contract_repos(
        &self,
        query: &str,
        options: &RepoSearchOptions,
    ) -> Vec<GitHubRepo> {
        match self.search(query, options).await {
            Ok(repos) => repos,
            Err(e) => {
                warn!(query, error = %e, "Repository search failed");
                Vec::new()
            }
        }
    }

    /// Open and closed issues matching any of `terms`, one entry per issue
    /// number. A failing term is logged and skipped.
    pub async fn repo_issues(&self, repo: &GitHubRepo, terms: &[&str]) -> Vec<IssueItem> {
        let terms: Vec<&str> = if terms.is_empty() {
            DEFAULT_ISSUE_TERMS.to_vec()
        } else {
            terms.to_vec()
        };

        let mut seen = HashSet::new();
        let mut issues = Vec::new();

        for term in terms {
            let query = format!("{term} repo:{} is:issue", repo.full_name);
            let result = self
                .policy
                .call_if(|| self.host.search_issues(&query, ISSUES_PER_TERM), GitHubError::is_transient)
                .await;

            match result {
                Ok(page) => {
                    for issue in page.items {
                        if seen.insert(issue.number) {
                            issues.push(issue);
                        }
                    }
                }
                Err(RetryError::Cancelled) => break,
                Err(e) => warn!(repo = repo.full_name.as_str(), term, error = %e, "Issue search failed"),
            }
        }

        info!(repo = repo.full_name.as_str(), issues = issues.len(), "Issue search complete");
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_carries_all_qualifiers() {
        let options = RepoSearchOptions::builder().min_stars(50).has_bounty(true).build();
        assert_eq!(
            build_query("defi vault", &options),
            r#"defi vault language:solidity stars:>=50 "bug bounty" OR "bounty program" OR "security bounty""#
        );
    }

    #[test]
    fn defaults_match_scanner_conventions() {
        let options = RepoSearchOptions::default();
        assert_eq!(options.language, "solidity");
        assert_eq!(options.min_stars, 10);
        assert_eq!(options.max_results, 50);
        assert!(!options.has_bounty);
        assert_eq!(build_query("amm", &options), "amm language:solidity stars:>=10");
    }
}
