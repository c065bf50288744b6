use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use bountyscope_common::indicators::match_indicators;
use bountyscope_common::{GitHubRepo, SmartContractFile, CONTRACT_EXTENSIONS};
use github_client::GitHubError;

use crate::code_host::{parse_full_name, repo_from_item, CodeHost};
use crate::error::{Result, ScoutError};
use crate::resilience::{RequestPolicy, RetryError};

/// Policy files checked for bounty language, in order. README.md is read last.
pub const BOUNTY_FILES: [&str; 7] = [
    "SECURITY.md",
    "BOUNTY.md",
    "BUG_BOUNTY.md",
    "security.md",
    "bounty.md",
    "bug_bounty.md",
    ".github/SECURITY.md",
];

const README: &str = "README.md";

/// Source label for indicators found in the description and topics.
pub const METADATA_SOURCE: &str = "repository metadata";

/// Code search page-size cap per extension.
const MAX_PER_SEARCH: usize = 30;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BountyCheck {
    pub has_bounty: bool,
    pub indicators: BTreeSet<String>,
    /// Files that contributed indicators, first-seen order.
    pub sources: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepoWalk {
    pub repo: Arc<GitHubRepo>,
    pub bounty: BountyCheck,
    pub files: Vec<SmartContractFile>,
}

/// Reads a repository's policy files and contract sources. Missing or
/// unreadable files are skipped; only repository-level failures escalate.
pub struct RepoContentWalker {
    host: Arc<dyn CodeHost>,
    policy: RequestPolicy,
    max_files: usize,
}

impl RepoContentWalker {
    pub fn new(host: Arc<dyn CodeHost>, policy: RequestPolicy, max_files: usize) -> Self {
        Self {
            host,
            policy,
            max_files,
        }
    }

    pub fn max_files(&self) -> usize {
        self.max_files
    }

    /// Look up "owner/name".
    pub async fn resolve(&self, full_name: &str) -> Result<Arc<GitHubRepo>> {
        let (owner, name) = parse_full_name(full_name)
            .ok_or_else(|| ScoutError::InvalidRepository(full_name.to_string()))?;
        let item = self.fetch_repository(owner, name).await?;
        Ok(Arc::new(repo_from_item(item)))
    }

    /// Resolve, then run both the bounty check and the contract scan.
    pub async fn walk(&self, full_name: &str) -> Result<RepoWalk> {
        let repo = self.resolve(full_name).await?;
        let bounty = self.scan_bounty_files(&repo).await;
        let files = self.collect_contract_files(&repo).await;
        if self.policy.is_cancelled() {
            return Err(ScoutError::Cancelled);
        }

        info!(
            repo = repo.full_name.as_str(),
            has_bounty = bounty.has_bounty,
            files = files.len(),
            "Repository walk complete"
        );
        Ok(RepoWalk { repo, bounty, files })
    }

    pub async fn check_bounty_program(&self, repo: &GitHubRepo) -> Result<BountyCheck> {
        self.fetch_repository(&repo.owner, &repo.name).await?;
        Ok(self.scan_bounty_files(repo).await)
    }

    /// Up to `max_files` contract sources across all contract extensions.
    pub async fn discover_contract_files(&self, repo: &Arc<GitHubRepo>) -> Result<Vec<SmartContractFile>> {
        self.fetch_repository(&repo.owner, &repo.name).await?;
        Ok(self.collect_contract_files(repo).await)
    }

    async fn fetch_repository(&self, owner: &str, name: &str) -> Result<github_client::RepoItem> {
        let full_name = format!("{owner}/{name}");
        self.policy
            .call_if(|| self.host.repository(owner, name), GitHubError::is_transient)
            .await
            .map_err(|e| match e {
                RetryError::Failed(ref inner) if inner.is_not_found() => {
                    ScoutError::RepositoryNotFound(full_name)
                }
                RetryError::Cancelled => ScoutError::Cancelled,
                other => ScoutError::GitHub(other),
            })
    }

    async fn scan_bounty_files(&self, repo: &GitHubRepo) -> BountyCheck {
        let mut check = BountyCheck::default();
        if !repo.bounty_indicators.is_empty() {
            check.indicators.extend(repo.bounty_indicators.iter().cloned());
            check.sources.push(METADATA_SOURCE.to_string());
        }

        for path in BOUNTY_FILES.iter().copied().chain([README]) {
            if self.policy.is_cancelled() {
                break;
            }
            let Some(content) = self.read_file(repo, path).await else {
                continue;
            };
            let found = match_indicators(&content, &[]);
            if found.is_empty() {
                continue;
            }
            debug!(repo = repo.full_name.as_str(), path, indicators = found.len(), "Bounty language found");
            check.indicators.extend(found);
            if !check.sources.iter().any(|s| s == path) {
                check.sources.push(path.to_string());
            }
        }

        check.has_bounty = !check.indicators.is_empty();
        check
    }

    async fn collect_contract_files(&self, repo: &Arc<GitHubRepo>) -> Vec<SmartContractFile> {
        let mut files = Vec::new();
        let mut seen_paths = HashSet::new();

        'extensions: for ext in CONTRACT_EXTENSIONS {
            if files.len() >= self.max_files || self.policy.is_cancelled() {
                break;
            }
            let query = format!("extension:{ext} repo:{}", repo.full_name);
            let per_page = (self.max_files - files.len()).min(MAX_PER_SEARCH) as u32;

            let hits = match self
                .policy
                .call_if(|| self.host.search_code(&query, per_page), GitHubError::is_transient)
                .await
            {
                Ok(page) => page.items,
                Err(e) => {
                    warn!(repo = repo.full_name.as_str(), ext, error = %e, "Code search failed");
                    continue;
                }
            };

            for hit in hits {
                if files.len() >= self.max_files {
                    break 'extensions;
                }
                if !seen_paths.insert(hit.path.clone()) {
                    continue;
                }
                if let Some(content) = self.read_file(repo, &hit.path).await {
                    files.push(SmartContractFile::new(repo.clone(), hit.path, content));
                }
            }
        }

        debug!(repo = repo.full_name.as_str(), files = files.len(), "Contract scan complete");
        files
    }

    /// File text, or `None` if absent or unreadable.
    async fn read_file(&self, repo: &GitHubRepo, path: &str) -> Option<String> {
        let result = self
            .policy
            .call_if(
                || self.host.file_content(&repo.owner, &repo.name, path),
                GitHubError::is_transient,
            )
            .await;

        match result {
            Ok(Some(content)) => Some(content),
            Ok(None) => {
                debug!(repo = repo.full_name.as_str(), path, "File not present");
                None
            }
            Err(e) => {
                warn!(repo = repo.full_name.as_str(), path, error = %e, "File read failed, skipping");
                None
            }
        }
    }
}
