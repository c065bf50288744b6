use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use bountyscope_common::{
    dedup_programs, dedup_repos, targets_for_program, BountyProgram, BountyTarget, Config,
    FallbackCatalog, GitHubRepo,
};
use github_client::{GitHubClient, IssueItem};

use crate::aggregator::{aggregate_all, Aggregate};
use crate::code_host::CodeHost;
use crate::pages::{HttpPageFetcher, PageFetcher};
use crate::resilience::{RateLimiter, RequestPolicy};
use crate::scanner::{RepoScanner, RepoSearchOptions};
use crate::sources::{all_profiles, ProgramSource, RepoSearchSource, SourceFetcher};
use crate::walker::{RepoContentWalker, RepoWalk};

/// Owns every source, limiter and client for one process. Construct it once
/// and pass it where it's needed.
pub struct Scout {
    program_sources: Vec<Arc<dyn SourceFetcher<BountyProgram>>>,
    scanner: Arc<RepoScanner>,
    walker: RepoContentWalker,
    cancelled: Arc<AtomicBool>,
}

impl Scout {
    /// Live wiring: one limiter per platform, one shared by every GitHub
    /// consumer.
    pub fn from_config(config: &Config, cancelled: Arc<AtomicBool>) -> Result<Self> {
        let catalog = FallbackCatalog::load_or_builtin(config.catalog_path.as_deref())
            .context("Failed to load fallback catalog")?;
        let pages: Arc<dyn PageFetcher> =
            Arc::new(HttpPageFetcher::new(&config.user_agent, config.http_timeout)?);
        let github = GitHubClient::new(
            config.github_token.as_deref(),
            Some(config.user_agent.as_str()),
            config.http_timeout,
        )
        .context("Failed to build GitHub client")?;

        let retry = RequestPolicy::retry_from_config(config);

        let program_sources = all_profiles()
            .into_iter()
            .map(|profile| {
                let policy = RequestPolicy::new(
                    Arc::new(RateLimiter::from_settings(&config.page_rate)),
                    retry.clone(),
                    cancelled.clone(),
                );
                Arc::new(ProgramSource::new(profile, pages.clone(), policy, &catalog))
                    as Arc<dyn SourceFetcher<BountyProgram>>
            })
            .collect();

        let api_policy = RequestPolicy::new(
            Arc::new(RateLimiter::from_settings(&config.api_rate)),
            retry,
            cancelled.clone(),
        );

        Ok(Self::new(
            program_sources,
            Arc::new(github),
            api_policy,
            config.max_files,
            cancelled,
        ))
    }

    /// Wire from parts. `api_policy` is shared by repository search, issue
    /// search and content walking.
    pub fn new(
        program_sources: Vec<Arc<dyn SourceFetcher<BountyProgram>>>,
        host: Arc<dyn CodeHost>,
        api_policy: RequestPolicy,
        max_files: usize,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        Self {
            program_sources,
            scanner: Arc::new(RepoScanner::new(host.clone(), api_policy.clone())),
            walker: RepoContentWalker::new(host, api_policy, max_files),
            cancelled,
        }
    }

    pub fn cancel_flag(&self) -> &Arc<AtomicBool> {
        &self.cancelled
    }

    pub fn scanner(&self) -> &RepoScanner {
        &self.scanner
    }

    pub fn walker(&self) -> &RepoContentWalker {
        &self.walker
    }

    /// Programs from every platform, deduplicated by (platform, name).
    pub async fn discover_programs(&self) -> Aggregate<BountyProgram> {
        aggregate_all("programs", &self.program_sources)
            .await
            .map_records(dedup_programs)
    }

    /// One search per query, run concurrently, deduplicated by full name.
    pub async fn discover_repos(&self, queries: &[String], options: &RepoSearchOptions) -> Aggregate<GitHubRepo> {
        let sources: Vec<Arc<dyn SourceFetcher<GitHubRepo>>> = queries
            .iter()
            .map(|q| {
                Arc::new(RepoSearchSource::new(self.scanner.clone(), q.as_str(), options.clone()))
                    as Arc<dyn SourceFetcher<GitHubRepo>>
            })
            .collect();

        aggregate_all("repositories", &sources)
            .await
            .map_records(dedup_repos)
    }

    pub async fn walk_repo(&self, full_name: &str) -> crate::error::Result<RepoWalk> {
        self.walker.walk(full_name).await
    }

    pub async fn repo_issues(&self, full_name: &str, terms: &[&str]) -> crate::error::Result<Vec<IssueItem>> {
        let repo = self.walker.resolve(full_name).await?;
        Ok(self.scanner.repo_issues(&repo, terms).await)
    }

    /// Targets for every discovered program, highest priority first.
    pub async fn targets(&self) -> Vec<BountyTarget> {
        let aggregate = self.discover_programs().await;
        let mut targets: Vec<BountyTarget> = aggregate
            .records
            .into_iter()
            .map(Arc::new)
            .flat_map(|program| targets_for_program(&program))
            .collect();
        targets.sort_by_key(|t| t.priority);
        info!(targets = targets.len(), "Targets derived");
        targets
    }
}
