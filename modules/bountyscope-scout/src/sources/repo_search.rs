use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use bountyscope_common::GitHubRepo;

use super::{Harvest, SourceFetcher};
use crate::scanner::{RepoScanner, RepoSearchOptions};

/// One repository search query as an aggregation source. There's no curated
/// substitute for search hits, so failures surface to the aggregator.
pub struct RepoSearchSource {
    name: String,
    scanner: Arc<RepoScanner>,
    query: String,
    options: RepoSearchOptions,
}

impl RepoSearchSource {
    pub fn new(scanner: Arc<RepoScanner>, query: impl Into<String>, options: RepoSearchOptions) -> Self {
        let query = query.into();
        Self {
            name: format!("github:{query}"),
            scanner,
            query,
            options,
        }
    }
}

#[async_trait]
impl SourceFetcher<GitHubRepo> for RepoSearchSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Harvest<GitHubRepo>> {
        let repos = self.scanner.search(&self.query, &self.options).await?;
        Ok(Harvest::live(repos))
    }
}
