// Test doubles for the scout's trait boundaries.
//
// - FixturePageFetcher (PageFetcher): URL → HTML, with optional flaky URLs
// - FixtureCodeHost (CodeHost): in-memory repositories, files, code and issue hits
// - StaticSource / FailingSource (SourceFetcher): canned aggregation inputs
//
// No network. Pair with `#[tokio::test(start_paused = true)]` so backoff and
// rate-limit waits complete instantly.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use github_client::{
    CodeItem, GitHubError, IssueItem, Owner, RepoItem, RepoSearch, SearchPage,
};

use crate::code_host::CodeHost;
use crate::pages::PageFetcher;
use crate::sources::{Harvest, SourceFetcher};

// ---------------------------------------------------------------------------
// FixturePageFetcher
// ---------------------------------------------------------------------------

/// Unregistered URLs fail like a dropped connection.
#[derive(Default)]
pub struct FixturePageFetcher {
    pages: HashMap<String, String>,
    /// URL → failures left before the page is served.
    flaky: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<String>>,
}

impl FixturePageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// Fail the first `failures` requests for `url`, then serve `html`.
    pub fn on_flaky_page(mut self, url: &str, failures: usize, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self.flaky
            .get_mut()
            .expect("fixture lock")
            .insert(url.to_string(), failures);
        self
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().expect("fixture lock").iter().filter(|u| *u == url).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().expect("fixture lock").len()
    }
}

#[async_trait]
impl PageFetcher for FixturePageFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        self.calls.lock().expect("fixture lock").push(url.to_string());

        if let Some(left) = self.flaky.lock().expect("fixture lock").get_mut(url) {
            if *left > 0 {
                *left -= 1;
                return Err(anyhow!("FixturePageFetcher: connection reset for {url}"));
            }
        }

        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow!("FixturePageFetcher: no page registered for {url}"))
    }
}

// ---------------------------------------------------------------------------
// FixtureCodeHost
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FixtureCodeHost {
    repos: HashMap<String, RepoItem>,
    search_results: Vec<RepoItem>,
    /// Pages from this one on answer with a validation error.
    search_fails_from_page: Option<u32>,
    /// (full_name, path) → content
    files: HashMap<(String, String), String>,
    failing_files: HashSet<(String, String)>,
    flaky_files: Mutex<HashMap<(String, String), usize>>,
    /// (full_name, extension) → paths
    code_hits: HashMap<(String, String), Vec<String>>,
    /// search term → issues
    issues: HashMap<String, Vec<IssueItem>>,
    file_reads: AtomicUsize,
    code_searches: Mutex<Vec<(String, u32)>>,
    repo_searches: Mutex<Vec<RepoSearch>>,
}

impl FixtureCodeHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `item` resolvable by full name.
    pub fn with_repo(mut self, item: RepoItem) -> Self {
        self.repos.insert(item.full_name.clone(), item);
        self
    }

    /// Repository search hits, served in pages.
    pub fn with_search_results(mut self, items: Vec<RepoItem>) -> Self {
        self.search_results = items;
        self
    }

    /// Repository search answers with a validation error.
    pub fn failing_search(self) -> Self {
        self.failing_search_from_page(1)
    }

    /// Pages before `page` are served; later ones are rejected the way the
    /// API rejects pages past its result ceiling.
    pub fn failing_search_from_page(mut self, page: u32) -> Self {
        self.search_fails_from_page = Some(page);
        self
    }

    pub fn with_file(mut self, full_name: &str, path: &str, content: &str) -> Self {
        self.files
            .insert((full_name.to_string(), path.to_string()), content.to_string());
        self
    }

    /// Reads of this path are refused.
    pub fn with_failing_file(mut self, full_name: &str, path: &str) -> Self {
        self.failing_files
            .insert((full_name.to_string(), path.to_string()));
        self
    }

    /// The first `failures` reads fail with a network error, later reads succeed.
    pub fn with_flaky_file(mut self, full_name: &str, path: &str, failures: usize, content: &str) -> Self {
        let key = (full_name.to_string(), path.to_string());
        self.files.insert(key.clone(), content.to_string());
        self.flaky_files.get_mut().expect("fixture lock").insert(key, failures);
        self
    }

    pub fn with_code_hits(mut self, full_name: &str, extension: &str, paths: &[&str]) -> Self {
        self.code_hits.insert(
            (full_name.to_string(), extension.to_string()),
            paths.iter().map(|p| p.to_string()).collect(),
        );
        self
    }

    pub fn with_issues(mut self, term: &str, issues: Vec<IssueItem>) -> Self {
        self.issues.insert(term.to_string(), issues);
        self
    }

    pub fn file_reads(&self) -> usize {
        self.file_reads.load(Ordering::SeqCst)
    }

    /// (query, per_page) of every code search, in order.
    pub fn code_searches(&self) -> Vec<(String, u32)> {
        self.code_searches.lock().expect("fixture lock").clone()
    }

    pub fn repo_searches(&self) -> Vec<RepoSearch> {
        self.repo_searches.lock().expect("fixture lock").clone()
    }
}

fn qualifier<'a>(query: &'a str, key: &str) -> Option<&'a str> {
    query
        .split_whitespace()
        .find_map(|token| token.strip_prefix(key))
}

#[async_trait]
impl CodeHost for FixtureCodeHost {
    async fn search_repositories(&self, search: &RepoSearch) -> github_client::Result<SearchPage<RepoItem>> {
        self.repo_searches.lock().expect("fixture lock").push(search.clone());
        if self.search_fails_from_page.is_some_and(|from| search.page >= from) {
            return Err(GitHubError::Api {
                status: 422,
                message: "Validation Failed".into(),
            });
        }

        let per_page = search.per_page as usize;
        let start = (search.page as usize - 1) * per_page;
        let items: Vec<RepoItem> = self
            .search_results
            .iter()
            .skip(start)
            .take(per_page)
            .cloned()
            .collect();
        Ok(SearchPage {
            total_count: self.search_results.len() as u64,
            incomplete_results: false,
            items,
        })
    }

    async fn search_code(&self, query: &str, per_page: u32) -> github_client::Result<SearchPage<CodeItem>> {
        self.code_searches
            .lock()
            .expect("fixture lock")
            .push((query.to_string(), per_page));

        let ext = qualifier(query, "extension:").unwrap_or_default();
        let repo = qualifier(query, "repo:").unwrap_or_default();
        let items: Vec<CodeItem> = self
            .code_hits
            .get(&(repo.to_string(), ext.to_string()))
            .map(|paths| {
                paths
                    .iter()
                    .take(per_page as usize)
                    .map(|path| CodeItem {
                        name: path.rsplit('/').next().unwrap_or(path).to_string(),
                        path: path.clone(),
                        sha: format!("sha-{path}"),
                        html_url: format!("https://github.com/{repo}/blob/main/{path}"),
                    })
                    .collect()
            })
            .unwrap_or_default();

        Ok(SearchPage {
            total_count: items.len() as u64,
            incomplete_results: false,
            items,
        })
    }

    async fn search_issues(&self, query: &str, per_page: u32) -> github_client::Result<SearchPage<IssueItem>> {
        let term = query.split(" repo:").next().unwrap_or_default();
        let items: Vec<IssueItem> = self
            .issues
            .get(term)
            .map(|issues| issues.iter().take(per_page as usize).cloned().collect())
            .unwrap_or_default();
        Ok(SearchPage {
            total_count: items.len() as u64,
            incomplete_results: false,
            items,
        })
    }

    async fn repository(&self, owner: &str, name: &str) -> github_client::Result<RepoItem> {
        let full_name = format!("{owner}/{name}");
        self.repos
            .get(&full_name)
            .cloned()
            .ok_or_else(|| GitHubError::NotFound(format!("/repos/{full_name}")))
    }

    async fn file_content(&self, owner: &str, name: &str, path: &str) -> github_client::Result<Option<String>> {
        self.file_reads.fetch_add(1, Ordering::SeqCst);
        let key = (format!("{owner}/{name}"), path.to_string());

        if self.failing_files.contains(&key) {
            return Err(GitHubError::Api {
                status: 403,
                message: "Resource not accessible".into(),
            });
        }
        if let Some(left) = self.flaky_files.lock().expect("fixture lock").get_mut(&key) {
            if *left > 0 {
                *left -= 1;
                return Err(GitHubError::Network("connection reset".into()));
            }
        }
        Ok(self.files.get(&key).cloned())
    }
}

/// A repository item as the search API would return it.
pub fn repo_item(owner: &str, name: &str, description: &str, topics: &[&str]) -> RepoItem {
    RepoItem {
        name: name.to_string(),
        full_name: format!("{owner}/{name}"),
        owner: Some(Owner {
            login: owner.to_string(),
        }),
        description: Some(description.to_string()),
        language: Some("Solidity".to_string()),
        stargazers_count: 100,
        html_url: format!("https://github.com/{owner}/{name}"),
        topics: topics.iter().map(|t| t.to_string()).collect(),
        has_issues: true,
    }
}

pub fn issue(number: u64, title: &str) -> IssueItem {
    IssueItem {
        number,
        title: title.to_string(),
        html_url: format!("https://github.com/acme/vault/issues/{number}"),
        state: "open".to_string(),
        body: None,
    }
}

// ---------------------------------------------------------------------------
// Canned sources
// ---------------------------------------------------------------------------

/// Returns its records as live data on every fetch.
pub struct StaticSource<T> {
    name: String,
    records: Vec<T>,
}

impl<T> StaticSource<T> {
    pub fn new(name: &str, records: Vec<T>) -> Self {
        Self {
            name: name.to_string(),
            records,
        }
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> SourceFetcher<T> for StaticSource<T> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Harvest<T>> {
        Ok(Harvest::live(self.records.clone()))
    }
}

/// Rejects every fetch.
pub struct FailingSource {
    name: String,
}

impl FailingSource {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl<T: Send> SourceFetcher<T> for FailingSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Harvest<T>> {
        Err(anyhow!("{}: upstream unavailable", self.name))
    }
}
