use serde::{Deserialize, Serialize};

/// Envelope shared by every `/search/*` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchPage<T> {
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<T>,
}

/// Sort key for repository search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepoSort {
    #[default]
    Stars,
    Forks,
    Updated,
}

impl RepoSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            RepoSort::Stars => "stars",
            RepoSort::Forks => "forks",
            RepoSort::Updated => "updated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Desc,
    Asc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Desc => "desc",
            SortOrder::Asc => "asc",
        }
    }
}

/// Parameters for one page of `/search/repositories`.
#[derive(Debug, Clone)]
pub struct RepoSearch {
    pub query: String,
    pub sort: RepoSort,
    pub order: SortOrder,
    pub per_page: u32,
    pub page: u32,
}

impl RepoSearch {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sort: RepoSort::default(),
            order: SortOrder::default(),
            per_page: 30,
            page: 1,
        }
    }

    pub fn per_page(mut self, n: u32) -> Self {
        self.per_page = n.clamp(1, 100);
        self
    }

    pub fn page(mut self, n: u32) -> Self {
        self.page = n.max(1);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
}

/// A repository as returned by search and `/repos/{owner}/{repo}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoItem {
    pub name: String,
    pub full_name: String,
    pub owner: Option<Owner>,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    pub html_url: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub has_issues: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeItem {
    pub name: String,
    pub path: String,
    pub sha: String,
    pub html_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssueItem {
    pub number: u64,
    pub title: String,
    pub html_url: String,
    pub state: String,
    #[serde(default)]
    pub body: Option<String>,
}

/// `/repos/{owner}/{repo}/contents/{path}` returns an object for files and
/// an array for directories.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ContentsPayload {
    File(FileContent),
    Directory(Vec<serde_json::Value>),
}

#[derive(Debug, Deserialize)]
pub(crate) struct FileContent {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub encoding: Option<String>,
}
