use async_trait::async_trait;

use bountyscope_common::GitHubRepo;
use github_client::{
    CodeItem, GitHubClient, IssueItem, RepoItem, RepoSearch, Result, SearchPage,
};

/// The slice of the code-hosting API the scanner and walker use.
#[async_trait]
pub trait CodeHost: Send + Sync {
    async fn search_repositories(&self, search: &RepoSearch) -> Result<SearchPage<RepoItem>>;

    async fn search_code(&self, query: &str, per_page: u32) -> Result<SearchPage<CodeItem>>;

    async fn search_issues(&self, query: &str, per_page: u32) -> Result<SearchPage<IssueItem>>;

    async fn repository(&self, owner: &str, name: &str) -> Result<RepoItem>;

    /// Decoded file text; `None` when the path doesn't exist.
    async fn file_content(&self, owner: &str, name: &str, path: &str) -> Result<Option<String>>;
}

#[async_trait]
impl CodeHost for GitHubClient {
    async fn search_repositories(&self, search: &RepoSearch) -> Result<SearchPage<RepoItem>> {
        GitHubClient::search_repositories(self, search).await
    }

    async fn search_code(&self, query: &str, per_page: u32) -> Result<SearchPage<CodeItem>> {
        GitHubClient::search_code(self, query, per_page).await
    }

    async fn search_issues(&self, query: &str, per_page: u32) -> Result<SearchPage<IssueItem>> {
        GitHubClient::search_issues(self, query, per_page).await
    }

    async fn repository(&self, owner: &str, name: &str) -> Result<RepoItem> {
        GitHubClient::repository(self, owner, name).await
    }

    async fn file_content(&self, owner: &str, name: &str, path: &str) -> Result<Option<String>> {
        GitHubClient::file_content(self, owner, name, path).await
    }
}

pub fn repo_from_item(item: RepoItem) -> GitHubRepo {
    let owner = match item.owner {
        Some(owner) => owner.login,
        None => item
            .full_name
            .split_once('/')
            .map(|(owner, _)| owner.to_string())
            .unwrap_or_default(),
    };
    GitHubRepo::new(
        owner,
        item.name,
        item.description.unwrap_or_default(),
        item.language.unwrap_or_default(),
        item.stargazers_count,
        item.html_url,
        item.topics,
        item.has_issues,
    )
}

/// Split "owner/name" into its parts.
pub fn parse_full_name(full_name: &str) -> Option<(&str, &str)> {
    let (owner, name) = full_name.trim().split_once('/')?;
    if owner.is_empty() || name.is_empty() || name.contains('/') {
        return None;
    }
    Some((owner, name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use github_client::Owner;

    #[test]
    fn item_conversion_computes_indicators() {
        let item = RepoItem {
            name: "vault".into(),
            full_name: "acme/vault".into(),
            owner: Some(Owner { login: "acme".into() }),
            description: Some("Lending vault. Bug bounty on Immunefi".into()),
            language: Some("Solidity".into()),
            stargazers_count: 120,
            html_url: "https://github.com/acme/vault".into(),
            topics: vec!["defi".into(), "security-bounty".into()],
            has_issues: true,
        };
        let repo = repo_from_item(item);
        assert_eq!(repo.full_name, "acme/vault");
        assert!(repo.bounty_indicators.contains("bug bounty"));
        assert!(repo.bounty_indicators.contains("immunefi"));
        assert!(repo.bounty_indicators.contains("security bounty"));
    }

    #[test]
    fn full_name_parsing() {
        assert_eq!(parse_full_name("acme/vault"), Some(("acme", "vault")));
        assert_eq!(parse_full_name("acme"), None);
        assert_eq!(parse_full_name("/vault"), None);
        assert_eq!(parse_full_name("a/b/c"), None);
    }
}
