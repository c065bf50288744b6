use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{BountyError, Result};
use crate::indicators;
use crate::text::is_valid_url;

// --- Enums ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Platform {
    ImmuneFi,
    Code4rena,
    HackerOne,
    Bugcrowd,
}

impl Platform {
    pub const ALL: [Platform; 4] = [
        Platform::ImmuneFi,
        Platform::Code4rena,
        Platform::HackerOne,
        Platform::Bugcrowd,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::ImmuneFi => "ImmuneFi",
            Platform::Code4rena => "Code4rena",
            Platform::HackerOne => "HackerOne",
            Platform::Bugcrowd => "Bugcrowd",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = BountyError;

    fn from_str(s: &str) -> Result<Self> {
        Platform::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| BountyError::Validation(format!("unknown platform: {s}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    Active,
    Inactive,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    SmartContract,
    Protocol,
    Repository,
}

impl std::fmt::Display for TargetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetKind::SmartContract => write!(f, "smart_contract"),
            TargetKind::Protocol => write!(f, "protocol"),
            TargetKind::Repository => write!(f, "repository"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

static AMOUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*([km])?\b").expect("valid regex")
});

impl Priority {
    /// Rank by the largest amount mentioned in a reward text such as
    /// "Up to $250,000" or "$1.5M USDC".
    pub fn from_reward_text(reward: &str) -> Self {
        let max = AMOUNT_RE
            .captures_iter(reward)
            .filter_map(|cap| {
                let value: f64 = cap[1].replace(',', "").parse().ok()?;
                let scale = match cap.get(2).map(|m| m.as_str().to_ascii_lowercase()) {
                    Some(s) if s == "k" => 1_000.0,
                    Some(s) if s == "m" => 1_000_000.0,
                    _ => 1.0,
                };
                Some(value * scale)
            })
            .fold(0.0_f64, f64::max);

        if max >= 250_000.0 {
            Priority::High
        } else if max >= 50_000.0 {
            Priority::Medium
        } else {
            Priority::Low
        }
    }
}

// --- Bounty programs ---

/// A discovered or curated security-reward program. Never mutated after the
/// fetch step that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BountyProgram {
    pub platform: Platform,
    pub name: String,
    pub url: String,
    pub description: String,
    pub reward_range: String,
    pub technology: BTreeSet<String>,
    pub status: ProgramStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub github_repos: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contract_addresses: Vec<String>,
}

impl BountyProgram {
    /// Natural dedup key within one aggregation run.
    pub fn dedup_key(&self) -> (Platform, &str) {
        (self.platform, self.name.as_str())
    }
}

/// Keep the first program per (platform, name), preserving order.
pub fn dedup_programs(programs: Vec<BountyProgram>) -> Vec<BountyProgram> {
    let mut seen = HashSet::new();
    programs
        .into_iter()
        .filter(|p| seen.insert((p.platform, p.name.clone())))
        .collect()
}

// --- Targets ---

/// An actionable unit derived from a program. The identifier's shape is
/// checked against the kind at construction.
#[derive(Debug, Clone, Serialize)]
pub struct BountyTarget {
    pub program: Arc<BountyProgram>,
    #[serde(rename = "type")]
    pub kind: TargetKind,
    pub identifier: String,
    pub priority: Priority,
    pub reasoning: String,
}

static CONTRACT_ADDRESS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("valid regex"));

impl BountyTarget {
    pub fn new(
        program: Arc<BountyProgram>,
        kind: TargetKind,
        identifier: impl Into<String>,
        priority: Priority,
        reasoning: impl Into<String>,
    ) -> Result<Self> {
        let identifier = identifier.into().trim().to_string();
        let valid = match kind {
            TargetKind::Repository => is_valid_url(&identifier),
            TargetKind::SmartContract => CONTRACT_ADDRESS_RE.is_match(&identifier),
            TargetKind::Protocol => !identifier.is_empty(),
        };
        if !valid {
            return Err(BountyError::InvalidTarget { kind, identifier });
        }

        Ok(Self {
            program,
            kind,
            identifier,
            priority,
            reasoning: reasoning.into(),
        })
    }
}

/// Expand a program into targets: its repositories, its contracts, or the
/// program itself when it lists neither. Malformed identifiers are skipped.
pub fn targets_for_program(program: &Arc<BountyProgram>) -> Vec<BountyTarget> {
    let priority = Priority::from_reward_text(&program.reward_range);
    let reward = if program.reward_range.is_empty() {
        "unstated reward".to_string()
    } else {
        program.reward_range.clone()
    };

    let mut candidates: Vec<(TargetKind, &str, String)> = Vec::new();
    for repo in &program.github_repos {
        candidates.push((
            TargetKind::Repository,
            repo.as_str(),
            format!("Repository in scope for {} on {} ({reward})", program.name, program.platform),
        ));
    }
    for address in &program.contract_addresses {
        candidates.push((
            TargetKind::SmartContract,
            address.as_str(),
            format!("Contract in scope for {} on {} ({reward})", program.name, program.platform),
        ));
    }
    if candidates.is_empty() {
        candidates.push((
            TargetKind::Protocol,
            program.url.as_str(),
            format!("{} runs a {} program ({reward})", program.name, program.platform),
        ));
    }

    candidates
        .into_iter()
        .filter_map(|(kind, identifier, reasoning)| {
            match BountyTarget::new(program.clone(), kind, identifier, priority, reasoning) {
                Ok(target) => Some(target),
                Err(e) => {
                    tracing::warn!(program = program.name.as_str(), error = %e, "Skipping malformed target");
                    None
                }
            }
        })
        .collect()
}

// --- Repositories ---

/// A repository search hit. `bounty_indicators` is always what
/// `indicators::match_indicators` yields for (description, topics).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHubRepo {
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub language: String,
    pub stars: u64,
    pub url: String,
    pub topics: BTreeSet<String>,
    pub has_issues: bool,
    pub bounty_indicators: BTreeSet<String>,
}

impl GitHubRepo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        language: impl Into<String>,
        stars: u64,
        url: impl Into<String>,
        topics: impl IntoIterator<Item = String>,
        has_issues: bool,
    ) -> Self {
        let owner = owner.into();
        let name = name.into();
        let description = description.into();
        let topics: BTreeSet<String> = topics.into_iter().collect();
        let tags: Vec<&str> = topics.iter().map(String::as_str).collect();
        let bounty_indicators = indicators::match_indicators(&description, &tags);

        Self {
            full_name: format!("{owner}/{name}"),
            owner,
            name,
            description,
            language: language.into(),
            stars,
            url: url.into(),
            topics,
            has_issues,
            bounty_indicators,
        }
    }
}

/// Keep the first repository per full name, preserving order.
pub fn dedup_repos(repos: Vec<GitHubRepo>) -> Vec<GitHubRepo> {
    let mut seen = HashSet::new();
    repos
        .into_iter()
        .filter(|r| seen.insert(r.full_name.clone()))
        .collect()
}

// --- Contract files ---

/// Extensions searched for contract sources, in search order.
pub const CONTRACT_EXTENSIONS: [&str; 4] = ["sol", "vy", "cairo", "move"];

/// Fixed extension → language mapping. Accepts "sol" or ".sol".
pub fn language_for_extension(ext: &str) -> &'static str {
    match ext.trim_start_matches('.').to_ascii_lowercase().as_str() {
        "sol" => "solidity",
        "vy" => "vyper",
        "cairo" => "cairo",
        "move" => "move",
        _ => "unknown",
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SmartContractFile {
    pub repo: Arc<GitHubRepo>,
    pub path: String,
    pub content: String,
    pub size: usize,
    pub language: &'static str,
}

impl SmartContractFile {
    /// Language comes from the path's extension; size is the content's byte length.
    pub fn new(repo: Arc<GitHubRepo>, path: impl Into<String>, content: String) -> Self {
        let path = path.into();
        let language = path
            .rsplit_once('.')
            .map(|(_, ext)| language_for_extension(ext))
            .unwrap_or("unknown");
        Self {
            repo,
            path,
            size: content.len(),
            content,
            language,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn program(reward: &str) -> BountyProgram {
        BountyProgram {
            platform: Platform::ImmuneFi,
            name: "Compound".into(),
            url: "https://immunefi.com/bounty/compound/".into(),
            description: "Decentralized lending protocol".into(),
            reward_range: reward.into(),
            technology: BTreeSet::from(["solidity".to_string()]),
            status: ProgramStatus::Active,
            last_updated: None,
            github_repos: Vec::new(),
            contract_addresses: Vec::new(),
        }
    }

    #[test]
    fn platform_parses_case_insensitively() {
        assert_eq!("hackerone".parse::<Platform>().unwrap(), Platform::HackerOne);
        assert_eq!(" IMMUNEFI ".parse::<Platform>().unwrap(), Platform::ImmuneFi);
        assert!("gitcoin".parse::<Platform>().is_err());
    }

    #[test]
    fn priority_follows_largest_amount() {
        assert_eq!(Priority::from_reward_text("Up to $250,000"), Priority::High);
        assert_eq!(Priority::from_reward_text("$1.5M USDC"), Priority::High);
        assert_eq!(Priority::from_reward_text("$5,000 - $100,000"), Priority::Medium);
        assert_eq!(Priority::from_reward_text("Up to $50k"), Priority::Medium);
        assert_eq!(Priority::from_reward_text("swag"), Priority::Low);
    }

    #[test]
    fn repository_target_requires_url() {
        let p = Arc::new(program("Up to $150,000"));
        let err = BountyTarget::new(p.clone(), TargetKind::Repository, "not a url", Priority::Low, "")
            .unwrap_err();
        assert!(matches!(err, BountyError::InvalidTarget { kind: TargetKind::Repository, .. }));
        assert!(BountyTarget::new(
            p,
            TargetKind::Repository,
            "https://github.com/compound-finance/compound-protocol",
            Priority::Low,
            ""
        )
        .is_ok());
    }

    #[test]
    fn contract_target_requires_address_shape() {
        let p = Arc::new(program(""));
        assert!(BountyTarget::new(p.clone(), TargetKind::SmartContract, "0x1234", Priority::Low, "").is_err());
        assert!(BountyTarget::new(
            p,
            TargetKind::SmartContract,
            "0xc00e94Cb662C3520282E6f5717214004A7f26888",
            Priority::Low,
            ""
        )
        .is_ok());
    }

    #[test]
    fn program_without_scope_lists_becomes_protocol_target() {
        let p = Arc::new(program("Up to $150,000"));
        let targets = targets_for_program(&p);
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].kind, TargetKind::Protocol);
        assert_eq!(targets[0].identifier, p.url);
        assert_eq!(targets[0].priority, Priority::Medium);
    }

    #[test]
    fn malformed_scope_entries_are_skipped() {
        let mut raw = program("Up to $500,000");
        raw.github_repos = vec!["https://github.com/a/b".into(), "github.com/no-scheme".into()];
        raw.contract_addresses = vec!["0xc00e94Cb662C3520282E6f5717214004A7f26888".into()];
        let targets = targets_for_program(&Arc::new(raw));
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.priority == Priority::High));
    }

    #[test]
    fn dedup_programs_keeps_first_per_platform_and_name() {
        let mut other_platform = program("");
        other_platform.platform = Platform::HackerOne;
        let mut later = program("later");
        later.description = "duplicate".into();

        let out = dedup_programs(vec![program("first"), other_platform, later]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].reward_range, "first");
    }

    #[test]
    fn repo_indicators_come_from_description_and_topics() {
        let repo = GitHubRepo::new(
            "acme",
            "vault",
            "Vault contracts. Bug bounty on Immunefi",
            "Solidity",
            120,
            "https://github.com/acme/vault",
            vec!["defi".to_string(), "security-bounty".to_string()],
            true,
        );
        assert_eq!(repo.full_name, "acme/vault");
        assert!(repo.bounty_indicators.contains("bug bounty"));
        assert!(repo.bounty_indicators.contains("immunefi"));
        assert!(repo.bounty_indicators.contains("security bounty"));
    }

    #[test]
    fn contract_file_derives_language_and_size() {
        let repo = Arc::new(GitHubRepo::new("a", "b", "", "", 0, "https://github.com/a/b", Vec::new(), false));
        let file = SmartContractFile::new(repo.clone(), "contracts/Vault.sol", "contract Vault {}".into());
        assert_eq!(file.language, "solidity");
        assert_eq!(file.size, 17);

        let other = SmartContractFile::new(repo, "README", "é".into());
        assert_eq!(other.language, "unknown");
        assert_eq!(other.size, 2);
    }

    #[test]
    fn extension_mapping_is_fixed() {
        assert_eq!(language_for_extension(".vy"), "vyper");
        assert_eq!(language_for_extension("cairo"), "cairo");
        assert_eq!(language_for_extension("MOVE"), "move");
        assert_eq!(language_for_extension("rs"), "unknown");
    }
}
