//! Keyword and pattern matching over free text and tags.
//!
//! Everything here is pure: no I/O, case-insensitive, and every operation
//! returns a set, so repeated or overlapping matches collapse to one entry.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

/// Phrases whose presence implies a security-bounty program.
pub const BOUNTY_PHRASES: &[&str] = &[
    "bug bounty",
    "bounty program",
    "security bounty",
    "vulnerability disclosure",
    "responsible disclosure",
    "security reward",
    "hackerone",
    "bugcrowd",
    "immunefi",
    "code4rena",
    "sherlock",
    "cantina",
    "spearbit",
];

static BOUNTY_URL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)hackerone\.com/[\w-]+",
        r"(?i)bugcrowd\.com/[\w-]+",
        r"(?i)immunefi\.com/[\w-]+",
        r"(?i)code4rena\.com/[\w-]+",
    ]
    .into_iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Technology tag → keywords that trigger it.
pub const TECHNOLOGY_TABLE: &[(&str, &[&str])] = &[
    ("solidity", &["solidity", "ethereum", "evm"]),
    ("vyper", &["vyper"]),
    ("rust", &["rust", "solana", "near"]),
    ("cairo", &["cairo", "starknet"]),
    ("move", &["move", "aptos", "sui"]),
    ("typescript", &["typescript", "javascript", "node"]),
    ("go", &["golang", "go"]),
    ("python", &["python"]),
];

static TECHNOLOGY_PATTERNS: LazyLock<Vec<(&'static str, Regex)>> = LazyLock::new(|| {
    TECHNOLOGY_TABLE
        .iter()
        .map(|(tag, keywords)| {
            let alternatives = keywords
                .iter()
                .map(|k| regex::escape(k))
                .collect::<Vec<_>>()
                .join("|");
            let re = Regex::new(&format!(r"(?i)\b(?:{alternatives})\b")).expect("valid regex");
            (*tag, re)
        })
        .collect()
});

const BLOCKCHAIN_KEYWORDS: &[&str] = &[
    "blockchain",
    "cryptocurrency",
    "crypto",
    "defi",
    "smart contract",
    "ethereum",
    "bitcoin",
    "solidity",
    "web3",
    "dao",
    "nft",
    "dapp",
    "protocol",
    "vault",
    "yield",
    "swap",
    "bridge",
    "lending",
    "staking",
];

/// Tags are slugs ("bug-bounty"); compare them in phrase form.
fn normalize_tag(tag: &str) -> String {
    tag.to_lowercase().replace(['-', '_'], " ")
}

/// Bounty indicators found in `text` or `tags`: vocabulary phrases plus
/// bounty-platform URLs (lower-cased).
pub fn match_indicators(text: &str, tags: &[&str]) -> BTreeSet<String> {
    let lower_text = text.to_lowercase();
    let tags: Vec<String> = tags.iter().map(|t| normalize_tag(t)).collect();

    let mut found: BTreeSet<String> = BOUNTY_PHRASES
        .iter()
        .filter(|phrase| lower_text.contains(*phrase) || tags.iter().any(|t| t.contains(*phrase)))
        .map(|phrase| phrase.to_string())
        .collect();

    for pattern in BOUNTY_URL_PATTERNS.iter() {
        found.extend(pattern.find_iter(text).map(|m| m.as_str().to_lowercase()));
    }

    found
}

/// Technology tags implied by `text`. Keywords match whole words only.
pub fn extract_technology(text: &str) -> BTreeSet<String> {
    TECHNOLOGY_PATTERNS
        .iter()
        .filter(|(_, re)| re.is_match(text))
        .map(|(tag, _)| tag.to_string())
        .collect()
}

pub fn is_blockchain_related(text: &str) -> bool {
    let lower = text.to_lowercase();
    BLOCKCHAIN_KEYWORDS.iter().any(|k| lower.contains(k))
}
