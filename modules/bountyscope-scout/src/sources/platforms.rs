use bountyscope_common::Platform;

/// HackerOne's directory has no blockchain category; these searches
/// approximate one.
const HACKERONE_SEARCH_TERMS: [&str; 4] = ["blockchain", "cryptocurrency", "defi", "smart contract"];

const DESCRIPTION_SELECTOR: &str = ".description, .summary";

/// How to read one platform's public listings.
#[derive(Debug, Clone)]
pub struct PlatformProfile {
    pub platform: Platform,
    pub listing_urls: Vec<String>,
    pub card_selector: &'static str,
    pub name_selector: &'static str,
    pub description_selector: &'static str,
    pub reward_selector: &'static str,
    pub program_url_prefix: &'static str,
    /// Replacement for whitespace runs when slugging a program name.
    pub slug_separator: &'static str,
    /// Drop cards whose name and description don't look blockchain-related.
    pub require_blockchain: bool,
    /// Tags every live record from this platform carries.
    pub base_technology: &'static [&'static str],
}

impl PlatformProfile {
    pub fn program_url(&self, name: &str) -> String {
        let slug = name
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(self.slug_separator);
        format!("{}{}", self.program_url_prefix, slug)
    }
}

pub fn platform_profile(platform: Platform) -> PlatformProfile {
    match platform {
        Platform::ImmuneFi => PlatformProfile {
            platform,
            listing_urls: vec!["https://immunefi.com/api/bounty".to_string()],
            card_selector: ".bounty-card, .program-card",
            name_selector: ".project-name, .program-title",
            description_selector: DESCRIPTION_SELECTOR,
            reward_selector: ".reward, .bounty-amount",
            program_url_prefix: "https://immunefi.com/bounty/",
            slug_separator: "-",
            require_blockchain: false,
            base_technology: &[],
        },
        Platform::Code4rena => PlatformProfile {
            platform,
            listing_urls: vec!["https://code4rena.com/contests".to_string()],
            card_selector: ".contest-item, .contest-card",
            name_selector: ".contest-title, .project-name",
            description_selector: DESCRIPTION_SELECTOR,
            reward_selector: ".prize-pool, .reward",
            program_url_prefix: "https://code4rena.com/contests/",
            slug_separator: "-",
            require_blockchain: false,
            base_technology: &["solidity"],
        },
        Platform::HackerOne => PlatformProfile {
            platform,
            listing_urls: HACKERONE_SEARCH_TERMS
                .iter()
                .map(|term| {
                    let encoded: String = url::form_urlencoded::byte_serialize(term.as_bytes()).collect();
                    format!("https://hackerone.com/directory/programs?search={encoded}")
                })
                .collect(),
            card_selector: ".program-card, .directory-program",
            name_selector: ".program-name, .title",
            description_selector: DESCRIPTION_SELECTOR,
            reward_selector: ".bounty-range, .max-bounty",
            program_url_prefix: "https://hackerone.com/",
            slug_separator: "",
            require_blockchain: true,
            base_technology: &[],
        },
        Platform::Bugcrowd => PlatformProfile {
            platform,
            listing_urls: vec!["https://bugcrowd.com/programs".to_string()],
            card_selector: ".program-tile, .bounty-card",
            name_selector: ".program-title, .name",
            description_selector: DESCRIPTION_SELECTOR,
            reward_selector: ".max-reward, .bounty-amount",
            program_url_prefix: "https://bugcrowd.com/",
            slug_separator: "-",
            require_blockchain: true,
            base_technology: &[],
        },
    }
}

pub fn all_profiles() -> Vec<PlatformProfile> {
    Platform::ALL.into_iter().map(platform_profile).collect()
}
