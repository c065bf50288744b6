use std::collections::BTreeSet;
use std::path::Path;

use serde::Deserialize;

use crate::error::{BountyError, Result};
use crate::indicators::extract_technology;
use crate::text::is_valid_url;
use crate::types::{BountyProgram, Platform, ProgramStatus};

const BUILTIN_CATALOG: &str = include_str!("../catalog/fallback.toml");

/// Curated programs, versioned as a TOML data asset so curated-data updates
/// don't require code changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FallbackCatalog {
    pub version: u32,
    #[serde(default)]
    pub programs: Vec<CatalogEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogEntry {
    pub platform: Platform,
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub reward_range: String,
    #[serde(default)]
    pub technology: Vec<String>,
    #[serde(default = "default_status")]
    pub status: ProgramStatus,
    #[serde(default)]
    pub github_repos: Vec<String>,
    #[serde(default)]
    pub contract_addresses: Vec<String>,
}

fn default_status() -> ProgramStatus {
    ProgramStatus::Active
}

impl FallbackCatalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOG, "builtin")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            BountyError::Catalog(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    /// `BOUNTYSCOPE_CATALOG`-style override: a path if given, else the builtin.
    pub fn load_or_builtin(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Self::builtin(),
        }
    }

    pub fn from_toml_str(content: &str, origin: &str) -> Result<Self> {
        let catalog: FallbackCatalog = toml::from_str(content)
            .map_err(|e| BountyError::Catalog(format!("failed to parse {origin}: {e}")))?;

        for entry in &catalog.programs {
            if entry.name.trim().is_empty() {
                return Err(BountyError::Catalog(format!(
                    "{origin}: {} entry with empty name",
                    entry.platform
                )));
            }
            if !is_valid_url(&entry.url) {
                return Err(BountyError::Catalog(format!(
                    "{origin}: {} has invalid url {}",
                    entry.name, entry.url
                )));
            }
        }

        tracing::debug!(origin, version = catalog.version, programs = catalog.programs.len(), "Loaded fallback catalog");
        Ok(catalog)
    }

    /// Fresh program records for one platform, in catalog order.
    pub fn programs_for(&self, platform: Platform) -> Vec<BountyProgram> {
        self.programs
            .iter()
            .filter(|e| e.platform == platform)
            .map(CatalogEntry::to_program)
            .collect()
    }
}

impl CatalogEntry {
    fn to_program(&self) -> BountyProgram {
        let mut technology: BTreeSet<String> =
            self.technology.iter().map(|t| t.trim().to_lowercase()).collect();
        technology.extend(extract_technology(&self.description));

        BountyProgram {
            platform: self.platform,
            name: self.name.clone(),
            url: self.url.clone(),
            description: self.description.clone(),
            reward_range: self.reward_range.clone(),
            technology,
            status: self.status,
            last_updated: None,
            github_repos: self.github_repos.clone(),
            contract_addresses: self.contract_addresses.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_covers_every_platform() {
        let catalog = FallbackCatalog::builtin().unwrap();
        for platform in Platform::ALL {
            assert!(
                !catalog.programs_for(platform).is_empty(),
                "no curated programs for {platform}"
            );
        }
        assert_eq!(catalog.programs_for(Platform::ImmuneFi).len(), 3);
        assert_eq!(catalog.programs_for(Platform::Bugcrowd)[0].name, "Kraken");
    }

    #[test]
    fn curated_tags_are_normalized_and_merged() {
        let catalog = FallbackCatalog::from_toml_str(
            r#"
            version = 2
            [[programs]]
            platform = "Code4rena"
            name = "Arbitrum Foundation"
            url = "https://code4rena.com/contests/arbitrum"
            description = "Layer 2 scaling solution for Ethereum"
            technology = ["Go", "go "]
            "#,
            "test",
        )
        .unwrap();
        let program = &catalog.programs_for(Platform::Code4rena)[0];
        assert_eq!(
            program.technology,
            BTreeSet::from(["go".to_string(), "solidity".to_string()])
        );
        assert_eq!(program.status, ProgramStatus::Active);
    }

    #[test]
    fn rejects_unknown_fields_and_bad_urls() {
        let unknown = "version = 1\n[[programs]]\nplatform = \"ImmuneFi\"\nname = \"x\"\nurl = \"https://immunefi.com/x\"\nbogus = 1\n";
        assert!(matches!(
            FallbackCatalog::from_toml_str(unknown, "test"),
            Err(BountyError::Catalog(_))
        ));

        let bad_url = "version = 1\n[[programs]]\nplatform = \"ImmuneFi\"\nname = \"x\"\nurl = \"immunefi/x\"\n";
        assert!(FallbackCatalog::from_toml_str(bad_url, "test").is_err());
    }

    #[test]
    fn missing_file_is_a_catalog_error() {
        let err = FallbackCatalog::load(Path::new("/nonexistent/fallback.toml")).unwrap_err();
        assert!(matches!(err, BountyError::Catalog(_)));
    }
}
