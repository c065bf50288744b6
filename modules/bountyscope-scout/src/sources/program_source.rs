use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use bountyscope_common::indicators::{extract_technology, is_blockchain_related};
use bountyscope_common::{dedup_programs, truncate_text, BountyProgram, FallbackCatalog, ProgramStatus};

use super::{FallbackReason, Harvest, PlatformProfile, SourceFetcher};
use crate::error::is_retryable;
use crate::pages::PageFetcher;
use crate::resilience::{RequestPolicy, RetryError};

/// Live listings for one platform, with that platform's curated programs
/// standing in when the live fetch yields nothing.
pub struct ProgramSource {
    name: String,
    profile: PlatformProfile,
    fetcher: Arc<dyn PageFetcher>,
    policy: RequestPolicy,
    fallback: Vec<BountyProgram>,
}

impl ProgramSource {
    pub fn new(
        profile: PlatformProfile,
        fetcher: Arc<dyn PageFetcher>,
        policy: RequestPolicy,
        catalog: &FallbackCatalog,
    ) -> Self {
        Self {
            name: profile.platform.as_str().to_string(),
            fallback: catalog.programs_for(profile.platform),
            profile,
            fetcher,
            policy,
        }
    }

    pub fn profile(&self) -> &PlatformProfile {
        &self.profile
    }
}

#[async_trait]
impl SourceFetcher<BountyProgram> for ProgramSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Harvest<BountyProgram>> {
        let mut programs = Vec::new();
        let mut failed_urls = 0;
        let mut cancelled = false;

        for url in &self.profile.listing_urls {
            let fetched = self
                .policy
                .call_if(|| self.fetcher.fetch(url), is_retryable)
                .await;

            match fetched {
                Ok(html) => match extract_programs(&self.profile, &html) {
                    Ok(found) => programs.extend(found),
                    Err(e) => {
                        warn!(source = self.name.as_str(), url = url.as_str(), error = %e, "Listing extraction failed");
                        failed_urls += 1;
                    }
                },
                Err(RetryError::Cancelled) => {
                    info!(source = self.name.as_str(), url = url.as_str(), "Cancelled, skipping remaining listings");
                    cancelled = true;
                    break;
                }
                Err(e) => {
                    warn!(source = self.name.as_str(), url = url.as_str(), error = %e, "Listing fetch failed");
                    failed_urls += 1;
                }
            }
        }

        if programs.is_empty() {
            let reason = if cancelled {
                FallbackReason::Cancelled
            } else if failed_urls == self.profile.listing_urls.len() {
                FallbackReason::LiveFailed
            } else {
                FallbackReason::ParsedEmpty
            };
            warn!(
                source = self.name.as_str(),
                reason = reason.as_str(),
                curated = self.fallback.len(),
                "No live programs; using curated fallback"
            );
            return Ok(Harvest::fallback(self.fallback.clone(), reason));
        }

        let programs = dedup_programs(programs);
        info!(source = self.name.as_str(), count = programs.len(), failed_urls, cancelled, "Live programs extracted");
        Ok(Harvest::live(programs))
    }
}

/// Stored descriptions are capped; detection still sees the full text.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| anyhow!("invalid selector {css:?}: {e:?}"))
}

/// Whitespace-collapsed text of the first element matching `sel`.
fn first_text(card: &ElementRef<'_>, sel: &Selector) -> String {
    card.select(sel)
        .next()
        .map(|el| el.text().collect::<Vec<_>>().join(" "))
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Program cards on a listing page. Cards without a name are skipped.
pub fn extract_programs(profile: &PlatformProfile, html: &str) -> Result<Vec<BountyProgram>> {
    let card_sel = selector(profile.card_selector)?;
    let name_sel = selector(profile.name_selector)?;
    let description_sel = selector(profile.description_selector)?;
    let reward_sel = selector(profile.reward_selector)?;

    let document = Html::parse_document(html);
    let now = Utc::now();
    let mut programs = Vec::new();

    for card in document.select(&card_sel) {
        let name = first_text(&card, &name_sel);
        if name.is_empty() {
            continue;
        }
        let description = first_text(&card, &description_sel);
        if profile.require_blockchain && !is_blockchain_related(&format!("{name} {description}")) {
            continue;
        }

        let mut technology = extract_technology(&description);
        technology.extend(profile.base_technology.iter().map(|t| t.to_string()));

        programs.push(BountyProgram {
            platform: profile.platform,
            url: profile.program_url(&name),
            reward_range: first_text(&card, &reward_sel),
            name,
            description: truncate_text(&description, MAX_DESCRIPTION_CHARS),
            technology,
            status: ProgramStatus::Active,
            last_updated: Some(now),
            github_repos: Vec::new(),
            contract_addresses: Vec::new(),
        });
    }

    Ok(programs)
}
