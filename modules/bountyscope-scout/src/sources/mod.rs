//! Per-source adapters. Each source fetches one kind of record and decides
//! for itself whether to substitute curated data when the live fetch fails.

pub mod platforms;
pub mod program_source;
pub mod repo_search;

pub use platforms::{all_profiles, platform_profile, PlatformProfile};
pub use program_source::{extract_programs, ProgramSource};
pub use repo_search::RepoSearchSource;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

/// Why a source returned curated records instead of live ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    /// Every live request failed after retries.
    LiveFailed,
    /// Live requests succeeded but yielded no records.
    ParsedEmpty,
    /// The run was cancelled before any live records arrived.
    Cancelled,
}

impl FallbackReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FallbackReason::LiveFailed => "live_failed",
            FallbackReason::ParsedEmpty => "parsed_empty",
            FallbackReason::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Live,
    Fallback(FallbackReason),
}

/// Records from one source, tagged with where they came from.
#[derive(Debug, Clone)]
pub struct Harvest<T> {
    pub records: Vec<T>,
    pub origin: Origin,
}

impl<T> Harvest<T> {
    pub fn live(records: Vec<T>) -> Self {
        Self {
            records,
            origin: Origin::Live,
        }
    }

    pub fn fallback(records: Vec<T>, reason: FallbackReason) -> Self {
        Self {
            records,
            origin: Origin::Fallback(reason),
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self.origin, Origin::Fallback(_))
    }
}

/// One remote source of records. `Err` means the source failed outright;
/// the aggregator logs it and moves on.
#[async_trait]
pub trait SourceFetcher<T: Send>: Send + Sync {
    fn name(&self) -> &str;

    async fn fetch(&self) -> Result<Harvest<T>>;
}
