use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::sources::{FallbackReason, Origin, SourceFetcher};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SourceOutcome {
    Live,
    Fallback { reason: FallbackReason },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    #[serde(flatten)]
    pub outcome: SourceOutcome,
    pub records: usize,
}

/// Merged records from every source, in source order, plus how each source
/// fared. Records are not deduplicated here.
#[derive(Debug, Clone, Serialize)]
pub struct Aggregate<T> {
    pub run_id: Uuid,
    pub records: Vec<T>,
    pub sources: Vec<SourceReport>,
}

impl<T> Aggregate<T> {
    pub fn live_count(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Live))
    }

    pub fn fallback_count(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Fallback { .. }))
    }

    pub fn failed_count(&self) -> usize {
        self.count(|o| matches!(o, SourceOutcome::Failed { .. }))
    }

    /// No source produced live data.
    pub fn is_degraded(&self) -> bool {
        !self.sources.is_empty() && self.live_count() == 0
    }

    pub fn map_records<U>(self, f: impl FnOnce(Vec<T>) -> Vec<U>) -> Aggregate<U> {
        Aggregate {
            run_id: self.run_id,
            records: f(self.records),
            sources: self.sources,
        }
    }

    fn count(&self, pred: impl Fn(&SourceOutcome) -> bool) -> usize {
        self.sources.iter().filter(|s| pred(&s.outcome)).count()
    }
}

/// Run every source concurrently and merge what they return. A source that
/// errors contributes nothing; the rest still count.
pub async fn aggregate_all<T: Send>(label: &str, sources: &[Arc<dyn SourceFetcher<T>>]) -> Aggregate<T> {
    let run_id = Uuid::new_v4();
    info!(%run_id, label, sources = sources.len(), "Aggregation started");

    let settled = join_all(sources.iter().map(|source| async move {
        let result = source.fetch().await;
        (source.name().to_string(), result)
    }))
    .await;

    let mut records = Vec::new();
    let mut reports = Vec::with_capacity(settled.len());

    for (name, result) in settled {
        match result {
            Ok(harvest) => {
                let outcome = match harvest.origin {
                    Origin::Live => SourceOutcome::Live,
                    Origin::Fallback(reason) => SourceOutcome::Fallback { reason },
                };
                reports.push(SourceReport {
                    source: name,
                    outcome,
                    records: harvest.records.len(),
                });
                records.extend(harvest.records);
            }
            Err(e) => {
                error!(%run_id, source = name.as_str(), error = %format!("{e:#}"), "Source failed, contributing nothing");
                reports.push(SourceReport {
                    source: name,
                    outcome: SourceOutcome::Failed { error: format!("{e:#}") },
                    records: 0,
                });
            }
        }
    }

    let aggregate = Aggregate {
        run_id,
        records,
        sources: reports,
    };

    info!(
        %run_id,
        label,
        records = aggregate.records.len(),
        live = aggregate.live_count(),
        fallback = aggregate.fallback_count(),
        failed = aggregate.failed_count(),
        "Aggregation complete"
    );
    if aggregate.is_degraded() {
        warn!(%run_id, label, "No source returned live data; results are curated or empty");
    }

    aggregate
}
