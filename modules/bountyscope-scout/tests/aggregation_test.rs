use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use bountyscope_common::{BountyProgram, FallbackCatalog, Platform, Priority, ProgramStatus, TargetKind};
use bountyscope_scout::fixtures::{FailingSource, FixtureCodeHost, FixturePageFetcher, StaticSource};
use bountyscope_scout::sources::{
    all_profiles, platform_profile, FallbackReason, Origin, ProgramSource, SourceFetcher,
};
use bountyscope_scout::{aggregate_all, RateLimiter, RequestPolicy, RetryPolicy, Scout, SourceOutcome};

const IMMUNEFI_URL: &str = "https://immunefi.com/api/bounty";

const IMMUNEFI_PAGE: &str = r#"
    <div class="bounty-card">
      <span class="project-name">Acme Lending</span>
      <p class="description">Lending markets on Ethereum</p>
      <span class="reward">Up to $1M</span>
    </div>
    <div class="program-card">
      <span class="program-title">Acme Lending</span>
      <p class="summary">Duplicate listing</p>
    </div>"#;

fn policy() -> RequestPolicy {
    RequestPolicy::new(
        Arc::new(RateLimiter::new(100, Duration::from_secs(1))),
        RetryPolicy::new(3, Duration::from_millis(50)),
        Arc::new(AtomicBool::new(false)),
    )
}

fn catalog() -> FallbackCatalog {
    FallbackCatalog::builtin().unwrap()
}

fn program(name: &str) -> BountyProgram {
    BountyProgram {
        platform: Platform::ImmuneFi,
        name: name.to_string(),
        url: format!("https://immunefi.com/bounty/{}", name.to_lowercase()),
        description: String::new(),
        reward_range: String::new(),
        technology: Default::default(),
        status: ProgramStatus::Active,
        last_updated: None,
        github_repos: Vec::new(),
        contract_addresses: Vec::new(),
    }
}

#[tokio::test]
async fn failing_source_contributes_nothing() {
    let sources: Vec<Arc<dyn SourceFetcher<BountyProgram>>> = vec![
        Arc::new(StaticSource::new("first", vec![program("Alpha"), program("Beta")])),
        Arc::new(FailingSource::new("second")),
        Arc::new(StaticSource::new("third", vec![program("Gamma")])),
        Arc::new(StaticSource::new("fourth", vec![program("Delta")])),
    ];

    let aggregate = aggregate_all("programs", &sources).await;

    let names: Vec<&str> = aggregate.records.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Alpha", "Beta", "Gamma", "Delta"]);
    assert_eq!(aggregate.sources.len(), 4);
    assert_eq!(aggregate.live_count(), 3);
    assert_eq!(aggregate.failed_count(), 1);
    assert!(!aggregate.is_degraded());
    assert!(matches!(aggregate.sources[1].outcome, SourceOutcome::Failed { .. }));
    assert_eq!(aggregate.sources[1].source, "second");
}

#[tokio::test]
async fn every_source_failing_yields_empty_degraded_result() {
    let sources: Vec<Arc<dyn SourceFetcher<BountyProgram>>> =
        vec![Arc::new(FailingSource::new("a")), Arc::new(FailingSource::new("b"))];

    let aggregate = aggregate_all("programs", &sources).await;

    assert!(aggregate.records.is_empty());
    assert_eq!(aggregate.failed_count(), 2);
    assert!(aggregate.is_degraded());
}

#[tokio::test(start_paused = true)]
async fn unreachable_platform_falls_back_to_curated_programs() {
    let fetcher = Arc::new(FixturePageFetcher::new());
    let source = ProgramSource::new(
        platform_profile(Platform::ImmuneFi),
        fetcher.clone(),
        policy(),
        &catalog(),
    );

    let harvest = source.fetch().await.unwrap();

    assert_eq!(harvest.origin, Origin::Fallback(FallbackReason::LiveFailed));
    let names: Vec<&str> = harvest.records.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["Ethereum Foundation", "Compound", "Chainlink"]);
    assert!(harvest.records.iter().all(|p| p.status == ProgramStatus::Active));
    assert_eq!(fetcher.calls_for(IMMUNEFI_URL), 3);
}

#[tokio::test(start_paused = true)]
async fn empty_listing_falls_back_with_parsed_empty() {
    let fetcher = Arc::new(
        FixturePageFetcher::new().on_page(IMMUNEFI_URL, "<html><body>Loading...</body></html>"),
    );
    let source = ProgramSource::new(platform_profile(Platform::ImmuneFi), fetcher.clone(), policy(), &catalog());

    let harvest = source.fetch().await.unwrap();

    assert_eq!(harvest.origin, Origin::Fallback(FallbackReason::ParsedEmpty));
    assert_eq!(harvest.records.len(), 3);
    assert_eq!(fetcher.calls_for(IMMUNEFI_URL), 1);
}

#[tokio::test(start_paused = true)]
async fn cancelled_run_falls_back_without_fetching() {
    let fetcher = Arc::new(FixturePageFetcher::new().on_page(IMMUNEFI_URL, IMMUNEFI_PAGE));
    let cancelled = RequestPolicy::new(
        Arc::new(RateLimiter::new(100, Duration::from_secs(1))),
        RetryPolicy::new(3, Duration::from_millis(50)),
        Arc::new(AtomicBool::new(true)),
    );
    let source = ProgramSource::new(platform_profile(Platform::ImmuneFi), fetcher.clone(), cancelled, &catalog());

    let harvest = source.fetch().await.unwrap();

    assert_eq!(harvest.origin, Origin::Fallback(FallbackReason::Cancelled));
    assert_eq!(harvest.records.len(), 3);
    assert_eq!(fetcher.total_calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn flaky_listing_recovers_on_retry() {
    let fetcher = Arc::new(FixturePageFetcher::new().on_flaky_page(IMMUNEFI_URL, 2, IMMUNEFI_PAGE));
    let source = ProgramSource::new(platform_profile(Platform::ImmuneFi), fetcher.clone(), policy(), &catalog());

    let harvest = source.fetch().await.unwrap();

    assert_eq!(harvest.origin, Origin::Live);
    assert_eq!(harvest.records.len(), 1, "duplicate card collapses");
    let program = &harvest.records[0];
    assert_eq!(program.name, "Acme Lending");
    assert_eq!(program.url, "https://immunefi.com/bounty/acme-lending");
    assert!(program.technology.contains("solidity"));
    assert_eq!(fetcher.calls_for(IMMUNEFI_URL), 3);
}

#[tokio::test(start_paused = true)]
async fn hackerone_skips_failed_searches_and_filters_non_blockchain() {
    let defi_url = "https://hackerone.com/directory/programs?search=defi";
    let page = r#"
        <div class="program-card"><span class="program-name">Lido Finance</span>
          <p class="description">Liquid staking for Ethereum</p>
          <span class="max-bounty">$2,000,000</span></div>
        <div class="directory-program"><span class="title">Recipe Box</span>
          <p class="summary">Cooking recipes</p></div>"#;
    let fetcher = Arc::new(FixturePageFetcher::new().on_page(defi_url, page));
    let source = ProgramSource::new(platform_profile(Platform::HackerOne), fetcher.clone(), policy(), &catalog());

    let harvest = source.fetch().await.unwrap();

    assert_eq!(harvest.origin, Origin::Live);
    assert_eq!(harvest.records.len(), 1);
    assert_eq!(harvest.records[0].url, "https://hackerone.com/lidofinance");
    assert_eq!(fetcher.total_calls(), 1 + 3 * 3);
}

#[tokio::test(start_paused = true)]
async fn offline_scout_serves_curated_programs_and_targets() {
    let fetcher = Arc::new(FixturePageFetcher::new());
    let cancelled = Arc::new(AtomicBool::new(false));
    let catalog = catalog();
    let sources: Vec<Arc<dyn SourceFetcher<BountyProgram>>> = all_profiles()
        .into_iter()
        .map(|profile| {
            Arc::new(ProgramSource::new(profile, fetcher.clone(), policy(), &catalog))
                as Arc<dyn SourceFetcher<BountyProgram>>
        })
        .collect();
    let scout = Scout::new(sources, Arc::new(FixtureCodeHost::new()), policy(), 20, cancelled);

    let aggregate = scout.discover_programs().await;
    assert_eq!(aggregate.records.len(), 8);
    assert_eq!(aggregate.fallback_count(), 4);
    assert!(aggregate.is_degraded());

    let targets = scout.targets().await;
    assert_eq!(targets.len(), 8);
    assert!(targets.iter().all(|t| t.kind == TargetKind::Protocol));
    assert_eq!(targets[0].priority, Priority::High);
    assert_eq!(targets[7].priority, Priority::Medium);
}
