use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use bountyscope_common::{sanitize_input, Config};
use bountyscope_scout::scanner::{RepoSearchOptions, DEFAULT_ISSUE_TERMS};
use bountyscope_scout::scout::Scout;

#[derive(Parser)]
#[command(name = "bountyscope", about = "Discover smart-contract bug bounty programs and repositories")]
struct Cli {
    /// Write JSON here instead of stdout
    #[arg(long, global = true)]
    out: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bounty programs from every platform
    Programs,
    /// Search repositories for smart contract code
    Repos {
        /// Search terms; each runs as its own query
        #[arg(long = "query", required = true)]
        queries: Vec<String>,
        #[arg(long, default_value = "solidity")]
        language: String,
        #[arg(long, default_value_t = 10)]
        min_stars: u32,
        #[arg(long, default_value_t = 50)]
        max_results: usize,
        /// Only repositories mentioning a bounty program
        #[arg(long)]
        has_bounty: bool,
    },
    /// Bounty files and contract sources of one repository
    Walk {
        /// owner/name
        repo: String,
        #[arg(long)]
        max_files: Option<usize>,
    },
    /// Prioritized targets derived from discovered programs
    Targets,
    /// Issues in one repository matching security terms
    Issues {
        /// owner/name
        repo: String,
        #[arg(long = "term")]
        terms: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("bountyscope=info".parse()?))
        .with_writer(std::io::stderr);
    if cli.json_logs {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    let mut config = Config::from_env().context("Invalid configuration")?;
    if let Command::Walk { max_files: Some(n), .. } = &cli.command {
        config.max_files = *n;
    }
    config.log_redacted();

    let cancelled = Arc::new(AtomicBool::new(false));
    {
        let cancelled = cancelled.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight requests");
                cancelled.store(true, Ordering::Relaxed);
            }
        });
    }

    let scout = Scout::from_config(&config, cancelled)?;

    match cli.command {
        Command::Programs => {
            let aggregate = scout.discover_programs().await;
            emit(cli.out.as_deref(), &aggregate)?;
        }
        Command::Repos {
            queries,
            language,
            min_stars,
            max_results,
            has_bounty,
        } => {
            let queries: Vec<String> = queries
                .iter()
                .map(|q| sanitize_input(q))
                .filter(|q| !q.is_empty())
                .collect();
            let options = RepoSearchOptions::builder()
                .language(sanitize_input(&language))
                .min_stars(min_stars)
                .max_results(max_results)
                .has_bounty(has_bounty)
                .build();
            let aggregate = scout.discover_repos(&queries, &options).await;
            emit(cli.out.as_deref(), &aggregate)?;
        }
        Command::Walk { repo, .. } => {
            let walk = scout.walk_repo(&repo).await?;
            emit(cli.out.as_deref(), &walk)?;
        }
        Command::Targets => {
            let targets = scout.targets().await;
            emit(cli.out.as_deref(), &targets)?;
        }
        Command::Issues { repo, terms } => {
            let terms: Vec<String> = terms.iter().map(|t| sanitize_input(t)).collect();
            let mut term_refs: Vec<&str> = terms.iter().map(String::as_str).filter(|t| !t.is_empty()).collect();
            if term_refs.is_empty() {
                term_refs = DEFAULT_ISSUE_TERMS.to_vec();
            }
            let issues = scout.repo_issues(&repo, &term_refs).await?;
            emit(cli.out.as_deref(), &issues)?;
        }
    }

    info!("Done");
    Ok(())
}

fn emit<T: Serialize>(out: Option<&std::path::Path>, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
