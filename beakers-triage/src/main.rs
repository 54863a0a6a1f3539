//! beakers-triage - article triage and weekly selection
//!
//! Subcommands:
//! - `triage`: score a batch of candidates and route them
//! - `upgrade`: re-score evidence for low-evidence articles with full text
//! - `select`: pick each discipline's issue for a period
//! - `show`: list a period's selected issue
//! - `mark-fulltext`: record full-text acquisition for an article

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use beakers_common::config as common_config;
use beakers_triage::config::TriageConfig;
use beakers_triage::db;
use beakers_triage::models::{AccessState, ArticleCandidate, FullTextStatus, SelectionOutcome, Slot};
use beakers_triage::services::{
    select_weekly_issue, EvidenceUpgrader, FileFullTextSource, ModelCaller, OllamaClient,
    ResponseCache, ScoringCommittee, TriageRunner,
};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const DEFAULT_DISCIPLINES: &str = "biology,chemistry,physics,ai,engineering,mathematics";

/// Command-line arguments for beakers-triage
#[derive(Parser, Debug)]
#[command(name = "beakers-triage")]
#[command(about = "Article triage and weekly selection for The Beakers")]
#[command(version)]
struct Args {
    /// Bootstrap config file
    #[arg(long, global = true, env = "BEAKERS_CONFIG")]
    config: Option<PathBuf>,

    /// Root folder holding the database and response cache
    #[arg(long, global = true, env = "BEAKERS_ROOT_FOLDER")]
    root_folder: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Score candidates with the builder/skeptic committee
    Triage {
        /// Period key (YYYY-MM-DD); defaults to today
        #[arg(long)]
        week: Option<String>,

        /// JSON array of candidate articles
        #[arg(long)]
        candidates: PathBuf,

        /// Comma-separated disciplines to keep
        #[arg(long, default_value = DEFAULT_DISCIPLINES)]
        disciplines: String,

        /// Max articles to process
        #[arg(long)]
        limit: Option<usize>,

        /// List what would be triaged without calling models
        #[arg(long)]
        dry_run: bool,
    },

    /// Re-score E/H from full text for low-evidence articles
    Upgrade {
        #[arg(long, default_value = "20")]
        limit: usize,

        #[arg(long)]
        dry_run: bool,
    },

    /// Select the weekly issue per discipline
    Select {
        /// Period key (YYYY-MM-DD); defaults to today
        #[arg(long)]
        week: Option<String>,

        #[arg(long, default_value = DEFAULT_DISCIPLINES)]
        disciplines: String,

        /// Compute the selection without writing it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show selected issue rows
    Show {
        #[arg(long)]
        week: Option<String>,

        #[arg(long)]
        discipline: Option<String>,

        /// indepth, digest or blurb
        #[arg(long)]
        slot: Option<String>,
    },

    /// Record full-text acquisition for an article
    MarkFulltext {
        #[arg(long)]
        url: String,

        /// unknown, abstract_only, oa_pdf_found or paywalled
        #[arg(long)]
        access_state: String,

        /// Extracted text file, relative to the root folder or absolute
        #[arg(long)]
        path: Option<String>,

        /// Where the full text came from (e.g. unpaywall)
        #[arg(long)]
        source: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let toml_config = common_config::load_toml_config(args.config.as_deref())
        .context("Failed to load bootstrap config")?;

    let level = toml_config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("beakers_triage={level},beakers_common={level}").into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let root_folder = common_config::resolve_root_folder(args.root_folder.as_deref(), &toml_config);
    let config = TriageConfig::from_toml(&root_folder, &toml_config)
        .context("Invalid triage configuration")?;

    info!("beakers-triage {}", env!("CARGO_PKG_VERSION"));
    info!("Root folder: {}", root_folder.display());
    info!("Database: {}", config.database_path.display());

    let pool = db::open_database(&config.database_path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database_path.display()))?;

    match args.command {
        Command::Triage {
            week,
            candidates,
            disciplines,
            limit,
            dry_run,
        } => {
            let week = resolve_week(week)?;
            let disciplines = parse_disciplines(&disciplines);
            let mut candidates = load_candidates(&candidates)?;
            candidates.retain(|c| disciplines.iter().any(|d| d == &c.discipline));
            if let Some(limit) = limit {
                candidates.truncate(limit);
            }

            let committee = ScoringCommittee::new(model_caller(&config)?, pool.clone());
            let runner = TriageRunner::new(committee, pool, config.concurrency)
                .with_run_config(serde_json::to_string(&config)?);
            let summary = runner
                .run(&week, candidates, dry_run)
                .await
                .context("Triage run failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Upgrade { limit, dry_run } => {
            let source = Arc::new(FileFullTextSource::new(&root_folder));
            let upgrader = EvidenceUpgrader::new(model_caller(&config)?, pool, source);
            let summary = upgrader
                .upgrade_batch(limit, dry_run)
                .await
                .context("Evidence upgrade failed")?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Select {
            week,
            disciplines,
            dry_run,
        } => {
            let week = resolve_week(week)?;
            for discipline in parse_disciplines(&disciplines) {
                let outcome = select_weekly_issue(&pool, &week, &discipline, &config.quotas, dry_run)
                    .await
                    .with_context(|| format!("Selection failed for {}", discipline))?;
                report_selection(&week, &discipline, &outcome);
            }
        }

        Command::Show {
            week,
            discipline,
            slot,
        } => {
            let week = resolve_week(week)?;
            let slot = slot
                .map(|s| s.parse::<Slot>())
                .transpose()
                .map_err(anyhow::Error::msg)?;
            show_selection(&pool, &week, discipline.as_deref(), slot).await?;
        }

        Command::MarkFulltext {
            url,
            access_state,
            path,
            source,
        } => {
            let access_state: AccessState = access_state.parse().map_err(anyhow::Error::msg)?;
            let status = FullTextStatus {
                ok: access_state.has_fulltext() && path.is_some(),
                path,
                source,
                fetched_at: None,
                access_state,
            };
            let updated = db::results::record_fulltext(&pool, &url, &status).await?;
            if updated == 0 {
                bail!("No triage results for {}", url);
            }
            info!(url = %url, rows = updated, access_state = %access_state, "Full text recorded");
        }
    }

    Ok(())
}

fn model_caller(config: &TriageConfig) -> Result<ModelCaller> {
    let client = OllamaClient::from_config(&config.inference)
        .context("Failed to build inference client")?;
    let cache = ResponseCache::open(&config.cache_dir)
        .with_context(|| format!("Failed to open cache {}", config.cache_dir.display()))?;
    Ok(ModelCaller::new(Arc::new(client), cache, config.inference.clone()))
}

fn resolve_week(week: Option<String>) -> Result<String> {
    let week = week.unwrap_or_else(|| chrono::Local::now().format("%Y-%m-%d").to_string());
    NaiveDate::parse_from_str(&week, "%Y-%m-%d")
        .with_context(|| format!("Invalid week '{}', expected YYYY-MM-DD", week))?;
    Ok(week)
}

fn parse_disciplines(list: &str) -> Vec<String> {
    list.split(',')
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .collect()
}

fn load_candidates(path: &Path) -> Result<Vec<ArticleCandidate>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read candidates {}", path.display()))?;
    let candidates: Vec<ArticleCandidate> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse candidates {}", path.display()))?;
    Ok(candidates)
}

fn report_selection(week: &str, discipline: &str, outcome: &SelectionOutcome) {
    let (label, count, shortfalls) = match outcome {
        SelectionOutcome::Selected { rows, shortfalls } => ("selected", rows.len(), shortfalls.as_slice()),
        SelectionOutcome::Planned { rows, shortfalls } => {
            ("[dry-run] planned", rows.len(), shortfalls.as_slice())
        }
        SelectionOutcome::AlreadySelected { existing } => ("already selected", *existing, &[][..]),
    };
    println!("{} {}: {} ({} rows)", week, discipline, label, count);
    for row in outcome.rows() {
        println!("  {:<8} {:>6.2}  {}", row.slot.as_str(), row.rank_score, row.article_url);
    }
    for shortfall in shortfalls {
        warn!(week_of = week, discipline, "{}", shortfall);
    }
}

async fn show_selection(
    pool: &SqlitePool,
    week: &str,
    discipline: Option<&str>,
    slot: Option<Slot>,
) -> Result<()> {
    let rows = db::selections::load_selection(pool, week, discipline, slot).await?;
    if rows.is_empty() {
        println!("No selection for {}", week);
        return Ok(());
    }

    let mut current = "";
    for row in &rows {
        if row.discipline != current {
            println!("{} / {}", week, row.discipline);
            current = &row.discipline;
        }
        let frontier = if row.is_frontier() { " [frontier]" } else { "" };
        println!(
            "  {:<8} {:>6.2}  {}{}",
            row.slot.as_str(), row.rank_score, row.article_url, frontier
        );
    }
    Ok(())
}
