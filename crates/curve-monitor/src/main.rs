use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use curve_core::{CurveStateTracker, SeriesPair};
use curve_monitor::logging;
use curve_monitor::render::{self, ChartStyle};
use curve_monitor::{CurveMonitor, JsonStateStore, MonitorConfig, PairOutcome};
use fred_client::FredClient;
use notification_service::{LogNotifier, NotificationConfig, NotificationService};

#[derive(Parser)]
#[command(name = "yieldwatch")]
#[command(about = "Treasury yield curve inversion monitor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Check the newest observation of every pair and alert on transitions
    Check {
        /// Log alerts only and leave the state file untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Scan the full history for inversions and disinversions
    Scan {
        /// Only scan this pair (by name)
        #[arg(short, long)]
        pair: Option<String>,

        /// First date to fetch (YYYY-MM-DD)
        #[arg(short, long)]
        start: Option<NaiveDate>,

        /// Write an SVG chart per pair
        #[arg(long)]
        svg: Option<PathBuf>,

        /// Write the scan results as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Print the persisted per-pair state
    State,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let log_file = std::env::var_os("YIELDWATCH_LOG_FILE")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    logging::init(log_file.as_deref())?;

    let cli = Cli::parse();
    let config = MonitorConfig::from_env()?;

    match cli.command.unwrap_or(Commands::Check { dry_run: false }) {
        Commands::Check { dry_run } => run_check(&config, dry_run).await,
        Commands::Scan { pair, start, svg, json } => {
            run_scan(&config, pair.as_deref(), start, svg, json).await
        }
        Commands::State => show_state(&config).await,
    }
}

fn build_monitor(config: &MonitorConfig) -> Result<CurveMonitor<FredClient>> {
    let client = FredClient::new(config.fred_config()?);
    Ok(CurveMonitor::new(
        client,
        CurveStateTracker::new(config.tracker),
        config.frequency,
        config.recent_window,
    ))
}

async fn run_check(config: &MonitorConfig, dry_run: bool) -> Result<()> {
    let monitor = build_monitor(config)?;
    let store = JsonStateStore::new(config.state_file.clone());
    let mut document = store.load().await?;

    let notifier = if dry_run {
        NotificationService::with_channels(vec![Box::new(LogNotifier)])
    } else {
        NotificationService::new(&NotificationConfig::from_env())
    };
    tracing::info!(
        "Checking {} pairs (channels: {})",
        config.pairs.len(),
        notifier.channel_names().join(", ")
    );

    let summary = monitor.check_pairs(&config.pairs, &mut document, &notifier).await;

    for outcome in &summary.outcomes {
        match outcome {
            PairOutcome::Checked { pair_name, event: Some(event), .. } => {
                println!("{}: {}", pair_name, event)
            }
            PairOutcome::Checked { pair_name, status, .. } => {
                println!("{}: {:?}", pair_name, status)
            }
            PairOutcome::Skipped { pair_name, error } => {
                println!("{}: skipped ({})", pair_name, error)
            }
        }
    }

    if dry_run {
        tracing::info!("Dry run, state not saved");
    } else {
        store.save(&document).await?;
    }

    if summary.checked() == 0 {
        tracing::warn!("No pair could be checked ({} skipped)", summary.skipped());
    }
    Ok(())
}

async fn run_scan(
    config: &MonitorConfig,
    pair: Option<&str>,
    start: Option<NaiveDate>,
    svg: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<()> {
    let pairs: Vec<SeriesPair> = match pair {
        Some(name) => vec![config
            .find_pair(name)
            .cloned()
            .with_context(|| format!("Unknown pair '{}'", name))?],
        None => config.pairs.clone(),
    };
    let start = start.unwrap_or(config.start_date);
    let monitor = build_monitor(config)?;

    let mut reports = Vec::with_capacity(pairs.len());
    for pair in &pairs {
        match monitor.scan_pair(pair, start).await {
            Ok(report) => {
                println!("{}", render::render_text(&report));
                reports.push(report);
            }
            Err(e) => tracing::error!("Error scanning {}: {}", pair.name, e),
        }
    }

    if reports.is_empty() {
        tracing::warn!("No pair could be scanned");
        return Ok(());
    }

    if let Some(base) = svg {
        let multiple = pairs.len() > 1;
        for report in &reports {
            let path = render::chart_path(&base, &report.pair, multiple);
            let written = render::render_svg(&path, report, &ChartStyle::for_pair(&report.pair)).await?;
            tracing::info!("Chart written to {}", written.display());
        }
    }

    if let Some(path) = json {
        render::write_json(&path, &reports).await?;
        tracing::info!("Scan results written to {}", path.display());
    }

    Ok(())
}

async fn show_state(config: &MonitorConfig) -> Result<()> {
    let store = JsonStateStore::new(config.state_file.clone());
    let document = store.load().await?;

    if document.is_empty() {
        println!("No state recorded in {}", store.path().display());
        return Ok(());
    }

    for state in document.states() {
        let current = state
            .previous_state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let checked = state
            .last_check_date
            .map(|d| d.to_string())
            .unwrap_or_else(|| "never".to_string());
        println!("{:<20} {:<10} last checked {}", state.pair_name, current, checked);
    }

    for pair in config.pairs.iter().filter(|p| document.get(&p.name).last_check_date.is_none()) {
        println!("{:<20} {:<10} not yet checked", pair.name, "-");
    }

    Ok(())
}
