use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use tour_quality_insights::backlog::SuggestionFilter;
use tour_quality_insights::loader;
use tour_quality_insights::models::ProductLine;
use tour_quality_insights::report;
use tour_quality_insights::{
    ActionFilter, CorrectiveActionInput, EngineConfig, FilterSpec, IssueScope, Period,
    QualityEngine,
};

#[derive(Parser)]
#[command(name = "tour-quality")]
#[command(about = "Survey quality analytics for tour destinations", long_about = None)]
struct Cli {
    /// Dataset JSON holding destinations, tours, responses and actions
    #[arg(long, env = "TOUR_QUALITY_DATA", global = true, default_value = "dataset.json")]
    data: PathBuf,
    /// First day of bucket 0
    #[arg(long, env = "TOUR_QUALITY_EPOCH", global = true)]
    epoch: Option<NaiveDate>,
    /// Pin the current period to the one containing this date
    #[arg(long, env = "TOUR_QUALITY_AS_OF", global = true)]
    as_of: Option<NaiveDate>,
    /// Compare against the period this many buckets back
    #[arg(long, global = true, default_value_t = 1)]
    lookback: u32,
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Clone)]
struct FilterArgs {
    /// Include responses at or above the satisfaction threshold
    #[arg(long)]
    all_scores: bool,
    #[arg(long)]
    destination: Option<String>,
    #[arg(long)]
    product_line: Option<ProductLine>,
    #[arg(long)]
    dmc: Option<String>,
    #[arg(long)]
    coordinator: Option<String>,
    #[arg(long, requires = "until")]
    since: Option<NaiveDate>,
    #[arg(long, requires = "since")]
    until: Option<NaiveDate>,
}

impl FilterArgs {
    fn to_spec(&self) -> FilterSpec {
        let mut spec = FilterSpec::default().below_threshold(!self.all_scores);
        spec.destination_id = self.destination.clone();
        spec.product_line = self.product_line;
        spec.dmc_name = self.dmc.clone();
        spec.coordinator_name = self.coordinator.clone();
        if let (Some(since), Some(until)) = (self.since, self.until) {
            spec = spec.between(since, until);
        }
        spec
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum PeriodArg {
    Week,
    Month,
    Quarter,
}

impl From<PeriodArg> for Period {
    fn from(value: PeriodArg) -> Self {
        match value {
            PeriodArg::Week => Period::Week,
            PeriodArg::Month => Period::Month,
            PeriodArg::Quarter => Period::Quarter,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScopeArg {
    All,
    Destination,
    Tour,
}

impl From<ScopeArg> for IssueScope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::All => IssueScope::All,
            ScopeArg::Destination => IssueScope::Destination,
            ScopeArg::Tour => IssueScope::Tour,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Per-destination averages, below-threshold share and trend delta
    Summary {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value = "week")]
        period: PeriodArg,
        /// Only destinations that declined, most-worsening first
        #[arg(long)]
        worsening: bool,
    },
    /// Issue tags ranked by occurrence with severity breakdown
    Issues {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value = "all")]
        scope: ScopeArg,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Period series for one destination
    Trend {
        #[arg(long)]
        destination: String,
        #[arg(long, value_enum, default_value = "week")]
        period: PeriodArg,
        /// Include responses at or above the satisfaction threshold
        #[arg(long)]
        all_scores: bool,
    },
    /// Before/after impact of corrective actions
    Impact {
        #[arg(long)]
        destination: Option<String>,
        #[arg(long)]
        issue_tag: Option<String>,
    },
    /// Open suggested actions, most urgent first
    Backlog {
        #[arg(long)]
        destination: Option<String>,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, value_enum, default_value = "week")]
        period: PeriodArg,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Record a corrective action from a JSON file and save the dataset
    RecordAction {
        #[arg(long)]
        input: PathBuf,
    },
    /// Import survey responses from a CSV file into the dataset
    Import {
        #[arg(long)]
        csv: PathBuf,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open_engine(cli: &Cli) -> anyhow::Result<QualityEngine> {
    let dataset = loader::load_dataset(&cli.data)?;
    let mut config = EngineConfig {
        as_of: cli.as_of,
        lookback_periods: cli.lookback,
        ..EngineConfig::default()
    };
    if let Some(epoch) = cli.epoch {
        config.epoch = epoch;
    }
    let engine = QualityEngine::new(dataset, config).context("invalid engine configuration")?;
    let integrity = engine.store().integrity();
    if !integrity.is_clean() {
        tracing::warn!(?integrity, "dataset has dangling references; affected records are skipped");
    }
    Ok(engine)
}

fn read_action_input(path: &Path) -> anyhow::Result<CorrectiveActionInput> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("invalid action input in {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Summary {
            filter,
            period,
            worsening,
        } => {
            let engine = open_engine(&cli)?;
            let responses = engine.filter_responses(&filter.to_spec())?;
            let period = Period::from(*period);
            let summaries = if *worsening {
                engine.worsening_destinations(&responses, period)
            } else {
                engine.destination_summaries(&responses, period)
            };

            if cli.json {
                return print_json(&summaries);
            }
            if summaries.is_empty() {
                println!("No responses matched this filter.");
                return Ok(());
            }
            for summary in &summaries {
                let delta = summary
                    .delta
                    .map_or_else(|| "n/a".to_string(), |d| format!("{d:+.2}"));
                println!(
                    "- {} avg {:.2}, {}% below 8, delta {}, top issue {} ({} responses)",
                    summary.destination_name,
                    summary.avg_overall,
                    summary.pct_below_display(),
                    delta,
                    summary.top_issue.as_deref().unwrap_or("none"),
                    summary.response_count
                );
            }
        }
        Commands::Issues {
            filter,
            scope,
            limit,
        } => {
            let engine = open_engine(&cli)?;
            let responses = engine.filter_responses(&filter.to_spec())?;
            let clusters = engine.aggregate_issues(&responses, IssueScope::from(*scope));

            if cli.json {
                return print_json(&clusters.rows());
            }
            if clusters.is_empty() {
                println!("No annotated issues for this filter.");
                return Ok(());
            }
            for key in clusters.keys() {
                println!("{key}:");
                for (tag, issue) in clusters.ranked(key).into_iter().take(*limit) {
                    println!(
                        "  - {} x{} (high {}, medium {}, low {})",
                        tag,
                        issue.count,
                        issue.severity_counts.high,
                        issue.severity_counts.medium,
                        issue.severity_counts.low
                    );
                }
            }
        }
        Commands::Trend {
            destination,
            period,
            all_scores,
        } => {
            let engine = open_engine(&cli)?;
            engine.store().require_destination(destination)?;
            let spec = FilterSpec::default()
                .below_threshold(!*all_scores)
                .destination(destination.clone());
            let responses = engine.filter_responses(&spec)?;
            let points = engine.series(destination, &responses, Period::from(*period));

            if cli.json {
                return print_json(&points);
            }
            if points.is_empty() {
                println!("No responses for {destination}.");
                return Ok(());
            }
            for point in &points {
                println!(
                    "{}  avg {:.2}  {:>3.0}% below  ({} responses)",
                    point.period_label,
                    point.avg_overall,
                    point.pct_below_threshold,
                    point.response_count
                );
            }
        }
        Commands::Impact {
            destination,
            issue_tag,
        } => {
            let engine = open_engine(&cli)?;
            let filter = ActionFilter {
                destination_id: destination.clone(),
                issue_tag: issue_tag.clone(),
            };
            let summary = engine.impact_summary(&filter);

            if cli.json {
                return print_json(&summary);
            }
            println!(
                "{} corrective actions: avg score {:+.2}, below-8 share {:+.1} pts improvement",
                summary.count, summary.avg_score_improvement, summary.avg_pct_improvement
            );
            for row in engine.action_impacts(&filter) {
                println!(
                    "- {} [{}] {}: score {:+.2}, below-8 {:+.1} pts",
                    row.action_id, row.destination_id, row.issue_tag, row.score_delta, row.pct_delta
                );
            }
        }
        Commands::Backlog { destination } => {
            let engine = open_engine(&cli)?;
            let filter = SuggestionFilter {
                destination_id: destination.clone(),
                ..SuggestionFilter::default()
            };
            let backlog = engine.suggestion_backlog(&filter);

            if cli.json {
                return print_json(&backlog);
            }
            println!(
                "{} open suggestions, {} resolved by corrective actions.",
                backlog.open.len(),
                backlog.resolved
            );
            for action in &backlog.open {
                println!(
                    "- {} {:?} {} ({:?}, {} tours)",
                    action.id,
                    action.priority,
                    action.issue_tag,
                    action.status,
                    action.affected_tours
                );
            }
        }
        Commands::Report {
            filter,
            period,
            out,
        } => {
            let engine = open_engine(&cli)?;
            let report = report::build_report(&engine, &filter.to_spec(), Period::from(*period))?;
            std::fs::write(out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::RecordAction { input } => {
            let engine = open_engine(&cli)?;
            let input = read_action_input(input)?;
            let id = engine.record_corrective_action(&input)?;

            let mut dataset = loader::load_dataset(&cli.data)?;
            dataset.corrective_actions = engine.store().corrective_actions();
            loader::save_dataset(&cli.data, &dataset)?;
            println!("Recorded corrective action {id}.");
        }
        Commands::Import { csv } => {
            let mut dataset = loader::load_dataset(&cli.data)?;
            let incoming = loader::import_responses_csv(csv)?;
            let inserted = loader::merge_responses(&mut dataset, incoming);
            loader::save_dataset(&cli.data, &dataset)?;
            println!("Inserted {inserted} responses from {}.", csv.display());
        }
    }

    Ok(())
}
