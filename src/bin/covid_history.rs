use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use covid_history::cache::SnapshotCache;
use covid_history::config::{ConfigLoader, ResolvedConfig};
use covid_history::domain::{ALL_PROVINCES, DerivedRow, Metric, Selection};
use covid_history::error::HistoryError;
use covid_history::feed::FeedHttpClient;
use covid_history::output::{JsonOutput, QueryResult, RefreshResult};
use covid_history::query::list_countries;
use covid_history::store::FileStorage;
use covid_history::tui::ChartView;

type Cache = SnapshotCache<FeedHttpClient, FileStorage>;

#[derive(Parser)]
#[command(name = "covid-history")]
#[command(about = "COVID-19 case history per country and province, with daily new cases")]
#[command(version)]
struct Cli {
    /// Path to a covid-history.json config file
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Re-fetch all feeds and overwrite the cached snapshot")]
    Refresh,
    #[command(about = "List countries in the cached snapshot")]
    Countries,
    #[command(about = "List provinces of a country (\"<all>\" first)")]
    Provinces { country: String },
    #[command(about = "Print the case history of a selection as JSON")]
    Query(SelectionArgs),
    #[command(about = "Show new and cumulated cases of a selection as bar charts")]
    Chart(SelectionArgs),
}

#[derive(Args, Clone)]
struct SelectionArgs {
    #[arg(long)]
    country: String,

    #[arg(long, default_value = ALL_PROVINCES)]
    province: String,

    #[arg(long = "metric", value_enum, default_values_t = [Metric::Confirmed, Metric::Deaths])]
    metrics: Vec<Metric>,

    /// Refresh the snapshot before querying
    #[arg(long)]
    refresh: bool,
}

impl SelectionArgs {
    fn selection(&self) -> Selection {
        Selection::province(self.country.clone(), self.province.clone())
    }
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<HistoryError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &HistoryError) -> u8 {
    match error {
        HistoryError::ConfigRead(_) | HistoryError::ConfigParse(_) => 2,
        HistoryError::RefreshFailed { .. }
        | HistoryError::FeedHttp(_)
        | HistoryError::FeedStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = ConfigLoader::resolve(cli.config.as_deref())?;
    let cache = build_cache(&config)?;

    match cli.command {
        Commands::Refresh => {
            let snapshot = cache.refresh()?;
            JsonOutput::print_refresh(&RefreshResult {
                rows: snapshot.len(),
                countries: list_countries(&snapshot).len(),
                snapshot_path: config.snapshot_path.to_string(),
            })
            .into_diagnostic()
        }
        Commands::Countries => {
            let countries = cache.list_countries()?;
            JsonOutput::print_names(&countries).into_diagnostic()
        }
        Commands::Provinces { country } => {
            let provinces = cache.list_provinces(&country)?;
            JsonOutput::print_names(&provinces).into_diagnostic()
        }
        Commands::Query(args) => {
            let selection = args.selection();
            let rows = run_query(&cache, &args, &selection)?;
            JsonOutput::print_query(&QueryResult {
                selection: &selection,
                rows: &rows,
            })
            .into_diagnostic()
        }
        Commands::Chart(args) => {
            let selection = args.selection();
            let rows = run_query(&cache, &args, &selection)?;
            ChartView::new(selection, rows, args.metrics).run()
        }
    }
}

fn build_cache(config: &ResolvedConfig) -> Result<Cache, HistoryError> {
    let feed = FeedHttpClient::new(&config.base_url, config.timeout)?;
    let storage = FileStorage::new(config.snapshot_path.clone());
    Ok(SnapshotCache::new(feed, storage, config.pipeline.clone()))
}

fn run_query(
    cache: &Cache,
    args: &SelectionArgs,
    selection: &Selection,
) -> Result<Vec<DerivedRow>, HistoryError> {
    if args.refresh {
        cache.refresh()?;
    } else if let Some(age) = cache.age() {
        tracing::debug!(age_secs = age.as_secs(), "using cached snapshot");
    }
    cache.query(selection, &args.metrics)
}
