//! CLI entry point for the dead-stations pipeline.
//!
//! Provides subcommands for merging upstream band results, exporting dead
//! stations, running the journey passes against both providers and
//! collecting the final records.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dead_stations::analyzers::aggregate::merge_all;
use dead_stations::analyzers::dead::{collect, export_dead_stations};
use dead_stations::config::{DataLayout, DayType, Provider, RunSlot, TimeBand};
use dead_stations::fetch::auth::UrlParam;
use dead_stations::fetch::{BasicClient, BudgetConfig, Governed, RequestBudgetGovernor};
use dead_stations::infra::{google, vbb};
use dead_stations::pipeline::{
    JourneyPass, JourneyQueryExecutor, ResultStore, RunSummary, StopIdentifierResolver,
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "dead_stations")]
#[command(about = "Find transit stops without a connection to a city centre", long_about = None)]
struct Cli {
    /// Root of the data directory
    #[arg(long, global = true, default_value = "data")]
    data_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge the six band result directories into one record per stop
    Merge {
        /// Maximum number of stops merged concurrently
        #[arg(short, long, default_value_t = 32)]
        concurrency: usize,
    },
    /// Write dead_stations.csv and dead_stations.geojson from the merged records
    DeadStations,
    /// Query transport.rest for the dead stops of one day type and time band
    Vbb {
        #[arg(value_enum)]
        day: DayType,
        #[arg(value_enum)]
        band: TimeBand,
    },
    /// Query Google Maps directions for the stops still dead after the vbb pass
    Google {
        #[arg(value_enum)]
        day: DayType,
        #[arg(value_enum)]
        band: TimeBand,
    },
    /// Fold all records of the Google pass into a single JSON array
    Collect,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/dead_stations.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("dead_stations.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(env_filter("RUST_LOG", "info")?);

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(env_filter("RUST_LOG_JSON", "debug")?);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let layout = DataLayout::new(cli.data_dir);

    match cli.command {
        Commands::Merge { concurrency } => {
            merge_all(&layout, concurrency).await?;
        }
        Commands::DeadStations => {
            export_dead_stations(&layout)?;
        }
        Commands::Vbb { day, band } => {
            run_vbb(&layout, RunSlot::new(day, band)).await?;
        }
        Commands::Google { day, band } => {
            run_google(&layout, RunSlot::new(day, band)).await?;
        }
        Commands::Collect => {
            collect(&layout)?;
        }
    }

    Ok(())
}

fn env_filter(var: &str, default_level: &str) -> Result<EnvFilter> {
    Ok(EnvFilter::from_env(var).add_directive(default_level.parse()?))
}

fn governor(provider: Provider) -> Arc<RequestBudgetGovernor> {
    Arc::new(RequestBudgetGovernor::new(BudgetConfig::per_minute(
        provider.request_threshold(),
    )))
}

#[tracing::instrument(skip(layout, slot), fields(slot = %slot))]
async fn run_vbb(layout: &DataLayout, slot: RunSlot) -> Result<()> {
    let provider = Provider::Vbb;
    let base_url =
        std::env::var("VBB_BASE_URL").unwrap_or_else(|_| vbb::DEFAULT_BASE_URL.to_string());
    let governor = governor(provider);

    let client = Arc::new(vbb::VbbClient::new(
        Governed::new(BasicClient::new()?, governor.clone()),
        base_url,
    ));
    let executor = JourneyQueryExecutor::with_resolver(
        client.clone(),
        StopIdentifierResolver::new(client),
    );

    run_pass(layout, provider, slot, executor, &governor).await
}

#[tracing::instrument(skip(layout, slot), fields(slot = %slot))]
async fn run_google(layout: &DataLayout, slot: RunSlot) -> Result<()> {
    let provider = Provider::Google;
    let api_key =
        std::env::var("GOOGLE_MAPS_API_KEY").context("GOOGLE_MAPS_API_KEY must be set")?;
    let governor = governor(provider);

    let client = google::GoogleDirectionsClient::new(
        UrlParam::new(
            Governed::new(BasicClient::new()?, governor.clone()),
            "key",
            api_key,
        ),
        google::DEFAULT_BASE_URL,
    );
    let executor = JourneyQueryExecutor::without_resolver(Arc::new(client));

    run_pass(layout, provider, slot, executor, &governor).await
}

async fn run_pass(
    layout: &DataLayout,
    provider: Provider,
    slot: RunSlot,
    executor: JourneyQueryExecutor,
    governor: &RequestBudgetGovernor,
) -> Result<()> {
    let (input_dir, target_dir) = layout.pass_dirs(provider);
    let store = ResultStore::new(input_dir, target_dir)?;

    let mut pass = JourneyPass::new(provider, slot, store, layout.nearby_dir(), executor)?;
    let mut summary: RunSummary = pass.run().await?;
    summary.requests = governor.total();

    info!(
        stops = summary.stops,
        reused = summary.reused,
        queried = summary.queried,
        connections_added = summary.connections_added,
        rejected = summary.rejected,
        skipped = summary.skipped,
        failed_stops = summary.failed_stops,
        requests = summary.requests,
        "Journey pass complete"
    );
    Ok(())
}
