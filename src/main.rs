//! CLI entry point for the bridgewatch pipeline.
//!
//! Provides subcommands for ingesting the remote bridge inventory (fetch,
//! archive, normalize, persist) and for running the triage pipeline over a
//! previously ingested working set.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use bridgewatch::archive::archive_raw;
use bridgewatch::fetch::{ArcGisQuery, DEFAULT_SERVICE_URL, fetch_all};
use bridgewatch::monitor::{EventClock, LifecycleMonitor};
use bridgewatch::normalize::normalize_all;
use bridgewatch::output::persist_processed;
use bridgewatch::records::load_working_set;
use bridgewatch::triage::{filter_by_condition, propose_repair_actions, schedule_inspections};

#[derive(Parser)]
#[command(name = "bridgewatch")]
#[command(about = "Bridge inventory ingestion and maintenance triage", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch the bridge inventory, archive raw features, and emit the
    /// cleaned CSV plus schema summary
    Ingest {
        /// Feature service URL (base path without /query)
        #[arg(long, default_value = DEFAULT_SERVICE_URL)]
        service_url: String,

        /// Root directory for raw and processed artifacts
        #[arg(short, long, default_value = "data/bridge_inventory")]
        out_dir: PathBuf,

        /// Records to request per API page
        #[arg(short, long, default_value_t = 1000)]
        batch_size: usize,

        /// Cap on fetched features (useful for smoke tests)
        #[arg(short, long)]
        max_features: Option<usize>,

        /// Filename prefix for emitted artifacts
        #[arg(long, default_value = "bridge_inventory")]
        prefix: String,
    },
    /// Run filter/schedule/propose over the newest processed file and report
    /// lifecycle metrics
    Triage {
        /// Directory holding processed working-set files
        #[arg(short, long, default_value = "data/bridge_inventory/processed")]
        data_dir: PathBuf,

        /// Keep records with condition score at or below this value
        #[arg(long, default_value_t = 4.0)]
        max_condition: f64,

        /// Restrict to these risk labels (repeatable, case-insensitive)
        #[arg(long = "risk-level")]
        risk_levels: Vec<String>,

        /// Days of lookahead when building the inspection backlog
        #[arg(long, default_value_t = 30)]
        lead_time_days: i64,

        /// Condition score at or below which a repair is critical
        #[arg(long, default_value_t = 3.0)]
        severe_threshold: f64,

        /// Write the monitor state snapshot to this JSON file
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/bridgewatch.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("bridgewatch.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse().unwrap()));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse().unwrap()));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            service_url,
            out_dir,
            batch_size,
            max_features,
            prefix,
        } => ingest(&service_url, &out_dir, batch_size, max_features, &prefix).await,
        Commands::Triage {
            data_dir,
            max_condition,
            risk_levels,
            lead_time_days,
            severe_threshold,
            export,
        } => triage(
            &data_dir,
            max_condition,
            &risk_levels,
            lead_time_days,
            severe_threshold,
            export.as_deref(),
        ),
    }
}

#[tracing::instrument(skip_all, fields(service_url, batch_size, max_features))]
async fn ingest(
    service_url: &str,
    out_dir: &Path,
    batch_size: usize,
    max_features: Option<usize>,
    prefix: &str,
) -> Result<()> {
    info!(service_url, "Fetching bridge inventory");
    let query = ArcGisQuery::new(service_url)?;
    let features = fetch_all(&query, batch_size, max_features).await?;
    info!(count = features.len(), "Features fetched");

    // Raw archive happens before normalization so a bad normalization pass
    // can never lose source data.
    let raw_dir = out_dir.join("raw");
    let archives = archive_raw(&features, &raw_dir, prefix)?;
    info!(geojson = %archives.geojson.display(), "Raw artifacts saved");

    let rows = normalize_all(&features);
    let processed_dir = out_dir.join("processed");
    let processed = persist_processed(&rows, &processed_dir, prefix)?;
    info!(csv = %processed.csv.display(), schema = %processed.schema.display(), "Ingest complete");

    Ok(())
}

#[tracing::instrument(skip_all, fields(data_dir = %data_dir.display()))]
fn triage(
    data_dir: &Path,
    max_condition: f64,
    risk_levels: &[String],
    lead_time_days: i64,
    severe_threshold: f64,
    export: Option<&Path>,
) -> Result<()> {
    let records = load_working_set(data_dir)?;
    if records.is_empty() {
        warn!(dir = %data_dir.display(), "Working set is empty; nothing to triage");
        return Ok(());
    }
    info!(count = records.len(), "Working set loaded");

    let risks = (!risk_levels.is_empty()).then_some(risk_levels);
    let flagged = filter_by_condition(&records, max_condition, risks);
    info!(flagged = flagged.len(), max_condition, "Condition filter applied");

    let today = Utc::now().date_naive();
    let backlog = schedule_inspections(&flagged, today, lead_time_days);
    let proposals = propose_repair_actions(&flagged, severe_threshold);
    info!(
        backlog = backlog.len(),
        proposals = proposals.len(),
        "Backlog and repair proposals built"
    );

    let mut lifecycle = LifecycleMonitor::new();
    let clock = EventClock { day: 0, t: 0.0, step: 0 };
    lifecycle.record_backlog(&backlog, clock);
    lifecycle.record_inspection_findings(&proposals, EventClock { step: 1, ..clock });

    for (name, value, step) in lifecycle.get_metric_tuples(1) {
        info!(metric = name, value, step, "Lifecycle metric");
    }

    if let Some(path) = export {
        let state = lifecycle.export_state();
        std::fs::write(path, serde_json::to_string_pretty(&state)?)?;
        info!(path = %path.display(), "Monitor state exported");
    }

    Ok(())
}
