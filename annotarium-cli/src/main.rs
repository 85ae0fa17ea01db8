use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use annotarium_core::{AnnotariumError, Config};
use annotarium_harvest::scheduler::sweep_downloads_cache;
use annotarium_harvest::{Orchestrator, Scheduler};
use annotarium_server::AppState;
use annotarium_store::MetadataStore;

#[derive(Parser)]
#[command(name = "annotarium", about = "Genome annotation ingestion and serving platform")]
struct Cli {
    /// Path to a TOML config file; environment variables override it
    #[arg(long, short, env = "ANNOTARIUM_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP server together with the weekly ingestion scheduler
    Serve,
    /// Run one ingestion pipeline pass and exit
    Ingest,
    /// Sweep expired files out of the downloads cache and exit
    SweepCache,
    /// Recompute one annotation's feature summary and statistics from its
    /// on-disk artifacts
    RefreshStats {
        /// Annotation id (hex MD5 of the sorted GFF)
        annotation_id: String,
    },
}

fn main() {
    // Initialize logging with ANNOTARIUM_LOG environment variable support
    let log_level = std::env::var("ANNOTARIUM_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        let exit_code = match e.downcast_ref::<AnnotariumError>() {
            Some(AnnotariumError::Configuration(_)) => 2,
            Some(AnnotariumError::Io(_)) => 3,
            Some(AnnotariumError::Parse(_)) => 4,
            Some(AnnotariumError::Store(_)) => 5,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env(),
    };

    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async {
        match cli.command {
            Commands::Serve => serve(config).await,
            Commands::Ingest => ingest(config).await,
            Commands::SweepCache => {
                let removed = sweep_downloads_cache(
                    &config.storage.downloads_cache_dir,
                    Duration::from_secs(config.storage.downloads_cache_ttl_secs),
                )?;
                println!("removed {removed} expired files");
                Ok(())
            }
            Commands::RefreshStats { annotation_id } => refresh_stats(config, &annotation_id),
        }
    })
}

fn refresh_stats(config: Config, annotation_id: &str) -> anyhow::Result<()> {
    use annotarium_bio::stats::FeatureStatsBuilder;
    use annotarium_bio::{FeatureOverview, IndexedGff};
    use annotarium_store::{Annotation, Modify};

    let store = MetadataStore::open(&config.storage.store_path)?;
    let annotation = store
        .get::<Annotation>(annotation_id)?
        .ok_or_else(|| AnnotariumError::NotFound(format!("annotation {annotation_id}")))?;

    let root = &config.storage.annotations_root;
    let indexed = IndexedGff::open(
        &root.join(&annotation.indexed_file_info.bgzipped_path),
        &root.join(&annotation.indexed_file_info.csi_path),
    )?;

    let summary = FeatureOverview::scan_lines(indexed.scan()?)?;
    let mut builder = FeatureStatsBuilder::default();
    for line in indexed.scan()? {
        builder.push_line(&line?)?;
    }
    let statistics = builder.finish();

    store.modify::<Annotation>(
        annotation_id,
        &[
            Modify::Set(
                "features_summary".to_string(),
                serde_json::to_value(&summary)?,
            ),
            Modify::Set(
                "features_statistics".to_string(),
                serde_json::to_value(&statistics)?,
            ),
        ],
    )?;
    println!("refreshed statistics for {annotation_id}");
    Ok(())
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(MetadataStore::open(&config.storage.store_path)?);
    let state = AppState::new(config.clone(), Arc::clone(&store));

    let orchestrator = Arc::new(Orchestrator::new(config.clone(), store)?);
    let scheduler = Arc::new(Scheduler::new(config, orchestrator));

    let ingest_scheduler = Arc::clone(&scheduler);
    tokio::spawn(async move {
        if let Err(e) = ingest_scheduler.run_ingestion_trigger().await {
            tracing::error!(error = %e, "ingestion trigger stopped");
        }
    });
    let sweep_scheduler = Arc::clone(&scheduler);
    tokio::spawn(async move {
        if let Err(e) = sweep_scheduler.run_cache_sweeper().await {
            tracing::error!(error = %e, "cache sweeper stopped");
        }
    });

    annotarium_server::serve(state).await
}

async fn ingest(config: Config) -> anyhow::Result<()> {
    let store = Arc::new(MetadataStore::open(&config.storage.store_path)?);
    let orchestrator = Orchestrator::new(config, store)?;
    let report = orchestrator.run().await?;
    println!(
        "discovered {} / admitted {} / published {} / replaced {} / unchanged {} / failed {}",
        report.discovered,
        report.admitted,
        report.published,
        report.replaced,
        report.unchanged,
        report.failed
    );
    Ok(())
}
