use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tracing_subscriber::EnvFilter;

use alertwatch::config::load_config;
use alertwatch::core::store::Store;
use alertwatch::pipeline::ingestor::run_cycle;
use alertwatch::pipeline::provider::UnifiedProvider;
use alertwatch::sources::fetcher::Fetcher;

#[derive(Parser, Debug)]
#[command(
    name = "alertwatch",
    version,
    about = "Public-safety alert feed ingestion and correlation"
)]
struct Cli {
    /// Path to config file (TOML). Default: config/alertwatch.toml
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one ingestion cycle over all due sources
    Run,
    /// Print the unified read-path snapshot as JSON
    Report,
    /// List registered sources and their poll health
    Sources,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    let mut store = Store::new(Path::new(&config.db_path))?;
    let seeds: Vec<_> = config
        .sources
        .iter()
        .cloned()
        .map(|s| s.into_source())
        .collect();
    store.seed_sources(&seeds)?;
    let store = Arc::new(Mutex::new(store));
    let fetcher = Fetcher::new(&config)?;

    match cli.command {
        Command::Run => {
            let report = run_cycle(&store, &fetcher, &config).await?;
            println!(
                "polled {} source(s): {} alert(s) upserted, {} payload(s) queued, {} failed, {} correlation edge(s)",
                report.sources_polled,
                report.alerts_upserted,
                report.payloads_queued,
                report.sources_failed,
                report.correlation_edges
            );
        }
        Command::Report => {
            let provider = UnifiedProvider::new(store, fetcher, config);
            let snapshot = provider.get_alerts().await;
            println!("{}", serde_json::to_string_pretty(snapshot.as_ref())?);
        }
        Command::Sources => {
            for source in store.lock().await.all_sources()? {
                let last = source
                    .last_poll_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string());
                println!(
                    "{:<20} {:<18} active={} interval={}s health={} last_poll={}",
                    source.id,
                    source.source_type,
                    source.is_active,
                    source.polling_interval_secs,
                    source.health_status,
                    last
                );
            }
        }
    }

    Ok(())
}
