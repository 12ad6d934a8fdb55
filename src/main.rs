//! `pingmon`: serve latency charts and server statistics over HTTP.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use pingmon::config::ServerConfig;
use pingmon::monitor::{self, MetricsStore, SampleLog};
use pingmon::router::Router;
use pingmon::server::Server;

/// Samples kept per host by the in-memory store: one day at a 15 s interval.
const SAMPLES_PER_HOST: usize = 24 * 60 * 60 / 15;

#[derive(Debug, Parser)]
#[command(name = "pingmon", version, about = "A latency monitor")]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration file.
    #[arg(short, long)]
    bind: Option<String>,

    /// Host to serve a chart for; may be repeated.
    #[arg(long = "host")]
    hosts: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    config.hosts.extend(cli.hosts);
    config.validate()?;

    let store: Arc<dyn MetricsStore> = Arc::new(SampleLog::new(SAMPLES_PER_HOST));
    let hosts = config.hosts.clone();

    let server = Server::bind(config).await?;

    let mut router = Router::new();
    router.get(&["stats"], monitor::stats_handler(server.statistics()))?;
    router.post(&["sample"], monitor::sample_handler(Arc::clone(&store)))?;
    monitor::register_hosts(&mut router, &store, &hosts)?;

    let shutdown = server.shutdown_handle();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("received Ctrl-C, shutting down");
                shutdown.shutdown();
            }
            Err(e) => error!(error = %e, "failed to listen for Ctrl-C"),
        }
    });

    server.run(router).await;
    Ok(())
}
