//! Instant Win: flow validation and instant-win lottery service.
//!
//! Main entry point that loads configuration and starts the server.

use clap::Parser;
use instantwin_api::ApiServer;
use instantwin_core::config::AppConfig;
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "instant-win")]
#[command(about = "Instant-win campaign flow validation and prize draws")]
#[command(version)]
struct Cli {
    /// Node identifier (overrides config)
    #[arg(long, env = "INSTANT_WIN__NODE_ID")]
    node_id: Option<String>,

    /// HTTP port (overrides config)
    #[arg(long, env = "INSTANT_WIN__API__HTTP_PORT")]
    http_port: Option<u16>,

    /// Prometheus exporter port (overrides config)
    #[arg(long, env = "INSTANT_WIN__METRICS__PORT")]
    metrics_port: Option<u16>,

    /// Start with empty stores instead of demo templates and prizes
    #[arg(long, default_value_t = false)]
    no_seed: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    "instant_win=info,instantwin_api=info,instantwin_flow=info,instantwin_lottery=info,tower_http=info"
                        .into()
                }),
        )
        .json()
        .init();

    let cli = Cli::parse();

    info!("Instant Win starting up");

    let mut config = AppConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });

    // Apply CLI overrides
    if let Some(node_id) = cli.node_id {
        config.node_id = node_id;
    }
    if let Some(port) = cli.http_port {
        config.api.http_port = port;
    }
    if let Some(port) = cli.metrics_port {
        config.metrics.port = port;
    }
    if cli.no_seed {
        config.seed_demo_data = false;
    }

    info!(
        node_id = %config.node_id,
        http_port = config.api.http_port,
        metrics_port = config.metrics.port,
        seed_demo_data = config.seed_demo_data,
        max_path_depth = config.flow.max_path_depth,
        "Configuration loaded"
    );

    let api_server = ApiServer::new(config);

    if let Err(e) = api_server.start_metrics() {
        error!(error = %e, "Failed to start metrics exporter");
    }

    // Idle draw locks accumulate one entry per (user, template) pair.
    let draw_locks = api_server.draw_locks();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            interval.tick().await;
            let pruned = draw_locks.prune();
            debug!(pruned, remaining = draw_locks.len(), "Pruned idle draw locks");
        }
    });

    info!("Instant Win is ready to serve traffic");

    // Start HTTP server (blocks until shutdown)
    api_server.start_http().await?;

    Ok(())
}
