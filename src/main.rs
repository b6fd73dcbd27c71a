//! proxy-director binary: load config, build the decision engine, serve.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use proxy_director::config::loader::load_config;
use proxy_director::config::watcher::ConfigWatcher;
use proxy_director::health::HttpProbeTransport;
use proxy_director::observability::{logging, metrics};
use proxy_director::{Director, HttpServer, ProxyConfig};

#[derive(Parser, Debug)]
#[command(name = "proxy-director", about = "Reverse proxy decision engine")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };

    logging::init_tracing(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        backends = config.backends.len(),
        routes = config.routes.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let director = Arc::new(Director::new(Arc::new(HttpProbeTransport::new())));
    director.apply_config(&config).await?;

    // Hot reload: the watcher loop is the single topology updater.
    let _watcher_guard = if let Some(path) = &args.config {
        let (watcher, mut updates) = ConfigWatcher::new(path);
        let guard = watcher.run()?;
        let reload_director = director.clone();
        tokio::spawn(async move {
            while let Some(new_config) = updates.recv().await {
                match reload_director.apply_config(&new_config).await {
                    Ok(changes) => tracing::info!(
                        added = changes.added.len(),
                        updated = changes.updated.len(),
                        removed = changes.removed.len(),
                        "Topology updated"
                    ),
                    Err(e) => tracing::error!(
                        error = %e,
                        "Topology update refused, previous topology stays active"
                    ),
                }
            }
        });
        Some(guard)
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, director);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
