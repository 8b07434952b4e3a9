/// Dealwatch Worker
///
/// A backend worker that periodically runs registered deals searches, each
/// gated by a recurring local-time interval window:
/// - Polls the registry for searches and decides per record whether a new
///   interval bucket has opened since the last run
/// - Executes due searches against the external deals API
/// - Reports results through the notifier and stamps the run back
/// - Serves /health, /status and /run over HTTP

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;

use dealwatch::config::Config;
use dealwatch::deals_client::DealsApiClient;
use dealwatch::http_server::{start_server, AppState};
use dealwatch::notify::LogNotifier;
use dealwatch::registry::InMemoryRegistry;
use dealwatch::worker::Worker;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logger
    pretty_env_logger::init();

    log::info!("Starting dealwatch worker...");

    // Load configuration from environment
    let cfg = Config::from_env()?;

    // Seed the registry if a searches file is configured
    let registry = match &cfg.searches_file {
        Some(path) => Arc::new(InMemoryRegistry::load_from_file(path).await?),
        None => {
            log::warn!("SEARCHES_FILE not set, starting with an empty registry");
            Arc::new(InMemoryRegistry::new())
        }
    };

    let executor = Arc::new(DealsApiClient::new(&cfg)?);
    let notifier = Arc::new(LogNotifier);

    let worker = Arc::new(Worker::new(
        registry.clone(),
        executor,
        notifier,
        cfg.dry_run,
    ));

    // Status server runs alongside the polling loop
    let state = AppState {
        registry: registry.clone(),
        worker: worker.clone(),
        status: worker.status(),
    };
    let port = cfg.http_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(state, port).await {
            log::error!("HTTP server exited: {:#}", e);
        }
    });

    worker
        .run(Duration::from_secs(cfg.poll_interval_secs))
        .await?;

    Ok(())
}
