use std::env;
use std::sync::Arc;

use prometheus::Registry;
use pva_server::register_custom_metrics;
use pva_server::start_server;
use pva_server::Error;
use pva_server::LocalServingRuntime;
use pva_server::PvaServer;
use pva_server::Result;
use pva_server::ServerConfig;
use pva_server::WriteCallback;
use tokio::signal::unix::signal;
use tokio::signal::unix::SignalKind;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Usage: `pva-server [DEFINITIONS.toml [SUBSTITUTIONS]]`
///
/// Without a definition file a single `counter` record is published.
#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> Result<()> {
    let config = ServerConfig::new()?.validate()?;

    // Initializing Logs
    init_observability();

    // Initializing Shutdown Signal
    let (graceful_tx, graceful_rx) = watch::channel(());

    let runtime = Arc::new(LocalServingRuntime::<i64>::new());
    let server = PvaServer::with_config(runtime, config.clone())?;

    let mut args = env::args().skip(1);
    match args.next() {
        Some(path) => {
            let substitutions = args.next();
            server.initialize_from_file(&path, substitutions.as_deref())?;
        }
        None => server.add_record(
            "counter",
            0,
            Some(WriteCallback::infallible(|value: &i64| {
                info!("counter written: {}", value);
            })),
        )?,
    }

    if config.monitoring.prometheus_enabled {
        let registry = Registry::new();
        register_custom_metrics(&registry)?;
        tokio::spawn(start_server(
            config.monitoring.metrics_addr()?,
            registry,
            graceful_rx.clone(),
        ));
    }

    server.start()?;
    info!(
        records = ?server.record_names(),
        "Application started. Waiting for CTRL+C signal..."
    );

    if let Err(e) = graceful_shutdown(graceful_tx).await {
        error!("Failed to shutdown: {:?}", e);
    }

    // stop() blocks for up to the shutdown wait time
    tokio::task::spawn_blocking(move || drop(server))
        .await
        .map_err(|e| Error::Fatal(format!("server teardown panicked: {e}")))?;

    info!("Exiting program.");
    Ok(())
}

async fn graceful_shutdown(graceful_tx: watch::Sender<()>) -> Result<()> {
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| Error::Fatal(format!("cannot listen for SIGINT: {e}")))?;
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| Error::Fatal(format!("cannot listen for SIGTERM: {e}")))?;
    tokio::select! {
        _ = sigint.recv() => {
            info!("SIGINT detected.");
        },
        _ = sigterm.recv() => {
            info!("SIGTERM detected.");
        },
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl+C detected.");
        },
    }

    graceful_tx
        .send(())
        .map_err(|e| Error::Fatal(format!("Failed to send shutdown signal: {e}")))?;

    info!("Shutdown signal sent");
    Ok(())
}

fn init_observability() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
