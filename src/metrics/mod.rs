//! Prometheus collectors for callback dispatch and the record registry.


use std::convert::Infallible;
use std::net::SocketAddr;

use lazy_static::lazy_static;
use prometheus::exponential_buckets;
use prometheus::Encoder;
use prometheus::Histogram;
use prometheus::HistogramOpts;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Reply;

use crate::Error;
use crate::Result;

lazy_static! {
    pub static ref CALLBACK_DISPATCH_TOTAL: IntCounterVec = IntCounterVec::new(
        Opts::new("callback_dispatch_total", "Callback dispatch attempts by outcome"),
        &["outcome"]
    )
    .expect("metric can not be created");

    /// Snapshot taken on every push and pop. Every server in the process
    /// writes the same gauge, so with several servers it shows the queue
    /// touched last.
    pub static ref CALLBACK_QUEUE_DEPTH: IntGauge = IntGauge::new(
        "callback_queue_depth",
        "Channel names waiting for callback dispatch"
    )
    .expect("metric can not be created");

    pub static ref CALLBACK_LATENCY_MS: Histogram = Histogram::with_opts(
        HistogramOpts::new("callback_latency_ms", "Histogram of write callback run time in ms")
            .buckets(exponential_buckets(0.1, 2.0, 16).expect("valid buckets"))
    )
    .expect("metric can not be created");

    /// Total across every registry in the process.
    pub static ref PUBLISHED_RECORDS: IntGauge = IntGauge::new(
        "published_records",
        "Records currently attached across all servers"
    )
    .expect("metric can not be created");
}

/// Registers every collector of this crate with `registry`.
pub fn register_custom_metrics(registry: &Registry) -> Result<()> {
    registry.register(Box::new(CALLBACK_DISPATCH_TOTAL.clone()))?;
    registry.register(Box::new(CALLBACK_QUEUE_DEPTH.clone()))?;
    registry.register(Box::new(CALLBACK_LATENCY_MS.clone()))?;
    registry.register(Box::new(PUBLISHED_RECORDS.clone()))?;
    Ok(())
}

/// Renders `registry` in the Prometheus text exposition format.
pub fn encode_metrics(registry: &Registry) -> Result<String> {
    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| Error::Fatal(format!("metrics are not utf-8: {e}")))
}

/// Serves `/metrics` until `shutdown_signal` fires.
pub async fn start_server(
    addr: SocketAddr,
    registry: Registry,
    mut shutdown_signal: watch::Receiver<()>,
) {
    info!("Metrics server listening on {}", addr);
    let (_, server) = warp::serve(metrics_route(registry)).bind_with_graceful_shutdown(
        addr,
        async move {
            let _ = shutdown_signal.changed().await;
        },
    );
    server.await;
}

pub(crate) fn metrics_route(
    registry: Registry
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    warp::path!("metrics")
        .map(move || registry.clone())
        .and_then(metrics_handler)
}

async fn metrics_handler(registry: Registry) -> std::result::Result<String, Infallible> {
    match encode_metrics(&registry) {
        Ok(body) => Ok(body),
        Err(e) => {
            error!("could not encode custom metrics: {:?}", e);
            Ok(String::default())
        }
    }
}
