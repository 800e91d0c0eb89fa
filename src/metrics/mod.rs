use autometrics::prometheus_exporter;
use lazy_static::lazy_static;
use prometheus::IntCounter;
use prometheus::IntCounterVec;
use prometheus::IntGauge;
use prometheus::Opts;
use prometheus::Registry;
use tokio::sync::watch;
use tracing::error;
use tracing::info;
use warp::Filter;
use warp::Rejection;
use warp::Reply;


/// `outcome` label values of [`CHANGE_EVENTS`]
pub const CHANGE_EVENT_DECODED: &str = "decoded";
pub const CHANGE_EVENT_MALFORMED: &str = "malformed";
pub const CHANGE_EVENT_UNDECODABLE: &str = "undecodable";

lazy_static! {
    pub static ref PUSH_SUBSCRIBERS: IntGauge =
        IntGauge::new("push_subscribers", "Currently registered push subscribers")
            .expect("metric can not be created");

    pub static ref PUSH_DELIVERIES: IntCounter =
        IntCounter::new("push_deliveries", "Payloads queued to push subscribers")
            .expect("metric can not be created");

    pub static ref PUSH_DROPPED_SUBSCRIBERS: IntCounter = IntCounter::new(
        "push_dropped_subscribers",
        "Subscribers deregistered because a send failed"
    )
    .expect("metric can not be created");

    pub static ref CHANGE_EVENTS: IntCounterVec = IntCounterVec::new(
        Opts::new("change_events", "Change documents received from the store feed"),
        &["outcome"]
    )
    .expect("Should succeed to create metric");

    pub static ref FEED_RESUBSCRIBES: IntCounter =
        IntCounter::new("feed_resubscribes", "Change feed resubscription attempts")
            .expect("metric can not be created");

    pub static ref REGISTRY: Registry = Registry::new();
}

pub(crate) fn register_custom_metrics(registry: &Registry) -> prometheus::Result<()> {
    registry.register(Box::new(PUSH_SUBSCRIBERS.clone()))?;
    registry.register(Box::new(PUSH_DELIVERIES.clone()))?;
    registry.register(Box::new(PUSH_DROPPED_SUBSCRIBERS.clone()))?;
    registry.register(Box::new(CHANGE_EVENTS.clone()))?;
    registry.register(Box::new(FEED_RESUBSCRIBES.clone()))?;
    Ok(())
}

/// Serves `/metrics` on `port` until `shutdown_signal` changes.
pub async fn start_server(
    port: u16,
    mut shutdown_signal: watch::Receiver<()>,
) {
    if let Err(e) = register_custom_metrics(&REGISTRY) {
        error!("failed to register custom metrics: {:?}", e);
    }

    let metrics_route = warp::path!("metrics").and_then(metrics_handler);

    let bound = warp::serve(metrics_route).try_bind_with_graceful_shutdown(([0, 0, 0, 0], port), async move {
        let _ = shutdown_signal.changed().await;
    });
    match bound {
        Ok((addr, server)) => {
            info!("metrics server listening on {}", addr);
            server.await;
        }
        Err(e) => error!("metrics server failed to bind port {}: {:?}", port, e),
    }
}

async fn metrics_handler() -> Result<impl Reply, Rejection> {
    let mut body = encode_registry(&REGISTRY);
    body.push_str(&encode_registry(prometheus::default_registry()));
    body.push_str(&get_metrics_body());
    Ok(body)
}

fn encode_registry(registry: &Registry) -> String {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&registry.gather(), &mut buffer) {
        error!("could not encode metrics: {}", e);
    }
    String::from_utf8(buffer).unwrap_or_else(|e| {
        error!("metrics could not be from_utf8'd: {}", e);
        String::default()
    })
}

/// Export autometrics for Prometheus to scrape
pub fn get_metrics_body() -> String {
    prometheus_exporter::encode_http_response().into_body()
}
