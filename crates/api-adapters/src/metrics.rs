//! Prometheus metrics for the HTTP surface and the live channel.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use services::BusStats;

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct HttpLabels {
    pub method: String,
    pub status: String,
}

pub struct Metrics {
    registry: Registry,
    http_requests: Family<HttpLabels, Counter>,
    live_published: Counter,
    live_delivered: Counter,
    live_dropped: Counter,
    live_connections: Gauge,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("echohub");
        let http_requests = Family::<HttpLabels, Counter>::default();
        let live_published = Counter::default();
        let live_delivered = Counter::default();
        let live_dropped = Counter::default();
        let live_connections = Gauge::default();

        registry.register(
            "http_requests",
            "HTTP requests by method and status",
            http_requests.clone(),
        );
        registry.register(
            "live_events_published",
            "Live events handed to the bus",
            live_published.clone(),
        );
        registry.register(
            "live_events_delivered",
            "Live event frames queued on a connection",
            live_delivered.clone(),
        );
        registry.register(
            "live_events_dropped",
            "Live event frames dropped on a full or closed connection",
            live_dropped.clone(),
        );
        registry.register(
            "live_connections",
            "Currently open live connections",
            live_connections.clone(),
        );

        Self {
            registry,
            http_requests,
            live_published,
            live_delivered,
            live_dropped,
            live_connections,
        }
    }

    pub fn record_request(&self, method: &str, status: u16) {
        self.http_requests
            .get_or_create(&HttpLabels {
                method: method.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    /// Brings the live-channel series up to date with the bus counters.
    pub fn observe_bus(&self, stats: &BusStats) {
        catch_up(&self.live_published, stats.published);
        catch_up(&self.live_delivered, stats.delivered);
        catch_up(&self.live_dropped, stats.dropped);
        self.live_connections
            .set(i64::try_from(stats.connections).unwrap_or(i64::MAX));
    }

    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}

/// The bus counters are monotonic, so a counter can follow them by delta.
fn catch_up(counter: &Counter, total: u64) {
    let seen = counter.get();
    if total > seen {
        counter.inc_by(total - seen);
    }
}

pub async fn track_requests(State(metrics): State<Arc<Metrics>>, req: Request, next: Next) -> Response {
    let method = req.method().to_string();
    let response = next.run(req).await;
    metrics.record_request(&method, response.status().as_u16());
    response
}
