use std::net::UdpSocket;

use cadence::{BufferedUdpMetricSink, QueuingMetricSink, StatsdClient};
use thiserror::Error;

/// Mirrors `syncserver::server::metrics::MetricError`: a thin wrapper so
/// callers don't need to depend on `cadence`'s error type directly.
#[derive(Debug, Error)]
pub enum MetricError {
    #[error("metrics io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("metrics send error: {0}")]
    Send(String),
}

/// Counts and timers for the queue manager, cloned cheaply into every
/// `DatabaseQueue` worker thread.
#[derive(Clone)]
pub struct Metrics {
    client: std::sync::Arc<StatsdClient>,
}

impl Metrics {
    pub fn noop() -> Self {
        Metrics {
            client: std::sync::Arc::new(StatsdClient::from_sink("hydrogen", cadence::NopMetricSink)),
        }
    }

    pub fn from_opts(label: &str, host: Option<&str>, port: u16) -> Result<Self, MetricError> {
        let client = match host {
            Some(host) => {
                let socket = UdpSocket::bind("0.0.0.0:0")?;
                socket.set_nonblocking(true)?;
                let sink = BufferedUdpMetricSink::from((host, port), socket)
                    .map_err(|e| MetricError::Send(e.to_string()))?;
                let sink = QueuingMetricSink::from(sink);
                StatsdClient::from_sink(label, sink)
            }
            None => StatsdClient::from_sink(label, cadence::NopMetricSink),
        };
        Ok(Metrics {
            client: std::sync::Arc::new(client),
        })
    }

    pub fn incr(&self, label: &str) {
        let _ = cadence::Counted::incr(&*self.client, label);
    }

    pub fn incr_with_tags(&self, label: &str, tags: &[(&str, &str)]) {
        let mut builder = self.client.incr_with_tags(label);
        for (k, v) in tags {
            builder = builder.with_tag(k, v);
        }
        let _ = builder.try_send();
    }

    pub fn gauge(&self, label: &str, value: u64) {
        let _ = cadence::Gauged::gauge(&*self.client, label, value);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Metrics::noop()
    }
}
