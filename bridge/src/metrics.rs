//! Prometheus-compatible metrics endpoint
//!
//! Counts what the bridge does on behalf of the host: entities allocated,
//! packets built and delivered, use-entity frames seen and pipeline changes.
//! Default endpoint: http://localhost:9091/metrics

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

#[cfg(feature = "metrics_endpoint")]
use std::sync::Arc;
#[cfg(feature = "metrics_endpoint")]
use tokio::io::{AsyncReadExt, AsyncWriteExt};
#[cfg(feature = "metrics_endpoint")]
use tokio::net::TcpListener;
#[cfg(feature = "metrics_endpoint")]
use tracing::{debug, info};

/// Metrics registry for one bridge instance
#[derive(Debug)]
pub struct Metrics {
    // Entities
    pub entities_allocated: AtomicU64,

    // Outbound
    pub packets_built: AtomicU64,
    pub build_failures: AtomicU64,
    pub packets_sent: AtomicU64,
    pub sends_dropped: AtomicU64,

    // Inbound
    pub frames_intercepted: AtomicU64,
    pub attack_events: AtomicU64,
    pub interact_events: AtomicU64,
    pub decode_failures: AtomicU64,
    pub listener_failures: AtomicU64,

    // Pipeline
    pub pipeline_mutations: AtomicU64,
    pub interceptors_active: AtomicU64,

    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            entities_allocated: AtomicU64::new(0),
            packets_built: AtomicU64::new(0),
            build_failures: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            sends_dropped: AtomicU64::new(0),
            frames_intercepted: AtomicU64::new(0),
            attack_events: AtomicU64::new(0),
            interact_events: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            listener_failures: AtomicU64::new(0),
            pipeline_mutations: AtomicU64::new(0),
            interceptors_active: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    /// Saturating decrement for gauges
    pub(crate) fn decr(counter: &AtomicU64) {
        let _ = counter.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| v.checked_sub(1));
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-format metrics output
    pub fn to_prometheus(&self) -> String {
        let mut output = String::with_capacity(2048);

        macro_rules! metric {
            ($name:expr, $help:expr, $type:expr, $value:expr) => {
                output.push_str(&format!(
                    "# HELP {} {}\n# TYPE {} {}\n{} {}\n",
                    $name, $help, $name, $type, $name, $value
                ));
            };
        }

        metric!("entity_bridge_entities_allocated_total", "Virtual entity identities allocated", "counter",
            self.entities_allocated.load(Ordering::Relaxed));

        metric!("entity_bridge_packets_built_total", "Clientbound packets built", "counter",
            self.packets_built.load(Ordering::Relaxed));
        metric!("entity_bridge_build_failures_total", "Packet builds rejected by the protocol layout", "counter",
            self.build_failures.load(Ordering::Relaxed));
        metric!("entity_bridge_packets_sent_total", "Packets handed to player connections", "counter",
            self.packets_sent.load(Ordering::Relaxed));
        metric!("entity_bridge_sends_dropped_total", "Sends skipped because the connection was closed", "counter",
            self.sends_dropped.load(Ordering::Relaxed));

        metric!("entity_bridge_frames_intercepted_total", "Use-entity frames seen by interceptors", "counter",
            self.frames_intercepted.load(Ordering::Relaxed));
        metric!("entity_bridge_attack_events_total", "Attack callbacks dispatched", "counter",
            self.attack_events.load(Ordering::Relaxed));
        metric!("entity_bridge_interact_events_total", "Main-hand interact callbacks dispatched", "counter",
            self.interact_events.load(Ordering::Relaxed));
        metric!("entity_bridge_decode_failures_total", "Use-entity frames that failed to decode", "counter",
            self.decode_failures.load(Ordering::Relaxed));
        metric!("entity_bridge_listener_failures_total", "Click listeners that panicked", "counter",
            self.listener_failures.load(Ordering::Relaxed));

        metric!("entity_bridge_pipeline_mutations_total", "Interceptor insertions and removals applied", "counter",
            self.pipeline_mutations.load(Ordering::Relaxed));
        metric!("entity_bridge_interceptors_active", "Connections with an interceptor installed", "gauge",
            self.interceptors_active.load(Ordering::Relaxed));

        metric!("entity_bridge_uptime_seconds", "Uptime in seconds", "counter",
            self.uptime_seconds());

        output
    }

    /// Generate JSON format metrics
    pub fn to_json(&self) -> String {
        serde_json::json!({
            "entities": {
                "allocated": self.entities_allocated.load(Ordering::Relaxed),
            },
            "outbound": {
                "packets_built": self.packets_built.load(Ordering::Relaxed),
                "build_failures": self.build_failures.load(Ordering::Relaxed),
                "packets_sent": self.packets_sent.load(Ordering::Relaxed),
                "sends_dropped": self.sends_dropped.load(Ordering::Relaxed),
            },
            "inbound": {
                "frames_intercepted": self.frames_intercepted.load(Ordering::Relaxed),
                "attack_events": self.attack_events.load(Ordering::Relaxed),
                "interact_events": self.interact_events.load(Ordering::Relaxed),
                "decode_failures": self.decode_failures.load(Ordering::Relaxed),
                "listener_failures": self.listener_failures.load(Ordering::Relaxed),
            },
            "pipeline": {
                "mutations": self.pipeline_mutations.load(Ordering::Relaxed),
                "interceptors_active": self.interceptors_active.load(Ordering::Relaxed),
            },
            "uptime_seconds": self.uptime_seconds(),
        })
        .to_string()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "metrics_endpoint")]
fn http_response(content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        content_type,
        body.len(),
        body
    )
}

/// Start the metrics HTTP server
#[cfg(feature = "metrics_endpoint")]
pub async fn start_metrics_server(metrics: Arc<Metrics>, port: u16) -> anyhow::Result<()> {
    let addr = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&addr).await?;

    info!("Metrics server listening on http://{}/metrics", addr);

    loop {
        let (mut socket, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];

            match socket.read(&mut buffer).await {
                Ok(n) if n > 0 => {
                    let request = String::from_utf8_lossy(&buffer[..n]);

                    // Longest prefix first: /metrics/json also starts with /metrics
                    let response = if request.starts_with("GET /metrics/json") || request.starts_with("GET /json") {
                        http_response("application/json", &metrics.to_json())
                    } else if request.starts_with("GET /metrics") {
                        http_response("text/plain; version=0.0.4", &metrics.to_prometheus())
                    } else if request.starts_with("GET /health") {
                        http_response("text/plain", "OK")
                    } else {
                        "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
                    };

                    if let Err(e) = socket.write_all(response.as_bytes()).await {
                        debug!("Failed to write metrics response to {}: {}", peer, e);
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    debug!("Failed to read from metrics socket {}: {}", peer, e);
                }
            }
        });
    }
}
