//! Prometheus metrics
//!
//! All protocol components record through [`ProtocolMetrics`]. Without an
//! installed recorder the macros are no-ops, so tests need no setup.

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Start the Prometheus exporter on `0.0.0.0:{port}/metrics`
pub fn init_metrics(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new().with_http_listener(addr).install()?;

    tracing::info!(%addr, "Metrics server listening");
    Ok(())
}

/// Metric handles for one protocol component
///
/// * `openhedge_ops_total{component,op}` - committed operations
/// * `openhedge_rejections_total{component,op,category}` - rejected operations
/// * `openhedge_op_duration_seconds{component,op}` - operation latency
/// * `openhedge_lots_filled_total` / `openhedge_partial_fills_total`
/// * `openhedge_tickets_total{kind,transition}`
/// * `openhedge_settlements_total{side,result}`
#[derive(Debug, Clone)]
pub struct ProtocolMetrics {
    component: &'static str,
}

impl ProtocolMetrics {
    pub fn new(component: &'static str) -> Self {
        Self { component }
    }

    pub fn component(&self) -> &'static str {
        self.component
    }

    pub fn record_op(&self, op: &'static str) {
        counter!("openhedge_ops_total", "component" => self.component, "op" => op).increment(1);
    }

    pub fn record_rejection(&self, op: &'static str, category: &'static str) {
        counter!(
            "openhedge_rejections_total",
            "component" => self.component,
            "op" => op,
            "category" => category
        )
        .increment(1);
    }

    pub fn record_fill(&self, lots: u64, partial: bool) {
        counter!("openhedge_lots_filled_total").increment(lots);
        if partial {
            counter!("openhedge_partial_fills_total").increment(1);
        }
    }

    pub fn record_ticket(&self, kind: &'static str, transition: &'static str) {
        counter!("openhedge_tickets_total", "kind" => kind, "transition" => transition).increment(1);
    }

    pub fn record_settlement(&self, side: &'static str, result: &'static str) {
        counter!("openhedge_settlements_total", "side" => side, "result" => result).increment(1);
    }

    /// Start timing an operation; the duration is recorded on drop
    pub fn time(&self, op: &'static str) -> OpTimer {
        OpTimer {
            component: self.component,
            op,
            start: Instant::now(),
        }
    }
}

/// Records an operation's duration when dropped
pub struct OpTimer {
    component: &'static str,
    op: &'static str,
    start: Instant,
}

impl Drop for OpTimer {
    fn drop(&mut self) {
        histogram!(
            "openhedge_op_duration_seconds",
            "component" => self.component,
            "op" => self.op
        )
        .record(self.start.elapsed().as_secs_f64());
    }
}
