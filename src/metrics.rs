use axum::{routing::get, Router};
use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::risk::{EscalationReason, RiskAssessment};

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the process-wide Prometheus recorder. Call once.
    pub fn install() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        Ok(Self { handle })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

// Without an installed recorder these are no-ops, which is what tests get.

pub fn record_inbound(channel: &'static str) {
    counter!("arc_inbound_messages_total", "channel" => channel).increment(1);
}

pub fn record_risk(a: &RiskAssessment) {
    counter!(
        "arc_risk_classified_total",
        "level" => a.level.as_str(),
        "source" => a.source.as_str()
    )
    .increment(1);
}

pub fn record_escalation(reason: EscalationReason) {
    counter!("arc_escalations_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_duplicate_event() {
    counter!("arc_duplicate_events_total").increment(1);
}

pub fn record_outbound(ok: bool) {
    let status = if ok { "sent" } else { "failed" };
    counter!("arc_outbound_messages_total", "status" => status).increment(1);
}

pub fn record_checkins_sent(n: usize) {
    counter!("arc_checkins_sent_total").increment(n as u64);
}
