//! Prometheus metrics
//!
//! Registered in the default registry on first use and served as text at
//! `/metrics`.

use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, TextEncoder};
use vitals_core::{DeliveryResult, Reading, Sink, SinkError};

pub static READINGS_GENERATED: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new("vitals_readings_generated_total", "Total readings generated").unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

pub static DELIVERIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    let c = IntCounterVec::new(
        Opts::new("vitals_deliveries_total", "Delivery results by destination and outcome"),
        &["destination", "outcome"],
    )
    .unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

pub static DELIVERY_ATTEMPTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    let c = IntCounter::new(
        "vitals_delivery_attempts_total",
        "Total HTTP attempts made, retries included",
    )
    .unwrap();
    prometheus::register(Box::new(c.clone())).unwrap();
    c
});

pub static SIMULATION_RUNNING: Lazy<IntGauge> = Lazy::new(|| {
    let g = IntGauge::new("vitals_simulation_running", "1 while the generation loop runs").unwrap();
    prometheus::register(Box::new(g.clone())).unwrap();
    g
});

/// Register every metric up front so `/metrics` lists them before first use.
pub fn init() {
    Lazy::force(&READINGS_GENERATED);
    Lazy::force(&DELIVERIES_TOTAL);
    Lazy::force(&DELIVERY_ATTEMPTS_TOTAL);
    Lazy::force(&SIMULATION_RUNNING);
}

pub fn record_delivery(result: &DeliveryResult) {
    let outcome = if result.success { "success" } else { "failure" };
    DELIVERIES_TOTAL
        .with_label_values(&[result.destination.as_str(), outcome])
        .inc();
    DELIVERY_ATTEMPTS_TOTAL.inc_by(u64::from(result.attempts));
}

pub fn set_running(running: bool) {
    SIMULATION_RUNNING.set(i64::from(running));
}

/// Text exposition of the default registry.
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

/// Counts every generated reading.
#[derive(Debug, Default)]
pub struct MetricsSink;

impl Sink for MetricsSink {
    fn name(&self) -> &str {
        "metrics"
    }

    fn accept(&self, _reading: &Reading) -> Result<(), SinkError> {
        READINGS_GENERATED.inc();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_lists_registered_metrics() {
        init();
        record_delivery(&DeliveryResult::delivered("User Interface", 200, 2));
        set_running(true);

        let text = render().unwrap();
        assert!(text.contains("vitals_readings_generated_total"));
        let delivered =
            r#"vitals_deliveries_total{destination="User Interface",outcome="success"}"#;
        assert!(text.contains(delivered));
        assert!(text.contains("vitals_simulation_running 1"));
        set_running(false);
    }
}
