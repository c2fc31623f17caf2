use crate::{Error, Result};

use prometheus::{histogram_opts, opts, Encoder, Histogram, IntCounterVec, Registry, TextEncoder};
use std::time::Instant;

#[derive(Clone)]
pub struct Metrics {
    pub restarts: IntCounterVec,
    pub skips: IntCounterVec,
    pub failures: IntCounterVec,
    pub pass_duration: Histogram,
}

impl Default for Metrics {
    fn default() -> Self {
        let pass_duration = Histogram::with_opts(
            histogram_opts!(
                "restarter_pass_duration_seconds",
                "The duration of a restart pass in seconds"
            )
            .buckets(vec![0.1, 0.5, 1., 5., 15., 60., 300.]),
        )
        .unwrap();
        let restarts = IntCounterVec::new(
            opts!("restarter_restarts_total", "rollout restarts triggered"),
            &["kind"],
        )
        .unwrap();
        let skips = IntCounterVec::new(
            opts!("restarter_skips_total", "matched pods skipped without a restart"),
            &["reason"],
        )
        .unwrap();
        let failures = IntCounterVec::new(
            opts!("restarter_failures_total", "rollout restarts that failed"),
            &["kind", "error"],
        )
        .unwrap();
        Metrics {
            restarts,
            skips,
            failures,
            pass_duration,
        }
    }
}

impl Metrics {
    /// Register API metrics to start tracking them.
    pub fn register(self, registry: &Registry) -> Result<Self, prometheus::Error> {
        registry.register(Box::new(self.pass_duration.clone()))?;
        registry.register(Box::new(self.restarts.clone()))?;
        registry.register(Box::new(self.skips.clone()))?;
        registry.register(Box::new(self.failures.clone()))?;
        Ok(self)
    }

    pub fn restart_triggered(&self, kind: &str) {
        self.restarts.with_label_values(&[kind]).inc();
    }

    pub fn restart_skipped(&self, reason: &str) {
        self.skips.with_label_values(&[reason]).inc();
    }

    pub fn restart_failed(&self, kind: &str, e: &Error) {
        self.failures.with_label_values(&[kind, e.metric_label().as_ref()]).inc();
    }

    /// Start a timer that observes the pass duration when dropped
    pub fn measure_pass(&self) -> PassMeasurer {
        PassMeasurer {
            start: Instant::now(),
            metric: self.pass_duration.clone(),
        }
    }

    /// Render everything in `registry` in the Prometheus text exposition format
    pub fn render(registry: &Registry) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&registry.gather(), &mut buffer)
            .map_err(Error::MetricsError)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

/// Smart function duration measurer
///
/// Relies on Drop to calculate duration and register the observation in the histogram
pub struct PassMeasurer {
    start: Instant,
    metric: Histogram,
}

impl Drop for PassMeasurer {
    fn drop(&mut self) {
        #[allow(clippy::cast_precision_loss)]
        let duration = self.start.elapsed().as_millis() as f64 / 1000.0;
        self.metric.observe(duration);
    }
}
