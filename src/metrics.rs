use crate::error::Result;
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounter, Registry, TextEncoder};

/// Counters shared by every worker of a monitor. Handles are cheap clones
/// of the same underlying metrics.
#[derive(Clone)]
pub struct DetectorMetrics {
    registry: Registry,
    pub observations: IntCounter,
    pub drifts: IntCounter,
    pub rejected: IntCounter,
    pub observe_latency: Histogram,
}

impl DetectorMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let observations =
            IntCounter::new("driftwatch_observations_total", "Total observations processed")?;
        let drifts = IntCounter::new("driftwatch_drifts_total", "Total drift signals raised")?;
        let rejected = IntCounter::new(
            "driftwatch_rejected_total",
            "Total observations rejected by a detector",
        )?;
        let observe_latency = Histogram::with_opts(
            HistogramOpts::new(
                "driftwatch_observe_duration_seconds",
                "Histogram of per-observation detector latency",
            )
            .buckets(prometheus::exponential_buckets(1e-7, 4.0, 10)?),
        )?;

        registry.register(Box::new(observations.clone()))?;
        registry.register(Box::new(drifts.clone()))?;
        registry.register(Box::new(rejected.clone()))?;
        registry.register(Box::new(observe_latency.clone()))?;

        Ok(Self {
            registry,
            observations,
            drifts,
            rejected,
            observe_latency,
        })
    }

    /// Prometheus text exposition of all metrics.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
