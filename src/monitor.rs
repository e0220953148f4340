//! Sharded multi-stream drift monitor.
//!
//! Streams are routed to worker threads by hashing their id, so each
//! stream's detector is owned by exactly one worker and sees its
//! observations in arrival order. Detectors never share state.

use crate::config::{DetectorConfig, MonitorConfig};
use crate::detector::DriftDetector;
use crate::error::{DriftError, Result};
use crate::metrics::DetectorMetrics;
use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::thread;
use tracing::{error, info, warn};

struct Observation {
    stream: String,
    value: f64,
}

/// A drift signal raised for one stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftEvent {
    pub stream: String,
    pub detector: String,
    /// 1-based index of the observation within its stream
    pub time: u64,
    pub value: f64,
    pub detected_at: DateTime<Utc>,
}

/// Totals reported once the monitor has drained.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSummary {
    pub streams: usize,
    pub observations: u64,
    pub drifts: u64,
    pub rejected: u64,
}

struct StreamState {
    detector: Box<dyn DriftDetector>,
    time: u64,
}

struct ShardWorker {
    id: usize,
    rx: Receiver<Observation>,
    events: Sender<DriftEvent>,
    detector_config: DetectorConfig,
    streams: HashMap<String, StreamState>,
    metrics: DetectorMetrics,
    summary: MonitorSummary,
}

impl ShardWorker {
    fn spawn(
        id: usize,
        rx: Receiver<Observation>,
        events: Sender<DriftEvent>,
        detector_config: DetectorConfig,
        metrics: DetectorMetrics,
    ) -> Result<thread::JoinHandle<MonitorSummary>> {
        let handle = thread::Builder::new()
            .name(format!("driftwatch-shard-{}", id))
            .spawn(move || {
                let mut worker = ShardWorker {
                    id,
                    rx,
                    events,
                    detector_config,
                    streams: HashMap::new(),
                    metrics,
                    summary: MonitorSummary::default(),
                };
                worker.run();
                info!(shard = id, streams = worker.streams.len(), "Shard worker stopped.");
                worker.summary.streams = worker.streams.len();
                worker.summary
            })?;
        Ok(handle)
    }

    fn run(&mut self) {
        while let Ok(obs) = self.rx.recv() {
            let timer = self.metrics.observe_latency.start_timer();
            self.process(obs);
            timer.observe_duration();
        }
    }

    fn process(&mut self, obs: Observation) {
        if !self.streams.contains_key(&obs.stream) {
            match self.detector_config.build() {
                Ok(detector) => {
                    self.streams
                        .insert(obs.stream.clone(), StreamState { detector, time: 0 });
                }
                Err(e) => {
                    error!(shard = self.id, error = %e, "Failed to build detector");
                    return;
                }
            }
        }
        let Some(state) = self.streams.get_mut(&obs.stream) else {
            return;
        };

        match state.detector.observe(obs.value) {
            Ok(changed) => {
                state.time += 1;
                self.summary.observations += 1;
                self.metrics.observations.inc();
                if changed {
                    self.summary.drifts += 1;
                    self.metrics.drifts.inc();
                    info!(
                        shard = self.id,
                        stream = %obs.stream,
                        time = state.time,
                        detector = state.detector.name(),
                        "Drift detected."
                    );
                    let event = DriftEvent {
                        detector: state.detector.name().to_string(),
                        time: state.time,
                        value: obs.value,
                        detected_at: Utc::now(),
                        stream: obs.stream,
                    };
                    // receiver gone means nobody is listening any more
                    let _ = self.events.send(event);
                }
            }
            Err(DriftError::InvalidInput(reason)) => {
                self.summary.rejected += 1;
                self.metrics.rejected.inc();
                warn!(shard = self.id, stream = %obs.stream, reason = %reason, "Observation rejected.");
            }
            Err(e) => {
                self.summary.rejected += 1;
                self.metrics.rejected.inc();
                error!(shard = self.id, stream = %obs.stream, error = %e, "Detector failed.");
            }
        }
    }
}

pub struct ShardedMonitor {
    shard_txs: Vec<Sender<Observation>>,
    handles: Vec<thread::JoinHandle<MonitorSummary>>,
    events_rx: Receiver<DriftEvent>,
    metrics: DetectorMetrics,
}

impl ShardedMonitor {
    pub fn spawn(config: MonitorConfig, metrics: DetectorMetrics) -> Result<Self> {
        config.validate()?;
        let shard_count = config.shard_count();
        info!(shards = shard_count, "Starting drift monitor.");

        let (events_tx, events_rx) = unbounded();
        let mut shard_txs = Vec::with_capacity(shard_count);
        let mut handles = Vec::with_capacity(shard_count);

        for id in 0..shard_count {
            let (tx, rx) = bounded(config.channel_capacity);
            shard_txs.push(tx);
            handles.push(ShardWorker::spawn(
                id,
                rx,
                events_tx.clone(),
                config.detector,
                metrics.clone(),
            )?);
        }

        Ok(Self {
            shard_txs,
            handles,
            events_rx,
            metrics,
        })
    }

    pub fn shard_count(&self) -> usize {
        self.shard_txs.len()
    }

    pub fn shard_for(&self, stream: &str) -> usize {
        let hash = xxhash_rust::xxh3::xxh3_64(stream.as_bytes());
        (hash % self.shard_txs.len() as u64) as usize
    }

    /// Queue an observation, blocking while the owning shard is saturated.
    pub fn observe(&self, stream: &str, value: f64) -> Result<()> {
        let shard = self.shard_for(stream);
        self.shard_txs[shard]
            .send(Observation {
                stream: stream.to_string(),
                value,
            })
            .map_err(|_| DriftError::invariant(format!("shard worker {} has stopped", shard)))
    }

    /// Drift events raised so far.
    pub fn events(&self) -> &Receiver<DriftEvent> {
        &self.events_rx
    }

    pub fn metrics(&self) -> &DetectorMetrics {
        &self.metrics
    }

    /// Close ingest, wait for every shard to drain and return the totals
    /// together with any events not yet consumed.
    pub fn shutdown(self) -> Result<(MonitorSummary, Vec<DriftEvent>)> {
        drop(self.shard_txs);

        let mut total = MonitorSummary::default();
        for (id, handle) in self.handles.into_iter().enumerate() {
            let summary = handle
                .join()
                .map_err(|_| DriftError::invariant(format!("shard worker {} panicked", id)))?;
            total.streams += summary.streams;
            total.observations += summary.observations;
            total.drifts += summary.drifts;
            total.rejected += summary.rejected;
        }
        info!(
            streams = total.streams,
            observations = total.observations,
            drifts = total.drifts,
            "All shards drained and stopped."
        );

        Ok((total, self.events_rx.try_iter().collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{AdwinConfig, PageHinkleyConfig};

    fn monitor(detector: DetectorConfig, shards: usize) -> ShardedMonitor {
        let config = MonitorConfig {
            detector,
            shards,
            channel_capacity: 64,
        };
        ShardedMonitor::spawn(config, DetectorMetrics::new().unwrap()).unwrap()
    }

    #[test]
    fn test_routing_is_stable() {
        let monitor = monitor(DetectorConfig::default(), 4);
        for stream in ["a", "b", "checkout-latency", "errors"] {
            let shard = monitor.shard_for(stream);
            assert!(shard < 4);
            assert_eq!(shard, monitor.shard_for(stream));
        }
        monitor.shutdown().unwrap();
    }

    #[test]
    fn test_only_shifted_stream_drifts() {
        let monitor = monitor(DetectorConfig::Adwin(AdwinConfig::default()), 3);
        for i in 0..1500 {
            monitor.observe("stable", 0.5).unwrap();
            monitor.observe("shifted", if i < 1000 { 0.0 } else { 1.0 }).unwrap();
        }
        let (summary, events) = monitor.shutdown().unwrap();

        assert_eq!(summary.streams, 2);
        assert_eq!(summary.observations, 3000);
        assert!(summary.drifts >= 1);
        assert!(!events.is_empty());
        for event in &events {
            assert_eq!(event.stream, "shifted");
            assert_eq!(event.detector, "ADWIN");
            assert!(event.time > 1000, "drift reported before the shift at {}", event.time);
            assert_eq!(event.time % 32, 0);
        }
    }

    #[test]
    fn test_rejected_values_are_counted() {
        let monitor = monitor(DetectorConfig::PageHinkley(PageHinkleyConfig::default()), 1);
        monitor.observe("s", 1.0).unwrap();
        monitor.observe("s", f64::NAN).unwrap();
        monitor.observe("s", 2.0).unwrap();
        let metrics = monitor.metrics().clone();
        let (summary, _) = monitor.shutdown().unwrap();

        assert_eq!(summary.observations, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(metrics.rejected.get(), 1);
        assert_eq!(metrics.observations.get(), 2);
    }
}
