//! Concept drift detection over numeric streams.
//!
//! [`Adwin`] keeps an adaptive window summarized by an exponential
//! histogram and cuts it when two sub-windows differ significantly;
//! [`PageHinkley`] is a constant-memory cumulative-sum alternative. Both
//! implement [`DriftDetector`].

pub mod algo;
pub mod config;
pub mod detector;
pub mod error;
pub mod evaluation;
pub mod ffi;
pub mod learner;
pub mod metrics;
pub mod monitor;
pub mod simulation;

pub use algo::adwin::Adwin;
pub use algo::page_hinkley::PageHinkley;
pub use config::{AdwinConfig, CumulativeMode, DetectorConfig, MonitorConfig, PageHinkleyConfig};
pub use detector::DriftDetector;
pub use error::{DriftError, Result};
