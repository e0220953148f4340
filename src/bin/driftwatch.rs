//! driftwatch - drift detection over numeric streams
//!
//! Usage:
//!   driftwatch replay --input values.csv --config monitor.json --metrics
//!   driftwatch simulate --kind bernoulli --before 0.2 --after 0.8 --drift-at 2000
//!
//! Drift events are written to stdout as JSON lines; logs go to stderr.

use clap::{Parser, Subcommand, ValueEnum};
use driftwatch::config::MonitorConfig;
use driftwatch::metrics::DetectorMetrics;
use driftwatch::monitor::ShardedMonitor;
use driftwatch::simulation::{StreamGenerator, StreamKind};
use driftwatch::{DriftError, Result};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const DEFAULT_STREAM: &str = "default";

#[derive(Parser)]
#[command(name = "driftwatch")]
#[command(about = "Concept drift detection for numeric streams")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay `value` or `stream,value` lines through the monitor
    Replay {
        /// Input file (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Monitor configuration (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Print Prometheus metrics after the replay
        #[arg(long)]
        metrics: bool,
    },

    /// Run a synthetic stream with one abrupt drift through a detector
    Simulate {
        #[arg(short, long, default_value = "bernoulli")]
        kind: Kind,

        /// Probability (bernoulli) or mean (gaussian) before the drift
        #[arg(long, default_value = "0.2")]
        before: f64,

        /// Probability (bernoulli) or mean (gaussian) after the drift
        #[arg(long, default_value = "0.8")]
        after: f64,

        /// Standard deviation of gaussian streams
        #[arg(long, default_value = "1.0")]
        std_dev: f64,

        /// Index of the first drifted sample
        #[arg(long, default_value = "2000")]
        drift_at: u64,

        /// Total samples to generate
        #[arg(short, long, default_value = "4000")]
        samples: u64,

        #[arg(long, default_value = "42")]
        seed: u64,

        /// Monitor configuration (JSON); only its detector section is used
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Kind {
    Bernoulli,
    Gaussian,
}

fn load_config(path: Option<&Path>) -> Result<MonitorConfig> {
    match path {
        Some(path) => MonitorConfig::from_path(path),
        None => Ok(MonitorConfig::default()),
    }
}

fn parse_line(line: &str) -> Option<(&str, std::result::Result<f64, std::num::ParseFloatError>)> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(match line.split_once(',') {
        Some((stream, value)) => (stream.trim(), value.trim().parse()),
        None => (DEFAULT_STREAM, line.parse()),
    })
}

fn replay(input: Option<PathBuf>, config: Option<PathBuf>, print_metrics: bool) -> Result<()> {
    let config = load_config(config.as_deref())?;
    let metrics = DetectorMetrics::new()?;
    let monitor = ShardedMonitor::spawn(config, metrics.clone())?;

    let reader: Box<dyn BufRead> = match &input {
        Some(path) => Box::new(BufReader::new(std::fs::File::open(path)?)),
        None => Box::new(BufReader::new(std::io::stdin())),
    };
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut skipped = 0u64;
    for (line_no, line) in reader.lines().enumerate() {
        let line = line?;
        let Some((stream, value)) = parse_line(&line) else {
            continue;
        };
        match value {
            Ok(value) => monitor.observe(stream, value)?,
            Err(e) => {
                skipped += 1;
                warn!(line = line_no + 1, error = %e, "Skipping unparsable line.");
                continue;
            }
        }
        for event in monitor.events().try_iter() {
            writeln!(out, "{}", serde_json::to_string(&event)?)?;
        }
    }

    let (summary, remaining) = monitor.shutdown()?;
    for event in remaining {
        writeln!(out, "{}", serde_json::to_string(&event)?)?;
    }
    info!(
        streams = summary.streams,
        observations = summary.observations,
        drifts = summary.drifts,
        rejected = summary.rejected,
        skipped,
        "Replay finished."
    );

    if print_metrics {
        write!(out, "{}", metrics.render()?)?;
    }
    out.flush()?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn simulate(
    kind: Kind,
    before: f64,
    after: f64,
    std_dev: f64,
    drift_at: u64,
    samples: u64,
    seed: u64,
    config: Option<PathBuf>,
) -> Result<()> {
    let config = load_config(config.as_deref())?;
    let mut detector = config.detector.build()?;
    let kind = match kind {
        Kind::Bernoulli => StreamKind::Bernoulli { before, after },
        Kind::Gaussian => StreamKind::Gaussian { before, after, std_dev },
    };
    let mut stream = StreamGenerator::new(kind, drift_at, seed)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let mut drifts = 0u64;
    let mut false_alarms = 0u64;
    let mut first_delay = None;

    for time in 1..=samples {
        let value = stream.next_value();
        if detector.observe(value)? {
            drifts += 1;
            if time <= drift_at {
                false_alarms += 1;
            } else if first_delay.is_none() {
                first_delay = Some(time - drift_at);
            }
            let event = serde_json::json!({
                "detector": detector.name(),
                "time": time,
                "value": value,
            });
            writeln!(out, "{}", event)?;
        }
    }

    let summary = serde_json::json!({
        "stream": kind,
        "samples": samples,
        "drift_at": drift_at,
        "drifts": drifts,
        "false_alarms": false_alarms,
        "detection_delay": first_delay,
    });
    writeln!(out, "{}", summary)?;
    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Replay {
            input,
            config,
            metrics,
        } => replay(input, config, metrics),
        Commands::Simulate {
            kind,
            before,
            after,
            std_dev,
            drift_at,
            samples,
            seed,
            config,
        } => simulate(kind, before, after, std_dev, drift_at, samples, seed, config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(DriftError::InvalidConfig { field, reason }) => {
            error!(field, reason = %reason, "Invalid configuration.");
            ExitCode::from(2)
        }
        Err(e) => {
            error!(error = %e, "driftwatch failed.");
            ExitCode::FAILURE
        }
    }
}
