//! svcwatchd - Service state collector daemon.
//!
//! Periodically queries the configured services and writes their uptime and
//! status metrics as JSON lines.

mod host;
mod pool;

use std::fs::OpenOptions;
use std::io;
use std::process::ExitCode;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{Level, debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use svcwatch_core::collector::ScriptInvoker;
use svcwatch_core::{JsonLinesSink, MetricBuilder, MetricSink, MonitorConfig, Orchestrator};

use crate::host::Host;

/// Service state collector daemon.
#[derive(Parser)]
#[command(name = "svcwatchd", about = "Service state collector daemon", version)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yml")]
    config: String,

    /// Collection interval in seconds.
    #[arg(short, long, default_value = "60")]
    interval: u64,

    /// Perform a single run and exit.
    #[arg(long)]
    once: bool,

    /// Number of worker threads. Defaults to the available parallelism.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Append metrics to this file instead of writing them to stdout.
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Logs go to stderr so that stdout can carry metrics.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for crate_name in ["svcwatchd", "svcwatch_core"] {
        if let Ok(directive) = format!("{}={}", crate_name, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn open_sink(output: Option<&str>) -> io::Result<Arc<dyn MetricSink>> {
    match output {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Ok(Arc::new(JsonLinesSink::new(file)))
        }
        None => Ok(Arc::new(JsonLinesSink::new(io::stdout()))),
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1)
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose, args.quiet);

    info!("svcwatchd {} starting", env!("CARGO_PKG_VERSION"));

    let config = match MonitorConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load {}: {}", args.config, e);
            return ExitCode::FAILURE;
        }
    };
    info!(
        "Config: {} services, {} patterns, prefix={:?}, timeout={}s",
        config.services.as_ref().map_or(0, Vec::len),
        config.service_regex.as_ref().map_or(0, Vec::len),
        config.metric_prefix,
        config.query_timeout_secs
    );

    let invoker = match ScriptInvoker::from_config(&config) {
        Ok(invoker) => invoker,
        Err(e) => {
            error!("Failed to prepare query script: {}", e);
            return ExitCode::FAILURE;
        }
    };
    debug!("Query script at {}", invoker.script().path().display());

    let sink = match open_sink(args.output.as_deref()) {
        Ok(sink) => sink,
        Err(e) => {
            error!("Failed to open metric output: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let host = Arc::new(Host::new(args.workers.unwrap_or_else(default_workers)));
    info!("Worker pool: {} threads", host.workers());

    // Setup graceful shutdown
    let shutdown = Arc::new(AtomicBool::new(false));
    let s = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.store(true, Ordering::SeqCst);
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let orchestrator = Orchestrator::new(
        host.clone(),
        Arc::new(invoker),
        sink,
        MetricBuilder::new(&config.metric_prefix),
    )
    .with_cancel_flag(shutdown.clone());

    let interval = Duration::from_secs(args.interval);
    info!("Starting collection loop");

    while !shutdown.load(Ordering::SeqCst) {
        debug!("Run #{} at {}", host.runs() + 1, Utc::now().to_rfc3339());
        orchestrator.run(&config);

        if args.once {
            break;
        }

        // Sleep with periodic checks for shutdown signal
        let sleep_interval = Duration::from_millis(100);
        let mut remaining = interval;
        while remaining > Duration::ZERO && !shutdown.load(Ordering::SeqCst) {
            let sleep_time = remaining.min(sleep_interval);
            std::thread::sleep(sleep_time);
            remaining = remaining.saturating_sub(sleep_time);
        }
    }

    info!("Shutting down...");
    info!(
        "Totals: {} runs, {} metrics sent, {} failed jobs",
        host.runs(),
        host.metrics_total(),
        host.failures_total()
    );
    info!("Shutdown complete");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_defaults() {
        let args = Args::parse_from(["svcwatchd"]);
        assert_eq!(args.config, "config.yml");
        assert_eq!(args.interval, 60);
        assert!(!args.once);
        assert!(args.workers.is_none());
        assert!(args.output.is_none());
    }

    #[test]
    fn parse_args_overrides() {
        let args = Args::parse_from([
            "svcwatchd", "-c", "/etc/svcwatch.yml", "-i", "5", "--once", "-w", "2", "-o",
            "out.jsonl", "-vv",
        ]);
        assert_eq!(args.config, "/etc/svcwatch.yml");
        assert_eq!(args.interval, 5);
        assert!(args.once);
        assert_eq!(args.workers, Some(2));
        assert_eq!(args.output.as_deref(), Some("out.jsonl"));
        assert_eq!(args.verbose, 2);
    }

    #[test]
    fn open_sink_appends_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        std::fs::write(&path, "existing\n").unwrap();

        let sink = open_sink(path.to_str()).unwrap();
        sink.write_batch(&svcwatch_core::MetricBatch {
            target: "A".into(),
            metrics: vec![svcwatch_core::Metric {
                entity_id: "A".into(),
                path: "p/serviceStatus/A".into(),
                value: "4".into(),
            }],
        })
        .unwrap();
        drop(sink);

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("existing\n"));
        assert!(content.contains("\"entityId\":\"A\""));
    }
}
