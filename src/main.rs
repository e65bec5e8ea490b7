//! AppId Stats CLI
//!
//! Replays flow-stats events into the per-application statistics
//! aggregator and writes completed windows to the statistics log.

use anyhow::{Context, Result};
use appid_stats::{
    clock::{Clock, ManualClock, SystemClock},
    collector::{ReplayCollector, ReplaySource},
    config::Config,
    core::AppIdStatistics,
    registry::{AppRegistry, StaticRegistry},
    sink::RollingLogOpener,
    telemetry::{create_shared_telemetry_with_persistence, read_persisted, SharedTelemetry},
    VERSION,
};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "appid-stats")]
#[command(version = VERSION)]
#[command(about = "Time-bucketed per-application byte statistics", long_about = None)]
struct Cli {
    /// Path to a JSON configuration file (defaults to the user config dir)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Logging verbosity (trace, debug, info, warn, error) or a filter directive
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate flow-stats events read as JSON lines
    Run {
        /// Input file, or `-` for standard input
        #[arg(long, short, default_value = "-")]
        input: String,

        /// Bucket width in seconds
        #[arg(long)]
        window_secs: Option<u64>,

        /// Log size in bytes at which the statistics log rolls over
        #[arg(long)]
        rollover_size: Option<u64>,

        /// Directory for the statistics log
        #[arg(long)]
        log_dir: Option<PathBuf>,

        /// JSON registry of application names
        #[arg(long)]
        registry: Option<PathBuf>,

        /// Drive the wall clock from event first-packet times
        #[arg(long)]
        event_clock: bool,
    },

    /// Show persisted aggregator statistics
    Status,

    /// Show the effective configuration
    Config {
        /// Save the effective configuration
        #[arg(long)]
        write: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level)
        .with_context(|| format!("invalid log level: {}", cli.log_level))?;
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Commands::Run {
            input,
            window_secs,
            rollover_size,
            log_dir,
            registry,
            event_clock,
        } => {
            let mut config = config;
            if let Some(secs) = window_secs {
                config.window_duration = Duration::from_secs(secs);
            }
            if let Some(size) = rollover_size {
                config.rollover_size = size;
            }
            if let Some(dir) = log_dir {
                config.log_dir = dir;
            }
            config.validate().context("invalid configuration")?;

            cmd_run(&config, &input, registry, event_clock)
        }
        Commands::Status => {
            cmd_status(&config);
            Ok(())
        }
        Commands::Config { write } => cmd_config(&config, cli.config, write),
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Config::load().context("loading config"),
    }
}

fn build_aggregator(
    config: &Config,
    clock: Box<dyn Clock>,
    registry: &Arc<dyn AppRegistry>,
    telemetry: &SharedTelemetry,
) -> Option<AppIdStatistics> {
    let opener = RollingLogOpener::new(&config.log_dir, config.rollover_size)
        .with_file_name(&config.log_file_name);

    AppIdStatistics::initialize(config, clock, registry.clone(), Box::new(opener))
        .map(|stats| stats.with_telemetry(telemetry.clone()))
}

fn cmd_run(
    config: &Config,
    input: &str,
    registry_path: Option<PathBuf>,
    event_clock: bool,
) -> Result<()> {
    let registry: Arc<dyn AppRegistry> = match registry_path {
        Some(path) => {
            let registry = StaticRegistry::load(&path)
                .with_context(|| format!("loading registry from {}", path.display()))?;
            tracing::info!(entries = registry.len(), "loaded application registry");
            Arc::new(registry)
        }
        None => Arc::new(StaticRegistry::new()),
    };

    let telemetry = create_shared_telemetry_with_persistence(config.telemetry_path());

    tracing::info!(
        version = VERSION,
        enabled = config.enabled,
        window_secs = config.window_secs(),
        rollover_size = config.rollover_size,
        log_dir = %config.log_dir.display(),
        "starting appid-stats"
    );

    // With an event clock the first window opens at the first event's time.
    let replay_clock = event_clock.then(|| ManualClock::new(0));
    let mut stats = match replay_clock {
        Some(_) => None,
        None => build_aggregator(config, Box::new(SystemClock), &registry, &telemetry),
    };

    let running = Arc::new(AtomicBool::new(true));
    let r = running.clone();
    ctrlc::set_handler(move || {
        r.store(false, Ordering::SeqCst);
    })
    .context("setting Ctrl+C handler")?;

    let mut collector = ReplayCollector::new(ReplaySource::from_arg(input));
    collector.start().context("starting replay collector")?;

    let receiver = collector.receiver().clone();
    let mut last_flush = Instant::now();

    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => {
                if let Some(clock) = &replay_clock {
                    clock.advance_to(event.first_packet_time);
                    if stats.is_none() && config.enabled {
                        stats = build_aggregator(
                            config,
                            Box::new(clock.clone()),
                            &registry,
                            &telemetry,
                        );
                    }
                }

                if let Some(stats) = stats.as_mut() {
                    stats.update(&event);
                }
            }
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => {}
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => {
                tracing::info!("end of input");
                break;
            }
        }

        // Rotate idle windows on schedule
        if last_flush.elapsed() >= Duration::from_secs(1) {
            if let Some(stats) = stats.as_mut() {
                stats.flush();
            }
            last_flush = Instant::now();
        }
    }

    collector.stop();

    if let Some(stats) = stats {
        stats.shutdown();
    }

    if collector.skipped_lines() > 0 {
        tracing::warn!(
            skipped = collector.skipped_lines(),
            "malformed input lines were skipped"
        );
    }

    if let Err(e) = telemetry.save() {
        tracing::warn!(error = %e, "could not save aggregator telemetry");
    }

    println!("{}", telemetry.summary());
    Ok(())
}

fn cmd_status(config: &Config) {
    println!("AppId Stats Status");
    println!("==================");
    println!();

    println!("Configuration:");
    println!(
        "  Statistics: {}",
        if config.enabled { "enabled" } else { "disabled" }
    );
    println!("  Window duration: {}s", config.window_secs());
    println!("  Rollover size: {} bytes", config.rollover_size);
    println!(
        "  Log file: {}",
        config.log_dir.join(&config.log_file_name).display()
    );
    if let Some(limit) = config.max_records_per_bucket {
        println!("  Records per bucket: {limit}");
    }
    println!();

    let telemetry_path = config.telemetry_path();
    if telemetry_path.exists() {
        match read_persisted(&telemetry_path) {
            Ok(persisted) => {
                println!("Cumulative Statistics:");
                println!("  Flow events processed: {}", persisted.events_processed);
                println!("  Flow events rejected: {}", persisted.events_rejected);
                println!("  Application records created: {}", persisted.records_created);
                println!("  Contributions dropped: {}", persisted.contributions_dropped);
                println!("  Window rotations: {}", persisted.rotations);
                println!("  Buckets exported: {}", persisted.buckets_exported);
                println!("  Lines written: {}", persisted.lines_written);
                println!("  Failed drains: {}", persisted.drain_failures);
                println!("  Last updated: {}", persisted.last_updated);
            }
            Err(e) => eprintln!("Warning: Could not read {}: {e}", telemetry_path.display()),
        }
    } else {
        println!("No previous run data found.");
    }
}

fn cmd_config(config: &Config, path: Option<PathBuf>, write: bool) -> Result<()> {
    let json = serde_json::to_string_pretty(config).context("serializing config")?;
    println!("{json}");

    if write {
        let path = path.unwrap_or_else(Config::config_path);
        config
            .save_to(&path)
            .with_context(|| format!("saving config to {}", path.display()))?;
        println!();
        println!("Saved to {}", path.display());
    }
    Ok(())
}
