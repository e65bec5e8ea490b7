//! AppId Stats - time-bucketed per-application byte statistics.
//!
//! A flow classification engine reports per-flow byte counters together
//! with the application identifiers it assigned. This library folds those
//! reports into fixed-width time windows per application and exports each
//! completed window to a size-rolling text log.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         AppId Stats                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Collector  │──▶│   Buckets   │──▶│  Rotation   │       │
//! │  │ (flow stats)│   │ (per window)│   │(active/pend)│       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                 │               │
//! │                           ▼                 ▼               │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │  Registry   │   │  Exporter   │──▶ log │
//! │                    │   (names)   │   │  (drain)    │       │
//! │                    └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each exported line reads `<export_time>,<app_name>,<initiator_bytes>,<responder_bytes>`.
//!
//! # Example
//!
//! ```no_run
//! use appid_stats::{AppIdStatistics, Config, FlowStatsEvent, RollingLogOpener, StaticRegistry, SystemClock};
//! use std::sync::Arc;
//!
//! let config = Config::default();
//! let registry = StaticRegistry::new().with(676, "HTTP");
//! let opener = RollingLogOpener::new(&config.log_dir, config.rollover_size);
//!
//! if let Some(mut stats) = AppIdStatistics::initialize(
//!     &config,
//!     Box::new(SystemClock),
//!     Arc::new(registry),
//!     Box::new(opener),
//! ) {
//!     stats.update(&FlowStatsEvent {
//!         first_packet_time: 1_700_000_000,
//!         initiator_bytes: 512,
//!         responder_bytes: 4096,
//!         service_app_id: 676,
//!         client_app_id: 0,
//!         web_app_id: 0,
//!     });
//!     stats.shutdown();
//! }
//! ```

pub mod clock;
pub mod collector;
pub mod config;
pub mod core;
pub mod registry;
pub mod sink;
pub mod telemetry;

// Re-export key types at crate root for convenience
pub use clock::{Clock, ManualClock, SystemClock, Timestamp};
pub use collector::{AppId, FlowStatsEvent, ReplayCollector, ReplaySource};
pub use config::{Config, ConfigError};
pub use core::{AppIdStatistics, DrainReport, RotationState, StatsError};
pub use registry::{AppRegistry, StaticRegistry};
pub use sink::{MemorySink, RollingLogOpener, RollingTextLog, SinkOpener, StatsSink};
pub use telemetry::{SharedTelemetry, StatsTelemetry};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
