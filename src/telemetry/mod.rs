//! Telemetry for the statistics aggregator.

pub mod counters;

// Re-export commonly used types
pub use counters::{
    create_shared_telemetry, create_shared_telemetry_with_persistence, read_persisted,
    PersistedTelemetry, SharedTelemetry, StatsTelemetry, TelemetrySnapshot,
};
