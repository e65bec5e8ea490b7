//! Flow-stats event intake.
//!
//! The classification engine reports one [`FlowStatsEvent`] per flow it
//! wants recorded. The replay collector feeds recorded events from a
//! JSON-lines stream over a channel.

pub mod replay;
pub mod types;

// Re-export commonly used types
pub use replay::{parse_event_line, CollectorError, ReplayCollector, ReplaySource};
pub use types::{
    AppId, FlowStatsEvent, APP_ID_NONE, APP_ID_UNKNOWN, APP_ID_UNKNOWN_UI,
    COOKED_CLIENT_THRESHOLD,
};
