//! Flow-stats events reported by the classification engine.

use crate::clock::Timestamp;
use serde::{Deserialize, Serialize};

/// Application identifier assigned by the classification engine.
pub type AppId = i32;

/// No application was identified.
pub const APP_ID_NONE: AppId = 0;
/// Classification finished without a match.
pub const APP_ID_UNKNOWN: AppId = -1;
/// Unknown application as reported to the UI.
pub const APP_ID_UNKNOWN_UI: AppId = 65535;

/// Identifiers at or above this value live in the cooked-client namespace.
pub const COOKED_CLIENT_THRESHOLD: AppId = 2_000_000_000;

/// Per-flow statistics emitted whenever the engine wants bytes recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowStatsEvent {
    /// Time of the first packet of the flow
    pub first_packet_time: Timestamp,
    /// Bytes sent by the flow initiator
    pub initiator_bytes: u64,
    /// Bytes sent by the responder
    pub responder_bytes: u64,
    #[serde(default)]
    pub service_app_id: AppId,
    #[serde(default)]
    pub client_app_id: AppId,
    #[serde(default)]
    pub web_app_id: AppId,
}

impl FlowStatsEvent {
    /// Returns the identifiers this event's bytes are credited to.
    ///
    /// A flow whose roles resolve to the same application is credited once:
    /// the web application first, then the service, then the client.
    pub fn credited_app_ids(&self) -> Vec<AppId> {
        let mut ids = Vec::with_capacity(3);

        if self.web_app_id > APP_ID_NONE {
            ids.push(self.web_app_id);
        }

        if self.service_app_id != APP_ID_NONE && self.service_app_id != self.web_app_id {
            ids.push(self.service_app_id);
        }

        if self.client_app_id > APP_ID_NONE
            && self.client_app_id != self.service_app_id
            && self.client_app_id != self.web_app_id
        {
            ids.push(self.client_app_id);
        }

        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(service: AppId, client: AppId, web: AppId) -> FlowStatsEvent {
        FlowStatsEvent {
            first_packet_time: 0,
            initiator_bytes: 1,
            responder_bytes: 1,
            service_app_id: service,
            client_app_id: client,
            web_app_id: web,
        }
    }

    #[test]
    fn test_all_roles_distinct() {
        assert_eq!(event(676, 638, 1122).credited_app_ids(), vec![1122, 676, 638]);
    }

    #[test]
    fn test_overlapping_roles_credited_once() {
        assert_eq!(event(676, 676, 676).credited_app_ids(), vec![676]);
        assert_eq!(event(676, 676, 0).credited_app_ids(), vec![676]);
        assert_eq!(event(676, 1122, 1122).credited_app_ids(), vec![1122, 676]);
    }

    #[test]
    fn test_none_and_unknown_roles() {
        assert!(event(0, 0, 0).credited_app_ids().is_empty());
        // A service equal to the web id is skipped even if web was not credited.
        assert_eq!(
            event(APP_ID_UNKNOWN, APP_ID_UNKNOWN, APP_ID_UNKNOWN).credited_app_ids(),
            Vec::<AppId>::new()
        );
        assert_eq!(event(APP_ID_UNKNOWN, 0, 0).credited_app_ids(), vec![APP_ID_UNKNOWN]);
    }

    #[test]
    fn test_event_json_defaults_missing_ids() {
        let json = r#"{"first_packet_time":5,"initiator_bytes":10,"responder_bytes":20,"service_app_id":676}"#;
        let parsed: FlowStatsEvent = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.service_app_id, 676);
        assert_eq!(parsed.client_app_id, APP_ID_NONE);
        assert_eq!(parsed.web_app_id, APP_ID_NONE);
    }
}
