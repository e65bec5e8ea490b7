//! Per-application byte counters within one time bucket.

use crate::collector::types::{
    AppId, APP_ID_NONE, APP_ID_UNKNOWN, APP_ID_UNKNOWN_UI, COOKED_CLIENT_THRESHOLD,
};
use crate::registry::AppRegistry;
use std::collections::btree_map::{self, BTreeMap, Entry};

/// Maximum display-name length in bytes, including the C-style terminator
/// the exported log format was defined with.
pub const MAX_APP_NAME_LEN: usize = 64;

const COOKED_CLIENT_PREFIX: &str = "_cl_";

/// Byte counters for one application within one bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRecord {
    pub display_name: String,
    pub initiator_bytes: u64,
    pub responder_bytes: u64,
}

impl ApplicationRecord {
    pub fn new(display_name: String) -> Self {
        Self {
            display_name,
            initiator_bytes: 0,
            responder_bytes: 0,
        }
    }

    /// Adds to both accumulators, saturating at `u64::MAX`.
    pub fn add(&mut self, initiator_delta: u64, responder_delta: u64) {
        self.initiator_bytes = self.initiator_bytes.saturating_add(initiator_delta);
        self.responder_bytes = self.responder_bytes.saturating_add(responder_delta);
    }
}

/// Ordered store of application records keyed by application id.
#[derive(Debug, Default)]
pub struct RecordStore {
    records: BTreeMap<AppId, ApplicationRecord>,
    capacity: Option<usize>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that refuses new records beyond `limit`.
    pub fn with_capacity_limit(limit: usize) -> Self {
        Self {
            records: BTreeMap::new(),
            capacity: Some(limit),
        }
    }

    /// Returns the record for `app_id`, creating it with zeroed counters
    /// and a resolved display name if absent.
    pub fn find_or_insert(
        &mut self,
        app_id: AppId,
        registry: &dyn AppRegistry,
    ) -> Result<&mut ApplicationRecord, StatsError> {
        self.entry(app_id, registry).map(|(record, _)| record)
    }

    /// Folds byte deltas into the record for `app_id`.
    ///
    /// Returns `true` if the record was created by this call.
    pub fn accumulate(
        &mut self,
        app_id: AppId,
        registry: &dyn AppRegistry,
        initiator_delta: u64,
        responder_delta: u64,
    ) -> Result<bool, StatsError> {
        let (record, created) = self.entry(app_id, registry)?;
        record.add(initiator_delta, responder_delta);
        Ok(created)
    }

    fn entry(
        &mut self,
        app_id: AppId,
        registry: &dyn AppRegistry,
    ) -> Result<(&mut ApplicationRecord, bool), StatsError> {
        let len = self.records.len();
        match self.records.entry(app_id) {
            Entry::Occupied(entry) => Ok((entry.into_mut(), false)),
            Entry::Vacant(entry) => {
                if let Some(limit) = self.capacity {
                    if len >= limit {
                        return Err(StatsError::CapacityExhausted { app_id, limit });
                    }
                }
                let name = resolve_display_name(app_id, registry);
                Ok((entry.insert(ApplicationRecord::new(name)), true))
            }
        }
    }

    pub fn get(&self, app_id: AppId) -> Option<&ApplicationRecord> {
        self.records.get(&app_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in ascending application-id order.
    pub fn iter(&self) -> btree_map::Iter<'_, AppId, ApplicationRecord> {
        self.records.iter()
    }
}

impl<'a> IntoIterator for &'a RecordStore {
    type Item = (&'a AppId, &'a ApplicationRecord);
    type IntoIter = btree_map::Iter<'a, AppId, ApplicationRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// Resolves the exported display name for an application id.
///
/// Cooked-client ids get a `_cl_` prefix on their registry name. Ids the
/// registry does not know fall back to the sentinel names or a synthesized
/// `_err_` name.
pub fn resolve_display_name(app_id: AppId, registry: &dyn AppRegistry) -> String {
    let name = if app_id >= COOKED_CLIENT_THRESHOLD {
        match registry.resolve(app_id) {
            Some(base) => format!("{COOKED_CLIENT_PREFIX}{base}"),
            None => format!("_err_cl_{app_id}"),
        }
    } else if let Some(name) = registry.resolve(app_id) {
        name
    } else if app_id == APP_ID_UNKNOWN || app_id == APP_ID_UNKNOWN_UI {
        "__unknown".to_string()
    } else if app_id == APP_ID_NONE {
        "__none".to_string()
    } else {
        format!("_err_{app_id}")
    };

    truncate_name(name)
}

/// Truncates to fit [`MAX_APP_NAME_LEN`] on a UTF-8 boundary.
fn truncate_name(mut name: String) -> String {
    let max = MAX_APP_NAME_LEN - 1;
    if name.len() > max {
        let mut cut = max;
        while !name.is_char_boundary(cut) {
            cut -= 1;
        }
        name.truncate(cut);
    }
    name
}

/// Failures while folding an event into a bucket.
///
/// Never fatal: the affected contribution is dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    CapacityExhausted { app_id: AppId, limit: usize },
}

impl std::fmt::Display for StatsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsError::CapacityExhausted { app_id, limit } => write!(
                f,
                "Error saving statistics record for app id: {app_id} (bucket limit {limit})"
            ),
        }
    }
}

impl std::error::Error for StatsError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;

    fn registry() -> StaticRegistry {
        StaticRegistry::new()
            .with(676, "HTTP")
            .with(COOKED_CLIENT_THRESHOLD + 5, "Chrome")
    }

    #[test]
    fn test_display_name_resolution() {
        let registry = registry();

        assert_eq!(resolve_display_name(676, &registry), "HTTP");
        assert_eq!(
            resolve_display_name(COOKED_CLIENT_THRESHOLD + 5, &registry),
            "_cl_Chrome"
        );
        assert_eq!(
            resolve_display_name(COOKED_CLIENT_THRESHOLD + 6, &registry),
            format!("_err_cl_{}", COOKED_CLIENT_THRESHOLD + 6)
        );
        assert_eq!(resolve_display_name(42, &registry), "_err_42");
        assert_eq!(resolve_display_name(APP_ID_NONE, &registry), "__none");
        assert_eq!(resolve_display_name(APP_ID_UNKNOWN, &registry), "__unknown");
        assert_eq!(resolve_display_name(APP_ID_UNKNOWN_UI, &registry), "__unknown");
    }

    #[test]
    fn test_registry_name_beats_sentinel() {
        let registry = StaticRegistry::new().with(APP_ID_UNKNOWN_UI, "Unknown App");
        assert_eq!(resolve_display_name(APP_ID_UNKNOWN_UI, &registry), "Unknown App");
    }

    #[test]
    fn test_long_names_truncated() {
        let registry = StaticRegistry::new()
            .with(1, "x".repeat(100))
            .with(2, "é".repeat(40));

        assert_eq!(resolve_display_name(1, &registry).len(), MAX_APP_NAME_LEN - 1);

        // 40 two-byte chars cut back to the last whole char
        let name = resolve_display_name(2, &registry);
        assert_eq!(name.len(), 62);
        assert!(name.chars().all(|c| c == 'é'));
    }

    #[test]
    fn test_find_or_insert_creates_once() {
        let registry = registry();
        let mut store = RecordStore::new();

        let record = store.find_or_insert(676, &registry).unwrap();
        assert_eq!(record.display_name, "HTTP");
        assert_eq!(record.initiator_bytes, 0);
        record.add(10, 20);

        let record = store.find_or_insert(676, &registry).unwrap();
        assert_eq!(record.initiator_bytes, 10);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_accumulate_reports_creation() {
        let registry = registry();
        let mut store = RecordStore::new();

        assert!(store.accumulate(676, &registry, 10, 20).unwrap());
        assert!(!store.accumulate(676, &registry, 5, 5).unwrap());

        let record = store.get(676).unwrap();
        assert_eq!(record.initiator_bytes, 15);
        assert_eq!(record.responder_bytes, 25);
    }

    #[test]
    fn test_iteration_is_ordered_by_app_id() {
        let registry = registry();
        let mut store = RecordStore::new();

        for app_id in [900, 3, 676, -1, 42] {
            store.accumulate(app_id, &registry, 1, 1).unwrap();
        }

        let ids: Vec<AppId> = store.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![-1, 3, 42, 676, 900]);
    }

    #[test]
    fn test_capacity_limit_rejects_new_records_only() {
        let registry = registry();
        let mut store = RecordStore::with_capacity_limit(1);

        store.accumulate(676, &registry, 1, 1).unwrap();
        assert_eq!(
            store.accumulate(42, &registry, 1, 1),
            Err(StatsError::CapacityExhausted {
                app_id: 42,
                limit: 1
            })
        );

        // Existing records still accumulate
        store.accumulate(676, &registry, 1, 1).unwrap();
        assert_eq!(store.get(676).unwrap().initiator_bytes, 2);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_accumulators_saturate() {
        let mut record = ApplicationRecord::new("x".into());
        record.add(u64::MAX - 1, 0);
        record.add(5, 0);
        assert_eq!(record.initiator_bytes, u64::MAX);
    }
}
