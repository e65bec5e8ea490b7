//! Time buckets and the ordered sequence that holds them.

use crate::clock::Timestamp;
use crate::collector::types::AppId;
use crate::core::record::{RecordStore, StatsError};
use crate::registry::AppRegistry;

/// One fixed-width time window of per-application counters.
#[derive(Debug)]
pub struct Bucket {
    /// Window start, floored to the window width
    pub start_time: Timestamp,
    /// Window-wide initiator bytes, independent of per-app records
    pub total_initiator_bytes: u64,
    /// Window-wide responder bytes, independent of per-app records
    pub total_responder_bytes: u64,
    record_count: usize,
    records: RecordStore,
}

impl Bucket {
    pub fn new(start_time: Timestamp, record_limit: Option<usize>) -> Self {
        let records = match record_limit {
            Some(limit) => RecordStore::with_capacity_limit(limit),
            None => RecordStore::new(),
        };

        Self {
            start_time,
            total_initiator_bytes: 0,
            total_responder_bytes: 0,
            record_count: 0,
            records,
        }
    }

    /// Adds one event's bytes to the window totals.
    pub fn add_totals(&mut self, initiator_bytes: u64, responder_bytes: u64) {
        self.total_initiator_bytes = self.total_initiator_bytes.saturating_add(initiator_bytes);
        self.total_responder_bytes = self.total_responder_bytes.saturating_add(responder_bytes);
    }

    /// Folds bytes into the record for `app_id`, creating it on first use.
    ///
    /// Returns `true` if the record was created by this call.
    pub fn accumulate(
        &mut self,
        app_id: AppId,
        registry: &dyn AppRegistry,
        initiator_bytes: u64,
        responder_bytes: u64,
    ) -> Result<bool, StatsError> {
        let created = self
            .records
            .accumulate(app_id, registry, initiator_bytes, responder_bytes)?;
        if created {
            self.record_count += 1;
        }
        Ok(created)
    }

    /// Number of distinct application ids recorded.
    pub fn record_count(&self) -> usize {
        self.record_count
    }

    pub fn records(&self) -> &RecordStore {
        &self.records
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

/// Buckets ordered by strictly increasing start time.
#[derive(Debug, Default)]
pub struct BucketSequence {
    buckets: Vec<Bucket>,
    record_limit: Option<usize>,
}

impl BucketSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sequence whose buckets refuse records beyond `limit`.
    pub fn with_record_limit(record_limit: Option<usize>) -> Self {
        Self {
            buckets: Vec::new(),
            record_limit,
        }
    }

    /// Returns the bucket starting at `start_time`, inserting a new one in
    /// time order if none exists.
    ///
    /// Scans from the earliest bucket: an equal start time is returned, the
    /// first later start time gets the new bucket inserted before it, and an
    /// exhausted scan appends at the tail.
    pub fn locate_or_create(&mut self, start_time: Timestamp) -> &mut Bucket {
        let index = match self
            .buckets
            .iter()
            .position(|b| b.start_time >= start_time)
        {
            Some(i) if self.buckets[i].start_time == start_time => return &mut self.buckets[i],
            Some(i) => i,
            None => self.buckets.len(),
        };

        self.buckets
            .insert(index, Bucket::new(start_time, self.record_limit));
        &mut self.buckets[index]
    }

    pub fn get(&self, start_time: Timestamp) -> Option<&Bucket> {
        self.buckets.iter().find(|b| b.start_time == start_time)
    }

    /// Removes and returns the earliest bucket.
    pub fn pop_earliest(&mut self) -> Option<Bucket> {
        if self.buckets.is_empty() {
            None
        } else {
            Some(self.buckets.remove(0))
        }
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Bucket> {
        self.buckets.iter()
    }

    /// Start times in sequence order.
    pub fn start_times(&self) -> Vec<Timestamp> {
        self.buckets.iter().map(|b| b.start_time).collect()
    }
}
