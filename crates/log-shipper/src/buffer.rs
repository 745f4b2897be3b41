// Copyright 2025-Present New Relic, Inc. https://newrelic.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch accumulation and the flush predicate.
//!
//! The flush predicate is only evaluated as a side effect of insertion;
//! there is no background timer. A batch that stops receiving records sits
//! indefinitely until the next record arrives or the process shuts down.

use std::mem;
use std::time::{Duration, Instant};

use crate::record::Record;

/// Holds the live batch and decides, on each insertion, whether it must be
/// flushed now.
///
/// Not internally synchronized: the ingestion path is assumed to be driven
/// by a single sequential caller, so the snapshot/replace step in
/// [`BatchBuffer::take_all`] is atomic with respect to everything that can
/// observe the buffer.
#[derive(Debug)]
pub struct BatchBuffer {
    records: Vec<Record>,
    max_records: usize,
    max_time_between_flushes: Duration,
    last_flush: Instant,
}

impl BatchBuffer {
    pub fn new(max_records: usize, max_time_between_flushes: Duration) -> Self {
        BatchBuffer {
            records: Vec::new(),
            max_records,
            max_time_between_flushes,
            last_flush: Instant::now(),
        }
    }

    /// Appends one record, then hands back the whole batch when a flush
    /// threshold is crossed: either the batch has reached `max_records` or
    /// `max_time_between_flushes` has elapsed since the last flush.
    pub fn insert(&mut self, record: Record) -> Option<Vec<Record>> {
        self.records.push(record);
        if self.flush_due() {
            Some(self.take_all())
        } else {
            None
        }
    }

    fn flush_due(&self) -> bool {
        self.records.len() >= self.max_records
            || self.last_flush.elapsed() >= self.max_time_between_flushes
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Snapshots the live batch, replaces it with a fresh empty one and
    /// resets the flush clock, as a single step. Also the manual flush used
    /// at shutdown.
    pub fn take_all(&mut self) -> Vec<Record> {
        self.last_flush = Instant::now();
        mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn record(n: u64) -> Record {
        let mut record = Record::new();
        record.insert("message".to_string(), Value::from(format!("record {}", n)));
        record
    }

    // A flush clock long enough that only the count trigger can fire.
    const NEVER: Duration = Duration::from_secs(3600);

    #[test]
    fn test_count_trigger_fires_exactly_at_max_records() {
        let mut buffer = BatchBuffer::new(2, NEVER);

        assert!(buffer.insert(record(1)).is_none());
        assert_eq!(buffer.len(), 1);

        let batch = buffer.insert(record(2)).expect("second insert should flush");
        assert_eq!(batch.len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_time_trigger_fires_on_next_insertion_only() {
        let mut buffer = BatchBuffer::new(100, Duration::from_millis(50));

        assert!(buffer.insert(record(1)).is_none());

        // Threshold passes while no records arrive; nothing flushes until
        // the next insertion samples the clock.
        std::thread::sleep(Duration::from_millis(60));
        assert_eq!(buffer.len(), 1);

        let batch = buffer.insert(record(2)).expect("insert past deadline should flush");
        assert_eq!(batch.len(), 2);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_flush_resets_the_clock() {
        let mut buffer = BatchBuffer::new(2, Duration::from_millis(50));

        buffer.insert(record(1));
        buffer.insert(record(2)).expect("count trigger");

        // A fresh batch right after a flush must not time-trigger.
        assert!(buffer.insert(record(3)).is_none());
        assert_eq!(buffer.len(), 1);
    }

    #[test]
    fn test_take_all_empties_the_buffer() {
        let mut buffer = BatchBuffer::new(100, NEVER);
        buffer.insert(record(1));
        buffer.insert(record(2));

        let batch = buffer.take_all();
        assert_eq!(batch.len(), 2);
        assert!(buffer.is_empty());
        assert!(buffer.take_all().is_empty());
    }

    #[test]
    fn test_insert_preserves_order() {
        let mut buffer = BatchBuffer::new(3, NEVER);
        buffer.insert(record(1));
        buffer.insert(record(2));
        let batch = buffer.insert(record(3)).expect("count trigger");

        let messages: Vec<_> = batch
            .iter()
            .map(|r| r.get("message").and_then(Value::as_str).unwrap_or_default())
            .collect();
        assert_eq!(messages, vec!["record 1", "record 2", "record 3"]);
    }
}
