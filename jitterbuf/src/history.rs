/*
 * Copyright 2025 Security Union LLC
 *
 * Licensed under either of
 *
 * * Apache License, Version 2.0
 *   (http://www.apache.org/licenses/LICENSE-2.0)
 * * MIT license
 *   (http://opensource.org/licenses/MIT)
 *
 * at your option.
 *
 * Unless you explicitly state otherwise, any contribution intentionally
 * submitted for inclusion in the work by you, as defined in the Apache-2.0
 * license, shall be dual licensed as above, without any additional terms or
 * conditions.
 */

use crate::frame::CodecId;

/// Number of voice arrivals remembered for the delay statistics
pub const HISTORY_SIZE: usize = 500;

/// One unique voice arrival
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistoryElement {
    /// Arrival time minus sender timestamp, in milliseconds
    pub delay: i64,
    pub timestamp: i64,
    pub duration_ms: i64,
    pub codec: CodecId,
}

/// Leftmost index `i` with `array[i] >= value`, or `array.len()` if there is none.
///
/// Ties resolve to the first occurrence, which is what both duplicate
/// detection and removal of repeated delay values rely on.
pub fn find_pointer(array: &[i64], value: i64) -> usize {
    array.partition_point(|&v| v < value)
}

/// Bounded record of recent arrivals.
///
/// Keeps a ring of the last [`HISTORY_SIZE`] arrivals plus two ascending
/// copies of their delays and timestamps, so percentiles and duplicate
/// lookups are binary searches.
#[derive(Debug, Clone)]
pub struct HistoryTracker {
    ring: Vec<HistoryElement>,
    sorted_delay: Vec<i64>,
    sorted_timestamp: Vec<i64>,
    /// Total number of arrivals recorded since the last reset
    write_cursor: usize,
}

impl Default for HistoryTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl HistoryTracker {
    pub fn new() -> Self {
        Self {
            ring: Vec::with_capacity(HISTORY_SIZE),
            sorted_delay: Vec::with_capacity(HISTORY_SIZE),
            sorted_timestamp: Vec::with_capacity(HISTORY_SIZE),
            write_cursor: 0,
        }
    }

    /// Number of valid entries, `min(write_cursor, HISTORY_SIZE)`
    pub fn len(&self) -> usize {
        self.sorted_delay.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sorted_delay.is_empty()
    }

    pub fn write_cursor(&self) -> usize {
        self.write_cursor
    }

    pub fn sorted_delays(&self) -> &[i64] {
        &self.sorted_delay
    }

    pub fn sorted_timestamps(&self) -> &[i64] {
        &self.sorted_timestamp
    }

    /// Whether a voice frame with this sender timestamp is still remembered
    pub fn contains_timestamp(&self, timestamp: i64) -> bool {
        let idx = find_pointer(&self.sorted_timestamp, timestamp);
        self.sorted_timestamp.get(idx) == Some(&timestamp)
    }

    /// Record an arrival and return its delay.
    ///
    /// When the ring is full the oldest entry is evicted from both sorted
    /// arrays before the new values go in, so neither array ever grows past
    /// [`HISTORY_SIZE`].
    pub fn record(&mut self, timestamp: i64, now: i64, duration_ms: i64, codec: CodecId) -> i64 {
        let delay = now.saturating_sub(timestamp);
        let slot = self.write_cursor % HISTORY_SIZE;

        if self.write_cursor >= HISTORY_SIZE {
            let oldest = self.ring[slot];
            remove_sorted(&mut self.sorted_delay, oldest.delay);
            remove_sorted(&mut self.sorted_timestamp, oldest.timestamp);
        }

        insert_sorted(&mut self.sorted_delay, delay);
        insert_sorted(&mut self.sorted_timestamp, timestamp);

        let element = HistoryElement {
            delay,
            timestamp,
            duration_ms,
            codec,
        };
        if slot < self.ring.len() {
            self.ring[slot] = element;
        } else {
            self.ring.push(element);
        }
        self.write_cursor += 1;

        delay
    }

    /// Most recently recorded arrival
    pub fn latest(&self) -> Option<&HistoryElement> {
        if self.write_cursor == 0 {
            return None;
        }
        self.ring.get((self.write_cursor - 1) % HISTORY_SIZE)
    }

    pub fn reset(&mut self) {
        self.ring.clear();
        self.sorted_delay.clear();
        self.sorted_timestamp.clear();
        self.write_cursor = 0;
    }
}

fn insert_sorted(array: &mut Vec<i64>, value: i64) {
    let idx = find_pointer(array, value);
    array.insert(idx, value);
}

fn remove_sorted(array: &mut Vec<i64>, value: i64) {
    // Evict by index: with repeated values any matching slot is equivalent.
    let idx = find_pointer(array, value);
    if array.get(idx) == Some(&value) {
        array.remove(idx);
    } else {
        debug_assert!(false, "history value {value} missing from sorted array");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_ascending(values: &[i64]) -> bool {
        values.windows(2).all(|w| w[0] <= w[1])
    }

    #[test]
    fn test_find_pointer() {
        let values = [10, 20, 20, 20, 30];
        assert_eq!(find_pointer(&values, 5), 0);
        assert_eq!(find_pointer(&values, 20), 1);
        assert_eq!(find_pointer(&values, 25), 4);
        assert_eq!(find_pointer(&values, 30), 4);
        assert_eq!(find_pointer(&values, 31), 5);
        assert_eq!(find_pointer(&[], 1), 0);
    }

    #[test]
    fn test_record_keeps_arrays_sorted() {
        let mut history = HistoryTracker::new();
        let delays = [50, 10, 80, 10, 35, 60, 5, 90, 35];
        for (i, delay) in delays.iter().enumerate() {
            let ts = (i as i64) * 20;
            assert_eq!(history.record(ts, ts + delay, 20, CodecId::G711), *delay);
            assert!(is_ascending(history.sorted_delays()));
            assert!(is_ascending(history.sorted_timestamps()));
        }
        assert_eq!(history.len(), delays.len());
        assert_eq!(history.sorted_delays()[0], 5);
        assert_eq!(history.sorted_delays()[delays.len() - 1], 90);
    }

    #[test]
    fn test_eviction_after_wrap() {
        let mut history = HistoryTracker::new();
        for i in 0..(HISTORY_SIZE as i64 + 120) {
            // Repeating delay pattern exercises eviction of duplicate values.
            let ts = i * 20;
            history.record(ts, ts + 40 + (i % 7) * 5, 20, CodecId::G729);
            assert_eq!(history.len(), history.write_cursor().min(HISTORY_SIZE));
            assert!(is_ascending(history.sorted_delays()));
            assert!(is_ascending(history.sorted_timestamps()));
        }
        assert_eq!(history.len(), HISTORY_SIZE);
        // The oldest 120 timestamps are gone.
        assert!(!history.contains_timestamp(0));
        assert!(!history.contains_timestamp(119 * 20));
        assert!(history.contains_timestamp(120 * 20));
        assert_eq!(history.sorted_timestamps()[0], 120 * 20);
    }

    #[test]
    fn test_contains_timestamp() {
        let mut history = HistoryTracker::new();
        history.record(100, 150, 20, CodecId::Other);
        history.record(140, 170, 20, CodecId::Other);
        assert!(history.contains_timestamp(100));
        assert!(history.contains_timestamp(140));
        assert!(!history.contains_timestamp(120));
        assert!(!history.contains_timestamp(200));
    }

    #[test]
    fn test_latest_and_reset() {
        let mut history = HistoryTracker::new();
        assert!(history.latest().is_none());
        history.record(0, 30, 20, CodecId::GsmEfr);
        history.record(20, 45, 30, CodecId::GsmEfr);
        let latest = history.latest().unwrap();
        assert_eq!(latest.timestamp, 20);
        assert_eq!(latest.delay, 25);
        assert_eq!(latest.duration_ms, 30);

        history.reset();
        assert!(history.is_empty());
        assert_eq!(history.write_cursor(), 0);
        assert!(history.latest().is_none());
        history.record(0, 10, 20, CodecId::GsmEfr);
        assert_eq!(history.len(), 1);
    }

    #[test]
    fn test_record_saturates_delay() {
        let mut history = HistoryTracker::new();
        assert_eq!(history.record(i64::MIN, 10, 20, CodecId::G711), i64::MAX);
        assert_eq!(history.record(i64::MAX, -10, 20, CodecId::G711), i64::MIN);
        assert_eq!(history.sorted_delays(), &[i64::MIN, i64::MAX]);
    }
}
