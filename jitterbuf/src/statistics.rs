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

use serde::{Deserialize, Serialize};

use crate::history::find_pointer;

/// Counters and gauges describing a jitter buffer.
///
/// Counters are maintained as frames flow through. Gauges are only
/// meaningful in a snapshot returned by [`crate::JitterBuffer::get_info`],
/// which recomputes them from the current state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    /// Frames handed to `put`
    pub frames_received: u64,
    /// Voice frames dropped because their playout slot had passed
    pub frames_late: u64,
    /// Playout slots interpolated because no frame was there
    pub frames_lost: u64,
    /// Voice or silence frames that arrived older than the newest queued frame
    pub frames_ooo: u64,
    /// Frames dropped to shrink the buffer
    pub frames_dropped: u64,
    /// Voice frames dropped as duplicates
    pub frames_dropped_twice: u64,

    /// Current buffer delay above the minimum delay (ms)
    pub delay: i64,
    /// Smoothed one-way delay variation (ms)
    pub jitter: i64,
    /// Percentage of recent frames that arrived later than the current delay
    pub losspct: i64,
    /// Target buffer delay above the minimum delay (ms)
    pub delay_target: i64,
    /// Duration of the most recent voice frame (ms)
    pub last_voice_ms: i64,
    /// Whether playout is in the silence state
    pub silence: bool,
    /// Interquartile range of recent delays (ms)
    pub iqr: i64,
    /// Voice and silence frames waiting in the queue
    pub frames_in_queue: usize,
    /// Number of arrivals in the delay history
    pub history_len: usize,
}

/// Derived values fed into a snapshot
#[derive(Debug, Clone, Copy, Default)]
pub struct Gauges {
    pub min: i64,
    pub current: i64,
    pub target: i64,
    pub jitter: i64,
    pub iqr: i64,
    pub losspct: i64,
    pub last_voice_ms: i64,
    pub silence: bool,
    pub frames_in_queue: usize,
    pub history_len: usize,
}

/// Statistics tracker
#[derive(Debug, Default)]
pub struct StatisticsCalculator {
    info: Info,
}

impl StatisticsCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_received(&mut self) {
        self.info.frames_received += 1;
    }

    pub fn frame_late(&mut self) {
        self.info.frames_late += 1;
    }

    pub fn frame_lost(&mut self) {
        self.info.frames_lost += 1;
    }

    pub fn frame_out_of_order(&mut self) {
        self.info.frames_ooo += 1;
    }

    pub fn frame_dropped(&mut self) {
        self.info.frames_dropped += 1;
    }

    pub fn frame_dropped_twice(&mut self) {
        self.info.frames_dropped_twice += 1;
    }

    /// Counters as they stand, gauges from the last snapshot
    pub fn info(&self) -> &Info {
        &self.info
    }

    /// Refresh the gauges and return a copy of everything
    pub fn snapshot(&mut self, gauges: Gauges) -> Info {
        self.info.delay = gauges.current.saturating_sub(gauges.min);
        self.info.delay_target = gauges.target.saturating_sub(gauges.min);
        self.info.jitter = gauges.jitter;
        self.info.iqr = gauges.iqr;
        self.info.losspct = gauges.losspct;
        self.info.last_voice_ms = gauges.last_voice_ms;
        self.info.silence = gauges.silence;
        self.info.frames_in_queue = gauges.frames_in_queue;
        self.info.history_len = gauges.history_len;
        self.info.clone()
    }

    pub fn reset(&mut self) {
        self.info = Info::default();
    }
}

/// Percentage of remembered arrivals whose delay exceeds `current`.
///
/// `find_pointer` returns `len` when every delay is below `current`, so the
/// result is clamped at zero rather than indexing past the array.
pub fn loss_percent(sorted_delays: &[i64], current: i64) -> i64 {
    let max_index = match sorted_delays.len().checked_sub(1) {
        Some(0) | None => return 0,
        Some(max_index) => max_index,
    };
    let pointer = find_pointer(sorted_delays, current);
    (max_index.saturating_sub(pointer) * 100 / max_index) as i64
}
