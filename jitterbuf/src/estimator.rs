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

use crate::frame::CodecId;
use crate::history::HistoryTracker;
use crate::mos::guess_mos;

/// Below this many history entries (as max index) the delay search is skipped
const MIN_SEARCH_INDEX: usize = 10;

/// Lower percentile (in percent) used as the base delay, trims early outliers
const MIN_DELAY_PERCENTILE: usize = 2;

/// Percentage of history the delay search must cover before it may stop.
///
/// Wider spread (IQR, ms) means a longer tail worth searching.
fn search_breadth_percent(iqr: i64) -> f32 {
    match iqr {
        i if i > 200 => 25.0,
        i if i > 100 => 20.0,
        i if i > 50 => 11.0,
        _ => 5.0,
    }
}

/// Delay statistics derived from the history on every unique voice arrival
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelayEstimate {
    /// Low-percentile delay (ms), the reference point for buffer sizes
    pub min: i64,
    /// Desired buffer delay (ms), on the same scale as arrival delays
    pub target: i64,
    /// Best delay above `min` found by the last search
    pub optimum: i64,
    /// Exponentially smoothed one-way delay variation (ms)
    pub jitter: i64,
    /// Interquartile range of the delay history (ms)
    pub iqr: i64,
}

/// Computes the target buffer delay by maximising the estimated MOS.
///
/// Rather than fixing a percentile, each update walks down the sorted delay
/// history and weighs the frames that would arrive too late against the
/// latency added by waiting for them, using the codec's quality curve.
#[derive(Debug, Clone, Default)]
pub struct SizeEstimator {
    estimate: DelayEstimate,
    last_delay: Option<i64>,
}

impl SizeEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn estimate(&self) -> DelayEstimate {
        self.estimate
    }

    pub fn min(&self) -> i64 {
        self.estimate.min
    }

    pub fn target(&self) -> i64 {
        self.estimate.target
    }

    pub fn jitter(&self) -> i64 {
        self.estimate.jitter
    }

    pub fn iqr(&self) -> i64 {
        self.estimate.iqr
    }

    /// Recompute the target after `delay` was recorded into `history`.
    ///
    /// `min_jb`/`max_jb` clamp the delay added on top of `min`.
    pub fn update(
        &mut self,
        history: &HistoryTracker,
        delay: i64,
        codec: CodecId,
        min_jb: Option<i64>,
        max_jb: Option<i64>,
    ) {
        let sorted = history.sorted_delays();
        let Some(max_index) = sorted.len().checked_sub(1) else {
            return;
        };

        self.estimate.iqr = sorted[max_index * 3 / 4].saturating_sub(sorted[max_index / 4]);

        let change = match self.last_delay {
            Some(last) => delay.saturating_sub(last).saturating_abs(),
            None => 0,
        };
        self.last_delay = Some(delay);
        self.estimate.jitter += (change - self.estimate.jitter) / 16;

        self.estimate.min = sorted[max_index * MIN_DELAY_PERCENTILE / 100];

        if max_index > MIN_SEARCH_INDEX {
            self.estimate.optimum = self.search_optimum(sorted, codec);
        }

        let d = self.estimate.optimum;
        // Both bounds are clamps: min_jb raises a short optimum, max_jb caps a
        // long one. min_jb wins when the two conflict.
        let extra = match (min_jb, max_jb) {
            (Some(lo), _) if lo > d => lo,
            (_, Some(hi)) if hi < d => hi,
            _ => d,
        };
        self.estimate.target = self.estimate.min.saturating_add(extra);

        log::trace!(
            "size estimate: min={}ms optimum={}ms target={}ms iqr={}ms jitter={}ms",
            self.estimate.min,
            d,
            self.estimate.target,
            self.estimate.iqr,
            self.estimate.jitter
        );
    }

    /// Walk down from the largest delay and keep the candidate with the best MOS.
    fn search_optimum(&self, sorted: &[i64], codec: CodecId) -> i64 {
        let size = sorted.len();
        let max_index = size - 1;
        let breadth = search_breadth_percent(self.estimate.iqr);

        let mut best_delay = sorted[max_index].saturating_sub(self.estimate.min);
        let mut best_mos = guess_mos(0.0, best_delay, codec);

        for i in (0..max_index).rev() {
            let depth = max_index - i;
            let candidate = sorted[i].saturating_sub(self.estimate.min);
            let late = size - sorted.partition_point(|&d| d <= sorted[i]);
            let loss_percent = late as f32 * 100.0 / size as f32;
            let mos = guess_mos(loss_percent, candidate, codec);

            let improved = mos > best_mos;
            if improved {
                best_mos = mos;
                best_delay = candidate;
            }

            let examined = depth as f32 * 100.0 / size as f32;
            if (examined >= breadth && !improved) || depth >= size / 2 {
                break;
            }
        }

        best_delay
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 95 arrivals spread over 40..=60ms plus five 300ms stragglers
    fn history_with_stragglers() -> HistoryTracker {
        let mut history = HistoryTracker::new();
        for i in 0..100i64 {
            let ts = i * 20;
            let delay = if i % 20 == 19 { 300 } else { 40 + (i % 21) };
            history.record(ts, ts + delay, 20, CodecId::G711);
        }
        history
    }

    fn estimate_for(history: &HistoryTracker, codec: CodecId, max_jb: Option<i64>) -> i64 {
        let mut estimator = SizeEstimator::new();
        let delay = history.latest().unwrap().delay;
        estimator.update(history, delay, codec, None, max_jb);
        estimator.target()
    }

    #[test]
    fn test_search_breadth_breakpoints() {
        assert_eq!(search_breadth_percent(0), 5.0);
        assert_eq!(search_breadth_percent(50), 5.0);
        assert_eq!(search_breadth_percent(51), 11.0);
        assert_eq!(search_breadth_percent(101), 20.0);
        assert_eq!(search_breadth_percent(201), 25.0);
    }

    #[test]
    fn test_small_history_skips_search() {
        let mut history = HistoryTracker::new();
        let mut estimator = SizeEstimator::new();
        for i in 0..5i64 {
            let delay = history.record(i * 20, i * 20 + 50, 20, CodecId::G711);
            estimator.update(&history, delay, CodecId::G711, None, None);
        }
        assert_eq!(estimator.min(), 50);
        assert_eq!(estimator.estimate().optimum, 0);
        assert_eq!(estimator.target(), 50);
    }

    #[test]
    fn test_min_jb_raises_target() {
        let mut history = HistoryTracker::new();
        let mut estimator = SizeEstimator::new();
        let delay = history.record(0, 30, 20, CodecId::G729);
        estimator.update(&history, delay, CodecId::G729, Some(100), None);
        assert_eq!(estimator.target(), 130);
    }

    #[test]
    fn test_concealing_codec_accepts_late_stragglers() {
        let history = history_with_stragglers();
        // min is the 2nd percentile of the spread, i.e. 40ms.
        let with_plc = estimate_for(&history, CodecId::G711Plc, None);
        let without_plc = estimate_for(&history, CodecId::G711, None);
        assert_eq!(with_plc, 60);
        assert_eq!(without_plc, 300);
        assert!(with_plc < without_plc);
    }

    #[test]
    fn test_max_jb_caps_target() {
        let history = history_with_stragglers();
        assert_eq!(estimate_for(&history, CodecId::G711, Some(100)), 140);
    }

    #[test]
    fn test_jitter_smoothing() {
        let mut history = HistoryTracker::new();
        let mut estimator = SizeEstimator::new();
        let first = history.record(0, 50, 20, CodecId::Other);
        estimator.update(&history, first, CodecId::Other, None, None);
        assert_eq!(estimator.jitter(), 0);

        let second = history.record(20, 102, 20, CodecId::Other);
        estimator.update(&history, second, CodecId::Other, None, None);
        // |82 - 50| / 16
        assert_eq!(estimator.jitter(), 2);
    }

    #[test]
    fn test_iqr_tracks_spread() {
        let history = history_with_stragglers();
        let mut estimator = SizeEstimator::new();
        estimator.update(&history, 50, CodecId::G711, None, None);
        let sorted = history.sorted_delays();
        assert_eq!(estimator.iqr(), sorted[74] - sorted[24]);
        assert!(estimator.iqr() <= 50);
    }

    #[test]
    fn test_reset_clears_estimate() {
        let history = history_with_stragglers();
        let mut estimator = SizeEstimator::new();
        estimator.update(&history, 50, CodecId::G711, None, None);
        estimator.reset();
        assert_eq!(estimator.estimate(), DelayEstimate::default());
    }
}
