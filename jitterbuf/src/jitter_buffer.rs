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

use crate::control_queue::ControlQueue;
use crate::estimator::SizeEstimator;
use crate::frame::{CodecId, Frame, FrameType};
use crate::history::HistoryTracker;
use crate::output::{Output, OutputFn};
use crate::settings::{Settings, Tuning};
use crate::statistics::{loss_percent, Gauges, Info, StatisticsCalculator};
use crate::voice_queue::{VoiceQueue, NEVER};
use crate::{JitterBufferError, Result};

/// Upper bound on playout decisions taken within one `get` call.
///
/// Every step grows or shrinks the buffer or consumes a frame, so a healthy
/// poll needs only a handful. The cap keeps pathological settings (zero
/// cooldowns, oscillating targets) from turning one poll into unbounded work.
pub const MAX_POLL_STEPS: usize = 64;

/// Returned by [`JitterBuffer::next`] while a control frame is pending: poll
/// right away.
pub const POLL_NOW: i64 = i64::MIN;

/// Playout state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayoutState {
    /// No talkspurt in progress, the buffer may resize freely
    Silence,
    /// Voice is being played out at a steady pace
    Voice,
}

/// Outcome of a poll
#[derive(Debug, PartialEq)]
pub enum PollResult<T> {
    /// A frame to render, ownership returns to the caller
    Frame(Frame<T>),
    /// No frame for this slot: conceal this many milliseconds
    Interp(i64),
    /// Frames are buffered but none is due yet
    NoFrame,
    /// Nothing to play
    Empty,
}

/// Outcome of a successful `put`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Queued,
    /// Same sender timestamp seen before; the payload was released
    Duplicate,
}

/// Adaptive jitter buffer for one voice stream.
///
/// Not synchronised: callers sharing a buffer between threads must wrap it
/// in their own lock around every call.
#[derive(Debug)]
pub struct JitterBuffer<T> {
    tuning: Tuning,
    output: Output,
    statistics: StatisticsCalculator,
    history: HistoryTracker,
    estimator: SizeEstimator,
    control: ControlQueue<T>,
    voice: VoiceQueue<T>,
    state: PlayoutState,
    /// Live buffer delay: a frame with timestamp `ts` is due at `ts + current`
    current: i64,
    last_adjustment: i64,
    next_voice_time: i64,
    cnt_successive_interp: i64,
    silence_begin_ts: Option<i64>,
}

impl<T> Default for JitterBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> JitterBuffer<T> {
    /// Create a jitter buffer with default settings
    pub fn new() -> Self {
        Self {
            tuning: Tuning::default(),
            output: Output::default(),
            statistics: StatisticsCalculator::new(),
            history: HistoryTracker::new(),
            estimator: SizeEstimator::new(),
            control: ControlQueue::new(),
            voice: VoiceQueue::new(),
            state: PlayoutState::Silence,
            current: 0,
            last_adjustment: 0,
            next_voice_time: 0,
            cnt_successive_interp: 0,
            silence_begin_ts: None,
        }
    }

    /// Estimated MOS for a loss percentage and one-way delay
    pub fn guess_mos(loss_percent: f32, delay_ms: i64, codec: CodecId) -> f32 {
        crate::mos::guess_mos(loss_percent, delay_ms, codec)
    }

    /// Hook diagnostic sinks for this buffer; `None` silences that level
    pub fn set_output(
        &mut self,
        warn: Option<OutputFn>,
        err: Option<OutputFn>,
        debug: Option<OutputFn>,
    ) {
        self.output = Output::new(warn, err, debug);
    }

    /// Drop queued voice frames, statistics and delay history.
    ///
    /// Settings and pending control frames are kept.
    pub fn reset(&mut self) {
        self.voice.clear();
        self.statistics.reset();
        self.restart_playout();
    }

    /// Like [`reset`](Self::reset), and also flush control frames and
    /// restore default settings
    pub fn reset_all(&mut self) {
        self.reset();
        self.control.clear();
        self.tuning = Tuning::default();
    }

    /// Apply every non-zero field of `settings`.
    ///
    /// Zero means "leave unchanged", so a field can never be driven back to
    /// zero this way; use [`reset_all`](Self::reset_all) for that.
    pub fn set_settings(&mut self, settings: Settings) -> Result<()> {
        if let Err(e) = self.tuning.apply(&settings) {
            self.output.err(format_args!("rejected settings {settings:?}: {e}"));
            return Err(e);
        }
        Ok(())
    }

    pub fn get_settings(&self) -> Settings {
        self.tuning.to_settings()
    }

    /// Snapshot of counters plus freshly computed gauges
    pub fn get_info(&mut self) -> Info {
        let gauges = Gauges {
            min: self.estimator.min(),
            current: self.current,
            target: self.estimator.target(),
            jitter: self.estimator.jitter(),
            iqr: self.estimator.iqr(),
            losspct: loss_percent(self.history.sorted_delays(), self.current),
            last_voice_ms: self.history.latest().map_or(0, |e| e.duration_ms),
            silence: self.state == PlayoutState::Silence,
            frames_in_queue: self.voice.len(),
            history_len: self.history.len(),
        };
        self.statistics.snapshot(gauges)
    }

    /// Whether any control, voice or silence frame is queued
    pub fn has_frames(&self) -> bool {
        !self.control.is_empty() || !self.voice.is_empty()
    }

    pub fn state(&self) -> PlayoutState {
        self.state
    }

    /// Current buffer delay on the arrival-delay scale (ms)
    pub fn current_delay(&self) -> i64 {
        self.current
    }

    /// Target buffer delay on the arrival-delay scale (ms)
    pub fn target_delay(&self) -> i64 {
        self.estimator.target()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Voice and silence frames waiting for playout
    pub fn queued_voice_frames(&self) -> usize {
        self.voice.len()
    }

    /// Local time at which the next `get` can produce something.
    ///
    /// [`POLL_NOW`] when a control frame is waiting, [`NEVER`] when nothing
    /// is queued.
    pub fn next(&self) -> i64 {
        if !self.control.is_empty() {
            return POLL_NOW;
        }
        match self.state {
            PlayoutState::Silence if self.voice.is_empty() => NEVER,
            PlayoutState::Silence => self
                .voice
                .peek_min_timestamp()
                .saturating_add(self.estimator.target()),
            PlayoutState::Voice => self.next_voice_time.saturating_add(self.current),
        }
    }

    /// Hand a frame to the buffer.
    ///
    /// `sender_ts` and `arrival_ts` are milliseconds on the sender's and the
    /// local clock. Voice frames feed the delay history and are checked for
    /// duplicates first. On error the payload has been dropped.
    pub fn put(
        &mut self,
        payload: T,
        frame_type: FrameType,
        duration_ms: i64,
        sender_ts: i64,
        arrival_ts: i64,
        codec: CodecId,
    ) -> Result<PutOutcome> {
        if duration_ms < 0 {
            return Err(JitterBufferError::InvalidFrame(format!(
                "negative duration {duration_ms}ms at ts={sender_ts}"
            )));
        }

        self.statistics.frame_received();
        let frame = Frame::new(payload, frame_type, sender_ts, duration_ms, codec);

        match frame_type {
            FrameType::Control => {
                if let Err(e) = self.control.push(frame) {
                    self.output
                        .err(format_args!("dropping control frame ts={sender_ts}: {e}"));
                    return Err(e);
                }
            }
            FrameType::Silence => self.queue_voice(frame)?,
            FrameType::Voice => {
                if self.history.contains_timestamp(sender_ts) {
                    self.statistics.frame_dropped_twice();
                    self.output
                        .debug(format_args!("dropping duplicate voice frame ts={sender_ts}"));
                    return Ok(PutOutcome::Duplicate);
                }

                // Queue first so a rejected frame leaves no trace in the history.
                self.queue_voice(frame)?;
                let delay = self
                    .history
                    .record(sender_ts, arrival_ts, duration_ms, codec);
                self.estimator.update(
                    &self.history,
                    delay,
                    codec,
                    self.tuning.min_jb,
                    self.tuning.max_jb,
                );
            }
        }

        Ok(PutOutcome::Queued)
    }

    /// Poll for playout at local time `now`.
    ///
    /// `interp_len` is how many milliseconds the caller conceals per
    /// interpolation; values below 1 are treated as 1.
    pub fn get(&mut self, now: i64, interp_len: i64) -> PollResult<T> {
        if let Some(frame) = self.control.pop() {
            return PollResult::Frame(frame);
        }

        let interp_len = interp_len.max(1);
        for _ in 0..MAX_POLL_STEPS {
            if let Some(result) = self.playout_step(now, interp_len) {
                return result;
            }
        }

        self.output.warn(format_args!(
            "playout undecided after {MAX_POLL_STEPS} steps at now={now} (current={}, target={})",
            self.current,
            self.estimator.target()
        ));
        PollResult::NoFrame
    }

    /// Drain helper: control frames first, then voice and silence frames in
    /// timestamp order, ignoring playout timing
    pub fn get_all(&mut self) -> Option<Frame<T>> {
        self.control.pop().or_else(|| self.voice.pop_any())
    }

    fn queue_voice(&mut self, frame: Frame<T>) -> Result<()> {
        let ts = frame.timestamp;
        match self.voice.push(frame) {
            Ok(true) => {
                self.statistics.frame_out_of_order();
                log::trace!("out of order frame ts={ts}");
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                self.output
                    .err(format_args!("dropping voice frame ts={ts}: {e}"));
                Err(e)
            }
        }
    }

    /// One playout decision. `None` means state changed and the decision
    /// has to be taken again.
    fn playout_step(&mut self, now: i64, interp_len: i64) -> Option<PollResult<T>> {
        let threshold = now.saturating_sub(self.current);
        if self.voice.peek_type_if_due(threshold) == Some(FrameType::Silence) {
            if let Some(frame) = self.voice.pop_due(threshold) {
                self.enter_silence(frame.timestamp);
                return Some(PollResult::Frame(frame));
            }
        }

        match self.state {
            PlayoutState::Silence => self.silence_step(now),
            PlayoutState::Voice => self.voice_step(now, interp_len),
        }
    }

    fn silence_step(&mut self, now: i64) -> Option<PollResult<T>> {
        // Nothing is audible, so the delay can move straight to the target.
        self.current = self.estimator.target();

        let Some(frame) = self.voice.pop_due(now.saturating_sub(self.current)) else {
            return Some(PollResult::Empty);
        };

        if self
            .silence_begin_ts
            .is_some_and(|begin| frame.timestamp < begin)
        {
            self.statistics.frame_late();
            self.output.debug(format_args!(
                "dropping voice frame ts={} older than silence start",
                frame.timestamp
            ));
            return None;
        }

        self.state = PlayoutState::Voice;
        self.next_voice_time = frame.end_timestamp();
        self.cnt_successive_interp = 0;
        log::debug!(
            "talkspurt starts at ts={} with delay {}ms",
            frame.timestamp,
            self.current
        );
        Some(PollResult::Frame(frame))
    }

    fn voice_step(&mut self, now: i64, interp_len: i64) -> Option<PollResult<T>> {
        let diff = self.estimator.target().saturating_sub(self.current);

        if diff.saturating_abs() > self.tuning.max_diff {
            self.output.warn(format_args!(
                "delay jumped by {diff}ms (max_diff {}ms), restarting history",
                self.tuning.max_diff
            ));
            self.restart_playout();
            return Some(PollResult::NoFrame);
        }

        let threshold = now.saturating_sub(self.current);

        if diff > 0
            && (now > self.last_adjustment.saturating_add(self.tuning.wait_grow)
                || self.must_interpolate(threshold))
        {
            let step = if diff < interp_len {
                diff.min(interp_len / 2).max(1)
            } else {
                interp_len
            };
            self.current = self.current.saturating_add(step);
            self.last_adjustment = now;
            log::trace!("grow by {step}ms to {}ms", self.current);
            return None;
        }

        if diff < 0
            && now > self.last_adjustment.saturating_add(self.tuning.wait_shrink)
            && diff.saturating_neg() > self.tuning.extra_delay
        {
            match self.voice.pop_due(threshold) {
                Some(frame) => {
                    self.current = self.current.saturating_sub(frame.duration_ms);
                    self.statistics.frame_dropped();
                    log::trace!("shrink: dropped frame ts={}", frame.timestamp);
                }
                None => self.current = self.current.saturating_sub(interp_len),
            }
            self.last_adjustment = now;
            log::trace!("shrink to {}ms", self.current);
            return None;
        }

        if threshold < self.next_voice_time {
            return Some(PollResult::NoFrame);
        }

        if let Some(frame) = self.voice.pop_due(threshold) {
            if frame.timestamp < self.next_voice_time {
                self.statistics.frame_late();
                self.output.debug(format_args!(
                    "dropping late voice frame ts={} (expected {})",
                    frame.timestamp, self.next_voice_time
                ));
                return None;
            }
            self.next_voice_time = frame.end_timestamp();
            self.cnt_successive_interp = 0;
            return Some(PollResult::Frame(frame));
        }

        if self.tuning.max_successive_interp.is_none() && self.voice.is_empty() {
            // Without an interpolation cap a drained queue ends the talkspurt.
            self.enter_silence(self.next_voice_time);
            return Some(PollResult::Empty);
        }

        self.next_voice_time = self.next_voice_time.saturating_add(interp_len);
        self.cnt_successive_interp += 1;
        self.statistics.frame_lost();
        if let Some(cap) = self.tuning.max_successive_interp {
            if self.cnt_successive_interp >= cap {
                log::debug!("{cap} interpolations in a row, entering silence");
                self.enter_silence(self.next_voice_time);
            }
        }
        Some(PollResult::Interp(interp_len))
    }

    /// Playout is due but the next frame is missing
    fn must_interpolate(&self, threshold: i64) -> bool {
        threshold >= self.next_voice_time && self.voice.peek_type_if_due(threshold).is_none()
    }

    fn enter_silence(&mut self, begin_ts: i64) {
        self.state = PlayoutState::Silence;
        self.silence_begin_ts = Some(begin_ts);
        self.cnt_successive_interp = 0;
    }

    /// Forget delay history and playout cursors; queues and settings stay
    fn restart_playout(&mut self) {
        self.history.reset();
        self.estimator.reset();
        self.state = PlayoutState::Silence;
        self.current = 0;
        self.last_adjustment = 0;
        self.next_voice_time = 0;
        self.cnt_successive_interp = 0;
        self.silence_begin_ts = None;
    }
}
