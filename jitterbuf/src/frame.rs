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

/// Kind of frame carried through the buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FrameType {
    /// Signalling frame, delivered ahead of any media
    Control,
    /// Voice frame, paced through the playout state machine
    Voice,
    /// Explicit end-of-talkspurt marker (CNG)
    Silence,
}

/// Codec family of a voice frame.
///
/// Only used to select the quality curve for the delay search. The raw
/// numbering matches the ids used on the wire by existing callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CodecId {
    GsmEfr,
    G723_1,
    G729,
    G729A,
    /// G.711 (A-law or u-law) with packet loss concealment
    G711Plc,
    /// G.711 without concealment
    G711,
    #[default]
    Other,
}

impl CodecId {
    /// Map a raw codec id, unknown ids fall back to [`CodecId::Other`]
    pub fn from_raw(id: i32) -> Self {
        match id {
            0 => CodecId::GsmEfr,
            1 => CodecId::G723_1,
            2 => CodecId::G729,
            3 => CodecId::G729A,
            4 => CodecId::G711Plc,
            5 => CodecId::G711,
            _ => CodecId::Other,
        }
    }

    pub fn as_raw(self) -> i32 {
        match self {
            CodecId::GsmEfr => 0,
            CodecId::G723_1 => 1,
            CodecId::G729 => 2,
            CodecId::G729A => 3,
            CodecId::G711Plc => 4,
            CodecId::G711 => 5,
            CodecId::Other => 6,
        }
    }
}

impl From<i32> for CodecId {
    fn from(id: i32) -> Self {
        CodecId::from_raw(id)
    }
}

/// A frame owned by the jitter buffer.
///
/// The payload is opaque. Ownership moves into the buffer on `put` and back
/// out on `get`; frames dropped internally release their payload on drop.
/// Frames are deliberately not `Clone`.
#[derive(Debug, PartialEq)]
pub struct Frame<T> {
    /// Caller payload
    pub payload: T,
    /// Sender timestamp in milliseconds
    pub timestamp: i64,
    /// Duration of the frame in milliseconds
    pub duration_ms: i64,
    pub frame_type: FrameType,
    pub codec: CodecId,
}

impl<T> Frame<T> {
    /// Create a new frame
    pub fn new(
        payload: T,
        frame_type: FrameType,
        timestamp: i64,
        duration_ms: i64,
        codec: CodecId,
    ) -> Self {
        Self {
            payload,
            timestamp,
            duration_ms,
            frame_type,
            codec,
        }
    }

    /// Timestamp right after this frame ends
    pub fn end_timestamp(&self) -> i64 {
        self.timestamp.saturating_add(self.duration_ms)
    }

    /// Give up the frame and keep only the payload
    pub fn into_payload(self) -> T {
        self.payload
    }
}
