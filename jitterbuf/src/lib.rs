//! # jitterbuf
//!
//! An application-independent adaptive jitter buffer for packetized voice.
//!
//! Voice frames are reordered by sender timestamp and paced out on a delay
//! chosen to maximise the estimated call quality (MOS) for the codec in use,
//! trading frames lost to lateness against added latency. Control frames
//! bypass pacing and are delivered ahead of any media.
//!
//! The buffer does no I/O, decoding or locking. The caller feeds it with
//! [`JitterBuffer::put`] and polls it with [`JitterBuffer::get`]:
//!
//! ```rust
//! use jitterbuf::{CodecId, FrameType, JitterBuffer, PollResult};
//!
//! let mut jb = JitterBuffer::new();
//! for i in 0..5i64 {
//!     let ts = i * 20;
//!     jb.put(vec![0u8; 160], FrameType::Voice, 20, ts, ts + 50, CodecId::G711)
//!         .unwrap();
//! }
//!
//! let mut played = Vec::new();
//! while let PollResult::Frame(frame) = jb.get(200, 20) {
//!     played.push(frame.timestamp);
//! }
//! assert_eq!(played, vec![0, 20, 40, 60, 80]);
//! ```

pub mod control_queue;
pub mod error;
pub mod estimator;
pub mod frame;
pub mod history;
pub mod jitter_buffer;
pub mod mos;
pub mod output;
pub mod settings;
pub mod statistics;
pub mod voice_queue;

pub use error::{JitterBufferError, Result};
pub use frame::{CodecId, Frame, FrameType};
pub use history::HISTORY_SIZE;
pub use jitter_buffer::{
    JitterBuffer, PlayoutState, PollResult, PutOutcome, MAX_POLL_STEPS, POLL_NOW,
};
pub use mos::guess_mos;
pub use output::OutputFn;
pub use settings::Settings;
pub use statistics::Info;
pub use voice_queue::NEVER;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_functionality() {
        let mut jb: JitterBuffer<Vec<u8>> = JitterBuffer::new();

        assert!(!jb.has_frames());
        assert_eq!(jb.get_settings(), Settings::default());
        assert_eq!(jb.get(0, 20), PollResult::Empty);
        assert_eq!(jb.next(), NEVER);
    }
}
