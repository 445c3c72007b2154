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

use std::collections::VecDeque;

use crate::frame::Frame;
use crate::{JitterBufferError, Result};

/// Priority side channel for control frames, kept in timestamp order.
///
/// Control traffic is rare, so a linear scan on insert is fine.
#[derive(Debug)]
pub struct ControlQueue<T> {
    frames: VecDeque<Frame<T>>,
}

impl<T> Default for ControlQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> ControlQueue<T> {
    pub fn new() -> Self {
        Self {
            frames: VecDeque::new(),
        }
    }

    /// Insert after every frame with a timestamp less than or equal to this one
    pub fn push(&mut self, frame: Frame<T>) -> Result<()> {
        self.frames
            .try_reserve(1)
            .map_err(|_| JitterBufferError::OutOfMemory)?;

        let pos = self
            .frames
            .iter()
            .position(|queued| queued.timestamp > frame.timestamp)
            .unwrap_or(self.frames.len());
        self.frames.insert(pos, frame);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<Frame<T>> {
        self.frames.pop_front()
    }

    pub fn peek_timestamp(&self) -> Option<i64> {
        self.frames.front().map(|frame| frame.timestamp)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CodecId, FrameType};

    fn control(ts: i64, tag: &'static str) -> Frame<&'static str> {
        Frame::new(tag, FrameType::Control, ts, 0, CodecId::Other)
    }

    #[test]
    fn test_pop_in_timestamp_order() {
        let mut queue = ControlQueue::new();
        queue.push(control(30, "c")).unwrap();
        queue.push(control(10, "a")).unwrap();
        queue.push(control(20, "b")).unwrap();

        assert_eq!(queue.len(), 3);
        assert_eq!(queue.peek_timestamp(), Some(10));
        let order: Vec<_> = std::iter::from_fn(|| queue.pop())
            .map(|f| f.payload)
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_equal_timestamps_keep_arrival_order() {
        let mut queue = ControlQueue::new();
        queue.push(control(10, "first")).unwrap();
        queue.push(control(10, "second")).unwrap();
        queue.push(control(5, "early")).unwrap();

        assert_eq!(queue.pop().unwrap().payload, "early");
        assert_eq!(queue.pop().unwrap().payload, "first");
        assert_eq!(queue.pop().unwrap().payload, "second");
    }

    #[test]
    fn test_clear() {
        let mut queue = ControlQueue::new();
        queue.push(control(1, "x")).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert_eq!(queue.peek_timestamp(), None);
    }
}
