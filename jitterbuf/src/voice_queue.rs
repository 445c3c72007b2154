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

use crate::frame::{Frame, FrameType};
use crate::{JitterBufferError, Result};

/// Timestamp reported when nothing is queued
pub const NEVER: i64 = i64::MAX;

#[derive(Debug)]
struct Node<T> {
    frame: Frame<T>,
    prev: usize,
    next: usize,
}

#[derive(Debug)]
enum Slot<T> {
    Occupied(Node<T>),
    Vacant { next_free: Option<usize> },
}

/// Timestamp-ordered queue of voice and silence frames.
///
/// Nodes live in an index arena with a free list and form a circular doubly
/// linked list: the head holds the smallest timestamp and `head.prev` (the
/// tail) the largest. Arrivals are mostly in order, so insertion scans
/// backwards from the tail and usually stops at once.
#[derive(Debug)]
pub struct VoiceQueue<T> {
    slots: Vec<Slot<T>>,
    free_head: Option<usize>,
    head: Option<usize>,
    len: usize,
}

impl<T> Default for VoiceQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> VoiceQueue<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_head: None,
            head: None,
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Insert a frame in timestamp order.
    ///
    /// Returns `true` when the frame is older than the newest queued frame,
    /// i.e. it arrived out of order. Equal timestamps keep arrival order.
    pub fn push(&mut self, frame: Frame<T>) -> Result<bool> {
        let ts = frame.timestamp;
        let idx = self.alloc(frame)?;

        let Some(head) = self.head else {
            self.head = Some(idx);
            self.len = 1;
            return Ok(false);
        };

        let tail = self.node(head).prev;
        let out_of_order = ts < self.node(tail).frame.timestamp;

        let mut after = tail;
        let mut new_head = false;
        while ts < self.node(after).frame.timestamp {
            if after == head {
                new_head = true;
                after = tail;
                break;
            }
            after = self.node(after).prev;
        }

        let next = self.node(after).next;
        {
            let node = self.node_mut(idx);
            node.prev = after;
            node.next = next;
        }
        self.node_mut(after).next = idx;
        self.node_mut(next).prev = idx;

        if new_head {
            self.head = Some(idx);
        }
        self.len += 1;
        Ok(out_of_order)
    }

    /// Remove the head if its timestamp is at or before `threshold`
    pub fn pop_due(&mut self, threshold: i64) -> Option<Frame<T>> {
        let head = self.head?;
        if self.node(head).frame.timestamp > threshold {
            return None;
        }
        self.unlink_head()
    }

    /// Remove the head regardless of its timestamp
    pub fn pop_any(&mut self) -> Option<Frame<T>> {
        self.unlink_head()
    }

    /// Type of the head frame, if it is due at `threshold`
    pub fn peek_type_if_due(&self, threshold: i64) -> Option<FrameType> {
        let head = self.node(self.head?);
        (head.frame.timestamp <= threshold).then_some(head.frame.frame_type)
    }

    /// Smallest queued timestamp, or [`NEVER`] when empty
    pub fn peek_min_timestamp(&self) -> i64 {
        self.head
            .map(|head| self.node(head).frame.timestamp)
            .unwrap_or(NEVER)
    }

    /// Largest queued timestamp
    pub fn peek_max_timestamp(&self) -> Option<i64> {
        self.head
            .map(|head| self.node(self.node(head).prev).frame.timestamp)
    }

    /// Drop every queued frame
    pub fn clear(&mut self) {
        self.slots.clear();
        self.free_head = None;
        self.head = None;
        self.len = 0;
    }

    fn alloc(&mut self, frame: Frame<T>) -> Result<usize> {
        match self.free_head {
            Some(idx) => {
                let next_free = match self.slots[idx] {
                    Slot::Vacant { next_free } => next_free,
                    Slot::Occupied(_) => unreachable!("free list points at occupied slot {idx}"),
                };
                self.free_head = next_free;
                self.slots[idx] = Slot::Occupied(Node {
                    frame,
                    prev: idx,
                    next: idx,
                });
                Ok(idx)
            }
            None => {
                self.slots
                    .try_reserve(1)
                    .map_err(|_| JitterBufferError::OutOfMemory)?;
                let idx = self.slots.len();
                self.slots.push(Slot::Occupied(Node {
                    frame,
                    prev: idx,
                    next: idx,
                }));
                Ok(idx)
            }
        }
    }

    fn unlink_head(&mut self) -> Option<Frame<T>> {
        let head = self.head?;
        let (prev, next) = {
            let node = self.node(head);
            (node.prev, node.next)
        };

        if next == head {
            self.head = None;
        } else {
            self.node_mut(prev).next = next;
            self.node_mut(next).prev = prev;
            self.head = Some(next);
        }

        let slot = std::mem::replace(
            &mut self.slots[head],
            Slot::Vacant {
                next_free: self.free_head,
            },
        );
        self.free_head = Some(head);
        self.len -= 1;

        match slot {
            Slot::Occupied(node) => Some(node.frame),
            Slot::Vacant { .. } => None,
        }
    }

    fn node(&self, idx: usize) -> &Node<T> {
        match &self.slots[idx] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!("link to vacant slot {idx}"),
        }
    }

    fn node_mut(&mut self, idx: usize) -> &mut Node<T> {
        match &mut self.slots[idx] {
            Slot::Occupied(node) => node,
            Slot::Vacant { .. } => unreachable!("link to vacant slot {idx}"),
        }
    }
}
