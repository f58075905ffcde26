//! Tick barrier for merging several frame sources into one stream.
//!
//! Each source feeds its own queue. A tick is complete once every source has
//! a frame queued; the heads are then merged into one frame. A tick that
//! cannot complete is dropped whole, never appended with partial data:
//!
//! - when a missing source has finished, immediately;
//! - otherwise once `timeout` has passed since the tick reached the head of
//!   the barrier (its oldest queued arrival, or the previous tick's
//!   resolution if that came later).
//!
//! A source that misses a dropped tick owes that tick's frame. When the late
//! frame does arrive it is discarded, so later ticks stay aligned.

use crate::source::types::Frame;
use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Result of polling the barrier.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeOutcome {
    /// Every source contributed; the merged frame is ready to append
    Merged(Frame),
    /// The tick was discarded; lists the sources that never delivered
    Dropped { missing: Vec<usize> },
}

#[derive(Debug)]
struct Pending {
    frame: Frame,
    arrived: Instant,
}

#[derive(Debug)]
struct SourceQueue {
    pending: VecDeque<Pending>,
    /// Frames of already-dropped ticks still to arrive from this source
    owed: usize,
    closed: bool,
}

/// Per-tick synchronization barrier across `n` sources.
#[derive(Debug)]
pub struct FrameMerger {
    queues: Vec<SourceQueue>,
    timeout: Duration,
}

impl FrameMerger {
    pub fn new(source_count: usize, timeout: Duration) -> Self {
        let queues = (0..source_count)
            .map(|_| SourceQueue {
                pending: VecDeque::new(),
                owed: 0,
                closed: false,
            })
            .collect();
        Self { queues, timeout }
    }

    pub fn source_count(&self) -> usize {
        self.queues.len()
    }

    /// Queue a frame from `source`. Unknown sources are ignored.
    ///
    /// Returns `false` when the frame belongs to a tick that was already
    /// dropped and is discarded.
    pub fn push(&mut self, source: usize, frame: Frame, now: Instant) -> bool {
        let Some(queue) = self.queues.get_mut(source) else {
            return false;
        };
        if queue.owed > 0 {
            queue.owed -= 1;
            return false;
        }
        queue.pending.push_back(Pending {
            frame,
            arrived: now,
        });
        true
    }

    /// Mark `source` as finished; it will deliver no more frames.
    pub fn close(&mut self, source: usize) {
        if let Some(queue) = self.queues.get_mut(source) {
            queue.closed = true;
        }
    }

    pub fn close_all(&mut self) {
        for queue in &mut self.queues {
            queue.closed = true;
        }
    }

    /// Frames waiting at the barrier across all sources.
    pub fn pending(&self) -> usize {
        self.queues.iter().map(|q| q.pending.len()).sum()
    }

    /// All sources finished and nothing left to merge or drop.
    pub fn is_drained(&self) -> bool {
        self.queues.iter().all(|q| q.closed && q.pending.is_empty())
    }

    /// When the oldest incomplete tick times out, if any is waiting.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queues
            .iter()
            .filter_map(|q| q.pending.front())
            .map(|p| p.arrived)
            .min()
            .map(|oldest| oldest + self.timeout)
    }

    /// Resolve the head tick if it is complete, timed out or unreachable.
    ///
    /// Call repeatedly until it returns `None`.
    pub fn poll(&mut self, now: Instant) -> Option<MergeOutcome> {
        if self.queues.is_empty() || self.pending() == 0 {
            return None;
        }

        let missing: Vec<usize> = self
            .queues
            .iter()
            .enumerate()
            .filter(|(_, q)| q.pending.is_empty())
            .map(|(i, _)| i)
            .collect();

        if missing.is_empty() {
            let mut heads = self
                .queues
                .iter_mut()
                .filter_map(|q| q.pending.pop_front())
                .map(|p| p.frame);
            let mut merged = heads.next()?;
            for frame in heads {
                merged.merge(frame);
            }
            self.advance(now);
            return Some(MergeOutcome::Merged(merged));
        }

        let unreachable = missing.iter().any(|&i| self.queues[i].closed);
        let timed_out = self.next_deadline().is_some_and(|d| now >= d);
        if !unreachable && !timed_out {
            return None;
        }

        for queue in &mut self.queues {
            if queue.pending.pop_front().is_none() && !queue.closed {
                queue.owed += 1;
            }
        }
        self.advance(now);
        Some(MergeOutcome::Dropped { missing })
    }

    /// Start the timeout of the new head tick no earlier than `now`.
    fn advance(&mut self, now: Instant) {
        for queue in &mut self.queues {
            if let Some(head) = queue.pending.front_mut() {
                head.arrived = head.arrived.max(now);
            }
        }
    }
}
