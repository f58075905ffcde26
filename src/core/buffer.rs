//! The shared motion sequence buffer.
//!
//! One producer appends frames; any number of consumers read snapshots and
//! windows. Frames live behind a `RwLock` so reads run concurrently while
//! `append` and `trim` take exclusive access. A generation counter guarded by
//! a `Mutex` + `Condvar` pair provides the level-triggered "new data" signal:
//! each consumer holds its own [`NewDataSignal`] cursor, so several appends
//! between two checks coalesce into one wake and one consumer clearing its
//! signal never hides data from another.

use crate::error::{DataError, RuntimeFault};
use crate::source::types::{Frame, Timestamp};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Minimum number of frames before any window can be extracted.
pub const MIN_WINDOW_FRAMES: usize = 20;

/// A contiguous, time-bounded view over the tail of a buffer.
///
/// Windows are computed on demand and own a copy of their frames, so they
/// stay valid after the buffer moves on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Window {
    /// Requested span in ticks
    pub span: u64,
    /// Buffer index of the first frame in the window
    pub start_index: usize,
    /// Buffer index of the last frame in the window
    pub end_index: usize,
    /// Frames in the window, oldest first
    pub frames: Vec<Frame>,
}

impl Window {
    pub fn start_timestamp(&self) -> Timestamp {
        self.frames.first().map(|f| f.timestamp).unwrap_or_default()
    }

    pub fn end_timestamp(&self) -> Timestamp {
        self.frames.last().map(|f| f.timestamp).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Check the non-decreasing timestamp invariant over the window.
    pub fn verify_order(&self) -> Result<(), RuntimeFault> {
        check_order(&self.frames, self.start_index)
    }
}

fn check_order(frames: &[Frame], base_index: usize) -> Result<(), RuntimeFault> {
    for (offset, pair) in frames.windows(2).enumerate() {
        if pair[1].timestamp < pair[0].timestamp {
            return Err(RuntimeFault {
                index: base_index + offset + 1,
                previous: pair[0].timestamp,
                got: pair[1].timestamp,
            });
        }
    }
    Ok(())
}

/// Outcome of waiting on a [`NewDataSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    /// Frames were appended (or the buffer trimmed) since the last clear
    NewData,
    /// No new data and the producer has finished
    Exhausted,
    /// The caller's cancellation check returned true
    Cancelled,
    /// The timeout elapsed with nothing to report
    TimedOut,
}

#[derive(Debug, Default)]
struct SignalState {
    generation: u64,
    exhausted: bool,
}

/// Append-only ordered store of frames for one session.
#[derive(Debug)]
pub struct MotionSequenceBuffer {
    frames: RwLock<Vec<Frame>>,
    signal: Mutex<SignalState>,
    changed: Condvar,
    min_window_frames: usize,
}

/// Buffers are shared by one producer and many readers.
pub type SharedBuffer = Arc<MotionSequenceBuffer>;

impl MotionSequenceBuffer {
    /// Create an empty, streaming buffer.
    pub fn new() -> Self {
        Self::with_min_window_frames(MIN_WINDOW_FRAMES)
    }

    /// Create a buffer with a custom minimum frame count for windows.
    pub fn with_min_window_frames(min_window_frames: usize) -> Self {
        Self {
            frames: RwLock::new(Vec::new()),
            signal: Mutex::new(SignalState::default()),
            changed: Condvar::new(),
            min_window_frames,
        }
    }

    /// Create a shared buffer.
    pub fn shared() -> SharedBuffer {
        Arc::new(Self::new())
    }

    /// Build a buffer from stored frames, validating their order.
    pub fn from_frames(frames: Vec<Frame>) -> Result<Self, DataError> {
        let buffer = Self::new();
        for frame in frames {
            buffer.append(frame)?;
        }
        Ok(buffer)
    }

    /// Append a frame, waking every consumer.
    ///
    /// Frames older than the last appended frame are rejected and leave the
    /// buffer unchanged.
    pub fn append(&self, frame: Frame) -> Result<(), DataError> {
        {
            let mut frames = self.frames.write().unwrap_or_else(PoisonError::into_inner);
            if self.lock_signal().exhausted {
                return Err(DataError::BufferExhausted);
            }
            if let Some(last) = frames.last() {
                if frame.timestamp < last.timestamp {
                    return Err(DataError::NonMonotonicTimestamp {
                        last: last.timestamp,
                        got: frame.timestamp,
                    });
                }
            }
            frames.push(frame);
        }
        self.bump_generation();
        Ok(())
    }

    /// Immutable copy of every frame appended so far.
    pub fn snapshot(&self) -> Vec<Frame> {
        self.frames
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The suffix covering the last `span` ticks, ending at the latest frame.
    ///
    /// Returns `None` when the buffer holds fewer than the minimum frame
    /// count, or when the span reaches back before the first frame.
    pub fn get_window(&self, span: u64) -> Option<Window> {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        if frames.len() < self.min_window_frames {
            return None;
        }
        let first = frames.first()?.timestamp;
        let last = frames.last()?.timestamp;
        let start = last.checked_sub(span)?;
        if start < first {
            return None;
        }

        let start_index = frames.partition_point(|f| f.timestamp < start);
        let end_index = frames.len() - 1;
        Some(Window {
            span,
            start_index,
            end_index,
            frames: frames[start_index..].to_vec(),
        })
    }

    /// Keep only frames `start_index..=end_index`.
    ///
    /// Takes the write lock, so no snapshot or window read can interleave.
    pub fn trim(&self, start_index: usize, end_index: usize) -> Result<(), DataError> {
        {
            let mut frames = self.frames.write().unwrap_or_else(PoisonError::into_inner);
            let len = frames.len();
            if start_index > end_index || end_index >= len {
                return Err(DataError::InvalidRange {
                    start: start_index,
                    end: end_index,
                    len,
                });
            }
            frames.truncate(end_index + 1);
            frames.drain(..start_index);
        }
        self.bump_generation();
        Ok(())
    }

    /// Mark the buffer as terminal. No further appends will be accepted.
    pub fn mark_exhausted(&self) {
        let mut signal = self.lock_signal();
        signal.exhausted = true;
        self.changed.notify_all();
    }

    pub fn is_exhausted(&self) -> bool {
        self.lock_signal().exhausted
    }

    pub fn len(&self) -> usize {
        self.frames
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Timestamp of the most recent frame.
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.frames
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|f| f.timestamp)
    }

    /// Timestamp span between the first and last frame.
    pub fn duration(&self) -> u64 {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        match (frames.first(), frames.last()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => 0,
        }
    }

    /// Check the timestamp invariant over the whole buffer.
    pub fn verify(&self) -> Result<(), RuntimeFault> {
        let frames = self.frames.read().unwrap_or_else(PoisonError::into_inner);
        check_order(&frames, 0)
    }

    /// Minimum frame count required before windows are available.
    pub fn min_window_frames(&self) -> usize {
        self.min_window_frames
    }

    /// Obtain a new-data signal for one consumer.
    ///
    /// The signal starts set if the buffer already holds data.
    pub fn subscribe(self: &Arc<Self>) -> NewDataSignal {
        NewDataSignal {
            buffer: Arc::clone(self),
            seen: 0,
        }
    }

    /// Wake every waiting consumer so it can re-check its cancellation state.
    pub fn wake_all(&self) {
        let _signal = self.lock_signal();
        self.changed.notify_all();
    }

    fn bump_generation(&self) {
        let mut signal = self.lock_signal();
        signal.generation += 1;
        self.changed.notify_all();
    }

    fn lock_signal(&self) -> MutexGuard<'_, SignalState> {
        self.signal.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MotionSequenceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// One consumer's view of the buffer's "new data" flag.
#[derive(Debug)]
pub struct NewDataSignal {
    buffer: SharedBuffer,
    seen: u64,
}

impl NewDataSignal {
    /// Whether data has changed since the last [`clear`](Self::clear).
    pub fn is_set(&self) -> bool {
        self.buffer.lock_signal().generation != self.seen
    }

    /// Acknowledge everything appended so far.
    pub fn clear(&mut self) {
        self.seen = self.buffer.lock_signal().generation;
    }

    /// Block until new data arrives, the buffer is exhausted, or the timeout
    /// elapses.
    pub fn wait(&self, timeout: Option<Duration>) -> WaitStatus {
        self.wait_until(timeout, || false)
    }

    /// Like [`wait`](Self::wait), also returning when `cancelled` is true.
    ///
    /// `cancelled` is evaluated under the signal lock, so a flag set before
    /// [`MotionSequenceBuffer::wake_all`] is never missed.
    pub fn wait_until<F>(&self, timeout: Option<Duration>, cancelled: F) -> WaitStatus
    where
        F: Fn() -> bool,
    {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut signal = self.buffer.lock_signal();
        loop {
            if signal.generation != self.seen {
                return WaitStatus::NewData;
            }
            if cancelled() {
                return WaitStatus::Cancelled;
            }
            if signal.exhausted {
                return WaitStatus::Exhausted;
            }
            signal = match deadline {
                None => self
                    .buffer
                    .changed
                    .wait(signal)
                    .unwrap_or_else(PoisonError::into_inner),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return WaitStatus::TimedOut;
                    }
                    self.buffer
                        .changed
                        .wait_timeout(signal, deadline - now)
                        .unwrap_or_else(PoisonError::into_inner)
                        .0
                }
            };
        }
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn frames(timestamps: impl IntoIterator<Item = u64>) -> Vec<Frame> {
        timestamps.into_iter().map(Frame::new).collect()
    }

    fn filled(count: u64, step: u64) -> MotionSequenceBuffer {
        MotionSequenceBuffer::from_frames(frames((0..count).map(|i| i * step))).unwrap()
    }

    #[test]
    fn test_append_keeps_order() {
        let buffer = filled(50, 10);
        let snapshot = buffer.snapshot();
        assert_eq!(snapshot.len(), 50);
        assert!(snapshot.windows(2).all(|p| p[0].timestamp <= p[1].timestamp));
    }

    #[test]
    fn test_append_rejects_earlier_timestamp() {
        let buffer = filled(3, 10);
        let err = buffer.append(Frame::new(5)).unwrap_err();
        assert_eq!(err, DataError::NonMonotonicTimestamp { last: 20, got: 5 });
        assert_eq!(buffer.len(), 3);

        // Equal timestamps are allowed
        buffer.append(Frame::new(20)).unwrap();
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_window_unavailable_below_minimum() {
        let buffer = filled(19, 1);
        for span in [0, 1, 5, 18, 1000] {
            assert!(buffer.get_window(span).is_none());
        }
    }

    #[test]
    fn test_window_suffix() {
        let buffer = filled(30, 10);
        let window = buffer.get_window(50).unwrap();
        assert_eq!(window.start_timestamp(), 240);
        assert_eq!(window.end_timestamp(), 290);
        assert_eq!(window.start_index, 24);
        assert_eq!(window.end_index, 29);
        assert_eq!(window.len(), 6);
    }

    #[test]
    fn test_window_cannot_reach_before_first_frame() {
        let buffer = filled(30, 10);
        assert!(buffer.get_window(290).is_some());
        assert!(buffer.get_window(291).is_none());
    }

    #[test]
    fn test_trim_inclusive_range() {
        let buffer = filled(10, 1);
        buffer.trim(2, 5).unwrap();
        let ts: Vec<u64> = buffer.snapshot().iter().map(|f| f.timestamp).collect();
        assert_eq!(ts, vec![2, 3, 4, 5]);

        assert!(buffer.trim(3, 9).is_err());
        assert!(buffer.trim(2, 1).is_err());
        assert_eq!(buffer.len(), 4);
    }

    #[test]
    fn test_signal_is_level_triggered() {
        let buffer = MotionSequenceBuffer::shared();
        let mut signal = buffer.subscribe();
        assert!(!signal.is_set());

        buffer.append(Frame::new(1)).unwrap();
        buffer.append(Frame::new(2)).unwrap();
        buffer.append(Frame::new(3)).unwrap();
        assert!(signal.is_set());
        assert_eq!(signal.wait(Some(Duration::ZERO)), WaitStatus::NewData);

        signal.clear();
        assert!(!signal.is_set());
        assert_eq!(
            signal.wait(Some(Duration::from_millis(10))),
            WaitStatus::TimedOut
        );
    }

    #[test]
    fn test_signals_are_independent() {
        let buffer = MotionSequenceBuffer::shared();
        let mut first = buffer.subscribe();
        let second = buffer.subscribe();

        buffer.append(Frame::new(1)).unwrap();
        first.clear();
        assert!(!first.is_set());
        assert!(second.is_set());
    }

    #[test]
    fn test_wait_wakes_on_append() {
        let buffer = MotionSequenceBuffer::shared();
        let signal = buffer.subscribe();

        let producer = {
            let buffer = Arc::clone(&buffer);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                buffer.append(Frame::new(1)).unwrap();
            })
        };

        assert_eq!(signal.wait(Some(Duration::from_secs(5))), WaitStatus::NewData);
        producer.join().unwrap();
    }

    #[test]
    fn test_exhausted_stops_blocking() {
        let buffer = MotionSequenceBuffer::shared();
        let mut signal = buffer.subscribe();
        buffer.append(Frame::new(1)).unwrap();
        buffer.mark_exhausted();

        assert!(buffer.is_exhausted());
        assert_eq!(signal.wait(None), WaitStatus::NewData);
        signal.clear();
        assert_eq!(signal.wait(None), WaitStatus::Exhausted);
        assert_eq!(buffer.append(Frame::new(2)), Err(DataError::BufferExhausted));
    }

    #[test]
    fn test_wait_until_cancelled() {
        let buffer = MotionSequenceBuffer::shared();
        let signal = buffer.subscribe();
        assert_eq!(signal.wait_until(None, || true), WaitStatus::Cancelled);
    }

    #[test]
    fn test_verify_detects_fault() {
        let window = Window {
            span: 10,
            start_index: 4,
            end_index: 6,
            frames: frames([5, 7, 6]),
        };
        let fault = window.verify_order().unwrap_err();
        assert_eq!(fault.index, 6);
        assert_eq!(fault.previous, 7);
    }
}
