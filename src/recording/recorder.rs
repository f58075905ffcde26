//! Producer-side driver: frame sources into one buffer.
//!
//! ```text
//!  source 0 ──thread──┐
//!  source 1 ──thread──┼──▶ channel ──▶ merger thread ──append──▶ buffer
//!  source n ──thread──┘                (tick barrier)
//! ```
//!
//! Every source runs on its own thread and only talks to the merger through
//! a bounded channel. The merger applies the tick barrier and is the single
//! writer of the buffer. When every source has finished, or `stop()` is
//! called, the buffer is marked exhausted.
//!
//! A source blocked inside `get_frame` is not interrupted by `stop()`; its
//! thread exits after its next frame, once it notices the merger is gone.

use crate::core::buffer::SharedBuffer;
use crate::error::{ConfigurationError, SourceError};
use crate::recording::merge::{FrameMerger, MergeOutcome};
use crate::source::device::FrameSource;
use crate::source::types::Frame;
use crate::stats::SharedSessionLog;
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Recorder settings.
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// How long a partial tick waits for the remaining sources
    pub merge_timeout: Duration,
    /// Capacity of the source-to-merger channel
    pub source_capacity: usize,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            merge_timeout: Duration::from_millis(100),
            source_capacity: 1024,
        }
    }
}

enum SourceMessage {
    Frame(usize, Frame),
    Closed(usize),
}

/// Drives one or more frame sources into a buffer.
pub struct Recorder {
    buffer: SharedBuffer,
    config: RecorderConfig,
    sources: Vec<Box<dyn FrameSource>>,
    running: Arc<AtomicBool>,
    started: bool,
    merger_handle: Option<JoinHandle<()>>,
    session_log: Option<SharedSessionLog>,
}

impl Recorder {
    pub fn new(buffer: SharedBuffer, config: RecorderConfig) -> Self {
        Self {
            buffer,
            config,
            sources: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
            started: false,
            merger_handle: None,
            session_log: None,
        }
    }

    /// Add a frame source. Sources are merged in the order they are added.
    pub fn add_source(&mut self, source: impl FrameSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn with_source(mut self, source: impl FrameSource + 'static) -> Self {
        self.add_source(source);
        self
    }

    pub fn with_session_log(mut self, log: SharedSessionLog) -> Self {
        self.session_log = Some(log);
        self
    }

    /// Spawn the source threads and the merger.
    pub fn start(&mut self) -> Result<(), ConfigurationError> {
        if self.started {
            return Err(ConfigurationError::AlreadyStarted);
        }
        if self.sources.is_empty() {
            return Err(ConfigurationError::NoSources);
        }

        let source_count = self.sources.len();
        let (sender, receiver) = bounded(self.config.source_capacity.max(1));
        self.running.store(true, Ordering::SeqCst);

        for (index, source) in self.sources.drain(..).enumerate() {
            let sender = sender.clone();
            let running = Arc::clone(&self.running);
            let log = self.session_log.clone();
            thread::Builder::new()
                .name(format!("source-{index}"))
                .spawn(move || pump_source(index, source, sender, running, log))
                .map_err(|e| ConfigurationError::Spawn(e.to_string()))?;
        }
        drop(sender);

        let merger = MergeLoop {
            merger: FrameMerger::new(source_count, self.config.merge_timeout),
            receiver,
            buffer: Arc::clone(&self.buffer),
            running: Arc::clone(&self.running),
            poll_interval: self.config.merge_timeout,
            session_log: self.session_log.clone(),
        };
        let handle = thread::Builder::new()
            .name("recorder-merge".into())
            .spawn(move || merger.run())
            .map_err(|e| ConfigurationError::Spawn(e.to_string()))?;

        self.merger_handle = Some(handle);
        self.started = true;
        info!(sources = source_count, "recorder started");
        Ok(())
    }

    /// Stop recording and mark the buffer exhausted.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        self.join();
        self.buffer.mark_exhausted();
    }

    /// Wait until every source has finished and the buffer is exhausted.
    pub fn join(&mut self) {
        if let Some(handle) = self.merger_handle.take() {
            if handle.join().is_err() {
                warn!("recorder merge thread panicked");
                self.buffer.mark_exhausted();
            }
        }
    }

    /// Whether the merger is still appending frames.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn buffer(&self) -> &SharedBuffer {
        &self.buffer
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        if self.merger_handle.is_some() {
            self.stop();
        }
    }
}

/// Pull frames from one source until it ends or the recorder stops.
fn pump_source(
    index: usize,
    mut source: Box<dyn FrameSource>,
    sender: Sender<SourceMessage>,
    running: Arc<AtomicBool>,
    log: Option<SharedSessionLog>,
) {
    while running.load(Ordering::SeqCst) {
        match source.get_frame() {
            Ok(frame) => {
                if sender.send(SourceMessage::Frame(index, frame)).is_err() {
                    return;
                }
            }
            Err(SourceError::Data(e)) => {
                warn!(source = source.name(), "skipping malformed frame: {e}");
                if let Some(log) = &log {
                    log.record_frame_rejected();
                }
            }
            Err(SourceError::Exhausted) | Err(SourceError::Disconnected) => {
                debug!(source = source.name(), "source finished");
                break;
            }
            Err(SourceError::Io(e)) => {
                warn!(source = source.name(), "source read failed: {e}");
                break;
            }
        }
    }
    let _ = sender.send(SourceMessage::Closed(index));
}

/// The single writer of the buffer.
struct MergeLoop {
    merger: FrameMerger,
    receiver: Receiver<SourceMessage>,
    buffer: SharedBuffer,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
    session_log: Option<SharedSessionLog>,
}

impl MergeLoop {
    fn run(mut self) {
        while self.running.load(Ordering::SeqCst) {
            let now = Instant::now();
            let wait = self
                .merger
                .next_deadline()
                .map(|d| d.saturating_duration_since(now))
                .unwrap_or(self.poll_interval)
                .min(self.poll_interval);

            match self.receiver.recv_timeout(wait) {
                Ok(SourceMessage::Frame(index, frame)) => {
                    if !self.merger.push(index, frame, Instant::now()) {
                        debug!(source = index, "discarding late frame of a dropped tick");
                    }
                }
                Ok(SourceMessage::Closed(index)) => self.merger.close(index),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => self.merger.close_all(),
            }

            self.flush(Instant::now());
            if self.merger.is_drained() {
                info!("all sources finished");
                break;
            }
        }

        self.buffer.mark_exhausted();
        self.running.store(false, Ordering::SeqCst);
    }

    fn flush(&mut self, now: Instant) {
        while let Some(outcome) = self.merger.poll(now) {
            match outcome {
                MergeOutcome::Merged(frame) => self.append(frame),
                MergeOutcome::Dropped { missing } => {
                    debug!(?missing, "dropping incomplete tick");
                    if let Some(log) = &self.session_log {
                        log.record_tick_dropped();
                    }
                }
            }
        }
    }

    fn append(&self, frame: Frame) {
        match self.buffer.append(frame) {
            Ok(()) => {
                if let Some(log) = &self.session_log {
                    log.record_frame_appended();
                }
            }
            Err(e) => {
                warn!("rejected frame: {e}");
                if let Some(log) = &self.session_log {
                    log.record_frame_rejected();
                }
            }
        }
    }
}
