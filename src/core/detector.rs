//! The event monitor: a consumer loop over a shared motion sequence buffer.
//!
//! ```text
//!  Unattached ──attach──▶ Attached ──start──▶ Running ◀──resume── Paused
//!                                                │  └────pause────▶  │
//!                                                └──stop/fault/end──▶ Stopped
//! ```
//!
//! The loop blocks on the buffer's new-data signal, clears it, then scores
//! every available candidate window. The first window that classifies
//! positive produces one event for that wake. Bad windows are skipped; a
//! buffer invariant violation stops the monitor with a fault status.

use crate::core::buffer::{NewDataSignal, SharedBuffer, WaitStatus};
use crate::core::event::Event;
use crate::core::features::FeatureExtractor;
use crate::core::training::DetectionStrategy;
use crate::error::{ConfigurationError, ModelError, RuntimeFault};
use crate::stats::SharedSessionLog;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Why a monitor reached its terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// `stop()` was called
    Requested,
    /// The buffer was exhausted and all of its data evaluated
    SourceExhausted,
    /// A buffer invariant was violated
    Fault(String),
}

/// Lifecycle state of a detector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MonitorStatus {
    Unattached,
    Attached,
    Running,
    Paused,
    Stopped(StopReason),
}

impl MonitorStatus {
    pub fn is_stopped(&self) -> bool {
        matches!(self, MonitorStatus::Stopped(_))
    }

    fn name(&self) -> &'static str {
        match self {
            MonitorStatus::Unattached => "unattached",
            MonitorStatus::Attached => "attached",
            MonitorStatus::Running => "running",
            MonitorStatus::Paused => "paused",
            MonitorStatus::Stopped(_) => "stopped",
        }
    }
}

/// Detector loop settings.
#[derive(Debug, Clone)]
pub struct DetectorConfig {
    /// Upper bound on a single blocking wait for new data
    pub wait_timeout: Duration,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_millis(500),
            event_capacity: 256,
        }
    }
}

/// State shared between the detector, its handles and its loop thread.
#[derive(Debug)]
struct MonitorShared {
    status: Mutex<MonitorStatus>,
    control: Condvar,
    stop_requested: AtomicBool,
    paused: AtomicBool,
    buffer: OnceLock<SharedBuffer>,
}

impl MonitorShared {
    fn new() -> Self {
        Self {
            status: Mutex::new(MonitorStatus::Unattached),
            control: Condvar::new(),
            stop_requested: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            buffer: OnceLock::new(),
        }
    }

    fn lock_status(&self) -> MutexGuard<'_, MonitorStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn stop_requested(&self) -> bool {
        self.stop_requested.load(Ordering::SeqCst)
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    fn request_stop(&self) {
        {
            let mut status = self.lock_status();
            if status.is_stopped() {
                return;
            }
            *status = MonitorStatus::Stopped(StopReason::Requested);
        }
        self.stop_requested.store(true, Ordering::SeqCst);
        self.control.notify_all();
        if let Some(buffer) = self.buffer.get() {
            buffer.wake_all();
        }
    }

    fn pause(&self) -> Result<(), ConfigurationError> {
        {
            let mut status = self.lock_status();
            match &*status {
                MonitorStatus::Running => {}
                MonitorStatus::Paused => return Ok(()),
                other => {
                    return Err(ConfigurationError::InvalidTransition {
                        operation: "pause",
                        state: other.name().to_string(),
                    })
                }
            }
            *status = MonitorStatus::Paused;
        }
        self.paused.store(true, Ordering::SeqCst);
        if let Some(buffer) = self.buffer.get() {
            buffer.wake_all();
        }
        Ok(())
    }

    fn resume(&self) -> Result<(), ConfigurationError> {
        let mut status = self.lock_status();
        match &*status {
            MonitorStatus::Paused => {}
            MonitorStatus::Running => return Ok(()),
            other => {
                return Err(ConfigurationError::InvalidTransition {
                    operation: "resume",
                    state: other.name().to_string(),
                })
            }
        }
        *status = MonitorStatus::Running;
        self.paused.store(false, Ordering::SeqCst);
        self.control.notify_all();
        Ok(())
    }

    /// Sleep on the control condvar while paused, bounded by `timeout`.
    fn wait_while_paused(&self, timeout: Duration) {
        let status = self.lock_status();
        let _ = self
            .control
            .wait_timeout_while(status, timeout, |s| *s == MonitorStatus::Paused)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Record the loop's terminal state unless `stop()` got there first.
    fn finish(&self, reason: StopReason) {
        let mut status = self.lock_status();
        if !status.is_stopped() {
            *status = MonitorStatus::Stopped(reason);
        }
    }
}

/// Cloneable control handle, usable from any thread.
#[derive(Debug, Clone)]
pub struct DetectorHandle {
    shared: Arc<MonitorShared>,
}

impl DetectorHandle {
    /// Request the loop to stop. Idempotent.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    pub fn pause(&self) -> Result<(), ConfigurationError> {
        self.shared.pause()
    }

    pub fn resume(&self) -> Result<(), ConfigurationError> {
        self.shared.resume()
    }

    pub fn status(&self) -> MonitorStatus {
        self.shared.lock_status().clone()
    }
}

/// Gesture detector over one buffer, parameterized by a detection strategy
/// and a feature extractor.
pub struct Detector<S, F> {
    strategy: Arc<S>,
    extractor: Arc<F>,
    config: DetectorConfig,
    shared: Arc<MonitorShared>,
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    thread_handle: Option<JoinHandle<()>>,
    session_log: Option<SharedSessionLog>,
}

impl<S, F> Detector<S, F>
where
    S: DetectionStrategy + 'static,
    F: FeatureExtractor + 'static,
{
    /// Create an unattached detector.
    ///
    /// Fails if the strategy offers no window spans to evaluate.
    pub fn new(strategy: S, extractor: F, config: DetectorConfig) -> Result<Self, ModelError> {
        if strategy.candidate_spans().is_empty() {
            return Err(ModelError::NonConvergent(format!(
                "strategy '{}' has no candidate window spans",
                strategy.label()
            )));
        }
        let (events_tx, events_rx) = bounded(config.event_capacity.max(1));
        Ok(Self {
            strategy: Arc::new(strategy),
            extractor: Arc::new(extractor),
            config,
            shared: Arc::new(MonitorShared::new()),
            events_tx,
            events_rx,
            thread_handle: None,
            session_log: None,
        })
    }

    /// Report scoring activity into a session log.
    pub fn with_session_log(mut self, log: SharedSessionLog) -> Self {
        self.session_log = Some(log);
        self
    }

    /// Bind the detector to a buffer.
    pub fn attach(&mut self, buffer: SharedBuffer) -> Result<(), ConfigurationError> {
        let mut status = self.shared.lock_status();
        match &*status {
            MonitorStatus::Unattached => {}
            MonitorStatus::Attached | MonitorStatus::Running | MonitorStatus::Paused => {
                return Err(ConfigurationError::AlreadyAttached)
            }
            other => {
                return Err(ConfigurationError::InvalidTransition {
                    operation: "attach",
                    state: other.name().to_string(),
                })
            }
        }
        self.shared
            .buffer
            .set(buffer)
            .map_err(|_| ConfigurationError::AlreadyAttached)?;
        *status = MonitorStatus::Attached;
        Ok(())
    }

    /// Spawn the monitoring loop.
    ///
    /// Fails immediately if the detector is not attached to a buffer.
    pub fn start(&mut self) -> Result<(), ConfigurationError> {
        let mut status = self.shared.lock_status();
        match &*status {
            MonitorStatus::Attached => {}
            MonitorStatus::Unattached => return Err(ConfigurationError::NotAttached),
            other => {
                return Err(ConfigurationError::InvalidTransition {
                    operation: "start",
                    state: other.name().to_string(),
                })
            }
        }
        let buffer = self
            .shared
            .buffer
            .get()
            .cloned()
            .ok_or(ConfigurationError::NotAttached)?;

        let monitor = MonitorLoop {
            strategy: Arc::clone(&self.strategy),
            extractor: Arc::clone(&self.extractor),
            signal: buffer.subscribe(),
            buffer,
            shared: Arc::clone(&self.shared),
            events: self.events_tx.clone(),
            wait_timeout: self.config.wait_timeout,
            session_log: self.session_log.clone(),
        };

        let handle = thread::Builder::new()
            .name(format!("detector-{}", self.strategy.label()))
            .spawn(move || monitor.run())
            .map_err(|e| ConfigurationError::Spawn(e.to_string()))?;

        *status = MonitorStatus::Running;
        self.thread_handle = Some(handle);
        info!(gesture = %self.strategy.label(), "detector started");
        Ok(())
    }

    /// Request the loop to stop. Idempotent; never blocks on the loop.
    pub fn stop(&self) {
        self.shared.request_stop();
    }

    pub fn pause(&self) -> Result<(), ConfigurationError> {
        self.shared.pause()
    }

    pub fn resume(&self) -> Result<(), ConfigurationError> {
        self.shared.resume()
    }

    /// Wait for the loop thread to finish and return the terminal status.
    pub fn join(&mut self) -> MonitorStatus {
        if let Some(handle) = self.thread_handle.take() {
            if handle.join().is_err() {
                self.shared
                    .finish(StopReason::Fault("detector thread panicked".into()));
            }
        }
        self.status()
    }

    pub fn status(&self) -> MonitorStatus {
        self.shared.lock_status().clone()
    }

    /// A control handle for other threads.
    pub fn handle(&self) -> DetectorHandle {
        DetectorHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Receiver for emitted events.
    pub fn events(&self) -> &Receiver<Event> {
        &self.events_rx
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Highest score among the currently available windows.
    ///
    /// Read-only: does not touch the loop's new-data signal or state.
    pub fn current_reaction(&self) -> Option<f64> {
        let buffer = self.shared.buffer.get()?;
        self.strategy
            .candidate_spans()
            .iter()
            .filter_map(|&span| buffer.get_window(span))
            .map(|window| self.extractor.extract(&window.frames))
            .filter(|features| features.is_valid())
            .map(|features| self.strategy.score(&features))
            .filter(|score| !score.is_nan())
            .reduce(f64::max)
    }
}

impl<S, F> Drop for Detector<S, F> {
    fn drop(&mut self) {
        self.shared.request_stop();
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

/// Everything the loop thread owns.
struct MonitorLoop<S, F> {
    strategy: Arc<S>,
    extractor: Arc<F>,
    buffer: SharedBuffer,
    signal: NewDataSignal,
    shared: Arc<MonitorShared>,
    events: Sender<Event>,
    wait_timeout: Duration,
    session_log: Option<SharedSessionLog>,
}

impl<S: DetectionStrategy, F: FeatureExtractor> MonitorLoop<S, F> {
    fn run(mut self) {
        let reason = panic::catch_unwind(AssertUnwindSafe(|| self.run_until_stopped()))
            .unwrap_or_else(|_| StopReason::Fault("detector thread panicked".into()));
        match &reason {
            StopReason::Fault(message) => {
                error!(gesture = %self.strategy.label(), "detector stopped on fault: {message}")
            }
            other => info!(gesture = %self.strategy.label(), reason = ?other, "detector stopped"),
        }
        self.shared.finish(reason);
    }

    fn run_until_stopped(&mut self) -> StopReason {
        loop {
            if self.shared.stop_requested() {
                return StopReason::Requested;
            }
            if self.shared.is_paused() {
                self.shared.wait_while_paused(self.wait_timeout);
                continue;
            }

            let shared = &self.shared;
            let status = self.signal.wait_until(Some(self.wait_timeout), || {
                shared.stop_requested() || shared.is_paused()
            });
            match status {
                WaitStatus::NewData => {}
                WaitStatus::Exhausted => return StopReason::SourceExhausted,
                WaitStatus::Cancelled | WaitStatus::TimedOut => continue,
            }
            self.signal.clear();

            match self.evaluate() {
                Ok(Some(event)) => {
                    if self.shared.stop_requested() {
                        return StopReason::Requested;
                    }
                    self.emit(event);
                }
                Ok(None) => {}
                Err(fault) => return StopReason::Fault(fault.to_string()),
            }
        }
    }

    /// Score every available candidate window; the first positive wins.
    fn evaluate(&self) -> Result<Option<Event>, RuntimeFault> {
        for &span in self.strategy.candidate_spans() {
            let Some(window) = self.buffer.get_window(span) else {
                continue;
            };
            window.verify_order()?;

            let features = self.extractor.extract(&window.frames);
            if let Err(e) = features.validate() {
                debug!(span, "skipping window: {e}");
                if let Some(log) = &self.session_log {
                    log.record_window_skipped();
                }
                continue;
            }

            let score = self.strategy.score(&features);
            if let Some(log) = &self.session_log {
                log.record_window_scored();
            }
            if self.strategy.classify(score) {
                return Ok(Some(Event::from_window(
                    self.strategy.label(),
                    &window,
                    score,
                )));
            }
        }
        Ok(None)
    }

    fn emit(&self, event: Event) {
        debug!(
            gesture = %event.label,
            score = event.score,
            start = event.start_timestamp,
            end = event.end_timestamp,
            "gesture detected"
        );
        if let Some(log) = &self.session_log {
            log.record_event();
        }
        match self.events.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("event channel full; dropping event"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}
