//! Lock-free session counters.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::warn;

/// Running counters for one capture/detection session.
#[derive(Debug)]
pub struct SessionLog {
    /// Frames appended to the buffer
    frames_appended: AtomicU64,
    /// Frames rejected by the buffer or the source decoder
    frames_rejected: AtomicU64,
    /// Merge ticks dropped because a source missed the barrier
    ticks_dropped: AtomicU64,
    /// Windows scored by a detector
    windows_scored: AtomicU64,
    /// Windows skipped because their features were invalid
    windows_skipped: AtomicU64,
    /// Events emitted by detectors
    events_emitted: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self {
            frames_appended: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
            ticks_dropped: AtomicU64::new(0),
            windows_scored: AtomicU64::new(0),
            windows_skipped: AtomicU64::new(0),
            events_emitted: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that accumulates onto previously persisted totals.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            warn!("could not load previous session stats: {e}");
        }

        log
    }

    pub fn record_frame_appended(&self) {
        self.frames_appended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame_rejected(&self) {
        self.frames_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tick_dropped(&self) {
        self.ticks_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_scored(&self) {
        self.windows_scored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_window_skipped(&self) {
        self.windows_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_event(&self) {
        self.events_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            frames_appended: self.frames_appended.load(Ordering::Relaxed),
            frames_rejected: self.frames_rejected.load(Ordering::Relaxed),
            ticks_dropped: self.ticks_dropped.load(Ordering::Relaxed),
            windows_scored: self.windows_scored.load(Ordering::Relaxed),
            windows_skipped: self.windows_skipped.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Human-readable summary.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Frames appended: {}\n\
             - Frames rejected: {}\n\
             - Merge ticks dropped: {}\n\
             - Windows scored: {}\n\
             - Windows skipped (invalid features): {}\n\
             - Events emitted: {}\n\
             - Session duration: {} seconds",
            stats.frames_appended,
            stats.frames_rejected,
            stats.ticks_dropped,
            stats.windows_scored,
            stats.windows_skipped,
            stats.events_emitted,
            stats.session_duration_secs
        )
    }

    /// Save totals to disk, if persistence is configured.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                frames_appended: stats.frames_appended,
                frames_rejected: stats.frames_rejected,
                ticks_dropped: stats.ticks_dropped,
                windows_scored: stats.windows_scored,
                windows_skipped: stats.windows_skipped,
                events_emitted: stats.events_emitted,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.frames_appended
                    .store(persisted.frames_appended, Ordering::Relaxed);
                self.frames_rejected
                    .store(persisted.frames_rejected, Ordering::Relaxed);
                self.ticks_dropped
                    .store(persisted.ticks_dropped, Ordering::Relaxed);
                self.windows_scored
                    .store(persisted.windows_scored, Ordering::Relaxed);
                self.windows_skipped
                    .store(persisted.windows_skipped, Ordering::Relaxed);
                self.events_emitted
                    .store(persisted.events_emitted, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for SessionLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the session counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    pub frames_appended: u64,
    pub frames_rejected: u64,
    pub ticks_dropped: u64,
    pub windows_scored: u64,
    pub windows_skipped: u64,
    pub events_emitted: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    frames_appended: u64,
    frames_rejected: u64,
    ticks_dropped: u64,
    windows_scored: u64,
    windows_skipped: u64,
    events_emitted: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared session log.
pub type SharedSessionLog = Arc<SessionLog>;

pub fn create_shared_log() -> SharedSessionLog {
    Arc::new(SessionLog::new())
}

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedSessionLog {
    Arc::new(SessionLog::with_persistence(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting() {
        let log = SessionLog::new();
        log.record_frame_appended();
        log.record_frame_appended();
        log.record_tick_dropped();
        log.record_event();

        let stats = log.stats();
        assert_eq!(stats.frames_appended, 2);
        assert_eq!(stats.ticks_dropped, 1);
        assert_eq!(stats.events_emitted, 1);
        assert_eq!(stats.windows_scored, 0);
    }

    #[test]
    fn test_persistence_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let log = SessionLog::with_persistence(path.clone());
        log.record_window_scored();
        log.record_window_skipped();
        log.save().unwrap();

        let reloaded = SessionLog::with_persistence(path);
        reloaded.record_window_scored();
        let stats = reloaded.stats();
        assert_eq!(stats.windows_scored, 2);
        assert_eq!(stats.windows_skipped, 1);
    }

    #[test]
    fn test_summary_format() {
        let summary = SessionLog::new().summary();
        assert!(summary.contains("Frames appended"));
        assert!(summary.contains("Events emitted"));
    }
}
