//! End-to-end tests: sources through the recorder into detectors.

use gesture_monitor::core::{
    DetectionStrategy, Detector, DetectorConfig, GestureProfile, MonitorStatus,
    MotionFeatureExtractor, MotionSequenceBuffer, StopReason, TrainingOptions,
};
use gesture_monitor::recording::{Recorder, RecorderConfig};
use gesture_monitor::source::{ChannelSource, Frame, PlaybackSource};
use gesture_monitor::stats::create_shared_log;
use gesture_monitor::ConfigurationError;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn swipe(start: u64, length: u64, amplitude: f64) -> Vec<Frame> {
    (0..=length)
        .map(|t| {
            let x = amplitude * (t as f64 / length as f64);
            Frame::new(start + t).with("palm_x", x * x)
        })
        .collect()
}

fn extractor() -> MotionFeatureExtractor {
    MotionFeatureExtractor::new(vec!["palm_x".to_string()], 10)
}

fn trained_profile() -> GestureProfile {
    let examples = vec![swipe(0, 40, 0.9), swipe(0, 50, 1.0), swipe(0, 60, 1.1)];
    GestureProfile::train("swipe", &examples, &extractor(), &TrainingOptions::default()).unwrap()
}

fn merge_config(timeout_ms: u64) -> RecorderConfig {
    RecorderConfig {
        merge_timeout: Duration::from_millis(timeout_ms),
        source_capacity: 16,
    }
}

#[test]
fn test_merge_two_complete_sources() {
    let buffer = MotionSequenceBuffer::shared();
    let (tx_a, source_a) = ChannelSource::new("a", 8);
    let (tx_b, source_b) = ChannelSource::new("b", 8);
    let mut recorder = Recorder::new(Arc::clone(&buffer), merge_config(500))
        .with_source(source_a)
        .with_source(source_b);
    recorder.start().unwrap();

    for t in [0, 10, 20] {
        tx_a.send(Frame::new(t).with("a", t as f64)).unwrap();
        tx_b.send(Frame::new(t).with("b", t as f64)).unwrap();
    }
    drop(tx_a);
    drop(tx_b);
    recorder.join();

    let frames = buffer.snapshot();
    assert_eq!(frames.len(), 3);
    for (frame, t) in frames.iter().zip([0u64, 10, 20]) {
        assert_eq!(frame.timestamp, t);
        assert_eq!(frame.scalar("a"), Some(t as f64));
        assert_eq!(frame.scalar("b"), Some(t as f64));
    }
    assert!(buffer.is_exhausted());
}

#[test]
fn test_merge_drops_tick_after_timeout() {
    let buffer = MotionSequenceBuffer::shared();
    let log = create_shared_log();
    let (tx_a, source_a) = ChannelSource::new("a", 8);
    let (tx_b, source_b) = ChannelSource::new("b", 8);
    let mut recorder = Recorder::new(Arc::clone(&buffer), merge_config(50))
        .with_source(source_a)
        .with_source(source_b)
        .with_session_log(Arc::clone(&log));
    recorder.start().unwrap();

    for t in [0, 10, 20] {
        tx_a.send(Frame::new(t).with("a", 1.0)).unwrap();
    }
    for t in [0, 10] {
        tx_b.send(Frame::new(t).with("b", 2.0)).unwrap();
    }

    // B stays connected, so only the timeout can resolve the t=20 tick
    thread::sleep(Duration::from_millis(300));
    assert_eq!(buffer.len(), 2);
    assert!(!buffer.is_exhausted());
    assert_eq!(log.stats().ticks_dropped, 1);

    drop(tx_a);
    drop(tx_b);
    recorder.join();
    assert_eq!(buffer.len(), 2);
    assert!(buffer
        .snapshot()
        .iter()
        .all(|f| f.scalar("a").is_some() && f.scalar("b").is_some()));
}

#[test]
fn test_late_frame_after_dropped_tick_keeps_sources_aligned() {
    let buffer = MotionSequenceBuffer::shared();
    let log = create_shared_log();
    let (tx_a, source_a) = ChannelSource::new("a", 8);
    let (tx_b, source_b) = ChannelSource::new("b", 8);
    let mut recorder = Recorder::new(Arc::clone(&buffer), merge_config(50))
        .with_source(source_a)
        .with_source(source_b)
        .with_session_log(Arc::clone(&log));
    recorder.start().unwrap();

    for t in [0, 10] {
        tx_a.send(Frame::new(t).with("a_ts", t as f64)).unwrap();
    }
    tx_b.send(Frame::new(0).with("b_ts", 0.0)).unwrap();

    // The t=10 tick times out before B delivers it
    thread::sleep(Duration::from_millis(300));
    assert_eq!(log.stats().ticks_dropped, 1);

    tx_b.send(Frame::new(10).with("b_ts", 10.0)).unwrap();
    tx_b.send(Frame::new(20).with("b_ts", 20.0)).unwrap();
    tx_a.send(Frame::new(20).with("a_ts", 20.0)).unwrap();
    drop(tx_a);
    drop(tx_b);
    recorder.join();

    let frames = buffer.snapshot();
    assert_eq!(frames.len(), 2);
    for frame in &frames {
        assert_eq!(frame.scalar("a_ts"), frame.scalar("b_ts"));
    }
    assert_eq!(frames[1].timestamp, 20);
    assert_eq!(log.stats().ticks_dropped, 1);
}

#[test]
fn test_start_unattached_fails() {
    let mut detector =
        Detector::new(trained_profile(), extractor(), DetectorConfig::default()).unwrap();
    assert_eq!(detector.start(), Err(ConfigurationError::NotAttached));
}

#[test]
fn test_stop_exits_within_one_wake() {
    let config = DetectorConfig {
        wait_timeout: Duration::from_secs(30),
        event_capacity: 8,
    };
    let mut detector = Detector::new(trained_profile(), extractor(), config).unwrap();
    detector.attach(MotionSequenceBuffer::shared()).unwrap();
    detector.start().unwrap();
    thread::sleep(Duration::from_millis(20));

    let started = Instant::now();
    detector.stop();
    detector.stop();
    assert_eq!(detector.join(), MonitorStatus::Stopped(StopReason::Requested));
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[test]
fn test_recorded_gesture_is_detected() {
    let profile = trained_profile();
    assert!(profile.candidate_spans().contains(&50));

    let buffer = MotionSequenceBuffer::shared();
    let log = create_shared_log();
    let mut detector = Detector::new(profile, extractor(), DetectorConfig::default())
        .unwrap()
        .with_session_log(Arc::clone(&log));
    detector.attach(Arc::clone(&buffer)).unwrap();
    detector.start().unwrap();

    let mut recorder = Recorder::new(Arc::clone(&buffer), RecorderConfig::default())
        .with_source(PlaybackSource::new("leap", swipe(0, 50, 1.0)));
    recorder.start().unwrap();
    recorder.join();

    assert_eq!(
        detector.join(),
        MonitorStatus::Stopped(StopReason::SourceExhausted)
    );
    let events: Vec<_> = detector.events().try_iter().collect();
    assert!(!events.is_empty());
    assert!(events.iter().all(|e| e.label == "swipe"));
    assert!(events.iter().all(|e| e.end_timestamp <= 50));
    assert_eq!(log.stats().events_emitted, events.len() as u64);
}

#[test]
fn test_detectors_share_one_buffer() {
    let buffer = MotionSequenceBuffer::shared();
    for frame in swipe(0, 50, 1.0) {
        buffer.append(frame).unwrap();
    }
    buffer.mark_exhausted();

    let mut detectors: Vec<_> = (0..2)
        .map(|_| {
            let mut detector =
                Detector::new(trained_profile(), extractor(), DetectorConfig::default()).unwrap();
            detector.attach(Arc::clone(&buffer)).unwrap();
            detector.start().unwrap();
            detector
        })
        .collect();

    // One detector clearing its signal must not hide the data from the other
    for detector in &mut detectors {
        assert!(detector.join().is_stopped());
        assert_eq!(detector.events().try_iter().count(), 1);
    }
}

#[test]
fn test_windows_without_channels_are_skipped() {
    let buffer = MotionSequenceBuffer::shared();
    for t in 0..=60 {
        buffer.append(Frame::new(t).with("yaw", 0.1)).unwrap();
    }
    buffer.mark_exhausted();

    let log = create_shared_log();
    let mut detector = Detector::new(trained_profile(), extractor(), DetectorConfig::default())
        .unwrap()
        .with_session_log(Arc::clone(&log));
    detector.attach(buffer).unwrap();
    detector.start().unwrap();

    assert_eq!(
        detector.join(),
        MonitorStatus::Stopped(StopReason::SourceExhausted)
    );
    assert!(detector.events().try_recv().is_err());
    assert!(log.stats().windows_skipped > 0);
    assert_eq!(log.stats().windows_scored, 0);
}

#[test]
fn test_current_reaction_leaves_detector_untouched() {
    let buffer = MotionSequenceBuffer::shared();
    for frame in swipe(0, 50, 1.0) {
        buffer.append(frame).unwrap();
    }

    let mut detector =
        Detector::new(trained_profile(), extractor(), DetectorConfig::default()).unwrap();
    detector.attach(Arc::clone(&buffer)).unwrap();

    let first = detector.current_reaction();
    let second = detector.current_reaction();
    assert!(first.is_some());
    assert_eq!(first, second);
    assert_eq!(detector.status(), MonitorStatus::Attached);
    assert_eq!(buffer.len(), 51);
}
