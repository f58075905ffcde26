//! Train a synthetic "swipe" gesture and detect it in a replayed stream.
//!
//! Run with `cargo run --example detect_demo`.

use gesture_monitor::core::{
    DetectionStrategy, Detector, DetectorConfig, GestureProfile, MotionFeatureExtractor,
    MotionSequenceBuffer, TrainingOptions,
};
use gesture_monitor::recording::{Recorder, RecorderConfig};
use gesture_monitor::source::{Frame, PlaybackSource};
use std::sync::Arc;
use std::time::Duration;

/// A quadratic sweep of `palm_x` starting at `start`.
fn swipe(start: u64, length: u64, amplitude: f64) -> Vec<Frame> {
    (0..=length)
        .map(|t| {
            let x = amplitude * (t as f64 / length as f64);
            Frame::new(start + t).with("palm_x", x * x)
        })
        .collect()
}

fn main() -> gesture_monitor::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("gesture_monitor=debug")
        .init();

    let extractor = MotionFeatureExtractor::new(vec!["palm_x".to_string()], 10);
    let examples = vec![
        swipe(0, 40, 0.9),
        swipe(0, 45, 1.05),
        swipe(0, 50, 1.0),
        swipe(0, 55, 0.95),
        swipe(0, 60, 1.1),
    ];
    let profile: GestureProfile =
        GestureProfile::train("swipe", &examples, &extractor, &TrainingOptions::default())?;
    println!(
        "Trained '{}': boundary {:.2}, spans {:?}",
        profile.label(),
        profile.threshold().boundary(),
        profile.candidate_spans()
    );

    // 100 ticks of a resting hand, then one swipe
    let mut stream: Vec<Frame> = (0..100).map(|t| Frame::new(t).with("palm_x", 0.0)).collect();
    stream.extend(swipe(100, 50, 1.0));

    let buffer = MotionSequenceBuffer::shared();
    let mut detector = Detector::new(profile, extractor, DetectorConfig::default())?;
    detector.attach(Arc::clone(&buffer))?;
    detector.start()?;

    let source = PlaybackSource::new("leap", stream).paced(Duration::from_millis(2));
    let mut recorder =
        Recorder::new(Arc::clone(&buffer), RecorderConfig::default()).with_source(source);
    recorder.start()?;
    recorder.join();

    let status = detector.join();
    for event in detector.events().try_iter() {
        println!(
            "Detected '{}' over ticks {}..={} (score {:.2}, span {})",
            event.label, event.start_timestamp, event.end_timestamp, event.score, event.span
        );
    }
    println!("Detector finished: {status:?}");
    Ok(())
}
