//! Gesture Monitor CLI
//!
//! Record gesture examples, train profiles and run live detection over
//! newline-delimited device messages.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use crossbeam_channel::RecvTimeoutError;
use gesture_monitor::{
    config::Config,
    core::{DetectionStrategy, Detector, GestureProfile, MotionSequenceBuffer},
    recording::Recorder,
    source::{Device, LineSource},
    stats::{create_shared_log_with_persistence, SharedSessionLog},
    storage::FileStore,
    VERSION,
};
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gesture-monitor")]
#[command(version = VERSION)]
#[command(about = "Real-time gesture detection over motion capture streams", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record one example of a gesture
    Record {
        /// Gesture name
        #[arg(long, short)]
        gesture: String,

        /// Message streams to merge (file path, or - for stdin)
        #[arg(long, short, required = true)]
        input: Vec<PathBuf>,

        /// Device whose topic filter prefixes each message
        #[arg(long, value_parser = parse_device)]
        device: Option<Device>,
    },

    /// Train a gesture profile from its recorded examples
    Train {
        /// Gesture name
        #[arg(long, short)]
        gesture: String,
    },

    /// Detect a trained gesture in live message streams
    Detect {
        /// Gesture name
        #[arg(long, short)]
        gesture: String,

        /// Message streams to merge (file path, or - for stdin)
        #[arg(long, short, required = true)]
        input: Vec<PathBuf>,

        /// Device whose topic filter prefixes each message
        #[arg(long, value_parser = parse_device)]
        device: Option<Device>,
    },

    /// List recorded gestures
    Gestures,

    /// Show cumulative session statistics
    Status,

    /// Show configuration
    Config,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Record {
            gesture,
            input,
            device,
        } => cmd_record(&gesture, &input, device),
        Commands::Train { gesture } => cmd_train(&gesture),
        Commands::Detect {
            gesture,
            input,
            device,
        } => cmd_detect(&gesture, &input, device),
        Commands::Gestures => cmd_gestures(),
        Commands::Status => cmd_status(),
        Commands::Config => cmd_config(),
    }
}

fn parse_device(name: &str) -> Result<Device, String> {
    Device::parse(name).ok_or_else(|| format!("unknown device '{name}' (primesense, leap, eyetribe)"))
}

fn load_config() -> anyhow::Result<Config> {
    let config = Config::load().context("loading configuration")?;
    config
        .ensure_directories()
        .context("creating data directories")?;
    Ok(config)
}

/// Build a recorder over the given inputs, writing into `buffer`.
fn build_recorder(
    config: &Config,
    buffer: Arc<MotionSequenceBuffer>,
    inputs: &[PathBuf],
    device: Option<Device>,
    log: SharedSessionLog,
) -> anyhow::Result<Recorder> {
    let mut recorder =
        Recorder::new(buffer, config.recording.recorder_config()).with_session_log(log);

    for path in inputs {
        let name = path.display().to_string();
        if name == "-" {
            recorder.add_source(LineSource::new(
                "stdin",
                BufReader::new(std::io::stdin()),
                device,
            ));
        } else {
            let file = File::open(path).with_context(|| format!("opening {name}"))?;
            recorder.add_source(LineSource::new(name, BufReader::new(file), device));
        }
    }
    Ok(recorder)
}

fn cmd_record(gesture: &str, inputs: &[PathBuf], device: Option<Device>) -> anyhow::Result<()> {
    let config = load_config()?;
    let store = FileStore::new(&config.data_path);
    let log = create_shared_log_with_persistence(config.stats_path());

    println!("Recording gesture '{gesture}' from {} input(s)", inputs.len());
    println!("Press Ctrl+C to stop");
    println!();

    let buffer = Arc::new(MotionSequenceBuffer::with_min_window_frames(
        config.detection.min_window_frames,
    ));
    let mut recorder = build_recorder(&config, Arc::clone(&buffer), inputs, device, Arc::clone(&log))?;

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    recorder.start()?;
    while running.load(Ordering::SeqCst) && recorder.is_running() {
        std::thread::sleep(Duration::from_millis(100));
    }
    recorder.stop();

    let frames = buffer.snapshot();
    if frames.len() < 2 {
        bail!("recorded {} frame(s); need at least 2 for an example", frames.len());
    }
    let id = store.save_gesture_example(gesture, &frames)?;
    log.save().context("saving session stats")?;

    println!(
        "Saved example {id}: {} frames over {} ticks",
        frames.len(),
        buffer.duration()
    );
    Ok(())
}

fn cmd_train(gesture: &str) -> anyhow::Result<()> {
    let config = load_config()?;
    let store = FileStore::new(&config.data_path);

    let examples = store
        .gesture_examples(gesture)
        .with_context(|| format!("loading examples of '{gesture}'"))?;
    println!("Training '{gesture}' on {} example(s)...", examples.len());

    let extractor = config.features.extractor();
    let profile: GestureProfile = GestureProfile::train(
        gesture,
        &examples,
        &extractor,
        &config.detection.training_options(),
    )?;
    let path = store.save_profile(gesture, &profile)?;

    println!("  Usable examples: {}", profile.example_count());
    println!("  Score boundary: {:.3}", profile.threshold().boundary());
    println!("  Window spans: {:?}", profile.candidate_spans());
    println!("Profile saved to {path:?}");
    Ok(())
}

fn cmd_detect(gesture: &str, inputs: &[PathBuf], device: Option<Device>) -> anyhow::Result<()> {
    let config = load_config()?;
    let store = FileStore::new(&config.data_path);
    let log = create_shared_log_with_persistence(config.stats_path());

    let profile: GestureProfile = store
        .load_profile(gesture)
        .with_context(|| format!("no trained profile for '{gesture}'; run `train` first"))?;

    let buffer = Arc::new(MotionSequenceBuffer::with_min_window_frames(
        config.detection.min_window_frames,
    ));
    let mut detector = Detector::new(
        profile,
        config.features.extractor(),
        config.detection.detector_config(),
    )?
    .with_session_log(Arc::clone(&log));
    detector.attach(Arc::clone(&buffer))?;

    let mut recorder = build_recorder(&config, Arc::clone(&buffer), inputs, device, Arc::clone(&log))?;

    println!("Detecting '{gesture}'");
    println!("Press Ctrl+C to stop");
    println!();

    let running = Arc::new(AtomicBool::new(true));
    ctrlc_handler(running.clone());

    detector.start()?;
    recorder.start()?;

    let events = detector.events().clone();
    while running.load(Ordering::SeqCst) {
        match events.recv_timeout(Duration::from_millis(100)) {
            Ok(event) => println!("{}", serde_json::to_string(&event)?),
            Err(RecvTimeoutError::Timeout) => {
                if detector.status().is_stopped() {
                    break;
                }
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    recorder.stop();
    detector.stop();
    let status = detector.join();
    while let Ok(event) = events.try_recv() {
        println!("{}", serde_json::to_string(&event)?);
    }

    log.save().context("saving session stats")?;
    println!();
    println!("Detector finished: {status:?}");
    println!("{}", log.summary());
    Ok(())
}

fn cmd_gestures() -> anyhow::Result<()> {
    let config = load_config()?;
    let store = FileStore::new(&config.data_path);

    let gestures = store.list_gestures()?;
    if gestures.is_empty() {
        println!("No gestures recorded yet.");
        return Ok(());
    }

    println!("Recorded gestures");
    println!("=================");
    for gesture in gestures {
        let examples = store.gesture_examples(&gesture).map(|e| e.len()).unwrap_or(0);
        let trained = store.load_profile::<GestureProfile>(&gesture).is_ok();
        println!(
            "  {gesture}: {examples} example(s), {}",
            if trained { "trained" } else { "not trained" }
        );
    }
    Ok(())
}

fn cmd_status() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Gesture Monitor Status");
    println!("======================");
    println!();
    println!("Data directory: {:?}", config.data_path);
    println!("Threshold k: {}", config.detection.threshold_k);
    println!("Merge timeout: {}ms", config.recording.merge_timeout.as_millis());
    println!();

    // Load and show persisted session stats if available
    let stats_path = config.stats_path();
    if stats_path.exists() {
        let content = std::fs::read_to_string(&stats_path)?;
        let stats: serde_json::Value = serde_json::from_str(&content)?;
        println!("Cumulative Statistics:");
        for key in [
            "frames_appended",
            "frames_rejected",
            "ticks_dropped",
            "windows_scored",
            "windows_skipped",
            "events_emitted",
        ] {
            if let Some(value) = stats.get(key) {
                println!("  {}: {value}", key.replace('_', " "));
            }
        }
    } else {
        println!("No previous session data found.");
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load().unwrap_or_default();

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Set up Ctrl+C handler.
fn ctrlc_handler(running: Arc<AtomicBool>) {
    if let Err(e) = ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    }) {
        eprintln!("Warning: could not set Ctrl+C handler: {e}");
    }
}
