//! On-disk storage for recordings, gesture examples and trained profiles.
//!
//! Layout under the data directory:
//!
//! ```text
//! <data>/gestures/<gesture>/<id>.json   one recorded example per file
//! <data>/recordings/<name>.json         free-form recordings
//! <data>/profiles/<gesture>.json        trained gesture profiles
//! ```

use crate::error::StorageError;
use crate::source::types::Frame;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use uuid::Uuid;

/// Save and load named frame sequences.
pub trait SequenceStore {
    /// Persist a sequence under `name`, replacing any previous one.
    fn save(&self, frames: &[Frame], name: &str) -> Result<PathBuf, StorageError>;

    /// Load the sequence stored under `name`.
    fn load(&self, name: &str) -> Result<Vec<Frame>, StorageError>;
}

/// A stored sequence with its metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSequence {
    pub id: Uuid,
    pub name: String,
    pub recorded_at: DateTime<Utc>,
    pub frames: Vec<Frame>,
}

/// JSON file store rooted at a data directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Store one example recording of a gesture. Returns its id.
    pub fn save_gesture_example(&self, gesture: &str, frames: &[Frame]) -> Result<Uuid, StorageError> {
        validate_name(gesture)?;
        let record = StoredSequence {
            id: Uuid::new_v4(),
            name: gesture.to_string(),
            recorded_at: Utc::now(),
            frames: frames.to_vec(),
        };
        let path = self
            .gesture_dir(gesture)
            .join(format!("{}.json", record.id));
        write_json(&path, &record)?;
        debug!(gesture, id = %record.id, frames = frames.len(), "saved gesture example");
        Ok(record.id)
    }

    /// All stored examples of a gesture, oldest first.
    pub fn gesture_examples(&self, gesture: &str) -> Result<Vec<Vec<Frame>>, StorageError> {
        validate_name(gesture)?;
        let dir = self.gesture_dir(gesture);
        if !dir.is_dir() {
            return Err(StorageError::NotFound(gesture.to_string()));
        }

        let mut records: Vec<StoredSequence> = Vec::new();
        for path in json_files(&dir)? {
            records.push(read_json(&path)?);
        }
        records.sort_by_key(|r| r.recorded_at);
        Ok(records.into_iter().map(|r| r.frames).collect())
    }

    /// Names of every gesture with at least one stored example.
    pub fn list_gestures(&self) -> Result<Vec<String>, StorageError> {
        let dir = self.root.join("gestures");
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&dir).map_err(|e| io_error(&dir, e))?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&dir, e))?;
            if entry.path().is_dir() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn save_recording(&self, name: &str, frames: &[Frame]) -> Result<PathBuf, StorageError> {
        self.save(frames, name)
    }

    pub fn load_recording(&self, name: &str) -> Result<Vec<Frame>, StorageError> {
        self.load(name)
    }

    /// Store a trained profile for a gesture.
    pub fn save_profile<T: Serialize>(&self, gesture: &str, profile: &T) -> Result<PathBuf, StorageError> {
        validate_name(gesture)?;
        let path = self.profile_path(gesture);
        write_json(&path, profile)?;
        Ok(path)
    }

    pub fn load_profile<T: DeserializeOwned>(&self, gesture: &str) -> Result<T, StorageError> {
        validate_name(gesture)?;
        let path = self.profile_path(gesture);
        if !path.exists() {
            return Err(StorageError::NotFound(format!("profile '{gesture}'")));
        }
        read_json(&path)
    }

    fn gesture_dir(&self, gesture: &str) -> PathBuf {
        self.root.join("gestures").join(gesture)
    }

    fn recording_path(&self, name: &str) -> PathBuf {
        self.root.join("recordings").join(format!("{name}.json"))
    }

    fn profile_path(&self, gesture: &str) -> PathBuf {
        self.root.join("profiles").join(format!("{gesture}.json"))
    }
}

impl SequenceStore for FileStore {
    fn save(&self, frames: &[Frame], name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        let record = StoredSequence {
            id: Uuid::new_v4(),
            name: name.to_string(),
            recorded_at: Utc::now(),
            frames: frames.to_vec(),
        };
        let path = self.recording_path(name);
        write_json(&path, &record)?;
        Ok(path)
    }

    fn load(&self, name: &str) -> Result<Vec<Frame>, StorageError> {
        validate_name(name)?;
        let path = self.recording_path(name);
        if !path.exists() {
            return Err(StorageError::NotFound(format!("recording '{name}'")));
        }
        let record: StoredSequence = read_json(&path)?;
        Ok(record.frames)
    }
}

fn validate_name(name: &str) -> Result<(), StorageError> {
    let invalid = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.contains('\0');
    if invalid {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}

fn io_error(path: &Path, source: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.to_path_buf(),
        source,
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).map_err(|e| io_error(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StorageError> {
    let content = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

fn json_files(dir: &Path) -> Result<Vec<PathBuf>, StorageError> {
    let entries = std::fs::read_dir(dir).map_err(|e| io_error(dir, e))?;
    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| io_error(dir, e))?.path();
        if path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}
