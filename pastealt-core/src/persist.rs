//! Durable storage for the history sequence and the settings object.
//!
//! The two records live in separate JSON files and are each overwritten in
//! full on every relevant mutation.

use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{
        Mutex, PoisonError,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::warn;

use crate::{item::ClipboardItem, settings::Settings};

/// Upper bound for `settings.json`; the file is expected to be tiny.
pub const MAX_SETTINGS_BYTES: u64 = 64 * 1024;
/// Upper bound for `history.json`, which embeds image payloads.
pub const MAX_HISTORY_BYTES: u64 = 512 * 1024 * 1024;

const HISTORY_FILE: &str = "history.json";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("no stored record")]
    Missing,
    #[error("metadata read failed: {0}")]
    Metadata(#[source] io::Error),
    #[error("file too large: {size} bytes (max {max})")]
    TooLarge { size: u64, max: u64 },
    #[error("read failed: {0}")]
    Read(#[source] io::Error),
    #[error("parse failed: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("serialize failed: {0}")]
    Serialize(#[source] serde_json::Error),
    #[error("tmp write failed: {0}")]
    WriteTmp(#[source] io::Error),
    #[error("rename failed: {0}")]
    Rename(#[source] io::Error),
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

pub trait Persistence: Send + Sync {
    fn load_history(&self) -> Result<Vec<ClipboardItem>, PersistError>;
    fn save_history(&self, items: &[ClipboardItem]) -> Result<(), PersistError>;
    fn load_settings(&self) -> Result<Settings, PersistError>;
    fn save_settings(&self, settings: &Settings) -> Result<(), PersistError>;
}

/// JSON files in a data directory, written atomically via tmp + rename.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn history_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE)
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    fn ensure_dir(&self) -> Result<(), PersistError> {
        fs::create_dir_all(&self.dir).map_err(PersistError::WriteTmp)
    }
}

impl Persistence for JsonFileStore {
    fn load_history(&self) -> Result<Vec<ClipboardItem>, PersistError> {
        load_json_from_path(&self.history_path(), MAX_HISTORY_BYTES)
    }

    fn save_history(&self, items: &[ClipboardItem]) -> Result<(), PersistError> {
        self.ensure_dir()?;
        save_json_with_retry(&self.history_path(), items)
    }

    fn load_settings(&self) -> Result<Settings, PersistError> {
        load_json_from_path(&self.settings_path(), MAX_SETTINGS_BYTES)
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), PersistError> {
        self.ensure_dir()?;
        save_json_with_retry(&self.settings_path(), settings)
    }
}

/// Reads `path`, falling back to a finished `.json.tmp` sibling left behind
/// by a write that stopped before its rename.
pub fn load_json_from_path<T: DeserializeOwned>(path: &Path, max: u64) -> Result<T, PersistError> {
    match read_json(path, max) {
        Err(PersistError::Missing) => {
            let tmp = tmp_path(path);
            let value = read_json(&tmp, max)?;
            warn!(path = %tmp.display(), "recovered record from interrupted write");
            Ok(value)
        }
        other => other,
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

fn read_json<T: DeserializeOwned>(path: &Path, max: u64) -> Result<T, PersistError> {
    let meta = match fs::metadata(path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(PersistError::Missing),
        Err(err) => return Err(PersistError::Metadata(err)),
    };
    if meta.len() > max {
        return Err(PersistError::TooLarge {
            size: meta.len(),
            max,
        });
    }

    let data = fs::read_to_string(path).map_err(PersistError::Read)?;
    serde_json::from_str(&data).map_err(PersistError::Parse)
}

pub fn save_json_to_path<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), PersistError> {
    let tmp = tmp_path(path);
    let payload = serde_json::to_vec(value).map_err(PersistError::Serialize)?;
    fs::write(&tmp, &payload).map_err(PersistError::WriteTmp)?;
    // rename replaces the target in one step; the old record stays readable
    // until the new one is in place.
    fs::rename(&tmp, path).map_err(PersistError::Rename)?;
    Ok(())
}

pub fn save_json_with_retry<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), PersistError> {
    const MAX_ATTEMPTS: u32 = 3;
    const BACKOFF_BASE_MS: u64 = 50;

    let mut attempt = 1;
    loop {
        match save_json_to_path(path, value) {
            Ok(()) => return Ok(()),
            // Serialization is deterministic; retrying cannot help.
            Err(err @ PersistError::Serialize(_)) => return Err(err),
            Err(err) if attempt >= MAX_ATTEMPTS => return Err(err),
            Err(_) => {
                let backoff_ms = BACKOFF_BASE_MS.saturating_mul(1_u64 << (attempt - 1));
                std::thread::sleep(Duration::from_millis(backoff_ms));
                attempt += 1;
            }
        }
    }
}

/// In-process storage that still goes through JSON, so round-trips exercise
/// the same serialization as the file store.
#[derive(Debug, Default)]
pub struct MemoryPersistence {
    history: Mutex<Option<Vec<u8>>>,
    settings: Mutex<Option<Vec<u8>>>,
    fail_writes: AtomicBool,
    history_writes: AtomicUsize,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent save fail, for exercising fail-soft paths.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn history_writes(&self) -> usize {
        self.history_writes.load(Ordering::SeqCst)
    }

    /// Overwrites the stored history with arbitrary bytes.
    pub fn put_raw_history(&self, bytes: &[u8]) {
        *self.history.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes.to_vec());
    }

    fn load<T: DeserializeOwned>(slot: &Mutex<Option<Vec<u8>>>) -> Result<T, PersistError> {
        let guard = slot.lock().unwrap_or_else(PoisonError::into_inner);
        let bytes = guard.as_ref().ok_or(PersistError::Missing)?;
        serde_json::from_slice(bytes).map_err(PersistError::Parse)
    }

    fn save<T: Serialize + ?Sized>(
        &self,
        slot: &Mutex<Option<Vec<u8>>>,
        value: &T,
    ) -> Result<(), PersistError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(PersistError::Unavailable("writes disabled".to_owned()));
        }
        let bytes = serde_json::to_vec(value).map_err(PersistError::Serialize)?;
        *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(bytes);
        Ok(())
    }
}

impl Persistence for MemoryPersistence {
    fn load_history(&self) -> Result<Vec<ClipboardItem>, PersistError> {
        Self::load(&self.history)
    }

    fn save_history(&self, items: &[ClipboardItem]) -> Result<(), PersistError> {
        self.save(&self.history, items)?;
        self.history_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn load_settings(&self) -> Result<Settings, PersistError> {
        Self::load(&self.settings)
    }

    fn save_settings(&self, settings: &Settings) -> Result<(), PersistError> {
        self.save(&self.settings, settings)
    }
}
