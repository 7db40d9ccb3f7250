use crate::types::{EventLog, EventRecord};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::debug;

const MAX_API_KEY_LEN: usize = 128;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("unable to access the data file ({}): {source}", .path.display())]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("unable to decode events from the data file ({}): {source}", .path.display())]
    Encoding {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid API key: {reason}")]
    InvalidKey { reason: &'static str },
}

/// File-backed event logs, one JSON file per API key.
///
/// A single lock guards every read-modify-write cycle across all keys, so
/// concurrent appends never lose updates and reads never see a partial file.
pub struct EventLogStore {
    data_dir: PathBuf,
    max_events: Option<usize>,
    lock: Mutex<()>,
}

impl EventLogStore {
    /// `max_events` of `None` or `Some(0)` keeps every event.
    pub fn new(data_dir: impl Into<PathBuf>, max_events: Option<usize>) -> Self {
        Self {
            data_dir: data_dir.into(),
            max_events,
            lock: Mutex::new(()),
        }
    }

    /// Record a raw notification at the head of the key's log and return the
    /// persisted log.
    pub fn append(&self, api_key: &str, raw_payload: &[u8]) -> Result<EventLog, EventLogError> {
        let path = self.log_path(api_key)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut events = load_or_create(&path)?;
        events.insert(0, EventRecord::from_raw(raw_payload));
        if let Some(max) = self.retention() {
            events.truncate(max);
        }
        persist(&path, &events)?;

        debug!(path = %path.display(), count = events.len(), "event log persisted");
        Ok(events)
    }

    /// Current log for the key. Creates an empty log file on first access.
    pub fn list(&self, api_key: &str) -> Result<EventLog, EventLogError> {
        let path = self.log_path(api_key)?;
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        load_or_create(&path)
    }

    /// Path of the key's log file. Keys are restricted to ASCII letters,
    /// digits, `-` and `_` so they can never escape the data directory.
    pub fn log_path(&self, api_key: &str) -> Result<PathBuf, EventLogError> {
        validate_api_key(api_key)?;
        Ok(self.data_dir.join(format!("events_{api_key}.json")))
    }

    fn retention(&self) -> Option<usize> {
        self.max_events.filter(|max| *max > 0)
    }
}

fn validate_api_key(api_key: &str) -> Result<(), EventLogError> {
    if api_key.is_empty() {
        return Err(EventLogError::InvalidKey {
            reason: "key is empty",
        });
    }
    if api_key.len() > MAX_API_KEY_LEN {
        return Err(EventLogError::InvalidKey {
            reason: "key is longer than 128 characters",
        });
    }
    if !api_key
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(EventLogError::InvalidKey {
            reason: "key may only contain ASCII letters, digits, '-' and '_'",
        });
    }
    Ok(())
}

fn load_or_create(path: &Path) -> Result<EventLog, EventLogError> {
    let content = match fs::read(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            create_empty(path)?;
            return Ok(EventLog::new());
        }
        Err(e) => return Err(storage_error(path, e)),
    };

    serde_json::from_slice(&content).map_err(|source| EventLogError::Encoding {
        path: path.to_path_buf(),
        source,
    })
}

fn create_empty(path: &Path) -> Result<(), EventLogError> {
    let mut file = fs::File::create(path).map_err(|e| storage_error(path, e))?;
    file.write_all(b"[]").map_err(|e| storage_error(path, e))?;
    debug!(path = %path.display(), "created event log file");
    Ok(())
}

/// Write the log to a sibling temp file and rename it over the target,
/// carrying over the target's permission bits.
fn persist(path: &Path, events: &EventLog) -> Result<(), EventLogError> {
    let content = serde_json::to_vec(events).map_err(|source| EventLogError::Encoding {
        path: path.to_path_buf(),
        source,
    })?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    let permissions = fs::metadata(path)
        .map_err(|e| storage_error(path, e))?
        .permissions();

    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| storage_error(path, e))?;
    tmp.write_all(&content).map_err(|e| storage_error(path, e))?;
    tmp.as_file()
        .set_permissions(permissions)
        .map_err(|e| storage_error(path, e))?;
    tmp.as_file().sync_all().map_err(|e| storage_error(path, e))?;
    tmp.persist(path).map_err(|e| storage_error(path, e.error))?;
    Ok(())
}

fn storage_error(path: &Path, source: io::Error) -> EventLogError {
    EventLogError::Storage {
        path: path.to_path_buf(),
        source,
    }
}
