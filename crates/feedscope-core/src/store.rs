// JSON file config store.
//
// The preference lives under the `currentTeam` key of a JSON object that
// other tools may also write to. Writes replace only that key and go through
// a temp file plus rename so readers never see a half-written file. Writes
// through one store are serialized, so the load-modify-rename cycles never
// interleave.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::collab::ConfigStore;
use crate::error::StoreError;
use crate::team::{CurrentTeamRecord, PersistedPreference};

pub const CURRENT_TEAM_KEY: &str = "currentTeam";

/// File name used under the home directory when no path is configured.
pub const DEFAULT_FILE_NAME: &str = ".feedscope.json";

/// `$HOME/.feedscope.json`, if a home directory can be determined.
pub fn default_preference_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|dirs| dirs.home_dir().join(DEFAULT_FILE_NAME))
}

/// Suffix counter for temp files, unique within the process.
static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct JsonFileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }

    /// Load the whole document. A missing or blank file is an empty object.
    async fn load(&self) -> Result<Map<String, Value>, StoreError> {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(self.io_error(e)),
        };
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }

        let value: Value = serde_json::from_str(&contents).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(StoreError::NotAnObject {
                path: self.path.clone(),
            }),
        }
    }

    /// `<name>.<pid>.<seq>.tmp` next to the target, so concurrent writers
    /// (other stores, other processes) never share a temp file.
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let seq = TEMP_SEQ.fetch_add(1, Ordering::Relaxed);
        name.push(format!(".{}.{}.tmp", std::process::id(), seq));
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl ConfigStore for JsonFileStore {
    async fn read(&self) -> Result<Option<PersistedPreference>, StoreError> {
        let mut doc = self.load().await?;
        let Some(value) = doc.remove(CURRENT_TEAM_KEY) else {
            return Ok(None);
        };
        // A `currentTeam` of the wrong shape reads as no preference.
        let record: CurrentTeamRecord = serde_json::from_value(value).unwrap_or_default();
        Ok(record.into_preference())
    }

    async fn write(&self, record: CurrentTeamRecord) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut doc = self.load().await?;
        let value = serde_json::to_value(&record).map_err(|source| StoreError::Parse {
            path: self.path.clone(),
            source,
        })?;
        doc.insert(CURRENT_TEAM_KEY.to_string(), value);

        let body = serde_json::to_string_pretty(&Value::Object(doc)).map_err(|source| {
            StoreError::Parse {
                path: self.path.clone(),
                source,
            }
        })?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        let tmp = self.temp_path();
        let written = match tokio::fs::write(&tmp, body).await {
            Ok(()) => tokio::fs::rename(&tmp, &self.path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove {}: {}", tmp.display(), cleanup);
                }
            }
            return Err(self.io_error(e));
        }

        debug!("Wrote {} to {}", CURRENT_TEAM_KEY, self.path.display());
        Ok(())
    }
}
