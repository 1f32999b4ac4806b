use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use super::conversation_state::{Message, StoredMessage};

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("history is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Durable storage for the ordered message list.
///
/// Neither operation fails from the caller's point of view: a broken or
/// missing history loads as empty, and a failed save leaves the
/// conversation running in memory.
pub trait HistoryStore: Send + Sync {
    fn load(&self) -> Vec<StoredMessage>;

    fn save(&self, messages: &[Message]);
}

pub fn encode_history(messages: &[Message]) -> Result<String, HistoryError> {
    let stored: Vec<StoredMessage> = messages.iter().map(StoredMessage::from).collect();
    Ok(serde_json::to_string(&stored)?)
}

pub fn decode_history(raw: &str) -> Result<Vec<StoredMessage>, HistoryError> {
    Ok(serde_json::from_str(raw)?)
}

/// History kept in a single JSON file.
pub struct FileHistoryStore {
    path: PathBuf,
}

impl FileHistoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load(&self) -> Result<Vec<StoredMessage>, HistoryError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(HistoryError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        decode_history(&raw)
    }

    fn try_save(&self, messages: &[Message]) -> Result<(), HistoryError> {
        let contents = encode_history(messages)?;
        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }

        // Write beside the target and rename over it so readers never see
        // a half-written file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        Ok(())
    }
}

impl HistoryStore for FileHistoryStore {
    fn load(&self) -> Vec<StoredMessage> {
        match self.try_load() {
            Ok(messages) => {
                debug!("Loaded {} messages from {}", messages.len(), self.path.display());
                messages
            }
            Err(e) => {
                warn!("Ignoring unreadable chat history: {}", e);
                Vec::new()
            }
        }
    }

    fn save(&self, messages: &[Message]) {
        if let Err(e) = self.try_save(messages) {
            warn!("Failed to save chat history: {}", e);
        }
    }
}
