use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine::atomic_io::write_text_atomic;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gameplay::{MemoryKey, MemoryStore};

pub const MEMORY_STORE_VERSION: u32 = 1;
pub const MEMORY_STORE_FILE: &str = "memory.json";

#[derive(Debug, Error)]
pub enum MemoryStoreError {
    #[error("failed to read memory store '{path}': {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("parse memory store '{path}'{at}: {message}")]
    Parse {
        path: PathBuf,
        at: String,
        message: String,
    },
    #[error("memory store '{path}' has version {found}, expected {}", MEMORY_STORE_VERSION)]
    UnsupportedVersion { path: PathBuf, found: u32 },
    #[error("memory store '{path}' has malformed key '{key}'; expected 'checkpoint:index'")]
    InvalidKey { path: PathBuf, key: String },
    #[error("failed to encode memory store: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to create save directory '{path}': {source}")]
    CreateDir { path: PathBuf, source: io::Error },
    #[error("failed to write memory store '{path}': {source}")]
    Write { path: PathBuf, source: io::Error },
}

#[derive(Debug, Serialize, Deserialize)]
struct MemoryFile {
    version: u32,
    level_fingerprint: String,
    entries: BTreeMap<String, bool>,
}

/// Per-checkpoint "has seen the player" flags, persisted as JSON next to other saves.
#[derive(Debug)]
pub struct JsonMemoryStore {
    path: PathBuf,
    fingerprint: String,
    entries: BTreeMap<MemoryKey, bool>,
    dirty: bool,
}

impl JsonMemoryStore {
    /// Opens the store at `path` for the level identified by `fingerprint`. A missing
    /// file, or one recorded against a different level, starts empty.
    pub fn open(
        path: impl Into<PathBuf>,
        fingerprint: impl Into<String>,
    ) -> Result<Self, MemoryStoreError> {
        let path = path.into();
        let fingerprint = fingerprint.into();
        let mut store = Self {
            path,
            fingerprint,
            entries: BTreeMap::new(),
            dirty: false,
        };

        let raw = match fs::read_to_string(&store.path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!(path = %store.path.display(), "memory_store_missing");
                return Ok(store);
            }
            Err(source) => {
                return Err(MemoryStoreError::Read {
                    path: store.path,
                    source,
                })
            }
        };

        let file = parse_memory_file(&store.path, &raw)?;
        if file.version != MEMORY_STORE_VERSION {
            return Err(MemoryStoreError::UnsupportedVersion {
                path: store.path,
                found: file.version,
            });
        }
        if file.level_fingerprint != store.fingerprint {
            warn!(
                path = %store.path.display(),
                stored = %file.level_fingerprint,
                expected = %store.fingerprint,
                "memory_store_discarded_level_changed"
            );
            return Ok(store);
        }

        for (raw_key, has_player_memory) in file.entries {
            let Some(key) = MemoryKey::parse(&raw_key) else {
                return Err(MemoryStoreError::InvalidKey {
                    path: store.path,
                    key: raw_key,
                });
            };
            store.entries.insert(key, has_player_memory);
        }
        info!(
            path = %store.path.display(),
            entries = store.entries.len(),
            "memory_store_loaded"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl MemoryStore for JsonMemoryStore {
    fn recall(&self, key: MemoryKey) -> bool {
        self.entries.get(&key).copied().unwrap_or(false)
    }

    fn remember(&mut self, key: MemoryKey, has_player_memory: bool) {
        if self.entries.insert(key, has_player_memory) != Some(has_player_memory) {
            self.dirty = true;
        }
    }

    fn flush(&mut self) -> Result<(), MemoryStoreError> {
        if !self.dirty {
            return Ok(());
        }
        let file = MemoryFile {
            version: MEMORY_STORE_VERSION,
            level_fingerprint: self.fingerprint.clone(),
            entries: self
                .entries
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect(),
        };
        let json = serde_json::to_string_pretty(&file)?;

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| MemoryStoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        write_text_atomic(&self.path, &json).map_err(|source| MemoryStoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        self.dirty = false;
        info!(
            path = %self.path.display(),
            entries = self.entries.len(),
            "memory_store_saved"
        );
        Ok(())
    }
}

fn parse_memory_file(path: &Path, raw: &str) -> Result<MemoryFile, MemoryStoreError> {
    let mut deserializer = serde_json::Deserializer::from_str(raw);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|error| {
        let at = error.path().to_string();
        MemoryStoreError::Parse {
            path: path.to_path_buf(),
            at: if at.is_empty() || at == "." {
                String::new()
            } else {
                format!(" at {at}")
            },
            message: error.into_inner().to_string(),
        }
    })
}
