// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The persisted parameter store.
//!
//! One serialized file per processing run holds everything the engine needs
//! to decide "has this chunk/cycle already been computed": per-chunk results,
//! self-calibration progress and the final stacked-image record. Keys are
//! structured (`{beam, chunk, field}`) and only rendered to strings at the
//! file boundary. Writes merge per key under a lock, so parallel chunk
//! workers never clobber each other's entries.

mod error;

pub use error::StoreError;

use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Mutex,
};

use indexmap::IndexMap;
use log::debug;
use serde::{de::DeserializeOwned, Serialize};
use strum_macros::{Display, EnumString};

/// The fields a [`StoreKey`] can address.
#[derive(Debug, Display, EnumString, Clone, Copy, PartialEq, Eq)]
pub enum StoreField {
    /// A chunk's final [`ChunkResult`](crate::selfcal::ChunkResult).
    #[strum(serialize = "result")]
    ChunkResult,

    /// The last self-calibration major cycle a chunk completed.
    #[strum(serialize = "selfcal_cycle")]
    SelfCalCycle,

    /// The beam's final [`StackedImage`](crate::stacking::StackedImage)
    /// record.
    #[strum(serialize = "stacked")]
    StackedImage,
}

/// A structured store key: beam, optional chunk, field. Chunk-level entries
/// of different chunks are disjoint by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreKey {
    pub beam: u8,
    pub chunk: Option<usize>,
    pub field: StoreField,
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.chunk {
            Some(chunk) => write!(f, "B{:02}_c{:02}_{}", self.beam, chunk, self.field),
            None => write!(f, "B{:02}_{}", self.beam, self.field),
        }
    }
}

/// A persisted key-value store backed by a single JSON file. Survives
/// process restarts; the sole source of truth for idempotence checks.
#[derive(Debug)]
pub struct ParamStore {
    path: PathBuf,
    entries: Mutex<IndexMap<String, serde_json::Value>>,
}

impl ParamStore {
    /// Open the store at `path`, loading existing entries if the file is
    /// already there.
    pub fn open(path: &Path) -> Result<ParamStore, StoreError> {
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents)?
        } else {
            IndexMap::new()
        };
        Ok(ParamStore {
            path: path.to_path_buf(),
            entries: Mutex::new(entries),
        })
    }

    pub fn has(&self, key: StoreKey) -> bool {
        self.entries
            .lock()
            .expect("store lock not poisoned")
            .contains_key(&key.to_string())
    }

    pub fn get<T: DeserializeOwned>(&self, key: StoreKey) -> Result<T, StoreError> {
        let entries = self.entries.lock().expect("store lock not poisoned");
        let value = entries
            .get(&key.to_string())
            .ok_or_else(|| StoreError::KeyNotFound(key.to_string()))?;
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Set one key, leaving every other entry untouched, and flush the whole
    /// store to disk before returning.
    pub fn set<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().expect("store lock not poisoned");
        entries.insert(key.to_string(), serde_json::to_value(value)?);
        debug!("Store: set {key}");
        let contents = serde_json::to_string_pretty(&*entries)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}
