//! In-memory mosaic store used in place of the map server.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use mosaic_common::{
    decode, GranuleRecord, GranuleSelection, MosaicError, MosaicResult, MosaicStore,
};

use crate::generators::granule_name;

/// A call observed by the store, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List {
        layer: String,
        selection: Option<String>,
    },
    Delete {
        layer: String,
        id: String,
    },
    Publish {
        layer: String,
        filename: String,
    },
}

#[derive(Default)]
struct State {
    layers: BTreeMap<String, Vec<GranuleRecord>>,
    next_id: u64,
    calls: Vec<StoreCall>,
    index_timeout: bool,
    failing_deletes: HashSet<String>,
    rejected_publishes: HashSet<String>,
}

impl State {
    fn insert(&mut self, layer: &str, location: String) -> String {
        self.next_id += 1;
        let id = format!("{}.{}", layer, self.next_id);
        self.layers
            .entry(layer.to_string())
            .or_default()
            .push(GranuleRecord::new(id.clone(), location));
        id
    }
}

/// Mosaic store backed by a map of layers to index records.
///
/// Selections are evaluated locally by decoding each record's location;
/// records whose names do not decode never match a selection, the same way
/// the map server never indexes them with a time.
#[derive(Default)]
pub struct InMemoryMosaicStore {
    state: Mutex<State>,
}

impl InMemoryMosaicStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with granules of `layer` at `timestamps`.
    pub fn with_granules(layer: &str, timestamps: &[DateTime<Utc>]) -> Self {
        let store = Self::new();
        for ts in timestamps {
            store.insert(layer, *ts);
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Index a granule at `ts`, returning its id.
    pub fn insert(&self, layer: &str, ts: DateTime<Utc>) -> String {
        self.lock().insert(layer, granule_name(layer, ts))
    }

    /// Index a record with an arbitrary location, returning its id.
    pub fn insert_location(&self, layer: &str, location: &str) -> String {
        self.lock().insert(layer, location.to_string())
    }

    /// Make every index query report a timeout.
    pub fn simulate_index_timeout(&self, enabled: bool) {
        self.lock().index_timeout = enabled;
    }

    /// Make deleting the granule with `id` fail.
    pub fn fail_delete(&self, id: &str) {
        self.lock().failing_deletes.insert(id.to_string());
    }

    /// Make publishing to `layer` fail as if its store could not be created.
    pub fn reject_publishes(&self, layer: &str) {
        self.lock().rejected_publishes.insert(layer.to_string());
    }

    pub fn records(&self, layer: &str) -> Vec<GranuleRecord> {
        self.lock().layers.get(layer).cloned().unwrap_or_default()
    }

    /// Decoded timestamps of `layer`, sorted.
    pub fn timestamps(&self, layer: &str) -> Vec<DateTime<Utc>> {
        let mut timestamps: Vec<_> = self
            .records(layer)
            .iter()
            .filter_map(|r| decode(&r.location).ok())
            .collect();
        timestamps.sort();
        timestamps
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.lock().calls.clone()
    }

    pub fn deleted_ids(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                StoreCall::Delete { id, .. } => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }
}

#[async_trait]
impl MosaicStore for InMemoryMosaicStore {
    async fn list_granules(
        &self,
        layer: &str,
        selection: Option<&GranuleSelection>,
    ) -> MosaicResult<Vec<GranuleRecord>> {
        let mut state = self.lock();
        state.calls.push(StoreCall::List {
            layer: layer.to_string(),
            selection: selection.map(|s| s.to_string()),
        });

        if state.index_timeout {
            return Err(MosaicError::IndexQueryTimeout {
                layer: layer.to_string(),
            });
        }

        let records = state.layers.get(layer).cloned().unwrap_or_default();
        Ok(match selection {
            None => records,
            Some(selection) => records
                .into_iter()
                .filter(|r| decode(&r.location).map_or(false, |ts| selection.matches(ts)))
                .collect(),
        })
    }

    async fn delete_granule(&self, layer: &str, id: &str) -> MosaicResult<()> {
        let mut state = self.lock();
        state.calls.push(StoreCall::Delete {
            layer: layer.to_string(),
            id: id.to_string(),
        });

        let failure = |message: &str| MosaicError::RemoteDeleteFailure {
            layer: layer.to_string(),
            id: id.to_string(),
            message: message.to_string(),
        };

        if state.failing_deletes.contains(id) {
            return Err(failure("500 Internal Server Error"));
        }

        let records = state
            .layers
            .get_mut(layer)
            .ok_or_else(|| failure("404 Not Found"))?;
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Err(failure("404 Not Found"));
        }
        Ok(())
    }

    async fn publish_granule(&self, layer: &str, path: &Path) -> MosaicResult<()> {
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| MosaicError::Upload {
                layer: layer.to_string(),
                message: format!("not a file path: {}", path.display()),
            })?;

        let mut state = self.lock();
        state.calls.push(StoreCall::Publish {
            layer: layer.to_string(),
            filename: filename.clone(),
        });

        if state.rejected_publishes.contains(layer) {
            return Err(MosaicError::UploadConflict {
                layer: layer.to_string(),
            });
        }

        let exists = state
            .layers
            .get(layer)
            .map_or(false, |records| records.iter().any(|r| r.location == filename));
        if !exists {
            state.insert(layer, filename);
        }
        Ok(())
    }
}
