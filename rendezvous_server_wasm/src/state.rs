//! Server state management for the rendezvous relay
//!
//! This module owns the room registry and the storage it lives in. Every
//! signaling operation runs as one critical section over the registry, so
//! concurrent requests for the same room never interleave.
//!
//! Rooms are only shared between requests that reach the same
//! [`ServerState`]. Several independent instances of the server each get
//! their own in-memory registry unless they are pointed at a shared state
//! file with [`ServerConfig::state_file`].

use crate::config::ServerConfig;
use crate::error::SignalingError;
use crate::room::Room;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Room identifier
#[derive(Debug, Default, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(pub String);

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Mapping from room identifier to room state.
///
/// Holds at most one [`Room`] per identifier. Rooms come into existence
/// through [`RoomRegistry::get_or_create`] and leave through
/// [`RoomRegistry::delete`].
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
}

impl RoomRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Existing room for `room_id`, or a freshly inserted empty one
    pub fn get_or_create(&mut self, room_id: &RoomId) -> &mut Room {
        self.rooms.entry(room_id.clone()).or_insert_with(|| {
            info!("Creating new room: {}", room_id);
            Room::new()
        })
    }

    /// Existing room for `room_id` without creating one
    pub fn get_mut(&mut self, room_id: &RoomId) -> Option<&mut Room> {
        self.rooms.get_mut(room_id)
    }

    /// Remove the room if present
    pub fn delete(&mut self, room_id: &RoomId) {
        if self.rooms.remove(room_id).is_some() {
            info!("Deleted empty room: {}", room_id);
        }
    }

    /// Whether a room exists for `room_id`
    pub fn contains(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id)
    }

    /// Room for `room_id`, if any
    pub fn get(&self, room_id: &RoomId) -> Option<&Room> {
        self.rooms.get(room_id)
    }

    /// Number of live rooms
    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    /// Whether no rooms exist
    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// Where the registry lives between requests
enum Store {
    /// Registry held in process memory
    Memory(Mutex<RoomRegistry>),
    /// Registry serialized to a JSON file, reloaded for every operation
    File { path: PathBuf, lock: Mutex<()> },
}

impl Store {
    /// Run `f` against the registry. For the file store the registry is only
    /// written back when `f` succeeds, and never after a failed load.
    fn transact<T>(
        &self,
        f: impl FnOnce(&mut RoomRegistry) -> Result<T, SignalingError>,
    ) -> Result<T, SignalingError> {
        match self {
            Self::Memory(registry) => {
                let mut registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
                f(&mut registry)
            }
            Self::File { path, lock } => {
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                let mut registry = load_registry(path)?;
                let result = f(&mut registry)?;
                save_registry(path, &registry)?;
                Ok(result)
            }
        }
    }

    /// Read-only access; the file store is loaded but not rewritten
    fn view<T>(&self, f: impl FnOnce(&RoomRegistry) -> T) -> Result<T, SignalingError> {
        match self {
            Self::Memory(registry) => {
                let registry = registry.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(f(&registry))
            }
            Self::File { path, lock } => {
                let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
                Ok(f(&load_registry(path)?))
            }
        }
    }
}

fn storage_error(action: &str, path: &Path, err: impl fmt::Display) -> SignalingError {
    let err = SignalingError::Storage(format!("{action} {}: {err}", path.display()));
    warn!("{}", err);
    err
}

/// Load the registry from file. A missing file is an empty registry.
fn load_registry(path: &Path) -> Result<RoomRegistry, SignalingError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            serde_json::from_str(&contents).map_err(|e| storage_error("failed to parse", path, e))
        }
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(RoomRegistry::default()),
        Err(e) => Err(storage_error("failed to read", path, e)),
    }
}

/// Save the registry through a uniquely named temporary file in the same
/// directory, so readers never see a partial write.
fn save_registry(path: &Path, registry: &RoomRegistry) -> Result<(), SignalingError> {
    let json = serde_json::to_vec(registry)
        .map_err(|e| storage_error("failed to serialize", path, e))?;

    let dir = path
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp =
        NamedTempFile::new_in(dir).map_err(|e| storage_error("failed to stage", path, e))?;
    tmp.write_all(&json)
        .map_err(|e| storage_error("failed to write", path, e))?;
    tmp.persist(path)
        .map_err(|e| storage_error("failed to replace", path, e.error))?;
    Ok(())
}

struct Inner {
    store: Store,
    config: ServerConfig,
}

/// The main server state handle.
///
/// Cheap to clone; clones share the same registry.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<Inner>,
}

impl Default for ServerState {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerState {
    /// In-memory state with the default configuration
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// State built from `config`
    pub fn with_config(config: ServerConfig) -> Self {
        let store = match &config.state_file {
            Some(path) => {
                debug!("Using shared state file {}", path.display());
                Store::File {
                    path: path.clone(),
                    lock: Mutex::new(()),
                }
            }
            None => Store::Memory(Mutex::new(RoomRegistry::new())),
        };

        Self {
            inner: Arc::new(Inner { store, config }),
        }
    }

    /// Configuration this state was built with
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Run `f` with exclusive access to the registry.
    ///
    /// Fails with [`SignalingError::Storage`] if the backing store cannot be
    /// loaded or written; in that case nothing `f` did is kept.
    pub(crate) fn transact<T>(
        &self,
        f: impl FnOnce(&mut RoomRegistry) -> Result<T, SignalingError>,
    ) -> Result<T, SignalingError> {
        self.inner.store.transact(f)
    }

    /// Whether a room currently exists for `room_id`
    pub fn has_room(&self, room_id: &RoomId) -> Result<bool, SignalingError> {
        self.inner.store.view(|rooms| rooms.contains(room_id))
    }

    /// Number of live rooms
    pub fn room_count(&self) -> Result<usize, SignalingError> {
        self.inner.store.view(RoomRegistry::len)
    }

    /// Snapshot of the room for `room_id`
    pub fn room_snapshot(&self, room_id: &RoomId) -> Result<Option<Room>, SignalingError> {
        self.inner.store.view(|rooms| rooms.get(room_id).cloned())
    }
}
