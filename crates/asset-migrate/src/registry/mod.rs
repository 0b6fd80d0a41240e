//! Identifier registry: source identifiers to destination handles.
//!
//! The registry is the only state shared between migrators. A migrator
//! registers an asset once the content store has confirmed its creation, and
//! any later migrator (or a later item of the same batch) can resolve it.

pub mod snapshot;

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use snapshot::RegistrySnapshot;

/// Stable identifier of a source asset, read from its sidecar `guid`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceId(String);

impl SourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SourceId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SourceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Opaque id of an asset in the target project, issued by the content store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationHandle(Uuid);

impl DestinationHandle {
    /// A fresh random handle.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// The handle that refers to no asset.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Fixed handle for a well-known target asset.
    pub const fn from_u128(id: u128) -> Self {
        Self(Uuid::from_u128(id))
    }

    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for DestinationHandle {
    fn default() -> Self {
        Self::nil()
    }
}

impl From<Uuid> for DestinationHandle {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for DestinationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DestinationHandle {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Run-scoped `SourceId -> DestinationHandle` map.
#[derive(Debug, Default)]
pub struct IdentifierRegistry {
    entries: RwLock<HashMap<SourceId, DestinationHandle>>,
}

impl IdentifierRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // Every write is a single map operation, so a poisoned map is still whole.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<SourceId, DestinationHandle>> {
        self.entries.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<SourceId, DestinationHandle>> {
        self.entries.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Insert or overwrite a mapping. Returns the handle it replaced.
    pub fn register(&self, id: SourceId, handle: DestinationHandle) -> Option<DestinationHandle> {
        let previous = self.write().insert(id.clone(), handle);
        if let Some(old) = previous {
            if old != handle {
                tracing::debug!("Registry entry {} replaced ({} -> {})", id, old, handle);
            }
        }
        previous
    }

    /// Look up a mapping. `None` means the id has not been registered.
    pub fn resolve(&self, id: &SourceId) -> Option<DestinationHandle> {
        self.read().get(id).copied()
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Drop every mapping. Called at the start of each run.
    pub fn clear(&self) {
        self.write().clear();
    }

    /// Sorted copy of all mappings.
    pub fn snapshot(&self) -> BTreeMap<SourceId, DestinationHandle> {
        self.read()
            .iter()
            .map(|(id, handle)| (id.clone(), *handle))
            .collect()
    }

    /// Replace the contents with previously saved mappings.
    pub fn restore<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (SourceId, DestinationHandle)>,
    {
        let mut map = self.write();
        map.clear();
        map.extend(entries);
    }
}
