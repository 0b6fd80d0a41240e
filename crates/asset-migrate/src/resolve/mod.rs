//! Cross-asset reference resolution.
//!
//! A reference in a source asset is a `{fileID, guid}` pair. The resolver
//! maps it to a destination handle with a fixed precedence:
//!
//! 1. built-in id space (`guid` is one of the reserved built-in ids)
//! 2. user override table
//! 3. identifier registry
//! 4. configured fallback
//!
//! An unknown built-in id always falls back. A registry miss falls back only
//! outside a batch: inside one it reports `Unresolved` so the engine can
//! defer the item.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::config::{BuiltinEntry, ShaderConfig, TextureConfig};
use crate::registry::{DestinationHandle, IdentifierRegistry, SourceId};
use crate::sidecar::{SidecarError, SidecarNode};

/// Reserved source ids that denote built-in (non-file) assets.
pub const BUILTIN_IDS: [&str; 2] = [
    "0000000000000000f000000000000000",
    "0000000000000000e000000000000000",
];

/// A resolvable cross-asset reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Reference {
    /// Built-in asset, keyed by its file id.
    Builtin { file_id: i64 },
    /// Another source asset.
    Identifier(SourceId),
}

impl Reference {
    /// Read a `{fileID, guid}` mapping.
    ///
    /// Returns `None` for null references (`fileID: 0`) and for asset-local
    /// references, which carry no `guid`.
    pub fn from_node(node: &SidecarNode) -> Result<Option<Self>, SidecarError> {
        let file_id = node.child("fileID")?.as_i64()?;
        if file_id == 0 {
            return Ok(None);
        }
        let guid = match node.get("guid") {
            Some(guid) => guid.as_str()?.trim(),
            None => return Ok(None),
        };
        if guid.is_empty() {
            return Ok(None);
        }
        if BUILTIN_IDS.contains(&guid) {
            Ok(Some(Reference::Builtin { file_id }))
        } else {
            Ok(Some(Reference::Identifier(SourceId::from(guid))))
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Builtin { file_id } => write!(f, "builtin:{}", file_id),
            Reference::Identifier(id) => write!(f, "{}", id),
        }
    }
}

/// How a reference was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceOutcome {
    Builtin(DestinationHandle),
    UserOverride(DestinationHandle),
    Resolved(DestinationHandle),
    /// Not registered yet; only produced in batch scope.
    Unresolved,
    FallbackApplied(DestinationHandle),
}

impl ReferenceOutcome {
    /// The resolved handle, `None` for `Unresolved`.
    pub fn handle(&self) -> Option<DestinationHandle> {
        match *self {
            ReferenceOutcome::Builtin(h)
            | ReferenceOutcome::UserOverride(h)
            | ReferenceOutcome::Resolved(h)
            | ReferenceOutcome::FallbackApplied(h) => Some(h),
            ReferenceOutcome::Unresolved => None,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ReferenceOutcome::FallbackApplied(_))
    }
}

/// Context a reference is resolved in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveScope {
    /// Inside a dependency-ordered batch; a registry miss may still be
    /// satisfied later.
    Batch,
    /// One-shot lookup; a registry miss falls back.
    Standalone,
}

/// Remap tables consulted before the registry.
#[derive(Debug, Clone, Default)]
pub struct ResolverTables {
    builtin: HashMap<i64, DestinationHandle>,
    overrides: HashMap<SourceId, DestinationHandle>,
    fallback: DestinationHandle,
}

impl ResolverTables {
    pub fn new(fallback: DestinationHandle) -> Self {
        Self {
            fallback,
            ..Default::default()
        }
    }

    pub fn with_builtin(mut self, file_id: i64, target: DestinationHandle) -> Self {
        self.builtin.insert(file_id, target);
        self
    }

    pub fn with_override(mut self, id: impl Into<SourceId>, target: DestinationHandle) -> Self {
        self.overrides.insert(id.into(), target);
        self
    }

    /// Tables for shader references.
    pub fn shaders(config: &ShaderConfig) -> Self {
        Self::from_entries(config, &config.builtin)
    }

    /// Tables for material references: parents, model remaps and renderer
    /// slots. Built-in ids are material file ids, not shader ids.
    pub fn materials(config: &ShaderConfig) -> Self {
        Self::from_entries(config, &config.builtin_materials)
    }

    fn from_entries(config: &ShaderConfig, builtin: &[BuiltinEntry]) -> Self {
        let mut tables = Self::new(config.fallback);
        for entry in builtin {
            tables.builtin.insert(entry.file_id, entry.target);
        }
        for entry in &config.overrides {
            tables.overrides.insert(entry.guid.clone(), entry.target);
        }
        tables
    }

    /// Tables for texture references: no remaps, only the fallback.
    pub fn textures(config: &TextureConfig) -> Self {
        Self::new(config.fallback)
    }

    pub fn fallback(&self) -> DestinationHandle {
        self.fallback
    }
}

/// Resolves references against remap tables and the shared registry.
#[derive(Debug, Clone)]
pub struct ReferenceResolver {
    tables: Arc<ResolverTables>,
    registry: Arc<IdentifierRegistry>,
}

impl ReferenceResolver {
    pub fn new(tables: Arc<ResolverTables>, registry: Arc<IdentifierRegistry>) -> Self {
        Self { tables, registry }
    }

    pub fn tables(&self) -> &ResolverTables {
        &self.tables
    }

    pub fn resolve(&self, reference: &Reference, scope: ResolveScope) -> ReferenceOutcome {
        match reference {
            Reference::Builtin { file_id } => match self.tables.builtin.get(file_id) {
                Some(&handle) => ReferenceOutcome::Builtin(handle),
                None => self.fallback(reference),
            },
            Reference::Identifier(id) => {
                if let Some(&handle) = self.tables.overrides.get(id) {
                    return ReferenceOutcome::UserOverride(handle);
                }
                match (self.registry.resolve(id), scope) {
                    (Some(handle), _) => ReferenceOutcome::Resolved(handle),
                    (None, ResolveScope::Batch) => ReferenceOutcome::Unresolved,
                    (None, ResolveScope::Standalone) => self.fallback(reference),
                }
            }
        }
    }

    fn fallback(&self, reference: &Reference) -> ReferenceOutcome {
        let fallback = self.tables.fallback;
        warn!("No mapping for reference {}, using fallback {}", reference, fallback);
        ReferenceOutcome::FallbackApplied(fallback)
    }
}
