//! Migrator contract and the built-in per-kind migrators.
//!
//! A [`Migrator`] handles one asset kind: it enumerates matching files under
//! the source root, reads their sidecars, asks the content store to create
//! the target assets and registers every created asset in the shared
//! identifier registry. Per-asset problems become [`Anomaly`] entries in the
//! returned [`MigratorReport`]; only failures that stop the whole migrator
//! are returned as errors.

mod audio;
mod catalog;
pub mod discovery;
mod material;
mod model;
mod prefab;
pub mod report;
mod texture;

pub use audio::AudioMigrator;
pub use catalog::MigratorCatalog;
pub use discovery::{AssetDescriptor, Discovery};
pub use material::MaterialMigrator;
pub use model::ModelMigrator;
pub use prefab::PrefabMigrator;
pub use report::{Anomaly, MigratedAsset, MigratorReport, Severity, UnresolvedAsset};
pub use texture::TextureMigrator;

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::content::{AssetSettings, ContentStore, CreateAssetRequest};
use crate::engine::DEFAULT_MAX_ITERATIONS;
use crate::error::Result;
use crate::registry::IdentifierRegistry;
use crate::resolve::{Reference, ReferenceOutcome};

/// Asset kinds, in the order their migrators run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    Texture,
    Audio,
    Material,
    Model,
    Prefab,
}

impl AssetKind {
    pub const ALL: [AssetKind; 5] = [
        AssetKind::Texture,
        AssetKind::Audio,
        AssetKind::Material,
        AssetKind::Model,
        AssetKind::Prefab,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Texture => "texture",
            AssetKind::Audio => "audio",
            AssetKind::Material => "material",
            AssetKind::Model => "model",
            AssetKind::Prefab => "prefab",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Services and settings shared by every migrator of a run.
#[derive(Clone)]
pub struct MigrationContext {
    pub store: Arc<dyn ContentStore>,
    pub registry: Arc<IdentifierRegistry>,
    /// Sidecar extension without the dot.
    pub sidecar_extension: String,
    /// Paths to skip, as globs relative to the source root.
    pub exclude: Vec<String>,
    /// Ceiling for dependency-ordered batches.
    pub max_iterations: usize,
}

impl MigrationContext {
    pub fn new(store: Arc<dyn ContentStore>, registry: Arc<IdentifierRegistry>) -> Self {
        Self {
            store,
            registry,
            sidecar_extension: "meta".to_string(),
            exclude: Vec::new(),
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn from_config(
        config: &Config,
        store: Arc<dyn ContentStore>,
        registry: Arc<IdentifierRegistry>,
    ) -> Self {
        Self {
            store,
            registry,
            sidecar_extension: config.source.sidecar_extension.clone(),
            exclude: config.migration.exclude_assets.clone(),
            max_iterations: config.migration.max_iterations,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// File finder for the given name patterns.
    pub fn discovery(&self, patterns: &[&str]) -> Result<Discovery> {
        Discovery::new(patterns, &self.exclude, &self.sidecar_extension)
    }
}

/// Translates one asset kind.
#[async_trait]
pub trait Migrator: Send + Sync {
    fn kind(&self) -> AssetKind;

    /// File-name glob patterns, matched case-insensitively.
    fn handled_extensions(&self) -> &'static [&'static str];

    /// Migrate every matching asset under `source_root`.
    async fn migrate(
        &self,
        ctx: &MigrationContext,
        source_root: &Path,
        destination_root: &Path,
    ) -> Result<MigratorReport>;

    /// Files this migrator would handle.
    fn discover(
        &self,
        ctx: &MigrationContext,
        source_root: &Path,
        destination_root: &Path,
    ) -> Result<Vec<AssetDescriptor>> {
        ctx.discovery(self.handled_extensions())?
            .scan(source_root, destination_root)
    }
}

/// Create one asset per descriptor, registering each after creation.
///
/// `settings_for` reads the sidecar and builds the import settings; it may
/// record warnings on the report.
pub(crate) async fn import_each<F>(
    kind: AssetKind,
    ctx: &MigrationContext,
    assets: Vec<AssetDescriptor>,
    mut settings_for: F,
) -> MigratorReport
where
    F: FnMut(&mut AssetDescriptor, &mut MigratorReport) -> Result<AssetSettings> + Send,
{
    let mut report = MigratorReport::new(kind);
    report.discovered = assets.len();

    for mut asset in assets {
        let label = asset.label();
        let source_id = match asset.source_id() {
            Ok(id) => id,
            Err(e) => {
                report.record_error(label, &e);
                continue;
            }
        };
        let settings = match settings_for(&mut asset, &mut report) {
            Ok(settings) => settings,
            Err(e) => {
                report.record_error(label, &e);
                continue;
            }
        };

        let request = CreateAssetRequest {
            source: Some(asset.source().to_path_buf()),
            destination: asset.destination().to_path_buf(),
            settings,
        };
        let handle = match ctx.store.create_asset(&request).await {
            Ok(handle) => handle,
            Err(e) => {
                report.record_error(label, &e);
                continue;
            }
        };

        ctx.registry.register(source_id.clone(), handle);
        debug!("{} {} -> {}", kind, label, handle);
        report.record_success(MigratedAsset {
            asset: label,
            source_id,
            destination: request.destination,
            handle,
        });
    }

    report
}

/// Record a `FallbackApplied` anomaly when the outcome is a fallback.
pub(crate) fn note_fallback(
    report: &mut MigratorReport,
    asset: &str,
    reference: &Reference,
    outcome: ReferenceOutcome,
) {
    if let ReferenceOutcome::FallbackApplied(fallback) = outcome {
        report.record(Anomaly::FallbackApplied {
            migrator: report.kind,
            asset: asset.to_string(),
            reference: reference.to_string(),
            fallback,
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Fixtures for migrator tests.

    use std::path::{Path, PathBuf};
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::MigrationContext;
    use crate::content::InMemoryContentStore;
    use crate::registry::IdentifierRegistry;

    pub struct Fixture {
        pub dir: TempDir,
        pub store: Arc<InMemoryContentStore>,
        pub ctx: MigrationContext,
    }

    impl Fixture {
        pub fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir_all(dir.path().join("Assets")).unwrap();
            let store = Arc::new(InMemoryContentStore::new());
            let ctx = MigrationContext::new(store.clone(), Arc::new(IdentifierRegistry::new()));
            Self { dir, store, ctx }
        }

        pub fn assets(&self) -> PathBuf {
            self.dir.path().join("Assets")
        }

        pub fn destination(&self) -> PathBuf {
            self.dir.path().join("Out")
        }

        /// Write `<relative>` and, when given, its `.meta` sidecar.
        pub fn add(&self, relative: &str, content: &str, meta: Option<&str>) {
            let path = self.assets().join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
            if let Some(meta) = meta {
                std::fs::write(sidecar(&path), meta).unwrap();
            }
        }
    }

    fn sidecar(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".meta");
        PathBuf::from(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_order_and_names() {
        let mut kinds = AssetKind::ALL.to_vec();
        kinds.reverse();
        kinds.sort();
        assert_eq!(kinds, AssetKind::ALL.to_vec());
        assert_eq!(AssetKind::Material.to_string(), "material");
        assert_eq!(
            serde_json::to_string(&AssetKind::Prefab).unwrap(),
            "\"prefab\""
        );
    }
}
