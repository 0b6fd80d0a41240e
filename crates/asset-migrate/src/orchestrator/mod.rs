//! Migration orchestrator - main workflow coordinator.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::config::{Config, ProjectPaths};
use crate::content::ContentStore;
use crate::error::{MigrateError, Result};
use crate::migrator::{
    Anomaly, AssetKind, MigrationContext, MigratorCatalog, MigratorReport, Severity,
};
use crate::registry::{IdentifierRegistry, RegistrySnapshot};

/// Migration orchestrator.
pub struct Orchestrator {
    config: Config,
    store: Arc<dyn ContentStore>,
    catalog: MigratorCatalog,
    registry: Arc<IdentifierRegistry>,
    registry_file: Option<PathBuf>,
    incremental: bool,
}

/// Final state of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithAnomalies,
    Cancelled,
}

/// Per-migrator counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigratorSummary {
    pub kind: AssetKind,
    pub discovered: usize,
    pub migrated: usize,
    pub skipped: usize,
    pub anomalies: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
}

impl From<&MigratorReport> for MigratorSummary {
    fn from(report: &MigratorReport) -> Self {
        Self {
            kind: report.kind,
            discovered: report.discovered,
            migrated: report.migrated.len(),
            skipped: report.skipped(),
            anomalies: report.anomalies.len(),
            iterations: report.iterations,
        }
    }
}

/// Result of a migration run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: RunStatus,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    /// When the migration started.
    pub started_at: DateTime<Utc>,

    /// When the migration completed.
    pub completed_at: DateTime<Utc>,

    /// Assets found across all migrators.
    pub assets_discovered: usize,

    /// Assets created in the target project.
    pub assets_migrated: usize,

    /// Per-migrator counts, in run order.
    pub migrators: Vec<MigratorSummary>,

    /// Every anomaly of the run, in the order it was recorded.
    pub anomalies: Vec<Anomaly>,

    pub has_anomalies: bool,

    /// Migrators not run because the run was cancelled.
    pub skipped_migrators: Vec<AssetKind>,
}

impl MigrationResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn error_count(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| a.severity() == Severity::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.anomalies.len() - self.error_count()
    }
}

/// What a migrator would handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedMigrator {
    pub kind: AssetKind,
    pub assets: usize,
    /// Assets without a sidecar; these would be skipped.
    pub missing_sidecars: usize,
}

/// Dry enumeration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub source_root: PathBuf,
    pub destination_root: PathBuf,
    pub migrators: Vec<PlannedMigrator>,
}

impl MigrationPlan {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn total_assets(&self) -> usize {
        self.migrators.iter().map(|m| m.assets).sum()
    }
}

impl Orchestrator {
    /// Create an orchestrator with the built-in migrators enabled in `config`.
    pub fn new(config: Config, store: Arc<dyn ContentStore>) -> Self {
        let catalog = MigratorCatalog::with_builtins(&config);
        let registry_file = config.migration.registry_file.clone();
        Self {
            config,
            store,
            catalog,
            registry: Arc::new(IdentifierRegistry::new()),
            registry_file,
            incremental: false,
        }
    }

    /// Replace the migrator catalog.
    pub fn with_catalog(mut self, catalog: MigratorCatalog) -> Self {
        self.catalog = catalog;
        self
    }

    /// Set the registry snapshot file, overriding the config.
    pub fn with_registry_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.registry_file = Some(path.into());
        self
    }

    /// Start from the registry snapshot instead of an empty registry.
    pub fn incremental(mut self, incremental: bool) -> Self {
        self.incremental = incremental;
        self
    }

    /// The registry shared by the migrators of this orchestrator.
    pub fn registry(&self) -> Arc<IdentifierRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn context(&self) -> MigrationContext {
        MigrationContext::from_config(&self.config, Arc::clone(&self.store), self.registry())
    }

    /// Enumerate what each migrator would handle. Nothing is written.
    pub fn plan(&self) -> Result<MigrationPlan> {
        let paths = self.config.project_paths()?;
        let ctx = self.context();

        let mut migrators = Vec::with_capacity(self.catalog.len());
        for migrator in self.catalog.migrators() {
            let assets = migrator.discover(&ctx, &paths.assets_root, &paths.destination_root)?;
            migrators.push(PlannedMigrator {
                kind: migrator.kind(),
                assets: assets.len(),
                missing_sidecars: assets.iter().filter(|a| !a.has_sidecar()).count(),
            });
        }

        Ok(MigrationPlan {
            source_root: paths.assets_root,
            destination_root: paths.destination_root,
            migrators,
        })
    }

    /// Run the migration.
    pub async fn run(&self, cancel: Option<CancellationToken>) -> Result<MigrationResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        let cancel = cancel.unwrap_or_default();

        info!("Starting migration run: {}", run_id);

        // Phase 1: Validate paths
        let paths = self.config.project_paths()?;
        info!(
            "Phase 1: Migrating {} into {} (store: {})",
            paths.assets_root.display(),
            paths.destination_root.display(),
            self.store.store_type()
        );

        // Phase 2: Prepare registry and destination
        self.prepare_registry()?;
        self.store.ensure_folder(&paths.destination_root).await?;

        // Phase 3: Run migrators
        info!("Phase 3: Running {} migrators", self.catalog.len());
        let (reports, skipped) = self.run_migrators(&paths, &cancel).await;

        // Phase 4: Persist the registry
        let mut run_anomalies = Vec::new();
        if let Some(path) = &self.registry_file {
            let mut snapshot = RegistrySnapshot::capture(&run_id, self.config.hash(), &self.registry);
            match snapshot.save(path) {
                Ok(()) => info!(
                    "Saved {} registry entries to {}",
                    snapshot.entries.len(),
                    path.display()
                ),
                Err(e) => {
                    error!("Failed to save registry to {}: {}", path.display(), e);
                    run_anomalies.push(Anomaly::RegistryNotSaved {
                        path: path.clone(),
                        message: e.to_string(),
                    });
                }
            }
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;

        let anomalies: Vec<Anomaly> = reports
            .iter()
            .flat_map(|r| r.anomalies.iter().cloned())
            .chain(run_anomalies)
            .collect();
        let has_anomalies = !anomalies.is_empty();
        let status = if !skipped.is_empty() {
            RunStatus::Cancelled
        } else if has_anomalies {
            RunStatus::CompletedWithAnomalies
        } else {
            RunStatus::Completed
        };

        let result = MigrationResult {
            run_id,
            status,
            duration_seconds: duration,
            started_at,
            completed_at,
            assets_discovered: reports.iter().map(|r| r.discovered).sum(),
            assets_migrated: reports.iter().map(|r| r.migrated.len()).sum(),
            migrators: reports.iter().map(MigratorSummary::from).collect(),
            anomalies,
            has_anomalies,
            skipped_migrators: skipped,
        };

        info!(
            "Migration {:?}: {}/{} assets in {:.2}s, {} anomalies",
            result.status,
            result.assets_migrated,
            result.assets_discovered,
            result.duration_seconds,
            result.anomalies.len()
        );

        Ok(result)
    }

    fn prepare_registry(&self) -> Result<()> {
        self.registry.clear();
        if !self.incremental {
            return Ok(());
        }

        let path = self.registry_file.as_ref().ok_or_else(|| {
            MigrateError::Config("incremental runs need a registry file".to_string())
        })?;
        if !path.exists() {
            warn!(
                "Registry file {} not found, starting with an empty registry",
                path.display()
            );
            return Ok(());
        }

        let snapshot = RegistrySnapshot::load(path)?;
        snapshot.validate_config(&self.config.hash())?;
        snapshot.restore_into(&self.registry);
        info!(
            "Restored {} registry entries from run {}",
            snapshot.entries.len(),
            snapshot.run_id
        );
        Ok(())
    }

    async fn run_migrators(
        &self,
        paths: &ProjectPaths,
        cancel: &CancellationToken,
    ) -> (Vec<MigratorReport>, Vec<AssetKind>) {
        let ctx = self.context();
        let mut reports = Vec::with_capacity(self.catalog.len());
        let mut skipped = Vec::new();

        for migrator in self.catalog.migrators() {
            let kind = migrator.kind();
            if cancel.is_cancelled() {
                skipped.push(kind);
                continue;
            }

            info!("Running {} migrator", kind);
            let outcome = AssertUnwindSafe(migrator.migrate(
                &ctx,
                &paths.assets_root,
                &paths.destination_root,
            ))
            .catch_unwind()
            .await;

            let report = match outcome {
                Ok(Ok(report)) => report,
                Ok(Err(e)) => failed_report(kind, e.to_string()),
                Err(panic) => failed_report(kind, panic_message(panic.as_ref())),
            };
            info!(
                "{} migrator: {}/{} migrated, {} anomalies",
                kind,
                report.migrated.len(),
                report.discovered,
                report.anomalies.len()
            );
            reports.push(report);
        }

        if !skipped.is_empty() {
            warn!("Run cancelled, skipped migrators: {:?}", skipped);
        }
        (reports, skipped)
    }
}

fn failed_report(kind: AssetKind, message: String) -> MigratorReport {
    error!("{} migrator failed: {}", kind, message);
    let mut report = MigratorReport::new(kind);
    report.anomalies.push(Anomaly::MigratorFailed {
        migrator: kind,
        message,
    });
    report
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::config::STANDARD_MATERIAL;
    use crate::content::{AssetSettings, InMemoryContentStore};
    use crate::migrator::{MaterialMigrator, Migrator, TextureMigrator};
    use crate::resolve::ResolverTables;

    struct Projects {
        dir: TempDir,
    }

    impl Projects {
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            std::fs::create_dir_all(dir.path().join("src/Assets")).unwrap();
            std::fs::create_dir_all(dir.path().join("dst")).unwrap();
            Self { dir }
        }

        fn config(&self) -> Config {
            Config::for_projects(self.dir.path().join("src"), self.dir.path().join("dst"))
        }

        fn add(&self, relative: &str, content: &str, meta: Option<&str>) {
            let path = self.dir.path().join("src/Assets").join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, content).unwrap();
            if let Some(meta) = meta {
                std::fs::write(format!("{}.meta", path.display()), meta).unwrap();
            }
        }
    }

    fn texture_meta(guid: &str) -> String {
        format!(
            "fileFormatVersion: 2\nguid: {}\nTextureImporter:\n  mipmaps:\n    sRGBTexture: 1\n    enableMipMap: 1\n  textureType: 0\n  alphaUsage: 0\n",
            guid
        )
    }

    fn sample_project() -> Projects {
        let projects = Projects::new();
        projects.add("Textures/wall.png", "png", Some(&texture_meta("1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a")));
        projects.add("Textures/no_meta.png", "png", None);
        projects.add(
            "Audio/hit.wav",
            "riff",
            Some("fileFormatVersion: 2\nguid: 2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b2b\nAudioImporter:\n  3D: 1\n"),
        );
        projects.add(
            "Materials/Wall.mat",
            "%YAML 1.1\n%TAG !u! tag:unity3d.com,2011:\n--- !u!21 &2100000\nMaterial:\n  m_Name: Wall\n  m_Shader: {fileID: 46, guid: 0000000000000000f000000000000000, type: 0}\n  m_SavedProperties:\n    m_TexEnvs:\n    - _MainTex:\n        m_Texture: {fileID: 2800000, guid: 1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a, type: 3}\n",
            Some("fileFormatVersion: 2\nguid: 3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c\n"),
        );
        projects
    }

    #[tokio::test]
    async fn test_missing_sidecar_is_skipped_and_flagged() {
        let projects = sample_project();
        let store = Arc::new(InMemoryContentStore::new());
        let orchestrator = Orchestrator::new(projects.config(), store.clone());

        let result = orchestrator.run(None).await.unwrap();

        assert_eq!(result.status, RunStatus::CompletedWithAnomalies);
        assert!(result.has_anomalies);
        assert_eq!(result.anomalies.len(), 1);
        assert!(matches!(
            &result.anomalies[0],
            Anomaly::MissingMetadata { asset, .. } if asset == "Textures/no_meta.png"
        ));
        assert_eq!(result.assets_discovered, 4);
        assert_eq!(result.assets_migrated, 3);
        assert_eq!(orchestrator.registry().len(), 3);

        let kinds: Vec<_> = result.migrators.iter().map(|m| m.kind).collect();
        assert_eq!(kinds, AssetKind::ALL.to_vec());

        // The material sees the texture registered by the earlier migrator.
        let wall_texture = orchestrator
            .registry()
            .resolve(&"1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a1a".into())
            .unwrap();
        let material = store
            .find_by_destination(&projects.config().project_paths().unwrap().destination_root.join("Materials/Wall.mat"))
            .await
            .unwrap();
        assert_eq!(material.base, Some(STANDARD_MATERIAL));
        assert_eq!(
            material.parameters["_MainTex"],
            crate::content::ParameterValue::Texture(wall_texture)
        );
    }

    #[tokio::test]
    async fn test_invalid_paths_touch_nothing() {
        let projects = Projects::new();
        let mut config = projects.config();
        config.target.destination = PathBuf::from("../../elsewhere");
        let store = Arc::new(InMemoryContentStore::new());

        let err = Orchestrator::new(config, store.clone())
            .run(None)
            .await
            .unwrap_err();

        assert!(matches!(err, MigrateError::Validation(_)));
        assert!(store.folders().await.is_empty());
    }

    #[tokio::test]
    async fn test_cancelled_before_start_skips_everything() {
        let projects = sample_project();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = Orchestrator::new(projects.config(), Arc::new(InMemoryContentStore::new()))
            .run(Some(cancel))
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Cancelled);
        assert_eq!(result.skipped_migrators, AssetKind::ALL.to_vec());
        assert!(result.migrators.is_empty());
    }

    struct PanickingMigrator;

    #[async_trait]
    impl Migrator for PanickingMigrator {
        fn kind(&self) -> AssetKind {
            AssetKind::Audio
        }

        fn handled_extensions(&self) -> &'static [&'static str] {
            &["*.wav"]
        }

        async fn migrate(
            &self,
            _ctx: &MigrationContext,
            _source_root: &Path,
            _destination_root: &Path,
        ) -> Result<MigratorReport> {
            panic!("decoder exploded");
        }
    }

    #[tokio::test]
    async fn test_panicking_migrator_does_not_stop_run() {
        let projects = sample_project();
        let mut catalog = MigratorCatalog::new();
        catalog.register(PanickingMigrator);
        catalog.register(TextureMigrator::new());

        let result = Orchestrator::new(projects.config(), Arc::new(InMemoryContentStore::new()))
            .with_catalog(catalog)
            .run(None)
            .await
            .unwrap();

        assert_eq!(result.migrators.len(), 2);
        assert!(matches!(
            &result.anomalies[0],
            Anomaly::MigratorFailed { message, .. } if message.contains("decoder exploded")
        ));
        assert_eq!(result.migrators[1].migrated, 1);
        assert_eq!(result.error_count(), 2);
    }

    #[tokio::test]
    async fn test_registry_snapshot_and_incremental_run() {
        let projects = sample_project();
        let registry_file = projects.dir.path().join("state/registry.json");

        Orchestrator::new(projects.config(), Arc::new(InMemoryContentStore::new()))
            .with_registry_file(&registry_file)
            .run(None)
            .await
            .unwrap();
        assert!(registry_file.exists());

        // Only materials run the second time; their texture comes from the snapshot.
        let config = projects.config();
        let mut catalog = MigratorCatalog::new();
        catalog.register(MaterialMigrator::new(
            Arc::new(ResolverTables::shaders(&config.shaders)),
            Arc::new(ResolverTables::materials(&config.shaders)),
            Arc::new(ResolverTables::textures(&config.textures)),
        ));
        let store = Arc::new(InMemoryContentStore::new());
        let result = Orchestrator::new(config, store.clone())
            .with_catalog(catalog)
            .with_registry_file(&registry_file)
            .incremental(true)
            .run(None)
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::Completed);
        let assets = store.assets().await;
        assert_eq!(assets.len(), 1);
        assert!(matches!(assets[0].settings, AssetSettings::MaterialInstance));
        assert!(assets[0].parameters.contains_key("_MainTex"));

        let mut changed = projects.config();
        changed.migration.max_iterations = 10;
        let err = Orchestrator::new(changed, Arc::new(InMemoryContentStore::new()))
            .with_registry_file(&registry_file)
            .incremental(true)
            .run(None)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::ConfigChanged));
    }

    #[tokio::test]
    async fn test_registry_save_failure_keeps_result() {
        let projects = sample_project();
        let blocker = projects.dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let store = Arc::new(InMemoryContentStore::new());
        let result = Orchestrator::new(projects.config(), store.clone())
            .with_registry_file(blocker.join("registry.json"))
            .run(None)
            .await
            .unwrap();

        assert_eq!(result.status, RunStatus::CompletedWithAnomalies);
        assert!(result.assets_migrated > 0);
        assert_eq!(store.assets().await.len(), result.assets_migrated);
        match result.anomalies.last() {
            Some(Anomaly::RegistryNotSaved { path, .. }) => {
                assert_eq!(path, &blocker.join("registry.json"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(result.anomalies.last().unwrap().migrator().is_none());
    }

    #[tokio::test]
    async fn test_incremental_requires_registry_file() {
        let projects = sample_project();
        let err = Orchestrator::new(projects.config(), Arc::new(InMemoryContentStore::new()))
            .incremental(true)
            .run(None)
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::Config(_)));
    }

    #[test]
    fn test_plan_counts() {
        let projects = sample_project();
        let plan = Orchestrator::new(projects.config(), Arc::new(InMemoryContentStore::new()))
            .plan()
            .unwrap();

        assert_eq!(plan.total_assets(), 4);
        let texture = &plan.migrators[0];
        assert_eq!(texture.kind, AssetKind::Texture);
        assert_eq!(texture.assets, 2);
        assert_eq!(texture.missing_sidecars, 1);
        assert!(plan.destination_root.ends_with("Content/Migrated"));
    }
}
