//! # asset-migrate
//!
//! Dependency-ordered migration of sidecar-described asset trees.
//!
//! Every source asset `X.ext` is paired with a YAML sidecar `X.ext.meta`
//! holding its import settings and a stable source id. This library
//! translates such a tree into a target project while preserving the
//! references between assets:
//!
//! - **Migrators** per asset kind (texture, audio, material, model, prefab)
//!   running in a fixed order
//! - **Identifier registry** mapping source ids to created target assets
//! - **Resolution engine** that defers assets whose in-batch dependency is
//!   not translated yet, bounded by an iteration ceiling
//! - **Reference resolver** with built-in, override, registry and fallback
//!   lookups
//! - **Registry snapshots** for incremental runs
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use asset_migrate::{Config, FsContentStore, Orchestrator};
//!
//! #[tokio::main]
//! async fn main() -> asset_migrate::Result<()> {
//!     let config = Config::load("migrate.yaml")?;
//!     let paths = config.project_paths()?;
//!     let store = Arc::new(FsContentStore::new(paths.target_project));
//!     let result = Orchestrator::new(config, store).run(None).await?;
//!     println!("Migrated {} assets", result.assets_migrated);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod content;
pub mod engine;
pub mod error;
pub mod migrator;
pub mod orchestrator;
pub mod registry;
pub mod resolve;
pub mod sidecar;

// Re-exports for convenient access
pub use config::{Config, MigrationConfig, ProjectPaths, ShaderConfig, SourceConfig, TargetConfig};
pub use content::{ContentStore, FsContentStore, InMemoryContentStore};
pub use engine::{BatchStep, ResolutionEngine};
pub use error::{MigrateError, Result};
pub use migrator::{Anomaly, AssetKind, Migrator, MigratorCatalog, MigratorReport};
pub use orchestrator::{MigrationPlan, MigrationResult, Orchestrator, RunStatus};
pub use registry::{DestinationHandle, IdentifierRegistry, RegistrySnapshot, SourceId};
pub use resolve::{Reference, ReferenceOutcome, ReferenceResolver};
pub use sidecar::{SidecarError, SidecarNode};
