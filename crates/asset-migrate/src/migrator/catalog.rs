//! Migrator catalog for explicit dependency injection.
//!
//! The [`MigratorCatalog`] is constructed explicitly and handed to the
//! orchestrator, which runs its migrators in registration order.
//! [`MigratorCatalog::with_builtins`] registers the enabled built-in
//! migrators in the fixed kind order, whatever order the config lists them in.

use std::sync::Arc;

use super::{
    AssetKind, AudioMigrator, MaterialMigrator, Migrator, ModelMigrator, PrefabMigrator,
    TextureMigrator,
};
use crate::config::Config;
use crate::resolve::ResolverTables;

/// Ordered list of migrators.
#[derive(Default, Clone)]
pub struct MigratorCatalog {
    migrators: Vec<Arc<dyn Migrator>>,
}

impl MigratorCatalog {
    /// Create a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the built-in migrators enabled in `config`.
    pub fn with_builtins(config: &Config) -> Self {
        let shaders = Arc::new(ResolverTables::shaders(&config.shaders));
        let materials = Arc::new(ResolverTables::materials(&config.shaders));
        let textures = Arc::new(ResolverTables::textures(&config.textures));

        let mut catalog = Self::new();
        for kind in AssetKind::ALL {
            if !config.migration.is_enabled(kind) {
                continue;
            }
            match kind {
                AssetKind::Texture => catalog.register(TextureMigrator::new()),
                AssetKind::Audio => catalog.register(AudioMigrator::new()),
                AssetKind::Material => catalog.register(MaterialMigrator::new(
                    Arc::clone(&shaders),
                    Arc::clone(&materials),
                    Arc::clone(&textures),
                )),
                AssetKind::Model => catalog.register(ModelMigrator::new(Arc::clone(&materials))),
                AssetKind::Prefab => catalog.register(PrefabMigrator::new(Arc::clone(&materials))),
            }
        }
        catalog
    }

    /// Append a migrator.
    pub fn register(&mut self, migrator: impl Migrator + 'static) {
        self.migrators.push(Arc::new(migrator));
    }

    /// Append a shared migrator.
    pub fn register_arc(&mut self, migrator: Arc<dyn Migrator>) {
        self.migrators.push(migrator);
    }

    pub fn migrators(&self) -> &[Arc<dyn Migrator>] {
        &self.migrators
    }

    pub fn kinds(&self) -> Vec<AssetKind> {
        self.migrators.iter().map(|m| m.kind()).collect()
    }

    pub fn get(&self, kind: AssetKind) -> Option<&Arc<dyn Migrator>> {
        self.migrators.iter().find(|m| m.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.migrators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.migrators.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_in_fixed_order() {
        let config = Config::for_projects("/a", "/b");
        let catalog = MigratorCatalog::with_builtins(&config);
        assert_eq!(catalog.kinds(), AssetKind::ALL.to_vec());
    }

    #[test]
    fn test_config_order_ignored() {
        let mut config = Config::for_projects("/a", "/b");
        config.migration.migrators = vec![AssetKind::Prefab, AssetKind::Texture, AssetKind::Material];
        let catalog = MigratorCatalog::with_builtins(&config);
        assert_eq!(
            catalog.kinds(),
            vec![AssetKind::Texture, AssetKind::Material, AssetKind::Prefab]
        );
        assert!(catalog.get(AssetKind::Audio).is_none());
        assert_eq!(catalog.len(), 3);
    }

    #[test]
    fn test_empty_catalog() {
        let catalog = MigratorCatalog::new();
        assert!(catalog.is_empty());
        assert!(catalog.kinds().is_empty());
    }
}
