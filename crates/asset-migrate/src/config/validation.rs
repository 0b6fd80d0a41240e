//! Configuration validation.

use std::collections::HashSet;

use globset::Glob;

use super::Config;
use crate::error::{MigrateError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.project.as_os_str().is_empty() {
        return Err(MigrateError::Config("source.project is required".into()));
    }
    if config.source.assets_dir.trim().is_empty() {
        return Err(MigrateError::Config("source.assets_dir must not be empty".into()));
    }
    let ext = &config.source.sidecar_extension;
    if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
        return Err(MigrateError::Config(format!(
            "source.sidecar_extension must be a bare extension like 'meta', got '{}'",
            ext
        )));
    }

    // Target validation
    if config.target.project.as_os_str().is_empty() {
        return Err(MigrateError::Config("target.project is required".into()));
    }

    // Migration config validation
    if config.migration.max_iterations == 0 {
        return Err(MigrateError::Config(
            "migration.max_iterations must be at least 1".into(),
        ));
    }
    if config.migration.migrators.is_empty() {
        return Err(MigrateError::Config(
            "migration.migrators must enable at least one migrator".into(),
        ));
    }
    for pattern in &config.migration.exclude_assets {
        Glob::new(pattern).map_err(|e| {
            MigrateError::Config(format!(
                "migration.exclude_assets: invalid pattern '{}': {}",
                pattern, e
            ))
        })?;
    }

    // Remap tables
    for (table, entries) in [
        ("shaders.builtin", &config.shaders.builtin),
        ("shaders.builtin_materials", &config.shaders.builtin_materials),
    ] {
        let mut file_ids = HashSet::new();
        for entry in entries {
            if !file_ids.insert(entry.file_id) {
                return Err(MigrateError::Config(format!(
                    "{}: duplicate file_id {}",
                    table, entry.file_id
                )));
            }
        }
    }
    let mut guids = HashSet::new();
    for entry in &config.shaders.overrides {
        if entry.guid.as_str().trim().is_empty() {
            return Err(MigrateError::Config(
                "shaders.overrides: guid must not be empty".into(),
            ));
        }
        if !guids.insert(entry.guid.as_str()) {
            return Err(MigrateError::Config(format!(
                "shaders.overrides: duplicate guid {}",
                entry.guid
            )));
        }
    }

    Ok(())
}
