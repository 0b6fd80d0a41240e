//! Starter configuration file.

use std::path::Path;

use asset_migrate::{Config, MigrateError};

const HEADER: &str = "\
# asset-migrate configuration
#
# source.project    project holding the asset folder (source.assets_dir)
# target.project    project to migrate into
# target.destination  folder inside the target project for migrated assets
#
# Relative project paths are taken from the working directory.
#
# shaders.builtin maps built-in shader file ids to target materials,
# shaders.builtin_materials maps built-in material file ids to target materials,
# shaders.overrides maps shader and material guids to target materials.
";

/// Write a default configuration to `output`.
pub fn write_config(output: &Path, force: bool) -> Result<(), MigrateError> {
    if output.exists() && !force {
        return Err(MigrateError::Config(format!(
            "{} already exists (use --force to overwrite)",
            output.display()
        )));
    }

    let config = Config::for_projects("../SourceProject", "../TargetProject");
    let content = format!("{}\n{}", HEADER, serde_yaml::to_string(&config)?);

    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_written_config_loads() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrate.yaml");
        write_config(&path, false).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.source.assets_dir, "Assets");
        assert_eq!(config.migration.max_iterations, 50_000);
    }

    #[test]
    fn test_existing_file_needs_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("migrate.yaml");
        std::fs::write(&path, "keep me").unwrap();

        assert!(matches!(
            write_config(&path, false),
            Err(MigrateError::Config(_))
        ));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "keep me");

        write_config(&path, true).unwrap();
        assert!(Config::load(&path).is_ok());
    }
}
