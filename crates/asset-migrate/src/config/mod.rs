//! Configuration loading and validation.

mod types;
mod validation;

pub use types::*;

use std::path::{Component, Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{MigrateError, Result};

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Configuration with default settings for the given projects.
    pub fn for_projects(source: impl Into<PathBuf>, target: impl Into<PathBuf>) -> Self {
        Self {
            source: SourceConfig {
                project: source.into(),
                assets_dir: "Assets".to_string(),
                sidecar_extension: "meta".to_string(),
            },
            target: TargetConfig {
                project: target.into(),
                destination: PathBuf::from("Content/Migrated"),
            },
            migration: MigrationConfig::default(),
            shaders: ShaderConfig::default(),
            textures: TextureConfig::default(),
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// Compute a SHA256 hash of the configuration for snapshot validation.
    pub fn hash(&self) -> String {
        let yaml = serde_yaml::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(yaml.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Resolve and check the project paths. Nothing is created here.
    pub fn project_paths(&self) -> Result<ProjectPaths> {
        let source_project = absolute(&self.source.project)?;
        let assets_root = source_project.join(&self.source.assets_dir);
        if !assets_root.is_dir() {
            return Err(MigrateError::Validation(format!(
                "source project {} has no '{}' folder",
                source_project.display(),
                self.source.assets_dir
            )));
        }

        let target_project = absolute(&self.target.project)?;
        if !target_project.is_dir() {
            return Err(MigrateError::Validation(format!(
                "target project {} does not exist",
                target_project.display()
            )));
        }

        let destination_root = normalize(&target_project.join(&self.target.destination));
        if !destination_root.starts_with(&target_project) {
            return Err(MigrateError::Validation(format!(
                "destination {} is outside the target project {}",
                destination_root.display(),
                target_project.display()
            )));
        }
        if destination_root.starts_with(&assets_root) {
            return Err(MigrateError::Validation(format!(
                "destination {} is inside the source asset folder",
                destination_root.display()
            )));
        }

        Ok(ProjectPaths {
            assets_root,
            target_project,
            destination_root,
        })
    }
}

/// Checked locations of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectPaths {
    /// `<source project>/<assets_dir>`.
    pub assets_root: PathBuf,
    pub target_project: PathBuf,
    /// Folder every migrated asset lands under.
    pub destination_root: PathBuf,
}

/// `path` joined onto the working directory when relative, then normalized.
fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(normalize(path))
    } else {
        Ok(normalize(&std::env::current_dir()?.join(path)))
    }
}

/// Lexically resolve `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.components().next_back() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                // `..` above the root stays at the root.
                Some(Component::RootDir | Component::Prefix(_)) => {}
                _ => out.push(".."),
            },
            other => out.push(other.as_os_str()),
        }
    }
    if out.as_os_str().is_empty() {
        out.push(".");
    }
    out
}
