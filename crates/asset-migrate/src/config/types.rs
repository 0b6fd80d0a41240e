//! Configuration type definitions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::migrator::AssetKind;
use crate::registry::{DestinationHandle, SourceId};

/// Handle of the stock `Standard` material the target project ships with.
pub const STANDARD_MATERIAL: DestinationHandle =
    DestinationHandle::from_u128(0x5374_616e_6461_7264_0000_0000_0000_0046);

/// File id of the built-in `Standard` shader in the source engine.
pub const STANDARD_SHADER_FILE_ID: i64 = 46;

/// File id of the built-in `Default-Material` in the source engine.
pub const DEFAULT_MATERIAL_FILE_ID: i64 = 10303;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source project layout.
    pub source: SourceConfig,

    /// Target project layout.
    pub target: TargetConfig,

    /// Migration behavior configuration.
    #[serde(default)]
    pub migration: MigrationConfig,

    /// Shader-to-material remapping tables.
    #[serde(default)]
    pub shaders: ShaderConfig,

    #[serde(default)]
    pub textures: TextureConfig,
}

/// Source project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source project directory.
    pub project: PathBuf,

    /// Asset folder inside the project (default: "Assets").
    #[serde(default = "default_assets_dir")]
    pub assets_dir: String,

    /// Sidecar file extension, without the dot (default: "meta").
    #[serde(default = "default_sidecar_extension")]
    pub sidecar_extension: String,
}

/// Target project configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Target project directory.
    pub project: PathBuf,

    /// Destination folder, relative to the target project
    /// (default: "Content/Migrated").
    #[serde(default = "default_destination")]
    pub destination: PathBuf,
}

/// Migration behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Iteration ceiling of every dependency-ordered batch (default: 50000).
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Enabled migrators. They always run in the fixed kind order.
    #[serde(default = "default_migrators")]
    pub migrators: Vec<AssetKind>,

    /// Asset paths to skip (glob patterns, relative to the asset folder).
    #[serde(default)]
    pub exclude_assets: Vec<String>,

    /// Where to write the registry snapshot after a run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry_file: Option<PathBuf>,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            max_iterations: default_max_iterations(),
            migrators: default_migrators(),
            exclude_assets: Vec::new(),
            registry_file: None,
        }
    }
}

impl MigrationConfig {
    pub fn is_enabled(&self, kind: AssetKind) -> bool {
        self.migrators.contains(&kind)
    }
}

/// Built-in shader or material id to target material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuiltinEntry {
    pub file_id: i64,
    /// User-facing name of the built-in asset.
    #[serde(default)]
    pub name: String,
    pub target: DestinationHandle,
}

/// Shader source id to target material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderOverrideEntry {
    pub guid: SourceId,
    #[serde(default)]
    pub name: String,
    pub target: DestinationHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShaderConfig {
    /// Material used when a shader has no mapping.
    #[serde(default = "default_material")]
    pub fallback: DestinationHandle,

    /// Built-in shaders, keyed by shader file id.
    #[serde(default = "default_builtin_shaders")]
    pub builtin: Vec<BuiltinEntry>,

    /// Built-in materials, keyed by material file id. Material parents,
    /// model remaps and renderer slots reference these.
    #[serde(default = "default_builtin_materials")]
    pub builtin_materials: Vec<BuiltinEntry>,

    #[serde(default)]
    pub overrides: Vec<ShaderOverrideEntry>,
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            fallback: default_material(),
            builtin: default_builtin_shaders(),
            builtin_materials: default_builtin_materials(),
            overrides: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TextureConfig {
    /// Texture used when a texture reference cannot be resolved. The nil
    /// handle leaves the parameter unset.
    #[serde(default)]
    pub fallback: DestinationHandle,
}

// Default value functions for serde
fn default_assets_dir() -> String {
    "Assets".to_string()
}

fn default_sidecar_extension() -> String {
    "meta".to_string()
}

fn default_destination() -> PathBuf {
    PathBuf::from("Content/Migrated")
}

fn default_max_iterations() -> usize {
    50_000
}

fn default_migrators() -> Vec<AssetKind> {
    AssetKind::ALL.to_vec()
}

fn default_material() -> DestinationHandle {
    STANDARD_MATERIAL
}

fn default_builtin_shaders() -> Vec<BuiltinEntry> {
    vec![BuiltinEntry {
        file_id: STANDARD_SHADER_FILE_ID,
        name: "Standard".to_string(),
        target: STANDARD_MATERIAL,
    }]
}

fn default_builtin_materials() -> Vec<BuiltinEntry> {
    vec![BuiltinEntry {
        file_id: DEFAULT_MATERIAL_FILE_ID,
        name: "Default-Material".to_string(),
        target: STANDARD_MATERIAL,
    }]
}
