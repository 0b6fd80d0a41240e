//! Content store abstraction for the target project.
//!
//! The [`ContentStore`] trait is the only way migrators touch the target
//! project. Implementations:
//!
//! - **Memory**: [`InMemoryContentStore`], used for dry runs and tests
//! - **Filesystem**: [`FsContentStore`], copies importable sources and writes
//!   a JSON descriptor next to every created asset
//!
//! The orchestrator works with `Arc<dyn ContentStore>` without knowing the
//! concrete type.

mod filesystem;
mod memory;

pub use filesystem::FsContentStore;
pub use memory::InMemoryContentStore;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::registry::DestinationHandle;

/// Pixel format chosen for an imported texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextureFormat {
    NormalMap,
    HdrRgb,
    HdrRgba,
    ColorRgb,
    ColorRgba,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    Vorbis,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Static mesh.
    Model,
    /// Mesh with a skeleton.
    SkinnedModel,
}

/// Import settings for a model file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSettings {
    pub model_type: ModelType,
    pub scale: f64,
    pub import_materials: bool,
    pub import_blend_shapes: bool,
    pub calculate_normals: bool,
    pub smoothing_normals_angle: f64,
    pub calculate_tangents: bool,
    /// Material slot name to resolved material.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub material_remaps: BTreeMap<String, DestinationHandle>,
}

/// What kind of asset to create, with its kind-specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssetSettings {
    Texture {
        format: TextureFormat,
        generate_mipmaps: bool,
    },
    Audio {
        is_3d: bool,
        format: AudioFormat,
    },
    Model(ModelSettings),
    MaterialInstance,
    Prefab {
        objects: Vec<String>,
        materials: Vec<DestinationHandle>,
    },
}

impl AssetSettings {
    /// Whether creating this asset consumes the source file.
    pub fn imports_source(&self) -> bool {
        matches!(
            self,
            AssetSettings::Texture { .. } | AssetSettings::Audio { .. } | AssetSettings::Model(_)
        )
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            AssetSettings::Texture { .. } => "texture",
            AssetSettings::Audio { .. } => "audio",
            AssetSettings::Model(_) => "model",
            AssetSettings::MaterialInstance => "material_instance",
            AssetSettings::Prefab { .. } => "prefab",
        }
    }
}

/// Request to create one asset.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateAssetRequest {
    /// Source file, when the asset is imported from one.
    pub source: Option<PathBuf>,
    /// Where the asset lands in the target project.
    pub destination: PathBuf,
    pub settings: AssetSettings,
}

/// Value of a material parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ParameterValue {
    Float(f32),
    Int(i32),
    Color([f32; 4]),
    Texture(DestinationHandle),
}

/// Edit applied to an existing asset.
#[derive(Debug, Clone, PartialEq)]
pub enum AssetEdit {
    SetParameter { name: String, value: ParameterValue },
    SetBase(DestinationHandle),
}

/// An asset as the store holds it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAsset {
    pub handle: DestinationHandle,
    pub destination: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<PathBuf>,
    pub settings: AssetSettings,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<DestinationHandle>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, ParameterValue>,
}

impl StoredAsset {
    pub fn new(handle: DestinationHandle, request: &CreateAssetRequest) -> Self {
        Self {
            handle,
            destination: request.destination.clone(),
            source: request.source.clone(),
            settings: request.settings.clone(),
            base: None,
            parameters: BTreeMap::new(),
        }
    }

    pub fn apply(&mut self, edits: &[AssetEdit]) {
        for edit in edits {
            match edit {
                AssetEdit::SetParameter { name, value } => {
                    self.parameters.insert(name.clone(), *value);
                }
                AssetEdit::SetBase(base) => self.base = Some(*base),
            }
        }
    }
}

/// Target-project operations needed by the migrators.
///
/// Implementations must be `Send + Sync`; a single store is shared by every
/// migrator of a run.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create a folder and its parents. Idempotent.
    async fn ensure_folder(&self, path: &Path) -> Result<()>;

    /// Whether a folder exists.
    async fn find_folder(&self, path: &Path) -> Result<bool>;

    /// Create an asset. The returned handle is valid once this resolves.
    async fn create_asset(&self, request: &CreateAssetRequest) -> Result<DestinationHandle>;

    async fn load_asset(&self, handle: DestinationHandle) -> Result<StoredAsset>;

    async fn update_asset(&self, handle: DestinationHandle, edits: &[AssetEdit]) -> Result<()>;

    /// Store type name for logging.
    fn store_type(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stored_asset_apply_edits() {
        let request = CreateAssetRequest {
            source: None,
            destination: PathBuf::from("Content/Brick.mat"),
            settings: AssetSettings::MaterialInstance,
        };
        let mut asset = StoredAsset::new(DestinationHandle::generate(), &request);
        let base = DestinationHandle::generate();

        asset.apply(&[
            AssetEdit::SetBase(base),
            AssetEdit::SetParameter {
                name: "_Glossiness".into(),
                value: ParameterValue::Float(0.5),
            },
            AssetEdit::SetParameter {
                name: "_Glossiness".into(),
                value: ParameterValue::Float(0.8),
            },
        ]);

        assert_eq!(asset.base, Some(base));
        assert_eq!(asset.parameters.len(), 1);
        assert_eq!(asset.parameters["_Glossiness"], ParameterValue::Float(0.8));
    }

    #[test]
    fn test_settings_json_tags() {
        let settings = AssetSettings::Texture {
            format: TextureFormat::HdrRgba,
            generate_mipmaps: true,
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["type"], "texture");
        assert_eq!(json["format"], "hdr_rgba");
        assert!(settings.imports_source());
        assert!(!AssetSettings::MaterialInstance.imports_source());
    }
}
