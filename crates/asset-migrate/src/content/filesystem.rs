//! Content store that writes into a target project directory.

use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{AssetEdit, ContentStore, CreateAssetRequest, StoredAsset};
use crate::error::{MigrateError, Result};
use crate::registry::DestinationHandle;

const DESCRIPTOR_SUFFIX: &str = ".asset.json";

/// Filesystem-backed content store.
///
/// Importable assets (textures, audio, models) are copied to their
/// destination. Every asset gets a `<destination>.asset.json` descriptor
/// holding its handle and settings.
pub struct FsContentStore {
    root: PathBuf,
    index: Mutex<HashMap<DestinationHandle, PathBuf>>,
}

impl FsContentStore {
    /// Store rooted at the target project directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the JSON descriptor for an asset destination.
    pub fn descriptor_path(destination: &Path) -> PathBuf {
        let mut name = OsString::from(destination.as_os_str());
        name.push(DESCRIPTOR_SUFFIX);
        PathBuf::from(name)
    }

    fn check_inside(&self, path: &Path) -> Result<()> {
        if path.starts_with(&self.root) {
            Ok(())
        } else {
            Err(MigrateError::content_store(
                path,
                format!("outside target project {}", self.root.display()),
            ))
        }
    }

    async fn write_descriptor(&self, asset: &StoredAsset) -> Result<()> {
        let path = Self::descriptor_path(&asset.destination);
        let content = serde_json::to_string_pretty(asset)?;

        let temp_path = path.with_extension("tmp");
        tokio::fs::write(&temp_path, &content).await?;
        tokio::fs::rename(&temp_path, &path).await?;
        Ok(())
    }

    async fn descriptor_for(&self, handle: DestinationHandle) -> Result<PathBuf> {
        self.index
            .lock()
            .await
            .get(&handle)
            .cloned()
            .ok_or_else(|| MigrateError::content_store(handle.to_string(), "unknown asset handle"))
    }
}

#[async_trait]
impl ContentStore for FsContentStore {
    async fn ensure_folder(&self, path: &Path) -> Result<()> {
        self.check_inside(path)?;
        tokio::fs::create_dir_all(path).await?;
        Ok(())
    }

    async fn find_folder(&self, path: &Path) -> Result<bool> {
        match tokio::fs::metadata(path).await {
            Ok(meta) => Ok(meta.is_dir()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_asset(&self, request: &CreateAssetRequest) -> Result<DestinationHandle> {
        let destination = &request.destination;
        self.check_inside(destination)?;

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| MigrateError::content_store(parent, e.to_string()))?;
        }

        if request.settings.imports_source() {
            let source = request.source.as_deref().ok_or_else(|| {
                MigrateError::content_store(destination, "import requested without a source file")
            })?;
            tokio::fs::copy(source, destination)
                .await
                .map_err(|e| MigrateError::content_store(destination, e.to_string()))?;
        }

        let handle = DestinationHandle::generate();
        let asset = StoredAsset::new(handle, request);
        self.write_descriptor(&asset)
            .await
            .map_err(|e| MigrateError::content_store(destination, e.to_string()))?;

        self.index
            .lock()
            .await
            .insert(handle, Self::descriptor_path(destination));
        debug!(
            "Wrote {} asset {} to {}",
            request.settings.type_name(),
            handle,
            destination.display()
        );
        Ok(handle)
    }

    async fn load_asset(&self, handle: DestinationHandle) -> Result<StoredAsset> {
        let path = self.descriptor_for(handle).await?;
        let content = tokio::fs::read_to_string(&path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn update_asset(&self, handle: DestinationHandle, edits: &[AssetEdit]) -> Result<()> {
        let mut asset = self.load_asset(handle).await?;
        asset.apply(edits);
        self.write_descriptor(&asset)
            .await
            .map_err(|e| MigrateError::content_store(&asset.destination, e.to_string()))
    }

    fn store_type(&self) -> &'static str {
        "filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{AssetSettings, ParameterValue, TextureFormat};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_texture_copied_with_descriptor() {
        let source_dir = TempDir::new().unwrap();
        let target_dir = TempDir::new().unwrap();
        let source = source_dir.path().join("wall.png");
        std::fs::write(&source, b"png-bytes").unwrap();

        let store = FsContentStore::new(target_dir.path());
        let destination = target_dir.path().join("Content/Textures/wall.png");
        let handle = store
            .create_asset(&CreateAssetRequest {
                source: Some(source),
                destination: destination.clone(),
                settings: AssetSettings::Texture {
                    format: TextureFormat::ColorRgb,
                    generate_mipmaps: true,
                },
            })
            .await
            .unwrap();

        assert_eq!(std::fs::read(&destination).unwrap(), b"png-bytes");
        let descriptor = FsContentStore::descriptor_path(&destination);
        assert!(descriptor.ends_with("wall.png.asset.json"));
        let loaded = store.load_asset(handle).await.unwrap();
        assert_eq!(loaded.handle, handle);
        assert_eq!(loaded.destination, destination);
    }

    #[tokio::test]
    async fn test_material_update_persists() {
        let target_dir = TempDir::new().unwrap();
        let store = FsContentStore::new(target_dir.path());
        let destination = target_dir.path().join("Brick.mat");
        let handle = store
            .create_asset(&CreateAssetRequest {
                source: None,
                destination: destination.clone(),
                settings: AssetSettings::MaterialInstance,
            })
            .await
            .unwrap();
        assert!(!destination.exists());

        store
            .update_asset(
                handle,
                &[AssetEdit::SetParameter {
                    name: "_Color".into(),
                    value: ParameterValue::Color([1.0, 0.5, 0.25, 1.0]),
                }],
            )
            .await
            .unwrap();

        let content =
            std::fs::read_to_string(FsContentStore::descriptor_path(&destination)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["parameters"]["_Color"]["type"], "color");
    }

    #[tokio::test]
    async fn test_destination_outside_root_rejected() {
        let target_dir = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let store = FsContentStore::new(target_dir.path());

        let err = store
            .create_asset(&CreateAssetRequest {
                source: None,
                destination: other.path().join("x.mat"),
                settings: AssetSettings::MaterialInstance,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::ContentStore { .. }));
    }

    #[tokio::test]
    async fn test_missing_source_is_store_error() {
        let target_dir = TempDir::new().unwrap();
        let store = FsContentStore::new(target_dir.path());
        let err = store
            .create_asset(&CreateAssetRequest {
                source: Some(target_dir.path().join("missing.ogg")),
                destination: target_dir.path().join("out/missing.ogg"),
                settings: AssetSettings::Audio {
                    is_3d: false,
                    format: crate::content::AudioFormat::Vorbis,
                },
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MigrateError::ContentStore { .. }));
    }

    #[tokio::test]
    async fn test_folders() {
        let target_dir = TempDir::new().unwrap();
        let store = FsContentStore::new(target_dir.path());
        let folder = target_dir.path().join("Content/Migrated");
        assert!(!store.find_folder(&folder).await.unwrap());
        store.ensure_folder(&folder).await.unwrap();
        assert!(store.find_folder(&folder).await.unwrap());
    }
}
