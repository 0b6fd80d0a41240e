//! Texture migrator.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::{import_each, AssetKind, MigrationContext, Migrator, MigratorReport};
use crate::content::{AssetSettings, TextureFormat};
use crate::error::{MigrateError, Result};
use crate::sidecar::{SidecarError, SidecarNode};

const EXTENSIONS: &[&str] = &[
    "*.tga", "*.png", "*.bmp", "*.gif", "*.tiff", "*.tif", "*.jpeg", "*.jpg", "*.dds", "*.hdr",
    "*.raw",
];

/// Source texture type: 0 is a plain texture, 1 a normal map. Every other
/// type is imported as a plain texture.
const NORMAL_MAP: i64 = 1;

#[derive(Debug, Default)]
pub struct TextureMigrator;

impl TextureMigrator {
    pub fn new() -> Self {
        Self
    }
}

/// Import settings from a `TextureImporter` sidecar.
pub fn texture_settings(sidecar: &SidecarNode) -> std::result::Result<AssetSettings, SidecarError> {
    let importer = sidecar.child("TextureImporter")?;
    let texture_type = importer.child("textureType")?.as_i64()?;
    let has_alpha = importer.child("alphaUsage")?.as_i64()? == 1;
    let mipmaps = importer.child("mipmaps")?;
    let srgb = mipmaps.child("sRGBTexture")?.as_i64()? != 0;
    let generate_mipmaps = mipmaps.child("enableMipMap")?.as_i64()? > 0;

    let format = match (texture_type == NORMAL_MAP, srgb, has_alpha) {
        (true, _, _) => TextureFormat::NormalMap,
        (false, false, true) => TextureFormat::HdrRgba,
        (false, false, false) => TextureFormat::HdrRgb,
        (false, true, true) => TextureFormat::ColorRgba,
        (false, true, false) => TextureFormat::ColorRgb,
    };

    Ok(AssetSettings::Texture {
        format,
        generate_mipmaps,
    })
}

#[async_trait]
impl Migrator for TextureMigrator {
    fn kind(&self) -> AssetKind {
        AssetKind::Texture
    }

    fn handled_extensions(&self) -> &'static [&'static str] {
        EXTENSIONS
    }

    async fn migrate(
        &self,
        ctx: &MigrationContext,
        source_root: &Path,
        destination_root: &Path,
    ) -> Result<MigratorReport> {
        let assets = self.discover(ctx, source_root, destination_root)?;
        info!("Importing {} textures", assets.len());

        let report = import_each(self.kind(), ctx, assets, |asset, _| {
            let sidecar_path = asset.sidecar_path().to_path_buf();
            texture_settings(asset.sidecar()?).map_err(|e| MigrateError::metadata(sidecar_path, e))
        })
        .await;
        Ok(report)
    }
}
