//! Audio migrator.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use super::{import_each, AssetKind, MigrationContext, Migrator, MigratorReport};
use crate::content::{AssetSettings, AudioFormat};
use crate::error::{MigrateError, Result};
use crate::sidecar::{SidecarError, SidecarNode};

const EXTENSIONS: &[&str] = &["*.ogg", "*.wav", "*.mp3"];

#[derive(Debug, Default)]
pub struct AudioMigrator;

impl AudioMigrator {
    pub fn new() -> Self {
        Self
    }
}

/// Import settings from an `AudioImporter` sidecar. Audio is always
/// re-encoded as Vorbis.
pub fn audio_settings(sidecar: &SidecarNode) -> std::result::Result<AssetSettings, SidecarError> {
    let importer = sidecar.child("AudioImporter")?;
    Ok(AssetSettings::Audio {
        is_3d: importer.child("3D")?.as_flag()?,
        format: AudioFormat::Vorbis,
    })
}

#[async_trait]
impl Migrator for AudioMigrator {
    fn kind(&self) -> AssetKind {
        AssetKind::Audio
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
        info!("Importing {} audio clips", assets.len());

        Ok(import_each(self.kind(), ctx, assets, |asset, _| {
            let sidecar_path = asset.sidecar_path().to_path_buf();
            audio_settings(asset.sidecar()?).map_err(|e| MigrateError::metadata(sidecar_path, e))
        })
        .await)
    }
}
