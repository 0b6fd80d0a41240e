//! In-memory content store for dry runs and tests.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{AssetEdit, ContentStore, CreateAssetRequest, StoredAsset};
use crate::error::{MigrateError, Result};
use crate::registry::DestinationHandle;

#[derive(Debug, Default)]
struct Inner {
    folders: BTreeSet<PathBuf>,
    assets: HashMap<DestinationHandle, StoredAsset>,
    /// Creation order.
    order: Vec<DestinationHandle>,
    rejected: Vec<PathBuf>,
    rejected_updates: Vec<PathBuf>,
}

/// Content store that keeps everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    inner: Mutex<Inner>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `create_asset` fail for this destination.
    pub async fn reject_destination(&self, destination: impl Into<PathBuf>) {
        self.inner.lock().await.rejected.push(destination.into());
    }

    /// Make `update_asset` fail for the asset created at this destination.
    pub async fn reject_updates(&self, destination: impl Into<PathBuf>) {
        self.inner.lock().await.rejected_updates.push(destination.into());
    }

    /// Every created asset, in creation order.
    pub async fn assets(&self) -> Vec<StoredAsset> {
        let inner = self.inner.lock().await;
        inner
            .order
            .iter()
            .filter_map(|h| inner.assets.get(h).cloned())
            .collect()
    }

    pub async fn find_by_destination(&self, destination: &Path) -> Option<StoredAsset> {
        let inner = self.inner.lock().await;
        inner
            .assets
            .values()
            .find(|a| a.destination == destination)
            .cloned()
    }

    pub async fn folders(&self) -> Vec<PathBuf> {
        self.inner.lock().await.folders.iter().cloned().collect()
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn ensure_folder(&self, path: &Path) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for ancestor in path.ancestors().filter(|p| !p.as_os_str().is_empty()) {
            inner.folders.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    async fn find_folder(&self, path: &Path) -> Result<bool> {
        Ok(self.inner.lock().await.folders.contains(path))
    }

    async fn create_asset(&self, request: &CreateAssetRequest) -> Result<DestinationHandle> {
        let mut inner = self.inner.lock().await;
        if inner.rejected.iter().any(|p| *p == request.destination) {
            return Err(MigrateError::content_store(
                &request.destination,
                "creation rejected",
            ));
        }

        let handle = DestinationHandle::generate();
        inner
            .assets
            .insert(handle, StoredAsset::new(handle, request));
        inner.order.push(handle);
        debug!(
            "Created {} asset {} at {}",
            request.settings.type_name(),
            handle,
            request.destination.display()
        );
        Ok(handle)
    }

    async fn load_asset(&self, handle: DestinationHandle) -> Result<StoredAsset> {
        self.inner
            .lock()
            .await
            .assets
            .get(&handle)
            .cloned()
            .ok_or_else(|| MigrateError::content_store(handle.to_string(), "unknown asset handle"))
    }

    async fn update_asset(&self, handle: DestinationHandle, edits: &[AssetEdit]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        let Inner {
            assets,
            rejected_updates,
            ..
        } = &mut *inner;
        let asset = assets
            .get_mut(&handle)
            .ok_or_else(|| MigrateError::content_store(handle.to_string(), "unknown asset handle"))?;
        if rejected_updates.iter().any(|p| *p == asset.destination) {
            return Err(MigrateError::content_store(&asset.destination, "update rejected"));
        }
        asset.apply(edits);
        Ok(())
    }

    fn store_type(&self) -> &'static str {
        "memory"
    }
}
