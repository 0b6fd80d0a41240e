//! Asset enumeration and lazily parsed sidecars.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{MigrateError, Result};
use crate::registry::SourceId;
use crate::sidecar::{self, SidecarError, SidecarNode};

/// One source file a migrator will handle.
#[derive(Debug, Clone)]
pub struct AssetDescriptor {
    source: PathBuf,
    relative: PathBuf,
    destination: PathBuf,
    sidecar_path: PathBuf,
    sidecar: Option<SidecarNode>,
}

impl AssetDescriptor {
    pub fn new(
        source: PathBuf,
        relative: PathBuf,
        destination_root: &Path,
        sidecar_extension: &str,
    ) -> Self {
        let destination = destination_root.join(&relative);
        let mut sidecar_path = OsString::from(source.as_os_str());
        sidecar_path.push(".");
        sidecar_path.push(sidecar_extension);
        Self {
            source,
            relative,
            destination,
            sidecar_path: PathBuf::from(sidecar_path),
            sidecar: None,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Path relative to the source asset folder.
    pub fn relative(&self) -> &Path {
        &self.relative
    }

    pub fn destination(&self) -> &Path {
        &self.destination
    }

    pub fn sidecar_path(&self) -> &Path {
        &self.sidecar_path
    }

    pub fn has_sidecar(&self) -> bool {
        self.sidecar_path.is_file()
    }

    /// Display name: the relative path with `/` separators.
    pub fn label(&self) -> String {
        self.relative.to_string_lossy().replace('\\', "/")
    }

    /// The parsed sidecar, read on first access.
    pub fn sidecar(&mut self) -> Result<&SidecarNode> {
        let node = match self.sidecar.take() {
            Some(node) => node,
            None => self.load_sidecar()?,
        };
        Ok(self.sidecar.insert(node))
    }

    fn load_sidecar(&self) -> Result<SidecarNode> {
        if !self.has_sidecar() {
            return Err(MigrateError::MissingMetadata {
                asset: self.source.clone(),
            });
        }
        let text = std::fs::read_to_string(&self.sidecar_path)?;
        sidecar::parse(&text).map_err(|e| MigrateError::metadata(&self.sidecar_path, e))
    }

    /// Source id from the sidecar `guid` key.
    pub fn source_id(&mut self) -> Result<SourceId> {
        let sidecar_path = self.sidecar_path.clone();
        let guid = self
            .sidecar()?
            .child("guid")
            .and_then(|node| node.as_str())
            .map(|s| s.trim().to_string())
            .map_err(|e| MigrateError::metadata(&sidecar_path, e))?;
        if guid.is_empty() {
            return Err(MigrateError::metadata(
                sidecar_path,
                SidecarError::MissingKey {
                    key: "guid".to_string(),
                },
            ));
        }
        Ok(SourceId::from(guid))
    }

    /// Parse the asset file itself as a YAML document stream.
    pub fn read_documents(&self) -> Result<Vec<SidecarNode>> {
        let text = std::fs::read_to_string(&self.source)?;
        let documents =
            sidecar::parse_documents(&text).map_err(|e| MigrateError::metadata(&self.source, e))?;
        if documents.is_empty() {
            return Err(MigrateError::metadata(&self.source, SidecarError::Empty));
        }
        Ok(documents)
    }
}

/// Finds the files a migrator handles.
#[derive(Debug, Clone)]
pub struct Discovery {
    patterns: GlobSet,
    exclude: GlobSet,
    sidecar_extension: String,
}

impl Discovery {
    /// `patterns` match file names case-insensitively; `exclude` patterns
    /// match paths relative to the source root.
    pub fn new(patterns: &[&str], exclude: &[String], sidecar_extension: &str) -> Result<Self> {
        Ok(Self {
            patterns: build_set(patterns.iter().copied())?,
            exclude: build_set(exclude.iter().map(String::as_str))?,
            sidecar_extension: sidecar_extension.to_string(),
        })
    }

    /// Walk `source_root` recursively in file-name order.
    pub fn scan(&self, source_root: &Path, destination_root: &Path) -> Result<Vec<AssetDescriptor>> {
        if !source_root.is_dir() {
            return Err(MigrateError::Validation(format!(
                "source folder {} does not exist",
                source_root.display()
            )));
        }

        let mut assets = Vec::new();
        for entry in WalkDir::new(source_root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if !self.patterns.is_match(Path::new(entry.file_name())) {
                continue;
            }
            let relative = match entry.path().strip_prefix(source_root) {
                Ok(relative) => relative.to_path_buf(),
                Err(_) => continue,
            };
            if self.exclude.is_match(&relative) {
                continue;
            }
            assets.push(AssetDescriptor::new(
                entry.path().to_path_buf(),
                relative,
                destination_root,
                &self.sidecar_extension,
            ));
        }
        Ok(assets)
    }
}

fn build_set<'a>(patterns: impl Iterator<Item = &'a str>) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| MigrateError::Config(format!("invalid pattern '{}': {}", pattern, e)))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| MigrateError::Config(format!("invalid pattern set: {}", e)))
}
