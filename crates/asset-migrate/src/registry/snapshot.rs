//! Signed on-disk copy of the identifier registry for incremental runs.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use super::{DestinationHandle, IdentifierRegistry, SourceId};
use crate::error::{MigrateError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Registry contents as written at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Run that produced the snapshot.
    pub run_id: String,

    /// SHA256 hash of the configuration the run used.
    pub config_hash: String,

    pub saved_at: DateTime<Utc>,

    /// Registered mappings, sorted by source id.
    pub entries: BTreeMap<SourceId, DestinationHandle>,

    /// HMAC-SHA256 over the rest of the snapshot, keyed by `config_hash`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hmac: Option<String>,
}

impl RegistrySnapshot {
    /// Capture the current contents of a registry.
    pub fn capture(
        run_id: impl Into<String>,
        config_hash: impl Into<String>,
        registry: &IdentifierRegistry,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            config_hash: config_hash.into(),
            saved_at: Utc::now(),
            entries: registry.snapshot(),
            hmac: None,
        }
    }

    fn compute_hmac(&self) -> Result<String> {
        let mut unsigned = self.clone();
        unsigned.hmac = None;

        let content = serde_json::to_string(&unsigned).map_err(|e| {
            MigrateError::Registry(format!("Failed to serialize snapshot for HMAC: {}", e))
        })?;

        let mut mac = HmacSha256::new_from_slice(self.config_hash.as_bytes())
            .map_err(|e| MigrateError::Registry(format!("Failed to create HMAC: {}", e)))?;
        mac.update(content.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// Load a snapshot and verify its signature.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)?;

        match &snapshot.hmac {
            Some(stored) if *stored == snapshot.compute_hmac()? => Ok(snapshot),
            Some(_) => Err(MigrateError::Registry(
                "Snapshot integrity check failed: HMAC mismatch (possible tampering)".to_string(),
            )),
            None => Err(MigrateError::Registry(
                "Snapshot has no HMAC signature".to_string(),
            )),
        }
    }

    /// Sign and write the snapshot (temp file, then rename).
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        self.hmac = Some(self.compute_hmac()?);

        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let temp_path = path.with_extension("tmp");
        std::fs::write(&temp_path, &content)?;
        std::fs::rename(&temp_path, path)?;

        Ok(())
    }

    /// Reject a snapshot taken under a different configuration.
    pub fn validate_config(&self, config_hash: &str) -> Result<()> {
        if self.config_hash != config_hash {
            return Err(MigrateError::ConfigChanged);
        }
        Ok(())
    }

    /// Load the mappings into a registry, replacing its contents.
    pub fn restore_into(&self, registry: &IdentifierRegistry) {
        registry.restore(self.entries.iter().map(|(k, v)| (k.clone(), *v)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn sample_registry() -> IdentifierRegistry {
        let registry = IdentifierRegistry::new();
        registry.register("9fb7c1a2d4e34b0f8c1d2e3f4a5b6c7d".into(), DestinationHandle::generate());
        registry.register("0a1b2c3d4e5f60718293a4b5c6d7e8f9".into(), DestinationHandle::generate());
        registry
    }

    #[test]
    fn test_snapshot_save_load() {
        let registry = sample_registry();
        let mut snapshot = RegistrySnapshot::capture("run-1", "abc123", &registry);

        let file = NamedTempFile::new().unwrap();
        snapshot.save(file.path()).unwrap();

        let loaded = RegistrySnapshot::load(file.path()).unwrap();
        assert_eq!(loaded.run_id, "run-1");
        assert_eq!(loaded.config_hash, "abc123");
        assert_eq!(loaded.entries, registry.snapshot());

        let restored = IdentifierRegistry::new();
        loaded.restore_into(&restored);
        assert_eq!(restored.snapshot(), registry.snapshot());
    }

    #[test]
    fn test_snapshot_is_pretty_json() {
        let mut snapshot = RegistrySnapshot::capture("run", "hash", &sample_registry());
        let file = NamedTempFile::new().unwrap();
        snapshot.save(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(serde_json::from_str::<serde_json::Value>(&content).is_ok());
        assert!(content.contains('\n'));
        assert!(content.contains("\"hmac\""));
    }

    #[test]
    fn test_snapshot_tampering_detected() {
        let mut snapshot = RegistrySnapshot::capture("run", "hash", &sample_registry());
        let file = NamedTempFile::new().unwrap();
        snapshot.save(file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        std::fs::write(file.path(), content.replace("\"run\"", "\"other\"")).unwrap();

        let err = RegistrySnapshot::load(file.path()).unwrap_err();
        assert!(matches!(err, MigrateError::Registry(_)));
    }

    #[test]
    fn test_unsigned_snapshot_rejected() {
        let snapshot = RegistrySnapshot::capture("run", "hash", &sample_registry());
        let file = NamedTempFile::new().unwrap();
        std::fs::write(file.path(), serde_json::to_string(&snapshot).unwrap()).unwrap();

        assert!(RegistrySnapshot::load(file.path()).is_err());
    }

    #[test]
    fn test_config_validation() {
        let snapshot = RegistrySnapshot::capture("run", "abc123", &IdentifierRegistry::new());
        assert!(snapshot.validate_config("abc123").is_ok());
        assert!(matches!(
            snapshot.validate_config("different"),
            Err(MigrateError::ConfigChanged)
        ));
    }
}
