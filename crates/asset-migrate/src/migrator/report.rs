//! Per-migrator results and anomalies.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::AssetKind;
use crate::error::MigrateError;
use crate::registry::{DestinationHandle, SourceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
}

/// An asset left waiting when a batch hit its iteration ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedAsset {
    pub asset: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waiting_on: Option<String>,
    pub requeues: u32,
}

/// Something that went wrong (or was papered over) during a run.
///
/// Anomalies never abort a run; they are collected and reported.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anomaly {
    MissingMetadata {
        migrator: AssetKind,
        asset: String,
    },
    MalformedMetadata {
        migrator: AssetKind,
        asset: String,
        message: String,
    },
    AssetFailed {
        migrator: AssetKind,
        asset: String,
        message: String,
    },
    FallbackApplied {
        migrator: AssetKind,
        asset: String,
        reference: String,
        fallback: DestinationHandle,
    },
    DependencyBudgetExceeded {
        migrator: AssetKind,
        max_iterations: usize,
        unresolved: Vec<UnresolvedAsset>,
    },
    MigratorFailed {
        migrator: AssetKind,
        message: String,
    },
    /// The registry snapshot of a finished run could not be written.
    RegistryNotSaved {
        path: PathBuf,
        message: String,
    },
}

impl Anomaly {
    /// Classify a per-asset error.
    pub fn from_error(migrator: AssetKind, asset: impl Into<String>, err: &MigrateError) -> Self {
        let asset = asset.into();
        match err {
            MigrateError::MissingMetadata { .. } => Anomaly::MissingMetadata { migrator, asset },
            MigrateError::Metadata { source, .. } => Anomaly::MalformedMetadata {
                migrator,
                asset,
                message: source.to_string(),
            },
            other => Anomaly::AssetFailed {
                migrator,
                asset,
                message: other.to_string(),
            },
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Anomaly::FallbackApplied { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// The migrator that recorded the anomaly; `None` for run-level ones.
    pub fn migrator(&self) -> Option<AssetKind> {
        match self {
            Anomaly::MissingMetadata { migrator, .. }
            | Anomaly::MalformedMetadata { migrator, .. }
            | Anomaly::AssetFailed { migrator, .. }
            | Anomaly::FallbackApplied { migrator, .. }
            | Anomaly::DependencyBudgetExceeded { migrator, .. }
            | Anomaly::MigratorFailed { migrator, .. } => Some(*migrator),
            Anomaly::RegistryNotSaved { .. } => None,
        }
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::MissingMetadata { migrator, asset } => {
                write!(f, "[{}] Meta file missing for file {}", migrator, asset)
            }
            Anomaly::MalformedMetadata {
                migrator,
                asset,
                message,
            } => write!(f, "[{}] Malformed metadata for {}: {}", migrator, asset, message),
            Anomaly::AssetFailed {
                migrator,
                asset,
                message,
            } => write!(f, "[{}] {} failed: {}", migrator, asset, message),
            Anomaly::FallbackApplied {
                migrator,
                asset,
                reference,
                fallback,
            } => write!(
                f,
                "[{}] {}: no mapping for {}, fallback {} applied",
                migrator, asset, reference, fallback
            ),
            Anomaly::DependencyBudgetExceeded {
                migrator,
                max_iterations,
                unresolved,
            } => {
                write!(
                    f,
                    "[{}] max iterations ({}) exceeded, {} unresolved:",
                    migrator,
                    max_iterations,
                    unresolved.len()
                )?;
                for item in unresolved {
                    match &item.waiting_on {
                        Some(dep) => write!(f, " {} (waiting on {})", item.asset, dep)?,
                        None => write!(f, " {}", item.asset)?,
                    }
                }
                Ok(())
            }
            Anomaly::MigratorFailed { migrator, message } => {
                write!(f, "[{}] migrator failed: {}", migrator, message)
            }
            Anomaly::RegistryNotSaved { path, message } => {
                write!(f, "Registry not saved to {}: {}", path.display(), message)
            }
        }
    }
}

/// One successfully migrated asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigratedAsset {
    /// Path relative to the source asset folder.
    pub asset: String,
    pub source_id: SourceId,
    pub destination: PathBuf,
    pub handle: DestinationHandle,
}

/// What a single migrator did.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigratorReport {
    pub kind: AssetKind,
    /// Files matching the migrator's patterns.
    pub discovered: usize,
    pub migrated: Vec<MigratedAsset>,
    pub anomalies: Vec<Anomaly>,
    /// Worklist iterations, for dependency-ordered migrators.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
}

impl MigratorReport {
    pub fn new(kind: AssetKind) -> Self {
        Self {
            kind,
            discovered: 0,
            migrated: Vec::new(),
            anomalies: Vec::new(),
            iterations: None,
        }
    }

    pub fn record_success(&mut self, asset: MigratedAsset) {
        self.migrated.push(asset);
    }

    pub fn record(&mut self, anomaly: Anomaly) {
        tracing::warn!("{}", anomaly);
        self.anomalies.push(anomaly);
    }

    /// Record a per-asset error as an anomaly.
    pub fn record_error(&mut self, asset: impl Into<String>, err: &MigrateError) {
        self.record(Anomaly::from_error(self.kind, asset, err));
    }

    pub fn has_errors(&self) -> bool {
        self.anomalies
            .iter()
            .any(|a| a.severity() == Severity::Error)
    }

    pub fn skipped(&self) -> usize {
        self.discovered.saturating_sub(self.migrated.len())
    }
}
