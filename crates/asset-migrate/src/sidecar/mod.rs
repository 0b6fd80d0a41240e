//! Sidecar metadata model.
//!
//! Every source asset `X.ext` carries a YAML sidecar `X.ext.meta` with its
//! import settings and a stable `guid`. Text assets such as materials and
//! prefabs are themselves multi-document YAML. Both are parsed into the same
//! generic [`SidecarNode`] tree, whose accessors fail with a specific
//! [`SidecarError`] instead of returning silent nulls.

mod node;
mod parse;

pub use node::{SidecarMapping, SidecarNode};
pub use parse::{parse, parse_documents};

use thiserror::Error;

/// Errors produced while parsing or inspecting sidecar YAML.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("invalid YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("document stream is empty")]
    Empty,

    #[error("expected {expected}, found {found}")]
    Shape {
        expected: &'static str,
        found: &'static str,
    },

    #[error("missing key '{key}'")]
    MissingKey { key: String },

    #[error("expected {expected}, got {value:?}")]
    Type {
        expected: &'static str,
        value: String,
    },
}
