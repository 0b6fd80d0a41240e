//! Model migrator.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{import_each, note_fallback, AssetKind, MigrationContext, Migrator, MigratorReport};
use crate::content::{AssetSettings, ModelSettings, ModelType};
use crate::error::{MigrateError, Result};
use crate::resolve::{Reference, ReferenceResolver, ResolveScope, ResolverTables};
use crate::sidecar::{SidecarError, SidecarNode};

const EXTENSIONS: &[&str] = &[
    "*.obj", "*.fbx", "*.x", "*.dae", "*.gltf", "*.glb", "*.blend", "*.bvh", "*.ase", "*.ply",
    "*.dxf", "*.ifc", "*.nff", "*.smd", "*.vta", "*.mdl", "*.md2", "*.md3", "*.md5mesh", "*.q3o",
    "*.q3s", "*.ac", "*.stl", "*.lwo", "*.lws", "*.lxo",
];

// tangentImportMode values that skip tangent calculation.
const TANGENTS_IMPORT: i64 = 0;
const TANGENTS_NONE: i64 = 2;

/// Imports models and remaps their embedded material slots.
pub struct ModelMigrator {
    materials: Arc<ResolverTables>,
}

impl ModelMigrator {
    pub fn new(materials: Arc<ResolverTables>) -> Self {
        Self { materials }
    }
}

/// Material slot remaps declared in a model sidecar.
pub type MaterialRemaps = Vec<(String, Reference)>;

/// Import settings from a `ModelImporter` sidecar, with the unresolved
/// material remaps.
pub fn model_settings(
    sidecar: &SidecarNode,
) -> std::result::Result<(ModelSettings, MaterialRemaps), SidecarError> {
    let importer = sidecar.child("ModelImporter")?;

    let import_materials = match importer.child("materials")?.get("importMaterials") {
        Some(flag) => flag.as_flag()?,
        None => false,
    };

    let meshes = importer.child("meshes")?;
    let scale = meshes.child("globalScale")?.as_f64()?;
    let import_blend_shapes = meshes.child("importBlendShapes")?.as_flag()?;

    let tangent_space = importer.child("tangentSpace")?;
    let normal_import_mode = tangent_space.child("normalImportMode")?.as_i64()?;
    let smoothing_normals_angle = tangent_space.child("normalSmoothAngle")?.as_f64()?;
    let tangent_import_mode = tangent_space.child("tangentImportMode")?.as_i64()?;

    let model_type = match importer.child("animationType")?.as_i64()? {
        0 => ModelType::Model,
        _ => ModelType::SkinnedModel,
    };

    let settings = ModelSettings {
        model_type,
        scale,
        import_materials,
        import_blend_shapes,
        calculate_normals: normal_import_mode > 0,
        smoothing_normals_angle,
        calculate_tangents: tangent_import_mode != TANGENTS_IMPORT
            && tangent_import_mode != TANGENTS_NONE,
        material_remaps: BTreeMap::new(),
    };

    let remaps = match importer.get("externalObjects") {
        Some(objects) => material_remaps(objects)?,
        None => Vec::new(),
    };

    Ok((settings, remaps))
}

fn material_remaps(objects: &SidecarNode) -> std::result::Result<MaterialRemaps, SidecarError> {
    // An empty table is written as `{}`.
    let items = match objects {
        SidecarNode::Sequence(items) => items,
        _ => return Ok(Vec::new()),
    };

    let mut remaps = Vec::new();
    for item in items {
        let first = item.child("first")?;
        let is_material = first
            .get("type")
            .and_then(|t| t.as_str().ok())
            .map_or(false, |t| t.ends_with(":Material"));
        if !is_material {
            continue;
        }
        let slot = first.child("name")?.as_str()?.to_string();
        if let Some(reference) = Reference::from_node(item.child("second")?)? {
            remaps.push((slot, reference));
        }
    }
    Ok(remaps)
}

#[async_trait]
impl Migrator for ModelMigrator {
    fn kind(&self) -> AssetKind {
        AssetKind::Model
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
        info!("Importing {} models", assets.len());

        let resolver = ReferenceResolver::new(Arc::clone(&self.materials), Arc::clone(&ctx.registry));
        Ok(import_each(self.kind(), ctx, assets, |asset, report| {
            let sidecar_path = asset.sidecar_path().to_path_buf();
            let (mut settings, remaps) =
                model_settings(asset.sidecar()?).map_err(|e| MigrateError::metadata(sidecar_path, e))?;

            // Materials run before models, so the registry already holds them.
            for (slot, reference) in remaps {
                let outcome = resolver.resolve(&reference, ResolveScope::Standalone);
                note_fallback(report, &asset.label(), &reference, outcome);
                if let Some(handle) = outcome.handle().filter(|h| !h.is_nil()) {
                    settings.material_remaps.insert(slot, handle);
                }
            }
            Ok(AssetSettings::Model(settings))
        })
        .await)
    }
}
