//! Material migrator.
//!
//! Materials may derive from a parent material in the same batch, so they
//! are translated through the [`ResolutionEngine`]: a material whose parent
//! is not registered yet is deferred until it is. The base of a created
//! material instance is its parent when it has one, otherwise the material
//! mapped from its shader.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::{
    AssetDescriptor, AssetKind, MigratedAsset, MigrationContext, Migrator, MigratorReport,
    UnresolvedAsset,
};
use crate::content::{AssetEdit, AssetSettings, ContentStore, CreateAssetRequest, ParameterValue};
use crate::engine::{BatchStep, ResolutionEngine, StepOutcome};
use crate::error::{MigrateError, Result};
use crate::migrator::Anomaly;
use crate::registry::{DestinationHandle, IdentifierRegistry, SourceId};
use crate::resolve::{Reference, ReferenceOutcome, ReferenceResolver, ResolveScope, ResolverTables};
use crate::sidecar::{SidecarError, SidecarNode};

const EXTENSIONS: &[&str] = &["*.mat"];
const MATERIAL_KEY: &str = "Material";

pub struct MaterialMigrator {
    shaders: Arc<ResolverTables>,
    materials: Arc<ResolverTables>,
    textures: Arc<ResolverTables>,
}

impl MaterialMigrator {
    /// `shaders` maps shader references, `materials` maps parent materials
    /// and `textures` maps texture parameters.
    pub fn new(
        shaders: Arc<ResolverTables>,
        materials: Arc<ResolverTables>,
        textures: Arc<ResolverTables>,
    ) -> Self {
        Self {
            shaders,
            materials,
            textures,
        }
    }
}

/// A parsed material waiting in the worklist.
struct MaterialItem {
    asset: AssetDescriptor,
    source_id: SourceId,
    material: SidecarNode,
}

/// Output of one translated material.
struct Translated {
    migrated: MigratedAsset,
    fallbacks: Vec<Anomaly>,
}

struct MaterialStep {
    store: Arc<dyn ContentStore>,
    registry: Arc<IdentifierRegistry>,
    shaders: ReferenceResolver,
    materials: ReferenceResolver,
    textures: ReferenceResolver,
}

impl MaterialStep {
    fn fallback_anomaly(label: &str, reference: &Reference, fallback: DestinationHandle) -> Anomaly {
        Anomaly::FallbackApplied {
            migrator: AssetKind::Material,
            asset: label.to_string(),
            reference: reference.to_string(),
            fallback,
        }
    }

    /// Base material from the shader reference.
    fn shader_base(
        &self,
        material: &SidecarNode,
        label: &str,
        fallbacks: &mut Vec<Anomaly>,
    ) -> std::result::Result<DestinationHandle, SidecarError> {
        let shader = match material.get("m_Shader") {
            Some(node) => Reference::from_node(node)?,
            None => None,
        };
        let Some(shader) = shader else {
            debug!("{}: no shader, using fallback", label);
            return Ok(self.shaders.tables().fallback());
        };
        match self.shaders.resolve(&shader, ResolveScope::Standalone) {
            ReferenceOutcome::FallbackApplied(handle) => {
                fallbacks.push(Self::fallback_anomaly(label, &shader, handle));
                Ok(handle)
            }
            outcome => Ok(outcome.handle().unwrap_or_else(|| self.shaders.tables().fallback())),
        }
    }

    /// Parameter edits from `m_SavedProperties`.
    fn parameter_edits(
        &self,
        material: &SidecarNode,
        label: &str,
        fallbacks: &mut Vec<Anomaly>,
    ) -> std::result::Result<Vec<AssetEdit>, SidecarError> {
        let mut edits = Vec::new();
        let Some(properties) = material.get("m_SavedProperties") else {
            return Ok(edits);
        };

        if let Some(textures) = properties.get("m_TexEnvs") {
            for (name, env) in textures.entries()? {
                let Some(reference) = Reference::from_node(env.child("m_Texture")?)? else {
                    continue;
                };
                let outcome = self.textures.resolve(&reference, ResolveScope::Standalone);
                let Some(handle) = outcome.handle().filter(|h| !h.is_nil()) else {
                    continue;
                };
                if outcome.is_fallback() {
                    fallbacks.push(Self::fallback_anomaly(label, &reference, handle));
                }
                edits.push(set(name, ParameterValue::Texture(handle)));
            }
        }

        if let Some(floats) = properties.get("m_Floats") {
            for (name, value) in floats.entries()? {
                edits.push(set(name, ParameterValue::Float(value.as_f64()? as f32)));
            }
        }

        if let Some(ints) = properties.get("m_Ints") {
            for (name, value) in ints.entries()? {
                let raw = value.as_i64()?;
                let int = i32::try_from(raw).map_err(|_| SidecarError::Type {
                    expected: "32-bit integer",
                    value: raw.to_string(),
                })?;
                edits.push(set(name, ParameterValue::Int(int)));
            }
        }

        if let Some(colors) = properties.get("m_Colors") {
            for (name, color) in colors.entries()? {
                let channel = |key: &str| -> std::result::Result<f32, SidecarError> {
                    Ok(color.child(key)?.as_f64()? as f32)
                };
                let rgba = [channel("r")?, channel("g")?, channel("b")?, channel("a")?];
                edits.push(set(name, ParameterValue::Color(rgba)));
            }
        }

        Ok(edits)
    }
}

fn set(name: &str, value: ParameterValue) -> AssetEdit {
    AssetEdit::SetParameter {
        name: name.to_string(),
        value,
    }
}

#[async_trait]
impl BatchStep for MaterialStep {
    type Item = MaterialItem;
    type Output = Translated;

    fn label(&self, item: &MaterialItem) -> String {
        item.asset.label()
    }

    async fn process(&self, item: &mut MaterialItem) -> Result<StepOutcome<Translated>> {
        let label = item.asset.label();
        let source = item.asset.source().to_path_buf();
        let mut fallbacks = Vec::new();

        let parent = match item.material.get("m_Parent") {
            Some(node) => {
                Reference::from_node(node).map_err(|e| MigrateError::metadata(&source, e))?
            }
            None => None,
        };

        // Nothing is created until the parent is known.
        let base = match parent {
            Some(parent) => match self.materials.resolve(&parent, ResolveScope::Batch) {
                ReferenceOutcome::Unresolved => {
                    return Ok(StepOutcome::Deferred {
                        waiting_on: parent.to_string(),
                    })
                }
                ReferenceOutcome::FallbackApplied(handle) => {
                    fallbacks.push(Self::fallback_anomaly(&label, &parent, handle));
                    handle
                }
                outcome => outcome
                    .handle()
                    .unwrap_or_else(|| self.materials.tables().fallback()),
            },
            None => self
                .shader_base(&item.material, &label, &mut fallbacks)
                .map_err(|e| MigrateError::metadata(&source, e))?,
        };

        let mut edits = vec![AssetEdit::SetBase(base)];
        edits.extend(
            self.parameter_edits(&item.material, &label, &mut fallbacks)
                .map_err(|e| MigrateError::metadata(&source, e))?,
        );

        let request = CreateAssetRequest {
            source: Some(source),
            destination: item.asset.destination().to_path_buf(),
            settings: AssetSettings::MaterialInstance,
        };
        let handle = self.store.create_asset(&request).await?;
        // No delete in the store: a failed update leaves the asset behind unregistered.
        if let Err(e) = self.store.update_asset(handle, &edits).await {
            return Err(MigrateError::content_store(
                &request.destination,
                format!("created {} but could not configure it: {}", handle, e),
            ));
        }
        self.registry.register(item.source_id.clone(), handle);
        debug!("material {} -> {} (base {})", label, handle, base);

        Ok(StepOutcome::Completed(Translated {
            migrated: MigratedAsset {
                asset: label,
                source_id: item.source_id.clone(),
                destination: request.destination,
                handle,
            },
            fallbacks,
        }))
    }
}

/// Read the sidecar id and the `Material` document of an asset.
fn prepare(mut asset: AssetDescriptor) -> std::result::Result<MaterialItem, (AssetDescriptor, MigrateError)> {
    let source_id = match asset.source_id() {
        Ok(id) => id,
        Err(e) => return Err((asset, e)),
    };
    let documents = match asset.read_documents() {
        Ok(documents) => documents,
        Err(e) => return Err((asset, e)),
    };
    let material = documents
        .into_iter()
        .find_map(|doc| doc.get(MATERIAL_KEY).cloned());
    match material {
        Some(material) => Ok(MaterialItem {
            asset,
            source_id,
            material,
        }),
        None => {
            let err = MigrateError::metadata(
                asset.source(),
                SidecarError::MissingKey {
                    key: MATERIAL_KEY.to_string(),
                },
            );
            Err((asset, err))
        }
    }
}

#[async_trait]
impl Migrator for MaterialMigrator {
    fn kind(&self) -> AssetKind {
        AssetKind::Material
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
        info!("Translating {} materials", assets.len());

        let mut report = MigratorReport::new(self.kind());
        report.discovered = assets.len();

        let mut items = Vec::with_capacity(assets.len());
        for asset in assets {
            match prepare(asset) {
                Ok(item) => items.push(item),
                Err((asset, e)) => report.record_error(asset.label(), &e),
            }
        }

        let step = MaterialStep {
            store: Arc::clone(&ctx.store),
            registry: Arc::clone(&ctx.registry),
            shaders: ReferenceResolver::new(Arc::clone(&self.shaders), Arc::clone(&ctx.registry)),
            materials: ReferenceResolver::new(Arc::clone(&self.materials), Arc::clone(&ctx.registry)),
            textures: ReferenceResolver::new(Arc::clone(&self.textures), Arc::clone(&ctx.registry)),
        };
        let engine = ResolutionEngine::new(ctx.max_iterations);
        let outcome = engine.run(&step, items).await;

        report.iterations = Some(outcome.iterations);
        for translated in outcome.completed {
            for anomaly in translated.fallbacks {
                report.record(anomaly);
            }
            report.record_success(translated.migrated);
        }
        for (label, e) in &outcome.failed {
            report.record_error(label.clone(), e);
        }
        if outcome.ceiling_exceeded {
            let unresolved = outcome
                .unresolved
                .into_iter()
                .map(|work| UnresolvedAsset {
                    asset: work.label,
                    waiting_on: work.waiting_on,
                    requeues: work.requeues,
                })
                .collect();
            report.record(Anomaly::DependencyBudgetExceeded {
                migrator: self.kind(),
                max_iterations: engine.max_iterations(),
                unresolved,
            });
        }

        Ok(report)
    }
}
