//! Prefab migrator.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::{import_each, note_fallback, AssetKind, MigrationContext, Migrator, MigratorReport};
use crate::content::AssetSettings;
use crate::error::{MigrateError, Result};
use crate::registry::DestinationHandle;
use crate::resolve::{Reference, ReferenceResolver, ResolveScope, ResolverTables};
use crate::sidecar::{SidecarError, SidecarNode};

const EXTENSIONS: &[&str] = &["*.prefab"];
const RENDERERS: &[&str] = &["MeshRenderer", "SkinnedMeshRenderer"];

/// Translates prefabs into hierarchy assets.
pub struct PrefabMigrator {
    materials: Arc<ResolverTables>,
}

impl PrefabMigrator {
    pub fn new(materials: Arc<ResolverTables>) -> Self {
        Self { materials }
    }
}

/// Object names and renderer material references of a prefab document stream.
#[derive(Debug, Default, PartialEq)]
pub struct PrefabContents {
    pub objects: Vec<String>,
    pub materials: Vec<Reference>,
}

pub fn prefab_contents(documents: &[SidecarNode]) -> std::result::Result<PrefabContents, SidecarError> {
    let mut contents = PrefabContents::default();
    for document in documents {
        if let Some(object) = document.get("GameObject") {
            contents
                .objects
                .push(object.child("m_Name")?.as_str()?.to_string());
            continue;
        }
        for renderer in RENDERERS.iter().filter_map(|key| document.get(key)) {
            let Some(slots) = renderer.get("m_Materials") else {
                continue;
            };
            for slot in slots.as_sequence()? {
                if let Some(reference) = Reference::from_node(slot)? {
                    contents.materials.push(reference);
                }
            }
        }
    }
    Ok(contents)
}

#[async_trait]
impl Migrator for PrefabMigrator {
    fn kind(&self) -> AssetKind {
        AssetKind::Prefab
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
        info!("Translating {} prefabs", assets.len());

        let resolver = ReferenceResolver::new(Arc::clone(&self.materials), Arc::clone(&ctx.registry));
        Ok(import_each(self.kind(), ctx, assets, |asset, report| {
            let documents = asset.read_documents()?;
            let contents =
                prefab_contents(&documents).map_err(|e| MigrateError::metadata(asset.source(), e))?;

            let label = asset.label();
            let mut materials: Vec<DestinationHandle> = Vec::with_capacity(contents.materials.len());
            for reference in &contents.materials {
                let outcome = resolver.resolve(reference, ResolveScope::Standalone);
                note_fallback(report, &label, reference, outcome);
                if let Some(handle) = outcome.handle() {
                    materials.push(handle);
                }
            }
            Ok(AssetSettings::Prefab {
                objects: contents.objects,
                materials,
            })
        })
        .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::STANDARD_MATERIAL;
    use crate::content::ContentStore;
    use crate::migrator::testing::Fixture;
    use crate::migrator::Anomaly;
    use crate::sidecar::parse_documents;

    const PREFAB: &str = r#"%YAML 1.1
%TAG !u! tag:unity3d.com,2011:
--- !u!1 &100000
GameObject:
  m_Name: Crate
  m_Component:
  - component: {fileID: 400000}
--- !u!4 &400000
Transform:
  m_GameObject: {fileID: 100000}
--- !u!1 &100002
GameObject:
  m_Name: Lid
--- !u!23 &2300000
MeshRenderer:
  m_GameObject: {fileID: 100000}
  m_Materials:
  - {fileID: 2100000, guid: 77777777777777777777777777777777, type: 2}
  - {fileID: 0}
--- !u!137 &13700000
SkinnedMeshRenderer:
  m_Materials:
  - {fileID: 2100000, guid: 88888888888888888888888888888888, type: 2}
--- !u!1001 &100100000 stripped
Prefab:
  m_ObjectHideFlags: 1
"#;

    #[test]
    fn test_prefab_contents() {
        let contents = prefab_contents(&parse_documents(PREFAB).unwrap()).unwrap();
        assert_eq!(contents.objects, vec!["Crate", "Lid"]);
        assert_eq!(
            contents.materials,
            vec![
                Reference::Identifier("77777777777777777777777777777777".into()),
                Reference::Identifier("88888888888888888888888888888888".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_migrate_resolves_materials() {
        let fx = Fixture::new();
        let wood = DestinationHandle::generate();
        fx.ctx
            .registry
            .register("77777777777777777777777777777777".into(), wood);
        fx.add(
            "Props/Crate.prefab",
            PREFAB,
            Some("fileFormatVersion: 2\nguid: 3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c3c\n"),
        );

        let report = PrefabMigrator::new(Arc::new(ResolverTables::new(STANDARD_MATERIAL)))
            .migrate(&fx.ctx, &fx.assets(), &fx.destination())
            .await
            .unwrap();

        assert_eq!(report.migrated.len(), 1);
        assert_eq!(report.anomalies.len(), 1);
        assert_eq!(report.anomalies[0].severity(), crate::migrator::Severity::Warning);

        let prefab = fx.store.load_asset(report.migrated[0].handle).await.unwrap();
        assert_eq!(
            prefab.settings,
            AssetSettings::Prefab {
                objects: vec!["Crate".into(), "Lid".into()],
                materials: vec![wood, STANDARD_MATERIAL],
            }
        );
        assert!(prefab.source.is_some());
    }

    #[tokio::test]
    async fn test_builtin_material_slots() {
        let fx = Fixture::new();
        fx.add(
            "Props/Sphere.prefab",
            r#"%YAML 1.1
%TAG !u! tag:unity3d.com,2011:
--- !u!1 &1
GameObject:
  m_Name: Sphere
--- !u!23 &2
MeshRenderer:
  m_Materials:
  - {fileID: 10303, guid: 0000000000000000f000000000000000, type: 0}
  - {fileID: 46, guid: 0000000000000000f000000000000000, type: 0}
"#,
            Some("guid: 4e4e4e4e4e4e4e4e4e4e4e4e4e4e4e4e\n"),
        );
        let tables = ResolverTables::materials(&crate::config::ShaderConfig::default());

        let report = PrefabMigrator::new(Arc::new(tables))
            .migrate(&fx.ctx, &fx.assets(), &fx.destination())
            .await
            .unwrap();

        // 10303 is the built-in material; 46 is only a shader id.
        match &report.anomalies[..] {
            [Anomaly::FallbackApplied { reference, .. }] => assert_eq!(reference, "builtin:46"),
            other => panic!("unexpected {:?}", other),
        }
        let prefab = fx.store.load_asset(report.migrated[0].handle).await.unwrap();
        assert_eq!(
            prefab.settings,
            AssetSettings::Prefab {
                objects: vec!["Sphere".into()],
                materials: vec![STANDARD_MATERIAL, STANDARD_MATERIAL],
            }
        );
    }

    #[tokio::test]
    async fn test_unreadable_prefab() {
        let fx = Fixture::new();
        fx.add(
            "Bad.prefab",
            "%YAML 1.1\n--- &1\nGameObject: [\n",
            Some("guid: 3d3d3d3d3d3d3d3d3d3d3d3d3d3d3d3d\n"),
        );

        let report = PrefabMigrator::new(Arc::new(ResolverTables::default()))
            .migrate(&fx.ctx, &fx.assets(), &fx.destination())
            .await
            .unwrap();

        assert!(report.migrated.is_empty());
        assert!(matches!(
            report.anomalies[0],
            Anomaly::MalformedMetadata { .. }
        ));
        assert!(fx.ctx.registry.is_empty());
    }
}
