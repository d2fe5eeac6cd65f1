//! Model loading seam
//!
//! A loader turns a URL into an [`ImportedModel`], a plain description of a
//! scene subtree. Loaders may cache and share what they return, so the
//! viewer always instantiates a fresh copy into its own scene and asset
//! manager.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use viewer_core::components::{MeshRenderer, ShadowFlags, Transform};
use viewer_core::error::{Result, ViewerError};
use viewer_core::scene::{NodeId, SceneGraph};

use crate::asset_manager::{AssetManager, MaterialData, TextureData};
use crate::mesh::MeshData;

/// Supported model file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelFormat {
    Gltf,
    Fbx,
    Obj,
}

impl ModelFormat {
    /// Pick a format from the URL's file extension, case-insensitively
    pub fn from_url(url: &str) -> Result<Self> {
        let path = url.split(['?', '#']).next().unwrap_or_default();
        let file_name = path.rsplit('/').next().unwrap_or_default();
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .ok_or_else(|| ViewerError::UnsupportedFormat(url.to_string()))?;

        match ext.as_str() {
            "glb" | "gltf" => Ok(ModelFormat::Gltf),
            "fbx" => Ok(ModelFormat::Fbx),
            "obj" => Ok(ModelFormat::Obj),
            _ => Err(ViewerError::UnsupportedFormat(url.to_string())),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ModelFormat::Gltf => "GLTF",
            ModelFormat::Fbx => "FBX",
            ModelFormat::Obj => "OBJ",
        }
    }
}

/// Cross-origin mode requested for fetched resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossOrigin {
    #[default]
    Anonymous,
    UseCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub url: String,
    pub cross_origin: CrossOrigin,
}

impl LoadRequest {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            cross_origin: CrossOrigin::Anonymous,
        }
    }
}

/// Byte-level progress callback handed to loaders
#[derive(Clone)]
pub struct ProgressSink {
    callback: Arc<dyn Fn(u64, Option<u64>) + Send + Sync>,
}

impl ProgressSink {
    pub fn new(callback: impl Fn(u64, Option<u64>) + Send + Sync + 'static) -> Self {
        Self {
            callback: Arc::new(callback),
        }
    }

    pub fn noop() -> Self {
        Self::new(|_, _| {})
    }

    /// Report `loaded` bytes out of `total`, when the total is known
    pub fn report(&self, loaded: u64, total: Option<u64>) {
        (self.callback)(loaded, total);
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink").finish_non_exhaustive()
    }
}

pub type LoadFuture = BoxFuture<'static, Result<Arc<ImportedModel>>>;

/// Format-specific asset loader
pub trait AssetLoader: Send + Sync {
    fn load(&self, request: LoadRequest, progress: ProgressSink) -> LoadFuture;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedMesh {
    pub geometry: usize,
    pub materials: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedNode {
    pub name: String,
    /// Index of the parent node; must precede this node
    pub parent: Option<usize>,
    pub transform: Transform,
    pub mesh: Option<ImportedMesh>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedMaterial {
    pub material: MaterialData,
    /// Index into [`ImportedModel::textures`]
    pub map: Option<usize>,
}

/// Loader output: a scene subtree plus the resources it references by index
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportedModel {
    pub name: String,
    pub nodes: Vec<ImportedNode>,
    pub geometries: Vec<MeshData>,
    pub materials: Vec<ImportedMaterial>,
    pub textures: Vec<TextureData>,
}

impl ImportedModel {
    pub fn single_mesh(name: &str, mesh: MeshData, material: MaterialData) -> Self {
        Self {
            name: name.to_string(),
            nodes: vec![ImportedNode {
                name: mesh.name.clone(),
                parent: None,
                transform: Transform::default(),
                mesh: Some(ImportedMesh {
                    geometry: 0,
                    materials: vec![0],
                }),
            }],
            geometries: vec![mesh],
            materials: vec![ImportedMaterial {
                material,
                map: None,
            }],
            textures: Vec::new(),
        }
    }

    /// True when at least one node draws a non-empty geometry
    pub fn is_renderable(&self) -> bool {
        self.nodes.iter().any(|node| {
            node.mesh
                .as_ref()
                .and_then(|mesh| self.geometries.get(mesh.geometry))
                .is_some_and(MeshData::is_valid)
        })
    }

    /// Create a fresh copy of the model under `parent`, returning its root node.
    /// Resources shared inside the model stay shared inside the copy.
    pub fn instantiate(
        &self,
        scene: &mut SceneGraph,
        assets: &mut AssetManager,
        parent: NodeId,
    ) -> NodeId {
        let root = scene.spawn_child(parent, &self.name, Transform::default());

        let textures: Vec<_> = self
            .textures
            .iter()
            .map(|texture| assets.add_texture(texture.clone()))
            .collect();
        let materials: Vec<_> = self
            .materials
            .iter()
            .map(|imported| {
                let mut material = imported.material.clone();
                material.map = imported.map.and_then(|index| textures.get(index).copied());
                assets.add_material(material)
            })
            .collect();
        let geometries: Vec<_> = self
            .geometries
            .iter()
            .map(|mesh| assets.add_geometry(mesh.clone()))
            .collect();

        let mut nodes: Vec<NodeId> = Vec::with_capacity(self.nodes.len());
        for (index, imported) in self.nodes.iter().enumerate() {
            let node_parent = imported
                .parent
                .filter(|p| *p < index)
                .and_then(|p| nodes.get(p).copied())
                .unwrap_or(root);
            let node = scene.spawn_child(node_parent, &imported.name, imported.transform);

            if let Some(mesh) = &imported.mesh {
                if let Some(geometry) = geometries.get(mesh.geometry).copied() {
                    let slots = mesh
                        .materials
                        .iter()
                        .filter_map(|index| materials.get(*index).copied())
                        .collect();
                    scene.set_mesh(node, MeshRenderer::with_materials(geometry, slots));
                    scene.set_shadow(node, ShadowFlags::cast_and_receive());
                }
            }
            nodes.push(node);
        }

        root
    }
}

/// Format → loader dispatch table
#[derive(Clone, Default)]
pub struct LoaderRegistry {
    loaders: HashMap<ModelFormat, Arc<dyn AssetLoader>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the file-backed GLTF, FBX and OBJ loaders
    pub fn with_file_loaders() -> Self {
        let mut registry = Self::new();
        for format in [ModelFormat::Gltf, ModelFormat::Fbx, ModelFormat::Obj] {
            registry.register(format, Arc::new(crate::formats::FileLoader::new(format)));
        }
        registry
    }

    pub fn register(&mut self, format: ModelFormat, loader: Arc<dyn AssetLoader>) {
        self.loaders.insert(format, loader);
    }

    /// Loader responsible for `url`
    pub fn loader_for(&self, url: &str) -> Result<(ModelFormat, Arc<dyn AssetLoader>)> {
        let format = ModelFormat::from_url(url)?;
        self.loaders
            .get(&format)
            .cloned()
            .map(|loader| (format, loader))
            .ok_or_else(|| ViewerError::UnsupportedFormat(url.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_dispatch_is_case_insensitive() {
        assert_eq!(ModelFormat::from_url("dish.GLB").unwrap(), ModelFormat::Gltf);
        assert_eq!(ModelFormat::from_url("/m/soup.gltf?v=3").unwrap(), ModelFormat::Gltf);
        assert_eq!(ModelFormat::from_url("a.b/chicken.Fbx").unwrap(), ModelFormat::Fbx);
        assert_eq!(ModelFormat::from_url("plate.obj#top").unwrap(), ModelFormat::Obj);
    }

    #[test]
    fn unknown_extensions_are_unsupported() {
        for url in ["model.xyz", "model", "models.d/model", ""] {
            assert!(matches!(
                ModelFormat::from_url(url),
                Err(ViewerError::UnsupportedFormat(_))
            ));
        }
    }

    #[test]
    fn empty_registry_rejects_known_formats() {
        let registry = LoaderRegistry::new();
        assert!(registry.loader_for("dish.glb").is_err());
        assert!(LoaderRegistry::with_file_loaders().loader_for("dish.glb").is_ok());
    }

    #[test]
    fn instantiation_shares_materials_within_a_copy() {
        let mut model = ImportedModel::single_mesh("dish", MeshData::cube(), MaterialData::default());
        model.nodes.push(ImportedNode {
            name: "second".to_string(),
            parent: Some(0),
            transform: Transform::from_translation(1.0, 0.0, 0.0),
            mesh: Some(ImportedMesh {
                geometry: 0,
                materials: vec![0],
            }),
        });

        let mut scene = SceneGraph::new();
        let mut assets = AssetManager::new();
        let parent = scene.spawn("group", Transform::default());
        let first = model.instantiate(&mut scene, &mut assets, parent);
        let second = model.instantiate(&mut scene, &mut assets, parent);

        assert_ne!(first, second);
        assert_eq!(assets.material_count(), 2);
        assert_eq!(assets.geometry_count(), 2);
        let meshes: Vec<_> = scene
            .traverse_depth_first(first)
            .into_iter()
            .filter_map(|node| scene.mesh(node))
            .collect();
        assert_eq!(meshes.len(), 2);
        assert_eq!(meshes[0].materials, meshes[1].materials);
    }

    #[test]
    fn empty_models_are_not_renderable() {
        assert!(!ImportedModel::default().is_renderable());
        let model = ImportedModel::single_mesh("p", MeshData::plane(), MaterialData::default());
        assert!(model.is_renderable());
    }
}
