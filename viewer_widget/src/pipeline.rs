//! Asset Load Pipeline
//!
//! One model at a time. Every load bumps the generation; the loader runs as
//! a tokio task and reports [`LoadEvent`]s tagged with the generation it was
//! started for, so the viewer can drop anything from a superseded load.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::debug;
use viewer_core::error::Result;
use viewer_core::scene::{NodeId, SceneGraph};
use viewer_render::asset_manager::{AssetManager, MaterialData};
use viewer_render::loader::{ImportedModel, LoadRequest, LoaderRegistry, ProgressSink};
use viewer_render::mesh::{Aabb, BoundingSphere, MeshData};

/// Distance factor that leaves a margin around an auto-framed model
pub const AUTO_FRAME_MARGIN: f32 = 1.2;

#[derive(Debug)]
pub enum LoadEventKind {
    Progress { loaded: u64, total: Option<u64> },
    Finished(Result<Arc<ImportedModel>>),
}

/// Message from a load task
#[derive(Debug)]
pub struct LoadEvent {
    pub generation: u64,
    pub kind: LoadEventKind,
}

/// Resources released by [`dispose_subtree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisposedResources {
    pub nodes: usize,
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

pub struct LoadPipeline {
    generation: u64,
    registry: LoaderRegistry,
    events_tx: mpsc::UnboundedSender<LoadEvent>,
    events_rx: mpsc::UnboundedReceiver<LoadEvent>,
    current: Option<NodeId>,
}

impl LoadPipeline {
    pub fn new(registry: LoaderRegistry) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            generation: 0,
            registry,
            events_tx,
            events_rx,
            current: None,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        generation == self.generation
    }

    /// Start a new generation, superseding every earlier load
    pub fn next_generation(&mut self) -> u64 {
        self.generation += 1;
        self.generation
    }

    /// Root node of the displayed model
    pub fn current_model(&self) -> Option<NodeId> {
        self.current
    }

    /// Spawn the loader for `url` under `generation`.
    /// Fails synchronously only when no loader handles the URL.
    pub fn spawn_load(&self, runtime: &Handle, url: &str, generation: u64) -> Result<()> {
        let (format, loader) = self.registry.loader_for(url)?;
        debug!(url, format = format.name(), generation, "spawning model load");

        let progress_tx = self.events_tx.clone();
        let progress = ProgressSink::new(move |loaded, total| {
            let _ = progress_tx.send(LoadEvent {
                generation,
                kind: LoadEventKind::Progress { loaded, total },
            });
        });
        let finished_tx = self.events_tx.clone();
        let request = LoadRequest::new(url);
        runtime.spawn(async move {
            let result = loader.load(request, progress).await;
            // the receiver only goes away with the viewer
            let _ = finished_tx.send(LoadEvent {
                generation,
                kind: LoadEventKind::Finished(result),
            });
        });
        Ok(())
    }

    pub fn try_next_event(&mut self) -> Option<LoadEvent> {
        self.events_rx.try_recv().ok()
    }

    pub async fn next_event(&mut self) -> Option<LoadEvent> {
        self.events_rx.recv().await
    }

    /// Free the displayed model, if any
    pub fn dispose_current(&mut self, scene: &mut SceneGraph, assets: &mut AssetManager) -> DisposedResources {
        match self.current.take() {
            Some(root) => dispose_subtree(scene, assets, root),
            None => DisposedResources::default(),
        }
    }

    /// Instantiate `model` under `parent` and normalize it to `target_radius`
    pub fn install(
        &mut self,
        scene: &mut SceneGraph,
        assets: &mut AssetManager,
        parent: NodeId,
        model: &ImportedModel,
        target_radius: f32,
    ) -> NodeId {
        let root = model.instantiate(scene, assets, parent);
        normalize_subtree(scene, assets, root, target_radius);
        self.current = Some(root);
        root
    }
}

/// Free every geometry and each distinct material and texture under `root`,
/// then despawn the subtree
pub fn dispose_subtree(scene: &mut SceneGraph, assets: &mut AssetManager, root: NodeId) -> DisposedResources {
    let mut geometries = BTreeSet::new();
    let mut materials = BTreeSet::new();
    for node in scene.traverse_depth_first(root) {
        if let Some(mesh) = scene.mesh(node) {
            geometries.insert(mesh.geometry);
            materials.extend(mesh.materials);
        }
    }
    let textures: BTreeSet<_> = materials
        .iter()
        .filter_map(|handle| assets.material(*handle).and_then(|m| m.map))
        .collect();

    let mut disposed = DisposedResources {
        nodes: scene.despawn_recursive(root).len(),
        ..Default::default()
    };
    for geometry in geometries {
        disposed.geometries += usize::from(assets.dispose_geometry(geometry));
    }
    for material in materials {
        disposed.materials += usize::from(assets.dispose_material(material));
    }
    for texture in textures {
        disposed.textures += usize::from(assets.dispose_texture(texture));
    }
    disposed
}

/// Bounding sphere of every mesh under `root`, in `root`'s parent space
pub fn subtree_bounds(scene: &SceneGraph, assets: &AssetManager, root: NodeId) -> BoundingSphere {
    let parent = scene.parent(root);
    let mut bounds = Aabb::empty();
    for node in scene.traverse_depth_first(root) {
        let Some(geometry) = scene.mesh(node).and_then(|mesh| assets.geometry(mesh.geometry)) else {
            continue;
        };
        bounds.union(&geometry.bounds(scene.relative_matrix(node, parent)));
    }
    bounds.bounding_sphere()
}

/// Center `root` on its parent's origin and scale it uniformly so its
/// bounding sphere has `target_radius`. Returns the sphere before scaling.
pub fn normalize_subtree(
    scene: &mut SceneGraph,
    assets: &AssetManager,
    root: NodeId,
    target_radius: f32,
) -> BoundingSphere {
    let sphere = subtree_bounds(scene, assets, root);
    if sphere.radius <= f32::EPSILON || !sphere.radius.is_finite() {
        return sphere;
    }
    let scale = target_radius / sphere.radius;
    scene.update_transform(root, |t| {
        t.scale *= scale;
        t.position = (t.position - sphere.center) * scale;
    });
    sphere
}

/// Camera distance at which a sphere of `radius` fills a `fov_degrees` frame
pub fn auto_frame_distance(radius: f32, fov_degrees: f32) -> f32 {
    radius * AUTO_FRAME_MARGIN / (fov_degrees.to_radians() * 0.5).sin()
}

/// Deterministic stand-in shown when there is no model to display
pub fn placeholder_model() -> ImportedModel {
    let mesh = MeshData::torus_knot(1.0, 0.3, 128, 16, 2, 3);
    let material = MaterialData {
        color: [0.85, 0.55, 0.3],
        metallic: 0.1,
        roughness: 0.4,
        ..MaterialData::new("placeholder")
    };
    ImportedModel::single_mesh("placeholder", mesh, material)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use viewer_core::components::{MeshRenderer, Transform};
    use viewer_render::loader::{ImportedMaterial, ImportedMesh, ImportedNode};

    fn three_meshes_two_materials() -> ImportedModel {
        let mut model = ImportedModel::single_mesh("dish", MeshData::cube(), MaterialData::new("glaze"));
        model.geometries.push(MeshData::sphere(8));
        model.materials.push(ImportedMaterial {
            material: MaterialData::new("sauce"),
            map: Some(0),
        });
        model.textures.push(viewer_render::asset_manager::TextureData::new("t", 1, 1, vec![255; 4]));
        for (name, geometry, material) in [("bowl", 1, 0), ("soup", 1, 1)] {
            model.nodes.push(ImportedNode {
                name: name.to_string(),
                parent: Some(0),
                transform: Transform::from_translation(2.0, 0.0, 0.0),
                mesh: Some(ImportedMesh {
                    geometry,
                    materials: vec![material],
                }),
            });
        }
        model
    }

    #[test]
    fn shared_materials_are_freed_once() {
        let mut scene = SceneGraph::new();
        let mut assets = AssetManager::new();
        let group = scene.spawn("group", Transform::default());
        let mut pipeline = LoadPipeline::new(LoaderRegistry::new());
        pipeline.install(&mut scene, &mut assets, group, &three_meshes_two_materials(), 0.5);

        let disposed = pipeline.dispose_current(&mut scene, &mut assets);
        assert_eq!(disposed.geometries, 2);
        assert_eq!(disposed.materials, 2);
        assert_eq!(disposed.textures, 1);
        assert_eq!(assets.geometry_count() + assets.material_count() + assets.texture_count(), 0);
        assert!(scene.children(group).is_empty());
        assert_eq!(pipeline.dispose_current(&mut scene, &mut assets), DisposedResources::default());
    }

    #[test]
    fn normalization_hits_target_radius_at_origin() {
        let mut scene = SceneGraph::new();
        let mut assets = AssetManager::new();
        let group = scene.spawn("group", Transform::default());
        let root = scene.spawn_child(group, "model", Transform::default());
        let mesh = scene.spawn_child(root, "mesh", Transform::from_translation(10.0, 4.0, 0.0));
        let geometry = assets.add_geometry(MeshData::cube());
        let material = assets.add_material(MaterialData::default());
        scene.set_mesh(mesh, MeshRenderer::new(geometry, material));

        normalize_subtree(&mut scene, &assets, root, 0.5);
        let sphere = subtree_bounds(&scene, &assets, root);
        assert_relative_eq!(sphere.radius, 0.5, epsilon = 1e-5);
        assert_relative_eq!(sphere.center.length(), 0.0, epsilon = 1e-5);
    }

    #[test]
    fn auto_frame_fills_the_fov() {
        let distance = auto_frame_distance(0.5, 50.0);
        assert_relative_eq!(distance, 0.6 / 25f32.to_radians().sin(), epsilon = 1e-6);
    }

    #[test]
    fn placeholder_is_deterministic() {
        assert_eq!(placeholder_model(), placeholder_model());
        assert!(placeholder_model().is_renderable());
    }

    #[test]
    fn generations_only_move_forward() {
        let mut pipeline = LoadPipeline::new(LoaderRegistry::new());
        let first = pipeline.next_generation();
        let second = pipeline.next_generation();
        assert!(second > first);
        assert!(!pipeline.is_current(first));
        assert!(pipeline.is_current(second));
    }

    #[test]
    fn unknown_extensions_fail_before_spawning() {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let pipeline = LoadPipeline::new(LoaderRegistry::with_file_loaders());
        assert!(pipeline.spawn_load(runtime.handle(), "model.xyz", 1).is_err());
    }
}
