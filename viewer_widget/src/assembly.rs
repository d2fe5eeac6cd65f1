//! Scene Assembly - the parts of the scene that outlive model loads
//!
//! Lights, the ground shadow catcher, the environment map and the
//! pivot/group pair the loaded model hangs from.

use glam::{Quat, Vec3};
use tracing::info;
use viewer_core::components::{GeometryHandle, Light, MaterialHandle, MeshRenderer, ShadowFlags, Transform};
use viewer_core::config::{EnvironmentPreset, ViewerConfig};
use viewer_core::rig::RigNodes;
use viewer_core::scene::{Background, NodeId, SceneGraph};
use viewer_render::asset_manager::{AssetManager, MaterialData};
use viewer_render::environment::{EnvironmentGenerator, dispose_reference_scene, reference_scene};
use viewer_render::mesh::MeshData;

pub const KEY_LIGHT_POSITION: Vec3 = Vec3::new(3.0, 5.0, 4.0);
pub const FILL_LIGHT_POSITION: Vec3 = Vec3::new(-4.0, 2.0, 3.0);
pub const RIM_LIGHT_POSITION: Vec3 = Vec3::new(0.0, 4.0, -5.0);

/// Side length of the ground plane
const GROUND_SIZE: f32 = 20.0;
/// Gap between the bottom of the model and the ground
const GROUND_GAP: f32 = 0.01;
const GROUND_SHADOW_OPACITY: f32 = 0.25;

/// Light nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneLights {
    pub ambient: NodeId,
    pub key: NodeId,
    pub fill: NodeId,
    pub rim: NodeId,
}

impl SceneLights {
    pub fn all(&self) -> [NodeId; 4] {
        [self.ambient, self.key, self.fill, self.rim]
    }
}

/// Shadow-only plane under the model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroundPlane {
    pub node: NodeId,
    pub geometry: GeometryHandle,
    pub material: MaterialHandle,
}

/// Long-lived scene parts of one viewer instance
#[derive(Debug)]
pub struct SceneAssembly {
    pub lights: SceneLights,
    pub rig: RigNodes,
    pub ground: Option<GroundPlane>,
}

impl SceneAssembly {
    pub fn build(scene: &mut SceneGraph, assets: &mut AssetManager, config: &ViewerConfig) -> Self {
        scene.background = Background::Transparent;

        let ambient = scene.spawn("ambient_light", Transform::default());
        scene.set_light(ambient, Light::ambient(config.ambient_intensity));
        let key = scene.spawn("key_light", Transform::from_position(KEY_LIGHT_POSITION));
        scene.set_light(key, Light::directional(config.key_intensity).with_shadow());
        let fill = scene.spawn("fill_light", Transform::from_position(FILL_LIGHT_POSITION));
        scene.set_light(fill, Light::directional(config.fill_intensity));
        let rim = scene.spawn("rim_light", Transform::from_position(RIM_LIGHT_POSITION));
        scene.set_light(rim, Light::directional(config.rim_intensity));

        let geometry = assets.add_geometry(MeshData::plane());
        let material = assets.add_material(MaterialData::shadow_catcher(GROUND_SHADOW_OPACITY));
        let node = scene.spawn(
            "ground",
            Transform::new(
                Vec3::new(0.0, ground_height(config), 0.0),
                Quat::IDENTITY,
                Vec3::new(GROUND_SIZE, 1.0, GROUND_SIZE),
            ),
        );
        scene.set_mesh(node, MeshRenderer::new(geometry, material));
        scene.set_shadow(node, ShadowFlags::receive_only());

        let pivot = scene.spawn("pivot", Transform::default());
        let group = scene.spawn_child(pivot, "group", Transform::default());

        Self {
            lights: SceneLights {
                ambient,
                key,
                fill,
                rim,
            },
            rig: RigNodes { pivot, group },
            ground: Some(GroundPlane {
                node,
                geometry,
                material,
            }),
        }
    }

    pub fn update_light_intensities(&self, scene: &mut SceneGraph, config: &ViewerConfig) {
        let intensities = [
            config.ambient_intensity,
            config.key_intensity,
            config.fill_intensity,
            config.rim_intensity,
        ];
        for (node, intensity) in self.lights.all().into_iter().zip(intensities) {
            scene.update_light(node, |light| light.intensity = intensity);
        }
    }

    /// Rest the ground just below the normalized model
    pub fn place_ground(&self, scene: &mut SceneGraph, config: &ViewerConfig) {
        if let Some(ground) = self.ground {
            let height = ground_height(config);
            scene.update_transform(ground.node, |t| t.position.y = height);
        }
    }

    /// Replace the environment map for `preset`, freeing the previous one first
    pub fn rebuild_environment(
        &self,
        scene: &mut SceneGraph,
        assets: &mut AssetManager,
        generator: &mut dyn EnvironmentGenerator,
        preset: EnvironmentPreset,
    ) {
        dispose_environment(scene, assets);
        if !preset.is_enabled() {
            info!("environment lighting disabled");
            return;
        }
        let reference = reference_scene(preset, assets);
        let texture = generator.from_scene(&reference, assets);
        dispose_reference_scene(reference, assets);
        scene.environment = Some(texture);
        info!(?preset, "environment rebuilt");
    }

    pub fn dispose_ground(&mut self, scene: &mut SceneGraph, assets: &mut AssetManager) {
        if let Some(ground) = self.ground.take() {
            scene.despawn_recursive(ground.node);
            assets.dispose_geometry(ground.geometry);
            assets.dispose_material(ground.material);
        }
    }
}

/// Free the scene environment texture, if any
pub fn dispose_environment(scene: &mut SceneGraph, assets: &mut AssetManager) {
    if let Some(texture) = scene.environment.take() {
        assets.dispose_texture(texture);
    }
}

fn ground_height(config: &ViewerConfig) -> f32 {
    config.offset_y - config.target_radius - GROUND_GAP
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewer_render::environment::EquirectBaker;

    fn assembled() -> (SceneGraph, AssetManager, SceneAssembly) {
        let mut scene = SceneGraph::new();
        let mut assets = AssetManager::new();
        let assembly = SceneAssembly::build(&mut scene, &mut assets, &ViewerConfig::default());
        (scene, assets, assembly)
    }

    #[test]
    fn only_the_key_light_casts_shadows() {
        let (scene, _, assembly) = assembled();
        let casting: Vec<_> = assembly
            .lights
            .all()
            .into_iter()
            .filter(|node| scene.light(*node).is_some_and(|l| l.cast_shadow))
            .collect();
        assert_eq!(casting, vec![assembly.lights.key]);
    }

    #[test]
    fn group_hangs_from_pivot() {
        let (scene, _, assembly) = assembled();
        assert_eq!(scene.parent(assembly.rig.group), Some(assembly.rig.pivot));
        assert_eq!(scene.background, Background::Transparent);
    }

    #[test]
    fn light_intensities_follow_config() {
        let (mut scene, _, assembly) = assembled();
        let config = ViewerConfig {
            rim_intensity: 2.5,
            ambient_intensity: 0.1,
            ..Default::default()
        };
        assembly.update_light_intensities(&mut scene, &config);
        assert_eq!(scene.light(assembly.lights.rim).map(|l| l.intensity), Some(2.5));
        assert_eq!(scene.light(assembly.lights.ambient).map(|l| l.intensity), Some(0.1));
    }

    #[test]
    fn rebuild_frees_the_previous_environment() {
        let (mut scene, mut assets, assembly) = assembled();
        let mut baker = EquirectBaker::new(8, 4);
        assembly.rebuild_environment(&mut scene, &mut assets, &mut baker, EnvironmentPreset::Room);
        let first = scene.environment.unwrap();
        assembly.rebuild_environment(&mut scene, &mut assets, &mut baker, EnvironmentPreset::Studio);
        assert!(assets.texture(first).is_none());
        assert_eq!(assets.texture_count(), 1);

        assembly.rebuild_environment(&mut scene, &mut assets, &mut baker, EnvironmentPreset::None);
        assert!(scene.environment.is_none());
        assert_eq!(assets.texture_count(), 0);
    }

    #[test]
    fn ground_disposal_happens_once() {
        let (mut scene, mut assets, mut assembly) = assembled();
        let before = assets.disposal_stats();
        assembly.dispose_ground(&mut scene, &mut assets);
        assembly.dispose_ground(&mut scene, &mut assets);
        let after = assets.disposal_stats();
        assert_eq!(after.geometries - before.geometries, 1);
        assert_eq!(after.materials - before.materials, 1);
    }
}
