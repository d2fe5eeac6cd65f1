//! Image-based lighting baked from a synthetic reference scene
//!
//! [`reference_scene`] builds a small room of emissive panels for a preset and
//! [`EquirectBaker`] turns any scene of emissive meshes into an
//! equirectangular radiance texture.

use std::collections::BTreeSet;
use std::f32::consts::{PI, TAU};

use glam::{Quat, Vec2, Vec3};
use tracing::debug;
use viewer_core::components::{MeshRenderer, TextureHandle, Transform};
use viewer_core::config::EnvironmentPreset;
use viewer_core::scene::{Background, SceneGraph};

use crate::asset_manager::{AssetManager, MaterialData, TextureData};
use crate::mesh::MeshData;

/// Produces an environment texture from a scene
pub trait EnvironmentGenerator {
    /// Bake `scene` and register the result with `assets`
    fn from_scene(&mut self, scene: &SceneGraph, assets: &mut AssetManager) -> TextureHandle;
}

/// CPU equirectangular baker
#[derive(Debug, Clone)]
pub struct EquirectBaker {
    pub width: u32,
    pub height: u32,
    /// Exponent of the angular falloff around each panel
    pub sharpness: f32,
}

impl Default for EquirectBaker {
    fn default() -> Self {
        Self {
            width: 64,
            height: 32,
            sharpness: 6.0,
        }
    }
}

/// Emissive source seen from the origin
#[derive(Debug, Clone, Copy)]
struct Panel {
    direction: Vec3,
    radiance: Vec3,
}

impl EquirectBaker {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            ..Default::default()
        }
    }

    fn panels(scene: &SceneGraph, assets: &AssetManager) -> Vec<Panel> {
        scene
            .mesh_nodes()
            .into_iter()
            .filter(|node| scene.is_visible_in_hierarchy(*node))
            .filter_map(|node| {
                let mesh = scene.mesh(node)?;
                let material = assets.material(*mesh.materials.first()?)?;
                let radiance = Vec3::from_array(material.emissive);
                if radiance.max_element() <= 0.0 {
                    return None;
                }
                let direction = scene.world_position(node).try_normalize()?;
                Some(Panel {
                    direction,
                    radiance,
                })
            })
            .collect()
    }

    /// Radiance texture for `scene`, without registering it
    pub fn bake(&self, scene: &SceneGraph, assets: &AssetManager) -> TextureData {
        let panels = Self::panels(scene, assets);
        let base = match scene.background {
            Background::Color(color) => Vec3::new(color[0], color[1], color[2]),
            Background::Transparent => Vec3::ZERO,
        };

        let mut rgba = Vec::with_capacity((self.width * self.height * 4) as usize);
        for y in 0..self.height {
            for x in 0..self.width {
                let uv = Vec2::new(
                    (x as f32 + 0.5) / self.width as f32,
                    (y as f32 + 0.5) / self.height as f32,
                );
                let direction = equirect_direction(uv);
                let mut radiance = base;
                for panel in &panels {
                    let cosine = direction.dot(panel.direction).max(0.0);
                    radiance += panel.radiance * cosine.powf(self.sharpness);
                }
                // reinhard
                let mapped = radiance / (Vec3::ONE + radiance);
                rgba.extend(mapped.to_array().map(|c| (c * 255.0).round() as u8));
                rgba.push(255);
            }
        }

        debug!(panels = panels.len(), width = self.width, height = self.height, "baked environment");
        TextureData::new("environment", self.width, self.height, rgba)
    }
}

impl EnvironmentGenerator for EquirectBaker {
    fn from_scene(&mut self, scene: &SceneGraph, assets: &mut AssetManager) -> TextureHandle {
        let texture = self.bake(scene, assets);
        assets.add_texture(texture)
    }
}

/// Unit direction for equirectangular coordinates; v = 0 is straight up
pub fn equirect_direction(uv: Vec2) -> Vec3 {
    let phi = uv.x * TAU - PI;
    let theta = uv.y * PI;
    Vec3::new(theta.sin() * phi.sin(), theta.cos(), -theta.sin() * phi.cos())
}

/// Equirectangular coordinates of a direction
pub fn equirect_uv(direction: Vec3) -> Vec2 {
    let d = direction.normalize_or(Vec3::Y);
    let phi = d.x.atan2(-d.z);
    let theta = d.y.clamp(-1.0, 1.0).acos();
    Vec2::new((phi + PI) / TAU, theta / PI)
}

/// Radiance of an environment texture in `direction`
pub fn sample_equirect(texture: &TextureData, direction: Vec3) -> Vec3 {
    texture.sample(equirect_uv(direction))
}

/// (position, emissive rgb, size) of each panel in a preset
fn preset_panels(preset: EnvironmentPreset) -> &'static [([f32; 3], [f32; 3], f32)] {
    match preset {
        EnvironmentPreset::None => &[],
        EnvironmentPreset::Room => &[
            ([0.0, 6.0, 0.0], [3.0, 3.0, 3.0], 4.0),
            ([-6.0, 2.0, 0.0], [1.2, 1.1, 1.0], 3.0),
            ([6.0, 2.0, 0.0], [1.0, 1.1, 1.2], 3.0),
            ([0.0, 2.0, 6.0], [0.8, 0.8, 0.8], 3.0),
        ],
        EnvironmentPreset::Studio => &[
            ([-4.0, 4.0, 4.0], [5.0, 5.0, 5.0], 2.0),
            ([4.0, 2.0, 3.0], [1.5, 1.5, 1.5], 2.0),
            ([0.0, 3.0, -5.0], [2.5, 2.5, 2.5], 1.5),
        ],
        EnvironmentPreset::Sunset => &[
            ([8.0, 1.0, -6.0], [6.0, 2.6, 0.8], 2.0),
            ([0.0, 8.0, 0.0], [0.4, 0.6, 1.0], 6.0),
            ([-6.0, 0.5, 6.0], [0.5, 0.3, 0.4], 4.0),
        ],
    }
}

/// Synthetic room for `preset`; mesh resources are registered with `assets`
pub fn reference_scene(preset: EnvironmentPreset, assets: &mut AssetManager) -> SceneGraph {
    let mut scene = SceneGraph::new();
    scene.background = Background::Color(match preset {
        EnvironmentPreset::None => [0.0, 0.0, 0.0, 1.0],
        EnvironmentPreset::Room => [0.35, 0.35, 0.35, 1.0],
        EnvironmentPreset::Studio => [0.08, 0.08, 0.09, 1.0],
        EnvironmentPreset::Sunset => [0.25, 0.15, 0.18, 1.0],
    });

    let panels = preset_panels(preset);
    if panels.is_empty() {
        return scene;
    }
    let geometry = assets.add_geometry(MeshData::plane());
    for (index, (position, emissive, size)) in panels.iter().enumerate() {
        let position = Vec3::from_array(*position);
        // plane normal (+Y) faces the origin
        let rotation = Quat::from_rotation_arc(Vec3::Y, (-position).normalize_or(Vec3::NEG_Y));
        let material = assets.add_material(
            MaterialData::new(&format!("panel_{index}")).with_emissive(emissive[0], emissive[1], emissive[2]),
        );
        let node = scene.spawn(
            &format!("panel_{index}"),
            Transform::new(position, rotation, Vec3::splat(*size)),
        );
        scene.set_mesh(node, MeshRenderer::new(geometry, material));
    }
    scene
}

/// Free every distinct geometry and material a reference scene registered
pub fn dispose_reference_scene(scene: SceneGraph, assets: &mut AssetManager) {
    let mut geometries = BTreeSet::new();
    let mut materials = BTreeSet::new();
    for node in scene.mesh_nodes() {
        if let Some(mesh) = scene.mesh(node) {
            geometries.insert(mesh.geometry);
            materials.extend(mesh.materials);
        }
    }
    for geometry in geometries {
        assets.dispose_geometry(geometry);
    }
    for material in materials {
        assets.dispose_material(material);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn equirect_mapping_round_trips_the_poles_and_horizon() {
        for direction in [Vec3::Y, Vec3::NEG_Z, Vec3::X] {
            let back = equirect_direction(equirect_uv(direction));
            assert_relative_eq!(back.dot(direction), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn presets_build_emissive_panels() {
        let mut assets = AssetManager::new();
        let room = reference_scene(EnvironmentPreset::Room, &mut assets);
        assert_eq!(room.mesh_nodes().len(), 4);
        let none = reference_scene(EnvironmentPreset::None, &mut assets);
        assert!(none.mesh_nodes().is_empty());
    }

    #[test]
    fn baked_texture_is_brightest_towards_the_ceiling() {
        let mut assets = AssetManager::new();
        let scene = reference_scene(EnvironmentPreset::Room, &mut assets);
        let texture = EquirectBaker::default().bake(&scene, &assets);
        assert_eq!(texture.byte_len(), 64 * 32 * 4);

        let up = sample_equirect(&texture, Vec3::Y);
        let down = sample_equirect(&texture, Vec3::NEG_Y);
        assert!(up.x > down.x);
    }

    #[test]
    fn generator_registers_the_texture() {
        let mut assets = AssetManager::new();
        let scene = reference_scene(EnvironmentPreset::Sunset, &mut assets);
        let handle = EquirectBaker::new(8, 4).from_scene(&scene, &mut assets);
        assert_eq!(assets.texture(handle).map(|t| t.width), Some(8));
    }

    #[test]
    fn reference_scene_resources_are_released() {
        let mut assets = AssetManager::new();
        let scene = reference_scene(EnvironmentPreset::Studio, &mut assets);
        assert_eq!(assets.material_count(), 3);
        dispose_reference_scene(scene, &mut assets);
        assert_eq!(assets.material_count(), 0);
        assert_eq!(assets.geometry_count(), 0);
        assert_eq!(assets.disposal_stats().geometries, 1);
    }
}
