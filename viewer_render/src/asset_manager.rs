//! Asset Manager with handle-based resource ownership
//!
//! Geometries, materials and textures live here and are referenced from the
//! scene graph by handle. Disposal is explicit and idempotent: freeing a
//! handle that is already gone is a no-op and is not counted.

use std::collections::HashMap;

use glam::{Vec2, Vec3};

use viewer_core::components::{GeometryHandle, MaterialHandle, TextureHandle};

use crate::mesh::MeshData;

/// Color blending mode of a material
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Blending {
    #[default]
    Normal,
    Additive,
}

/// Material data
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialData {
    pub name: String,
    pub color: [f32; 3],
    pub opacity: f32,
    pub transparent: bool,
    pub blending: Blending,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: [f32; 3],
    pub map: Option<TextureHandle>,
    /// Only darkens where shadows fall; otherwise invisible
    pub shadow_only: bool,
    pub depth_write: bool,
}

impl Default for MaterialData {
    fn default() -> Self {
        Self {
            name: "Default".to_string(),
            color: [1.0, 1.0, 1.0],
            opacity: 1.0,
            transparent: false,
            blending: Blending::Normal,
            metallic: 0.0,
            roughness: 0.5,
            emissive: [0.0, 0.0, 0.0],
            map: None,
            shadow_only: false,
            depth_write: true,
        }
    }
}

impl MaterialData {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn with_color(mut self, r: f32, g: f32, b: f32) -> Self {
        self.color = [r, g, b];
        self
    }

    pub fn with_emissive(mut self, r: f32, g: f32, b: f32) -> Self {
        self.emissive = [r, g, b];
        self
    }

    /// Material that only renders received shadows
    pub fn shadow_catcher(opacity: f32) -> Self {
        Self {
            name: "ShadowCatcher".to_string(),
            color: [0.0, 0.0, 0.0],
            opacity,
            transparent: true,
            shadow_only: true,
            depth_write: false,
            ..Default::default()
        }
    }

    /// Opaque and not additively blended
    pub fn is_fade_eligible(&self) -> bool {
        !self.transparent && self.blending != Blending::Additive
    }
}

/// RGBA8 texture data
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl TextureData {
    pub fn new(name: &str, width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            width,
            height,
            rgba,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.rgba.len()
    }

    /// Nearest-texel lookup as linear RGB in [0, 1]. u wraps, v is clamped.
    pub fn sample(&self, uv: Vec2) -> Vec3 {
        if self.width == 0 || self.height == 0 {
            return Vec3::ONE;
        }
        let x = (uv.x.rem_euclid(1.0) * self.width as f32) as u32;
        let y = (uv.y.clamp(0.0, 1.0) * self.height as f32) as u32;
        let index = ((y.min(self.height - 1) * self.width + x.min(self.width - 1)) * 4) as usize;
        match self.rgba.get(index..index + 3) {
            Some(rgb) => Vec3::new(rgb[0] as f32, rgb[1] as f32, rgb[2] as f32) / 255.0,
            None => Vec3::ONE,
        }
    }
}

/// Number of resources freed so far, by kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DisposalStats {
    pub geometries: usize,
    pub materials: usize,
    pub textures: usize,
}

/// Asset Manager - owns every resource the scene references
pub struct AssetManager {
    geometries: HashMap<u64, MeshData>,
    materials: HashMap<u64, MaterialData>,
    textures: HashMap<u64, TextureData>,
    next_id: u64,
    disposed: DisposalStats,
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetManager {
    pub fn new() -> Self {
        Self {
            geometries: HashMap::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            next_id: 1,
            disposed: DisposalStats::default(),
        }
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn add_geometry(&mut self, mesh: MeshData) -> GeometryHandle {
        let id = self.allocate_id();
        self.geometries.insert(id, mesh);
        GeometryHandle { id }
    }

    pub fn add_material(&mut self, material: MaterialData) -> MaterialHandle {
        let id = self.allocate_id();
        self.materials.insert(id, material);
        MaterialHandle { id }
    }

    pub fn add_texture(&mut self, texture: TextureData) -> TextureHandle {
        let id = self.allocate_id();
        self.textures.insert(id, texture);
        TextureHandle { id }
    }

    pub fn geometry(&self, handle: GeometryHandle) -> Option<&MeshData> {
        self.geometries.get(&handle.id)
    }

    pub fn geometry_mut(&mut self, handle: GeometryHandle) -> Option<&mut MeshData> {
        self.geometries.get_mut(&handle.id)
    }

    pub fn material(&self, handle: MaterialHandle) -> Option<&MaterialData> {
        self.materials.get(&handle.id)
    }

    pub fn material_mut(&mut self, handle: MaterialHandle) -> Option<&mut MaterialData> {
        self.materials.get_mut(&handle.id)
    }

    pub fn texture(&self, handle: TextureHandle) -> Option<&TextureData> {
        self.textures.get(&handle.id)
    }

    pub fn dispose_geometry(&mut self, handle: GeometryHandle) -> bool {
        let freed = self.geometries.remove(&handle.id).is_some();
        if freed {
            self.disposed.geometries += 1;
        }
        freed
    }

    pub fn dispose_material(&mut self, handle: MaterialHandle) -> bool {
        let freed = self.materials.remove(&handle.id).is_some();
        if freed {
            self.disposed.materials += 1;
        }
        freed
    }

    pub fn dispose_texture(&mut self, handle: TextureHandle) -> bool {
        let freed = self.textures.remove(&handle.id).is_some();
        if freed {
            self.disposed.textures += 1;
        }
        freed
    }

    pub fn geometry_count(&self) -> usize {
        self.geometries.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn disposal_stats(&self) -> DisposalStats {
        self.disposed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposal_is_counted_once() {
        let mut assets = AssetManager::new();
        let geometry = assets.add_geometry(MeshData::cube());
        let material = assets.add_material(MaterialData::new("plate"));

        assert!(assets.dispose_geometry(geometry));
        assert!(!assets.dispose_geometry(geometry));
        assert!(assets.dispose_material(material));
        assert!(!assets.dispose_material(MaterialHandle::invalid()));

        let stats = assets.disposal_stats();
        assert_eq!(stats.geometries, 1);
        assert_eq!(stats.materials, 1);
        assert_eq!(assets.geometry_count(), 0);
    }

    #[test]
    fn sampling_clamps_v_and_wraps_u() {
        // top row red, yellow; bottom row blue, cyan
        let texture = TextureData::new(
            "rows",
            2,
            2,
            vec![
                255, 0, 0, 255, 255, 255, 0, 255, //
                0, 0, 255, 255, 0, 255, 255, 255,
            ],
        );
        assert_eq!(texture.sample(Vec2::new(0.25, 0.0)), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(texture.sample(Vec2::new(0.25, 1.0)), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(texture.sample(Vec2::new(0.25, 1.5)), Vec3::new(0.0, 0.0, 1.0));
        assert_eq!(texture.sample(Vec2::new(0.25, -0.5)), Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(texture.sample(Vec2::new(1.75, 0.0)), Vec3::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn handles_are_unique_across_kinds() {
        let mut assets = AssetManager::new();
        let geometry = assets.add_geometry(MeshData::plane());
        let material = assets.add_material(MaterialData::default());
        assert_ne!(geometry.id, material.id);
        assert!(geometry.is_valid() && material.is_valid());
    }

    #[test]
    fn fade_eligibility_skips_transparent_and_additive() {
        assert!(MaterialData::default().is_fade_eligible());
        assert!(!MaterialData::shadow_catcher(0.3).is_fade_eligible());
        let glow = MaterialData {
            blending: Blending::Additive,
            ..Default::default()
        };
        assert!(!glow.is_fade_eligible());
    }
}
