//! Renderer - draws the scene graph into an RGBA framebuffer
//!
//! [`RenderBackend`] is the seam the viewer renders through. The bundled
//! [`HeadlessRenderer`] is a CPU point splatter: every vertex of every visible
//! mesh is projected through the camera and shaded with a lambert term, which
//! is enough for previews, screenshots and tests without a GPU context.

use glam::{Vec2, Vec3, Vec4};
use image::RgbaImage;
use tracing::debug;
use viewer_core::camera::PerspectiveCamera;
use viewer_core::components::{LightKind, TextureHandle};
use viewer_core::error::{Result, ViewerError};
use viewer_core::scene::{Background, SceneGraph};

use crate::asset_manager::{AssetManager, Blending, MaterialData, TextureData};
use crate::environment::sample_equirect;

/// Contribution of the scene environment map to diffuse lighting
const ENVIRONMENT_STRENGTH: f32 = 0.35;

/// Drawing backend used by the viewer
pub trait RenderBackend {
    /// Resize the drawing buffer; zero sizes are ignored
    fn set_size(&mut self, width: u32, height: u32);

    fn size(&self) -> (u32, u32);

    /// Draw one frame
    fn render(&mut self, scene: &SceneGraph, assets: &AssetManager, camera: &PerspectiveCamera);

    /// Copy of the last rendered frame
    fn read_pixels(&self) -> Result<RgbaImage>;

    /// Number of frames drawn so far
    fn frame_count(&self) -> u64;

    /// Release the drawing context; later renders are ignored
    fn dispose(&mut self);

    fn is_disposed(&self) -> bool;
}

/// Per-frame lighting gathered from the scene
#[derive(Debug, Clone, Default)]
struct Lighting {
    ambient: Vec3,
    /// (direction towards the light, color * intensity)
    directional: Vec<(Vec3, Vec3)>,
    shadows: bool,
    environment: Option<TextureHandle>,
}

impl Lighting {
    fn gather(scene: &SceneGraph) -> Self {
        let mut lighting = Lighting {
            environment: scene.environment,
            ..Default::default()
        };
        for node in scene.light_nodes() {
            if !scene.is_visible_in_hierarchy(node) {
                continue;
            }
            let Some(light) = scene.light(node) else {
                continue;
            };
            let radiance = light.color * light.intensity;
            match light.kind {
                LightKind::Ambient => lighting.ambient += radiance,
                LightKind::Directional => {
                    let direction = scene.world_position(node).normalize_or(Vec3::Y);
                    lighting.directional.push((direction, radiance));
                    lighting.shadows |= light.cast_shadow;
                }
            }
        }
        lighting
    }

    fn shade(&self, normal: Vec3, assets: &AssetManager) -> Vec3 {
        let mut light = self.ambient;
        for (direction, radiance) in &self.directional {
            light += *radiance * normal.dot(*direction).max(0.0);
        }
        if let Some(texture) = self.environment.and_then(|handle| assets.texture(handle)) {
            light += sample_equirect(texture, normal) * ENVIRONMENT_STRENGTH;
        }
        light
    }
}

/// Point-splatting software renderer
pub struct HeadlessRenderer {
    width: u32,
    height: u32,
    color: Vec<[f32; 4]>,
    depth: Vec<f32>,
    frames: u64,
    disposed: bool,
}

impl HeadlessRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        let mut renderer = Self {
            width: 1,
            height: 1,
            color: Vec::new(),
            depth: Vec::new(),
            frames: 0,
            disposed: false,
        };
        renderer.set_size(width.max(1), height.max(1));
        renderer
    }

    fn clear(&mut self, background: Background) {
        let clear = match background {
            Background::Transparent => [0.0; 4],
            Background::Color(color) => color,
        };
        self.color.fill(clear);
        self.depth.fill(f32::INFINITY);
    }

    fn splat(&mut self, ndc: Vec3, rgb: Vec3, alpha: f32, blending: Blending, depth_write: bool) {
        if ndc.x.abs() > 1.0 || ndc.y.abs() > 1.0 || ndc.z.abs() > 1.0 {
            return;
        }
        let x = (((ndc.x + 1.0) * 0.5) * self.width as f32) as u32;
        let y = (((1.0 - ndc.y) * 0.5) * self.height as f32) as u32;
        let index = (y.min(self.height - 1) * self.width + x.min(self.width - 1)) as usize;
        if ndc.z > self.depth[index] {
            return;
        }
        if depth_write {
            self.depth[index] = ndc.z;
        }

        let dst = &mut self.color[index];
        match blending {
            Blending::Normal => {
                for (channel, src) in dst.iter_mut().zip(rgb.to_array()) {
                    *channel = src * alpha + *channel * (1.0 - alpha);
                }
                dst[3] = alpha + dst[3] * (1.0 - alpha);
            }
            Blending::Additive => {
                for (channel, src) in dst.iter_mut().zip(rgb.to_array()) {
                    *channel = (*channel + src * alpha).min(1.0);
                }
                dst[3] = (dst[3] + alpha).min(1.0);
            }
        }
    }
}

impl Default for HeadlessRenderer {
    fn default() -> Self {
        Self::new(400, 400)
    }
}

impl RenderBackend for HeadlessRenderer {
    fn set_size(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.width = width;
        self.height = height;
        let len = (width * height) as usize;
        self.color = vec![[0.0; 4]; len];
        self.depth = vec![f32::INFINITY; len];
    }

    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn render(&mut self, scene: &SceneGraph, assets: &AssetManager, camera: &PerspectiveCamera) {
        if self.disposed {
            debug!("render after dispose ignored");
            return;
        }
        self.clear(scene.background);

        let lighting = Lighting::gather(scene);
        let view_projection = camera.view_projection();

        for node in scene.mesh_nodes() {
            if !scene.is_visible_in_hierarchy(node) {
                continue;
            }
            let Some(renderer) = scene.mesh(node) else {
                continue;
            };
            let Some(mesh) = assets.geometry(renderer.geometry) else {
                continue;
            };
            let Some(material) = renderer
                .materials
                .first()
                .and_then(|handle| assets.material(*handle))
            else {
                continue;
            };
            if material.shadow_only && !(lighting.shadows && scene.shadow(node).receive) {
                continue;
            }
            let texture = material.map.and_then(|handle| assets.texture(handle));

            let world = scene.world_matrix(node);
            let mvp = view_projection * world;
            for vertex in &mesh.vertices {
                let clip = mvp * Vec4::from((vertex.position, 1.0));
                if clip.w <= 0.0 {
                    continue;
                }
                let ndc = clip.truncate() / clip.w;
                let rgb = if material.shadow_only {
                    Vec3::ZERO
                } else {
                    let normal = world.transform_vector3(vertex.normal).normalize_or_zero();
                    surface_color(material, texture, vertex.texcoord) * lighting.shade(normal, assets)
                        + Vec3::from_array(material.emissive)
                };
                self.splat(
                    ndc,
                    rgb.clamp(Vec3::ZERO, Vec3::ONE),
                    material.opacity.clamp(0.0, 1.0),
                    material.blending,
                    material.depth_write,
                );
            }
        }

        self.frames += 1;
    }

    fn read_pixels(&self) -> Result<RgbaImage> {
        if self.disposed {
            return Err(ViewerError::Screenshot("renderer has been disposed".to_string()));
        }
        let bytes: Vec<u8> = self
            .color
            .iter()
            .flat_map(|pixel| pixel.map(|channel| (channel.clamp(0.0, 1.0) * 255.0).round() as u8))
            .collect();
        RgbaImage::from_raw(self.width, self.height, bytes)
            .ok_or_else(|| ViewerError::Screenshot("framebuffer size mismatch".to_string()))
    }

    fn frame_count(&self) -> u64 {
        self.frames
    }

    fn dispose(&mut self) {
        if !self.disposed {
            self.disposed = true;
            self.color = Vec::new();
            self.depth = Vec::new();
            debug!(frames = self.frames, "headless renderer disposed");
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed
    }
}

fn surface_color(material: &MaterialData, texture: Option<&TextureData>, uv: Vec2) -> Vec3 {
    let base = Vec3::from_array(material.color);
    match texture {
        Some(texture) => base * texture.sample(uv),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshData;
    use viewer_core::components::{Light, MeshRenderer, Transform};

    fn lit_cube(material: MaterialData) -> (SceneGraph, AssetManager) {
        let mut scene = SceneGraph::new();
        let mut assets = AssetManager::new();
        let geometry = assets.add_geometry(MeshData::sphere(16));
        let material = assets.add_material(material);
        let node = scene.spawn("ball", Transform::default());
        scene.set_mesh(node, MeshRenderer::new(geometry, material));
        let ambient = scene.spawn("ambient", Transform::default());
        scene.set_light(ambient, Light::ambient(1.0));
        (scene, assets)
    }

    fn opaque_pixels(image: &RgbaImage) -> usize {
        image.pixels().filter(|p| p.0[3] > 0).count()
    }

    #[test]
    fn transparent_background_clears_to_zero_alpha() {
        let scene = SceneGraph::new();
        let assets = AssetManager::new();
        let mut renderer = HeadlessRenderer::new(8, 8);
        renderer.render(&scene, &assets, &PerspectiveCamera::default());
        let image = renderer.read_pixels().unwrap();
        assert_eq!(opaque_pixels(&image), 0);
        assert_eq!(renderer.frame_count(), 1);
    }

    #[test]
    fn visible_mesh_covers_pixels() {
        let (scene, assets) = lit_cube(MaterialData::default());
        let mut renderer = HeadlessRenderer::new(32, 32);
        renderer.render(&scene, &assets, &PerspectiveCamera::default());
        assert!(opaque_pixels(&renderer.read_pixels().unwrap()) > 0);
    }

    #[test]
    fn hidden_nodes_are_skipped() {
        let (mut scene, assets) = lit_cube(MaterialData::default());
        let ball = scene.mesh_nodes()[0];
        scene.set_visible(ball, false);
        let mut renderer = HeadlessRenderer::new(32, 32);
        renderer.render(&scene, &assets, &PerspectiveCamera::default());
        assert_eq!(opaque_pixels(&renderer.read_pixels().unwrap()), 0);
    }

    #[test]
    fn zero_opacity_leaves_the_frame_clear() {
        let mut material = MaterialData::default();
        material.opacity = 0.0;
        material.transparent = true;
        let (scene, assets) = lit_cube(material);
        let mut renderer = HeadlessRenderer::new(32, 32);
        renderer.render(&scene, &assets, &PerspectiveCamera::default());
        assert_eq!(opaque_pixels(&renderer.read_pixels().unwrap()), 0);
    }

    #[test]
    fn disposed_renderer_refuses_readback() {
        let mut renderer = HeadlessRenderer::new(4, 4);
        renderer.dispose();
        renderer.dispose();
        assert!(renderer.is_disposed());
        assert!(matches!(renderer.read_pixels(), Err(ViewerError::Screenshot(_))));
        renderer.render(&SceneGraph::new(), &AssetManager::new(), &PerspectiveCamera::default());
        assert_eq!(renderer.frame_count(), 0);
    }

    #[test]
    fn zero_size_is_ignored() {
        let mut renderer = HeadlessRenderer::new(10, 20);
        renderer.set_size(0, 5);
        assert_eq!(renderer.size(), (10, 20));
    }
}
