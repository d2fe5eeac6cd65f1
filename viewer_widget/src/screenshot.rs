//! Screenshot action
//!
//! Shadows are switched off and the ground is hidden for the capture so the
//! exported PNG holds only the model over a transparent background.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::{ImageFormat, RgbaImage};
use tracing::info;
use viewer_core::camera::PerspectiveCamera;
use viewer_core::error::{Result, ViewerError};
use viewer_core::scene::{NodeId, SceneGraph};
use viewer_render::asset_manager::AssetManager;
use viewer_render::renderer::RenderBackend;

pub const SCREENSHOT_FILE_NAME: &str = "model.png";

/// Encoded capture handed to the download sink
#[derive(Debug, Clone, PartialEq)]
pub struct Screenshot {
    pub file_name: String,
    pub png: Vec<u8>,
    pub data_url: String,
}

/// Where finished screenshots go
pub trait DownloadSink {
    fn download(&mut self, screenshot: &Screenshot) -> Result<()>;
}

/// Writes screenshots into a directory
#[derive(Debug, Clone)]
pub struct DirectoryDownloads {
    dir: PathBuf,
    pub saved: Vec<PathBuf>,
}

impl DirectoryDownloads {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            saved: Vec::new(),
        }
    }
}

impl DownloadSink for DirectoryDownloads {
    fn download(&mut self, screenshot: &Screenshot) -> Result<()> {
        let path = self.dir.join(&screenshot.file_name);
        std::fs::write(&path, &screenshot.png)?;
        info!(path = %path.display(), "screenshot saved");
        self.saved.push(path);
        Ok(())
    }
}

/// Keeps screenshots in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryDownloads {
    pub screenshots: Vec<Screenshot>,
}

impl DownloadSink for MemoryDownloads {
    fn download(&mut self, screenshot: &Screenshot) -> Result<()> {
        self.screenshots.push(screenshot.clone());
        Ok(())
    }
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| ViewerError::Screenshot(e.to_string()))?;
    Ok(png)
}

pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", STANDARD.encode(png))
}

/// Saved shadow and visibility state, put back by [`ShadowSuppression::restore`]
#[derive(Debug)]
pub struct ShadowSuppression {
    lights: Vec<(NodeId, bool)>,
    ground: Option<(NodeId, bool)>,
}

impl ShadowSuppression {
    pub fn apply(scene: &mut SceneGraph, lights: &[NodeId], ground: Option<NodeId>) -> Self {
        let mut saved = Vec::with_capacity(lights.len());
        for node in lights {
            let mut was = false;
            scene.update_light(*node, |light| {
                was = light.cast_shadow;
                light.cast_shadow = false;
            });
            saved.push((*node, was));
        }
        let ground = ground.map(|node| {
            let was = scene.is_visible(node);
            scene.set_visible(node, false);
            (node, was)
        });
        Self {
            lights: saved,
            ground,
        }
    }

    pub fn restore(self, scene: &mut SceneGraph) {
        for (node, cast_shadow) in self.lights {
            scene.update_light(node, |light| light.cast_shadow = cast_shadow);
        }
        if let Some((node, visible)) = self.ground {
            scene.set_visible(node, visible);
        }
    }
}

/// Everything a capture touches
pub struct CaptureTarget<'a> {
    pub scene: &'a mut SceneGraph,
    pub assets: &'a AssetManager,
    pub camera: &'a PerspectiveCamera,
    pub renderer: &'a mut dyn RenderBackend,
    pub lights: &'a [NodeId],
    pub ground: Option<NodeId>,
}

/// Render without shadows, encode, hand to `sink`, then restore the scene
pub fn capture(target: CaptureTarget<'_>, sink: &mut dyn DownloadSink) -> Result<Screenshot> {
    let CaptureTarget {
        scene,
        assets,
        camera,
        renderer,
        lights,
        ground,
    } = target;

    let suppression = ShadowSuppression::apply(scene, lights, ground);
    renderer.render(scene, assets, camera);
    let pixels = renderer.read_pixels();
    suppression.restore(scene);

    let png = encode_png(&pixels?)?;
    let screenshot = Screenshot {
        file_name: SCREENSHOT_FILE_NAME.to_string(),
        data_url: png_data_url(&png),
        png,
    };
    sink.download(&screenshot)?;
    info!(bytes = screenshot.png.len(), "screenshot captured");
    Ok(screenshot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use viewer_core::components::{Light, Transform};
    use viewer_render::renderer::HeadlessRenderer;

    #[test]
    fn suppression_restores_prior_state() {
        let mut scene = SceneGraph::new();
        let key = scene.spawn("key", Transform::default());
        scene.set_light(key, Light::directional(1.0).with_shadow());
        let fill = scene.spawn("fill", Transform::default());
        scene.set_light(fill, Light::directional(1.0));
        let ground = scene.spawn("ground", Transform::default());

        let suppression = ShadowSuppression::apply(&mut scene, &[key, fill], Some(ground));
        assert!(!scene.light(key).unwrap().cast_shadow);
        assert!(!scene.is_visible(ground));

        suppression.restore(&mut scene);
        assert!(scene.light(key).unwrap().cast_shadow);
        assert!(!scene.light(fill).unwrap().cast_shadow);
        assert!(scene.is_visible(ground));
    }

    #[test]
    fn capture_writes_model_png() {
        let dir = tempfile::tempdir().unwrap();
        let mut scene = SceneGraph::new();
        let assets = AssetManager::new();
        let mut renderer = HeadlessRenderer::new(4, 4);
        let mut sink = DirectoryDownloads::new(dir.path());

        let shot = capture(
            CaptureTarget {
                scene: &mut scene,
                assets: &assets,
                camera: &PerspectiveCamera::default(),
                renderer: &mut renderer,
                lights: &[],
                ground: None,
            },
            &mut sink,
        )
        .unwrap();

        assert_eq!(shot.file_name, "model.png");
        assert!(shot.data_url.starts_with("data:image/png;base64,"));
        let written = std::fs::read(dir.path().join("model.png")).unwrap();
        assert_eq!(written, shot.png);
        assert_eq!(&written[1..4], b"PNG");
    }

    #[test]
    fn disposed_renderer_fails_the_capture_but_restores_shadows() {
        let mut scene = SceneGraph::new();
        let key = scene.spawn("key", Transform::default());
        scene.set_light(key, Light::directional(1.0).with_shadow());
        let mut renderer = HeadlessRenderer::new(4, 4);
        renderer.dispose();

        let result = capture(
            CaptureTarget {
                scene: &mut scene,
                assets: &AssetManager::new(),
                camera: &PerspectiveCamera::default(),
                renderer: &mut renderer,
                lights: &[key],
                ground: None,
            },
            &mut MemoryDownloads::default(),
        );
        assert!(matches!(result, Err(ViewerError::Screenshot(_))));
        assert!(scene.light(key).unwrap().cast_shadow);
    }
}
