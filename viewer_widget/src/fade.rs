//! Fade-in reveal of a freshly loaded model

use std::collections::BTreeSet;

use viewer_core::components::MaterialHandle;
use viewer_core::scene::{NodeId, SceneGraph};
use viewer_render::asset_manager::AssetManager;

use crate::render_loop::{FrameHandle, FrameQueue};

pub const FADE_DURATION_MS: f64 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq)]
struct FadedMaterial {
    handle: MaterialHandle,
    opacity: f32,
    transparent: bool,
}

/// Result of one fade tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeStep {
    Running,
    Complete,
}

/// Opacity animation over the eligible materials of one model
#[derive(Debug)]
pub struct FadeAnimation {
    pub generation: u64,
    handle: Option<FrameHandle>,
    started_ms: Option<f64>,
    materials: Vec<FadedMaterial>,
}

impl FadeAnimation {
    /// Make every opaque, normally blended material under `root` invisible
    /// and return the animation that brings it back. `None` when no
    /// material qualifies.
    pub fn begin(
        scene: &SceneGraph,
        assets: &mut AssetManager,
        root: NodeId,
        generation: u64,
    ) -> Option<Self> {
        let handles: BTreeSet<MaterialHandle> = scene
            .traverse_depth_first(root)
            .into_iter()
            .filter_map(|node| scene.mesh(node))
            .flat_map(|mesh| mesh.materials)
            .collect();

        let mut materials = Vec::new();
        for handle in handles {
            let Some(material) = assets.material_mut(handle) else {
                continue;
            };
            if !material.is_fade_eligible() {
                continue;
            }
            materials.push(FadedMaterial {
                handle,
                opacity: material.opacity,
                transparent: material.transparent,
            });
            material.opacity = 0.0;
            material.transparent = true;
        }

        if materials.is_empty() {
            return None;
        }
        Some(Self {
            generation,
            handle: None,
            started_ms: None,
            materials,
        })
    }

    /// Request the next fade tick
    pub fn schedule(&mut self, frames: &mut FrameQueue) {
        self.handle = Some(frames.request());
    }

    pub fn owns(&self, handle: FrameHandle) -> bool {
        self.handle == Some(handle)
    }

    /// Withdraw the outstanding tick so the fade stops advancing
    pub fn cancel(&mut self, frames: &mut FrameQueue) {
        if let Some(handle) = self.handle.take() {
            frames.cancel(handle);
        }
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Progress the fade to `now_ms`; the first tick marks the start
    pub fn tick(&mut self, assets: &mut AssetManager, now_ms: f64) -> FadeStep {
        let started = *self.started_ms.get_or_insert(now_ms);
        let t = ((now_ms - started) / FADE_DURATION_MS).clamp(0.0, 1.0) as f32;

        if t >= 1.0 {
            self.finish(assets);
            return FadeStep::Complete;
        }
        for faded in &self.materials {
            if let Some(material) = assets.material_mut(faded.handle) {
                material.opacity = faded.opacity * t;
            }
        }
        FadeStep::Running
    }

    /// Jump to the end state and restore the original flags
    pub fn finish(&self, assets: &mut AssetManager) {
        for faded in &self.materials {
            if let Some(material) = assets.material_mut(faded.handle) {
                material.opacity = faded.opacity;
                material.transparent = faded.transparent;
            }
        }
    }
}
