//! modelview - interactive 3D model viewer
//!
//! - `viewer_core`: scene graph arena (hecs), camera, config, gestures, camera rig
//! - `viewer_render`: resources, model loaders, headless renderer, environment baking
//! - `viewer_widget`: the `ModelViewer` component and its load/render pipeline

pub use viewer_core;
pub use viewer_render;
pub use viewer_widget;
