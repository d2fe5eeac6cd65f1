//! Viewer Core - state of the interactive model viewer
//!
//! Scene-graph arena, camera, configuration, gesture tracking and the camera
//! rig. Nothing in here performs I/O or talks to a renderer.

pub mod camera;
pub mod components;
pub mod config;
pub mod error;
pub mod gesture;
pub mod rig;
pub mod scene;

pub use camera::*;
pub use components::*;
pub use config::*;
pub use error::*;
pub use gesture::*;
pub use rig::*;
pub use scene::*;
