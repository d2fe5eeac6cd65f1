//! Viewer Render - resources, loaders and drawing
//!
//! Owns mesh/material/texture data, turns model files into scene subtrees and
//! draws scenes through a [`RenderBackend`].

pub mod asset_manager;
pub mod environment;
pub mod formats;
pub mod loader;
pub mod mesh;
pub mod renderer;

pub use asset_manager::*;
pub use environment::*;
pub use formats::*;
pub use loader::*;
pub use mesh::*;
pub use renderer::*;
