//! Viewer Widget - the interactive model viewer component
//!
//! Scene assembly, the asset load pipeline, fade-in, the render loop and the
//! screenshot action, wired together by [`ModelViewer`].

pub mod assembly;
pub mod fade;
pub mod overlay;
pub mod pipeline;
pub mod render_loop;
pub mod screenshot;
pub mod surface;
pub mod viewer;

pub use assembly::*;
pub use fade::*;
pub use overlay::*;
pub use pipeline::*;
pub use render_loop::*;
pub use screenshot::*;
pub use surface::*;
pub use viewer::*;
