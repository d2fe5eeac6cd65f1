//! Host container the viewer draws into

use tracing::debug;

/// Container element provided by the embedding page
pub trait RenderSurface {
    /// Create the canvas and append it to the container
    fn attach_canvas(&mut self, width: u32, height: u32);

    /// Whether the canvas is still a child of the container
    fn canvas_is_child(&self) -> bool;

    fn remove_canvas(&mut self);

    /// Resize the container and canvas
    fn resize(&mut self, width: u32, height: u32);
}

/// In-memory surface for headless hosts
#[derive(Debug, Clone, Default)]
pub struct HeadlessSurface {
    pub canvas: Option<(u32, u32)>,
    /// Set when the host moved the canvas elsewhere
    pub reparented: bool,
    pub removals: usize,
}

impl HeadlessSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RenderSurface for HeadlessSurface {
    fn attach_canvas(&mut self, width: u32, height: u32) {
        self.canvas = Some((width, height));
        self.reparented = false;
    }

    fn canvas_is_child(&self) -> bool {
        self.canvas.is_some() && !self.reparented
    }

    fn remove_canvas(&mut self) {
        if self.canvas.take().is_some() {
            self.removals += 1;
            debug!("canvas removed from container");
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        if let Some(canvas) = self.canvas.as_mut() {
            *canvas = (width, height);
        }
    }
}
