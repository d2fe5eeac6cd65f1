//! Gesture tracker - raw pointer, touch and wheel input to rig updates

use glam::Vec2;

use crate::config::ViewerConfig;
use crate::rig::CameraRig;

/// Radians of rotation per dragged pixel
pub const ROTATE_SENSITIVITY: f32 = 0.005;
/// Zoom distance per unit of wheel delta
pub const WHEEL_ZOOM_SENSITIVITY: f32 = 0.002;
/// Zoom distance per pixel of pinch distance change
pub const PINCH_ZOOM_SENSITIVITY: f32 = 0.005;
/// Largest hover tilt on either axis, in degrees
pub const MAX_HOVER_ANGLE_DEGREES: f32 = 6.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerType {
    Mouse,
    Pen,
    Touch,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchPoint {
    pub id: u64,
    pub position: Vec2,
}

impl TouchPoint {
    pub fn new(id: u64, x: f32, y: f32) -> Self {
        Self {
            id,
            position: Vec2::new(x, y),
        }
    }
}

/// Input event as delivered by the host page
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    /// Global (window-level) pointer movement; `viewport` is the window size
    PointerMove {
        position: Vec2,
        pointer_type: PointerType,
        viewport: Vec2,
    },
    PointerDown {
        position: Vec2,
        pointer_type: PointerType,
    },
    PointerUp,
    TouchStart {
        touches: Vec<TouchPoint>,
    },
    TouchMove {
        touches: Vec<TouchPoint>,
    },
    /// `touches` lists the touches still on the surface
    TouchEnd {
        touches: Vec<TouchPoint>,
    },
    Wheel {
        delta_y: f32,
    },
    Blur,
}

/// What the host should do with the native event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputResponse {
    Ignored,
    Handled,
    /// Handled, and the default page action (scrolling) must be suppressed
    PreventDefault,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
enum GestureSession {
    #[default]
    Idle,
    Drag {
        last: Vec2,
    },
    Pinch {
        start_distance: f32,
        start_zoom: f32,
    },
}

#[derive(Debug, Clone, Default)]
pub struct GestureTracker {
    session: GestureSession,
    pointer_ndc: Option<Vec2>,
}

impl GestureTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.session, GestureSession::Drag { .. })
    }

    pub fn is_pinching(&self) -> bool {
        matches!(self.session, GestureSession::Pinch { .. })
    }

    /// Most recent mouse position in normalized device coordinates
    pub fn pointer_ndc(&self) -> Option<Vec2> {
        self.pointer_ndc
    }

    pub fn handle(
        &mut self,
        event: &InputEvent,
        config: &ViewerConfig,
        rig: &mut CameraRig,
    ) -> InputResponse {
        match event {
            InputEvent::PointerMove {
                position,
                pointer_type,
                viewport,
            } => {
                let mut response = InputResponse::Ignored;
                if *pointer_type == PointerType::Mouse {
                    self.track_hover(*position, *viewport, config, rig);
                    response = InputResponse::Handled;
                }
                if *pointer_type != PointerType::Touch && self.drag_move(*position, config, rig) {
                    response = InputResponse::Handled;
                }
                response
            }
            InputEvent::PointerDown {
                position,
                pointer_type,
            } => {
                // touch pointers arrive again as touch events
                if *pointer_type == PointerType::Touch {
                    return InputResponse::Ignored;
                }
                self.drag_start(*position, config)
            }
            InputEvent::PointerUp | InputEvent::Blur => {
                self.end_sessions(rig);
                InputResponse::Handled
            }
            InputEvent::TouchStart { touches } => self.touch_start(touches, config, rig),
            InputEvent::TouchMove { touches } => self.touch_move(touches, config, rig),
            InputEvent::TouchEnd { touches } => {
                match touches.len() {
                    0 => self.end_sessions(rig),
                    _ => {
                        if self.is_pinching() {
                            rig.commit_zoom_baseline();
                            self.session = GestureSession::Idle;
                        }
                    }
                }
                InputResponse::Handled
            }
            InputEvent::Wheel { delta_y } => self.wheel(*delta_y, config, rig),
        }
    }

    fn track_hover(
        &mut self,
        position: Vec2,
        viewport: Vec2,
        config: &ViewerConfig,
        rig: &mut CameraRig,
    ) {
        if !config.enable_mouse_parallax && !config.enable_hover_rotation {
            rig.parallax.target = Vec2::ZERO;
            rig.hover.target = Vec2::ZERO;
            return;
        }
        let ndc = window_ndc(position, viewport);
        self.pointer_ndc = Some(ndc);

        rig.parallax.target = if config.enable_mouse_parallax {
            -ndc * config.parallax_strength
        } else {
            Vec2::ZERO
        };

        let max_angle = MAX_HOVER_ANGLE_DEGREES.to_radians();
        rig.hover.target = if config.enable_hover_rotation {
            Vec2::new(ndc.y * max_angle, ndc.x * max_angle)
        } else {
            Vec2::ZERO
        };
    }

    fn drag_start(&mut self, position: Vec2, config: &ViewerConfig) -> InputResponse {
        if !config.enable_manual_rotation {
            return InputResponse::Ignored;
        }
        self.session = GestureSession::Drag { last: position };
        InputResponse::Handled
    }

    fn drag_move(&mut self, position: Vec2, config: &ViewerConfig, rig: &mut CameraRig) -> bool {
        let GestureSession::Drag { last } = self.session else {
            return false;
        };
        if !config.enable_manual_rotation {
            self.session = GestureSession::Idle;
            return false;
        }
        let delta = (position - last) * ROTATE_SENSITIVITY;
        rig.rotate_by(delta.x, delta.y);
        self.session = GestureSession::Drag { last: position };
        true
    }

    fn touch_start(
        &mut self,
        touches: &[TouchPoint],
        config: &ViewerConfig,
        rig: &mut CameraRig,
    ) -> InputResponse {
        match touches {
            [] => InputResponse::Ignored,
            [single] => self.drag_start(single.position, config),
            [first, second, ..] => self.pinch_start(first, second, config, rig),
        }
    }

    fn touch_move(
        &mut self,
        touches: &[TouchPoint],
        config: &ViewerConfig,
        rig: &mut CameraRig,
    ) -> InputResponse {
        match touches {
            [] => InputResponse::Ignored,
            [single] => {
                if self.drag_move(single.position, config, rig) {
                    InputResponse::Handled
                } else {
                    InputResponse::Ignored
                }
            }
            [first, second, ..] => {
                if !self.is_pinching() {
                    // second finger landed mid-drag
                    return self.pinch_start(first, second, config, rig);
                }
                self.pinch_move(first, second, config, rig)
            }
        }
    }

    fn pinch_start(
        &mut self,
        first: &TouchPoint,
        second: &TouchPoint,
        config: &ViewerConfig,
        rig: &mut CameraRig,
    ) -> InputResponse {
        self.session = GestureSession::Idle;
        if !config.enable_manual_zoom {
            return InputResponse::Ignored;
        }
        self.session = GestureSession::Pinch {
            start_distance: first.position.distance(second.position),
            start_zoom: rig.pinch_baseline(),
        };
        InputResponse::PreventDefault
    }

    fn pinch_move(
        &mut self,
        first: &TouchPoint,
        second: &TouchPoint,
        config: &ViewerConfig,
        rig: &mut CameraRig,
    ) -> InputResponse {
        let GestureSession::Pinch {
            start_distance,
            start_zoom,
        } = self.session
        else {
            return InputResponse::Ignored;
        };
        if !config.enable_manual_zoom {
            return InputResponse::Ignored;
        }
        let distance = first.position.distance(second.position);
        rig.set_zoom(
            start_zoom + (start_distance - distance) * PINCH_ZOOM_SENSITIVITY,
            false,
        );
        InputResponse::PreventDefault
    }

    fn wheel(&mut self, delta_y: f32, config: &ViewerConfig, rig: &mut CameraRig) -> InputResponse {
        if !config.enable_manual_zoom {
            return InputResponse::Ignored;
        }
        let zoom = rig.zoom() + delta_y * WHEEL_ZOOM_SENSITIVITY;
        rig.set_zoom(zoom, true);
        InputResponse::PreventDefault
    }

    fn end_sessions(&mut self, rig: &mut CameraRig) {
        if self.is_pinching() {
            rig.commit_zoom_baseline();
        }
        self.session = GestureSession::Idle;
    }
}

/// Window position to normalized device coordinates, y up
fn window_ndc(position: Vec2, viewport: Vec2) -> Vec2 {
    let size = viewport.max(Vec2::ONE);
    Vec2::new(
        (position.x / size.x) * 2.0 - 1.0,
        -(position.y / size.y) * 2.0 + 1.0,
    )
}
