//! Scene-graph components shared by the viewer crates

use glam::{EulerRot, Mat4, Quat, Vec3};

/// Transform component - position, rotation, and scale of a node
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new(position: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            position,
            rotation,
            scale,
        }
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn from_translation(x: f32, y: f32, z: f32) -> Self {
        Self::from_position(Vec3::new(x, y, z))
    }

    /// Get the model matrix (local transform)
    pub fn to_mat4(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }

    /// Set rotation from XYZ euler angles in radians
    pub fn set_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Quat::from_euler(EulerRot::XYZ, x, y, z);
    }

    /// Get forward direction (negative Z in local space)
    pub fn forward(&self) -> Vec3 {
        self.rotation * -Vec3::Z
    }

    /// Translate by delta
    pub fn translate(&mut self, delta: Vec3) {
        self.position += delta;
    }
}

macro_rules! resource_handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name {
            pub id: u64,
        }

        impl $name {
            pub fn invalid() -> Self {
                Self { id: 0 }
            }

            pub fn is_valid(&self) -> bool {
                self.id != 0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::invalid()
            }
        }
    };
}

resource_handle!(
    /// Handle to a geometry buffer owned by the asset manager
    GeometryHandle
);
resource_handle!(
    /// Handle to a material owned by the asset manager
    MaterialHandle
);
resource_handle!(
    /// Handle to a texture owned by the asset manager
    TextureHandle
);

/// Mesh renderer component - one geometry drawn with one or more material slots
#[derive(Debug, Clone, PartialEq)]
pub struct MeshRenderer {
    pub geometry: GeometryHandle,
    pub materials: Vec<MaterialHandle>,
}

impl MeshRenderer {
    pub fn new(geometry: GeometryHandle, material: MaterialHandle) -> Self {
        Self {
            geometry,
            materials: vec![material],
        }
    }

    pub fn with_materials(geometry: GeometryHandle, materials: Vec<MaterialHandle>) -> Self {
        Self {
            geometry,
            materials,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.geometry.is_valid()
    }
}

/// Kind of light source
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Ambient,
    /// Shines from the node position towards the origin
    Directional,
}

/// Light component
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub cast_shadow: bool,
}

impl Light {
    pub fn ambient(intensity: f32) -> Self {
        Self {
            kind: LightKind::Ambient,
            color: Vec3::ONE,
            intensity,
            cast_shadow: false,
        }
    }

    pub fn directional(intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color: Vec3::ONE,
            intensity,
            cast_shadow: false,
        }
    }

    pub fn with_shadow(mut self) -> Self {
        self.cast_shadow = true;
        self
    }
}

/// Shadow participation of a mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShadowFlags {
    pub cast: bool,
    pub receive: bool,
}

impl ShadowFlags {
    pub fn receive_only() -> Self {
        Self {
            cast: false,
            receive: true,
        }
    }

    pub fn cast_and_receive() -> Self {
        Self {
            cast: true,
            receive: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn default_handles_are_invalid() {
        assert!(!GeometryHandle::default().is_valid());
        assert!(!MaterialHandle::default().is_valid());
        assert!(TextureHandle { id: 3 }.is_valid());
    }

    #[test]
    fn euler_rotation_turns_forward_axis() {
        let mut transform = Transform::default();
        transform.set_euler(0.0, std::f32::consts::FRAC_PI_2, 0.0);
        let forward = transform.forward();
        assert_relative_eq!(forward.x, -1.0, epsilon = 1e-5);
        assert_relative_eq!(forward.z, 0.0, epsilon = 1e-5);
    }
}
