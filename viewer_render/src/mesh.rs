//! Mesh data and procedural primitives
//!
//! MeshData holds geometry ready for upload: positions, normals, UVs and
//! triangle indices.

use std::f32::consts::{PI, TAU};

use glam::{Mat4, Vec2, Vec3};

/// Vertex data for rendering
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub texcoord: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, texcoord: Vec2) -> Self {
        Self {
            position,
            normal,
            texcoord,
        }
    }

    /// Pack the vertex as [px, py, pz, nx, ny, nz, u, v]
    pub fn to_packed(&self) -> [f32; 8] {
        [
            self.position.x,
            self.position.y,
            self.position.z,
            self.normal.x,
            self.normal.y,
            self.normal.z,
            self.texcoord.x,
            self.texcoord.y,
        ]
    }
}

/// Axis-aligned bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&mut self, other: &Aabb) {
        if !other.is_empty() {
            self.expand(other.min);
            self.expand(other.max);
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Sphere enclosing the box: box center, half the diagonal
    pub fn bounding_sphere(&self) -> BoundingSphere {
        if self.is_empty() {
            return BoundingSphere {
                center: Vec3::ZERO,
                radius: 0.0,
            };
        }
        BoundingSphere {
            center: self.center(),
            radius: (self.max - self.min).length() * 0.5,
        }
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}

/// Mesh data - raw geometry ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshData {
    pub fn new(name: &str, vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self {
            name: name.to_string(),
            vertices,
            indices,
        }
    }

    /// Build from positions and triangles, deriving smooth normals
    pub fn from_triangles(name: &str, positions: &[Vec3], triangles: &[[u32; 3]]) -> Self {
        let vertices = positions
            .iter()
            .map(|p| Vertex::new(*p, Vec3::ZERO, Vec2::ZERO))
            .collect();
        let indices = triangles.iter().flat_map(|tri| tri.iter().copied()).collect();
        let mut mesh = Self::new(name, vertices, indices);
        mesh.ensure_normals();
        mesh
    }

    /// Make sure every vertex has a usable normal.
    /// If any normal is zero, all of them are rebuilt from area-weighted faces.
    pub fn ensure_normals(&mut self) {
        let has_zero_normals = self
            .vertices
            .iter()
            .any(|v| v.normal.length_squared() < 1e-6);

        if !has_zero_normals {
            return;
        }

        for v in &mut self.vertices {
            v.normal = Vec3::ZERO;
        }

        for tri in self.indices.chunks(3) {
            if tri.len() < 3 {
                continue;
            }
            let i0 = tri[0] as usize;
            let i1 = tri[1] as usize;
            let i2 = tri[2] as usize;
            if i0 >= self.vertices.len() || i1 >= self.vertices.len() || i2 >= self.vertices.len() {
                continue;
            }
            let p0 = self.vertices[i0].position;
            let p1 = self.vertices[i1].position;
            let p2 = self.vertices[i2].position;
            // unnormalized: magnitude weights by triangle area
            let face_normal = (p1 - p0).cross(p2 - p0);
            self.vertices[i0].normal += face_normal;
            self.vertices[i1].normal += face_normal;
            self.vertices[i2].normal += face_normal;
        }

        for v in &mut self.vertices {
            let len = v.normal.length();
            if len > 1e-6 {
                v.normal /= len;
            } else {
                v.normal = Vec3::Y;
            }
        }
    }

    /// Bounds of the vertices after applying `matrix`
    pub fn bounds(&self, matrix: Mat4) -> Aabb {
        let mut aabb = Aabb::empty();
        for v in &self.vertices {
            aabb.expand(matrix.transform_point3(v.position));
        }
        aabb
    }

    /// Unit cube centered on the origin
    pub fn cube() -> Self {
        // (normal, u axis, v axis) per face
        let faces = [
            (Vec3::Z, Vec3::X, Vec3::Y),
            (-Vec3::Z, -Vec3::X, Vec3::Y),
            (Vec3::Y, Vec3::X, -Vec3::Z),
            (-Vec3::Y, Vec3::X, Vec3::Z),
            (Vec3::X, -Vec3::Z, Vec3::Y),
            (-Vec3::X, Vec3::Z, Vec3::Y),
        ];
        let corners = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(0.0, 1.0),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u_axis, v_axis) in faces {
            let base = vertices.len() as u32;
            for uv in corners {
                let position = normal * 0.5 + u_axis * (uv.x - 0.5) + v_axis * (uv.y - 0.5);
                vertices.push(Vertex::new(position, normal, uv));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new("Cube", vertices, indices)
    }

    /// UV sphere of radius 0.5
    pub fn sphere(segments: u32) -> Self {
        let rings = segments.max(3);
        let sectors = segments.max(3);

        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        let r_step = PI / rings as f32;
        let t_step = TAU / sectors as f32;

        for i in 0..=rings {
            let phi = i as f32 * r_step;
            for j in 0..=sectors {
                let theta = j as f32 * t_step;
                let dir = Vec3::new(theta.cos() * phi.sin(), phi.cos(), theta.sin() * phi.sin());
                let u = 1.0 - j as f32 / sectors as f32;
                let v = 1.0 - i as f32 / rings as f32;
                vertices.push(Vertex::new(dir * 0.5, dir.normalize_or(Vec3::Y), Vec2::new(u, v)));
            }
        }

        for i in 0..rings {
            for j in 0..sectors {
                let first = i * (sectors + 1) + j;
                let second = first + sectors + 1;
                indices.extend_from_slice(&[first, second, first + 1, second, second + 1, first + 1]);
            }
        }

        Self::new("Sphere", vertices, indices)
    }

    /// Unit plane on XZ facing +Y
    pub fn plane() -> Self {
        let corners = [
            Vec3::new(-0.5, 0.0, -0.5),
            Vec3::new(0.5, 0.0, -0.5),
            Vec3::new(0.5, 0.0, 0.5),
            Vec3::new(-0.5, 0.0, 0.5),
        ];
        let vertices = corners
            .iter()
            .map(|p| Vertex::new(*p, Vec3::Y, Vec2::new(p.x + 0.5, p.z + 0.5)))
            .collect();
        Self::new("Plane", vertices, vec![0, 2, 1, 0, 3, 2])
    }

    /// (p, q) torus knot swept with a circular tube. Deterministic for given
    /// parameters, used as the placeholder model.
    pub fn torus_knot(
        radius: f32,
        tube: f32,
        tubular_segments: u32,
        radial_segments: u32,
        p: u32,
        q: u32,
    ) -> Self {
        let tubular_segments = tubular_segments.max(3);
        let radial_segments = radial_segments.max(3);
        let curve = |u: f32| -> Vec3 {
            let qu_p = q as f32 / p as f32 * u;
            let cs = qu_p.cos();
            Vec3::new(
                radius * (2.0 + cs) * 0.5 * (u).cos(),
                radius * (2.0 + cs) * 0.5 * (u).sin(),
                radius * qu_p.sin() * 0.5,
            )
        };

        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * p as f32 * TAU;
            let p1 = curve(u);
            let p2 = curve(u + 0.01);
            let tangent = p2 - p1;
            let mut normal = p2 + p1;
            let binormal = tangent.cross(normal).normalize_or(Vec3::Z);
            normal = binormal.cross(tangent).normalize_or(Vec3::Y);

            for j in 0..=radial_segments {
                let v = j as f32 / radial_segments as f32 * TAU;
                let cx = -tube * v.cos();
                let cy = tube * v.sin();
                let position = p1 + normal * cx + binormal * cy;
                let vertex_normal = (position - p1).normalize_or(Vec3::Y);
                vertices.push(Vertex::new(
                    position,
                    vertex_normal,
                    Vec2::new(
                        i as f32 / tubular_segments as f32,
                        j as f32 / radial_segments as f32,
                    ),
                ));
            }
        }

        for j in 1..=tubular_segments {
            for i in 1..=radial_segments {
                let a = (radial_segments + 1) * (j - 1) + (i - 1);
                let b = (radial_segments + 1) * j + (i - 1);
                let c = (radial_segments + 1) * j + i;
                let d = (radial_segments + 1) * (j - 1) + i;
                indices.extend_from_slice(&[a, b, d, b, c, d]);
            }
        }

        Self::new("TorusKnot", vertices, indices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }

    pub fn is_valid(&self) -> bool {
        !self.vertices.is_empty() && !self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn primitives_are_valid() {
        for mesh in [
            MeshData::cube(),
            MeshData::sphere(16),
            MeshData::plane(),
            MeshData::torus_knot(0.3, 0.1, 64, 8, 2, 3),
        ] {
            assert!(mesh.is_valid(), "{} is empty", mesh.name);
            let max_index = *mesh.indices.iter().max().unwrap() as usize;
            assert!(max_index < mesh.vertex_count(), "{} index out of range", mesh.name);
        }
    }

    #[test]
    fn torus_knot_is_deterministic() {
        let a = MeshData::torus_knot(0.3, 0.1, 64, 8, 2, 3);
        let b = MeshData::torus_knot(0.3, 0.1, 64, 8, 2, 3);
        assert_eq!(a, b);
    }

    #[test]
    fn cube_bounding_sphere_is_half_diagonal() {
        let sphere = MeshData::cube().bounds(Mat4::IDENTITY).bounding_sphere();
        assert_relative_eq!(sphere.radius, 3f32.sqrt() * 0.5, epsilon = 1e-6);
        assert_relative_eq!(sphere.center.length(), 0.0, epsilon = 1e-6);
    }

    #[test]
    fn missing_normals_are_rebuilt() {
        let mesh = MeshData::from_triangles(
            "tri",
            &[Vec3::ZERO, Vec3::X, Vec3::Y],
            &[[0, 1, 2]],
        );
        for v in &mesh.vertices {
            assert_relative_eq!(v.normal.z, 1.0, epsilon = 1e-6);
        }
    }
}
