//! GLTF/GLB import

use std::path::Path;

use glam::{Quat, Vec2, Vec3};
use tracing::debug;
use viewer_core::components::Transform;
use viewer_core::error::{Result, ViewerError};

use crate::asset_manager::{MaterialData, TextureData};
use crate::loader::{ImportedMaterial, ImportedMesh, ImportedModel, ImportedNode};
use crate::mesh::{MeshData, Vertex};

pub(super) fn parse(bytes: &[u8], base_dir: &Path, name: &str) -> Result<ImportedModel> {
    let gltf::Gltf { document, blob } =
        gltf::Gltf::from_slice(bytes).map_err(|e| ViewerError::import("GLTF", e))?;
    let buffers = gltf::import_buffers(&document, Some(base_dir), blob)
        .map_err(|e| ViewerError::import("GLTF", e))?;
    let images = gltf::import_images(&document, Some(base_dir), &buffers)
        .map_err(|e| ViewerError::import("GLTF", e))?;

    let mut model = ImportedModel {
        name: name.to_string(),
        ..Default::default()
    };
    model.textures = images
        .iter()
        .enumerate()
        .map(|(index, image)| to_texture(index, image))
        .collect();
    model.materials = document
        .materials()
        .map(|material| to_material(&material))
        .collect();

    let mut importer = NodeImporter {
        buffers: &buffers,
        model: &mut model,
        default_material: None,
    };
    let roots: Vec<gltf::Node<'_>> = match document
        .default_scene()
        .or_else(|| document.scenes().next())
    {
        Some(scene) => scene.nodes().collect(),
        None => document.nodes().collect(),
    };
    for node in roots {
        importer.import_node(node, None);
    }

    Ok(model)
}

struct NodeImporter<'a> {
    buffers: &'a [gltf::buffer::Data],
    model: &'a mut ImportedModel,
    default_material: Option<usize>,
}

impl NodeImporter<'_> {
    fn import_node(&mut self, node: gltf::Node<'_>, parent: Option<usize>) {
        let (translation, rotation, scale) = node.transform().decomposed();
        let index = self.model.nodes.len();
        self.model.nodes.push(ImportedNode {
            name: node.name().unwrap_or("node").to_string(),
            parent,
            transform: Transform::new(
                Vec3::from_array(translation),
                Quat::from_array(rotation),
                Vec3::from_array(scale),
            ),
            mesh: None,
        });

        if let Some(mesh) = node.mesh() {
            let primitives: Vec<ImportedMesh> = mesh
                .primitives()
                .filter_map(|primitive| self.import_primitive(&primitive, mesh.name()))
                .collect();
            if primitives.len() == 1 {
                self.model.nodes[index].mesh = primitives.into_iter().next();
            } else {
                for primitive in primitives {
                    self.model.nodes.push(ImportedNode {
                        name: format!("{}_primitive", mesh.name().unwrap_or("mesh")),
                        parent: Some(index),
                        transform: Transform::default(),
                        mesh: Some(primitive),
                    });
                }
            }
        }

        for child in node.children() {
            self.import_node(child, Some(index));
        }
    }

    fn import_primitive(
        &mut self,
        primitive: &gltf::Primitive<'_>,
        mesh_name: Option<&str>,
    ) -> Option<ImportedMesh> {
        if primitive.mode() != gltf::mesh::Mode::Triangles {
            debug!(mode = ?primitive.mode(), "skipping non-triangle GLTF primitive");
            return None;
        }
        let buffers = self.buffers;
        let reader = primitive.reader(|buffer| buffers.get(buffer.index()).map(|data| data.0.as_slice()));
        let positions = reader.read_positions()?;

        let mut vertices: Vec<Vertex> = positions
            .map(|p| Vertex::new(Vec3::from_array(p), Vec3::ZERO, Vec2::ZERO))
            .collect();
        if let Some(normals) = reader.read_normals() {
            for (vertex, normal) in vertices.iter_mut().zip(normals) {
                vertex.normal = Vec3::from_array(normal);
            }
        }
        if let Some(texcoords) = reader.read_tex_coords(0) {
            for (vertex, uv) in vertices.iter_mut().zip(texcoords.into_f32()) {
                vertex.texcoord = Vec2::from_array(uv);
            }
        }
        let indices: Vec<u32> = match reader.read_indices() {
            Some(indices) => indices.into_u32().collect(),
            None => (0..vertices.len() as u32).collect(),
        };

        let mut geometry = MeshData::new(mesh_name.unwrap_or("mesh"), vertices, indices);
        geometry.ensure_normals();
        if !geometry.is_valid() {
            return None;
        }
        let geometry_index = self.model.geometries.len();
        self.model.geometries.push(geometry);

        let material = match primitive.material().index() {
            Some(index) if index < self.model.materials.len() => index,
            _ => self.default_material(),
        };
        Some(ImportedMesh {
            geometry: geometry_index,
            materials: vec![material],
        })
    }

    fn default_material(&mut self) -> usize {
        *self.default_material.get_or_insert_with(|| {
            self.model.materials.push(ImportedMaterial {
                material: MaterialData::default(),
                map: None,
            });
            self.model.materials.len() - 1
        })
    }
}

fn to_material(material: &gltf::Material<'_>) -> ImportedMaterial {
    let pbr = material.pbr_metallic_roughness();
    let [r, g, b, a] = pbr.base_color_factor();
    ImportedMaterial {
        material: MaterialData {
            name: material.name().unwrap_or("material").to_string(),
            color: [r, g, b],
            opacity: a,
            transparent: material.alpha_mode() == gltf::material::AlphaMode::Blend,
            metallic: pbr.metallic_factor(),
            roughness: pbr.roughness_factor(),
            emissive: material.emissive_factor(),
            ..Default::default()
        },
        map: pbr
            .base_color_texture()
            .map(|info| info.texture().source().index()),
    }
}

fn to_texture(index: usize, image: &gltf::image::Data) -> TextureData {
    use gltf::image::Format;

    let pixels = &image.pixels;
    let rgba: Option<Vec<u8>> = match image.format {
        Format::R8G8B8A8 => Some(pixels.clone()),
        Format::R8G8B8 => Some(
            pixels
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
        ),
        Format::R8G8 => Some(
            pixels
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
        ),
        Format::R8 => Some(pixels.iter().flat_map(|v| [*v, *v, *v, 255]).collect()),
        _ => None,
    };
    let name = format!("texture_{index}");
    match rgba {
        Some(rgba) => TextureData::new(&name, image.width, image.height, rgba),
        None => {
            debug!(format = ?image.format, "unsupported GLTF image format, using white");
            TextureData::new(&name, 1, 1, vec![255; 4])
        }
    }
}
