//! Wavefront OBJ import through `tobj`

use std::io::{BufReader, Cursor};
use std::path::Path;

use glam::{Vec2, Vec3};
use tracing::warn;
use viewer_core::components::Transform;
use viewer_core::error::{Result, ViewerError};

use crate::asset_manager::MaterialData;
use crate::loader::{ImportedMaterial, ImportedMesh, ImportedModel, ImportedNode};
use crate::mesh::{MeshData, Vertex};

pub(super) fn parse(bytes: &[u8], base_dir: &Path, name: &str) -> Result<ImportedModel> {
    let load_options = tobj::LoadOptions {
        triangulate: true,
        single_index: true,
        ..Default::default()
    };
    let mut reader = BufReader::new(Cursor::new(bytes));
    let (models, materials) = tobj::load_obj_buf(&mut reader, &load_options, |path| {
        tobj::load_mtl(base_dir.join(path))
    })
    .map_err(|e| ViewerError::import("OBJ", e))?;

    let mut model = ImportedModel {
        name: name.to_string(),
        ..Default::default()
    };
    match materials {
        Ok(materials) => {
            model.materials = materials.iter().map(to_material).collect();
        }
        Err(e) => warn!(error = %e, "OBJ material library unavailable, using defaults"),
    }
    let default_material = model.materials.len();
    model.materials.push(ImportedMaterial {
        material: MaterialData::default(),
        map: None,
    });

    for obj in models {
        let mesh = obj.mesh;
        let mut vertices: Vec<Vertex> = mesh
            .positions
            .chunks_exact(3)
            .map(|p| Vertex::new(Vec3::new(p[0], p[1], p[2]), Vec3::ZERO, Vec2::ZERO))
            .collect();
        for (vertex, n) in vertices.iter_mut().zip(mesh.normals.chunks_exact(3)) {
            vertex.normal = Vec3::new(n[0], n[1], n[2]);
        }
        for (vertex, uv) in vertices.iter_mut().zip(mesh.texcoords.chunks_exact(2)) {
            vertex.texcoord = Vec2::new(uv[0], uv[1]);
        }

        let mut geometry = MeshData::new(&obj.name, vertices, mesh.indices);
        geometry.ensure_normals();
        if !geometry.is_valid() {
            continue;
        }
        let material = mesh
            .material_id
            .filter(|id| *id < default_material)
            .unwrap_or(default_material);

        model.geometries.push(geometry);
        model.nodes.push(ImportedNode {
            name: obj.name,
            parent: None,
            transform: Transform::default(),
            mesh: Some(ImportedMesh {
                geometry: model.geometries.len() - 1,
                materials: vec![material],
            }),
        });
    }

    Ok(model)
}

fn to_material(material: &tobj::Material) -> ImportedMaterial {
    let opacity = material.dissolve.unwrap_or(1.0);
    ImportedMaterial {
        material: MaterialData {
            name: material.name.clone(),
            color: material.diffuse.unwrap_or([1.0, 1.0, 1.0]),
            opacity,
            transparent: opacity < 1.0,
            ..Default::default()
        },
        map: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "o quad\nv 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";

    #[test]
    fn quads_are_triangulated() {
        let model = parse(QUAD.as_bytes(), Path::new("."), "quad").unwrap();
        assert_eq!(model.geometries.len(), 1);
        assert_eq!(model.geometries[0].index_count(), 6);
        assert_eq!(model.nodes[0].name, "quad");
        assert!(model.is_renderable());
    }

    #[test]
    fn missing_material_library_falls_back_to_default() {
        let source = format!("mtllib nowhere.mtl\n{QUAD}");
        let model = parse(source.as_bytes(), Path::new("/nonexistent"), "quad").unwrap();
        assert_eq!(model.materials.len(), 1);
        assert_eq!(model.nodes[0].mesh.as_ref().unwrap().materials, vec![0]);
    }

    #[test]
    fn faceless_obj_has_nothing_to_render() {
        let model = parse(b"v 0 0 0\nv 1 0 0\n", Path::new("."), "points").unwrap();
        assert!(!model.is_renderable());
    }
}
