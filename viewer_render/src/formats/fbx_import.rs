//! FBX (7.x) mesh import through `fbxcel-dom`

use std::io::Cursor;

use fbxcel_dom::any::AnyDocument;
use fbxcel_dom::v7400::object::{TypedObjectHandle, geometry::TypedGeometryHandle};
use glam::Vec3;
use viewer_core::components::Transform;
use viewer_core::error::{Result, ViewerError};

use crate::asset_manager::MaterialData;
use crate::loader::{ImportedMaterial, ImportedMesh, ImportedModel, ImportedNode};
use crate::mesh::MeshData;

pub(super) fn parse(bytes: &[u8], name: &str) -> Result<ImportedModel> {
    let doc = match AnyDocument::from_seekable_reader(Cursor::new(bytes))
        .map_err(|e| ViewerError::import("FBX", e))?
    {
        AnyDocument::V7400(_, doc) => doc,
        _ => return Err(ViewerError::import("FBX", "unsupported FBX version")),
    };

    let mut model = ImportedModel {
        name: name.to_string(),
        materials: vec![ImportedMaterial {
            material: MaterialData::default(),
            map: None,
        }],
        ..Default::default()
    };

    for obj in doc.objects() {
        let mesh_name = obj.name().filter(|n| !n.is_empty()).unwrap_or("mesh").to_string();
        let TypedObjectHandle::Geometry(TypedGeometryHandle::Mesh(mesh)) = obj.get_typed() else {
            continue;
        };
        let poly_verts = mesh
            .polygon_vertices()
            .map_err(|e| ViewerError::import("FBX", e))?;
        let positions: Vec<Vec3> = poly_verts
            .raw_control_points()
            .map_err(|e| ViewerError::import("FBX", e))?
            .map(|p| Vec3::new(p.x as f32, p.y as f32, p.z as f32))
            .collect();
        if positions.is_empty() {
            continue;
        }

        // a negative index closes its polygon and encodes `-index - 1`
        let mut triangles: Vec<[u32; 3]> = Vec::new();
        let mut poly: Vec<u32> = Vec::new();
        for raw in poly_verts.raw_polygon_vertices() {
            let is_end = *raw < 0;
            let index = if is_end { (-raw - 1) as u32 } else { *raw as u32 };
            if (index as usize) < positions.len() {
                poly.push(index);
            }
            if is_end {
                for i in 1..poly.len().saturating_sub(1) {
                    triangles.push([poly[0], poly[i], poly[i + 1]]);
                }
                poly.clear();
            }
        }
        if triangles.is_empty() {
            continue;
        }

        model
            .geometries
            .push(MeshData::from_triangles(&mesh_name, &positions, &triangles));
        model.nodes.push(ImportedNode {
            name: mesh_name,
            parent: None,
            transform: Transform::default(),
            mesh: Some(ImportedMesh {
                geometry: model.geometries.len() - 1,
                materials: vec![0],
            }),
        });
    }

    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_fbx_bytes_are_rejected() {
        let err = parse(b"definitely not fbx", "bad").unwrap_err();
        assert!(matches!(err, ViewerError::Import { format: "FBX", .. }));
    }
}
