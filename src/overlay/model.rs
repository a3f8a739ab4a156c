//! Glasses model geometry
//!
//! Loads GLB/glTF data with the `gltf` crate, flattens the node hierarchy
//! into world-space meshes and normalizes the result so that the model is
//! centered on the origin and its largest dimension equals the variant's
//! declared size.

use glam::{Mat3, Mat4, Vec3};
use serde::Serialize;

use crate::error::LoaderError;

/// Where a model's geometry came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelOrigin {
    /// Parsed from a fetched asset
    Fetched { url: String },
    /// Synthesized after every source failed
    Placeholder,
}

/// Geometry of one primitive, already in model space
#[derive(Debug, Clone, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub indices: Vec<u32>,
    /// Base color factor (RGBA)
    pub base_color: [f32; 4],
    /// Lens material: rendered see-through
    pub transparent: bool,
}

impl MeshData {
    /// Apply an affine transform to positions and normals
    pub fn transform(&mut self, matrix: Mat4) {
        let normal_matrix = Mat3::from_mat4(matrix).inverse().transpose();
        for p in &mut self.positions {
            *p = matrix.transform_point3(*p);
        }
        for n in &mut self.normals {
            *n = (normal_matrix * *n).normalize_or_zero();
        }
    }
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(Self { min: first, max: first }, |b, p| Self {
            min: b.min.min(*p),
            max: b.max.max(*p),
        }))
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn max_dimension(&self) -> f32 {
        self.size().max_element()
    }
}

/// A loaded, normalized glasses model
#[derive(Debug, Clone, PartialEq)]
pub struct ModelAsset {
    pub meshes: Vec<MeshData>,
    pub bounds: Bounds,
    pub origin: ModelOrigin,
}

impl ModelAsset {
    /// Build from raw meshes, centering the model and scaling its largest dimension to `size`.
    pub fn normalized(mut meshes: Vec<MeshData>, size: f32, origin: ModelOrigin) -> Result<Self, LoaderError> {
        let label = match &origin {
            ModelOrigin::Fetched { url } => url.clone(),
            ModelOrigin::Placeholder => "placeholder".to_string(),
        };

        let bounds = Bounds::from_points(meshes.iter().flat_map(|m| m.positions.iter()))
            .ok_or_else(|| LoaderError::EmptyModel(label.clone()))?;

        let max_dim = bounds.max_dimension();
        if !(max_dim.is_finite() && max_dim > 0.0) {
            return Err(LoaderError::EmptyModel(label));
        }

        let normalize = Mat4::from_scale(Vec3::splat(size / max_dim)) * Mat4::from_translation(-bounds.center());
        for mesh in &mut meshes {
            mesh.transform(normalize);
        }

        let bounds = Bounds::from_points(meshes.iter().flat_map(|m| m.positions.iter()))
            .ok_or(LoaderError::EmptyModel(label))?;

        Ok(Self {
            meshes,
            bounds,
            origin,
        })
    }

    /// Parse binary glTF (or self-contained glTF JSON) bytes
    pub fn from_gltf_slice(url: &str, bytes: &[u8], size: f32) -> Result<Self, LoaderError> {
        let (document, buffers, _images) = gltf::import_slice(bytes).map_err(|e| LoaderError::Parse {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let mut meshes = Vec::new();
        let scene = document.default_scene().or_else(|| document.scenes().next());

        match scene {
            Some(scene) => {
                for node in scene.nodes() {
                    collect_node(&node, Mat4::IDENTITY, &buffers, &mut meshes);
                }
            }
            None => {
                for mesh in document.meshes() {
                    read_mesh(&mesh, Mat4::IDENTITY, &buffers, &mut meshes);
                }
            }
        }

        tracing::debug!("Parsed {} primitives from {}", meshes.len(), url);

        Self::normalized(
            meshes,
            size,
            ModelOrigin::Fetched {
                url: url.to_string(),
            },
        )
    }

    pub fn is_placeholder(&self) -> bool {
        self.origin == ModelOrigin::Placeholder
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.positions.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.meshes.iter().map(|m| m.indices.len() / 3).sum()
    }
}

fn collect_node(node: &gltf::Node, parent: Mat4, buffers: &[gltf::buffer::Data], out: &mut Vec<MeshData>) {
    let world = parent * Mat4::from_cols_array_2d(&node.transform().matrix());

    if let Some(mesh) = node.mesh() {
        read_mesh(&mesh, world, buffers, out);
    }

    for child in node.children() {
        collect_node(&child, world, buffers, out);
    }
}

fn read_mesh(mesh: &gltf::Mesh, world: Mat4, buffers: &[gltf::buffer::Data], out: &mut Vec<MeshData>) {
    let name = mesh.name().unwrap_or("mesh").to_string();

    for prim in mesh.primitives() {
        let reader = prim.reader(|buffer| Some(&buffers[buffer.index()]));

        let positions: Vec<Vec3> = reader
            .read_positions()
            .map(|iter| iter.map(Vec3::from).collect())
            .unwrap_or_default();

        if positions.is_empty() {
            continue;
        }

        let normals: Vec<Vec3> = reader
            .read_normals()
            .map(|iter| iter.map(Vec3::from).collect())
            .unwrap_or_else(|| vec![Vec3::Y; positions.len()]);

        let indices: Vec<u32> = reader
            .read_indices()
            .map(|iter| iter.into_u32().collect())
            .unwrap_or_else(|| (0..positions.len() as u32).collect());

        let material = prim.material();
        let transparent = material
            .name()
            .map(|n| n.to_lowercase().contains("lens"))
            .unwrap_or(false);

        let mut data = MeshData {
            name: name.clone(),
            positions,
            normals,
            indices,
            base_color: material.pbr_metallic_roughness().base_color_factor(),
            transparent,
        };
        data.transform(world);
        out.push(data);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle(offset: Vec3, extent: f32) -> MeshData {
        MeshData {
            name: "tri".to_string(),
            positions: vec![offset, offset + Vec3::X * extent, offset + Vec3::Y * extent * 0.5],
            normals: vec![Vec3::Z; 3],
            indices: vec![0, 1, 2],
            base_color: [1.0; 4],
            transparent: false,
        }
    }

    #[test]
    fn test_normalized_centers_and_scales() {
        let asset = ModelAsset::normalized(
            vec![triangle(Vec3::new(10.0, 10.0, 10.0), 4.0)],
            0.8,
            ModelOrigin::Placeholder,
        )
        .unwrap();

        assert!((asset.bounds.max_dimension() - 0.8).abs() < 1e-5);
        assert!(asset.bounds.center().abs_diff_eq(Vec3::ZERO, 1e-5));
        assert_eq!(asset.triangle_count(), 1);
    }

    #[test]
    fn test_empty_model_rejected() {
        let err = ModelAsset::normalized(Vec::new(), 1.0, ModelOrigin::Placeholder).unwrap_err();
        assert!(matches!(err, LoaderError::EmptyModel(_)));
    }

    #[test]
    fn test_degenerate_model_rejected() {
        let mut mesh = triangle(Vec3::ZERO, 0.0);
        mesh.positions = vec![Vec3::ONE; 3];
        assert!(ModelAsset::normalized(vec![mesh], 1.0, ModelOrigin::Placeholder).is_err());
    }

    #[test]
    fn test_garbage_bytes_fail_to_parse() {
        let err = ModelAsset::from_gltf_slice("models/x.glb", b"definitely not a glb", 1.0).unwrap_err();
        assert!(matches!(err, LoaderError::Parse { .. }));
    }

    #[test]
    fn test_minimal_embedded_gltf() {
        use base64::Engine;


        // One triangle, positions in a base64 data URI buffer
        let positions: [f32; 9] = [0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        let bytes: Vec<u8> = positions.iter().flat_map(|f| f.to_le_bytes()).collect();
        let uri = format!(
            "data:application/octet-stream;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(&bytes)
        );

        let json = serde_json::json!({
            "asset": {"version": "2.0"},
            "scene": 0,
            "scenes": [{"nodes": [0]}],
            "nodes": [{"mesh": 0, "translation": [5.0, 0.0, 0.0]}],
            "meshes": [{"name": "frame", "primitives": [{"attributes": {"POSITION": 0}}]}],
            "buffers": [{"byteLength": 36, "uri": uri}],
            "bufferViews": [{"buffer": 0, "byteLength": 36}],
            "accessors": [{
                "bufferView": 0, "componentType": 5126, "count": 3, "type": "VEC3",
                "min": [0.0, 0.0, 0.0], "max": [2.0, 1.0, 0.0]
            }]
        })
        .to_string();

        let asset = ModelAsset::from_gltf_slice("models/frame.gltf", json.as_bytes(), 1.0).unwrap();
        assert_eq!(asset.meshes.len(), 1);
        assert_eq!(asset.meshes[0].name, "frame");
        assert!((asset.bounds.max_dimension() - 1.0).abs() < 1e-5);
        assert!(asset.bounds.center().abs_diff_eq(Vec3::ZERO, 1e-5));
        assert!(!asset.is_placeholder());
    }
}
