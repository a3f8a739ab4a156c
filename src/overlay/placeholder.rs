//! Placeholder glasses
//!
//! Built from primitives when no model source could be loaded: a frame bar,
//! two disc lenses and two temples, in the variant's frame color.

use glam::{Mat4, Vec3};

use crate::error::LoaderError;
use crate::overlay::model::{MeshData, ModelAsset, ModelOrigin};

const LENS_COLOR: [f32; 4] = [0.1, 0.1, 0.1, 0.25];
const LENS_SEGMENTS: u32 = 32;

/// Parse `#RRGGBB` into linear-ish RGBA. Unparseable input gives dark grey.
pub fn parse_hex_color(hex: &str) -> [f32; 4] {
    let digits = hex.trim().trim_start_matches('#');
    let channel = |i: usize| {
        digits
            .get(i..i + 2)
            .and_then(|s| u8::from_str_radix(s, 16).ok())
            .map(|v| v as f32 / 255.0)
    };

    match (digits.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => [r, g, b, 1.0],
        _ => [0.2, 0.2, 0.2, 1.0],
    }
}

/// Axis-aligned box centered on the origin
pub fn cuboid(name: &str, size: Vec3, color: [f32; 4]) -> MeshData {
    let h = size * 0.5;
    let faces = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Y, Vec3::NEG_Z),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::Z, Vec3::NEG_X),
        (Vec3::Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::X, Vec3::Y),
    ];

    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);

    for (normal, u, v) in faces {
        let base = positions.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            positions.push((normal + u * su + v * sv) * h);
            normals.push(normal);
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData {
        name: name.to_string(),
        positions,
        normals,
        indices,
        base_color: color,
        transparent: false,
    }
}

/// Flat disc in the XY plane facing +Z
pub fn disc(name: &str, radius: f32, segments: u32, color: [f32; 4]) -> MeshData {
    let segments = segments.max(3);
    let mut positions = vec![Vec3::ZERO];
    let mut indices = Vec::with_capacity(segments as usize * 3);

    for i in 0..segments {
        let angle = i as f32 / segments as f32 * std::f32::consts::TAU;
        positions.push(Vec3::new(angle.cos() * radius, angle.sin() * radius, 0.0));
        let next = (i + 1) % segments;
        indices.extend_from_slice(&[0, i + 1, next + 1]);
    }

    MeshData {
        name: name.to_string(),
        normals: vec![Vec3::Z; positions.len()],
        positions,
        indices,
        base_color: color,
        transparent: color[3] < 1.0,
    }
}

fn placed(mut mesh: MeshData, transform: Mat4) -> MeshData {
    mesh.transform(transform);
    mesh
}

/// Raw placeholder meshes, before normalization
pub fn placeholder_meshes(color: &str) -> Vec<MeshData> {
    let frame_color = parse_hex_color(color);
    let lens_tilt = Mat4::from_rotation_x(std::f32::consts::FRAC_PI_2);
    let lens = disc("lens", 0.7, LENS_SEGMENTS, LENS_COLOR);
    let temple = cuboid("temple", Vec3::new(0.08, 0.08, 1.5), frame_color);

    vec![
        cuboid("frame", Vec3::new(2.0, 0.12, 0.25), frame_color),
        placed(lens.clone(), Mat4::from_translation(Vec3::new(-0.9, 0.0, 0.0)) * lens_tilt),
        placed(lens, Mat4::from_translation(Vec3::new(0.9, 0.0, 0.0)) * lens_tilt),
        placed(
            temple.clone(),
            Mat4::from_translation(Vec3::new(-1.0, 0.0, -0.75)) * Mat4::from_rotation_y(0.3),
        ),
        placed(
            temple,
            Mat4::from_translation(Vec3::new(1.0, 0.0, -0.75)) * Mat4::from_rotation_y(-0.3),
        ),
    ]
}

/// Placeholder model normalized to `size` like any fetched model
pub fn placeholder_model(color: &str, size: f32) -> Result<ModelAsset, LoaderError> {
    ModelAsset::normalized(placeholder_meshes(color), size, ModelOrigin::Placeholder)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex_color() {
        assert_eq!(parse_hex_color("#FF0000"), [1.0, 0.0, 0.0, 1.0]);
        let gold = parse_hex_color("#FFD700");
        assert!((gold[1] - 215.0 / 255.0).abs() < 1e-6);
        assert_eq!(parse_hex_color("nope"), [0.2, 0.2, 0.2, 1.0]);
        assert_eq!(parse_hex_color("#12345"), [0.2, 0.2, 0.2, 1.0]);
    }

    #[test]
    fn test_cuboid() {
        let mesh = cuboid("box", Vec3::new(2.0, 1.0, 4.0), [1.0; 4]);
        assert_eq!(mesh.positions.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        let bounds = crate::overlay::model::Bounds::from_points(&mesh.positions).unwrap();
        assert!(bounds.size().abs_diff_eq(Vec3::new(2.0, 1.0, 4.0), 1e-6));
    }

    #[test]
    fn test_disc() {
        let mesh = disc("lens", 0.7, 32, LENS_COLOR);
        assert_eq!(mesh.positions.len(), 33);
        assert_eq!(mesh.indices.len(), 96);
        assert!(mesh.transparent);
    }

    #[test]
    fn test_placeholder_parts() {
        let meshes = placeholder_meshes("#2C3E50");
        let names: Vec<&str> = meshes.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["frame", "lens", "lens", "temple", "temple"]);
    }

    #[test]
    fn test_placeholder_model_normalized() {
        let model = placeholder_model("#FFD700", 0.8).unwrap();
        assert!(model.is_placeholder());
        assert!((model.bounds.max_dimension() - 0.8).abs() < 1e-4);
        assert_eq!(model.meshes[0].base_color[0], 1.0);
    }
}
