use super::*;
use bevy::asset::RenderAssetUsages;
use bevy::render::mesh::{Indices, PrimitiveTopology};

#[derive(Debug, Clone, Copy)]
pub(super) struct SurfacePoint {
    pub(super) x: f32,
    pub(super) top: Vec2,
    pub(super) bottom: Vec2,
    pub(super) u: f32,
}

#[derive(Debug, Clone)]
pub(super) struct ChunkSurface {
    pub(super) points: Vec<SurfacePoint>,
}

/// Samples one chunk span of the height field into renderable surface points.
///
/// The first sample sits exactly on `start_x` and the last exactly on
/// `end_x`, so two neighbouring chunks built from the same field share a
/// bit-identical boundary sample and the ground shows no seam.
pub(super) fn build_chunk_surface(
    field: &HeightField,
    start_x: f32,
    end_x: f32,
    sample_spacing: f32,
    strip_thickness: f32,
) -> ChunkSurface {
    let span = end_x - start_x;
    if span <= f32::EPSILON {
        return ChunkSurface { points: Vec::new() };
    }
    let spacing = sample_spacing.max(0.001);
    let interior_count = (span / spacing).ceil() as usize;
    let node_count = interior_count + 1;

    let mut top_points = Vec::with_capacity(node_count);
    for index in 0..node_count {
        let x = if index + 1 == node_count {
            end_x
        } else {
            start_x + (index as f32 * spacing)
        };
        top_points.push(Vec2::new(x, field.height_at(x)));
    }

    let mut points = Vec::with_capacity(node_count);
    let strip_width = strip_thickness.max(0.001);
    let mut u_along = 0.0_f32;
    for index in 0..node_count {
        if index > 0 {
            u_along += (top_points[index] - top_points[index - 1]).length() / strip_width;
        }
        let tangent = if index == 0 {
            top_points[1] - top_points[0]
        } else if index + 1 == node_count {
            top_points[node_count - 1] - top_points[node_count - 2]
        } else {
            top_points[index + 1] - top_points[index - 1]
        };
        let normal = Vec2::new(-tangent.y, tangent.x).normalize_or_zero();
        let safe_normal = if normal.length_squared() <= f32::EPSILON {
            Vec2::Y
        } else {
            normal
        };
        let top = top_points[index];
        let bottom = top - (safe_normal * strip_thickness);

        points.push(SurfacePoint {
            x: top.x,
            top,
            bottom,
            u: u_along,
        });
    }

    ChunkSurface { points }
}

pub(super) fn collider_points(surface: &ChunkSurface) -> Vec<Vec2> {
    surface.points.iter().map(|point| point.top).collect()
}

pub(super) fn build_surface_strip_mesh(surface: &ChunkSurface) -> Mesh {
    let node_count = surface.points.len();
    let mut positions = Vec::with_capacity(node_count * 2);
    let mut normals = Vec::with_capacity(node_count * 2);
    let mut uvs = Vec::with_capacity(node_count * 2);
    let mut indices = Vec::with_capacity(node_count.saturating_sub(1) * 6);

    for point in &surface.points {
        positions.push([point.top.x, point.top.y, GROUND_STRIP_Z]);
        positions.push([point.bottom.x, point.bottom.y, GROUND_STRIP_Z]);
        normals.push([0.0, 0.0, 1.0]);
        normals.push([0.0, 0.0, 1.0]);
        uvs.push([point.u, 0.0]);
        uvs.push([point.u, 1.0]);
    }

    for index in 0..node_count.saturating_sub(1) {
        let base = (index * 2) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

pub(super) fn build_surface_curtain_mesh(surface: &ChunkSurface, curtain_bottom_y: f32) -> Mesh {
    let node_count = surface.points.len();
    let mut positions = Vec::with_capacity(node_count * 2);
    let mut normals = Vec::with_capacity(node_count * 2);
    let mut uvs = Vec::with_capacity(node_count * 2);
    let mut indices = Vec::with_capacity(node_count.saturating_sub(1) * 6);

    for point in &surface.points {
        let curtain_top = point.bottom;
        let curtain_bottom = Vec2::new(point.x, curtain_bottom_y);
        positions.push([curtain_top.x, curtain_top.y, GROUND_CURTAIN_Z]);
        positions.push([curtain_bottom.x, curtain_bottom.y, GROUND_CURTAIN_Z]);
        normals.push([0.0, 0.0, 1.0]);
        normals.push([0.0, 0.0, 1.0]);
        uvs.push(curtain_world_uv(curtain_top));
        uvs.push(curtain_world_uv(curtain_bottom));
    }

    for index in 0..node_count.saturating_sub(1) {
        let base = (index * 2) as u32;
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
    }

    let mut mesh = Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::default(),
    );
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

fn curtain_world_uv(world: Vec2) -> [f32; 2] {
    [
        world.x * GROUND_CURTAIN_UV_SCALE,
        world.y * GROUND_CURTAIN_UV_SCALE,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainProfileConfig;

    fn test_field() -> HeightField {
        HeightField::from_profile(
            &TerrainProfileConfig {
                seed: 0,
                base_height: -320.0,
                hill_amplitude: 150.0,
                hill_wavelength: 900.0,
                detail_amplitude: 40.0,
                detail_wavelength: 220.0,
                quantize_step: 0.0,
            },
            42,
        )
    }

    #[test]
    fn neighbouring_chunks_share_their_boundary_sample() {
        let field = test_field();
        let left = build_chunk_surface(&field, 0.0, 1000.0, 25.0, 26.0);
        let right = build_chunk_surface(&field, 1000.0, 2000.0, 25.0, 26.0);

        let seam_left = left.points.last().unwrap().top;
        let seam_right = right.points.first().unwrap().top;
        assert_eq!(seam_left.x.to_bits(), seam_right.x.to_bits());
        assert_eq!(seam_left.y.to_bits(), seam_right.y.to_bits());
    }

    #[test]
    fn surface_sampling_covers_the_exact_chunk_span() {
        let field = test_field();
        let surface = build_chunk_surface(&field, 3000.0, 4000.0, 25.0, 26.0);

        assert_eq!(surface.points.len(), 41);
        assert_eq!(surface.points.first().unwrap().x, 3000.0);
        assert_eq!(surface.points.last().unwrap().x, 4000.0);
    }

    #[test]
    fn surface_sampling_handles_spacing_that_does_not_divide_the_span() {
        let field = test_field();
        let surface = build_chunk_surface(&field, 0.0, 1000.0, 300.0, 26.0);

        assert_eq!(surface.points.first().unwrap().x, 0.0);
        assert_eq!(surface.points.last().unwrap().x, 1000.0);
        for pair in surface.points.windows(2) {
            assert!(pair[1].x > pair[0].x);
        }
    }

    #[test]
    fn strip_mesh_builds_one_quad_per_sample_pair() {
        let field = test_field();
        let surface = build_chunk_surface(&field, 0.0, 1000.0, 25.0, 26.0);
        let mesh = build_surface_strip_mesh(&surface);

        let vertex_count = mesh.count_vertices();
        assert_eq!(vertex_count, surface.points.len() * 2);
        let Some(Indices::U32(indices)) = mesh.indices() else {
            panic!("strip mesh should carry u32 indices");
        };
        assert_eq!(indices.len(), (surface.points.len() - 1) * 6);
    }

    #[test]
    fn empty_span_yields_no_surface_points() {
        let field = test_field();
        let surface = build_chunk_surface(&field, 1000.0, 1000.0, 25.0, 26.0);
        assert!(surface.points.is_empty());
    }

    #[test]
    fn collider_points_follow_the_surface_tops() {
        let field = test_field();
        let surface = build_chunk_surface(&field, 0.0, 500.0, 25.0, 26.0);
        let points = collider_points(&surface);

        assert_eq!(points.len(), surface.points.len());
        for (collider_point, surface_point) in points.iter().zip(&surface.points) {
            assert_eq!(collider_point.y, surface_point.top.y);
        }
    }
}
