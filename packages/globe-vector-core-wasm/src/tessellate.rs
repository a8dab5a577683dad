//! CPU tessellation of fill, solid and wall descriptors.
//!
//! Hosts without an engine-side geometry pipeline can upload the resulting buffers
//! directly. Vertices are `f32` relative to `center` to keep precision at earth scale.

use earcutr::earcut;
use geo::{Coord, LineString, Winding};
use nalgebra::{Matrix3, Vector3};
use serde::Serialize;

use crate::cartesian::{self, Cartesian3};
use crate::engine_geometry::{
    CircleGeometry, EngineGeometry, PolygonGeometry, PolygonHierarchy, WallGeometry,
};
use crate::factory::{circle_segments, GeometryOption};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BufferGeometry {
    pub center: [f64; 3],
    pub vertices: Vec<f32>,
    pub normals: Vec<f32>,
    pub indices: Vec<u32>,
}

impl BufferGeometry {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

struct MeshBuilder {
    center: Cartesian3,
    vertices: Vec<f32>,
    indices: Vec<u32>,
}

impl MeshBuilder {
    fn new(center: Cartesian3) -> Self {
        Self {
            center,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    fn push_vertex(&mut self, position: &Cartesian3) -> u32 {
        let index = (self.vertices.len() / 3) as u32;
        let local = position - self.center;
        self.vertices
            .extend_from_slice(&[local.x as f32, local.y as f32, local.z as f32]);
        index
    }

    fn push_triangle(&mut self, a: u32, b: u32, c: u32) {
        self.indices.extend_from_slice(&[a, b, c]);
    }

    fn build(self) -> Option<BufferGeometry> {
        if self.indices.is_empty() {
            return None;
        }
        let normals = compute_vertex_normals(&self.vertices, &self.indices);
        Some(BufferGeometry {
            center: [self.center.x, self.center.y, self.center.z],
            vertices: self.vertices,
            normals,
            indices: self.indices,
        })
    }
}

// Area weighted vertex normals of an indexed mesh
fn compute_vertex_normals(positions: &[f32], indices: &[u32]) -> Vec<f32> {
    let vertex = |i: u32| {
        let i = i as usize * 3;
        Vector3::new(positions[i], positions[i + 1], positions[i + 2])
    };
    let mut normals = vec![Vector3::<f32>::zeros(); positions.len() / 3];

    for face in indices.chunks_exact(3) {
        let (a, b, c) = (vertex(face[0]), vertex(face[1]), vertex(face[2]));
        let normal = (b - a).cross(&(c - a));
        for i in face {
            normals[*i as usize] += normal;
        }
    }

    normals
        .into_iter()
        .flat_map(|n| {
            let n = n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::z);
            [n.x, n.y, n.z]
        })
        .collect()
}

/// Rotation from earth-fixed into the east-north-up frame at `center`.
fn to_local_frame(center: &Cartesian3) -> Matrix3<f64> {
    let frame = cartesian::east_north_up_to_fixed_frame(center);
    frame.fixed_view::<3, 3>(0, 0).transpose()
}

fn with_height(position: &Cartesian3, height: f64) -> Cartesian3 {
    let (lon, lat, _) = cartesian::to_geodetic(position);
    cartesian::from_degrees(lon, lat, height)
}

fn is_counter_clockwise(ring: &[[f64; 2]]) -> bool {
    let mut coords: Vec<Coord<f64>> = ring.iter().map(|[x, y]| Coord { x: *x, y: *y }).collect();
    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    LineString::new(coords).is_ccw()
}

fn tessellate_polygon(polygon: &PolygonGeometry) -> Option<BufferGeometry> {
    let rings = polygon.polygon_hierarchy.rings();
    let outer = rings.first().filter(|ring| ring.len() >= 3)?;
    let center = outer.iter().sum::<Cartesian3>() / outer.len() as f64;
    let rotation = to_local_frame(&center);

    let top_height = |position: &Cartesian3| {
        if polygon.per_position_height {
            *position
        } else {
            with_height(position, polygon.height)
        }
    };

    let mut flat: Vec<f64> = Vec::new();
    let mut hole_indices: Vec<usize> = Vec::new();
    let mut local_rings = Vec::with_capacity(rings.len());
    for (i, ring) in rings.iter().enumerate() {
        if i > 0 {
            hole_indices.push(flat.len() / 2);
        }
        let local: Vec<[f64; 2]> = ring
            .iter()
            .map(|p| {
                let l = rotation * (p - center);
                [l.x, l.y]
            })
            .collect();
        flat.extend(local.iter().flatten());
        local_rings.push(local);
    }

    let triangles = earcut(&flat, &hole_indices, 2).ok()?;
    let mut mesh = MeshBuilder::new(center);

    let top: Vec<u32> = rings
        .iter()
        .flat_map(|ring| ring.iter())
        .map(|p| mesh.push_vertex(&top_height(p)))
        .collect();
    let area = |a: usize, b: usize, c: usize| {
        let (pa, pb, pc) = (flat_point(&flat, a), flat_point(&flat, b), flat_point(&flat, c));
        (pb[0] - pa[0]) * (pc[1] - pa[1]) - (pb[1] - pa[1]) * (pc[0] - pa[0])
    };
    let mut faces = Vec::with_capacity(triangles.len() / 3);
    for t in triangles.chunks_exact(3) {
        // upward facing in the local frame
        if area(t[0], t[1], t[2]) >= 0.0 {
            faces.push([t[0], t[1], t[2]]);
        } else {
            faces.push([t[0], t[2], t[1]]);
        }
    }
    for [a, b, c] in &faces {
        mesh.push_triangle(top[*a], top[*b], top[*c]);
    }

    let Some(extruded_height) = polygon.extruded_height else {
        return mesh.build();
    };

    let bottom: Vec<u32> = rings
        .iter()
        .flat_map(|ring| ring.iter())
        .map(|p| mesh.push_vertex(&with_height(p, extruded_height)))
        .collect();
    for [a, b, c] in &faces {
        mesh.push_triangle(bottom[*a], bottom[*c], bottom[*b]);
    }

    // walls, outward facing: exterior counter-clockwise, holes clockwise
    let mut offset = 0;
    for (i, ring) in local_rings.iter().enumerate() {
        let n = ring.len();
        let reverse = is_counter_clockwise(ring) != (i == 0);
        for j in 0..n {
            let (mut a, mut b) = (offset + j, offset + (j + 1) % n);
            if reverse {
                std::mem::swap(&mut a, &mut b);
            }
            mesh.push_triangle(bottom[a], bottom[b], top[b]);
            mesh.push_triangle(bottom[a], top[b], top[a]);
        }
        offset += n;
    }

    mesh.build()
}

fn flat_point(flat: &[f64], i: usize) -> [f64; 2] {
    [flat[i * 2], flat[i * 2 + 1]]
}

fn tessellate_circle(circle: &CircleGeometry) -> Option<BufferGeometry> {
    let [lon, lat] = circle.center_degrees;
    let segments = circle_segments(circle.radius, circle.granularity);
    let positions = (0..segments)
        .map(|i| {
            let bearing = 2.0 * std::f64::consts::PI * i as f64 / segments as f64;
            let (x, y) = cartesian::destination(lon, lat, bearing, circle.radius);
            cartesian::from_degrees(x, y, circle.height)
        })
        .collect();

    tessellate_polygon(&PolygonGeometry {
        polygon_hierarchy: PolygonHierarchy {
            positions,
            holes: Vec::new(),
        },
        height: circle.height,
        extruded_height: circle.extruded_height,
        per_position_height: false,
        vertex_format: circle.vertex_format,
    })
}

fn tessellate_wall(wall: &WallGeometry) -> Option<BufferGeometry> {
    if wall.positions.len() < 2 {
        return None;
    }
    let center = wall.positions.iter().sum::<Cartesian3>() / wall.positions.len() as f64;
    let mut mesh = MeshBuilder::new(center);

    let columns: Vec<(u32, u32)> = wall
        .positions
        .iter()
        .zip(wall.minimum_heights.iter().zip(&wall.maximum_heights))
        .map(|(p, (min, max))| {
            (
                mesh.push_vertex(&with_height(p, *min)),
                mesh.push_vertex(&with_height(p, *max)),
            )
        })
        .collect();
    for pair in columns.windows(2) {
        let ((bottom_a, top_a), (bottom_b, top_b)) = (pair[0], pair[1]);
        mesh.push_triangle(bottom_a, bottom_b, top_b);
        mesh.push_triangle(bottom_a, top_b, top_a);
    }

    mesh.build()
}

/// Triangulates area and wall geometries. Outlines, lines and shapes have no triangles.
pub fn tessellate_geometry(geometry: &EngineGeometry) -> Option<BufferGeometry> {
    match geometry {
        EngineGeometry::Polygon(polygon) => tessellate_polygon(polygon),
        EngineGeometry::Circle(circle) => tessellate_circle(circle),
        EngineGeometry::Wall(wall) => tessellate_wall(wall),
        _ => None,
    }
}

pub fn tessellate_geometry_option(option: &GeometryOption) -> Option<BufferGeometry> {
    tessellate_geometry(&option.geometry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_geometry::VertexFormat;
    use crate::factory::{GeometryOptionKind, DEFAULT_GRANULARITY};
    use crate::geometry::GeometryLayout;
    use crate::height_info::{HeightInfo, HeightRegime};

    fn height_info() -> HeightInfo {
        HeightInfo {
            layout: GeometryLayout::XY,
            extruded: true,
            skirt: 0.0,
            storey_heights_above_ground: vec![10.0],
            storey_heights_below_ground: vec![],
            regime: HeightRegime::Absolute {
                ground_level_or_min_height: 0.0,
                per_position_height: false,
            },
        }
    }

    fn square(extruded_height: Option<f64>) -> GeometryOption {
        let positions = [[0.0, 0.0], [0.001, 0.0], [0.001, 0.001], [0.0, 0.001]]
            .iter()
            .map(|[x, y]| cartesian::from_degrees(*x, *y, 0.0))
            .collect();
        GeometryOption::new(
            GeometryOptionKind::Solid,
            EngineGeometry::Polygon(PolygonGeometry {
                polygon_hierarchy: PolygonHierarchy {
                    positions,
                    holes: Vec::new(),
                },
                height: 10.0,
                extruded_height,
                per_position_height: false,
                vertex_format: VertexFormat::PositionAndNormal,
            }),
            &height_info(),
        )
    }

    #[test]
    fn flat_square_is_two_upward_triangles() {
        let mesh = tessellate_geometry_option(&square(None)).unwrap();
        assert_eq!(mesh.vertex_count(), 4);
        assert_eq!(mesh.triangle_count(), 2);

        let center = Vector3::new(mesh.center[0], mesh.center[1], mesh.center[2]);
        let up = cartesian::geodetic_surface_normal(&center);
        for normal in mesh.normals.chunks_exact(3) {
            let n = Vector3::new(normal[0] as f64, normal[1] as f64, normal[2] as f64);
            assert!(n.dot(&up) > 0.99);
        }
    }

    #[test]
    fn extruded_square_has_caps_and_walls() {
        let mesh = tessellate_geometry_option(&square(Some(0.0))).unwrap();
        assert_eq!(mesh.vertex_count(), 8);
        // two caps of two triangles, four walls of two triangles
        assert_eq!(mesh.triangle_count(), 12);
    }

    #[test]
    fn circle_is_triangulated_as_a_polygon() {
        let option = GeometryOption::new(
            GeometryOptionKind::Fill,
            EngineGeometry::Circle(CircleGeometry {
                center: cartesian::from_degrees(1.0, 1.0, 0.0),
                center_degrees: [1.0, 1.0],
                radius: 10.0,
                height: 0.0,
                extruded_height: None,
                granularity: DEFAULT_GRANULARITY,
                vertex_format: VertexFormat::PositionAndNormal,
            }),
            &height_info(),
        );
        let mesh = tessellate_geometry_option(&option).unwrap();
        assert_eq!(mesh.vertex_count(), 36);
        assert_eq!(mesh.triangle_count(), 34);
    }

    #[test]
    fn wall_has_two_triangles_per_segment() {
        let positions: Vec<Cartesian3> = (0..3)
            .map(|i| cartesian::from_degrees(i as f64 * 0.001, 0.0, 0.0))
            .collect();
        let option = GeometryOption::new(
            GeometryOptionKind::Solid,
            EngineGeometry::Wall(WallGeometry {
                positions,
                minimum_heights: vec![0.0; 3],
                maximum_heights: vec![5.0; 3],
                vertex_format: VertexFormat::PositionAndNormal,
            }),
            &height_info(),
        );
        let mesh = tessellate_geometry_option(&option).unwrap();
        assert_eq!(mesh.vertex_count(), 6);
        assert_eq!(mesh.triangle_count(), 4);
    }

    #[test]
    fn outlines_are_not_tessellated() {
        let mut option = square(None);
        if let EngineGeometry::Polygon(polygon) = option.geometry.clone() {
            option.geometry = EngineGeometry::PolygonOutline(polygon);
        }
        assert!(tessellate_geometry_option(&option).is_none());
    }
}
