use serde::{Deserialize, Serialize};

use crate::cartesian::radius_in_degrees;
use crate::geometry::Geometry;
use crate::height_info::{HeightInfo, HeightRegime};

/// Axis aligned 3D bounding box accumulator `[minX, minY, minZ, maxX, maxY, maxZ]`.
///
/// Starts empty (`+inf` minimum, `-inf` maximum) and only ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent3D {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
}

impl Default for Extent3D {
    fn default() -> Self {
        Extent3D {
            min_x: f64::INFINITY,
            min_y: f64::INFINITY,
            min_z: f64::INFINITY,
            max_x: f64::NEG_INFINITY,
            max_y: f64::NEG_INFINITY,
            max_z: f64::NEG_INFINITY,
        }
    }
}

impl Extent3D {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_array(values: [f64; 6]) -> Self {
        let [min_x, min_y, min_z, max_x, max_y, max_z] = values;
        Extent3D {
            min_x,
            min_y,
            min_z,
            max_x,
            max_y,
            max_z,
        }
    }

    pub fn from_geometry(geometry: &Geometry) -> Self {
        let mut extent = Self::new();
        extent.extend_with_geometry(geometry);
        extent
    }

    pub fn to_array(&self) -> [f64; 6] {
        [
            self.min_x, self.min_y, self.min_z, self.max_x, self.max_y, self.max_z,
        ]
    }

    /// The 2D extent `[minX, minY, maxX, maxY]`
    pub fn to_2d(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    pub fn is_empty(&self) -> bool {
        self.min_x > self.max_x
    }

    pub fn extend_xyz(&mut self, x: f64, y: f64, z: f64) {
        self.extend_xy(x, y);
        self.extend_z(z);
    }

    pub fn extend_xy(&mut self, x: f64, y: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
    }

    pub fn extend_z(&mut self, z: f64) {
        self.min_z = self.min_z.min(z);
        self.max_z = self.max_z.max(z);
    }

    /// Extends by flat coordinates of the given stride. Strides below 3 only touch X and Y.
    pub fn extend_flat_coordinates(&mut self, flat_coordinates: &[f64], stride: usize) {
        if stride < 2 {
            return;
        }
        for chunk in flat_coordinates.chunks_exact(stride) {
            if stride > 2 && chunk[2].is_finite() {
                self.extend_xyz(chunk[0], chunk[1], chunk[2]);
            } else {
                self.extend_xy(chunk[0], chunk[1]);
            }
        }
    }

    pub fn extend_with_geometry(&mut self, geometry: &Geometry) {
        match geometry {
            Geometry::Circle { center, radius } if center.len() >= 2 => {
                let (d_lon, d_lat) = radius_in_degrees(*radius, center[1]);
                self.extend_xy(center[0] - d_lon, center[1] - d_lat);
                self.extend_xy(center[0] + d_lon, center[1] + d_lat);
                if let Some(z) = center.get(2).filter(|z| z.is_finite()) {
                    self.extend_z(*z);
                }
            }
            Geometry::GeometryCollection { geometries } => {
                for geometry in geometries {
                    self.extend_with_geometry(geometry);
                }
            }
            _ => {
                let stride = geometry.layout().stride();
                self.extend_flat_coordinates(&geometry.flat_coordinates(), stride);
            }
        }
    }

    /// Extends Z by the vertical span an extrusion covers. Only regimes with a known
    /// ground elevation contribute; clamped geometry is resolved by the engine.
    pub fn extend_with_height_info(&mut self, height_info: &HeightInfo) {
        let base = match &height_info.regime {
            HeightRegime::Absolute {
                ground_level_or_min_height,
                ..
            } => *ground_level_or_min_height,
            HeightRegime::Relative {
                ground_level: Some(ground_level),
                height_above_ground,
                ..
            } => ground_level + height_above_ground.unwrap_or(0.0),
            _ => return,
        };

        self.extend_z(base);
        if height_info.extruded {
            let above: f64 = height_info.storey_heights_above_ground.iter().sum();
            let below: f64 = height_info.storey_heights_below_ground.iter().sum();
            self.extend_z(base + above);
            self.extend_z(base - below - height_info.skirt);
        }
    }

    pub fn center(&self) -> [f64; 3] {
        [
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
            (self.min_z + self.max_z) / 2.0,
        ]
    }

    pub fn size(&self) -> [f64; 3] {
        [
            self.max_x - self.min_x,
            self.max_y - self.min_y,
            self.max_z - self.min_z,
        ]
    }

    // Check if this box intersects with another box
    pub fn intersects(&self, other: &Extent3D) -> bool {
        !(other.max_x < self.min_x
            || other.min_x > self.max_x
            || other.max_y < self.min_y
            || other.min_y > self.max_y
            || other.max_z < self.min_z
            || other.min_z > self.max_z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryLayout;

    fn line() -> Geometry {
        Geometry::LineString {
            coordinates: vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, -1.0], vec![2.0, 0.0, 8.0]],
        }
    }

    #[test]
    fn empty_until_extended() {
        let mut extent = Extent3D::new();
        assert!(extent.is_empty());
        extent.extend_xy(1.0, 1.0);
        assert!(!extent.is_empty());
    }

    #[test]
    fn extending_twice_with_the_same_geometry_is_idempotent() {
        let mut extent = Extent3D::new();
        extent.extend_with_geometry(&line());
        let first = extent;
        extent.extend_with_geometry(&line());
        assert_eq!(extent, first);
        assert_eq!(extent.to_array(), [1.0, 0.0, -1.0, 4.0, 5.0, 8.0]);
    }

    #[test]
    fn two_dimensional_geometry_leaves_z_empty() {
        let extent = Extent3D::from_geometry(&Geometry::Point {
            coordinates: vec![1.0, 2.0],
        });
        assert_eq!(extent.to_2d(), [1.0, 2.0, 1.0, 2.0]);
        assert!(extent.min_z > extent.max_z);
    }

    #[test]
    fn circle_extent_surrounds_the_center() {
        let extent = Extent3D::from_geometry(&Geometry::Circle {
            center: vec![10.0, 50.0, 5.0],
            radius: 100.0,
        });
        let center = extent.center();
        assert!((center[0] - 10.0).abs() < 1e-9);
        assert!((center[1] - 50.0).abs() < 1e-9);
        assert!(extent.size()[0] > extent.size()[1]);
        assert_eq!(extent.min_z, 5.0);
    }

    #[test]
    fn height_info_extends_by_storeys_and_skirt() {
        let height_info = HeightInfo {
            layout: GeometryLayout::XY,
            extruded: true,
            skirt: 2.0,
            storey_heights_above_ground: vec![3.0, 3.0],
            storey_heights_below_ground: vec![1.0],
            regime: HeightRegime::Absolute {
                ground_level_or_min_height: 10.0,
                per_position_height: false,
            },
        };
        let mut extent = Extent3D::new();
        extent.extend_with_height_info(&height_info);
        assert_eq!(extent.min_z, 7.0);
        assert_eq!(extent.max_z, 16.0);
    }

    #[test]
    fn clamped_height_info_does_not_extend() {
        let height_info = HeightInfo {
            layout: GeometryLayout::XY,
            extruded: false,
            skirt: 0.0,
            storey_heights_above_ground: vec![],
            storey_heights_below_ground: vec![],
            regime: HeightRegime::Clamped,
        };
        let mut extent = Extent3D::new();
        extent.extend_with_height_info(&height_info);
        assert!(extent.min_z > extent.max_z);
    }

    #[test]
    fn intersection_of_boxes() {
        let a = Extent3D::from_array([0.0, 0.0, 0.0, 2.0, 2.0, 2.0]);
        let b = Extent3D::from_array([1.0, 1.0, 1.0, 3.0, 3.0, 3.0]);
        let c = Extent3D::from_array([5.0, 5.0, 5.0, 6.0, 6.0, 6.0]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
