use std::f64::consts::PI;

use super::{GeometryOption, GeometryOptionKind, VectorGeometryFactory};
use crate::cartesian::{self, Cartesian3};
use crate::engine_geometry::{CircleGeometry, EngineGeometry, PolylineGeometry, VertexFormat};
use crate::error::ConvertError;
use crate::geometry::{Geometry, GeometryKind};
use crate::height_info::{adjust_position_height, HeightInfo};
use crate::style::StrokeStyle;

/// One degree, in radians
pub const DEFAULT_GRANULARITY: f64 = PI / 180.0;
const MIN_SEGMENTS: usize = 36;
const MAX_SEGMENTS: usize = 720;

pub struct CircleFactory;

#[derive(Debug, Clone, PartialEq)]
pub struct CircleOptions {
    pub center: Cartesian3,
    pub center_degrees: [f64; 2],
    pub radius: f64,
    /// Adjusted height of the center
    pub height: f64,
}

/// Number of segments a circle outline is approximated with.
pub fn circle_segments(radius: f64, granularity: f64) -> usize {
    let semi_major_axis = 6378137.0;
    let segments = (2.0 * PI * radius / (granularity * semi_major_axis)).ceil();
    if segments.is_finite() {
        (segments as usize).clamp(MIN_SEGMENTS, MAX_SEGMENTS)
    } else {
        MIN_SEGMENTS
    }
}

/// Closed circular path around the center at `height`.
pub fn circle_path(options: &CircleOptions, height: f64) -> Vec<Cartesian3> {
    let [lon, lat] = options.center_degrees;
    let segments = circle_segments(options.radius, DEFAULT_GRANULARITY);
    let mut path: Vec<Cartesian3> = (0..segments)
        .map(|i| {
            let bearing = 2.0 * PI * i as f64 / segments as f64;
            let (x, y) = cartesian::destination(lon, lat, bearing, options.radius);
            cartesian::from_degrees(x, y, height)
        })
        .collect();
    if let Some(first) = path.first().copied() {
        path.push(first);
    }
    path
}

impl CircleFactory {
    fn circle(
        options: &CircleOptions,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
        vertex_format: VertexFormat,
    ) -> CircleGeometry {
        CircleGeometry {
            center: options.center,
            center_degrees: options.center_degrees,
            radius: options.radius,
            height: if per_position_height {
                options.height
            } else {
                height
            },
            extruded_height,
            granularity: DEFAULT_GRANULARITY,
            vertex_format,
        }
    }
}

impl VectorGeometryFactory for CircleFactory {
    type Options = CircleOptions;

    fn geometry_options(
        &self,
        geometry: &Geometry,
        height_info: &HeightInfo,
    ) -> Result<CircleOptions, ConvertError> {
        let Geometry::Circle { center, radius } = geometry else {
            return Err(ConvertError::GeometryKindMismatch {
                expected: GeometryKind::Circle,
                found: geometry.kind(),
            });
        };
        if center.len() < 2 {
            return Err(ConvertError::InvalidInput(
                "circle center needs two coordinates".to_string(),
            ));
        }

        let height = adjust_position_height(center, height_info);
        Ok(CircleOptions {
            center: cartesian::from_coordinate(center, height),
            center_degrees: [center[0], center[1]],
            radius: *radius,
            height,
        })
    }

    fn create_solid_geometries(
        &self,
        options: &CircleOptions,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
    ) -> Vec<GeometryOption> {
        let circle = Self::circle(
            options,
            height,
            per_position_height,
            extruded_height,
            VertexFormat::PositionAndNormal,
        );
        vec![GeometryOption::new(
            GeometryOptionKind::Solid,
            EngineGeometry::Circle(circle),
            height_info,
        )]
    }

    fn create_outline_geometries(
        &self,
        options: &CircleOptions,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
    ) -> Vec<GeometryOption> {
        let circle = Self::circle(
            options,
            height,
            per_position_height,
            extruded_height,
            VertexFormat::PositionOnly,
        );
        vec![GeometryOption::new(
            GeometryOptionKind::Outline,
            EngineGeometry::CircleOutline(circle),
            height_info,
        )]
    }

    fn create_fill_geometries(
        &self,
        options: &CircleOptions,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
    ) -> Vec<GeometryOption> {
        let circle = Self::circle(
            options,
            height,
            per_position_height,
            None,
            VertexFormat::PositionAndNormal,
        );
        vec![GeometryOption::new(
            GeometryOptionKind::Fill,
            EngineGeometry::Circle(circle),
            height_info,
        )]
    }

    fn create_line_geometries(
        &self,
        options: &CircleOptions,
        height_info: &HeightInfo,
        stroke: &StrokeStyle,
    ) -> Vec<GeometryOption> {
        vec![GeometryOption::new(
            GeometryOptionKind::Line,
            EngineGeometry::Polyline(PolylineGeometry {
                positions: circle_path(options, options.height),
                width: stroke.width,
            }),
            height_info,
        )]
    }

    fn create_ground_line_geometries(
        &self,
        options: &CircleOptions,
        height_info: &HeightInfo,
        stroke: &StrokeStyle,
    ) -> Vec<GeometryOption> {
        vec![GeometryOption::new(
            GeometryOptionKind::GroundLine,
            EngineGeometry::GroundPolyline(PolylineGeometry {
                positions: circle_path(options, 0.0),
                width: stroke.width,
            }),
            height_info,
        )]
    }
}
