use super::{path_positions, GeometryOption, GeometryOptionKind, VectorGeometryFactory};
use crate::cartesian::{self, Cartesian3};
use crate::engine_geometry::{EngineGeometry, PolylineGeometry, VertexFormat, WallGeometry};
use crate::error::ConvertError;
use crate::geometry::{Geometry, GeometryKind};
use crate::height_info::{adjust_position_height, HeightInfo};
use crate::style::StrokeStyle;

pub struct LineFactory;

#[derive(Debug, Clone, PartialEq)]
pub struct LineOptions {
    /// Path at the adjusted heights
    pub positions: Vec<Cartesian3>,
    /// Path on the ellipsoid, used as wall base and for draped lines
    pub surface_positions: Vec<Cartesian3>,
    pub heights: Vec<f64>,
}

impl LineFactory {
    fn wall(
        options: &LineOptions,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
    ) -> WallGeometry {
        let tops: Vec<f64> = if per_position_height {
            options.heights.clone()
        } else {
            vec![height; options.heights.len()]
        };
        let bottom = extruded_height.unwrap_or(height);
        let (minimum_heights, maximum_heights) = tops
            .iter()
            .map(|top| (top.min(bottom), top.max(bottom)))
            .unzip();

        WallGeometry {
            positions: options.surface_positions.clone(),
            minimum_heights,
            maximum_heights,
            vertex_format: VertexFormat::PositionAndNormal,
        }
    }
}

impl VectorGeometryFactory for LineFactory {
    type Options = LineOptions;

    fn geometry_options(
        &self,
        geometry: &Geometry,
        height_info: &HeightInfo,
    ) -> Result<LineOptions, ConvertError> {
        let Geometry::LineString { coordinates } = geometry else {
            return Err(ConvertError::GeometryKindMismatch {
                expected: GeometryKind::LineString,
                found: geometry.kind(),
            });
        };

        Ok(LineOptions {
            positions: path_positions(coordinates, height_info),
            surface_positions: coordinates
                .iter()
                .map(|c| cartesian::from_coordinate(c, 0.0))
                .collect(),
            heights: coordinates
                .iter()
                .map(|c| adjust_position_height(c, height_info))
                .collect(),
        })
    }

    fn create_solid_geometries(
        &self,
        options: &LineOptions,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
    ) -> Vec<GeometryOption> {
        let wall = Self::wall(options, height, per_position_height, extruded_height);
        vec![GeometryOption::new(
            GeometryOptionKind::Solid,
            EngineGeometry::Wall(wall),
            height_info,
        )]
    }

    fn create_outline_geometries(
        &self,
        options: &LineOptions,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
    ) -> Vec<GeometryOption> {
        let mut wall = Self::wall(options, height, per_position_height, extruded_height);
        wall.vertex_format = VertexFormat::PositionOnly;
        vec![GeometryOption::new(
            GeometryOptionKind::Outline,
            EngineGeometry::WallOutline(wall),
            height_info,
        )]
    }

    // a line has no area to fill
    fn create_fill_geometries(
        &self,
        _options: &LineOptions,
        _height_info: &HeightInfo,
        _height: f64,
        _per_position_height: bool,
    ) -> Vec<GeometryOption> {
        Vec::new()
    }

    fn create_line_geometries(
        &self,
        options: &LineOptions,
        height_info: &HeightInfo,
        stroke: &StrokeStyle,
    ) -> Vec<GeometryOption> {
        vec![GeometryOption::new(
            GeometryOptionKind::Line,
            EngineGeometry::Polyline(PolylineGeometry {
                positions: options.positions.clone(),
                width: stroke.width,
            }),
            height_info,
        )]
    }

    fn create_ground_line_geometries(
        &self,
        options: &LineOptions,
        height_info: &HeightInfo,
        stroke: &StrokeStyle,
    ) -> Vec<GeometryOption> {
        vec![GeometryOption::new(
            GeometryOptionKind::GroundLine,
            EngineGeometry::GroundPolyline(PolylineGeometry {
                positions: options.surface_positions.clone(),
                width: stroke.width,
            }),
            height_info,
        )]
    }
}
