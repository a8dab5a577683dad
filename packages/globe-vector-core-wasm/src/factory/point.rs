use super::{GeometryOption, GeometryOptionKind, VectorGeometryFactory};
use crate::cartesian::{self, Cartesian3};
use crate::engine_geometry::{EngineGeometry, PolylineGeometry};
use crate::error::ConvertError;
use crate::geometry::{Geometry, GeometryKind};
use crate::height_info::{adjust_position_height, HeightInfo};
use crate::style::StrokeStyle;

/// Points only contribute the vertical line of an extrusion, everything else is
/// produced by the point pipeline.
pub struct PointFactory;

#[derive(Debug, Clone, PartialEq)]
pub struct PointOptions {
    pub coordinate: [f64; 2],
    pub base_height: f64,
    /// Base plus the storeys above minus the storeys below
    pub top_height: f64,
}

impl PointOptions {
    pub fn base(&self) -> Cartesian3 {
        cartesian::from_degrees(self.coordinate[0], self.coordinate[1], self.base_height)
    }

    pub fn top(&self) -> Cartesian3 {
        cartesian::from_degrees(self.coordinate[0], self.coordinate[1], self.top_height)
    }
}

impl VectorGeometryFactory for PointFactory {
    type Options = PointOptions;

    fn geometry_options(
        &self,
        geometry: &Geometry,
        height_info: &HeightInfo,
    ) -> Result<PointOptions, ConvertError> {
        let Geometry::Point { coordinates } = geometry else {
            return Err(ConvertError::GeometryKindMismatch {
                expected: GeometryKind::Point,
                found: geometry.kind(),
            });
        };
        if coordinates.len() < 2 {
            return Err(ConvertError::InvalidInput(
                "point needs two coordinates".to_string(),
            ));
        }

        let base_height = adjust_position_height(coordinates, height_info);
        let above: f64 = height_info.storey_heights_above_ground.iter().sum();
        let below: f64 = height_info.storey_heights_below_ground.iter().sum();
        Ok(PointOptions {
            coordinate: [coordinates[0], coordinates[1]],
            base_height,
            top_height: base_height + above - below,
        })
    }

    fn create_solid_geometries(
        &self,
        _options: &PointOptions,
        _height_info: &HeightInfo,
        _height: f64,
        _per_position_height: bool,
        _extruded_height: Option<f64>,
    ) -> Vec<GeometryOption> {
        Vec::new()
    }

    fn create_outline_geometries(
        &self,
        _options: &PointOptions,
        _height_info: &HeightInfo,
        _height: f64,
        _per_position_height: bool,
        _extruded_height: Option<f64>,
    ) -> Vec<GeometryOption> {
        Vec::new()
    }

    fn create_fill_geometries(
        &self,
        _options: &PointOptions,
        _height_info: &HeightInfo,
        _height: f64,
        _per_position_height: bool,
    ) -> Vec<GeometryOption> {
        Vec::new()
    }

    fn create_line_geometries(
        &self,
        options: &PointOptions,
        height_info: &HeightInfo,
        stroke: &StrokeStyle,
    ) -> Vec<GeometryOption> {
        if !height_info.extruded {
            return Vec::new();
        }
        vec![GeometryOption::new(
            GeometryOptionKind::Line,
            EngineGeometry::Polyline(PolylineGeometry {
                positions: vec![options.base(), options.top()],
                width: stroke.width,
            }),
            height_info,
        )]
    }

    fn create_ground_line_geometries(
        &self,
        _options: &PointOptions,
        _height_info: &HeightInfo,
        _stroke: &StrokeStyle,
    ) -> Vec<GeometryOption> {
        Vec::new()
    }
}
