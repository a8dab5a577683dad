//! Per geometry kind factories for engine geometry descriptors.
//!
//! Every kind implements [`VectorGeometryFactory`]; [`get_geometries_options`] is the single
//! algorithm deciding which fills, lines, solids and outlines a styled geometry needs.

mod circle;
mod line;
mod point;
mod polygon;

pub use circle::{circle_segments, CircleFactory, CircleOptions, DEFAULT_GRANULARITY};
pub use line::{LineFactory, LineOptions};
pub use point::{PointFactory, PointOptions};
pub use polygon::{PolygonFactory, PolygonOptions};

use serde::{Deserialize, Serialize};

use crate::cartesian::{self, Cartesian3};
use crate::engine_geometry::EngineGeometry;
use crate::error::ConvertError;
use crate::geometry::Geometry;
use crate::height_info::{
    adjust_position_height, get_geometry_base_height, get_storey_options, HeightInfo,
};
use crate::style::{StrokeStyle, Style};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GeometryOptionKind {
    Fill,
    Outline,
    Line,
    GroundLine,
    Solid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeometryOption {
    #[serde(rename = "type")]
    pub kind: GeometryOptionKind,
    pub geometry: EngineGeometry,
    pub height_info: HeightInfo,
}

impl GeometryOption {
    pub fn new(kind: GeometryOptionKind, geometry: EngineGeometry, height_info: &HeightInfo) -> Self {
        Self {
            kind,
            geometry,
            height_info: height_info.clone(),
        }
    }
}

pub trait VectorGeometryFactory {
    type Options;

    /// Converts the raw coordinates into engine positions, heights adjusted by `height_info`.
    fn geometry_options(
        &self,
        geometry: &Geometry,
        height_info: &HeightInfo,
    ) -> Result<Self::Options, ConvertError>;

    fn create_solid_geometries(
        &self,
        options: &Self::Options,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
    ) -> Vec<GeometryOption>;

    fn create_outline_geometries(
        &self,
        options: &Self::Options,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
    ) -> Vec<GeometryOption>;

    fn create_fill_geometries(
        &self,
        options: &Self::Options,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
    ) -> Vec<GeometryOption>;

    fn create_line_geometries(
        &self,
        options: &Self::Options,
        height_info: &HeightInfo,
        stroke: &StrokeStyle,
    ) -> Vec<GeometryOption>;

    fn create_ground_line_geometries(
        &self,
        options: &Self::Options,
        height_info: &HeightInfo,
        stroke: &StrokeStyle,
    ) -> Vec<GeometryOption>;
}

/// Engine positions of a coordinate path, heights adjusted by `height_info`.
pub(crate) fn path_positions(coordinates: &[Vec<f64>], height_info: &HeightInfo) -> Vec<Cartesian3> {
    coordinates
        .iter()
        .map(|c| cartesian::from_coordinate(c, adjust_position_height(c, height_info)))
        .collect()
}

/// Geometry options for `geometry` drawn with `style`.
///
/// Clamped geometry gets a fill and a ground line, flat geometry a fill and a line, extruded
/// geometry one solid and one outline per storey plus a skirt pair.
pub fn get_geometries_options<F: VectorGeometryFactory>(
    style: &Style,
    geometry: &Geometry,
    factory: &F,
    height_info: &HeightInfo,
) -> Result<Vec<GeometryOption>, ConvertError> {
    if !style.has_fill() && !style.has_stroke() {
        return Ok(Vec::new());
    }

    let options = factory.geometry_options(geometry, height_info)?;
    let mut geometry_options = Vec::new();

    if height_info.is_clamped() {
        if style.has_fill() {
            geometry_options.extend(factory.create_fill_geometries(&options, height_info, 0.0, false));
        }
        if let Some(stroke) = &style.stroke {
            geometry_options.extend(factory.create_ground_line_geometries(
                &options,
                height_info,
                stroke,
            ));
        }
        return Ok(geometry_options);
    }

    let base_height = get_geometry_base_height(height_info);
    let per_position_height = height_info.per_position_height();

    if !height_info.extruded {
        if style.has_fill() {
            geometry_options.extend(factory.create_fill_geometries(
                &options,
                height_info,
                base_height,
                per_position_height,
            ));
        }
        if let Some(stroke) = &style.stroke {
            geometry_options.extend(factory.create_line_geometries(&options, height_info, stroke));
        }
        return Ok(geometry_options);
    }

    let storey_options = get_storey_options(height_info, base_height);
    let mut push_pair = |height: f64, per_position_height: bool, extruded_height: f64| {
        if style.has_fill() {
            geometry_options.extend(factory.create_solid_geometries(
                &options,
                height_info,
                height,
                per_position_height,
                Some(extruded_height),
            ));
        }
        if style.has_stroke() {
            geometry_options.extend(factory.create_outline_geometries(
                &options,
                height_info,
                height,
                per_position_height,
                Some(extruded_height),
            ));
        }
    };

    for storey in &storey_options.storeys {
        push_pair(
            storey.current_height,
            per_position_height,
            storey.extruded_height,
        );
    }
    if height_info.skirt > 0.0 {
        let bottom = storey_options.skirt_level + height_info.skirt;
        push_pair(bottom, false, storey_options.skirt_level);
    }

    Ok(geometry_options)
}
