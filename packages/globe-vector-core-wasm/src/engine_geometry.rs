// Engine native geometry descriptors. Positions are earth-fixed cartesians.
use serde::{Deserialize, Serialize};

use crate::cartesian::Cartesian3;
use crate::vector_properties::PrimitiveShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VertexFormat {
    PositionOnly,
    PositionAndNormal,
    PositionAndColor,
}

/// Outer ring with its holes. Rings are open (the closing position is dropped).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonHierarchy {
    pub positions: Vec<Cartesian3>,
    pub holes: Vec<PolygonHierarchy>,
}

impl PolygonHierarchy {
    /// Every ring of the hierarchy, outer ring first
    pub fn rings(&self) -> Vec<&[Cartesian3]> {
        let mut rings = vec![self.positions.as_slice()];
        for hole in &self.holes {
            rings.extend(hole.rings());
        }
        rings
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolygonGeometry {
    pub polygon_hierarchy: PolygonHierarchy,
    pub height: f64,
    pub extruded_height: Option<f64>,
    /// Positions keep their own height, `height` is ignored
    pub per_position_height: bool,
    pub vertex_format: VertexFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CircleGeometry {
    pub center: Cartesian3,
    /// `[lon, lat]` of the center in degrees
    pub center_degrees: [f64; 2],
    pub radius: f64,
    pub height: f64,
    pub extruded_height: Option<f64>,
    /// Angular distance in radians between generated points
    pub granularity: f64,
    pub vertex_format: VertexFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallGeometry {
    /// Wall base line, on the ellipsoid surface
    pub positions: Vec<Cartesian3>,
    pub minimum_heights: Vec<f64>,
    pub maximum_heights: Vec<f64>,
    pub vertex_format: VertexFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolylineGeometry {
    pub positions: Vec<Cartesian3>,
    pub width: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineGeometry {
    Polygon(PolygonGeometry),
    PolygonOutline(PolygonGeometry),
    Circle(CircleGeometry),
    CircleOutline(CircleGeometry),
    Wall(WallGeometry),
    WallOutline(WallGeometry),
    Polyline(PolylineGeometry),
    GroundPolyline(PolylineGeometry),
    /// Shape in the local frame of a model matrix
    Shape { shape: PrimitiveShape, outline: bool },
}

impl EngineGeometry {
    pub fn is_outline(&self) -> bool {
        matches!(
            self,
            EngineGeometry::PolygonOutline(_)
                | EngineGeometry::CircleOutline(_)
                | EngineGeometry::WallOutline(_)
                | EngineGeometry::Shape { outline: true, .. }
        )
    }

    pub fn is_polyline(&self) -> bool {
        matches!(
            self,
            EngineGeometry::Polyline(_) | EngineGeometry::GroundPolyline(_)
        )
    }

    /// Vertical bounds `(height, extruded_height)` of extrudable descriptors
    pub fn height_range(&self) -> Option<(f64, Option<f64>)> {
        match self {
            EngineGeometry::Polygon(g) | EngineGeometry::PolygonOutline(g) => {
                Some((g.height, g.extruded_height))
            }
            EngineGeometry::Circle(g) | EngineGeometry::CircleOutline(g) => {
                Some((g.height, g.extruded_height))
            }
            _ => None,
        }
    }
}
