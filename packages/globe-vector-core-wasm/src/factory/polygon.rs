use super::{path_positions, GeometryOption, GeometryOptionKind, VectorGeometryFactory};
use crate::cartesian::Cartesian3;
use crate::engine_geometry::{
    EngineGeometry, PolygonGeometry, PolygonHierarchy, PolylineGeometry, VertexFormat,
};
use crate::error::ConvertError;
use crate::geometry::{open_ring, Geometry, GeometryKind};
use crate::height_info::HeightInfo;
use crate::style::StrokeStyle;

pub struct PolygonFactory;

#[derive(Debug, Clone, PartialEq)]
pub struct PolygonOptions {
    pub polygon_hierarchy: PolygonHierarchy,
}

impl PolygonFactory {
    fn polygon(
        options: &PolygonOptions,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
        vertex_format: VertexFormat,
    ) -> PolygonGeometry {
        PolygonGeometry {
            polygon_hierarchy: options.polygon_hierarchy.clone(),
            height,
            extruded_height,
            per_position_height,
            vertex_format,
        }
    }

    // Every ring as a closed path
    fn ring_paths(options: &PolygonOptions) -> Vec<Vec<Cartesian3>> {
        options
            .polygon_hierarchy
            .rings()
            .into_iter()
            .filter_map(|ring| {
                let first = *ring.first()?;
                let mut path = ring.to_vec();
                path.push(first);
                Some(path)
            })
            .collect()
    }
}

impl VectorGeometryFactory for PolygonFactory {
    type Options = PolygonOptions;

    fn geometry_options(
        &self,
        geometry: &Geometry,
        height_info: &HeightInfo,
    ) -> Result<PolygonOptions, ConvertError> {
        let Geometry::Polygon { coordinates } = geometry else {
            return Err(ConvertError::GeometryKindMismatch {
                expected: GeometryKind::Polygon,
                found: geometry.kind(),
            });
        };

        let mut rings = coordinates
            .iter()
            .map(|ring| path_positions(open_ring(ring), height_info));
        let positions = rings.next().unwrap_or_default();
        let holes = rings
            .map(|positions| PolygonHierarchy {
                positions,
                holes: Vec::new(),
            })
            .collect();

        Ok(PolygonOptions {
            polygon_hierarchy: PolygonHierarchy { positions, holes },
        })
    }

    fn create_solid_geometries(
        &self,
        options: &PolygonOptions,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
    ) -> Vec<GeometryOption> {
        let polygon = Self::polygon(
            options,
            height,
            per_position_height,
            extruded_height,
            VertexFormat::PositionAndNormal,
        );
        vec![GeometryOption::new(
            GeometryOptionKind::Solid,
            EngineGeometry::Polygon(polygon),
            height_info,
        )]
    }

    fn create_outline_geometries(
        &self,
        options: &PolygonOptions,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
        extruded_height: Option<f64>,
    ) -> Vec<GeometryOption> {
        let polygon = Self::polygon(
            options,
            height,
            per_position_height,
            extruded_height,
            VertexFormat::PositionOnly,
        );
        vec![GeometryOption::new(
            GeometryOptionKind::Outline,
            EngineGeometry::PolygonOutline(polygon),
            height_info,
        )]
    }

    fn create_fill_geometries(
        &self,
        options: &PolygonOptions,
        height_info: &HeightInfo,
        height: f64,
        per_position_height: bool,
    ) -> Vec<GeometryOption> {
        let polygon = Self::polygon(
            options,
            height,
            per_position_height,
            None,
            VertexFormat::PositionAndNormal,
        );
        vec![GeometryOption::new(
            GeometryOptionKind::Fill,
            EngineGeometry::Polygon(polygon),
            height_info,
        )]
    }

    fn create_line_geometries(
        &self,
        options: &PolygonOptions,
        height_info: &HeightInfo,
        stroke: &StrokeStyle,
    ) -> Vec<GeometryOption> {
        Self::ring_paths(options)
            .into_iter()
            .map(|positions| {
                GeometryOption::new(
                    GeometryOptionKind::Line,
                    EngineGeometry::Polyline(PolylineGeometry {
                        positions,
                        width: stroke.width,
                    }),
                    height_info,
                )
            })
            .collect()
    }

    fn create_ground_line_geometries(
        &self,
        options: &PolygonOptions,
        height_info: &HeightInfo,
        stroke: &StrokeStyle,
    ) -> Vec<GeometryOption> {
        Self::ring_paths(options)
            .into_iter()
            .map(|positions| {
                GeometryOption::new(
                    GeometryOptionKind::GroundLine,
                    EngineGeometry::GroundPolyline(PolylineGeometry {
                        positions,
                        width: stroke.width,
                    }),
                    height_info,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::GeometryLayout;
    use crate::height_info::HeightRegime;
    use crate::style::Color;

    fn absolute(ground_level: f64, per_position_height: bool) -> HeightInfo {
        HeightInfo {
            layout: GeometryLayout::XYZ,
            extruded: false,
            skirt: 0.0,
            storey_heights_above_ground: vec![],
            storey_heights_below_ground: vec![],
            regime: HeightRegime::Absolute {
                ground_level_or_min_height: ground_level,
                per_position_height,
            },
        }
    }

    fn with_hole() -> Geometry {
        Geometry::Polygon {
            coordinates: vec![
                vec![
                    vec![0.0, 0.0, 5.0],
                    vec![1.0, 0.0, 5.0],
                    vec![1.0, 1.0, 5.0],
                    vec![0.0, 1.0, 5.0],
                    vec![0.0, 0.0, 5.0],
                ],
                vec![
                    vec![0.2, 0.2, 5.0],
                    vec![0.4, 0.2, 5.0],
                    vec![0.4, 0.4, 5.0],
                    vec![0.2, 0.2, 5.0],
                ],
            ],
        }
    }

    #[test]
    fn rings_become_a_hierarchy_of_open_rings() {
        let options = PolygonFactory
            .geometry_options(&with_hole(), &absolute(5.0, true))
            .unwrap();
        assert_eq!(options.polygon_hierarchy.positions.len(), 4);
        assert_eq!(options.polygon_hierarchy.holes.len(), 1);
        assert_eq!(options.polygon_hierarchy.holes[0].positions.len(), 3);
    }

    #[test]
    fn one_closed_line_per_ring() {
        let height_info = absolute(5.0, true);
        let options = PolygonFactory.geometry_options(&with_hole(), &height_info).unwrap();
        let stroke = StrokeStyle {
            color: Color::BLACK,
            width: 3.0,
            line_dash: None,
        };
        let lines = PolygonFactory.create_line_geometries(&options, &height_info, &stroke);
        assert_eq!(lines.len(), 2);
        match &lines[0].geometry {
            EngineGeometry::Polyline(line) => {
                assert_eq!(line.positions.len(), 5);
                assert_eq!(line.positions.first(), line.positions.last());
                assert_eq!(line.width, 3.0);
            }
            other => panic!("expected a polyline, got {:?}", other),
        }
        let ground = PolygonFactory.create_ground_line_geometries(&options, &height_info, &stroke);
        assert!(ground
            .iter()
            .all(|o| matches!(o.geometry, EngineGeometry::GroundPolyline(_))));
    }

    #[test]
    fn solid_carries_the_storey_bounds() {
        let height_info = absolute(5.0, false);
        let options = PolygonFactory.geometry_options(&with_hole(), &height_info).unwrap();
        let solid =
            PolygonFactory.create_solid_geometries(&options, &height_info, 5.0, false, Some(15.0));
        assert_eq!(solid.len(), 1);
        assert_eq!(solid[0].kind, GeometryOptionKind::Solid);
        assert_eq!(solid[0].geometry.height_range(), Some((5.0, Some(15.0))));
    }
}
