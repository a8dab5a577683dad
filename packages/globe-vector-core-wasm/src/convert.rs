//! Feature to primitive conversion.
//!
//! A feature's geometry is split into simple geometries, each validated, classified and
//! turned into geometry options. Options sharing a height anchor are batched into one
//! set of primitives.

use rayon::prelude::*;

use crate::cartesian;
use crate::extent3d::Extent3D;
use crate::factory::{
    get_geometries_options, CircleFactory, GeometryOption, LineFactory, PolygonFactory,
};
use crate::geometry::{validate_geometry, Feature, Geometry};
use crate::height_info::{get_height_info, HeightInfo, HeightRegime};
use crate::placement::PlacementHandle;
use crate::point_pipeline::get_point_primitives;
use crate::primitive::{create_primitive_items, ConvertedItem, PrimitiveItem};
use crate::style::Style;
use crate::terrain::{HeightQuery, QueryScope};
use crate::vector_properties::VectorProperties;
use crate::{console_log, console_warn};

/// Layer level inputs shared by all conversions of a layer.
#[derive(Debug, Clone, Copy)]
pub struct ConvertContext<'a> {
    pub properties: &'a VectorProperties,
    pub scope: &'a QueryScope,
}

#[derive(Debug, Default)]
pub struct Conversion {
    pub items: Vec<ConvertedItem>,
    pub height_queries: Vec<HeightQuery>,
    pub extent: Extent3D,
}

// Options are only merged when their vertical anchor is identical
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum BatchKey {
    Absolute,
    Clamped,
    Relative {
        ground_level: Option<u64>,
        clamp_origin: Option<[u64; 2]>,
    },
}

impl BatchKey {
    fn of(height_info: &HeightInfo) -> Self {
        match height_info.regime {
            HeightRegime::Absolute { .. } => BatchKey::Absolute,
            HeightRegime::Clamped => BatchKey::Clamped,
            HeightRegime::Relative {
                ground_level,
                clamp_origin,
                ..
            } => BatchKey::Relative {
                ground_level: ground_level.map(f64::to_bits),
                clamp_origin: clamp_origin.map(|[x, y]| [x.to_bits(), y.to_bits()]),
            },
        }
    }

    /// Ground position to sample the terrain at, for batches without a ground level
    fn clamp_origin(&self) -> Option<[f64; 2]> {
        match self {
            BatchKey::Relative {
                ground_level: None,
                clamp_origin: Some([x, y]),
            } => Some([f64::from_bits(*x), f64::from_bits(*y)]),
            _ => None,
        }
    }
}

fn geometry_options(
    style: &Style,
    geometry: &Geometry,
    height_info: &HeightInfo,
) -> Result<Vec<GeometryOption>, crate::error::ConvertError> {
    match geometry {
        Geometry::Polygon { .. } => {
            get_geometries_options(style, geometry, &PolygonFactory, height_info)
        }
        Geometry::LineString { .. } => {
            get_geometries_options(style, geometry, &LineFactory, height_info)
        }
        Geometry::Circle { .. } => {
            get_geometries_options(style, geometry, &CircleFactory, height_info)
        }
        _ => Ok(Vec::new()),
    }
}

/// Converts one feature. Invalid geometries and failing sub-geometries are skipped,
/// so this never fails.
pub fn convert(feature: &Feature, style: &Style, context: ConvertContext) -> Conversion {
    let mut conversion = Conversion::default();
    let Some(geometry) = &feature.geometry else {
        return conversion;
    };

    let mut batches: Vec<(BatchKey, Vec<GeometryOption>)> = Vec::new();
    for simple in geometry.simple_geometries() {
        if !validate_geometry(&simple) {
            console_warn!(
                "skipping invalid {} geometry of feature {:?}",
                simple.kind(),
                feature.id
            );
            continue;
        }

        let height_info = get_height_info(feature, &simple, context.properties);
        conversion.extent.extend_with_geometry(&simple);
        conversion.extent.extend_with_height_info(&height_info);

        if let Geometry::Point { .. } = simple {
            match get_point_primitives(
                feature,
                style,
                &simple,
                &height_info,
                context.properties,
                context.scope,
            ) {
                Ok(points) => {
                    conversion.items.extend(points.items);
                    conversion.height_queries.extend(points.height_queries);
                }
                Err(err) => console_warn!("point conversion failed: {}", err),
            }
            continue;
        }

        match geometry_options(style, &simple, &height_info) {
            Ok(options) if options.is_empty() => {}
            Ok(options) => {
                let key = BatchKey::of(&height_info);
                match batches.iter_mut().find(|(k, _)| *k == key) {
                    Some((_, batch)) => batch.extend(options),
                    None => batches.push((key, options)),
                }
            }
            Err(err) => console_warn!("geometry conversion failed: {}", err),
        }
    }

    for (key, options) in &batches {
        for mut primitive in create_primitive_items(feature, style, context.properties, options) {
            if let Some(origin) = key.clamp_origin() {
                let up = cartesian::geodetic_surface_normal_degrees(origin[0], origin[1]);
                let placement = PlacementHandle::vertical(up);
                conversion
                    .height_queries
                    .push(HeightQuery::new(origin, context.scope, placement.clone()));
                primitive.placement = Some(placement);
            }
            conversion.items.push(ConvertedItem::Primitive {
                item: PrimitiveItem::Geometry(primitive),
                auto_scale: false,
            });
        }
    }

    conversion
}

/// Converts features in parallel. Results keep the order of `features`.
pub fn convert_features(
    features: &[Feature],
    style: &Style,
    context: ConvertContext,
) -> Vec<Conversion> {
    let conversions: Vec<Conversion> = features
        .par_iter()
        .map(|feature| convert(feature, style, context))
        .collect();
    console_log!(
        "converted {} features into {} items",
        features.len(),
        conversions.iter().map(|c| c.items.len()).sum::<usize>()
    );
    conversions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine_geometry::EngineGeometry;
    use crate::primitive::PrimitiveKind;
    use crate::style::Color;
    use crate::vector_properties::ALTITUDE_MODE;
    use serde_json::json;

    fn context<'a>(properties: &'a VectorProperties, scope: &'a QueryScope) -> ConvertContext<'a> {
        ConvertContext { properties, scope }
    }

    fn fill_and_stroke() -> Style {
        Style::default()
            .with_fill(Color::WHITE)
            .with_stroke(Color::BLACK, 1.0)
    }

    fn square(x: f64, y: f64) -> Vec<Vec<Vec<f64>>> {
        vec![vec![
            vec![x, y],
            vec![x + 0.001, y],
            vec![x + 0.001, y + 0.001],
            vec![x, y + 0.001],
            vec![x, y],
        ]]
    }

    #[test]
    fn absolute_circle_yields_two_plain_primitives() {
        let feature = Feature::new(Geometry::Circle {
            center: vec![1.0, 1.0, 0.0],
            radius: 10.0,
        })
        .with_property(ALTITUDE_MODE, json!("absolute"));
        let properties = VectorProperties::default();
        let scope = QueryScope::new();
        let conversion = convert(&feature, &fill_and_stroke(), context(&properties, &scope));

        assert_eq!(conversion.items.len(), 2);
        assert!(conversion.height_queries.is_empty());
        let primitives: Vec<_> = conversion
            .items
            .iter()
            .filter_map(ConvertedItem::primitive)
            .collect();
        assert_eq!(primitives.len(), 2);
        assert!(primitives
            .iter()
            .all(|p| p.kind == PrimitiveKind::Primitive && p.classification_type.is_none()));
        assert!(matches!(
            primitives[0].geometry_instances[0].geometry,
            EngineGeometry::Circle(_)
        ));
        assert!(matches!(
            primitives[1].geometry_instances[0].geometry,
            EngineGeometry::Polyline(_)
        ));
    }

    #[test]
    fn relative_parts_batch_by_clamp_origin() {
        let properties = VectorProperties::default();
        let scope = QueryScope::new();
        let style = Style::default().with_fill(Color::WHITE);

        let apart = Feature::new(Geometry::MultiPolygon {
            coordinates: vec![square(0.0, 0.0), square(1.0, 1.0)],
        })
        .with_property(ALTITUDE_MODE, json!("relativeToGround"));
        let conversion = convert(&apart, &style, context(&properties, &scope));
        assert_eq!(conversion.items.len(), 2);
        assert_eq!(conversion.height_queries.len(), 2);

        let together = Feature::new(Geometry::MultiPolygon {
            coordinates: vec![square(0.0, 0.0), square(0.0, 0.0)],
        })
        .with_property(ALTITUDE_MODE, json!("relativeToGround"));
        let conversion = convert(&together, &style, context(&properties, &scope));
        assert_eq!(conversion.items.len(), 1);
        assert_eq!(conversion.height_queries.len(), 1);
        let primitive = conversion.items[0].primitive().unwrap();
        assert_eq!(primitive.geometry_instances.len(), 2);
        assert!(conversion.height_queries[0]
            .target()
            .ptr_eq(primitive.placement.as_ref().unwrap()));
    }

    #[test]
    fn invalid_geometries_are_skipped() {
        let feature = Feature::new(Geometry::GeometryCollection {
            geometries: vec![
                Geometry::LineString {
                    coordinates: vec![vec![0.0, 0.0]],
                },
                Geometry::Polygon {
                    coordinates: square(0.0, 0.0),
                },
            ],
        });
        let properties = VectorProperties::default();
        let scope = QueryScope::new();
        let conversion = convert(&feature, &fill_and_stroke(), context(&properties, &scope));
        // clamped polygon: fill and ground line
        assert_eq!(conversion.items.len(), 2);
        assert!(!conversion.extent.is_empty());
    }

    #[test]
    fn nothing_to_draw_is_not_an_error() {
        let feature = Feature::new(Geometry::Polygon {
            coordinates: square(0.0, 0.0),
        });
        let properties = VectorProperties::default();
        let scope = QueryScope::new();
        assert!(convert(&feature, &Style::default(), context(&properties, &scope))
            .items
            .is_empty());
        assert!(convert(&Feature::default(), &fill_and_stroke(), context(&properties, &scope))
            .items
            .is_empty());
    }

    #[test]
    fn parallel_conversion_keeps_order() {
        let features: Vec<Feature> = (0..8)
            .map(|i| {
                Feature::new(Geometry::Polygon {
                    coordinates: square(i as f64, 0.0),
                })
                .with_id(i.to_string())
            })
            .collect();
        let properties = VectorProperties::default();
        let scope = QueryScope::new();
        let conversions = convert_features(&features, &fill_and_stroke(), context(&properties, &scope));
        assert_eq!(conversions.len(), 8);
        for (i, conversion) in conversions.iter().enumerate() {
            let primitive = conversion.items[0].primitive().unwrap();
            assert_eq!(primitive.feature_id, Some(i.to_string()));
        }
    }
}
