//! Height reference classification.
//!
//! Resolves how a geometry is placed vertically (absolute, relative to ground or clamped)
//! and how it is extruded into storeys. Everything here is a pure function of the
//! feature, its geometry and the layer defaults.

use serde::{Deserialize, Serialize};

use crate::extent3d::Extent3D;
use crate::geometry::{Feature, Geometry, GeometryKind, GeometryLayout};
use crate::storeys::{get_storey_heights, validate_storeys};
use crate::vector_properties::{AltitudeMode, VectorProperties};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "heightReference", rename_all = "camelCase")]
pub enum HeightRegime {
    #[serde(rename_all = "camelCase")]
    Absolute {
        ground_level_or_min_height: f64,
        per_position_height: bool,
    },
    #[serde(rename_all = "camelCase")]
    Relative {
        ground_level: Option<f64>,
        height_above_ground: Option<f64>,
        /// Ground position `[lon, lat]` the terrain height is sampled at
        clamp_origin: Option<[f64; 2]>,
        per_position_height: bool,
    },
    Clamped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeightInfo {
    pub layout: GeometryLayout,
    pub extruded: bool,
    pub skirt: f64,
    pub storey_heights_above_ground: Vec<f64>,
    pub storey_heights_below_ground: Vec<f64>,
    #[serde(flatten)]
    pub regime: HeightRegime,
}

impl HeightInfo {
    pub fn is_clamped(&self) -> bool {
        matches!(self.regime, HeightRegime::Clamped)
    }

    pub fn per_position_height(&self) -> bool {
        match self.regime {
            HeightRegime::Absolute {
                per_position_height,
                ..
            }
            | HeightRegime::Relative {
                per_position_height,
                ..
            } => per_position_height,
            HeightRegime::Clamped => false,
        }
    }

    pub fn ground_level(&self) -> Option<f64> {
        match self.regime {
            HeightRegime::Absolute {
                ground_level_or_min_height,
                ..
            } => Some(ground_level_or_min_height),
            HeightRegime::Relative { ground_level, .. } => ground_level,
            HeightRegime::Clamped => None,
        }
    }

    pub fn clamp_origin(&self) -> Option<[f64; 2]> {
        match self.regime {
            HeightRegime::Relative { clamp_origin, .. } => clamp_origin,
            _ => None,
        }
    }

    pub fn storey_count(&self) -> usize {
        self.storey_heights_above_ground.len() + self.storey_heights_below_ground.len()
    }
}

/// Extrusion part of a [`HeightInfo`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtrusionHeightInfo {
    pub storey_heights_above_ground: Vec<f64>,
    pub storey_heights_below_ground: Vec<f64>,
    pub skirt: f64,
    pub extruded: bool,
}

fn default_storey_height(extruded_height: f64, storey_count: usize) -> f64 {
    if storey_count > 0 {
        extruded_height.abs() / storey_count as f64
    } else {
        extruded_height.abs()
    }
}

/// Storey layout of a feature. The modern `storeys*` and `storeyHeights*` keys take
/// precedence over the legacy `storeyNumber` and `storeyHeight` keys.
pub fn get_extrusion_height_info(
    feature: &Feature,
    properties: &VectorProperties,
) -> ExtrusionHeightInfo {
    let extruded_height = properties.extruded_height(feature);

    let above_heights = properties
        .feature_storey_heights_above_ground(feature)
        .filter(|heights| !heights.is_empty())
        .or_else(|| properties.legacy_storey_height(feature).map(|h| vec![h]))
        .unwrap_or_else(|| properties.storey_heights_above_ground(feature));
    let above_count = properties
        .feature_storeys_above_ground(feature)
        .or_else(|| properties.legacy_storey_number(feature))
        .unwrap_or_else(|| properties.storeys_above_ground(feature));
    let below_heights = properties.storey_heights_below_ground(feature);
    let below_count = properties.storeys_below_ground(feature);

    let (above, below) = if extruded_height > 0.0 {
        let above = get_storey_heights(
            extruded_height,
            &above_heights,
            default_storey_height(extruded_height, above_count),
        );
        let mut below = below_heights;
        validate_storeys(below_count, &mut below);
        (above, below)
    } else if extruded_height < 0.0 {
        // legacy values describe the extruded side
        let below_explicit = properties
            .feature_storey_heights_below_ground(feature)
            .filter(|heights| !heights.is_empty())
            .or_else(|| properties.legacy_storey_height(feature).map(|h| vec![h]))
            .unwrap_or(below_heights);
        let below_count = properties
            .feature_storeys_below_ground(feature)
            .or_else(|| properties.legacy_storey_number(feature))
            .unwrap_or(below_count);
        let below = get_storey_heights(
            extruded_height,
            &below_explicit,
            default_storey_height(extruded_height, below_count),
        );
        let mut above = properties.storey_heights_above_ground(feature);
        validate_storeys(properties.storeys_above_ground(feature), &mut above);
        (above, below)
    } else {
        let mut above = above_heights;
        validate_storeys(above_count, &mut above);
        let mut below = below_heights;
        validate_storeys(below_count, &mut below);
        (above, below)
    };

    ExtrusionHeightInfo {
        extruded: !above.is_empty() || !below.is_empty(),
        storey_heights_above_ground: above,
        storey_heights_below_ground: below,
        skirt: properties.skirt(feature),
    }
}

fn min_height(geometry: &Geometry) -> Option<f64> {
    if geometry.layout() != GeometryLayout::XYZ {
        return None;
    }
    geometry
        .coordinates()
        .iter()
        .filter_map(|c| c.get(2).copied())
        .filter(|z| z.is_finite())
        .reduce(f64::min)
}

fn clamp_origin(geometry: &Geometry) -> Option<[f64; 2]> {
    let extent = Extent3D::from_geometry(geometry);
    if extent.is_empty() {
        return None;
    }
    let [x, y, _] = extent.center();
    Some([x, y])
}

/// Resolves the height regime of a (simple) geometry of `feature`.
pub fn get_height_info(
    feature: &Feature,
    geometry: &Geometry,
    properties: &VectorProperties,
) -> HeightInfo {
    let extrusion = get_extrusion_height_info(feature, properties);
    let layout = geometry.layout();
    let altitude_mode = properties.altitude_mode(feature);
    let per_position_candidate = layout == GeometryLayout::XYZ
        && extrusion.storey_heights_above_ground.len() + extrusion.storey_heights_below_ground.len()
            <= 1;

    let ground_level = properties.ground_level(feature);
    let relative_clamp_origin = |ground_level: Option<f64>| {
        if ground_level.is_some() {
            None
        } else {
            clamp_origin(geometry)
        }
    };

    let regime = if altitude_mode.is_clamped()
        && (extrusion.extruded
            || (geometry.kind() == GeometryKind::Point
                && properties.renders_as_model_or_primitive(feature)))
    {
        HeightRegime::Relative {
            ground_level,
            height_above_ground: Some(0.0),
            clamp_origin: relative_clamp_origin(ground_level),
            per_position_height: false,
        }
    } else if altitude_mode.is_clamped() {
        HeightRegime::Clamped
    } else if altitude_mode == AltitudeMode::RelativeToGround {
        let height_above_ground = properties.height_above_ground(feature);
        HeightRegime::Relative {
            ground_level,
            height_above_ground,
            clamp_origin: relative_clamp_origin(ground_level),
            per_position_height: per_position_candidate && height_above_ground.is_none(),
        }
    } else {
        HeightRegime::Absolute {
            ground_level_or_min_height: ground_level
                .or_else(|| min_height(geometry))
                .unwrap_or(0.0),
            per_position_height: per_position_candidate && ground_level.is_none(),
        }
    };

    HeightInfo {
        layout,
        extruded: extrusion.extruded,
        skirt: extrusion.skirt,
        storey_heights_above_ground: extrusion.storey_heights_above_ground,
        storey_heights_below_ground: extrusion.storey_heights_below_ground,
        regime,
    }
}

/// Height the extrusion starts from. For relative geometry without a ground level the
/// result is relative to the terrain sampled at the clamp origin.
pub fn get_geometry_base_height(height_info: &HeightInfo) -> f64 {
    match &height_info.regime {
        HeightRegime::Absolute {
            ground_level_or_min_height,
            ..
        } => *ground_level_or_min_height,
        HeightRegime::Relative {
            ground_level,
            height_above_ground,
            ..
        } => ground_level.unwrap_or(0.0) + height_above_ground.unwrap_or(0.0),
        HeightRegime::Clamped => 0.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Storey {
    pub current_height: f64,
    pub extruded_height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreyOptions {
    pub storeys: Vec<Storey>,
    pub skirt_level: f64,
}

/// Storeys ordered outward from the base: above ground ascending, then below ground descending.
pub fn get_storey_options(height_info: &HeightInfo, base_height: f64) -> StoreyOptions {
    let mut storeys = Vec::with_capacity(height_info.storey_count());

    let mut current_height = base_height;
    for height in &height_info.storey_heights_above_ground {
        storeys.push(Storey {
            current_height,
            extruded_height: current_height + height,
        });
        current_height += height;
    }

    let mut current_height = base_height;
    for height in &height_info.storey_heights_below_ground {
        storeys.push(Storey {
            current_height,
            extruded_height: current_height - height,
        });
        current_height -= height;
    }

    StoreyOptions {
        storeys,
        skirt_level: current_height - height_info.skirt,
    }
}

/// Height a position is placed at. Relative results are offsets from the terrain
/// unless a ground level is known.
pub fn adjust_position_height(coordinate: &[f64], height_info: &HeightInfo) -> f64 {
    let z = coordinate.get(2).copied().filter(|z| z.is_finite());
    match &height_info.regime {
        HeightRegime::Absolute {
            ground_level_or_min_height,
            per_position_height,
        } => match z {
            Some(z) if *per_position_height => z,
            _ => *ground_level_or_min_height,
        },
        HeightRegime::Relative {
            ground_level,
            height_above_ground,
            per_position_height,
            ..
        } => {
            let offset = if *per_position_height {
                z.unwrap_or(0.0)
            } else {
                height_above_ground.unwrap_or(0.0)
            };
            ground_level.unwrap_or(0.0) + offset
        }
        HeightRegime::Clamped => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_properties::*;
    use serde_json::json;

    fn line_feature(altitude_mode: &str) -> (Feature, Geometry) {
        let geometry = Geometry::LineString {
            coordinates: vec![vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 4.0], vec![1.0, 2.0, 2.0]],
        };
        let feature =
            Feature::new(geometry.clone()).with_property(ALTITUDE_MODE, json!(altitude_mode));
        (feature, geometry)
    }

    fn polygon() -> Geometry {
        Geometry::Polygon {
            coordinates: vec![vec![
                vec![0.0, 0.0],
                vec![2.0, 0.0],
                vec![2.0, 2.0],
                vec![0.0, 2.0],
                vec![0.0, 0.0],
            ]],
        }
    }

    #[test]
    fn absolute_without_ground_level_uses_min_height() {
        let (feature, geometry) = line_feature("absolute");
        let height_info = get_height_info(&feature, &geometry, &VectorProperties::default());
        assert_eq!(
            height_info.regime,
            HeightRegime::Absolute {
                ground_level_or_min_height: 2.0,
                per_position_height: true,
            }
        );
        assert!(!height_info.extruded);
    }

    #[test]
    fn absolute_with_ground_level_is_not_per_position() {
        let (feature, geometry) = line_feature("absolute");
        let feature = feature.with_property(GROUND_LEVEL, json!(10));
        let height_info = get_height_info(&feature, &geometry, &VectorProperties::default());
        assert_eq!(height_info.ground_level(), Some(10.0));
        assert!(!height_info.per_position_height());
        assert_eq!(adjust_position_height(&[1.0, 2.0, 3.0], &height_info), 10.0);
    }

    #[test]
    fn absolute_two_dimensional_geometry_starts_at_zero() {
        let feature = Feature::new(polygon()).with_property(ALTITUDE_MODE, json!("absolute"));
        let height_info = get_height_info(&feature, &polygon(), &VectorProperties::default());
        assert_eq!(get_geometry_base_height(&height_info), 0.0);
    }

    #[test]
    fn clamped_and_extruded_becomes_relative_at_zero() {
        let feature = Feature::new(polygon())
            .with_property(ALTITUDE_MODE, json!("clampToGround"))
            .with_property(EXTRUDED_HEIGHT, json!(20));
        let height_info = get_height_info(&feature, &polygon(), &VectorProperties::default());
        assert!(height_info.extruded);
        assert_eq!(height_info.storey_heights_above_ground, vec![20.0]);
        match height_info.regime {
            HeightRegime::Relative {
                height_above_ground,
                clamp_origin,
                ..
            } => {
                assert_eq!(height_above_ground, Some(0.0));
                assert_eq!(clamp_origin, Some([1.0, 1.0]));
            }
            other => panic!("expected relative regime, got {:?}", other),
        }
    }

    #[test]
    fn clamped_point_with_model_becomes_relative() {
        let point = Geometry::Point {
            coordinates: vec![1.0, 2.0],
        };
        let feature = Feature::new(point.clone()).with_property(MODEL_URL, json!("tree.glb"));
        let height_info = get_height_info(&feature, &point, &VectorProperties::default());
        assert!(matches!(
            height_info.regime,
            HeightRegime::Relative {
                height_above_ground: Some(h),
                ..
            } if h == 0.0
        ));

        let plain = Feature::new(point.clone());
        assert!(get_height_info(&plain, &point, &VectorProperties::default()).is_clamped());
    }

    #[test]
    fn relative_ground_level_removes_clamp_origin() {
        let feature = Feature::new(polygon())
            .with_property(ALTITUDE_MODE, json!("relativeToGround"))
            .with_property(HEIGHT_ABOVE_GROUND, json!(5));
        let height_info = get_height_info(&feature, &polygon(), &VectorProperties::default());
        assert_eq!(height_info.clamp_origin(), Some([1.0, 1.0]));
        assert_eq!(get_geometry_base_height(&height_info), 5.0);

        let grounded = feature.with_property(GROUND_LEVEL, json!(100));
        let height_info = get_height_info(&grounded, &polygon(), &VectorProperties::default());
        assert_eq!(height_info.clamp_origin(), None);
        assert_eq!(get_geometry_base_height(&height_info), 105.0);
    }

    #[test]
    fn relative_height_above_ground_falls_back_to_layer_then_none() {
        let properties = VectorProperties::new(VectorPropertiesOptions {
            altitude_mode: AltitudeMode::RelativeToGround,
            height_above_ground: Some(7.0),
            ..Default::default()
        });
        let feature = Feature::new(polygon());
        let height_info = get_height_info(&feature, &polygon(), &properties);
        assert!(matches!(
            height_info.regime,
            HeightRegime::Relative { height_above_ground: Some(h), .. } if h == 7.0
        ));

        let properties = VectorProperties::new(VectorPropertiesOptions {
            altitude_mode: AltitudeMode::RelativeToGround,
            ..Default::default()
        });
        let height_info = get_height_info(&feature, &polygon(), &properties);
        assert!(matches!(
            height_info.regime,
            HeightRegime::Relative {
                height_above_ground: None,
                ..
            }
        ));
    }

    #[test]
    fn multiple_storeys_disable_per_position_height() {
        let (feature, geometry) = line_feature("absolute");
        let feature = feature
            .with_property(EXTRUDED_HEIGHT, json!(9))
            .with_property(STOREYS_ABOVE_GROUND, json!(3));
        let height_info = get_height_info(&feature, &geometry, &VectorProperties::default());
        assert_eq!(height_info.storey_heights_above_ground, vec![3.0, 3.0, 3.0]);
        assert!(!height_info.per_position_height());
    }

    #[test]
    fn negative_extrusion_goes_below_ground() {
        let feature = Feature::new(polygon()).with_property(EXTRUDED_HEIGHT, json!(-6));
        let extrusion = get_extrusion_height_info(&feature, &VectorProperties::default());
        assert!(extrusion.storey_heights_above_ground.is_empty());
        assert_eq!(extrusion.storey_heights_below_ground, vec![6.0]);
        assert!(extrusion.extruded);
    }

    #[test]
    fn legacy_storey_keys_are_normalized_and_modern_keys_win() {
        let legacy = Feature::new(polygon())
            .with_property(STOREY_NUMBER, json!(3))
            .with_property(STOREY_HEIGHT, json!(4));
        let extrusion = get_extrusion_height_info(&legacy, &VectorProperties::default());
        assert_eq!(extrusion.storey_heights_above_ground, vec![4.0, 4.0, 4.0]);

        let legacy_extruded = Feature::new(polygon())
            .with_property(EXTRUDED_HEIGHT, json!(10))
            .with_property(STOREY_HEIGHT, json!(4));
        let extrusion = get_extrusion_height_info(&legacy_extruded, &VectorProperties::default());
        assert_eq!(extrusion.storey_heights_above_ground, vec![4.0, 4.0, 2.0]);

        let both = legacy
            .with_property(STOREYS_ABOVE_GROUND, json!(2))
            .with_property(STOREY_HEIGHTS_ABOVE_GROUND, json!([5]));
        let extrusion = get_extrusion_height_info(&both, &VectorProperties::default());
        assert_eq!(extrusion.storey_heights_above_ground, vec![5.0, 5.0]);
    }

    #[test]
    fn skirt_alone_does_not_extrude() {
        let feature = Feature::new(polygon()).with_property(SKIRT, json!(3));
        let extrusion = get_extrusion_height_info(&feature, &VectorProperties::default());
        assert!(!extrusion.extruded);
        assert_eq!(extrusion.skirt, 3.0);
    }

    #[test]
    fn storey_options_order_outward_from_base() {
        let height_info = HeightInfo {
            layout: GeometryLayout::XY,
            extruded: true,
            skirt: 1.0,
            storey_heights_above_ground: vec![3.0, 2.0],
            storey_heights_below_ground: vec![4.0],
            regime: HeightRegime::Absolute {
                ground_level_or_min_height: 10.0,
                per_position_height: false,
            },
        };
        let options = get_storey_options(&height_info, 10.0);
        assert_eq!(
            options.storeys,
            vec![
                Storey {
                    current_height: 10.0,
                    extruded_height: 13.0
                },
                Storey {
                    current_height: 13.0,
                    extruded_height: 15.0
                },
                Storey {
                    current_height: 10.0,
                    extruded_height: 6.0
                },
            ]
        );
        assert_eq!(options.skirt_level, 5.0);
    }

    #[test]
    fn relative_positions_are_offset_from_ground() {
        let height_info = HeightInfo {
            layout: GeometryLayout::XYZ,
            extruded: false,
            skirt: 0.0,
            storey_heights_above_ground: vec![],
            storey_heights_below_ground: vec![],
            regime: HeightRegime::Relative {
                ground_level: Some(100.0),
                height_above_ground: None,
                clamp_origin: None,
                per_position_height: true,
            },
        };
        assert_eq!(adjust_position_height(&[0.0, 0.0, 5.0], &height_info), 105.0);
    }
}
