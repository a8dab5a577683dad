//! Declarative per-feature rendering properties.
//!
//! Every accessor reads the feature's property bag first and falls back to the
//! layer-level [`VectorPropertiesOptions`]. The options are immutable once wrapped,
//! so one `VectorProperties` can be shared by parallel conversions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::geometry::Feature;

pub const ALTITUDE_MODE: &str = "olcs_altitudeMode";
pub const GROUND_LEVEL: &str = "olcs_groundLevel";
pub const HEIGHT_ABOVE_GROUND: &str = "olcs_heightAboveGround";
pub const EXTRUDED_HEIGHT: &str = "olcs_extrudedHeight";
pub const STOREYS_ABOVE_GROUND: &str = "olcs_storeysAboveGround";
pub const STOREYS_BELOW_GROUND: &str = "olcs_storeysBelowGround";
pub const STOREY_HEIGHTS_ABOVE_GROUND: &str = "olcs_storeyHeightsAboveGround";
pub const STOREY_HEIGHTS_BELOW_GROUND: &str = "olcs_storeyHeightsBelowGround";
/// Legacy single storey height, superseded by the explicit storey height lists
pub const STOREY_HEIGHT: &str = "olcs_storeyHeight";
/// Legacy storey count, superseded by `olcs_storeysAboveGround`
pub const STOREY_NUMBER: &str = "olcs_storeyNumber";
pub const SKIRT: &str = "olcs_skirt";
pub const ALLOW_PICKING: &str = "olcs_allowPicking";
pub const CLASSIFICATION_TYPE: &str = "olcs_classificationType";
pub const EYE_OFFSET: &str = "olcs_eyeOffset";
pub const SCALE_BY_DISTANCE: &str = "olcs_scaleByDistance";
pub const MODEL_URL: &str = "olcs_modelUrl";
pub const MODEL_SCALE_X: &str = "olcs_modelScaleX";
pub const MODEL_SCALE_Y: &str = "olcs_modelScaleY";
pub const MODEL_SCALE_Z: &str = "olcs_modelScaleZ";
pub const MODEL_HEADING: &str = "olcs_modelHeading";
pub const MODEL_PITCH: &str = "olcs_modelPitch";
pub const MODEL_ROLL: &str = "olcs_modelRoll";
pub const MODEL_AUTO_SCALE: &str = "olcs_modelAutoScale";
pub const PRIMITIVE_OPTIONS: &str = "olcs_primitiveOptions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AltitudeMode {
    Absolute,
    RelativeToGround,
    ClampToGround,
    ClampToTerrain,
}

impl AltitudeMode {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "absolute" => Some(AltitudeMode::Absolute),
            "relativeToGround" => Some(AltitudeMode::RelativeToGround),
            "clampToGround" => Some(AltitudeMode::ClampToGround),
            "clampToTerrain" => Some(AltitudeMode::ClampToTerrain),
            _ => None,
        }
    }

    pub fn is_clamped(self) -> bool {
        matches!(self, AltitudeMode::ClampToGround | AltitudeMode::ClampToTerrain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ClassificationType {
    Terrain,
    Cesium3DTile,
    Both,
}

impl ClassificationType {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "terrain" => Some(ClassificationType::Terrain),
            "cesium3DTile" => Some(ClassificationType::Cesium3DTile),
            "both" => Some(ClassificationType::Both),
            _ => None,
        }
    }
}

/// Distance based scaling: `[near, nearValue, far, farValue]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NearFarScalar {
    pub near: f64,
    pub near_value: f64,
    pub far: f64,
    pub far_value: f64,
}

impl NearFarScalar {
    fn from_values(values: &[f64]) -> Option<Self> {
        match values {
            [near, near_value, far, far_value] => Some(NearFarScalar {
                near: *near,
                near_value: *near_value,
                far: *far,
                far_value: *far_value,
            }),
            _ => None,
        }
    }
}

/// Shape of a custom primitive placed at a point, dimensions in metres
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PrimitiveShape {
    Sphere {
        radius: f64,
    },
    Box {
        dimensions: [f64; 3],
    },
    #[serde(rename_all = "camelCase")]
    Cylinder {
        length: f64,
        top_radius: f64,
        bottom_radius: f64,
    },
    Ellipsoid {
        radii: [f64; 3],
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimitiveOptions {
    pub geometry: PrimitiveShape,
    /// Local offset applied in the scaled model frame
    #[serde(default)]
    pub offset: Option<[f64; 3]>,
    #[serde(default)]
    pub auto_scale: bool,
}

/// Layer-level defaults used when a feature does not carry its own value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VectorPropertiesOptions {
    pub altitude_mode: AltitudeMode,
    pub ground_level: Option<f64>,
    pub height_above_ground: Option<f64>,
    pub extruded_height: f64,
    pub storeys_above_ground: usize,
    pub storeys_below_ground: usize,
    pub storey_heights_above_ground: Vec<f64>,
    pub storey_heights_below_ground: Vec<f64>,
    pub skirt: f64,
    pub allow_picking: bool,
    pub classification_type: Option<ClassificationType>,
    pub eye_offset: Option<[f64; 3]>,
    pub scale_by_distance: Option<NearFarScalar>,
    pub model_url: Option<String>,
    pub model_scale_x: f64,
    pub model_scale_y: f64,
    pub model_scale_z: f64,
    pub model_heading: f64,
    pub model_pitch: f64,
    pub model_roll: f64,
    pub model_auto_scale: bool,
    pub primitive_options: Option<PrimitiveOptions>,
}

impl Default for VectorPropertiesOptions {
    fn default() -> Self {
        Self {
            altitude_mode: AltitudeMode::ClampToGround,
            ground_level: None,
            height_above_ground: None,
            extruded_height: 0.0,
            storeys_above_ground: 0,
            storeys_below_ground: 0,
            storey_heights_above_ground: Vec::new(),
            storey_heights_below_ground: Vec::new(),
            skirt: 0.0,
            allow_picking: true,
            classification_type: None,
            eye_offset: None,
            scale_by_distance: None,
            model_url: None,
            model_scale_x: 1.0,
            model_scale_y: 1.0,
            model_scale_z: 1.0,
            model_heading: 0.0,
            model_pitch: 0.0,
            model_roll: 0.0,
            model_auto_scale: false,
            primitive_options: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorProperties {
    options: VectorPropertiesOptions,
}

fn finite_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|v| v.is_finite())
}

fn number_list(value: &Value) -> Option<Vec<f64>> {
    match value {
        Value::Array(values) => Some(values.iter().filter_map(finite_number).collect()),
        other => finite_number(other).map(|v| vec![v]),
    }
}

// Storey heights must be usable as slices of an extrusion
fn positive_heights(heights: Vec<f64>) -> Vec<f64> {
    heights.into_iter().filter(|h| *h > 0.0).collect()
}

impl VectorProperties {
    pub fn new(options: VectorPropertiesOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &VectorPropertiesOptions {
        &self.options
    }

    fn feature_number(feature: &Feature, key: &str) -> Option<f64> {
        feature.property(key).and_then(finite_number)
    }

    fn feature_bool(feature: &Feature, key: &str) -> Option<bool> {
        feature.property(key).and_then(Value::as_bool)
    }

    fn feature_count(feature: &Feature, key: &str) -> Option<usize> {
        Self::feature_number(feature, key).map(|v| v.max(0.0).round() as usize)
    }

    fn feature_vec3(feature: &Feature, key: &str) -> Option<[f64; 3]> {
        let values = feature.property(key).and_then(number_list)?;
        match values.as_slice() {
            [x, y, z] => Some([*x, *y, *z]),
            _ => None,
        }
    }

    pub fn altitude_mode(&self, feature: &Feature) -> AltitudeMode {
        feature
            .property(ALTITUDE_MODE)
            .and_then(Value::as_str)
            .and_then(AltitudeMode::parse)
            .unwrap_or(self.options.altitude_mode)
    }

    pub fn ground_level(&self, feature: &Feature) -> Option<f64> {
        Self::feature_number(feature, GROUND_LEVEL)
            .or(self.options.ground_level.filter(|v| v.is_finite()))
    }

    pub fn height_above_ground(&self, feature: &Feature) -> Option<f64> {
        Self::feature_number(feature, HEIGHT_ABOVE_GROUND)
            .or(self.options.height_above_ground.filter(|v| v.is_finite()))
    }

    pub fn extruded_height(&self, feature: &Feature) -> f64 {
        Self::feature_number(feature, EXTRUDED_HEIGHT).unwrap_or(self.options.extruded_height)
    }

    /// Modern storey count above ground, feature value only
    pub fn feature_storeys_above_ground(&self, feature: &Feature) -> Option<usize> {
        Self::feature_count(feature, STOREYS_ABOVE_GROUND)
    }

    pub fn feature_storeys_below_ground(&self, feature: &Feature) -> Option<usize> {
        Self::feature_count(feature, STOREYS_BELOW_GROUND)
    }

    pub fn storeys_above_ground(&self, feature: &Feature) -> usize {
        self.feature_storeys_above_ground(feature)
            .unwrap_or(self.options.storeys_above_ground)
    }

    pub fn storeys_below_ground(&self, feature: &Feature) -> usize {
        self.feature_storeys_below_ground(feature)
            .unwrap_or(self.options.storeys_below_ground)
    }

    /// Modern explicit storey heights above ground, feature value only
    pub fn feature_storey_heights_above_ground(&self, feature: &Feature) -> Option<Vec<f64>> {
        feature
            .property(STOREY_HEIGHTS_ABOVE_GROUND)
            .and_then(number_list)
            .map(positive_heights)
    }

    pub fn feature_storey_heights_below_ground(&self, feature: &Feature) -> Option<Vec<f64>> {
        feature
            .property(STOREY_HEIGHTS_BELOW_GROUND)
            .and_then(number_list)
            .map(positive_heights)
    }

    pub fn storey_heights_above_ground(&self, feature: &Feature) -> Vec<f64> {
        self.feature_storey_heights_above_ground(feature)
            .unwrap_or_else(|| positive_heights(self.options.storey_heights_above_ground.clone()))
    }

    pub fn storey_heights_below_ground(&self, feature: &Feature) -> Vec<f64> {
        self.feature_storey_heights_below_ground(feature)
            .unwrap_or_else(|| positive_heights(self.options.storey_heights_below_ground.clone()))
    }

    pub fn legacy_storey_height(&self, feature: &Feature) -> Option<f64> {
        Self::feature_number(feature, STOREY_HEIGHT).filter(|h| *h > 0.0)
    }

    pub fn legacy_storey_number(&self, feature: &Feature) -> Option<usize> {
        Self::feature_count(feature, STOREY_NUMBER)
    }

    pub fn skirt(&self, feature: &Feature) -> f64 {
        Self::feature_number(feature, SKIRT)
            .unwrap_or(self.options.skirt)
            .max(0.0)
    }

    pub fn allow_picking(&self, feature: &Feature) -> bool {
        Self::feature_bool(feature, ALLOW_PICKING).unwrap_or(self.options.allow_picking)
    }

    pub fn classification_type(&self, feature: &Feature) -> Option<ClassificationType> {
        feature
            .property(CLASSIFICATION_TYPE)
            .and_then(Value::as_str)
            .and_then(ClassificationType::parse)
            .or(self.options.classification_type)
    }

    pub fn eye_offset(&self, feature: &Feature) -> Option<[f64; 3]> {
        Self::feature_vec3(feature, EYE_OFFSET).or(self.options.eye_offset)
    }

    pub fn scale_by_distance(&self, feature: &Feature) -> Option<NearFarScalar> {
        feature
            .property(SCALE_BY_DISTANCE)
            .and_then(number_list)
            .and_then(|values| NearFarScalar::from_values(&values))
            .or(self.options.scale_by_distance)
    }

    pub fn model_url(&self, feature: &Feature) -> Option<String> {
        feature
            .property(MODEL_URL)
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| self.options.model_url.clone())
            .filter(|url| !url.is_empty())
    }

    pub fn model_scale(&self, feature: &Feature) -> [f64; 3] {
        [
            Self::feature_number(feature, MODEL_SCALE_X).unwrap_or(self.options.model_scale_x),
            Self::feature_number(feature, MODEL_SCALE_Y).unwrap_or(self.options.model_scale_y),
            Self::feature_number(feature, MODEL_SCALE_Z).unwrap_or(self.options.model_scale_z),
        ]
    }

    /// Heading, pitch and roll in degrees
    pub fn model_heading_pitch_roll(&self, feature: &Feature) -> [f64; 3] {
        [
            Self::feature_number(feature, MODEL_HEADING).unwrap_or(self.options.model_heading),
            Self::feature_number(feature, MODEL_PITCH).unwrap_or(self.options.model_pitch),
            Self::feature_number(feature, MODEL_ROLL).unwrap_or(self.options.model_roll),
        ]
    }

    pub fn model_auto_scale(&self, feature: &Feature) -> bool {
        Self::feature_bool(feature, MODEL_AUTO_SCALE).unwrap_or(self.options.model_auto_scale)
    }

    pub fn primitive_options(&self, feature: &Feature) -> Option<PrimitiveOptions> {
        feature
            .property(PRIMITIVE_OPTIONS)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
            .or_else(|| self.options.primitive_options.clone())
    }

    /// True when the feature renders as a model or custom primitive rather than an icon.
    pub fn renders_as_model_or_primitive(&self, feature: &Feature) -> bool {
        self.model_url(feature).is_some() || self.primitive_options(feature).is_some()
    }
}
