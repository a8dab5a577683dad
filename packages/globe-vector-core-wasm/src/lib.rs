use serde::{Deserialize, Serialize};
use serde_wasm_bindgen::to_value;
use wasm_bindgen::prelude::*;

// Create a console module for logging
pub mod console;
pub mod error;

// Input model: features, styles and layer defaults
pub mod geometry;
pub mod style;
pub mod vector_properties;

// Height resolution
pub mod cartesian;
pub mod extent3d;
pub mod height_info;
pub mod storeys;

// Geometry descriptors and primitives
pub mod engine_geometry;
pub mod factory;
pub mod placement;
pub mod point_pipeline;
pub mod primitive;
pub mod tessellate;
pub mod terrain;

pub mod convert;

mod models;
mod module_state;

use convert::{convert, convert_features, ConvertContext};
use error::ConvertError;
use geometry::Feature;
use models::ConversionResponse;
use module_state::ModuleState;
use nalgebra::Matrix4;
use placement::FixedPixelSize;
use style::Style;
use tessellate::{tessellate_geometry, BufferGeometry};
use vector_properties::{VectorProperties, VectorPropertiesOptions};

// Enable better panic messages in console during development
#[cfg(feature = "console_error_panic_hook")]
pub use console_error_panic_hook::set_once as set_panic_hook;

#[macro_export]
macro_rules! console_log {
    ($($t:tt)*) => ($crate::console::log(&format!($($t)*)))
}

#[macro_export]
macro_rules! console_warn {
    ($($t:tt)*) => ($crate::console::warn(&format!($($t)*)))
}

use std::sync::Once;
static INIT: Once = Once::new();

#[wasm_bindgen(start)]
pub fn start() {
    INIT.call_once(|| {
        #[cfg(feature = "console_error_panic_hook")]
        console_error_panic_hook::set_once();

        console_log!("globe vector core initialized");
    });
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeaturesInput {
    Collection { features: Vec<Feature> },
    List(Vec<Feature>),
}

impl FeaturesInput {
    fn into_features(self) -> Vec<Feature> {
        match self {
            FeaturesInput::Collection { features } | FeaturesInput::List(features) => features,
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(json: &str, what: &str) -> Result<T, ConvertError> {
    serde_json::from_str(json)
        .map_err(|e| ConvertError::InvalidInput(format!("{}: {}", what, e)))
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    Ok(to_value(value)?)
}

/// Registers the defaults of a layer. Registering an existing layer replaces its defaults
/// and discards its outstanding height queries.
#[wasm_bindgen]
pub fn register_layer(layer_id: &str, options_json: &str) -> Result<(), JsValue> {
    let options: VectorPropertiesOptions = if options_json.trim().is_empty() {
        VectorPropertiesOptions::default()
    } else {
        parse(options_json, "layer options")?
    };
    ModuleState::with_mut(|state| {
        state.register_layer(layer_id, VectorProperties::new(options));
    });
    console_log!("registered layer {}", layer_id);
    Ok(())
}

#[wasm_bindgen]
pub fn remove_layer(layer_id: &str) -> bool {
    ModuleState::with_mut(|state| state.remove_layer(layer_id))
}

/// Converts one GeoJSON feature. The response lists the converted items, the placements
/// the host can address by id, the terrain samples it should answer and the feature extent.
///
/// Placements live until their layer is invalidated, replaced or removed. Unanswered
/// height queries are kept per layer up to `MAX_PENDING_QUERIES_PER_LAYER`; beyond that the
/// oldest are dropped and their items keep the provisional height.
#[wasm_bindgen]
pub fn convert_feature(layer_id: &str, feature_json: &str, style_json: &str) -> Result<JsValue, JsValue> {
    let feature: Feature = parse(feature_json, "feature")?;
    let style: Style = parse(style_json, "style")?;

    let response = ModuleState::with_mut(|state| {
        let layer = state.layer(layer_id)?.clone();
        let context = ConvertContext {
            properties: &layer.properties,
            scope: &layer.scope,
        };
        let conversion = convert(&feature, &style, context);
        Ok::<_, ConvertError>(state.add_conversion(layer_id, conversion))
    })?;

    to_js(&response)
}

/// Converts a feature collection (or a plain array of features) with one style.
#[wasm_bindgen]
pub fn convert_feature_collection(
    layer_id: &str,
    features_json: &str,
    style_json: &str,
) -> Result<JsValue, JsValue> {
    let features = parse::<FeaturesInput>(features_json, "features")?.into_features();
    let style: Style = parse(style_json, "style")?;

    let responses = ModuleState::with_mut(|state| {
        let layer = state.layer(layer_id)?.clone();
        let context = ConvertContext {
            properties: &layer.properties,
            scope: &layer.scope,
        };
        let conversions = convert_features(&features, &style, context);
        let responses: Vec<ConversionResponse> = conversions
            .into_iter()
            .map(|conversion| state.add_conversion(layer_id, conversion))
            .collect();
        Ok::<_, ConvertError>(responses)
    })?;

    to_js(&responses)
}

// Ids cross the boundary as JS numbers
fn to_id(value: f64) -> Option<u64> {
    (value >= 0.0 && value.fract() == 0.0 && value <= u64::MAX as f64).then(|| value as u64)
}

/// Answers a height query returned by a conversion. Returns the corrected column-major
/// model matrix of the item, or undefined when the query is unknown, already answered
/// or stale.
#[wasm_bindgen]
pub fn apply_terrain_height(query_id: f64, height: f64) -> Option<Vec<f64>> {
    let query_id = to_id(query_id)?;
    ModuleState::with_mut(|state| state.apply_terrain_height(query_id, height))
        .map(|correction| correction.model_matrix)
}

/// Rescales an auto-scaled placement for the pixel size the host measured at its position.
/// Returns the column-major model matrix, or undefined for an unknown placement.
#[wasm_bindgen]
pub fn update_auto_scale(placement_id: f64, pixel_size: f64) -> Option<Vec<f64>> {
    let placement_id = to_id(placement_id)?;
    let placement = ModuleState::with(|state| state.placement(placement_id).cloned())?;
    placement.update_auto_scale(&FixedPixelSize(pixel_size));
    Some(placement.column_major())
}

/// Overwrites the model matrix of a placement with a column-major 4x4 matrix. Later
/// terrain and auto-scale updates apply on top of it. Returns the resulting matrix, which
/// is the previous one when `matrix` is degenerate, or undefined for an unknown placement.
#[wasm_bindgen]
pub fn set_model_matrix(placement_id: f64, matrix: &[f64]) -> Result<Option<Vec<f64>>, JsValue> {
    if matrix.len() != 16 {
        return Err(ConvertError::InvalidInput(format!(
            "model matrix needs 16 values, got {}",
            matrix.len()
        ))
        .into());
    }
    let Some(placement_id) = to_id(placement_id) else {
        return Ok(None);
    };
    let Some(placement) = ModuleState::with(|state| state.placement(placement_id).cloned()) else {
        return Ok(None);
    };
    placement.set_model_matrix(&Matrix4::from_column_slice(matrix));
    Ok(Some(placement.column_major()))
}

/// Marks the current feature set of a layer as replaced. Returns the number of
/// outstanding height queries discarded.
#[wasm_bindgen]
pub fn invalidate_layer(layer_id: &str) -> Result<u32, JsValue> {
    let dropped = ModuleState::with_mut(|state| state.invalidate_layer(layer_id))?;
    Ok(dropped as u32)
}

/// Resolves all outstanding height queries of a layer against host terrain functions:
/// `sample(lon, lat) -> number | undefined` for loaded tiles and
/// `query(lon, lat) -> Promise<number>` for the most detailed level.
/// The summary lists the corrected model matrix of every item that moved.
#[cfg(target_arch = "wasm32")]
#[wasm_bindgen]
pub async fn resolve_height_queries(
    layer_id: String,
    sample: Option<js_sys::Function>,
    query: js_sys::Function,
) -> Result<JsValue, JsValue> {
    use models::ResolveSummary;
    use terrain::JsTerrainOracle;

    let pending = ModuleState::with_mut(|state| {
        state.layer(&layer_id)?;
        Ok::<_, ConvertError>(state.take_queries(&layer_id))
    })?;
    let oracle = JsTerrainOracle::new(sample, query);

    let mut summary = ResolveSummary::default();
    let mut waiting = Vec::new();
    for entry in pending {
        if entry.query.resolve_now(&oracle) {
            summary.applied += 1;
            summary.corrections.push(entry.correction());
        } else if entry.query.is_stale() {
            summary.dropped += 1;
        } else {
            waiting.push(entry);
        }
    }

    let results = futures::future::join_all(
        waiting.iter().map(|entry| entry.query.clone().resolve(&oracle)),
    )
    .await;
    for (entry, result) in waiting.iter().zip(results) {
        match result {
            Ok(true) => {
                summary.applied += 1;
                summary.corrections.push(entry.correction());
            }
            Ok(false) => summary.dropped += 1,
            Err(err) => {
                console_warn!("keeping provisional height: {}", err);
                summary.failed += 1;
            }
        }
    }

    ModuleState::with_mut(|state| state.record_resolved(summary.applied, summary.dropped));
    to_js(&summary)
}

/// Triangulates the fills and solids of a feature for hosts without their own geometry
/// pipeline. Heights are the provisional ones; terrain correction is not applied.
#[wasm_bindgen]
pub fn tessellate_feature(layer_id: &str, feature_json: &str, style_json: &str) -> Result<JsValue, JsValue> {
    let feature: Feature = parse(feature_json, "feature")?;
    let style: Style = parse(style_json, "style")?;
    let layer = ModuleState::with(|state| state.layer(layer_id).cloned())?;

    // a throwaway scope, nobody answers these queries
    let scope = terrain::QueryScope::new();
    let context = ConvertContext {
        properties: &layer.properties,
        scope: &scope,
    };
    let buffers: Vec<BufferGeometry> = convert(&feature, &style, context)
        .items
        .iter()
        .filter_map(|item| item.primitive())
        .flat_map(|primitive| primitive.geometry_instances.iter())
        .filter_map(|instance| tessellate_geometry(&instance.geometry))
        .collect();

    to_js(&buffers)
}

#[wasm_bindgen]
pub fn get_stats() -> Result<JsValue, JsValue> {
    let stats = ModuleState::with(|state| state.stats());
    to_js(&stats)
}

#[wasm_bindgen]
pub fn clear_state() -> bool {
    ModuleState::with_mut(|state| state.clear());
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_collections_and_arrays_are_accepted() {
        let feature = r#"{"type":"Feature","geometry":{"type":"Point","coordinates":[1,2]},"properties":{}}"#;
        let collection = format!(r#"{{"type":"FeatureCollection","features":[{}]}}"#, feature);
        let list = format!("[{},{}]", feature, feature);

        let parsed = parse::<FeaturesInput>(&collection, "features").unwrap();
        assert_eq!(parsed.into_features().len(), 1);
        let parsed = parse::<FeaturesInput>(&list, "features").unwrap();
        assert_eq!(parsed.into_features().len(), 2);
    }

    #[test]
    fn malformed_input_names_what_failed() {
        let err = parse::<Style>("{", "style").err().unwrap();
        assert!(matches!(err, ConvertError::InvalidInput(ref m) if m.starts_with("style:")));
    }

    #[test]
    fn ids_must_be_whole_non_negative_numbers() {
        assert_eq!(to_id(42.0), Some(42));
        assert_eq!(to_id(0.0), Some(0));
        assert_eq!(to_id(-1.0), None);
        assert_eq!(to_id(1.5), None);
        assert_eq!(to_id(f64::NAN), None);
    }

    #[test]
    fn unknown_placements_yield_no_matrix() {
        assert_eq!(update_auto_scale(u32::MAX as f64, 2.0), None);
        assert_eq!(apply_terrain_height(-3.0, 10.0), None);
    }
}
