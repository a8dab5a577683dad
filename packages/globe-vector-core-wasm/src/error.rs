use thiserror::Error;
use wasm_bindgen::JsValue;

use crate::geometry::GeometryKind;

/// Errors that can leave the conversion core.
///
/// Malformed feature data never shows up here: it degrades to fewer primitives.
/// What remains are contract violations and problems at the host boundary.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("expected a {expected} geometry, got {found}")]
    GeometryKindMismatch {
        expected: GeometryKind,
        found: GeometryKind,
    },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unknown layer: {0}")]
    UnknownLayer(String),
    #[error("terrain query failed: {0}")]
    Terrain(String),
}

impl From<serde_json::Error> for ConvertError {
    fn from(err: serde_json::Error) -> Self {
        ConvertError::InvalidInput(err.to_string())
    }
}

impl From<ConvertError> for JsValue {
    fn from(err: ConvertError) -> Self {
        JsValue::from_str(&err.to_string())
    }
}
