// Response structures handed across the wasm boundary
use serde::{Deserialize, Serialize};

use crate::primitive::ConvertedItem;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionStats {
    pub layers: usize,
    pub pending_height_queries: usize,
    pub placements: usize,
    pub features_converted: usize,
    pub items_created: usize,
    pub height_queries_applied: usize,
    pub height_queries_dropped: usize,
}

/// An item drawn with its own transform. The host addresses it by `id` when it reports
/// pixel sizes or overwrites the model matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPlacement {
    pub id: u64,
    pub item_index: usize,
    pub auto_scale: bool,
}

/// A terrain sample the host should answer with `apply_terrain_height`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeightQueryRequest {
    pub id: u64,
    pub coordinate: [f64; 2],
    /// Placement moved by the answer
    pub placement_id: u64,
    /// Index into `items` of the corrected item
    pub item_index: Option<usize>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResponse {
    pub items: Vec<ConvertedItem>,
    pub placements: Vec<ItemPlacement>,
    pub height_queries: Vec<HeightQueryRequest>,
    /// `[minX, minY, minZ, maxX, maxY, maxZ]`, absent when nothing was converted
    pub extent: Option<[f64; 6]>,
}

/// New transform of an item after its terrain height arrived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerrainCorrection {
    pub query_id: u64,
    pub placement_id: u64,
    pub item_index: Option<usize>,
    /// Column major
    pub model_matrix: Vec<f64>,
}

/// Outcome of resolving a layer's height queries against the host terrain.
#[cfg(target_arch = "wasm32")]
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveSummary {
    pub applied: usize,
    pub dropped: usize,
    pub failed: usize,
    pub corrections: Vec<TerrainCorrection>,
}
