use lazy_static::lazy_static;
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashMap;

use crate::convert::Conversion;
use crate::error::ConvertError;
use crate::models::{
    ConversionResponse, ConversionStats, HeightQueryRequest, ItemPlacement, TerrainCorrection,
};
use crate::placement::PlacementHandle;
use crate::terrain::{HeightQuery, QueryScope};
use crate::vector_properties::VectorProperties;
use crate::{console_log, console_warn};

// Unanswered queries beyond this are dropped, oldest first
pub const MAX_PENDING_QUERIES_PER_LAYER: usize = 10_000;

// Layer defaults and the scope its height queries are issued in
#[derive(Debug, Clone)]
pub struct LayerState {
    pub properties: VectorProperties,
    pub scope: QueryScope,
}

struct PlacedItem {
    layer_id: String,
    placement: PlacementHandle,
}

/// A height query handed to the host, with the item it corrects.
#[derive(Debug, Clone)]
pub struct PendingQuery {
    layer_id: String,
    pub query: HeightQuery,
    pub placement_id: u64,
    pub item_index: Option<usize>,
}

impl PendingQuery {
    /// Current transform of the corrected item
    pub fn correction(&self) -> TerrainCorrection {
        TerrainCorrection {
            query_id: self.query.id(),
            placement_id: self.placement_id,
            item_index: self.item_index,
            model_matrix: self.query.target().column_major(),
        }
    }
}

// Registered layers, the placements of converted items and the height queries handed
// out to the host
pub struct ModuleState {
    layers: HashMap<String, LayerState>,
    placements: HashMap<u64, PlacedItem>,
    pending_queries: HashMap<u64, PendingQuery>,
    next_placement_id: u64,
    pending_query_limit: usize,

    // Stats
    features_converted: usize,
    items_created: usize,
    height_queries_applied: usize,
    height_queries_dropped: usize,
}

lazy_static! {
    static ref MODULE_STATE: ReentrantMutex<RefCell<ModuleState>> =
        ReentrantMutex::new(RefCell::new(ModuleState::new()));
}

impl ModuleState {
    pub fn new() -> Self {
        ModuleState {
            layers: HashMap::new(),
            placements: HashMap::new(),
            pending_queries: HashMap::new(),
            next_placement_id: 0,
            pending_query_limit: MAX_PENDING_QUERIES_PER_LAYER,
            features_converted: 0,
            items_created: 0,
            height_queries_applied: 0,
            height_queries_dropped: 0,
        }
    }

    pub fn with_mut<F, R>(f: F) -> R
    where
        F: FnOnce(&mut ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let mut borrow = guard.borrow_mut();
        f(&mut borrow)
    }

    pub fn with<F, R>(f: F) -> R
    where
        F: FnOnce(&ModuleState) -> R,
    {
        let guard = MODULE_STATE.lock();
        let borrow = guard.borrow();
        f(&borrow)
    }

    /// Registers or replaces a layer. Replacing keeps the scope but invalidates it, so
    /// results of queries issued for the old feature set are dropped.
    pub fn register_layer(&mut self, layer_id: &str, properties: VectorProperties) {
        if let Some(layer) = self.layers.get_mut(layer_id) {
            layer.properties = properties;
            layer.scope.invalidate();
            self.release_layer(layer_id);
            return;
        }
        self.layers.insert(
            layer_id.to_string(),
            LayerState {
                properties,
                scope: QueryScope::new(),
            },
        );
    }

    pub fn remove_layer(&mut self, layer_id: &str) -> bool {
        match self.layers.remove(layer_id) {
            Some(layer) => {
                layer.scope.invalidate();
                self.release_layer(layer_id);
                true
            }
            None => false,
        }
    }

    pub fn layer(&self, layer_id: &str) -> Result<&LayerState, ConvertError> {
        self.layers
            .get(layer_id)
            .ok_or_else(|| ConvertError::UnknownLayer(layer_id.to_string()))
    }

    /// Marks the layer's feature set as replaced. Its placements are released. Returns the
    /// number of pending queries dropped.
    pub fn invalidate_layer(&mut self, layer_id: &str) -> Result<usize, ConvertError> {
        self.layer(layer_id)?.scope.invalidate();
        Ok(self.release_layer(layer_id))
    }

    fn release_layer(&mut self, layer_id: &str) -> usize {
        self.placements.retain(|_, placed| placed.layer_id != layer_id);
        let before = self.pending_queries.len();
        self.pending_queries.retain(|_, pending| pending.layer_id != layer_id);
        let dropped = before - self.pending_queries.len();
        self.height_queries_dropped += dropped;
        dropped
    }

    fn insert_placement(&mut self, layer_id: &str, placement: PlacementHandle) -> u64 {
        self.next_placement_id += 1;
        let id = self.next_placement_id;
        self.placements.insert(
            id,
            PlacedItem {
                layer_id: layer_id.to_string(),
                placement,
            },
        );
        id
    }

    pub fn placement(&self, placement_id: u64) -> Option<&PlacementHandle> {
        self.placements.get(&placement_id).map(|placed| &placed.placement)
    }

    /// Records a conversion. Placed items are kept until the layer is invalidated,
    /// replaced or removed; height queries until they are answered, dropped with the
    /// layer, or pushed out by newer queries of the same layer.
    pub fn add_conversion(&mut self, layer_id: &str, conversion: Conversion) -> ConversionResponse {
        let Conversion {
            items,
            height_queries,
            extent,
        } = conversion;
        self.features_converted += 1;
        self.items_created += items.len();

        let mut placements = Vec::new();
        for (item_index, item) in items.iter().enumerate() {
            if let Some(placement) = item.placement() {
                placements.push(ItemPlacement {
                    id: self.insert_placement(layer_id, placement.clone()),
                    item_index,
                    auto_scale: placement.auto_scale(),
                });
            }
        }

        let mut requests = Vec::with_capacity(height_queries.len());
        for query in height_queries {
            let placed = placements.iter().find(|placed| {
                items[placed.item_index]
                    .placement()
                    .is_some_and(|p| p.ptr_eq(query.target()))
            });
            let (placement_id, item_index) = match placed {
                Some(placed) => (placed.id, Some(placed.item_index)),
                None => (self.insert_placement(layer_id, query.target().clone()), None),
            };
            requests.push(HeightQueryRequest {
                id: query.id(),
                coordinate: query.coordinate(),
                placement_id,
                item_index,
            });
            self.pending_queries.insert(
                query.id(),
                PendingQuery {
                    layer_id: layer_id.to_string(),
                    query,
                    placement_id,
                    item_index,
                },
            );
        }
        self.limit_pending_queries(layer_id);

        ConversionResponse {
            items,
            placements,
            height_queries: requests,
            extent: (!extent.is_empty()).then(|| extent.to_array()),
        }
    }

    fn limit_pending_queries(&mut self, layer_id: &str) {
        if self.pending_queries.len() <= self.pending_query_limit {
            return;
        }
        let mut ids: Vec<u64> = self
            .pending_queries
            .iter()
            .filter(|(_, pending)| pending.layer_id == layer_id)
            .map(|(id, _)| *id)
            .collect();
        if ids.len() <= self.pending_query_limit {
            return;
        }
        ids.sort_unstable();
        let excess = ids.len() - self.pending_query_limit;
        for id in &ids[..excess] {
            self.pending_queries.remove(id);
        }
        self.height_queries_dropped += excess;
        console_warn!(
            "layer {} has too many unanswered height queries, dropped {}",
            layer_id,
            excess
        );
    }

    /// Answers one pending query. Returns the corrected transform, or None when the query
    /// is unknown, already answered or stale.
    pub fn apply_terrain_height(&mut self, query_id: u64, height: f64) -> Option<TerrainCorrection> {
        let pending = self.pending_queries.remove(&query_id)?;
        if pending.query.apply(height) {
            self.height_queries_applied += 1;
            Some(pending.correction())
        } else {
            self.height_queries_dropped += 1;
            None
        }
    }

    /// Removes and returns the pending queries of a layer, for resolution outside the lock.
    pub fn take_queries(&mut self, layer_id: &str) -> Vec<PendingQuery> {
        let ids: Vec<u64> = self
            .pending_queries
            .iter()
            .filter(|(_, pending)| pending.layer_id == layer_id)
            .map(|(id, _)| *id)
            .collect();
        ids.iter()
            .filter_map(|id| self.pending_queries.remove(id))
            .collect()
    }

    #[cfg(target_arch = "wasm32")]
    pub fn record_resolved(&mut self, applied: usize, dropped: usize) {
        self.height_queries_applied += applied;
        self.height_queries_dropped += dropped;
    }

    pub fn stats(&self) -> ConversionStats {
        ConversionStats {
            layers: self.layers.len(),
            pending_height_queries: self.pending_queries.len(),
            placements: self.placements.len(),
            features_converted: self.features_converted,
            items_created: self.items_created,
            height_queries_applied: self.height_queries_applied,
            height_queries_dropped: self.height_queries_dropped,
        }
    }

    pub fn clear(&mut self) {
        for layer in self.layers.values() {
            layer.scope.invalidate();
        }
        *self = Self::new();
        console_log!("module state cleared");
    }
}
