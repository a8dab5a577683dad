//! Terrain height correction of placed primitives.
//!
//! Conversion never waits for terrain. Placements that need a ground elevation come
//! back as [`HeightQuery`] values, each owning exactly one placement. A query remembers
//! the generation of its [`QueryScope`] when it is created; invalidating the scope (the
//! feature set was replaced) makes every older query stale and its result is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures::future::LocalBoxFuture;

use crate::error::ConvertError;
use crate::placement::PlacementHandle;

static NEXT_QUERY_ID: AtomicU64 = AtomicU64::new(1);

/// Source of ground elevations, keyed by `[lon, lat]` in degrees.
pub trait TerrainHeightOracle {
    /// Height of the currently loaded terrain, if any is loaded at that position
    fn sample_height(&self, longitude: f64, latitude: f64) -> Option<f64>;

    /// Height at the most detailed terrain level, resolved later
    fn query_height(
        &self,
        longitude: f64,
        latitude: f64,
    ) -> LocalBoxFuture<'static, Result<f64, ConvertError>>;
}

/// Generation counter shared by the queries of one feature set.
#[derive(Debug, Clone, Default)]
pub struct QueryScope {
    generation: Arc<AtomicU64>,
}

impl QueryScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Marks every outstanding query of this scope as stale.
    pub fn invalidate(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
pub struct HeightQuery {
    id: u64,
    coordinate: [f64; 2],
    generation: u64,
    scope: QueryScope,
    target: PlacementHandle,
}

impl HeightQuery {
    pub fn new(coordinate: [f64; 2], scope: &QueryScope, target: PlacementHandle) -> Self {
        Self {
            id: NEXT_QUERY_ID.fetch_add(1, Ordering::Relaxed),
            coordinate,
            generation: scope.generation(),
            scope: scope.clone(),
            target,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn coordinate(&self) -> [f64; 2] {
        self.coordinate
    }

    pub fn target(&self) -> &PlacementHandle {
        &self.target
    }

    pub fn is_stale(&self) -> bool {
        self.scope.generation() != self.generation
    }

    /// Moves the target to `height`. Returns false when the query is stale or the
    /// height unusable, in which case nothing changes.
    pub fn apply(&self, height: f64) -> bool {
        if self.is_stale() {
            crate::console_log!("dropping stale height query {}", self.id);
            return false;
        }
        if !height.is_finite() {
            return false;
        }
        self.target.set_terrain_height(height);
        true
    }

    /// Applies the height of the currently loaded terrain, if there is one.
    pub fn resolve_now(&self, oracle: &dyn TerrainHeightOracle) -> bool {
        let [longitude, latitude] = self.coordinate;
        oracle
            .sample_height(longitude, latitude)
            .is_some_and(|height| self.apply(height))
    }

    /// Waits for the detailed terrain height and applies it. A failed query leaves the
    /// provisional position in place.
    pub async fn resolve(self, oracle: &dyn TerrainHeightOracle) -> Result<bool, ConvertError> {
        let [longitude, latitude] = self.coordinate;
        let height = oracle.query_height(longitude, latitude).await?;
        Ok(self.apply(height))
    }
}

#[cfg(target_arch = "wasm32")]
mod js {
    use super::*;
    use wasm_bindgen::JsValue;
    use wasm_bindgen_futures::JsFuture;

    /// Oracle backed by host functions: `sample(lon, lat) -> number | undefined` and
    /// `query(lon, lat) -> Promise<number>`.
    pub struct JsTerrainOracle {
        sample: Option<js_sys::Function>,
        query: js_sys::Function,
    }

    impl JsTerrainOracle {
        pub fn new(sample: Option<js_sys::Function>, query: js_sys::Function) -> Self {
            Self { sample, query }
        }
    }

    impl TerrainHeightOracle for JsTerrainOracle {
        fn sample_height(&self, longitude: f64, latitude: f64) -> Option<f64> {
            self.sample
                .as_ref()?
                .call2(
                    &JsValue::NULL,
                    &JsValue::from_f64(longitude),
                    &JsValue::from_f64(latitude),
                )
                .ok()?
                .as_f64()
                .filter(|h| h.is_finite())
        }

        fn query_height(
            &self,
            longitude: f64,
            latitude: f64,
        ) -> LocalBoxFuture<'static, Result<f64, ConvertError>> {
            let called = self.query.call2(
                &JsValue::NULL,
                &JsValue::from_f64(longitude),
                &JsValue::from_f64(latitude),
            );
            Box::pin(async move {
                let value = called.map_err(|e| ConvertError::Terrain(format!("{:?}", e)))?;
                let height = JsFuture::from(js_sys::Promise::resolve(&value))
                    .await
                    .map_err(|e| ConvertError::Terrain(format!("{:?}", e)))?;
                height
                    .as_f64()
                    .filter(|h| h.is_finite())
                    .ok_or_else(|| ConvertError::Terrain("height is not a number".to_string()))
            })
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use js::JsTerrainOracle;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use futures::FutureExt;
    use nalgebra::Vector3;

    struct FlatTerrain(f64);

    impl TerrainHeightOracle for FlatTerrain {
        fn sample_height(&self, _longitude: f64, _latitude: f64) -> Option<f64> {
            Some(self.0)
        }

        fn query_height(
            &self,
            _longitude: f64,
            _latitude: f64,
        ) -> LocalBoxFuture<'static, Result<f64, ConvertError>> {
            futures::future::ready(Ok(self.0)).boxed_local()
        }
    }

    struct NoTerrain;

    impl TerrainHeightOracle for NoTerrain {
        fn sample_height(&self, _longitude: f64, _latitude: f64) -> Option<f64> {
            None
        }

        fn query_height(
            &self,
            _longitude: f64,
            _latitude: f64,
        ) -> LocalBoxFuture<'static, Result<f64, ConvertError>> {
            futures::future::ready(Err(ConvertError::Terrain("no tiles".to_string())))
                .boxed_local()
        }
    }

    fn query(scope: &QueryScope) -> HeightQuery {
        HeightQuery::new([1.0, 2.0], scope, PlacementHandle::vertical(Vector3::z()))
    }

    #[test]
    fn resolved_height_moves_the_target() {
        let scope = QueryScope::new();
        let query = query(&scope);
        let target = query.target().clone();
        assert!(block_on(query.resolve(&FlatTerrain(42.0))).unwrap());
        assert_eq!(target.terrain_height(), 42.0);
        assert_eq!(target.position(), Vector3::new(0.0, 0.0, 42.0));
    }

    #[test]
    fn stale_results_are_discarded() {
        let scope = QueryScope::new();
        let query = query(&scope);
        let target = query.target().clone();
        scope.invalidate();
        assert!(query.is_stale());
        assert!(!block_on(query.resolve(&FlatTerrain(42.0))).unwrap());
        assert_eq!(target.terrain_height(), 0.0);

        let fresh = self::query(&scope);
        assert!(fresh.resolve_now(&FlatTerrain(7.0)));
        assert_eq!(fresh.target().terrain_height(), 7.0);
    }

    #[test]
    fn failed_queries_keep_the_provisional_position() {
        let scope = QueryScope::new();
        let query = query(&scope);
        let target = query.target().clone();
        assert!(!query.resolve_now(&NoTerrain));
        assert!(block_on(query.resolve(&NoTerrain)).is_err());
        assert_eq!(target.terrain_height(), 0.0);
    }

    #[test]
    fn query_ids_are_unique() {
        let scope = QueryScope::new();
        assert_ne!(query(&scope).id(), query(&scope).id());
    }
}
