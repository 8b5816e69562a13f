//! Geometry representation
//!
//! Pulls full and reduced geometry from its input source, keeps produced
//! objects per cache key and republishes them on cache hits. The last
//! published objects survive a detach, so re-attaching a representation
//! whose inputs did not change republishes them without running the source.

use crate::cache::CacheKeeper;
use crate::host::ViewHost;
use crate::phase::RepresentationInfo;
use crate::representation::Representation;
use crate::state::RepresentationState;
use relay_core::{
    Bounds, CacheKey, DataHandle, DataRequest, Fidelity, RelayError, RelayResult, RepresentationId, SharedSource,
};
use relay_storage::{DataStore, PieceSink};
use tracing::debug;

/// Representation backed by a pipeline source
#[derive(Debug)]
pub struct GeometryRepresentation {
    id: RepresentationId,
    state: RepresentationState,
    cache: CacheKeeper,
    always_clone: bool,
    redistributable: bool,
    bounds: Option<Bounds>,
    render_bounds: Option<Bounds>,
    executions: u64,
    last_full: Option<DataHandle>,
    last_lod: Option<DataHandle>,
    published_key: Option<CacheKey>,
}

impl GeometryRepresentation {
    /// Create a hidden representation reading from `source`
    pub fn new(id: RepresentationId, source: SharedSource) -> Self {
        let mut state = RepresentationState::new();
        state.set_input(Some(source));
        GeometryRepresentation {
            id,
            state,
            cache: CacheKeeper::new(),
            always_clone: false,
            redistributable: false,
            bounds: None,
            render_bounds: None,
            executions: 0,
            last_full: None,
            last_lod: None,
            published_key: None,
        }
    }

    /// Replicate to every process regardless of the view mode
    pub fn with_always_clone(mut self, always_clone: bool) -> Self {
        self.always_clone = always_clone;
        self
    }

    /// Allow rebalancing across processes
    pub fn with_redistributable(mut self, redistributable: bool) -> Self {
        self.redistributable = redistributable;
        self
    }

    /// Times the upstream source ran, full and reduced
    pub fn executions(&self) -> u64 {
        self.executions
    }

    /// Produced objects per key
    pub fn cache(&self) -> &CacheKeeper {
        &self.cache
    }

    /// Extent of the delivered geometry, computed before rendering
    pub fn render_bounds(&self) -> Option<Bounds> {
        self.render_bounds
    }

    fn produce(&mut self, request: &DataRequest) -> RelayResult<DataHandle> {
        let source = match self.state.input() {
            Some(source) => source.clone(),
            None => return Err(RelayError::source(format!("{} has no input", self.id))),
        };
        self.executions += 1;
        source.produce(request)
    }

    /// Put the last produced objects into a freshly registered item
    fn republish(&self, host: &mut ViewHost) -> RelayResult<bool> {
        let full = match &self.last_full {
            Some(full) => full.shallow_copy().into_handle(),
            None => return Ok(false),
        };
        let mut sink = host.store_mut().sink(self.id);
        sink.set_piece(full, Fidelity::Full)?;
        if let Some(lod) = &self.last_lod {
            sink.set_piece(lod.shallow_copy().into_handle(), Fidelity::Lod)?;
        }
        debug!(target: "relay::view", id = %self.id, "Republished geometry on attach");
        Ok(true)
    }
}

impl Representation for GeometryRepresentation {
    fn id(&self) -> RepresentationId {
        self.id
    }

    fn state(&self) -> &RepresentationState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RepresentationState {
        &mut self.state
    }

    fn add_to_view(&mut self, host: &mut ViewHost) -> RelayResult<()> {
        host.attach(self.id, self.state.is_visible())?;
        if !self.state.is_dirty() && !self.republish(host)? {
            self.state.mark_modified();
        }
        Ok(())
    }

    fn request_data(&mut self, request: &DataRequest, sink: &mut PieceSink<'_>) -> RelayResult<()> {
        let data = self.produce(request)?;
        self.published_key = None;
        if self.state.use_cache() {
            let key = self.state.cache_key();
            self.cache.insert(key, data.clone());
            self.published_key = Some(key);
        }
        self.bounds = data.bounds();
        self.last_full = Some(data.clone());
        sink.set_piece(data, Fidelity::Full)?;
        Ok(())
    }

    fn is_cached(&self, key: CacheKey) -> bool {
        self.cache.contains(key)
    }

    fn reuse_cached(&mut self, key: CacheKey, sink: &mut PieceSink<'_>) -> RelayResult<()> {
        if self.published_key == Some(key) && sink.has_data(Fidelity::Full) {
            // already in the store
            return Ok(());
        }
        let cached = self
            .cache
            .lookup(key)
            .ok_or_else(|| RelayError::invalid_operation(format!("{} lost cache entry {}", self.id, key.value())))?;
        // a fresh modification time so the store treats it as new content
        let data = cached.shallow_copy().into_handle();
        self.bounds = data.bounds();
        debug!(target: "relay::view", id = %self.id, key = key.value(), "Reusing cached geometry");
        self.last_full = Some(data.clone());
        self.published_key = Some(key);
        sink.set_piece(data, Fidelity::Full)?;
        Ok(())
    }

    fn evict_cache(&mut self) {
        self.cache.evict_except(self.state.cache_key());
    }

    fn request_lod(&mut self, request: &DataRequest, sink: &mut PieceSink<'_>) -> RelayResult<()> {
        let data = self.produce(request)?;
        self.last_lod = Some(data.clone());
        sink.set_piece(data, Fidelity::Lod)?;
        Ok(())
    }

    fn request_information(&self, info: &mut RepresentationInfo) {
        info.bounds = self.bounds;
        info.always_clone = self.always_clone;
        info.redistributable = self.redistributable;
    }

    fn prepare_for_render(&mut self, store: &DataStore) {
        self.render_bounds = store
            .get_producer(self.id, Fidelity::Full)
            .ok()
            .and_then(|producer| producer.output().bounds());
    }
}
