//! The view and its per-frame request pass
//!
//! # Frame sequence
//!
//! `update()` runs, in order and for the whole batch of representations:
//!
//! 1. Visibility sync into the store mirror
//! 2. Time and cache flags pushed into every representation
//! 3. Cache pressure check (collective, when caching is enabled); on a full
//!    cache every representation evicts all but its current key
//! 4. `Update`, then `Information`
//! 5. Size and bounds synchronization (collective)
//! 6. LOD and move-mode decision from the synchronized size
//! 7. `UpdateLod` (LOD frames only), `PrepareForRender`
//! 8. `Delivery`: full, then LOD, then streamed pieces (collective)
//! 9. `ProcessStreamedPiece`, `Render`
//!
//! Every collective runs unconditionally on every process, and every branch
//! that decides whether a collective runs depends only on configuration or
//! on synchronized values. A failing representation is reported in the
//! [`FrameReport`] and never aborts the frame.

use crate::composite::CompositeRepresentation;
use crate::facet::StreamingFacet;
use crate::host::ViewHost;
use crate::phase::{PhaseContext, PhaseResponse, RepresentationInfo, RequestPhase, UpdateOutcome};
use crate::render::{NullRenderer, RenderBackend, RenderFrame, RenderItem};
use crate::representation::Representation;
use relay_core::{
    Bounds, CacheKey, Fidelity, MoveMode, RelayConfig, RelayError, RelayResult, RepresentationId, ViewId,
};
use relay_delivery::{Communicator, CommunicatorExt, DeliveryManager, DeliveryMetrics, LocalCommunicator};
use relay_storage::{DataStore, IdBatch};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// What happened during one frame on this process
#[derive(Debug, Clone)]
pub struct FrameReport {
    /// Frame counter
    pub frame: u64,
    /// Update outcome per representation that handled the update phase
    pub outcomes: BTreeMap<RepresentationId, UpdateOutcome>,
    /// Outcome of the reduced-geometry step, on LOD frames
    pub lod_outcomes: BTreeMap<RepresentationId, UpdateOutcome>,
    /// Representations that skipped the update phase
    pub skipped: Vec<RepresentationId>,
    /// Whether the cache-full condition was raised
    pub cache_full: bool,
    /// Whether the frame used reduced geometry
    pub use_lod: bool,
    /// Move mode resolved for the frame
    pub mode: MoveMode,
    /// Visible full-resolution bytes across all processes
    pub global_size: u64,
    /// Scene extent across all processes
    pub bounds: Bounds,
    /// Ids delivered at full resolution
    pub delivered_full: IdBatch,
    /// Ids delivered at reduced resolution
    pub delivered_lod: IdBatch,
    /// Ids that received a streamed increment
    pub delivered_streamed: IdBatch,
    /// Whether this process rendered
    pub rendered: bool,
}

impl FrameReport {
    fn new(frame: u64) -> Self {
        FrameReport {
            frame,
            outcomes: BTreeMap::new(),
            lod_outcomes: BTreeMap::new(),
            skipped: Vec::new(),
            cache_full: false,
            use_lod: false,
            mode: MoveMode::PassThrough,
            global_size: 0,
            bounds: Bounds::EMPTY,
            delivered_full: IdBatch::new(),
            delivered_lod: IdBatch::new(),
            delivered_streamed: IdBatch::new(),
            rendered: false,
        }
    }

    /// Update outcome of `id`
    pub fn outcome(&self, id: RepresentationId) -> Option<&UpdateOutcome> {
        self.outcomes.get(&id)
    }

    /// Representations whose update failed, with the reason
    pub fn failures(&self) -> Vec<(RepresentationId, &str)> {
        self.outcomes
            .iter()
            .chain(self.lod_outcomes.iter())
            .filter_map(|(id, outcome)| match outcome {
                UpdateOutcome::Failed(reason) => Some((*id, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    /// Whether any representation failed
    pub fn has_failures(&self) -> bool {
        !self.failures().is_empty()
    }
}

/// A render view driving its representations frame by frame
#[derive(Debug)]
pub struct View {
    id: ViewId,
    host: ViewHost,
    reps: BTreeMap<RepresentationId, Box<dyn Representation>>,
    delivery: DeliveryManager,
    comm: Arc<dyn Communicator>,
    config: RelayConfig,
    time: Option<f64>,
    use_cache: bool,
    cache_key: CacheKey,
    interactive: bool,
    renderer: Box<dyn RenderBackend>,
    frame: u64,
    local_bounds: Bounds,
    global_bounds: Bounds,
    last_mode: MoveMode,
    last_lod: bool,
    streaming_interrupted: bool,
}

impl View {
    /// Create a view taking part in the session behind `comm`
    pub fn new(id: ViewId, comm: Arc<dyn Communicator>, config: RelayConfig) -> Self {
        let delivery = DeliveryManager::new(config.delivery.redistribute);
        View {
            id,
            host: ViewHost::new(id),
            reps: BTreeMap::new(),
            delivery,
            comm,
            config,
            time: None,
            use_cache: false,
            cache_key: CacheKey::default(),
            interactive: false,
            renderer: Box::new(NullRenderer),
            frame: 0,
            local_bounds: Bounds::EMPTY,
            global_bounds: Bounds::EMPTY,
            last_mode: MoveMode::PassThrough,
            last_lod: false,
            streaming_interrupted: false,
        }
    }

    /// Create a view for a single-process session
    pub fn local(id: ViewId, config: RelayConfig) -> Self {
        Self::new(id, Arc::new(LocalCommunicator), config)
    }

    /// Use `renderer` for the render hand-off
    pub fn with_renderer(mut self, renderer: Box<dyn RenderBackend>) -> Self {
        self.renderer = renderer;
        self
    }

    /// Replace the render backend
    pub fn set_renderer(&mut self, renderer: Box<dyn RenderBackend>) {
        self.renderer = renderer;
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// View id
    pub fn id(&self) -> ViewId {
        self.id
    }

    /// Session configuration
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    /// The view's store
    pub fn store(&self) -> &DataStore {
        self.host.store()
    }

    /// Store plus attachment table
    pub fn host(&self) -> &ViewHost {
        &self.host
    }

    /// Communicator of the session
    pub fn communicator(&self) -> &dyn Communicator {
        self.comm.as_ref()
    }

    /// Delivery counters
    pub fn delivery_metrics(&self) -> DeliveryMetrics {
        self.delivery.metrics()
    }

    /// Frames run so far
    pub fn frame_count(&self) -> u64 {
        self.frame
    }

    /// Move mode of the last frame
    pub fn last_mode(&self) -> MoveMode {
        self.last_mode
    }

    /// Whether the last frame used reduced geometry
    pub fn uses_lod(&self) -> bool {
        self.last_lod
    }

    /// Scene extent from the last bounds synchronization
    pub fn global_bounds(&self) -> Bounds {
        self.global_bounds
    }

    /// Whether progressive refinement is enabled for this session
    pub fn supports_streaming(&self) -> bool {
        self.config.streaming.enabled
    }

    // ========================================================================
    // View-level settings
    // ========================================================================

    /// Time pushed into every representation on the next update
    pub fn set_time(&mut self, time: Option<f64>) {
        self.time = time;
    }

    /// Current view time
    pub fn time(&self) -> Option<f64> {
        self.time
    }

    /// Cache flag pushed into every representation
    pub fn set_use_cache(&mut self, use_cache: bool) {
        self.use_cache = use_cache;
    }

    /// Cache key pushed into every representation
    pub fn set_cache_key(&mut self, key: CacheKey) {
        self.cache_key = key;
    }

    /// Interactive frames may use reduced geometry
    pub fn set_interactive(&mut self, interactive: bool) {
        self.interactive = interactive;
    }

    // ========================================================================
    // Representations
    // ========================================================================

    /// Attach a representation
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` if a representation with the same id is present.
    pub fn add_representation(&mut self, mut rep: Box<dyn Representation>) -> RelayResult<RepresentationId> {
        let id = rep.id();
        if self.reps.contains_key(&id) {
            warn!(target: "relay::view", view = %self.id, %id, "Representation already in view");
            return Err(RelayError::AlreadyRegistered(id));
        }
        rep.add_to_view(&mut self.host)?;
        self.reps.insert(id, rep);
        debug!(target: "relay::view", view = %self.id, %id, "Added representation");
        Ok(id)
    }

    /// Detach and return a representation
    pub fn remove_representation(&mut self, id: RepresentationId) -> RelayResult<Box<dyn Representation>> {
        let mut rep = match self.reps.remove(&id) {
            Some(rep) => rep,
            None => {
                warn!(target: "relay::view", view = %self.id, %id, "Representation not in view");
                return Err(RelayError::UnknownRepresentation(id));
            }
        };
        if let Err(e) = rep.remove_from_view(&mut self.host) {
            warn!(target: "relay::view", view = %self.id, %id, error = %e, "Detaching representation failed");
        }
        Ok(rep)
    }

    /// Representation with `id`
    pub fn representation(&self, id: RepresentationId) -> Option<&dyn Representation> {
        self.reps.get(&id).map(|rep| rep.as_ref())
    }

    /// Mutable representation with `id`
    pub fn representation_mut(&mut self, id: RepresentationId) -> Option<&mut (dyn Representation + 'static)> {
        self.reps.get_mut(&id).map(|rep| rep.as_mut())
    }

    /// Ids of the top-level representations
    pub fn representation_ids(&self) -> Vec<RepresentationId> {
        self.reps.keys().copied().collect()
    }

    fn composite_mut(&mut self, id: RepresentationId) -> RelayResult<(&mut CompositeRepresentation, &mut ViewHost)> {
        let rep = match self.reps.get_mut(&id) {
            Some(rep) => rep,
            None => return Err(RelayError::UnknownRepresentation(id)),
        };
        match rep.as_composite_mut() {
            Some(composite) => Ok((composite, &mut self.host)),
            None => Err(RelayError::invalid_operation(format!("{} is not a composite", id))),
        }
    }

    /// Switch the active child of a composite in this view
    pub fn set_active_representation(&mut self, composite: RepresentationId, key: &str) -> RelayResult<()> {
        let (composite, host) = self.composite_mut(composite)?;
        composite.set_active_representation(key, Some(host))
    }

    /// Add a child to a composite in this view; returns a replaced child
    pub fn add_to_composite(
        &mut self,
        composite: RepresentationId,
        key: &str,
        child: Box<dyn Representation>,
    ) -> RelayResult<Option<Box<dyn Representation>>> {
        let (composite, host) = self.composite_mut(composite)?;
        Ok(composite.add_representation(key, child, Some(host)))
    }

    /// Remove a child from a composite in this view
    pub fn remove_from_composite(&mut self, composite: RepresentationId, key: &str) -> RelayResult<Box<dyn Representation>> {
        let (composite, host) = self.composite_mut(composite)?;
        composite.remove_representation(key, Some(host))
    }

    /// Progressive-refinement facet of a representation
    pub fn streaming_facet(&mut self, id: RepresentationId) -> Option<&mut dyn StreamingFacet> {
        self.reps.get_mut(&id)?.as_streaming_mut()
    }

    // ========================================================================
    // Streaming control
    // ========================================================================

    /// Stop scheduling further refinement passes
    pub fn interrupt_streaming(&mut self) {
        if !self.streaming_interrupted {
            info!(target: "relay::view", view = %self.id, "Streaming interrupted");
        }
        self.streaming_interrupted = true;
    }

    /// Allow refinement passes again
    pub fn resume_streaming(&mut self) {
        self.streaming_interrupted = false;
    }

    /// Whether refinement passes are suspended
    pub fn is_streaming_interrupted(&self) -> bool {
        self.streaming_interrupted
    }

    // ========================================================================
    // Collectives
    // ========================================================================

    /// Visible bytes at `fidelity` summed across processes
    ///
    /// Collective: every process must call it at the same point.
    pub fn synchronize_data_size(&self, fidelity: Fidelity) -> u64 {
        let local = self.host.store().visible_data_size(fidelity);
        self.comm.all_reduce_sum(local)
    }

    /// Scene extent across processes, from the last information phase
    ///
    /// Collective: every process must call it at the same point.
    pub fn synchronize_bounds(&mut self) -> Bounds {
        self.global_bounds = self.comm.all_reduce_bounds(self.local_bounds);
        self.global_bounds
    }

    // ========================================================================
    // Frame
    // ========================================================================

    /// Run the request pass once
    pub fn update(&mut self) -> FrameReport {
        self.frame += 1;
        let mut report = FrameReport::new(self.frame);
        let (rank, size) = (self.comm.rank(), self.comm.size());

        self.sync_visibility();

        for rep in self.reps.values_mut() {
            rep.set_update_time(self.time);
            rep.set_use_cache(self.use_cache);
            rep.set_cache_key(self.cache_key);
        }

        report.cache_full = self.check_cache_pressure();
        if report.cache_full {
            for rep in self.reps.values_mut() {
                rep.evict_cache();
            }
        }

        let infos = {
            let mut ctx = PhaseContext::new(self.host.store_mut(), rank, size);
            for (id, rep) in self.reps.iter_mut() {
                match rep.process_request(RequestPhase::Update, &mut ctx) {
                    PhaseResponse::Update(outcome) => {
                        report.outcomes.insert(*id, outcome);
                    }
                    PhaseResponse::NotHandled => report.skipped.push(*id),
                    PhaseResponse::Handled => {}
                }
            }
            broadcast(&mut self.reps, RequestPhase::Information, &mut ctx);
            ctx.take_infos()
        };
        self.apply_information(&infos);

        report.global_size = self.synchronize_data_size(Fidelity::Full);
        report.bounds = self.synchronize_bounds();
        report.use_lod = self.interactive && report.global_size > self.config.delivery.lod_threshold;
        report.mode = self.config.delivery.mode.resolve(
            report.global_size,
            self.config.delivery.remote_render_threshold,
            size,
        );
        self.last_mode = report.mode;
        self.last_lod = report.use_lod;

        {
            let mut ctx = PhaseContext::new(self.host.store_mut(), rank, size);
            if report.use_lod {
                for (id, rep) in self.reps.iter_mut() {
                    if let PhaseResponse::Update(outcome) = rep.process_request(RequestPhase::UpdateLod, &mut ctx) {
                        report.lod_outcomes.insert(*id, outcome);
                    }
                }
            }
            broadcast(&mut self.reps, RequestPhase::PrepareForRender, &mut ctx);
            broadcast(&mut self.reps, RequestPhase::Delivery, &mut ctx);
        }

        let store = self.host.store_mut();
        let comm = self.comm.as_ref();
        report.delivered_full = self
            .delivery
            .deliver_pending(store, comm, Fidelity::Full, report.mode)
            .delivered;
        if report.use_lod {
            report.delivered_lod = self
                .delivery
                .deliver_pending(store, comm, Fidelity::Lod, report.mode)
                .delivered;
        }
        report.delivered_streamed = self
            .delivery
            .deliver_streamed_pieces(store, comm, report.mode)
            .delivered;

        {
            let mut ctx = PhaseContext::new(self.host.store_mut(), rank, size);
            broadcast(&mut self.reps, RequestPhase::ProcessStreamedPiece, &mut ctx);
            broadcast(&mut self.reps, RequestPhase::Render, &mut ctx);
        }
        report.rendered = self.present();

        debug!(
            target: "relay::view",
            view = %self.id,
            frame = self.frame,
            mode = %report.mode,
            use_lod = report.use_lod,
            global_size = report.global_size,
            failures = report.failures().len(),
            "Frame complete"
        );
        report
    }

    /// Re-issue only the render hand-off with whatever data is delivered
    ///
    /// Returns whether this process rendered.
    pub fn present(&mut self) -> bool {
        let rank = self.comm.rank();
        if !self.last_mode.renders_on(rank) {
            return false;
        }
        let frame = self.build_frame(rank);
        self.renderer.render(&frame);
        true
    }

    fn build_frame(&self, rank: usize) -> RenderFrame {
        let store = self.host.store();
        let items = self
            .host
            .attached_ids()
            .filter(|id| store.is_visible(*id))
            .filter_map(|id| {
                let lod_ready = self.last_lod
                    && store
                        .get_producer(id, Fidelity::Lod)
                        .map_or(false, |producer| producer.has_data());
                let fidelity = if lod_ready { Fidelity::Lod } else { Fidelity::Full };
                let data = store.get_producer(id, fidelity).ok()?.output();
                let streamed = store.streamed_pieces(id);
                if data.is_empty() && streamed.is_empty() {
                    return None;
                }
                Some(RenderItem {
                    id,
                    fidelity,
                    data,
                    streamed,
                })
            })
            .collect();
        RenderFrame {
            view: self.id,
            frame: self.frame,
            rank,
            mode: self.last_mode,
            bounds: self.global_bounds,
            items,
        }
    }

    fn sync_visibility(&mut self) {
        let mut entries = Vec::new();
        for rep in self.reps.values() {
            rep.collect_visibility(&mut entries);
        }
        for (id, visible) in entries {
            match self.host.store_mut().set_visibility(id, visible) {
                Ok(true) if visible => {
                    self.delivery.reset_watermark(Fidelity::Full);
                    self.delivery.reset_watermark(Fidelity::Lod);
                    debug!(target: "relay::view", view = %self.id, %id, "Representation shown");
                }
                Ok(_) => {}
                Err(e) => debug!(target: "relay::view", view = %self.id, %id, error = %e, "Visibility sync skipped"),
            }
        }
    }

    fn check_cache_pressure(&self) -> bool {
        if !self.config.cache.enabled {
            return false;
        }
        let global = self.synchronize_data_size(Fidelity::Full);
        let full = global > self.config.cache.limit;
        if full {
            info!(
                target: "relay::view",
                view = %self.id,
                global,
                limit = self.config.cache.limit,
                "Cache full; evicting"
            );
        }
        full
    }

    fn apply_information(&mut self, infos: &[RepresentationInfo]) {
        let store = self.host.store_mut();
        for info in infos {
            let applied = store
                .set_always_clone(info.id, info.always_clone)
                .and_then(|()| store.set_redistributable(info.id, info.redistributable))
                .and_then(|()| store.set_streamable(info.id, info.streamable));
            if let Err(e) = applied {
                debug!(target: "relay::view", id = %info.id, error = %e, "Flags not applied");
            }
        }
        self.local_bounds = Bounds::union_all(infos.iter().filter_map(|info| info.bounds.as_ref()));
    }
}

fn broadcast(
    reps: &mut BTreeMap<RepresentationId, Box<dyn Representation>>,
    phase: RequestPhase,
    ctx: &mut PhaseContext<'_>,
) {
    for rep in reps.values_mut() {
        rep.process_request(phase, ctx);
    }
}
