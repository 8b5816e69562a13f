//! The representation contract
//!
//! A representation turns upstream data into renderable geometry for one
//! view. The view never inspects concrete types: it broadcasts phases through
//! [`Representation::process_request`] and asks for optional capabilities
//! through the facet accessors.
//!
//! # Request-pass driver
//!
//! The provided `process_request` implements the per-phase state machine:
//!
//! | State          | Update phase                        |
//! |----------------|-------------------------------------|
//! | Hidden         | not handled                         |
//! | Visible, clean | `Unchanged`                         |
//! | Visible, dirty | cache reuse, else `request_data`    |
//!
//! A failed update leaves the representation dirty so the next frame retries.

use crate::composite::CompositeRepresentation;
use crate::facet::StreamingFacet;
use crate::host::ViewHost;
use crate::phase::{PhaseContext, PhaseResponse, RepresentationInfo, RequestPhase, UpdateOutcome};
use crate::state::RepresentationState;
use relay_core::{
    CacheKey, DataRequest, Fidelity, ModTime, RelayError, RelayResult, RepresentationId, SharedSource,
};
use relay_storage::{DataStore, PieceSink};
use std::fmt::Debug;
use tracing::{debug, warn};

/// A producer of renderable geometry driven by a view
pub trait Representation: Send + Debug {
    /// Store identity of this representation
    fn id(&self) -> RepresentationId;

    /// Control state
    fn state(&self) -> &RepresentationState;

    /// Mutable control state
    fn state_mut(&mut self) -> &mut RepresentationState;

    /// Own data-preparation step; publishes through `sink`
    fn request_data(&mut self, request: &DataRequest, sink: &mut PieceSink<'_>) -> RelayResult<()>;

    // ========================================================================
    // Optional hooks
    // ========================================================================

    /// Whether an artifact for `key` is cached; only caching
    /// representations answer `true`
    fn is_cached(&self, _key: CacheKey) -> bool {
        false
    }

    /// Republish the artifact cached under `key`
    fn reuse_cached(&mut self, key: CacheKey, _sink: &mut PieceSink<'_>) -> RelayResult<()> {
        Err(RelayError::invalid_operation(format!(
            "{} has no cached artifact for {}",
            self.id(),
            key.value()
        )))
    }

    /// Drop cached artifacts other than the current key
    fn evict_cache(&mut self) {}

    /// Produce reduced geometry
    fn request_lod(&mut self, _request: &DataRequest, _sink: &mut PieceSink<'_>) -> RelayResult<()> {
        Ok(())
    }

    /// Fill in metadata beyond the sizes the driver already knows
    fn request_information(&self, _info: &mut RepresentationInfo) {}

    /// Recompute render-adjacent state
    fn prepare_for_render(&mut self, _store: &DataStore) {}

    /// Consume newly delivered increments; returns whether any were new
    fn process_streamed_piece(&mut self, _store: &DataStore) -> bool {
        false
    }

    // ========================================================================
    // Control setters
    //
    // Composites override these to fan out to their children.
    // ========================================================================

    /// Show or hide
    fn set_visibility(&mut self, visible: bool) {
        self.state_mut().set_visible(visible);
    }

    /// Request re-execution on the next update
    fn mark_modified(&mut self) {
        self.state_mut().mark_modified();
    }

    /// Set the time to produce data for
    fn set_update_time(&mut self, time: Option<f64>) {
        self.state_mut().set_update_time(time);
    }

    /// View-driven cache flag
    fn set_use_cache(&mut self, use_cache: bool) {
        self.state_mut().set_use_cache(use_cache);
    }

    /// View-driven cache key
    fn set_cache_key(&mut self, key: CacheKey) {
        self.state_mut().set_cache_key(key);
    }

    /// Pin caching on
    fn set_force_use_cache(&mut self, force: bool) {
        self.state_mut().set_force_use_cache(force);
    }

    /// Key used while caching is pinned
    fn set_forced_cache_key(&mut self, key: CacheKey) {
        self.state_mut().set_forced_cache_key(key);
    }

    /// Connect or disconnect the upstream source
    fn set_input(&mut self, input: Option<SharedSource>) {
        self.state_mut().set_input(input);
    }

    // ========================================================================
    // Facets
    // ========================================================================

    /// Composite capability
    fn as_composite(&self) -> Option<&CompositeRepresentation> {
        None
    }

    /// Mutable composite capability
    fn as_composite_mut(&mut self) -> Option<&mut CompositeRepresentation> {
        None
    }

    /// Progressive-refinement capability
    fn as_streaming_mut(&mut self) -> Option<&mut dyn StreamingFacet> {
        None
    }

    // ========================================================================
    // View attachment
    // ========================================================================

    /// Attach to a view; the next update re-executes
    fn add_to_view(&mut self, host: &mut ViewHost) -> RelayResult<()> {
        host.attach(self.id(), self.state().is_visible())?;
        self.mark_modified();
        Ok(())
    }

    /// Detach from a view
    fn remove_from_view(&mut self, host: &mut ViewHost) -> RelayResult<()> {
        host.detach(self.id())
    }

    /// Store ids this representation occupies, with their visibility
    fn collect_visibility(&self, out: &mut Vec<(RepresentationId, bool)>) {
        out.push((self.id(), self.state().is_visible()));
    }

    /// Handle one phase of the request pass
    fn process_request(&mut self, phase: RequestPhase, ctx: &mut PhaseContext<'_>) -> PhaseResponse {
        if !self.state().is_visible() {
            return PhaseResponse::NotHandled;
        }
        match phase {
            RequestPhase::Update => PhaseResponse::Update(drive_update(self, ctx)),
            RequestPhase::UpdateLod => PhaseResponse::Update(drive_lod_update(self, ctx)),
            RequestPhase::Information => {
                let id = self.id();
                let mut info = RepresentationInfo::new(id);
                info.data_size = item_size(ctx.store(), id, Fidelity::Full);
                info.lod_size = item_size(ctx.store(), id, Fidelity::Lod);
                self.request_information(&mut info);
                ctx.publish_info(info);
                PhaseResponse::Handled
            }
            RequestPhase::PrepareForRender => {
                self.prepare_for_render(ctx.store());
                PhaseResponse::Handled
            }
            RequestPhase::ProcessStreamedPiece => {
                self.process_streamed_piece(ctx.store());
                PhaseResponse::Handled
            }
            RequestPhase::Delivery | RequestPhase::Render => PhaseResponse::Handled,
        }
    }
}

fn item_size(store: &DataStore, id: RepresentationId, fidelity: Fidelity) -> u64 {
    store.item(id, fidelity).map_or(0, |item| item.memory_size())
}

fn item_timestamp(store: &DataStore, id: RepresentationId, fidelity: Fidelity) -> ModTime {
    store.item(id, fidelity).map_or(ModTime::ZERO, |item| item.timestamp())
}

/// Run the update step of `rep`, honoring the dirty flag and the cache
pub fn drive_update<R>(rep: &mut R, ctx: &mut PhaseContext<'_>) -> UpdateOutcome
where
    R: Representation + ?Sized,
{
    if !rep.state().is_dirty() {
        return UpdateOutcome::Unchanged;
    }
    let id = rep.id();
    let key = rep.state().cache_key();
    let result = if rep.state().use_cache() && rep.is_cached(key) {
        rep.reuse_cached(key, &mut ctx.sink(id))
            .map(|()| UpdateOutcome::Cached)
    } else {
        let request = ctx.request(rep.state().update_time());
        rep.request_data(&request, &mut ctx.sink(id))
            .map(|()| UpdateOutcome::Updated)
    };
    finish(rep, result, "update")
}

/// Run the reduced-geometry step of `rep`
///
/// Re-executes only when the full-resolution item is newer than the
/// reduced one.
pub fn drive_lod_update<R>(rep: &mut R, ctx: &mut PhaseContext<'_>) -> UpdateOutcome
where
    R: Representation + ?Sized,
{
    let id = rep.id();
    let full = item_timestamp(ctx.store(), id, Fidelity::Full);
    let lod = item_timestamp(ctx.store(), id, Fidelity::Lod);
    if full == ModTime::ZERO || !full.is_newer_than(lod) {
        return UpdateOutcome::Unchanged;
    }
    let request = ctx.request(rep.state().update_time()).low_res();
    let result = rep
        .request_lod(&request, &mut ctx.sink(id))
        .map(|()| UpdateOutcome::Updated);
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            warn!(target: "relay::view", %id, error = %e, "LOD update failed");
            UpdateOutcome::Failed(e.to_string())
        }
    }
}

fn finish<R>(rep: &mut R, result: RelayResult<UpdateOutcome>, step: &'static str) -> UpdateOutcome
where
    R: Representation + ?Sized,
{
    let id = rep.id();
    match result {
        Ok(outcome) => {
            rep.state_mut().clear_dirty();
            debug!(target: "relay::view", %id, step, ?outcome, "Representation updated");
            outcome
        }
        Err(e) => {
            warn!(target: "relay::view", %id, step, error = %e, "Representation update failed");
            UpdateOutcome::Failed(e.to_string())
        }
    }
}
