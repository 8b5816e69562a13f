//! Progressively refined representation
//!
//! Depth 0 is published as ordinary full-resolution geometry. Each finer
//! level is produced by the next request pass and queued as a streamed
//! piece, which delivery appends to the item's increments. Levels requested
//! between two passes go out together as one piece. Coarsening drops the
//! increments and re-sends the coarser level as a single piece.

use relay_core::{DataObject, DataRequest, Fidelity, RelayError, RelayResult, RepresentationId, SharedSource};
use relay_engine::{Representation, RepresentationInfo, RepresentationState, StreamingFacet, ViewHost};
use relay_storage::{DataStore, PieceSink};
use tracing::debug;

/// Representation refining its source level by level
#[derive(Debug)]
pub struct ProgressiveRepresentation {
    id: RepresentationId,
    state: RepresentationState,
    current_depth: u32,
    target_depth: u32,
    depth_limit: Option<u32>,
    pending_from: Option<u32>,
    clear_pending: bool,
    has_base: bool,
    produced_time: Option<f64>,
    received: usize,
}

impl ProgressiveRepresentation {
    /// Create a hidden representation over a progressive source
    pub fn new(id: RepresentationId, source: SharedSource) -> Self {
        let mut state = RepresentationState::new();
        state.set_input(Some(source));
        ProgressiveRepresentation {
            id,
            state,
            current_depth: 0,
            target_depth: 0,
            depth_limit: None,
            pending_from: None,
            clear_pending: false,
            has_base: false,
            produced_time: None,
            received: 0,
        }
    }

    /// Increments consumed during the last streamed-piece phase
    pub fn received_pieces(&self) -> usize {
        self.received
    }

    fn reset_progress(&mut self) {
        self.current_depth = 0;
        self.target_depth = 0;
        self.pending_from = None;
        self.clear_pending = true;
        self.has_base = false;
    }
}

impl Representation for ProgressiveRepresentation {
    fn id(&self) -> RepresentationId {
        self.id
    }

    fn state(&self) -> &RepresentationState {
        &self.state
    }

    fn state_mut(&mut self) -> &mut RepresentationState {
        &mut self.state
    }

    fn request_data(&mut self, request: &DataRequest, sink: &mut PieceSink<'_>) -> RelayResult<()> {
        let source = match self.state.input() {
            Some(source) => source.clone(),
            None => return Err(RelayError::source(format!("{} has no input", self.id))),
        };
        if self.has_base && self.produced_time.map(f64::to_bits) != request.time.map(f64::to_bits) {
            debug!(target: "relay::streaming", id = %self.id, "Time changed; refinement restarts");
            self.reset_progress();
        }
        if self.clear_pending {
            sink.clear_streamed_pieces()?;
            self.clear_pending = false;
        }
        if !self.has_base {
            let base = source.produce(&request.at_depth(0))?;
            sink.set_piece(base, Fidelity::Full)?;
            self.has_base = true;
            self.produced_time = request.time;
        }
        if let Some(from) = self.pending_from.filter(|from| *from <= self.target_depth) {
            let levels = (from..=self.target_depth)
                .map(|level| source.produce(&request.at_depth(level)))
                .collect::<RelayResult<Vec<_>>>()?;
            let piece = match levels.as_slice() {
                [single] => single.clone(),
                _ => DataObject::merge(levels.iter().map(|level| &**level)).into_handle(),
            };
            sink.set_next_streamed_piece(piece)?;
            debug!(target: "relay::streaming", id = %self.id, from, to = self.target_depth, "Queued refinement levels");
        }
        self.pending_from = None;
        self.current_depth = self.target_depth;
        Ok(())
    }

    fn request_information(&self, info: &mut RepresentationInfo) {
        info.streamable = true;
    }

    fn process_streamed_piece(&mut self, store: &DataStore) -> bool {
        let count = store.streamed_pieces(self.id).len();
        let changed = count != self.received;
        self.received = count;
        changed
    }

    fn as_streaming_mut(&mut self) -> Option<&mut dyn StreamingFacet> {
        Some(self)
    }

    fn add_to_view(&mut self, host: &mut ViewHost) -> RelayResult<()> {
        host.attach(self.id, self.state.is_visible())?;
        host.store_mut().set_streamable(self.id, true)?;
        self.reset_progress();
        self.clear_pending = false;
        self.mark_modified();
        Ok(())
    }
}

impl StreamingFacet for ProgressiveRepresentation {
    fn current_depth(&self) -> u32 {
        self.current_depth
    }

    fn target_depth(&self) -> u32 {
        self.target_depth
    }

    fn max_supported_depth(&self) -> Option<u32> {
        self.state.input().and_then(|source| source.max_depth())
    }

    fn set_depth_limit(&mut self, limit: Option<u32>) {
        self.depth_limit = limit;
    }

    fn depth_limit(&self) -> Option<u32> {
        self.depth_limit
    }

    fn refine(&mut self) -> bool {
        if self.is_refinement_complete() {
            return false;
        }
        self.pending_from.get_or_insert(self.target_depth + 1);
        self.target_depth += 1;
        self.state.mark_modified();
        true
    }

    fn coarsen(&mut self) -> bool {
        if self.target_depth == 0 {
            return false;
        }
        self.target_depth -= 1;
        self.clear_pending = true;
        self.pending_from = (self.target_depth > 0).then_some(self.target_depth);
        self.state.mark_modified();
        true
    }

    fn restart(&mut self) {
        self.reset_progress();
        self.state.mark_modified();
    }
}
