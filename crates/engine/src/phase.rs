//! Request-pass phases and what flows through them

use relay_core::{Bounds, DataRequest, RepresentationId};
use relay_storage::{DataStore, PieceSink};
use std::fmt;

/// One step of the per-frame request pass
///
/// Listed in execution order. Every phase runs for the whole batch of
/// representations before the next phase starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RequestPhase {
    /// Refresh underlying data
    Update,
    /// Publish sizes, extents and delivery flags
    Information,
    /// Produce reduced geometry; only on frames that use LOD
    UpdateLod,
    /// Recompute cheap render-adjacent state
    PrepareForRender,
    /// Data moves between processes; no representation action
    Delivery,
    /// Consume newly delivered progressive increments
    ProcessStreamedPiece,
    /// Draw
    Render,
}

impl RequestPhase {
    /// Every phase in execution order
    pub const SEQUENCE: [RequestPhase; 7] = [
        RequestPhase::Update,
        RequestPhase::Information,
        RequestPhase::UpdateLod,
        RequestPhase::PrepareForRender,
        RequestPhase::Delivery,
        RequestPhase::ProcessStreamedPiece,
        RequestPhase::Render,
    ];

    /// Phase name for logs
    pub const fn name(&self) -> &'static str {
        match self {
            RequestPhase::Update => "update",
            RequestPhase::Information => "information",
            RequestPhase::UpdateLod => "update-lod",
            RequestPhase::PrepareForRender => "prepare-for-render",
            RequestPhase::Delivery => "delivery",
            RequestPhase::ProcessStreamedPiece => "process-streamed-piece",
            RequestPhase::Render => "render",
        }
    }
}

impl fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of an update step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Not dirty; nothing ran
    Unchanged,
    /// Data was produced
    Updated,
    /// A cached artifact was reused; the upstream pipeline did not run
    Cached,
    /// Data preparation failed; the representation stays dirty
    Failed(String),
}

impl UpdateOutcome {
    /// Whether the step failed
    pub fn is_failure(&self) -> bool {
        matches!(self, UpdateOutcome::Failed(_))
    }
}

/// Answer of a representation to one phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PhaseResponse {
    /// The representation skipped the phase (hidden, or nothing active)
    NotHandled,
    /// The phase ran
    Handled,
    /// An update step ran with the given outcome
    Update(UpdateOutcome),
}

/// Metadata published during the information phase
#[derive(Debug, Clone, PartialEq)]
pub struct RepresentationInfo {
    /// Representation the metadata belongs to
    pub id: RepresentationId,
    /// Byte size of the local full-resolution data
    pub data_size: u64,
    /// Byte size of the local reduced data
    pub lod_size: u64,
    /// Local spatial extent
    pub bounds: Option<Bounds>,
    /// Replicate to every process
    pub always_clone: bool,
    /// May be rebalanced across processes
    pub redistributable: bool,
    /// Delivers progressive increments
    pub streamable: bool,
}

impl RepresentationInfo {
    /// Empty metadata for `id`
    pub fn new(id: RepresentationId) -> Self {
        RepresentationInfo {
            id,
            data_size: 0,
            lod_size: 0,
            bounds: None,
            always_clone: false,
            redistributable: false,
            streamable: false,
        }
    }
}

/// What a representation sees while handling a phase
///
/// Wraps the view's store for the duration of one phase broadcast and
/// collects the metadata representations publish.
#[derive(Debug)]
pub struct PhaseContext<'a> {
    store: &'a mut DataStore,
    rank: usize,
    size: usize,
    infos: Vec<RepresentationInfo>,
}

impl<'a> PhaseContext<'a> {
    /// Create a context for one phase broadcast
    pub fn new(store: &'a mut DataStore, rank: usize, size: usize) -> Self {
        PhaseContext {
            store,
            rank,
            size,
            infos: Vec::new(),
        }
    }

    /// Read access to the store
    pub fn store(&self) -> &DataStore {
        &*self.store
    }

    /// Write handle for one representation
    pub fn sink(&mut self, id: RepresentationId) -> PieceSink<'_> {
        self.store.sink(id)
    }

    /// Rank of this process
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of processes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Upstream request for this process at `time`
    pub fn request(&self, time: Option<f64>) -> DataRequest {
        DataRequest::new(self.rank, self.size).at_time(time)
    }

    /// Record metadata from the information phase
    pub fn publish_info(&mut self, info: RepresentationInfo) {
        self.infos.push(info);
    }

    /// Metadata recorded so far
    pub fn infos(&self) -> &[RepresentationInfo] {
        &self.infos
    }

    /// Take the recorded metadata
    pub fn take_infos(&mut self) -> Vec<RepresentationInfo> {
        std::mem::take(&mut self.infos)
    }
}
