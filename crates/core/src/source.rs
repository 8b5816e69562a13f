//! Upstream pipeline seam
//!
//! Representations pull geometry from a [`PipelineSource`]. The source is an
//! external collaborator (readers, filters); relay only cares about what is
//! requested and what comes back.

use crate::data::DataHandle;
use crate::error::RelayResult;
use std::fmt;
use std::sync::Arc;

/// Shared handle to a pipeline source
pub type SharedSource = Arc<dyn PipelineSource>;

/// What a representation asks its source to produce
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DataRequest {
    /// Pipeline time, if the representation is time-valid
    pub time: Option<f64>,
    /// Rank of the requesting process
    pub rank: usize,
    /// Number of processes in the session
    pub size: usize,
    /// Requesting reduced (LOD) geometry
    pub low_res: bool,
    /// Refinement depth for progressive sources
    pub depth: Option<u32>,
}

impl DataRequest {
    /// A full-resolution request for one process
    pub fn new(rank: usize, size: usize) -> Self {
        DataRequest {
            time: None,
            rank,
            size,
            low_res: false,
            depth: None,
        }
    }

    /// Set the pipeline time
    pub fn at_time(mut self, time: Option<f64>) -> Self {
        self.time = time;
        self
    }

    /// Request reduced geometry
    pub fn low_res(mut self) -> Self {
        self.low_res = true;
        self
    }

    /// Request a specific refinement depth
    pub fn at_depth(mut self, depth: u32) -> Self {
        self.depth = Some(depth);
        self
    }
}

/// Producer of geometry upstream of a representation
pub trait PipelineSource: Send + Sync {
    /// Execute the upstream pipeline for `request`
    fn produce(&self, request: &DataRequest) -> RelayResult<DataHandle>;

    /// Finest refinement depth the source can produce, if it is progressive
    fn max_depth(&self) -> Option<u32> {
        None
    }
}

/// Pipeline source backed by a closure
pub struct FnSource<F> {
    produce: F,
    max_depth: Option<u32>,
}

impl<F> FnSource<F>
where
    F: Fn(&DataRequest) -> RelayResult<DataHandle> + Send + Sync,
{
    /// Wrap a closure
    pub fn new(produce: F) -> Self {
        FnSource {
            produce,
            max_depth: None,
        }
    }

    /// Declare the source progressive with the given finest depth
    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Wrap into a [`SharedSource`]
    pub fn shared(self) -> SharedSource
    where
        F: 'static,
    {
        Arc::new(self)
    }
}

impl<F> PipelineSource for FnSource<F>
where
    F: Fn(&DataRequest) -> RelayResult<DataHandle> + Send + Sync,
{
    fn produce(&self, request: &DataRequest) -> RelayResult<DataHandle> {
        (self.produce)(request)
    }

    fn max_depth(&self) -> Option<u32> {
        self.max_depth
    }
}

impl<F> fmt::Debug for FnSource<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnSource")
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}
