//! Progressive-refinement capability
//!
//! Representations that refine in depth steps expose this facet through
//! [`Representation::as_streaming_mut`](crate::Representation::as_streaming_mut).
//! Every method only schedules work; data is produced by the next request
//! pass.

/// Depth control of a progressively refined representation
pub trait StreamingFacet {
    /// Depth of the most recently produced level
    fn current_depth(&self) -> u32;

    /// Depth the next pass will produce
    fn target_depth(&self) -> u32;

    /// Finest depth the upstream source can produce, if bounded
    fn max_supported_depth(&self) -> Option<u32>;

    /// Cap further refinement; `None` removes the cap
    ///
    /// Applies to the next refinement step; levels already produced stay.
    fn set_depth_limit(&mut self, limit: Option<u32>);

    /// Current cap
    fn depth_limit(&self) -> Option<u32>;

    /// Whether refining further is not possible under the current cap
    fn is_refinement_complete(&self) -> bool {
        let target = self.target_depth();
        let capped = self.depth_limit().map_or(false, |limit| target >= limit);
        let exhausted = self.max_supported_depth().map_or(false, |max| target >= max);
        capped || exhausted
    }

    /// Schedule the next finer level; `false` if refinement is complete
    fn refine(&mut self) -> bool;

    /// Schedule the next coarser level; `false` at depth zero
    fn coarsen(&mut self) -> bool;

    /// Drop progress and schedule depth zero
    fn restart(&mut self);
}
