//! The tracked streaming target
//!
//! A plain value owned by whoever adapts UI selection events. Streaming
//! commands only read it, so a command can never change what it acts on.

use relay_core::{RepresentationId, ViewId};
use relay_engine::View;
use tracing::debug;

/// The (view, representation) pair streaming commands apply to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActiveSelection {
    tracked: Option<(ViewId, RepresentationId)>,
}

impl ActiveSelection {
    /// Nothing tracked
    pub const fn new() -> Self {
        ActiveSelection { tracked: None }
    }

    /// Track a pair unconditionally
    pub fn track(&mut self, view: ViewId, representation: RepresentationId) {
        self.tracked = Some((view, representation));
    }

    /// Stop tracking
    pub fn clear(&mut self) {
        self.tracked = None;
    }

    /// Tracked pair
    pub fn tracked(&self) -> Option<(ViewId, RepresentationId)> {
        self.tracked
    }

    /// Whether `view` is the tracked view
    pub fn is_tracking(&self, view: ViewId) -> bool {
        self.tracked.map_or(false, |(tracked, _)| tracked == view)
    }

    /// Selection-change handler
    ///
    /// Tracks the pair only if the view supports streaming and the
    /// representation exposes the refinement facet; otherwise clears.
    /// Returns whether something is tracked afterwards.
    pub fn on_selection_changed(&mut self, view: Option<&mut View>, representation: Option<RepresentationId>) -> bool {
        self.tracked = match (view, representation) {
            (Some(view), Some(id)) if view.supports_streaming() => {
                let refinable = view.streaming_facet(id).is_some();
                refinable.then(|| (view.id(), id))
            }
            _ => None,
        };
        debug!(target: "relay::streaming", tracked = ?self.tracked, "Selection changed");
        self.tracked.is_some()
    }
}
