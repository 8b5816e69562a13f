//! Hand-off to the rendering backend
//!
//! Drawing is outside relay. After delivery the view assembles a
//! [`RenderFrame`] from the producers of visible items and passes it to a
//! [`RenderBackend`] on every process that renders in the frame's move mode.

use parking_lot::Mutex;
use relay_core::{Bounds, DataHandle, Fidelity, MoveMode, RepresentationId, ViewId};
use std::fmt::Debug;
use std::sync::Arc;

/// One visible representation as it should be drawn
#[derive(Debug, Clone)]
pub struct RenderItem {
    /// Representation id
    pub id: RepresentationId,
    /// Fidelity of `data`
    pub fidelity: Fidelity,
    /// Delivered geometry
    pub data: DataHandle,
    /// Delivered progressive increments, oldest first
    pub streamed: Vec<DataHandle>,
}

/// Everything a backend needs to draw one frame
#[derive(Debug, Clone)]
pub struct RenderFrame {
    /// Originating view
    pub view: ViewId,
    /// Frame counter of the view
    pub frame: u64,
    /// Rank of the rendering process
    pub rank: usize,
    /// Move mode the data was delivered with
    pub mode: MoveMode,
    /// Global scene extent
    pub bounds: Bounds,
    /// Visible items
    pub items: Vec<RenderItem>,
}

impl RenderFrame {
    /// Bytes of geometry in the frame, increments included
    pub fn memory_size(&self) -> u64 {
        self.items
            .iter()
            .map(|item| item.data.memory_size() + item.streamed.iter().map(|s| s.memory_size()).sum::<u64>())
            .sum()
    }

    /// Whether nothing is drawn
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Rendering backend
pub trait RenderBackend: Send + Debug {
    /// Draw a frame
    fn render(&mut self, frame: &RenderFrame);
}

/// Backend that draws nothing
#[derive(Debug, Default)]
pub struct NullRenderer;

impl RenderBackend for NullRenderer {
    fn render(&mut self, _frame: &RenderFrame) {}
}

/// What a [`RecordingRenderer`] keeps of each frame
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSummary {
    /// Frame counter
    pub frame: u64,
    /// Rendering rank
    pub rank: usize,
    /// Move mode
    pub mode: MoveMode,
    /// Drawn ids with their fidelity
    pub items: Vec<(RepresentationId, Fidelity)>,
    /// Bytes drawn
    pub bytes: u64,
    /// Streamed increments drawn
    pub streamed: usize,
}

/// Backend that records a summary of every frame it receives
///
/// Clones share the same log, so a caller can keep one clone and hand the
/// other to a view.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    log: Arc<Mutex<Vec<FrameSummary>>>,
}

impl RecordingRenderer {
    /// Create a recorder with an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames recorded so far
    pub fn frames(&self) -> Vec<FrameSummary> {
        self.log.lock().clone()
    }

    /// Most recent frame
    pub fn last(&self) -> Option<FrameSummary> {
        self.log.lock().last().cloned()
    }

    /// Number of frames recorded
    pub fn count(&self) -> usize {
        self.log.lock().len()
    }
}

impl RenderBackend for RecordingRenderer {
    fn render(&mut self, frame: &RenderFrame) {
        let summary = FrameSummary {
            frame: frame.frame,
            rank: frame.rank,
            mode: frame.mode,
            items: frame.items.iter().map(|item| (item.id, item.fidelity)).collect(),
            bytes: frame.memory_size(),
            streamed: frame.items.iter().map(|item| item.streamed.len()).sum(),
        };
        self.log.lock().push(summary);
    }
}
