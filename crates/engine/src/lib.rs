//! Request-pass orchestration
//!
//! This crate drives representations through a frame:
//! - Representation contract and its default request-pass driver
//! - CompositeRepresentation: keyed children with one active at a time
//! - GeometryRepresentation: pulls from a pipeline source, caches per key
//! - View: runs the phase sequence once per frame and hands off to rendering
//!
//! The view is the only component that knows about:
//! - Collective ordering across processes
//! - Cache pressure and LOD decisions
//! - The render hand-off

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cache;
pub mod composite;
pub mod facet;
pub mod geometry;
pub mod host;
pub mod phase;
pub mod render;
pub mod representation;
pub mod state;
pub mod view;

pub use cache::CacheKeeper;
pub use composite::CompositeRepresentation;
pub use facet::StreamingFacet;
pub use geometry::GeometryRepresentation;
pub use host::ViewHost;
pub use phase::{PhaseContext, PhaseResponse, RepresentationInfo, RequestPhase, UpdateOutcome};
pub use render::{FrameSummary, NullRenderer, RecordingRenderer, RenderBackend, RenderFrame, RenderItem};
pub use representation::{drive_lod_update, drive_update, Representation};
pub use state::RepresentationState;
pub use view::{FrameReport, View};
