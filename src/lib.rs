//! Relay - request-pass orchestration and cached data delivery for
//! distributed rendering views
//!
//! A [`View`] owns a set of representations and runs them through an ordered
//! request pass once per frame. Representations publish geometry into a
//! per-view [`DataStore`]; the [`DeliveryManager`] moves stale items between
//! processes according to the frame's [`MoveMode`] and hands the result to a
//! [`RenderBackend`].
//!
//! # Quick Start
//!
//! ```ignore
//! use relay::{FnSource, GeometryRepresentation, RelayConfig, RepresentationId, View, ViewId};
//!
//! let source = FnSource::new(|request| produce_geometry(request)).shared();
//! let mut rep = GeometryRepresentation::new(RepresentationId::new(1), source);
//! rep.set_visibility(true);
//!
//! let mut view = View::local(ViewId::new(1), RelayConfig::default());
//! view.add_representation(Box::new(rep))?;
//! let report = view.update();
//! ```
//!
//! # Architecture
//!
//! - `relay-core`: identities, data handles, the modification clock, config
//! - `relay-storage`: the data store and its items
//! - `relay-delivery`: communicators and the delivery manager
//! - `relay-engine`: representations, composites, the view
//! - `relay-streaming`: progressive refinement commands

pub use relay_core::*;
pub use relay_delivery::{
    Communicator, CommunicatorExt, DeliveryManager, DeliveryMetrics, DeliveryReport,
    GroupCommunicator, LocalCommunicator, ThreadGroup,
};
pub use relay_engine::{
    CacheKeeper, CompositeRepresentation, FrameReport, FrameSummary, GeometryRepresentation,
    NullRenderer, RecordingRenderer, RenderBackend, RenderFrame, RenderItem, Representation,
    RepresentationInfo, RepresentationState, RequestPhase, StreamingFacet, UpdateOutcome, View,
    ViewHost,
};
pub use relay_storage::{DataItem, DataProducer, DataStore, ItemFlags, PieceSink};
pub use relay_streaming::{
    ActiveSelection, CommandOutcome, IgnoreReason, ProgressiveRepresentation, RefinementMode,
    StreamingController, StreamingState,
};
