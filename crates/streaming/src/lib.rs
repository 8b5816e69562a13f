//! Progressive refinement control
//!
//! Streaming commands act on the representation the user is focused on:
//! - [`ActiveSelection`]: the tracked (view, representation) pair
//! - [`StreamingController`]: refine/coarsen/interrupt/restart and the
//!   per-pair lock, depth cap and refinement mode
//! - [`ProgressiveRepresentation`]: a representation that refines by depth
//!   and delivers each level as a streamed piece

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod controller;
pub mod progressive;
pub mod selection;
pub mod state;

pub use controller::{CommandOutcome, IgnoreReason, StreamingController};
pub use progressive::ProgressiveRepresentation;
pub use selection::ActiveSelection;
pub use state::{RefinementMode, StreamingState};
