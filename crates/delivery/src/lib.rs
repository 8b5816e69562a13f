//! Collective delivery of stale geometry between processes
//!
//! This crate moves the content of data items according to a move mode:
//! - [`Communicator`]: the collective primitive every process calls in lock-step
//! - [`LocalCommunicator`]: single-process sessions
//! - [`ThreadGroup`]: N in-process ranks backed by threads, for tests and tools
//! - [`DeliveryManager`]: selects stale items, agrees on the batch and moves it

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod communicator;
pub mod group;
pub mod manager;
pub mod moves;

pub use communicator::{Communicator, CommunicatorExt, LocalCommunicator, SharedValue};
pub use group::{GroupCommunicator, ThreadGroup};
pub use manager::{DeliveryManager, DeliveryMetrics, DeliveryReport};
pub use moves::{apply_move, resolve_move_mode};
