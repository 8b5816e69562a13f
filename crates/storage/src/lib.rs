//! Storage layer for relay
//!
//! This crate holds the geometry each representation has produced for a view:
//! - DataItem: one cached object for one representation at one fidelity
//! - DataStore: full and reduced maps keyed by representation id, plus the
//!   visibility mirror that gates delivery and cache-pressure accounting
//! - DataProducer: always-valid pull handle for downstream consumers
//! - PieceSink: write handle bound to a single representation
//!
//! # Failure semantics
//!
//! Addressing an unregistered representation returns
//! `RelayError::UnknownRepresentation`, is logged, and changes nothing.
//! Teardown races between the GUI and an in-flight render are expected, so
//! none of these paths panic.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod item;
pub mod producer;
pub mod sink;
pub mod store;

pub use item::{DataItem, ItemFlags};
pub use producer::DataProducer;
pub use sink::PieceSink;
pub use store::{DataStore, IdBatch};
