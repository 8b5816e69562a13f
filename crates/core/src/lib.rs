//! Core types and traits for relay
//!
//! This crate defines the foundational types shared by every layer of the
//! view/delivery control plane:
//! - RepresentationId / ViewId: stable identities, identical on every process
//! - Fidelity: full-resolution vs. reduced (LOD) geometry
//! - CacheKey: numeric token selecting a cached variant of a representation
//! - MoveMode: how a piece of geometry moves between processes
//! - ModTime: process-wide modification clock gating re-delivery
//! - DataObject / Piece / Bounds: immutable, shared geometry handles
//! - PipelineSource / DataRequest: the upstream pipeline seam
//! - RelayError: error type hierarchy
//! - RelayConfig: `relay.toml` configuration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod data;
pub mod error;
pub mod source;
pub mod time;
pub mod types;

pub use config::{
    CacheConfig, DeliveryConfig, DeliverySelector, RelayConfig, StreamingConfig, CONFIG_FILE_NAME,
};
pub use data::{Bounds, DataHandle, DataObject, Piece};
pub use error::{RelayError, RelayResult};
pub use source::{DataRequest, FnSource, PipelineSource, SharedSource};
pub use time::ModTime;
pub use types::{CacheKey, Fidelity, MoveMode, RepresentationId, ViewId};
