//! Shared test utilities for the scenario suites.
//!
//! Import via `mod common;` from any test's main.rs.

#![allow(dead_code)]

use relay::{
    DataHandle, DataObject, DataRequest, FnSource, GeometryRepresentation, Piece,
    ProgressiveRepresentation, RelayConfig, RelayError, Representation, RepresentationId,
    SharedSource,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Once};

// ============================================================================
// Initialization
// ============================================================================

static INIT_TRACING: Once = Once::new();

/// Route `tracing` output through the test harness writer
///
/// Set `RUST_LOG=relay=debug` to see per-frame events.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

pub fn rid(n: u32) -> RepresentationId {
    RepresentationId::new(n)
}

/// Object of `len` payload bytes originating on `rank`
pub fn object_from(rank: usize, len: usize) -> DataHandle {
    DataObject::single(Piece::new(rank, vec![rank as u8; len])).into_handle()
}

pub fn object(len: usize) -> DataHandle {
    object_from(0, len)
}

// ============================================================================
// Sources
// ============================================================================

/// Source producing `len` bytes per request, counting executions
pub struct CountingSource {
    pub len: usize,
    pub calls: Arc<AtomicU64>,
}

impl CountingSource {
    pub fn new(len: usize) -> Self {
        CountingSource {
            len,
            calls: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn shared(&self) -> SharedSource {
        let len = self.len;
        let calls = Arc::clone(&self.calls);
        FnSource::new(move |request: &DataRequest| {
            calls.fetch_add(1, Ordering::Relaxed);
            let len = if request.low_res { len / 4 } else { len };
            Ok(DataObject::single(Piece::new(request.rank, vec![0u8; len])).into_handle())
        })
        .shared()
    }
}

/// Source whose every request fails
pub fn failing_source() -> SharedSource {
    FnSource::new(|_: &DataRequest| Err(RelayError::source("upstream pipeline failed"))).shared()
}

/// Progressive source producing `16 + depth` bytes, up to `max_depth`
pub fn progressive_source(max_depth: u32) -> SharedSource {
    FnSource::new(|request: &DataRequest| {
        let depth = request.depth.unwrap_or(0) as usize;
        Ok(DataObject::single(Piece::new(request.rank, vec![2u8; 16 + depth])).into_handle())
    })
    .with_max_depth(max_depth)
    .shared()
}

// ============================================================================
// Representations
// ============================================================================

/// Visible geometry representation producing `len` bytes per rank
pub fn geometry(id: u32, len: usize) -> Box<GeometryRepresentation> {
    let mut rep = GeometryRepresentation::new(rid(id), CountingSource::new(len).shared());
    rep.set_visibility(true);
    Box::new(rep)
}

pub fn hidden_geometry(id: u32, len: usize) -> Box<GeometryRepresentation> {
    let mut rep = GeometryRepresentation::new(rid(id), CountingSource::new(len).shared());
    rep.set_visibility(false);
    Box::new(rep)
}

pub fn progressive(id: u32, max_depth: u32) -> Box<ProgressiveRepresentation> {
    let mut rep = ProgressiveRepresentation::new(rid(id), progressive_source(max_depth));
    rep.set_visibility(true);
    Box::new(rep)
}

// ============================================================================
// Configuration
// ============================================================================

pub fn streaming_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.streaming.enabled = true;
    config
}

pub fn config_from(toml: &str) -> RelayConfig {
    match RelayConfig::from_toml_str(toml) {
        Ok(config) => config,
        Err(e) => panic!("invalid test config: {}", e),
    }
}
