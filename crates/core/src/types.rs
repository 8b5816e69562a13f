//! Identity and small value types
//!
//! Identities are plain integers chosen by the caller. Collective calls compare
//! them across processes, so every process must create views and
//! representations in the same order with the same ids.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Stable identity of a representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RepresentationId(u32);

impl RepresentationId {
    /// Create an id from its raw value
    pub const fn new(raw: u32) -> Self {
        RepresentationId(raw)
    }

    /// Raw value
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for RepresentationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "repr#{}", self.0)
    }
}

/// Stable identity of a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ViewId(u32);

impl ViewId {
    /// Create an id from its raw value
    pub const fn new(raw: u32) -> Self {
        ViewId(raw)
    }

    /// Raw value
    #[inline]
    pub const fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ViewId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "view#{}", self.0)
    }
}

/// Geometry fidelity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Fidelity {
    /// Full-resolution geometry
    Full,
    /// Reduced (level-of-detail) geometry
    Lod,
}

impl Fidelity {
    /// Both fidelities, in delivery order (full before LOD)
    pub const ALL: [Fidelity; 2] = [Fidelity::Full, Fidelity::Lod];

    /// Map the `low_res` flag used by callers onto a fidelity
    #[inline]
    pub const fn from_low_res(low_res: bool) -> Self {
        if low_res {
            Fidelity::Lod
        } else {
            Fidelity::Full
        }
    }

    /// Whether this is the reduced fidelity
    #[inline]
    pub const fn is_low_res(&self) -> bool {
        matches!(self, Fidelity::Lod)
    }

    /// Dense index for per-fidelity arrays
    #[inline]
    pub const fn index(&self) -> usize {
        match self {
            Fidelity::Full => 0,
            Fidelity::Lod => 1,
        }
    }
}

impl fmt::Display for Fidelity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fidelity::Full => f.write_str("full"),
            Fidelity::Lod => f.write_str("lod"),
        }
    }
}

/// Numeric token identifying a cached variant, usually an animation time
///
/// Compares by total order on the underlying `f64` so it can key ordered
/// maps; `-0.0` and `0.0` are distinct keys.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CacheKey(f64);

impl CacheKey {
    /// Create a key
    pub const fn new(value: f64) -> Self {
        CacheKey(value)
    }

    /// Underlying value
    #[inline]
    pub const fn value(&self) -> f64 {
        self.0
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.to_bits() == other.0.to_bits()
    }
}

impl Eq for CacheKey {}

impl PartialOrd for CacheKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for CacheKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

impl From<f64> for CacheKey {
    fn from(value: f64) -> Self {
        CacheKey(value)
    }
}

/// How a data item moves between processes during delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MoveMode {
    /// Leave data where it was produced
    PassThrough,
    /// Gather every process's pieces onto the root process
    CollectToRoot,
    /// Replicate every process's pieces onto every process
    CloneToAll,
    /// Gather all pieces, then deal them out round-robin across processes
    Redistribute,
}

impl MoveMode {
    /// Whether the move exchanges data between processes
    #[inline]
    pub const fn is_collective(&self) -> bool {
        !matches!(self, MoveMode::PassThrough)
    }

    /// Whether the process with `rank` renders data moved with this mode
    pub const fn renders_on(&self, rank: usize) -> bool {
        match self {
            MoveMode::CollectToRoot => rank == 0,
            MoveMode::PassThrough | MoveMode::CloneToAll | MoveMode::Redistribute => true,
        }
    }
}

impl fmt::Display for MoveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MoveMode::PassThrough => "pass-through",
            MoveMode::CollectToRoot => "collect",
            MoveMode::CloneToAll => "clone",
            MoveMode::Redistribute => "redistribute",
        };
        f.write_str(name)
    }
}
