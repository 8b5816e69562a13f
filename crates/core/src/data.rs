//! Shared geometry handles
//!
//! A [`DataObject`] is an immutable list of [`Piece`]s stamped with a
//! [`ModTime`]. Objects are shared through [`DataHandle`] (`Arc`), so the
//! data store, the delivery layer and representations hold the same object
//! without copying payloads. Changing data means building a new object, which
//! always carries a newer modification time.

use crate::time::ModTime;
use std::fmt;
use std::sync::Arc;

/// Shared, reference-counted handle to a data object
pub type DataHandle = Arc<DataObject>;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    /// Minimum corner
    pub min: [f64; 3],
    /// Maximum corner
    pub max: [f64; 3],
}

impl Bounds {
    /// The empty box; union identity, never valid
    pub const EMPTY: Bounds = Bounds {
        min: [f64::INFINITY; 3],
        max: [f64::NEG_INFINITY; 3],
    };

    /// Create a box from two corners
    pub const fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Bounds { min, max }
    }

    /// Whether the box encloses at least one point
    pub fn is_valid(&self) -> bool {
        (0..3).all(|axis| self.min[axis] <= self.max[axis])
    }

    /// Smallest box enclosing both
    pub fn union(&self, other: &Bounds) -> Bounds {
        let mut out = *self;
        for axis in 0..3 {
            out.min[axis] = out.min[axis].min(other.min[axis]);
            out.max[axis] = out.max[axis].max(other.max[axis]);
        }
        out
    }

    /// Union of an iterator of boxes; `EMPTY` when there are none
    pub fn union_all<'a>(boxes: impl IntoIterator<Item = &'a Bounds>) -> Bounds {
        boxes
            .into_iter()
            .fold(Bounds::EMPTY, |acc, b| acc.union(b))
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::EMPTY
    }
}

/// One partition of a data object, produced on one process
#[derive(Clone)]
pub struct Piece {
    origin: usize,
    bounds: Option<Bounds>,
    payload: Arc<[u8]>,
}

impl Piece {
    /// Create a piece produced by process `origin`
    pub fn new(origin: usize, payload: impl Into<Arc<[u8]>>) -> Self {
        Piece {
            origin,
            bounds: None,
            payload: payload.into(),
        }
    }

    /// Attach spatial bounds
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = Some(bounds);
        self
    }

    /// Rank of the process that produced this piece
    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Spatial bounds, if known
    pub fn bounds(&self) -> Option<&Bounds> {
        self.bounds.as_ref()
    }

    /// Opaque payload
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Payload size in bytes
    pub fn memory_size(&self) -> u64 {
        self.payload.len() as u64
    }
}

impl fmt::Debug for Piece {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Piece")
            .field("origin", &self.origin)
            .field("bounds", &self.bounds)
            .field("bytes", &self.payload.len())
            .finish()
    }
}

/// Immutable geometry object
#[derive(Debug, Clone)]
pub struct DataObject {
    mtime: ModTime,
    pieces: Vec<Piece>,
}

impl DataObject {
    /// Build an object from pieces, stamped with a fresh modification time
    pub fn new(pieces: Vec<Piece>) -> Self {
        DataObject {
            mtime: ModTime::tick(),
            pieces,
        }
    }

    /// Build a single-piece object
    pub fn single(piece: Piece) -> Self {
        Self::new(vec![piece])
    }

    /// An object with no pieces
    ///
    /// Carries [`ModTime::ZERO`] so it never looks newer than real data.
    pub fn empty() -> Self {
        DataObject {
            mtime: ModTime::ZERO,
            pieces: Vec::new(),
        }
    }

    /// Concatenate the pieces of several objects into a new object
    pub fn merge<'a>(objects: impl IntoIterator<Item = &'a DataObject>) -> Self {
        let pieces = objects
            .into_iter()
            .flat_map(|obj| obj.pieces.iter().cloned())
            .collect();
        Self::new(pieces)
    }

    /// Same pieces, fresh modification time
    ///
    /// Payloads are shared, not copied.
    pub fn shallow_copy(&self) -> Self {
        Self::new(self.pieces.clone())
    }

    /// Wrap in a shared handle
    pub fn into_handle(self) -> DataHandle {
        Arc::new(self)
    }

    /// Modification time stamped at construction
    pub fn modified_time(&self) -> ModTime {
        self.mtime
    }

    /// Pieces in this object
    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Number of pieces
    pub fn piece_count(&self) -> usize {
        self.pieces.len()
    }

    /// Whether the object holds no pieces
    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    /// Byte-size estimate across all pieces
    pub fn memory_size(&self) -> u64 {
        self.pieces.iter().map(Piece::memory_size).sum()
    }

    /// Union of the known piece bounds, if any piece has bounds
    pub fn bounds(&self) -> Option<Bounds> {
        let mut any = false;
        let merged = self.pieces.iter().filter_map(Piece::bounds).fold(
            Bounds::EMPTY,
            |acc, b| {
                any = true;
                acc.union(b)
            },
        );
        any.then_some(merged)
    }
}

impl Default for DataObject {
    fn default() -> Self {
        DataObject::empty()
    }
}
