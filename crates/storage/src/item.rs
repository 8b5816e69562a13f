//! One cached piece of geometry
//!
//! A `DataItem` separates what the owning representation produced locally
//! from what delivery moved onto this process. Only local production advances
//! the item timestamp; installing a delivered object never does, otherwise
//! every delivery would make the item look stale again.

use crate::producer::DataProducer;
use relay_core::{DataHandle, Fidelity, ModTime, RepresentationId};
use std::sync::Arc;

/// Delivery flags of an item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ItemFlags {
    /// Replicate to every process instead of the view-selected move
    pub always_clone: bool,
    /// May be rebalanced across processes
    pub redistributable: bool,
    /// Receives progressive increments as streamed pieces
    pub streamable: bool,
}

/// Cached geometry for one representation at one fidelity
#[derive(Debug)]
pub struct DataItem {
    owner: RepresentationId,
    fidelity: Fidelity,
    local: Option<DataHandle>,
    delivered: Option<DataHandle>,
    timestamp: ModTime,
    delivered_timestamp: ModTime,
    flags: ItemFlags,
    producer: DataProducer,
    next_streamed: Option<DataHandle>,
    streamed: Vec<DataHandle>,
}

impl DataItem {
    /// Create an empty item
    pub fn new(owner: RepresentationId, fidelity: Fidelity) -> Self {
        DataItem {
            owner,
            fidelity,
            local: None,
            delivered: None,
            timestamp: ModTime::ZERO,
            delivered_timestamp: ModTime::ZERO,
            flags: ItemFlags::default(),
            producer: DataProducer::new(),
            next_streamed: None,
            streamed: Vec::new(),
        }
    }

    /// Owning representation
    pub fn owner(&self) -> RepresentationId {
        self.owner
    }

    /// Fidelity of this item
    pub fn fidelity(&self) -> Fidelity {
        self.fidelity
    }

    /// Freshness timestamp of the local data
    pub fn timestamp(&self) -> ModTime {
        self.timestamp
    }

    /// Item timestamp at the last completed delivery
    pub fn delivered_timestamp(&self) -> ModTime {
        self.delivered_timestamp
    }

    /// Whether local data changed since it was last delivered
    pub fn is_stale(&self) -> bool {
        self.timestamp.is_newer_than(self.delivered_timestamp)
    }

    /// Locally produced data
    pub fn local_data(&self) -> Option<&DataHandle> {
        self.local.as_ref()
    }

    /// Result of the last delivery
    pub fn delivered_data(&self) -> Option<&DataHandle> {
        self.delivered.as_ref()
    }

    /// Byte-size estimate of the local data
    pub fn memory_size(&self) -> u64 {
        self.local.as_ref().map_or(0, |d| d.memory_size())
    }

    /// Delivery flags
    pub fn flags(&self) -> ItemFlags {
        self.flags
    }

    pub(crate) fn flags_mut(&mut self) -> &mut ItemFlags {
        &mut self.flags
    }

    /// Pull handle for downstream consumers
    pub fn producer(&self) -> &DataProducer {
        &self.producer
    }

    /// Replace the local data if `data` is a material change
    ///
    /// A material change is a different object whose modification time is
    /// newer than the stored timestamp. Returns whether the item changed.
    pub fn set_data(&mut self, data: DataHandle) -> bool {
        if let Some(current) = &self.local {
            if Arc::ptr_eq(current, &data) {
                return false;
            }
        }
        if !data.modified_time().is_newer_than(self.timestamp) {
            return false;
        }
        self.timestamp = data.modified_time();
        self.local = Some(data);
        self.refresh_producer();
        true
    }

    /// Install the result of a delivery
    ///
    /// `as_of` is the item timestamp the moved data corresponds to.
    pub fn set_delivered(&mut self, data: DataHandle, as_of: ModTime) {
        self.delivered = Some(data);
        if as_of > self.delivered_timestamp {
            self.delivered_timestamp = as_of;
        }
        self.refresh_producer();
    }

    /// Queue the next progressive increment
    pub fn set_next_streamed(&mut self, piece: DataHandle) {
        self.next_streamed = Some(piece);
    }

    /// Whether an increment is waiting for delivery
    pub fn has_pending_streamed(&self) -> bool {
        self.next_streamed.is_some()
    }

    /// Pending increment, left in place
    pub fn pending_streamed(&self) -> Option<&DataHandle> {
        self.next_streamed.as_ref()
    }

    /// Append a delivered increment and drop the pending one
    pub fn push_streamed(&mut self, piece: DataHandle) {
        self.next_streamed = None;
        self.streamed.push(piece);
    }

    /// Most recently delivered increment
    pub fn current_streamed(&self) -> Option<&DataHandle> {
        self.streamed.last()
    }

    /// All delivered increments, oldest first
    pub fn streamed(&self) -> &[DataHandle] {
        &self.streamed
    }

    /// Drop pending and delivered increments
    pub fn clear_streamed(&mut self) {
        self.next_streamed = None;
        self.streamed.clear();
    }

    fn refresh_producer(&self) {
        if let Some(data) = self.delivered.as_ref().or(self.local.as_ref()) {
            self.producer.publish(data.clone());
        }
    }
}
