//! Pull handle for downstream consumers
//!
//! A producer exists for every registered item from the moment it is
//! registered. Before any data arrives it yields an empty object, so holding a
//! producer says nothing about whether data is present.

use parking_lot::RwLock;
use relay_core::{DataHandle, DataObject};
use std::sync::Arc;

/// Shared slot a data item publishes into
#[derive(Debug, Clone)]
pub struct DataProducer {
    slot: Arc<RwLock<DataHandle>>,
}

impl DataProducer {
    /// Create a producer yielding an empty object
    pub fn new() -> Self {
        DataProducer {
            slot: Arc::new(RwLock::new(DataObject::empty().into_handle())),
        }
    }

    /// Current output
    pub fn output(&self) -> DataHandle {
        self.slot.read().clone()
    }

    /// Whether the current output holds any pieces
    pub fn has_data(&self) -> bool {
        !self.slot.read().is_empty()
    }

    /// Whether two producers share the same slot
    pub fn same_slot(&self, other: &DataProducer) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    pub(crate) fn publish(&self, data: DataHandle) {
        *self.slot.write() = data;
    }
}

impl Default for DataProducer {
    fn default() -> Self {
        Self::new()
    }
}
