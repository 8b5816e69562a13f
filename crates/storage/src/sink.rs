//! Write handle bound to one representation
//!
//! Representations never address the store by id themselves; the view hands
//! each one a sink for its own id, so a representation cannot overwrite
//! another representation's items.

use crate::store::DataStore;
use relay_core::{DataHandle, Fidelity, RelayResult, RepresentationId};

/// Store access scoped to a single representation
#[derive(Debug)]
pub struct PieceSink<'a> {
    store: &'a mut DataStore,
    id: RepresentationId,
}

impl<'a> PieceSink<'a> {
    pub(crate) fn new(store: &'a mut DataStore, id: RepresentationId) -> Self {
        PieceSink { store, id }
    }

    /// Representation this sink writes for
    pub fn id(&self) -> RepresentationId {
        self.id
    }

    /// Publish geometry at a fidelity; see [`DataStore::set_piece`]
    pub fn set_piece(&mut self, data: DataHandle, fidelity: Fidelity) -> RelayResult<bool> {
        self.store.set_piece(self.id, data, fidelity)
    }

    /// Queue a progressive increment
    pub fn set_next_streamed_piece(&mut self, piece: DataHandle) -> RelayResult<()> {
        self.store.set_next_streamed_piece(self.id, piece)
    }

    /// Drop accumulated increments
    pub fn clear_streamed_pieces(&mut self) -> RelayResult<()> {
        self.store.clear_streamed_pieces(self.id)
    }

    /// Most recently delivered increment
    pub fn current_streamed_piece(&self) -> Option<DataHandle> {
        self.store.current_streamed_piece(self.id)
    }

    /// Whether this representation published data at a fidelity
    pub fn has_data(&self, fidelity: Fidelity) -> bool {
        self.store
            .item(self.id, fidelity)
            .is_some_and(|item| item.local_data().is_some())
    }

    /// Byte size of this representation's local data at a fidelity
    pub fn memory_size(&self, fidelity: Fidelity) -> u64 {
        self.store
            .item(self.id, fidelity)
            .map_or(0, |item| item.memory_size())
    }
}
