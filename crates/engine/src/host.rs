//! The part of a view representations attach to
//!
//! Representations hold no back-reference to their view. Attaching goes
//! through a `ViewHost`, which owns the store and the attachment table; the
//! view lends it out alongside the representation map.

use relay_core::{RelayError, RelayResult, RepresentationId, ViewId};
use relay_storage::DataStore;
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// Store plus attachment table of one view
#[derive(Debug)]
pub struct ViewHost {
    view_id: ViewId,
    store: DataStore,
    attached: BTreeSet<RepresentationId>,
}

impl ViewHost {
    /// Create an empty host
    pub fn new(view_id: ViewId) -> Self {
        ViewHost {
            view_id,
            store: DataStore::new(),
            attached: BTreeSet::new(),
        }
    }

    /// Owning view
    pub fn view_id(&self) -> ViewId {
        self.view_id
    }

    /// Register `id` with the store and record the attachment
    ///
    /// # Errors
    ///
    /// `AlreadyRegistered` if `id` is attached already; nothing changes.
    pub fn attach(&mut self, id: RepresentationId, visible: bool) -> RelayResult<()> {
        if !self.attached.insert(id) {
            warn!(target: "relay::view", view = %self.view_id, %id, "Representation already attached");
            return Err(RelayError::AlreadyRegistered(id));
        }
        self.store.register_representation(id, visible);
        debug!(target: "relay::view", view = %self.view_id, %id, visible, "Attached representation");
        Ok(())
    }

    /// Drop the attachment and the store items of `id`
    pub fn detach(&mut self, id: RepresentationId) -> RelayResult<()> {
        if !self.attached.remove(&id) {
            warn!(target: "relay::view", view = %self.view_id, %id, "Representation not attached");
            return Err(RelayError::UnknownRepresentation(id));
        }
        self.store.unregister_representation(id)?;
        debug!(target: "relay::view", view = %self.view_id, %id, "Detached representation");
        Ok(())
    }

    /// Whether `id` is attached
    pub fn is_attached(&self, id: RepresentationId) -> bool {
        self.attached.contains(&id)
    }

    /// Attached ids in ascending order
    pub fn attached_ids(&self) -> impl Iterator<Item = RepresentationId> + '_ {
        self.attached.iter().copied()
    }

    /// Number of attached representations
    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    /// The view's store
    pub fn store(&self) -> &DataStore {
        &self.store
    }

    /// Mutable store
    pub fn store_mut(&mut self) -> &mut DataStore {
        &mut self.store
    }
}
