//! Per-view geometry store
//!
//! Two independent maps (full, reduced) from representation id to
//! [`DataItem`], plus a visibility mirror. The owning view refreshes the mirror
//! before every frame; visibility is therefore evaluated when delivery runs,
//! not when data was produced.
//!
//! # Design
//!
//! - FxHashMap: O(1) lookups keyed by small integer ids
//! - Registration creates both the full and the reduced item; the reduced one
//!   stays empty for representations that never produce LOD geometry
//! - Id batches are returned sorted so every process walks them in the same
//!   order

use crate::item::{DataItem, ItemFlags};
use crate::producer::DataProducer;
use crate::sink::PieceSink;
use relay_core::{DataHandle, Fidelity, ModTime, RelayError, RelayResult, RepresentationId};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, warn};

/// Sorted batch of representation ids
pub type IdBatch = SmallVec<[RepresentationId; 8]>;

/// Geometry store owned by one view
#[derive(Debug, Default)]
pub struct DataStore {
    full: FxHashMap<RepresentationId, DataItem>,
    lod: FxHashMap<RepresentationId, DataItem>,
    visibility: FxHashMap<RepresentationId, bool>,
}

impl DataStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    fn map(&self, fidelity: Fidelity) -> &FxHashMap<RepresentationId, DataItem> {
        match fidelity {
            Fidelity::Full => &self.full,
            Fidelity::Lod => &self.lod,
        }
    }

    fn map_mut(&mut self, fidelity: Fidelity) -> &mut FxHashMap<RepresentationId, DataItem> {
        match fidelity {
            Fidelity::Full => &mut self.full,
            Fidelity::Lod => &mut self.lod,
        }
    }

    fn unknown(id: RepresentationId, op: &'static str) -> RelayError {
        warn!(target: "relay::store", %id, op, "Representation is not registered");
        RelayError::UnknownRepresentation(id)
    }

    fn item_mut(&mut self, id: RepresentationId, fidelity: Fidelity, op: &'static str) -> RelayResult<&mut DataItem> {
        match self.map_mut(fidelity).get_mut(&id) {
            Some(item) => Ok(item),
            None => Err(Self::unknown(id, op)),
        }
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Create empty items for `id`
    ///
    /// Idempotent: registering an id twice keeps the existing items and
    /// returns `false`.
    pub fn register_representation(&mut self, id: RepresentationId, visible: bool) -> bool {
        if self.visibility.contains_key(&id) {
            debug!(target: "relay::store", %id, "Ignoring redundant registration");
            return false;
        }
        self.full.insert(id, DataItem::new(id, Fidelity::Full));
        self.lod.insert(id, DataItem::new(id, Fidelity::Lod));
        self.visibility.insert(id, visible);
        debug!(target: "relay::store", %id, visible, "Registered representation");
        true
    }

    /// Remove every item owned by `id`
    ///
    /// # Errors
    ///
    /// `UnknownRepresentation` if `id` was never registered.
    pub fn unregister_representation(&mut self, id: RepresentationId) -> RelayResult<()> {
        if self.visibility.remove(&id).is_none() {
            return Err(Self::unknown(id, "unregister"));
        }
        self.full.remove(&id);
        self.lod.remove(&id);
        debug!(target: "relay::store", %id, "Unregistered representation");
        Ok(())
    }

    /// Whether `id` is registered
    pub fn is_registered(&self, id: RepresentationId) -> bool {
        self.visibility.contains_key(&id)
    }

    /// Registered ids, sorted
    pub fn registered_ids(&self) -> Vec<RepresentationId> {
        let mut ids: Vec<RepresentationId> = self.visibility.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of items at a fidelity
    pub fn item_count(&self, fidelity: Fidelity) -> usize {
        self.map(fidelity).len()
    }

    // =========================================================================
    // Visibility
    // =========================================================================

    /// Mirror the owning representation's visibility
    ///
    /// Returns whether the stored value changed.
    pub fn set_visibility(&mut self, id: RepresentationId, visible: bool) -> RelayResult<bool> {
        match self.visibility.get_mut(&id) {
            Some(current) => {
                let changed = *current != visible;
                *current = visible;
                Ok(changed)
            }
            None => Err(Self::unknown(id, "set_visibility")),
        }
    }

    /// Mirrored visibility; unregistered ids are invisible
    pub fn is_visible(&self, id: RepresentationId) -> bool {
        self.visibility.get(&id).copied().unwrap_or(false)
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Replace the content of an item if `data` is newer than what it holds
    ///
    /// Returns whether the item changed; pushing the same or an older object
    /// is a no-op.
    pub fn set_piece(&mut self, id: RepresentationId, data: DataHandle, fidelity: Fidelity) -> RelayResult<bool> {
        let item = self.item_mut(id, fidelity, "set_piece")?;
        let changed = item.set_data(data);
        if changed {
            debug!(
                target: "relay::store",
                %id,
                %fidelity,
                timestamp = %item.timestamp(),
                bytes = item.memory_size(),
                "Stored new piece"
            );
        }
        Ok(changed)
    }

    /// Pull handle for an item
    ///
    /// Valid even before the first `set_piece`; it then yields empty data.
    pub fn get_producer(&self, id: RepresentationId, fidelity: Fidelity) -> RelayResult<DataProducer> {
        match self.map(fidelity).get(&id) {
            Some(item) => Ok(item.producer().clone()),
            None => Err(Self::unknown(id, "get_producer")),
        }
    }

    /// Item for `id` at a fidelity
    pub fn item(&self, id: RepresentationId, fidelity: Fidelity) -> Option<&DataItem> {
        self.map(fidelity).get(&id)
    }

    /// Write handle bound to one representation
    pub fn sink(&mut self, id: RepresentationId) -> PieceSink<'_> {
        PieceSink::new(self, id)
    }

    /// Sum of byte sizes over items whose representation is visible
    pub fn visible_data_size(&self, fidelity: Fidelity) -> u64 {
        self.map(fidelity)
            .iter()
            .filter(|(id, _)| self.is_visible(**id))
            .map(|(_, item)| item.memory_size())
            .sum()
    }

    // =========================================================================
    // Delivery bookkeeping
    // =========================================================================

    /// Visible ids whose item changed after `watermark` and since its last delivery
    pub fn needs_delivery(&self, watermark: ModTime, fidelity: Fidelity) -> IdBatch {
        let mut ids: IdBatch = self
            .map(fidelity)
            .iter()
            .filter(|(id, item)| {
                self.is_visible(**id) && item.timestamp().is_newer_than(watermark) && item.is_stale()
            })
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Subset of `ids` that is registered and stale, sorted and deduplicated
    pub fn stale_among(&self, ids: &[RepresentationId], fidelity: Fidelity) -> IdBatch {
        let map = self.map(fidelity);
        let mut stale: IdBatch = ids
            .iter()
            .copied()
            .filter(|id| map.get(id).map_or(false, DataItem::is_stale))
            .collect();
        stale.sort_unstable();
        stale.dedup();
        stale
    }

    /// Oldest timestamp among items not yet delivered, visible or not
    pub fn oldest_stale_timestamp(&self, fidelity: Fidelity) -> Option<ModTime> {
        self.map(fidelity)
            .values()
            .filter(|item| item.is_stale())
            .map(DataItem::timestamp)
            .min()
    }

    /// Install a delivered object
    ///
    /// Only the delivery layer calls this; representations write through
    /// [`PieceSink`].
    pub fn set_delivered(
        &mut self,
        id: RepresentationId,
        fidelity: Fidelity,
        data: DataHandle,
        as_of: ModTime,
    ) -> RelayResult<()> {
        self.item_mut(id, fidelity, "set_delivered")?.set_delivered(data, as_of);
        Ok(())
    }

    // =========================================================================
    // Flags
    // =========================================================================

    fn update_flags(&mut self, id: RepresentationId, op: &'static str, f: impl Fn(&mut ItemFlags)) -> RelayResult<()> {
        if !self.is_registered(id) {
            return Err(Self::unknown(id, op));
        }
        for fidelity in Fidelity::ALL {
            if let Some(item) = self.map_mut(fidelity).get_mut(&id) {
                f(item.flags_mut());
            }
        }
        Ok(())
    }

    /// Force full replication of this representation's items
    pub fn set_always_clone(&mut self, id: RepresentationId, value: bool) -> RelayResult<()> {
        self.update_flags(id, "set_always_clone", |flags| flags.always_clone = value)
    }

    /// Allow the items to be rebalanced across processes
    pub fn set_redistributable(&mut self, id: RepresentationId, value: bool) -> RelayResult<()> {
        self.update_flags(id, "set_redistributable", |flags| flags.redistributable = value)
    }

    /// Accept progressive increments for this representation
    pub fn set_streamable(&mut self, id: RepresentationId, value: bool) -> RelayResult<()> {
        self.update_flags(id, "set_streamable", |flags| flags.streamable = value)
    }

    /// Delivery flags of an item
    pub fn flags(&self, id: RepresentationId, fidelity: Fidelity) -> Option<ItemFlags> {
        self.item(id, fidelity).map(DataItem::flags)
    }

    // =========================================================================
    // Streamed pieces
    // =========================================================================

    /// Queue the next progressive increment for a streamable representation
    ///
    /// # Errors
    ///
    /// `UnknownRepresentation` if not registered, `InvalidOperation` if the
    /// item is not streamable.
    pub fn set_next_streamed_piece(&mut self, id: RepresentationId, piece: DataHandle) -> RelayResult<()> {
        let item = self.item_mut(id, Fidelity::Full, "set_next_streamed_piece")?;
        if !item.flags().streamable {
            warn!(target: "relay::store", %id, "Streamed piece for a non-streamable representation");
            return Err(RelayError::invalid_operation(format!(
                "{} is not streamable",
                id
            )));
        }
        item.set_next_streamed(piece);
        Ok(())
    }

    /// Visible ids with an increment waiting for delivery, sorted
    pub fn pending_streamed_ids(&self) -> IdBatch {
        let mut ids: IdBatch = self
            .full
            .iter()
            .filter(|(id, item)| self.is_visible(**id) && item.has_pending_streamed())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Pending increment for `id`
    pub fn pending_streamed_piece(&self, id: RepresentationId) -> Option<DataHandle> {
        self.full.get(&id).and_then(|item| item.pending_streamed().cloned())
    }

    /// Record a delivered increment
    pub fn push_streamed_piece(&mut self, id: RepresentationId, piece: DataHandle) -> RelayResult<()> {
        self.item_mut(id, Fidelity::Full, "push_streamed_piece")?.push_streamed(piece);
        Ok(())
    }

    /// Most recently delivered increment
    pub fn current_streamed_piece(&self, id: RepresentationId) -> Option<DataHandle> {
        self.full.get(&id).and_then(|item| item.current_streamed().cloned())
    }

    /// Every delivered increment, oldest first
    pub fn streamed_pieces(&self, id: RepresentationId) -> Vec<DataHandle> {
        self.full
            .get(&id)
            .map(|item| item.streamed().to_vec())
            .unwrap_or_default()
    }

    /// Drop accumulated increments
    pub fn clear_streamed_pieces(&mut self, id: RepresentationId) -> RelayResult<()> {
        self.item_mut(id, Fidelity::Full, "clear_streamed_pieces")?.clear_streamed();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{DataObject, Piece};

    fn rid(n: u32) -> RepresentationId {
        RepresentationId::new(n)
    }

    fn object(len: usize) -> DataHandle {
        DataObject::single(Piece::new(0, vec![0u8; len])).into_handle()
    }

    #[test]
    fn test_registration_is_idempotent() {
        let mut store = DataStore::new();
        assert!(store.register_representation(rid(1), true));
        assert!(!store.register_representation(rid(1), false));
        assert_eq!(store.item_count(Fidelity::Full), 1);
        assert_eq!(store.item_count(Fidelity::Lod), 1);
        // redundant registration does not alter the mirror either
        assert!(store.is_visible(rid(1)));
    }

    #[test]
    fn test_unregister_unknown_is_error() {
        let mut store = DataStore::new();
        let err = store.unregister_representation(rid(9)).unwrap_err();
        assert!(err.is_unknown_representation());
    }

    #[test]
    fn test_unregister_removes_both_fidelities() {
        let mut store = DataStore::new();
        store.register_representation(rid(1), true);
        store.set_piece(rid(1), object(5), Fidelity::Lod).unwrap();
        store.unregister_representation(rid(1)).unwrap();
        assert_eq!(store.item_count(Fidelity::Full), 0);
        assert_eq!(store.item_count(Fidelity::Lod), 0);
        assert!(store.get_producer(rid(1), Fidelity::Full).is_err());
    }

    #[test]
    fn test_set_piece_unknown_is_noop() {
        let mut store = DataStore::new();
        assert!(store.set_piece(rid(3), object(1), Fidelity::Full).is_err());
        assert_eq!(store.item_count(Fidelity::Full), 0);
    }

    #[test]
    fn test_producer_valid_before_data() {
        let mut store = DataStore::new();
        store.register_representation(rid(1), true);
        let producer = store.get_producer(rid(1), Fidelity::Lod).unwrap();
        assert!(!producer.has_data());
        store.set_piece(rid(1), object(12), Fidelity::Lod).unwrap();
        assert!(producer.has_data());
    }

    #[test]
    fn test_visible_data_size_counts_visible_only() {
        let mut store = DataStore::new();
        store.register_representation(rid(1), true);
        store.register_representation(rid(2), false);
        assert_eq!(store.visible_data_size(Fidelity::Full), 0);

        store.set_piece(rid(1), object(100), Fidelity::Full).unwrap();
        assert_eq!(store.visible_data_size(Fidelity::Full), 100);

        store.set_piece(rid(2), object(50), Fidelity::Full).unwrap();
        assert_eq!(store.visible_data_size(Fidelity::Full), 100);

        store.set_visibility(rid(2), true).unwrap();
        assert_eq!(store.visible_data_size(Fidelity::Full), 150);
        assert_eq!(store.visible_data_size(Fidelity::Lod), 0);
    }

    #[test]
    fn test_needs_delivery_gates_on_visibility() {
        let mut store = DataStore::new();
        store.register_representation(rid(1), true);
        store.register_representation(rid(2), false);
        store.set_piece(rid(1), object(100), Fidelity::Full).unwrap();
        store.set_piece(rid(2), object(50), Fidelity::Full).unwrap();

        let ids = store.needs_delivery(ModTime::ZERO, Fidelity::Full);
        assert_eq!(ids.as_slice(), &[rid(1)]);
    }

    #[test]
    fn test_needs_delivery_respects_watermark_and_delivery() {
        let mut store = DataStore::new();
        store.register_representation(rid(1), true);
        store.register_representation(rid(2), true);
        store.set_piece(rid(1), object(1), Fidelity::Full).unwrap();
        let watermark = ModTime::current();
        store.set_piece(rid(2), object(1), Fidelity::Full).unwrap();

        assert_eq!(store.needs_delivery(watermark, Fidelity::Full).as_slice(), &[rid(2)]);
        assert_eq!(store.needs_delivery(ModTime::ZERO, Fidelity::Full).len(), 2);

        let ts = store.item(rid(2), Fidelity::Full).unwrap().timestamp();
        store.set_delivered(rid(2), Fidelity::Full, object(1), ts).unwrap();
        assert_eq!(store.needs_delivery(ModTime::ZERO, Fidelity::Full).as_slice(), &[rid(1)]);
    }

    #[test]
    fn test_stale_among_filters_unknown_and_fresh() {
        let mut store = DataStore::new();
        store.register_representation(rid(1), true);
        store.register_representation(rid(2), true);
        store.set_piece(rid(2), object(3), Fidelity::Full).unwrap();
        let stale = store.stale_among(&[rid(2), rid(1), rid(7), rid(2)], Fidelity::Full);
        assert_eq!(stale.as_slice(), &[rid(2)]);
    }

    #[test]
    fn test_flags_apply_to_both_fidelities() {
        let mut store = DataStore::new();
        store.register_representation(rid(1), true);
        store.set_always_clone(rid(1), true).unwrap();
        assert!(store.flags(rid(1), Fidelity::Full).unwrap().always_clone);
        assert!(store.flags(rid(1), Fidelity::Lod).unwrap().always_clone);
        assert!(store.set_streamable(rid(5), true).is_err());
    }

    #[test]
    fn test_streamed_pieces_require_streamable() {
        let mut store = DataStore::new();
        store.register_representation(rid(1), true);
        assert!(matches!(
            store.set_next_streamed_piece(rid(1), object(1)),
            Err(RelayError::InvalidOperation(_))
        ));

        store.set_streamable(rid(1), true).unwrap();
        store.set_next_streamed_piece(rid(1), object(4)).unwrap();
        assert_eq!(store.pending_streamed_ids().as_slice(), &[rid(1)]);

        let piece = store.pending_streamed_piece(rid(1)).unwrap();
        store.push_streamed_piece(rid(1), piece).unwrap();
        assert!(store.pending_streamed_ids().is_empty());
        assert_eq!(store.streamed_pieces(rid(1)).len(), 1);

        store.clear_streamed_pieces(rid(1)).unwrap();
        assert!(store.current_streamed_piece(rid(1)).is_none());
    }

    #[test]
    fn test_registered_ids_sorted() {
        let mut store = DataStore::new();
        for n in [5, 1, 3] {
            store.register_representation(rid(n), true);
        }
        assert_eq!(store.registered_ids(), vec![rid(1), rid(3), rid(5)]);
    }
}
