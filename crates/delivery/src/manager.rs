//! Delivery manager
//!
//! Moves stale items between processes once per frame, per fidelity.
//!
//! # Round structure
//!
//! A delivery round is always collective, even when this process has nothing
//! stale:
//!
//! 1. Each process narrows the requested ids to its locally stale items
//! 2. Processes agree on the sorted union of those ids
//! 3. If the union is empty the round ends on every process at once
//! 4. Otherwise one batched exchange carries every collective item's local
//!    data, and each process installs its share
//!
//! Agreeing first means a process whose item is fresh still takes part in a
//! move another process needs, so the collective sequence never diverges.
//!
//! # Memory Ordering
//!
//! Counters use Relaxed ordering; they are observational only and never
//! synchronize other memory.

use crate::communicator::{Communicator, CommunicatorExt};
use crate::moves::{apply_move, resolve_move_mode};
use relay_core::{DataHandle, Fidelity, ModTime, MoveMode, RepresentationId};
use relay_storage::{DataStore, IdBatch};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

/// Outcome of one delivery round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Ids delivered on this process, sorted
    pub delivered: IdBatch,
    /// Bytes installed on this process by collective moves
    pub bytes_moved: u64,
    /// Whether the round exchanged data with other processes
    pub exchanged: bool,
}

impl DeliveryReport {
    /// Whether nothing was delivered
    pub fn is_empty(&self) -> bool {
        self.delivered.is_empty()
    }
}

/// Snapshot of delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryMetrics {
    /// Rounds that moved at least one item
    pub rounds: u64,
    /// Rounds that ended after agreement with nothing to move
    pub empty_rounds: u64,
    /// Items installed across all rounds
    pub items_delivered: u64,
    /// Bytes installed by collective moves
    pub bytes_moved: u64,
    /// Streamed increments installed
    pub streamed_pieces: u64,
}

impl DeliveryMetrics {
    /// Every round, empty or not
    pub fn total_rounds(&self) -> u64 {
        self.rounds + self.empty_rounds
    }

    /// Mean items per non-empty round
    pub fn items_per_round(&self) -> f64 {
        if self.rounds == 0 {
            return 0.0;
        }
        self.items_delivered as f64 / self.rounds as f64
    }
}

/// Per-view delivery state
#[derive(Debug)]
pub struct DeliveryManager {
    /// Per-fidelity delivery watermark, indexed by `Fidelity::index`
    watermarks: [AtomicU64; 2],
    /// Rebalance redistributable items in pass-through frames
    redistribute: bool,
    rounds: AtomicU64,
    empty_rounds: AtomicU64,
    items_delivered: AtomicU64,
    bytes_moved: AtomicU64,
    streamed_pieces: AtomicU64,
}

impl Default for DeliveryManager {
    fn default() -> Self {
        Self::new(false)
    }
}

impl DeliveryManager {
    /// Create a manager with both watermarks at zero
    pub fn new(redistribute: bool) -> Self {
        DeliveryManager {
            watermarks: [AtomicU64::new(0), AtomicU64::new(0)],
            redistribute,
            rounds: AtomicU64::new(0),
            empty_rounds: AtomicU64::new(0),
            items_delivered: AtomicU64::new(0),
            bytes_moved: AtomicU64::new(0),
            streamed_pieces: AtomicU64::new(0),
        }
    }

    /// Whether redistributable items are rebalanced
    pub fn redistributes(&self) -> bool {
        self.redistribute
    }

    /// Items at or below the watermark are never selected by `deliver_pending`
    pub fn watermark(&self, fidelity: Fidelity) -> ModTime {
        ModTime::from_raw(self.watermarks[fidelity.index()].load(Ordering::Acquire))
    }

    /// Reconsider every stale item at `fidelity` on the next round
    pub fn reset_watermark(&self, fidelity: Fidelity) {
        self.watermarks[fidelity.index()].store(0, Ordering::Release);
    }

    /// Ids `deliver_pending` would request at `fidelity`
    pub fn needs_delivery(&self, store: &DataStore, fidelity: Fidelity) -> IdBatch {
        store.needs_delivery(self.watermark(fidelity), fidelity)
    }

    /// Deliver every visible item that changed since the watermark
    ///
    /// Collective: every process must call it in the same frame, with the same
    /// `view_mode`.
    pub fn deliver_pending(
        &self,
        store: &mut DataStore,
        comm: &dyn Communicator,
        fidelity: Fidelity,
        view_mode: MoveMode,
    ) -> DeliveryReport {
        let ids = self.needs_delivery(store, fidelity);
        self.deliver(store, comm, fidelity, &ids, view_mode)
    }

    /// Move the content of `ids` at `fidelity`
    ///
    /// Ids that are not stale anywhere are skipped. An agreed id that is not
    /// registered on this process is skipped after the exchange, and reported
    /// in the log. Collective.
    pub fn deliver(
        &self,
        store: &mut DataStore,
        comm: &dyn Communicator,
        fidelity: Fidelity,
        ids: &[RepresentationId],
        view_mode: MoveMode,
    ) -> DeliveryReport {
        let local_stale = store.stale_among(ids, fidelity);
        let agreed = comm.agree_on_ids(&local_stale);
        if agreed.is_empty() {
            self.empty_rounds.fetch_add(1, Ordering::Relaxed);
            trace!(target: "relay::delivery", %fidelity, "Nothing to deliver");
            self.advance_watermark(store, fidelity);
            return DeliveryReport::default();
        }

        let modes: Vec<MoveMode> = agreed
            .iter()
            .map(|id| {
                let flags = store.flags(*id, fidelity).unwrap_or_default();
                resolve_move_mode(flags, view_mode, self.redistribute)
            })
            .collect();

        let outgoing: Vec<Option<DataHandle>> = agreed
            .iter()
            .zip(&modes)
            .map(|(id, mode)| {
                if comm.size() > 1 && !mode.is_collective() {
                    return None;
                }
                store
                    .item(*id, fidelity)
                    .and_then(|item| item.local_data().cloned())
            })
            .collect();
        let exchanged = comm.size() > 1;
        let gathered = if exchanged {
            comm.all_gather(outgoing)
        } else {
            vec![outgoing]
        };

        let mut report = DeliveryReport {
            exchanged,
            ..DeliveryReport::default()
        };
        for (index, (id, mode)) in agreed.iter().copied().zip(modes).enumerate() {
            let contributions: Vec<Option<DataHandle>> = gathered
                .iter()
                .map(|per_rank| per_rank.get(index).cloned().flatten())
                .collect();
            let (moved, as_of) = match store.item(id, fidelity) {
                Some(item) => (
                    apply_move(mode, comm.rank(), comm.size(), item.local_data(), &contributions),
                    item.timestamp(),
                ),
                None => {
                    warn!(target: "relay::delivery", %id, %fidelity, "Agreed id is not registered here");
                    continue;
                }
            };
            if mode.is_collective() {
                report.bytes_moved += moved.memory_size();
            }
            if store.set_delivered(id, fidelity, moved, as_of).is_ok() {
                report.delivered.push(id);
            }
        }

        self.advance_watermark(store, fidelity);
        self.rounds.fetch_add(1, Ordering::Relaxed);
        self.items_delivered
            .fetch_add(report.delivered.len() as u64, Ordering::Relaxed);
        self.bytes_moved.fetch_add(report.bytes_moved, Ordering::Relaxed);
        info!(
            target: "relay::delivery",
            %fidelity,
            %view_mode,
            items = report.delivered.len(),
            bytes = report.bytes_moved,
            "Delivered batch"
        );
        report
    }

    /// Move pending progressive increments and append them to their items
    ///
    /// Collective, like [`DeliveryManager::deliver`].
    pub fn deliver_streamed_pieces(
        &self,
        store: &mut DataStore,
        comm: &dyn Communicator,
        view_mode: MoveMode,
    ) -> DeliveryReport {
        let local = store.pending_streamed_ids();
        let agreed = comm.agree_on_ids(&local);
        if agreed.is_empty() {
            return DeliveryReport::default();
        }

        let modes: Vec<MoveMode> = agreed
            .iter()
            .map(|id| {
                let flags = store.flags(*id, Fidelity::Full).unwrap_or_default();
                resolve_move_mode(flags, view_mode, self.redistribute)
            })
            .collect();
        let outgoing: Vec<Option<DataHandle>> =
            agreed.iter().map(|id| store.pending_streamed_piece(*id)).collect();
        let exchanged = comm.size() > 1;
        let gathered = if exchanged {
            comm.all_gather(outgoing)
        } else {
            vec![outgoing]
        };

        let mut report = DeliveryReport {
            exchanged,
            ..DeliveryReport::default()
        };
        for (index, (id, mode)) in agreed.iter().copied().zip(modes).enumerate() {
            let contributions: Vec<Option<DataHandle>> = gathered
                .iter()
                .map(|per_rank| per_rank.get(index).cloned().flatten())
                .collect();
            let local_piece = store.pending_streamed_piece(id);
            let moved = apply_move(mode, comm.rank(), comm.size(), local_piece.as_ref(), &contributions);
            if local_piece.is_none() && moved.is_empty() {
                continue;
            }
            if mode.is_collective() {
                report.bytes_moved += moved.memory_size();
            }
            match store.push_streamed_piece(id, moved) {
                Ok(()) => report.delivered.push(id),
                Err(e) => debug!(target: "relay::delivery", %id, error = %e, "Dropped streamed piece"),
            }
        }

        self.streamed_pieces
            .fetch_add(report.delivered.len() as u64, Ordering::Relaxed);
        debug!(
            target: "relay::delivery",
            items = report.delivered.len(),
            bytes = report.bytes_moved,
            "Delivered streamed pieces"
        );
        report
    }

    /// Counter snapshot
    pub fn metrics(&self) -> DeliveryMetrics {
        DeliveryMetrics {
            rounds: self.rounds.load(Ordering::Relaxed),
            empty_rounds: self.empty_rounds.load(Ordering::Relaxed),
            items_delivered: self.items_delivered.load(Ordering::Relaxed),
            bytes_moved: self.bytes_moved.load(Ordering::Relaxed),
            streamed_pieces: self.streamed_pieces.load(Ordering::Relaxed),
        }
    }

    /// Move the watermark as far forward as possible without passing an
    /// undelivered item, visible or hidden
    fn advance_watermark(&self, store: &DataStore, fidelity: Fidelity) {
        let now = ModTime::current().as_u64();
        let mark = match store.oldest_stale_timestamp(fidelity) {
            Some(oldest) => now.min(oldest.as_u64().saturating_sub(1)),
            None => now,
        };
        self.watermarks[fidelity.index()].store(mark, Ordering::Release);
    }
}
