//! Collective communication
//!
//! Every method here is collective: all processes of a session must call it
//! the same number of times, in the same order. A process that skips a call
//! stalls the others; nothing detects that locally.

use relay_core::{Bounds, RepresentationId};
use relay_storage::IdBatch;
use std::any::Any;
use std::fmt::Debug;
use std::sync::Arc;

/// Type-erased value exchanged in a collective call
pub type SharedValue = Arc<dyn Any + Send + Sync>;

/// Group of cooperating processes
pub trait Communicator: Send + Sync + Debug {
    /// Rank of this process, `0..size`
    fn rank(&self) -> usize;

    /// Number of processes in the session
    fn size(&self) -> usize;

    /// Exchange one value per process; the result is indexed by rank
    fn all_gather_shared(&self, value: SharedValue) -> Vec<SharedValue>;

    /// Whether this process is the root
    fn is_root(&self) -> bool {
        self.rank() == 0
    }
}

/// Typed collectives layered on [`Communicator::all_gather_shared`]
pub trait CommunicatorExt: Communicator {
    /// Gather one value from every process, indexed by rank
    ///
    /// # Panics
    ///
    /// If another process contributed a different type. That means processes
    /// diverged in their collective sequence, which is unrecoverable.
    fn all_gather<T>(&self, value: T) -> Vec<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        self.all_gather_shared(Arc::new(value))
            .into_iter()
            .map(|shared| match shared.downcast::<T>() {
                Ok(typed) => (*typed).clone(),
                Err(_) => panic!("collective type mismatch: processes diverged"),
            })
            .collect()
    }

    /// Sum across processes
    fn all_reduce_sum(&self, value: u64) -> u64 {
        self.all_gather(value).into_iter().sum()
    }

    /// Logical OR across processes
    fn all_reduce_or(&self, value: bool) -> bool {
        self.all_gather(value).into_iter().any(|v| v)
    }

    /// Union of bounding boxes across processes
    fn all_reduce_bounds(&self, bounds: Bounds) -> Bounds {
        let gathered = self.all_gather(bounds);
        Bounds::union_all(gathered.iter())
    }

    /// Sorted union of the id lists of every process
    ///
    /// Every process receives the same batch, so loops over it issue the
    /// same collectives everywhere.
    fn agree_on_ids(&self, local: &[RepresentationId]) -> IdBatch {
        if self.size() <= 1 {
            let mut ids: IdBatch = local.iter().copied().collect();
            ids.sort_unstable();
            ids.dedup();
            return ids;
        }
        let gathered = self.all_gather(local.to_vec());
        let mut ids: IdBatch = gathered.into_iter().flatten().collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Block until every process arrives
    fn barrier(&self) {
        self.all_gather(());
    }
}

impl<C: Communicator + ?Sized> CommunicatorExt for C {}

/// Communicator for a session with a single process
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalCommunicator;

impl Communicator for LocalCommunicator {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn all_gather_shared(&self, value: SharedValue) -> Vec<SharedValue> {
        vec![value]
    }
}
