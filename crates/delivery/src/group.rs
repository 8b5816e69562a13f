//! In-process process group
//!
//! `ThreadGroup` stands in for a multi-process session: each rank is a
//! thread holding a [`GroupCommunicator`], and collectives rendezvous on a
//! shared slot table.
//!
//! # Exchange protocol
//!
//! 1. Each rank writes its value into its own slot
//! 2. All ranks wait on the barrier, so every slot is filled
//! 3. Each rank clones the full slot table
//! 4. All ranks wait again before anyone may overwrite a slot

use crate::communicator::{Communicator, SharedValue};
use parking_lot::Mutex;
use std::sync::{Arc, Barrier};
use std::thread;

#[derive(Debug)]
struct Rendezvous {
    slots: Mutex<Vec<Option<SharedValue>>>,
    barrier: Barrier,
}

/// Communicator handle for one rank of a [`ThreadGroup`]
#[derive(Debug, Clone)]
pub struct GroupCommunicator {
    rank: usize,
    size: usize,
    shared: Arc<Rendezvous>,
}

impl Communicator for GroupCommunicator {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn all_gather_shared(&self, value: SharedValue) -> Vec<SharedValue> {
        self.shared.slots.lock()[self.rank] = Some(value);
        self.shared.barrier.wait();
        let gathered: Vec<SharedValue> = self.shared.slots.lock().iter().flatten().cloned().collect();
        self.shared.barrier.wait();
        gathered
    }
}

/// Builder for in-process groups
#[derive(Debug)]
pub struct ThreadGroup;

impl ThreadGroup {
    /// Create one communicator per rank
    ///
    /// `size` is clamped to at least one rank.
    pub fn communicators(size: usize) -> Vec<GroupCommunicator> {
        let size = size.max(1);
        let shared = Arc::new(Rendezvous {
            slots: Mutex::new(vec![None; size]),
            barrier: Barrier::new(size),
        });
        (0..size)
            .map(|rank| GroupCommunicator {
                rank,
                size,
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Run `f` once per rank on scoped threads; results are indexed by rank
    pub fn run<R, F>(size: usize, f: F) -> Vec<R>
    where
        R: Send,
        F: Fn(GroupCommunicator) -> R + Sync,
    {
        let f = &f;
        thread::scope(|scope| {
            let handles: Vec<_> = Self::communicators(size)
                .into_iter()
                .map(|comm| scope.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(result) => result,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    }
}
