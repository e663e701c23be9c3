//! Debug-only deadlock detection.
//!
//! Every lock in the crate carries a [`LockId`]. In debug builds, a
//! global wait-for graph records which task holds which lock and which
//! lock each blocked task wants. A contended acquire walks the chain
//! `wanted lock -> holding task -> its wanted lock -> ...`; arriving
//! back at the requesting task means the cycle is complete and no
//! schedule can ever resolve it, so the process aborts with a
//! diagnostic instead of hanging silently.
//!
//! Release builds compile all of this down to nothing.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one lock instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LockId(u64);

static NEXT_LOCK_ID: AtomicU64 = AtomicU64::new(0);

pub(crate) fn next_lock_id() -> LockId {
    LockId(NEXT_LOCK_ID.fetch_add(1, Ordering::Relaxed))
}

#[cfg(debug_assertions)]
mod imp {
    use super::LockId;
    use crate::runtime::context;

    use std::collections::{HashMap, HashSet};
    use std::sync::{LazyLock, Mutex};

    struct Graph {
        /// Which task currently holds each lock.
        holders: HashMap<LockId, usize>,
        /// Which lock each blocked task is waiting for.
        wanted: HashMap<usize, LockId>,
    }

    static GRAPH: LazyLock<Mutex<Graph>> = LazyLock::new(|| {
        Mutex::new(Graph {
            holders: HashMap::new(),
            wanted: HashMap::new(),
        })
    });

    /// Records a successful acquisition.
    pub(crate) fn acquired(lock: LockId) {
        let Some(task) = context::current_task_id() else {
            return;
        };

        let mut graph = GRAPH.lock().unwrap();
        graph.wanted.remove(&task);
        graph.holders.insert(lock, task);
    }

    /// Records a contended acquire and checks for a cycle.
    ///
    /// Aborts the process if the wait-for chain leads back to the
    /// requesting task: a confirmed cycle cannot be recovered from.
    pub(crate) fn blocked(lock: LockId) {
        let Some(task) = context::current_task_id() else {
            return;
        };

        let mut graph = GRAPH.lock().unwrap();
        graph.wanted.insert(task, lock);

        let mut visited = HashSet::new();
        let mut current = lock;

        while visited.insert(current) {
            let Some(&holder) = graph.holders.get(&current) else {
                return;
            };

            if holder == task {
                tracing::error!(
                    target: "filament::sync",
                    ?current,
                    "deadlock detected: lock cycle between tasks"
                );
                eprintln!(
                    "filament: deadlock detected: task {task:#x} waits for {current:?}, \
                     which is held inside a cycle of lock acquisitions; aborting"
                );
                std::process::abort();
            }

            let Some(&next) = graph.wanted.get(&holder) else {
                return;
            };
            current = next;
        }
    }

    /// Forgets a wait edge without acquiring (the waiter gave up).
    pub(crate) fn unblocked(lock: LockId) {
        let Some(task) = context::current_task_id() else {
            return;
        };

        let mut graph = GRAPH.lock().unwrap();
        if graph.wanted.get(&task) == Some(&lock) {
            graph.wanted.remove(&task);
        }
    }

    /// Records a release.
    pub(crate) fn released(lock: LockId) {
        GRAPH.lock().unwrap().holders.remove(&lock);
    }
}

#[cfg(not(debug_assertions))]
mod imp {
    use super::LockId;

    #[inline(always)]
    pub(crate) fn acquired(_lock: LockId) {}

    #[inline(always)]
    pub(crate) fn blocked(_lock: LockId) {}

    #[inline(always)]
    pub(crate) fn unblocked(_lock: LockId) {}

    #[inline(always)]
    pub(crate) fn released(_lock: LockId) {}
}

pub(crate) use imp::{acquired, blocked, released, unblocked};
