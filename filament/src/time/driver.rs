use crate::utils::WaiterList;

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// Heap size above which the driver checks whether a purge of
/// cancelled entries is worthwhile.
const PURGE_THRESHOLD: usize = 64;

/// Commands accepted by the timer-driver thread.
pub(crate) enum TimerCmd {
    /// Arm a timer firing at the given deadline.
    Register(TimerEntry),
    /// Stop the driver.
    Shutdown,
}

/// State shared between a `Delay` future and the driver.
pub(crate) struct DelayState {
    /// Set by the driver once the deadline has been reached.
    pub(crate) fired: AtomicBool,

    /// Set by the `Delay` when it is dropped before firing; the
    /// driver discards cancelled entries instead of waking anyone.
    pub(crate) cancelled: AtomicBool,

    /// Wakers parked on this timer.
    pub(crate) waiters: WaiterList,
}

impl DelayState {
    pub(crate) fn new() -> Self {
        Self {
            fired: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            waiters: WaiterList::new(),
        }
    }
}

/// An entry in the driver's timer queue.
///
/// Entries are stored in a binary heap ordered by deadline.
pub(crate) struct TimerEntry {
    /// The time at which the timer should fire.
    pub(crate) deadline: Instant,

    /// State shared with the associated delay future.
    pub(crate) state: Arc<DelayState>,
}

impl TimerEntry {
    fn is_cancelled(&self) -> bool {
        self.state.cancelled.load(Ordering::Acquire)
    }

    fn fire(&self) {
        self.state.fired.store(true, Ordering::Release);
        self.state.waiters.wake_all();
    }
}

impl Eq for TimerEntry {}

impl PartialEq for TimerEntry {
    /// Two timer entries are equal if their deadlines are equal.
    fn eq(&self, other: &Self) -> bool {
        self.deadline.eq(&other.deadline)
    }
}

impl Ord for TimerEntry {
    /// Orders timer entries by deadline.
    ///
    /// Note that the comparison is **reversed** so that a
    /// `BinaryHeap<TimerEntry>` behaves as a min-heap,
    /// where the earliest deadline is popped first.
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.deadline.cmp(&self.deadline)
    }
}

impl PartialOrd for TimerEntry {
    /// Partial ordering consistent with [`Ord`].
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

/// Cloneable handle to the timer-driver thread.
#[derive(Clone)]
pub(crate) struct TimerHandle {
    tx: mpsc::Sender<TimerCmd>,
    outstanding: Arc<AtomicUsize>,
}

impl TimerHandle {
    /// Registers a timer with the driver.
    ///
    /// If the driver has already shut down, the timer fires
    /// immediately instead of leaving the waiter parked forever.
    pub(crate) fn register(&self, deadline: Instant, state: Arc<DelayState>) {
        self.outstanding.fetch_add(1, Ordering::AcqRel);

        let entry = TimerEntry {
            deadline,
            state: state.clone(),
        };

        if self.tx.send(TimerCmd::Register(entry)).is_err() {
            self.outstanding.fetch_sub(1, Ordering::AcqRel);
            state.fired.store(true, Ordering::Release);
            state.waiters.wake_all();
        }
    }

    /// Number of entries currently held by the driver.
    pub(crate) fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::Acquire)
    }
}

/// The timer-driver thread.
///
/// The driver owns a min-heap of timer entries, fires the ones whose
/// deadline has passed, and sleeps until the next deadline or the next
/// command, whichever comes first. Cancelled entries are dropped when
/// they surface at the top of the heap, and purged in bulk when they
/// start to dominate it, so abandoned timers do not accumulate.
pub(crate) struct TimerDriver {
    thread: Option<JoinHandle<()>>,
    handle: TimerHandle,
}

impl TimerDriver {
    /// Starts the driver thread.
    pub(crate) fn start() -> Self {
        let (tx, rx) = mpsc::channel();
        let outstanding = Arc::new(AtomicUsize::new(0));

        let counter = outstanding.clone();
        let thread = thread::Builder::new()
            .name("filament-timer".to_string())
            .spawn(move || driver_loop(rx, counter))
            .expect("failed to spawn timer thread");

        Self {
            thread: Some(thread),
            handle: TimerHandle { tx, outstanding },
        }
    }

    /// Returns a cloneable handle to the driver.
    pub(crate) fn handle(&self) -> TimerHandle {
        self.handle.clone()
    }

    /// Stops the driver thread and joins it.
    pub(crate) fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.handle.tx.send(TimerCmd::Shutdown);
            let _ = thread.join();
        }
    }
}

impl Drop for TimerDriver {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn driver_loop(rx: mpsc::Receiver<TimerCmd>, outstanding: Arc<AtomicUsize>) {
    tracing::trace!(target: "filament::time", "timer driver started");

    let mut heap: BinaryHeap<TimerEntry> = BinaryHeap::new();

    loop {
        let now = Instant::now();

        // Fire everything that is due; cancelled entries just leave.
        while let Some(entry) = heap.peek() {
            if entry.deadline > now {
                break;
            }

            let entry = heap.pop().unwrap();
            outstanding.fetch_sub(1, Ordering::AcqRel);

            if !entry.is_cancelled() {
                entry.fire();
            }
        }

        if heap.len() >= PURGE_THRESHOLD {
            purge_cancelled(&mut heap, &outstanding);
        }

        // Sleep until the next deadline, or indefinitely if the heap
        // is empty; commands interrupt the sleep.
        let command = match heap.peek() {
            Some(entry) => {
                let timeout = entry.deadline.saturating_duration_since(Instant::now());
                if timeout.is_zero() {
                    continue;
                }
                match rx.recv_timeout(timeout) {
                    Ok(cmd) => cmd,
                    Err(mpsc::RecvTimeoutError::Timeout) => continue,
                    Err(mpsc::RecvTimeoutError::Disconnected) => break,
                }
            }
            None => match rx.recv() {
                Ok(cmd) => cmd,
                Err(_) => break,
            },
        };

        match command {
            TimerCmd::Register(entry) => heap.push(entry),
            TimerCmd::Shutdown => break,
        }
    }

    // Wake every remaining waiter so no task stays parked on a timer
    // that will never fire.
    for entry in heap.drain() {
        outstanding.fetch_sub(1, Ordering::AcqRel);
        if !entry.is_cancelled() {
            entry.fire();
        }
    }

    tracing::trace!(target: "filament::time", "timer driver stopped");
}

/// Rebuilds the heap without cancelled entries when at least half of
/// it is dead weight.
fn purge_cancelled(heap: &mut BinaryHeap<TimerEntry>, outstanding: &AtomicUsize) {
    let cancelled = heap.iter().filter(|e| e.is_cancelled()).count();

    if cancelled * 2 < heap.len() {
        return;
    }

    let entries = std::mem::take(heap).into_vec();
    for entry in entries {
        if entry.is_cancelled() {
            outstanding.fetch_sub(1, Ordering::AcqRel);
        } else {
            heap.push(entry);
        }
    }
}
