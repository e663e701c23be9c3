/// Task is suspended and not scheduled.
///
/// The task exists but is not currently queued or running; the
/// waitable it parked on is responsible for re-queueing it.
pub(crate) const IDLE: usize = 0;

/// Task is queued for execution.
///
/// The task has been scheduled and is waiting in a run queue.
pub(crate) const QUEUED: usize = 1;

/// Task is currently being executed by a worker.
///
/// At most one worker may observe this state at a time.
pub(crate) const RUNNING: usize = 2;

/// Task was woken while running.
///
/// This state indicates that the task was woken while already
/// executing and should be re-queued once execution finishes.
pub(crate) const NOTIFIED: usize = 3;

/// Task ran to completion and produced a value.
pub(crate) const COMPLETED: usize = 4;

/// Task panicked; the panic was converted into a failed outcome at
/// the task boundary.
pub(crate) const FAILED: usize = 5;

/// Task observed cooperative cancellation and wound down.
pub(crate) const CANCELLED: usize = 6;

/// Returns `true` for the three terminal states.
///
/// A terminal state is written exactly once and never changes.
pub(crate) fn is_terminal(state: usize) -> bool {
    state >= COMPLETED
}
