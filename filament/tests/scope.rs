use filament::scope::{ChildState, enter_scope};
use filament::task::{Outcome, spawn};
use filament::time::delay;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use std::time::Instant;

#[filament::test]
async fn test_scope_joins_all_children() {
    let counter = Arc::new(AtomicUsize::new(0));

    let c = counter.clone();
    let output = enter_scope(|scope| async move {
        for i in 0..8u64 {
            let c = c.clone();
            scope.spawn(async move {
                // Randomize completion order a little.
                delay(Duration::from_millis(5 * (i % 4))).await;
                c.fetch_add(1, Ordering::SeqCst);
            });
        }
        "body"
    })
    .await;

    // The scope returned, so every child reached a terminal state.
    assert_eq!(counter.load(Ordering::SeqCst), 8);
    assert_eq!(output.value, "body");
    assert_eq!(output.children.len(), 8);
    assert!(
        output
            .children
            .iter()
            .all(|child| *child == ChildState::Completed)
    );
    assert!(output.failure().is_none());
}

#[filament::test]
async fn test_scope_child_panic_cancels_siblings() {
    let output = enter_scope(|scope| async move {
        scope.spawn(async {
            delay(Duration::from_millis(10)).await;
            panic!("child failed");
        });

        // Siblings park far past the panic; cancellation reaches them
        // at that suspension point.
        scope.spawn(async {
            delay(Duration::from_millis(500)).await;
            1
        });
        scope.spawn(async {
            delay(Duration::from_millis(500)).await;
            2
        });
    })
    .await;

    assert_eq!(output.children.len(), 3);

    let failed = output
        .children
        .iter()
        .filter(|child| child.is_failed())
        .count();
    let cancelled = output
        .children
        .iter()
        .filter(|child| **child == ChildState::Cancelled)
        .count();

    assert_eq!(failed, 1);
    assert_eq!(cancelled, 2);

    let message = output.failure().expect("a child failure was recorded");
    assert!(message.contains("child failed"));
}

#[filament::test]
async fn test_scope_cancellation_shortens_work_not_the_join() {
    let start = Instant::now();

    let output = enter_scope(|scope| async move {
        scope.spawn(async {
            delay(Duration::from_millis(500)).await;
        });
        scope.cancel();
    })
    .await;

    // The child was cancelled at its suspension point instead of
    // sleeping out the full delay, and the scope still joined it.
    assert!(start.elapsed() < Duration::from_millis(300));
    assert_eq!(output.children, vec![ChildState::Cancelled]);
}

#[filament::test]
async fn test_scope_child_outcome_observable_inside() {
    let output = enter_scope(|scope| async move {
        let handle = scope.spawn(async { 21 });
        handle.await.unwrap() * 2
    })
    .await;

    assert_eq!(output.value, 42);
    assert_eq!(output.children, vec![ChildState::Completed]);
}

#[filament::test]
async fn test_scope_children_can_spawn_siblings() {
    let output = enter_scope(|scope| async move {
        let inner = scope.clone();
        scope.spawn(async move {
            inner.spawn(async {
                delay(Duration::from_millis(20)).await;
            });
        });
    })
    .await;

    assert_eq!(output.children.len(), 2);
    assert!(
        output
            .children
            .iter()
            .all(|child| *child == ChildState::Completed)
    );
}

#[filament::test]
async fn test_cancel_is_cooperative_and_idempotent() {
    let handle = spawn(async {
        delay(Duration::from_millis(500)).await;
        1
    });

    handle.cancel();
    handle.cancel();

    assert_eq!(handle.await, Outcome::Cancelled);
}

#[filament::test]
async fn test_cancel_after_completion_is_a_no_op() {
    let handle = spawn(async { 5 });

    delay(Duration::from_millis(20)).await;

    handle.cancel();
    assert_eq!(handle.await.unwrap(), 5);
}

#[filament::test]
async fn test_cancel_never_interrupts_between_suspension_points() {
    // A task with no suspension points runs to completion even if
    // cancelled immediately after spawning... once it has started.
    let started = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicUsize::new(0));

    let s = started.clone();
    let f = finished.clone();
    let handle = spawn(async move {
        s.fetch_add(1, Ordering::SeqCst);
        // No suspension point in here.
        f.fetch_add(1, Ordering::SeqCst);
        7
    });

    handle.cancel();

    match handle.await {
        Outcome::Completed(7) => {
            assert_eq!(started.load(Ordering::SeqCst), 1);
            assert_eq!(finished.load(Ordering::SeqCst), 1);
        }
        Outcome::Cancelled => {
            // Cancelled before its first slice: it never started — it
            // was never torn mid-computation.
            assert_eq!(started.load(Ordering::SeqCst), finished.load(Ordering::SeqCst));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
}
