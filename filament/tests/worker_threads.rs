use filament::RuntimeBuilder;
use filament::task::spawn;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[test]
fn test_single_worker_thread() {
    let rt = RuntimeBuilder::new().worker_threads(1).build();

    let result = rt.block_on(async { 42 });
    assert_eq!(result, 42);
}

#[test]
fn test_multiple_worker_threads() {
    let rt = RuntimeBuilder::new().worker_threads(4).build();

    let result = rt.block_on(async { 100 });
    assert_eq!(result, 100);
}

#[test]
fn test_spawned_tasks_all_run() {
    let rt = RuntimeBuilder::new().worker_threads(4).build();

    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    rt.block_on(async move {
        let handles: Vec<_> = (0..10)
            .map(|i| {
                let counter = counter_clone.clone();

                spawn(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    i * 2
                })
            })
            .collect();

        for (i, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.await.unwrap(), i * 2);
        }
    });

    assert_eq!(counter.load(Ordering::SeqCst), 10);
}

#[test]
fn test_worker_threads_stress() {
    let rt = RuntimeBuilder::new().worker_threads(8).build();

    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    rt.block_on(async move {
        let handles: Vec<_> = (0..200)
            .map(|_| {
                let counter = counter_clone.clone();
                spawn(async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap();
        }
    });

    assert_eq!(counter.load(Ordering::SeqCst), 200);
}

#[test]
fn test_await_finished_task_resolves_synchronously() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    rt.block_on(async {
        let handle = spawn(async { "done" });

        // Let the task run to completion before awaiting.
        filament::time::delay(std::time::Duration::from_millis(20)).await;

        assert!(handle.is_finished());
        assert_eq!(handle.await.unwrap(), "done");
    });
}

#[test]
fn test_spawn_detached_runs() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    let counter = Arc::new(AtomicUsize::new(0));
    let counter_clone = counter.clone();

    rt.block_on(async move {
        let counter = counter_clone.clone();
        filament::task::spawn_detached(async move {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        filament::time::delay(std::time::Duration::from_millis(50)).await;
    });

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_spawn_from_runtime_handle() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    let handle = rt.handle();
    let join = handle.spawn(async { 7 });

    let result = rt.block_on(async move { join.await.unwrap() });
    assert_eq!(result, 7);
}

#[test]
fn test_isolated_runtimes() {
    // Two runtimes in one process must not observe each other.
    let rt_a = RuntimeBuilder::new().worker_threads(1).build();
    let rt_b = RuntimeBuilder::new().worker_threads(1).build();

    let a = rt_a.block_on(async { 1 });
    let b = rt_b.block_on(async { 2 });

    assert_eq!((a, b), (1, 2));

    rt_a.shutdown();
    rt_b.shutdown();
}

#[test]
fn test_panicking_task_fails_its_handle() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    let outcome = rt.block_on(async {
        let handle = spawn(async {
            panic!("boom");
        });
        handle.await
    });

    match outcome {
        filament::task::Outcome::Failed(message) => assert!(message.contains("boom")),
        other => panic!("expected Failed, got {other:?}"),
    }
}
