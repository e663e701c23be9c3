use filament::{RuntimeBuilder, join};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn test_join_single_future() {
    let rt = RuntimeBuilder::new().build();

    let result = rt.block_on(async {
        let a = join!(async { 42 });
        a
    });

    assert_eq!(result, 42);
}

#[test]
fn test_join_two_futures() {
    let rt = RuntimeBuilder::new().build();

    let result = rt.block_on(async {
        let (a, b) = join!(async { 10 }, async { 20 });
        (a, b)
    });

    assert_eq!(result, (10, 20));
}

#[test]
fn test_join_three_futures() {
    let rt = RuntimeBuilder::new().build();

    let result = rt.block_on(async {
        let (a, b, c) = join!(async { "hello" }, async { 42 }, async { true });
        (a, b, c)
    });

    assert_eq!(result, ("hello", 42, true));
}

#[test]
fn test_join_concurrent_execution() {
    let rt = RuntimeBuilder::new().build();
    let counter = Arc::new(AtomicUsize::new(0));

    let c1 = counter.clone();
    let c2 = counter.clone();
    let c3 = counter.clone();

    rt.block_on(async move {
        join!(
            async move {
                c1.fetch_add(1, Ordering::SeqCst);
            },
            async move {
                c2.fetch_add(10, Ordering::SeqCst);
            },
            async move {
                c3.fetch_add(100, Ordering::SeqCst);
            }
        );
    });

    assert_eq!(counter.load(Ordering::SeqCst), 111);
}

#[test]
fn test_join_with_channel_round_trip() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    let result = rt.block_on(async {
        let (tx, rx) = filament::channel::bounded(1);

        let (sent, received) = join!(
            async move {
                tx.send(5).await.unwrap();
                true
            },
            async move { rx.recv().await.unwrap() }
        );

        (sent, received)
    });

    assert_eq!(result, (true, 5));
}

#[test]
fn test_join_nested_async() {
    let rt = RuntimeBuilder::new().build();

    let result = rt.block_on(async {
        let outer = join!(async {
            let inner = async { 42 };
            inner.await * 2
        });
        outer
    });

    assert_eq!(result, 84);
}
