use filament::channel::{self, RecvError, SendError, TryRecvError, TrySendError};
use filament::task::spawn;
use filament::time::delay;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[filament::test]
async fn test_unbounded_fifo_order() {
    let (tx, rx) = channel::unbounded();

    for i in 0..100 {
        tx.send(i).await.unwrap();
    }

    for i in 0..100 {
        assert_eq!(rx.recv().await.unwrap(), i);
    }
}

#[filament::test]
async fn test_bounded_fifo_order_across_tasks() {
    let (tx, rx) = channel::bounded(4);

    let sender = spawn(async move {
        for i in 0..50 {
            tx.send(i).await.unwrap();
        }
    });

    for i in 0..50 {
        assert_eq!(rx.recv().await.unwrap(), i);
    }

    sender.await.unwrap();
}

#[filament::test]
async fn test_no_value_duplicated_or_lost() {
    // Every value enqueued is dequeued exactly once, across several
    // producers.
    let (tx, rx) = channel::bounded(8);
    let produced = 4 * 100;

    let mut senders = Vec::new();
    for p in 0..4 {
        let tx = tx.clone();
        senders.push(spawn(async move {
            for i in 0..100 {
                tx.send(p * 100 + i).await.unwrap();
            }
        }));
    }
    drop(tx);

    let mut seen = vec![false; produced];
    let mut count = 0;

    while let Ok(value) = rx.recv().await {
        assert!(!seen[value], "value {value} delivered twice");
        seen[value] = true;
        count += 1;
    }

    assert_eq!(count, produced);

    for sender in senders {
        sender.await.unwrap();
    }
}

#[filament::test]
async fn test_capacity_one_backpressure() {
    // Sender pushes 1, 2, 3; the third send parks until the second
    // value is consumed.
    let (tx, rx) = channel::bounded(1);
    let sends_done = Arc::new(AtomicUsize::new(0));

    let done = sends_done.clone();
    let sender = spawn(async move {
        for value in 1..=3 {
            tx.send(value).await.unwrap();
            done.fetch_add(1, Ordering::SeqCst);
        }
    });

    delay(Duration::from_millis(50)).await;
    // Only the first send fit; the buffer holds one value.
    assert_eq!(sends_done.load(Ordering::SeqCst), 1);

    assert_eq!(rx.recv().await.unwrap(), 1);
    delay(Duration::from_millis(50)).await;
    // Taking 1 let the second send commit; the third is still parked.
    assert_eq!(sends_done.load(Ordering::SeqCst), 2);

    assert_eq!(rx.recv().await.unwrap(), 2);
    assert_eq!(rx.recv().await.unwrap(), 3);

    sender.await.unwrap();
    assert_eq!(sends_done.load(Ordering::SeqCst), 3);
}

#[filament::test]
async fn test_rendezvous_send_waits_for_receiver() {
    let (tx, rx) = channel::bounded(0);
    let handed_over = Arc::new(AtomicUsize::new(0));

    let flag = handed_over.clone();
    let sender = spawn(async move {
        tx.send(99).await.unwrap();
        flag.store(1, Ordering::SeqCst);
    });

    delay(Duration::from_millis(50)).await;
    // No receiver yet: the send must still be parked.
    assert_eq!(handed_over.load(Ordering::SeqCst), 0);

    assert_eq!(rx.recv().await.unwrap(), 99);
    sender.await.unwrap();
    assert_eq!(handed_over.load(Ordering::SeqCst), 1);
}

#[filament::test]
async fn test_recv_on_closed_drains_buffer_first() {
    let (tx, rx) = channel::bounded(4);

    tx.send(1).await.unwrap();
    tx.send(2).await.unwrap();
    tx.close();

    assert_eq!(rx.recv().await.unwrap(), 1);
    assert_eq!(rx.recv().await.unwrap(), 2);
    assert_eq!(rx.recv().await, Err(RecvError::Closed));
}

#[filament::test]
async fn test_send_after_close_fails_immediately_with_value() {
    let (tx, rx) = channel::bounded::<u32>(4);

    tx.close();

    match tx.send(7).await {
        Err(SendError::Closed(value)) => assert_eq!(value, 7),
        Ok(()) => panic!("send succeeded on a closed channel"),
    }

    assert_eq!(rx.recv().await, Err(RecvError::Closed));
}

#[filament::test]
async fn test_close_is_idempotent() {
    let (tx, rx) = channel::bounded::<u32>(4);

    tx.close();
    tx.close();
    rx.close();

    assert_eq!(rx.recv().await, Err(RecvError::Closed));
}

#[filament::test]
async fn test_channel_closes_when_all_senders_drop() {
    let (tx, rx) = channel::bounded::<u32>(4);
    let tx2 = tx.clone();

    drop(tx);
    drop(tx2);

    assert_eq!(rx.recv().await, Err(RecvError::Closed));
}

#[filament::test]
async fn test_receiver_drop_fails_parked_send() {
    let (tx, rx) = channel::bounded(1);

    tx.send(1).await.unwrap();

    let sender = spawn(async move {
        // The buffer is full; this parks until the receiver disappears.
        tx.send(2).await
    });

    delay(Duration::from_millis(30)).await;
    drop(rx);

    match sender.await.unwrap() {
        Err(SendError::Closed(value)) => assert_eq!(value, 2),
        Ok(()) => panic!("send completed with no receiver"),
    }
}

#[filament::test]
async fn test_try_send_try_recv() {
    let (tx, rx) = channel::bounded(1);

    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));

    tx.try_send(5).unwrap();
    assert_eq!(tx.try_send(6), Err(TrySendError::Full(6)));

    assert_eq!(rx.try_recv(), Ok(5));

    tx.close();
    assert_eq!(tx.try_send(7), Err(TrySendError::Closed(7)));
    assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
}

#[filament::test]
async fn test_dropped_send_withdraws_value() {
    let (tx, rx) = channel::bounded(1);

    tx.send(1).await.unwrap();

    {
        // Park a send, then abandon it before it can commit.
        let pending = tx.send(2);
        let outcome = filament::time::timeout(Duration::from_millis(30), pending).await;
        assert!(outcome.is_err());
    }

    assert_eq!(rx.recv().await.unwrap(), 1);

    // The withdrawn value never surfaces.
    assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
}
