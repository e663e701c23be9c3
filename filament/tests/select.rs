use filament::RuntimeBuilder;
use filament::channel::{self, TryRecvError, TrySendError};
use filament::select::{Waitable, ready_any};
use filament::task::spawn;
use filament::time::delay;
use filament::{cancel::CancelToken, select};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[filament::test]
async fn test_select_single_future() {
    let result = select! {
        async { 42 } => |v| v * 2,
    };

    assert_eq!(result, 84);
}

#[filament::test]
async fn test_select_two_futures_first_ready() {
    let result = select! {
        async { 10 } => |v| v,
        async { 20 } => |v| v,
    };

    assert!(result == 10 || result == 20);
}

#[filament::test]
async fn test_select_two_futures_different_types() {
    let result = select! {
        async { 42i32 } => |v| format!("number: {}", v),
        async { "hello" } => |v| format!("string: {}", v),
    };

    assert!(result == "number: 42" || result == "string: hello");
}

#[filament::test]
async fn test_select_with_captured_values() {
    let multiplier = 10;

    let result = select! {
        async { 5 } => |v| v * multiplier,
        async { 3 } => |v| v * multiplier,
    };

    assert!(result == 50 || result == 30);
}

#[filament::test]
async fn test_select_pattern_binding() {
    let result = select! {
        async { (1, 2) } => |(a, b)| a + b,
        async { (3, 4) } => |(a, b)| a * b,
    };

    assert!(result == 3 || result == 12);
}

#[filament::test]
async fn test_select_ready_branches_win_with_equal_chance() {
    // Both branches are always ready; over many rounds each side must
    // win at least once, or the tie-break is not randomized.
    let mut first = 0;
    let mut second = 0;

    for _ in 0..100 {
        let winner = select! {
            async { 1 } => |v| v,
            async { 2 } => |v| v,
        };

        match winner {
            1 => first += 1,
            _ => second += 1,
        }
    }

    assert!(first > 0, "first branch never won the tie-break");
    assert!(second > 0, "second branch never won the tie-break");
}

#[filament::test]
async fn test_select_channel_beats_slower_timer() {
    let (tx, rx) = channel::bounded(1);

    spawn(async move {
        delay(Duration::from_millis(10)).await;
        tx.send(7).await.unwrap();
    });

    let result = select! {
        rx.recv() => |r| r.unwrap(),
        delay(Duration::from_millis(50)) => |_| -1,
    };

    assert_eq!(result, 7);
}

#[filament::test]
async fn test_select_timer_beats_silent_channel() {
    let (_tx, rx) = channel::bounded::<i32>(1);

    let result = select! {
        rx.recv() => |r| r.unwrap(),
        delay(Duration::from_millis(10)) => |_| -1,
    };

    assert_eq!(result, -1);
}

#[test]
fn test_select_losing_timer_leaves_no_entry_behind() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    rt.block_on(async {
        for _ in 0..20 {
            let (tx, rx) = channel::bounded(1);

            spawn(async move {
                delay(Duration::from_millis(5)).await;
                tx.send(1).await.unwrap();
            });

            let result = select! {
                rx.recv() => |r| r.unwrap(),
                delay(Duration::from_millis(50)) => |_| -1,
            };

            assert_eq!(result, 1);
        }
    });

    // Losing timers were cancelled on drop; once their deadlines pass
    // the driver holds nothing.
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(rt.pending_timers(), 0);
}

#[filament::test]
async fn test_engine_single_eventually_ready_case() {
    let (tx_a, rx_a) = channel::bounded::<i32>(1);
    let (tx_b, rx_b) = channel::bounded::<i32>(1);

    spawn(async move {
        delay(Duration::from_millis(10)).await;
        tx_a.send(7).await.unwrap();
    });

    let body_runs = AtomicUsize::new(0);

    let value = loop {
        let cases: [&dyn Waitable; 2] = [&rx_a, &rx_b];

        match ready_any(&cases).await {
            0 => match rx_a.try_recv() {
                Ok(v) => {
                    body_runs.fetch_add(1, Ordering::SeqCst);
                    break v;
                }
                Err(TryRecvError::Empty) => continue,
                Err(TryRecvError::Closed) => panic!("channel a closed unexpectedly"),
            },
            _ => panic!("case b can never be ready"),
        }
    };

    assert_eq!(value, 7);
    assert_eq!(body_runs.load(Ordering::SeqCst), 1);

    // The untouched case saw no side effect.
    assert_eq!(rx_b.try_recv(), Err(TryRecvError::Empty));
    drop(tx_b);
}

#[filament::test]
async fn test_engine_send_case_claims_with_try_send() {
    let (tx, rx) = channel::bounded(1);
    tx.send(1).await.unwrap();

    let receiver = spawn(async move {
        delay(Duration::from_millis(10)).await;
        assert_eq!(rx.recv().await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap(), 2);
    });

    // The channel is full: wait for send readiness, then claim. A
    // failed claim hands the value back and the wait resumes.
    let mut value = Some(2);
    loop {
        let cases: [&dyn Waitable; 1] = [&tx];
        ready_any(&cases).await;

        match tx.try_send(value.take().unwrap()) {
            Ok(()) => break,
            Err(TrySendError::Full(v)) => value = Some(v),
            Err(TrySendError::Closed(_)) => panic!("channel closed unexpectedly"),
        }
    }

    receiver.await.unwrap();
}

#[filament::test]
async fn test_engine_cancellation_token_case() {
    let token = CancelToken::new();

    let remote = token.clone();
    spawn(async move {
        delay(Duration::from_millis(10)).await;
        remote.cancel();
    });

    let (_tx, rx) = channel::bounded::<i32>(1);

    let cases: [&dyn Waitable; 2] = [&rx, &token];
    let winner = ready_any(&cases).await;

    assert_eq!(winner, 1);
    assert!(token.is_cancelled());
}

#[filament::test]
async fn test_engine_join_handle_case() {
    let handle = spawn(async {
        delay(Duration::from_millis(10)).await;
        5
    });

    let (_tx, rx) = channel::bounded::<i32>(1);

    let cases: [&dyn Waitable; 2] = [&rx, &handle];
    let winner = ready_any(&cases).await;

    assert_eq!(winner, 1);
    assert_eq!(handle.await.unwrap(), 5);
}
