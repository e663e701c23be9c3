use filament::RuntimeBuilder;
use filament::time::{Elapsed, delay, timeout};
use std::time::{Duration, Instant};

#[filament::test]
async fn test_delay_waits_out_its_duration() {
    let start = Instant::now();

    delay(Duration::from_millis(20)).await;

    assert!(start.elapsed() >= Duration::from_millis(19));
}

#[filament::test]
async fn test_timeout_returns_value_when_operation_wins() {
    let result = timeout(Duration::from_secs(1), async { 42 }).await;
    assert_eq!(result, Ok(42));
}

#[filament::test]
async fn test_timeout_elapses_on_slow_operation() {
    let result = timeout(
        Duration::from_millis(10),
        delay(Duration::from_millis(200)),
    )
    .await;

    assert_eq!(result, Err(Elapsed));
}

#[filament::test]
async fn test_timeout_never_preempts_a_ready_result() {
    // Both sides are ready by the time the race is polled; the
    // operation's result wins.
    let result = timeout(Duration::from_millis(0), async { 1 }).await;
    assert_eq!(result, Ok(1));
}

#[test]
fn test_timer_entries_drain_after_firing() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    rt.block_on(async {
        for _ in 0..10 {
            delay(Duration::from_millis(5)).await;
        }
    });

    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(rt.pending_timers(), 0);
}

#[test]
fn test_dropped_delay_is_purged_by_its_deadline() {
    let rt = RuntimeBuilder::new().worker_threads(2).build();

    rt.block_on(async {
        for _ in 0..10 {
            let result = timeout(
                Duration::from_millis(5),
                delay(Duration::from_millis(40)),
            )
            .await;
            assert_eq!(result, Err(Elapsed));
        }
    });

    // The abandoned 40ms delays are gone once their deadlines pass.
    std::thread::sleep(Duration::from_millis(80));
    assert_eq!(rt.pending_timers(), 0);
}
