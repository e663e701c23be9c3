use filament::sync::{Mutex, RwLock, Shared, shared};
use filament::task::spawn;
use filament::time::delay;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[filament::test]
async fn test_mutex_serializes_increments() {
    let counter = shared(Mutex::new(0u64));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let counter = counter.clone();
        handles.push(spawn(async move {
            for _ in 0..100 {
                let mut guard = counter.lock().await;
                *guard += 1;
            }
        }));
    }

    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(*counter.lock().await, 800);
}

#[filament::test]
async fn test_mutex_guard_releases_on_drop() {
    let mutex = Mutex::new(1);

    {
        let mut guard = mutex.lock().await;
        *guard = 2;
    }

    // The previous guard is gone; this must not park.
    assert_eq!(*mutex.lock().await, 2);
}

#[filament::test]
async fn test_mutex_contended_across_suspension() {
    let log = shared(Mutex::new(Vec::new()));

    let first = {
        let log = log.clone();
        spawn(async move {
            let mut guard = log.lock().await;
            // Hold the lock across a suspension point.
            delay(Duration::from_millis(30)).await;
            guard.push(1);
        })
    };

    let second = {
        let log = log.clone();
        spawn(async move {
            delay(Duration::from_millis(5)).await;
            log.lock().await.push(2);
        })
    };

    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(*log.lock().await, vec![1, 2]);
}

#[filament::test]
async fn test_mutex_try_lock() {
    let mutex = Mutex::new(42);

    let guard = mutex.lock().await;
    assert!(mutex.try_lock().is_none());
    drop(guard);

    assert_eq!(*mutex.try_lock().unwrap(), 42);
}

#[filament::test]
async fn test_rwlock_readers_share() {
    let lock = RwLock::new(7);

    let a = lock.read().await;
    let b = lock.read().await;

    assert_eq!(*a + *b, 14);
}

#[filament::test]
async fn test_rwlock_writer_excludes() {
    let lock = shared(RwLock::new(0));

    let writer = {
        let lock = lock.clone();
        spawn(async move {
            let mut guard = lock.write().await;
            delay(Duration::from_millis(30)).await;
            *guard = 10;
        })
    };

    let reader = {
        let lock = lock.clone();
        spawn(async move {
            delay(Duration::from_millis(5)).await;
            // Parks behind the writer, then observes its write.
            *lock.read().await
        })
    };

    writer.await.unwrap();
    assert_eq!(reader.await.unwrap(), 10);
}

#[filament::test]
async fn test_rwlock_try_variants() {
    let lock = RwLock::new(1);

    let read = lock.try_read().unwrap();
    assert!(lock.try_write().is_none());
    drop(read);

    let mut write = lock.try_write().unwrap();
    *write = 2;
    assert!(lock.try_read().is_none());
    drop(write);

    assert_eq!(*lock.try_read().unwrap(), 2);
}

struct DropCounter(Arc<AtomicUsize>);

impl Drop for DropCounter {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_shared_drops_payload_exactly_once() {
    let drops = Arc::new(AtomicUsize::new(0));

    let cell = shared(DropCounter(drops.clone()));
    let clones: Vec<_> = (0..8).map(|_| cell.clone()).collect();

    assert_eq!(Shared::handles(&cell), 9);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(clones);
    assert_eq!(drops.load(Ordering::SeqCst), 0);

    drop(cell);
    assert_eq!(drops.load(Ordering::SeqCst), 1);
}

#[test]
fn test_shared_into_inner() {
    let cell = shared(5);
    let other = cell.clone();

    let cell = Shared::into_inner(cell).unwrap_err();
    drop(other);

    assert_eq!(Shared::into_inner(cell).unwrap(), 5);
}

#[test]
fn test_shared_ptr_eq() {
    let a = shared(1);
    let b = a.clone();
    let c = shared(1);

    assert!(Shared::ptr_eq(&a, &b));
    assert!(!Shared::ptr_eq(&a, &c));
}

#[filament::test]
async fn test_guard_released_by_cancellation() {
    let lock = shared(Mutex::new(0));

    let holder = {
        let lock = lock.clone();
        spawn(async move {
            let _guard = lock.lock().await;
            // Park while holding the guard; cancellation drops the
            // continuation and with it the guard.
            delay(Duration::from_secs(5)).await;
        })
    };

    delay(Duration::from_millis(20)).await;
    holder.cancel();
    assert!(holder.await.is_cancelled());

    // The lock is free again.
    assert_eq!(*lock.lock().await, 0);
}
