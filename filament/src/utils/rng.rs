use std::cell::Cell;
use std::time::{SystemTime, UNIX_EPOCH};

// Per-thread xorshift64 state. Seeded once per thread from a golden
// ratio hash mixed with the clock, so workers diverge immediately.
thread_local! {
    static STATE: Cell<u64> = Cell::new(seed());
}

fn seed() -> u64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos() as u64;

    let thread = &nanos as *const _ as u64;

    (nanos ^ thread).wrapping_add(0x9E3779B97F4A7C15) | 1
}

fn xorshift64(state: &mut u64) -> u64 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    *state = x;
    x
}

/// Returns the next pseudo-random value for this thread.
pub(crate) fn next_u64() -> u64 {
    STATE.with(|s| {
        let mut state = s.get();
        let out = xorshift64(&mut state);
        s.set(state);
        out
    })
}

/// Returns a uniformly distributed index in `0..n`.
///
/// # Panics
///
/// Panics if `n == 0`.
pub(crate) fn index_below(n: usize) -> usize {
    assert!(n > 0, "index_below requires a non-empty range");
    (next_u64() as usize) % n
}
