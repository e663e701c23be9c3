//! Internal utilities shared across the runtime.
//!
//! This module provides small building blocks used by several
//! components:
//! - [`Slab`]: indexed storage with slot reuse, used as the arena
//!   backing structured-concurrency scopes,
//! - [`WaiterList`]: a token-indexed waker registry used by everything
//!   a task can suspend on,
//! - [`rng`]: a per-thread pseudo-random generator for fair selection.

mod slab;
mod waiters;

pub(crate) mod rng;

pub(crate) use slab::Slab;
pub(crate) use waiters::WaiterList;
