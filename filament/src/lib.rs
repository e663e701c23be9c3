//! # Filament
//!
//! **Filament** is a green-thread runtime: cooperatively scheduled
//! tasks multiplexed onto a fixed pool of OS worker threads, with
//! structured concurrency as the default way to organize them.
//!
//! Rather than covering the full surface of a general-purpose runtime,
//! Filament focuses on the coordination substrate:
//!
//! - A **work-stealing scheduler** — per-worker run queues with a
//!   global injector; a task runs until it suspends, and whatever it
//!   suspended on re-queues it when ready
//! - **Structured concurrency scopes** — a scope joins every child
//!   before it exits, and a child failure cancels the siblings
//! - **Ownership-transferring channels** — bounded, unbounded, and
//!   rendezvous, with exactly-once delivery even under cancellation
//! - A **fair select engine** — wait on many heterogeneous waitables,
//!   commit to exactly one, chosen at random among the ready
//! - **Shared-state primitives** — reference-counted cells, mutexes
//!   and read-write locks with suspension-point acquisition, plus a
//!   debug-only deadlock detector
//! - **Timers** — `delay` and `timeout`, driven by a dedicated timer
//!   thread
//! - **Ergonomic macros** like `#[filament::main]`, `#[filament::test]`,
//!   `join!`, and `select!`
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filament::scope::enter_scope;
//! use filament::time::delay;
//! use std::time::Duration;
//!
//! #[filament::main]
//! async fn main() {
//!     let output = enter_scope(|scope| async move {
//!         scope.spawn(async {
//!             delay(Duration::from_millis(100)).await;
//!             println!("child done");
//!         });
//!         42
//!     })
//!     .await;
//!
//!     assert_eq!(output.value, 42);
//! }
//! ```
//!
//! ## Modules
//!
//! - [`channel`] — ownership-transferring channels
//! - [`scope`] — structured concurrency scopes
//! - [`select`] — the waitable trait and multi-wait engine
//! - [`sync`] — shared cells, mutexes, and read-write locks
//! - [`time`] — delays and timeouts
//! - [`cancel`] — cooperative cancellation tokens
//!
//! ## Getting Started
//!
//! Add Filament to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! filament = { git = "https://github.com/filament-rt/filament", package = "filament" }
//! ```

mod runtime;
mod utils;

pub mod cancel;
pub mod channel;
pub mod scope;
pub mod select;
pub mod sync;
pub mod time;

pub use runtime::builder::RuntimeBuilder;
pub use runtime::task;
pub use runtime::yield_now::yield_now;
pub use runtime::{Handle, Runtime};

pub use filament_macros::*;
