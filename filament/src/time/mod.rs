//! Timers.
//!
//! This module provides the time-related suspension points of the
//! runtime:
//! - [`delay`] parks the calling task until a deadline,
//! - [`timeout`] bounds another operation by racing it against a
//!   timer: the timer can only win if the operation has not yet
//!   completed, so a timeout never preempts running work.
//!
//! Both are backed by a dedicated timer-driver thread owned by the
//! runtime.

mod delay;
mod driver;
mod timeout;

#[doc(inline)]
pub use delay::{Delay, delay};

#[doc(inline)]
pub use timeout::{Elapsed, Timeout, timeout};

pub(crate) use driver::{DelayState, TimerDriver, TimerHandle};
