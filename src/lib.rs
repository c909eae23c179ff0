//! A type-safe, Qt-inspired signal/slot dispatch core.
//!
//! A [`Signal<Args>`] is a typed multicast point: connect any number of
//! slots (closures) to it, then [`emit`](Signal::emit) to invoke every
//! connected, non-blocked slot with the same arguments, in the order they
//! were connected. Slots may declare any prefix of the signal's argument
//! tuple — trailing arguments they don't ask for are discarded — and may
//! additionally receive one argument bound once, at connect time, via
//! [`connect_bound`](Signal::connect_bound).
//!
//! Every connection is addressed by a [`ConnectionHandle`]: a small,
//! cheaply cloned value that stays meaningful across moves of its owning
//! signal and degrades to inert (never undefined behavior) once that
//! signal is destroyed.
//!
//! Connections come in two flavors:
//!
//! - **Immediate** (via [`connect`](Signal::connect) /
//!   [`connect_bound`](Signal::connect_bound)): the slot runs inline, on
//!   the emitting thread, as part of `emit`.
//! - **Deferred** (via [`connect_deferred`](Signal::connect_deferred) /
//!   [`connect_deferred_bound`](Signal::connect_deferred_bound)): the call
//!   is captured at `emit` time and queued on a shared
//!   [`ConnectionEvaluator`]; some thread later drains it by calling
//!   [`ConnectionEvaluator::evaluate_deferred_connections`].
//!
//! # Example
//!
//! ```
//! use dispatch_signal::{ConnectionEvaluator, Signal};
//!
//! let evaluator = ConnectionEvaluator::new();
//! let counter = std::sync::Arc::new(std::sync::atomic::AtomicI32::new(0));
//!
//! let ticked = Signal::<(i32,)>::new();
//! let c = counter.clone();
//! ticked.connect_deferred(&evaluator, move |n: &i32| {
//!     c.fetch_add(*n, std::sync::atomic::Ordering::SeqCst);
//! });
//!
//! ticked.emit((4,));
//! assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 0); // not run yet
//!
//! evaluator.evaluate_deferred_connections();
//! assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 4);
//! ```
//!
//! # Concurrency
//!
//! No internal thread is ever spawned by this crate. A single `Signal` is
//! internally synchronized (connecting, disconnecting, and emitting on it
//! is memory-safe from any thread), and a `ConnectionEvaluator` may be
//! shared freely across any number of signals and threads. See
//! [`Signal`] and [`ConnectionEvaluator`] for the precise contract.

mod blocker;
mod connect;
mod error;
mod evaluator;
mod handle;
mod signal;

pub use blocker::ConnectionBlocker;
pub use connect::{
    Arity0, Arity1, Arity2, Arity3, BoundArity1, BoundArity2, BoundArity3, IntoBoundSubscriber,
    IntoSubscriber,
};
pub use error::{DispatchError, Result};
pub use evaluator::ConnectionEvaluator;
pub use handle::ConnectionHandle;
pub use signal::Signal;
