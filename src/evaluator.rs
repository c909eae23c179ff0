//! The deferred-invocation coordinator shared by any number of signals.
//!
//! Modeled on `horizon-lattice-core`'s `invocation.rs`, which queues boxed
//! nullary closures for later draining by the event loop, but adapted for
//! a library with no event loop of its own: draining happens whenever the
//! caller asks for it, on whatever thread asks.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

/// A single queued invocation: the work itself, and a recheck of whether
/// the originating subscription is still connected. The recheck runs at
/// drain time rather than only at enqueue time, so a disconnect that
/// happens between `emit` and `evaluate_deferred_connections` still
/// suppresses the invocation (this is what makes a mid-flight disconnect
/// of a deferred connection actually take effect).
pub(crate) struct PendingInvocation {
    run: Box<dyn FnOnce() + Send>,
    is_live: Box<dyn Fn() -> bool + Send>,
}

impl PendingInvocation {
    pub(crate) fn new(
        run: Box<dyn FnOnce() + Send>,
        is_live: Box<dyn Fn() -> bool + Send>,
    ) -> Self {
        Self { run, is_live }
    }
}

struct EvaluatorCore {
    queue: Mutex<VecDeque<PendingInvocation>>,
    is_draining: AtomicBool,
}

/// Shared, thread-safe queue of deferred slot invocations.
///
/// `ConnectionEvaluator` is a thin, `Clone`-able handle onto a shared
/// queue (the same relationship `Arc` has to its contents): any number of
/// [`Signal`](crate::Signal)s may hold a clone of the same evaluator, and a
/// deferred subscription enqueues onto whichever one it was connected
/// with. Nothing drains the queue on its own — some thread must call
/// [`evaluate_deferred_connections`](Self::evaluate_deferred_connections)
/// to run the pending work.
pub struct ConnectionEvaluator {
    core: Arc<EvaluatorCore>,
}

impl Default for ConnectionEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionEvaluator {
    /// Creates an empty evaluator.
    pub fn new() -> Self {
        Self {
            core: Arc::new(EvaluatorCore {
                queue: Mutex::new(VecDeque::new()),
                is_draining: AtomicBool::new(false),
            }),
        }
    }

    pub(crate) fn enqueue(&self, invocation: PendingInvocation) {
        self.core.queue.lock().push_back(invocation);
        tracing::trace!(target: "dispatch_signal::evaluator", "queued a deferred invocation");
    }

    /// Runs every pending invocation, in the order it was enqueued,
    /// skipping any whose subscription has since been disconnected or
    /// whose signal has since been destroyed.
    ///
    /// The whole queue is swapped out under the lock once, then each
    /// invocation is run outside the lock — a running invocation is free
    /// to enqueue further work, including back onto this same evaluator.
    ///
    /// If an invocation panics, the invocations that had not yet run are
    /// preserved (re-queued onto the front of the shared queue) and the
    /// panic propagates to the caller; the next call to
    /// `evaluate_deferred_connections` will retry them.
    ///
    /// A reentrant call — made from within an invocation that this very
    /// call is currently running — is refused: it logs a warning and
    /// returns without draining anything, rather than draining whatever
    /// happens to be queued at that moment.
    pub fn evaluate_deferred_connections(&self) {
        if self.core.is_draining.swap(true, Ordering::AcqRel) {
            tracing::warn!(
                target: "dispatch_signal::evaluator",
                "ignoring reentrant evaluate_deferred_connections() call"
            );
            return;
        }

        let batch: VecDeque<PendingInvocation> = {
            let mut queue = self.core.queue.lock();
            std::mem::take(&mut *queue)
        };

        let mut guard = DrainGuard {
            core: &self.core,
            remaining: batch,
        };

        while let Some(invocation) = guard.remaining.pop_front() {
            if (invocation.is_live)() {
                (invocation.run)();
            } else {
                tracing::trace!(
                    target: "dispatch_signal::evaluator",
                    "skipping deferred invocation for a disconnected subscription"
                );
            }
        }
        // `guard` drops here (success path): `remaining` is empty, so the
        // requeue in its `Drop` impl is a no-op, and `is_draining` clears.
    }
}

impl Clone for ConnectionEvaluator {
    fn clone(&self) -> Self {
        Self { core: Arc::clone(&self.core) }
    }
}

/// Re-merges whatever invocations had not yet run back onto the shared
/// queue, on both the normal return path and while unwinding from a panic.
struct DrainGuard<'a> {
    core: &'a Arc<EvaluatorCore>,
    remaining: VecDeque<PendingInvocation>,
}

impl<'a> Drop for DrainGuard<'a> {
    fn drop(&mut self) {
        if !self.remaining.is_empty() {
            let mut queue = self.core.queue.lock();
            while let Some(invocation) = self.remaining.pop_back() {
                queue.push_front(invocation);
            }
        }
        self.core.is_draining.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Signal;
    use std::sync::atomic::{AtomicI32, Ordering as AtomicOrdering};

    #[test]
    fn double_evaluate_runs_each_invocation_once() {
        let evaluator = ConnectionEvaluator::new();
        let v = Arc::new(AtomicI32::new(4));
        let s1 = Signal::<(i32,)>::new();
        let v1 = v.clone();
        s1.connect_deferred(&evaluator, move |x: &i32| {
            v1.fetch_add(*x, AtomicOrdering::SeqCst);
        });
        s1.emit((4,));
        assert_eq!(v.load(AtomicOrdering::SeqCst), 4);

        evaluator.evaluate_deferred_connections();
        assert_eq!(v.load(AtomicOrdering::SeqCst), 8);

        evaluator.evaluate_deferred_connections();
        assert_eq!(v.load(AtomicOrdering::SeqCst), 8);
    }

    #[test]
    fn disconnected_deferred_invocation_is_skipped() {
        let evaluator = ConnectionEvaluator::new();
        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let signal = Signal::<()>::new();
        let called2 = called.clone();
        let handle = signal.connect_deferred(&evaluator, move || {
            called2.store(true, AtomicOrdering::SeqCst);
        });
        signal.emit(());
        handle.disconnect();
        evaluator.evaluate_deferred_connections();
        assert!(!called.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn two_signals_share_one_evaluator() {
        let evaluator = ConnectionEvaluator::new();
        let v = Arc::new(AtomicI32::new(4));

        let s1 = Signal::<(i32,)>::new();
        let s2 = Signal::<(i32, i32)>::new();

        let v1 = v.clone();
        let h1 = s1.connect_deferred(&evaluator, move |x: &i32| {
            v1.fetch_add(*x, AtomicOrdering::SeqCst);
        });
        let v2 = v.clone();
        s2.connect_deferred(&evaluator, move |a: &i32, b: &i32| {
            v2.fetch_add(*a + *b, AtomicOrdering::SeqCst);
        });

        s1.emit((4,));
        s2.emit((3, 2));
        assert_eq!(v.load(AtomicOrdering::SeqCst), 4);

        h1.disconnect();
        evaluator.evaluate_deferred_connections();
        assert_eq!(v.load(AtomicOrdering::SeqCst), 9);
    }

    #[test]
    fn panic_in_one_invocation_preserves_the_rest() {
        let evaluator = ConnectionEvaluator::new();
        let signal = Signal::<()>::new();
        let ran_after = Arc::new(std::sync::atomic::AtomicBool::new(false));

        signal.connect_deferred(&evaluator, || panic!("boom"));
        let ran_after2 = ran_after.clone();
        signal.connect_deferred(&evaluator, move || {
            ran_after2.store(true, AtomicOrdering::SeqCst);
        });
        signal.emit(());

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            evaluator.evaluate_deferred_connections();
        }));
        assert!(result.is_err());
        assert!(!ran_after.load(std::sync::atomic::Ordering::SeqCst));

        // The second invocation was preserved and runs on the next drain.
        evaluator.evaluate_deferred_connections();
        assert!(ran_after.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[test]
    fn reentrant_evaluate_is_refused() {
        let evaluator = ConnectionEvaluator::new();
        let signal = Signal::<()>::new();
        let reentrant_ran = Arc::new(std::sync::atomic::AtomicBool::new(false));

        let inner_evaluator = evaluator.clone();
        let reentrant_ran2 = reentrant_ran.clone();
        signal.connect_deferred(&evaluator, move || {
            // Calling back into the same evaluator while it is draining
            // must be a refused no-op, not a second concurrent drain.
            inner_evaluator.evaluate_deferred_connections();
            reentrant_ran2.store(true, AtomicOrdering::SeqCst);
        });
        signal.emit(());
        evaluator.evaluate_deferred_connections();
        assert!(reentrant_ran.load(std::sync::atomic::Ordering::SeqCst));

        // The evaluator is usable again afterward.
        let called = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let called2 = called.clone();
        signal.connect_deferred(&evaluator, move || called2.store(true, AtomicOrdering::SeqCst));
        signal.emit(());
        evaluator.evaluate_deferred_connections();
        assert!(called.load(std::sync::atomic::Ordering::SeqCst));
    }
}
