//! Typed multicast emitters.
//!
//! This module provides a type-safe, Qt-inspired signal/slot mechanism.
//! Signals are emitted by callers when some state changes, and connected
//! slots (callbacks) are invoked in response, either immediately on the
//! emitting thread or later through a [`ConnectionEvaluator`].
//!
//! # Key Types
//!
//! - [`Signal<Args>`] - the emitter, parameterised by the argument tuple it carries
//! - [`ConnectionHandle`] - returned by `connect`, used to disconnect or block later
//! - [`ConnectionEvaluator`] - drains deferred invocations on demand
//!
//! # Connection kinds
//!
//! - **Immediate** (the default): the slot runs inline, on the emitting
//!   thread, as part of `emit`.
//! - **Deferred**: the slot's invocation is captured and pushed onto a
//!   [`ConnectionEvaluator`] instead of running inline; some thread must
//!   later call [`ConnectionEvaluator::evaluate_deferred_connections`] to
//!   run it.
//!
//! # Example
//!
//! ```
//! use dispatch_signal::Signal;
//!
//! let text_changed = Signal::<(String,)>::new();
//! let _conn = text_changed.connect(|text: &String| {
//!     println!("text changed to: {text}");
//! });
//! text_changed.emit(("hello".to_string(),));
//! ```
//!
//! Rust has no pointer-to-member-function type, so there is no
//! `connect_member` overload here: connect a closure that captures an
//! `Arc` (or `&'static` reference) to the instance and calls the method on
//! it. The instance's lifetime remains the caller's responsibility, same
//! as with any other captured state.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use slotmap::SlotMap;

use crate::connect::{IntoBoundSubscriber, IntoSubscriber};
use crate::error::{DispatchError, Result};
use crate::evaluator::{ConnectionEvaluator, PendingInvocation};
use crate::handle::{ConnectionHandle, SignalControl, SlotId};

static NEXT_SIGNAL_IDENTITY: AtomicU64 = AtomicU64::new(1);

struct SlotRecord<Args> {
    callback: Arc<dyn Fn(&Args) + Send + Sync>,
    /// `Some` for a deferred subscription, `None` for an immediate one.
    evaluator: Option<ConnectionEvaluator>,
    blocked: bool,
    disconnected: bool,
}

struct SubscriptionTable<Args> {
    slots: SlotMap<SlotId, SlotRecord<Args>>,
    /// Insertion order. A `SlotMap`'s own iteration order is not
    /// guaranteed to track insertion once keys are reused, so this vector
    /// is the sole source of truth for emission order.
    order: Vec<SlotId>,
}

impl<Args> SubscriptionTable<Args> {
    fn new() -> Self {
        Self { slots: SlotMap::with_key(), order: Vec::new() }
    }

    /// Removes tombstoned entries from both the slot map and the order
    /// vector. Only safe to call when no emission is in flight.
    fn sweep(&mut self) {
        self.order.retain(|id| match self.slots.get(*id) {
            Some(rec) if rec.disconnected => {
                self.slots.remove(*id);
                false
            }
            Some(_) => true,
            None => false,
        });
    }
}

struct SignalCore<Args> {
    subscriptions: Mutex<SubscriptionTable<Args>>,
    /// Incremented on `emit` entry, decremented on exit; a sweep only runs
    /// once this reaches zero, so a disconnect observed mid-emission never
    /// invalidates the iterator a concurrent or reentrant `emit` is using.
    emit_depth: AtomicUsize,
    identity: u64,
}

impl<Args: 'static> SignalControl for SignalCore<Args> {
    fn is_connected(&self, slot: SlotId) -> bool {
        let table = self.subscriptions.lock();
        table.slots.get(slot).map(|rec| !rec.disconnected).unwrap_or(false)
    }

    fn disconnect(&self, slot: SlotId) {
        {
            let mut table = self.subscriptions.lock();
            if let Some(rec) = table.slots.get_mut(slot) {
                rec.disconnected = true;
            }
        }
        self.sweep_if_quiescent();
    }

    fn set_blocked(&self, slot: SlotId, should_block: bool) -> Result<bool> {
        let mut table = self.subscriptions.lock();
        let rec = table
            .slots
            .get_mut(slot)
            .filter(|rec| !rec.disconnected)
            .ok_or(DispatchError::UnknownHandle)?;
        let previous = rec.blocked;
        rec.blocked = should_block;
        Ok(previous)
    }

    fn is_blocked(&self, slot: SlotId) -> Result<bool> {
        let table = self.subscriptions.lock();
        table
            .slots
            .get(slot)
            .filter(|rec| !rec.disconnected)
            .map(|rec| rec.blocked)
            .ok_or(DispatchError::UnknownHandle)
    }

    fn identity(&self) -> u64 {
        self.identity
    }
}

impl<Args: 'static> SignalCore<Args> {
    fn sweep_if_quiescent(&self) {
        if self.emit_depth.load(Ordering::Acquire) == 0 {
            self.subscriptions.lock().sweep();
        }
    }
}

/// Decrements the emit-depth counter and sweeps tombstoned subscriptions
/// once it reaches zero, on every exit path from `emit` including a
/// panicking slot's unwind.
struct EmitDepthGuard<'a, Args> {
    core: &'a SignalCore<Args>,
}

impl<'a, Args: 'static> Drop for EmitDepthGuard<'a, Args> {
    fn drop(&mut self) {
        self.core.emit_depth.fetch_sub(1, Ordering::AcqRel);
        self.core.sweep_if_quiescent();
    }
}

/// A type-safe multicast point: when emitted, every live, non-blocked
/// subscriber is invoked with the same arguments.
///
/// `Args` is the tuple of argument types passed to subscribers on
/// [`emit`](Self::emit), e.g. `()` for a signal with no payload, or
/// `(String, i32)` for two. `Signal` is not `Clone` — it owns its
/// subscription table — but it moves for free: the table and every
/// outstanding [`ConnectionHandle`] into it live behind a single `Arc`, so
/// moving the `Signal` value never relocates that heap allocation and
/// handles keep resolving correctly afterward.
pub struct Signal<Args> {
    core: Arc<SignalCore<Args>>,
}

impl<Args> Signal<Args> {
    /// The unique identity of this signal's control block, used by
    /// [`ConnectionHandle::belongs_to`] without requiring `Args` bounds
    /// there.
    pub(crate) fn identity(&self) -> u64 {
        self.core.identity
    }
}

impl<Args: Clone + Send + 'static> Default for Signal<Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args: Clone + Send + 'static> Signal<Args> {
    /// Creates a signal with no subscribers.
    pub fn new() -> Self {
        Self {
            core: Arc::new(SignalCore {
                subscriptions: Mutex::new(SubscriptionTable::new()),
                emit_depth: AtomicUsize::new(0),
                identity: NEXT_SIGNAL_IDENTITY.fetch_add(1, Ordering::Relaxed),
            }),
        }
    }

    fn control_weak(&self) -> Weak<dyn SignalControl> {
        Arc::downgrade(&self.core)
    }

    fn insert(&self, callback: Arc<dyn Fn(&Args) + Send + Sync>, evaluator: Option<ConnectionEvaluator>) -> ConnectionHandle {
        let slot = {
            let mut table = self.core.subscriptions.lock();
            let id = table.slots.insert(SlotRecord {
                callback,
                evaluator,
                blocked: false,
                disconnected: false,
            });
            table.order.push(id);
            id
        };
        tracing::trace!(target: "dispatch_signal::signal", slot = ?slot, "connected");
        ConnectionHandle::new(self.control_weak(), slot, self.core.identity)
    }

    /// Connects a slot that runs inline, on the emitting thread, in
    /// `emit`.
    ///
    /// `F` may take any prefix of `Args`'s elements, by reference; trailing
    /// arguments the slot does not declare are discarded at emit time.
    pub fn connect<F, Marker>(&self, slot: F) -> ConnectionHandle
    where
        F: IntoSubscriber<Args, Marker>,
    {
        self.insert(slot.into_subscriber(), None)
    }

    /// Connects a slot that additionally receives one argument bound once,
    /// at connect time, ahead of whatever prefix of `Args` it also
    /// declares.
    pub fn connect_bound<F, Marker, B0>(&self, slot: F, bound: B0) -> ConnectionHandle
    where
        F: IntoBoundSubscriber<(B0,), Args, Marker>,
    {
        self.insert(slot.into_bound_subscriber((bound,)), None)
    }

    /// Connects a slot whose invocation is captured at `emit` time but run
    /// later, when some thread drains `evaluator`.
    pub fn connect_deferred<F, Marker>(&self, evaluator: &ConnectionEvaluator, slot: F) -> ConnectionHandle
    where
        F: IntoSubscriber<Args, Marker>,
    {
        self.insert(slot.into_subscriber(), Some(evaluator.clone()))
    }

    /// Like [`connect_bound`](Self::connect_bound), but deferred through
    /// `evaluator` instead of run inline.
    pub fn connect_deferred_bound<F, Marker, B0>(
        &self,
        evaluator: &ConnectionEvaluator,
        slot: F,
        bound: B0,
    ) -> ConnectionHandle
    where
        F: IntoBoundSubscriber<(B0,), Args, Marker>,
    {
        self.insert(slot.into_bound_subscriber((bound,)), Some(evaluator.clone()))
    }

    /// Disconnects a single subscription. Idempotent: disconnecting an
    /// already-disconnected (or foreign, or default) handle is a no-op.
    pub fn disconnect(&self, handle: &ConnectionHandle) {
        handle.disconnect();
    }

    /// Disconnects every current subscription.
    pub fn disconnect_all(&self) {
        {
            let mut table = self.core.subscriptions.lock();
            for id in &table.order {
                if let Some(rec) = table.slots.get_mut(*id) {
                    rec.disconnected = true;
                }
            }
        }
        self.core.sweep_if_quiescent();
    }

    /// Sets the blocked state of `handle`'s subscription, returning the
    /// state it had before this call.
    pub fn block_connection(&self, handle: &ConnectionHandle, should_block: bool) -> Result<bool> {
        handle.block(should_block)
    }

    /// Whether `handle`'s subscription is currently blocked.
    pub fn is_connection_blocked(&self, handle: &ConnectionHandle) -> Result<bool> {
        handle.is_blocked()
    }

    /// The number of live (non-disconnected) subscriptions.
    pub fn connection_count(&self) -> usize {
        let table = self.core.subscriptions.lock();
        table.order.iter().filter(|id| table.slots.get(**id).map(|r| !r.disconnected).unwrap_or(false)).count()
    }

    /// Broadcasts `args` to every live, non-blocked subscriber.
    ///
    /// Subscribers are visited in connect order, frozen to exactly the set
    /// present when `emit` is called: a subscriber added by a running slot
    /// is not invoked by this emission, and a subscriber disconnected by a
    /// preceding slot during this same emission is skipped. Immediate
    /// slots run inline; their panics propagate out of this call uncaught.
    /// Deferred slots instead have a copy of `args` captured now and
    /// pushed onto their evaluator for later invocation.
    #[tracing::instrument(skip_all, target = "dispatch_signal::signal", level = "trace")]
    pub fn emit(&self, args: Args) {
        let snapshot: Vec<SlotId> = {
            let table = self.core.subscriptions.lock();
            table.order.clone()
        };

        self.core.emit_depth.fetch_add(1, Ordering::AcqRel);
        // No `catch_unwind` here: a panicking slot is meant to unwind
        // straight through `emit`. This guard only runs the bookkeeping
        // (closing out the emit-depth count and sweeping tombstones) that
        // has to happen whether this emission finishes normally or not.
        let _depth_guard = EmitDepthGuard { core: &self.core };

        for id in snapshot {
            let dispatch = {
                let table = self.core.subscriptions.lock();
                table.slots.get(id).and_then(|rec| {
                    if rec.disconnected || rec.blocked {
                        None
                    } else {
                        Some((rec.callback.clone(), rec.evaluator.clone()))
                    }
                })
            };
            let Some((callback, evaluator)) = dispatch else { continue };
            match evaluator {
                None => callback(&args),
                Some(evaluator) => self.enqueue_deferred(id, callback, evaluator, args.clone()),
            }
        }
    }

    fn enqueue_deferred(
        &self,
        id: SlotId,
        callback: Arc<dyn Fn(&Args) + Send + Sync>,
        evaluator: ConnectionEvaluator,
        args: Args,
    ) {
        let control = self.control_weak();
        let is_live = Box::new(move || {
            control.upgrade().map(|control| control.is_connected(id)).unwrap_or(false)
        });
        let run = Box::new(move || callback(&args));
        evaluator.enqueue(PendingInvocation::new(run, is_live));
    }
}
