//! Opaque, value-typed references to a subscription.
//!
//! A [`ConnectionHandle`] decouples the caller from the `Args` type of the
//! signal it was obtained from, so callers can hold handles from signals of
//! different argument types in the same collection. It does this the way
//! the `signals2` crate's `ConnectionImpl` does: by erasing the owning
//! signal behind a `Weak<dyn SignalControl>` trait object rather than
//! carrying the signal's generic parameter around.

use std::sync::Weak;

use slotmap::new_key_type;

use crate::error::Result;

new_key_type! {
    /// Stable identifier for a single subscription within one signal.
    ///
    /// Never reused while the owning signal is alive; a tombstoned slot id
    /// is simply never looked up again.
    pub(crate) struct SlotId;
}

/// Object-safe view of a signal's subscription table, used so
/// [`ConnectionHandle`] need not be generic over the signal's `Args`.
pub(crate) trait SignalControl: Send + Sync {
    fn is_connected(&self, slot: SlotId) -> bool;
    fn disconnect(&self, slot: SlotId);
    fn set_blocked(&self, slot: SlotId, should_block: bool) -> Result<bool>;
    fn is_blocked(&self, slot: SlotId) -> Result<bool>;
    fn identity(&self) -> u64;
}

#[derive(Clone)]
struct HandleInner {
    control: Weak<dyn SignalControl>,
    slot: SlotId,
    identity: u64,
}

/// A stable, copyable reference to a subscription created by
/// [`Signal::connect`](crate::Signal::connect) and its variants.
///
/// A handle remains meaningful across moves of the owning signal and
/// degrades gracefully (never panics, never triggers undefined behavior)
/// once that signal is destroyed: [`is_active`](Self::is_active) simply
/// reports `false`.
#[derive(Clone, Default)]
pub struct ConnectionHandle {
    inner: Option<HandleInner>,
}

impl ConnectionHandle {
    pub(crate) fn new(control: Weak<dyn SignalControl>, slot: SlotId, identity: u64) -> Self {
        Self {
            inner: Some(HandleInner { control, slot, identity }),
        }
    }

    /// A handle that addresses nothing. `is_active()` is always `false`.
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether this handle still addresses a live, non-disconnected
    /// subscription.
    pub fn is_active(&self) -> bool {
        let Some(inner) = &self.inner else { return false };
        inner
            .control
            .upgrade()
            .map(|control| control.is_connected(inner.slot))
            .unwrap_or(false)
    }

    /// Whether this handle was produced by `signal`, regardless of whether
    /// the subscription (or the signal itself) is still alive.
    pub fn belongs_to<Args>(&self, signal: &crate::signal::Signal<Args>) -> bool {
        match &self.inner {
            Some(inner) => inner.identity == signal.identity(),
            None => false,
        }
    }

    /// Disconnects the addressed subscription. A no-op if the handle is
    /// already inactive.
    pub fn disconnect(&self) {
        if let Some(inner) = &self.inner {
            if let Some(control) = inner.control.upgrade() {
                control.disconnect(inner.slot);
            }
        }
    }

    /// Sets the blocked state of the addressed subscription, returning the
    /// state it had before this call.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownHandle`](crate::DispatchError::UnknownHandle)
    /// if this handle no longer addresses a live subscription.
    pub fn block(&self, should_block: bool) -> Result<bool> {
        let inner = self.inner.as_ref().ok_or(crate::error::DispatchError::UnknownHandle)?;
        let control = inner.control.upgrade().ok_or(crate::error::DispatchError::UnknownHandle)?;
        control.set_blocked(inner.slot, should_block)
    }

    /// Whether the addressed subscription is currently blocked.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownHandle`](crate::DispatchError::UnknownHandle)
    /// if this handle no longer addresses a live subscription.
    pub fn is_blocked(&self) -> Result<bool> {
        let inner = self.inner.as_ref().ok_or(crate::error::DispatchError::UnknownHandle)?;
        let control = inner.control.upgrade().ok_or(crate::error::DispatchError::UnknownHandle)?;
        control.is_blocked(inner.slot)
    }

    pub(crate) fn slot(&self) -> Option<SlotId> {
        self.inner.as_ref().map(|inner| inner.slot)
    }

    pub(crate) fn control(&self) -> Option<Weak<dyn SignalControl>> {
        self.inner.as_ref().map(|inner| inner.control.clone())
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            Some(inner) => f
                .debug_struct("ConnectionHandle")
                .field("slot", &inner.slot)
                .field("active", &self.is_active())
                .finish(),
            None => write!(f, "ConnectionHandle(none)"),
        }
    }
}

impl PartialEq for ConnectionHandle {
    fn eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => a.slot == b.slot && a.identity == b.identity,
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for ConnectionHandle {}
