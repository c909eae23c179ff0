//! Scoped, RAII connection blocking.

use crate::error::Result;
use crate::handle::ConnectionHandle;

/// Blocks a connection for a bounded region of code and restores its
/// previous blocked state on drop.
///
/// Modeled on the `signals2` crate's `SharedConnectionBlock`, simplified
/// from its reference-counted shared-blocker-count model down to a single
/// blocker per scope: this restores the state the connection had
/// immediately *before* this blocker was constructed, so nesting a blocker
/// around an already-blocked connection leaves it blocked afterward.
pub struct ConnectionBlocker {
    handle: ConnectionHandle,
    previously_blocked: bool,
}

impl ConnectionBlocker {
    /// Blocks `handle`, returning a guard that restores the prior blocked
    /// state when dropped.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownHandle`](crate::DispatchError::UnknownHandle)
    /// if `handle` does not address a live subscription.
    pub fn new(handle: ConnectionHandle) -> Result<Self> {
        let previously_blocked = handle.block(true)?;
        Ok(Self { handle, previously_blocked })
    }
}

impl Drop for ConnectionBlocker {
    fn drop(&mut self) {
        // The handle was valid at construction; if the subscription has
        // since been disconnected there is nothing left to restore.
        let _ = self.handle.block(self.previously_blocked);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DispatchError;
    use crate::Signal;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    #[test]
    fn blocker_blocks_for_its_scope_then_restores() {
        let signal = Signal::<()>::new();
        let called = Arc::new(AtomicBool::new(false));
        let called2 = called.clone();
        let handle = signal.connect(move || called2.store(true, Ordering::SeqCst));

        {
            let _blocker = ConnectionBlocker::new(handle.clone()).unwrap();
            signal.emit(());
            assert!(!called.load(Ordering::SeqCst));
        }

        signal.emit(());
        assert!(called.load(Ordering::SeqCst));
    }

    #[test]
    fn blocker_leaves_an_already_blocked_connection_blocked() {
        let signal = Signal::<()>::new();
        let handle = signal.connect(|| {});
        signal.block_connection(&handle, true).unwrap();

        {
            let _blocker = ConnectionBlocker::new(handle.clone()).unwrap();
            assert!(signal.is_connection_blocked(&handle).unwrap());
        }

        assert!(signal.is_connection_blocked(&handle).unwrap());
    }

    #[test]
    fn blocker_on_disconnected_handle_raises_unknown_handle() {
        let signal = Signal::<()>::new();
        let handle = signal.connect(|| {});
        handle.disconnect();

        let result = ConnectionBlocker::new(handle);
        assert!(matches!(result, Err(DispatchError::UnknownHandle)));
    }
}
