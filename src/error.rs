//! Error types for the dispatch core.

use std::fmt;

/// The error type returned by fallible operations on [`crate::Signal`],
/// [`crate::ConnectionHandle`], and [`crate::ConnectionBlocker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchError {
    /// The connection handle does not address a live subscription: it was
    /// never connected, has already been disconnected, or belongs to a
    /// signal that has since been destroyed.
    UnknownHandle,
}

impl fmt::Display for DispatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownHandle => write!(f, "connection handle does not address a live subscription"),
        }
    }
}

impl std::error::Error for DispatchError {}

/// A specialized `Result` for dispatch-core operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
