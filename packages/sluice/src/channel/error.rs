// channel and alternative error types.

use thiserror::Error;


/// Error for a blocking operation whose process was cancelled while suspended
///
/// See [`CancelToken`](crate::CancelToken). The channel involved is left consistent: no value is
/// lost or duplicated by the cancelled operation.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[error("process cancelled while suspended")]
pub struct CancelledError;

/// Error for trying to build a channel from an invalid buffering configuration
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ConfigError {
    /// A bounded buffer was given a capacity of zero
    #[error("{store} requires a capacity of at least 1")]
    ZeroCapacity {
        /// Name of the offending buffer type
        store: &'static str,
    },
}

/// Breach of the guard enable/disable protocol
///
/// These are programming errors rather than runtime conditions. The low-level guard methods
/// return them without changing any state; [`Alternative`](crate::Alternative) panics on them.
#[derive(Error, Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ProtocolViolation {
    /// A channel end was enabled while an alternative was already registered on it
    #[error("channel end is already enabled by an alternative")]
    AlreadyEnabled,
    /// A channel end was disabled while no alternative was registered on it
    #[error("disable without a matching enable")]
    DisableWithoutEnable,
    /// A channel end was disabled by an alternative other than the one that enabled it
    #[error("disable by an alternative other than the one that enabled")]
    ForeignDisable,
    /// A selection was attempted with no guard enabled, so it could never return
    #[error("select with no enabled guards")]
    NoEnabledGuards,
}
