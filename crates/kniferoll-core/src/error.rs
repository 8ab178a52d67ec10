#![allow(clippy::module_name_repetitions)]

use thiserror::Error;

/// Failure returned by the remote data gateway.
///
/// Both variants render to the message the stores surface to callers; the
/// split exists so adapters and the simulator can distinguish transport
/// failures from server rejections.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The request never completed (timeout, connection loss).
    #[error("network error: {0}")]
    Network(String),

    /// The server processed the request and refused it (constraint
    /// violation, auth rejection).
    #[error("{0}")]
    Rejected(String),
}

/// Failure surfaced by a store operation.
///
/// Not-found and validation failures are reported before any gateway call
/// is made and never touch the store's shared state. Gateway failures carry
/// the message verbatim; it is also recorded in the store's `error` field
/// for passive observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The targeted item ID is absent from local state.
    #[error("Item not found")]
    ItemNotFound,

    /// The compound add was called without an authenticated user.
    #[error("User ID required")]
    UserIdRequired,

    /// A gateway call failed; the message is what the UI renders.
    #[error("{0}")]
    Gateway(String),
}

impl From<GatewayError> for StoreError {
    fn from(err: GatewayError) -> Self {
        Self::Gateway(err.to_string())
    }
}
