//! Error types for the shared store.

use mosaic_core::{Address, CoreError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No slice is reachable at the address.
    #[error("no route for address: {address}")]
    NoRoute { address: Address },

    /// The slice exists but remotes may not write it.
    #[error("address is read-only: {address}")]
    ReadOnly { address: Address },

    /// The written value does not fit the slice.
    #[error("invalid value for {address}: {message}")]
    InvalidValue { address: Address, message: String },

    #[error("unknown tenant: {tenant_id}")]
    UnknownTenant { tenant_id: String },

    #[error("unknown notification: {id}")]
    UnknownNotification { id: String },

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
