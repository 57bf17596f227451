//! Error types for the core layer.

use thiserror::Error;

use crate::{Address, AddressError};

/// Errors raised by `Address`, `Value` and `GlobalScope` operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// The slot at a well-known address holds a different type than requested.
    #[error("slot at '{address}' does not hold a {expected}")]
    TypeMismatch {
        address: Address,
        expected: &'static str,
    },

    #[error("serialize error: {message}")]
    Serialize { message: String },

    #[error("deserialize error: {message}")]
    Deserialize { message: String },
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address;

    #[test]
    fn type_mismatch_names_address() {
        let e = CoreError::TypeMismatch {
            address: address!("__shell__/store"),
            expected: "u32",
        };
        let msg = e.to_string();
        assert!(msg.contains("__shell__/store"));
        assert!(msg.contains("u32"));
    }
}
