//! Mosaic Core: primitives shared by every bundle in a host process.
//!
//! A Mosaic host composes remotes that were compiled and deployed
//! independently. They cannot import each other's statics, so everything they
//! must agree on lives in this crate:
//!
//! - `Address`: validated slash-separated location (`__shell__/store`)
//! - `Value`: dynamically-typed tree used for data exports and state reads
//! - `GlobalScope`: the locate-or-create namespace standing in for the
//!   page-wide global object
//!
//! # Example
//!
//! ```rust
//! use mosaic_core::{address, GlobalScope};
//!
//! let page = GlobalScope::new();
//! let counter = page.locate_or_create(&address!("demo/counter"), || 7u32).unwrap();
//!
//! // A second bundle attaches to the same instance.
//! let again = page.locate_or_create(&address!("demo/counter"), || 0u32).unwrap();
//! assert!(std::sync::Arc::ptr_eq(&counter, &again));
//! ```

mod address;
mod error;
mod global;
mod value;

pub use address::{Address, AddressError};
pub use error::{CoreError, Result};
pub use global::{well_known, GlobalScope, Slot};
pub use value::Value;
