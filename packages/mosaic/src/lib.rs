//! Mosaic: runtime federated-module loading for micro-frontend hosts.
//!
//! A host composes independently deployed remotes at run time. Each remote
//! publishes an entry whose container is initialized against a shared scope of
//! singleton packages, then asked for an exposed module. Host and remotes talk
//! through one shared store located at a well-known address.
//!
//! This crate re-exports the workspace crates:
//!
//! - [`core`]: addresses, values and the global scope
//! - [`store`]: the shared state store and its path facade
//! - [`federation`]: share scopes, containers, the registry and the loader
//! - [`http`] (feature `http`, on by default): HTTP importer, manifest remotes, health
//! - [`wasm`] (feature `wasm`): WebAssembly component remotes
//!
//! Every bundle that asks for the store on the same page gets the same one:
//!
//! ```rust
//! use mosaic::core::GlobalScope;
//! use mosaic::store::SharedStore;
//!
//! let page = GlobalScope::new();
//! let host = SharedStore::get_or_create(&page).unwrap();
//! let remote = SharedStore::get_or_create(&page).unwrap();
//!
//! remote.set_tenant_id(Some("acme".into()));
//! assert_eq!(host.tenant_id().as_deref(), Some("acme"));
//! ```

pub use mosaic_core as core;
pub use mosaic_federation as federation;
pub use mosaic_store as store;

#[cfg(feature = "http")]
pub use mosaic_http as http;

#[cfg(feature = "wasm")]
pub use mosaic_wasm as wasm;

pub use mosaic_core::{Address, GlobalScope, Value};
pub use mosaic_federation::{Component, Environment, LoadError, Loader, LoaderConfig, RemoteRegistry};
pub use mosaic_store::SharedStore;
