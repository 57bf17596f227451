//! # mosaic-federation
//!
//! Runtime loading of independently built remotes into a host.
//!
//! - [`ShareScope`]: one copy of each shared dependency per page
//! - [`RemoteRegistry`]: remote names to entry URLs, per [`Environment`]
//! - [`RemoteContainer`]: the validated `init`/`get` contract of an entry
//! - [`EntryImporter`]: turns entry URLs into [`EntryModule`]s
//! - [`Loader`]: single-flight, retrying `load_component`
//!
//! ```rust
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use mosaic_core::{GlobalScope, Value};
//! use mosaic_federation::*;
//! use url::Url;
//!
//! struct Users;
//!
//! #[async_trait]
//! impl ContainerInit for Users {
//!     async fn init(&self, _: &ShareScope, _: &InitScope) -> Result<(), ContainerError> {
//!         Ok(())
//!     }
//! }
//!
//! #[async_trait]
//! impl ContainerGet for Users {
//!     async fn get(&self, _module: &str) -> Result<ModuleFactory, ContainerError> {
//!         Ok(Arc::new(|| Ok(Module::new().with("default", Value::from("<users-page>")))))
//!     }
//! }
//!
//! let entry = Url::parse("http://localhost:3001/remoteEntry.js")?;
//! let importer = StaticImporter::new().with(&entry, || Ok(Module::container(Users).into()));
//! let registry = RemoteRegistry::new([RemoteDescriptor::new("users", entry, "users_app", "./UsersPage")]);
//!
//! let loader = Loader::new(registry, importer, LoaderConfig::default(), &GlobalScope::new())?;
//! let page = loader.load_component("users").await?;
//! assert_eq!(page.as_value(), Some(&Value::from("<users-page>")));
//! assert!(loader.store().remote_state("users").unwrap().loaded);
//! # Ok(())
//! # }
//! ```

mod cache;
mod container;
mod environment;
mod error;
mod importer;
mod loader;
mod registry;
mod retry;
mod share_scope;

pub use container::{
    Component, Container, ContainerGet, ContainerInit, EntryModule, Export, InitScope, Module,
    ModuleFactory, RemoteContainer,
};
pub use environment::{Environment, ParseEnvironmentError};
pub use error::{ContainerError, ImportError, LoadError, ShareError};
pub use importer::{
    cache_busted, entry_key, EntryEvaluator, EntryFactory, EntryImporter, StaticImporter,
    CACHE_BUST_PARAM,
};
pub use loader::{Loader, LoaderConfig};
pub use registry::{RegistryError, RemoteDescriptor, RemoteEntryConfig, RemoteRegistry, RemotesConfig};
pub use retry::RetryPolicy;
pub use share_scope::{
    PackageLoader, ShareScope, ShareScopeEntry, SharedModule, SharedPackage, DEFAULT_SCOPE,
};
