//! # mosaic-http
//!
//! Remotes served over HTTP.
//!
//! - [`HttpImporter`]: fetches entry URLs with reqwest and evaluates them with
//!   a pluggable [`EntryEvaluator`](mosaic_federation::EntryEvaluator)
//! - [`JsonEntryEvaluator`]: data-only remotes described by a JSON manifest
//! - [`HealthProbe`] / [`HealthMonitor`]: development-time reachability checks
//!
//! ```ignore
//! let importer = HttpImporter::with_timeout(JsonEntryEvaluator, Duration::from_secs(10))?;
//! let loader = Loader::new(registry, importer, LoaderConfig::default(), GlobalScope::page())?;
//! let settings = loader.load_component("settings").await?;
//! ```

pub mod health;
pub mod manifest;

mod error;
mod importer;

pub use error::HttpError;
pub use health::{HealthMonitor, HealthProbe, HealthStatus, MonitorHandle, RemoteHealth};
pub use importer::HttpImporter;
pub use manifest::{JsonEntryEvaluator, Manifest};
