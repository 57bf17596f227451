//! Data-only remotes described by a JSON manifest.
//!
//! ```json
//! {
//!   "scope": "settings_app",
//!   "shared": { "ui": "^18.0.0" },
//!   "modules": {
//!     "./SettingsPage": { "title": "Settings", "sections": ["profile", "billing"] }
//!   }
//! }
//! ```
//!
//! The container checks the `shared` requirements against the share scope at
//! `init`, and `get` returns each module's JSON as its `default` export. A
//! manifest without `modules` has no `get` export and fails shape validation.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mosaic_core::Value;
use mosaic_federation::{
    ContainerError, ContainerGet, ContainerInit, EntryEvaluator, EntryModule, Export,
    ImportError, InitScope, Module, ModuleFactory, ShareScope,
};
use serde::{Deserialize, Serialize};
use url::Url;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub scope: String,
    /// Package name to version requirement.
    #[serde(default)]
    pub shared: BTreeMap<String, String>,
    #[serde(default)]
    pub modules: Option<BTreeMap<String, Value>>,
}

/// Evaluates JSON manifests into containers.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEntryEvaluator;

#[async_trait]
impl EntryEvaluator for JsonEntryEvaluator {
    async fn evaluate(&self, url: &Url, source: Bytes) -> Result<EntryModule, ImportError> {
        let manifest: Manifest =
            serde_json::from_slice(&source).map_err(|e| ImportError::Evaluate {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(manifest.into_entry())
    }
}

impl Manifest {
    pub fn into_entry(self) -> EntryModule {
        let Manifest {
            scope,
            shared,
            modules,
        } = self;
        let has_modules = modules.is_some();
        let container = Arc::new(ManifestContainer {
            scope,
            shared,
            modules: modules.unwrap_or_default(),
            initialized: AtomicBool::new(false),
        });

        let mut module = Module::new().with("init", Export::Init(container.clone()));
        if has_modules {
            module.insert("get", Export::Get(container));
        }
        EntryModule::new(module)
    }
}

struct ManifestContainer {
    scope: String,
    shared: BTreeMap<String, String>,
    modules: BTreeMap<String, Value>,
    initialized: AtomicBool,
}

#[async_trait]
impl ContainerInit for ManifestContainer {
    async fn init(&self, share_scope: &ShareScope, _: &InitScope) -> Result<(), ContainerError> {
        for (package, required) in &self.shared {
            let provided = share_scope.version(package).ok_or_else(|| {
                ContainerError::failed(format!(
                    "{} requires shared package {package} {required}, which is not shared",
                    self.scope
                ))
            })?;
            if !satisfies(required, &provided) {
                return Err(ContainerError::failed(format!(
                    "{} requires shared package {package} {required}, scope provides {provided}",
                    self.scope
                )));
            }
        }
        self.initialized.store(true, Ordering::Release);
        Ok(())
    }
}

#[async_trait]
impl ContainerGet for ManifestContainer {
    async fn get(&self, module: &str) -> Result<ModuleFactory, ContainerError> {
        if !self.initialized.load(Ordering::Acquire) {
            return Err(ContainerError::NotInitialized {
                scope: self.scope.clone(),
            });
        }
        let value = self
            .modules
            .get(module)
            .cloned()
            .ok_or_else(|| ContainerError::NotExposed {
                module: module.to_string(),
            })?;
        Ok(Arc::new(move || {
            Ok(Module::new().with("default", value.clone()))
        }))
    }
}

/// Version requirement check: `*`, `^x.y.z` (same major) or an exact version.
pub fn satisfies(required: &str, provided: &str) -> bool {
    let required = required.trim();
    if required == "*" {
        return true;
    }
    match required.strip_prefix('^') {
        Some(caret) => major(caret).is_some() && major(caret) == major(provided),
        None => required == provided.trim(),
    }
}

fn major(version: &str) -> Option<u64> {
    version.trim().split('.').next()?.parse().ok()
}
