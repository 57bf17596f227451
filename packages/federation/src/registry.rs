//! The remote registry: logical remote names to entry URLs and scopes.
//!
//! Config files map each environment to its remotes:
//!
//! ```json
//! {
//!   "development": {
//!     "users": { "url": "http://localhost:3001/remoteEntry.json", "scope": "users_app",
//!                "module": "./UsersPage", "cssUrl": "http://localhost:3001/users.css" }
//!   },
//!   "production": { ... }
//! }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use mosaic_core::{Address, AddressError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::environment::Environment;
use crate::error::LoadError;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid remotes config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no remotes configured for environment {0}")]
    MissingEnvironment(Environment),

    /// Scope names become Global Scope address components.
    #[error("remote {remote} has an invalid scope name: {source}")]
    InvalidScope {
        remote: String,
        #[source]
        source: AddressError,
    },
}

/// One remote as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntryConfig {
    pub url: Url,
    pub scope: String,
    pub module: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub css_url: Option<Url>,
}

/// The whole config file, keyed by environment then remote name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemotesConfig {
    pub environments: BTreeMap<Environment, BTreeMap<String, RemoteEntryConfig>>,
}

impl RemotesConfig {
    pub fn from_json(json: &str) -> Result<Self, RegistryError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&json)
    }

    pub fn remotes(&self, environment: Environment) -> Option<&BTreeMap<String, RemoteEntryConfig>> {
        self.environments.get(&environment)
    }
}

/// A remote resolved for the current environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDescriptor {
    pub name: String,
    pub entry_url: Url,
    /// Container scope name, also its Global Scope publication key.
    pub scope: String,
    /// Module path requested from the container's `get`.
    pub exposed_module: String,
    pub style_url: Option<Url>,
}

impl RemoteDescriptor {
    pub fn new(
        name: impl Into<String>,
        entry_url: Url,
        scope: impl Into<String>,
        exposed_module: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entry_url,
            scope: scope.into(),
            exposed_module: exposed_module.into(),
            style_url: None,
        }
    }

    pub fn with_style(mut self, style_url: Url) -> Self {
        self.style_url = Some(style_url);
        self
    }
}

/// Immutable lookup table of remotes.
#[derive(Debug, Clone, Default)]
pub struct RemoteRegistry {
    remotes: BTreeMap<String, RemoteDescriptor>,
}

impl RemoteRegistry {
    pub fn new(remotes: impl IntoIterator<Item = RemoteDescriptor>) -> Self {
        Self {
            remotes: remotes
                .into_iter()
                .map(|remote| (remote.name.clone(), remote))
                .collect(),
        }
    }

    /// Build the registry for `environment`.
    pub fn from_config(
        config: &RemotesConfig,
        environment: Environment,
    ) -> Result<Self, RegistryError> {
        let remotes = config
            .remotes(environment)
            .ok_or(RegistryError::MissingEnvironment(environment))?;

        let mut descriptors = Vec::with_capacity(remotes.len());
        for (name, entry) in remotes {
            Address::parse(&entry.scope).map_err(|source| RegistryError::InvalidScope {
                remote: name.clone(),
                source,
            })?;
            descriptors.push(RemoteDescriptor {
                name: name.clone(),
                entry_url: entry.url.clone(),
                scope: entry.scope.clone(),
                exposed_module: entry.module.clone(),
                style_url: entry.css_url.clone(),
            });
        }
        Ok(Self::new(descriptors))
    }

    pub fn resolve(&self, name: &str) -> Result<&RemoteDescriptor, LoadError> {
        self.remotes.get(name).ok_or_else(|| LoadError::UnknownRemote {
            name: name.to_string(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&RemoteDescriptor> {
        self.remotes.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.remotes.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteDescriptor> {
        self.remotes.values()
    }

    pub fn len(&self) -> usize {
        self.remotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.remotes.is_empty()
    }
}
