//! Error types for the federated-module loader.
//!
//! Every error here is `Clone`: one load outcome is broadcast to all callers
//! that joined the same in-flight load.

use mosaic_core::CoreError;
use thiserror::Error;

/// Failures raised by a remote container's `init`, `get`, or module factory.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContainerError {
    /// `get` (or a factory) ran before the container's `init` completed.
    #[error("container `{scope}` used before initialization")]
    NotInitialized { scope: String },

    #[error("module not exposed: {module}")]
    NotExposed { module: String },

    #[error("{message}")]
    Failed { message: String },
}

impl ContainerError {
    pub fn failed(message: impl std::fmt::Display) -> Self {
        Self::Failed {
            message: message.to_string(),
        }
    }
}

/// Failures turning an entry URL into an entry module.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportError {
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    #[error("timed out fetching {url}")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The entry was fetched but could not be turned into a module.
    #[error("failed to evaluate {url}: {message}")]
    Evaluate { url: String, message: String },

    #[error("no entry available at {url}")]
    NotFound { url: String },
}

/// Share-scope failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShareError {
    #[error("package not shared: {package}")]
    UnknownPackage { package: String },

    #[error("failed to load shared package {package}: {message}")]
    Load { package: String, message: String },

    #[error("shared package {package} is not a {expected}")]
    TypeMismatch {
        package: String,
        expected: &'static str,
    },

    /// A container required a package version the scope does not provide.
    #[error("shared package {package} {required} required, scope provides {provided}")]
    VersionMismatch {
        package: String,
        required: String,
        provided: String,
    },

    #[error(transparent)]
    Core(#[from] CoreError),
}

impl ShareError {
    pub fn load(package: impl Into<String>, message: impl std::fmt::Display) -> Self {
        Self::Load {
            package: package.into(),
            message: message.to_string(),
        }
    }
}

/// Everything `Loader::load_component` can fail with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("unknown remote: {name}")]
    UnknownRemote { name: String },

    /// The entry did not yield a usable container.
    #[error("remote {name} failed to initialize: {reason}")]
    RemoteInitializationFailed { name: String, reason: String },

    #[error("timed out loading remote {name}")]
    RemoteLoadTimeout { name: String },

    #[error("failed to import remote {name}: {source}")]
    Import {
        name: String,
        #[source]
        source: ImportError,
    },

    /// The remote's container was used before its `init` ran.
    #[error("remote {name} (scope {scope}) used before its container was initialized")]
    InitializationOrderingRace { name: String, scope: String },

    #[error("container error in remote {name}: {source}")]
    Container {
        name: String,
        #[source]
        source: ContainerError,
    },

    #[error("share scope error in remote {name}: {source}")]
    Share {
        name: String,
        #[source]
        source: ShareError,
    },

    /// The caller leading the load was cancelled before it finished.
    #[error("load of remote {name} aborted")]
    Aborted { name: String },
}

impl LoadError {
    /// The remote this error belongs to.
    pub fn name(&self) -> &str {
        match self {
            Self::UnknownRemote { name }
            | Self::RemoteInitializationFailed { name, .. }
            | Self::RemoteLoadTimeout { name }
            | Self::Import { name, .. }
            | Self::InitializationOrderingRace { name, .. }
            | Self::Container { name, .. }
            | Self::Share { name, .. }
            | Self::Aborted { name } => name,
        }
    }

    /// Whether the general retry policy may try again.
    ///
    /// Configuration and shape errors are permanent; an aborted load is
    /// retried by whoever calls `load_component` next.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::UnknownRemote { .. }
            | Self::RemoteInitializationFailed { .. }
            | Self::Aborted { .. } => false,
            Self::RemoteLoadTimeout { .. }
            | Self::Import { .. }
            | Self::InitializationOrderingRace { .. }
            | Self::Container { .. }
            | Self::Share { .. } => true,
        }
    }

    pub fn is_ordering_race(&self) -> bool {
        matches!(self, Self::InitializationOrderingRace { .. })
    }

    /// Classify a container failure, promoting `NotInitialized` to an
    /// ordering race.
    pub(crate) fn from_container(name: &str, source: ContainerError) -> Self {
        match source {
            ContainerError::NotInitialized { scope } => Self::InitializationOrderingRace {
                name: name.to_string(),
                scope,
            },
            source => Self::Container {
                name: name.to_string(),
                source,
            },
        }
    }

    pub(crate) fn from_import(name: &str, source: ImportError) -> Self {
        match source {
            ImportError::Timeout { .. } => Self::RemoteLoadTimeout {
                name: name.to_string(),
            },
            source => Self::Import {
                name: name.to_string(),
                source,
            },
        }
    }
}
