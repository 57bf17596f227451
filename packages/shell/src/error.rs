//! Error types for the shell.

use mosaic_federation::{LoadError, RegistryError};
use mosaic_http::HttpError;
use mosaic_store::StoreError;
use mosaic_wasm::WasmError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ShellError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Wasm(#[from] WasmError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{failed} of {total} remotes failed to preload")]
    Preload { failed: usize, total: usize },

    #[error("{down} of {total} remotes are down")]
    Unhealthy { down: usize, total: usize },
}

pub type Result<T> = std::result::Result<T, ShellError>;
