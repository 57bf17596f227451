//! Error types for WebAssembly remotes.

use mosaic_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WasmError {
    /// Wasmtime failed at the named stage (engine, compile, linker, instantiate).
    #[error("wasmtime {stage} failed: {message}")]
    Wasmtime {
        stage: &'static str,
        message: String,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl WasmError {
    pub(crate) fn wasmtime(stage: &'static str, error: impl std::fmt::Display) -> Self {
        Self::Wasmtime {
            stage,
            message: error.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, WasmError>;
