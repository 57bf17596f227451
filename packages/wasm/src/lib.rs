//! # mosaic-wasm
//!
//! Remotes compiled to WebAssembly components.
//!
//! A remote built against `wit/remote.wit` exports the container contract
//! (`init` and `get`) and imports a small host interface: logging, shared
//! package versions and the shared store's path facade.
//!
//! ```ignore
//! let evaluator = WasmEvaluator::new(GlobalScope::page())?;
//! let importer = HttpImporter::new(evaluator)?;
//! let loader = Loader::new(registry, importer, LoaderConfig::default(), GlobalScope::page())?;
//! ```

mod bindings {
    wasmtime::component::bindgen!({
        path: "wit/remote.wit",
        world: "remote-entry",
    });
}

mod container;
mod error;
mod host;

pub use container::{WasmContainer, WasmEvaluator};
pub use error::{Result, WasmError};
pub use host::WasmRemoteState;
