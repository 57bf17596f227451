//! WebAssembly components as remote containers.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use mosaic_core::GlobalScope;
use mosaic_federation::{
    entry_key, ContainerError, ContainerGet, ContainerInit, EntryEvaluator, EntryModule, Export,
    ImportError, InitScope, Module, ModuleFactory, ShareScope,
};
use mosaic_store::SharedStore;
use parking_lot::Mutex;
use tracing::debug;
use url::Url;
use wasmtime::component::{Component, HasSelf, Linker};
use wasmtime::{Config, Engine, Store};

use crate::bindings::exports::mosaic::remote::container::ContainerError as WitContainerError;
use crate::bindings::mosaic::remote::host::SharedPackage as WitSharedPackage;
use crate::bindings::RemoteEntry;
use crate::error::{Result, WasmError};
use crate::host::{wit_to_value, WasmRemoteState};

/// Evaluates entry bytes as a `mosaic:remote/remote-entry` component.
///
/// Every evaluated instance shares the page's store, so guests read and write
/// the same state the host does.
pub struct WasmEvaluator {
    engine: Engine,
    store: Arc<SharedStore>,
}

impl WasmEvaluator {
    pub fn new(global: &GlobalScope) -> Result<Self> {
        let mut config = Config::new();
        config.wasm_component_model(true);
        let engine = Engine::new(&config).map_err(|e| WasmError::wasmtime("engine", e))?;
        let store = SharedStore::get_or_create(global)?;
        Ok(Self { engine, store })
    }

    /// Compile and instantiate a component, wrapping it as an entry module.
    pub fn instantiate(&self, label: &str, bytes: &[u8]) -> Result<EntryModule> {
        let component =
            Component::new(&self.engine, bytes).map_err(|e| WasmError::wasmtime("compile", e))?;

        let mut linker = Linker::<WasmRemoteState>::new(&self.engine);
        RemoteEntry::add_to_linker::<WasmRemoteState, HasSelf<WasmRemoteState>>(
            &mut linker,
            |state: &mut WasmRemoteState| state,
        )
        .map_err(|e| WasmError::wasmtime("linker", e))?;

        let mut store = Store::new(
            &self.engine,
            WasmRemoteState::new(label, self.store.clone()),
        );
        let entry = RemoteEntry::instantiate(&mut store, &component, &linker)
            .map_err(|e| WasmError::wasmtime("instantiate", e))?;
        debug!(remote = %label, "instantiated wasm remote");

        let container = WasmContainer {
            label: label.to_string(),
            instance: Mutex::new(Instance { store, entry }),
        };
        Ok(EntryModule::new(Module::container(container)))
    }

    /// Read a component from disk and instantiate it.
    pub fn instantiate_file(&self, path: impl AsRef<std::path::Path>) -> Result<EntryModule> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        self.instantiate(&path.display().to_string(), &bytes)
    }
}

#[async_trait]
impl EntryEvaluator for WasmEvaluator {
    async fn evaluate(&self, url: &Url, source: Bytes) -> std::result::Result<EntryModule, ImportError> {
        self.instantiate(&entry_key(url), &source)
            .map_err(|e| ImportError::Evaluate {
                url: url.to_string(),
                message: e.to_string(),
            })
    }
}

struct Instance {
    store: Store<WasmRemoteState>,
    entry: RemoteEntry,
}

/// One instantiated component. Calls into the guest are serialized.
pub struct WasmContainer {
    label: String,
    instance: Mutex<Instance>,
}

impl WasmContainer {
    fn guest_error(&self, error: WitContainerError) -> ContainerError {
        match error {
            WitContainerError::NotInitialized => ContainerError::NotInitialized {
                scope: self.label.clone(),
            },
            WitContainerError::NotExposed(module) => ContainerError::NotExposed { module },
            WitContainerError::Failed(message) => ContainerError::Failed { message },
        }
    }

    fn trap(&self, call: &str, error: wasmtime::Error) -> ContainerError {
        ContainerError::failed(format!("{} trapped in {call}: {error}", self.label))
    }
}

#[async_trait]
impl ContainerInit for WasmContainer {
    async fn init(
        &self,
        share_scope: &ShareScope,
        _: &InitScope,
    ) -> std::result::Result<(), ContainerError> {
        let shared: Vec<WitSharedPackage> = share_scope
            .packages()
            .into_iter()
            .map(|p| WitSharedPackage {
                name: p.name,
                version: p.version,
                initialized: p.initialized,
            })
            .collect();

        let mut guard = self.instance.lock();
        let Instance { store, entry } = &mut *guard;
        store
            .data_mut()
            .share_scope
            .get_or_insert_with(|| share_scope.clone());

        entry
            .mosaic_remote_container()
            .call_init(&mut *store, &shared)
            .map_err(|e| self.trap("init", e))?
            .map_err(|e| self.guest_error(e))
    }
}

#[async_trait]
impl ContainerGet for WasmContainer {
    async fn get(&self, module: &str) -> std::result::Result<ModuleFactory, ContainerError> {
        let entries = {
            let mut guard = self.instance.lock();
            let Instance { store, entry } = &mut *guard;
            entry
                .mosaic_remote_container()
                .call_get(&mut *store, module)
                .map_err(|e| self.trap("get", e))?
                .map_err(|e| self.guest_error(e))?
        };

        let mut exports = Module::new();
        for entry in entries {
            let value = wit_to_value(entry.val).map_err(|e| {
                ContainerError::failed(format!(
                    "{} export {} is not valid json: {e}",
                    self.label, entry.name
                ))
            })?;
            exports.insert(entry.name, Export::Value(value));
        }
        Ok(Arc::new(move || Ok(exports.clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn evaluator() -> WasmEvaluator {
        WasmEvaluator::new(&GlobalScope::new()).unwrap()
    }

    #[test]
    fn evaluator_shares_the_page_store() {
        let page = GlobalScope::new();
        let evaluator = WasmEvaluator::new(&page).unwrap();
        assert!(Arc::ptr_eq(
            &evaluator.store,
            &SharedStore::get_or_create(&page).unwrap()
        ));
    }

    #[test]
    fn garbage_is_a_compile_error() {
        let result = evaluator().instantiate("junk", &[0x00, 0x61, 0x73, 0x6d]);
        assert!(matches!(
            result,
            Err(WasmError::Wasmtime {
                stage: "compile",
                ..
            })
        ));
    }

    #[test]
    fn instantiate_file_not_found() {
        let result = evaluator().instantiate_file("/nonexistent/path/to/remote.wasm");
        assert!(matches!(result, Err(WasmError::Io(_))));
    }

    #[test]
    fn instantiate_file_reads_the_bytes() {
        use std::io::Write;
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(b"not a component").unwrap();

        // Bytes were read, so the failure is at compile, not io.
        let result = evaluator().instantiate_file(temp.path());
        assert!(matches!(
            result,
            Err(WasmError::Wasmtime {
                stage: "compile",
                ..
            })
        ));
    }

    #[tokio::test]
    async fn evaluate_reports_the_url() {
        let url = Url::parse("https://cdn.example.com/users/remote.wasm?t=abc").unwrap();
        let error = evaluator()
            .evaluate(&url, Bytes::from_static(b"\0asm"))
            .await
            .unwrap_err();
        match error {
            ImportError::Evaluate { url: reported, .. } => assert_eq!(reported, url.to_string()),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn core_module_is_not_a_component() {
        // A valid core module (magic plus version 1) is still not a component.
        let core = [0x00, 0x61, 0x73, 0x6d, 0x01, 0x00, 0x00, 0x00];
        assert!(evaluator().instantiate("core", &core).is_err());
    }
}
