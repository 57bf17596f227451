//! Remote containers and the modules they expose.
//!
//! A remote's entry evaluates to a [`Module`]: a namespace of named exports.
//! The entry is a usable container when it carries an `init` hook and a `get`
//! export, either on its `default` namespace or on the module itself.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use mosaic_core::{well_known, CoreError, GlobalScope, Value};

use crate::error::ContainerError;
use crate::share_scope::ShareScope;

/// Scopes already visited by an `init` chain.
pub type InitScope = [String];

/// Instantiates an exposed module.
pub type ModuleFactory = Arc<dyn Fn() -> Result<Module, ContainerError> + Send + Sync>;

/// The `init` half of the container contract. Must be idempotent.
#[async_trait]
pub trait ContainerInit: Send + Sync {
    async fn init(&self, share_scope: &ShareScope, init_scope: &InitScope)
        -> Result<(), ContainerError>;
}

/// The `get` half of the container contract.
#[async_trait]
pub trait ContainerGet: Send + Sync {
    async fn get(&self, module: &str) -> Result<ModuleFactory, ContainerError>;
}

/// Both halves of the contract on one type.
pub trait Container: ContainerInit + ContainerGet {}

impl<T: ContainerInit + ContainerGet> Container for T {}

/// One named export of a module.
#[derive(Clone)]
pub enum Export {
    Init(Arc<dyn ContainerInit>),
    Get(Arc<dyn ContainerGet>),
    Value(Value),
    Object(Arc<dyn Any + Send + Sync>),
    Namespace(Module),
}

/// What `load_component` hands back: the `default` export of the exposed
/// module, or the module itself as a namespace.
pub type Component = Export;

impl Export {
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Export::Object(Arc::new(value))
    }

    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Export::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_namespace(&self) -> Option<&Module> {
        match self {
            Export::Namespace(module) => Some(module),
            _ => None,
        }
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        match self {
            Export::Object(object) => object.clone().downcast::<T>().ok(),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Export::Init(_) => "init",
            Export::Get(_) => "get",
            Export::Value(_) => "value",
            Export::Object(_) => "object",
            Export::Namespace(_) => "namespace",
        }
    }
}

impl fmt::Debug for Export {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Export::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Export::Namespace(module) => f.debug_tuple("Namespace").field(module).finish(),
            other => write!(f, "{}(..)", other.kind()),
        }
    }
}

impl From<Value> for Export {
    fn from(value: Value) -> Self {
        Export::Value(value)
    }
}

impl From<Module> for Export {
    fn from(module: Module) -> Self {
        Export::Namespace(module)
    }
}

/// A namespace of named exports.
#[derive(Clone, Default)]
pub struct Module {
    exports: BTreeMap<String, Export>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    /// A module exposing `container` as its `init` and `get` exports.
    pub fn container<C: Container + 'static>(container: C) -> Self {
        let container = Arc::new(container);
        Module::new()
            .with("init", Export::Init(container.clone()))
            .with("get", Export::Get(container))
    }

    pub fn with(mut self, name: impl Into<String>, export: impl Into<Export>) -> Self {
        self.insert(name, export);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, export: impl Into<Export>) {
        self.exports.insert(name.into(), export.into());
    }

    pub fn get(&self, name: &str) -> Option<&Export> {
        self.exports.get(name)
    }

    pub fn default_export(&self) -> Option<&Export> {
        self.get("default")
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exports.is_empty()
    }

    /// The `default` export, or the whole module when there is none.
    pub fn into_component(mut self) -> Component {
        match self.exports.remove("default") {
            Some(default) => default,
            None => Export::Namespace(self),
        }
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.exports.iter()).finish()
    }
}

/// The result of importing an entry URL.
pub struct EntryModule {
    pub module: Module,
    /// Top-level work the entry must finish before its container is usable.
    pub ready: Option<BoxFuture<'static, Result<(), ContainerError>>>,
}

impl EntryModule {
    pub fn new(module: Module) -> Self {
        Self {
            module,
            ready: None,
        }
    }

    pub fn with_ready(mut self, ready: BoxFuture<'static, Result<(), ContainerError>>) -> Self {
        self.ready = Some(ready);
        self
    }
}

impl From<Module> for EntryModule {
    fn from(module: Module) -> Self {
        EntryModule::new(module)
    }
}

impl fmt::Debug for EntryModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryModule")
            .field("module", &self.module)
            .field("ready", &self.ready.is_some())
            .finish()
    }
}

/// A validated container.
#[derive(Clone)]
pub struct RemoteContainer {
    scope: String,
    init: Arc<dyn ContainerInit>,
    get: Arc<dyn ContainerGet>,
}

impl RemoteContainer {
    pub fn new<C: Container + 'static>(scope: impl Into<String>, container: Arc<C>) -> Self {
        Self {
            scope: scope.into(),
            init: container.clone(),
            get: container,
        }
    }

    /// Validate the container shape of an entry module.
    ///
    /// The `default` namespace is checked first, then the module itself.
    pub fn from_module(scope: &str, module: &Module) -> Option<Self> {
        module
            .default_export()
            .and_then(Export::as_namespace)
            .and_then(|default| Self::from_exports(scope, default))
            .or_else(|| Self::from_exports(scope, module))
    }

    fn from_exports(scope: &str, module: &Module) -> Option<Self> {
        match (module.get("init"), module.get("get")) {
            (Some(Export::Init(init)), Some(Export::Get(get))) => Some(Self {
                scope: scope.to_string(),
                init: init.clone(),
                get: get.clone(),
            }),
            _ => None,
        }
    }

    /// Make this container reachable under its scope name for remotes whose
    /// entry publishes the container instead of exporting it. Returns the
    /// container already published there, if any.
    pub fn publish(self, global: &GlobalScope) -> Result<RemoteContainer, CoreError> {
        let address = well_known::container(&self.scope)?;
        let published = global.publish(&address, self)?;
        Ok(published.as_ref().clone())
    }

    /// The container published under `scope`, if any.
    pub fn locate(global: &GlobalScope, scope: &str) -> Result<Option<RemoteContainer>, CoreError> {
        let address = well_known::container(scope)?;
        Ok(global
            .locate::<RemoteContainer>(&address)?
            .map(|c| c.as_ref().clone()))
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub async fn init(
        &self,
        share_scope: &ShareScope,
        init_scope: &InitScope,
    ) -> Result<(), ContainerError> {
        self.init.init(share_scope, init_scope).await
    }

    pub async fn get(&self, module: &str) -> Result<ModuleFactory, ContainerError> {
        self.get.get(module).await
    }
}

impl fmt::Debug for RemoteContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteContainer")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Default)]
    struct Greeter {
        ready: AtomicBool,
    }

    #[async_trait]
    impl ContainerInit for Greeter {
        async fn init(&self, _: &ShareScope, _: &InitScope) -> Result<(), ContainerError> {
            self.ready.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[async_trait]
    impl ContainerGet for Greeter {
        async fn get(&self, module: &str) -> Result<ModuleFactory, ContainerError> {
            if !self.ready.load(Ordering::SeqCst) {
                return Err(ContainerError::NotInitialized {
                    scope: "greeter".into(),
                });
            }
            match module {
                "./Hello" => Ok(Arc::new(|| {
                    Ok(Module::new().with("default", Value::from("hello")))
                })),
                other => Err(ContainerError::NotExposed {
                    module: other.to_string(),
                }),
            }
        }
    }

    #[tokio::test]
    async fn container_from_default_namespace_or_module() {
        let flat = Module::container(Greeter::default());
        assert!(RemoteContainer::from_module("greeter", &flat).is_some());

        let nested = Module::new().with("default", Module::container(Greeter::default()));
        let container = RemoteContainer::from_module("greeter", &nested).unwrap();
        assert_eq!(container.scope(), "greeter");

        let scope = ShareScope::ensure(&GlobalScope::new()).unwrap();
        container.init(&scope, &[]).await.unwrap();
        container.init(&scope, &[]).await.unwrap();
        let factory = container.get("./Hello").await.unwrap();
        let component = factory().unwrap().into_component();
        assert_eq!(component.as_value(), Some(&Value::from("hello")));
    }

    #[test]
    fn missing_get_is_not_a_container() {
        let greeter = Arc::new(Greeter::default());
        let module = Module::new().with("init", Export::Init(greeter));
        assert!(RemoteContainer::from_module("greeter", &module).is_none());

        let module = Module::new().with("default", Value::from("not a namespace"));
        assert!(RemoteContainer::from_module("greeter", &module).is_none());
    }

    #[tokio::test]
    async fn get_before_init_reports_not_initialized() {
        let container = RemoteContainer::new("greeter", Arc::new(Greeter::default()));
        assert!(matches!(
            container.get("./Hello").await,
            Err(ContainerError::NotInitialized { .. })
        ));
    }

    #[test]
    fn published_containers_are_first_writer_wins() {
        let page = GlobalScope::new();
        assert!(RemoteContainer::locate(&page, "greeter").unwrap().is_none());

        let first = Arc::new(Greeter::default());
        RemoteContainer::new("greeter", first.clone())
            .publish(&page)
            .unwrap();
        RemoteContainer::new("greeter", Arc::new(Greeter::default()))
            .publish(&page)
            .unwrap();

        let located = RemoteContainer::locate(&page, "greeter").unwrap().unwrap();
        let expected: Arc<dyn ContainerGet> = first;
        assert!(Arc::ptr_eq(&located.get, &expected));
    }

    #[test]
    fn components_prefer_default_export() {
        let module = Module::new()
            .with("default", Value::from(1i64))
            .with("other", Value::from(2i64));
        assert_eq!(module.into_component().as_value(), Some(&Value::Integer(1)));

        let module = Module::new().with("named", Value::from(2i64));
        let component = module.into_component();
        assert_eq!(
            component.as_namespace().and_then(|m| m.get("named")).and_then(Export::as_value),
            Some(&Value::Integer(2))
        );
    }
}
