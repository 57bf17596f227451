//! Share scopes: one copy of each shared dependency per page.
//!
//! Every remote is initialized against a share scope. The first bundle to
//! register a package supplies its loader and version; later registrations of
//! the same package are ignored, so every remote ends up using that one copy.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use mosaic_core::{well_known, CoreError, GlobalScope};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::ShareError;

/// Scope used when a caller does not name one.
pub const DEFAULT_SCOPE: &str = "default";

/// A loaded shared package.
pub type SharedModule = Arc<dyn Any + Send + Sync>;

/// Produces a shared package on first use.
pub type PackageLoader =
    Arc<dyn Fn() -> BoxFuture<'static, Result<SharedModule, ShareError>> + Send + Sync>;

/// One shared package within a scope.
pub struct ShareScopeEntry {
    pub package_name: String,
    pub version: String,
    pub registered_by: String,
    loader: PackageLoader,
    module: OnceCell<SharedModule>,
}

impl ShareScopeEntry {
    /// True once the loader has produced the module.
    pub fn initialized(&self) -> bool {
        self.module.initialized()
    }

    /// The module, loading it on first call. Concurrent callers share one load;
    /// a failed load leaves the entry unloaded so a later call can try again.
    pub async fn module(&self) -> Result<SharedModule, ShareError> {
        self.module
            .get_or_try_init(|| (self.loader)())
            .await
            .cloned()
    }
}

impl std::fmt::Debug for ShareScopeEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareScopeEntry")
            .field("package_name", &self.package_name)
            .field("version", &self.version)
            .field("registered_by", &self.registered_by)
            .field("initialized", &self.initialized())
            .finish()
    }
}

/// Summary of a shared package, for runtimes that cannot hold Rust types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SharedPackage {
    pub name: String,
    pub version: String,
    pub initialized: bool,
}

#[derive(Default)]
struct ScopeTable {
    entries: RwLock<BTreeMap<String, Arc<ShareScopeEntry>>>,
}

/// Handle to a named share scope published in a [`GlobalScope`].
///
/// Cloning is cheap; every clone and every `ensure` of the same name on the
/// same page sees the same table.
#[derive(Clone)]
pub struct ShareScope {
    name: String,
    table: Arc<ScopeTable>,
}

impl ShareScope {
    /// The `default` scope of `global`, created on first call.
    pub fn ensure(global: &GlobalScope) -> Result<ShareScope, ShareError> {
        Self::ensure_named(global, DEFAULT_SCOPE)
    }

    /// The scope called `name` on `global`, created on first call.
    pub fn ensure_named(global: &GlobalScope, name: &str) -> Result<ShareScope, ShareError> {
        let address = well_known::share_scope(name).map_err(CoreError::from)?;
        let table = global.locate_or_create(&address, || {
            debug!(scope = %name, "creating share scope");
            ScopeTable::default()
        })?;
        Ok(ShareScope {
            name: name.to_string(),
            table,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether both handles refer to the same table.
    pub fn same_scope(&self, other: &ShareScope) -> bool {
        Arc::ptr_eq(&self.table, &other.table)
    }

    /// Register a lazily loaded package. Returns `false` if the package was
    /// already registered, in which case `loader` is dropped unused.
    pub fn register<F, Fut>(
        &self,
        package: &str,
        version: &str,
        registered_by: &str,
        loader: F,
    ) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<SharedModule, ShareError>> + Send + 'static,
    {
        let loader: PackageLoader = Arc::new(move || loader().boxed());
        self.insert(package, version, registered_by, loader, OnceCell::new())
    }

    /// Register an already constructed package.
    pub fn provide<T: Any + Send + Sync>(
        &self,
        package: &str,
        version: &str,
        registered_by: &str,
        value: T,
    ) -> bool {
        let module: SharedModule = Arc::new(value);
        let cell = OnceCell::new_with(Some(module.clone()));
        let loader: PackageLoader = Arc::new(move || {
            let module = module.clone();
            async move { Ok(module) }.boxed()
        });
        self.insert(package, version, registered_by, loader, cell)
    }

    fn insert(
        &self,
        package: &str,
        version: &str,
        registered_by: &str,
        loader: PackageLoader,
        module: OnceCell<SharedModule>,
    ) -> bool {
        let mut entries = self.table.entries.write();
        if let Some(existing) = entries.get(package) {
            debug!(
                scope = %self.name,
                package,
                kept = %existing.version,
                ignored = version,
                registered_by,
                "shared package already registered"
            );
            return false;
        }
        entries.insert(
            package.to_string(),
            Arc::new(ShareScopeEntry {
                package_name: package.to_string(),
                version: version.to_string(),
                registered_by: registered_by.to_string(),
                loader,
                module,
            }),
        );
        true
    }

    pub fn entry(&self, package: &str) -> Option<Arc<ShareScopeEntry>> {
        self.table.entries.read().get(package).cloned()
    }

    pub fn contains(&self, package: &str) -> bool {
        self.table.entries.read().contains_key(package)
    }

    pub fn version(&self, package: &str) -> Option<String> {
        self.entry(package).map(|e| e.version.clone())
    }

    /// The shared package, loading it at most once for the whole page.
    pub async fn get(&self, package: &str) -> Result<SharedModule, ShareError> {
        let entry = self
            .entry(package)
            .ok_or_else(|| ShareError::UnknownPackage {
                package: package.to_string(),
            })?;
        entry.module().await
    }

    /// Like [`get`](Self::get), downcast to `T`.
    pub async fn get_as<T: Any + Send + Sync>(&self, package: &str) -> Result<Arc<T>, ShareError> {
        self.get(package)
            .await?
            .downcast::<T>()
            .map_err(|_| ShareError::TypeMismatch {
                package: package.to_string(),
                expected: type_name::<T>(),
            })
    }

    pub fn packages(&self) -> Vec<SharedPackage> {
        self.table
            .entries
            .read()
            .values()
            .map(|e| SharedPackage {
                name: e.package_name.clone(),
                version: e.version.clone(),
                initialized: e.initialized(),
            })
            .collect()
    }
}

impl std::fmt::Debug for ShareScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShareScope")
            .field("name", &self.name)
            .field("packages", &self.packages())
            .finish()
    }
}
