//! The page-wide namespace shared by every bundle in a host process.
//!
//! Independently compiled bundles cannot hold references to each other's
//! statics. Instead they agree on [`well_known`] addresses and use the
//! locate-or-create protocol: the first bundle to ask publishes an instance,
//! every later ask attaches to it.

use std::any::{type_name, Any};
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::{Address, CoreError, Result};

/// A type-erased value published in a `GlobalScope`.
pub type Slot = Arc<dyn Any + Send + Sync>;

/// Well-known addresses shared between hosts and remotes.
pub mod well_known {
    use crate::{Address, AddressError};

    /// Root of the share-scope tables, one per scope name.
    pub const SHARE_SCOPES: &str = "__federation__/share_scopes";

    /// Root of containers published by remotes that do not export them.
    pub const CONTAINERS: &str = "__federation__/containers";

    /// Loaded containers and in-flight loads, shared by every loader.
    pub const CONTAINER_CACHE: &str = "__federation__/container_cache";

    /// The single shared state store.
    pub const SHELL_STORE: &str = "__shell__/store";

    fn under(root: &str, name: &str) -> Result<Address, AddressError> {
        Address::parse(root)?.child(name)
    }

    pub fn share_scope(name: &str) -> Result<Address, AddressError> {
        under(SHARE_SCOPES, name)
    }

    pub fn container(scope: &str) -> Result<Address, AddressError> {
        under(CONTAINERS, scope)
    }

    pub fn container_cache() -> Address {
        Address {
            components: vec!["__federation__".to_string(), "container_cache".to_string()],
        }
    }

    pub fn shell_store() -> Address {
        Address {
            components: vec!["__shell__".to_string(), "store".to_string()],
        }
    }
}

/// A locate-or-create namespace of type-erased slots.
///
/// Cloning a `GlobalScope` yields another handle to the same namespace. Tests
/// create a fresh scope per simulated page; production code uses
/// [`GlobalScope::page`].
#[derive(Clone, Default)]
pub struct GlobalScope {
    slots: Arc<RwLock<BTreeMap<Address, Slot>>>,
}

static PAGE: OnceLock<GlobalScope> = OnceLock::new();

impl GlobalScope {
    /// Create an empty, isolated scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide scope.
    pub fn page() -> &'static GlobalScope {
        PAGE.get_or_init(GlobalScope::new)
    }

    /// Whether two handles point at the same namespace.
    pub fn same_scope(&self, other: &GlobalScope) -> bool {
        Arc::ptr_eq(&self.slots, &other.slots)
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.slots.read().contains_key(address)
    }

    /// Locate the value at `address`.
    ///
    /// Returns `Ok(None)` for an empty slot and `TypeMismatch` when the slot
    /// is occupied by something other than a `T`.
    pub fn locate<T: Any + Send + Sync>(&self, address: &Address) -> Result<Option<Arc<T>>> {
        let slot = self.slots.read().get(address).cloned();
        slot.map(|slot| downcast(address, slot)).transpose()
    }

    /// Return the raw slot at `address`.
    pub fn locate_slot(&self, address: &Address) -> Option<Slot> {
        self.slots.read().get(address).cloned()
    }

    /// Locate the value at `address`, publishing `create()` if the slot is empty.
    ///
    /// `create` runs without any lock held, so it may itself use this scope.
    /// When two callers race, exactly one instance is published and both
    /// receive it; the loser's candidate is dropped.
    pub fn locate_or_create<T, F>(&self, address: &Address, create: F) -> Result<Arc<T>>
    where
        T: Any + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(existing) = self.locate::<T>(address)? {
            return Ok(existing);
        }

        let candidate = Arc::new(create());
        self.publish_arc(address, candidate)
    }

    /// Publish `value` unless the slot is taken. Returns the occupant.
    pub fn publish<T: Any + Send + Sync>(&self, address: &Address, value: T) -> Result<Arc<T>> {
        self.publish_arc(address, Arc::new(value))
    }

    /// Publish an existing `Arc` unless the slot is taken. Returns the occupant.
    pub fn publish_arc<T: Any + Send + Sync>(
        &self,
        address: &Address,
        value: Arc<T>,
    ) -> Result<Arc<T>> {
        let mut slots = self.slots.write();
        match slots.get(address) {
            Some(occupant) => downcast(address, occupant.clone()),
            None => {
                slots.insert(address.clone(), value.clone());
                Ok(value)
            }
        }
    }

    /// Remove and return the slot at `address`.
    pub fn remove(&self, address: &Address) -> Option<Slot> {
        self.slots.write().remove(address)
    }

    /// All occupied addresses under `prefix`.
    pub fn addresses_under(&self, prefix: &Address) -> Vec<Address> {
        self.slots
            .read()
            .keys()
            .filter(|a| a.has_prefix(prefix))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for GlobalScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GlobalScope")
            .field("slots", &self.slots.read().keys().collect::<Vec<_>>())
            .finish()
    }
}

fn downcast<T: Any + Send + Sync>(address: &Address, slot: Slot) -> Result<Arc<T>> {
    slot.downcast::<T>().map_err(|_| CoreError::TypeMismatch {
        address: address.clone(),
        expected: type_name::<T>(),
    })
}
