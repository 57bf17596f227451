//! The shared store: one instance per page, reachable from any bundle.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use chrono::Utc;
use mosaic_core::{well_known, GlobalScope};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::state::{
    AuthState, InitialState, LoadState, NewNotification, Notification, Session, SharedStoreState,
    TenantMetadata, TenantState,
};
use crate::subscription::{self, Check, Slice, Subscription};

/// Cross-bundle state container.
///
/// Hosts and remotes never construct one directly; they call
/// [`SharedStore::get_or_create`] with the page's [`GlobalScope`] and attach to
/// whichever instance was published first.
///
/// Every mutation is field-scoped: it replaces exactly one slice (or one
/// remote's entry) and leaves every other `Arc` untouched.
pub struct SharedStore {
    state: RwLock<SharedStoreState>,
    listeners: Mutex<BTreeMap<u64, Arc<Mutex<Check>>>>,
    next_listener: AtomicU64,
    emitting: AtomicBool,
    pending: AtomicBool,
}

impl SharedStore {
    fn new() -> Self {
        Self {
            state: RwLock::new(SharedStoreState::default()),
            listeners: Mutex::new(BTreeMap::new()),
            next_listener: AtomicU64::new(0),
            emitting: AtomicBool::new(false),
            pending: AtomicBool::new(false),
        }
    }

    /// Attach to the page's store, publishing a fresh one if none exists.
    pub fn get_or_create(global: &GlobalScope) -> Result<Arc<SharedStore>> {
        let store = global.locate_or_create(&well_known::shell_store(), || {
            debug!("publishing shared store");
            SharedStore::new()
        })?;
        Ok(store)
    }

    /// Attach to the process-wide store.
    pub fn global() -> Result<Arc<SharedStore>> {
        Self::get_or_create(GlobalScope::page())
    }

    /// Merge the provided slices into the page's store, creating it if needed.
    pub fn initialize(global: &GlobalScope, initial: InitialState) -> Result<Arc<SharedStore>> {
        let store = Self::get_or_create(global)?;
        store.merge(initial);
        Ok(store)
    }

    /// Shallow merge: each provided slice replaces the current one.
    pub fn merge(&self, initial: InitialState) {
        self.update(|state| {
            if let Some(auth) = initial.auth {
                state.auth = Arc::new(auth);
            }
            if let Some(tenant) = initial.tenant {
                state.tenant = Arc::new(tenant);
            }
            if let Some(notifications) = initial.notifications {
                state.notifications = Arc::new(notifications);
            }
        });
    }

    // ── Reads ───────────────────────────────────────────────────────────

    /// Cheap copy of the current slice pointers.
    pub fn snapshot(&self) -> SharedStoreState {
        self.state.read().clone()
    }

    pub fn session(&self) -> Option<Session> {
        self.state.read().auth.session.clone()
    }

    pub fn tenant(&self) -> Arc<TenantState> {
        self.state.read().tenant.clone()
    }

    pub fn tenant_id(&self) -> Option<String> {
        self.state.read().tenant.tenant_id.clone()
    }

    pub fn notifications(&self) -> Arc<Vec<Notification>> {
        self.state.read().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.read().unread_count()
    }

    /// Load status of a remote; `None` means no load was attempted yet.
    pub fn remote_state(&self, name: &str) -> Option<LoadState> {
        self.state.read().remotes.get(name).map(|s| s.as_ref().clone())
    }

    pub fn remotes(&self) -> Arc<BTreeMap<String, Arc<LoadState>>> {
        self.state.read().remotes.clone()
    }

    // ── Session ─────────────────────────────────────────────────────────

    pub fn set_session(&self, session: Option<Session>) {
        self.update(|state| state.auth = Arc::new(AuthState { session }));
    }

    pub fn clear_session(&self) {
        self.set_session(None);
    }

    // ── Tenant ──────────────────────────────────────────────────────────

    fn edit_tenant<R>(&self, edit: impl FnOnce(&mut TenantState) -> R) -> R {
        self.update(|state| {
            let mut tenant = state.tenant.as_ref().clone();
            let result = edit(&mut tenant);
            state.tenant = Arc::new(tenant);
            result
        })
    }

    pub fn set_tenant_id(&self, tenant_id: Option<String>) {
        self.edit_tenant(|tenant| tenant.tenant_id = tenant_id);
    }

    pub fn set_org_permissions(&self, permissions: Vec<String>) {
        self.edit_tenant(|tenant| tenant.current_org_permissions = permissions);
    }

    pub fn set_tenant_metadata(&self, metadata: Option<TenantMetadata>) {
        self.edit_tenant(|tenant| tenant.tenant_metadata = metadata);
    }

    pub fn set_available_tenants(&self, tenants: Vec<TenantMetadata>) {
        self.edit_tenant(|tenant| tenant.available_tenants = tenants);
    }

    /// Make one of the available tenants current, adopting its permissions.
    pub fn switch_tenant(&self, tenant_id: &str) -> Result<()> {
        let target = self
            .tenant()
            .available_tenants
            .iter()
            .find(|t| t.id == tenant_id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownTenant {
                tenant_id: tenant_id.to_string(),
            })?;

        self.edit_tenant(|tenant| {
            tenant.tenant_id = Some(target.id.clone());
            tenant.current_org_permissions = target.permissions.clone();
            tenant.tenant_metadata = Some(target);
        });
        Ok(())
    }

    // ── Notifications ───────────────────────────────────────────────────

    fn edit_notifications<R>(&self, edit: impl FnOnce(&mut Vec<Notification>) -> R) -> R {
        self.update(|state| {
            let mut list = state.notifications.as_ref().clone();
            let result = edit(&mut list);
            state.notifications = Arc::new(list);
            result
        })
    }

    /// Append a notification and return its id.
    pub fn push_notification(&self, notification: NewNotification) -> String {
        let id = Uuid::new_v4().to_string();
        let entry = Notification {
            id: id.clone(),
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            source: notification.source,
            created_at: Utc::now(),
            read: false,
        };
        self.edit_notifications(|list| list.push(entry));
        id
    }

    /// Mark one notification read. Returns `false` for unknown ids.
    pub fn mark_notification_read(&self, id: &str) -> bool {
        self.edit_notification(id, |list, index| {
            if list[index].read {
                return false;
            }
            list[index].read = true;
            true
        })
    }

    pub fn mark_all_notifications_read(&self) {
        if self.unread_count() == 0 {
            return;
        }
        self.edit_notifications(|list| list.iter_mut().for_each(|n| n.read = true));
    }

    /// Remove a notification. Returns `false` for unknown ids.
    pub fn dismiss_notification(&self, id: &str) -> bool {
        self.edit_notification(id, |list, index| {
            list.remove(index);
            true
        })
    }

    /// Find notification `id` and edit the list under one write lock.
    ///
    /// `edit` returns whether it changed anything; listeners run only if so.
    /// Returns `false` when no notification has that id.
    fn edit_notification(
        &self,
        id: &str,
        edit: impl FnOnce(&mut Vec<Notification>, usize) -> bool,
    ) -> bool {
        let changed = {
            let mut state = self.state.write();
            let Some(index) = state.notifications.iter().position(|n| n.id == id) else {
                return false;
            };
            let mut list = state.notifications.as_ref().clone();
            let changed = edit(&mut list, index);
            if changed {
                state.notifications = Arc::new(list);
            }
            changed
        };
        if changed {
            self.emit();
        }
        true
    }

    pub fn clear_notifications(&self) {
        self.update(|state| state.notifications = Arc::new(Vec::new()));
    }

    // ── Remote load status (written by the loader) ──────────────────────

    fn edit_remote(&self, name: &str, edit: impl FnOnce(&mut LoadState)) {
        self.update(|state| {
            let mut remotes = state.remotes.as_ref().clone();
            let mut entry = remotes
                .get(name)
                .map(|s| s.as_ref().clone())
                .unwrap_or_default();
            edit(&mut entry);
            remotes.insert(name.to_string(), Arc::new(entry));
            state.remotes = Arc::new(remotes);
        });
    }

    /// A load attempt started: `loading = true`, `error` cleared.
    pub fn set_remote_loading(&self, name: &str) {
        self.edit_remote(name, |s| {
            s.loading = true;
            s.error = None;
        });
    }

    pub fn set_remote_loaded(&self, name: &str) {
        self.edit_remote(name, |s| {
            s.loading = false;
            s.loaded = true;
            s.error = None;
        });
    }

    pub fn set_remote_error(&self, name: &str, message: impl Into<String>) {
        let message = message.into();
        self.edit_remote(name, |s| {
            s.loading = false;
            s.loaded = false;
            s.error = Some(message);
        });
    }

    // ── Subscriptions ───────────────────────────────────────────────────

    /// Register `listener` to run whenever `selector`'s slice changes.
    pub fn subscribe<T, S, F>(self: &Arc<Self>, selector: S, listener: F) -> Subscription
    where
        T: Slice + Send + 'static,
        S: Fn(&SharedStoreState) -> T + Send + 'static,
        F: FnMut(&T) + Send + 'static,
    {
        let initial = selector(&self.state.read());
        let id = self.next_listener.fetch_add(1, Ordering::Relaxed);
        self.listeners.lock().insert(
            id,
            Arc::new(Mutex::new(subscription::check(initial, selector, listener))),
        );
        Subscription {
            id,
            store: Arc::downgrade(self),
        }
    }

    pub(crate) fn unsubscribe(&self, id: u64) {
        self.listeners.lock().remove(&id);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.lock().len()
    }

    fn update<R>(&self, mutate: impl FnOnce(&mut SharedStoreState) -> R) -> R {
        let result = {
            let mut state = self.state.write();
            mutate(&mut state)
        };
        self.emit();
        result
    }

    /// Deliver the current state to every listener.
    ///
    /// A mutation made from inside a listener marks the round as pending and
    /// is delivered by the outer emitter once the current round finishes. A
    /// listener that panics is logged and skipped; the rest still run.
    fn emit(&self) {
        loop {
            if self.emitting.swap(true, Ordering::AcqRel) {
                self.pending.store(true, Ordering::Release);
                return;
            }

            loop {
                self.pending.store(false, Ordering::Release);
                let snapshot = self.snapshot();
                let listeners: Vec<_> = self.listeners.lock().values().cloned().collect();
                for listener in listeners {
                    let delivered = panic::catch_unwind(AssertUnwindSafe(|| {
                        (listener.lock())(&snapshot)
                    }));
                    if delivered.is_err() {
                        error!("store listener panicked");
                    }
                }
                if !self.pending.load(Ordering::Acquire) {
                    break;
                }
            }

            self.emitting.store(false, Ordering::Release);
            if !self.pending.load(Ordering::Acquire) {
                return;
            }
        }
    }
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("state", &*self.state.read())
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::selectors;
    use std::sync::atomic::AtomicUsize;

    fn store() -> Arc<SharedStore> {
        SharedStore::get_or_create(&GlobalScope::new()).unwrap()
    }

    #[test]
    fn get_or_create_is_a_page_singleton() {
        let page = GlobalScope::new();
        let host = SharedStore::get_or_create(&page).unwrap();
        // A remote bundle reaches the store through its own handle to the page.
        let remote = SharedStore::get_or_create(&page.clone()).unwrap();
        assert!(Arc::ptr_eq(&host, &remote));

        let other_page = SharedStore::get_or_create(&GlobalScope::new()).unwrap();
        assert!(!Arc::ptr_eq(&host, &other_page));
    }

    #[test]
    fn initialize_merges_into_existing_store() {
        let page = GlobalScope::new();
        let remote_view = SharedStore::get_or_create(&page).unwrap();
        remote_view.set_tenant_id(Some("acme".into()));

        let host_view =
            SharedStore::initialize(&page, InitialState::with_session(Session::new("u1", "Ada")))
                .unwrap();

        assert!(Arc::ptr_eq(&host_view, &remote_view));
        assert_eq!(remote_view.session().unwrap().user_id, "u1");
        assert_eq!(host_view.tenant_id().as_deref(), Some("acme"));
    }

    #[test]
    fn initialize_creates_store_when_absent() {
        let page = GlobalScope::new();
        let store = SharedStore::initialize(
            &page,
            InitialState {
                tenant: Some(TenantState {
                    tenant_id: Some("t1".into()),
                    ..TenantState::default()
                }),
                ..InitialState::default()
            },
        )
        .unwrap();
        assert_eq!(store.tenant_id().as_deref(), Some("t1"));
        assert!(store.session().is_none());
    }

    #[test]
    fn notification_append_is_field_scoped() {
        let store = store();
        store.set_remote_loading("users");
        let before = store.snapshot();

        let id = store.push_notification(NewNotification::info("Saved", "User saved"));

        let after = store.snapshot();
        assert!(Arc::ptr_eq(&before.tenant, &after.tenant));
        assert!(Arc::ptr_eq(&before.remotes, &after.remotes));
        assert!(Arc::ptr_eq(&before.auth, &after.auth));
        assert!(!Arc::ptr_eq(&before.notifications, &after.notifications));

        let list = store.notifications();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].id, id);
        assert!(!list[0].read);
    }

    #[test]
    fn notifications_keep_append_order_and_unique_ids() {
        let store = store();
        let a = store.push_notification(NewNotification::info("a", ""));
        let b = store.push_notification(NewNotification::error("b", ""));
        let c = store.push_notification(NewNotification::info("c", "").from_source("users"));

        let ids: Vec<_> = store.notifications().iter().map(|n| n.id.clone()).collect();
        assert_eq!(ids, vec![a.clone(), b, c]);
        assert_eq!(store.unread_count(), 3);

        assert!(store.mark_notification_read(&a));
        assert!(!store.mark_notification_read("missing"));
        assert_eq!(store.unread_count(), 2);

        store.mark_all_notifications_read();
        assert_eq!(store.unread_count(), 0);

        assert!(store.dismiss_notification(&a));
        assert!(!store.dismiss_notification(&a));
        assert_eq!(store.notifications().len(), 2);

        store.clear_notifications();
        assert!(store.notifications().is_empty());
    }

    #[test]
    fn remote_entries_are_lazy_and_independent() {
        let store = store();
        assert!(store.remote_state("users").is_none());

        store.set_remote_loading("users");
        let before = store.remotes();
        store.set_remote_loading("orders");
        let after = store.remotes();

        assert!(Arc::ptr_eq(&before["users"], &after["users"]));
        assert_eq!(
            store.remote_state("orders"),
            Some(LoadState {
                loading: true,
                loaded: false,
                error: None
            })
        );
    }

    #[test]
    fn remote_transitions() {
        let store = store();
        store.set_remote_loading("users");
        store.set_remote_error("users", "boom");
        assert_eq!(
            store.remote_state("users"),
            Some(LoadState {
                loading: false,
                loaded: false,
                error: Some("boom".into())
            })
        );

        store.set_remote_loading("users");
        assert_eq!(store.remote_state("users").unwrap().error, None);

        store.set_remote_loaded("users");
        let state = store.remote_state("users").unwrap();
        assert!(state.loaded && !state.loading);
    }

    #[test]
    fn switch_tenant_adopts_permissions() {
        let store = store();
        store.set_available_tenants(vec![
            TenantMetadata::new("acme", "Acme").with_permissions(["users:read"]),
            TenantMetadata::new("globex", "Globex").with_permissions(["users:read", "users:write"]),
        ]);

        store.switch_tenant("globex").unwrap();
        let tenant = store.tenant();
        assert_eq!(tenant.tenant_id.as_deref(), Some("globex"));
        assert_eq!(tenant.current_org_permissions.len(), 2);
        assert_eq!(tenant.tenant_metadata.as_ref().unwrap().name, "Globex");

        assert_eq!(
            store.switch_tenant("initech"),
            Err(StoreError::UnknownTenant {
                tenant_id: "initech".into()
            })
        );
    }

    #[test]
    fn listener_fires_only_for_selected_slice() {
        let store = store();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let _sub = store.subscribe(selectors::tenant, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        store.push_notification(NewNotification::info("x", ""));
        store.set_remote_loading("users");
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        store.set_tenant_id(Some("acme".into()));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn remote_selector_ignores_other_remotes() {
        let store = store();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = store.subscribe(selectors::remote("users"), move |state| {
            sink.lock().push(state.as_ref().map(|s| s.loading));
        });

        store.set_remote_loading("orders");
        store.set_remote_loading("users");
        store.set_remote_loaded("orders");
        store.set_remote_loaded("users");

        assert_eq!(*seen.lock(), vec![Some(true), Some(false)]);
    }

    #[test]
    fn dropping_subscription_unsubscribes() {
        let store = store();
        let sub = store.subscribe(selectors::auth, |_| {});
        assert_eq!(store.listener_count(), 1);
        drop(sub);
        assert_eq!(store.listener_count(), 0);

        store.subscribe(selectors::auth, |_| {}).detach();
        assert_eq!(store.listener_count(), 1);
    }

    #[test]
    fn listener_may_mutate_store() {
        let store = store();
        let inner = store.clone();
        let _echo = store.subscribe(selectors::tenant, move |tenant| {
            if tenant.tenant_id.is_some() {
                inner.push_notification(NewNotification::info("Tenant changed", ""));
            }
        });

        let unread = Arc::new(AtomicUsize::new(0));
        let sink = unread.clone();
        let _count = store.subscribe(selectors::unread_count, move |count| {
            sink.store(*count, Ordering::SeqCst);
        });

        store.set_tenant_id(Some("acme".into()));
        assert_eq!(store.notifications().len(), 1);
        assert_eq!(unread.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn marking_read_twice_notifies_once() {
        let store = store();
        let id = store.push_notification(NewNotification::info("Saved", ""));

        let changes = Arc::new(AtomicUsize::new(0));
        let sink = changes.clone();
        let _list = store.subscribe(selectors::notifications, move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        assert!(store.mark_notification_read(&id));
        assert!(store.mark_notification_read(&id));
        assert!(!store.mark_notification_read("missing"));
        assert_eq!(changes.load(Ordering::SeqCst), 1);
        assert_eq!(store.unread_count(), 0);

        assert!(store.dismiss_notification(&id));
        assert!(!store.dismiss_notification(&id));
        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn panicking_listener_does_not_silence_the_others() {
        let store = store();
        let fired = Arc::new(AtomicUsize::new(0));
        let sink = fired.clone();
        let _list = store.subscribe(selectors::notifications, move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });
        let failing = store.subscribe(selectors::tenant, |tenant| {
            if tenant.tenant_id.is_some() {
                panic!("listener failed");
            }
        });

        store.set_tenant_id(Some("acme".into()));
        store.push_notification(NewNotification::info("a", ""));
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        drop(failing);
        store.clear_notifications();
        store.push_notification(NewNotification::info("b", ""));
        assert_eq!(fired.load(Ordering::SeqCst), 3);
    }
}
