//! Selector subscriptions.
//!
//! A subscriber registers a selector and a listener. After every mutation the
//! selector runs against the new state and the listener fires only when the
//! selected slice is no longer the same one it saw last time.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use crate::state::{AuthState, LoadState, Notification, SharedStoreState, TenantState};
use crate::store::SharedStore;

/// Change detection for selected slices.
///
/// `Arc`s compare by identity, plain values by equality.
pub trait Slice {
    fn same_as(&self, other: &Self) -> bool;
}

impl<T: ?Sized> Slice for Arc<T> {
    fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

impl<T: Slice> Slice for Option<T> {
    fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Some(a), Some(b)) => a.same_as(b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl<A: Slice, B: Slice> Slice for (A, B) {
    fn same_as(&self, other: &Self) -> bool {
        self.0.same_as(&other.0) && self.1.same_as(&other.1)
    }
}

macro_rules! slice_by_value {
    ($($t:ty),*) => {
        $(impl Slice for $t {
            fn same_as(&self, other: &Self) -> bool {
                self == other
            }
        })*
    };
}

slice_by_value!(bool, usize, u64, i64, String);

pub(crate) type Check = Box<dyn FnMut(&SharedStoreState) + Send>;

pub(crate) fn check<T, S, F>(initial: T, selector: S, mut listener: F) -> Check
where
    T: Slice + Send + 'static,
    S: Fn(&SharedStoreState) -> T + Send + 'static,
    F: FnMut(&T) + Send + 'static,
{
    let mut last = initial;
    Box::new(move |state| {
        let next = selector(state);
        if !next.same_as(&last) {
            listener(&next);
            last = next;
        }
    })
}

/// Handle returned by [`SharedStore::subscribe`]. Dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    pub(crate) id: u64,
    pub(crate) store: Weak<SharedStore>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Keep the listener registered for the lifetime of the store.
    pub fn detach(mut self) {
        self.store = Weak::new();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

/// Ready-made selectors for the hook-style getters.
pub mod selectors {
    use super::*;

    pub fn auth(state: &SharedStoreState) -> Arc<AuthState> {
        state.auth.clone()
    }

    pub fn tenant(state: &SharedStoreState) -> Arc<TenantState> {
        state.tenant.clone()
    }

    pub fn notifications(state: &SharedStoreState) -> Arc<Vec<Notification>> {
        state.notifications.clone()
    }

    pub fn unread_count(state: &SharedStoreState) -> usize {
        state.unread_count()
    }

    pub fn remotes(state: &SharedStoreState) -> Arc<BTreeMap<String, Arc<LoadState>>> {
        state.remotes.clone()
    }

    /// Select one remote's load state; `None` until its first load attempt.
    pub fn remote(
        name: impl Into<String>,
    ) -> impl Fn(&SharedStoreState) -> Option<Arc<LoadState>> + Send + 'static {
        let name = name.into();
        move |state| state.remotes.get(&name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arc_slices_compare_by_identity() {
        let a = Arc::new(vec![1]);
        let b = Arc::new(vec![1]);
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
    }

    #[test]
    fn optional_slices() {
        let a = Some(Arc::new(LoadState::default()));
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&None));
        assert!(None::<Arc<LoadState>>.same_as(&None));
    }

    #[test]
    fn values_compare_by_equality() {
        assert!(3usize.same_as(&3));
        assert!(!String::from("a").same_as(&String::from("b")));
        assert!((1usize, true).same_as(&(1, true)));
    }
}
