//! # mosaic-store
//!
//! The cross-bundle shared state store.
//!
//! The host and every remote loaded into it observe one `SharedStore`: the
//! authenticated session, the active tenant, the notification feed, and the
//! per-remote load status the loader maintains. The store is located through
//! the page's [`GlobalScope`](mosaic_core::GlobalScope), never imported
//! directly, because the bundles share no module graph.
//!
//! ```rust
//! use mosaic_core::GlobalScope;
//! use mosaic_store::{selectors, NewNotification, SharedStore};
//!
//! let page = GlobalScope::new();
//! let host = SharedStore::get_or_create(&page).unwrap();
//! let remote = SharedStore::get_or_create(&page).unwrap();
//!
//! let _sub = host.subscribe(selectors::unread_count, |count| println!("{count} unread"));
//! remote.push_notification(NewNotification::info("Saved", "User saved"));
//! assert_eq!(host.unread_count(), 1);
//! ```

mod error;
mod facade;
mod state;
mod store;
mod subscription;

pub use error::{Result, StoreError};
pub use state::{
    AuthState, InitialState, LoadState, NewNotification, Notification, NotificationKind, Session,
    SharedStoreState, TenantMetadata, TenantState,
};
pub use store::SharedStore;
pub use subscription::{selectors, Slice, Subscription};
