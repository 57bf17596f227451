//! Turning entry URLs into entry modules.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::RwLock;
use url::Url;

use crate::container::EntryModule;
use crate::error::ImportError;

/// Query parameter carrying the cache-busting nonce.
pub const CACHE_BUST_PARAM: &str = "t";

/// Fetches and evaluates a remote's entry.
#[async_trait]
pub trait EntryImporter: Send + Sync {
    async fn import(&self, url: &Url) -> Result<EntryModule, ImportError>;

    /// Hint that `url` will be imported soon.
    async fn prefetch(&self, _url: &Url) -> Result<(), ImportError> {
        Ok(())
    }
}

/// Evaluates fetched entry bytes into a module.
#[async_trait]
pub trait EntryEvaluator: Send + Sync {
    async fn evaluate(&self, url: &Url, source: Bytes) -> Result<EntryModule, ImportError>;
}

#[async_trait]
impl<T: EntryImporter + ?Sized> EntryImporter for Arc<T> {
    async fn import(&self, url: &Url) -> Result<EntryModule, ImportError> {
        (**self).import(url).await
    }

    async fn prefetch(&self, url: &Url) -> Result<(), ImportError> {
        (**self).prefetch(url).await
    }
}

/// `url` with the cache-busting parameter set to `nonce`.
pub fn cache_busted(url: &Url, nonce: &str) -> Url {
    let mut busted = url.clone();
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != CACHE_BUST_PARAM)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    busted
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(CACHE_BUST_PARAM, nonce);
    busted
}

/// `url` without query string or fragment.
pub fn entry_key(url: &Url) -> String {
    let mut key = url.clone();
    key.set_query(None);
    key.set_fragment(None);
    key.into()
}

pub type EntryFactory = Arc<dyn Fn() -> Result<EntryModule, ImportError> + Send + Sync>;

/// Importer for remotes compiled into the host process.
///
/// Each registered URL maps to a factory that builds a fresh entry module on
/// every import. Query strings are ignored when matching, so cache-busted URLs
/// resolve to the same entry.
#[derive(Clone, Default)]
pub struct StaticImporter {
    entries: Arc<RwLock<BTreeMap<String, EntryFactory>>>,
    imports: Arc<AtomicUsize>,
}

impl StaticImporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, url: &Url, factory: F)
    where
        F: Fn() -> Result<EntryModule, ImportError> + Send + Sync + 'static,
    {
        self.entries.write().insert(entry_key(url), Arc::new(factory));
    }

    pub fn with<F>(self, url: &Url, factory: F) -> Self
    where
        F: Fn() -> Result<EntryModule, ImportError> + Send + Sync + 'static,
    {
        self.register(url, factory);
        self
    }

    /// Drop the entry for `url`; later imports fail with `NotFound`.
    pub fn unregister(&self, url: &Url) -> bool {
        self.entries.write().remove(&entry_key(url)).is_some()
    }

    /// Number of `import` calls so far.
    pub fn import_count(&self) -> usize {
        self.imports.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntryImporter for StaticImporter {
    async fn import(&self, url: &Url) -> Result<EntryModule, ImportError> {
        self.imports.fetch_add(1, Ordering::SeqCst);
        let factory = self
            .entries
            .read()
            .get(&entry_key(url))
            .cloned()
            .ok_or_else(|| ImportError::NotFound {
                url: url.to_string(),
            })?;
        factory()
    }
}
