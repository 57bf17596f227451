//! The loader: remote name in, initialized component out.

use std::sync::Arc;
use std::time::Duration;

use mosaic_core::{well_known, GlobalScope};
use mosaic_store::{SharedStore, StoreError};
use parking_lot::Mutex;
use tracing::{debug, info, warn};
use url::Url;
use uuid::Uuid;

use crate::cache::{self, ContainerCache, Flight};
use crate::container::{Component, RemoteContainer};
use crate::environment::Environment;
use crate::error::LoadError;
use crate::importer::{cache_busted, EntryImporter};
use crate::registry::{RemoteDescriptor, RemoteRegistry};
use crate::retry::RetryPolicy;
use crate::share_scope::{ShareScope, DEFAULT_SCOPE};

/// Loader configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct LoaderConfig {
    pub environment: Environment,
    /// Policy for retryable failures.
    pub retry: RetryPolicy,
    /// Policy for containers used before init. Development only.
    pub ordering_retry: RetryPolicy,
    /// Share scope handed to every container's `init`.
    pub share_scope: String,
}

impl LoaderConfig {
    pub fn for_environment(environment: Environment) -> Self {
        Self {
            environment,
            ..Self::default()
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_ordering_retry(mut self, ordering_retry: RetryPolicy) -> Self {
        self.ordering_retry = ordering_retry;
        self
    }
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            retry: RetryPolicy::default(),
            ordering_retry: RetryPolicy::ordering_race(),
            share_scope: DEFAULT_SCOPE.to_string(),
        }
    }
}

/// Loads remote components.
///
/// Per remote name at most one load runs at a time; concurrent callers share
/// its outcome. The container cache lives in the `GlobalScope`, so this holds
/// across every loader built against the same page. Load status is mirrored into the page's [`SharedStore`] under
/// `remotes/<name>` before any caller sees the result.
///
/// # Example
///
/// ```ignore
/// let loader = Loader::new(registry, importer, LoaderConfig::default(), GlobalScope::page())?;
/// let users_page = loader.load_component("users").await?;
/// ```
pub struct Loader {
    registry: RemoteRegistry,
    importer: Arc<dyn EntryImporter>,
    config: LoaderConfig,
    global: GlobalScope,
    store: Arc<SharedStore>,
    cache: Arc<ContainerCache>,
    nonce: Mutex<String>,
    stylesheets: Mutex<Vec<Url>>,
}

impl Loader {
    pub fn new(
        registry: RemoteRegistry,
        importer: impl EntryImporter + 'static,
        config: LoaderConfig,
        global: &GlobalScope,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            registry,
            importer: Arc::new(importer),
            config,
            global: global.clone(),
            store: SharedStore::get_or_create(global)?,
            cache: global
                .locate_or_create(&well_known::container_cache(), ContainerCache::default)?,
            nonce: Mutex::new(fresh_nonce()),
            stylesheets: Mutex::new(Vec::new()),
        })
    }

    pub fn registry(&self) -> &RemoteRegistry {
        &self.registry
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    pub fn global(&self) -> &GlobalScope {
        &self.global
    }

    pub fn store(&self) -> &Arc<SharedStore> {
        &self.store
    }

    /// Load the component exposed by remote `name`.
    pub async fn load_component(&self, name: &str) -> Result<Component, LoadError> {
        let remote = self.registry.resolve(name)?.clone();

        let mut guard = match self.cache.join(name) {
            Flight::Follower(rx) => {
                debug!(remote = %name, "joining in-flight load");
                return cache::follow(name, rx).await;
            }
            Flight::Leader(guard) => guard,
        };

        let store = self.store.clone();
        let aborted = name.to_string();
        guard.on_abort(move |error| store.set_remote_error(&aborted, error.to_string()));

        let outcome = self.load_with_retry(&remote).await;
        match &outcome {
            Ok(_) => {
                self.store.set_remote_loaded(name);
                self.note_stylesheet(&remote);
                info!(remote = %name, "remote loaded");
            }
            Err(error) => {
                self.store.set_remote_error(name, error.to_string());
                warn!(remote = %name, %error, "remote failed to load");
            }
        }
        guard.complete(outcome)
    }

    async fn load_with_retry(&self, remote: &RemoteDescriptor) -> Result<Component, LoadError> {
        let name = remote.name.as_str();
        let mut failures = 0;
        let mut races = 0;

        loop {
            self.store.set_remote_loading(name);
            let error = match self.attempt(remote).await {
                Ok(component) => return Ok(component),
                Err(error) => error,
            };

            if error.is_ordering_race() && self.config.environment.is_development() {
                races += 1;
                if !self.config.ordering_retry.allows(races) {
                    return Err(error);
                }
                let delay = self.config.ordering_retry.delay(races);
                warn!(
                    remote = %name,
                    attempt = races,
                    delay_ms = delay.as_millis() as u64,
                    "container used before init, reloading entry"
                );
                self.cache.remove(name);
                self.refresh_nonce();
                pause(delay).await;
                continue;
            }

            failures += 1;
            if !error.is_retryable() || !self.config.retry.allows(failures) {
                return Err(error);
            }
            let delay = self.config.retry.delay(failures);
            warn!(
                remote = %name,
                attempt = failures,
                delay_ms = delay.as_millis() as u64,
                %error,
                "remote load failed, retrying"
            );
            pause(delay).await;
        }
    }

    async fn attempt(&self, remote: &RemoteDescriptor) -> Result<Component, LoadError> {
        let name = remote.name.as_str();
        let share_scope = ShareScope::ensure_named(&self.global, &self.config.share_scope)
            .map_err(|source| LoadError::Share {
                name: name.to_string(),
                source,
            })?;

        let container = match self.cache.get(name) {
            Some(container) => {
                container
                    .init(&share_scope, &[])
                    .await
                    .map_err(|e| LoadError::from_container(name, e))?;
                container
            }
            None => self.initialize(remote, &share_scope).await?,
        };

        let factory = container
            .get(&remote.exposed_module)
            .await
            .map_err(|e| LoadError::from_container(name, e))?;
        let module = factory().map_err(|e| LoadError::from_container(name, e))?;
        Ok(module.into_component())
    }

    /// Import, validate and initialize a remote's container, then cache it.
    async fn initialize(
        &self,
        remote: &RemoteDescriptor,
        share_scope: &ShareScope,
    ) -> Result<RemoteContainer, LoadError> {
        let name = remote.name.as_str();
        let url = self.entry_url(remote);
        debug!(remote = %name, %url, "importing remote entry");

        let entry = self
            .importer
            .import(&url)
            .await
            .map_err(|e| LoadError::from_import(name, e))?;
        if let Some(ready) = entry.ready {
            ready.await.map_err(|e| LoadError::from_container(name, e))?;
        }

        let container = match RemoteContainer::from_module(&remote.scope, &entry.module) {
            Some(container) => container,
            None => RemoteContainer::locate(&self.global, &remote.scope)
                .map_err(|e| LoadError::RemoteInitializationFailed {
                    name: name.to_string(),
                    reason: e.to_string(),
                })?
                .ok_or_else(|| LoadError::RemoteInitializationFailed {
                    name: name.to_string(),
                    reason: format!(
                        "entry exports no init/get container and none is published for scope {}",
                        remote.scope
                    ),
                })?,
        };

        container
            .init(share_scope, &[])
            .await
            .map_err(|e| LoadError::from_container(name, e))?;
        Ok(self.cache.insert(name, container))
    }

    fn entry_url(&self, remote: &RemoteDescriptor) -> Url {
        if self.config.environment.is_development() {
            cache_busted(&remote.entry_url, &self.nonce.lock())
        } else {
            remote.entry_url.clone()
        }
    }

    fn refresh_nonce(&self) {
        *self.nonce.lock() = fresh_nonce();
    }

    fn note_stylesheet(&self, remote: &RemoteDescriptor) {
        if let Some(style) = &remote.style_url {
            let mut stylesheets = self.stylesheets.lock();
            if !stylesheets.contains(style) {
                stylesheets.push(style.clone());
            }
        }
    }

    /// Fetch a remote's entry ahead of `load_component`. Resolves once the
    /// importer has the entry; nothing is written to the store.
    pub async fn prefetch(&self, name: &str) -> Result<(), LoadError> {
        let remote = self.registry.resolve(name)?;
        if self.cache.contains(name) {
            return Ok(());
        }
        let url = self.entry_url(remote);
        debug!(remote = %name, %url, "prefetching remote entry");
        self.importer
            .prefetch(&url)
            .await
            .map_err(|e| LoadError::from_import(name, e))
    }

    /// Fire-and-forget [`prefetch`](Self::prefetch). Unknown names and
    /// failures are logged and otherwise ignored.
    pub fn preload_remote(self: &Arc<Self>, name: &str) {
        if self.registry.get(name).is_none() {
            warn!(remote = %name, "preload requested for unknown remote");
            return;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(remote = %name, "preload requested outside a tokio runtime");
            return;
        };

        let loader = self.clone();
        let name = name.to_string();
        runtime.spawn(async move {
            if let Err(error) = loader.prefetch(&name).await {
                debug!(remote = %name, %error, "preload failed");
            }
        });
    }

    /// Drop the cached container so the next load imports the entry again.
    pub fn evict(&self, name: &str) -> bool {
        self.cache.remove(name)
    }

    pub fn is_cached(&self, name: &str) -> bool {
        self.cache.contains(name)
    }

    pub fn is_loading(&self, name: &str) -> bool {
        self.cache.is_in_flight(name)
    }

    /// The stylesheet a remote declares, if any.
    pub fn stylesheet(&self, name: &str) -> Option<&Url> {
        self.registry.get(name).and_then(|r| r.style_url.as_ref())
    }

    /// Stylesheets of successfully loaded remotes, in load order.
    pub fn loaded_stylesheets(&self) -> Vec<Url> {
        self.stylesheets.lock().clone()
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("remotes", &self.registry.names().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn fresh_nonce() -> String {
    Uuid::new_v4().simple().to_string()
}

async fn pause(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}
