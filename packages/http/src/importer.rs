//! Importing remote entries over HTTP.
//!
//! The importer only fetches bytes; turning them into a module is the job of
//! an [`EntryEvaluator`] (JSON manifests, WebAssembly components, ...).

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mosaic_federation::{entry_key, EntryEvaluator, EntryImporter, EntryModule, ImportError};
use parking_lot::Mutex;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::{import_error, HttpError};

/// Fetches entries with reqwest and hands them to `E`.
///
/// Entries fetched by [`prefetch`](EntryImporter::prefetch) are kept until the
/// next `import` of the same remote, so a preloaded remote is not fetched
/// twice. At most one prefetched entry is held per remote (URL without its
/// query), and it is only used when the import asks for the exact same URL.
pub struct HttpImporter<E> {
    client: Client,
    evaluator: E,
    prefetched: Mutex<HashMap<String, Prefetched>>,
}

#[derive(Default)]
struct Prefetched {
    /// Bumped by every import; a prefetch started before it is discarded.
    generation: u64,
    entry: Option<(Url, Bytes)>,
}

impl<E: EntryEvaluator> HttpImporter<E> {
    /// Create an importer without a request timeout.
    pub fn new(evaluator: E) -> Result<Self, HttpError> {
        Self::build(Client::builder(), evaluator)
    }

    /// Create an importer whose requests fail after `timeout`.
    pub fn with_timeout(evaluator: E, timeout: Duration) -> Result<Self, HttpError> {
        Self::build(Client::builder().timeout(timeout), evaluator)
    }

    fn build(builder: reqwest::ClientBuilder, evaluator: E) -> Result<Self, HttpError> {
        Ok(Self {
            client: builder.build()?,
            evaluator,
            prefetched: Mutex::new(HashMap::new()),
        })
    }

    pub fn evaluator(&self) -> &E {
        &self.evaluator
    }

    /// Whether a prefetched entry for `url` is waiting to be imported.
    pub fn is_prefetched(&self, url: &Url) -> bool {
        self.prefetched
            .lock()
            .get(&entry_key(url))
            .and_then(|slot| slot.entry.as_ref())
            .is_some_and(|(fetched, _)| fetched == url)
    }

    async fn fetch(&self, url: &Url) -> Result<Bytes, ImportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| import_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ImportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.bytes().await.map_err(|e| import_error(url, e))
    }
}

#[async_trait]
impl<E: EntryEvaluator> EntryImporter for HttpImporter<E> {
    async fn import(&self, url: &Url) -> Result<EntryModule, ImportError> {
        let prefetched = {
            let mut prefetched = self.prefetched.lock();
            let slot = prefetched.entry(entry_key(url)).or_default();
            slot.generation += 1;
            slot.entry.take()
        };
        let source = match prefetched {
            Some((fetched, source)) if fetched == *url => {
                debug!(%url, "using prefetched entry");
                source
            }
            Some((stale, _)) => {
                debug!(%url, %stale, "dropping prefetched entry for another url");
                self.fetch(url).await?
            }
            None => self.fetch(url).await?,
        };
        self.evaluator.evaluate(url, source).await
    }

    async fn prefetch(&self, url: &Url) -> Result<(), ImportError> {
        let key = entry_key(url);
        let generation = match self.prefetched.lock().get(&key) {
            Some(slot) if slot.entry.as_ref().is_some_and(|(fetched, _)| fetched == url) => {
                return Ok(());
            }
            Some(slot) => slot.generation,
            None => 0,
        };

        let source = self.fetch(url).await?;
        let mut prefetched = self.prefetched.lock();
        let slot = prefetched.entry(key).or_default();
        if slot.generation != generation {
            debug!(%url, "entry imported while prefetching, discarding");
            return Ok(());
        }
        debug!(%url, bytes = source.len(), "prefetched entry");
        slot.entry = Some((url.clone(), source));
        Ok(())
    }
}
