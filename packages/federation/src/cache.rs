//! Initialized containers and in-flight loads, keyed by remote name.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use crate::container::{Component, RemoteContainer};
use crate::error::LoadError;

type Outcome = Option<Result<Component, LoadError>>;

struct InFlight {
    id: u64,
    tx: watch::Sender<Outcome>,
}

/// Per-remote container cache with single-flight load tracking.
///
/// # Single-flight protocol
///
/// 1. The first caller for a name becomes the leader and receives a
///    [`FlightGuard`]; later callers receive a [`Flight::Follower`] receiver.
/// 2. The leader publishes its outcome through [`FlightGuard::complete`],
///    which also removes the in-flight marker.
/// 3. A leader dropped before completing publishes [`LoadError::Aborted`]
///    and removes the marker, so followers never hang and the next call
///    starts a fresh load.
#[derive(Default)]
pub(crate) struct ContainerCache {
    containers: Mutex<BTreeMap<String, RemoteContainer>>,
    in_flight: Mutex<BTreeMap<String, InFlight>>,
    next_flight: AtomicU64,
}

pub(crate) enum Flight {
    Leader(FlightGuard),
    Follower(watch::Receiver<Outcome>),
}

impl ContainerCache {
    pub fn get(&self, name: &str) -> Option<RemoteContainer> {
        self.containers.lock().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.containers.lock().contains_key(name)
    }

    /// Cache `container` unless one was cached meanwhile. Returns the winner.
    pub fn insert(&self, name: &str, container: RemoteContainer) -> RemoteContainer {
        self.containers
            .lock()
            .entry(name.to_string())
            .or_insert(container)
            .clone()
    }

    pub fn remove(&self, name: &str) -> bool {
        self.containers.lock().remove(name).is_some()
    }

    pub fn is_in_flight(&self, name: &str) -> bool {
        self.in_flight.lock().contains_key(name)
    }

    /// Lead a new load for `name` or follow the one already running.
    pub fn join(self: &Arc<Self>, name: &str) -> Flight {
        let mut in_flight = self.in_flight.lock();
        if let Some(flight) = in_flight.get(name) {
            return Flight::Follower(flight.tx.subscribe());
        }

        let id = self.next_flight.fetch_add(1, Ordering::Relaxed);
        let (tx, _) = watch::channel(None);
        in_flight.insert(name.to_string(), InFlight { id, tx: tx.clone() });
        Flight::Leader(FlightGuard {
            cache: self.clone(),
            name: name.to_string(),
            id,
            tx,
            on_abort: None,
            completed: false,
        })
    }

    fn land(&self, name: &str, id: u64) {
        let mut in_flight = self.in_flight.lock();
        if in_flight.get(name).is_some_and(|f| f.id == id) {
            in_flight.remove(name);
        }
    }
}

/// Wait for the leader's outcome.
pub(crate) async fn follow(
    name: &str,
    mut rx: watch::Receiver<Outcome>,
) -> Result<Component, LoadError> {
    match rx.wait_for(Option::is_some).await {
        Ok(outcome) => outcome.clone().unwrap_or_else(|| {
            Err(LoadError::Aborted {
                name: name.to_string(),
            })
        }),
        Err(_) => Err(LoadError::Aborted {
            name: name.to_string(),
        }),
    }
}

/// Held by the leader of an in-flight load.
pub(crate) struct FlightGuard {
    cache: Arc<ContainerCache>,
    name: String,
    id: u64,
    tx: watch::Sender<Outcome>,
    on_abort: Option<Box<dyn FnOnce(&LoadError) + Send>>,
    completed: bool,
}

impl FlightGuard {
    /// Run `hook` with the published error if the leader is dropped early.
    pub fn on_abort(&mut self, hook: impl FnOnce(&LoadError) + Send + 'static) {
        self.on_abort = Some(Box::new(hook));
    }

    /// Publish `outcome` to every follower and clear the in-flight marker.
    pub fn complete(
        mut self,
        outcome: Result<Component, LoadError>,
    ) -> Result<Component, LoadError> {
        self.completed = true;
        self.tx.send_replace(Some(outcome.clone()));
        self.cache.land(&self.name, self.id);
        outcome
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        let error = LoadError::Aborted {
            name: self.name.clone(),
        };
        if let Some(hook) = self.on_abort.take() {
            hook(&error);
        }
        self.tx.send_replace(Some(Err(error)));
        self.cache.land(&self.name, self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mosaic_core::Value;

    fn leader(flight: Flight) -> FlightGuard {
        match flight {
            Flight::Leader(guard) => guard,
            Flight::Follower(_) => panic!("expected to lead"),
        }
    }

    fn follower(flight: Flight) -> watch::Receiver<Outcome> {
        match flight {
            Flight::Follower(rx) => rx,
            Flight::Leader(_) => panic!("expected to follow"),
        }
    }

    #[tokio::test]
    async fn followers_receive_the_leaders_outcome() {
        let cache = Arc::new(ContainerCache::default());
        let guard = leader(cache.join("users"));
        let rx = follower(cache.join("users"));
        assert!(cache.is_in_flight("users"));

        let waiting = tokio::spawn(async move { follow("users", rx).await });
        guard.complete(Ok(Component::Value(Value::from("ok")))).unwrap();

        let outcome = waiting.await.unwrap().unwrap();
        assert_eq!(outcome.as_value(), Some(&Value::from("ok")));
        assert!(!cache.is_in_flight("users"));
    }

    #[tokio::test]
    async fn dropped_leader_aborts_followers() {
        let cache = Arc::new(ContainerCache::default());
        let mut guard = leader(cache.join("users"));
        let rx = follower(cache.join("users"));
        let hooked = Arc::new(Mutex::new(None));
        let seen = hooked.clone();
        guard.on_abort(move |e| *seen.lock() = Some(e.clone()));

        drop(guard);
        assert!(matches!(*hooked.lock(), Some(LoadError::Aborted { .. })));
        assert_eq!(
            follow("users", rx).await.unwrap_err(),
            LoadError::Aborted {
                name: "users".into()
            }
        );
        assert!(!cache.is_in_flight("users"));
        assert!(matches!(cache.join("users"), Flight::Leader(_)));
    }

    #[tokio::test]
    async fn late_joiner_after_completion_leads_again() {
        let cache = Arc::new(ContainerCache::default());
        let guard = leader(cache.join("users"));
        guard
            .complete(Err(LoadError::UnknownRemote {
                name: "users".into(),
            }))
            .unwrap_err();
        assert!(matches!(cache.join("users"), Flight::Leader(_)));
    }
}
