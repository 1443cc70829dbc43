//! The request channel shared by both screens.
//!
//! A [`RequestChannel`] is an append-only collection of requests that pushes
//! the full newest-first set to every subscriber after each change. The
//! production implementation is [`Backend`], which wraps the `SQLite` storage
//! and a `watch` notifier.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::request::{NewRequest, Request, RequestId};
use crate::storage::{Storage, StorageStats};

/// Name of the collection holding all requests.
pub const COLLECTION: &str = "requests";

/// The full, ordered set of requests at one point in time.
pub type Snapshot = Arc<[Request]>;

/// An append-capable, subscribable request collection.
#[async_trait::async_trait]
pub trait RequestChannel: Send + Sync + std::fmt::Debug {
    /// Append a request and return its storage-assigned id.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the write could not be committed.
    async fn append(&self, request: NewRequest) -> Result<RequestId>;

    /// Open a subscription ordered newest first.
    ///
    /// The first [`Subscription::next`] yields the current set immediately.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the subscription cannot be opened.
    async fn subscribe(&self) -> Result<Subscription>;

    /// Read the current ordered set once.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the read fails.
    async fn snapshot(&self) -> Result<Snapshot>;

    /// Look up a single request.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestNotFound`] for an unknown id, or a storage
    /// error if the read fails.
    async fn get(&self, id: &RequestId) -> Result<Request>;
}

/// A live subscription to the request channel.
///
/// Dropping or cancelling the subscription guarantees no further snapshots
/// are delivered through it.
#[derive(Debug)]
pub struct Subscription {
    rx: Option<watch::Receiver<Snapshot>>,
    primed: bool,
}

impl Subscription {
    /// Wrap a watch receiver. The value it currently holds is delivered first.
    #[must_use]
    pub fn new(rx: watch::Receiver<Snapshot>) -> Self {
        Self {
            rx: Some(rx),
            primed: false,
        }
    }

    /// Wait for the next snapshot.
    ///
    /// Intermediate snapshots published while the caller was busy are
    /// skipped; only the latest is returned. Returns `None` once cancelled
    /// or when the channel has shut down.
    pub async fn next(&mut self) -> Option<Snapshot> {
        let rx = self.rx.as_mut()?;
        if !self.primed {
            self.primed = true;
            return Some(rx.borrow_and_update().clone());
        }

        if rx.changed().await.is_err() {
            self.rx = None;
            return None;
        }
        Some(rx.borrow_and_update().clone())
    }

    /// Stop receiving snapshots.
    pub fn cancel(&mut self) {
        if self.rx.take().is_some() {
            debug!("Subscription cancelled");
        }
    }

    /// Whether the subscription can still deliver snapshots.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.rx.is_some()
    }
}

/// The process-wide handle to request storage.
///
/// Construct once at startup with [`Backend::connect`] and share it as an
/// `Arc<dyn RequestChannel>`.
#[derive(Debug)]
pub struct Backend {
    storage: Arc<Mutex<Storage>>,
    notifier: Arc<watch::Sender<Snapshot>>,
}

impl Backend {
    /// Open the configured database and load the initial snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or read.
    pub fn connect(config: &Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        let backend = Self::from_storage(storage)?;
        info!(
            collection = COLLECTION,
            path = %config.database_path().display(),
            "Request channel connected"
        );
        Ok(backend)
    }

    /// An in-memory channel, used by tests and demos.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn in_memory() -> Result<Self> {
        Self::from_storage(Storage::open_in_memory()?)
    }

    /// Build a channel over an already opened storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the initial snapshot cannot be read.
    pub fn from_storage(storage: Storage) -> Result<Self> {
        let initial: Snapshot = storage.list_newest_first(None)?.into();
        let (notifier, _) = watch::channel(initial);
        Ok(Self {
            storage: Arc::new(Mutex::new(storage)),
            notifier: Arc::new(notifier),
        })
    }

    /// Number of subscriptions currently open.
    #[must_use]
    pub fn live_subscriptions(&self) -> usize {
        self.notifier.receiver_count()
    }

    /// Storage statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn stats(&self) -> Result<StorageStats> {
        self.with_storage(|storage| storage.stats()).await
    }

    /// Run a storage operation on the blocking pool.
    async fn with_storage<T, F>(&self, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&Storage) -> Result<T> + Send + 'static,
    {
        let storage = Arc::clone(&self.storage);
        tokio::task::spawn_blocking(move || {
            let guard = storage
                .lock()
                .map_err(|_| Error::internal("storage lock poisoned"))?;
            op(&guard)
        })
        .await
        .map_err(|e| Error::internal(format!("storage task failed: {e}")))?
    }
}

#[async_trait::async_trait]
impl RequestChannel for Backend {
    async fn append(&self, request: NewRequest) -> Result<RequestId> {
        let notifier = Arc::clone(&self.notifier);
        self.with_storage(move |storage| {
            let stored = storage.append(&request)?;
            // Publish while still holding the lock so snapshots go out in
            // commit order. The row is committed either way, so a failed
            // read only delays the next snapshot.
            match storage.list_newest_first(None) {
                Ok(list) => {
                    let snapshot: Snapshot = list.into();
                    let count = snapshot.len();
                    notifier.send_replace(snapshot);
                    debug!(id = %stored.id, count, "Published snapshot");
                }
                Err(e) => {
                    warn!(id = %stored.id, error = %e, "Stored request but failed to publish snapshot");
                }
            }
            Ok(stored.id)
        })
        .await
    }

    async fn subscribe(&self) -> Result<Subscription> {
        let subscription = Subscription::new(self.notifier.subscribe());
        debug!(live = self.live_subscriptions(), "Subscription opened");
        Ok(subscription)
    }

    async fn snapshot(&self) -> Result<Snapshot> {
        self.with_storage(|storage| Ok(storage.list_newest_first(None)?.into()))
            .await
    }

    async fn get(&self, id: &RequestId) -> Result<Request> {
        let id = id.clone();
        self.with_storage(move |storage| {
            storage.get(&id)?.ok_or(Error::RequestNotFound(id))
        })
        .await
    }
}
