//! The dataset provider.
//!
//! `DatasetFetcher` is created once per page and handed to whatever needs
//! the dataset. Every document it loads goes through the cache worker, so a
//! cached copy is answered instantly and the worker's background refresh
//! later reports whether the dataset changed upstream.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures::stream::{self, Stream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::normalize::decode;
use super::DatasetError;
use crate::api::client::resolve_url;
use crate::api::{ApiError, Network};
use crate::models::{bucket_path, ChunkDancer, DancerChunk, Dataset, EventsDocument, RawDataset, RawEventsDocument};
use crate::worker::{CacheWorker, ClientHandle, FetchRequest};

/// Asset path of the full dataset, relative to the site root
pub const DATASET_PATH: &str = "assets/database.txt";

/// Asset path of the events-only document
pub const EVENTS_PATH: &str = "assets/events.txt";

/// Updates buffered per subscription before its refresh task waits.
const SUBSCRIPTION_BUFFER: usize = 4;

/// One emission on a subscription: a freshly normalized dataset, or why the
/// cycle failed. A failure does not end the subscription.
pub type DatasetUpdate = Result<Arc<Dataset>, DatasetError>;

/// The freshest dataset seen by a fetcher.
#[derive(Debug, Clone)]
pub struct DatasetSnapshot {
    /// Cycle number that produced it; later cycles have larger numbers
    pub generation: u64,
    pub dataset: Arc<Dataset>,
}

/// A page's registration with the worker, released when the last fetcher
/// clone (or subscription task) holding it goes away.
struct ClientRegistration<N> {
    worker: CacheWorker<N>,
    client: ClientHandle,
}

impl<N> Drop for ClientRegistration<N> {
    fn drop(&mut self) {
        self.worker.unregister_client(self.client.id());
    }
}

/// Loads and normalizes the dataset documents through the cache worker.
/// Clone is cheap; clones share the latest value and the page's worker
/// channel.
pub struct DatasetFetcher<N> {
    registration: Arc<ClientRegistration<N>>,
    base_url: String,
    dataset_url: String,
    latest: Arc<watch::Sender<Option<DatasetSnapshot>>>,
    generation: Arc<AtomicU64>,
    /// Background refreshes started by this fetcher's requests
    pending: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl<N> Clone for DatasetFetcher<N> {
    fn clone(&self) -> Self {
        Self {
            registration: Arc::clone(&self.registration),
            base_url: self.base_url.clone(),
            dataset_url: self.dataset_url.clone(),
            latest: Arc::clone(&self.latest),
            generation: Arc::clone(&self.generation),
            pending: Arc::clone(&self.pending),
        }
    }
}

impl<N: Network> DatasetFetcher<N> {
    /// Register a page with `worker` and resolve the asset URLs against
    /// `base_url`.
    pub fn new(worker: CacheWorker<N>, base_url: &str) -> Result<Self, ApiError> {
        let dataset_url = resolve_url(base_url, DATASET_PATH)?;
        let client = worker.register_client();
        let (latest, _) = watch::channel(None);
        debug!(client = %client.id(), url = %dataset_url, "Dataset fetcher created");

        Ok(Self {
            registration: Arc::new(ClientRegistration { worker, client }),
            base_url: base_url.to_string(),
            dataset_url,
            latest: Arc::new(latest),
            generation: Arc::new(AtomicU64::new(0)),
            pending: Arc::new(Mutex::new(Vec::new())),
        })
    }

    pub fn dataset_url(&self) -> &str {
        &self.dataset_url
    }

    pub fn client(&self) -> &ClientHandle {
        &self.registration.client
    }

    pub fn worker(&self) -> &CacheWorker<N> {
        &self.registration.worker
    }

    /// The freshest dataset any cycle has produced so far.
    pub fn latest(&self) -> Option<Arc<Dataset>> {
        self.latest
            .borrow()
            .as_ref()
            .map(|snapshot| Arc::clone(&snapshot.dataset))
    }

    /// Watch the freshest dataset. Only ever moves to a newer generation.
    pub fn watch_latest(&self) -> watch::Receiver<Option<DatasetSnapshot>> {
        self.latest.subscribe()
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, DatasetError> {
        let request = FetchRequest::new(url).from_client(self.client().id());
        let intercepted = self.worker().handle_fetch(request).await?;
        debug!(url = url, source = ?intercepted.source, bytes = intercepted.response.body.len(), "Loaded document");
        if let Some(handle) = intercepted.revalidation {
            let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
            pending.retain(|h| !h.is_finished());
            pending.push(handle);
        }
        Ok(intercepted.response.body)
    }

    /// Wait for every background refresh started so far, so the cache is
    /// up to date before the process exits.
    pub async fn finish_revalidations(&self) {
        let handles: Vec<_> = std::mem::take(&mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner));
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(error = %e, "Revalidation task failed");
            }
        }
    }

    /// One fetch-and-normalize cycle: load, decode, parse dates.
    pub async fn fetch_and_normalize(&self) -> Result<Dataset, DatasetError> {
        let bytes = self.fetch_bytes(&self.dataset_url).await?;
        RawDataset::decode(&bytes)?.normalize()
    }

    /// Run a cycle and publish its result as the latest value when nothing
    /// newer got there first.
    async fn run_cycle(&self) -> DatasetUpdate {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        match self.fetch_and_normalize().await {
            Ok(dataset) => {
                let dataset = Arc::new(dataset);
                self.publish(generation, Arc::clone(&dataset));
                info!(
                    generation,
                    dancers = dataset.dancers.len(),
                    events = dataset.events.len(),
                    last_updated = %dataset.last_updated,
                    "Dataset loaded"
                );
                Ok(dataset)
            }
            Err(e) => {
                warn!(generation, error = %e, "Dataset cycle failed");
                Err(e)
            }
        }
    }

    fn publish(&self, generation: u64, dataset: Arc<Dataset>) {
        self.latest.send_if_modified(|current| {
            let newer = current
                .as_ref()
                .map_or(true, |snapshot| snapshot.generation < generation);
            if newer {
                *current = Some(DatasetSnapshot { generation, dataset });
            } else {
                debug!(generation, "Discarding result of an older cycle");
            }
            newer
        });
    }

    /// Start a subscription: an initial cycle right away, then one more
    /// every time the worker reports the dataset changed upstream.
    ///
    /// Cycles of one subscription run one after another, so its updates
    /// arrive in the order they were fetched.
    pub fn subscribe(&self) -> DatasetSubscription {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        // Listen before the first fetch so its revalidation can't be missed
        let mut notifications = self.client().listen();
        let fetcher = self.clone();

        let task = tokio::spawn(async move {
            if tx.send(fetcher.run_cycle().await).await.is_err() {
                return;
            }

            loop {
                let refetch = match notifications.recv().await {
                    Ok(message) => message.url() == fetcher.dataset_url,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed worker notifications, refetching dataset");
                        true
                    }
                    Err(RecvError::Closed) => return,
                };
                if !refetch {
                    continue;
                }

                debug!(url = %fetcher.dataset_url, "Dataset changed upstream, refetching");
                if tx.send(fetcher.run_cycle().await).await.is_err() {
                    debug!("Subscriber gone, stopping dataset refresh");
                    return;
                }
            }
        });

        DatasetSubscription { rx, task }
    }

    /// Look up one dancer in its id bucket. `Ok(None)` when the bucket has
    /// no record with that id.
    pub async fn dancer(&self, id: u32) -> Result<Option<ChunkDancer>, DatasetError> {
        let url = resolve_url(&self.base_url, &bucket_path(id))?;
        let bytes = self.fetch_bytes(&url).await?;
        let chunk: DancerChunk<String> = decode(&bytes)?;
        chunk.find(id).map(ChunkDancer::normalize).transpose()
    }

    /// Load the events-only document.
    pub async fn events(&self) -> Result<EventsDocument, DatasetError> {
        let url = resolve_url(&self.base_url, EVENTS_PATH)?;
        let bytes = self.fetch_bytes(&url).await?;
        let document: RawEventsDocument = decode(&bytes)?;
        document.normalize()
    }
}

/// A consumer's stream of dataset updates. Dropping it stops the refresh
/// task behind it.
pub struct DatasetSubscription {
    rx: mpsc::Receiver<DatasetUpdate>,
    task: JoinHandle<()>,
}

impl DatasetSubscription {
    /// Wait for the next update.
    pub async fn recv(&mut self) -> Option<DatasetUpdate> {
        self.rx.recv().await
    }

    pub fn into_stream(self) -> impl Stream<Item = DatasetUpdate> {
        stream::unfold(self, |mut subscription| async move {
            subscription.recv().await.map(|update| (update, subscription))
        })
    }
}

impl Drop for DatasetSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

// ============================================================================
// Tests
// ============================================================================
