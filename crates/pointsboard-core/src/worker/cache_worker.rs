//! Cache-then-network request handling.
//!
//! A cache hit is answered immediately while a background task fetches the
//! same URL, overwrites the entry, and tells the originating page when the
//! `Last-Modified` header moved. A miss goes to the network and the
//! response is both returned and stored.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::{ApiError, Network, Resource};
use crate::cache::CacheStore;

use super::client::{ClientHandle, ClientId, WorkerMessage, CLIENT_CHANNEL_CAPACITY};

/// How requests are answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// Answer from cache when possible and refresh in the background.
    #[default]
    StaleWhileRevalidate,
    /// Try the network first, fall back to the cache when it fails.
    /// Never notifies pages.
    NetworkFirst,
}

/// When a cache hit triggers a background fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RevalidatePolicy {
    #[default]
    Always,
    /// At most one successful network fetch per URL for the worker's lifetime.
    OncePerSession,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerOptions {
    pub strategy: CacheStrategy,
    pub revalidate: RevalidatePolicy,
}

/// A request entering the worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    /// Page that issued the request; change notifications go back to it.
    pub client: Option<ClientId>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: None,
        }
    }

    pub fn from_client(mut self, client: ClientId) -> Self {
        self.client = Some(client);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
}

/// The worker's answer to one request.
#[derive(Debug)]
pub struct Intercepted {
    pub response: Resource,
    pub source: ResponseSource,
    /// Background refresh started for a cache hit. Dropping the handle
    /// leaves it running.
    pub revalidation: Option<JoinHandle<()>>,
}

impl Intercepted {
    /// Wait for the background refresh, if any, to finish.
    pub async fn finish_revalidation(&mut self) {
        if let Some(handle) = self.revalidation.take() {
            if let Err(e) = handle.await {
                warn!(url = %self.response.url, error = %e, "Revalidation task failed");
            }
        }
    }
}

struct Inner<N> {
    network: N,
    store: CacheStore,
    options: WorkerOptions,
    clients: Mutex<HashMap<ClientId, broadcast::Sender<WorkerMessage>>>,
    next_client: AtomicU64,
    revalidated: Mutex<HashSet<String>>,
}

/// Intermediates every asset fetch through the persistent cache.
/// Clone is cheap and shares all state.
pub struct CacheWorker<N> {
    inner: Arc<Inner<N>>,
}

impl<N> Clone for CacheWorker<N> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<N> CacheWorker<N> {
    /// Register a page. Messages for it arrive on the returned handle.
    pub fn register_client(&self) -> ClientHandle {
        let id = ClientId(self.inner.next_client.fetch_add(1, Ordering::Relaxed));
        let (tx, _) = broadcast::channel(CLIENT_CHANNEL_CAPACITY);
        self.inner
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, tx.clone());
        debug!(client = %id, "Client registered");
        ClientHandle::new(id, tx)
    }

    pub fn unregister_client(&self, id: ClientId) {
        let removed = self
            .inner
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id);
        if removed.is_some() {
            debug!(client = %id, "Client unregistered");
        }
    }

    #[cfg(test)]
    pub(crate) fn client_count(&self) -> usize {
        self.inner.clients.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl<N: Network> CacheWorker<N> {
    pub fn new(network: N, store: CacheStore, options: WorkerOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                network,
                store,
                options,
                clients: Mutex::new(HashMap::new()),
                next_client: AtomicU64::new(1),
                revalidated: Mutex::new(HashSet::new()),
            }),
        }
    }

    pub fn store(&self) -> &CacheStore {
        &self.inner.store
    }

    /// Store each precache URL. Failures are logged and skipped.
    /// Returns how many were stored; with an empty list this does nothing.
    pub async fn install(&self, precache: &[String]) -> usize {
        let mut stored = 0;
        for url in precache {
            match self.inner.network.fetch(url).await {
                Ok(resource) => {
                    if self.inner.store_response(&resource) {
                        stored += 1;
                    }
                }
                Err(e) => warn!(url = %url, error = %e, "Failed to precache"),
            }
        }
        info!(stored, requested = precache.len(), cache = %self.inner.store.name(), "Worker installed");
        stored
    }

    /// Drop every cache generation other than the current one.
    pub fn activate(&self) -> Result<Vec<String>> {
        self.inner.store.prune_other_generations()
    }

    /// Answer a request according to the configured strategy.
    ///
    /// Network errors are returned unmodified when there is nothing cached
    /// to fall back on.
    pub async fn handle_fetch(&self, request: FetchRequest) -> Result<Intercepted, ApiError> {
        match self.inner.options.strategy {
            CacheStrategy::StaleWhileRevalidate => self.stale_while_revalidate(request).await,
            CacheStrategy::NetworkFirst => self.network_first(request).await,
        }
    }

    async fn stale_while_revalidate(&self, request: FetchRequest) -> Result<Intercepted, ApiError> {
        if let Some(cached) = self.inner.lookup(&request.url) {
            let revalidation = if self.inner.should_revalidate(&request.url) {
                let inner = Arc::clone(&self.inner);
                let previous = cached.last_modified.clone();
                Some(tokio::spawn(async move {
                    inner.revalidate(request, previous).await;
                }))
            } else {
                debug!(url = %request.url, "Already revalidated this session, serving cache only");
                None
            };
            return Ok(Intercepted {
                response: cached,
                source: ResponseSource::Cache,
                revalidation,
            });
        }

        let fresh = self.inner.network.fetch(&request.url).await?;
        self.inner.store_response(&fresh);
        self.inner.mark_revalidated(&request.url);
        Ok(Intercepted {
            response: fresh,
            source: ResponseSource::Network,
            revalidation: None,
        })
    }

    async fn network_first(&self, request: FetchRequest) -> Result<Intercepted, ApiError> {
        match self.inner.network.fetch(&request.url).await {
            Ok(fresh) => {
                self.inner.store_response(&fresh);
                Ok(Intercepted {
                    response: fresh,
                    source: ResponseSource::Network,
                    revalidation: None,
                })
            }
            Err(e) => match self.inner.lookup(&request.url) {
                Some(cached) => {
                    warn!(url = %request.url, error = %e, "Network unavailable, serving cached response");
                    Ok(Intercepted {
                        response: cached,
                        source: ResponseSource::Cache,
                        revalidation: None,
                    })
                }
                None => Err(e),
            },
        }
    }
}

impl<N: Network> Inner<N> {
    /// Cache read errors count as a miss.
    fn lookup(&self, url: &str) -> Option<Resource> {
        match self.store.match_url(url) {
            Ok(cached) => cached.map(|c| c.data),
            Err(e) => {
                warn!(url = url, error = %e, "Failed to read cache entry");
                None
            }
        }
    }

    /// Cache write errors are logged; the response is still served.
    fn store_response(&self, resource: &Resource) -> bool {
        match self.store.put(resource) {
            Ok(()) => true,
            Err(e) => {
                warn!(url = %resource.url, error = %e, "Failed to cache response");
                false
            }
        }
    }

    fn should_revalidate(&self, url: &str) -> bool {
        match self.options.revalidate {
            RevalidatePolicy::Always => true,
            RevalidatePolicy::OncePerSession => !self
                .revalidated
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(url),
        }
    }

    fn mark_revalidated(&self, url: &str) {
        self.revalidated
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(url.to_string());
    }

    async fn revalidate(&self, request: FetchRequest, previous: Option<String>) {
        let fresh = match self.network.fetch(&request.url).await {
            Ok(fresh) => fresh,
            Err(e) => {
                warn!(url = %request.url, error = %e, "Background revalidation failed, keeping cached response");
                return;
            }
        };

        self.store_response(&fresh);
        self.mark_revalidated(&request.url);

        if fresh.last_modified == previous {
            debug!(url = %request.url, "Resource unchanged upstream");
            return;
        }

        info!(url = %request.url, old = ?previous, new = ?fresh.last_modified, "Resource changed upstream");
        match request.client {
            Some(client) => self.notify(client, WorkerMessage::Fetched { url: request.url }),
            None => debug!(url = %request.url, "No originating client to notify"),
        }
    }

    fn notify(&self, client: ClientId, message: WorkerMessage) {
        let clients = self.clients.lock().unwrap_or_else(PoisonError::into_inner);
        match clients.get(&client) {
            Some(tx) => {
                if tx.send(message).is_err() {
                    debug!(client = %client, "Client has no listeners");
                }
            }
            None => debug!(client = %client, "Client no longer registered"),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeNetwork;
    use tokio::sync::broadcast::error::TryRecvError;

    const URL: &str = "https://example.org/points/assets/database.txt";
    const OLD: &str = "Mon, 15 Jan 2024 00:00:00 GMT";
    const NEW: &str = "Tue, 16 Jan 2024 00:00:00 GMT";

    fn worker(tmp: &tempfile::TempDir, options: WorkerOptions) -> (CacheWorker<FakeNetwork>, FakeNetwork) {
        let network = FakeNetwork::new();
        let store = CacheStore::open(tmp.path(), "static_site_cache_v1").unwrap();
        (CacheWorker::new(network.clone(), store, options), network)
    }

    fn prime(worker: &CacheWorker<FakeNetwork>, last_modified: &str, body: Vec<u8>) {
        worker
            .store()
            .put(&Resource::new(URL, body).with_last_modified(last_modified))
            .unwrap();
    }

    #[tokio::test]
    async fn test_miss_fetches_stores_and_does_not_notify() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, network) = worker(&tmp, WorkerOptions::default());
        let client = worker.register_client();
        let mut messages = client.listen();
        network.serve(URL, OLD, vec![1, 2, 3]);

        let intercepted = worker
            .handle_fetch(FetchRequest::new(URL).from_client(client.id()))
            .await
            .unwrap();

        assert_eq!(intercepted.source, ResponseSource::Network);
        assert_eq!(intercepted.response.body, vec![1, 2, 3]);
        assert!(intercepted.revalidation.is_none());
        assert_eq!(network.calls(URL), 1);

        let cached = worker.store().match_url(URL).unwrap().unwrap();
        assert_eq!(cached.data.body, vec![1, 2, 3]);
        assert!(matches!(messages.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_hit_unchanged_serves_cache_without_notification() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, network) = worker(&tmp, WorkerOptions::default());
        let client = worker.register_client();
        let mut messages = client.listen();
        prime(&worker, OLD, vec![1]);
        network.serve(URL, OLD, vec![1]);

        let mut intercepted = worker
            .handle_fetch(FetchRequest::new(URL).from_client(client.id()))
            .await
            .unwrap();
        assert_eq!(intercepted.source, ResponseSource::Cache);
        intercepted.finish_revalidation().await;

        assert_eq!(network.calls(URL), 1);
        assert!(matches!(messages.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_hit_changed_notifies_exactly_once_and_overwrites() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, network) = worker(&tmp, WorkerOptions::default());
        let client = worker.register_client();
        let mut messages = client.listen();
        prime(&worker, OLD, vec![1]);
        network.serve(URL, NEW, vec![2, 2]);

        let mut intercepted = worker
            .handle_fetch(FetchRequest::new(URL).from_client(client.id()))
            .await
            .unwrap();
        // The stale copy is what the caller gets right away
        assert_eq!(intercepted.response.body, vec![1]);
        intercepted.finish_revalidation().await;

        assert_eq!(
            messages.try_recv().unwrap(),
            WorkerMessage::Fetched { url: URL.to_string() }
        );
        assert!(matches!(messages.try_recv(), Err(TryRecvError::Empty)));

        let cached = worker.store().match_url(URL).unwrap().unwrap();
        assert_eq!(cached.data.body, vec![2, 2]);
        assert_eq!(cached.data.last_modified.as_deref(), Some(NEW));
    }

    #[tokio::test]
    async fn test_notification_only_reaches_originating_client() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, network) = worker(&tmp, WorkerOptions::default());
        let origin = worker.register_client();
        let other = worker.register_client();
        let mut origin_messages = origin.listen();
        let mut other_messages = other.listen();
        prime(&worker, OLD, vec![1]);
        network.serve(URL, NEW, vec![2]);

        let mut intercepted = worker
            .handle_fetch(FetchRequest::new(URL).from_client(origin.id()))
            .await
            .unwrap();
        intercepted.finish_revalidation().await;

        assert!(origin_messages.try_recv().is_ok());
        assert!(matches!(other_messages.try_recv(), Err(TryRecvError::Empty)));
    }

    #[tokio::test]
    async fn test_miss_with_network_failure_rejects() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, network) = worker(&tmp, WorkerOptions::default());
        network.fail(URL);

        let result = worker.handle_fetch(FetchRequest::new(URL)).await;
        assert!(matches!(result, Err(ApiError::ServerError(msg)) if msg.contains(URL)));
        assert!(worker.store().match_url(URL).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_hit_with_network_failure_keeps_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, network) = worker(&tmp, WorkerOptions::default());
        let client = worker.register_client();
        let mut messages = client.listen();
        prime(&worker, OLD, vec![7]);
        network.fail(URL);

        let mut intercepted = worker
            .handle_fetch(FetchRequest::new(URL).from_client(client.id()))
            .await
            .unwrap();
        intercepted.finish_revalidation().await;

        assert_eq!(intercepted.response.body, vec![7]);
        assert!(matches!(messages.try_recv(), Err(TryRecvError::Empty)));
        let cached = worker.store().match_url(URL).unwrap().unwrap();
        assert_eq!(cached.data.last_modified.as_deref(), Some(OLD));
    }

    #[tokio::test]
    async fn test_once_per_session_skips_second_revalidation() {
        let tmp = tempfile::tempdir().unwrap();
        let options = WorkerOptions {
            revalidate: RevalidatePolicy::OncePerSession,
            ..WorkerOptions::default()
        };
        let (worker, network) = worker(&tmp, options);
        prime(&worker, OLD, vec![1]);
        network.serve(URL, OLD, vec![1]);

        let mut first = worker.handle_fetch(FetchRequest::new(URL)).await.unwrap();
        first.finish_revalidation().await;
        let second = worker.handle_fetch(FetchRequest::new(URL)).await.unwrap();

        assert!(second.revalidation.is_none());
        assert_eq!(second.source, ResponseSource::Cache);
        assert_eq!(network.calls(URL), 1);
    }

    #[tokio::test]
    async fn test_network_first_prefers_network_then_falls_back() {
        let tmp = tempfile::tempdir().unwrap();
        let options = WorkerOptions {
            strategy: CacheStrategy::NetworkFirst,
            ..WorkerOptions::default()
        };
        let (worker, network) = worker(&tmp, options);
        prime(&worker, OLD, vec![1]);
        network.serve(URL, NEW, vec![2]);

        let fresh = worker.handle_fetch(FetchRequest::new(URL)).await.unwrap();
        assert_eq!(fresh.source, ResponseSource::Network);
        assert_eq!(fresh.response.body, vec![2]);

        network.fail(URL);
        let fallback = worker.handle_fetch(FetchRequest::new(URL)).await.unwrap();
        assert_eq!(fallback.source, ResponseSource::Cache);
        assert_eq!(fallback.response.body, vec![2]);
    }

    #[tokio::test]
    async fn test_install_precaches_and_skips_failures() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, network) = worker(&tmp, WorkerOptions::default());
        network.serve("https://example.org/index.html", OLD, b"<html>".to_vec());
        network.fail("https://example.org/offline.html");

        assert_eq!(worker.install(&[]).await, 0);
        let stored = worker
            .install(&[
                "https://example.org/index.html".to_string(),
                "https://example.org/offline.html".to_string(),
            ])
            .await;

        assert_eq!(stored, 1);
        assert!(worker.store().match_url("https://example.org/index.html").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unregistered_client_is_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        let (worker, network) = worker(&tmp, WorkerOptions::default());
        let client = worker.register_client();
        let mut messages = client.listen();
        worker.unregister_client(client.id());
        prime(&worker, OLD, vec![1]);
        network.serve(URL, NEW, vec![2]);

        let mut intercepted = worker
            .handle_fetch(FetchRequest::new(URL).from_client(client.id()))
            .await
            .unwrap();
        intercepted.finish_revalidation().await;

        assert!(matches!(messages.try_recv(), Err(TryRecvError::Empty)));
    }

    #[test]
    fn test_activate_prunes_old_generations() {
        let tmp = tempfile::tempdir().unwrap();
        CacheStore::open(tmp.path(), "static_site_cache_v0").unwrap();
        let (worker, _network) = worker(&tmp, WorkerOptions::default());

        assert_eq!(worker.activate().unwrap(), vec!["static_site_cache_v0".to_string()]);
        assert!(worker.activate().unwrap().is_empty());
    }
}
