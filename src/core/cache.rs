// src/core/cache.rs
//! Paginated page cache, one partition per language.
//!
//! A miss is computed once no matter how many requests want the same page:
//! the first caller fills an in-flight cell and everyone else awaits it.
//! Only full pages are admitted. The tail page of a corpus is computed the
//! same way but handed back without being stored, since learning can still
//! grow it.

use crate::config::ServiceConfig;
use crate::core::codec::{encode_page, DownloadResponse, StandardResponse};
use crate::core::page::{FillOutcome, PageCompleteness, ServedPage};
use crate::core::partition::{PageStore, PartitionStats};
use crate::core::peers::{PagePeer, PeerPool};
use crate::core::types::{Language, PageKey};
use crate::corpus::CorpusSource;
use crate::error::{PageError, PageResult, ValidationError};
use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

type Flight = Arc<OnceCell<PageResult<ServedPage>>>;

struct Partition {
    store: Mutex<PageStore>,
    /// offset -> fill in progress
    flights: Mutex<HashMap<u64, Flight>>,
    hits: AtomicU64,
    misses: AtomicU64,
    bypasses: AtomicU64,
}

impl Partition {
    fn new(max_bytes: u64) -> Self {
        Self {
            store: Mutex::new(PageStore::new(max_bytes)),
            flights: Mutex::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            bypasses: AtomicU64::new(0),
        }
    }

    fn lookup(&self, offset: u64) -> Option<Bytes> {
        let body = self.store.lock().get(offset);
        if body.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
        }
        body
    }

    /// Returns the flight for `offset`, or the stored page if a flight
    /// finished since the caller's lookup.
    fn join_flight(&self, offset: u64) -> Result<Flight, Bytes> {
        let mut flights = self.flights.lock();
        // Already counted as a miss by the caller.
        if let Some(body) = self.store.lock().get(offset) {
            return Err(body);
        }
        Ok(Arc::clone(flights.entry(offset).or_default()))
    }

    fn land(&self, offset: u64, flight: &Flight) {
        let mut flights = self.flights.lock();
        if flights.get(&offset).is_some_and(|f| Arc::ptr_eq(f, flight)) {
            flights.remove(&offset);
        }
    }

    fn stats(&self) -> PartitionStats {
        let store = self.store.lock();
        PartitionStats {
            entries: store.len(),
            bytes: store.bytes(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            bypasses: self.bypasses.load(Ordering::Relaxed),
            evictions: store.evictions(),
        }
    }
}

/// Distributed page cache over a [`CorpusSource`].
pub struct PageCache<S> {
    source: Arc<S>,
    languages: HashSet<Language>,
    page_size: usize,
    partition_max_bytes: u64,
    partitions: DashMap<Language, Arc<Partition>>,
    peers: PeerPool,
}

impl<S: CorpusSource> PageCache<S> {
    pub fn new<I>(source: Arc<S>, languages: I, page_size: usize, partition_max_bytes: u64) -> Self
    where
        I: IntoIterator<Item = Language>,
    {
        Self {
            source,
            languages: languages.into_iter().collect(),
            page_size: page_size.max(1),
            partition_max_bytes,
            partitions: DashMap::new(),
            peers: PeerPool::local("local"),
        }
    }

    /// Builds the cache for `config.node_id`.
    ///
    /// Every configured peer joins the ownership ring, so nodes sharing a
    /// config agree on page owners. Pages are only forwarded to peers attached
    /// through [`PeerPool::with_peer`]; until then this node computes them.
    pub fn from_config(source: Arc<S>, config: &ServiceConfig) -> Self {
        let peers = config
            .peers
            .iter()
            .fold(PeerPool::local(config.node_id.as_str()), |pool, id| pool.with_member(id));
        Self::new(source, config.language_set(), config.page_size, config.partition_max_bytes).with_peers(peers)
    }

    pub fn with_peers(mut self, peers: PeerPool) -> Self {
        self.peers = peers;
        self
    }

    /// Node id owning the page under the current ring.
    pub fn owner_of(&self, key: &PageKey) -> &str {
        self.peers.owner_of(key)
    }

    /// Checks a raw page request against the configured languages.
    pub fn page_key(&self, language: &str, offset: i64) -> Result<PageKey, ValidationError> {
        let language = Language::new(language);
        if !self.languages.contains(&language) {
            return Err(ValidationError::UnknownLanguage(language.to_string()));
        }
        let offset = u64::try_from(offset).map_err(|_| ValidationError::NegativeOffset(offset))?;
        Ok(PageKey::new(language, offset))
    }

    /// Serves the page at `offset`, forwarding to the owning peer when
    /// another node owns it.
    pub async fn get(&self, language: &str, offset: i64) -> PageResult<ServedPage> {
        let key = self.page_key(language, offset)?;
        self.load(key, true).await
    }

    /// Serves the page from this node only. Peers answer forwarded
    /// requests with this.
    pub async fn get_local(&self, language: &str, offset: i64) -> PageResult<ServedPage> {
        let key = self.page_key(language, offset)?;
        self.load(key, false).await
    }

    async fn load(&self, key: PageKey, forward: bool) -> PageResult<ServedPage> {
        let partition = self.partition(&key.language);

        if let Some(body) = partition.lookup(key.offset) {
            debug!(page = %key, "page cache hit");
            return Ok(ServedPage { body, cached: true });
        }
        partition.misses.fetch_add(1, Ordering::Relaxed);

        let flight = match partition.join_flight(key.offset) {
            Ok(flight) => flight,
            Err(body) => return Ok(ServedPage { body, cached: true }),
        };

        let mut leader = false;
        let served = flight
            .get_or_init(|| {
                leader = true;
                self.fill(&partition, &key, forward)
            })
            .await
            .clone();

        if leader {
            partition.land(key.offset, &flight);
        }
        served
    }

    async fn fill(&self, partition: &Partition, key: &PageKey, forward: bool) -> PageResult<ServedPage> {
        if forward {
            if let Some(peer) = self.peers.pick(key) {
                debug!(page = %key, peer = peer.node_id(), "forwarding page to owner");
                return peer.fetch_page(key).await.map_err(|e| PageError::Peer {
                    node: peer.node_id().to_string(),
                    message: e.to_string(),
                });
            }
        }

        match self.compute(key).await {
            FillOutcome::Cacheable(body) => {
                let cached = partition.store.lock().insert(key.offset, body.clone());
                debug!(page = %key, bytes = body.len(), cached, "full page computed");
                Ok(ServedPage { body, cached })
            }
            FillOutcome::Bypass(body) => {
                partition.bypasses.fetch_add(1, Ordering::Relaxed);
                debug!(page = %key, bytes = body.len(), "partial page served without caching");
                Ok(ServedPage { body, cached: false })
            }
            FillOutcome::Failed(e) => {
                debug!(page = %key, "page fill failed: {}", e);
                Err(e)
            }
        }
    }

    async fn compute(&self, key: &PageKey) -> FillOutcome<PageError> {
        let mut words = match self.source.fetch(&key.language, key.offset, self.page_size).await {
            Ok(words) => words,
            Err(source) => {
                return FillOutcome::Failed(PageError::Fetch {
                    language: key.language.to_string(),
                    offset: key.offset,
                    source,
                })
            }
        };
        if words.len() > self.page_size {
            warn!(page = %key, returned = words.len(), page_size = self.page_size, "corpus overfilled page, trimming");
            words.truncate(self.page_size);
        }

        let completeness = PageCompleteness::classify(words.len(), self.page_size);
        let response = DownloadResponse::new(words, StandardResponse::now());
        match encode_page(&response) {
            Ok(payload) => FillOutcome::from_payload(payload, completeness),
            Err(e) => FillOutcome::Failed(e),
        }
    }

    fn partition(&self, language: &Language) -> Arc<Partition> {
        if let Some(partition) = self.partitions.get(language) {
            return Arc::clone(partition.value());
        }
        let partition = self.partitions.entry(language.clone()).or_insert_with(|| {
            info!(language = %language, max_bytes = self.partition_max_bytes, "creating page partition");
            Arc::new(Partition::new(self.partition_max_bytes))
        });
        Arc::clone(partition.value())
    }

    pub fn stats(&self, language: &str) -> Option<PartitionStats> {
        self.partitions.get(&Language::new(language)).map(|p| p.stats())
    }

    pub fn partition_count(&self) -> usize {
        self.partitions.len()
    }
}

/// A peer living in the same process, for tests and single-binary clusters.
pub struct LocalPeer<S> {
    node_id: String,
    cache: Arc<PageCache<S>>,
}

impl<S> LocalPeer<S> {
    pub fn new(node_id: impl Into<String>, cache: Arc<PageCache<S>>) -> Self {
        Self { node_id: node_id.into(), cache }
    }
}

impl<S: CorpusSource> PagePeer for LocalPeer<S> {
    fn node_id(&self) -> &str {
        &self.node_id
    }

    fn fetch_page<'a>(&'a self, key: &'a PageKey) -> BoxFuture<'a, PageResult<ServedPage>> {
        Box::pin(self.cache.load(key.clone(), false))
    }
}
