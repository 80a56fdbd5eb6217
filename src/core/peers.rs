// src/core/peers.rs
//! Page ownership across nodes.
//!
//! Every node runs the same [`HashRing`], so they all agree on which node
//! owns a page. A miss for a page owned elsewhere is forwarded to the owner
//! instead of being computed locally.

use crate::core::page::ServedPage;
use crate::core::types::PageKey;
use crate::error::PageResult;
use futures::future::BoxFuture;
use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

const DEFAULT_VIRTUAL_NODES: usize = 50;

/// Consistent hash ring of node ids.
#[derive(Debug, Clone)]
pub struct HashRing {
    virtual_nodes: usize,
    ring: BTreeMap<u64, String>,
}

impl HashRing {
    pub fn new(virtual_nodes: usize) -> Self {
        Self { virtual_nodes: virtual_nodes.max(1), ring: BTreeMap::new() }
    }

    pub fn add_node(&mut self, node_id: &str) {
        for i in 0..self.virtual_nodes {
            self.ring.insert(Self::hash_virtual_node(node_id, i), node_id.to_string());
        }
    }

    pub fn remove_node(&mut self, node_id: &str) {
        for i in 0..self.virtual_nodes {
            self.ring.remove(&Self::hash_virtual_node(node_id, i));
        }
    }

    /// First node clockwise from the key's hash.
    pub fn owner(&self, key: &PageKey) -> Option<&str> {
        let hash = Self::hash_key(key);
        self.ring
            .range(hash..)
            .next()
            .or_else(|| self.ring.iter().next())
            .map(|(_, node)| node.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    fn hash_key(key: &PageKey) -> u64 {
        let mut hasher = DefaultHasher::new();
        key.language.code().hash(&mut hasher);
        key.offset.hash(&mut hasher);
        hasher.finish()
    }

    fn hash_virtual_node(node_id: &str, virtual_index: usize) -> u64 {
        let mut hasher = DefaultHasher::new();
        node_id.hash(&mut hasher);
        virtual_index.hash(&mut hasher);
        hasher.finish()
    }
}

/// Client side of another node's page cache.
///
/// Implementations hand the key to the remote node, which must answer
/// through [`crate::PageCache::get_local`] so a request never bounces.
pub trait PagePeer: Send + Sync {
    fn node_id(&self) -> &str;

    fn fetch_page<'a>(&'a self, key: &'a PageKey) -> BoxFuture<'a, PageResult<ServedPage>>;
}

/// This node's view of the cluster.
pub struct PeerPool {
    self_id: String,
    ring: HashRing,
    peers: HashMap<String, Arc<dyn PagePeer>>,
}

impl PeerPool {
    /// A single-node pool; every key is owned locally.
    pub fn local(self_id: impl Into<String>) -> Self {
        let self_id = self_id.into();
        let mut ring = HashRing::new(DEFAULT_VIRTUAL_NODES);
        ring.add_node(&self_id);
        Self { self_id, ring, peers: HashMap::new() }
    }

    pub fn with_peer(mut self, peer: Arc<dyn PagePeer>) -> Self {
        let id = peer.node_id().to_string();
        if id != self.self_id {
            self.ring.add_node(&id);
            self.peers.insert(id, peer);
        }
        self
    }

    /// Adds a node to the ring without a client. Keys it owns are computed
    /// here until a peer with that id is attached.
    pub fn with_member(mut self, node_id: &str) -> Self {
        if node_id != self.self_id {
            self.ring.add_node(node_id);
        }
        self
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// The peer owning `key`, or None when this node owns it.
    pub fn pick(&self, key: &PageKey) -> Option<Arc<dyn PagePeer>> {
        if self.peers.is_empty() {
            return None;
        }
        match self.ring.owner(key) {
            Some(owner) if owner != self.self_id => self.peers.get(owner).cloned(),
            _ => None,
        }
    }

    pub fn owner_of(&self, key: &PageKey) -> &str {
        self.ring.owner(key).unwrap_or(&self.self_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Language;
    use bytes::Bytes;

    struct NullPeer(String);

    impl PagePeer for NullPeer {
        fn node_id(&self) -> &str {
            &self.0
        }

        fn fetch_page<'a>(&'a self, _key: &'a PageKey) -> BoxFuture<'a, PageResult<ServedPage>> {
            Box::pin(async { Ok(ServedPage { body: Bytes::new(), cached: false }) })
        }
    }

    fn key(offset: u64) -> PageKey {
        PageKey::new(Language::new("ml"), offset)
    }

    #[test]
    fn test_ring_owner_is_stable() {
        let mut ring = HashRing::new(16);
        ring.add_node("a");
        ring.add_node("b");
        for offset in (0..1000).step_by(100) {
            assert_eq!(ring.owner(&key(offset)), ring.owner(&key(offset)));
        }
    }

    #[test]
    fn test_empty_ring_has_no_owner() {
        let ring = HashRing::new(4);
        assert!(ring.is_empty());
        assert_eq!(ring.owner(&key(0)), None);
    }

    #[test]
    fn test_removed_node_owns_nothing() {
        let mut ring = HashRing::new(16);
        ring.add_node("a");
        ring.add_node("b");
        ring.remove_node("b");
        for offset in (0..2000).step_by(100) {
            assert_eq!(ring.owner(&key(offset)), Some("a"));
        }
    }

    #[test]
    fn test_local_pool_never_forwards() {
        let pool = PeerPool::local("n1");
        assert!(pool.pick(&key(0)).is_none());
        assert_eq!(pool.owner_of(&key(0)), "n1");
    }

    #[test]
    fn test_pool_splits_keys_between_nodes() {
        let pool = PeerPool::local("n1").with_peer(Arc::new(NullPeer("n2".into())));
        assert_eq!(pool.peer_count(), 1);

        let forwarded = (0..200u64).filter(|&i| pool.pick(&key(i * 100)).is_some()).count();
        assert!(forwarded > 0 && forwarded < 200);
    }

    #[test]
    fn test_members_agree_on_owner() {
        let a = PeerPool::local("a").with_member("b");
        let b = PeerPool::local("b").with_member("a");
        let owners: Vec<_> = (0..50u64).map(|i| a.owner_of(&key(i * 100)).to_string()).collect();

        assert!(owners.iter().any(|o| o == "a") && owners.iter().any(|o| o == "b"));
        for (i, owner) in owners.iter().enumerate() {
            assert_eq!(b.owner_of(&key(i as u64 * 100)), owner);
        }
        // No client attached, so nothing is forwarded.
        assert!((0..50u64).all(|i| a.pick(&key(i * 100)).is_none()));
    }

    #[test]
    fn test_pool_ignores_self_as_peer() {
        let pool = PeerPool::local("n1").with_peer(Arc::new(NullPeer("n1".into())));
        assert_eq!(pool.peer_count(), 0);
    }
}
