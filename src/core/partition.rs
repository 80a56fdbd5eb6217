// src/core/partition.rs
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};

/// Point-in-time counters for one language partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionStats {
    pub entries: usize,
    pub bytes: u64,
    pub hits: u64,
    pub misses: u64,
    /// Partial pages computed and served without being stored.
    pub bypasses: u64,
    pub evictions: u64,
}

impl PartitionStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

struct StoredPage {
    payload: Bytes,
    last_used: u64,
}

/// Byte-bounded LRU map from page offset to payload.
///
/// Entries have no TTL. They leave only when inserting another page would
/// push the total past `max_bytes`.
pub struct PageStore {
    max_bytes: u64,
    bytes: u64,
    clock: u64,
    pages: HashMap<u64, StoredPage>,
    /// last_used tick -> offset, oldest first
    recency: BTreeMap<u64, u64>,
    evictions: u64,
}

impl PageStore {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            max_bytes,
            bytes: 0,
            clock: 0,
            pages: HashMap::new(),
            recency: BTreeMap::new(),
            evictions: 0,
        }
    }

    pub fn get(&mut self, offset: u64) -> Option<Bytes> {
        let tick = self.next_tick();
        let page = self.pages.get_mut(&offset)?;
        self.recency.remove(&page.last_used);
        page.last_used = tick;
        self.recency.insert(tick, offset);
        Some(page.payload.clone())
    }

    pub fn contains(&self, offset: u64) -> bool {
        self.pages.contains_key(&offset)
    }

    /// Stores a payload, evicting least recently used pages to make room.
    /// Returns false when the payload alone exceeds the capacity.
    pub fn insert(&mut self, offset: u64, payload: Bytes) -> bool {
        let size = payload.len() as u64;
        if size > self.max_bytes {
            return false;
        }

        self.remove(offset);
        while self.bytes + size > self.max_bytes {
            let Some((_, oldest)) = self.recency.pop_first() else { break };
            if let Some(evicted) = self.pages.remove(&oldest) {
                self.bytes -= evicted.payload.len() as u64;
                self.evictions += 1;
            }
        }

        let tick = self.next_tick();
        self.recency.insert(tick, offset);
        self.pages.insert(offset, StoredPage { payload, last_used: tick });
        self.bytes += size;
        true
    }

    fn remove(&mut self, offset: u64) {
        if let Some(old) = self.pages.remove(&offset) {
            self.recency.remove(&old.last_used);
            self.bytes -= old.payload.len() as u64;
        }
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn evictions(&self) -> u64 {
        self.evictions
    }

    fn next_tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }
}
