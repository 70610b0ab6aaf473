//! Byte-budgeted resource cache with approximate LRU eviction.
//!
//! Entries live in a fixed table of buckets chosen by key hash. When room is
//! needed the cache evicts the least recently used entry of one bucket at a
//! time, starting at the bucket of the key being inserted. This is cheaper
//! than keeping a global recency order and gives a close approximation of it.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Default time to wait for the cache lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_millis(100);

/// Cache errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("empty cache key")]
    MissingKey,

    #[error("timed out after {0:?} waiting for the cache lock")]
    Lock(Duration),

    #[error("entry of {cost} bytes exceeds cache capacity of {capacity} bytes")]
    ValueTooLarge { cost: usize, capacity: usize },

    #[error("failed to allocate cache table of {0} buckets")]
    Alloc(usize),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Called with every value that leaves the cache.
pub type ValueDestructor<V> = Box<dyn Fn(V) + Send + Sync>;

struct Entry<V> {
    key: Box<[u8]>,
    value: V,
    cost: usize,
    last_access: u64,
}

type Bucket<V> = SmallVec<[Entry<V>; 2]>;

struct Inner<V> {
    buckets: Vec<Bucket<V>>,
    free: usize,
    len: usize,
    access_counter: u64,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl<V> Inner<V> {
    fn bucket_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() % self.buckets.len() as u64) as usize
    }

    fn position(&self, bucket: usize, key: &[u8]) -> Option<usize> {
        self.buckets[bucket].iter().position(|e| &*e.key == key)
    }

    fn touch(&mut self) -> u64 {
        self.access_counter += 1;
        self.access_counter
    }

    fn remove_at(&mut self, bucket: usize, pos: usize) -> Entry<V> {
        let entry = self.buckets[bucket].swap_remove(pos);
        self.free += entry.cost;
        self.len -= 1;
        entry
    }

    /// Remove the least recently used entry of the first non-empty bucket at
    /// or after `start`.
    fn evict_from(&mut self, start: usize) -> Option<Entry<V>> {
        let count = self.buckets.len();
        let bucket = (0..count).map(|i| (start + i) % count).find(|&b| !self.buckets[b].is_empty())?;

        let pos = self.buckets[bucket]
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| e.last_access)
            .map(|(i, _)| i)?;

        self.evictions += 1;
        Some(self.remove_at(bucket, pos))
    }
}

/// Cache statistics.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cached entries.
    pub entries: usize,
    /// Total budget in bytes.
    pub capacity: usize,
    /// Unused budget in bytes.
    pub free: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Thread-safe cache of values keyed by opaque bytes and weighted by cost.
pub struct LruCache<V> {
    inner: Mutex<Inner<V>>,
    capacity: usize,
    lock_timeout: Duration,
    destructor: Option<ValueDestructor<V>>,
}

impl<V> LruCache<V> {
    /// Create a cache holding up to `capacity` bytes of cost.
    ///
    /// The bucket table gets `capacity / avg_entry_size` slots and never
    /// grows.
    pub fn new(capacity: usize, avg_entry_size: usize) -> CacheResult<Self> {
        let bucket_count = (capacity / avg_entry_size.max(1)).max(1);

        let mut buckets = Vec::new();
        buckets
            .try_reserve_exact(bucket_count)
            .map_err(|_| CacheError::Alloc(bucket_count))?;
        buckets.resize_with(bucket_count, SmallVec::new);

        debug!(capacity, bucket_count, "created resource cache");

        Ok(Self {
            inner: Mutex::new(Inner {
                buckets,
                free: capacity,
                len: 0,
                access_counter: 0,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            capacity,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            destructor: None,
        })
    }

    /// Create a cache that hands every evicted, replaced or deleted value to
    /// `destructor`.
    pub fn with_destructor(
        capacity: usize,
        avg_entry_size: usize,
        destructor: impl Fn(V) + Send + Sync + 'static,
    ) -> CacheResult<Self> {
        let mut cache = Self::new(capacity, avg_entry_size)?;
        cache.destructor = Some(Box::new(destructor));
        Ok(cache)
    }

    /// Set how long operations wait for the lock before failing.
    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, Inner<V>>> {
        self.inner
            .try_lock_for(self.lock_timeout)
            .ok_or(CacheError::Lock(self.lock_timeout))
    }

    fn destroy(&self, value: V) {
        match &self.destructor {
            Some(destructor) => destructor(value),
            None => drop(value),
        }
    }

    /// Look up `key`, marking the entry as most recently used.
    pub fn get(&self, key: &[u8]) -> CacheResult<Option<V>>
    where
        V: Clone,
    {
        if key.is_empty() {
            return Err(CacheError::MissingKey);
        }

        let mut inner = self.lock()?;
        let bucket = inner.bucket_index(key);

        match inner.position(bucket, key) {
            Some(pos) => {
                let stamp = inner.touch();
                inner.hits += 1;
                let entry = &mut inner.buckets[bucket][pos];
                entry.last_access = stamp;
                Ok(Some(entry.value.clone()))
            }
            None => {
                inner.misses += 1;
                Ok(None)
            }
        }
    }

    /// Insert or replace `key`, evicting entries until `cost` bytes are free.
    ///
    /// A value that cannot be stored is passed to the destructor.
    pub fn set(&self, key: &[u8], value: V, cost: usize) -> CacheResult<()> {
        if key.is_empty() {
            self.destroy(value);
            return Err(CacheError::MissingKey);
        }
        if cost > self.capacity {
            warn!(cost, capacity = self.capacity, "rejected oversized cache entry");
            self.destroy(value);
            return Err(CacheError::ValueTooLarge { cost, capacity: self.capacity });
        }

        let mut inner = match self.lock() {
            Ok(inner) => inner,
            Err(err) => {
                self.destroy(value);
                return Err(err);
            }
        };
        let bucket = inner.bucket_index(key);

        if let Some(pos) = inner.position(bucket, key) {
            let old = inner.remove_at(bucket, pos);
            self.destroy(old.value);
        }

        while inner.free < cost {
            let Some(evicted) = inner.evict_from(bucket) else {
                break;
            };
            debug!(cost = evicted.cost, free = inner.free, "evicted cache entry");
            self.destroy(evicted.value);
        }

        let stamp = inner.touch();
        inner.free -= cost;
        inner.len += 1;
        inner.buckets[bucket].push(Entry {
            key: key.into(),
            value,
            cost,
            last_access: stamp,
        });

        trace!(cost, free = inner.free, "cache set");
        Ok(())
    }

    /// Remove `key`. Returns whether an entry was removed.
    pub fn delete(&self, key: &[u8]) -> CacheResult<bool> {
        if key.is_empty() {
            return Err(CacheError::MissingKey);
        }

        let mut inner = self.lock()?;
        let bucket = inner.bucket_index(key);
        match inner.position(bucket, key) {
            Some(pos) => {
                let entry = inner.remove_at(bucket, pos);
                self.destroy(entry.value);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove every entry.
    pub fn clear(&self) -> CacheResult<()> {
        let mut inner = self.lock()?;
        let drained: Vec<Entry<V>> = inner.buckets.iter_mut().flat_map(|b| b.drain(..)).collect();
        inner.free = self.capacity;
        inner.len = 0;
        drop(inner);

        for entry in drained {
            self.destroy(entry.value);
        }
        Ok(())
    }

    /// Whether `key` is cached. Does not count as a use.
    ///
    /// The read accessors below wait for the lock without the configured
    /// timeout, so they never fail. Callers that must not block should use
    /// [`get`](Self::get).
    pub fn contains(&self, key: &[u8]) -> bool {
        let inner = self.inner.lock();
        let bucket = inner.bucket_index(key);
        inner.position(bucket, key).is_some()
    }

    /// Number of entries. Blocks on the lock.
    pub fn len(&self) -> usize {
        self.inner.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unused budget in bytes. Blocks on the lock.
    pub fn free_memory(&self) -> usize {
        self.inner.lock().free
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Snapshot of the counters. Blocks on the lock.
    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        CacheStats {
            entries: inner.len,
            capacity: self.capacity,
            free: inner.free,
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }
}

impl<V> Drop for LruCache<V> {
    fn drop(&mut self) {
        let buckets = std::mem::take(&mut self.inner.get_mut().buckets);
        for entry in buckets.into_iter().flatten() {
            self.destroy(entry.value);
        }
    }
}

impl<V> std::fmt::Debug for LruCache<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LruCache")
            .field("capacity", &self.capacity)
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}
