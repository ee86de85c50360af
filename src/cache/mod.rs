//! Leaf result caching
//!
//! [`ActionCache`] memoizes leaf results keyed by leaf value. Caching is
//! opt-in per leaf type: only types given an expiry with
//! [`CacheBuilder::expire`] are ever stored, so per-request leaves such as
//! "read the request body" are never served stale.
//!
//! Expiry is measured from the time of the write; reads refresh an entry's
//! recency for size-based eviction but never its deadline. The cache is cheap
//! to clone and meant to be built once and shared by every interpreter that
//! evaluates the same leaf types.

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::action::leaf::short_type_name;
use crate::action::{Leaf, LeafRef, Value};
use crate::interpreter::{Evaluate, Result};

/// Time sources for expiry.
pub mod clock;
/// File-based cache tuning.
pub mod settings;

pub use clock::{Clock, ManualClock, SystemClock};
pub use settings::CacheSettings;

use clock::add_saturating;

/// Expiry configured for one leaf type.
#[derive(Debug, Clone, Copy)]
struct Policy {
    type_name: &'static str,
    after_write: Duration,
}

/// Counters describing cache effectiveness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups answered from the cache
    pub hits: u64,
    /// Lookups that found nothing usable
    pub misses: u64,
    /// Entries dropped to respect the size cap
    pub evictions: u64,
    /// Entries dropped because their write expiry passed
    pub expirations: u64,
}

struct Entry {
    value: Value,
    expires_at: DateTime<Utc>,
    last_used: u64,
}

#[derive(Default)]
struct Store {
    entries: HashMap<LeafRef, Entry>,
    /// Recency index: oldest use first.
    recency: BTreeMap<u64, LeafRef>,
    tick: u64,
    stats: CacheStats,
}

impl Store {
    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    fn remove(&mut self, leaf: &LeafRef) -> Option<Entry> {
        let entry = self.entries.remove(leaf)?;
        self.recency.remove(&entry.last_used);
        Some(entry)
    }
}

struct CacheInner {
    policies: HashMap<TypeId, Policy>,
    maximum_entries: Option<usize>,
    clock: Arc<dyn Clock>,
    store: Mutex<Store>,
}

/// Shared, size-bounded store of leaf results with per-type write expiry.
#[derive(Clone)]
pub struct ActionCache {
    inner: Arc<CacheInner>,
}

impl ActionCache {
    /// Start configuring a cache.
    pub fn builder() -> CacheBuilder {
        CacheBuilder::default()
    }

    /// Write expiry configured for `L`, if `L` is cacheable.
    pub fn policy_for<L: Leaf>(&self) -> Option<Duration> {
        self.inner
            .policies
            .get(&TypeId::of::<L>())
            .map(|policy| policy.after_write)
    }

    /// Whether results for this leaf's type are ever cached.
    pub fn caches(&self, leaf: &LeafRef) -> bool {
        self.inner.policies.contains_key(&leaf.leaf_type_id())
    }

    /// Global entry cap, if any.
    pub fn maximum_entries(&self) -> Option<usize> {
        self.inner.maximum_entries
    }

    /// Look up a live entry, dropping it if its expiry has passed.
    pub fn get(&self, leaf: &LeafRef) -> Option<Value> {
        let now = self.inner.clock.now();
        let mut store = self.inner.store.lock();

        let expired = match store.entries.get(leaf) {
            None => {
                store.stats.misses += 1;
                return None;
            }
            Some(entry) => now >= entry.expires_at,
        };

        if expired {
            store.remove(leaf);
            store.stats.expirations += 1;
            store.stats.misses += 1;
            tracing::trace!(action = leaf.type_name(), "cache entry expired");
            return None;
        }

        let tick = store.next_tick();
        let store = &mut *store;
        let entry = store.entries.get_mut(leaf)?;
        store.recency.remove(&entry.last_used);
        entry.last_used = tick;
        store.recency.insert(tick, leaf.clone());
        store.stats.hits += 1;
        Some(Arc::clone(&entry.value))
    }

    /// Store a result. Leaves without a configured policy are ignored.
    pub fn insert(&self, leaf: LeafRef, value: Value) {
        let Some(policy) = self.inner.policies.get(&leaf.leaf_type_id()) else {
            return;
        };
        if self.inner.maximum_entries == Some(0) {
            return;
        }

        let expires_at = add_saturating(self.inner.clock.now(), policy.after_write);
        let mut store = self.inner.store.lock();
        store.remove(&leaf);

        let tick = store.next_tick();
        store.recency.insert(tick, leaf.clone());
        store.entries.insert(
            leaf,
            Entry {
                value,
                expires_at,
                last_used: tick,
            },
        );

        if let Some(maximum) = self.inner.maximum_entries {
            while store.entries.len() > maximum {
                let Some((_, oldest)) = store.recency.pop_first() else {
                    break;
                };
                store.entries.remove(&oldest);
                store.stats.evictions += 1;
                tracing::trace!(action = oldest.type_name(), "evicted least recently used entry");
            }
        }
    }

    /// Drop one entry.
    pub fn invalidate(&self, leaf: &LeafRef) {
        self.inner.store.lock().remove(leaf);
    }

    /// Drop every entry. Counters are kept.
    pub fn invalidate_all(&self) {
        let mut store = self.inner.store.lock();
        store.entries.clear();
        store.recency.clear();
    }

    /// Remove every entry whose expiry has passed, returning how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.inner.clock.now();
        let mut store = self.inner.store.lock();
        let expired: Vec<LeafRef> = store
            .entries
            .iter()
            .filter(|(_, entry)| now >= entry.expires_at)
            .map(|(leaf, _)| leaf.clone())
            .collect();
        for leaf in &expired {
            store.remove(leaf);
        }
        store.stats.expirations += expired.len() as u64;
        expired.len()
    }

    /// Number of stored entries, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.store.lock().entries.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of the effectiveness counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.store.lock().stats
    }
}

impl fmt::Debug for ActionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut policies: Vec<_> = self
            .inner
            .policies
            .values()
            .map(|policy| (policy.type_name, policy.after_write))
            .collect();
        policies.sort_unstable();
        f.debug_struct("ActionCache")
            .field("maximum_entries", &self.inner.maximum_entries)
            .field("policies", &policies)
            .field("len", &self.len())
            .finish()
    }
}

/// Builder for [`ActionCache`].
#[derive(Default)]
pub struct CacheBuilder {
    maximum_entries: Option<usize>,
    initial_capacity: usize,
    policies: HashMap<TypeId, Policy>,
    overrides: BTreeMap<String, u64>,
    clock: Option<Arc<dyn Clock>>,
}

impl CacheBuilder {
    /// Cap the number of entries; the least recently used entry goes first.
    pub fn maximum_entries(mut self, maximum: usize) -> Self {
        self.maximum_entries = Some(maximum);
        self
    }

    /// Pre-size the underlying map.
    pub fn initial_capacity(mut self, capacity: usize) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Make leaf type `L` cacheable.
    pub fn expire<L: Leaf>(self) -> Expire<L> {
        Expire {
            builder: self,
            _leaf: PhantomData,
        }
    }

    /// Use a specific time source.
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Some(Arc::new(clock));
        self
    }

    /// Apply deployment settings on top of what code declared.
    pub fn settings(mut self, settings: &CacheSettings) -> Self {
        if let Some(maximum) = settings.maximum_entries {
            self.maximum_entries = Some(maximum);
        }
        self.overrides.extend(
            settings
                .expire_after_write_secs
                .iter()
                .map(|(name, secs)| (name.clone(), *secs)),
        );
        self
    }

    /// Finish the configuration.
    pub fn build(mut self) -> ActionCache {
        // Names are short type names, so one override may cover several types.
        for (name, secs) in &self.overrides {
            let mut matched = 0usize;
            for policy in self
                .policies
                .values_mut()
                .filter(|policy| policy.type_name == name.as_str())
            {
                policy.after_write = Duration::from_secs(*secs);
                matched += 1;
            }
            match matched {
                0 => {
                    tracing::warn!(action = %name, "expiry override for a leaf type that is not cacheable")
                }
                1 => {}
                types => tracing::warn!(
                    action = %name,
                    types,
                    "expiry override matches several leaf types with the same name"
                ),
            }
        }

        let store = Store {
            entries: HashMap::with_capacity(self.initial_capacity),
            ..Default::default()
        };

        ActionCache {
            inner: Arc::new(CacheInner {
                policies: self.policies,
                maximum_entries: self.maximum_entries,
                clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
                store: Mutex::new(store),
            }),
        }
    }
}

/// Pending expiry declaration for leaf type `L`.
pub struct Expire<L> {
    builder: CacheBuilder,
    _leaf: PhantomData<fn(L)>,
}

impl<L: Leaf> Expire<L> {
    /// Keep results of `L` for `duration` after they are written.
    pub fn after_write(mut self, duration: Duration) -> CacheBuilder {
        self.builder.policies.insert(
            TypeId::of::<L>(),
            Policy {
                type_name: short_type_name::<L>(),
                after_write: duration,
            },
        );
        self.builder
    }
}

/// Evaluator that consults an [`ActionCache`] before running cacheable leaves.
///
/// Only leaf dispatch is decorated; tree reduction is unchanged. The cache lock
/// is not held while a handler runs, so concurrent misses for the same leaf may
/// each invoke the handler.
#[derive(Debug, Clone)]
pub struct CachingInterpreter<I> {
    inner: I,
    cache: ActionCache,
}

impl<I: Evaluate> CachingInterpreter<I> {
    /// Decorate `inner` with a shared cache.
    pub fn new(inner: I, cache: ActionCache) -> Self {
        Self { inner, cache }
    }

    /// The wrapped evaluator.
    pub fn inner(&self) -> &I {
        &self.inner
    }

    /// The shared cache.
    pub fn cache(&self) -> &ActionCache {
        &self.cache
    }
}

impl<I: Evaluate> Evaluate for CachingInterpreter<I> {
    fn evaluate_leaf(&self, leaf: &LeafRef) -> Result<Value> {
        if !self.cache.caches(leaf) {
            return self.inner.evaluate_leaf(leaf);
        }

        if let Some(value) = self.cache.get(leaf) {
            tracing::trace!(action = ?leaf, "cache hit");
            return Ok(value);
        }

        let value = self.inner.evaluate_leaf(leaf)?;
        self.cache.insert(leaf.clone(), Arc::clone(&value));
        Ok(value)
    }
}
