//! Cache Engine
//!
//! Orchestrates the read path (key → storage → dedup → store + index) and the
//! write path (tags → index lookup → storage delete → index remove).
//!
//! Ordering per key is the one invariant that matters under concurrency:
//! storage is written before the index records the key, and storage is
//! deleted before the index forgets it. A tag pointing at a missing entry is
//! harmless; an entry with no tags would be invisible to invalidation.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::dedup::{Dedup, Role};
use crate::cache::gc::{GcMode, GcReport};
use crate::cache::hooks::Hooks;
use crate::cache::key::build_key;
use crate::cache::policy::{OperationPolicy, Policy};
use crate::cache::stats::{StatEvent, StatsRecorder, StatsReport};
use crate::cache::storage::{MemoryStorage, SharedStorage, Storage};
use crate::cache::{CacheEntry, ReferenceIndex};
use crate::error::{CacheError, Result};

/// Name of the namespace every cache has.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Default entry TTL (one day).
pub const DEFAULT_TTL: Duration = Duration::from_secs(86_400);

// == Namespace ==
/// A storage backend paired with the reference index mirroring its keyspace.
#[derive(Debug)]
pub struct Namespace {
    pub(crate) name: String,
    pub(crate) storage: SharedStorage,
    pub(crate) index: ReferenceIndex,
    /// Lazy sweep position in the storage keyspace
    pub(crate) gc_cursor: AtomicU64,
}

impl Namespace {
    pub fn new(name: impl Into<String>, storage: SharedStorage) -> Self {
        Self {
            name: name.into(),
            storage,
            index: ReferenceIndex::new(),
            gc_cursor: AtomicU64::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// Current lazy sweep cursor.
    pub fn gc_cursor(&self) -> u64 {
        self.gc_cursor.load(Ordering::SeqCst)
    }
}

// == Cache Builder ==
/// Configures and builds a [`Cache`].
pub struct CacheBuilder {
    default_storage: SharedStorage,
    namespaces: BTreeMap<String, SharedStorage>,
    policy: Policy,
    hooks: Hooks,
    default_ttl: Duration,
}

impl CacheBuilder {
    /// Storage for the default namespace.
    pub fn storage(mut self, storage: SharedStorage) -> Self {
        self.default_storage = storage;
        self
    }

    /// Registers an additional named namespace.
    pub fn namespace(mut self, name: impl Into<String>, storage: SharedStorage) -> Self {
        self.namespaces.insert(name.into(), storage);
        self
    }

    pub fn policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// TTL for operations without an override.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    pub fn build(self) -> Cache {
        let mut namespaces: BTreeMap<String, Arc<Namespace>> = self
            .namespaces
            .into_iter()
            .map(|(name, storage)| (name.clone(), Arc::new(Namespace::new(name, storage))))
            .collect();
        namespaces.insert(
            DEFAULT_NAMESPACE.to_string(),
            Arc::new(Namespace::new(DEFAULT_NAMESPACE, self.default_storage)),
        );

        for missing in self
            .policy
            .namespaces()
            .into_iter()
            .filter(|name| !namespaces.contains_key(name))
        {
            warn!(namespace = %missing, "policy names an unregistered storage, using default");
        }

        Cache {
            namespaces,
            policy: self.policy,
            hooks: self.hooks,
            dedup: Dedup::new(),
            stats: Arc::new(StatsRecorder::new()),
            default_ttl: self.default_ttl,
            revisions: Arc::new(AtomicU64::new(0)),
        }
    }
}

// == Cache ==
/// Reference-tagged result cache.
pub struct Cache {
    namespaces: BTreeMap<String, Arc<Namespace>>,
    policy: Policy,
    hooks: Hooks,
    dedup: Dedup,
    stats: Arc<StatsRecorder>,
    default_ttl: Duration,
    revisions: Arc<AtomicU64>,
}

impl Cache {
    /// Starts a builder with an in-memory default namespace.
    pub fn builder() -> CacheBuilder {
        CacheBuilder {
            default_storage: Arc::new(MemoryStorage::default()),
            namespaces: BTreeMap::new(),
            policy: Policy::new(),
            hooks: Hooks::default(),
            default_ttl: DEFAULT_TTL,
        }
    }

    // == Resolve ==
    /// Returns the cached result of `operation(args)`, computing it on a miss.
    ///
    /// Concurrent misses for the same key share one computation. Operations
    /// without an enabled policy bypass the cache. Storage failures degrade
    /// to a miss; they never fail the call.
    pub async fn resolve<A, F, Fut>(&self, operation: &str, args: &A, compute: F) -> Result<Value>
    where
        A: Serialize + ?Sized,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
    {
        let Some(policy) = self.policy.for_query(operation) else {
            return compute().await.map_err(CacheError::computation);
        };

        let args = to_json(operation, args)?;
        let key = build_key(operation, &args)?;
        let namespace = self.namespace_for(policy);

        match namespace.storage.get(&key).await {
            Ok(Some(entry)) if !entry.is_expired() => {
                self.stats.record(operation, StatEvent::Hit);
                (self.hooks.on_hit)(operation);
                return Ok(entry.value);
            }
            Ok(_) => {}
            Err(err) => {
                warn!(operation, key = %key, error = %err, "storage read failed, resolving directly");
            }
        }

        self.stats.record(operation, StatEvent::Miss);
        (self.hooks.on_miss)(operation);

        let write = PendingWrite {
            operation: operation.to_string(),
            key: key.clone(),
            args,
            ttl: policy.ttl.unwrap_or(self.default_ttl),
            policy: policy.clone(),
            namespace,
            revisions: Arc::clone(&self.revisions),
            stats: Arc::clone(&self.stats),
            hooks: self.hooks.clone(),
        };
        let (role, outcome) = self.dedup.enter(&key, move || {
            let computation = compute();
            async move {
                let value = computation.await.map_err(CacheError::computation)?;
                write.store(&value).await;
                Ok(value)
            }
        });

        // Counted on joining, so a caller that stops waiting is still seen
        if role == Role::Joiner {
            self.stats.record(operation, StatEvent::Dedupe);
            (self.hooks.on_dedupe)(operation);
        }
        outcome.await
    }

    // == Invalidate ==
    /// Deletes every cached result depending on any of `tags`.
    ///
    /// Returns the number of keys invalidated. Not atomic across keys: a
    /// concurrent read may re-populate a key mid-batch, carrying fresh tags.
    /// On storage failure the remaining keys are still attempted and the
    /// first error is returned.
    pub async fn invalidate<I, T>(&self, tags: I) -> Result<usize>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let tags: BTreeSet<String> = tags.into_iter().map(|t| t.as_ref().to_string()).collect();
        let mut invalidated = 0;
        let mut first_error = None;

        for namespace in self.namespaces.values() {
            let keys: BTreeSet<String> = tags
                .iter()
                .flat_map(|tag| namespace.index.lookup_keys_for_tag(tag))
                .collect();

            for key in keys {
                let revision = namespace.index.revision_of(&key);
                match namespace.storage.delete(&key).await {
                    Ok(()) => {
                        if let Some(revision) = revision {
                            namespace.index.remove_if(&key, revision);
                        }
                        invalidated += 1;
                    }
                    Err(err) => {
                        warn!(namespace = %namespace.name, key = %key, error = %err, "invalidation delete failed");
                        first_error.get_or_insert(err);
                    }
                }
            }
        }

        debug!(?tags, invalidated, "invalidated cache entries");
        match first_error {
            Some(err) => Err(err),
            None => Ok(invalidated),
        }
    }

    /// Invalidates the tags the mutation policy names for `operation`.
    ///
    /// Mutations without a policy invalidate nothing.
    pub async fn invalidate_mutation<A, R>(&self, operation: &str, args: &A, result: &R) -> Result<usize>
    where
        A: Serialize + ?Sized,
        R: Serialize + ?Sized,
    {
        let Some(policy) = self.policy.for_mutation(operation) else {
            return Ok(0);
        };
        let args = to_json(operation, args)?;
        let result = to_json(operation, result)?;
        self.invalidate(policy.tags(&args, &result)).await
    }

    // == Garbage Collection ==
    /// Runs one sweep of `mode` over every namespace.
    pub async fn gc(&self, mode: GcMode, chunk_size: usize) -> Vec<GcReport> {
        let mut reports = Vec::with_capacity(self.namespaces.len());
        for namespace in self.namespaces.values() {
            let report = match mode {
                GcMode::Lazy => namespace.gc_lazy(chunk_size).await,
                GcMode::Strict => namespace.gc_strict(chunk_size).await,
            };
            reports.push(report);
        }
        reports
    }

    // == Accessors ==
    /// Cache key for `operation(args)`.
    pub fn key_for<A>(&self, operation: &str, args: &A) -> Result<String>
    where
        A: Serialize + ?Sized,
    {
        build_key(operation, args)
    }

    /// Aborts the in-flight computation for `operation(args)`, if any.
    pub fn cancel<A>(&self, operation: &str, args: &A) -> Result<bool>
    where
        A: Serialize + ?Sized,
    {
        Ok(self.dedup.cancel(&build_key(operation, args)?))
    }

    /// Number of computations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.dedup.in_flight()
    }

    /// The default namespace.
    pub fn default_namespace(&self) -> &Arc<Namespace> {
        &self.namespaces[DEFAULT_NAMESPACE]
    }

    /// A namespace by name.
    pub fn namespace(&self, name: &str) -> Option<&Arc<Namespace>> {
        self.namespaces.get(name)
    }

    /// All namespaces, default included.
    pub fn namespaces(&self) -> impl Iterator<Item = &Arc<Namespace>> {
        self.namespaces.values()
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    /// Counters accumulated since the last drain.
    pub fn stats(&self) -> StatsReport {
        self.stats.snapshot()
    }

    /// Counters accumulated since the last drain; resets them.
    pub fn drain_stats(&self) -> StatsReport {
        self.stats.drain()
    }

    fn namespace_for(&self, policy: &OperationPolicy) -> Arc<Namespace> {
        policy
            .storage
            .as_deref()
            .and_then(|name| self.namespaces.get(name))
            .unwrap_or_else(|| self.default_namespace())
            .clone()
    }
}

fn to_json<T: Serialize + ?Sized>(operation: &str, value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| CacheError::InvalidArguments(format!("{operation}: {e}")))
}

/// Everything the leader needs to store a freshly computed result.
///
/// Moved into the dedup computation so the write completes even if the
/// caller that started it stops waiting.
struct PendingWrite {
    operation: String,
    key: String,
    args: Value,
    ttl: Duration,
    policy: OperationPolicy,
    namespace: Arc<Namespace>,
    revisions: Arc<AtomicU64>,
    stats: Arc<StatsRecorder>,
    hooks: Hooks,
}

impl PendingWrite {
    async fn store(self, value: &Value) {
        let Some(tags) = self.policy.tags(&self.args, value) else {
            self.stats.record(&self.operation, StatEvent::Skip);
            (self.hooks.on_skip)(&self.operation);
            return;
        };

        let revision = self.revisions.fetch_add(1, Ordering::SeqCst) + 1;
        let entry = CacheEntry::new(self.key.clone(), value.clone(), self.ttl, tags.clone(), revision);

        // Storage first, then the index
        match self.namespace.storage.set(entry).await {
            Ok(()) => {
                self.namespace.index.record(&self.key, tags, revision);
            }
            Err(err) => {
                warn!(
                    operation = %self.operation,
                    key = %self.key,
                    error = %err,
                    "storage write failed, result not cached"
                );
            }
        }
    }
}
