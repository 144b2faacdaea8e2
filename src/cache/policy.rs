//! Caching Policy
//!
//! Per-operation rules supplied by the query layer: which tags a result
//! depends on, how long it lives, which storage namespace holds it, and
//! which tags a mutation invalidates.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

/// Computes the tags a cached result depends on from `(args, result)`.
///
/// `None` or an empty list opts this particular result out of caching.
pub type ReferencesFn = Arc<dyn Fn(&Value, &Value) -> Option<Vec<String>> + Send + Sync>;

/// Computes the tags a mutation invalidates from `(args, result)`.
pub type InvalidateFn = Arc<dyn Fn(&Value, &Value) -> Vec<String> + Send + Sync>;

// == Operation Policy ==
/// Caching rules for one read operation.
#[derive(Clone)]
pub struct OperationPolicy {
    /// TTL override; the engine default applies when `None`
    pub ttl: Option<Duration>,
    /// Storage namespace; the default namespace when `None`
    pub storage: Option<String>,
    /// Whether the operation participates in caching at all
    pub enabled: bool,
    /// Tag extractor
    pub references: ReferencesFn,
}

impl OperationPolicy {
    /// Creates an enabled policy with the given tag extractor.
    pub fn new<F>(references: F) -> Self
    where
        F: Fn(&Value, &Value) -> Option<Vec<String>> + Send + Sync + 'static,
    {
        Self {
            ttl: None,
            storage: None,
            enabled: true,
            references: Arc::new(references),
        }
    }

    /// Sets a TTL override.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Routes results to a named storage namespace.
    pub fn with_storage(mut self, namespace: impl Into<String>) -> Self {
        self.storage = Some(namespace.into());
        self
    }

    /// Disables caching for this operation.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Evaluates the tag extractor. Returns `None` when the result opts out.
    pub fn tags(&self, args: &Value, result: &Value) -> Option<BTreeSet<String>> {
        let tags: BTreeSet<String> = (self.references)(args, result)?.into_iter().collect();
        (!tags.is_empty()).then_some(tags)
    }
}

impl fmt::Debug for OperationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperationPolicy")
            .field("ttl", &self.ttl)
            .field("storage", &self.storage)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

// == Mutation Policy ==
/// Invalidation rule for one mutating operation.
#[derive(Clone)]
pub struct MutationPolicy {
    /// Tags to invalidate once the mutation has run
    pub invalidate: InvalidateFn,
}

impl MutationPolicy {
    /// Creates a mutation policy from an invalidation function.
    pub fn new<F>(invalidate: F) -> Self
    where
        F: Fn(&Value, &Value) -> Vec<String> + Send + Sync + 'static,
    {
        Self {
            invalidate: Arc::new(invalidate),
        }
    }

    /// Evaluates the invalidation function.
    pub fn tags(&self, args: &Value, result: &Value) -> Vec<String> {
        (self.invalidate)(args, result)
    }
}

impl fmt::Debug for MutationPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationPolicy").finish_non_exhaustive()
    }
}

// == Policy ==
/// The full policy: read operations and mutations by name.
#[derive(Debug, Clone, Default)]
pub struct Policy {
    queries: HashMap<String, OperationPolicy>,
    mutations: HashMap<String, MutationPolicy>,
}

impl Policy {
    /// Creates an empty policy; every operation bypasses the cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a read operation.
    pub fn query(mut self, operation: impl Into<String>, policy: OperationPolicy) -> Self {
        self.queries.insert(operation.into(), policy);
        self
    }

    /// Registers a mutation.
    pub fn mutation(mut self, operation: impl Into<String>, policy: MutationPolicy) -> Self {
        self.mutations.insert(operation.into(), policy);
        self
    }

    /// Policy for a read operation, if it is cached.
    pub fn for_query(&self, operation: &str) -> Option<&OperationPolicy> {
        self.queries.get(operation).filter(|p| p.enabled)
    }

    /// Policy for a mutation.
    pub fn for_mutation(&self, operation: &str) -> Option<&MutationPolicy> {
        self.mutations.get(operation)
    }

    /// Storage namespaces referenced by any query policy.
    pub fn namespaces(&self) -> BTreeSet<String> {
        self.queries
            .values()
            .filter_map(|p| p.storage.clone())
            .collect()
    }
}
