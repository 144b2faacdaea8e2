//! Dedup Layer
//!
//! Coalesces concurrent computations for the same cache key into one
//! in-flight ticket. The first caller spawns the computation on the runtime
//! and every later caller for that key awaits the same shared outcome.
//!
//! The computation runs detached from any single caller: dropping a waiting
//! future abandons only that caller's wait. Aborting the ticket itself (see
//! [`Dedup::cancel`]) fails every waiter with `ComputationCancelled`.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tokio::task::AbortHandle;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};

/// Settled result of a ticket, awaitable by any number of callers.
pub type Outcome = Shared<BoxFuture<'static, Result<Value>>>;
type TicketMap = Arc<DashMap<String, Ticket>>;

struct Ticket {
    id: u64,
    outcome: Outcome,
    abort: AbortHandle,
}

/// How a caller took part in a dedup ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Created the ticket and started the computation
    Leader,
    /// Joined a ticket already in flight
    Joiner,
}

// == Dedup ==
/// Per-key in-flight computation registry.
#[derive(Default)]
pub struct Dedup {
    tickets: TicketMap,
    next_id: AtomicU64,
}

impl Dedup {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // == Enter ==
    /// Joins the ticket for `key`, creating it (and starting `compute`) if
    /// none is in flight.
    ///
    /// The role is known before anything is awaited; the returned outcome
    /// settles once the computation does. `compute` is invoked at most once
    /// per ticket and must not borrow from the caller, since it outlives the
    /// caller's wait.
    pub fn enter<F, Fut>(&self, key: &str, compute: F) -> (Role, Outcome)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        match self.tickets.entry(key.to_string()) {
            Entry::Occupied(ticket) => {
                debug!(key, "joined in-flight computation");
                (Role::Joiner, ticket.get().outcome.clone())
            }
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let ticket = self.spawn_ticket(key, id, compute());
                let outcome = ticket.outcome.clone();
                slot.insert(ticket);
                (Role::Leader, outcome)
            }
        }
    }

    // == Get Or Compute ==
    /// Runs `compute` for `key` unless a computation for it is already in
    /// flight, in which case the caller joins that one.
    pub async fn get_or_compute<F, Fut>(&self, key: &str, compute: F) -> (Result<Value>, Role)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let (role, outcome) = self.enter(key, compute);
        (outcome.await, role)
    }

    fn spawn_ticket<Fut>(&self, key: &str, id: u64, compute: Fut) -> Ticket
    where
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        let release = TicketRelease {
            tickets: Arc::clone(&self.tickets),
            key: key.to_string(),
            id,
        };
        let handle = tokio::spawn(async move {
            let result = compute.await;
            // Release before the outcome is published so a later caller starts fresh
            drop(release);
            result
        });
        let abort = handle.abort_handle();

        let key = key.to_string();
        let outcome = async move {
            match handle.await {
                Ok(result) => result,
                Err(err) if err.is_cancelled() => {
                    warn!(key = %key, "in-flight computation cancelled");
                    Err(CacheError::ComputationCancelled(key))
                }
                Err(err) => Err(CacheError::computation(anyhow::anyhow!(
                    "computation for {key} panicked: {err}"
                ))),
            }
        }
        .boxed()
        .shared();

        Ticket { id, outcome, abort }
    }

    // == Cancel ==
    /// Aborts the in-flight computation for `key`.
    ///
    /// Every waiter receives `ComputationCancelled`. Returns false if nothing
    /// was in flight.
    pub fn cancel(&self, key: &str) -> bool {
        let abort = self.tickets.get(key).map(|ticket| ticket.abort.clone());
        match abort {
            Some(abort) => {
                abort.abort();
                true
            }
            None => false,
        }
    }

    /// Number of tickets currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tickets.len()
    }

    /// True if a computation for `key` is in flight.
    pub fn is_in_flight(&self, key: &str) -> bool {
        self.tickets.contains_key(key)
    }
}

/// Removes a ticket from the registry when its computation settles,
/// including when the task is aborted or panics.
struct TicketRelease {
    tickets: TicketMap,
    key: String,
    id: u64,
}

impl Drop for TicketRelease {
    fn drop(&mut self) {
        self.tickets.remove_if(&self.key, |_, ticket| ticket.id == self.id);
    }
}
