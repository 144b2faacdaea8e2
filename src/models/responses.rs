//! Response DTOs for the directory API
//!
//! Defines the structure of outgoing HTTP response bodies.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::cache::{OperationStats, StatsReport};

/// Response body for every mutation
#[derive(Debug, Clone, Serialize)]
pub struct MutationResponse<T> {
    /// What the mutation returned
    pub result: T,
    /// Number of cache keys invalidated
    pub invalidated: usize,
    /// Set when invalidation failed; the mutation itself still applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invalidation_error: Option<String>,
}

impl<T> MutationResponse<T> {
    /// Creates a new MutationResponse from the invalidation outcome
    pub fn new<E: ToString>(result: T, invalidation: Result<usize, E>) -> Self {
        match invalidation {
            Ok(invalidated) => Self {
                result,
                invalidated,
                invalidation_error: None,
            },
            Err(err) => Self {
                result,
                invalidated: 0,
                invalidation_error: Some(err.to_string()),
            },
        }
    }
}

/// Counters of one operation plus its hit rate
#[derive(Debug, Clone, Serialize)]
pub struct OperationStatsResponse {
    pub hits: u64,
    pub misses: u64,
    pub dedupes: u64,
    pub skips: u64,
    /// Hit rate (hits / (hits + misses))
    pub hit_rate: f64,
}

impl From<OperationStats> for OperationStatsResponse {
    fn from(stats: OperationStats) -> Self {
        Self {
            hits: stats.hits,
            misses: stats.misses,
            dedupes: stats.dedupes,
            skips: stats.skips,
            hit_rate: stats.hit_rate(),
        }
    }
}

/// Size of one storage namespace
#[derive(Debug, Clone, Serialize)]
pub struct NamespaceResponse {
    pub name: String,
    /// Stored entries, including expired ones not yet collected
    pub entries: usize,
    /// Keys known to the reference index
    pub indexed_keys: usize,
    /// Distinct tags in the reference index
    pub tags: usize,
}

/// Response body for the stats endpoint (GET /stats)
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    /// Counters since the last periodic report, per operation
    pub operations: BTreeMap<String, OperationStatsResponse>,
    /// Sum over all operations
    pub total: OperationStatsResponse,
    /// Computations currently in flight
    pub in_flight: usize,
    pub namespaces: Vec<NamespaceResponse>,
}

impl StatsResponse {
    /// Creates a new StatsResponse from a stats snapshot
    pub fn new(report: StatsReport, in_flight: usize, namespaces: Vec<NamespaceResponse>) -> Self {
        Self {
            total: report.total().into(),
            operations: report
                .operations
                .into_iter()
                .map(|(name, stats)| (name, stats.into()))
                .collect(),
            in_flight,
            namespaces,
        }
    }
}

/// Response body for the health endpoint (GET /health)
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Health status (e.g., "healthy")
    pub status: String,
    /// Current timestamp in ISO 8601 format
    pub timestamp: String,
}

impl HealthResponse {
    /// Creates a new HealthResponse with current timestamp
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}
