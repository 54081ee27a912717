//! Metrics registry
//!
//! Counters only, reset on process start:
//! - HTTP requests per method, route and status
//! - Store operations per operation and outcome
//! - Failed change notifications

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::Serialize;

use crate::persistence::StoreError;

/// Outcome label for a store call
pub fn store_outcome<T>(result: &Result<T, StoreError>) -> &'static str {
    match result {
        Ok(_) => "ok",
        Err(StoreError::NotFound) => "not_found",
        Err(StoreError::Conflict) => "conflict",
        Err(StoreError::Cancelled) => "cancelled",
        Err(StoreError::DeadlineExceeded) => "deadline_exceeded",
        Err(StoreError::Unexpected(_)) => "internal",
    }
}

type RequestKey = (String, String, u16);
type StoreKey = (&'static str, &'static str);

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    requests: Mutex<BTreeMap<RequestKey, u64>>,
    store_operations: Mutex<BTreeMap<StoreKey, u64>>,
    notify_failures: AtomicU64,
}

/// Counters keep counting after a panic elsewhere; a poisoned map is still consistent.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self, method: &str, route: &str, status: u16) {
        *lock(&self.requests)
            .entry((method.to_string(), route.to_string(), status))
            .or_default() += 1;
    }

    pub fn record_store(&self, operation: &'static str, outcome: &'static str) {
        *lock(&self.store_operations)
            .entry((operation, outcome))
            .or_default() += 1;
    }

    pub fn increment_notify_failures(&self) {
        self.notify_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn requests(&self, method: &str, route: &str, status: u16) -> u64 {
        lock(&self.requests)
            .get(&(method.to_string(), route.to_string(), status))
            .copied()
            .unwrap_or(0)
    }

    pub fn store_operations(&self, operation: &str, outcome: &str) -> u64 {
        lock(&self.store_operations)
            .iter()
            .filter(|((op, out), _)| *op == operation && *out == outcome)
            .map(|(_, count)| *count)
            .sum()
    }

    pub fn notify_failures(&self) -> u64 {
        self.notify_failures.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter
    pub fn snapshot(&self) -> MetricsSnapshot {
        let http_requests = lock(&self.requests)
            .iter()
            .map(|((method, route, status), count)| RequestCount {
                method: method.clone(),
                route: route.clone(),
                status: *status,
                count: *count,
            })
            .collect();

        let store_operations = lock(&self.store_operations)
            .iter()
            .map(|(&(operation, outcome), count)| StoreCount {
                operation,
                outcome,
                count: *count,
            })
            .collect();

        MetricsSnapshot {
            http_requests,
            store_operations,
            notify_failures: self.notify_failures(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestCount {
    pub method: String,
    pub route: String,
    pub status: u16,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreCount {
    pub operation: &'static str,
    pub outcome: &'static str,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub http_requests: Vec<RequestCount>,
    pub store_operations: Vec<StoreCount>,
    pub notify_failures: u64,
}
