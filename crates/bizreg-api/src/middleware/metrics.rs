//! # Request Metrics
//!
//! In-process counters for requests received, responses sent (total and by
//! status code), and cumulative processing time. Exposed as JSON at
//! `/v1/debug/vars`.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;
use serde::Serialize;

/// Shared metrics state.
#[derive(Debug, Clone, Default)]
pub struct ApiMetrics {
    requests_received: Arc<AtomicU64>,
    responses_sent: Arc<AtomicU64>,
    processing_time_us: Arc<AtomicU64>,
    by_status: Arc<Mutex<BTreeMap<u16, u64>>>,
}

/// Point-in-time copy of [`ApiMetrics`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests_received: u64,
    pub total_responses_sent: u64,
    #[serde(rename = "total_processing_time_μs")]
    pub total_processing_time_us: u64,
    pub total_responses_sent_by_status: BTreeMap<u16, u64>,
}

impl ApiMetrics {
    /// Create a new metrics instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return current request count.
    pub fn requests(&self) -> u64 {
        self.requests_received.load(Ordering::Relaxed)
    }

    /// Responses sent with `status`.
    pub fn responses_with(&self, status: u16) -> u64 {
        self.by_status.lock().get(&status).copied().unwrap_or(0)
    }

    /// Copy all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests_received: self.requests_received.load(Ordering::Relaxed),
            total_responses_sent: self.responses_sent.load(Ordering::Relaxed),
            total_processing_time_us: self.processing_time_us.load(Ordering::Relaxed),
            total_responses_sent_by_status: self.by_status.lock().clone(),
        }
    }

    fn record(&self, status: u16, started: Instant) {
        self.responses_sent.fetch_add(1, Ordering::Relaxed);
        let elapsed = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        self.processing_time_us.fetch_add(elapsed, Ordering::Relaxed);
        *self.by_status.lock().entry(status).or_insert(0) += 1;
    }
}

/// Middleware that counts every request and the status it was answered with.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let started = Instant::now();

    if let Some(m) = &metrics {
        m.requests_received.fetch_add(1, Ordering::Relaxed);
    }

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record(response.status().as_u16(), started);
    }

    response
}
