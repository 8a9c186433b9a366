use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Most recent pipeline latencies kept for avg/p95
const LATENCY_WINDOW: usize = 1024;

/// Global metrics collector for the application.
///
/// Tracks uploads, analysis outcomes, image serving and cleanup sweeps.
/// Thread-safe and can be shared across the application.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    // Upload Metrics
    uploads_total: AtomicUsize,
    uploads_rejected: AtomicUsize,
    decode_failures: AtomicUsize,
    oversized_bodies: AtomicUsize,
    pipeline_latency_ms: RwLock<VecDeque<u64>>,

    // Analysis Metrics
    analyses_diseased: AtomicUsize,
    analyses_healthy: AtomicUsize,

    // Serving Metrics
    images_served: AtomicUsize,

    // Cleanup Metrics
    sweeps_run: AtomicUsize,
    files_removed: AtomicUsize,
    sweep_errors: AtomicUsize,

    // Per-endpoint request counters
    endpoint_counters: DashMap<String, AtomicUsize>,

    // Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                uploads_total: AtomicUsize::new(0),
                uploads_rejected: AtomicUsize::new(0),
                decode_failures: AtomicUsize::new(0),
                oversized_bodies: AtomicUsize::new(0),
                pipeline_latency_ms: RwLock::new(VecDeque::with_capacity(LATENCY_WINDOW)),
                analyses_diseased: AtomicUsize::new(0),
                analyses_healthy: AtomicUsize::new(0),
                images_served: AtomicUsize::new(0),
                sweeps_run: AtomicUsize::new(0),
                files_removed: AtomicUsize::new(0),
                sweep_errors: AtomicUsize::new(0),
                endpoint_counters: DashMap::new(),
                start_time: Instant::now(),
            }),
        }
    }

    // Upload Metrics
    pub fn record_upload(&self) {
        self.inner.uploads_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_upload(&self) {
        self.inner.uploads_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.inner.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_oversized_body(&self) {
        self.inner.oversized_bodies.fetch_add(1, Ordering::Relaxed);
    }

    // Analysis Metrics
    pub fn record_analysis(&self, healthy: bool, duration: Duration) {
        if healthy {
            self.inner.analyses_healthy.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.analyses_diseased.fetch_add(1, Ordering::Relaxed);
        }
        let mut latency = self.inner.pipeline_latency_ms.write();
        if latency.len() == LATENCY_WINDOW {
            latency.pop_front();
        }
        latency.push_back(duration.as_millis() as u64);
    }

    // Serving Metrics
    pub fn record_image_served(&self) {
        self.inner.images_served.fetch_add(1, Ordering::Relaxed);
    }

    // Cleanup Metrics
    pub fn record_sweep(&self, removed: usize, errors: usize) {
        self.inner.sweeps_run.fetch_add(1, Ordering::Relaxed);
        self.inner.files_removed.fetch_add(removed, Ordering::Relaxed);
        self.inner.sweep_errors.fetch_add(errors, Ordering::Relaxed);
    }

    // Endpoint Metrics
    pub fn record_endpoint_request(&self, endpoint: &str) {
        self.inner
            .endpoint_counters
            .entry(endpoint.to_string())
            .or_insert_with(|| AtomicUsize::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    // Get snapshot for reporting
    pub fn snapshot(&self) -> MetricsSnapshot {
        let latency: Vec<u64> = self.inner.pipeline_latency_ms.read().iter().copied().collect();
        let pipeline_latency_avg_ms = avg(&latency);
        let pipeline_latency_p95_ms = percentile(&latency, 0.95);

        let mut endpoint_requests: Vec<(String, usize)> = self
            .inner
            .endpoint_counters
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().load(Ordering::Relaxed)))
            .collect();
        endpoint_requests.sort();

        MetricsSnapshot {
            uploads_total: self.inner.uploads_total.load(Ordering::Relaxed),
            uploads_rejected: self.inner.uploads_rejected.load(Ordering::Relaxed),
            decode_failures: self.inner.decode_failures.load(Ordering::Relaxed),
            oversized_bodies: self.inner.oversized_bodies.load(Ordering::Relaxed),
            analyses_diseased: self.inner.analyses_diseased.load(Ordering::Relaxed),
            analyses_healthy: self.inner.analyses_healthy.load(Ordering::Relaxed),
            pipeline_latency_avg_ms,
            pipeline_latency_p95_ms,
            images_served: self.inner.images_served.load(Ordering::Relaxed),
            sweeps_run: self.inner.sweeps_run.load(Ordering::Relaxed),
            files_removed: self.inner.files_removed.load(Ordering::Relaxed),
            sweep_errors: self.inner.sweep_errors.load(Ordering::Relaxed),
            endpoint_requests,
            uptime_seconds: self.inner.start_time.elapsed().as_secs(),
        }
    }

    /// Generate Prometheus-format metrics
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!(
            r#"# HELP uploads_total Total number of upload requests
# TYPE uploads_total counter
uploads_total {{}} {}

# HELP uploads_rejected_total Uploads rejected by validation
# TYPE uploads_rejected_total counter
uploads_rejected_total {{}} {}

# HELP decode_failures_total Uploads whose image bytes failed to decode
# TYPE decode_failures_total counter
decode_failures_total {{}} {}

# HELP oversized_bodies_total Requests over the body size ceiling
# TYPE oversized_bodies_total counter
oversized_bodies_total {{}} {}

# HELP analyses_total Completed analyses by outcome
# TYPE analyses_total counter
analyses_total {{outcome="diseased"}} {}
analyses_total {{outcome="healthy"}} {}

# HELP pipeline_latency_avg_ms Average upload-to-result latency in milliseconds
# TYPE pipeline_latency_avg_ms gauge
pipeline_latency_avg_ms {{}} {}

# HELP images_served_total Result images served
# TYPE images_served_total counter
images_served_total {{}} {}

# HELP cleanup_sweeps_total Cleanup sweeps run
# TYPE cleanup_sweeps_total counter
cleanup_sweeps_total {{}} {}

# HELP cleanup_files_removed_total Expired result images removed
# TYPE cleanup_files_removed_total counter
cleanup_files_removed_total {{}} {}

# HELP cleanup_errors_total Per-file errors during cleanup
# TYPE cleanup_errors_total counter
cleanup_errors_total {{}} {}

# HELP uptime_seconds Application uptime in seconds
# TYPE uptime_seconds counter
uptime_seconds {{}} {}
"#,
            snapshot.uploads_total,
            snapshot.uploads_rejected,
            snapshot.decode_failures,
            snapshot.oversized_bodies,
            snapshot.analyses_diseased,
            snapshot.analyses_healthy,
            snapshot.pipeline_latency_avg_ms,
            snapshot.images_served,
            snapshot.sweeps_run,
            snapshot.files_removed,
            snapshot.sweep_errors,
            snapshot.uptime_seconds,
        );

        if !snapshot.endpoint_requests.is_empty() {
            out.push_str("\n# HELP http_requests_total Requests per endpoint\n");
            out.push_str("# TYPE http_requests_total counter\n");
            for (endpoint, count) in &snapshot.endpoint_requests {
                out.push_str(&format!(
                    "http_requests_total {{endpoint=\"{}\"}} {}\n",
                    endpoint, count
                ));
            }
        }
        out
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uploads_total: usize,
    pub uploads_rejected: usize,
    pub decode_failures: usize,
    pub oversized_bodies: usize,
    pub analyses_diseased: usize,
    pub analyses_healthy: usize,
    pub pipeline_latency_avg_ms: u64,
    pub pipeline_latency_p95_ms: u64,
    pub images_served: usize,
    pub sweeps_run: usize,
    pub files_removed: usize,
    pub sweep_errors: usize,
    pub endpoint_requests: Vec<(String, usize)>,
    pub uptime_seconds: u64,
}

fn percentile(values: &[u64], p: f64) -> u64 {
    if values.is_empty() {
        return 0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let idx = ((values.len() as f64 - 1.0) * p) as usize;
    sorted[idx]
}

fn avg(values: &[u64]) -> u64 {
    if values.is_empty() {
        return 0;
    }
    values.iter().sum::<u64>() / values.len() as u64
}
