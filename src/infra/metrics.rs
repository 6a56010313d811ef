//! Lock-free planner metrics
//!
//! Counters are atomics updated from the planner loop and from resolver tasks.
//!
//! NOTE: All atomics use Relaxed ordering intentionally; these are statistical counters
//! only. Do NOT use them for coordination or logic decisions.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Geocode latency bucket boundaries (milliseconds)
/// Buckets: ≤25, ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, >12800
const BUCKET_BOUNDS: [u64; 10] = [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800];
const NUM_BUCKETS: usize = 11;

#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

#[inline]
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    std::array::from_fn(|i| buckets[i].load(Ordering::Relaxed))
}

/// Upper bound of the bucket holding the given percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    // last bucket uses 2x the previous bound
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

pub struct Metrics {
    analyses_started: AtomicU64,
    analyses_ready: AtomicU64,
    analyses_failed: AtomicU64,
    analyses_superseded: AtomicU64,
    input_rejected: AtomicU64,
    resolutions_ok: AtomicU64,
    resolutions_failed: AtomicU64,
    stale_discarded: AtomicU64,
    selections_applied: AtomicU64,
    selections_rejected: AtomicU64,
    geocode_latency_buckets: [AtomicU64; NUM_BUCKETS],
    geocode_latency_sum_ms: AtomicU64,
    geocode_latency_max_ms: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            analyses_started: AtomicU64::new(0),
            analyses_ready: AtomicU64::new(0),
            analyses_failed: AtomicU64::new(0),
            analyses_superseded: AtomicU64::new(0),
            input_rejected: AtomicU64::new(0),
            resolutions_ok: AtomicU64::new(0),
            resolutions_failed: AtomicU64::new(0),
            stale_discarded: AtomicU64::new(0),
            selections_applied: AtomicU64::new(0),
            selections_rejected: AtomicU64::new(0),
            geocode_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            geocode_latency_sum_ms: AtomicU64::new(0),
            geocode_latency_max_ms: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_analyze_started(&self, superseded: bool) {
        self.analyses_started.fetch_add(1, Ordering::Relaxed);
        if superseded {
            self.analyses_superseded.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_analyze_ready(&self) {
        self.analyses_ready.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_analyze_failed(&self) {
        self.analyses_failed.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_input_rejected(&self) {
        self.input_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one geocoder call and how long it took (called from resolver tasks)
    #[inline]
    pub fn record_geocode(&self, resolved: bool, latency_ms: u64) {
        if resolved {
            self.resolutions_ok.fetch_add(1, Ordering::Relaxed);
        } else {
            self.resolutions_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.geocode_latency_buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
        self.geocode_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.geocode_latency_max_ms, latency_ms);
    }

    #[inline]
    pub fn record_stale_discarded(&self) {
        self.stale_discarded.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_selection(&self, applied: bool) {
        if applied {
            self.selections_applied.fetch_add(1, Ordering::Relaxed);
        } else {
            self.selections_rejected.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn stale_discarded(&self) -> u64 {
        self.stale_discarded.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn analyses_started(&self) -> u64 {
        self.analyses_started.load(Ordering::Relaxed)
    }

    /// Point-in-time summary. Counters are cumulative and never reset.
    pub fn report(&self) -> MetricsSummary {
        let geocode_latency_buckets = load_buckets(&self.geocode_latency_buckets);
        let geocode_count: u64 = geocode_latency_buckets.iter().sum();
        let geocode_sum = self.geocode_latency_sum_ms.load(Ordering::Relaxed);

        MetricsSummary {
            analyses_started: self.analyses_started.load(Ordering::Relaxed),
            analyses_ready: self.analyses_ready.load(Ordering::Relaxed),
            analyses_failed: self.analyses_failed.load(Ordering::Relaxed),
            analyses_superseded: self.analyses_superseded.load(Ordering::Relaxed),
            input_rejected: self.input_rejected.load(Ordering::Relaxed),
            resolutions_ok: self.resolutions_ok.load(Ordering::Relaxed),
            resolutions_failed: self.resolutions_failed.load(Ordering::Relaxed),
            stale_discarded: self.stale_discarded.load(Ordering::Relaxed),
            selections_applied: self.selections_applied.load(Ordering::Relaxed),
            selections_rejected: self.selections_rejected.load(Ordering::Relaxed),
            geocode_latency_avg_ms: if geocode_count > 0 { geocode_sum / geocode_count } else { 0 },
            geocode_latency_max_ms: self.geocode_latency_max_ms.load(Ordering::Relaxed),
            geocode_latency_p50_ms: percentile_from_buckets(&geocode_latency_buckets, 0.50),
            geocode_latency_p99_ms: percentile_from_buckets(&geocode_latency_buckets, 0.99),
            geocode_latency_buckets,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSummary {
    pub analyses_started: u64,
    pub analyses_ready: u64,
    pub analyses_failed: u64,
    pub analyses_superseded: u64,
    pub input_rejected: u64,
    pub resolutions_ok: u64,
    pub resolutions_failed: u64,
    pub stale_discarded: u64,
    pub selections_applied: u64,
    pub selections_rejected: u64,
    /// Bounds: ≤25, ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, >12800 ms
    pub geocode_latency_buckets: [u64; NUM_BUCKETS],
    pub geocode_latency_avg_ms: u64,
    pub geocode_latency_max_ms: u64,
    pub geocode_latency_p50_ms: u64,
    pub geocode_latency_p99_ms: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            analyses = %self.analyses_started,
            ready = %self.analyses_ready,
            failed = %self.analyses_failed,
            superseded = %self.analyses_superseded,
            input_rejected = %self.input_rejected,
            resolutions_ok = %self.resolutions_ok,
            resolutions_failed = %self.resolutions_failed,
            stale_discarded = %self.stale_discarded,
            selections = %self.selections_applied,
            selections_rejected = %self.selections_rejected,
            geocode_avg_ms = %self.geocode_latency_avg_ms,
            geocode_max_ms = %self.geocode_latency_max_ms,
            geocode_p99_ms = %self.geocode_latency_p99_ms,
            "metrics_summary"
        );
    }
}
