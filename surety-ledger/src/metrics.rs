//! Metrics collection for observability
//!
//! # Metrics
//!
//! - `surety_commands_total{operation}` - Committed mutating calls
//! - `surety_rejections_total{reason}` - Rejected calls by error label
//! - `surety_events_total` - Audit events appended
//! - `surety_policies_credited_total` - Policies credited by delay reports
//! - `surety_commit_duration_seconds` - Histogram of commit latencies
//! - `surety_pool_balance` - Value held by the ledger
//!
//! Collectors live in a private registry so several ledgers can share a
//! process.

use prometheus::{Gauge, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry};
use std::sync::Arc;

/// Metrics collector
#[derive(Clone)]
pub struct Metrics {
    /// Committed calls by operation
    pub commands_total: IntCounterVec,

    /// Rejected calls by reason
    pub rejections_total: IntCounterVec,

    /// Audit events appended
    pub events_total: IntCounter,

    /// Policies credited
    pub credits_total: IntCounter,

    /// Commit duration histogram
    pub commit_duration: Histogram,

    /// Pool balance
    pub pool_balance: Gauge,

    /// Prometheus registry
    pub registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("events_total", &self.events_total.get())
            .field("credits_total", &self.credits_total.get())
            .field("pool_balance", &self.pool_balance.get())
            .finish_non_exhaustive()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let commands_total = IntCounterVec::new(
            Opts::new("surety_commands_total", "Committed mutating calls"),
            &["operation"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let rejections_total = IntCounterVec::new(
            Opts::new("surety_rejections_total", "Rejected calls by reason"),
            &["reason"],
        )?;
        registry.register(Box::new(rejections_total.clone()))?;

        let events_total = IntCounter::new("surety_events_total", "Audit events appended")?;
        registry.register(Box::new(events_total.clone()))?;

        let credits_total =
            IntCounter::new("surety_policies_credited_total", "Policies credited")?;
        registry.register(Box::new(credits_total.clone()))?;

        let commit_duration = Histogram::with_opts(
            HistogramOpts::new("surety_commit_duration_seconds", "Histogram of commit latencies")
                .buckets(vec![0.0005, 0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250]),
        )?;
        registry.register(Box::new(commit_duration.clone()))?;

        let pool_balance = Gauge::new("surety_pool_balance", "Value held by the ledger")?;
        registry.register(Box::new(pool_balance.clone()))?;

        Ok(Self {
            commands_total,
            rejections_total,
            events_total,
            credits_total,
            commit_duration,
            pool_balance,
            registry,
        })
    }

    /// Record a committed call
    pub fn record_command(&self, operation: &str, events: usize) {
        self.commands_total.with_label_values(&[operation]).inc();
        self.events_total.inc_by(events as u64);
    }

    /// Record policies credited by one status report
    pub fn record_credits(&self, credited: usize) {
        self.credits_total.inc_by(credited as u64);
    }

    /// Record a rejected call
    pub fn record_rejection(&self, reason: &str) {
        self.rejections_total.with_label_values(&[reason]).inc();
    }

    /// Record commit duration
    pub fn record_commit_duration(&self, duration_seconds: f64) {
        self.commit_duration.observe(duration_seconds);
    }

    /// Update the pool gauge
    pub fn set_pool_balance(&self, balance: f64) {
        self.pool_balance.set(balance);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}
