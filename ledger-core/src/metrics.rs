//! Metrics collection for observability
//!
//! Prometheus metrics for the ledger write path:
//!
//! - `ledger_transactions_total` - Spending events recorded
//! - `ledger_settlements_total` - Settlement batches confirmed
//! - `ledger_settled_transactions_total` - Transactions settled
//! - `ledger_record_duration_seconds` - Record latency histogram

use prometheus::{Histogram, HistogramOpts, IntCounter, Opts, Registry};
use std::sync::Arc;

/// Metrics collector. Registers against its own registry so multiple
/// instances (tests, embedded use) never collide.
#[derive(Clone)]
pub struct Metrics {
    /// Spending events recorded
    pub transactions_total: IntCounter,

    /// Settlement batches confirmed
    pub settlements_total: IntCounter,

    /// Transactions moved to settled
    pub settled_transactions_total: IntCounter,

    /// Record latency histogram
    pub record_duration: Histogram,

    /// Prometheus registry
    registry: Arc<Registry>,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics")
            .field("transactions_total", &self.transactions_total.get())
            .field("settlements_total", &self.settlements_total.get())
            .finish()
    }
}

impl Metrics {
    /// Create new metrics collector
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());

        let transactions_total = IntCounter::with_opts(Opts::new(
            "ledger_transactions_total",
            "Spending events recorded",
        ))?;
        registry.register(Box::new(transactions_total.clone()))?;

        let settlements_total = IntCounter::with_opts(Opts::new(
            "ledger_settlements_total",
            "Settlement batches confirmed",
        ))?;
        registry.register(Box::new(settlements_total.clone()))?;

        let settled_transactions_total = IntCounter::with_opts(Opts::new(
            "ledger_settled_transactions_total",
            "Transactions moved to settled",
        ))?;
        registry.register(Box::new(settled_transactions_total.clone()))?;

        let record_duration = Histogram::with_opts(
            HistogramOpts::new(
                "ledger_record_duration_seconds",
                "Record latency histogram",
            )
            .buckets(vec![0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250]),
        )?;
        registry.register(Box::new(record_duration.clone()))?;

        Ok(Self {
            transactions_total,
            settlements_total,
            settled_transactions_total,
            record_duration,
            registry,
        })
    }

    /// Record a spending event append
    pub fn record_transaction(&self, duration_seconds: f64) {
        self.transactions_total.inc();
        self.record_duration.observe(duration_seconds);
    }

    /// Record a confirmed settlement batch
    pub fn record_settlement(&self, settled_count: u64) {
        self.settlements_total.inc();
        self.settled_transactions_total.inc_by(settled_count);
    }

    /// Get metrics registry
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new().expect("Failed to create metrics")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = Metrics::new().unwrap();
        assert_eq!(metrics.transactions_total.get(), 0);
        assert_eq!(metrics.settlements_total.get(), 0);
    }

    #[test]
    fn test_record_transaction() {
        let metrics = Metrics::new().unwrap();
        metrics.record_transaction(0.002);
        metrics.record_transaction(0.004);
        assert_eq!(metrics.transactions_total.get(), 2);
    }

    #[test]
    fn test_record_settlement() {
        let metrics = Metrics::new().unwrap();
        metrics.record_settlement(3);
        assert_eq!(metrics.settlements_total.get(), 1);
        assert_eq!(metrics.settled_transactions_total.get(), 3);
    }

    #[test]
    fn test_independent_registries() {
        // Two collectors must not collide on registration
        let a = Metrics::new().unwrap();
        let b = Metrics::new().unwrap();
        a.record_transaction(0.001);
        assert_eq!(b.transactions_total.get(), 0);
    }
}
