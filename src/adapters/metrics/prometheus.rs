//! Prometheus Metrics Registry - Engine Observability
//!
//! Registers and exposes Prometheus metrics for the order book core.
//! All metrics follow the naming convention `clob_engine_*`.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Centralized Prometheus metrics for the engine.
pub struct MetricsRegistry {
    /// Prometheus registry.
    registry: Registry,
    /// Execution plans computed, labeled by taker side.
    pub plans_computed: IntCounterVec,
    /// Orders accepted into the book.
    pub orders_submitted: IntCounter,
    /// Verified cancellations applied.
    pub orders_cancelled: IntCounter,
    /// Fills applied, labeled by path (direct | reconcile).
    pub fills_applied: IntCounterVec,
    /// Compare-and-swap conflicts surfaced to fill callers.
    pub fill_conflicts: IntCounter,
    /// Reconciliation batch events, labeled by outcome
    /// (updated | recorded | skipped).
    pub reconcile_events: IntCounterVec,
    /// Trade records inserted, labeled by provenance.
    pub trades_recorded: IntCounterVec,
}

impl MetricsRegistry {
    /// Create and register all engine metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let plans_computed = IntCounterVec::new(
            Opts::new(
                "clob_engine_plans_computed_total",
                "Execution plans computed",
            ),
            &["side"],
        )?;

        let orders_submitted = IntCounter::new(
            "clob_engine_orders_submitted_total",
            "Orders accepted into the book",
        )?;

        let orders_cancelled = IntCounter::new(
            "clob_engine_orders_cancelled_total",
            "Verified cancellations applied",
        )?;

        let fills_applied = IntCounterVec::new(
            Opts::new("clob_engine_fills_applied_total", "Fills applied"),
            &["path"],
        )?;

        let fill_conflicts = IntCounter::new(
            "clob_engine_fill_conflicts_total",
            "Conditional-update conflicts surfaced to callers",
        )?;

        let reconcile_events = IntCounterVec::new(
            Opts::new(
                "clob_engine_reconcile_events_total",
                "Settlement events processed",
            ),
            &["outcome"],
        )?;

        let trades_recorded = IntCounterVec::new(
            Opts::new("clob_engine_trades_recorded_total", "Trade records inserted"),
            &["provenance"],
        )?;

        registry.register(Box::new(plans_computed.clone()))?;
        registry.register(Box::new(orders_submitted.clone()))?;
        registry.register(Box::new(orders_cancelled.clone()))?;
        registry.register(Box::new(fills_applied.clone()))?;
        registry.register(Box::new(fill_conflicts.clone()))?;
        registry.register(Box::new(reconcile_events.clone()))?;
        registry.register(Box::new(trades_recorded.clone()))?;

        Ok(Self {
            registry,
            plans_computed,
            orders_submitted,
            orders_cancelled,
            fills_applied,
            fill_conflicts,
            reconcile_events,
            trades_recorded,
        })
    }

    /// Render the registry in Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
