//! Prometheus metrics

use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// Candle close to decision
    DecisionCycle,
    /// Book fetch round trip
    OrderBook,
    /// Order submission round trip
    OrderSubmission,
    /// Gamma discovery round trip
    Discovery,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Collateral plus marked position value
    AccountValue,
    /// Latest fused probability
    Probability,
    /// Unrealized ROI of the open position, percent
    PositionRoi,
    /// Current drawdown from the daily reference
    DrawdownPct,
    /// Markets passing discovery and the liquidity filter
    ActiveMarkets,
    /// 1 while the circuit breaker is halted
    Halted,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Stream reconnects, labelled by venue
    FeedReconnects,
    /// Decision cycles run
    DecisionCycles,
    /// Positions opened
    Entries,
    /// Positions closed, labelled by reason
    Exits,
    /// Markets dropped by discovery, labelled by reason
    RejectedMarkets,
    /// Venue or transport failures, labelled by operation
    ExecutionErrors,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::DecisionCycle => "updown_decision_cycle_latency_ms",
            LatencyMetric::OrderBook => "updown_orderbook_fetch_latency_ms",
            LatencyMetric::OrderSubmission => "updown_order_submission_latency_ms",
            LatencyMetric::Discovery => "updown_discovery_latency_ms",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::AccountValue => "updown_account_value_usd",
            GaugeMetric::Probability => "updown_probability",
            GaugeMetric::PositionRoi => "updown_position_roi_pct",
            GaugeMetric::DrawdownPct => "updown_drawdown_pct",
            GaugeMetric::ActiveMarkets => "updown_active_markets",
            GaugeMetric::Halted => "updown_halted",
        }
    }
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::FeedReconnects => "updown_feed_reconnects_total",
            CounterMetric::DecisionCycles => "updown_decision_cycles_total",
            CounterMetric::Entries => "updown_entries_total",
            CounterMetric::Exits => "updown_exits_total",
            CounterMetric::RejectedMarkets => "updown_rejected_markets_total",
            CounterMetric::ExecutionErrors => "updown_execution_errors_total",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    metrics::histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    metrics::gauge!(metric.name()).set(value);
}

/// Increment a counter under a single `label` dimension
pub fn increment_counter(metric: CounterMetric, label: &'static str) {
    metrics::counter!(metric.name(), "label" => label).increment(1);
}
