//! Prometheus metrics for the analytics pipeline
//!
//! All metrics use the `stock_anomaly_` prefix and are updated once per cycle.

use crate::application::pipeline::CycleObserver;
use crate::domain::cycle::{CycleResult, InstrumentOutcome};
use prometheus::{
    CounterVec, Gauge, Histogram, HistogramOpts, IntCounter, Opts, Registry, TextEncoder,
    core::{AtomicF64, GenericGauge},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    /// Cycles run since start
    pub cycles_total: IntCounter,
    /// Wall-clock duration of each cycle
    pub cycle_duration_seconds: Histogram,
    /// Instrument outcomes by status (completed, fetch, computation, cancelled)
    pub instrument_outcomes_total: CounterVec,
    /// Anomaly events by method and severity
    pub anomalies_total: CounterVec,
    /// Instruments whose forecast was skipped for short history
    pub forecast_skips_total: IntCounter,
    /// Sink or notifier failures
    pub delivery_errors_total: IntCounter,
    /// Instruments completed in the last cycle
    pub last_cycle_completed: GenericGauge<AtomicF64>,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let cycles_total = IntCounter::with_opts(Opts::new(
            "stock_anomaly_cycles_total",
            "Refresh cycles run",
        ))?;
        registry.register(Box::new(cycles_total.clone()))?;

        let cycle_duration_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "stock_anomaly_cycle_duration_seconds",
                "Refresh cycle duration in seconds",
            )
            .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
        )?;
        registry.register(Box::new(cycle_duration_seconds.clone()))?;

        let instrument_outcomes_total = CounterVec::new(
            Opts::new(
                "stock_anomaly_instrument_outcomes_total",
                "Instrument outcomes by status",
            ),
            &["status"],
        )?;
        registry.register(Box::new(instrument_outcomes_total.clone()))?;

        let anomalies_total = CounterVec::new(
            Opts::new(
                "stock_anomaly_anomalies_total",
                "Anomaly events by method and severity",
            ),
            &["method", "severity"],
        )?;
        registry.register(Box::new(anomalies_total.clone()))?;

        let forecast_skips_total = IntCounter::with_opts(Opts::new(
            "stock_anomaly_forecast_skips_total",
            "Forecasts skipped for insufficient history",
        ))?;
        registry.register(Box::new(forecast_skips_total.clone()))?;

        let delivery_errors_total = IntCounter::with_opts(Opts::new(
            "stock_anomaly_delivery_errors_total",
            "Sink and notifier failures",
        ))?;
        registry.register(Box::new(delivery_errors_total.clone()))?;

        let last_cycle_completed = Gauge::with_opts(Opts::new(
            "stock_anomaly_last_cycle_completed",
            "Instruments completed in the last cycle",
        ))?;
        registry.register(Box::new(last_cycle_completed.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            cycles_total,
            cycle_duration_seconds,
            instrument_outcomes_total,
            anomalies_total,
            forecast_skips_total,
            delivery_errors_total,
            last_cycle_completed,
        })
    }

    /// Render all metrics in Prometheus text format
    pub fn render(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        encoder
            .encode_to_string(&metric_families)
            .unwrap_or_default()
    }

    pub fn record_cycle(&self, result: &CycleResult) {
        self.cycles_total.inc();
        self.cycle_duration_seconds
            .observe(result.duration_ms as f64 / 1000.0);
        self.last_cycle_completed
            .set(result.completed_count() as f64);

        for report in &result.reports {
            let status = match &report.outcome {
                InstrumentOutcome::Completed(analysis) => {
                    if analysis.forecast_skipped.is_some() {
                        self.forecast_skips_total.inc();
                    }
                    self.delivery_errors_total
                        .inc_by(analysis.delivery_errors as u64);
                    "completed"
                }
                InstrumentOutcome::Failed(reason) => reason.kind(),
            };
            self.instrument_outcomes_total
                .with_label_values(&[status])
                .inc();
        }

        for event in result.all_events() {
            let severity = event.severity().to_string();
            self.anomalies_total
                .with_label_values(&[event.method().as_str(), severity.as_str()])
                .inc();
        }
    }
}

impl CycleObserver for Metrics {
    fn on_cycle(&self, result: &CycleResult) {
        self.record_cycle(result);
    }
}
