//! Interpretation policies applied to the ensemble's event stream.
//!
//! The ensemble never folds methods into a single verdict. Callers that want a
//! "confirmed" signal or a single score per instrument pick one of these.

use crate::domain::analytics::{AnomalyEvent, DetectionMethod};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A timestamp flagged by at least `min_methods` distinct detection methods
#[derive(Debug, Clone, PartialEq)]
pub struct ConfirmedAnomaly {
    pub timestamp: i64,
    pub methods: Vec<DetectionMethod>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfirmationPolicy {
    pub min_methods: usize,
}

impl ConfirmationPolicy {
    pub fn new(min_methods: usize) -> Self {
        Self {
            min_methods: min_methods.max(1),
        }
    }

    /// Timestamps (ascending) confirmed by enough distinct methods
    pub fn confirmed(&self, events: &[AnomalyEvent]) -> Vec<ConfirmedAnomaly> {
        let mut by_timestamp: BTreeMap<i64, BTreeSet<DetectionMethod>> = BTreeMap::new();
        for event in events {
            by_timestamp
                .entry(event.timestamp())
                .or_default()
                .insert(event.method());
        }

        by_timestamp
            .into_iter()
            .filter(|(_, methods)| methods.len() >= self.min_methods)
            .map(|(timestamp, methods)| ConfirmedAnomaly {
                timestamp,
                methods: methods.into_iter().collect(),
            })
            .collect()
    }
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self::new(2)
    }
}

/// Weighted ensemble score in `[0, 1]`.
///
/// Each event contributes its score capped at 1.0, weighted by its method.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeScorer {
    weights: HashMap<DetectionMethod, f64>,
}

impl CompositeScorer {
    pub fn new(weights: HashMap<DetectionMethod, f64>) -> Self {
        Self { weights }
    }

    pub fn weight(&self, method: DetectionMethod) -> f64 {
        self.weights.get(&method).copied().unwrap_or(0.1)
    }

    pub fn score(&self, events: &[AnomalyEvent]) -> f64 {
        let (weighted, total) = events.iter().fold((0.0, 0.0), |(sum, total), e| {
            let w = self.weight(e.method());
            (sum + e.score().clamp(0.0, 1.0) * w, total + w)
        });
        if total > 0.0 {
            (weighted / total).min(1.0)
        } else {
            0.0
        }
    }
}

impl Default for CompositeScorer {
    fn default() -> Self {
        Self::new(HashMap::from([
            (DetectionMethod::ZScore, 0.30),
            (DetectionMethod::ForecastDeviation, 0.25),
            (DetectionMethod::VolatilitySpike, 0.20),
            (DetectionMethod::BollingerBreakout, 0.15),
            (DetectionMethod::RsiExtreme, 0.10),
        ]))
    }
}
