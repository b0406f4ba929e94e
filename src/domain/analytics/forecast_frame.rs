use serde::{Deserialize, Serialize};

/// Whether a forecast point lies over observed history or past the last observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ForecastKind {
    Fitted,
    Projected,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: i64,
    pub yhat: f64,
    pub yhat_lower: f64,
    pub yhat_upper: f64,
    pub kind: ForecastKind,
}

impl ForecastPoint {
    pub fn contains(&self, value: f64) -> bool {
        value >= self.yhat_lower && value <= self.yhat_upper
    }
}

/// Point forecasts with confidence bounds over fitted history plus a forward horizon.
///
/// Points are sorted by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastFrame {
    instrument: String,
    model: String,
    confidence: f64,
    points: Vec<ForecastPoint>,
}

impl ForecastFrame {
    pub fn new(
        instrument: impl Into<String>,
        model: impl Into<String>,
        confidence: f64,
        mut points: Vec<ForecastPoint>,
    ) -> Self {
        points.sort_by_key(|p| p.timestamp);
        Self {
            instrument: instrument.into(),
            model: model.into(),
            confidence,
            points,
        }
    }

    pub fn instrument(&self) -> &str {
        &self.instrument
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn at(&self, timestamp: i64) -> Option<&ForecastPoint> {
        self.points
            .binary_search_by_key(&timestamp, |p| p.timestamp)
            .ok()
            .map(|i| &self.points[i])
    }

    pub fn fitted(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points.iter().filter(|p| p.kind == ForecastKind::Fitted)
    }

    pub fn projected(&self) -> impl Iterator<Item = &ForecastPoint> {
        self.points
            .iter()
            .filter(|p| p.kind == ForecastKind::Projected)
    }
}
