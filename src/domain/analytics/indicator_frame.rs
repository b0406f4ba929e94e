use serde::{Deserialize, Serialize};

/// Indicator values for one timestamp. `None` marks warm-up or undefined values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub timestamp: i64,
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub bollinger_upper: Option<f64>,
    pub bollinger_mid: Option<f64>,
    pub bollinger_lower: Option<f64>,
    pub atr: Option<f64>,
}

/// Indicator rows aligned one-to-one with an `InstrumentSeries`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorFrame {
    rows: Vec<IndicatorRow>,
}

impl IndicatorFrame {
    pub fn new(rows: Vec<IndicatorRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[IndicatorRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&IndicatorRow> {
        self.rows.get(index)
    }

    pub fn at(&self, timestamp: i64) -> Option<&IndicatorRow> {
        self.rows
            .binary_search_by_key(&timestamp, |r| r.timestamp)
            .ok()
            .map(|i| &self.rows[i])
    }

    /// Number of leading rows where `field` is absent
    pub fn leading_absent(&self, field: impl Fn(&IndicatorRow) -> Option<f64>) -> usize {
        self.rows.iter().take_while(|r| field(r).is_none()).count()
    }

    pub fn atr_values(&self) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.atr).collect()
    }
}
