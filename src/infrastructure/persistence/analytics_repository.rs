use crate::domain::analytics::{AnomalyEvent, ForecastKind};
use crate::domain::cycle::AnalysisFrames;
use crate::domain::ports::AnalyticsSink;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Stored anomaly as read back for dashboards and reports
#[derive(Debug, Clone, PartialEq)]
pub struct AnomalyRecord {
    pub instrument: String,
    pub timestamp: i64,
    pub method: String,
    pub severity: String,
    pub direction: String,
    pub observed_value: f64,
    pub reference_value: f64,
    pub score: f64,
    pub description: String,
}

/// SQLite sink: upserts indicator rows, forecast points and anomalies on their natural
/// keys so re-running a cycle over overlapping history never duplicates rows.
pub struct SqliteAnalyticsSink {
    pool: SqlitePool,
}

impl SqliteAnalyticsSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn recent_anomalies(
        &self,
        instrument: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AnomalyRecord>> {
        let rows = match instrument {
            Some(instrument) => {
                sqlx::query(
                    "SELECT * FROM anomalies WHERE instrument = ? ORDER BY timestamp DESC LIMIT ?",
                )
                .bind(instrument)
                .bind(limit as i64)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT * FROM anomalies ORDER BY timestamp DESC LIMIT ?")
                    .bind(limit as i64)
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut records = Vec::with_capacity(rows.len());
        for row in rows {
            records.push(AnomalyRecord {
                instrument: row.try_get("instrument")?,
                timestamp: row.try_get("timestamp")?,
                method: row.try_get("method")?,
                severity: row.try_get("severity")?,
                direction: row.try_get("direction")?,
                observed_value: row.try_get("observed_value")?,
                reference_value: row.try_get("reference_value")?,
                score: row.try_get("score")?,
                description: row.try_get("description")?,
            });
        }
        Ok(records)
    }

    pub async fn count_indicator_rows(&self, instrument: &str) -> Result<usize> {
        self.count("SELECT COUNT(*) as count FROM indicator_rows WHERE instrument = ?", instrument)
            .await
    }

    pub async fn count_forecast_points(&self, instrument: &str) -> Result<usize> {
        self.count("SELECT COUNT(*) as count FROM forecast_points WHERE instrument = ?", instrument)
            .await
    }

    async fn count(&self, sql: &str, instrument: &str) -> Result<usize> {
        let row = sqlx::query(sql)
            .bind(instrument)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = row.try_get("count")?;
        Ok(count as usize)
    }
}

fn kind_label(kind: ForecastKind) -> &'static str {
    match kind {
        ForecastKind::Fitted => "fitted",
        ForecastKind::Projected => "projected",
    }
}

#[async_trait]
impl AnalyticsSink for SqliteAnalyticsSink {
    async fn persist(&self, frames: &AnalysisFrames, events: &[AnomalyEvent]) -> Result<()> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to open transaction")?;

        for row in frames.indicators.rows() {
            sqlx::query(
                r#"
                INSERT INTO indicator_rows (instrument, timestamp, rsi, macd, macd_signal,
                    macd_histogram, bollinger_upper, bollinger_mid, bollinger_lower, atr)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(instrument, timestamp) DO UPDATE SET
                    rsi = excluded.rsi,
                    macd = excluded.macd,
                    macd_signal = excluded.macd_signal,
                    macd_histogram = excluded.macd_histogram,
                    bollinger_upper = excluded.bollinger_upper,
                    bollinger_mid = excluded.bollinger_mid,
                    bollinger_lower = excluded.bollinger_lower,
                    atr = excluded.atr
                "#,
            )
            .bind(&frames.instrument)
            .bind(row.timestamp)
            .bind(row.rsi)
            .bind(row.macd)
            .bind(row.macd_signal)
            .bind(row.macd_histogram)
            .bind(row.bollinger_upper)
            .bind(row.bollinger_mid)
            .bind(row.bollinger_lower)
            .bind(row.atr)
            .execute(&mut *tx)
            .await
            .context("Failed to save indicator row")?;
        }

        if let Some(forecast) = &frames.forecast {
            for point in forecast.points() {
                sqlx::query(
                    r#"
                    INSERT INTO forecast_points (instrument, timestamp, model, yhat,
                        yhat_lower, yhat_upper, kind)
                    VALUES (?, ?, ?, ?, ?, ?, ?)
                    ON CONFLICT(instrument, timestamp) DO UPDATE SET
                        model = excluded.model,
                        yhat = excluded.yhat,
                        yhat_lower = excluded.yhat_lower,
                        yhat_upper = excluded.yhat_upper,
                        kind = excluded.kind
                    "#,
                )
                .bind(&frames.instrument)
                .bind(point.timestamp)
                .bind(forecast.model())
                .bind(point.yhat)
                .bind(point.yhat_lower)
                .bind(point.yhat_upper)
                .bind(kind_label(point.kind))
                .execute(&mut *tx)
                .await
                .context("Failed to save forecast point")?;
            }
        }

        let detected_at = Utc::now().timestamp_millis();
        for event in events {
            sqlx::query(
                r#"
                INSERT INTO anomalies (instrument, timestamp, method, severity, direction,
                    observed_value, reference_value, score, description, detected_at)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(instrument, timestamp, method) DO UPDATE SET
                    severity = excluded.severity,
                    direction = excluded.direction,
                    observed_value = excluded.observed_value,
                    reference_value = excluded.reference_value,
                    score = excluded.score,
                    description = excluded.description
                "#,
            )
            .bind(event.instrument())
            .bind(event.timestamp())
            .bind(event.method().as_str())
            .bind(event.severity().to_string())
            .bind(event.direction().to_string())
            .bind(event.observed_value())
            .bind(event.reference_value())
            .bind(event.score())
            .bind(event.description())
            .bind(detected_at)
            .execute(&mut *tx)
            .await
            .context("Failed to save anomaly")?;
        }

        tx.commit().await.context("Failed to commit analysis")?;
        debug!(
            "Persisted {} indicator rows and {} anomalies for {}",
            frames.indicators.len(),
            events.len(),
            frames.instrument
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::{
        DetectionMethod, Direction, ForecastFrame, ForecastPoint, IndicatorFrame, IndicatorRow,
    };
    use crate::infrastructure::persistence::Database;

    fn frames(rsi: f64) -> AnalysisFrames {
        AnalysisFrames {
            instrument: "AAPL".to_string(),
            fingerprint: "abc".to_string(),
            indicators: IndicatorFrame::new(vec![
                IndicatorRow {
                    timestamp: 1,
                    ..Default::default()
                },
                IndicatorRow {
                    timestamp: 2,
                    rsi: Some(rsi),
                    ..Default::default()
                },
            ]),
            forecast: Some(ForecastFrame::new(
                "AAPL",
                "test",
                0.95,
                vec![ForecastPoint {
                    timestamp: 3,
                    yhat: 1.0,
                    yhat_lower: 0.5,
                    yhat_upper: 1.5,
                    kind: ForecastKind::Projected,
                }],
            )),
        }
    }

    #[tokio::test]
    async fn test_persist_is_idempotent() {
        let db = Database::in_memory().await.unwrap();
        let sink = SqliteAnalyticsSink::new(db.pool.clone());
        let event = AnomalyEvent::new(
            2,
            "AAPL",
            DetectionMethod::RsiExtreme,
            Direction::Above,
            80.0,
            70.0,
            0.33,
            "RSI overbought at 80.0 (threshold: 70)",
        );

        sink.persist(&frames(80.0), std::slice::from_ref(&event))
            .await
            .unwrap();
        sink.persist(&frames(81.0), &[event]).await.unwrap();

        assert_eq!(sink.count_indicator_rows("AAPL").await.unwrap(), 2);
        assert_eq!(sink.count_forecast_points("AAPL").await.unwrap(), 1);

        let anomalies = sink.recent_anomalies(Some("AAPL"), 10).await.unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].method, "rsi_extreme");
        assert_eq!(anomalies[0].severity, "LOW");

        let row = sqlx::query("SELECT rsi FROM indicator_rows WHERE timestamp = 2")
            .fetch_one(&db.pool)
            .await
            .unwrap();
        let rsi: Option<f64> = row.try_get("rsi").unwrap();
        assert_eq!(rsi, Some(81.0));
    }
}
