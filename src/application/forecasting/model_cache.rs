use crate::domain::analytics::ForecastFrame;
use crate::domain::config::ForecastSettings;
use crate::domain::errors::ForecastError;
use crate::domain::market::InstrumentSeries;
use crate::domain::ports::Forecaster;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use tracing::debug;

type FitResult = Result<ForecastFrame, ForecastError>;

struct CacheSlot {
    key: String,
    result: Arc<OnceLock<FitResult>>,
}

/// Forecaster decorator that reuses fits of an unchanged series snapshot.
///
/// Keyed by instrument, series fingerprint and settings. Only the latest snapshot per
/// instrument is retained. Concurrent fits of the same snapshot run the model once; the
/// other callers block until that fit finishes.
pub struct CachedForecaster {
    inner: Arc<dyn Forecaster>,
    slots: Mutex<HashMap<String, CacheSlot>>,
}

impl CachedForecaster {
    pub fn new(inner: Arc<dyn Forecaster>) -> Self {
        Self {
            inner,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Number of instruments with a cached snapshot
    pub fn len(&self) -> usize {
        self.slots.lock().map(|s| s.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot_for(&self, instrument: &str, key: String) -> Arc<OnceLock<FitResult>> {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        match slots.get(instrument) {
            Some(slot) if slot.key == key => slot.result.clone(),
            _ => {
                let result = Arc::new(OnceLock::new());
                slots.insert(
                    instrument.to_string(),
                    CacheSlot {
                        key,
                        result: result.clone(),
                    },
                );
                result
            }
        }
    }
}

impl Forecaster for CachedForecaster {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fit(&self, series: &InstrumentSeries, settings: &ForecastSettings) -> FitResult {
        let key = format!("{}:{}", series.fingerprint(), settings.cache_key());
        let slot = self.slot_for(series.instrument(), key);

        let mut computed = false;
        let result = slot.get_or_init(|| {
            computed = true;
            self.inner.fit(series, settings)
        });
        if !computed {
            debug!("Forecast cache hit for {}", series.instrument());
        }
        result.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::forecasting::TrendSeasonalForecaster;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::Duration;

    struct CountingForecaster {
        inner: TrendSeasonalForecaster,
        fits: AtomicUsize,
    }

    impl Forecaster for CountingForecaster {
        fn name(&self) -> &str {
            "counting"
        }

        fn fit(&self, series: &InstrumentSeries, settings: &ForecastSettings) -> FitResult {
            self.fits.fetch_add(1, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
            self.inner.fit(series, settings)
        }
    }

    fn counting() -> Arc<CountingForecaster> {
        Arc::new(CountingForecaster {
            inner: TrendSeasonalForecaster::new(),
            fits: AtomicUsize::new(0),
        })
    }

    fn series(last: f64) -> InstrumentSeries {
        let mut closes: Vec<f64> = (0..70).map(|i| 20.0 + i as f64 * 0.1).collect();
        closes.push(last);
        InstrumentSeries::from_daily_closes("AAPL", 0, &closes).unwrap()
    }

    #[test]
    fn test_concurrent_fits_of_same_snapshot_run_once() {
        let inner = counting();
        let cache = Arc::new(CachedForecaster::new(inner.clone()));
        let snapshot = series(27.0);

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let cache = cache.clone();
                let snapshot = snapshot.clone();
                thread::spawn(move || cache.fit(&snapshot, &ForecastSettings::default()))
            })
            .collect();
        let results: Vec<FitResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(inner.fits.load(Ordering::SeqCst), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_new_snapshot_replaces_old() {
        let inner = counting();
        let cache = CachedForecaster::new(inner.clone());
        let settings = ForecastSettings::default();

        cache.fit(&series(27.0), &settings).unwrap();
        cache.fit(&series(28.0), &settings).unwrap();
        cache.fit(&series(28.0), &settings).unwrap();

        assert_eq!(inner.fits.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_settings_are_part_of_key() {
        let inner = counting();
        let cache = CachedForecaster::new(inner.clone());
        let snapshot = series(27.0);

        cache.fit(&snapshot, &ForecastSettings::default()).unwrap();
        let narrower = ForecastSettings {
            confidence: 0.8,
            ..Default::default()
        };
        cache.fit(&snapshot, &narrower).unwrap();

        assert_eq!(inner.fits.load(Ordering::SeqCst), 2);
    }
}
