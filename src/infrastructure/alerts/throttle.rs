use crate::domain::analytics::AnomalyEvent;
use crate::domain::ports::AlertNotifier;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::debug;

pub const DEFAULT_THROTTLE_MINUTES: u64 = 15;

/// Suppresses alerts for an instrument until `window` has elapsed since the last
/// alert that was actually delivered. Failed deliveries do not start the window.
pub struct ThrottledNotifier {
    inner: Arc<dyn AlertNotifier>,
    window: Duration,
    last_delivered: Mutex<HashMap<String, Instant>>,
}

impl ThrottledNotifier {
    pub fn new(inner: Arc<dyn AlertNotifier>, window: Duration) -> Self {
        Self {
            inner,
            window,
            last_delivered: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_minutes(inner: Arc<dyn AlertNotifier>, minutes: u64) -> Self {
        Self::new(inner, Duration::from_secs(minutes * 60))
    }

    fn is_throttled(&self, instrument: &str, now: Instant) -> bool {
        let last = match self.last_delivered.lock() {
            Ok(guard) => guard.get(instrument).copied(),
            Err(poisoned) => poisoned.into_inner().get(instrument).copied(),
        };
        last.is_some_and(|at| now.duration_since(at) < self.window)
    }

    fn mark_delivered(&self, instrument: &str, at: Instant) {
        let mut guard = match self.last_delivered.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.insert(instrument.to_string(), at);
    }
}

#[async_trait]
impl AlertNotifier for ThrottledNotifier {
    async fn notify(&self, instrument: &str, events: &[AnomalyEvent]) -> Result<()> {
        let now = Instant::now();
        if self.is_throttled(instrument, now) {
            debug!(
                "Throttled {} alert(s) for {} (window {:?})",
                events.len(),
                instrument,
                self.window
            );
            return Ok(());
        }

        self.inner.notify(instrument, events).await?;
        self.mark_delivered(instrument, now);
        Ok(())
    }
}
