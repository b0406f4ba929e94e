use super::format::{format_alert, format_summary};
use crate::application::detection::policy::{CompositeScorer, ConfirmationPolicy};
use crate::domain::analytics::{AnomalyEvent, Severity};
use crate::domain::ports::AlertNotifier;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Delivers alerts to the log.
///
/// One summary per instrument at `info`, plus the full message of every HIGH event
/// at `warn`. Lower-severity messages go to `debug`.
pub struct LogNotifier {
    policy: ConfirmationPolicy,
    scorer: CompositeScorer,
}

impl LogNotifier {
    pub fn new(policy: ConfirmationPolicy, scorer: CompositeScorer) -> Self {
        Self { policy, scorer }
    }

    /// Messages this notifier would emit, summary first
    pub fn render(&self, instrument: &str, events: &[AnomalyEvent]) -> Vec<String> {
        let mut messages = Vec::with_capacity(events.len() + 1);
        messages.push(format_summary(
            instrument,
            events,
            &self.policy,
            &self.scorer,
        ));
        messages.extend(events.iter().map(format_alert));
        messages
    }
}

impl Default for LogNotifier {
    fn default() -> Self {
        Self::new(ConfirmationPolicy::default(), CompositeScorer::default())
    }
}

#[async_trait]
impl AlertNotifier for LogNotifier {
    async fn notify(&self, instrument: &str, events: &[AnomalyEvent]) -> Result<()> {
        if events.is_empty() {
            return Ok(());
        }

        info!(
            "\n{}",
            format_summary(instrument, events, &self.policy, &self.scorer)
        );
        for event in events {
            if event.severity() == Severity::High {
                warn!("\n{}", format_alert(event));
            } else {
                debug!("\n{}", format_alert(event));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::analytics::{DetectionMethod, Direction};

    #[tokio::test]
    async fn test_render_and_notify() {
        let notifier = LogNotifier::default();
        let events = vec![AnomalyEvent::new(
            0,
            "MSFT",
            DetectionMethod::RsiExtreme,
            Direction::Below,
            25.0,
            30.0,
            0.17,
            "RSI oversold at 25.0 (threshold: 30)",
        )];

        let messages = notifier.render("MSFT", &events);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].starts_with("MSFT ANOMALY SUMMARY"));
        assert!(messages[1].contains("RSI oversold"));

        notifier.notify("MSFT", &events).await.unwrap();
        notifier.notify("MSFT", &[]).await.unwrap();
    }
}
