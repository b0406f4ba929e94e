use crate::application::detection::policy::{CompositeScorer, ConfirmationPolicy};
use crate::domain::analytics::{AnomalyEvent, DetectionMethod, Severity};
use std::fmt::Write;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";

fn severity_mark(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "[!!!]",
        Severity::Medium => "[!!]",
        Severity::Low => "[!]",
    }
}

fn method_title(method: DetectionMethod) -> String {
    method
        .as_str()
        .split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Ten-cell bar for a score in `[0, 1]`; larger scores fill the bar
pub fn strength_bar(score: f64) -> String {
    let filled = (score.clamp(0.0, 1.0) * 10.0) as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(10 - filled))
}

/// Single-event alert message
pub fn format_alert(event: &AnomalyEvent) -> String {
    let mark = severity_mark(event.severity());
    let mut message = String::new();

    let _ = writeln!(
        message,
        "{} {} ANOMALY DETECTED {}",
        mark,
        event.instrument(),
        mark
    );
    let _ = writeln!(message, "{}", RULE);
    let _ = writeln!(message, "Type: {}", method_title(event.method()));
    let _ = writeln!(message, "Severity: {}", event.severity());
    let _ = writeln!(message, "Observed: {:.2}", event.observed_value());

    let reference = event.reference_value();
    if reference.abs() > f64::EPSILON {
        let diff_pct = (event.observed_value() - reference) / reference * 100.0;
        let _ = writeln!(message, "Reference: {:.2}", reference);
        let _ = writeln!(message, "Deviation: {:+.2}%", diff_pct);
    }

    let strength = event.score().clamp(0.0, 1.0);
    let _ = writeln!(
        message,
        "Strength: [{}] {:.0}%",
        strength_bar(strength),
        strength * 100.0
    );
    let _ = writeln!(message, "{}", event.description());
    let _ = write!(message, "{}", event.timestamp_label());

    message
}

/// Per-instrument digest of a cycle's events.
///
/// Counts by severity, lists the strongest events first, then the timestamps
/// confirmed by several methods and the weighted composite score.
pub fn format_summary(
    instrument: &str,
    events: &[AnomalyEvent],
    policy: &ConfirmationPolicy,
    scorer: &CompositeScorer,
) -> String {
    let mut summary = String::new();
    let _ = writeln!(summary, "{} ANOMALY SUMMARY", instrument);
    let _ = writeln!(summary, "{}", RULE);
    let _ = writeln!(summary, "Total anomalies: {}", events.len());

    for severity in [Severity::High, Severity::Medium, Severity::Low] {
        let mut matching: Vec<&AnomalyEvent> =
            events.iter().filter(|e| e.severity() == severity).collect();
        if matching.is_empty() {
            continue;
        }
        matching.sort_by(|a, b| b.score().total_cmp(&a.score()));

        let _ = writeln!(
            summary,
            "{} {}: {}",
            severity_mark(severity),
            severity,
            matching.len()
        );
        // Low severity only gets a count
        if severity != Severity::Low {
            for event in matching.iter().take(3) {
                let _ = writeln!(
                    summary,
                    "   • {} {} ({:.2})",
                    event.timestamp_label(),
                    event.method(),
                    event.score()
                );
            }
        }
    }

    let confirmed = policy.confirmed(events);
    if !confirmed.is_empty() {
        let _ = writeln!(
            summary,
            "Confirmed by {}+ methods: {}",
            policy.min_methods,
            confirmed.len()
        );
    }
    let _ = write!(summary, "Composite score: {:.2}", scorer.score(events));

    summary
}
