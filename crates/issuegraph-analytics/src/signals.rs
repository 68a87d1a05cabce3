use chrono::{DateTime, Utc};
use issuegraph_core::Issue;

/// A normalized heuristic value with a short human-readable explanation.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    pub value: f64,
    pub explanation: String,
}

impl Signal {
    fn new(value: f64, explanation: impl Into<String>) -> Self {
        Self {
            value,
            explanation: explanation.into(),
        }
    }
}

/// Urgency keywords scanned case-insensitively over labels; first match
/// wins.
const URGENCY_KEYWORDS: [(&str, f64); 5] = [
    ("critical", 1.0),
    ("blocker", 1.0),
    ("urgent", 0.8),
    ("hotfix", 0.8),
    ("asap", 0.6),
];

/// Labels that flag inherently risky work.
const RISK_LABELS: [&str; 5] = ["security", "regression", "breaking", "unstable", "risky"];

fn days_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    ((later - earlier).num_seconds().max(0) as f64) / 86_400.0
}

/// How long the issue has gone untouched, saturating at 30 days.
pub fn staleness(issue: &Issue, now: DateTime<Utc>) -> Signal {
    if issue.updated_at.timestamp() == 0 {
        return Signal::new(0.5, "no update timestamp recorded");
    }
    let days = days_between(issue.updated_at, now);
    let value = (days / 30.0).min(1.0);
    Signal::new(value, format!("last updated {:.0} days ago", days))
}

/// Explicit priority mapped onto [0, 1]; P0 is the strongest.
pub fn priority_boost(priority: i32) -> Signal {
    let value = match priority {
        i32::MIN..=0 => 1.0,
        1 => 0.75,
        2 => 0.5,
        3 => 0.25,
        _ => 0.0,
    };
    Signal::new(value, format!("priority P{}", priority.max(0)))
}

/// Median of the estimates present in the snapshot, or `default_minutes`
/// when nothing is estimated.
pub fn median_estimate_minutes(issues: &[Issue], default_minutes: i64) -> i64 {
    let mut estimates: Vec<i64> = issues.iter().filter_map(|i| i.estimated_minutes).collect();
    if estimates.is_empty() {
        return default_minutes;
    }
    estimates.sort_unstable();
    estimates[estimates.len() / 2]
}

/// How soon finishing this issue pays off: a deep downstream chain combined
/// with a small estimate.
pub fn time_to_impact(issue: &Issue, critical_path_depth: usize, median_minutes: i64) -> Signal {
    let depth_factor = (critical_path_depth as f64 / 10.0).min(1.0);
    let minutes = issue.estimated_minutes.unwrap_or(median_minutes);
    let time_factor = (1.0 - minutes as f64 / 480.0).clamp(0.0, 1.0);
    let value = 0.7 * depth_factor + 0.3 * time_factor;
    Signal::new(
        value,
        format!(
            "critical-path depth {} with ~{} minute estimate",
            critical_path_depth, minutes
        ),
    )
}

/// Label-driven urgency plus a time-decay term that ramps over the first
/// weeks of an issue's life.
pub fn urgency(issue: &Issue, now: DateTime<Utc>) -> Signal {
    let mut label_weight = 0.0;
    let mut matched = None;
    'keywords: for (keyword, weight) in URGENCY_KEYWORDS {
        for label in &issue.labels {
            if label.to_lowercase().contains(keyword) {
                label_weight = weight;
                matched = Some(keyword);
                break 'keywords;
            }
        }
    }

    let age_days = days_between(issue.created_at, now);
    let decay = 0.5 * (1.0 - (-age_days / 7.0).exp());
    let value = (label_weight + decay).min(1.0);

    let explanation = match matched {
        Some(keyword) => format!("label matches \"{keyword}\"; open for {age_days:.0} days"),
        None => format!("open for {age_days:.0} days"),
    };
    Signal::new(value, explanation)
}

/// Volatility composite: dependency fan-in, update churn on an established
/// issue, and risk-flagging labels.
pub fn risk(issue: &Issue, in_degree: usize, now: DateTime<Utc>) -> Signal {
    let fan_in = (in_degree as f64 / 5.0).min(1.0);

    let age_days = days_between(issue.created_at, now);
    let updated_days = days_between(issue.updated_at, now);
    let churn = (-updated_days / 14.0).exp() * (age_days / 90.0).min(1.0);

    let risky_label = issue.labels.iter().find_map(|label| {
        let lower = label.to_lowercase();
        RISK_LABELS
            .iter()
            .find(|kw| lower.contains(*kw))
            .map(|kw| kw.to_string())
    });
    let label_risk = if risky_label.is_some() { 1.0 } else { 0.0 };

    let value = 0.4 * fan_in + 0.3 * churn + 0.3 * label_risk;
    let mut parts = vec![format!("{in_degree} blocking dependencies feed in")];
    if churn > 0.2 {
        parts.push("recent churn on an established issue".to_string());
    }
    if let Some(label) = risky_label {
        parts.push(format!("label flags \"{label}\""));
    }
    Signal::new(value, parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;

    fn at(ts: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(ts, 0).single().expect("valid timestamp")
    }

    fn issue_updated_days_ago(days: i64, now: DateTime<Utc>) -> Issue {
        let mut issue = Issue::new("x", "issue");
        issue.created_at = now - chrono::Duration::days(days + 10);
        issue.updated_at = now - chrono::Duration::days(days);
        issue
    }

    #[test]
    fn staleness_saturates_at_thirty_days() {
        let now = at(1_700_000_000);
        assert_relative_eq!(
            staleness(&issue_updated_days_ago(15, now), now).value,
            0.5,
            epsilon = 1e-9
        );
        assert_relative_eq!(
            staleness(&issue_updated_days_ago(90, now), now).value,
            1.0,
            epsilon = 1e-9
        );
    }

    #[test]
    fn zero_update_timestamp_reads_as_half_stale() {
        let now = at(1_700_000_000);
        let mut issue = Issue::new("x", "issue");
        issue.updated_at = at(0);
        assert_relative_eq!(staleness(&issue, now).value, 0.5, epsilon = 1e-9);
    }

    #[test]
    fn priority_boost_ladder() {
        assert_eq!(priority_boost(0).value, 1.0);
        assert_eq!(priority_boost(1).value, 0.75);
        assert_eq!(priority_boost(2).value, 0.5);
        assert_eq!(priority_boost(3).value, 0.25);
        assert_eq!(priority_boost(4).value, 0.0);
        assert_eq!(priority_boost(9).value, 0.0);
    }

    #[test]
    fn median_estimate_falls_back_to_default() {
        let issues = vec![Issue::new("a", "no estimate")];
        assert_eq!(median_estimate_minutes(&issues, 60), 60);

        let mut with_estimates = issues;
        for (id, minutes) in [("b", 30), ("c", 120), ("d", 240)] {
            let mut issue = Issue::new(id, "estimated");
            issue.estimated_minutes = Some(minutes);
            with_estimates.push(issue);
        }
        assert_eq!(median_estimate_minutes(&with_estimates, 60), 120);
    }

    #[test]
    fn time_to_impact_blends_depth_and_effort() {
        let mut issue = Issue::new("x", "quick");
        issue.estimated_minutes = Some(480);
        // Depth 10 caps the depth factor; a full-day estimate zeroes the
        // time factor.
        assert_relative_eq!(time_to_impact(&issue, 12, 60).value, 0.7, epsilon = 1e-9);

        issue.estimated_minutes = Some(0);
        assert_relative_eq!(time_to_impact(&issue, 0, 60).value, 0.3, epsilon = 1e-9);
    }

    #[test]
    fn urgency_takes_the_first_matching_keyword() {
        let now = at(1_700_000_000);
        let mut issue = Issue::new("x", "urgent work")
            .with_label("asap")
            .with_label("release-blocker");
        issue.created_at = now;
        issue.updated_at = now;
        // "blocker" (1.0) outranks "asap" (0.6) in scan order.
        let signal = urgency(&issue, now);
        assert_relative_eq!(signal.value, 1.0, epsilon = 1e-9);
        assert!(signal.explanation.contains("blocker"));
    }

    #[test]
    fn urgency_decay_alone_tops_out_at_half() {
        let now = at(1_700_000_000);
        let mut issue = Issue::new("x", "old unlabeled");
        issue.created_at = now - chrono::Duration::days(365);
        issue.updated_at = issue.created_at;
        let signal = urgency(&issue, now);
        assert!(signal.value > 0.49 && signal.value <= 0.5);
    }

    #[test]
    fn risk_combines_fan_in_and_labels() {
        let now = at(1_700_000_000);
        let mut issue = Issue::new("x", "scary").with_label("security-hole");
        issue.created_at = now - chrono::Duration::days(200);
        issue.updated_at = now - chrono::Duration::days(100);
        let signal = risk(&issue, 10, now);
        // fan-in saturates (0.4) + label risk (0.3); churn is negligible.
        assert!(signal.value > 0.69 && signal.value < 0.72);
        assert!(signal.explanation.contains("security"));
    }
}
