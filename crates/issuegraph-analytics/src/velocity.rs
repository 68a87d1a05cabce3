use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use issuegraph_core::Issue;
use serde::{Deserialize, Serialize};

/// One ISO week (Monday-start, UTC) of closure activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub closed_count: usize,
}

/// Closure-rate summary for an issue snapshot at a fixed `now`.
///
/// A pure function of its inputs: identical snapshots and `now` values
/// produce identical results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub closed_last_7_days: usize,
    pub closed_last_30_days: usize,
    pub avg_days_to_close: f64,
    /// Oldest week first; the last bucket is the week containing `now`.
    pub weekly: Vec<WeekBucket>,
    /// True when any closure timestamp had to be estimated from
    /// `updated_at` or `now`.
    pub estimated: bool,
}

/// Best-available closure timestamp for a closed issue: `closed_at`, then
/// `updated_at`, then `now`. The second value reports whether a fallback
/// was taken.
fn closure_timestamp(issue: &Issue, now: DateTime<Utc>) -> (DateTime<Utc>, bool) {
    if let Some(closed_at) = issue.closed_at {
        return (closed_at, false);
    }
    if issue.updated_at.timestamp() != 0 {
        return (issue.updated_at, true);
    }
    (now, true)
}

/// Monday of the ISO week containing `date`.
fn week_start_of(date: NaiveDate) -> NaiveDate {
    date - Duration::days(date.weekday().num_days_from_monday() as i64)
}

/// Compute closure velocity over the last `weeks` ISO weeks.
pub fn compute_velocity(issues: &[Issue], now: DateTime<Utc>, weeks: usize) -> Velocity {
    let mut closed_last_7_days = 0;
    let mut closed_last_30_days = 0;
    let mut estimated = false;
    let mut days_to_close: Vec<f64> = Vec::new();

    let current_week = week_start_of(now.date_naive());
    let mut weekly: Vec<WeekBucket> = (0..weeks)
        .rev()
        .map(|back| WeekBucket {
            week_start: current_week - Duration::weeks(back as i64),
            closed_count: 0,
        })
        .collect();

    for issue in issues.iter().filter(|i| i.is_closed()) {
        let (closed_at, was_estimated) = closure_timestamp(issue, now);
        estimated |= was_estimated;

        let age = now - closed_at;
        if age <= Duration::days(7) && age >= Duration::zero() {
            closed_last_7_days += 1;
        }
        if age <= Duration::days(30) && age >= Duration::zero() {
            closed_last_30_days += 1;
        }

        if issue.created_at.timestamp() != 0 {
            let days = (closed_at - issue.created_at).num_seconds() as f64 / 86_400.0;
            if days >= 0.0 {
                days_to_close.push(days);
            }
        }

        let closed_week = week_start_of(closed_at.date_naive());
        if let Some(bucket) = weekly.iter_mut().find(|b| b.week_start == closed_week) {
            bucket.closed_count += 1;
        }
    }

    let avg_days_to_close = if days_to_close.is_empty() {
        0.0
    } else {
        days_to_close.iter().sum::<f64>() / days_to_close.len() as f64
    };

    Velocity {
        closed_last_7_days,
        closed_last_30_days,
        avg_days_to_close,
        weekly,
        estimated,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::TimeZone;
    use issuegraph_core::Status;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 12, 16, 12, 0, 0).single().unwrap()
    }

    fn closed_days_ago(id: &str, days: i64, now: DateTime<Utc>) -> Issue {
        let mut issue = Issue::new(id, "closed work").with_status(Status::Closed);
        issue.created_at = now - Duration::days(days + 5);
        issue.updated_at = now - Duration::days(days);
        issue.closed_at = Some(now - Duration::days(days));
        issue
    }

    fn snapshot(now: DateTime<Utc>) -> Vec<Issue> {
        vec![
            closed_days_ago("c1", 3, now),
            closed_days_ago("c2", 10, now),
            closed_days_ago("c3", 25, now),
            Issue::new("open", "still going"),
        ]
    }

    #[test]
    fn window_counts_at_a_fixed_now() {
        let now = fixed_now();
        let velocity = compute_velocity(&snapshot(now), now, 6);
        assert_eq!(velocity.closed_last_7_days, 1);
        assert_eq!(velocity.closed_last_30_days, 3);
        assert!(!velocity.estimated);
        assert_relative_eq!(velocity.avg_days_to_close, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn missing_closed_at_falls_back_and_flags() {
        let now = fixed_now();
        let mut issue = closed_days_ago("c", 3, now);
        issue.closed_at = None;
        let velocity = compute_velocity(&[issue], now, 4);
        assert_eq!(velocity.closed_last_7_days, 1);
        assert!(velocity.estimated);
    }

    #[test]
    fn zero_timestamps_fall_back_to_now() {
        let now = fixed_now();
        let epoch = Utc.timestamp_opt(0, 0).single().unwrap();
        let mut issue = Issue::new("c", "ancient record").with_status(Status::Closed);
        issue.closed_at = None;
        issue.created_at = epoch;
        issue.updated_at = epoch;
        let velocity = compute_velocity(&[issue], now, 4);
        assert_eq!(velocity.closed_last_7_days, 1);
        assert!(velocity.estimated);
        // No usable created_at, so no duration sample.
        assert_eq!(velocity.avg_days_to_close, 0.0);
    }

    #[test]
    fn weekly_buckets_start_on_monday_and_sum_to_window_closures() {
        let now = fixed_now();
        let weeks = 6;
        let velocity = compute_velocity(&snapshot(now), now, weeks);
        assert_eq!(velocity.weekly.len(), weeks);
        for bucket in &velocity.weekly {
            assert_eq!(bucket.week_start.weekday(), chrono::Weekday::Mon);
        }
        for pair in velocity.weekly.windows(2) {
            assert_eq!(pair[1].week_start - pair[0].week_start, Duration::weeks(1));
        }
        let bucketed: usize = velocity.weekly.iter().map(|b| b.closed_count).sum();
        assert_eq!(bucketed, 3);
    }

    #[test]
    fn velocity_is_idempotent() {
        let now = fixed_now();
        let issues = snapshot(now);
        assert_eq!(
            compute_velocity(&issues, now, 8),
            compute_velocity(&issues, now, 8)
        );
    }
}
