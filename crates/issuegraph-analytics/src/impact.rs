use crate::signals::{
    median_estimate_minutes, priority_boost, risk, staleness, time_to_impact, urgency,
};
use chrono::{DateTime, Utc};
use issuegraph_core::Issue;
use issuegraph_graph::GraphStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

pub const WEIGHT_PAGERANK: f64 = 0.22;
pub const WEIGHT_BETWEENNESS: f64 = 0.20;
pub const WEIGHT_BLOCKER_RATIO: f64 = 0.13;
pub const WEIGHT_STALENESS: f64 = 0.05;
pub const WEIGHT_PRIORITY: f64 = 0.10;
pub const WEIGHT_TIME_TO_IMPACT: f64 = 0.10;
pub const WEIGHT_URGENCY: f64 = 0.10;
pub const WEIGHT_RISK: f64 = 0.10;

/// The eight normalized component values behind a composite score.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub pagerank: f64,
    pub betweenness: f64,
    pub blocker_ratio: f64,
    pub staleness: f64,
    pub priority_boost: f64,
    pub time_to_impact: f64,
    pub urgency: f64,
    pub risk: f64,
}

impl ScoreComponents {
    /// The composite is exactly the weighted sum of the stored components.
    pub fn weighted_total(&self) -> f64 {
        WEIGHT_PAGERANK * self.pagerank
            + WEIGHT_BETWEENNESS * self.betweenness
            + WEIGHT_BLOCKER_RATIO * self.blocker_ratio
            + WEIGHT_STALENESS * self.staleness
            + WEIGHT_PRIORITY * self.priority_boost
            + WEIGHT_TIME_TO_IMPACT * self.time_to_impact
            + WEIGHT_URGENCY * self.urgency
            + WEIGHT_RISK * self.risk
    }
}

/// Composite impact score for one non-closed issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpactScore {
    pub id: String,
    pub score: f64,
    pub components: ScoreComponents,
    /// Explanation strings from the underlying signals.
    pub notes: Vec<String>,
}

fn max_value(map: &HashMap<String, f64>) -> f64 {
    map.values().copied().fold(0.0, f64::max)
}

/// Score every non-closed issue, sorted score-descending with ID-ascending
/// ties. Blocks until the centrality bundle is published.
pub fn score_issues(issues: &[Issue], stats: &GraphStats, now: DateTime<Utc>) -> Vec<ImpactScore> {
    let metrics = stats.phase2();
    let max_pagerank = max_value(&metrics.pagerank);
    let max_betweenness = max_value(&metrics.betweenness);
    let max_in_degree = stats.in_degree.values().copied().max().unwrap_or(0);
    let median_minutes =
        median_estimate_minutes(issues, stats.config.default_estimated_minutes);

    let mut scores: Vec<ImpactScore> = issues
        .iter()
        .filter(|issue| !issue.is_closed())
        .map(|issue| {
            let pagerank = if max_pagerank > 0.0 {
                metrics.pagerank.get(&issue.id).copied().unwrap_or(0.0) / max_pagerank
            } else {
                0.0
            };
            let betweenness = if max_betweenness > 0.0 {
                metrics.betweenness.get(&issue.id).copied().unwrap_or(0.0) / max_betweenness
            } else {
                0.0
            };
            let in_degree = stats.in_degree.get(&issue.id).copied().unwrap_or(0);
            let blocker_ratio = if max_in_degree > 0 {
                in_degree as f64 / max_in_degree as f64
            } else {
                0.0
            };
            let depth = metrics.critical_path.get(&issue.id).copied().unwrap_or(0);

            let stale = staleness(issue, now);
            let boost = priority_boost(issue.priority);
            let tti = time_to_impact(issue, depth, median_minutes);
            let urgent = urgency(issue, now);
            let risky = risk(issue, in_degree, now);

            let components = ScoreComponents {
                pagerank,
                betweenness,
                blocker_ratio,
                staleness: stale.value,
                priority_boost: boost.value,
                time_to_impact: tti.value,
                urgency: urgent.value,
                risk: risky.value,
            };
            ImpactScore {
                id: issue.id.clone(),
                score: components.weighted_total(),
                components,
                notes: vec![
                    stale.explanation,
                    boost.explanation,
                    tti.explanation,
                    urgent.explanation,
                    risky.explanation,
                ],
            }
        })
        .collect();

    scores.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    debug!(scored = scores.len(), "impact scoring complete");
    scores
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use issuegraph_core::{AnalysisConfig, CancellationToken, DependencyType, Status};
    use issuegraph_graph::analyze;

    #[test]
    fn weights_sum_to_one() {
        let total = WEIGHT_PAGERANK
            + WEIGHT_BETWEENNESS
            + WEIGHT_BLOCKER_RATIO
            + WEIGHT_STALENESS
            + WEIGHT_PRIORITY
            + WEIGHT_TIME_TO_IMPACT
            + WEIGHT_URGENCY
            + WEIGHT_RISK;
        assert_relative_eq!(total, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn scores_are_the_weighted_component_sum() {
        let issues = vec![
            Issue::new("a", "root").with_priority(0),
            Issue::new("b", "mid").with_dependency("a", DependencyType::Blocks),
            Issue::new("c", "leaf").with_dependency("b", DependencyType::Blocks),
        ];
        let stats = analyze(&issues, AnalysisConfig::default(), CancellationToken::new());
        let scores = score_issues(&issues, &stats, Utc::now());
        for score in &scores {
            assert_relative_eq!(
                score.score,
                score.components.weighted_total(),
                epsilon = 1e-9
            );
        }
    }

    #[test]
    fn output_is_sorted_and_excludes_closed() {
        let issues = vec![
            Issue::new("done", "finished").with_status(Status::Closed),
            Issue::new("a", "one"),
            Issue::new("b", "two"),
        ];
        let stats = analyze(&issues, AnalysisConfig::default(), CancellationToken::new());
        let scores = score_issues(&issues, &stats, Utc::now());
        assert_eq!(scores.len(), 2);
        assert!(scores.iter().all(|s| s.id != "done"));
        for pair in scores.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].id < pair[1].id)
            );
        }
    }

    #[test]
    fn priority_and_depth_lift_a_blocker_over_a_bystander() {
        let mut issues = vec![
            Issue::new("hub", "blocks everything").with_priority(0),
            Issue::new("lone", "unrelated chore"),
        ];
        for i in 0..4 {
            issues.push(
                Issue::new(format!("leaf-{i}"), "waits")
                    .with_dependency("hub", DependencyType::Blocks),
            );
        }
        let stats = analyze(&issues, AnalysisConfig::default(), CancellationToken::new());
        let scores = score_issues(&issues, &stats, Utc::now());
        let position = |id: &str| scores.iter().position(|s| s.id == id).unwrap();
        assert!(position("hub") < position("lone"));
    }
}
