use crate::impact::ImpactScore;
use crate::unblocks::compute_unblocks;
use issuegraph_core::{Issue, Status};
use issuegraph_graph::GraphStats;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Cap on the unblocked-ID list carried by a what-if delta.
const WHAT_IF_ID_CAP: usize = 10;

/// Minutes in a working day, used to convert estimates into days saved.
const MINUTES_PER_DAY: f64 = 480.0;

/// Map a composite score onto a priority bucket.
pub fn suggest_priority(score: f64) -> i32 {
    if score >= 0.7 {
        0
    } else if score >= 0.5 {
        1
    } else if score >= 0.3 {
        2
    } else if score >= 0.15 {
        3
    } else {
        4
    }
}

/// Midpoint of the score band a priority is expected to live in.
pub fn expected_score(priority: i32) -> f64 {
    match priority {
        i32::MIN..=0 => 0.85,
        1 => 0.60,
        2 => 0.40,
        3 => 0.225,
        _ => 0.075,
    }
}

/// Estimated consequences of closing one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhatIfDelta {
    pub direct_unblocks: usize,
    pub transitive_unblocks: usize,
    /// How many of the direct unblocks were sitting in `blocked` status.
    pub blocked_reduction: usize,
    /// Critical-path depth normalized to [0, 1].
    pub depth_reduction: f64,
    pub estimated_days_saved: f64,
    pub parallelization_gain: usize,
    /// Direct then transitive unblock IDs, capped at ten.
    pub unblocked_ids: Vec<String>,
    pub explanation: String,
}

/// A suggested priority change for one issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorityRecommendation {
    pub id: String,
    pub current_priority: i32,
    pub suggested_priority: i32,
    pub confidence: f64,
    pub score: f64,
    /// Up to three short strings naming the triggered signals.
    pub reasoning: Vec<String>,
    pub what_if: WhatIfDelta,
}

/// Cascade of the unblocks relation from `id`, with a visited set.
pub fn what_if_close(
    id: &str,
    issues: &[Issue],
    unblocks_map: &HashMap<String, Vec<String>>,
    critical_path_depth: usize,
    default_minutes: i64,
) -> WhatIfDelta {
    let index: FxHashMap<&str, &Issue> = issues.iter().map(|i| (i.id.as_str(), i)).collect();
    let empty: Vec<String> = Vec::new();
    let direct = unblocks_map.get(id).unwrap_or(&empty);

    let mut visited: FxHashSet<&str> = FxHashSet::default();
    visited.insert(id);
    let mut reached: Vec<&str> = Vec::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for d in direct {
        if visited.insert(d.as_str()) {
            queue.push_back(d.as_str());
        }
    }
    while let Some(current) = queue.pop_front() {
        reached.push(current);
        for next in unblocks_map.get(current).unwrap_or(&empty) {
            if visited.insert(next.as_str()) {
                queue.push_back(next.as_str());
            }
        }
    }

    let direct_unblocks = direct.len();
    let transitive_unblocks = reached.len().saturating_sub(direct_unblocks);
    let blocked_reduction = direct
        .iter()
        .filter(|d| index.get(d.as_str()).is_some_and(|i| i.status == Status::Blocked))
        .count();
    let total_minutes: i64 = reached
        .iter()
        .map(|r| {
            index
                .get(r)
                .and_then(|i| i.estimated_minutes)
                .unwrap_or(default_minutes)
        })
        .sum();
    let estimated_days_saved = total_minutes as f64 / MINUTES_PER_DAY;
    let depth_reduction = (critical_path_depth as f64 / 10.0).min(1.0);

    let mut unblocked_ids: Vec<String> = reached.iter().map(|s| s.to_string()).collect();
    unblocked_ids.truncate(WHAT_IF_ID_CAP);

    let explanation = if direct_unblocks == 0 {
        format!("closing {id} unblocks nothing directly")
    } else {
        format!(
            "closing {id} unblocks {direct_unblocks} issue(s) directly and {transitive_unblocks} more transitively, saving an estimated {estimated_days_saved:.1} days"
        )
    };

    WhatIfDelta {
        direct_unblocks,
        transitive_unblocks,
        blocked_reduction,
        depth_reduction,
        estimated_days_saved,
        parallelization_gain: direct_unblocks.saturating_sub(1),
        unblocked_ids,
        explanation,
    }
}

/// Derive priority recommendations from impact scores.
///
/// Emits one entry per scored issue whose suggested priority bucket differs
/// from its current one, ordered by confidence descending, then score, then
/// ID.
pub fn recommend(
    issues: &[Issue],
    stats: &GraphStats,
    scores: &[ImpactScore],
) -> Vec<PriorityRecommendation> {
    let metrics = stats.phase2();
    let unblocks_map = compute_unblocks(issues);
    let index: FxHashMap<&str, &Issue> = issues.iter().map(|i| (i.id.as_str(), i)).collect();
    let articulation: FxHashSet<&str> = metrics
        .articulation_points
        .iter()
        .map(String::as_str)
        .collect();
    let max_core = metrics.core_number.values().copied().max().unwrap_or(0);

    let mut recommendations: Vec<PriorityRecommendation> = Vec::new();
    for score in scores {
        let Some(&issue) = index.get(score.id.as_str()) else {
            continue;
        };
        let suggested = suggest_priority(score.score);
        let current_bucket = issue.priority.clamp(0, 4);
        if suggested == current_bucket {
            continue;
        }

        let candidates = [
            (score.components.pagerank, "high dependency-graph centrality"),
            (score.components.betweenness, "sits on many blocking paths"),
            (score.components.blocker_ratio, "heavily blocked by other issues"),
            (score.components.staleness, "has gone stale"),
            (score.components.time_to_impact, "finishing it pays off quickly"),
            (score.components.urgency, "urgent by label or age"),
            (score.components.risk, "volatile or risky"),
        ];
        let mut triggered: Vec<(f64, &str)> = candidates
            .iter()
            .copied()
            .filter(|(value, _)| *value >= 0.5)
            .collect();
        triggered.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        let base = triggered.len() as f64 / 7.0;
        let strength_bonus = if triggered.is_empty() {
            0.0
        } else {
            0.3 * triggered.iter().map(|(v, _)| v).sum::<f64>() / triggered.len() as f64
        };
        let delta_bonus = if (score.score - expected_score(issue.priority)).abs() >= 0.15 {
            0.2
        } else {
            0.0
        };
        let confidence = (base + strength_bonus + delta_bonus).min(1.0);

        let mut reasoning: Vec<String> =
            triggered.iter().map(|(_, text)| text.to_string()).collect();
        if articulation.contains(score.id.as_str()) {
            reasoning.push("sole connector between parts of the dependency graph".to_string());
        }
        if max_core > 0
            && metrics.core_number.get(&score.id).copied().unwrap_or(0) == max_core
        {
            reasoning.push("sits in the densest dependency cluster".to_string());
        }
        if stats.edge_count > 0 && metrics.slack.get(&score.id).copied().unwrap_or(1) == 0 {
            reasoning.push("on the critical path with zero slack".to_string());
        }
        reasoning.truncate(3);

        let depth = metrics.critical_path.get(&score.id).copied().unwrap_or(0);
        let what_if = what_if_close(
            &score.id,
            issues,
            &unblocks_map,
            depth,
            stats.config.default_estimated_minutes,
        );

        recommendations.push(PriorityRecommendation {
            id: score.id.clone(),
            current_priority: issue.priority,
            suggested_priority: suggested,
            confidence,
            score: score.score,
            reasoning,
            what_if,
        });
    }

    recommendations.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| {
                b.score
                    .partial_cmp(&a.score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .then_with(|| a.id.cmp(&b.id))
    });
    debug!(count = recommendations.len(), "priority recommendations built");
    recommendations
}
