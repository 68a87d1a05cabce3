use crate::impact::score_issues;
use crate::recommend::{recommend, PriorityRecommendation};
use crate::signals::staleness;
use crate::unblocks::{actionable_issues, compute_unblocks, open_blockers};
use crate::velocity::{compute_velocity, Velocity};
use chrono::{DateTime, Utc};
use issuegraph_core::{Issue, Status};
use issuegraph_graph::GraphStats;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use tracing::info;

/// How many weekly buckets the embedded velocity report carries.
const VELOCITY_WEEKS: usize = 8;

/// Result-set sizing for a triage run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriageOptions {
    pub top_n: usize,
    pub quick_win_n: usize,
    pub blocker_n: usize,
}

impl Default for TriageOptions {
    fn default() -> Self {
        Self {
            top_n: 10,
            quick_win_n: 5,
            blocker_n: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageMeta {
    pub version: String,
    pub generated_at: DateTime<Utc>,
    pub issue_count: usize,
    pub compute_time_ms: u64,
    pub phase2_ready: bool,
}

/// At-a-glance counts and the top picks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickRef {
    pub open: usize,
    pub actionable: usize,
    pub blocked: usize,
    pub in_progress: usize,
    pub top_picks: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriageAction {
    Work,
    Review,
    Unblock,
}

/// A priority recommendation dressed for presentation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageRecommendation {
    pub recommendation: PriorityRecommendation,
    pub action: TriageAction,
    /// Open blockers of this issue; empty when it is actionable.
    pub blocked_by: Vec<String>,
    /// Copy-paste helpers; opaque to the core.
    pub commands: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuickWin {
    pub id: String,
    pub score: f64,
    pub unblocks_count: usize,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockerItem {
    pub id: String,
    pub unblocks: Vec<String>,
    pub actionable: bool,
    pub open_blockers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphHealth {
    pub nodes: usize,
    pub edges: usize,
    pub density: f64,
    pub has_cycles: bool,
    pub cycle_count: usize,
    pub phase2_ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaleIssue {
    pub id: String,
    pub days_since_update: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StalenessReport {
    pub threshold_days: i64,
    pub stale_count: usize,
    /// Stalest first.
    pub stalest: Vec<StaleIssue>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectHealth {
    pub by_status: HashMap<String, usize>,
    pub by_type: HashMap<String, usize>,
    pub by_priority: HashMap<String, usize>,
    pub graph: GraphHealth,
    pub velocity: Option<Velocity>,
    pub staleness: Option<StalenessReport>,
}

/// Everything a triage view needs, assembled in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriageResult {
    pub meta: TriageMeta,
    pub quick_ref: QuickRef,
    pub recommendations: Vec<TriageRecommendation>,
    pub quick_wins: Vec<QuickWin>,
    pub blockers: Vec<BlockerItem>,
    pub health: ProjectHealth,
}

fn command_hints(rec: &PriorityRecommendation) -> Vec<String> {
    vec![
        format!("issue show {}", rec.id),
        format!(
            "issue update {} --priority {}",
            rec.id, rec.suggested_priority
        ),
    ]
}

/// Assemble a full triage report. Waits for the centrality bundle before
/// scoring.
pub fn triage(
    issues: &[Issue],
    stats: &GraphStats,
    now: DateTime<Utc>,
    options: &TriageOptions,
) -> TriageResult {
    let started = Instant::now();
    stats.wait_ready();

    let scores = score_issues(issues, stats, now);
    let recommendations = recommend(issues, stats, &scores);
    let unblocks_map = compute_unblocks(issues);
    let actionable = actionable_issues(issues);
    let index: HashMap<&str, &Issue> = issues.iter().map(|i| (i.id.as_str(), i)).collect();

    let top_picks: Vec<String> = recommendations
        .iter()
        .take(3)
        .map(|r| r.id.clone())
        .collect();

    let detailed: Vec<TriageRecommendation> = recommendations
        .iter()
        .take(options.top_n)
        .map(|rec| {
            let action = triage_action(rec, index.get(rec.id.as_str()).copied(), now);
            TriageRecommendation {
                action,
                blocked_by: open_blockers(issues, &rec.id),
                commands: command_hints(rec),
                recommendation: rec.clone(),
            }
        })
        .collect();

    let quick_wins = quick_wins(issues, stats, &unblocks_map, options.quick_win_n);
    let blockers = blocker_items(issues, &unblocks_map, &actionable, options.blocker_n);

    let mut by_status: HashMap<String, usize> = HashMap::new();
    let mut by_type: HashMap<String, usize> = HashMap::new();
    let mut by_priority: HashMap<String, usize> = HashMap::new();
    for issue in issues {
        *by_status.entry(issue.status.to_string()).or_insert(0) += 1;
        *by_type.entry(issue.issue_type.to_string()).or_insert(0) += 1;
        *by_priority
            .entry(format!("P{}", issue.priority.max(0)))
            .or_insert(0) += 1;
    }

    let status_count =
        |status: Status| issues.iter().filter(|i| i.status == status).count();

    let threshold = stats.config.stale_threshold_days;
    let mut stalest: Vec<StaleIssue> = issues
        .iter()
        .filter(|i| !i.is_closed() && i.updated_at.timestamp() != 0)
        .filter_map(|i| {
            let days = (now - i.updated_at).num_days();
            (days >= threshold).then(|| StaleIssue {
                id: i.id.clone(),
                days_since_update: days,
            })
        })
        .collect();
    stalest.sort_by(|a, b| {
        b.days_since_update
            .cmp(&a.days_since_update)
            .then_with(|| a.id.cmp(&b.id))
    });
    let staleness_report = StalenessReport {
        threshold_days: threshold,
        stale_count: stalest.len(),
        stalest,
    };

    let result = TriageResult {
        meta: TriageMeta {
            version: env!("CARGO_PKG_VERSION").to_string(),
            generated_at: now,
            issue_count: issues.len(),
            compute_time_ms: started.elapsed().as_millis() as u64,
            phase2_ready: stats.is_ready(),
        },
        quick_ref: QuickRef {
            open: status_count(Status::Open),
            actionable: actionable.len(),
            blocked: status_count(Status::Blocked),
            in_progress: status_count(Status::InProgress),
            top_picks,
        },
        recommendations: detailed,
        quick_wins,
        blockers,
        health: ProjectHealth {
            by_status,
            by_type,
            by_priority,
            graph: GraphHealth {
                nodes: stats.node_count,
                edges: stats.edge_count,
                density: stats.density,
                has_cycles: !stats.cycles.is_empty(),
                cycle_count: stats.cycles.len(),
                phase2_ready: stats.is_ready(),
            },
            velocity: Some(compute_velocity(issues, now, VELOCITY_WEEKS)),
            staleness: Some(staleness_report),
        },
    };
    info!(
        recommendations = result.recommendations.len(),
        quick_wins = result.quick_wins.len(),
        elapsed_ms = result.meta.compute_time_ms,
        "triage assembled"
    );
    result
}

/// Action policy: unblocking beats reviewing beats plain work.
fn triage_action(
    rec: &PriorityRecommendation,
    issue: Option<&Issue>,
    now: DateTime<Utc>,
) -> TriageAction {
    if rec.what_if.direct_unblocks >= 3 {
        return TriageAction::Unblock;
    }
    if let Some(issue) = issue {
        if issue.status == Status::InProgress && staleness(issue, now).value >= 0.3 {
            return TriageAction::Review;
        }
    }
    TriageAction::Work
}

fn quick_wins(
    issues: &[Issue],
    stats: &GraphStats,
    unblocks_map: &HashMap<String, Vec<String>>,
    limit: usize,
) -> Vec<QuickWin> {
    let max_unblocks = unblocks_map.values().map(Vec::len).max().unwrap_or(0);
    let max_in_degree = stats.in_degree.values().copied().max().unwrap_or(0);

    let mut wins: Vec<QuickWin> = issues
        .iter()
        .filter(|i| !i.is_closed())
        .filter_map(|issue| {
            let unblocks_count = unblocks_map.get(&issue.id).map(Vec::len).unwrap_or(0);
            let unblocks_norm = if max_unblocks > 0 {
                unblocks_count as f64 / max_unblocks as f64
            } else {
                0.0
            };
            let in_degree = stats.in_degree.get(&issue.id).copied().unwrap_or(0);
            let blocker_ratio = if max_in_degree > 0 {
                in_degree as f64 / max_in_degree as f64
            } else {
                0.0
            };

            let mut score = 0.5 * unblocks_norm;
            let mut reasons = Vec::new();
            if unblocks_count > 0 {
                reasons.push(format!("frees {unblocks_count} issue(s)"));
            }
            if blocker_ratio <= 0.2 {
                score += 0.3;
                reasons.push("almost nothing blocks it".to_string());
            }
            if issue.priority >= 3 {
                score += 0.2;
                reasons.push("low priority, cheap to clear".to_string());
            }

            (score > 0.0).then(|| QuickWin {
                id: issue.id.clone(),
                score,
                unblocks_count,
                reasons,
            })
        })
        .collect();

    wins.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    wins.truncate(limit);
    wins
}

fn blocker_items(
    issues: &[Issue],
    unblocks_map: &HashMap<String, Vec<String>>,
    actionable: &[String],
    limit: usize,
) -> Vec<BlockerItem> {
    let mut items: Vec<BlockerItem> = unblocks_map
        .iter()
        .filter(|(_, unblocks)| !unblocks.is_empty())
        .map(|(id, unblocks)| BlockerItem {
            id: id.clone(),
            unblocks: unblocks.clone(),
            actionable: actionable.binary_search(id).is_ok(),
            open_blockers: open_blockers(issues, id),
        })
        .collect();
    items.sort_by(|a, b| {
        b.unblocks
            .len()
            .cmp(&a.unblocks.len())
            .then_with(|| a.id.cmp(&b.id))
    });
    items.truncate(limit);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use issuegraph_core::{AnalysisConfig, CancellationToken, DependencyType};
    use issuegraph_graph::analyze;

    fn run_triage(issues: &[Issue]) -> TriageResult {
        let stats = analyze(issues, AnalysisConfig::default(), CancellationToken::new());
        triage(issues, &stats, Utc::now(), &TriageOptions::default())
    }

    #[test]
    fn quick_ref_counts_statuses_and_actionability() {
        let issues = vec![
            Issue::new("a", "ready"),
            Issue::new("b", "waiting")
                .with_status(Status::Blocked)
                .with_dependency("a", DependencyType::Blocks),
            Issue::new("c", "underway").with_status(Status::InProgress),
            Issue::new("d", "done").with_status(Status::Closed),
        ];
        let result = run_triage(&issues);
        assert_eq!(result.meta.issue_count, 4);
        assert_eq!(result.quick_ref.open, 1);
        assert_eq!(result.quick_ref.blocked, 1);
        assert_eq!(result.quick_ref.in_progress, 1);
        assert_eq!(result.quick_ref.actionable, 2); // a and c
        assert!(result.meta.phase2_ready);
    }

    #[test]
    fn unblock_action_kicks_in_at_three_dependents() {
        let mut issues = vec![Issue::new("gate", "holds the release").with_priority(0)];
        for i in 0..3 {
            issues.push(
                Issue::new(format!("w{i}"), "waiting")
                    .with_status(Status::Blocked)
                    .with_dependency("gate", DependencyType::Blocks),
            );
        }
        let result = run_triage(&issues);
        let gate = result
            .recommendations
            .iter()
            .find(|r| r.recommendation.id == "gate");
        if let Some(gate) = gate {
            assert_eq!(gate.action, TriageAction::Unblock);
            assert!(gate.blocked_by.is_empty());
            assert!(!gate.commands.is_empty());
        }
        // Whether or not the priority suggestion fired, the blocker list
        // must lead with the gate.
        assert_eq!(result.blockers[0].id, "gate");
        assert_eq!(result.blockers[0].unblocks.len(), 3);
        assert!(result.blockers[0].actionable);
    }

    #[test]
    fn quick_wins_prefer_unblocking_low_effort_issues() {
        let issues = vec![
            Issue::new("easy", "free and freeing").with_priority(3),
            Issue::new("dep", "waits")
                .with_dependency("easy", DependencyType::Blocks),
        ];
        let result = run_triage(&issues);
        assert!(!result.quick_wins.is_empty());
        assert_eq!(result.quick_wins[0].id, "easy");
        assert!(result.quick_wins[0].score >= 0.9);
    }

    #[test]
    fn health_reports_graph_and_staleness() {
        let now = Utc::now();
        let mut old = Issue::new("dusty", "forgotten");
        old.created_at = now - chrono::Duration::days(60);
        old.updated_at = now - chrono::Duration::days(40);
        let issues = vec![
            old,
            Issue::new("fresh", "new").with_dependency("dusty", DependencyType::Blocks),
        ];
        let stats = analyze(&issues, AnalysisConfig::default(), CancellationToken::new());
        let result = triage(&issues, &stats, now, &TriageOptions::default());

        assert_eq!(result.health.graph.nodes, 2);
        assert_eq!(result.health.graph.edges, 1);
        assert!(!result.health.graph.has_cycles);
        assert_eq!(result.health.by_status["open"], 2);

        let staleness = result.health.staleness.as_ref().unwrap();
        assert_eq!(staleness.stale_count, 1);
        assert_eq!(staleness.stalest[0].id, "dusty");
        assert!(result.health.velocity.is_some());
    }

    #[test]
    fn result_sizes_respect_options() {
        let mut issues = Vec::new();
        for i in 0..20 {
            issues.push(Issue::new(format!("i{i:02}"), "bulk").with_priority(0));
        }
        let stats = analyze(&issues, AnalysisConfig::default(), CancellationToken::new());
        let options = TriageOptions {
            top_n: 4,
            quick_win_n: 2,
            blocker_n: 1,
        };
        let result = triage(&issues, &stats, Utc::now(), &options);
        assert!(result.recommendations.len() <= 4);
        assert!(result.quick_wins.len() <= 2);
        assert!(result.blockers.len() <= 1);
        assert!(result.quick_ref.top_picks.len() <= 3);
    }
}
