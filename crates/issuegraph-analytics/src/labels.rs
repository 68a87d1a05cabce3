use crate::signals::staleness;
use chrono::{DateTime, Duration, Utc};
use issuegraph_core::{AnalysisConfig, Issue, Status};
use issuegraph_graph::{pagerank, BlockingGraph};
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

/// Per-label issue counts broken down by status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelCount {
    pub label: String,
    pub total: usize,
    pub open: usize,
    pub in_progress: usize,
    pub blocked: usize,
    pub closed: usize,
}

/// The issues carrying a label plus everything one blocking hop away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelSubgraph {
    pub label: String,
    /// Issues carrying the label, sorted by ID.
    pub core: Vec<String>,
    /// One-hop blocking neighbors of the core, sorted by ID.
    pub dependencies: Vec<String>,
    /// Blocker -> dependents adjacency restricted to the subgraph.
    pub adjacency: HashMap<String, Vec<String>>,
    /// No incoming edges within the subgraph.
    pub roots: Vec<String>,
    /// No outgoing edges within the subgraph.
    pub leaves: Vec<String>,
}

/// PageRank over one label's subgraph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelPageRank {
    pub label: String,
    pub raw: HashMap<String, f64>,
    /// Min-max normalized to [0, 1].
    pub normalized: HashMap<String, f64>,
    /// Raw scores restricted to issues actually carrying the label.
    pub core_only: HashMap<String, f64>,
    /// Highest-ranked issue IDs with raw scores, descending.
    pub top_issues: Vec<(String, f64)>,
}

/// Composite "needs attention" score for one label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAttention {
    pub label: String,
    /// Mean staleness of the label's non-closed issues.
    pub staleness_factor: f64,
    /// Share of the label's issues closed in the last 30 days.
    pub velocity_factor: f64,
    /// Blocking edges from this label into other labels.
    pub block_impact: usize,
    pub attention: f64,
    /// Attention min-max normalized across all labels.
    pub normalized: f64,
}

/// Blocking-edge flow between labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrossLabelFlow {
    /// Sorted label vocabulary; indexes the matrix on both axes.
    pub labels: Vec<String>,
    /// `matrix[a][b]` counts blocking edges from label `a` to label `b`.
    pub matrix: Vec<Vec<usize>>,
    /// Labels with the highest outgoing flow.
    pub bottlenecks: Vec<String>,
}

/// Top-level label report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelAnalysisResult {
    pub labels: Vec<LabelCount>,
    pub attention: Vec<LabelAttention>,
    pub flow: CrossLabelFlow,
}

fn unique_labels(issue: &Issue) -> BTreeSet<&str> {
    issue
        .labels
        .iter()
        .map(String::as_str)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Unique labels with per-status counts, sorted by total descending then
/// alphabetically.
pub fn extract_labels(issues: &[Issue]) -> Vec<LabelCount> {
    let mut counts: FxHashMap<&str, LabelCount> = FxHashMap::default();
    for issue in issues {
        for label in unique_labels(issue) {
            let entry = counts.entry(label).or_insert_with(|| LabelCount {
                label: label.to_string(),
                total: 0,
                open: 0,
                in_progress: 0,
                blocked: 0,
                closed: 0,
            });
            entry.total += 1;
            match issue.status {
                Status::Open => entry.open += 1,
                Status::InProgress => entry.in_progress += 1,
                Status::Blocked => entry.blocked += 1,
                Status::Closed => entry.closed += 1,
            }
        }
    }
    let mut labels: Vec<LabelCount> = counts.into_values().collect();
    labels.sort_by(|a, b| b.total.cmp(&a.total).then_with(|| a.label.cmp(&b.label)));
    labels
}

/// Core issues carrying `label` plus their one-hop blocking neighborhood.
pub fn label_subgraph(issues: &[Issue], label: &str) -> LabelSubgraph {
    let graph = BlockingGraph::build(issues);
    let core_nodes: FxHashSet<usize> = issues
        .iter()
        .filter(|i| unique_labels(i).contains(label))
        .filter_map(|i| graph.node(&i.id))
        .collect();

    let mut vertex_set = core_nodes.clone();
    for &v in &core_nodes {
        vertex_set.extend(graph.dependents(v).iter().copied());
        vertex_set.extend(graph.blockers(v).iter().copied());
    }

    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();
    let mut roots = Vec::new();
    let mut leaves = Vec::new();
    for &v in &vertex_set {
        let mut dependents: Vec<String> = graph
            .dependents(v)
            .iter()
            .copied()
            .filter(|w| vertex_set.contains(w))
            .map(|w| graph.id(w).to_string())
            .collect();
        dependents.sort();
        let has_incoming = graph
            .blockers(v)
            .iter()
            .any(|u| vertex_set.contains(u));
        if !has_incoming {
            roots.push(graph.id(v).to_string());
        }
        if dependents.is_empty() {
            leaves.push(graph.id(v).to_string());
        }
        adjacency.insert(graph.id(v).to_string(), dependents);
    }
    roots.sort();
    leaves.sort();

    let mut core: Vec<String> = core_nodes.iter().map(|&v| graph.id(v).to_string()).collect();
    core.sort();
    let mut dependencies: Vec<String> = vertex_set
        .difference(&core_nodes)
        .map(|&v| graph.id(v).to_string())
        .collect();
    dependencies.sort();

    LabelSubgraph {
        label: label.to_string(),
        core,
        dependencies,
        adjacency,
        roots,
        leaves,
    }
}

/// PageRank restricted to a label's subgraph.
pub fn label_pagerank(issues: &[Issue], label: &str, config: &AnalysisConfig) -> LabelPageRank {
    let subgraph = label_subgraph(issues, label);
    let vertex_set: FxHashSet<&str> = subgraph
        .core
        .iter()
        .chain(subgraph.dependencies.iter())
        .map(String::as_str)
        .collect();

    // Re-building from the filtered issue slice keeps exactly the subgraph
    // edges: dangling references are dropped by the builder.
    let sub_issues: Vec<Issue> = issues
        .iter()
        .filter(|i| vertex_set.contains(i.id.as_str()))
        .cloned()
        .collect();
    let graph = BlockingGraph::build(&sub_issues);
    let (raw, _) = pagerank(
        &graph,
        config.pagerank_damping,
        config.pagerank_tol,
        config.pagerank_max_iter,
    );

    let min = raw.values().copied().fold(f64::INFINITY, f64::min);
    let max = raw.values().copied().fold(f64::NEG_INFINITY, f64::max);
    let normalized: HashMap<String, f64> = if raw.is_empty() || max <= min {
        raw.keys().map(|k| (k.clone(), 0.0)).collect()
    } else {
        raw.iter()
            .map(|(k, &v)| (k.clone(), (v - min) / (max - min)))
            .collect()
    };

    let core_set: FxHashSet<&str> = subgraph.core.iter().map(String::as_str).collect();
    let core_only: HashMap<String, f64> = raw
        .iter()
        .filter(|(k, _)| core_set.contains(k.as_str()))
        .map(|(k, &v)| (k.clone(), v))
        .collect();

    let mut top_issues: Vec<(String, f64)> = raw.iter().map(|(k, &v)| (k.clone(), v)).collect();
    top_issues.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    top_issues.truncate(10);

    LabelPageRank {
        label: label.to_string(),
        raw,
        normalized,
        core_only,
        top_issues,
    }
}

/// Blocking-edge counts between labels, each distinct edge contributing one
/// count per endpoint-label pair. Closed endpoints contribute nothing.
pub fn cross_label_flow(issues: &[Issue]) -> CrossLabelFlow {
    let graph = BlockingGraph::build(issues);
    let index: FxHashMap<&str, &Issue> = issues.iter().map(|i| (i.id.as_str(), i)).collect();

    let vocabulary: BTreeSet<&str> = issues.iter().flat_map(unique_labels).collect();
    let labels: Vec<String> = vocabulary.iter().map(|l| l.to_string()).collect();
    let position: FxHashMap<&str, usize> = vocabulary
        .iter()
        .enumerate()
        .map(|(i, &l)| (l, i))
        .collect();

    let mut matrix = vec![vec![0usize; labels.len()]; labels.len()];
    for v in 0..graph.node_count() {
        let Some(&src) = index.get(graph.id(v)) else {
            continue;
        };
        if src.is_closed() {
            continue;
        }
        for &w in graph.dependents(v) {
            let Some(&dst) = index.get(graph.id(w)) else {
                continue;
            };
            if dst.is_closed() {
                continue;
            }
            // The builder already collapsed duplicate edges, and the label
            // sets are deduplicated, so each (edge, label pair) counts once.
            for src_label in unique_labels(src) {
                for dst_label in unique_labels(dst) {
                    matrix[position[src_label]][position[dst_label]] += 1;
                }
            }
        }
    }

    let mut outgoing: Vec<(usize, &String)> = labels
        .iter()
        .enumerate()
        .map(|(i, label)| (matrix[i].iter().sum::<usize>(), label))
        .collect();
    outgoing.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    let bottlenecks: Vec<String> = outgoing
        .into_iter()
        .filter(|(sum, _)| *sum > 0)
        .take(5)
        .map(|(_, label)| label.clone())
        .collect();

    CrossLabelFlow {
        labels,
        matrix,
        bottlenecks,
    }
}

/// Attention composite per label, sorted most-needy first.
pub fn attention_scores(issues: &[Issue], now: DateTime<Utc>) -> Vec<LabelAttention> {
    let flow = cross_label_flow(issues);
    let block_impact_of = |label: &str| -> usize {
        flow.labels
            .iter()
            .position(|l| l == label)
            .map(|i| {
                flow.matrix[i]
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, c)| c)
                    .sum()
            })
            .unwrap_or(0)
    };

    let counts = extract_labels(issues);
    let thirty_days = Duration::days(30);
    let mut raw: Vec<(String, f64, f64, usize)> = counts
        .iter()
        .map(|count| {
            let labelled: Vec<&Issue> = issues
                .iter()
                .filter(|i| unique_labels(i).contains(count.label.as_str()))
                .collect();

            let open: Vec<&Issue> = labelled
                .iter()
                .copied()
                .filter(|i| !i.is_closed())
                .collect();
            let staleness_factor = if open.is_empty() {
                0.0
            } else {
                open.iter().map(|&i| staleness(i, now).value).sum::<f64>() / open.len() as f64
            };

            let recently_closed = labelled
                .iter()
                .filter(|i| {
                    i.is_closed()
                        && i.closed_at
                            .map(|c| now - c <= thirty_days && now >= c)
                            .unwrap_or(false)
                })
                .count();
            let velocity_factor = recently_closed as f64 / labelled.len().max(1) as f64;

            let block_impact = block_impact_of(&count.label);
            (count.label.clone(), staleness_factor, velocity_factor, block_impact)
        })
        .collect();

    let max_impact = raw.iter().map(|r| r.3).max().unwrap_or(0);
    let mut attention: Vec<LabelAttention> = raw
        .drain(..)
        .map(|(label, staleness_factor, velocity_factor, block_impact)| {
            let impact_norm = if max_impact > 0 {
                block_impact as f64 / max_impact as f64
            } else {
                0.0
            };
            let score =
                0.4 * staleness_factor + 0.3 * (1.0 - velocity_factor) + 0.3 * impact_norm;
            LabelAttention {
                label,
                staleness_factor,
                velocity_factor,
                block_impact,
                attention: score,
                normalized: 0.0,
            }
        })
        .collect();

    let min = attention
        .iter()
        .map(|a| a.attention)
        .fold(f64::INFINITY, f64::min);
    let max = attention
        .iter()
        .map(|a| a.attention)
        .fold(f64::NEG_INFINITY, f64::max);
    if max > min {
        for entry in &mut attention {
            entry.normalized = (entry.attention - min) / (max - min);
        }
    }

    attention.sort_by(|a, b| {
        b.attention
            .partial_cmp(&a.attention)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.label.cmp(&b.label))
    });
    attention
}

/// Full label report: counts, attention ranking and cross-label flow.
pub fn analyze_labels(issues: &[Issue], now: DateTime<Utc>) -> LabelAnalysisResult {
    let result = LabelAnalysisResult {
        labels: extract_labels(issues),
        attention: attention_scores(issues, now),
        flow: cross_label_flow(issues),
    };
    debug!(labels = result.labels.len(), "label analysis complete");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use issuegraph_core::DependencyType;

    #[test]
    fn extraction_counts_by_status_and_sorts() {
        let issues = vec![
            Issue::new("a", "one").with_label("backend"),
            Issue::new("b", "two").with_label("backend").with_status(Status::Closed),
            Issue::new("c", "three").with_label("ui"),
            Issue::new("d", "four").with_label("").with_label("backend"),
        ];
        let labels = extract_labels(&issues);
        assert_eq!(labels.len(), 2);
        assert_eq!(labels[0].label, "backend");
        assert_eq!(labels[0].total, 3);
        assert_eq!(labels[0].closed, 1);
        assert_eq!(labels[1].label, "ui");
    }

    #[test]
    fn duplicate_labels_on_one_issue_count_once() {
        let issues = vec![Issue::new("a", "dup").with_label("x").with_label("x")];
        let labels = extract_labels(&issues);
        assert_eq!(labels[0].total, 1);
    }

    #[test]
    fn subgraph_includes_one_hop_neighbors() {
        // core: "in" (labelled). blocker "up" -> "in" -> dependent "down",
        // and "far" two hops away must stay out.
        let issues = vec![
            Issue::new("up", "blocker"),
            Issue::new("in", "core").with_label("epic-x")
                .with_dependency("up", DependencyType::Blocks),
            Issue::new("down", "dependent").with_dependency("in", DependencyType::Blocks),
            Issue::new("far", "distant").with_dependency("down", DependencyType::Blocks),
        ];
        let sub = label_subgraph(&issues, "epic-x");
        assert_eq!(sub.core, vec!["in"]);
        assert_eq!(sub.dependencies, vec!["down", "up"]);
        assert_eq!(sub.roots, vec!["up"]);
        assert_eq!(sub.leaves, vec!["down"]);
        assert_eq!(sub.adjacency["up"], vec!["in"]);
        assert_eq!(sub.adjacency["in"], vec!["down"]);
    }

    #[test]
    fn label_pagerank_normalizes_and_restricts() {
        let issues = vec![
            Issue::new("a", "core").with_label("area"),
            Issue::new("b", "core too").with_label("area")
                .with_dependency("a", DependencyType::Blocks),
            Issue::new("c", "hop").with_dependency("b", DependencyType::Blocks),
        ];
        let ranked = label_pagerank(&issues, "area", &AnalysisConfig::default());
        assert_eq!(ranked.raw.len(), 3);
        assert_eq!(ranked.core_only.len(), 2);
        assert!(ranked.normalized.values().all(|&v| (0.0..=1.0).contains(&v)));
        assert!(ranked
            .normalized
            .values()
            .any(|&v| (v - 1.0).abs() < 1e-9));
        assert_eq!(ranked.top_issues.len(), 3);
    }

    #[test]
    fn flow_counts_each_edge_once_per_label_pair() {
        let issues = vec![
            Issue::new("src", "from").with_label("alpha").with_label("alpha"),
            Issue::new("dst", "to")
                .with_label("beta")
                .with_dependency("src", DependencyType::Blocks)
                .with_dependency("src", DependencyType::Blocks),
        ];
        let flow = cross_label_flow(&issues);
        let a = flow.labels.iter().position(|l| l == "alpha").unwrap();
        let b = flow.labels.iter().position(|l| l == "beta").unwrap();
        assert_eq!(flow.matrix[a][b], 1);
        assert_eq!(flow.matrix[b][a], 0);
        assert_eq!(flow.bottlenecks, vec!["alpha"]);
    }

    #[test]
    fn closed_endpoints_contribute_no_flow() {
        let issues = vec![
            Issue::new("src", "from").with_label("alpha").with_status(Status::Closed),
            Issue::new("dst", "to")
                .with_label("beta")
                .with_dependency("src", DependencyType::Blocks),
        ];
        let flow = cross_label_flow(&issues);
        assert!(flow.matrix.iter().flatten().all(|&c| c == 0));
        assert!(flow.bottlenecks.is_empty());
    }

    #[test]
    fn stale_blocking_labels_rank_first_for_attention() {
        let now = Utc::now();
        let mut stale = Issue::new("old", "untouched").with_label("neglected");
        stale.created_at = now - Duration::days(120);
        stale.updated_at = now - Duration::days(90);

        let fresh = Issue::new("new", "just closed")
            .with_label("healthy")
            .with_status(Status::Closed);

        let scores = attention_scores(&[stale, fresh], now);
        assert_eq!(scores[0].label, "neglected");
        assert!(scores[0].attention > scores[1].attention);
        assert!((scores[0].normalized - 1.0).abs() < 1e-9);
    }
}
