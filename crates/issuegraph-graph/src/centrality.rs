use crate::builder::BlockingGraph;
use rayon::prelude::*;
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Iteration caps shared by the power-iteration metrics (eigenvector, HITS).
const POWER_MAX_ITER: usize = 100;
const POWER_TOLERANCE: f64 = 1e-6;

fn to_map(g: &BlockingGraph, values: &[f64]) -> HashMap<String, f64> {
    (0..g.node_count())
        .map(|v| (g.id(v).to_string(), values[v]))
        .collect()
}

/// PageRank over the blocking graph.
///
/// Returns the score map and whether the iteration converged within
/// `max_iter`. Scores are raw (they sum to roughly 1); normalization is the
/// consumer's concern.
pub fn pagerank(
    g: &BlockingGraph,
    damping: f64,
    tolerance: f64,
    max_iter: usize,
) -> (HashMap<String, f64>, bool) {
    let n = g.node_count();
    if n == 0 {
        return (HashMap::new(), true);
    }

    let base = (1.0 - damping) / n as f64;
    let mut scores = vec![1.0 / n as f64; n];

    for iteration in 0..max_iter {
        let mut next = vec![0.0; n];
        let mut max_delta: f64 = 0.0;
        for v in 0..n {
            let incoming: f64 = g
                .blockers(v)
                .iter()
                .map(|&u| scores[u] / g.dependents(u).len().max(1) as f64)
                .sum();
            next[v] = base + damping * incoming;
            max_delta = max_delta.max((next[v] - scores[v]).abs());
        }
        scores = next;
        if max_delta < tolerance {
            debug!(iterations = iteration + 1, "pagerank converged");
            return (to_map(g, &scores), true);
        }
    }
    (to_map(g, &scores), false)
}

/// Brandes betweenness centrality, normalized by `(n-1)(n-2)` for directed
/// graphs. Sources are fanned out over the rayon pool.
pub fn betweenness(g: &BlockingGraph) -> HashMap<String, f64> {
    let n = g.node_count();
    if n == 0 {
        return HashMap::new();
    }

    let totals: Vec<f64> = (0..n)
        .into_par_iter()
        .map(|s| brandes_single_source(g, s))
        .reduce(
            || vec![0.0; n],
            |mut acc, partial| {
                for (a, p) in acc.iter_mut().zip(partial) {
                    *a += p;
                }
                acc
            },
        );

    let scale = if n > 2 {
        1.0 / ((n - 1) * (n - 2)) as f64
    } else {
        1.0
    };
    let scaled: Vec<f64> = totals.into_iter().map(|x| x * scale).collect();
    to_map(g, &scaled)
}

fn brandes_single_source(g: &BlockingGraph, source: usize) -> Vec<f64> {
    let n = g.node_count();
    let mut finish_order: Vec<usize> = Vec::with_capacity(n);
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut sigma = vec![0.0f64; n];
    let mut dist = vec![-1i64; n];
    let mut queue = VecDeque::new();

    sigma[source] = 1.0;
    dist[source] = 0;
    queue.push_back(source);

    while let Some(v) = queue.pop_front() {
        finish_order.push(v);
        for &w in g.dependents(v) {
            if dist[w] < 0 {
                dist[w] = dist[v] + 1;
                queue.push_back(w);
            }
            if dist[w] == dist[v] + 1 {
                sigma[w] += sigma[v];
                predecessors[w].push(v);
            }
        }
    }

    let mut delta = vec![0.0f64; n];
    let mut partial = vec![0.0f64; n];
    for &w in finish_order.iter().rev() {
        for &v in &predecessors[w] {
            delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
        }
        if w != source {
            partial[w] += delta[w];
        }
    }
    partial
}

/// Eigenvector centrality via power iteration on incoming edges, with L2
/// normalization per sweep.
///
/// Returns the score map and a convergence flag; a graph whose iteration
/// collapses to the zero vector (no cycles feeding mass back) reports zeros
/// and counts as converged.
pub fn eigenvector(g: &BlockingGraph) -> (HashMap<String, f64>, bool) {
    let n = g.node_count();
    if n == 0 {
        return (HashMap::new(), true);
    }

    let mut scores = vec![1.0 / (n as f64).sqrt(); n];
    for iteration in 0..POWER_MAX_ITER {
        let mut next = vec![0.0; n];
        for v in 0..n {
            next[v] = g.blockers(v).iter().map(|&u| scores[u]).sum();
        }
        let norm = next.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm < 1e-12 {
            return (to_map(g, &vec![0.0; n]), true);
        }
        for x in &mut next {
            *x /= norm;
        }
        let max_delta = next
            .iter()
            .zip(&scores)
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        scores = next;
        if max_delta < POWER_TOLERANCE {
            debug!(iterations = iteration + 1, "eigenvector converged");
            return (to_map(g, &scores), true);
        }
    }
    (to_map(g, &scores), false)
}

/// HITS hubs and authorities, max-normalized per sweep.
///
/// An authority is an issue pointed at by strong hubs (heavily blocked); a
/// hub is an issue pointing at strong authorities (blocking a lot).
pub fn hits(g: &BlockingGraph) -> (HashMap<String, f64>, HashMap<String, f64>, bool) {
    let n = g.node_count();
    if n == 0 {
        return (HashMap::new(), HashMap::new(), true);
    }

    let mut authority = vec![1.0f64; n];
    let mut hub = vec![1.0f64; n];

    for iteration in 0..POWER_MAX_ITER {
        let mut next_authority = vec![0.0; n];
        for v in 0..n {
            next_authority[v] = g.blockers(v).iter().map(|&u| hub[u]).sum();
        }
        let mut next_hub = vec![0.0; n];
        for v in 0..n {
            next_hub[v] = g.dependents(v).iter().map(|&w| next_authority[w]).sum();
        }
        normalize_max(&mut next_authority);
        normalize_max(&mut next_hub);

        let max_delta = next_authority
            .iter()
            .zip(&authority)
            .chain(next_hub.iter().zip(&hub))
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f64, f64::max);
        authority = next_authority;
        hub = next_hub;
        if max_delta < POWER_TOLERANCE {
            debug!(iterations = iteration + 1, "hits converged");
            return (to_map(g, &hub), to_map(g, &authority), true);
        }
    }
    (to_map(g, &hub), to_map(g, &authority), false)
}

fn normalize_max(values: &mut [f64]) {
    let max = values.iter().copied().fold(0.0f64, f64::max);
    if max > 0.0 {
        for v in values.iter_mut() {
            *v /= max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use issuegraph_core::{DependencyType, Issue};

    /// Edges a -> b -> c in blocker -> dependent direction.
    fn linear() -> BlockingGraph {
        BlockingGraph::build(&[
            Issue::new("a", "root"),
            Issue::new("b", "middle").with_dependency("a", DependencyType::Blocks),
            Issue::new("c", "leaf").with_dependency("b", DependencyType::Blocks),
        ])
    }

    /// Star: hub -> s1, hub -> s2, hub -> s3.
    fn star() -> BlockingGraph {
        BlockingGraph::build(&[
            Issue::new("hub", "blocks everything"),
            Issue::new("s1", "spoke").with_dependency("hub", DependencyType::Blocks),
            Issue::new("s2", "spoke").with_dependency("hub", DependencyType::Blocks),
            Issue::new("s3", "spoke").with_dependency("hub", DependencyType::Blocks),
        ])
    }

    #[test]
    fn pagerank_empty_graph() {
        let g = BlockingGraph::build(&[]);
        let (scores, converged) = pagerank(&g, 0.85, 1e-6, 100);
        assert!(scores.is_empty());
        assert!(converged);
    }

    #[test]
    fn pagerank_accumulates_downstream() {
        let (scores, converged) = pagerank(&linear(), 0.85, 1e-6, 100);
        assert!(converged);
        assert!(scores["c"] > scores["b"]);
        assert!(scores["b"] > scores["a"]);
    }

    #[test]
    fn pagerank_reports_non_convergence() {
        let (_, converged) = pagerank(&linear(), 0.85, 1e-12, 1);
        assert!(!converged);
    }

    #[test]
    fn betweenness_peaks_on_the_middle_node() {
        let scores = betweenness(&linear());
        assert!(scores["b"] > scores["a"]);
        assert!(scores["b"] > scores["c"]);
        // Exactly one shortest path a -> c passes through b; scale 1/((3-1)(3-2)).
        assert_relative_eq!(scores["b"], 0.5, epsilon = 1e-12);
    }

    #[test]
    fn eigenvector_zeroes_out_on_a_dag_star() {
        // No feedback loops: repeated application starves every node.
        let (scores, converged) = eigenvector(&star());
        assert!(converged);
        assert!(scores.values().all(|&v| v == 0.0));
    }

    #[test]
    fn eigenvector_favors_cycle_members() {
        let g = BlockingGraph::build(&[
            Issue::new("a", "in ring").with_dependency("b", DependencyType::Blocks),
            Issue::new("b", "in ring").with_dependency("a", DependencyType::Blocks),
            Issue::new("c", "dangler").with_dependency("a", DependencyType::Blocks),
        ]);
        let (scores, converged) = eigenvector(&g);
        assert!(converged);
        assert!(scores["a"] > 0.0);
        assert!(scores["b"] > 0.0);
    }

    #[test]
    fn hits_separates_hubs_from_authorities() {
        let (hubs, authorities, converged) = hits(&star());
        assert!(converged);
        assert!(hubs["hub"] > hubs["s1"]);
        assert!(authorities["s1"] > authorities["hub"]);
        assert_relative_eq!(authorities["s1"], authorities["s3"], epsilon = 1e-9);
    }
}
