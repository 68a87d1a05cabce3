use crate::builder::BlockingGraph;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

/// Per-issue out- and in-degrees over the blocking graph.
pub fn degree_maps(g: &BlockingGraph) -> (HashMap<String, usize>, HashMap<String, usize>) {
    let mut out_degree = HashMap::with_capacity(g.node_count());
    let mut in_degree = HashMap::with_capacity(g.node_count());
    for v in 0..g.node_count() {
        out_degree.insert(g.id(v).to_string(), g.dependents(v).len());
        in_degree.insert(g.id(v).to_string(), g.blockers(v).len());
    }
    (out_degree, in_degree)
}

/// Edge density of a directed graph; zero below two nodes.
pub fn density(node_count: usize, edge_count: usize) -> f64 {
    if node_count < 2 {
        return 0.0;
    }
    edge_count as f64 / (node_count * (node_count - 1)) as f64
}

/// Stable topological order (Kahn), ties broken by ID ascending.
///
/// Returns `None` when the graph contains a cycle.
pub fn topological_order(g: &BlockingGraph) -> Option<Vec<String>> {
    let n = g.node_count();
    let mut indegree: Vec<usize> = (0..n).map(|v| g.blockers(v).len()).collect();

    let mut ready: BinaryHeap<Reverse<(&str, usize)>> = (0..n)
        .filter(|&v| indegree[v] == 0)
        .map(|v| Reverse((g.id(v), v)))
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse((_, v))) = ready.pop() {
        order.push(g.id(v).to_string());
        for &w in g.dependents(v) {
            indegree[w] -= 1;
            if indegree[w] == 0 {
                ready.push(Reverse((g.id(w), w)));
            }
        }
    }

    (order.len() == n).then_some(order)
}
