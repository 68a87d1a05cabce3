use issuegraph_core::{DependencyType, Issue};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// A non-blocking dependency retained for label-flow analysis.
///
/// Direction matches the blocking graph: `from` is the blocker handle,
/// `to` the dependent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NonBlockingEdge {
    pub from: usize,
    pub to: usize,
    pub dep_type: DependencyType,
}

/// Directed blocking graph over an issue snapshot.
///
/// Issue IDs are interned to `usize` handles in insertion order. The edge
/// direction is blocker -> dependent: if D depends on B, the edge is B -> D,
/// so the out-degree of a node is the number of issues it blocks.
///
/// Dependencies referencing unknown issues are dropped, and duplicate edges
/// collapse; callers never see multiset semantics. Self-loops are kept (they
/// surface as unary cycles).
#[derive(Debug, Clone, Default)]
pub struct BlockingGraph {
    ids: Vec<String>,
    index: FxHashMap<String, usize>,
    out: Vec<Vec<usize>>,
    inc: Vec<Vec<usize>>,
    edge_count: usize,
    non_blocking: Vec<NonBlockingEdge>,
}

impl BlockingGraph {
    pub fn build(issues: &[Issue]) -> Self {
        let mut ids: Vec<String> = Vec::with_capacity(issues.len());
        let mut index = FxHashMap::default();
        for issue in issues {
            if !index.contains_key(&issue.id) {
                index.insert(issue.id.clone(), ids.len());
                ids.push(issue.id.clone());
            }
        }

        let n = ids.len();
        let mut out: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut inc: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut seen_blocking: FxHashSet<(usize, usize)> = FxHashSet::default();
        let mut seen_other: FxHashSet<(usize, usize, DependencyType)> = FxHashSet::default();
        let mut non_blocking = Vec::new();
        let mut edge_count = 0;

        for issue in issues {
            let Some(&dependent) = index.get(&issue.id) else {
                continue;
            };
            for dep in &issue.dependencies {
                // Unknown blockers never block and never error.
                let Some(&blocker) = index.get(&dep.depends_on_id) else {
                    continue;
                };
                if dep.dep_type.is_blocking() {
                    if seen_blocking.insert((blocker, dependent)) {
                        out[blocker].push(dependent);
                        inc[dependent].push(blocker);
                        edge_count += 1;
                    }
                } else if seen_other.insert((blocker, dependent, dep.dep_type)) {
                    non_blocking.push(NonBlockingEdge {
                        from: blocker,
                        to: dependent,
                        dep_type: dep.dep_type,
                    });
                }
            }
        }

        debug!(nodes = n, edges = edge_count, "built blocking graph");
        Self {
            ids,
            index,
            out,
            inc,
            edge_count,
            non_blocking,
        }
    }

    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn id(&self, node: usize) -> &str {
        &self.ids[node]
    }

    pub fn node(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Issues directly blocked by `node` (outgoing edges).
    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.out[node]
    }

    /// Issues directly blocking `node` (incoming edges).
    pub fn blockers(&self, node: usize) -> &[usize] {
        &self.inc[node]
    }

    pub fn has_self_loop(&self, node: usize) -> bool {
        self.out[node].contains(&node)
    }

    pub fn non_blocking_edges(&self) -> &[NonBlockingEdge] {
        &self.non_blocking
    }

    /// Undirected neighbor lists (self-loops removed, duplicates collapsed),
    /// shared by the k-core and articulation-point passes.
    pub fn undirected_adjacency(&self) -> Vec<Vec<usize>> {
        let n = self.node_count();
        let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
        for v in 0..n {
            let mut nbrs: Vec<usize> = self.out[v]
                .iter()
                .chain(self.inc[v].iter())
                .copied()
                .filter(|&w| w != v)
                .collect();
            nbrs.sort_unstable();
            nbrs.dedup();
            adj[v] = nbrs;
        }
        adj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use issuegraph_core::DependencyType;

    fn issue(id: &str) -> Issue {
        Issue::new(id, format!("issue {id}"))
    }

    #[test]
    fn edges_run_from_blocker_to_dependent() {
        let issues = vec![
            issue("a"),
            issue("b").with_dependency("a", DependencyType::Blocks),
        ];
        let g = BlockingGraph::build(&issues);
        let a = g.node("a").unwrap();
        let b = g.node("b").unwrap();
        assert_eq!(g.dependents(a), &[b]);
        assert_eq!(g.blockers(b), &[a]);
        assert_eq!(g.edge_count(), 1);
    }

    #[test]
    fn duplicate_edges_collapse() {
        let issues = vec![
            issue("a"),
            issue("b")
                .with_dependency("a", DependencyType::Blocks)
                .with_dependency("a", DependencyType::Blocks)
                .with_dependency("a", DependencyType::Legacy),
        ];
        let g = BlockingGraph::build(&issues);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.dependents(g.node("a").unwrap()).len(), 1);
    }

    #[test]
    fn unknown_blockers_are_ignored() {
        let issues = vec![issue("b").with_dependency("ghost", DependencyType::Blocks)];
        let g = BlockingGraph::build(&issues);
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.edge_count(), 0);
    }

    #[test]
    fn non_blocking_edges_are_kept_aside() {
        let issues = vec![
            issue("a"),
            issue("b")
                .with_dependency("a", DependencyType::Related)
                .with_dependency("a", DependencyType::Related),
        ];
        let g = BlockingGraph::build(&issues);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.non_blocking_edges().len(), 1);
        assert_eq!(g.non_blocking_edges()[0].dep_type, DependencyType::Related);
    }

    #[test]
    fn self_loops_are_allowed() {
        let issues = vec![issue("a").with_dependency("a", DependencyType::Blocks)];
        let g = BlockingGraph::build(&issues);
        let a = g.node("a").unwrap();
        assert!(g.has_self_loop(a));
        assert!(g.undirected_adjacency()[a].is_empty());
    }
}
