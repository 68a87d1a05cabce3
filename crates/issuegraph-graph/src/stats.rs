use arc_swap::ArcSwapOption;
use issuegraph_core::AnalysisConfig;
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Names of the background metrics, in computation order.
pub const METRIC_NAMES: [&str; 8] = [
    "pagerank",
    "betweenness",
    "eigenvector",
    "hits",
    "critical_path",
    "slack",
    "core_number",
    "articulation_points",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricState {
    Pending,
    Ready,
    Failed,
}

/// Per-metric progress record surfaced by [`GraphStats::status`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricStatus {
    pub name: String,
    pub state: MetricState,
    pub error: Option<String>,
}

/// The expensive centrality metrics, published as one immutable bundle.
///
/// All maps share the same key set: the issue IDs of the analyzed snapshot.
/// Metrics that failed (non-convergence, cancellation) carry empty maps and
/// a `Failed` status entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Phase2Metrics {
    pub pagerank: HashMap<String, f64>,
    pub betweenness: HashMap<String, f64>,
    pub eigenvector: HashMap<String, f64>,
    pub hubs: HashMap<String, f64>,
    pub authorities: HashMap<String, f64>,
    pub critical_path: HashMap<String, usize>,
    pub slack: HashMap<String, usize>,
    pub core_number: HashMap<String, usize>,
    pub articulation_points: Vec<String>,
}

struct Phase2Cell {
    bundle: ArcSwapOption<Phase2Metrics>,
    state: Mutex<Phase2Progress>,
    ready: Condvar,
}

struct Phase2Progress {
    finished: bool,
    statuses: Vec<MetricStatus>,
}

/// Analysis result handle with two visibility tiers.
///
/// The cheap graph metrics are plain fields, readable as soon as the
/// analyzer returns the handle. The centrality bundle becomes readable once
/// the background worker publishes it; `wait_ready` blocks on that event,
/// `try_phase2` polls it. Publication swaps a fully built immutable bundle,
/// so readers see either nothing or a consistent snapshot.
pub struct GraphStats {
    pub node_count: usize,
    pub edge_count: usize,
    pub density: f64,
    pub out_degree: HashMap<String, usize>,
    pub in_degree: HashMap<String, usize>,
    /// Empty when the graph has a cycle; `cycles` is populated instead.
    pub topological_order: Vec<String>,
    pub cycles: Vec<Vec<String>>,
    pub config: AnalysisConfig,
    phase2: Phase2Cell,
}

impl GraphStats {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        node_count: usize,
        edge_count: usize,
        density: f64,
        out_degree: HashMap<String, usize>,
        in_degree: HashMap<String, usize>,
        topological_order: Vec<String>,
        cycles: Vec<Vec<String>>,
        config: AnalysisConfig,
    ) -> Self {
        let statuses = METRIC_NAMES
            .iter()
            .map(|&name| MetricStatus {
                name: name.to_string(),
                state: MetricState::Pending,
                error: None,
            })
            .collect();
        Self {
            node_count,
            edge_count,
            density,
            out_degree,
            in_degree,
            topological_order,
            cycles,
            config,
            phase2: Phase2Cell {
                bundle: ArcSwapOption::empty(),
                state: Mutex::new(Phase2Progress {
                    finished: false,
                    statuses,
                }),
                ready: Condvar::new(),
            },
        }
    }

    /// Record the terminal state of one metric.
    pub(crate) fn mark_metric(&self, name: &str, state: MetricState, error: Option<String>) {
        let mut progress = self.phase2.state.lock();
        if let Some(status) = progress.statuses.iter_mut().find(|s| s.name == name) {
            status.state = state;
            status.error = error;
        }
    }

    /// Publish the bundle and wake all waiters. Called exactly once, after
    /// every metric reached a terminal state.
    pub(crate) fn publish(&self, metrics: Phase2Metrics) {
        self.phase2.bundle.store(Some(Arc::new(metrics)));
        let mut progress = self.phase2.state.lock();
        progress.finished = true;
        self.phase2.ready.notify_all();
    }

    /// Block until the background metrics reach a terminal state.
    pub fn wait_ready(&self) {
        let mut progress = self.phase2.state.lock();
        while !progress.finished {
            self.phase2.ready.wait(&mut progress);
        }
    }

    /// Non-blocking readiness probe.
    pub fn is_ready(&self) -> bool {
        self.phase2.state.lock().finished
    }

    /// The centrality bundle if it has been published.
    pub fn try_phase2(&self) -> Option<Arc<Phase2Metrics>> {
        self.phase2.bundle.load_full()
    }

    /// Block until published, then return the bundle.
    pub fn phase2(&self) -> Arc<Phase2Metrics> {
        self.wait_ready();
        self.try_phase2()
            .unwrap_or_else(|| Arc::new(Phase2Metrics::default()))
    }

    /// Current per-metric states.
    pub fn status(&self) -> Vec<MetricStatus> {
        self.phase2.state.lock().statuses.clone()
    }

    /// True when any background metric failed (including cancellation).
    pub fn has_failures(&self) -> bool {
        self.phase2
            .state
            .lock()
            .statuses
            .iter()
            .any(|s| s.state == MetricState::Failed)
    }
}

impl std::fmt::Debug for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphStats")
            .field("node_count", &self.node_count)
            .field("edge_count", &self.edge_count)
            .field("density", &self.density)
            .field("cycles", &self.cycles.len())
            .field("phase2_ready", &self.is_ready())
            .finish()
    }
}
