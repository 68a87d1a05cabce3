use crate::builder::BlockingGraph;
use crate::centrality::{betweenness, eigenvector, hits, pagerank};
use crate::cycles::find_cycles;
use crate::metrics::{degree_maps, density, topological_order};
use crate::stats::{GraphStats, MetricState, Phase2Metrics, METRIC_NAMES};
use crate::structure::{articulation_points, core_numbers, critical_path_depths, slack_values, Condensation};
use issuegraph_core::{AnalysisConfig, CancellationToken, Issue};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Analyze an issue snapshot.
///
/// Returns as soon as the cheap graph metrics are computed; the centrality
/// bundle is filled in by a background worker and becomes readable through
/// the handle's readiness accessors. Issues are read-only for the lifetime
/// of the analysis, and the returned handle is immutable once published.
pub fn analyze(
    issues: &[Issue],
    config: AnalysisConfig,
    token: CancellationToken,
) -> Arc<GraphStats> {
    let started = Instant::now();
    let graph = Arc::new(BlockingGraph::build(issues));

    let (out_degree, in_degree) = degree_maps(&graph);
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();
    let graph_density = density(node_count, edge_count);

    let (topo, cycles) = match topological_order(&graph) {
        Some(order) => (order, Vec::new()),
        None => (
            Vec::new(),
            find_cycles(&graph, config.effective_cycle_limit()),
        ),
    };

    let stats = Arc::new(GraphStats::new(
        node_count,
        edge_count,
        graph_density,
        out_degree,
        in_degree,
        topo,
        cycles,
        config.clone(),
    ));
    info!(
        nodes = node_count,
        edges = edge_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "phase-1 metrics ready"
    );

    let worker_stats = stats.clone();
    let spawned = std::thread::Builder::new()
        .name("issuegraph-phase2".to_string())
        .spawn(move || run_phase2(graph, config, token, worker_stats));
    if let Err(err) = spawned {
        warn!(error = %err, "failed to spawn centrality worker");
        for name in METRIC_NAMES {
            stats.mark_metric(
                name,
                MetricState::Failed,
                Some(format!("worker spawn failed: {err}")),
            );
        }
        stats.publish(Phase2Metrics::default());
    }

    stats
}

/// Background worker: computes each centrality metric in turn, checking the
/// cancellation token between metrics, then publishes the bundle once.
///
/// No caller-observable lock is held while computing; per-metric status
/// updates take a brief exclusive section each.
fn run_phase2(
    graph: Arc<BlockingGraph>,
    config: AnalysisConfig,
    token: CancellationToken,
    stats: Arc<GraphStats>,
) {
    let started = Instant::now();
    let mut bundle = Phase2Metrics::default();
    let mut cancelled = false;

    let cancelled_before = |stats: &GraphStats, name: &str, cancelled: &mut bool| -> bool {
        if *cancelled || token.is_cancelled() {
            *cancelled = true;
            stats.mark_metric(
                name,
                MetricState::Failed,
                Some("analysis cancelled".to_string()),
            );
            true
        } else {
            false
        }
    };

    if !cancelled_before(&stats, "pagerank", &mut cancelled) {
        let (scores, converged) = pagerank(
            &graph,
            config.pagerank_damping,
            config.pagerank_tol,
            config.pagerank_max_iter,
        );
        bundle.pagerank = scores;
        if converged {
            stats.mark_metric("pagerank", MetricState::Ready, None);
        } else {
            stats.mark_metric(
                "pagerank",
                MetricState::Failed,
                Some(format!(
                    "did not converge within {} iterations",
                    config.pagerank_max_iter
                )),
            );
        }
    }

    if !cancelled_before(&stats, "betweenness", &mut cancelled) {
        bundle.betweenness = betweenness(&graph);
        stats.mark_metric("betweenness", MetricState::Ready, None);
    }

    if !cancelled_before(&stats, "eigenvector", &mut cancelled) {
        let (scores, converged) = eigenvector(&graph);
        bundle.eigenvector = scores;
        if converged {
            stats.mark_metric("eigenvector", MetricState::Ready, None);
        } else {
            stats.mark_metric(
                "eigenvector",
                MetricState::Failed,
                Some("power iteration did not converge".to_string()),
            );
        }
    }

    if !cancelled_before(&stats, "hits", &mut cancelled) {
        let (hubs, authorities, converged) = hits(&graph);
        bundle.hubs = hubs;
        bundle.authorities = authorities;
        if converged {
            stats.mark_metric("hits", MetricState::Ready, None);
        } else {
            stats.mark_metric(
                "hits",
                MetricState::Failed,
                Some("hub/authority iteration did not converge".to_string()),
            );
        }
    }

    // The condensation feeds both path metrics; build it at most once.
    let mut condensation: Option<Condensation> = None;

    if !cancelled_before(&stats, "critical_path", &mut cancelled) {
        let cond = condensation.get_or_insert_with(|| Condensation::build(&graph));
        bundle.critical_path = critical_path_depths(&graph, cond);
        stats.mark_metric("critical_path", MetricState::Ready, None);
    }

    if !cancelled_before(&stats, "slack", &mut cancelled) {
        let cond = condensation.get_or_insert_with(|| Condensation::build(&graph));
        bundle.slack = slack_values(&graph, cond);
        stats.mark_metric("slack", MetricState::Ready, None);
    }

    if !cancelled_before(&stats, "core_number", &mut cancelled) {
        bundle.core_number = core_numbers(&graph);
        stats.mark_metric("core_number", MetricState::Ready, None);
    }

    if !cancelled_before(&stats, "articulation_points", &mut cancelled) {
        bundle.articulation_points = articulation_points(&graph);
        stats.mark_metric("articulation_points", MetricState::Ready, None);
    }

    if cancelled {
        warn!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "centrality pass cancelled; publishing partial bundle"
        );
    } else {
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "centrality pass complete"
        );
    }
    stats.publish(bundle);
}
