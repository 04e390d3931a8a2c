//! Layout adapter
//!
//! Layering and the force solver live in the `mentorgraph-layout` crate and
//! operate on a CSR [`LayoutView`]. This module builds that view from a
//! [`Graph`] and runs the full pipeline.

use crate::graph::Graph;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, warn};

// Re-export algorithms
pub use mentorgraph_layout::{
    assign_layers, find_back_edges, mentee_offsets, solve, solve_until, weakly_connected_components,
    ComponentResult, EdgeKind, LayeringResult, LayoutView, Position, PositionMap, SolveResult,
    SolverConfig,
};

/// Build a LayoutView from the graph for algorithm execution
pub fn build_view(graph: &Graph) -> LayoutView {
    let nodes: Vec<(String, Option<i64>)> = graph
        .people()
        .map(|p| (p.id.as_str().to_string(), p.level))
        .collect();

    let edges = graph
        .relationships()
        .map(|rel| (rel.source.into_string(), rel.target.into_string(), EdgeKind::from(rel.kind)));

    LayoutView::from_edges(nodes, edges)
}

/// Summary of one layout run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutReport {
    pub people: usize,
    pub relationships: usize,
    /// Layering passes used
    pub passes: usize,
    /// Back edges ignored to break cycles
    pub broken_cycles: usize,
    /// False if layering hit its pass bound
    pub layering_converged: bool,
    pub iterations: usize,
    pub converged: bool,
    /// Total displacement of the last solver iteration
    pub displacement: f64,
    pub components: usize,
    /// People that started from a previous position
    pub reused: usize,
    /// People that received a fresh starting position
    pub placed: usize,
}

/// Layers, positions and report of a layout run
#[derive(Debug, Clone)]
pub struct Layout {
    pub layers: BTreeMap<String, i64>,
    pub positions: PositionMap,
    pub report: LayoutReport,
}

/// Assign layers, then solve positions starting from `previous`.
///
/// Non-convergence is logged and reported, never an error.
pub fn compute_layout(graph: &Graph, previous: &PositionMap, config: &SolverConfig) -> Layout {
    run_pipeline(graph, previous, config, || false).0
}

/// [`compute_layout`] that gives up as soon as `should_stop` returns true.
/// Returns `None` when interrupted.
pub fn compute_layout_until<F>(
    graph: &Graph,
    previous: &PositionMap,
    config: &SolverConfig,
    should_stop: F,
) -> Option<Layout>
where
    F: Fn() -> bool,
{
    match run_pipeline(graph, previous, config, should_stop) {
        (_, true) => None,
        (layout, false) => Some(layout),
    }
}

fn run_pipeline<F>(
    graph: &Graph,
    previous: &PositionMap,
    config: &SolverConfig,
    should_stop: F,
) -> (Layout, bool)
where
    F: Fn() -> bool,
{
    let view = build_view(graph);
    let layering = assign_layers(&view);
    if layering.broken_cycles() > 0 {
        debug!("Broke {} back edges while layering", layering.broken_cycles());
    }
    if !layering.converged {
        warn!(
            "Layering hit its pass bound after {} passes; {} people placed by fallback",
            layering.passes, layering.fallback_assigned
        );
    }

    let solved = solve_until(&view, &layering, previous, config, should_stop);
    if solved.stopped {
        debug!("Layout interrupted after {} iterations", solved.iterations);
    } else if !solved.converged {
        warn!(
            "Solver stopped after {} iterations without converging (displacement {:.3})",
            solved.iterations, solved.displacement
        );
    }

    let report = LayoutReport {
        people: view.node_count,
        relationships: view.edge_count(),
        passes: layering.passes,
        broken_cycles: layering.broken_cycles(),
        layering_converged: layering.converged,
        iterations: solved.iterations,
        converged: solved.converged,
        displacement: solved.displacement,
        components: solved.components,
        reused: solved.reused,
        placed: solved.placed,
    };

    let layout = Layout {
        layers: layering.layer_map(&view),
        positions: solved.position_map(&view),
        report,
    };
    (layout, solved.stopped)
}
