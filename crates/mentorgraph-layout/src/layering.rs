//! Generational layering
//!
//! Assigns every person an integer layer: explicit levels are pinned, everyone
//! else sits one layer below their deepest mentor. Mentor cycles are broken by
//! an id-ordered depth-first pass before relaxation, so the relaxation always
//! runs on an acyclic edge set and terminates within `|V|` passes.

use super::common::{LayoutView, NodeIndex};
use std::collections::BTreeMap;

/// Result of layer assignment
#[derive(Debug, Clone)]
pub struct LayeringResult {
    /// Layer per dense node index
    pub layers: Vec<i64>,
    /// Per edge (aligned with `LayoutView::out_targets`): true if the edge
    /// closes a cycle and was ignored while layering
    pub back_edges: Vec<bool>,
    /// Relaxation passes executed
    pub passes: usize,
    /// False if the pass bound was reached while layers were still changing
    pub converged: bool,
    /// Nodes that needed the neighbour fallback after relaxation
    pub fallback_assigned: usize,
}

impl LayeringResult {
    pub fn layer_of(&self, idx: NodeIndex) -> i64 {
        self.layers[idx]
    }

    /// Number of edges ignored to break cycles
    pub fn broken_cycles(&self) -> usize {
        self.back_edges.iter().filter(|&&back| back).count()
    }

    /// Whether the edge at `edge` (position in `out_targets`) was kept
    pub fn is_forward(&self, edge: usize) -> bool {
        !self.back_edges[edge]
    }

    /// Layers keyed by person id
    pub fn layer_map(&self, view: &LayoutView) -> BTreeMap<String, i64> {
        view.index_to_node
            .iter()
            .cloned()
            .zip(self.layers.iter().copied())
            .collect()
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    New,
    Active,
    Done,
}

/// Mark edges that close a cycle.
///
/// Traversal starts from nodes without incoming edges, then pinned nodes, then
/// everything else, each group in id order; successors are visited in index
/// order. An edge reaching a node still on the stack is a back edge.
pub fn find_back_edges(view: &LayoutView) -> Vec<bool> {
    let n = view.node_count;
    let mut state = vec![Visit::New; n];
    let mut back = vec![false; view.edge_count()];

    let roots = (0..n).filter(|&i| view.in_degree(i) == 0);
    let anchors = (0..n).filter(|&i| view.in_degree(i) > 0 && view.explicit_levels[i].is_some());
    let rest = (0..n).filter(|&i| view.in_degree(i) > 0 && view.explicit_levels[i].is_none());
    let order: Vec<NodeIndex> = roots.chain(anchors).chain(rest).collect();

    // Stack frames are (node, next edge position)
    let mut stack: Vec<(NodeIndex, usize)> = Vec::new();

    for start in order {
        if state[start] != Visit::New {
            continue;
        }
        state[start] = Visit::Active;
        stack.push((start, view.out_offsets[start]));

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let edge = frame.1;
            if edge == view.out_offsets[node + 1] {
                state[node] = Visit::Done;
                stack.pop();
                continue;
            }
            frame.1 += 1;

            let target = view.out_targets[edge];
            match state[target] {
                Visit::New => {
                    state[target] = Visit::Active;
                    stack.push((target, view.out_offsets[target]));
                }
                Visit::Active => back[edge] = true,
                Visit::Done => {}
            }
        }
    }

    back
}

/// Assign a layer to every node of the view.
///
/// 1. Explicit levels are pinned and never relaxed.
/// 2. Back edges (see [`find_back_edges`]) are ignored.
/// 3. Unpinned nodes without forward incoming edges start at layer 0; the rest
///    take `1 + max(layer of assigned mentors)`, repeated until a pass changes
///    nothing, for at most `|V|` passes.
/// 4. Anything still unassigned takes the minimum layer of its assigned
///    neighbours (0 if there are none), in id order.
pub fn assign_layers(view: &LayoutView) -> LayeringResult {
    let n = view.node_count;
    let back_edges = find_back_edges(view);

    let has_forward_mentor = |v: NodeIndex| {
        view.in_edge_range(v)
            .any(|slot| !back_edges[view.in_edges[slot]])
    };

    let mut layers: Vec<Option<i64>> = view.explicit_levels.clone();
    for v in 0..n {
        if layers[v].is_none() && !has_forward_mentor(v) {
            layers[v] = Some(0);
        }
    }

    let mut passes = 0;
    let mut converged = n == 0;
    while passes < n {
        passes += 1;
        let mut changed = false;

        for v in 0..n {
            if view.explicit_levels[v].is_some() {
                continue;
            }
            let mut best: Option<i64> = None;
            for slot in view.in_edge_range(v) {
                if back_edges[view.in_edges[slot]] {
                    continue;
                }
                if let Some(layer) = layers[view.in_sources[slot]] {
                    let candidate = layer.saturating_add(1);
                    best = Some(best.map_or(candidate, |b| b.max(candidate)));
                }
            }
            if let Some(candidate) = best {
                if layers[v] != Some(candidate) {
                    layers[v] = Some(candidate);
                    changed = true;
                }
            }
        }

        if !changed {
            converged = true;
            break;
        }
    }

    let mut fallback_assigned = 0;
    for v in 0..n {
        if layers[v].is_some() {
            continue;
        }
        let neighbour_min = view
            .predecessors(v)
            .iter()
            .chain(view.successors(v).iter())
            .filter_map(|&u| layers[u])
            .min();
        layers[v] = Some(neighbour_min.unwrap_or(0));
        fallback_assigned += 1;
    }

    LayeringResult {
        layers: layers.into_iter().map(|l| l.unwrap_or(0)).collect(),
        back_edges,
        passes,
        converged,
        fallback_assigned,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EdgeKind;

    fn view(nodes: &[(&str, Option<i64>)], edges: &[(&str, &str, EdgeKind)]) -> LayoutView {
        LayoutView::from_edges(
            nodes.iter().map(|(id, l)| (id.to_string(), *l)).collect(),
            edges.iter().map(|(s, t, k)| (*s, *t, *k)),
        )
    }

    fn layer(view: &LayoutView, result: &LayeringResult, id: &str) -> i64 {
        result.layer_of(view.index_of(id).unwrap())
    }

    #[test]
    fn test_mentorship_and_adoption_both_propagate() {
        let v = view(
            &[("a", Some(0)), ("b", None), ("c", None)],
            &[("a", "b", EdgeKind::Mentorship), ("a", "c", EdgeKind::Adoption)],
        );
        let result = assign_layers(&v);

        assert_eq!(layer(&v, &result, "a"), 0);
        assert_eq!(layer(&v, &result, "b"), 1);
        assert_eq!(layer(&v, &result, "c"), 1);
        assert!(result.converged);
    }

    #[test]
    fn test_deepest_mentor_wins() {
        // r -> x -> y, and r -> y directly: y sits below x
        let v = view(
            &[("r", None), ("x", None), ("y", None)],
            &[
                ("r", "x", EdgeKind::Mentorship),
                ("x", "y", EdgeKind::Mentorship),
                ("r", "y", EdgeKind::Adoption),
            ],
        );
        let result = assign_layers(&v);
        assert_eq!(layer(&v, &result, "y"), 2);
    }

    #[test]
    fn test_explicit_level_is_pinned() {
        let v = view(
            &[("m", Some(2019)), ("t", None), ("p", Some(2018))],
            &[("m", "t", EdgeKind::Mentorship), ("m", "p", EdgeKind::Mentorship)],
        );
        let result = assign_layers(&v);

        assert_eq!(layer(&v, &result, "m"), 2019);
        assert_eq!(layer(&v, &result, "t"), 2020);
        // Pinned below its mentor's derived value, still pinned
        assert_eq!(layer(&v, &result, "p"), 2018);
    }

    #[test]
    fn test_extreme_level_saturates() {
        let v = view(
            &[("a", Some(i64::MAX)), ("b", None)],
            &[("a", "b", EdgeKind::Mentorship)],
        );
        let result = assign_layers(&v);

        assert!(result.converged);
        assert_eq!(layer(&v, &result, "a"), i64::MAX);
        assert_eq!(layer(&v, &result, "b"), i64::MAX);
    }

    #[test]
    fn test_pure_cycle_terminates() {
        let v = view(
            &[("a", None), ("b", None), ("c", None)],
            &[
                ("a", "b", EdgeKind::Mentorship),
                ("b", "c", EdgeKind::Mentorship),
                ("c", "a", EdgeKind::Mentorship),
            ],
        );
        let result = assign_layers(&v);

        assert_eq!(result.broken_cycles(), 1);
        assert!(result.passes <= v.node_count);
        assert_eq!(layer(&v, &result, "a"), 0);
        assert_eq!(layer(&v, &result, "b"), 1);
        assert_eq!(layer(&v, &result, "c"), 2);
    }

    #[test]
    fn test_cycle_anchored_by_explicit_level() {
        // The pinned node is where the cycle is entered
        let v = view(
            &[("a", None), ("b", Some(5)), ("c", None)],
            &[
                ("a", "b", EdgeKind::Mentorship),
                ("b", "c", EdgeKind::Mentorship),
                ("c", "a", EdgeKind::Mentorship),
            ],
        );
        let result = assign_layers(&v);

        assert_eq!(layer(&v, &result, "b"), 5);
        assert_eq!(layer(&v, &result, "c"), 6);
        assert_eq!(layer(&v, &result, "a"), 7);
    }

    #[test]
    fn test_self_loop_is_a_back_edge() {
        let v = view(&[("solo", None)], &[("solo", "solo", EdgeKind::Adoption)]);
        let result = assign_layers(&v);
        assert_eq!(result.broken_cycles(), 1);
        assert_eq!(result.layers, vec![0]);
    }

    #[test]
    fn test_isolated_nodes_get_layer_zero() {
        let v = view(&[("x", None), ("y", None)], &[]);
        let result = assign_layers(&v);
        assert_eq!(result.layers, vec![0, 0]);
        assert_eq!(result.fallback_assigned, 0);
    }

    #[test]
    fn test_reverse_id_chain_within_bound() {
        // Ids decrease along the chain, the worst case for id-ordered passes
        let ids = ["e", "d", "c", "b", "a"];
        let nodes: Vec<(&str, Option<i64>)> = ids.iter().map(|id| (*id, None)).collect();
        let edges: Vec<(&str, &str, EdgeKind)> = ids
            .windows(2)
            .map(|w| (w[0], w[1], EdgeKind::Mentorship))
            .collect();
        let v = view(&nodes, &edges);
        let result = assign_layers(&v);

        assert!(result.converged);
        assert!(result.passes <= v.node_count);
        assert_eq!(layer(&v, &result, "a"), 4);
        assert_eq!(layer(&v, &result, "e"), 0);
    }
}
