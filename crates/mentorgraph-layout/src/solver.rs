//! Force-directed position solver
//!
//! Every person is a point mass subject to three forces per iteration:
//! - a vertical spring toward the y-coordinate of its layer,
//! - a horizontal spring toward its mentor's x plus a sibling offset, with the
//!   opposite force applied to the mentor unless the mentor is anchored,
//! - inverse-distance repulsion from nodes of the same layer that are closer
//!   than `repulsion_radius`.
//!
//! Nodes that keep a previous position are anchored: a weak spring holds them
//! near their old x, their sibling offsets are taken from the previous layout,
//! and new mentees are appended to the right of existing ones. A previous
//! position that left its layer band or its mentors' reach is discarded and
//! the node is re-seeded like a new one.
//!
//! The solver is fully deterministic: nodes are walked in index (id) order,
//! and brand-new nodes get starting positions derived from their mentors or
//! from their index, never from a random source.

use super::common::{LayoutView, NodeIndex, Position, PositionMap};
use super::components::weakly_connected_components;
use super::layering::LayeringResult;
use std::collections::BTreeMap;

/// Distances below this are treated as this value in the repulsion term
const MIN_DISTANCE: f64 = 1.0;

/// Solver configuration
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Vertical gap between consecutive layers
    pub layer_spacing: f64,
    /// Layer drawn at y = 0. Deployments using entry years as levels set this
    /// to the first year.
    pub layer_origin: i64,
    /// Horizontal gap between mentees of one mentor
    pub sibling_spacing: f64,
    /// Same-layer nodes closer than this repel each other
    pub repulsion_radius: f64,
    /// Repulsion constant `k` in `k * (1/d - 1/R)`
    pub repulsion_strength: f64,
    /// Fraction of the distance to its layer a node moves per iteration
    pub layer_pull: f64,
    /// Spring constant along mentor -> mentee edges
    pub edge_attraction: f64,
    /// Per-node displacement cap per iteration
    pub max_step: f64,
    /// Iteration budget
    pub max_iterations: usize,
    /// Stop once total displacement of an iteration falls below this
    pub epsilon: f64,
    /// Horizontal gap inserted between newly placed components
    pub component_gap: f64,
    /// Spring constant pulling anchored nodes back to their previous x
    pub anchor_strength: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            layer_spacing: 150.0,
            layer_origin: 0,
            sibling_spacing: 120.0,
            repulsion_radius: 100.0,
            repulsion_strength: 2000.0,
            layer_pull: 0.2,
            edge_attraction: 0.1,
            max_step: 25.0,
            max_iterations: 500,
            epsilon: 0.5,
            component_gap: 240.0,
            anchor_strength: 0.1,
        }
    }
}

impl SolverConfig {
    /// Reject configurations that make the simulation diverge or stall
    pub fn validate(&self) -> Result<(), String> {
        let finite = [
            self.layer_spacing,
            self.sibling_spacing,
            self.repulsion_radius,
            self.repulsion_strength,
            self.layer_pull,
            self.edge_attraction,
            self.max_step,
            self.epsilon,
            self.component_gap,
            self.anchor_strength,
        ];
        if finite.iter().any(|v| !v.is_finite()) {
            return Err("solver constants must be finite".to_string());
        }
        if self.layer_spacing <= 0.0 || self.sibling_spacing <= 0.0 {
            return Err("layer_spacing and sibling_spacing must be positive".to_string());
        }
        if self.repulsion_radius <= MIN_DISTANCE {
            return Err(format!("repulsion_radius must exceed {}", MIN_DISTANCE));
        }
        if self.repulsion_strength < 0.0 || self.component_gap < 0.0 || self.epsilon < 0.0 {
            return Err("repulsion_strength, component_gap and epsilon must not be negative".to_string());
        }
        if !(self.layer_pull > 0.0 && self.layer_pull <= 1.0) {
            return Err("layer_pull must be in (0, 1]".to_string());
        }
        // A mentor with three mentees and one mentor of its own feels four springs
        if !(0.0..=0.25).contains(&self.edge_attraction) {
            return Err("edge_attraction must be in [0, 0.25]".to_string());
        }
        if !(0.0..=1.0).contains(&self.anchor_strength) {
            return Err("anchor_strength must be in [0, 1]".to_string());
        }
        if self.max_step <= 0.0 {
            return Err("max_step must be positive".to_string());
        }
        Ok(())
    }

    /// Target y-coordinate of a layer. Computed in floating point so extreme
    /// persisted levels cannot overflow.
    pub fn layer_y(&self, layer: i64) -> f64 {
        (layer as f64 - self.layer_origin as f64) * self.layer_spacing
    }
}

/// Result of a solver run
#[derive(Debug, Clone)]
pub struct SolveResult {
    /// Position per dense node index
    pub positions: Vec<Position>,
    /// Iterations executed
    pub iterations: usize,
    /// True if the displacement epsilon was reached within the budget
    pub converged: bool,
    /// Total displacement of the last iteration
    pub displacement: f64,
    /// Nodes that started from a previous position
    pub reused: usize,
    /// Nodes that needed a fresh starting position
    pub placed: usize,
    /// Weakly connected components in the view
    pub components: usize,
    /// True if the stop check interrupted the run
    pub stopped: bool,
}

impl SolveResult {
    /// Positions keyed by person id
    pub fn position_map(&self, view: &LayoutView) -> PositionMap {
        view.index_to_node
            .iter()
            .cloned()
            .zip(self.positions.iter().copied())
            .collect()
    }
}

/// Mentees of every mentor with their horizontal offset from the mentor.
///
/// Only forward edges count; a mentee linked twice (mentorship and adoption)
/// appears once. Offsets are spread symmetrically in index order.
pub fn mentee_offsets(
    view: &LayoutView,
    layering: &LayeringResult,
    config: &SolverConfig,
) -> Vec<Vec<(NodeIndex, f64)>> {
    (0..view.node_count)
        .map(|m| {
            let mut mentees: Vec<NodeIndex> = view
                .out_edge_range(m)
                .filter(|&edge| layering.is_forward(edge))
                .map(|edge| view.out_targets[edge])
                .collect();
            mentees.dedup();

            let center = (mentees.len() as f64 - 1.0) / 2.0;
            mentees
                .into_iter()
                .enumerate()
                .map(|(j, child)| (child, (j as f64 - center) * config.sibling_spacing))
                .collect()
        })
        .collect()
}

/// Previous positions worth keeping, by node index.
///
/// A position is discarded when it is off its layer band by more than half a
/// layer, or when the node has placed mentors and sits out of reach of all of
/// them (further than `sibling_spacing` times the mentor's mentee count). The
/// typical case is a person placed alone and then linked under a mentor.
fn kept_positions(
    view: &LayoutView,
    layering: &LayeringResult,
    offsets: &[Vec<(NodeIndex, f64)>],
    previous: &PositionMap,
    config: &SolverConfig,
) -> Vec<Option<Position>> {
    let n = view.node_count;
    let in_band: Vec<Option<Position>> = (0..n)
        .map(|i| {
            previous
                .get(view.id_of(i))
                .copied()
                .filter(Position::is_finite)
                .filter(|p| {
                    (p.y - config.layer_y(layering.layers[i])).abs() <= config.layer_spacing / 2.0
                })
        })
        .collect();

    let mut kept = in_band.clone();
    let mut placed_mentors = vec![0usize; n];
    let mut in_reach = vec![false; n];
    for (m, mentees) in offsets.iter().enumerate() {
        let Some(mp) = in_band[m] else { continue };
        let reach = config.sibling_spacing * mentees.len() as f64;
        for &(child, _) in mentees {
            if let Some(cp) = in_band[child] {
                placed_mentors[child] += 1;
                if (cp.x - mp.x).abs() <= reach {
                    in_reach[child] = true;
                }
            }
        }
    }
    for i in 0..n {
        if placed_mentors[i] > 0 && !in_reach[i] {
            kept[i] = None;
        }
    }
    kept
}

/// Sibling offsets that keep a previous layout in place.
///
/// Mentees kept under a kept mentor retain their previous offset. Other
/// mentees are appended to the right of them, one `sibling_spacing` apart.
/// A mentor with no kept mentees falls back to the symmetric offsets.
fn stable_offsets(
    offsets: &[Vec<(NodeIndex, f64)>],
    kept: &[Option<Position>],
    config: &SolverConfig,
) -> Vec<Vec<(NodeIndex, f64)>> {
    offsets
        .iter()
        .enumerate()
        .map(|(m, mentees)| {
            let Some(mp) = kept[m] else {
                return mentees.clone();
            };
            let settled: Vec<f64> = mentees
                .iter()
                .filter_map(|&(child, _)| kept[child].map(|cp| cp.x - mp.x))
                .collect();
            let Some(mut next) = settled.iter().copied().reduce(f64::max) else {
                return mentees.clone();
            };

            mentees
                .iter()
                .map(|&(child, _)| match kept[child] {
                    Some(cp) => (child, cp.x - mp.x),
                    None => {
                        next += config.sibling_spacing;
                        (child, next)
                    }
                })
                .collect()
        })
        .collect()
}

/// Starting positions: kept coordinates where available, otherwise derived
/// from already placed mentors, otherwise the next free slot to the right of
/// everything placed so far.
fn initial_positions(
    view: &LayoutView,
    layering: &LayeringResult,
    offsets: &[Vec<(NodeIndex, f64)>],
    kept: &[Option<Position>],
    config: &SolverConfig,
) -> (Vec<Position>, usize) {
    let n = view.node_count;

    let mut mentors_of: Vec<Vec<(NodeIndex, f64)>> = vec![Vec::new(); n];
    for (m, mentees) in offsets.iter().enumerate() {
        for &(child, offset) in mentees {
            mentors_of[child].push((m, offset));
        }
    }

    let mut pos: Vec<Option<Position>> = kept.to_vec();

    let mut cursor = pos
        .iter()
        .flatten()
        .map(|p| p.x)
        .fold(None, |acc: Option<f64>, x| Some(acc.map_or(x, |a| a.max(x))))
        .map_or(0.0, |max_x| max_x + config.component_gap);

    let components = weakly_connected_components(view);
    for mut members in components.members() {
        members.sort_by_key(|&i| (layering.layers[i], i));

        let mut used_slot = false;
        for v in members {
            if pos[v].is_some() {
                continue;
            }
            let y = config.layer_y(layering.layers[v]);

            let anchored: Vec<f64> = mentors_of[v]
                .iter()
                .filter_map(|&(m, offset)| pos[m].map(|p| p.x + offset))
                .collect();

            let x = if anchored.is_empty() {
                let span = offsets[v].len().max(1) as f64;
                let x = cursor + (span - 1.0) * config.sibling_spacing / 2.0;
                cursor += span * config.sibling_spacing;
                used_slot = true;
                x
            } else {
                anchored.iter().sum::<f64>() / anchored.len() as f64
            };
            pos[v] = Some(Position::new(x, y));
        }

        if used_slot {
            cursor += config.component_gap;
        }
    }

    let positions = pos.into_iter().map(|p| p.unwrap_or_default()).collect();
    (positions, components.count)
}

/// Run the simulation.
///
/// Stops after `max_iterations` or as soon as the total displacement of an
/// iteration drops below `epsilon`. Hitting the budget is reported through
/// `converged = false`, never as an error.
pub fn solve(
    view: &LayoutView,
    layering: &LayeringResult,
    previous: &PositionMap,
    config: &SolverConfig,
) -> SolveResult {
    solve_until(view, layering, previous, config, || false)
}

/// [`solve`] with a stop check polled before every iteration. An interrupted
/// run returns `stopped = true` and its positions must not be used.
pub fn solve_until<F>(
    view: &LayoutView,
    layering: &LayeringResult,
    previous: &PositionMap,
    config: &SolverConfig,
    should_stop: F,
) -> SolveResult
where
    F: Fn() -> bool,
{
    let n = view.node_count;
    let symmetric = mentee_offsets(view, layering, config);
    let kept = kept_positions(view, layering, &symmetric, previous, config);
    let offsets = stable_offsets(&symmetric, &kept, config);
    let reused = kept.iter().filter(|p| p.is_some()).count();
    let anchor: Vec<Option<f64>> = kept.iter().map(|p| p.map(|p| p.x)).collect();
    let (mut positions, components) = initial_positions(view, layering, &offsets, &kept, config);

    let target_y: Vec<f64> = layering.layers.iter().map(|&l| config.layer_y(l)).collect();

    let mut by_layer: BTreeMap<i64, Vec<NodeIndex>> = BTreeMap::new();
    for (idx, &layer) in layering.layers.iter().enumerate() {
        by_layer.entry(layer).or_default().push(idx);
    }

    let mut force = vec![Position::default(); n];
    let mut iterations = 0;
    let mut converged = false;
    let mut displacement = 0.0;
    let mut stopped = false;

    while iterations < config.max_iterations {
        if should_stop() {
            stopped = true;
            break;
        }
        iterations += 1;
        force.iter_mut().for_each(|f| *f = Position::default());

        // Layer pull, and anchors on kept nodes
        for i in 0..n {
            force[i].y += config.layer_pull * (target_y[i] - positions[i].y);
            if let Some(x) = anchor[i] {
                force[i].x += config.anchor_strength * (x - positions[i].x);
            }
        }

        // Edge attraction
        for (m, mentees) in offsets.iter().enumerate() {
            for &(child, offset) in mentees {
                let dx = positions[m].x + offset - positions[child].x;
                let f = config.edge_attraction * dx;
                force[child].x += f;
                if anchor[m].is_none() {
                    force[m].x -= f;
                }
            }
        }

        // Same-layer repulsion
        for group in by_layer.values() {
            for (slot, &a) in group.iter().enumerate() {
                for &b in &group[slot + 1..] {
                    let dx = positions[b].x - positions[a].x;
                    let dist = dx.abs();
                    if dist >= config.repulsion_radius {
                        continue;
                    }
                    let d = dist.max(MIN_DISTANCE);
                    let f = config.repulsion_strength * (1.0 / d - 1.0 / config.repulsion_radius);
                    // Exact overlap: the higher index moves right
                    let dir = if dx < 0.0 { -1.0 } else { 1.0 };
                    force[b].x += dir * f;
                    force[a].x -= dir * f;
                }
            }
        }

        let mut total = 0.0;
        for i in 0..n {
            let mut step = force[i];
            let len = (step.x * step.x + step.y * step.y).sqrt();
            if len > config.max_step {
                let scale = config.max_step / len;
                step.x *= scale;
                step.y *= scale;
            }
            positions[i].x += step.x;
            positions[i].y += step.y;
            total += len.min(config.max_step);
        }

        displacement = total;
        if total < config.epsilon {
            converged = true;
            break;
        }
    }

    SolveResult {
        positions,
        iterations,
        converged,
        displacement,
        reused,
        placed: n - reused,
        components,
        stopped,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::EdgeKind;
    use crate::layering::assign_layers;

    fn view(nodes: &[(&str, Option<i64>)], edges: &[(&str, &str, EdgeKind)]) -> LayoutView {
        LayoutView::from_edges(
            nodes.iter().map(|(id, l)| (id.to_string(), *l)).collect(),
            edges.iter().map(|(s, t, k)| (*s, *t, *k)),
        )
    }

    fn run(v: &LayoutView, previous: &PositionMap) -> PositionMap {
        let layering = assign_layers(v);
        solve(v, &layering, previous, &SolverConfig::default()).position_map(v)
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(SolverConfig::default().validate().is_ok());

        let bad = SolverConfig { layer_pull: 0.0, ..SolverConfig::default() };
        assert!(bad.validate().is_err());

        let bad = SolverConfig { repulsion_radius: f64::NAN, ..SolverConfig::default() };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_siblings_share_a_band() {
        let v = view(
            &[("a", Some(0)), ("b", None), ("c", None)],
            &[("a", "b", EdgeKind::Mentorship), ("a", "c", EdgeKind::Adoption)],
        );
        let positions = run(&v, &PositionMap::new());

        let a = positions["a"];
        let b = positions["b"];
        let c = positions["c"];
        assert!((b.y - c.y).abs() < 1e-9);
        assert!(b.y > a.y);
        assert!((b.x - c.x).abs() >= 100.0);
    }

    #[test]
    fn test_deterministic_output() {
        let v = view(
            &[("a", None), ("b", None), ("c", None), ("d", None), ("e", Some(1))],
            &[
                ("a", "b", EdgeKind::Mentorship),
                ("a", "c", EdgeKind::Mentorship),
                ("a", "d", EdgeKind::Adoption),
                ("b", "a", EdgeKind::Adoption),
                ("e", "d", EdgeKind::Mentorship),
            ],
        );
        let mut previous = PositionMap::new();
        previous.insert("c".to_string(), Position::new(3.0, 140.0));
        previous.insert("d".to_string(), Position::new(3.5, 160.0));

        assert_eq!(run(&v, &previous), run(&v, &previous));
    }

    #[test]
    fn test_same_layer_overlap_is_resolved() {
        let v = view(&[("p", None), ("q", None)], &[]);
        let mut previous = PositionMap::new();
        previous.insert("p".to_string(), Position::new(0.0, 0.0));
        previous.insert("q".to_string(), Position::new(0.0, 0.0));

        // Both are anchored at 0, so they settle short of the full radius
        let positions = run(&v, &previous);
        let gap = positions["q"].x - positions["p"].x;
        assert!(gap > 0.75 * SolverConfig::default().repulsion_radius, "gap {}", gap);
    }

    #[test]
    fn test_layer_pull_moves_toward_band() {
        let v = view(&[("m", None), ("t", None)], &[("m", "t", EdgeKind::Mentorship)]);
        let mut previous = PositionMap::new();
        previous.insert("m".to_string(), Position::new(0.0, 0.0));
        previous.insert("t".to_string(), Position::new(0.0, 200.0));

        let positions = run(&v, &previous);
        let target = SolverConfig::default().layer_y(1);
        assert!((positions["t"].y - target).abs() < 3.0);
    }

    #[test]
    fn test_off_band_position_is_reseeded() {
        // t was laid out alone on layer 0 and is now m's mentee
        let v = view(&[("m", Some(0)), ("t", None)], &[("m", "t", EdgeKind::Mentorship)]);
        let mut previous = PositionMap::new();
        previous.insert("m".to_string(), Position::new(0.0, 0.0));
        previous.insert("t".to_string(), Position::new(360.0, 0.0));

        let layering = assign_layers(&v);
        let result = solve(&v, &layering, &previous, &SolverConfig::default());
        assert_eq!(result.reused, 1);
        assert_eq!(result.placed, 1);

        let positions = result.position_map(&v);
        assert_eq!(positions["m"], Position::new(0.0, 0.0));
        assert_eq!(positions["t"], Position::new(0.0, 150.0));
    }

    #[test]
    fn test_out_of_reach_position_is_reseeded() {
        let v = view(&[("m", Some(0)), ("t", Some(1))], &[("m", "t", EdgeKind::Adoption)]);
        let mut previous = PositionMap::new();
        previous.insert("m".to_string(), Position::new(0.0, 0.0));
        previous.insert("t".to_string(), Position::new(900.0, 150.0));

        let layering = assign_layers(&v);
        let result = solve(&v, &layering, &previous, &SolverConfig::default());
        assert_eq!(result.reused, 1);
        assert_eq!(result.position_map(&v)["t"], Position::new(0.0, 150.0));
    }

    #[test]
    fn test_new_mentee_is_appended() {
        let v = view(
            &[("m", Some(0)), ("a", None), ("b", None), ("c", None)],
            &[
                ("m", "a", EdgeKind::Mentorship),
                ("m", "b", EdgeKind::Adoption),
                ("m", "c", EdgeKind::Adoption),
            ],
        );
        let mut previous = PositionMap::new();
        previous.insert("m".to_string(), Position::new(0.0, 0.0));
        previous.insert("a".to_string(), Position::new(-60.0, 150.0));
        previous.insert("b".to_string(), Position::new(60.0, 150.0));

        let layering = assign_layers(&v);
        let result = solve(&v, &layering, &previous, &SolverConfig::default());
        assert!(result.converged);
        assert_eq!(result.iterations, 1);

        let positions = result.position_map(&v);
        assert_eq!(positions["m"], Position::new(0.0, 0.0));
        assert_eq!(positions["a"], Position::new(-60.0, 150.0));
        assert_eq!(positions["b"], Position::new(60.0, 150.0));
        assert_eq!(positions["c"], Position::new(180.0, 150.0));
    }

    #[test]
    fn test_stop_check_interrupts() {
        let v = view(&[("p", None), ("q", None)], &[]);
        let layering = assign_layers(&v);
        let result = solve_until(&v, &layering, &PositionMap::new(), &SolverConfig::default(), || true);
        assert!(result.stopped);
        assert_eq!(result.iterations, 0);

        let result = solve(&v, &layering, &PositionMap::new(), &SolverConfig::default());
        assert!(!result.stopped);
    }

    #[test]
    fn test_extreme_layers_stay_finite() {
        let config = SolverConfig { layer_origin: i64::MIN, ..SolverConfig::default() };
        assert!(config.layer_y(i64::MAX).is_finite());
        assert!(config.layer_y(i64::MAX) > 0.0);
    }

    #[test]
    fn test_previous_positions_are_reused() {
        let v = view(&[("m", None), ("t", None)], &[("m", "t", EdgeKind::Mentorship)]);
        let first = run(&v, &PositionMap::new());
        let second = run(&v, &first);

        for (id, p) in &first {
            assert!(p.distance(&second[id]) < 1.0);
        }
    }

    #[test]
    fn test_non_finite_previous_is_ignored() {
        let v = view(&[("m", None)], &[]);
        let mut previous = PositionMap::new();
        previous.insert("m".to_string(), Position::new(f64::NAN, 0.0));

        let layering = assign_layers(&v);
        let result = solve(&v, &layering, &previous, &SolverConfig::default());
        assert_eq!(result.reused, 0);
        assert_eq!(result.placed, 1);
        assert!(result.positions[0].is_finite());
    }

    #[test]
    fn test_budget_exhaustion_is_not_an_error() {
        let v = view(&[("p", None), ("q", None)], &[]);
        let mut previous = PositionMap::new();
        previous.insert("p".to_string(), Position::new(0.0, 0.0));
        previous.insert("q".to_string(), Position::new(0.0, 0.0));

        let layering = assign_layers(&v);
        let config = SolverConfig { max_iterations: 2, ..SolverConfig::default() };
        let result = solve(&v, &layering, &previous, &config);
        assert_eq!(result.iterations, 2);
        assert!(!result.converged);
    }

    #[test]
    fn test_new_components_are_placed_apart() {
        let v = view(
            &[("a", None), ("b", None), ("x", None), ("y", None)],
            &[("a", "b", EdgeKind::Mentorship), ("x", "y", EdgeKind::Mentorship)],
        );
        let layering = assign_layers(&v);
        let result = solve(&v, &layering, &PositionMap::new(), &SolverConfig::default());
        let positions = result.position_map(&v);

        assert_eq!(result.components, 2);
        assert!(positions["x"].x - positions["a"].x >= SolverConfig::default().component_gap);
    }
}
