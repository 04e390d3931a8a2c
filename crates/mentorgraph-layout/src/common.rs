//! Shared types for layout algorithms
//!
//! Provides a read-only, index-addressed view of the mentorship graph. Node
//! indices are assigned in id order, so every pass that walks `0..node_count`
//! visits people in the same order on every run.

use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use std::ops::Range;

/// Dense node index (0..N), assigned in id order
pub type NodeIndex = usize;

/// Kind of a mentor -> mentee edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum EdgeKind {
    /// Official mentorship
    Mentorship,
    /// Secondary, non-official mentorship
    Adoption,
}

/// A 2D coordinate
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Position) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Coordinates keyed by person id. Ordered so serialized output is stable.
pub type PositionMap = BTreeMap<String, Position>;

/// A dense, integer-indexed view of the graph in Compressed Sparse Row form.
#[derive(Debug, Clone)]
pub struct LayoutView {
    /// Number of nodes
    pub node_count: usize,
    /// Mapping from dense index back to person id
    pub index_to_node: Vec<String>,
    /// Mapping from person id to dense index
    pub node_to_index: FxHashMap<String, NodeIndex>,
    /// Explicit level hint per node
    pub explicit_levels: Vec<Option<i64>>,

    /// Offsets into `out_targets`. Size = node_count + 1
    pub out_offsets: Vec<usize>,
    /// Target index of every edge, rows sorted by (target, kind)
    pub out_targets: Vec<NodeIndex>,
    /// Kind of every edge, aligned with `out_targets`
    pub out_kinds: Vec<EdgeKind>,

    /// Offsets into `in_sources`. Size = node_count + 1
    pub in_offsets: Vec<usize>,
    /// Source index of every incoming edge, rows sorted by source
    pub in_sources: Vec<NodeIndex>,
    /// Position of each incoming edge inside `out_targets`
    pub in_edges: Vec<usize>,

    /// Edges dropped because an endpoint was unknown
    pub skipped_edges: usize,
}

impl LayoutView {
    /// Build a view from `(id, explicit level)` pairs and `(source, target, kind)` edges.
    ///
    /// Duplicate ids keep their first occurrence. Edges naming an unknown id
    /// are counted in `skipped_edges` and otherwise ignored; exact duplicate
    /// edges collapse into one.
    pub fn from_edges<I, S>(nodes: Vec<(String, Option<i64>)>, edges: I) -> Self
    where
        I: IntoIterator<Item = (S, S, EdgeKind)>,
        S: AsRef<str>,
    {
        let mut nodes = nodes;
        nodes.sort_by(|a, b| a.0.cmp(&b.0));
        nodes.dedup_by(|later, earlier| later.0 == earlier.0);

        let node_count = nodes.len();
        let mut index_to_node = Vec::with_capacity(node_count);
        let mut explicit_levels = Vec::with_capacity(node_count);
        let mut node_to_index = FxHashMap::default();
        node_to_index.reserve(node_count);

        for (idx, (id, level)) in nodes.into_iter().enumerate() {
            node_to_index.insert(id.clone(), idx);
            index_to_node.push(id);
            explicit_levels.push(level);
        }

        let mut outgoing: Vec<Vec<(NodeIndex, EdgeKind)>> = vec![Vec::new(); node_count];
        let mut skipped_edges = 0;
        for (source, target, kind) in edges {
            match (
                node_to_index.get(source.as_ref()),
                node_to_index.get(target.as_ref()),
            ) {
                (Some(&u), Some(&v)) => outgoing[u].push((v, kind)),
                _ => skipped_edges += 1,
            }
        }

        let mut out_offsets = Vec::with_capacity(node_count + 1);
        let mut out_targets = Vec::new();
        let mut out_kinds = Vec::new();
        let mut incoming: Vec<Vec<(NodeIndex, usize)>> = vec![Vec::new(); node_count];

        out_offsets.push(0);
        for (u, mut row) in outgoing.into_iter().enumerate() {
            row.sort();
            row.dedup();
            for (v, kind) in row {
                incoming[v].push((u, out_targets.len()));
                out_targets.push(v);
                out_kinds.push(kind);
            }
            out_offsets.push(out_targets.len());
        }

        let mut in_offsets = Vec::with_capacity(node_count + 1);
        let mut in_sources = Vec::with_capacity(out_targets.len());
        let mut in_edges = Vec::with_capacity(out_targets.len());

        in_offsets.push(0);
        for row in incoming {
            for (u, edge) in row {
                in_sources.push(u);
                in_edges.push(edge);
            }
            in_offsets.push(in_sources.len());
        }

        LayoutView {
            node_count,
            index_to_node,
            node_to_index,
            explicit_levels,
            out_offsets,
            out_targets,
            out_kinds,
            in_offsets,
            in_sources,
            in_edges,
            skipped_edges,
        }
    }

    /// Total number of edges
    pub fn edge_count(&self) -> usize {
        self.out_targets.len()
    }

    /// Dense index of a person id
    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.node_to_index.get(id).copied()
    }

    /// Person id at a dense index
    pub fn id_of(&self, idx: NodeIndex) -> &str {
        &self.index_to_node[idx]
    }

    pub fn out_degree(&self, idx: NodeIndex) -> usize {
        self.out_offsets[idx + 1] - self.out_offsets[idx]
    }

    pub fn in_degree(&self, idx: NodeIndex) -> usize {
        self.in_offsets[idx + 1] - self.in_offsets[idx]
    }

    /// Edge positions (into `out_targets`) leaving a node
    pub fn out_edge_range(&self, idx: NodeIndex) -> Range<usize> {
        self.out_offsets[idx]..self.out_offsets[idx + 1]
    }

    /// Positions (into `in_sources` / `in_edges`) of edges entering a node
    pub fn in_edge_range(&self, idx: NodeIndex) -> Range<usize> {
        self.in_offsets[idx]..self.in_offsets[idx + 1]
    }

    /// Outgoing neighbours, possibly repeated once per edge kind
    pub fn successors(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.out_targets[self.out_edge_range(idx)]
    }

    /// Incoming neighbours, possibly repeated once per edge kind
    pub fn predecessors(&self, idx: NodeIndex) -> &[NodeIndex] {
        &self.in_sources[self.in_edge_range(idx)]
    }
}
