//! Weakly connected components
//!
//! Used to keep the roots of a brand-new subgraph next to each other when the
//! solver has to invent starting positions.

use super::common::{LayoutView, NodeIndex};

/// Result of component detection
#[derive(Debug, Clone)]
pub struct ComponentResult {
    /// Component id per node. Ids are dense and numbered in order of each
    /// component's smallest node index.
    pub component_of: Vec<usize>,
    /// Number of components
    pub count: usize,
}

impl ComponentResult {
    /// Members of every component, each list in index order
    pub fn members(&self) -> Vec<Vec<NodeIndex>> {
        let mut members = vec![Vec::new(); self.count];
        for (idx, &component) in self.component_of.iter().enumerate() {
            members[component].push(idx);
        }
        members
    }
}

/// Union-Find data structure
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<usize>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        UnionFind {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, i: usize) -> usize {
        let mut root = i;
        while self.parent[root] != root {
            root = self.parent[root];
        }
        // Path compression
        let mut cur = i;
        while self.parent[cur] != root {
            let next = self.parent[cur];
            self.parent[cur] = root;
            cur = next;
        }
        root
    }

    fn union(&mut self, i: usize, j: usize) {
        let root_i = self.find(i);
        let root_j = self.find(j);

        if root_i != root_j {
            if self.rank[root_i] < self.rank[root_j] {
                self.parent[root_i] = root_j;
            } else if self.rank[root_i] > self.rank[root_j] {
                self.parent[root_j] = root_i;
            } else {
                self.parent[root_j] = root_i;
                self.rank[root_i] += 1;
            }
        }
    }
}

/// Weakly connected components, ignoring edge direction and kind.
pub fn weakly_connected_components(view: &LayoutView) -> ComponentResult {
    let n = view.node_count;
    let mut uf = UnionFind::new(n);

    for u in 0..n {
        for &v in view.successors(u) {
            uf.union(u, v);
        }
    }

    let mut dense = vec![usize::MAX; n];
    let mut component_of = Vec::with_capacity(n);
    let mut count = 0;

    for i in 0..n {
        let root = uf.find(i);
        if dense[root] == usize::MAX {
            dense[root] = count;
            count += 1;
        }
        component_of.push(dense[root]);
    }

    ComponentResult { component_of, count }
}
