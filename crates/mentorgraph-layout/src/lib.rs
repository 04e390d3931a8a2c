//! Layout algorithms for mentorship graphs
//!
//! - [`layering`]: generational layer assignment with deterministic cycle breaking
//! - [`solver`]: force-directed positioning seeded from previous coordinates
//! - [`components`]: weakly connected components
//!
//! All algorithms work on a [`LayoutView`], a dense CSR snapshot whose node
//! indices follow person-id order.

pub mod common;
pub mod components;
pub mod layering;
pub mod solver;

pub use common::{EdgeKind, LayoutView, NodeIndex, Position, PositionMap};
pub use components::{weakly_connected_components, ComponentResult};
pub use layering::{assign_layers, find_back_edges, LayeringResult};
pub use solver::{mentee_offsets, solve, solve_until, SolveResult, SolverConfig};
