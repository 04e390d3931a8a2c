//! Mentorgraph
//!
//! Layout engine for a mentorship graph: people are nodes, mentor -> mentee
//! relationships are directed edges. The engine assigns every person a
//! generation layer, solves stable 2D coordinates with a deterministic
//! force simulation, and persists them for a rendering client.
//!
//! # Architecture
//!
//! - [`graph`]: in-memory people and relationships, relationship policy
//! - [`layout`]: adapter onto the `mentorgraph-layout` algorithms crate
//!   (layering, solver, components)
//! - [`persistence`]: JSON data file directory, position stores, id migration
//! - [`jobs`]: out-of-band recalculation with a single-slot trigger queue
//! - [`viewport`]: smoothed pan/zoom camera for the client
//! - [`config`]: YAML engine configuration
//!
//! ## Example Usage
//!
//! ```rust
//! use mentorgraph::graph::{Graph, Person, Relationship};
//! use mentorgraph::layout::{compute_layout, PositionMap, SolverConfig};
//!
//! let mut graph = Graph::new();
//! graph.add_person(Person::new("ada", "Ada", "Lovelace").with_level(0)).unwrap();
//! graph.add_person(Person::new("alan", "Alan", "Turing")).unwrap();
//! graph.add_relationship(Relationship::mentorship("ada", "alan")).unwrap();
//!
//! let layout = compute_layout(&graph, &PositionMap::new(), &SolverConfig::default());
//! assert_eq!(layout.layers["alan"], 1);
//! assert!(layout.positions["alan"].y > layout.positions["ada"].y);
//! ```

#![allow(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod graph;
pub mod jobs;
pub mod layout;
pub mod persistence;
pub mod viewport;

// Re-export main types
pub use config::{ConfigError, ConfigResult, EngineConfig};
pub use graph::{
    Graph, GraphError, GraphExport, GraphResult, Person, PersonId, Relationship,
    RelationshipKind, RelationshipPolicy,
};
pub use jobs::{RecalcError, RecalcResult, RecalcStatus, RecalcWorker, Recalculator, TriggerOutcome};
pub use layout::{build_view, compute_layout, Layout, LayoutReport, Position, PositionMap, SolverConfig};
pub use persistence::{
    DataSource, Directory, DirectoryError, DirectoryResult, FilePositionStore, JsonFileSource,
    MemoryPositionStore, PositionStore, StoreError, StoreResult,
};
pub use viewport::{Camera, CameraState};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        let ver = version();
        assert!(!ver.is_empty());
        assert_eq!(ver, env!("CARGO_PKG_VERSION"));
    }
}
