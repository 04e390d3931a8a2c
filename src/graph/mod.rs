//! Mentorship graph data model
//!
//! People are nodes, relationships are directed mentor -> mentee edges of
//! kind `mentorship` (official, at most one per mentee) or `adoption`.

pub mod export;
pub mod person;
pub mod policy;
pub mod relationship;
pub mod store;
pub mod types;

// Re-export main types
pub use export::GraphExport;
pub use person::Person;
pub use policy::{RelationshipIndex, RelationshipPolicy};
pub use relationship::Relationship;
pub use store::{Graph, GraphError, GraphResult};
pub use types::{PersonId, RelationshipKind};
