//! Directed mentor -> mentee relationships

use super::types::{PersonId, RelationshipKind};
use serde::{Deserialize, Serialize};

/// A directed relationship. `source` is the mentor, `target` the mentee.
///
/// Serialized as `{source, target, type}`, the shape the rendering client reads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct Relationship {
    pub source: PersonId,
    pub target: PersonId,
    #[serde(rename = "type")]
    pub kind: RelationshipKind,
}

impl Relationship {
    pub fn new(
        source: impl Into<PersonId>,
        target: impl Into<PersonId>,
        kind: RelationshipKind,
    ) -> Self {
        Relationship {
            source: source.into(),
            target: target.into(),
            kind,
        }
    }

    pub fn mentorship(source: impl Into<PersonId>, target: impl Into<PersonId>) -> Self {
        Self::new(source, target, RelationshipKind::Mentorship)
    }

    pub fn adoption(source: impl Into<PersonId>, target: impl Into<PersonId>) -> Self {
        Self::new(source, target, RelationshipKind::Adoption)
    }

    /// True if both ends touch `id`
    pub fn involves(&self, id: &PersonId) -> bool {
        &self.source == id || &self.target == id
    }

    /// Same pair in the opposite direction, any kind
    pub fn is_reverse_of(&self, other: &Relationship) -> bool {
        self.source == other.target && self.target == other.source
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_wire_format() {
        let rel = Relationship::adoption("a", "b");
        let json = serde_json::to_value(&rel).unwrap();
        assert_eq!(json["source"], "a");
        assert_eq!(json["target"], "b");
        assert_eq!(json["type"], "adoption");
    }

    #[test]
    fn test_reverse_detection() {
        let ab = Relationship::mentorship("a", "b");
        let ba = Relationship::adoption("b", "a");
        assert!(ba.is_reverse_of(&ab));
        assert!(!ab.is_reverse_of(&ab));
        assert!(ab.involves(&PersonId::from("b")));
    }
}
