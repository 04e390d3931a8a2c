//! Relationship invariants
//!
//! One policy is enforced everywhere a relationship can be created: the
//! in-memory [`Graph`](super::Graph) and the [`Directory`](crate::persistence::Directory)
//! both validate through [`RelationshipPolicy::check`].

use super::relationship::Relationship;
use super::store::{GraphError, GraphResult};
use super::types::{PersonId, RelationshipKind};
use serde::{Deserialize, Serialize};

/// Read access needed to validate a new relationship
pub trait RelationshipIndex {
    fn contains_person(&self, id: &PersonId) -> bool;

    /// Exact `(source, target, kind)` triple already present
    fn contains_relationship(&self, rel: &Relationship) -> bool;

    /// Any relationship from `source` to `target`, whatever its kind
    fn has_edge_between(&self, source: &PersonId, target: &PersonId) -> bool;

    /// Outgoing mentorship + adoption edges of a mentor
    fn mentee_count(&self, mentor: &PersonId) -> usize;

    /// Source of the incoming mentorship edge, if any
    fn official_mentor(&self, mentee: &PersonId) -> Option<PersonId>;
}

/// Limits applied when a relationship is created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelationshipPolicy {
    /// Maximum outgoing edges (both kinds combined) per mentor
    pub max_mentees: usize,
    /// At most one incoming `mentorship` edge per mentee
    pub single_official_mentor: bool,
    /// Refuse `b -> a` while `a -> b` exists
    pub reject_reciprocal: bool,
}

impl Default for RelationshipPolicy {
    fn default() -> Self {
        Self {
            max_mentees: 3,
            single_official_mentor: true,
            reject_reciprocal: true,
        }
    }
}

impl RelationshipPolicy {
    /// Validate `rel` against `index` without modifying anything
    pub fn check<I>(&self, index: &I, rel: &Relationship) -> GraphResult<()>
    where
        I: RelationshipIndex + ?Sized,
    {
        if !index.contains_person(&rel.source) {
            return Err(GraphError::PersonNotFound(rel.source.clone()));
        }
        if !index.contains_person(&rel.target) {
            return Err(GraphError::PersonNotFound(rel.target.clone()));
        }
        if rel.source == rel.target {
            return Err(GraphError::SelfRelationship(rel.source.clone()));
        }
        if index.contains_relationship(rel) {
            return Err(GraphError::DuplicateRelationship {
                mentor: rel.source.clone(),
                mentee: rel.target.clone(),
                kind: rel.kind,
            });
        }
        if self.reject_reciprocal && index.has_edge_between(&rel.target, &rel.source) {
            return Err(GraphError::ReciprocalRelationship {
                mentor: rel.source.clone(),
                mentee: rel.target.clone(),
            });
        }
        if index.mentee_count(&rel.source) >= self.max_mentees {
            return Err(GraphError::MenteeLimitReached {
                mentor: rel.source.clone(),
                limit: self.max_mentees,
            });
        }
        if self.single_official_mentor && rel.kind == RelationshipKind::Mentorship {
            if let Some(mentor) = index.official_mentor(&rel.target) {
                return Err(GraphError::OfficialMentorTaken {
                    mentee: rel.target.clone(),
                    mentor,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[derive(Default)]
    struct Rows {
        people: HashSet<PersonId>,
        rels: Vec<Relationship>,
    }

    impl RelationshipIndex for Rows {
        fn contains_person(&self, id: &PersonId) -> bool {
            self.people.contains(id)
        }
        fn contains_relationship(&self, rel: &Relationship) -> bool {
            self.rels.contains(rel)
        }
        fn has_edge_between(&self, source: &PersonId, target: &PersonId) -> bool {
            self.rels.iter().any(|r| &r.source == source && &r.target == target)
        }
        fn mentee_count(&self, mentor: &PersonId) -> usize {
            self.rels.iter().filter(|r| &r.source == mentor).count()
        }
        fn official_mentor(&self, mentee: &PersonId) -> Option<PersonId> {
            self.rels
                .iter()
                .find(|r| &r.target == mentee && r.kind == RelationshipKind::Mentorship)
                .map(|r| r.source.clone())
        }
    }

    fn rows(ids: &[&str], rels: Vec<Relationship>) -> Rows {
        Rows {
            people: ids.iter().map(|id| PersonId::from(*id)).collect(),
            rels,
        }
    }

    #[test]
    fn test_fourth_mentee_is_rejected() {
        let index = rows(
            &["m", "a", "b", "c", "d"],
            vec![
                Relationship::mentorship("m", "a"),
                Relationship::adoption("m", "b"),
                Relationship::adoption("m", "c"),
            ],
        );
        let err = RelationshipPolicy::default()
            .check(&index, &Relationship::adoption("m", "d"))
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::MenteeLimitReached { mentor: "m".into(), limit: 3 }
        );
    }

    #[test]
    fn test_second_official_mentor_is_rejected() {
        let index = rows(&["m1", "m2", "t"], vec![Relationship::mentorship("m1", "t")]);
        let policy = RelationshipPolicy::default();

        assert!(matches!(
            policy.check(&index, &Relationship::mentorship("m2", "t")),
            Err(GraphError::OfficialMentorTaken { .. })
        ));
        // Adoption is exempt
        assert!(policy.check(&index, &Relationship::adoption("m2", "t")).is_ok());

        let relaxed = RelationshipPolicy { single_official_mentor: false, ..policy };
        assert!(relaxed.check(&index, &Relationship::mentorship("m2", "t")).is_ok());
    }

    #[test]
    fn test_duplicate_and_parallel_kinds() {
        let index = rows(&["a", "b"], vec![Relationship::mentorship("a", "b")]);
        let policy = RelationshipPolicy::default();

        assert!(matches!(
            policy.check(&index, &Relationship::mentorship("a", "b")),
            Err(GraphError::DuplicateRelationship { .. })
        ));
        assert!(policy.check(&index, &Relationship::adoption("a", "b")).is_ok());
    }

    #[test]
    fn test_reciprocal_and_self() {
        let index = rows(&["a", "b"], vec![Relationship::mentorship("a", "b")]);
        let policy = RelationshipPolicy::default();

        assert!(matches!(
            policy.check(&index, &Relationship::adoption("b", "a")),
            Err(GraphError::ReciprocalRelationship { .. })
        ));
        assert!(matches!(
            policy.check(&index, &Relationship::adoption("a", "a")),
            Err(GraphError::SelfRelationship(_))
        ));

        let permissive = RelationshipPolicy { reject_reciprocal: false, ..policy };
        assert!(permissive.check(&index, &Relationship::adoption("b", "a")).is_ok());
    }

    #[test]
    fn test_unknown_person() {
        let index = rows(&["a"], vec![]);
        assert_eq!(
            RelationshipPolicy::default().check(&index, &Relationship::mentorship("a", "zed")),
            Err(GraphError::PersonNotFound("zed".into()))
        );
    }
}
