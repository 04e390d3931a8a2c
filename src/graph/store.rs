//! In-memory mentorship graph
//!
//! Arena storage with free-slot reuse and per-person adjacency lists.
//! Every mutation that creates a relationship goes through the
//! [`RelationshipPolicy`], so a live `Graph` never holds a duplicate triple,
//! a self-relationship, or more mentees than the policy allows. Data loaded
//! from disk is treated more leniently by [`Graph::build`].

use super::export::GraphExport;
use super::person::Person;
use super::policy::{RelationshipIndex, RelationshipPolicy};
use super::relationship::Relationship;
use super::types::{PersonId, RelationshipKind};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur during graph operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    #[error("Person {0} not found")]
    PersonNotFound(PersonId),

    #[error("Person {0} already exists")]
    PersonAlreadyExists(PersonId),

    #[error("Relationship {mentor} -> {mentee} ({kind}) not found")]
    RelationshipNotFound {
        mentor: PersonId,
        mentee: PersonId,
        kind: RelationshipKind,
    },

    #[error("Relationship {mentor} -> {mentee} ({kind}) already exists")]
    DuplicateRelationship {
        mentor: PersonId,
        mentee: PersonId,
        kind: RelationshipKind,
    },

    #[error("{0} cannot mentor themselves")]
    SelfRelationship(PersonId),

    #[error("{mentee} already mentors {mentor}; reciprocal relationships are not allowed")]
    ReciprocalRelationship { mentor: PersonId, mentee: PersonId },

    #[error("{mentor} already has {limit} mentees")]
    MenteeLimitReached { mentor: PersonId, limit: usize },

    #[error("{mentee} already has an official mentor ({mentor})")]
    OfficialMentorTaken { mentee: PersonId, mentor: PersonId },
}

pub type GraphResult<T> = Result<T, GraphError>;

#[derive(Debug, Clone, Copy)]
struct EdgeSlot {
    source: usize,
    target: usize,
    kind: RelationshipKind,
}

/// In-memory mentorship graph
///
/// - people: slot -> Person
/// - edges: slot -> (source slot, target slot, kind)
/// - outgoing / incoming: person slot -> edge slots
/// - index: PersonId -> person slot
#[derive(Debug, Clone, Default)]
pub struct Graph {
    people: Vec<Option<Person>>,
    edges: Vec<Option<EdgeSlot>>,
    outgoing: Vec<Vec<usize>>,
    incoming: Vec<Vec<usize>>,
    index: HashMap<PersonId, usize>,
    free_person_slots: Vec<usize>,
    free_edge_slots: Vec<usize>,
    policy: RelationshipPolicy,
    person_count: usize,
    relationship_count: usize,
    skipped_relationships: usize,
}

impl Graph {
    /// Create an empty graph with the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty graph with a custom policy
    pub fn with_policy(policy: RelationshipPolicy) -> Self {
        Graph {
            policy,
            ..Self::default()
        }
    }

    /// Build a graph from persisted rows.
    ///
    /// People are inserted in id order; a repeated id keeps the first record.
    /// Relationships pointing at unknown people and repeated triples are
    /// skipped with a warning. Rows that break the fan-out, official-mentor
    /// or reciprocity rules are kept (the data predates the rule) and logged.
    pub fn build<P, R>(people: P, relationships: R) -> Self
    where
        P: IntoIterator<Item = Person>,
        R: IntoIterator<Item = Relationship>,
    {
        Self::build_with_policy(people, relationships, RelationshipPolicy::default())
    }

    /// [`Graph::build`] with a custom policy
    pub fn build_with_policy<P, R>(people: P, relationships: R, policy: RelationshipPolicy) -> Self
    where
        P: IntoIterator<Item = Person>,
        R: IntoIterator<Item = Relationship>,
    {
        let mut graph = Self::with_policy(policy);

        let mut people: Vec<Person> = people.into_iter().collect();
        people.sort_by(|a, b| a.id.cmp(&b.id));
        for person in people {
            if let Err(e) = graph.add_person(person) {
                warn!("Skipping person row: {}", e);
            }
        }

        for rel in relationships {
            match graph.policy.check(&graph, &rel) {
                Ok(()) => {}
                Err(e @ GraphError::PersonNotFound(_))
                | Err(e @ GraphError::DuplicateRelationship { .. }) => {
                    warn!("Skipping relationship {} -> {}: {}", rel.source, rel.target, e);
                    graph.skipped_relationships += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Keeping stored relationship that breaks policy: {}", e);
                }
            }
            if let Err(e) = graph.insert_edge(&rel) {
                warn!("Skipping relationship {} -> {}: {}", rel.source, rel.target, e);
                graph.skipped_relationships += 1;
            }
        }

        debug!(
            "Built graph: {} people, {} relationships, {} skipped",
            graph.person_count, graph.relationship_count, graph.skipped_relationships
        );
        graph
    }

    pub fn policy(&self) -> &RelationshipPolicy {
        &self.policy
    }

    /// Add a person. Ids must be unique.
    pub fn add_person(&mut self, person: Person) -> GraphResult<()> {
        if self.index.contains_key(&person.id) {
            return Err(GraphError::PersonAlreadyExists(person.id));
        }

        let slot = if let Some(slot) = self.free_person_slots.pop() {
            slot
        } else {
            self.people.push(None);
            self.outgoing.push(Vec::new());
            self.incoming.push(Vec::new());
            self.people.len() - 1
        };

        self.index.insert(person.id.clone(), slot);
        self.people[slot] = Some(person);
        self.person_count += 1;
        Ok(())
    }

    /// Replace the record of an existing person, keeping their relationships
    pub fn update_person(&mut self, person: Person) -> GraphResult<()> {
        let slot = self.slot_of(&person.id)?;
        self.people[slot] = Some(person);
        Ok(())
    }

    /// Remove a person together with every relationship touching them.
    /// Returns the removed record and relationships.
    pub fn remove_person(&mut self, id: &PersonId) -> GraphResult<(Person, Vec<Relationship>)> {
        let slot = self.slot_of(id)?;

        let mut edge_slots: Vec<usize> = self.outgoing[slot]
            .iter()
            .chain(self.incoming[slot].iter())
            .copied()
            .collect();
        edge_slots.sort_unstable();
        edge_slots.dedup();

        let mut removed = Vec::with_capacity(edge_slots.len());
        for edge in edge_slots {
            if let Some(rel) = self.relationship_at(edge) {
                removed.push(rel);
            }
            self.drop_edge(edge);
        }

        let person = self.people[slot]
            .take()
            .ok_or_else(|| GraphError::PersonNotFound(id.clone()))?;
        self.index.remove(id);
        self.free_person_slots.push(slot);
        self.person_count -= 1;
        Ok((person, removed))
    }

    /// Add a relationship after validating it against the policy
    pub fn add_relationship(&mut self, rel: Relationship) -> GraphResult<()> {
        self.policy.check(self, &rel)?;
        self.insert_edge(&rel)
    }

    /// Remove one exact `(source, target, kind)` triple
    pub fn remove_relationship(&mut self, rel: &Relationship) -> GraphResult<()> {
        let edge = self.find_edge(rel).ok_or_else(|| GraphError::RelationshipNotFound {
            mentor: rel.source.clone(),
            mentee: rel.target.clone(),
            kind: rel.kind,
        })?;
        self.drop_edge(edge);
        Ok(())
    }

    pub fn get_person(&self, id: &PersonId) -> Option<&Person> {
        self.index.get(id).and_then(|&slot| self.people[slot].as_ref())
    }

    pub fn has_person(&self, id: &PersonId) -> bool {
        self.index.contains_key(id)
    }

    /// All people, in storage order
    pub fn people(&self) -> impl Iterator<Item = &Person> {
        self.people.iter().filter_map(|p| p.as_ref())
    }

    /// All relationships, in storage order
    pub fn relationships(&self) -> impl Iterator<Item = Relationship> + '_ {
        (0..self.edges.len()).filter_map(move |edge| self.relationship_at(edge))
    }

    /// Incoming relationships of `id` as `(mentor, kind)`
    pub fn mentors_of(&self, id: &PersonId) -> Vec<(&PersonId, RelationshipKind)> {
        let Some(&slot) = self.index.get(id) else {
            return Vec::new();
        };
        self.incoming[slot]
            .iter()
            .filter_map(|&edge| self.edges[edge])
            .filter_map(|e| self.id_at(e.source).map(|src| (src, e.kind)))
            .collect()
    }

    /// Outgoing relationships of `id` as `(mentee, kind)`
    pub fn mentees_of(&self, id: &PersonId) -> Vec<(&PersonId, RelationshipKind)> {
        let Some(&slot) = self.index.get(id) else {
            return Vec::new();
        };
        self.outgoing[slot]
            .iter()
            .filter_map(|&edge| self.edges[edge])
            .filter_map(|e| self.id_at(e.target).map(|tgt| (tgt, e.kind)))
            .collect()
    }

    pub fn person_count(&self) -> usize {
        self.person_count
    }

    pub fn relationship_count(&self) -> usize {
        self.relationship_count
    }

    /// Relationship rows dropped by [`Graph::build`]
    pub fn skipped_relationships(&self) -> usize {
        self.skipped_relationships
    }

    pub fn is_empty(&self) -> bool {
        self.person_count == 0
    }

    /// Snapshot of people keyed by id plus the relationship list
    pub fn export(&self) -> GraphExport {
        GraphExport::new(self.people().cloned(), self.relationships())
    }

    fn slot_of(&self, id: &PersonId) -> GraphResult<usize> {
        self.index
            .get(id)
            .copied()
            .ok_or_else(|| GraphError::PersonNotFound(id.clone()))
    }

    fn id_at(&self, slot: usize) -> Option<&PersonId> {
        self.people.get(slot).and_then(|p| p.as_ref()).map(|p| &p.id)
    }

    fn relationship_at(&self, edge: usize) -> Option<Relationship> {
        let e = self.edges.get(edge).copied().flatten()?;
        Some(Relationship::new(
            self.id_at(e.source)?.clone(),
            self.id_at(e.target)?.clone(),
            e.kind,
        ))
    }

    fn find_edge(&self, rel: &Relationship) -> Option<usize> {
        let source = *self.index.get(&rel.source)?;
        let target = *self.index.get(&rel.target)?;
        self.outgoing[source].iter().copied().find(|&edge| {
            matches!(self.edges[edge], Some(e) if e.target == target && e.kind == rel.kind)
        })
    }

    fn insert_edge(&mut self, rel: &Relationship) -> GraphResult<()> {
        let source = self.slot_of(&rel.source)?;
        let target = self.slot_of(&rel.target)?;

        let slot = if let Some(slot) = self.free_edge_slots.pop() {
            slot
        } else {
            self.edges.push(None);
            self.edges.len() - 1
        };

        self.edges[slot] = Some(EdgeSlot {
            source,
            target,
            kind: rel.kind,
        });
        self.outgoing[source].push(slot);
        self.incoming[target].push(slot);
        self.relationship_count += 1;
        Ok(())
    }

    fn drop_edge(&mut self, edge: usize) {
        let Some(e) = self.edges.get_mut(edge).and_then(|e| e.take()) else {
            return;
        };
        self.outgoing[e.source].retain(|&x| x != edge);
        self.incoming[e.target].retain(|&x| x != edge);
        self.free_edge_slots.push(edge);
        self.relationship_count -= 1;
    }
}

impl RelationshipIndex for Graph {
    fn contains_person(&self, id: &PersonId) -> bool {
        self.has_person(id)
    }

    fn contains_relationship(&self, rel: &Relationship) -> bool {
        self.find_edge(rel).is_some()
    }

    fn has_edge_between(&self, source: &PersonId, target: &PersonId) -> bool {
        let (Some(&s), Some(&t)) = (self.index.get(source), self.index.get(target)) else {
            return false;
        };
        self.outgoing[s]
            .iter()
            .any(|&edge| matches!(self.edges[edge], Some(e) if e.target == t))
    }

    fn mentee_count(&self, mentor: &PersonId) -> usize {
        self.index
            .get(mentor)
            .map(|&slot| self.outgoing[slot].len())
            .unwrap_or(0)
    }

    fn official_mentor(&self, mentee: &PersonId) -> Option<PersonId> {
        let slot = *self.index.get(mentee)?;
        self.incoming[slot]
            .iter()
            .filter_map(|&edge| self.edges[edge])
            .find(|e| e.kind == RelationshipKind::Mentorship)
            .and_then(|e| self.id_at(e.source).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn person(id: &str) -> Person {
        Person::new(id, id, "")
    }

    fn graph_with(ids: &[&str]) -> Graph {
        let mut graph = Graph::new();
        for id in ids {
            graph.add_person(person(id)).unwrap();
        }
        graph
    }

    #[test]
    fn test_add_and_get_person() {
        let mut graph = graph_with(&["ada"]);
        assert_eq!(graph.person_count(), 1);
        assert!(graph.get_person(&"ada".into()).is_some());

        let result = graph.add_person(person("ada"));
        assert_eq!(result, Err(GraphError::PersonAlreadyExists("ada".into())));
    }

    #[test]
    fn test_add_relationship_validates() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_relationship(Relationship::mentorship("a", "b")).unwrap();
        assert_eq!(graph.relationship_count(), 1);

        let result = graph.add_relationship(Relationship::mentorship("a", "zed"));
        assert_eq!(result, Err(GraphError::PersonNotFound("zed".into())));

        let result = graph.add_relationship(Relationship::mentorship("b", "a"));
        assert!(matches!(result, Err(GraphError::ReciprocalRelationship { .. })));
        assert_eq!(graph.relationship_count(), 1);
    }

    #[test]
    fn test_fan_out_cap() {
        let mut graph = graph_with(&["m", "a", "b", "c", "d"]);
        graph.add_relationship(Relationship::mentorship("m", "a")).unwrap();
        graph.add_relationship(Relationship::mentorship("m", "b")).unwrap();
        graph.add_relationship(Relationship::adoption("m", "c")).unwrap();

        let result = graph.add_relationship(Relationship::adoption("m", "d"));
        assert!(matches!(result, Err(GraphError::MenteeLimitReached { limit: 3, .. })));
        assert_eq!(graph.mentees_of(&"m".into()).len(), 3);
    }

    #[test]
    fn test_remove_person_cascades() {
        let mut graph = graph_with(&["a", "b", "c"]);
        graph.add_relationship(Relationship::mentorship("a", "b")).unwrap();
        graph.add_relationship(Relationship::mentorship("b", "c")).unwrap();

        let (removed, rels) = graph.remove_person(&"b".into()).unwrap();
        assert_eq!(removed.id.as_str(), "b");
        assert_eq!(rels.len(), 2);
        assert_eq!(graph.relationship_count(), 0);
        assert!(graph.mentees_of(&"a".into()).is_empty());
        assert!(graph.mentors_of(&"c".into()).is_empty());
    }

    #[test]
    fn test_slot_reuse() {
        let mut graph = graph_with(&["a", "b"]);
        graph.remove_person(&"a".into()).unwrap();
        graph.add_person(person("c")).unwrap();

        assert_eq!(graph.person_count(), 2);
        assert_eq!(graph.people.len(), 2);
        graph.add_relationship(Relationship::mentorship("c", "b")).unwrap();
        assert_eq!(graph.mentors_of(&"b".into())[0].0.as_str(), "c");
    }

    #[test]
    fn test_remove_relationship() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_relationship(Relationship::mentorship("a", "b")).unwrap();
        graph.add_relationship(Relationship::adoption("a", "b")).unwrap();

        graph.remove_relationship(&Relationship::mentorship("a", "b")).unwrap();
        let remaining: Vec<Relationship> = graph.relationships().collect();
        assert_eq!(remaining, vec![Relationship::adoption("a", "b")]);

        let result = graph.remove_relationship(&Relationship::mentorship("a", "b"));
        assert!(matches!(result, Err(GraphError::RelationshipNotFound { .. })));
    }

    #[test]
    fn test_relationship_errors_name_both_people() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_relationship(Relationship::mentorship("a", "b")).unwrap();

        let err = graph
            .add_relationship(Relationship::mentorship("a", "b"))
            .unwrap_err();
        assert_eq!(err.to_string(), "Relationship a -> b (mentorship) already exists");
        assert!(std::error::Error::source(&err).is_none());

        let err = graph
            .add_relationship(Relationship::adoption("b", "a"))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "a already mentors b; reciprocal relationships are not allowed"
        );
        assert!(std::error::Error::source(&err).is_none());
    }

    #[test]
    fn test_build_skips_bad_rows() {
        let people = vec![person("b"), person("a"), person("c"), person("a")];
        let rels = vec![
            Relationship::mentorship("a", "b"),
            Relationship::mentorship("a", "b"),
            Relationship::mentorship("a", "ghost"),
            // Second official mentor, kept with a warning
            Relationship::mentorship("c", "b"),
        ];

        let graph = Graph::build(people, rels);
        assert_eq!(graph.person_count(), 3);
        assert_eq!(graph.relationship_count(), 2);
        assert_eq!(graph.skipped_relationships(), 2);
        assert_eq!(graph.mentors_of(&"b".into()).len(), 2);
    }

    #[test]
    fn test_update_person_keeps_edges() {
        let mut graph = graph_with(&["a", "b"]);
        graph.add_relationship(Relationship::mentorship("a", "b")).unwrap();

        graph.update_person(person("b").with_level(3)).unwrap();
        assert_eq!(graph.get_person(&"b".into()).unwrap().level, Some(3));
        assert_eq!(graph.relationship_count(), 1);
    }
}
