//! Graph export served to the rendering client

use super::person::Person;
use super::relationship::Relationship;
use super::types::PersonId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// People keyed by id, plus the relationship list
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphExport {
    pub people: BTreeMap<PersonId, Person>,
    pub relationships: Vec<Relationship>,
}

impl GraphExport {
    pub fn new<P, R>(people: P, relationships: R) -> Self
    where
        P: IntoIterator<Item = Person>,
        R: IntoIterator<Item = Relationship>,
    {
        GraphExport {
            people: people.into_iter().map(|p| (p.id.clone(), p)).collect(),
            relationships: relationships.into_iter().collect(),
        }
    }

    pub fn person_count(&self) -> usize {
        self.people.len()
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_shape() {
        let export = GraphExport::new(
            vec![Person::new("b", "B", "B"), Person::new("a", "A", "A")],
            vec![Relationship::mentorship("a", "b")],
        );
        let json: serde_json::Value = serde_json::from_str(&export.to_json_pretty().unwrap()).unwrap();

        assert_eq!(json["people"]["a"]["first_name"], "A");
        assert_eq!(json["relationships"][0]["type"], "mentorship");
        assert_eq!(export.person_count(), 2);
    }
}
