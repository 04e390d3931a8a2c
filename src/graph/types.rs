//! Core type definitions for the mentorship graph

use mentorgraph_layout::EdgeKind;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

/// Stable, human-readable person identifier (e.g. `"ada.lovelace"`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(transparent)]
pub struct PersonId(String);

impl PersonId {
    pub fn new(id: impl Into<String>) -> Self {
        PersonId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for PersonId {
    fn from(s: String) -> Self {
        PersonId(s)
    }
}

impl From<&str> for PersonId {
    fn from(s: &str) -> Self {
        PersonId(s.to_string())
    }
}

impl Borrow<str> for PersonId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Relationship type. The mentor is always the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipKind {
    /// Official mentorship; a person has at most one official mentor
    #[serde(alias = "parrainage")]
    Mentorship,
    /// Secondary mentorship, exempt from the single-mentor rule
    Adoption,
}

impl RelationshipKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipKind::Mentorship => "mentorship",
            RelationshipKind::Adoption => "adoption",
        }
    }
}

impl fmt::Display for RelationshipKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RelationshipKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mentorship" | "parrainage" => Ok(RelationshipKind::Mentorship),
            "adoption" => Ok(RelationshipKind::Adoption),
            other => Err(format!("unknown relationship type '{}'", other)),
        }
    }
}

impl From<RelationshipKind> for EdgeKind {
    fn from(kind: RelationshipKind) -> Self {
        match kind {
            RelationshipKind::Mentorship => EdgeKind::Mentorship,
            RelationshipKind::Adoption => EdgeKind::Adoption,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_id() {
        let id = PersonId::new("ada.lovelace");
        assert_eq!(id.as_str(), "ada.lovelace");
        assert_eq!(format!("{}", id), "ada.lovelace");

        let id2: PersonId = "alan.turing".into();
        assert!(id < id2);
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("mentorship".parse::<RelationshipKind>(), Ok(RelationshipKind::Mentorship));
        assert_eq!("Parrainage".parse::<RelationshipKind>(), Ok(RelationshipKind::Mentorship));
        assert_eq!("adoption".parse::<RelationshipKind>(), Ok(RelationshipKind::Adoption));
        assert!("family1".parse::<RelationshipKind>().is_err());
    }

    #[test]
    fn test_kind_serde() {
        let json = serde_json::to_string(&RelationshipKind::Adoption).unwrap();
        assert_eq!(json, "\"adoption\"");

        let legacy: RelationshipKind = serde_json::from_str("\"parrainage\"").unwrap();
        assert_eq!(legacy, RelationshipKind::Mentorship);
    }
}
