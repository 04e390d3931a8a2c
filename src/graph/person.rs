//! Person records
//!
//! Only `id` and `level` matter to the layout; the display fields travel
//! along so the graph export can be served to the rendering client as-is.

use super::types::PersonId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A person in the mentorship graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    /// Unique identifier
    pub id: PersonId,

    /// Explicit generation (e.g. entry year). Pins the layer when set.
    #[serde(default)]
    pub level: Option<i64>,

    #[serde(alias = "prenom")]
    pub first_name: String,

    #[serde(alias = "nom")]
    pub last_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// External links by type, in display order
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub links: IndexMap<String, String>,
}

impl Person {
    /// Create a person with no level and no display extras
    pub fn new(
        id: impl Into<PersonId>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Person {
            id: id.into(),
            level: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            bio: None,
            image: None,
            links: IndexMap::new(),
        }
    }

    /// Builder-style explicit level
    pub fn with_level(mut self, level: i64) -> Self {
        self.level = Some(level);
        self
    }

    /// "First Last"
    pub fn display_name(&self) -> String {
        match (self.first_name.is_empty(), self.last_name.is_empty()) {
            (false, false) => format!("{} {}", self.first_name, self.last_name),
            (false, true) => self.first_name.clone(),
            (true, false) => self.last_name.clone(),
            (true, true) => self.id.to_string(),
        }
    }

    /// Add links from `other` whose type is not already present
    pub fn absorb_links(&mut self, other: &Person) {
        for (kind, url) in &other.links {
            if !self.links.contains_key(kind) && !self.links.values().any(|u| u == url) {
                self.links.insert(kind.clone(), url.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_person_creation() {
        let person = Person::new("ada.lovelace", "Ada", "Lovelace").with_level(2019);
        assert_eq!(person.id.as_str(), "ada.lovelace");
        assert_eq!(person.level, Some(2019));
        assert_eq!(person.display_name(), "Ada Lovelace");
    }

    #[test]
    fn test_legacy_field_names() {
        let json = r#"{"id": "jo.doe", "level": null, "prenom": "Jo", "nom": "Doe"}"#;
        let person: Person = serde_json::from_str(json).unwrap();
        assert_eq!(person.first_name, "Jo");
        assert_eq!(person.last_name, "Doe");
        assert!(person.level.is_none());
        assert!(person.links.is_empty());
    }

    #[test]
    fn test_links_keep_order() {
        let json = r#"{"id": "x", "first_name": "X", "last_name": "Y",
                       "links": {"website": "https://x.dev", "github": "https://github.com/x"}}"#;
        let person: Person = serde_json::from_str(json).unwrap();
        let kinds: Vec<&str> = person.links.keys().map(|k| k.as_str()).collect();
        assert_eq!(kinds, vec!["website", "github"]);
    }

    #[test]
    fn test_absorb_links() {
        let mut keep = Person::new("a", "A", "A");
        keep.links.insert("github".into(), "https://github.com/a".into());

        let mut other = Person::new("b", "B", "B");
        other.links.insert("github".into(), "https://github.com/b".into());
        other.links.insert("website".into(), "https://b.dev".into());

        keep.absorb_links(&other);
        assert_eq!(keep.links["github"], "https://github.com/a");
        assert_eq!(keep.links["website"], "https://b.dev");
    }
}
