//! People directory
//!
//! Owns the people and relationship rows, backed by a JSON data file:
//!
//! ```json
//! { "people": { "ada.lovelace": { "id": "ada.lovelace", ... } },
//!   "relationships": [ { "source": "...", "target": "...", "type": "mentorship" } ] }
//! ```
//!
//! `people` may also be a plain array. Rows are validated one by one on
//! read; a bad row is logged and skipped instead of failing the whole file.

use super::atomic::write_atomic;
use crate::graph::{
    Graph, GraphError, GraphExport, Person, PersonId, Relationship, RelationshipKind,
    RelationshipPolicy,
};
use indexmap::IndexMap;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use thiserror::Error;
use tracing::{debug, info, warn};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Directory errors
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Invalid person: {0}")]
    InvalidPerson(String),

    #[error("No relationship from {mentor} to {mentee}")]
    NoRelationship { mentor: PersonId, mentee: PersonId },

    #[error("Directory has no backing file")]
    NoPath,

    #[error("Directory lock poisoned")]
    LockPoisoned,
}

pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Read-only access to people and relationships
pub trait DataSource: Send + Sync {
    fn people(&self) -> DirectoryResult<Vec<Person>>;

    fn relationships(&self) -> DirectoryResult<Vec<Relationship>>;

    /// Consistent in-memory graph of the current rows
    fn snapshot(&self, policy: &RelationshipPolicy) -> DirectoryResult<Graph> {
        Ok(Graph::build_with_policy(
            self.people()?,
            self.relationships()?,
            policy.clone(),
        ))
    }
}

impl<T: DataSource> DataSource for RwLock<T> {
    fn people(&self) -> DirectoryResult<Vec<Person>> {
        self.read().map_err(|_| DirectoryError::LockPoisoned)?.people()
    }

    fn relationships(&self) -> DirectoryResult<Vec<Relationship>> {
        self.read()
            .map_err(|_| DirectoryError::LockPoisoned)?
            .relationships()
    }

    fn snapshot(&self, policy: &RelationshipPolicy) -> DirectoryResult<Graph> {
        let guard = self.read().map_err(|_| DirectoryError::LockPoisoned)?;
        guard.snapshot(policy)
    }
}

/// Result of a mutation, with whether positions need recomputing
#[derive(Debug, Clone, PartialEq)]
pub struct Change<T> {
    pub value: T,
    pub layout_changed: bool,
}

impl<T> Change<T> {
    fn structural(value: T) -> Self {
        Self {
            value,
            layout_changed: true,
        }
    }
}

/// Counts from [`Directory::merge_people`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeReport {
    /// Relationships moved onto the kept person
    pub repointed: usize,
    /// Relationships dropped as duplicates or self-relationships
    pub dropped: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PeopleRows {
    Map(IndexMap<String, serde_json::Value>),
    List(Vec<serde_json::Value>),
}

impl Default for PeopleRows {
    fn default() -> Self {
        PeopleRows::List(Vec::new())
    }
}

#[derive(Deserialize)]
struct DataFile {
    #[serde(default)]
    people: PeopleRows,
    #[serde(default)]
    relationships: Vec<serde_json::Value>,
}

#[derive(Deserialize)]
struct RelationshipRow {
    source: String,
    target: String,
    #[serde(rename = "type", alias = "kind")]
    kind: String,
}

fn parse_person(key: Option<&str>, mut raw: serde_json::Value) -> Option<Person> {
    // Map form may omit the id inside the record
    if let (Some(key), serde_json::Value::Object(fields)) = (key, &mut raw) {
        fields
            .entry("id")
            .or_insert_with(|| serde_json::Value::String(key.to_string()));
    }
    match serde_json::from_value::<Person>(raw) {
        Ok(person) if !person.id.as_str().trim().is_empty() => Some(person),
        Ok(_) => {
            warn!("Skipping person row with an empty id");
            None
        }
        Err(e) => {
            warn!("Skipping malformed person row {:?}: {}", key, e);
            None
        }
    }
}

fn parse_relationship(raw: serde_json::Value) -> Option<Relationship> {
    let row: RelationshipRow = match serde_json::from_value(raw) {
        Ok(row) => row,
        Err(e) => {
            warn!("Skipping malformed relationship row: {}", e);
            return None;
        }
    };
    if row.source.is_empty() || row.target.is_empty() {
        warn!("Skipping relationship row with an empty endpoint");
        return None;
    }
    match row.kind.parse::<RelationshipKind>() {
        Ok(kind) => Some(Relationship::new(row.source, row.target, kind)),
        Err(e) => {
            warn!("Skipping relationship {} -> {}: {}", row.source, row.target, e);
            None
        }
    }
}

/// Fold accents and lowercase: `"Élodie"` becomes `"elodie"`
pub fn fold_accents(s: &str) -> String {
    s.to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Person id derived from a name: `first.last`, lowercased, accents
/// stripped, anything outside `[a-z0-9.]` removed
pub fn person_slug(first_name: &str, last_name: &str) -> String {
    fold_accents(&format!("{}.{}", first_name, last_name))
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '.')
        .collect()
}

/// People and relationships, optionally backed by a data file
#[derive(Debug, Clone)]
pub struct Directory {
    path: Option<PathBuf>,
    graph: Graph,
    revision: u64,
}

impl Directory {
    /// Empty, in-memory directory
    pub fn new(policy: RelationshipPolicy) -> Self {
        Self {
            path: None,
            graph: Graph::with_policy(policy),
            revision: 0,
        }
    }

    /// Build from rows already in memory
    pub fn from_rows(
        people: Vec<Person>,
        relationships: Vec<Relationship>,
        policy: RelationshipPolicy,
    ) -> Self {
        Self {
            path: None,
            graph: Graph::build_with_policy(people, relationships, policy),
            revision: 0,
        }
    }

    /// Load a data file. A missing file opens an empty directory that will
    /// be created on the first save.
    pub fn open(path: impl AsRef<Path>, policy: RelationshipPolicy) -> DirectoryResult<Self> {
        let path = path.as_ref().to_path_buf();
        let mut directory = match std::fs::read_to_string(&path) {
            Ok(content) => Self::parse(&content, policy)?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("No data file at {:?}, starting with an empty directory", path);
                Self::new(policy)
            }
            Err(e) => return Err(e.into()),
        };
        directory.path = Some(path);
        Ok(directory)
    }

    /// Parse data file content
    pub fn parse(content: &str, policy: RelationshipPolicy) -> DirectoryResult<Self> {
        let file: DataFile = serde_json::from_str(content)?;

        let people: Vec<Person> = match file.people {
            PeopleRows::Map(rows) => rows
                .into_iter()
                .filter_map(|(key, raw)| parse_person(Some(&key), raw))
                .collect(),
            PeopleRows::List(rows) => rows
                .into_iter()
                .filter_map(|raw| parse_person(None, raw))
                .collect(),
        };
        let relationships: Vec<Relationship> = file
            .relationships
            .into_iter()
            .filter_map(parse_relationship)
            .collect();

        debug!(
            "Parsed {} people and {} relationships",
            people.len(),
            relationships.len()
        );
        Ok(Self::from_rows(people, relationships, policy))
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Incremented by every successful mutation
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Write the data file atomically
    pub fn save(&self) -> DirectoryResult<()> {
        let path = self.path.as_deref().ok_or(DirectoryError::NoPath)?;
        self.save_to(path)
    }

    pub fn save_to(&self, path: &Path) -> DirectoryResult<()> {
        let mut bytes = serde_json::to_vec_pretty(&self.export())?;
        bytes.push(b'\n');
        write_atomic(path, &bytes)?;
        info!(
            "Saved {} people and {} relationships to {:?}",
            self.graph.person_count(),
            self.graph.relationship_count(),
            path
        );
        Ok(())
    }

    pub fn export(&self) -> GraphExport {
        self.graph.export()
    }

    pub fn get_person(&self, id: &PersonId) -> Option<&Person> {
        self.graph.get_person(id)
    }

    /// Add a person. An empty id is derived from the name.
    pub fn create_person(&mut self, mut person: Person) -> DirectoryResult<Change<PersonId>> {
        if person.id.as_str().trim().is_empty() {
            let slug = person_slug(&person.first_name, &person.last_name);
            if slug.trim_matches('.').is_empty() {
                return Err(DirectoryError::InvalidPerson(
                    "cannot derive an id from an empty name".to_string(),
                ));
            }
            person.id = PersonId::new(slug);
        }

        let id = person.id.clone();
        self.graph.add_person(person)?;
        self.revision += 1;
        info!("Created person {}", id);
        Ok(Change::structural(id))
    }

    /// Replace a person's record. Only a level change affects the layout.
    pub fn update_person(&mut self, person: Person) -> DirectoryResult<Change<()>> {
        let previous_level = self
            .graph
            .get_person(&person.id)
            .map(|p| p.level)
            .ok_or_else(|| GraphError::PersonNotFound(person.id.clone()))?;
        let layout_changed = previous_level != person.level;

        self.graph.update_person(person)?;
        self.revision += 1;
        Ok(Change {
            value: (),
            layout_changed,
        })
    }

    /// Delete a person and every relationship touching them
    pub fn delete_person(&mut self, id: &PersonId) -> DirectoryResult<Change<Vec<Relationship>>> {
        let (_, removed) = self.graph.remove_person(id)?;
        self.revision += 1;
        info!("Deleted person {} and {} relationships", id, removed.len());
        Ok(Change::structural(removed))
    }

    /// Add a relationship after policy validation
    pub fn create_relationship(&mut self, rel: Relationship) -> DirectoryResult<Change<()>> {
        self.graph.add_relationship(rel.clone())?;
        self.revision += 1;
        info!("Created {} relationship {} -> {}", rel.kind, rel.source, rel.target);
        Ok(Change::structural(()))
    }

    /// Delete relationships from `source` to `target`, of one kind or all.
    /// Returns how many were removed.
    pub fn delete_relationship(
        &mut self,
        source: &PersonId,
        target: &PersonId,
        kind: Option<RelationshipKind>,
    ) -> DirectoryResult<Change<usize>> {
        let matching: Vec<Relationship> = self
            .graph
            .relationships()
            .filter(|r| &r.source == source && &r.target == target)
            .filter(|r| kind.map_or(true, |k| r.kind == k))
            .collect();
        if matching.is_empty() {
            return Err(DirectoryError::NoRelationship {
                mentor: source.clone(),
                mentee: target.clone(),
            });
        }

        for rel in &matching {
            self.graph.remove_relationship(rel)?;
        }
        self.revision += 1;
        Ok(Change::structural(matching.len()))
    }

    /// Fold `source` into `target`: its relationships are re-pointed to
    /// `target`, duplicates and self-relationships are dropped, missing links
    /// are copied over, then `source` is deleted.
    pub fn merge_people(
        &mut self,
        source: &PersonId,
        target: &PersonId,
    ) -> DirectoryResult<Change<MergeReport>> {
        if source == target {
            return Err(GraphError::SelfRelationship(source.clone()).into());
        }
        let merged = self
            .graph
            .get_person(source)
            .cloned()
            .ok_or_else(|| GraphError::PersonNotFound(source.clone()))?;
        let mut kept = self
            .graph
            .get_person(target)
            .cloned()
            .ok_or_else(|| GraphError::PersonNotFound(target.clone()))?;
        kept.absorb_links(&merged);
        if kept.level.is_none() {
            kept.level = merged.level;
        }

        let mut report = MergeReport::default();
        let mut rows: Vec<Relationship> = Vec::with_capacity(self.graph.relationship_count());
        for mut rel in self.graph.relationships() {
            let touched = rel.involves(source);
            if &rel.source == source {
                rel.source = target.clone();
            }
            if &rel.target == source {
                rel.target = target.clone();
            }
            if rel.source == rel.target || rows.contains(&rel) {
                report.dropped += 1;
                continue;
            }
            if touched {
                report.repointed += 1;
            }
            rows.push(rel);
        }

        let people: Vec<Person> = self
            .graph
            .people()
            .filter(|p| &p.id != source)
            .map(|p| if &p.id == target { kept.clone() } else { p.clone() })
            .collect();

        // Rebuild leniently: merged rows may exceed the fan-out cap
        self.graph = Graph::build_with_policy(people, rows, self.graph.policy().clone());
        self.revision += 1;
        info!(
            "Merged {} into {}: {} re-pointed, {} dropped",
            source, target, report.repointed, report.dropped
        );
        Ok(Change::structural(report))
    }
}

impl DataSource for Directory {
    fn people(&self) -> DirectoryResult<Vec<Person>> {
        Ok(self.graph.people().cloned().collect())
    }

    fn relationships(&self) -> DirectoryResult<Vec<Relationship>> {
        Ok(self.graph.relationships().collect())
    }

    fn snapshot(&self, policy: &RelationshipPolicy) -> DirectoryResult<Graph> {
        if policy == self.graph.policy() {
            return Ok(self.graph.clone());
        }
        Ok(Graph::build_with_policy(
            self.people()?,
            self.relationships()?,
            policy.clone(),
        ))
    }
}

/// Re-reads the data file on every access
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
    policy: RelationshipPolicy,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>, policy: RelationshipPolicy) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            policy,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn open(&self) -> DirectoryResult<Directory> {
        Directory::open(&self.path, self.policy.clone())
    }
}

impl DataSource for JsonFileSource {
    fn people(&self) -> DirectoryResult<Vec<Person>> {
        self.open()?.people()
    }

    fn relationships(&self) -> DirectoryResult<Vec<Relationship>> {
        self.open()?.relationships()
    }

    fn snapshot(&self, policy: &RelationshipPolicy) -> DirectoryResult<Graph> {
        self.open()?.snapshot(policy)
    }
}
