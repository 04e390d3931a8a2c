//! Position key migration
//!
//! Person ids changed format once (`last_first` to `first.last`). Position
//! files written under the old scheme are rewritten through an id mapping.

use super::directory::fold_accents;
use crate::graph::Person;
use crate::layout::PositionMap;
use std::collections::HashMap;
use tracing::{info, warn};

/// Outcome of [`migrate_position_ids`]
#[derive(Debug, Clone, Default)]
pub struct Migration {
    pub positions: PositionMap,
    /// Old keys that had no mapping and were dropped
    pub unmapped: Vec<String>,
}

/// Map every legacy `last_first` key (lowercased, accents stripped) to the
/// person's current id
pub fn legacy_mapping<'a, I>(people: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = &'a Person>,
{
    people
        .into_iter()
        .map(|p| {
            let old = format!(
                "{}_{}",
                fold_accents(&p.last_name),
                fold_accents(&p.first_name)
            );
            (old, p.id.as_str().to_string())
        })
        .collect()
}

/// Rewrite position keys through `rename`. Keys without a mapping are
/// dropped with a warning. When two old keys map to the same id, the one
/// that sorts first wins.
pub fn migrate_position_ids(positions: &PositionMap, rename: &HashMap<String, String>) -> Migration {
    let mut migration = Migration::default();
    for (old, position) in positions {
        match rename.get(old) {
            Some(new) => {
                if migration.positions.contains_key(new) {
                    warn!("{} maps to {} which is already placed, skipping", old, new);
                    continue;
                }
                migration.positions.insert(new.clone(), *position);
            }
            None => {
                warn!("No id mapping for position key {}", old);
                migration.unmapped.push(old.clone());
            }
        }
    }
    info!(
        "Migrated {} positions, {} unmapped",
        migration.positions.len(),
        migration.unmapped.len()
    );
    migration
}
