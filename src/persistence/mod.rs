//! Persistence layer
//!
//! - People and relationships: [`Directory`], a JSON data file
//! - Coordinates: [`PositionStore`] implementations
//!
//! Every file write goes through [`write_atomic`].

pub mod atomic;
pub mod directory;
pub mod migrate;
pub mod positions;

pub use atomic::write_atomic;
pub use directory::{
    fold_accents, person_slug, Change, DataSource, Directory, DirectoryError, DirectoryResult,
    JsonFileSource, MergeReport,
};
pub use migrate::{legacy_mapping, migrate_position_ids, Migration};
pub use positions::{
    FilePositionStore, MemoryPositionStore, PositionStore, StoreError, StoreResult,
};
