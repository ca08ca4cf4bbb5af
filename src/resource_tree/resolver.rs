//! Redirection lookups
//!
//! Deciding which file replaces a game path is the job of the mod
//! collections, not of this crate. [`CollectionResolver`] is the seam the
//! tree builder uses to ask them.

use super::{FullPath, GamePath};
use crate::interop::{CollectionId, GameObject};
use std::collections::{BTreeMap, HashMap};

/// A collection as seen by the tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    /// Identifier
    pub id: CollectionId,
    /// Display name
    pub name: String,
}

impl CollectionRef {
    /// Name shown for objects without a collection
    pub const NONE_NAME: &'static str = "None";

    /// Placeholder for objects without a collection
    pub fn none() -> Self {
        Self {
            id: CollectionId::NONE,
            name: Self::NONE_NAME.to_string(),
        }
    }
}

/// Answers redirection questions for the tree builder
pub trait CollectionResolver {
    /// Collection that applies to `object`, if any
    fn collection_for(&self, object: &GameObject) -> Option<CollectionRef>;

    /// File that `path` is redirected to in `collection`, `None` if it is not redirected
    fn resolve(&self, collection: &CollectionRef, path: &GamePath) -> Option<FullPath>;

    /// Every game path that `collection` redirects to `path`
    fn reverse_resolve(&self, collection: &CollectionRef, path: &FullPath) -> Vec<GamePath>;
}

#[derive(Debug, Default)]
struct CollectionEntry {
    name: String,
    redirections: BTreeMap<GamePath, FullPath>,
}

/// Plain in-memory redirection tables
#[derive(Debug, Default)]
pub struct RedirectionMap {
    collections: HashMap<CollectionId, CollectionEntry>,
    assignments: HashMap<String, CollectionId>,
    default: Option<CollectionId>,
}

impl RedirectionMap {
    /// Create an empty map
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a collection
    pub fn add_collection(&mut self, id: CollectionId, name: impl Into<String>) -> &mut Self {
        self.collections.entry(id).or_default().name = name.into();
        self
    }

    /// Redirect `game_path` to `full_path` inside collection `id`
    pub fn redirect(&mut self, id: CollectionId, game_path: GamePath, full_path: FullPath) -> &mut Self {
        self.collections
            .entry(id)
            .or_default()
            .redirections
            .insert(game_path, full_path);
        self
    }

    /// Use collection `id` for objects called `object_name`
    pub fn assign(&mut self, object_name: impl Into<String>, id: CollectionId) -> &mut Self {
        self.assignments.insert(object_name.into(), id);
        self
    }

    /// Use collection `id` for objects without an assignment
    pub fn set_default(&mut self, id: CollectionId) -> &mut Self {
        self.default = Some(id);
        self
    }
}

impl CollectionResolver for RedirectionMap {
    fn collection_for(&self, object: &GameObject) -> Option<CollectionRef> {
        let id = self
            .assignments
            .get(&object.name)
            .copied()
            .or(self.default)?;
        let entry = self.collections.get(&id)?;

        Some(CollectionRef {
            id,
            name: entry.name.clone(),
        })
    }

    fn resolve(&self, collection: &CollectionRef, path: &GamePath) -> Option<FullPath> {
        self.collections
            .get(&collection.id)?
            .redirections
            .get(path)
            .cloned()
    }

    fn reverse_resolve(&self, collection: &CollectionRef, path: &FullPath) -> Vec<GamePath> {
        let Some(entry) = self.collections.get(&collection.id) else {
            return Vec::new();
        };

        entry
            .redirections
            .iter()
            .filter(|(_, target)| target.as_str().eq_ignore_ascii_case(path.as_str()))
            .map(|(game_path, _)| game_path.clone())
            .collect()
    }
}
