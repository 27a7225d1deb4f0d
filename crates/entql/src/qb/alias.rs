//! Alias scope: in-query short names mapped to their origin.

use crate::error::{OrmError, OrmResult};
use crate::metadata::{EntityMetadata, MetadataProvider};
use indexmap::IndexMap;

/// Where an alias comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AliasOrigin {
    /// A FROM root.
    Root { entity: String },
    /// A join, with the root alias it renders after.
    Join { path: String, root: String },
}

/// Ordered alias → origin mapping. Roots come first, then joins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasScope {
    entries: IndexMap<String, AliasOrigin>,
}

impl AliasScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_root(&mut self, alias: impl Into<String>, entity: impl Into<String>) {
        self.entries.insert(
            alias.into(),
            AliasOrigin::Root {
                entity: entity.into(),
            },
        );
    }

    pub fn insert_join(
        &mut self,
        alias: impl Into<String>,
        path: impl Into<String>,
        root: impl Into<String>,
    ) {
        self.entries.insert(
            alias.into(),
            AliasOrigin::Join {
                path: path.into(),
                root: root.into(),
            },
        );
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.entries.contains_key(alias)
    }

    pub fn get(&self, alias: &str) -> Option<&AliasOrigin> {
        self.entries.get(alias)
    }

    /// All aliases in insertion order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn root_aliases(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|(alias, origin)| match origin {
            AliasOrigin::Root { .. } => Some(alias.as_str()),
            AliasOrigin::Join { .. } => None,
        })
    }

    pub fn is_root(&self, alias: &str) -> bool {
        matches!(self.entries.get(alias), Some(AliasOrigin::Root { .. }))
    }

    /// The root alias that `alias` belongs to (itself for a root).
    pub fn root_of(&self, alias: &str) -> Option<&str> {
        match self.entries.get_key_value(alias)? {
            (key, AliasOrigin::Root { .. }) => Some(key.as_str()),
            (_, AliasOrigin::Join { root, .. }) => Some(root.as_str()),
        }
    }

    /// Fail with `UnknownAlias` unless `alias` is in scope.
    pub fn require(&self, alias: &str) -> OrmResult<&AliasOrigin> {
        self.entries
            .get(alias)
            .ok_or_else(|| OrmError::unknown_alias(alias, self.aliases()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve the entity behind `alias`, following association paths for joins.
    pub fn entity_of<'m>(
        &self,
        alias: &str,
        metadata: &'m dyn MetadataProvider,
    ) -> Option<&'m EntityMetadata> {
        self.entity_of_depth(alias, metadata, self.entries.len())
    }

    fn entity_of_depth<'m>(
        &self,
        alias: &str,
        metadata: &'m dyn MetadataProvider,
        budget: usize,
    ) -> Option<&'m EntityMetadata> {
        match self.entries.get(alias)? {
            AliasOrigin::Root { entity } => metadata.entity(entity),
            AliasOrigin::Join { path, .. } => {
                // Arbitrary entity joins (`JOIN App\Group g WITH ...`) have no dot.
                let Some((parent, association)) = path.split_once('.') else {
                    return metadata.entity(path);
                };
                if budget == 0 || parent == alias {
                    return None;
                }
                let parent_meta = self.entity_of_depth(parent, metadata, budget - 1)?;
                let target = &parent_meta.association_mapping(association)?.target_entity;
                metadata.entity(target)
            }
        }
    }
}
