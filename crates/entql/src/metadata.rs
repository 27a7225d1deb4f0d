//! Entity metadata consumed by the criteria compiler and repositories.
//!
//! The metadata store itself lives outside this crate; it is reached through
//! [`MetadataProvider`]. [`MetadataRegistry`] is a simple in-memory provider.

use crate::value::ParamType;
use indexmap::IndexMap;
use std::collections::HashMap;
use std::fmt;

/// Lookup of entity metadata by entity name.
pub trait MetadataProvider: Send + Sync + fmt::Debug {
    /// Metadata for `entity`, if known.
    fn entity(&self, entity: &str) -> Option<&EntityMetadata>;

    fn has_entity(&self, entity: &str) -> bool {
        self.entity(entity).is_some()
    }
}

/// A mapped scalar field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub name: String,
    pub ty: ParamType,
    pub nullable: bool,
}

/// Association cardinality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssociationKind {
    OneToOne,
    ManyToOne,
    OneToMany,
    ManyToMany,
}

impl AssociationKind {
    pub fn is_to_many(self) -> bool {
        matches!(self, AssociationKind::OneToMany | AssociationKind::ManyToMany)
    }
}

/// A mapped association to another entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssociationMapping {
    pub name: String,
    pub target_entity: String,
    pub kind: AssociationKind,
    /// Only the owning side holds the foreign key and can be filtered on.
    pub owning_side: bool,
}

impl AssociationMapping {
    pub fn new(
        name: impl Into<String>,
        target_entity: impl Into<String>,
        kind: AssociationKind,
        owning_side: bool,
    ) -> Self {
        Self {
            name: name.into(),
            target_entity: target_entity.into(),
            kind,
            owning_side,
        }
    }

    /// An owning many-to-one association.
    pub fn many_to_one(name: impl Into<String>, target_entity: impl Into<String>) -> Self {
        Self::new(name, target_entity, AssociationKind::ManyToOne, true)
    }

    /// An inverse one-to-many association.
    pub fn one_to_many(name: impl Into<String>, target_entity: impl Into<String>) -> Self {
        Self::new(name, target_entity, AssociationKind::OneToMany, false)
    }
}

/// Metadata of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityMetadata {
    pub name: String,
    pub default_alias: String,
    pub identifier: Vec<String>,
    pub fields: IndexMap<String, FieldMapping>,
    pub associations: IndexMap<String, AssociationMapping>,
}

impl EntityMetadata {
    /// Create metadata for `name`. The default alias is the lowercased first letter
    /// of the short (namespace-less) name.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let default_alias = default_alias_for(&name);
        Self {
            name,
            default_alias,
            identifier: Vec::new(),
            fields: IndexMap::new(),
            associations: IndexMap::new(),
        }
    }

    pub fn with_default_alias(mut self, alias: impl Into<String>) -> Self {
        self.default_alias = alias.into();
        self
    }

    /// Add a scalar field.
    pub fn field(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            FieldMapping {
                name,
                ty,
                nullable: false,
            },
        );
        self
    }

    /// Add a nullable scalar field.
    pub fn nullable_field(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            FieldMapping {
                name,
                ty,
                nullable: true,
            },
        );
        self
    }

    /// Add an identifier field. The field is also registered as a scalar field.
    pub fn id(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        let name = name.into();
        if !self.identifier.contains(&name) {
            self.identifier.push(name.clone());
        }
        self.field(name, ty)
    }

    pub fn association(mut self, mapping: AssociationMapping) -> Self {
        self.associations.insert(mapping.name.clone(), mapping);
        self
    }

    /// The name without namespace (`User` for `App\Models\User`).
    pub fn short_name(&self) -> &str {
        short_name(&self.name)
    }

    /// `true` for scalar fields and associations.
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.contains_key(name) || self.associations.contains_key(name)
    }

    pub fn field_mapping(&self, name: &str) -> Option<&FieldMapping> {
        self.fields.get(name)
    }

    pub fn field_type(&self, name: &str) -> Option<ParamType> {
        self.fields.get(name).map(|f| f.ty)
    }

    pub fn association_mapping(&self, name: &str) -> Option<&AssociationMapping> {
        self.associations.get(name)
    }

    pub fn is_identifier(&self, name: &str) -> bool {
        self.identifier.iter().any(|id| id == name)
    }

    pub fn has_composite_identifier(&self) -> bool {
        self.identifier.len() > 1
    }
}

fn short_name(name: &str) -> &str {
    name.rsplit(['\\', ':']).next().unwrap_or(name)
}

fn default_alias_for(name: &str) -> String {
    short_name(name)
        .chars()
        .next()
        .map(|c| c.to_ascii_lowercase().to_string())
        .unwrap_or_else(|| "e".to_string())
}

/// In-memory metadata store.
#[derive(Debug, Clone, Default)]
pub struct MetadataRegistry {
    entities: HashMap<String, EntityMetadata>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) an entity.
    pub fn register(&mut self, entity: EntityMetadata) {
        self.entities.insert(entity.name.clone(), entity);
    }

    /// Builder-style [`register`](Self::register).
    pub fn with_entity(mut self, entity: EntityMetadata) -> Self {
        self.register(entity);
        self
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Entity names in no particular order.
    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}

impl MetadataProvider for MetadataRegistry {
    fn entity(&self, entity: &str) -> Option<&EntityMetadata> {
        self.entities.get(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> EntityMetadata {
        EntityMetadata::new("App\\Models\\User")
            .id("id", ParamType::Integer)
            .field("name", ParamType::String)
            .association(AssociationMapping::many_to_one("group", "App\\Models\\Group"))
            .association(AssociationMapping::one_to_many("phones", "App\\Models\\Phone"))
    }

    #[test]
    fn derives_default_alias_from_short_name() {
        let meta = user();
        assert_eq!(meta.short_name(), "User");
        assert_eq!(meta.default_alias, "u");
        assert_eq!(EntityMetadata::new("CMS:Article").default_alias, "a");
    }

    #[test]
    fn field_lookups() {
        let meta = user();
        assert!(meta.has_field("name"));
        assert!(meta.has_field("group"));
        assert!(!meta.has_field("missing"));
        assert_eq!(meta.field_type("id"), Some(ParamType::Integer));
        assert!(meta.is_identifier("id"));
        assert!(!meta.has_composite_identifier());
        assert!(!meta.association_mapping("phones").unwrap().owning_side);
    }

    #[test]
    fn registry_lookup() {
        let reg = MetadataRegistry::new().with_entity(user());
        assert!(reg.has_entity("App\\Models\\User"));
        assert!(reg.entity("User").is_none());
        assert_eq!(reg.len(), 1);
    }
}
