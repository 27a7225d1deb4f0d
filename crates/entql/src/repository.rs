//! Per-entity query shortcuts.
//!
//! A [`Repository`] never executes anything: each finder returns the [`Query`]
//! snapshot a caller would hand to its executor.

use crate::config::Configuration;
use crate::criteria::{Criteria, CriteriaExpr};
use crate::error::{OrmError, OrmResult};
use crate::factory::configured_builder;
use crate::metadata::{EntityMetadata, MetadataProvider};
use crate::qb::{Direction, Expr, Query, QueryBuilder};
use crate::value::Value;
use std::sync::Arc;

/// Query shortcuts for one entity.
#[derive(Debug, Clone)]
pub struct Repository {
    entity: EntityMetadata,
    metadata: Arc<dyn MetadataProvider>,
    config: Arc<Configuration>,
}

impl Repository {
    pub fn new(entity: EntityMetadata, metadata: Arc<dyn MetadataProvider>, config: Arc<Configuration>) -> Self {
        Self {
            entity,
            metadata,
            config,
        }
    }

    pub fn entity(&self) -> &EntityMetadata {
        &self.entity
    }

    pub fn entity_name(&self) -> &str {
        &self.entity.name
    }

    /// `SELECT alias FROM Entity alias`, with configured cache hints and metadata.
    pub fn create_query_builder(&self, alias: &str) -> QueryBuilder {
        let mut qb = configured_builder(&self.config, &self.metadata);
        qb.select([alias]).from(&self.entity.name, alias);
        qb
    }

    /// Equality filters, ordering and paging.
    ///
    /// A `Null` filter value matches `IS NULL`; a list matches `IN`. Order
    /// directions are `ASC`/`DESC` in any case.
    pub fn find_by(
        &self,
        filters: &[(&str, Value)],
        order_by: &[(&str, &str)],
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> OrmResult<Query> {
        let mut criteria = self
            .filter_criteria(filters)?
            .set_max_results(limit)
            .set_first_result(offset);

        for (field, direction) in order_by {
            if !self.entity.has_field(field) {
                return Err(self.unrecognized(field));
            }
            let direction = Direction::parse(direction).ok_or_else(|| {
                OrmError::invalid_orientation(format!("{}#{}", self.entity.name, field), *direction)
            })?;
            criteria = criteria.add_ordering(*field, direction);
        }

        self.matching(&criteria)
    }

    /// Like [`find_by`](Self::find_by) with at most one result.
    pub fn find_one_by(&self, filters: &[(&str, Value)], order_by: &[(&str, &str)]) -> OrmResult<Query> {
        self.find_by(filters, order_by, Some(1), None)
    }

    pub fn find_all(&self) -> OrmResult<Query> {
        self.find_by(&[], &[], None, None)
    }

    /// Filter on a single field.
    pub fn find_by_field(&self, field: &str, value: impl Into<Value>) -> OrmResult<Query> {
        self.find_by(&[(field, value.into())], &[], None, None)
    }

    pub fn find_one_by_field(&self, field: &str, value: impl Into<Value>) -> OrmResult<Query> {
        self.find_one_by(&[(field, value.into())], &[])
    }

    /// Look up by a single-column identifier.
    pub fn find(&self, id: impl Into<Value>) -> OrmResult<Query> {
        let Some(first) = self.entity.identifier.first() else {
            return Err(OrmError::MissingIdentifierField {
                entity: self.entity.name.clone(),
                field: "id".to_string(),
            });
        };
        self.find_by_identifier(&[(first.as_str(), id.into())])
    }

    /// Look up by every identifier field.
    pub fn find_by_identifier(&self, id: &[(&str, Value)]) -> OrmResult<Query> {
        let unknown: Vec<&str> = id
            .iter()
            .map(|(field, _)| *field)
            .filter(|field| !self.entity.is_identifier(field))
            .collect();
        if !unknown.is_empty() {
            return Err(OrmError::UnrecognizedIdentifierFields {
                entity: self.entity.name.clone(),
                fields: unknown.join("', '"),
            });
        }
        if let Some(missing) = self
            .entity
            .identifier
            .iter()
            .find(|field| !id.iter().any(|(given, _)| *given == field.as_str()))
        {
            return Err(OrmError::MissingIdentifierField {
                entity: self.entity.name.clone(),
                field: missing.clone(),
            });
        }
        self.find_one_by(id, &[])
    }

    /// `SELECT COUNT(alias)` over the rows matching `filters`.
    pub fn count(&self, filters: &[(&str, Value)]) -> OrmResult<Query> {
        let alias = self.entity.default_alias.as_str();
        let criteria = self.filter_criteria(filters)?;
        let mut qb = self.create_query_builder(alias);
        qb.select([Expr::count(alias)]).add_criteria(&criteria)?;
        Ok(qb.get_query())
    }

    /// Apply alias-free criteria to `SELECT e FROM Entity e`.
    pub fn matching(&self, criteria: &Criteria) -> OrmResult<Query> {
        let mut qb = self.create_query_builder(&self.entity.default_alias);
        qb.add_criteria(criteria)?;
        Ok(qb.get_query())
    }

    /// A configured named query.
    pub fn named_query(&self, name: &str) -> OrmResult<Query> {
        let dql = self
            .config
            .named_query_dql(name)
            .ok_or_else(|| OrmError::NamedQueryNotFound(name.to_string()))?;
        Ok(Query::new(dql).with_cache(self.config.default_cache.clone()))
    }

    fn filter_criteria(&self, filters: &[(&str, Value)]) -> OrmResult<Criteria> {
        if filters.is_empty() {
            return Ok(Criteria::new());
        }
        let mut parts = Vec::with_capacity(filters.len());
        for (field, value) in filters {
            self.check_filter_field(field)?;
            parts.push(CriteriaExpr::eq(*field, value.clone()));
        }
        Ok(Criteria::new().where_(CriteriaExpr::and(parts)))
    }

    fn check_filter_field(&self, field: &str) -> OrmResult<()> {
        if let Some(assoc) = self.entity.association_mapping(field) {
            if !assoc.owning_side {
                return Err(OrmError::InverseSideAssociation {
                    entity: self.entity.name.clone(),
                    field: field.to_string(),
                });
            }
            return Ok(());
        }
        if self.entity.field_mapping(field).is_none() {
            return Err(self.unrecognized(field));
        }
        Ok(())
    }

    fn unrecognized(&self, field: &str) -> OrmError {
        OrmError::UnrecognizedField {
            entity: Some(self.entity.name.clone()),
            field: field.to_string(),
        }
    }
}
