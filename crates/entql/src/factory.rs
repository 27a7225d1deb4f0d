//! Entry point bundling configuration and entity metadata.

use crate::config::{Configuration, FunctionKind};
use crate::error::{OrmError, OrmResult};
use crate::metadata::MetadataProvider;
use crate::qb::{Query, QueryBuilder};
use crate::repository::Repository;
use std::sync::Arc;

/// Hands out builders, queries and repositories that share one configuration.
///
/// # Example
/// ```ignore
/// use entql::{Configuration, MetadataRegistry, QueryFactory};
/// use std::sync::Arc;
///
/// let config = Configuration::new().entity_namespace("CMS", "App\\Models\\CMS");
/// let factory = QueryFactory::new(config, Arc::new(MetadataRegistry::new()));
///
/// let mut qb = factory.create_query_builder();
/// qb.select(["u"]).from(factory.resolve_entity_name("CMS:User")?, "u");
/// # Ok::<(), entql::OrmError>(())
/// ```
#[derive(Debug, Clone)]
pub struct QueryFactory {
    config: Arc<Configuration>,
    metadata: Arc<dyn MetadataProvider>,
}

impl QueryFactory {
    pub fn new(config: Configuration, metadata: Arc<dyn MetadataProvider>) -> Self {
        Self {
            config: Arc::new(config),
            metadata,
        }
    }

    pub fn config(&self) -> &Configuration {
        &self.config
    }

    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    /// An empty builder carrying the metadata and the configured cache hints.
    pub fn create_query_builder(&self) -> QueryBuilder {
        configured_builder(&self.config, &self.metadata)
    }

    /// A query from hand-written DQL.
    pub fn create_query(&self, dql: impl Into<String>) -> Query {
        Query::new(dql).with_cache(self.config.default_cache.clone())
    }

    pub fn create_named_query(&self, name: &str) -> OrmResult<Query> {
        let dql = self
            .config
            .named_query_dql(name)
            .ok_or_else(|| OrmError::NamedQueryNotFound(name.to_string()))?;
        Ok(self.create_query(dql))
    }

    /// Expand `Alias:Entity` through the configured namespaces. Fully qualified
    /// names pass through unchanged.
    pub fn resolve_entity_name(&self, name: &str) -> OrmResult<String> {
        let Some((alias, short)) = name.split_once(':') else {
            return Ok(name.to_string());
        };
        let namespace = self
            .config
            .entity_namespace_of(alias)
            .ok_or_else(|| OrmError::UnknownEntityNamespace(alias.to_string()))?;
        Ok(format!("{}\\{}", namespace.trim_end_matches('\\'), short))
    }

    /// The repository of `entity` (short `Alias:Entity` names are accepted).
    pub fn repository(&self, entity: &str) -> OrmResult<Repository> {
        let name = self.resolve_entity_name(entity)?;
        let metadata = self
            .metadata
            .entity(&name)
            .cloned()
            .ok_or_else(|| OrmError::UnknownEntity(name.clone()))?;
        tracing::debug!(entity = %name, "created repository");
        Ok(Repository::new(metadata, Arc::clone(&self.metadata), Arc::clone(&self.config)))
    }

    /// A registered custom DQL function.
    pub fn custom_function(&self, name: &str) -> OrmResult<(FunctionKind, &str)> {
        self.config
            .custom_function(name)
            .ok_or_else(|| OrmError::UnknownFunction(name.to_string()))
    }
}

pub(crate) fn configured_builder(config: &Configuration, metadata: &Arc<dyn MetadataProvider>) -> QueryBuilder {
    let mut qb = QueryBuilder::with_metadata(Arc::clone(metadata));
    qb.set_cache_hints(config.default_cache.clone());
    qb
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EntityMetadata, MetadataRegistry};
    use crate::qb::BuilderState;
    use crate::value::ParamType;

    fn factory() -> QueryFactory {
        let config = Configuration::new()
            .entity_namespace("CMS", "App\\Models\\CMS")
            .named_query("all_users", "SELECT u FROM App\\Models\\CMS\\User u")
            .custom_numeric_function("ROUND", "App\\Dql\\Round");
        let registry = MetadataRegistry::new()
            .with_entity(EntityMetadata::new("App\\Models\\CMS\\User").id("id", ParamType::Integer));
        QueryFactory::new(config, Arc::new(registry))
    }

    #[test]
    fn resolves_namespace_alias() {
        let f = factory();
        assert_eq!(f.resolve_entity_name("CMS:User").unwrap(), "App\\Models\\CMS\\User");
        assert_eq!(f.resolve_entity_name("App\\Other").unwrap(), "App\\Other");
        assert_eq!(
            f.resolve_entity_name("Nope:User").unwrap_err(),
            OrmError::UnknownEntityNamespace("Nope".to_string())
        );
    }

    #[test]
    fn repository_requires_known_entity() {
        let f = factory();
        assert_eq!(f.repository("CMS:User").unwrap().entity_name(), "App\\Models\\CMS\\User");
        assert!(matches!(f.repository("CMS:Group"), Err(OrmError::UnknownEntity(_))));
    }

    #[test]
    fn named_queries() {
        let f = factory();
        assert_eq!(
            f.create_named_query("all_users").unwrap().dql(),
            "SELECT u FROM App\\Models\\CMS\\User u"
        );
        assert_eq!(
            f.create_named_query("missing").unwrap_err(),
            OrmError::NamedQueryNotFound("missing".to_string())
        );
    }

    #[test]
    fn custom_functions() {
        let f = factory();
        assert_eq!(
            f.custom_function("round").unwrap(),
            (FunctionKind::Numeric, "App\\Dql\\Round")
        );
        assert!(matches!(f.custom_function("soundex"), Err(OrmError::UnknownFunction(_))));
    }

    #[test]
    fn builders_start_clean_with_default_cache() {
        let mut config = Configuration::new();
        config.default_cache.cacheable = true;
        config.default_cache.lifetime = 30;
        let f = QueryFactory::new(config, Arc::new(MetadataRegistry::new()));

        let qb = f.create_query_builder();
        assert_eq!(qb.state(), BuilderState::Clean);
        assert!(qb.is_cacheable());
        assert_eq!(qb.lifetime(), 30);
        assert!(qb.metadata().is_some());
    }
}
