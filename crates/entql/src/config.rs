//! Query layer configuration.
//!
//! ```toml
//! [entity_namespaces]
//! CMS = "App\\Models\\CMS"
//!
//! [named_queries]
//! active_users = "SELECT u FROM App\\Models\\CMS\\User u WHERE u.status = 'active'"
//!
//! [custom_string_functions]
//! soundex = "App\\Dql\\Soundex"
//!
//! [default_cache]
//! cacheable = true
//! lifetime = 300
//! ```

use crate::error::{OrmError, OrmResult};
use crate::qb::CacheHints;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Category of a user-registered DQL function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FunctionKind {
    String,
    Numeric,
    Datetime,
}

impl fmt::Display for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FunctionKind::String => "string",
            FunctionKind::Numeric => "numeric",
            FunctionKind::Datetime => "datetime",
        })
    }
}

/// Configuration shared by the factory and repositories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Namespace alias → namespace (`CMS` → `App\Models\CMS`).
    pub entity_namespaces: IndexMap<String, String>,
    /// Query name → DQL.
    pub named_queries: IndexMap<String, String>,
    pub custom_string_functions: IndexMap<String, String>,
    pub custom_numeric_functions: IndexMap<String, String>,
    pub custom_datetime_functions: IndexMap<String, String>,
    /// Cache hints every new builder starts with.
    pub default_cache: CacheHints,
}

impl Configuration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> OrmResult<Self> {
        let config: Configuration = toml::from_str(raw)?;
        Ok(config.normalized())
    }

    /// Read and parse a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> OrmResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| OrmError::Config(format!("failed to read config file {}: {e}", path.display())))?;
        Self::from_toml_str(&raw)
    }

    /// Function names are case-insensitive in DQL.
    fn normalized(mut self) -> Self {
        for map in [
            &mut self.custom_string_functions,
            &mut self.custom_numeric_functions,
            &mut self.custom_datetime_functions,
        ] {
            *map = std::mem::take(map)
                .into_iter()
                .map(|(name, class)| (name.to_lowercase(), class))
                .collect();
        }
        self
    }

    /// Register a namespace alias.
    pub fn entity_namespace(mut self, alias: impl Into<String>, namespace: impl Into<String>) -> Self {
        self.entity_namespaces.insert(alias.into(), namespace.into());
        self
    }

    /// Register a named DQL query.
    pub fn named_query(mut self, name: impl Into<String>, dql: impl Into<String>) -> Self {
        self.named_queries.insert(name.into(), dql.into());
        self
    }

    pub fn custom_string_function(mut self, name: &str, class: impl Into<String>) -> Self {
        self.custom_string_functions.insert(name.to_lowercase(), class.into());
        self
    }

    pub fn custom_numeric_function(mut self, name: &str, class: impl Into<String>) -> Self {
        self.custom_numeric_functions.insert(name.to_lowercase(), class.into());
        self
    }

    pub fn custom_datetime_function(mut self, name: &str, class: impl Into<String>) -> Self {
        self.custom_datetime_functions.insert(name.to_lowercase(), class.into());
        self
    }

    /// Set the cache hints new builders start with.
    pub fn default_cache(mut self, hints: CacheHints) -> Self {
        self.default_cache = hints;
        self
    }

    pub fn entity_namespace_of(&self, alias: &str) -> Option<&str> {
        self.entity_namespaces.get(alias).map(String::as_str)
    }

    pub fn named_query_dql(&self, name: &str) -> Option<&str> {
        self.named_queries.get(name).map(String::as_str)
    }

    /// Look a custom function up in every category.
    pub fn custom_function(&self, name: &str) -> Option<(FunctionKind, &str)> {
        let name = name.to_lowercase();
        [
            (FunctionKind::String, &self.custom_string_functions),
            (FunctionKind::Numeric, &self.custom_numeric_functions),
            (FunctionKind::Datetime, &self.custom_datetime_functions),
        ]
        .into_iter()
        .find_map(|(kind, map)| map.get(&name).map(|class| (kind, class.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qb::CacheMode;

    #[test]
    fn parses_toml() {
        let config = Configuration::from_toml_str(
            r#"
            [entity_namespaces]
            CMS = "App\\Models\\CMS"

            [named_queries]
            all = "SELECT u FROM App\\User u"

            [custom_numeric_functions]
            ROUND = "App\\Dql\\Round"

            [default_cache]
            cacheable = true
            lifetime = 60
            mode = "refresh"
            "#,
        )
        .unwrap();

        assert_eq!(config.entity_namespace_of("CMS"), Some("App\\Models\\CMS"));
        assert_eq!(config.named_query_dql("all"), Some("SELECT u FROM App\\User u"));
        assert_eq!(
            config.custom_function("round"),
            Some((FunctionKind::Numeric, "App\\Dql\\Round"))
        );
        assert!(config.default_cache.cacheable);
        assert_eq!(config.default_cache.lifetime, 60);
        assert_eq!(config.default_cache.mode, Some(CacheMode::Refresh));
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(Configuration::from_toml_str("").unwrap(), Configuration::default());
    }

    #[test]
    fn invalid_toml_is_config_error() {
        let err = Configuration::from_toml_str("entity_namespaces = 3").unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = Configuration::from_toml_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[test]
    fn function_lookup_is_case_insensitive() {
        let config = Configuration::new()
            .custom_string_function("SOUNDEX", "App\\Soundex")
            .custom_datetime_function("DateDiffDays", "App\\DateDiff");
        assert_eq!(
            config.custom_function("soundex"),
            Some((FunctionKind::String, "App\\Soundex"))
        );
        assert_eq!(
            config.custom_function("DATEDIFFDAYS"),
            Some((FunctionKind::Datetime, "App\\DateDiff"))
        );
        assert_eq!(config.custom_function("nope"), None);
    }
}
