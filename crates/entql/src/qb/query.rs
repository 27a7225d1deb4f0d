//! Rendered query snapshots handed to the execution layer.

use crate::qb::param::{ParamKey, Parameter};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Statement kind of a builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum QueryType {
    #[default]
    Select,
    Update,
    Delete,
}

/// Whether the builder has been mutated since it was created (or cloned).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum BuilderState {
    #[default]
    Clean,
    Dirty,
}

/// Second-level cache interaction mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Read from the cache, never write.
    Get,
    /// Write to the cache, never read.
    Put,
    /// Read and write.
    Normal,
    /// Write and force a refresh of existing entries.
    Refresh,
}

/// Cache hints. They travel with the [`Query`] and never change the DQL text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheHints {
    pub cacheable: bool,
    /// Lifetime in seconds; `0` means the region default.
    pub lifetime: u32,
    pub region: Option<String>,
    pub mode: Option<CacheMode>,
}

/// An immutable snapshot of a builder: DQL text plus everything needed to run it.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    dql: String,
    parameters: Vec<Parameter>,
    first_result: Option<usize>,
    max_results: Option<usize>,
    cache: CacheHints,
    query_type: QueryType,
}

impl Query {
    /// A query over raw DQL with no parameters.
    pub fn new(dql: impl Into<String>) -> Self {
        Self {
            dql: dql.into(),
            parameters: Vec::new(),
            first_result: None,
            max_results: None,
            cache: CacheHints::default(),
            query_type: QueryType::Select,
        }
    }

    pub(crate) fn from_parts(
        dql: String,
        parameters: Vec<Parameter>,
        first_result: Option<usize>,
        max_results: Option<usize>,
        cache: CacheHints,
        query_type: QueryType,
    ) -> Self {
        Self {
            dql,
            parameters,
            first_result,
            max_results,
            cache,
            query_type,
        }
    }

    pub fn with_parameters(mut self, parameters: impl IntoIterator<Item = Parameter>) -> Self {
        self.parameters = parameters.into_iter().collect();
        self
    }

    pub fn with_first_result(mut self, first_result: Option<usize>) -> Self {
        self.first_result = first_result;
        self
    }

    pub fn with_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_cache(mut self, cache: CacheHints) -> Self {
        self.cache = cache;
        self
    }

    pub fn dql(&self) -> &str {
        &self.dql
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, key: impl Into<ParamKey>) -> Option<&Parameter> {
        let key = key.into();
        self.parameters.iter().find(|p| p.key() == &key)
    }

    pub fn first_result(&self) -> Option<usize> {
        self.first_result
    }

    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }

    pub fn cache(&self) -> &CacheHints {
        &self.cache
    }

    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Placeholders referenced in the DQL, in order of first appearance.
    ///
    /// Text inside single-quoted literals is skipped.
    pub fn placeholders(&self) -> Vec<ParamKey> {
        let bytes = self.dql.as_bytes();
        let mut out: Vec<ParamKey> = Vec::new();
        let mut in_quote = false;
        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            if in_quote {
                if b == b'\'' {
                    in_quote = false;
                }
                i += 1;
                continue;
            }
            match b {
                b'\'' => {
                    in_quote = true;
                    i += 1;
                }
                // `CMS:Article` is a namespaced entity, not a placeholder.
                b':' if i > 0 && (bytes[i - 1].is_ascii_alphanumeric() || bytes[i - 1] == b'_') => {
                    i += 1;
                }
                b':' | b'?' => {
                    let start = i + 1;
                    let mut end = start;
                    while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_') {
                        end += 1;
                    }
                    if end > start {
                        let key = ParamKey::from(&self.dql[start..end]);
                        let valid = match (&key, b) {
                            (ParamKey::Positional(_), b'?') => true,
                            (ParamKey::Named(name), b':') => {
                                name.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_')
                            }
                            _ => false,
                        };
                        if valid && !out.contains(&key) {
                            out.push(key);
                        }
                    }
                    i = end.max(i + 1);
                }
                _ => i += 1,
            }
        }
        out
    }

    /// Placeholders in the DQL with no bound parameter.
    pub fn missing_parameters(&self) -> Vec<ParamKey> {
        self.placeholders()
            .into_iter()
            .filter(|key| self.parameter(key.clone()).is_none())
            .collect()
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dql)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholders_in_order_without_literals() {
        let q = Query::new(
            "SELECT a FROM CMS:Article a WHERE a.id = :id AND a.name = ':fake' AND a.age > ?1 OR a.id = :id",
        );
        assert_eq!(
            q.placeholders(),
            vec![ParamKey::Named("id".into()), ParamKey::Positional(1)]
        );
    }

    #[test]
    fn missing_parameters_are_reported() {
        let q = Query::new("SELECT u FROM User u WHERE u.id = :id AND u.name = :name")
            .with_parameters([Parameter::new("id", 1)]);
        assert_eq!(q.missing_parameters(), vec![ParamKey::Named("name".into())]);
    }

    #[test]
    fn cache_hints_default_off() {
        let hints = CacheHints::default();
        assert!(!hints.cacheable);
        assert_eq!(hints.lifetime, 0);
        assert!(hints.region.is_none());
    }
}
