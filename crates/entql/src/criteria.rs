//! Alias-free filter, ordering and paging specification.
//!
//! A [`Criteria`] names fields the way the entity does (`status`, `group.name`) and is
//! compiled against a concrete builder by [`CriteriaCompiler`](crate::qb::CriteriaCompiler).
//! It deserializes from JSON:
//!
//! ```ignore
//! let criteria = Criteria::from_json_str(r#"{
//!     "expression": {"type": "comparison", "field": "status", "op": "in", "value": ["a", "b"]},
//!     "orderings": {"name": "DESC"},
//!     "max_results": 10
//! }"#)?;
//! ```

use crate::error::OrmResult;
use crate::qb::{BoolKind, Direction};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Criteria comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriteriaOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    MemberOf,
    StartsWith,
    EndsWith,
}

impl fmt::Display for CriteriaOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CriteriaOp::Eq => "=",
            CriteriaOp::Neq => "<>",
            CriteriaOp::Lt => "<",
            CriteriaOp::Lte => "<=",
            CriteriaOp::Gt => ">",
            CriteriaOp::Gte => ">=",
            CriteriaOp::In => "IN",
            CriteriaOp::NotIn => "NIN",
            CriteriaOp::Contains => "CONTAINS",
            CriteriaOp::MemberOf => "MEMBER_OF",
            CriteriaOp::StartsWith => "STARTS_WITH",
            CriteriaOp::EndsWith => "ENDS_WITH",
        };
        f.write_str(s)
    }
}

/// A criteria predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CriteriaExpr {
    Comparison {
        field: String,
        op: CriteriaOp,
        value: Value,
    },
    Composite {
        kind: BoolKind,
        parts: Vec<CriteriaExpr>,
    },
}

impl CriteriaExpr {
    pub fn comparison(field: impl Into<String>, op: CriteriaOp, value: impl Into<Value>) -> Self {
        CriteriaExpr::Comparison {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::Eq, value)
    }

    pub fn neq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::Neq, value)
    }

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::Gte, value)
    }

    pub fn in_list(field: impl Into<String>, values: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::In, values)
    }

    pub fn not_in_list(field: impl Into<String>, values: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::NotIn, values)
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Self::comparison(field, CriteriaOp::Eq, Value::Null)
    }

    pub fn contains(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::Contains, value)
    }

    pub fn starts_with(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::StartsWith, value)
    }

    pub fn ends_with(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::EndsWith, value)
    }

    /// `value` is a member of the collection `field`.
    pub fn member_of(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::comparison(field, CriteriaOp::MemberOf, value)
    }

    pub fn and(parts: impl IntoIterator<Item = CriteriaExpr>) -> Self {
        CriteriaExpr::Composite {
            kind: BoolKind::And,
            parts: parts.into_iter().collect(),
        }
    }

    pub fn or(parts: impl IntoIterator<Item = CriteriaExpr>) -> Self {
        CriteriaExpr::Composite {
            kind: BoolKind::Or,
            parts: parts.into_iter().collect(),
        }
    }
}

/// Filter, ordering and paging, independent of any query alias.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Criteria {
    expression: Option<CriteriaExpr>,
    orderings: IndexMap<String, Direction>,
    first_result: Option<usize>,
    max_results: Option<usize>,
}

impl Criteria {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the predicate.
    pub fn where_(mut self, expr: CriteriaExpr) -> Self {
        self.expression = Some(expr);
        self
    }

    /// Wrap the current predicate and `expr` in an AND.
    pub fn and_where(self, expr: CriteriaExpr) -> Self {
        self.combine(expr, BoolKind::And)
    }

    /// Wrap the current predicate and `expr` in an OR.
    pub fn or_where(self, expr: CriteriaExpr) -> Self {
        self.combine(expr, BoolKind::Or)
    }

    fn combine(mut self, expr: CriteriaExpr, kind: BoolKind) -> Self {
        self.expression = Some(match self.expression.take() {
            None => expr,
            Some(current) => CriteriaExpr::Composite {
                kind,
                parts: vec![current, expr],
            },
        });
        self
    }

    /// Replace all orderings.
    pub fn order_by<K: Into<String>>(mut self, orderings: impl IntoIterator<Item = (K, Direction)>) -> Self {
        self.orderings = orderings.into_iter().map(|(k, d)| (k.into(), d)).collect();
        self
    }

    /// Add (or replace) one ordering.
    pub fn add_ordering(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.orderings.insert(field.into(), direction);
        self
    }

    pub fn set_first_result(mut self, first_result: Option<usize>) -> Self {
        self.first_result = first_result;
        self
    }

    pub fn set_max_results(mut self, max_results: Option<usize>) -> Self {
        self.max_results = max_results;
        self
    }

    /// Decode criteria sent as JSON.
    pub fn from_json_str(raw: &str) -> OrmResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_string(&self) -> OrmResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn expression(&self) -> Option<&CriteriaExpr> {
        self.expression.as_ref()
    }

    pub fn orderings(&self) -> &IndexMap<String, Direction> {
        &self.orderings
    }

    pub fn first_result(&self) -> Option<usize> {
        self.first_result
    }

    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn and_where_wraps_existing_expression() {
        let c = Criteria::new()
            .where_(CriteriaExpr::eq("a", 1))
            .and_where(CriteriaExpr::eq("b", 2))
            .and_where(CriteriaExpr::eq("c", 3));
        let Some(CriteriaExpr::Composite { kind, parts }) = c.expression() else {
            panic!("expected composite");
        };
        assert_eq!(*kind, BoolKind::And);
        assert_eq!(parts.len(), 2);
        assert!(matches!(parts[0], CriteriaExpr::Composite { .. }));
    }

    #[test]
    fn and_where_on_empty_sets_expression() {
        let c = Criteria::new().or_where(CriteriaExpr::eq("a", 1));
        assert_eq!(c.expression(), Some(&CriteriaExpr::eq("a", 1)));
    }

    #[test]
    fn orderings_keep_insertion_order() {
        let c = Criteria::new()
            .add_ordering("b", Direction::Desc)
            .add_ordering("a", Direction::Asc);
        assert_eq!(c.orderings().keys().collect::<Vec<_>>(), ["b", "a"]);
    }

    #[test]
    fn deserializes_from_json() {
        let c = Criteria::from_json_str(
            r#"{
                "expression": {
                    "type": "composite",
                    "kind": "OR",
                    "parts": [
                        {"type": "comparison", "field": "status", "op": "in", "value": ["a", null]},
                        {"type": "comparison", "field": "name", "op": "starts_with", "value": "Jo"}
                    ]
                },
                "orderings": {"name": "desc"},
                "max_results": 10
            }"#,
        )
        .unwrap();
        assert_eq!(c.max_results(), Some(10));
        assert_eq!(c.first_result(), None);
        assert_eq!(c.orderings().get("name"), Some(&Direction::Desc));
        assert_eq!(
            c.expression(),
            Some(&CriteriaExpr::or([
                CriteriaExpr::in_list("status", Value::List(vec!["a".into(), Value::Null])),
                CriteriaExpr::starts_with("name", "Jo"),
            ]))
        );
    }

    #[test]
    fn malformed_json_is_invalid_criteria() {
        let err = Criteria::from_json_str(r#"{"expression": {"type": "nope"}}"#).unwrap_err();
        assert!(matches!(err, crate::OrmError::InvalidCriteria(_)));
    }

    #[test]
    fn survives_json_encoding() {
        let c = Criteria::new()
            .where_(CriteriaExpr::eq("a", 1))
            .add_ordering("b", Direction::Desc)
            .set_max_results(Some(3));
        let back = Criteria::from_json_str(&c.to_json_string().unwrap()).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn date_and_uuid_like_strings_survive_json_encoding() {
        let c = Criteria::new()
            .where_(CriteriaExpr::eq("sku", "2024-01-01"))
            .and_where(CriteriaExpr::eq("ref", "67e55044-10b1-426f-9247-bb680e5fe0c8"));
        let back = Criteria::from_json_str(&c.to_json_string().unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
