//! Convenient imports for typical `entql` usage.
//!
//! ```ignore
//! use entql::prelude::*;
//! ```

pub use crate::qb::{self, ConditionType, Direction, Expr, OrderBy, PartName, QueryBuilder};
pub use crate::{
    Configuration, Criteria, CriteriaExpr, EntityMetadata, MetadataRegistry, OrmError, OrmResult, ParamType,
    Query, QueryFactory, Repository, Value,
};
