//! DQL query builder.
//!
//! This module provides the mutable [`QueryBuilder`], the [`Expr`] tree it stores,
//! the [`ParameterRegistry`] of bound values, and the [`CriteriaCompiler`] that merges
//! alias-free [`Criteria`](crate::Criteria) into a builder.
//!
//! # Features
//!
//! - **Structured parts**: SELECT/FROM/JOIN/SET/WHERE/GROUP BY/HAVING/ORDER BY kept apart and rendered on demand
//! - **Boolean merging**: `and_where`/`or_where` extend a composite of the same kind or wrap the current one
//! - **Alias scope**: joins attach to the root they hang off; criteria fields resolve against it
//! - **Collision-free parameters**: criteria values are bound as `field`, `field_1`, `field_2`, ...
//!
//! # Usage
//!
//! ```ignore
//! use entql::qb::{self, Direction, Expr};
//!
//! // SELECT
//! let mut q = qb::select(["u", "g"]);
//! q.from("App\\User", "u")
//!     .left_join("u.groups", "g")?
//!     .where_(Expr::eq("u.status", ":status"))
//!     .order_by("u.name", Direction::Asc)
//!     .set_parameter("status", "active");
//! let query = q.get_query();
//!
//! // UPDATE
//! let mut q = qb::update("App\\User", "u");
//! q.set("u.status", ":status").where_(Expr::eq("u.id", ":id"));
//!
//! // DELETE
//! let mut q = qb::delete("App\\User", "u");
//! q.where_(Expr::lt("u.lastLogin", ":cutoff"));
//! # Ok::<(), entql::OrmError>(())
//! ```

mod alias;
mod builder;
mod compiler;
mod expr;
mod param;
mod parts;
mod query;

pub use alias::{AliasOrigin, AliasScope};
pub use builder::QueryBuilder;
pub use compiler::{CompiledCriteria, CriteriaCompiler};
pub use expr::{BoolKind, ComparisonOp, Composite, Direction, Expr, Literal, MathOp, OrderBy};
pub use param::{ParamKey, Parameter, ParameterRegistry};
pub use parts::{ConditionType, FromEntity, Join, JoinEntry, JoinKind, PartName, QueryPart};
pub use query::{BuilderState, CacheHints, CacheMode, Query, QueryType};

/// Create a SELECT builder with the given select items.
///
/// # Example
/// ```ignore
/// let mut q = entql::qb::select(["u"]);
/// q.from("App\\User", "u");
/// ```
pub fn select<E: Into<Expr>>(items: impl IntoIterator<Item = E>) -> QueryBuilder {
    let mut qb = QueryBuilder::new();
    qb.select(items);
    qb
}

/// Create an UPDATE builder for `entity`.
pub fn update(entity: impl Into<String>, alias: impl Into<String>) -> QueryBuilder {
    let mut qb = QueryBuilder::new();
    qb.update(entity, alias);
    qb
}

/// Create a DELETE builder for `entity`.
pub fn delete(entity: impl Into<String>, alias: impl Into<String>) -> QueryBuilder {
    let mut qb = QueryBuilder::new();
    qb.delete(entity, alias);
    qb
}
