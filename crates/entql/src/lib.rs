//! # entql
//!
//! A builder for entity query language (DQL) statements.
//!
//! ## Features
//!
//! - **Structured builder**: parts are kept apart and rendered on demand, so any part can be read back, reset or replaced
//! - **Predictable grouping**: `and_where`/`or_where` nest composites and parenthesize only what needs it
//! - **Alias-free criteria**: filters written against entity fields compile onto whatever aliases the query uses
//! - **Collision-free binding**: criteria parameters never clobber values the caller already bound
//! - **No execution**: the output is a [`Query`] snapshot (DQL, parameters, paging, cache hints)
//!
//! ## Query Builder (qb)
//!
//! ```ignore
//! use entql::qb::{self, Direction, Expr};
//! use entql::{Criteria, CriteriaExpr};
//!
//! let mut q = qb::select(["u"]);
//! q.from("App\\User", "u")
//!     .inner_join("u.groups", "g")?
//!     .where_(Expr::eq("u.status", ":status"))
//!     .set_parameter("status", "active");
//!
//! // Merge alias-free criteria; `status` is already bound, so this binds `status_1`.
//! let criteria = Criteria::new()
//!     .where_(CriteriaExpr::neq("status", "banned"))
//!     .add_ordering("g.name", Direction::Asc);
//! q.add_criteria(&criteria)?;
//!
//! let query = q.get_query();
//! assert_eq!(
//!     query.dql(),
//!     "SELECT u FROM App\\User u INNER JOIN u.groups g \
//!      WHERE u.status = :status AND u.status <> :status_1 ORDER BY g.name ASC"
//! );
//! # Ok::<(), entql::OrmError>(())
//! ```

pub mod config;
pub mod criteria;
pub mod error;
pub mod factory;
pub mod ident;
pub mod metadata;
pub mod prelude;
pub mod qb;
pub mod repository;
pub mod value;

pub use config::{Configuration, FunctionKind};
pub use criteria::{Criteria, CriteriaExpr, CriteriaOp};
pub use error::{OrmError, OrmResult};
pub use factory::QueryFactory;
pub use ident::FieldPath;
pub use metadata::{
    AssociationKind, AssociationMapping, EntityMetadata, FieldMapping, MetadataProvider, MetadataRegistry,
};
pub use repository::Repository;
pub use value::{ParamType, Value};

// Re-export qb module for easy access
pub use qb::{
    BuilderState, CacheHints, CacheMode, Direction, Expr, OrderBy, Parameter, ParameterRegistry, Query,
    QueryBuilder, QueryType,
};
