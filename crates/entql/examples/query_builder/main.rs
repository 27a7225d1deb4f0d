//! Example building DQL with the query builder, criteria and a repository.
//!
//! Run with:
//!   cargo run --example query_builder -p entql

use entql::qb::{self, ConditionType, Direction, Expr};
use entql::{
    AssociationMapping, Configuration, Criteria, CriteriaExpr, EntityMetadata, MetadataRegistry, OrmResult,
    ParamType, QueryFactory, Value,
};
use std::sync::Arc;

fn main() -> OrmResult<()> {
    // Hand-built SELECT with a conditional join and nested boolean logic.
    let mut q = qb::select(["u", "COUNT(a.id) AS articles"]);
    q.from("App\\Models\\CMS\\User", "u")
        .left_join_with(
            "u.articles",
            "a",
            ConditionType::With,
            Expr::eq("a.published", true),
            None,
        )?
        .where_(Expr::eq("u.status", ":status"))
        .or_where(Expr::in_list("u.role", ["admin", "editor"]))
        .and_where(Expr::is_null("u.deletedAt"))
        .group_by("u.id")
        .having(Expr::gt(Expr::count("a.id"), 3))
        .order_by("u.name", Direction::Asc)
        .set_parameter("status", "active");
    println!("{}", q.get_query());

    // Alias-free criteria merged into a builder that already binds `status`.
    let criteria = Criteria::new()
        .where_(CriteriaExpr::neq("status", "banned"))
        .and_where(CriteriaExpr::contains("name", "ann"))
        .add_ordering("id", Direction::Desc)
        .set_max_results(Some(20));
    q.add_criteria(&criteria)?;
    let query = q.get_query();
    println!("{}", query.dql());
    for param in query.parameters() {
        println!("  {} = {} ({:?})", param.key(), param.value(), param.param_type());
    }

    // Repository finders over registered metadata.
    let registry = MetadataRegistry::new().with_entity(
        EntityMetadata::new("App\\Models\\CMS\\User")
            .id("id", ParamType::Integer)
            .field("name", ParamType::String)
            .field("status", ParamType::String)
            .association(AssociationMapping::many_to_one("group", "App\\Models\\CMS\\Group")),
    );
    let config = Configuration::new().entity_namespace("CMS", "App\\Models\\CMS");
    let factory = QueryFactory::new(config, Arc::new(registry));
    let users = factory.repository("CMS:User")?;

    let query = users.find_by(
        &[("status", Value::from("active")), ("group", Value::from(vec![1, 2]))],
        &[("name", "asc")],
        Some(10),
        None,
    )?;
    println!("{}", query.dql());

    Ok(())
}
