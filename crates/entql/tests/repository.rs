//! Repository finders and the query factory.

use entql::qb::CacheMode;
use entql::{
    AssociationMapping, CacheHints, Configuration, Criteria, CriteriaExpr, EntityMetadata, MetadataRegistry,
    OrmError, ParamType, QueryFactory, Value,
};
use std::sync::Arc;

const USER: &str = "App\\Models\\CMS\\User";
const GROUP: &str = "App\\Models\\CMS\\Group";
const TAG: &str = "App\\Models\\CMS\\Tag";

fn factory() -> QueryFactory {
    let user = EntityMetadata::new(USER)
        .id("id", ParamType::Integer)
        .field("name", ParamType::String)
        .field("status", ParamType::String)
        .nullable_field("deletedAt", ParamType::DateTime)
        .association(AssociationMapping::many_to_one("group", GROUP))
        .association(AssociationMapping::one_to_many("articles", "App\\Models\\CMS\\Article"));
    let group = EntityMetadata::new(GROUP)
        .id("id", ParamType::Integer)
        .field("name", ParamType::String);
    let tag = EntityMetadata::new(TAG)
        .with_default_alias("t")
        .id("name", ParamType::String)
        .id("scope", ParamType::String);

    let registry = MetadataRegistry::new()
        .with_entity(user)
        .with_entity(group)
        .with_entity(tag);

    let config = Configuration::new()
        .entity_namespace("CMS", "App\\Models\\CMS")
        .named_query("active", "SELECT u FROM App\\Models\\CMS\\User u WHERE u.status = 'active'")
        .default_cache(CacheHints {
            cacheable: true,
            lifetime: 120,
            region: None,
            mode: Some(CacheMode::Normal),
        });

    QueryFactory::new(config, Arc::new(registry))
}

#[test]
fn find_all() {
    let repo = factory().repository("CMS:User").unwrap();
    let q = repo.find_all().unwrap();
    assert_eq!(q.dql(), "SELECT u FROM App\\Models\\CMS\\User u");
    assert!(q.parameters().is_empty());
    assert!(q.cache().cacheable);
    assert_eq!(q.cache().lifetime, 120);
}

#[test]
fn find_by_with_order_and_paging() {
    let repo = factory().repository(USER).unwrap();
    let q = repo
        .find_by(
            &[("status", Value::from("active")), ("deletedAt", Value::Null)],
            &[("name", "desc"), ("id", "ASC")],
            Some(10),
            Some(20),
        )
        .unwrap();

    assert_eq!(
        q.dql(),
        "SELECT u FROM App\\Models\\CMS\\User u WHERE u.status = :status AND u.deletedAt IS NULL \
         ORDER BY u.name DESC, u.id ASC"
    );
    assert_eq!(q.max_results(), Some(10));
    assert_eq!(q.first_result(), Some(20));
    assert_eq!(q.parameters().len(), 1);
    assert_eq!(q.parameter("status").unwrap().param_type(), ParamType::String);
}

#[test]
fn find_by_list_uses_metadata_array_type() {
    let repo = factory().repository(USER).unwrap();
    let q = repo.find_by_field("id", vec![1, 2, 3]).unwrap();
    assert_eq!(q.dql(), "SELECT u FROM App\\Models\\CMS\\User u WHERE u.id IN(:id)");
    let param = q.parameter("id").unwrap();
    assert_eq!(param.param_type(), ParamType::IntegerArray);
    assert!(param.is_explicitly_typed());
}

#[test]
fn find_by_owning_association() {
    let repo = factory().repository(USER).unwrap();
    let q = repo.find_by_field("group", 7).unwrap();
    assert_eq!(q.dql(), "SELECT u FROM App\\Models\\CMS\\User u WHERE u.group = :group");
    assert_eq!(q.parameter("group").unwrap().value(), &Value::Int(7));
}

#[test]
fn find_by_inverse_association_fails() {
    let repo = factory().repository(USER).unwrap();
    let err = repo.find_by_field("articles", 1).unwrap_err();
    assert_eq!(
        err,
        OrmError::InverseSideAssociation {
            entity: USER.to_string(),
            field: "articles".to_string(),
        }
    );
}

#[test]
fn find_by_unknown_field_fails() {
    let repo = factory().repository(USER).unwrap();
    let err = repo.find_by_field("nickname", "x").unwrap_err();
    assert!(err.is_unrecognized_field());
    assert_eq!(err.to_string(), "Unrecognized field: nickname");
}

#[test]
fn find_by_invalid_orientation_fails() {
    let repo = factory().repository(USER).unwrap();
    let err = repo.find_by(&[], &[("name", "sideways")], None, None).unwrap_err();
    assert_eq!(
        err,
        OrmError::InvalidOrientation {
            target: format!("{USER}#name"),
            direction: "sideways".to_string(),
        }
    );
}

#[test]
fn find_by_unknown_order_field_fails() {
    let repo = factory().repository(USER).unwrap();
    let err = repo.find_by(&[], &[("nickname", "ASC")], None, None).unwrap_err();
    assert!(err.is_unrecognized_field());
}

#[test]
fn find_one_by_limits_to_one() {
    let repo = factory().repository(USER).unwrap();
    let q = repo.find_one_by(&[("name", Value::from("bob"))], &[]).unwrap();
    assert_eq!(q.max_results(), Some(1));
    assert_eq!(q.first_result(), None);
}

#[test]
fn find_by_identifier() {
    let repo = factory().repository(USER).unwrap();
    let q = repo.find(42).unwrap();
    assert_eq!(q.dql(), "SELECT u FROM App\\Models\\CMS\\User u WHERE u.id = :id");
    assert_eq!(q.parameter("id").unwrap().value(), &Value::Int(42));
    assert_eq!(q.max_results(), Some(1));
}

#[test]
fn find_with_composite_identifier() {
    let repo = factory().repository(TAG).unwrap();
    let q = repo
        .find_by_identifier(&[("scope", Value::from("blog")), ("name", Value::from("rust"))])
        .unwrap();
    assert_eq!(
        q.dql(),
        "SELECT t FROM App\\Models\\CMS\\Tag t WHERE t.scope = :scope AND t.name = :name"
    );

    let err = repo.find("rust").unwrap_err();
    assert_eq!(
        err,
        OrmError::MissingIdentifierField {
            entity: TAG.to_string(),
            field: "scope".to_string(),
        }
    );

    let err = repo
        .find_by_identifier(&[("name", Value::from("a")), ("scope", Value::from("b")), ("x", Value::Null)])
        .unwrap_err();
    assert!(matches!(err, OrmError::UnrecognizedIdentifierFields { .. }));
}

#[test]
fn count_matching_filters() {
    let repo = factory().repository(USER).unwrap();
    let q = repo.count(&[("status", Value::from("active"))]).unwrap();
    assert_eq!(
        q.dql(),
        "SELECT COUNT(u) FROM App\\Models\\CMS\\User u WHERE u.status = :status"
    );
}

#[test]
fn matching_criteria_validates_fields() {
    let repo = factory().repository(USER).unwrap();
    let q = repo
        .matching(&Criteria::new().where_(CriteriaExpr::starts_with("name", "Jo")))
        .unwrap();
    assert_eq!(q.dql(), "SELECT u FROM App\\Models\\CMS\\User u WHERE u.name LIKE :name");
    assert_eq!(q.parameter("name").unwrap().value(), &Value::from("Jo%"));

    let err = repo
        .matching(&Criteria::new().where_(CriteriaExpr::eq("nickname", "x")))
        .unwrap_err();
    assert_eq!(
        err,
        OrmError::UnrecognizedField {
            entity: Some(USER.to_string()),
            field: "nickname".to_string(),
        }
    );
}

#[test]
fn named_query() {
    let repo = factory().repository(USER).unwrap();
    let q = repo.named_query("active").unwrap();
    assert_eq!(
        q.dql(),
        "SELECT u FROM App\\Models\\CMS\\User u WHERE u.status = 'active'"
    );
    assert!(q.cache().cacheable);
    assert!(matches!(
        repo.named_query("inactive"),
        Err(OrmError::NamedQueryNotFound(_))
    ));
}

#[test]
fn factory_builder_validates_criteria_against_joins() {
    let f = factory();
    let mut qb = f.create_query_builder();
    qb.select(["u"])
        .from(f.resolve_entity_name("CMS:User").unwrap(), "u")
        .inner_join("u.group", "g")
        .unwrap();

    qb.add_criteria(&Criteria::new().where_(CriteriaExpr::eq("g.name", "admins")))
        .unwrap();
    assert_eq!(
        qb.dql(),
        "SELECT u FROM App\\Models\\CMS\\User u INNER JOIN u.group g WHERE g.name = :g_name"
    );

    let err = qb
        .add_criteria(&Criteria::new().where_(CriteriaExpr::eq("g.label", "x")))
        .unwrap_err();
    assert_eq!(
        err,
        OrmError::UnrecognizedField {
            entity: Some(GROUP.to_string()),
            field: "g.label".to_string(),
        }
    );
}
