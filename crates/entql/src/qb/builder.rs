use crate::criteria::Criteria;
use crate::error::{OrmError, OrmResult};
use crate::metadata::MetadataProvider;
use crate::qb::alias::AliasScope;
use crate::qb::compiler::CriteriaCompiler;
use crate::qb::expr::{BoolKind, Composite, Direction, Expr, OrderBy};
use crate::qb::param::{ParamKey, Parameter, ParameterRegistry};
use crate::qb::parts::{ConditionType, FromEntity, Join, JoinEntry, JoinKind, PartName, QueryPart};
use crate::qb::query::{BuilderState, CacheHints, CacheMode, Query, QueryType};
use crate::value::{ParamType, Value};
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// Mutable, incrementally built DQL query.
///
/// Parts accumulate through chained calls and are rendered on demand by
/// [`dql`](Self::dql) or snapshotted by [`get_query`](Self::get_query). The builder
/// starts [`BuilderState::Clean`] and becomes [`BuilderState::Dirty`] on the first
/// mutation of a query part or parameter.
///
/// # Example
/// ```ignore
/// use entql::qb::{Expr, QueryBuilder};
///
/// let mut qb = QueryBuilder::new();
/// qb.select(["u"])
///     .from("App\\User", "u")
///     .inner_join("u.groups", "g")?
///     .where_(Expr::eq("u.id", ":id"))
///     .set_parameter("id", 7);
///
/// assert_eq!(
///     qb.dql(),
///     "SELECT u FROM App\\User u INNER JOIN u.groups g WHERE u.id = :id"
/// );
/// # Ok::<(), entql::OrmError>(())
/// ```
#[must_use]
#[derive(Debug, Default)]
pub struct QueryBuilder {
    query_type: QueryType,
    state: BuilderState,
    distinct: bool,
    select: Vec<Expr>,
    from: Vec<FromEntity>,
    joins: IndexMap<String, Vec<Join>>,
    /// Join aliases in the order they were added, across roots.
    join_order: Vec<String>,
    set: Vec<Expr>,
    where_: Option<Expr>,
    group_by: Vec<String>,
    having: Option<Expr>,
    order_by: Vec<OrderBy>,
    parameters: ParameterRegistry,
    first_result: Option<usize>,
    max_results: Option<usize>,
    cache: CacheHints,
    metadata: Option<Arc<dyn MetadataProvider>>,
}

impl Clone for QueryBuilder {
    /// Deep copy of every part and parameter. The copy starts clean.
    fn clone(&self) -> Self {
        Self {
            query_type: self.query_type,
            state: BuilderState::Clean,
            distinct: self.distinct,
            select: self.select.clone(),
            from: self.from.clone(),
            joins: self.joins.clone(),
            join_order: self.join_order.clone(),
            set: self.set.clone(),
            where_: self.where_.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order_by: self.order_by.clone(),
            parameters: self.parameters.clone(),
            first_result: self.first_result,
            max_results: self.max_results,
            cache: self.cache.clone(),
            metadata: self.metadata.clone(),
        }
    }
}

impl QueryBuilder {
    /// An empty SELECT builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// A builder that validates criteria fields against entity metadata.
    pub fn with_metadata(metadata: Arc<dyn MetadataProvider>) -> Self {
        Self {
            metadata: Some(metadata),
            ..Self::default()
        }
    }

    /// Validate criteria fields against `metadata` from now on.
    pub fn set_metadata(&mut self, metadata: Arc<dyn MetadataProvider>) -> &mut Self {
        self.metadata = Some(metadata);
        self
    }

    /// The metadata provider, if one is attached.
    pub fn metadata(&self) -> Option<&dyn MetadataProvider> {
        self.metadata.as_deref()
    }

    fn touch(&mut self) {
        self.state = BuilderState::Dirty;
    }

    // ==================== Statement type ====================

    /// Replace the select list. An empty list only switches the statement type.
    pub fn select<E: Into<Expr>>(&mut self, items: impl IntoIterator<Item = E>) -> &mut Self {
        self.query_type = QueryType::Select;
        let items = non_empty(items);
        if items.is_empty() {
            return self;
        }
        self.select = items;
        self.touch();
        self
    }

    /// Append to the select list.
    pub fn add_select<E: Into<Expr>>(&mut self, items: impl IntoIterator<Item = E>) -> &mut Self {
        self.query_type = QueryType::Select;
        let items = non_empty(items);
        if items.is_empty() {
            return self;
        }
        self.select.extend(items);
        self.touch();
        self
    }

    /// Switch to a SELECT statement without touching any part.
    pub fn as_select(&mut self) -> &mut Self {
        self.query_type = QueryType::Select;
        self
    }

    /// Toggle `SELECT DISTINCT`.
    pub fn distinct(&mut self, flag: bool) -> &mut Self {
        self.distinct = flag;
        self.touch();
        self
    }

    /// Switch to an UPDATE of `entity` and replace the root list with it.
    pub fn update(&mut self, entity: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.query_type = QueryType::Update;
        self.from = vec![FromEntity::new(entity, alias)];
        self.touch();
        self
    }

    /// Switch to an UPDATE without touching the roots.
    pub fn as_update(&mut self) -> &mut Self {
        self.query_type = QueryType::Update;
        self
    }

    /// Switch to a DELETE of `entity` and replace the root list with it.
    pub fn delete(&mut self, entity: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.query_type = QueryType::Delete;
        self.from = vec![FromEntity::new(entity, alias)];
        self.touch();
        self
    }

    /// Switch to a DELETE without touching the roots.
    pub fn as_delete(&mut self) -> &mut Self {
        self.query_type = QueryType::Delete;
        self
    }

    // ==================== FROM / JOIN ====================

    /// Add a root entity.
    pub fn from(&mut self, entity: impl Into<String>, alias: impl Into<String>) -> &mut Self {
        self.from.push(FromEntity::new(entity, alias));
        self.touch();
        self
    }

    /// Add a root entity whose results are indexed by `index_by`.
    pub fn from_indexed(
        &mut self,
        entity: impl Into<String>,
        alias: impl Into<String>,
        index_by: impl Into<String>,
    ) -> &mut Self {
        self.from.push(FromEntity::new(entity, alias).index_by(index_by));
        self.touch();
        self
    }

    /// Set `INDEX BY` on an existing root.
    pub fn index_by(&mut self, alias: &str, index_by: impl Into<String>) -> OrmResult<&mut Self> {
        let Some(pos) = self.from.iter().position(|f| f.alias == alias) else {
            return Err(OrmError::unknown_alias(alias, self.from.iter().map(|f| f.alias.as_str())));
        };
        self.from[pos].index_by = Some(index_by.into());
        self.touch();
        Ok(self)
    }

    /// Inner join. Same as [`inner_join`](Self::inner_join).
    pub fn join(&mut self, path: impl Into<String>, alias: impl Into<String>) -> OrmResult<&mut Self> {
        self.add_join(Join::inner(path, alias))
    }

    /// `INNER JOIN path alias`.
    pub fn inner_join(&mut self, path: impl Into<String>, alias: impl Into<String>) -> OrmResult<&mut Self> {
        self.add_join(Join::inner(path, alias))
    }

    /// `LEFT JOIN path alias`.
    pub fn left_join(&mut self, path: impl Into<String>, alias: impl Into<String>) -> OrmResult<&mut Self> {
        self.add_join(Join::left(path, alias))
    }

    /// Inner join with a condition and optional `INDEX BY`.
    pub fn inner_join_with(
        &mut self,
        path: impl Into<String>,
        alias: impl Into<String>,
        condition_type: ConditionType,
        condition: impl Into<Expr>,
        index_by: Option<&str>,
    ) -> OrmResult<&mut Self> {
        let join = conditioned(JoinKind::Inner, path, alias, condition_type, condition, index_by);
        self.add_join(join)
    }

    /// Left join with a condition and optional `INDEX BY`.
    pub fn left_join_with(
        &mut self,
        path: impl Into<String>,
        alias: impl Into<String>,
        condition_type: ConditionType,
        condition: impl Into<Expr>,
        index_by: Option<&str>,
    ) -> OrmResult<&mut Self> {
        let join = conditioned(JoinKind::Left, path, alias, condition_type, condition, index_by);
        self.add_join(join)
    }

    /// Add a prepared join, attaching it to the root its path hangs off.
    pub fn add_join(&mut self, join: Join) -> OrmResult<&mut Self> {
        let root = self.resolve_join_root(&join)?;
        self.join_order.push(join.alias.clone());
        self.joins.entry(root).or_default().push(join);
        self.touch();
        Ok(self)
    }

    /// `p` for a root `p`, `p`'s root for a join alias `p`, the first root otherwise.
    fn resolve_join_root(&self, join: &Join) -> OrmResult<String> {
        if let Some(parent) = join.parent_alias() {
            if self.from.iter().any(|f| f.alias == parent) {
                return Ok(parent.to_string());
            }
            if let Some(root) = self.join_root_of(parent) {
                return Ok(root.to_string());
            }
        }
        self.from
            .first()
            .map(|f| f.alias.clone())
            .ok_or_else(|| OrmError::MissingRootAlias(format!("join '{}'", join.path)))
    }

    fn join_root_of(&self, alias: &str) -> Option<&str> {
        self.joins
            .iter()
            .find(|(_, joins)| joins.iter().any(|j| j.alias == alias))
            .map(|(root, _)| root.as_str())
    }

    // ==================== SET ====================

    /// Add an UPDATE assignment `field = value`.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Expr>) -> &mut Self {
        self.set.push(Expr::eq(Expr::Raw(field.into()), value));
        self.touch();
        self
    }

    // ==================== WHERE / HAVING ====================

    /// Replace the WHERE clause.
    ///
    /// A composite is stored as given; anything else is wrapped in an AND.
    pub fn where_(&mut self, predicate: impl Into<Expr>) -> &mut Self {
        self.where_ = Some(root_condition(vec![predicate.into()]));
        self.touch();
        self
    }

    /// Replace the WHERE clause with the AND of `predicates`.
    pub fn where_all(&mut self, predicates: impl IntoIterator<Item = Expr>) -> &mut Self {
        self.where_ = Some(root_condition(predicates.into_iter().collect()));
        self.touch();
        self
    }

    /// AND `predicate` onto the WHERE clause.
    pub fn and_where(&mut self, predicate: impl Into<Expr>) -> &mut Self {
        self.and_where_all([predicate.into()])
    }

    /// AND every predicate onto the WHERE clause.
    pub fn and_where_all(&mut self, predicates: impl IntoIterator<Item = Expr>) -> &mut Self {
        self.where_ = Some(merge_condition(self.where_.take(), predicates, BoolKind::And));
        self.touch();
        self
    }

    /// OR `predicate` onto the WHERE clause.
    pub fn or_where(&mut self, predicate: impl Into<Expr>) -> &mut Self {
        self.or_where_all([predicate.into()])
    }

    /// OR every predicate onto the WHERE clause.
    pub fn or_where_all(&mut self, predicates: impl IntoIterator<Item = Expr>) -> &mut Self {
        self.where_ = Some(merge_condition(self.where_.take(), predicates, BoolKind::Or));
        self.touch();
        self
    }

    /// Replace the HAVING clause.
    pub fn having(&mut self, predicate: impl Into<Expr>) -> &mut Self {
        self.having = Some(root_condition(vec![predicate.into()]));
        self.touch();
        self
    }

    /// AND `predicate` onto the HAVING clause.
    pub fn and_having(&mut self, predicate: impl Into<Expr>) -> &mut Self {
        self.having = Some(merge_condition(self.having.take(), [predicate.into()], BoolKind::And));
        self.touch();
        self
    }

    /// OR `predicate` onto the HAVING clause.
    pub fn or_having(&mut self, predicate: impl Into<Expr>) -> &mut Self {
        self.having = Some(merge_condition(self.having.take(), [predicate.into()], BoolKind::Or));
        self.touch();
        self
    }

    // ==================== GROUP BY / ORDER BY ====================

    /// Replace the grouping.
    pub fn group_by(&mut self, item: impl Into<String>) -> &mut Self {
        self.group_by = vec![item.into()];
        self.touch();
        self
    }

    /// Append a GROUP BY item.
    pub fn add_group_by(&mut self, item: impl Into<String>) -> &mut Self {
        self.group_by.push(item.into());
        self.touch();
        self
    }

    /// Replace the ordering.
    pub fn order_by(&mut self, sort: impl Into<String>, direction: Direction) -> &mut Self {
        self.order_by_expr(OrderBy::new(sort, direction))
    }

    /// Replace the ORDER BY list with a prepared entry.
    pub fn order_by_expr(&mut self, order_by: OrderBy) -> &mut Self {
        self.order_by = vec![order_by];
        self.touch();
        self
    }

    /// Append `sort direction` to ORDER BY.
    pub fn add_order_by(&mut self, sort: impl Into<String>, direction: Direction) -> &mut Self {
        self.add_order_by_expr(OrderBy::new(sort, direction))
    }

    /// Append a prepared ORDER BY entry.
    pub fn add_order_by_expr(&mut self, order_by: OrderBy) -> &mut Self {
        self.order_by.push(order_by);
        self.touch();
        self
    }

    // ==================== Parameters ====================

    /// Bind (or rebind) a parameter; the type is inferred from the value.
    pub fn set_parameter(&mut self, key: impl Into<ParamKey>, value: impl Into<Value>) -> &mut Self {
        self.parameters.set(key, value, None);
        self.touch();
        self
    }

    /// Bind a value with an explicit parameter type.
    pub fn set_parameter_typed(
        &mut self,
        key: impl Into<ParamKey>,
        value: impl Into<Value>,
        ty: ParamType,
    ) -> &mut Self {
        self.parameters.set(key, value, Some(ty));
        self.touch();
        self
    }

    /// Replace every bound parameter.
    pub fn set_parameters(&mut self, parameters: impl IntoIterator<Item = Parameter>) -> &mut Self {
        self.parameters.replace_all(parameters);
        self.touch();
        self
    }

    /// The parameter bound under `key`.
    pub fn parameter(&self, key: impl Into<ParamKey>) -> Option<&Parameter> {
        self.parameters.get(key)
    }

    /// Every bound parameter, in binding order.
    pub fn parameters(&self) -> &ParameterRegistry {
        &self.parameters
    }

    // ==================== Pagination / cache ====================

    /// Offset of the first row. Does not change the query state.
    pub fn set_first_result(&mut self, first_result: Option<usize>) -> &mut Self {
        self.first_result = first_result;
        self
    }

    /// Row limit. Does not change the query state.
    pub fn set_max_results(&mut self, max_results: Option<usize>) -> &mut Self {
        self.max_results = max_results;
        self
    }

    /// The row offset, if set.
    pub fn first_result(&self) -> Option<usize> {
        self.first_result
    }

    /// The row limit, if set.
    pub fn max_results(&self) -> Option<usize> {
        self.max_results
    }

    /// Mark the result as cacheable.
    pub fn set_cacheable(&mut self, cacheable: bool) -> &mut Self {
        self.cache.cacheable = cacheable;
        self
    }

    /// Cache lifetime in seconds.
    pub fn set_lifetime(&mut self, seconds: u32) -> &mut Self {
        self.cache.lifetime = seconds;
        self
    }

    /// Named cache region.
    pub fn set_cache_region(&mut self, region: impl Into<String>) -> &mut Self {
        self.cache.region = Some(region.into());
        self
    }

    /// How the result cache is consulted.
    pub fn set_cache_mode(&mut self, mode: CacheMode) -> &mut Self {
        self.cache.mode = Some(mode);
        self
    }

    /// Replace all cache hints at once.
    pub fn set_cache_hints(&mut self, hints: CacheHints) -> &mut Self {
        self.cache = hints;
        self
    }

    /// Whether the result may be cached.
    pub fn is_cacheable(&self) -> bool {
        self.cache.cacheable
    }

    /// The cache lifetime in seconds.
    pub fn lifetime(&self) -> u32 {
        self.cache.lifetime
    }

    /// The cache region, if set.
    pub fn cache_region(&self) -> Option<&str> {
        self.cache.region.as_deref()
    }

    /// The cache mode, if set.
    pub fn cache_mode(&self) -> Option<CacheMode> {
        self.cache.mode
    }

    /// All cache hints at once.
    pub fn cache_hints(&self) -> &CacheHints {
        &self.cache
    }

    // ==================== Criteria ====================

    /// Merge alias-free criteria into this query.
    ///
    /// The predicate is AND-ed onto WHERE, orderings are appended, and pagination
    /// is applied only where this builder has no value of its own.
    pub fn add_criteria(&mut self, criteria: &Criteria) -> OrmResult<&mut Self> {
        let default_alias = self
            .root_alias()
            .ok_or_else(|| OrmError::MissingRootAlias("add_criteria".to_string()))?
            .to_string();
        let scope = self.alias_scope();

        let mut compiler = CriteriaCompiler::new(&default_alias, &scope, &self.parameters);
        if let Some(metadata) = self.metadata.as_deref() {
            compiler = compiler.with_metadata(metadata);
        }
        let compiled = compiler.compile(criteria)?;

        tracing::debug!(
            alias = %default_alias,
            parameters = compiled.parameters.len(),
            orderings = compiled.order_by.len(),
            "merging criteria"
        );

        let changes_parts = compiled.condition.is_some()
            || !compiled.order_by.is_empty()
            || !compiled.parameters.is_empty();

        if let Some(condition) = compiled.condition {
            self.and_where(condition);
        }
        for (sort, direction) in compiled.order_by {
            self.add_order_by(sort, direction);
        }
        if self.first_result.is_none() {
            self.first_result = compiled.first_result;
        }
        if self.max_results.is_none() {
            self.max_results = compiled.max_results;
        }
        for param in compiled.parameters {
            self.parameters.insert(param)?;
        }
        if changes_parts {
            self.touch();
        }
        Ok(self)
    }

    // ==================== Parts ====================

    /// The named part, or `None` when it is empty (`Distinct(false)` counts as empty).
    pub fn dql_part(&self, name: PartName) -> Option<QueryPart> {
        match name {
            PartName::Distinct => self.distinct.then_some(QueryPart::Distinct(true)),
            PartName::Select => (!self.select.is_empty()).then(|| QueryPart::Select(self.select.clone())),
            PartName::From => (!self.from.is_empty()).then(|| QueryPart::From(self.from.clone())),
            PartName::Join => {
                let entries: Vec<JoinEntry> = self
                    .joins
                    .iter()
                    .flat_map(|(root, joins)| {
                        joins.iter().map(move |join| JoinEntry {
                            root: Some(root.clone()),
                            join: join.clone(),
                        })
                    })
                    .collect();
                (!entries.is_empty()).then_some(QueryPart::Join(entries))
            }
            PartName::Set => (!self.set.is_empty()).then(|| QueryPart::Set(self.set.clone())),
            PartName::Where => self.where_.clone().map(QueryPart::Where),
            PartName::GroupBy => (!self.group_by.is_empty()).then(|| QueryPart::GroupBy(self.group_by.clone())),
            PartName::Having => self.having.clone().map(QueryPart::Having),
            PartName::OrderBy => (!self.order_by.is_empty()).then(|| QueryPart::OrderBy(self.order_by.clone())),
        }
    }

    /// Every non-empty part, in clause order.
    pub fn dql_parts(&self) -> Vec<QueryPart> {
        PartName::ALL
            .into_iter()
            .filter_map(|name| self.dql_part(name))
            .collect()
    }

    /// Empty one part. Marks the builder dirty.
    pub fn reset_dql_part(&mut self, name: PartName) -> &mut Self {
        match name {
            PartName::Distinct => self.distinct = false,
            PartName::Select => self.select.clear(),
            PartName::From => self.from.clear(),
            PartName::Join => {
                self.joins.clear();
                self.join_order.clear();
            }
            PartName::Set => self.set.clear(),
            PartName::Where => self.where_ = None,
            PartName::GroupBy => self.group_by.clear(),
            PartName::Having => self.having = None,
            PartName::OrderBy => self.order_by.clear(),
        }
        self.touch();
        self
    }

    /// Reset several parts; pass [`PartName::ALL`] to reset everything.
    pub fn reset_dql_parts(&mut self, names: impl IntoIterator<Item = PartName>) -> &mut Self {
        for name in names {
            self.reset_dql_part(name);
        }
        self
    }

    /// Low-level part mutation.
    ///
    /// With `append`, list parts are extended; otherwise the part is replaced.
    /// WHERE and HAVING cannot be appended this way: use
    /// [`and_where`](Self::and_where) and friends.
    pub fn add(&mut self, part: QueryPart, append: bool) -> OrmResult<&mut Self> {
        let name = part.name();
        match part {
            QueryPart::Where(_) | QueryPart::Having(_) if append => {
                return Err(OrmError::UnsupportedOperation(format!(
                    "appending to '{}' has no effect, use and_where()/or_where() or and_having()/or_having()",
                    name
                )));
            }
            QueryPart::Distinct(flag) => self.distinct = flag,
            QueryPart::Select(items) => replace_or_extend(&mut self.select, items, append),
            QueryPart::From(roots) => replace_or_extend(&mut self.from, roots, append),
            QueryPart::Join(entries) => {
                if !append {
                    self.joins.clear();
                    self.join_order.clear();
                }
                for JoinEntry { root, join } in entries {
                    let root = match root {
                        Some(root) if self.from.iter().any(|f| f.alias == root) => root,
                        Some(root) => {
                            return Err(OrmError::unknown_alias(
                                root,
                                self.from.iter().map(|f| f.alias.as_str()),
                            ));
                        }
                        None => self.resolve_join_root(&join)?,
                    };
                    self.join_order.push(join.alias.clone());
                    self.joins.entry(root).or_default().push(join);
                }
            }
            QueryPart::Set(items) => replace_or_extend(&mut self.set, items, append),
            QueryPart::Where(expr) => self.where_ = Some(expr).filter(|e| !e.is_empty()),
            QueryPart::GroupBy(items) => replace_or_extend(&mut self.group_by, items, append),
            QueryPart::Having(expr) => self.having = Some(expr).filter(|e| !e.is_empty()),
            QueryPart::OrderBy(items) => replace_or_extend(&mut self.order_by, items, append),
        }
        self.touch();
        Ok(self)
    }

    /// Whether `SELECT DISTINCT` is on.
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    /// The select list.
    pub fn select_items(&self) -> &[Expr] {
        &self.select
    }

    /// The FROM roots, in order.
    pub fn from_parts(&self) -> &[FromEntity] {
        &self.from
    }

    /// Joins grouped by the root alias they render after.
    pub fn joins(&self) -> &IndexMap<String, Vec<Join>> {
        &self.joins
    }

    /// UPDATE assignments.
    pub fn set_parts(&self) -> &[Expr] {
        &self.set
    }

    /// The current WHERE expression.
    pub fn where_part(&self) -> Option<&Expr> {
        self.where_.as_ref()
    }

    /// GROUP BY items.
    pub fn group_by_parts(&self) -> &[String] {
        &self.group_by
    }

    /// The HAVING expression, if any.
    pub fn having_part(&self) -> Option<&Expr> {
        self.having.as_ref()
    }

    /// ORDER BY entries.
    pub fn order_by_parts(&self) -> &[OrderBy] {
        &self.order_by
    }

    // ==================== Aliases ====================

    /// The first root alias.
    pub fn root_alias(&self) -> Option<&str> {
        self.from.first().map(|f| f.alias.as_str())
    }

    /// Every FROM alias, in order.
    pub fn root_aliases(&self) -> Vec<&str> {
        self.from.iter().map(|f| f.alias.as_str()).collect()
    }

    /// The entity of each FROM root, in order.
    pub fn root_entities(&self) -> Vec<&str> {
        self.from.iter().map(|f| f.entity.as_str()).collect()
    }

    /// Root aliases followed by join aliases in the order they were joined.
    pub fn all_aliases(&self) -> Vec<&str> {
        self.from
            .iter()
            .map(|f| f.alias.as_str())
            .chain(self.join_order.iter().map(String::as_str))
            .collect()
    }

    /// Alias to origin mapping for roots and joins.
    pub fn alias_scope(&self) -> AliasScope {
        let mut scope = AliasScope::new();
        for root in &self.from {
            scope.insert_root(&root.alias, &root.entity);
        }
        for (root, joins) in &self.joins {
            for join in joins {
                scope.insert_join(&join.alias, &join.path, root);
            }
        }
        scope
    }

    // ==================== Rendering ====================

    /// `Clean` until a query part changes.
    pub fn state(&self) -> BuilderState {
        self.state
    }

    /// SELECT, UPDATE or DELETE.
    pub fn query_type(&self) -> QueryType {
        self.query_type
    }

    /// Render the DQL text for the current parts.
    pub fn dql(&self) -> String {
        let mut dql = String::new();
        match self.query_type {
            QueryType::Select => {
                dql.push_str("SELECT");
                if self.distinct {
                    dql.push_str(" DISTINCT");
                }
                push_list(&mut dql, " ", self.select.iter().map(Expr::render));
                push_list(&mut dql, " FROM ", self.from.iter().map(|root| self.render_root(root)));
                self.push_where(&mut dql);
                push_list(&mut dql, " GROUP BY ", self.group_by.iter().cloned());
                if let Some(having) = self.having.as_ref().filter(|h| !h.is_empty()) {
                    dql.push_str(" HAVING ");
                    dql.push_str(&having.render());
                }
            }
            QueryType::Update => {
                dql.push_str("UPDATE");
                push_list(&mut dql, " ", self.from.iter().map(FromEntity::to_string));
                push_list(&mut dql, " SET ", self.set.iter().map(Expr::render));
                self.push_where(&mut dql);
            }
            QueryType::Delete => {
                dql.push_str("DELETE");
                push_list(&mut dql, " ", self.from.iter().map(FromEntity::to_string));
                self.push_where(&mut dql);
            }
        }
        push_list(&mut dql, " ORDER BY ", self.order_by.iter().map(OrderBy::render));
        dql
    }

    fn render_root(&self, root: &FromEntity) -> String {
        let mut text = root.to_string();
        if let Some(joins) = self.joins.get(&root.alias) {
            for join in joins {
                text.push(' ');
                text.push_str(&join.to_string());
            }
        }
        text
    }

    fn push_where(&self, dql: &mut String) {
        if let Some(condition) = self.where_.as_ref().filter(|w| !w.is_empty()) {
            dql.push_str(" WHERE ");
            dql.push_str(&condition.render());
        }
    }

    /// Snapshot the builder into an executable [`Query`].
    pub fn get_query(&self) -> Query {
        let dql = self.dql();
        tracing::debug!(
            dql = %dql,
            parameters = self.parameters.len(),
            first_result = ?self.first_result,
            max_results = ?self.max_results,
            "built query"
        );
        Query::from_parts(
            dql,
            self.parameters.all().to_vec(),
            self.first_result,
            self.max_results,
            self.cache.clone(),
            self.query_type,
        )
    }
}

impl fmt::Display for QueryBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dql())
    }
}

fn non_empty<E: Into<Expr>>(items: impl IntoIterator<Item = E>) -> Vec<Expr> {
    items
        .into_iter()
        .map(Into::into)
        .filter(|e: &Expr| !e.is_empty())
        .collect()
}

fn conditioned(
    kind: JoinKind,
    path: impl Into<String>,
    alias: impl Into<String>,
    condition_type: ConditionType,
    condition: impl Into<Expr>,
    index_by: Option<&str>,
) -> Join {
    let mut join = Join::new(kind, path, alias);
    let condition = condition.into();
    if !condition.is_empty() {
        join.condition_type = Some(condition_type);
        join.condition = Some(condition);
    }
    join.index_by = index_by.map(str::to_string);
    join
}

/// A single composite is kept as is; anything else becomes an AND.
fn root_condition(mut predicates: Vec<Expr>) -> Expr {
    if predicates.len() == 1 && matches!(predicates[0], Expr::Composite(_)) {
        return predicates.remove(0);
    }
    Expr::Composite(Composite::with_parts(BoolKind::And, predicates))
}

fn merge_condition(current: Option<Expr>, predicates: impl IntoIterator<Item = Expr>, kind: BoolKind) -> Expr {
    match current {
        Some(current) => current.append_all(predicates, kind),
        None => Expr::Composite(Composite::with_parts(kind, predicates)),
    }
}

fn replace_or_extend<T>(target: &mut Vec<T>, items: Vec<T>, append: bool) {
    if append {
        target.extend(items);
    } else {
        *target = items;
    }
}

fn push_list(dql: &mut String, prefix: &str, items: impl Iterator<Item = String>) {
    let mut first = true;
    for item in items {
        dql.push_str(if first { prefix } else { ", " });
        dql.push_str(&item);
        first = false;
    }
}
