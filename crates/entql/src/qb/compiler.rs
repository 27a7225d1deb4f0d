//! Criteria → DQL expression compilation.
//!
//! Fields without an alias are bound to the default alias; aliased fields must
//! name an alias in scope. Every value becomes a named parameter whose name is the
//! field as written with dots replaced by underscores, suffixed with the lowest free
//! `_N` when that name is already taken.

use crate::criteria::{Criteria, CriteriaExpr, CriteriaOp};
use crate::error::{OrmError, OrmResult};
use crate::ident::FieldPath;
use crate::metadata::MetadataProvider;
use crate::qb::alias::AliasScope;
use crate::qb::expr::{Composite, Direction, Expr};
use crate::qb::param::{Parameter, ParameterRegistry, lowest_free_name};
use crate::value::{ParamType, Value};

/// Output of [`CriteriaCompiler::compile`].
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledCriteria {
    /// `None` when the criteria carried no predicate.
    pub condition: Option<Expr>,
    /// Newly bound parameters, in binding order.
    pub parameters: Vec<Parameter>,
    /// Alias-qualified ordering entries.
    pub order_by: Vec<(String, Direction)>,
    pub first_result: Option<usize>,
    pub max_results: Option<usize>,
}

/// Compiles [`Criteria`] against one builder's alias scope and parameters.
#[derive(Debug, Clone, Copy)]
pub struct CriteriaCompiler<'a> {
    default_alias: &'a str,
    scope: &'a AliasScope,
    registry: &'a ParameterRegistry,
    metadata: Option<&'a dyn MetadataProvider>,
}

/// A field resolved against the alias scope.
struct ResolvedField {
    /// `alias.field`, as it appears in DQL.
    qualified: String,
    /// Parameter name before collision handling.
    param_name: String,
    /// Type from entity metadata, when known.
    ty: Option<ParamType>,
}

impl<'a> CriteriaCompiler<'a> {
    pub fn new(default_alias: &'a str, scope: &'a AliasScope, registry: &'a ParameterRegistry) -> Self {
        Self {
            default_alias,
            scope,
            registry,
            metadata: None,
        }
    }

    /// Validate fields against entity metadata and take parameter types from it.
    pub fn with_metadata(mut self, metadata: &'a dyn MetadataProvider) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn compile(&self, criteria: &Criteria) -> OrmResult<CompiledCriteria> {
        let mut bound = Vec::new();
        let condition = match criteria.expression() {
            Some(expr) => Some(self.walk(expr, &mut bound)?).filter(|e| !e.is_empty()),
            None => None,
        };

        let mut order_by = Vec::with_capacity(criteria.orderings().len());
        for (field, direction) in criteria.orderings() {
            let resolved = self.resolve_field(field)?;
            order_by.push((resolved.qualified, *direction));
        }

        Ok(CompiledCriteria {
            condition,
            parameters: bound,
            order_by,
            first_result: criteria.first_result(),
            max_results: criteria.max_results(),
        })
    }

    /// Compile a single predicate. Parameters are appended to `bound`.
    pub fn compile_expression(&self, expr: &CriteriaExpr, bound: &mut Vec<Parameter>) -> OrmResult<Expr> {
        self.walk(expr, bound)
    }

    fn walk(&self, expr: &CriteriaExpr, bound: &mut Vec<Parameter>) -> OrmResult<Expr> {
        match expr {
            CriteriaExpr::Composite { kind, parts } => {
                let mut composite = Composite::new(*kind);
                for part in parts {
                    composite.add(self.walk(part, bound)?);
                }
                Ok(Expr::Composite(composite))
            }
            CriteriaExpr::Comparison { field, op, value } => self.walk_comparison(field, *op, value, bound),
        }
    }

    fn walk_comparison(
        &self,
        field: &str,
        op: CriteriaOp,
        value: &Value,
        bound: &mut Vec<Parameter>,
    ) -> OrmResult<Expr> {
        let resolved = self.resolve_field(field)?;
        let column = resolved.qualified.as_str();

        let expr = match (op, value) {
            (CriteriaOp::Eq, Value::Null) => Expr::is_null(column),
            (CriteriaOp::Neq, Value::Null) => Expr::is_not_null(column),
            (CriteriaOp::Eq, Value::List(_)) | (CriteriaOp::In, _) => {
                self.membership(&resolved, value, false, bound)
            }
            (CriteriaOp::Neq, Value::List(_)) | (CriteriaOp::NotIn, _) => {
                self.membership(&resolved, value, true, bound)
            }
            (CriteriaOp::Eq, _) => Expr::eq(column, self.bind(&resolved, value.clone(), bound)),
            (CriteriaOp::Neq, _) => Expr::neq(column, self.bind(&resolved, value.clone(), bound)),
            (CriteriaOp::Lt, _) => Expr::lt(column, self.bind(&resolved, value.clone(), bound)),
            (CriteriaOp::Lte, _) => Expr::lte(column, self.bind(&resolved, value.clone(), bound)),
            (CriteriaOp::Gt, _) => Expr::gt(column, self.bind(&resolved, value.clone(), bound)),
            (CriteriaOp::Gte, _) => Expr::gte(column, self.bind(&resolved, value.clone(), bound)),
            (CriteriaOp::Contains, _) => {
                let pattern = Value::String(format!("%{value}%"));
                Expr::like(column, self.bind_typed(&resolved, pattern, ParamType::String, bound))
            }
            (CriteriaOp::StartsWith, _) => {
                let pattern = Value::String(format!("{value}%"));
                Expr::like(column, self.bind_typed(&resolved, pattern, ParamType::String, bound))
            }
            (CriteriaOp::EndsWith, _) => {
                let pattern = Value::String(format!("%{value}"));
                Expr::like(column, self.bind_typed(&resolved, pattern, ParamType::String, bound))
            }
            (CriteriaOp::MemberOf, _) => {
                let placeholder = self.bind(&resolved, value.clone(), bound);
                Expr::is_member_of(placeholder, column)
            }
        };
        Ok(expr)
    }

    /// `x IN(:p)` / `x NOT IN(:p)`, splitting out null elements into a null check.
    fn membership(&self, resolved: &ResolvedField, value: &Value, negated: bool, bound: &mut Vec<Parameter>) -> Expr {
        let column = resolved.qualified.as_str();
        let (values, has_null) = match value {
            Value::List(items) => {
                let has_null = items.iter().any(Value::is_null);
                let values: Vec<Value> = items.iter().filter(|v| !v.is_null()).cloned().collect();
                (values, has_null)
            }
            Value::Null => (Vec::new(), true),
            other => (vec![other.clone()], false),
        };

        let null_check = if negated {
            Expr::is_not_null(column)
        } else {
            Expr::is_null(column)
        };
        if values.is_empty() && has_null {
            return null_check;
        }

        let ty = resolved.ty.map(ParamType::array_of);
        let list = Value::List(values);
        let placeholder = match ty {
            Some(ty) => self.bind_typed(resolved, list, ty, bound),
            None => self.bind(resolved, list, bound),
        };
        let membership = if negated {
            Expr::not_in_expr(column, placeholder)
        } else {
            Expr::in_expr(column, placeholder)
        };

        match (has_null, negated) {
            (false, _) => membership,
            (true, false) => Expr::or([membership, null_check]),
            (true, true) => Expr::and([membership, null_check]),
        }
    }

    fn bind(&self, resolved: &ResolvedField, value: Value, bound: &mut Vec<Parameter>) -> String {
        match resolved.ty {
            Some(ty) => self.bind_typed(resolved, value, ty, bound),
            None => {
                let name = self.free_name(&resolved.param_name, bound);
                let placeholder = format!(":{name}");
                bound.push(Parameter::new(name, value));
                placeholder
            }
        }
    }

    fn bind_typed(&self, resolved: &ResolvedField, value: Value, ty: ParamType, bound: &mut Vec<Parameter>) -> String {
        let name = self.free_name(&resolved.param_name, bound);
        let placeholder = format!(":{name}");
        bound.push(Parameter::typed(name, value, ty));
        placeholder
    }

    fn free_name(&self, desired: &str, bound: &[Parameter]) -> String {
        let name = lowest_free_name(desired, |candidate| {
            self.registry.contains_name(candidate)
                || bound
                    .iter()
                    .any(|p| p.key().as_name().is_some_and(|n| n == candidate))
        });
        if name != desired {
            tracing::trace!(desired, resolved = %name, "renamed criteria parameter to avoid collision");
        }
        name
    }

    fn resolve_field(&self, field: &str) -> OrmResult<ResolvedField> {
        let path = FieldPath::parse(field)?;
        let param_name = path.as_param_name();

        let (alias, member, qualified) = if path.is_qualified() {
            self.scope.require(path.head())?;
            (path.head().to_string(), path.tail(), path.to_string())
        } else {
            let qualified = path.qualified_with(self.default_alias);
            (self.default_alias.to_string(), path.to_string(), qualified.to_string())
        };

        let ty = match self.metadata {
            Some(metadata) => match self.scope.entity_of(&alias, metadata) {
                Some(entity) => {
                    let head = member.split('.').next().unwrap_or(&member);
                    if !entity.has_field(&member) && !entity.has_field(head) {
                        return Err(OrmError::UnrecognizedField {
                            entity: Some(entity.name.clone()),
                            field: field.to_string(),
                        });
                    }
                    entity.field_type(&member)
                }
                None => None,
            },
            None => None,
        };

        Ok(ResolvedField {
            qualified,
            param_name,
            ty,
        })
    }
}
