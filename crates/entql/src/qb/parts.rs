//! Structured query parts held by [`QueryBuilder`](super::QueryBuilder).

use crate::error::{OrmError, OrmResult};
use crate::qb::expr::{Expr, OrderBy};
use std::fmt;
use std::str::FromStr;

/// A root entity in the FROM (or UPDATE/DELETE target) list.
#[derive(Debug, Clone, PartialEq)]
pub struct FromEntity {
    pub entity: String,
    pub alias: String,
    pub index_by: Option<String>,
}

impl FromEntity {
    pub fn new(entity: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            alias: alias.into(),
            index_by: None,
        }
    }

    pub fn index_by(mut self, index_by: impl Into<String>) -> Self {
        self.index_by = Some(index_by.into());
        self
    }

    /// Parse `Entity [AS] alias [INDEX BY expr]`.
    pub fn parse(raw: &str) -> OrmResult<Self> {
        let tokens = tokenize(raw);
        let mut it = tokens.iter().peekable();

        let entity = it
            .next()
            .ok_or_else(|| OrmError::invalid_part("from", "missing entity"))?;
        if it.peek().is_some_and(|t| t.is("AS")) {
            it.next();
        }
        let alias = it
            .next()
            .ok_or_else(|| OrmError::invalid_part("from", format!("missing alias in '{raw}'")))?;

        let mut from = Self::new(entity.text, alias.text);
        match it.next() {
            None => {}
            Some(t) if t.is("INDEX") => {
                if !it.next().is_some_and(|t| t.is("BY")) {
                    return Err(OrmError::invalid_part("from", format!("expected BY in '{raw}'")));
                }
                let rest = it
                    .next()
                    .map(|t| raw[t.start..].trim())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| OrmError::invalid_part("from", format!("missing INDEX BY expression in '{raw}'")))?;
                from.index_by = Some(rest.to_string());
            }
            Some(t) => {
                return Err(OrmError::invalid_part(
                    "from",
                    format!("unexpected '{}' in '{raw}'", t.text),
                ));
            }
        }
        Ok(from)
    }
}

impl fmt::Display for FromEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity, self.alias)?;
        if let Some(index_by) = &self.index_by {
            write!(f, " INDEX BY {index_by}")?;
        }
        Ok(())
    }
}

/// Join kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    pub fn as_str(self) -> &'static str {
        match self {
            JoinKind::Inner => "INNER",
            JoinKind::Left => "LEFT",
        }
    }
}

/// How a join condition relates to the association's own condition.
///
/// `With` adds to the association join condition, `On` replaces it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConditionType {
    On,
    #[default]
    With,
}

impl ConditionType {
    pub fn as_str(self) -> &'static str {
        match self {
            ConditionType::On => "ON",
            ConditionType::With => "WITH",
        }
    }
}

/// A join onto an association path (`u.groups`) or an arbitrary entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub kind: JoinKind,
    pub path: String,
    pub alias: String,
    pub condition_type: Option<ConditionType>,
    pub condition: Option<Expr>,
    pub index_by: Option<String>,
}

impl Join {
    pub fn new(kind: JoinKind, path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            alias: alias.into(),
            condition_type: None,
            condition: None,
            index_by: None,
        }
    }

    pub fn inner(path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(JoinKind::Inner, path, alias)
    }

    pub fn left(path: impl Into<String>, alias: impl Into<String>) -> Self {
        Self::new(JoinKind::Left, path, alias)
    }

    /// Replace the association condition.
    pub fn on(mut self, condition: impl Into<Expr>) -> Self {
        self.condition_type = Some(ConditionType::On);
        self.condition = Some(condition.into());
        self
    }

    /// Add to the association condition.
    pub fn with_condition(mut self, condition: impl Into<Expr>) -> Self {
        self.condition_type = Some(ConditionType::With);
        self.condition = Some(condition.into());
        self
    }

    pub fn index_by(mut self, index_by: impl Into<String>) -> Self {
        self.index_by = Some(index_by.into());
        self
    }

    /// The alias the join path hangs off (`u` for `u.groups`), if the path is dotted.
    pub fn parent_alias(&self) -> Option<&str> {
        self.path.split_once('.').map(|(parent, _)| parent)
    }

    /// Parse `[INNER|LEFT [OUTER]] JOIN path [AS] alias [INDEX BY x] [ON|WITH cond]`.
    pub fn parse(raw: &str) -> OrmResult<Self> {
        let tokens = tokenize(raw);
        let mut it = tokens.iter().peekable();
        let err = |msg: String| OrmError::invalid_part("join", msg);

        let kind = match it.peek() {
            Some(t) if t.is("LEFT") => {
                it.next();
                if it.peek().is_some_and(|t| t.is("OUTER")) {
                    it.next();
                }
                JoinKind::Left
            }
            Some(t) if t.is("INNER") => {
                it.next();
                JoinKind::Inner
            }
            _ => JoinKind::Inner,
        };
        if !it.next().is_some_and(|t| t.is("JOIN")) {
            return Err(err(format!("expected JOIN in '{raw}'")));
        }
        let path = it
            .next()
            .ok_or_else(|| err(format!("missing join path in '{raw}'")))?;
        if it.peek().is_some_and(|t| t.is("AS")) {
            it.next();
        }
        let alias = it
            .next()
            .filter(|t| !t.is("INDEX") && !t.is("ON") && !t.is("WITH"))
            .ok_or_else(|| err(format!("missing join alias in '{raw}'")))?;

        let mut join = Self::new(kind, path.text, alias.text);
        while let Some(t) = it.next() {
            if t.is("INDEX") {
                if !it.next().is_some_and(|t| t.is("BY")) {
                    return Err(err(format!("expected BY in '{raw}'")));
                }
                let index = it
                    .next()
                    .ok_or_else(|| err(format!("missing INDEX BY expression in '{raw}'")))?;
                join.index_by = Some(index.text.to_string());
            } else if t.is("ON") || t.is("WITH") {
                let condition_type = if t.is("ON") {
                    ConditionType::On
                } else {
                    ConditionType::With
                };
                let condition = raw[t.end..].trim();
                if condition.is_empty() {
                    return Err(err(format!("missing join condition in '{raw}'")));
                }
                join.condition_type = Some(condition_type);
                join.condition = Some(Expr::raw(condition));
                break;
            } else {
                return Err(err(format!("unexpected '{}' in '{raw}'", t.text)));
            }
        }
        Ok(join)
    }
}

impl fmt::Display for Join {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} JOIN {} {}", self.kind.as_str(), self.path, self.alias)?;
        if let Some(index_by) = &self.index_by {
            write!(f, " INDEX BY {index_by}")?;
        }
        if let Some(condition) = self.condition.as_ref().filter(|c| !c.is_empty()) {
            let ty = self.condition_type.unwrap_or_default();
            write!(f, " {} {}", ty.as_str(), condition.render())?;
        }
        Ok(())
    }
}

/// A join together with the root alias it renders after.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEntry {
    /// `None` lets the builder resolve the root from the join path.
    pub root: Option<String>,
    pub join: Join,
}

/// Names of the query parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PartName {
    Distinct,
    Select,
    From,
    Join,
    Set,
    Where,
    GroupBy,
    Having,
    OrderBy,
}

impl PartName {
    pub const ALL: [PartName; 9] = [
        PartName::Distinct,
        PartName::Select,
        PartName::From,
        PartName::Join,
        PartName::Set,
        PartName::Where,
        PartName::GroupBy,
        PartName::Having,
        PartName::OrderBy,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PartName::Distinct => "distinct",
            PartName::Select => "select",
            PartName::From => "from",
            PartName::Join => "join",
            PartName::Set => "set",
            PartName::Where => "where",
            PartName::GroupBy => "groupBy",
            PartName::Having => "having",
            PartName::OrderBy => "orderBy",
        }
    }
}

impl FromStr for PartName {
    type Err = OrmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartName::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s) || p.as_str().replace("By", "_by").eq_ignore_ascii_case(s))
            .ok_or_else(|| OrmError::invalid_part("name", format!("unknown query part '{s}'")))
    }
}

impl fmt::Display for PartName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A query part with its content.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryPart {
    Distinct(bool),
    Select(Vec<Expr>),
    From(Vec<FromEntity>),
    Join(Vec<JoinEntry>),
    Set(Vec<Expr>),
    Where(Expr),
    GroupBy(Vec<String>),
    Having(Expr),
    OrderBy(Vec<OrderBy>),
}

impl QueryPart {
    pub fn name(&self) -> PartName {
        match self {
            QueryPart::Distinct(_) => PartName::Distinct,
            QueryPart::Select(_) => PartName::Select,
            QueryPart::From(_) => PartName::From,
            QueryPart::Join(_) => PartName::Join,
            QueryPart::Set(_) => PartName::Set,
            QueryPart::Where(_) => PartName::Where,
            QueryPart::GroupBy(_) => PartName::GroupBy,
            QueryPart::Having(_) => PartName::Having,
            QueryPart::OrderBy(_) => PartName::OrderBy,
        }
    }

    /// Parse a raw FROM fragment such as `App\User u INDEX BY u.id`.
    pub fn raw_from(raw: &str) -> OrmResult<Self> {
        Ok(QueryPart::From(vec![FromEntity::parse(raw)?]))
    }

    /// Parse a raw JOIN fragment such as `LEFT JOIN u.groups g WITH g.active = true`.
    pub fn raw_join(raw: &str) -> OrmResult<Self> {
        Ok(QueryPart::Join(vec![JoinEntry {
            root: None,
            join: Join::parse(raw)?,
        }]))
    }

    /// A join attached to an explicit root alias.
    pub fn join_on_root(root: impl Into<String>, join: Join) -> Self {
        QueryPart::Join(vec![JoinEntry {
            root: Some(root.into()),
            join,
        }])
    }
}

struct Token<'a> {
    text: &'a str,
    start: usize,
    end: usize,
}

impl Token<'_> {
    fn is(&self, keyword: &str) -> bool {
        self.text.eq_ignore_ascii_case(keyword)
    }
}

fn tokenize(raw: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut start = None;
    for (i, c) in raw.char_indices() {
        if c.is_whitespace() {
            if let Some(s) = start.take() {
                tokens.push(Token {
                    text: &raw[s..i],
                    start: s,
                    end: i,
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(Token {
            text: &raw[s..],
            start: s,
            end: raw.len(),
        });
    }
    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_from_fragments() {
        let f = FromEntity::parse("App\\User u").unwrap();
        assert_eq!(f.entity, "App\\User");
        assert_eq!(f.alias, "u");
        assert_eq!(f.index_by, None);

        let f = FromEntity::parse("User AS u INDEX BY u.id").unwrap();
        assert_eq!(f.alias, "u");
        assert_eq!(f.index_by.as_deref(), Some("u.id"));
        assert_eq!(f.to_string(), "User u INDEX BY u.id");

        assert!(FromEntity::parse("User").is_err());
        assert!(FromEntity::parse("User u WHERE").is_err());
    }

    #[test]
    fn parses_join_fragments() {
        let j = Join::parse("INNER JOIN u.groups g").unwrap();
        assert_eq!(j.kind, JoinKind::Inner);
        assert_eq!(j.path, "u.groups");
        assert_eq!(j.alias, "g");
        assert_eq!(j.parent_alias(), Some("u"));

        let j = Join::parse("left outer join u.phones p INDEX BY p.id WITH p.active = true AND p.kind = 'x'")
            .unwrap();
        assert_eq!(j.kind, JoinKind::Left);
        assert_eq!(j.index_by.as_deref(), Some("p.id"));
        assert_eq!(j.condition_type, Some(ConditionType::With));
        assert_eq!(
            j.condition.as_ref().map(Expr::render).as_deref(),
            Some("p.active = true AND p.kind = 'x'")
        );

        assert!(Join::parse("JOIN").is_err());
        assert!(Join::parse("u.groups g").is_err());
        assert!(Join::parse("JOIN u.groups g ON").is_err());
    }

    #[test]
    fn renders_joins() {
        let j = Join::inner("u.groups", "g");
        assert_eq!(j.to_string(), "INNER JOIN u.groups g");

        let j = Join::left("u.phones", "p").on("p.user = u").index_by("p.id");
        assert_eq!(j.to_string(), "LEFT JOIN u.phones p INDEX BY p.id ON p.user = u");

        let mut j = Join::inner("u.groups", "g");
        j.condition = Some(Expr::raw("g.id = 1"));
        assert_eq!(j.to_string(), "INNER JOIN u.groups g WITH g.id = 1");
    }

    #[test]
    fn part_names_parse() {
        assert_eq!("where".parse::<PartName>().unwrap(), PartName::Where);
        assert_eq!("groupBy".parse::<PartName>().unwrap(), PartName::GroupBy);
        assert_eq!("order_by".parse::<PartName>().unwrap(), PartName::OrderBy);
        assert!("limit".parse::<PartName>().is_err());
    }
}
