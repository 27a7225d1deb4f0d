//! Expression tree for DQL conditions, select items and function calls.
//!
//! [`Expr`] nodes render themselves to DQL text. Boolean aggregation goes through
//! [`Composite`], which takes care of grouping nested fragments:
//!
//! - a composite with a single child renders as that child
//! - a nested composite with more than one child is parenthesized
//! - any other nested fragment whose text has a top-level ` AND `/` OR ` is parenthesized
//!
//! ```ignore
//! use entql::qb::Expr;
//!
//! let e = Expr::and(vec![
//!     Expr::or(vec![Expr::eq("u.id", ":a"), Expr::eq("u.id", ":b")]),
//!     Expr::eq("u.name", ":name"),
//! ]);
//! assert_eq!(e.render(), "(u.id = :a OR u.id = :b) AND u.name = :name");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Boolean aggregation kind of a [`Composite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum BoolKind {
    And,
    Or,
}

impl BoolKind {
    /// Separator placed between the children.
    pub fn separator(self) -> &'static str {
        match self {
            BoolKind::And => " AND ",
            BoolKind::Or => " OR ",
        }
    }
}

/// Binary comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    MemberOf,
    InstanceOf,
}

impl ComparisonOp {
    /// The DQL keyword.
    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::Neq => "<>",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::MemberOf => "MEMBER OF",
            ComparisonOp::InstanceOf => "INSTANCE OF",
        }
    }
}

/// Arithmetic operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MathOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl MathOp {
    /// The DQL operator.
    pub fn as_str(self) -> &'static str {
        match self {
            MathOp::Add => "+",
            MathOp::Sub => "-",
            MathOp::Mul => "*",
            MathOp::Div => "/",
        }
    }
}

/// An inline literal.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Literal::Int(i) => write!(f, "{i}"),
            Literal::Float(x) => write!(f, "{x}"),
            Literal::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for Literal {
    fn from(s: &str) -> Self {
        Literal::String(s.to_string())
    }
}

impl From<String> for Literal {
    fn from(s: String) -> Self {
        Literal::String(s)
    }
}

impl From<i32> for Literal {
    fn from(v: i32) -> Self {
        Literal::Int(i64::from(v))
    }
}

impl From<i64> for Literal {
    fn from(v: i64) -> Self {
        Literal::Int(v)
    }
}

impl From<f64> for Literal {
    fn from(v: f64) -> Self {
        Literal::Float(v)
    }
}

impl From<bool> for Literal {
    fn from(v: bool) -> Self {
        Literal::Bool(v)
    }
}

/// An ordered AND/OR aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    kind: BoolKind,
    parts: Vec<Expr>,
}

impl Composite {
    /// An empty composite.
    pub fn new(kind: BoolKind) -> Self {
        Self {
            kind,
            parts: Vec::new(),
        }
    }

    /// A composite holding `parts`, with empty parts dropped.
    pub fn with_parts(kind: BoolKind, parts: impl IntoIterator<Item = Expr>) -> Self {
        let mut c = Self::new(kind);
        c.add_all(parts);
        c
    }

    /// AND or OR.
    pub fn kind(&self) -> BoolKind {
        self.kind
    }

    /// The child expressions, in order.
    pub fn parts(&self) -> &[Expr] {
        &self.parts
    }

    /// Append a child. Empty fragments are ignored.
    pub fn add(&mut self, part: impl Into<Expr>) -> &mut Self {
        let part = part.into();
        if !part.is_empty() {
            self.parts.push(part);
        }
        self
    }

    /// Append several children, skipping empty ones.
    pub fn add_all(&mut self, parts: impl IntoIterator<Item = Expr>) -> &mut Self {
        for part in parts {
            self.add(part);
        }
        self
    }

    /// Number of children.
    pub fn count(&self) -> usize {
        self.parts.len()
    }

    /// True when the composite has no children.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Children joined by the composite's keyword.
    pub fn render(&self) -> String {
        if self.parts.len() == 1 {
            return self.parts[0].render();
        }
        self.parts
            .iter()
            .map(|part| {
                let text = part.render();
                if needs_grouping(part, &text) {
                    format!("({text})")
                } else {
                    text
                }
            })
            .collect::<Vec<_>>()
            .join(self.kind.separator())
    }
}

impl fmt::Display for Composite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

fn needs_grouping(part: &Expr, text: &str) -> bool {
    match part {
        Expr::Composite(c) if c.count() > 1 => true,
        Expr::Composite(c) => c.parts.first().is_some_and(|only| needs_grouping(only, text)),
        _ => has_top_level_bool(text),
    }
}

/// Scan for ` AND ` / ` OR ` outside parentheses and string literals.
pub(crate) fn has_top_level_bool(text: &str) -> bool {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        if in_quote {
            if b == b'\'' {
                in_quote = false;
            }
        } else {
            match b {
                b'\'' => in_quote = true,
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                b' ' if depth == 0 => {
                    let rest = &bytes[i..];
                    if starts_with_ignore_case(rest, b" AND ") || starts_with_ignore_case(rest, b" OR ") {
                        return true;
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }
    false
}

fn starts_with_ignore_case(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len() && haystack[..needle.len()].eq_ignore_ascii_case(needle)
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Raw DQL fragment, used verbatim.
    Raw(String),

    /// Inline literal.
    Literal(Literal),

    /// `left op right`
    Comparison {
        left: Box<Expr>,
        op: ComparisonOp,
        right: Box<Expr>,
    },

    /// AND/OR aggregation.
    Composite(Composite),

    /// `NAME(arg, ...)`
    Func { name: String, args: Vec<Expr> },

    /// `expr IN(values)` / `expr NOT IN(values)`
    In {
        expr: Box<Expr>,
        values: Vec<Expr>,
        negated: bool,
    },

    /// `NOT(expr)`
    Not(Box<Expr>),

    /// `expr IS NULL` / `expr IS NOT NULL`
    NullCheck { expr: Box<Expr>, negated: bool },

    /// `expr BETWEEN low AND high`
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
    },

    /// `expr LIKE pattern` / `expr NOT LIKE pattern`
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },

    /// `left op right`; nested math operands are parenthesized.
    Math {
        left: Box<Expr>,
        op: MathOp,
        right: Box<Expr>,
    },
}

impl Expr {
    /// Raw DQL fragment.
    pub fn raw(text: impl Into<String>) -> Self {
        Expr::Raw(text.into())
    }

    /// Inline literal: strings are quoted, numbers and booleans render bare.
    pub fn literal(value: impl Into<Literal>) -> Self {
        Expr::Literal(value.into())
    }

    /// AND composite over the given children.
    pub fn and(parts: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Composite(Composite::with_parts(BoolKind::And, parts))
    }

    /// OR composite over the given children.
    pub fn or(parts: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Composite(Composite::with_parts(BoolKind::Or, parts))
    }

    /// `NOT(expr)`.
    pub fn not(expr: impl Into<Expr>) -> Self {
        Expr::Not(Box::new(expr.into()))
    }

    /// `left op right`.
    pub fn comparison(left: impl Into<Expr>, op: ComparisonOp, right: impl Into<Expr>) -> Self {
        Expr::Comparison {
            left: Box::new(left.into()),
            op,
            right: Box::new(right.into()),
        }
    }

    /// `left = right`
    pub fn eq(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::comparison(left, ComparisonOp::Eq, right)
    }

    /// `left <> right`
    pub fn neq(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::comparison(left, ComparisonOp::Neq, right)
    }

    /// `left < right`
    pub fn lt(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::comparison(left, ComparisonOp::Lt, right)
    }

    /// `left <= right`
    pub fn lte(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::comparison(left, ComparisonOp::Lte, right)
    }

    /// `left > right`
    pub fn gt(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::comparison(left, ComparisonOp::Gt, right)
    }

    /// `left >= right`
    pub fn gte(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::comparison(left, ComparisonOp::Gte, right)
    }

    /// `expr IS NULL`.
    pub fn is_null(expr: impl Into<Expr>) -> Self {
        Expr::NullCheck {
            expr: Box::new(expr.into()),
            negated: false,
        }
    }

    /// `expr IS NOT NULL`.
    pub fn is_not_null(expr: impl Into<Expr>) -> Self {
        Expr::NullCheck {
            expr: Box::new(expr.into()),
            negated: true,
        }
    }

    /// `expr IN(v1, v2)` over inline literals.
    pub fn in_list<L: Into<Literal>>(expr: impl Into<Expr>, values: impl IntoIterator<Item = L>) -> Self {
        Self::membership(expr, values.into_iter().map(|v| Expr::Literal(v.into())).collect(), false)
    }

    /// `expr NOT IN(v1, v2)` over inline literals.
    pub fn not_in_list<L: Into<Literal>>(expr: impl Into<Expr>, values: impl IntoIterator<Item = L>) -> Self {
        Self::membership(expr, values.into_iter().map(|v| Expr::Literal(v.into())).collect(), true)
    }

    /// `expr IN(inner)`, where `inner` is a placeholder or subquery.
    pub fn in_expr(expr: impl Into<Expr>, inner: impl Into<Expr>) -> Self {
        Self::membership(expr, vec![inner.into()], false)
    }

    /// `expr NOT IN(inner)`
    pub fn not_in_expr(expr: impl Into<Expr>, inner: impl Into<Expr>) -> Self {
        Self::membership(expr, vec![inner.into()], true)
    }

    fn membership(expr: impl Into<Expr>, values: Vec<Expr>, negated: bool) -> Self {
        Expr::In {
            expr: Box::new(expr.into()),
            values,
            negated,
        }
    }

    /// `expr LIKE pattern`.
    pub fn like(expr: impl Into<Expr>, pattern: impl Into<Expr>) -> Self {
        Expr::Like {
            expr: Box::new(expr.into()),
            pattern: Box::new(pattern.into()),
            negated: false,
        }
    }

    /// `expr NOT LIKE pattern`.
    pub fn not_like(expr: impl Into<Expr>, pattern: impl Into<Expr>) -> Self {
        Expr::Like {
            expr: Box::new(expr.into()),
            pattern: Box::new(pattern.into()),
            negated: true,
        }
    }

    /// `expr BETWEEN low AND high`.
    pub fn between(expr: impl Into<Expr>, low: impl Into<Expr>, high: impl Into<Expr>) -> Self {
        Expr::Between {
            expr: Box::new(expr.into()),
            low: Box::new(low.into()),
            high: Box::new(high.into()),
        }
    }

    /// Function call `NAME(args)`.
    pub fn func(name: impl Into<String>, args: impl IntoIterator<Item = Expr>) -> Self {
        Expr::Func {
            name: name.into(),
            args: args.into_iter().collect(),
        }
    }

    fn unary(name: &str, arg: impl Into<Expr>) -> Self {
        Self::func(name, [arg.into()])
    }

    /// `COUNT(expr)`.
    pub fn count(expr: impl Into<Expr>) -> Self {
        Self::unary("COUNT", expr)
    }

    /// `COUNT(DISTINCT a, b)`
    pub fn count_distinct(exprs: impl IntoIterator<Item = Expr>) -> Self {
        let inner = exprs
            .into_iter()
            .map(|e| e.render())
            .collect::<Vec<_>>()
            .join(", ");
        Self::unary("COUNT", Expr::Raw(format!("DISTINCT {inner}")))
    }

    /// `MAX(expr)`.
    pub fn max(expr: impl Into<Expr>) -> Self {
        Self::unary("MAX", expr)
    }

    /// `MIN(expr)`.
    pub fn min(expr: impl Into<Expr>) -> Self {
        Self::unary("MIN", expr)
    }

    /// `AVG(expr)`.
    pub fn avg(expr: impl Into<Expr>) -> Self {
        Self::unary("AVG", expr)
    }

    /// `SUM(expr)`.
    pub fn sum(expr: impl Into<Expr>) -> Self {
        Self::unary("SUM", expr)
    }

    /// `ABS(expr)`.
    pub fn abs(expr: impl Into<Expr>) -> Self {
        Self::unary("ABS", expr)
    }

    /// `SQRT(expr)`.
    pub fn sqrt(expr: impl Into<Expr>) -> Self {
        Self::unary("SQRT", expr)
    }

    /// `LOWER(expr)`.
    pub fn lower(expr: impl Into<Expr>) -> Self {
        Self::unary("LOWER", expr)
    }

    /// `UPPER(expr)`.
    pub fn upper(expr: impl Into<Expr>) -> Self {
        Self::unary("UPPER", expr)
    }

    /// `LENGTH(expr)`.
    pub fn length(expr: impl Into<Expr>) -> Self {
        Self::unary("LENGTH", expr)
    }

    /// `TRIM(expr)`.
    pub fn trim(expr: impl Into<Expr>) -> Self {
        Self::unary("TRIM", expr)
    }

    /// `CONCAT(a, b, ...)`.
    pub fn concat(parts: impl IntoIterator<Item = Expr>) -> Self {
        Self::func("CONCAT", parts)
    }

    /// `SUBSTRING(expr, from[, len])`
    pub fn substring(expr: impl Into<Expr>, from: i64, len: Option<i64>) -> Self {
        let mut args = vec![expr.into(), Expr::literal(from)];
        if let Some(len) = len {
            args.push(Expr::literal(len));
        }
        Self::func("SUBSTRING", args)
    }

    /// `ALL(subquery)`.
    pub fn all(subquery: impl Into<Expr>) -> Self {
        Self::unary("ALL", subquery)
    }

    /// `SOME(subquery)`.
    pub fn some(subquery: impl Into<Expr>) -> Self {
        Self::unary("SOME", subquery)
    }

    /// `ANY(subquery)`.
    pub fn any(subquery: impl Into<Expr>) -> Self {
        Self::unary("ANY", subquery)
    }

    /// `EXISTS(subquery)`.
    pub fn exists(subquery: impl Into<Expr>) -> Self {
        Self::unary("EXISTS", subquery)
    }

    /// `member MEMBER OF collection`
    pub fn is_member_of(member: impl Into<Expr>, collection: impl Into<Expr>) -> Self {
        Self::comparison(member, ComparisonOp::MemberOf, collection)
    }

    /// `expr INSTANCE OF class`
    pub fn is_instance_of(expr: impl Into<Expr>, class: impl Into<String>) -> Self {
        Self::comparison(expr, ComparisonOp::InstanceOf, Expr::Raw(class.into()))
    }

    /// Arithmetic `left op right`; nested arithmetic operands are parenthesized.
    pub fn math(left: impl Into<Expr>, op: MathOp, right: impl Into<Expr>) -> Self {
        Expr::Math {
            left: Box::new(left.into()),
            op,
            right: Box::new(right.into()),
        }
    }

    /// `left * right`.
    pub fn prod(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::math(left, MathOp::Mul, right)
    }

    /// `left - right`.
    pub fn diff(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::math(left, MathOp::Sub, right)
    }

    /// `left / right`.
    pub fn quot(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::math(left, MathOp::Div, right)
    }

    /// `left + right`.
    pub fn add(left: impl Into<Expr>, right: impl Into<Expr>) -> Self {
        Self::math(left, MathOp::Add, right)
    }

    /// Combine `self` with `child` under `kind`.
    ///
    /// When `self` already is a composite of that kind the child is appended to it,
    /// otherwise a new composite wraps both. Empty children are dropped.
    pub fn append(self, child: impl Into<Expr>, kind: BoolKind) -> Expr {
        self.append_all([child.into()], kind)
    }

    /// Like [`Expr::append`] for several children at once.
    pub fn append_all(self, children: impl IntoIterator<Item = Expr>, kind: BoolKind) -> Expr {
        match self {
            Expr::Composite(mut c) if c.kind == kind => {
                c.add_all(children);
                Expr::Composite(c)
            }
            current => {
                let mut c = Composite::new(kind);
                c.add(current);
                c.add_all(children);
                Expr::Composite(c)
            }
        }
    }

    /// `true` for empty raw fragments and composites without children.
    pub fn is_empty(&self) -> bool {
        match self {
            Expr::Raw(s) => s.trim().is_empty(),
            Expr::Composite(c) => c.is_empty(),
            _ => false,
        }
    }

    /// The composite node, if this is one.
    pub fn as_composite(&self) -> Option<&Composite> {
        match self {
            Expr::Composite(c) => Some(c),
            _ => None,
        }
    }

    /// Render to DQL text.
    pub fn render(&self) -> String {
        match self {
            Expr::Raw(s) => s.clone(),
            Expr::Literal(l) => l.to_string(),
            Expr::Comparison { left, op, right } => {
                format!("{} {} {}", left.render(), op.as_str(), right.render())
            }
            Expr::Composite(c) => c.render(),
            Expr::Func { name, args } => format!("{}({})", name, join_rendered(args)),
            Expr::In {
                expr,
                values,
                negated,
            } => {
                let kw = if *negated { "NOT IN" } else { "IN" };
                format!("{} {}({})", expr.render(), kw, join_rendered(values))
            }
            Expr::Not(inner) => format!("NOT({})", inner.render()),
            Expr::NullCheck { expr, negated } => {
                let kw = if *negated { "IS NOT NULL" } else { "IS NULL" };
                format!("{} {}", expr.render(), kw)
            }
            Expr::Between { expr, low, high } => {
                format!("{} BETWEEN {} AND {}", expr.render(), low.render(), high.render())
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                let kw = if *negated { "NOT LIKE" } else { "LIKE" };
                format!("{} {} {}", expr.render(), kw, pattern.render())
            }
            Expr::Math { left, op, right } => {
                format!("{} {} {}", math_operand(left), op.as_str(), math_operand(right))
            }
        }
    }
}

fn join_rendered(exprs: &[Expr]) -> String {
    exprs.iter().map(Expr::render).collect::<Vec<_>>().join(", ")
}

fn math_operand(expr: &Expr) -> String {
    match expr {
        Expr::Math { .. } => format!("({})", expr.render()),
        _ => expr.render(),
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Expr::Raw(s.to_string())
    }
}

impl From<String> for Expr {
    fn from(s: String) -> Self {
        Expr::Raw(s)
    }
}

impl From<&String> for Expr {
    fn from(s: &String) -> Self {
        Expr::Raw(s.clone())
    }
}

impl From<Literal> for Expr {
    fn from(l: Literal) -> Self {
        Expr::Literal(l)
    }
}

impl From<Composite> for Expr {
    fn from(c: Composite) -> Self {
        Expr::Composite(c)
    }
}

impl From<i32> for Expr {
    fn from(v: i32) -> Self {
        Expr::Literal(Literal::from(v))
    }
}

impl From<i64> for Expr {
    fn from(v: i64) -> Self {
        Expr::Literal(Literal::Int(v))
    }
}

impl From<f64> for Expr {
    fn from(v: f64) -> Self {
        Expr::Literal(Literal::Float(v))
    }
}

impl From<bool> for Expr {
    fn from(v: bool) -> Self {
        Expr::Literal(Literal::Bool(v))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl Direction {
    /// Case-insensitive parse of `ASC` / `DESC`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("asc") {
            Some(Direction::Asc)
        } else if s.eq_ignore_ascii_case("desc") {
            Some(Direction::Desc)
        } else {
            None
        }
    }

    /// `ASC` or `DESC`.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An ORDER BY entry list: `sort DIR, sort DIR`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    items: Vec<(String, Direction)>,
}

impl OrderBy {
    /// A single `sort direction` entry.
    pub fn new(sort: impl Into<String>, direction: Direction) -> Self {
        Self {
            items: vec![(sort.into(), direction)],
        }
    }

    /// `sort ASC`.
    pub fn asc(sort: impl Into<String>) -> Self {
        Self::new(sort, Direction::Asc)
    }

    /// `sort DESC`.
    pub fn desc(sort: impl Into<String>) -> Self {
        Self::new(sort, Direction::Desc)
    }

    /// Append another `sort direction` item.
    pub fn add(mut self, sort: impl Into<String>, direction: Direction) -> Self {
        self.items.push((sort.into(), direction));
        self
    }

    /// The `(sort, direction)` items.
    pub fn items(&self) -> &[(String, Direction)] {
        &self.items
    }

    /// True when there are no items.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items joined by `, `.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .map(|(sort, dir)| format!("{sort} {dir}"))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
