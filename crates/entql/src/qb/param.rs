//! Parameter storage for query builders.

use crate::error::{OrmError, OrmResult};
use crate::value::{ParamType, Value};
use std::fmt;

/// The key of a bound parameter: a name (`:status`) or a position (`?1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ParamKey {
    Named(String),
    Positional(usize),
}

impl ParamKey {
    /// The placeholder text for this key as it appears in DQL.
    pub fn placeholder(&self) -> String {
        match self {
            ParamKey::Named(name) => format!(":{name}"),
            ParamKey::Positional(pos) => format!("?{pos}"),
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            ParamKey::Named(name) => Some(name),
            ParamKey::Positional(_) => None,
        }
    }
}

impl From<&str> for ParamKey {
    /// A leading `:` is stripped; an all-digit key is positional.
    fn from(s: &str) -> Self {
        let s = s.strip_prefix(':').unwrap_or(s);
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(pos) = s.parse() {
                return ParamKey::Positional(pos);
            }
        }
        ParamKey::Named(s.to_string())
    }
}

impl From<String> for ParamKey {
    fn from(s: String) -> Self {
        ParamKey::from(s.as_str())
    }
}

impl From<usize> for ParamKey {
    fn from(pos: usize) -> Self {
        ParamKey::Positional(pos)
    }
}

impl fmt::Display for ParamKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamKey::Named(name) => f.write_str(name),
            ParamKey::Positional(pos) => write!(f, "{pos}"),
        }
    }
}

/// A bound parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    key: ParamKey,
    value: Value,
    ty: ParamType,
    typed: bool,
}

impl Parameter {
    /// Create a parameter whose type is inferred from the value.
    pub fn new(key: impl Into<ParamKey>, value: impl Into<Value>) -> Self {
        let value = value.into();
        Self {
            key: key.into(),
            ty: ParamType::infer(&value),
            value,
            typed: false,
        }
    }

    /// Create a parameter with an explicit type.
    pub fn typed(key: impl Into<ParamKey>, value: impl Into<Value>, ty: ParamType) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            ty,
            typed: true,
        }
    }

    pub fn key(&self) -> &ParamKey {
        &self.key
    }

    /// The parameter name, or the position rendered as text.
    pub fn name(&self) -> String {
        self.key.to_string()
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn param_type(&self) -> ParamType {
        self.ty
    }

    /// `true` when the type was given explicitly rather than inferred.
    pub fn is_explicitly_typed(&self) -> bool {
        self.typed
    }

    fn assign(&mut self, value: Value, ty: Option<ParamType>) {
        match ty {
            Some(ty) => {
                self.ty = ty;
                self.typed = true;
            }
            None => {
                self.ty = ParamType::infer(&value);
                self.typed = false;
            }
        }
        self.value = value;
    }
}

/// The ordered set of parameters bound to one builder.
///
/// Keys are unique. Insertion order is preserved and is the order the execution
/// layer sees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterRegistry {
    params: Vec<Parameter>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Insert a fully formed parameter. Fails if the key is already bound.
    pub fn insert(&mut self, param: Parameter) -> OrmResult<&Parameter> {
        if self.contains(&param.key) {
            return Err(OrmError::DuplicateName(param.key.to_string()));
        }
        self.params.push(param);
        Ok(&self.params[self.params.len() - 1])
    }

    /// Bind a value under `key`, or under the next free position when no key is given.
    pub fn bind(
        &mut self,
        key: Option<ParamKey>,
        value: impl Into<Value>,
        ty: Option<ParamType>,
    ) -> OrmResult<&Parameter> {
        let key = key.unwrap_or_else(|| ParamKey::Positional(self.next_position()));
        let param = match ty {
            Some(ty) => Parameter::typed(key, value, ty),
            None => Parameter::new(key, value),
        };
        self.insert(param)
    }

    /// Bind under `desired`, or under its lowest free `desired_N` variant.
    pub fn bind_avoiding(
        &mut self,
        desired: &str,
        value: impl Into<Value>,
        ty: Option<ParamType>,
    ) -> OrmResult<&Parameter> {
        let name = self.resolve_collision(desired);
        if name != desired {
            tracing::trace!(desired, resolved = %name, "renamed parameter to avoid collision");
        }
        self.bind(Some(ParamKey::Named(name)), value, ty)
    }

    /// `desired` if it is free, otherwise `desired_N` with the smallest free `N >= 1`.
    pub fn resolve_collision(&self, desired: &str) -> String {
        lowest_free_name(desired, |name| self.contains_name(name))
    }

    /// Insert or replace. A replaced parameter keeps its position.
    pub fn set(&mut self, key: impl Into<ParamKey>, value: impl Into<Value>, ty: Option<ParamType>) {
        let key = key.into();
        let value = value.into();
        match self.params.iter().position(|p| p.key == key) {
            Some(pos) => self.params[pos].assign(value, ty),
            None => {
                let param = match ty {
                    Some(ty) => Parameter::typed(key, value, ty),
                    None => Parameter::new(key, value),
                };
                self.params.push(param);
            }
        }
    }

    /// Replace every parameter at once.
    pub fn replace_all(&mut self, params: impl IntoIterator<Item = Parameter>) {
        self.params = params.into_iter().collect();
    }

    pub fn get(&self, key: impl Into<ParamKey>) -> Option<&Parameter> {
        let key = key.into();
        self.params.iter().find(|p| p.key == key)
    }

    pub fn contains(&self, key: &ParamKey) -> bool {
        self.params.iter().any(|p| &p.key == key)
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| p.key.as_name().is_some_and(|n| n == name))
    }

    /// All parameters in insertion order.
    pub fn all(&self) -> &[Parameter] {
        &self.params
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn clear(&mut self) {
        self.params.clear();
    }

    /// Extend with parameters from another registry, skipping keys already bound.
    pub fn extend(&mut self, other: &ParameterRegistry) {
        for param in &other.params {
            if !self.contains(&param.key) {
                self.params.push(param.clone());
            }
        }
    }

    fn next_position(&self) -> usize {
        let max = self
            .params
            .iter()
            .filter_map(|p| match p.key {
                ParamKey::Positional(pos) => Some(pos),
                ParamKey::Named(_) => None,
            })
            .max()
            .unwrap_or(0);
        max + 1
    }
}

impl<'a> IntoIterator for &'a ParameterRegistry {
    type Item = &'a Parameter;
    type IntoIter = std::slice::Iter<'a, Parameter>;

    fn into_iter(self) -> Self::IntoIter {
        self.params.iter()
    }
}

pub(crate) fn lowest_free_name(desired: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(desired) {
        return desired.to_string();
    }
    let mut n = 1usize;
    loop {
        let candidate = format!("{desired}_{n}");
        if !is_taken(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_from_str_strips_colon_and_detects_positions() {
        assert_eq!(ParamKey::from(":name"), ParamKey::Named("name".into()));
        assert_eq!(ParamKey::from("name"), ParamKey::Named("name".into()));
        assert_eq!(ParamKey::from("1"), ParamKey::Positional(1));
        assert_eq!(ParamKey::from("1").placeholder(), "?1");
        assert_eq!(ParamKey::from("x").placeholder(), ":x");
    }

    #[test]
    fn bind_without_key_synthesizes_positions() {
        let mut reg = ParameterRegistry::new();
        reg.bind(None, 1, None).unwrap();
        reg.bind(Some("named".into()), 2, None).unwrap();
        let p = reg.bind(None, 3, None).unwrap();
        assert_eq!(p.key(), &ParamKey::Positional(2));
    }

    #[test]
    fn bind_rejects_duplicates() {
        let mut reg = ParameterRegistry::new();
        reg.bind(Some("a".into()), 1, None).unwrap();
        let err = reg.bind(Some("a".into()), 2, None).unwrap_err();
        assert!(err.is_duplicate_name());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn resolve_collision_takes_lowest_free_suffix() {
        let mut reg = ParameterRegistry::new();
        assert_eq!(reg.resolve_collision("f"), "f");
        reg.bind(Some("f".into()), 1, None).unwrap();
        reg.bind(Some("f_2".into()), 1, None).unwrap();
        assert_eq!(reg.resolve_collision("f"), "f_1");
        reg.bind_avoiding("f", 9, None).unwrap();
        assert_eq!(reg.resolve_collision("f"), "f_3");
    }

    #[test]
    fn set_replaces_in_place() {
        let mut reg = ParameterRegistry::new();
        reg.set("a", 1, None);
        reg.set("b", 2, None);
        reg.set("a", "x", Some(ParamType::String));
        let names: Vec<_> = reg.iter().map(Parameter::name).collect();
        assert_eq!(names, ["a", "b"]);
        let a = reg.get("a").unwrap();
        assert_eq!(a.value(), &Value::from("x"));
        assert!(a.is_explicitly_typed());
    }

    #[test]
    fn clear_empties_registry() {
        let mut reg = ParameterRegistry::new();
        reg.set("a", 1, None);
        reg.clear();
        assert!(reg.is_empty());
        assert!(reg.get("a").is_none());
    }
}
