//! Field path handling.
//!
//! [`FieldPath`] is a dotted entity field reference such as `status`, `u.name` or
//! `u.address.city`. Every segment is validated against `[A-Za-z_][A-Za-z0-9_]*`.
//!
//! # Example
//! ```ignore
//! use entql::FieldPath;
//!
//! let p = FieldPath::parse("u.name")?;
//! assert_eq!(p.head(), "u");
//! assert_eq!(p.as_param_name(), "u_name");
//! # Ok::<(), entql::OrmError>(())
//! ```

use crate::error::{OrmError, OrmResult};
use std::fmt;

/// A validated dotted field reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Parse and validate a field token.
    pub fn parse(s: &str) -> OrmResult<Self> {
        if s.is_empty() {
            return Err(OrmError::unrecognized_field(s));
        }

        let mut segments = Vec::new();
        for segment in s.split('.') {
            if !is_valid_segment(segment) {
                return Err(OrmError::unrecognized_field(s));
            }
            segments.push(segment.to_string());
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// `true` when the path carries an alias (or association) prefix.
    pub fn is_qualified(&self) -> bool {
        self.segments.len() > 1
    }

    /// The first segment: the alias of a qualified path, the field otherwise.
    pub fn head(&self) -> &str {
        &self.segments[0]
    }

    /// The last segment.
    pub fn leaf(&self) -> &str {
        &self.segments[self.segments.len() - 1]
    }

    /// Everything after the head, joined with `.`.
    pub fn tail(&self) -> String {
        self.segments[1..].join(".")
    }

    /// Prefix the path with an alias.
    pub fn qualified_with(&self, alias: &str) -> Self {
        let mut segments = Vec::with_capacity(self.segments.len() + 1);
        segments.push(alias.to_string());
        segments.extend(self.segments.iter().cloned());
        Self { segments }
    }

    /// Natural parameter name: segments joined with `_`.
    pub fn as_param_name(&self) -> String {
        self.segments.join("_")
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Check a single identifier segment: `[A-Za-z_][A-Za-z0-9_]*`.
pub(crate) fn is_valid_segment(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_and_dotted() {
        let p = FieldPath::parse("status").unwrap();
        assert!(!p.is_qualified());
        assert_eq!(p.head(), "status");

        let p = FieldPath::parse("u.address.city").unwrap();
        assert!(p.is_qualified());
        assert_eq!(p.head(), "u");
        assert_eq!(p.leaf(), "city");
        assert_eq!(p.tail(), "address.city");
        assert_eq!(p.as_param_name(), "u_address_city");
        assert_eq!(p.to_string(), "u.address.city");
    }

    #[test]
    fn qualifies_with_alias() {
        let p = FieldPath::parse("name").unwrap().qualified_with("u");
        assert_eq!(p.to_string(), "u.name");
    }

    #[test]
    fn rejects_malformed_tokens() {
        for bad in ["", "1abc", "a..b", ".a", "a.", "a b", "a-b", "u.name; DROP"] {
            let err = FieldPath::parse(bad).unwrap_err();
            assert!(err.is_unrecognized_field(), "{bad}");
        }
    }
}
