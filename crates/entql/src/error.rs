//! Error types for entql

use thiserror::Error;

/// Result type alias for entql operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Errors raised while building or compiling queries.
///
/// All of these are usage errors reported at the offending call; nothing is retried
/// and state mutated before the failing call is kept.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrmError {
    /// A field, join or index reference names an alias that is not in scope.
    #[error("Unknown alias '{alias}' (known aliases: [{known}])")]
    UnknownAlias { alias: String, known: String },

    /// An exact parameter bind requested a name that is already bound.
    #[error("Parameter '{0}' is already bound")]
    DuplicateName(String),

    /// A raw mutation that the target part cannot honor.
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// An ordering direction that is neither ascending nor descending.
    #[error("Invalid order by orientation '{direction}' specified for {target}")]
    InvalidOrientation { target: String, direction: String },

    /// A field token that is malformed or unknown to the entity metadata.
    #[error("Unrecognized field: {field}")]
    UnrecognizedField {
        entity: Option<String>,
        field: String,
    },

    /// Identifier values given for fields that are not part of the identifier.
    #[error("Unrecognized identifier fields: '{fields}' are not present on class '{entity}'")]
    UnrecognizedIdentifierFields { entity: String, fields: String },

    /// An identifier lookup that does not cover every identifier field.
    #[error("The identifier {field} is missing for a query of {entity}")]
    MissingIdentifierField { entity: String, field: String },

    /// The metadata store does not know the entity.
    #[error("Unknown entity: {0}")]
    UnknownEntity(String),

    /// Find methods only work on the owning side of an association.
    #[error(
        "You cannot search for the association field '{entity}#{field}', because it is the inverse side of an association"
    )]
    InverseSideAssociation { entity: String, field: String },

    /// An operation that needs a root alias was invoked before any FROM was set.
    #[error("No alias was set before invoking {0}")]
    MissingRootAlias(String),

    /// A raw FROM/JOIN fragment that could not be read.
    #[error("Invalid {part} part: {message}")]
    InvalidPart { part: &'static str, message: String },

    /// No named query is registered under the given name.
    #[error("Named query '{0}' not found")]
    NamedQueryNotFound(String),

    /// An `Alias:Entity` short name whose namespace alias is not configured.
    #[error("Unknown entity namespace alias '{0}'")]
    UnknownEntityNamespace(String),

    /// A function that is neither built in nor registered in the configuration.
    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    /// Configuration could not be read or parsed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A serialized criteria document could not be decoded.
    #[error("Invalid criteria: {0}")]
    InvalidCriteria(String),
}

impl OrmError {
    /// Create an unknown alias error listing the aliases that are in scope.
    pub fn unknown_alias<'a>(
        alias: impl Into<String>,
        known: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        Self::UnknownAlias {
            alias: alias.into(),
            known: known.into_iter().collect::<Vec<_>>().join(", "),
        }
    }

    /// Create an unrecognized field error without entity context.
    pub fn unrecognized_field(field: impl Into<String>) -> Self {
        Self::UnrecognizedField {
            entity: None,
            field: field.into(),
        }
    }

    /// Create an invalid orientation error for `target` (usually `Entity#field`).
    pub fn invalid_orientation(target: impl Into<String>, direction: impl Into<String>) -> Self {
        Self::InvalidOrientation {
            target: target.into(),
            direction: direction.into(),
        }
    }

    pub(crate) fn invalid_part(part: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidPart {
            part,
            message: message.into(),
        }
    }

    /// Check if this is an unknown alias error
    pub fn is_unknown_alias(&self) -> bool {
        matches!(self, Self::UnknownAlias { .. })
    }

    /// Check if this is a duplicate parameter name error
    pub fn is_duplicate_name(&self) -> bool {
        matches!(self, Self::DuplicateName(_))
    }

    /// Check if this is an unsupported operation error
    pub fn is_unsupported_operation(&self) -> bool {
        matches!(self, Self::UnsupportedOperation(_))
    }

    /// Check if this is an invalid orientation error
    pub fn is_invalid_orientation(&self) -> bool {
        matches!(self, Self::InvalidOrientation { .. })
    }

    /// Check if this is an unrecognized field error
    pub fn is_unrecognized_field(&self) -> bool {
        matches!(self, Self::UnrecognizedField { .. })
    }
}

impl From<toml::de::Error> for OrmError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidCriteria(err.to_string())
    }
}
