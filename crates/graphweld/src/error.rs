//! Error types for schema construction and field resolution.
//!
//! [`SchemaError`] covers everything that can go wrong while assembling a
//! schema; any variant aborts the build and no schema object is returned.
//! [`FieldError`] is the runtime failure a resolver reports; it stays local
//! to the failing field's response path and never tears down the request.

use std::error::Error as StdError;

use thiserror::Error;

use crate::declaration::ClassId;

/// Extension code attached to engine errors produced by failed resolvers.
pub(crate) const FIELD_RESOLUTION_CODE: &str = "FIELD_RESOLUTION_FAILED";

/// Build-time failures. Raised by [`SchemaAssembler::assemble`] and the
/// `create_schema` entry points.
///
/// [`SchemaAssembler::assemble`]: crate::schema::SchemaAssembler::assemble
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A class carries field, argument, or context metadata but was never
    /// registered as a type. Deliberately deferred from registration time
    /// to build time.
    #[error("{class} carries member metadata but was never registered as a type")]
    NotAType { class: ClassId },

    /// A field or root referenced a class the registry has never seen.
    #[error("type reference to {class} does not resolve to a registered type")]
    UnknownType { class: ClassId },

    /// An argument position does not correspond to a parameter the
    /// underlying callable accepts. Property fields accept none.
    #[error(
        "argument `{argument}` of {type_name}.{field} is declared at position {position}, \
         but the accessor only takes {arity} argument(s)"
    )]
    ArgumentMapping {
        type_name: String,
        field: String,
        argument: String,
        position: usize,
        arity: usize,
    },

    /// Arguments were registered for a method name the declaring class
    /// never declared a field for.
    #[error("argument `{argument}` targets {type_name}.{method}, which is not declared")]
    UnknownArgumentTarget {
        type_name: String,
        method: String,
        argument: String,
    },

    /// Two distinct classes resolved to the same exposed type name.
    #[error("type name `{name}` is declared by both {first} and {second}")]
    DuplicateTypeName {
        name: String,
        first: ClassId,
        second: ClassId,
    },

    /// A declared type, field, or argument name is not a valid GraphQL name.
    #[error("`{name}` is not a valid GraphQL {kind} name")]
    InvalidName { name: String, kind: &'static str },

    /// The `extends` chain starting at a class loops back on itself.
    #[error("extends chain starting at {class} loops back on itself")]
    InheritanceCycle { class: ClassId },

    /// Assembly was started without a query root class.
    #[error("no query root class was provided")]
    MissingQueryRoot,

    /// The execution engine rejected the finished type graph.
    #[error("schema engine rejected the assembled type graph: {0}")]
    Engine(String),
}

impl SchemaError {
    /// Stable machine-readable code for each build failure.
    pub fn code(&self) -> &'static str {
        match self {
            SchemaError::NotAType { .. } => "NOT_A_TYPE",
            SchemaError::UnknownType { .. } => "UNKNOWN_TYPE",
            SchemaError::ArgumentMapping { .. } => "ARGUMENT_MAPPING",
            SchemaError::UnknownArgumentTarget { .. } => "UNKNOWN_ARGUMENT_TARGET",
            SchemaError::DuplicateTypeName { .. } => "DUPLICATE_TYPE_NAME",
            SchemaError::InvalidName { .. } => "INVALID_NAME",
            SchemaError::InheritanceCycle { .. } => "INHERITANCE_CYCLE",
            SchemaError::MissingQueryRoot => "MISSING_QUERY_ROOT",
            SchemaError::Engine(_) => "ENGINE_REJECTED",
        }
    }
}

/// Runtime failure produced inside a bound resolver.
///
/// The binder converts it into an engine error on the failing field's
/// response path; sibling fields keep resolving.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct FieldError {
    message: String,
    #[source]
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        FieldError::new(message)
    }
}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        FieldError::new(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marked;

    #[test]
    fn build_errors_render_the_offending_class() {
        let error = SchemaError::NotAType {
            class: ClassId::of::<Marked>(),
        };
        let text = error.to_string();
        assert!(
            text.contains("Marked") && text.contains("never registered"),
            "unexpected display: {text}"
        );
        assert_eq!(error.code(), "NOT_A_TYPE");
    }

    #[test]
    fn argument_mapping_names_every_coordinate() {
        let error = SchemaError::ArgumentMapping {
            type_name: "Item".to_string(),
            field: "find".to_string(),
            argument: "needle".to_string(),
            position: 2,
            arity: 1,
        };
        let text = error.to_string();
        for expected in ["Item.find", "`needle`", "position 2", "1 argument"] {
            assert!(text.contains(expected), "missing `{expected}` in: {text}");
        }
        assert_eq!(error.code(), "ARGUMENT_MAPPING");
    }

    #[test]
    fn field_error_keeps_its_source_chain() {
        let inner = std::io::Error::other("backend offline");
        let error = FieldError::with_source("lookup failed", inner);
        assert_eq!(error.to_string(), "lookup failed");
        let source = StdError::source(&error).expect("source should be kept");
        assert_eq!(source.to_string(), "backend offline");
    }

    #[test]
    fn field_error_converts_from_plain_messages() {
        let from_str: FieldError = "boom".into();
        assert_eq!(from_str.message(), "boom");
        let from_string: FieldError = String::from("bang").into();
        assert_eq!(from_string.message(), "bang");
    }
}
