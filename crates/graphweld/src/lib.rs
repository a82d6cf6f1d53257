//! # graphweld
//!
//! Code-first GraphQL schema construction from registered type metadata.
//!
//! Plain Rust types become GraphQL object types by registering declaration
//! markers against them; the schema is derived entirely from that metadata.
//! It supports:
//!
//! - Type, field, argument, and context-binding declarations on plain structs
//! - Field inheritance along `extends` chains, with the most derived
//!   declaration overriding ancestors wholesale
//! - Lazy type resolution, so self-referential and mutually recursive types
//!   declare forward references through deferred thunks
//! - Positional argument mapping and request-context injection for callables
//! - Synchronous and asynchronous field resolution with field-local errors
//!
//! ## Overview
//!
//! Declarations accumulate in a [`MetadataRegistry`]. A [`SchemaAssembler`]
//! takes a snapshot of the registry, walks every class reachable from the
//! root classes, and materializes each exactly once into an executable
//! schema. Declaration problems abort the build; resolution problems at
//! request time are confined to the failing field.
//!
//! ## Example
//!
//! ```
//! use graphweld::declaration::{FieldDeclaration, TypeDeclaration, TypeSpec};
//! use graphweld::registry::MetadataRegistry;
//! use graphweld::schema::SchemaAssembler;
//!
//! #[derive(Default)]
//! struct Query;
//!
//! let registry = MetadataRegistry::new();
//! registry.register_type(TypeDeclaration::<Query>::new());
//! registry.register_field(FieldDeclaration::<Query>::property(
//!     "version",
//!     TypeSpec::STRING,
//!     |_query| "1.0",
//! ));
//!
//! let schema = SchemaAssembler::new(&registry).query::<Query>().assemble()?;
//! assert!(schema.sdl().contains("type Query"));
//! # Ok::<(), graphweld::SchemaError>(())
//! ```
//!
//! ## Modules
//!
//! - [`declaration`] - Type, field, argument, and context-binding markers
//! - [`registry`] - Metadata accumulation and snapshots
//! - [`schema`] - Schema assembly
//! - [`context`] - Request context injection and argument access
//! - [`value`] - Resolver result values and conversions
//! - [`config`] - Configuration options
//! - [`error`] - Error types for schema construction and field resolution

pub mod config;
pub mod context;
pub mod declaration;
pub mod error;
pub mod registry;
mod resolver;
pub mod schema;
pub mod value;

// Re-export main types
pub use config::SchemaConfig;
pub use context::{Invocation, RequestContext};
pub use declaration::{
    ArgumentDeclaration, ClassId, FieldDeclaration, ScalarKind, TypeDeclaration, TypeSpec,
};
pub use error::{FieldError, SchemaError};
pub use registry::MetadataRegistry;
pub use schema::{AssemblerConfig, SchemaAssembler, create_schema, create_schema_with_mutation};
pub use value::{FieldOutcome, Instance, Resolved};

/// The execution engine this crate builds schemas for, re-exported so
/// downstream crates can run requests without a separate dependency.
pub use async_graphql;

/// Result type for schema construction.
pub type Result<T> = std::result::Result<T, SchemaError>;
