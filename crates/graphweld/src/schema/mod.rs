//! Schema construction from registered declarations.
//!
//! This module turns the metadata accumulated in a registry into an
//! executable GraphQL schema. Construction is driven by reachability: the
//! root classes seed a worklist, and every class referenced by a resolved
//! field type joins it exactly once.
//!
//! ## Components
//!
//! - [`SchemaAssembler`] - Assembles a registry snapshot into a schema
//! - [`AssemblerConfig`] - Engine limits and introspection toggle
//! - `inheritance` - Merges field declarations along `extends` chains
//! - `type_graph` - Assigns type names and tracks materialization
//!
//! ## Build process
//!
//! 1. Snapshot the registry; later registrations do not leak in
//! 2. Touch the root classes, assigning their type names
//! 3. Drain the worklist, materializing one object per class
//! 4. Register the objects and finish the engine schema
//!
//! A failed build registers nothing. A successful schema holds only the
//! snapshot data it was built from, so rebuilding after further
//! registrations yields an independent schema.

mod builder;
pub(crate) mod inheritance;
pub(crate) mod type_graph;

pub use builder::{AssemblerConfig, SchemaAssembler, create_schema, create_schema_with_mutation};
