//! Schema assembly.
//!
//! The assembler turns one registry snapshot into an executable schema. It
//! seeds the type graph with the root classes, drains the worklist of
//! reachable classes into engine objects, wires a [`BoundResolver`] into
//! every field, and hands the result to the engine. Declaration problems
//! surface here as [`SchemaError`]s and abort the build; nothing is
//! registered partially. Repeated builds from the same registry see
//! independent snapshots and share no mutable state.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_graphql::Value;
use async_graphql::dynamic::{Field, FieldFuture, InputValue, Object, Schema, TypeRef};
use tracing::{debug, trace};

use crate::declaration::ClassId;
use crate::error::SchemaError;
use crate::registry::{MetadataRegistry, RegistrySnapshot};
use crate::resolver::{BoundResolver, InstanceFactory, ProjectionTable};
use crate::schema::inheritance::{EffectiveField, effective_declarations};
use crate::schema::type_graph::{TypeGraph, is_valid_graphql_name};
use crate::value::Instance;

/// Engine options applied after all types are registered.
#[derive(Debug, Clone)]
pub struct AssemblerConfig {
    /// Maximum query nesting depth, unlimited when `None`.
    pub max_depth: Option<usize>,
    /// Maximum query complexity, unlimited when `None`.
    pub max_complexity: Option<usize>,
    /// Whether `__schema` and `__type` introspection queries are answered.
    pub introspection_enabled: bool,
}

impl Default for AssemblerConfig {
    fn default() -> Self {
        Self {
            max_depth: None,
            max_complexity: None,
            introspection_enabled: true,
        }
    }
}

struct RootBinding {
    class: ClassId,
    factory: InstanceFactory,
}

/// Builds a schema from the classes registered in a [`MetadataRegistry`].
///
/// ```no_run
/// # use graphweld::registry::MetadataRegistry;
/// # use graphweld::schema::SchemaAssembler;
/// # #[derive(Default)]
/// # struct Query;
/// # fn demo(registry: &MetadataRegistry) -> graphweld::Result<()> {
/// let schema = SchemaAssembler::new(registry).query::<Query>().assemble()?;
/// # Ok(())
/// # }
/// ```
pub struct SchemaAssembler<'r> {
    registry: &'r MetadataRegistry,
    config: AssemblerConfig,
    query: Option<RootBinding>,
    mutation: Option<RootBinding>,
}

impl<'r> SchemaAssembler<'r> {
    pub fn new(registry: &'r MetadataRegistry) -> Self {
        Self {
            registry,
            config: AssemblerConfig::default(),
            query: None,
            mutation: None,
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: AssemblerConfig) -> Self {
        self.config = config;
        self
    }

    /// Declares the query root class. The engine instantiates it through
    /// `Default` whenever a request reaches a root field.
    #[must_use]
    pub fn query<Q>(self) -> Self
    where
        Q: Any + Send + Sync + Default,
    {
        self.query_with(Q::default)
    }

    /// Declares the query root class with an explicit factory, for roots
    /// that carry state such as a data source handle.
    #[must_use]
    pub fn query_with<Q, F>(mut self, make: F) -> Self
    where
        Q: Any + Send + Sync,
        F: Fn() -> Q + Send + Sync + 'static,
    {
        self.query = Some(RootBinding {
            class: ClassId::of::<Q>(),
            factory: Arc::new(move || Instance::new(make())),
        });
        self
    }

    /// Declares the optional mutation root class.
    #[must_use]
    pub fn mutation<M>(self) -> Self
    where
        M: Any + Send + Sync + Default,
    {
        self.mutation_with(M::default)
    }

    #[must_use]
    pub fn mutation_with<M, F>(mut self, make: F) -> Self
    where
        M: Any + Send + Sync,
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.mutation = Some(RootBinding {
            class: ClassId::of::<M>(),
            factory: Arc::new(move || Instance::new(make())),
        });
        self
    }

    /// Assembles the schema. Every class reachable from the roots through
    /// field return types is materialized exactly once; any declaration
    /// problem aborts the whole build.
    pub fn assemble(self) -> Result<Schema, SchemaError> {
        let Self {
            registry,
            config,
            query,
            mutation,
        } = self;
        let query = query.ok_or(SchemaError::MissingQueryRoot)?;

        let snapshot = registry.snapshot();
        let projections = Arc::new(ProjectionTable::from_snapshot(&snapshot));
        let mut graph = TypeGraph::new();
        let mut factories: HashMap<ClassId, InstanceFactory> = HashMap::new();

        let query_name = graph.touch(&snapshot, query.class)?;
        factories.insert(query.class, query.factory);
        let mutation_name = match mutation {
            Some(root) => {
                let name = graph.touch(&snapshot, root.class)?;
                factories.insert(root.class, root.factory);
                Some(name)
            }
            None => None,
        };

        while let Some(class) = graph.pop_pending() {
            let object = build_object(&snapshot, &mut graph, &projections, &factories, class)?;
            graph.finish(object);
        }

        debug!(
            query = %query_name,
            mutation = mutation_name.as_deref().unwrap_or("<none>"),
            "assembling schema"
        );

        let mut builder = Schema::build(query_name.as_str(), mutation_name.as_deref(), None);
        for object in graph.take_objects() {
            builder = builder.register(object);
        }
        if let Some(depth) = config.max_depth {
            builder = builder.limit_depth(depth);
        }
        if let Some(complexity) = config.max_complexity {
            builder = builder.limit_complexity(complexity);
        }
        if !config.introspection_enabled {
            builder = builder.disable_introspection();
        }

        builder
            .finish()
            .map_err(|error| SchemaError::Engine(error.to_string()))
    }
}

/// Materializes one class into an engine object: merges its declarations
/// along the `extends` chain, resolves every field's return specifier, and
/// binds the resolvers.
fn build_object(
    snapshot: &RegistrySnapshot,
    graph: &mut TypeGraph,
    projections: &Arc<ProjectionTable>,
    factories: &HashMap<ClassId, InstanceFactory>,
    class: ClassId,
) -> Result<Object, SchemaError> {
    let type_name = graph.touch(snapshot, class)?;
    let merged = effective_declarations(snapshot, class)?;

    let mut object = Object::new(type_name.clone());
    if let Some(description) = snapshot
        .record(class)
        .and_then(|record| record.marker.as_ref())
        .and_then(|marker| marker.description.clone())
    {
        object = object.description(description);
    }

    if merged.fields.is_empty() {
        trace!(type_name = %type_name, "no fields declared, adding placeholder field");
        return Ok(object.field(placeholder_field()));
    }

    let bindings: Vec<String> = merged.context_bindings.iter().cloned().collect();
    let factory = factories.get(&class).cloned();

    for (field_name, effective) in merged.fields {
        if !is_valid_graphql_name(&field_name) {
            return Err(SchemaError::InvalidName {
                name: field_name,
                kind: "field",
            });
        }
        let EffectiveField {
            owner,
            field: stored,
            arguments,
        } = effective;

        let (type_ref, shape) = graph.resolve_spec(snapshot, &stored.returns)?;

        let arity = stored.accessor.arity();
        let mut slots: Vec<Option<String>> = vec![None; arity];
        let mut inputs = Vec::new();
        for argument in &arguments {
            if argument.position >= arity {
                return Err(SchemaError::ArgumentMapping {
                    type_name: type_name.clone(),
                    field: field_name.clone(),
                    argument: argument.name.clone(),
                    position: argument.position,
                    arity,
                });
            }
            if !is_valid_graphql_name(&argument.name) {
                return Err(SchemaError::InvalidName {
                    name: argument.name.clone(),
                    kind: "argument",
                });
            }
            slots[argument.position] = Some(argument.name.clone());
            let mut input =
                InputValue::new(argument.name.clone(), TypeRef::named(argument.input.type_name()));
            if let Some(description) = &argument.description {
                input = input.description(description.clone());
            }
            inputs.push(input);
        }

        let resolver = BoundResolver {
            type_name: type_name.clone(),
            field_name: field_name.clone(),
            owner,
            accessor: stored.accessor,
            argument_slots: slots,
            bindings: bindings.clone(),
            shape,
            projections: projections.clone(),
            factory: factory.clone(),
        };

        let mut field = resolver.into_field(type_ref);
        if let Some(description) = stored.description {
            field = field.description(description);
        }
        for input in inputs {
            field = field.argument(input);
        }
        object = object.field(field);
    }

    Ok(object)
}

// GraphQL requires at least one field per object type.
fn placeholder_field() -> Field {
    Field::new("_placeholder", TypeRef::named(TypeRef::STRING), |_ctx| {
        FieldFuture::new(async { Ok(None::<Value>) })
    })
    .description("Placeholder field - type declares no members")
}

/// Builds a schema with `Q` as the query root, using the process-wide
/// registry conventions of the call site's choosing.
pub fn create_schema<Q>(registry: &MetadataRegistry) -> Result<Schema, SchemaError>
where
    Q: Any + Send + Sync + Default,
{
    SchemaAssembler::new(registry).query::<Q>().assemble()
}

/// Builds a schema with `Q` as the query root and `M` as the mutation root.
pub fn create_schema_with_mutation<Q, M>(registry: &MetadataRegistry) -> Result<Schema, SchemaError>
where
    Q: Any + Send + Sync + Default,
    M: Any + Send + Sync + Default,
{
    SchemaAssembler::new(registry)
        .query::<Q>()
        .mutation::<M>()
        .assemble()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{
        ArgumentDeclaration, FieldDeclaration, ScalarKind, TypeDeclaration, TypeSpec,
    };
    use crate::value::FieldOutcome;

    #[derive(Default)]
    struct Query;

    #[derive(Default)]
    struct Bare;

    fn registry_with_query() -> MetadataRegistry {
        let registry = MetadataRegistry::new();
        registry.register_type(TypeDeclaration::<Query>::new());
        registry.register_field(FieldDeclaration::<Query>::property(
            "version",
            TypeSpec::STRING,
            |_query| "1.0",
        ));
        registry
    }

    #[test]
    fn assemble_without_query_root_is_rejected() {
        let registry = registry_with_query();
        let Err(error) = SchemaAssembler::new(&registry).assemble() else {
            panic!("assembling without a query root must fail");
        };
        assert!(matches!(error, SchemaError::MissingQueryRoot));
    }

    #[test]
    fn minimal_schema_exposes_registered_fields() {
        let registry = registry_with_query();
        let schema = create_schema::<Query>(&registry).expect("build should succeed");
        let sdl = schema.sdl();
        assert!(sdl.contains("type Query"), "sdl was:\n{sdl}");
        assert!(sdl.contains("version: String"), "sdl was:\n{sdl}");
    }

    #[test]
    fn empty_types_get_a_placeholder_field() {
        let registry = MetadataRegistry::new();
        registry.register_type(TypeDeclaration::<Bare>::new());
        let schema = create_schema::<Bare>(&registry).expect("build should succeed");
        assert!(schema.sdl().contains("_placeholder"));
    }

    #[test]
    fn arguments_past_the_callable_arity_are_rejected() {
        let registry = registry_with_query();
        registry.register_field(
            FieldDeclaration::<Query>::method(
                "echo",
                TypeSpec::STRING,
                1,
                |_query, invocation| match invocation.string_arg(0) {
                    Ok(text) => FieldOutcome::ok(text),
                    Err(error) => FieldOutcome::err(error),
                },
            )
            .argument(ArgumentDeclaration::new("text", 0, ScalarKind::String))
            .argument(ArgumentDeclaration::new("extra", 7, ScalarKind::Int)),
        );

        let Err(error) = create_schema::<Query>(&registry) else {
            panic!("an argument position past the arity must fail the build");
        };
        match error {
            SchemaError::ArgumentMapping {
                field,
                argument,
                position,
                arity,
                ..
            } => {
                assert_eq!(field, "echo");
                assert_eq!(argument, "extra");
                assert_eq!(position, 7);
                assert_eq!(arity, 1);
            }
            other => panic!("expected an argument mapping failure, got {other}"),
        }
    }

    #[test]
    fn invalid_field_names_are_rejected() {
        let registry = registry_with_query();
        registry.register_field(FieldDeclaration::<Query>::property(
            "not a name",
            TypeSpec::STRING,
            |_query| "x",
        ));
        let Err(error) = create_schema::<Query>(&registry) else {
            panic!("an invalid field name must fail the build");
        };
        match error {
            SchemaError::InvalidName { name, kind } => {
                assert_eq!(name, "not a name");
                assert_eq!(kind, "field");
            }
            other => panic!("expected an invalid name failure, got {other}"),
        }
    }

    #[test]
    fn limits_and_introspection_are_applied() {
        let registry = registry_with_query();
        let config = AssemblerConfig {
            max_depth: Some(8),
            max_complexity: Some(64),
            introspection_enabled: false,
        };
        let schema = SchemaAssembler::new(&registry)
            .with_config(config)
            .query::<Query>()
            .assemble()
            .expect("build should succeed with limits");
        assert!(schema.sdl().contains("version: String"));
    }
}
