//! Type-graph construction state.
//!
//! Every class reachable from the roots becomes exactly one named engine
//! object. [`TypeGraph::touch`] memoizes the class-to-name assignment and
//! queues each class once; the assembler drains the queue until the graph
//! closes over all references. Deferred references are invoked here, on
//! first need, which is what lets cyclic declarations terminate: the cycle
//! collapses onto an already assigned name instead of recursing.

use std::collections::{HashMap, VecDeque};

use async_graphql::dynamic::{Object, TypeRef};
use tracing::trace;

use crate::declaration::{ClassId, ScalarKind, TypeSpec};
use crate::error::SchemaError;
use crate::registry::RegistrySnapshot;

/// Build-resolved shape of a field's return type, used by bound resolvers
/// to check settled values without re-resolving specifiers per request.
#[derive(Debug, Clone)]
pub(crate) enum ResolvedShape {
    Scalar(ScalarKind),
    Node(ClassId),
    List(Box<ResolvedShape>),
}

impl ResolvedShape {
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            ResolvedShape::Scalar(_) => "scalar",
            ResolvedShape::Node(_) => "object",
            ResolvedShape::List(_) => "list",
        }
    }
}

/// Worklist state for one build: name assignments, the queue of classes
/// still needing an object, and the finished objects.
pub(crate) struct TypeGraph {
    names: HashMap<ClassId, String>,
    owners: HashMap<String, ClassId>,
    pending: VecDeque<ClassId>,
    objects: Vec<Object>,
}

impl TypeGraph {
    pub(crate) fn new() -> Self {
        Self {
            names: HashMap::new(),
            owners: HashMap::new(),
            pending: VecDeque::new(),
            objects: Vec::new(),
        }
    }

    /// Resolves `class` to its exposed type name, assigning the name and
    /// queueing object construction the first time the class is seen.
    pub(crate) fn touch(
        &mut self,
        snapshot: &RegistrySnapshot,
        class: ClassId,
    ) -> Result<String, SchemaError> {
        if let Some(name) = self.names.get(&class) {
            return Ok(name.clone());
        }

        let record = snapshot
            .record(class)
            .ok_or(SchemaError::UnknownType { class })?;
        let marker = match &record.marker {
            Some(marker) => marker,
            None if record.has_member_metadata() => {
                return Err(SchemaError::NotAType { class });
            }
            None => return Err(SchemaError::UnknownType { class }),
        };

        let name = marker.name.clone();
        if !is_valid_graphql_name(&name) {
            return Err(SchemaError::InvalidName { name, kind: "type" });
        }
        if let Some(first) = self.owners.get(&name) {
            return Err(SchemaError::DuplicateTypeName {
                name,
                first: *first,
                second: class,
            });
        }

        trace!(type_name = %name, class = %class, "queued type for construction");
        self.owners.insert(name.clone(), class);
        self.names.insert(class, name.clone());
        self.pending.push_back(class);
        Ok(name)
    }

    /// Resolves a return-type specifier into the engine reference and the
    /// build-resolved shape, queueing every class it mentions. Deferred
    /// thunks are invoked here, never at declaration time.
    pub(crate) fn resolve_spec(
        &mut self,
        snapshot: &RegistrySnapshot,
        spec: &TypeSpec,
    ) -> Result<(TypeRef, ResolvedShape), SchemaError> {
        match spec {
            TypeSpec::Scalar(kind) => Ok((
                TypeRef::named(kind.type_name()),
                ResolvedShape::Scalar(*kind),
            )),
            TypeSpec::Object(class) => {
                let name = self.touch(snapshot, *class)?;
                Ok((TypeRef::named(name), ResolvedShape::Node(*class)))
            }
            TypeSpec::Deferred(thunk) => {
                let class = thunk();
                let name = self.touch(snapshot, class)?;
                Ok((TypeRef::named(name), ResolvedShape::Node(class)))
            }
            TypeSpec::List(inner) => {
                let (inner_ref, inner_shape) = self.resolve_spec(snapshot, inner)?;
                Ok((
                    TypeRef::List(Box::new(inner_ref)),
                    ResolvedShape::List(Box::new(inner_shape)),
                ))
            }
        }
    }

    pub(crate) fn pop_pending(&mut self) -> Option<ClassId> {
        self.pending.pop_front()
    }

    pub(crate) fn finish(&mut self, object: Object) {
        self.objects.push(object);
    }

    pub(crate) fn take_objects(&mut self) -> Vec<Object> {
        std::mem::take(&mut self.objects)
    }
}

/// A GraphQL name starts with a letter or underscore and continues with
/// letters, digits, or underscores.
pub(crate) fn is_valid_graphql_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
