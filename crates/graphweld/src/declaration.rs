//! Declaration markers applied to plain Rust types.
//!
//! A type becomes part of a schema by registering a [`TypeDeclaration`] for
//! it, one [`FieldDeclaration`] per exposed field, and optionally
//! [`ArgumentDeclaration`]s for method fields. Declarations carry no engine
//! types; they are inert metadata until a schema is assembled from them.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use async_graphql::dynamic::TypeRef;

use crate::context::Invocation;
use crate::value::{FieldOutcome, IntoResolved, Resolved};

/// Identity token for a Rust type used as a schema class.
///
/// Two `ClassId`s compare equal exactly when they were produced from the
/// same type. `ClassId::of::<T>` is itself a zero-argument function, so it
/// can be handed to [`TypeSpec::Deferred`] as a late-resolved reference.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId {
    id: TypeId,
    type_path: &'static str,
}

impl ClassId {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            type_path: type_name::<T>(),
        }
    }

    /// Full Rust path of the type, for diagnostics.
    pub fn type_path(&self) -> &'static str {
        self.type_path
    }

    /// Final path segment, used as the default exposed type name.
    pub fn short_name(&self) -> &'static str {
        let base = self.type_path.split('<').next().unwrap_or(self.type_path);
        base.rsplit("::").next().unwrap_or(base)
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_path)
    }
}

impl fmt::Debug for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassId").field(&self.type_path).finish()
    }
}

/// The five built-in GraphQL scalars available to declarations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Id,
    String,
    Int,
    Float,
    Boolean,
}

impl ScalarKind {
    pub(crate) fn type_name(self) -> &'static str {
        match self {
            ScalarKind::Id => TypeRef::ID,
            ScalarKind::String => TypeRef::STRING,
            ScalarKind::Int => TypeRef::INT,
            ScalarKind::Float => TypeRef::FLOAT,
            ScalarKind::Boolean => TypeRef::BOOLEAN,
        }
    }
}

/// Return-type specifier attached to a field declaration.
///
/// `Deferred` holds a thunk invoked at schema build, never at declaration
/// time, which is what lets mutually referential and self-referential types
/// declare each other before both exist.
#[derive(Debug, Clone)]
pub enum TypeSpec {
    Scalar(ScalarKind),
    Object(ClassId),
    List(Box<TypeSpec>),
    Deferred(fn() -> ClassId),
}

impl TypeSpec {
    pub const ID: TypeSpec = TypeSpec::Scalar(ScalarKind::Id);
    pub const STRING: TypeSpec = TypeSpec::Scalar(ScalarKind::String);
    pub const INT: TypeSpec = TypeSpec::Scalar(ScalarKind::Int);
    pub const FLOAT: TypeSpec = TypeSpec::Scalar(ScalarKind::Float);
    pub const BOOLEAN: TypeSpec = TypeSpec::Scalar(ScalarKind::Boolean);

    /// Reference to a class that is already registered when declared.
    pub fn object<T: Any>() -> Self {
        TypeSpec::Object(ClassId::of::<T>())
    }

    /// Late-resolved reference, written as `TypeSpec::deferred(ClassId::of::<T>)`.
    pub fn deferred(thunk: fn() -> ClassId) -> Self {
        TypeSpec::Deferred(thunk)
    }

    pub fn list(inner: TypeSpec) -> Self {
        TypeSpec::List(Box::new(inner))
    }
}

/// Projects a type-erased instance of a declaring class onto its parent.
/// Returns `None` when the instance is not of the class the projection was
/// declared for.
pub(crate) type UpcastFn = Arc<
    dyn for<'a> Fn(&'a (dyn Any + Send + Sync)) -> Option<&'a (dyn Any + Send + Sync)>
        + Send
        + Sync,
>;

/// An `extends` edge recorded on a type declaration.
#[derive(Clone)]
pub(crate) struct ParentLink {
    pub(crate) parent: ClassId,
    pub(crate) upcast: UpcastFn,
}

/// Type marker: exposes a Rust type as a GraphQL object type.
///
/// The exposed name defaults to the final segment of the Rust type path and
/// can be overridden with [`named`](Self::named). An `extends` link makes
/// the ancestor's field declarations visible on this type.
pub struct TypeDeclaration<T> {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) parent: Option<ParentLink>,
    _class: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> TypeDeclaration<T> {
    pub fn new() -> Self {
        Self {
            name: ClassId::of::<T>().short_name().to_string(),
            description: None,
            parent: None,
            _class: PhantomData,
        }
    }

    /// Overrides the exposed type name.
    #[must_use]
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares `P` as the parent class. The projection is applied whenever
    /// an ancestor-declared accessor runs against an instance of `T`.
    #[must_use]
    pub fn extends<P: Any + Send + Sync>(mut self, upcast: fn(&T) -> &P) -> Self {
        let project: UpcastFn = Arc::new(move |source| {
            source
                .downcast_ref::<T>()
                .map(|typed| upcast(typed) as &(dyn Any + Send + Sync))
        });
        self.parent = Some(ParentLink {
            parent: ClassId::of::<P>(),
            upcast: project,
        });
        self
    }

    pub fn class(&self) -> ClassId {
        ClassId::of::<T>()
    }
}

impl<T: Any + Send + Sync> Default for TypeDeclaration<T> {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) type PropertyFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync)) -> Option<Resolved> + Send + Sync>;

pub(crate) type MethodFn =
    Arc<dyn Fn(&(dyn Any + Send + Sync), Invocation) -> Option<FieldOutcome> + Send + Sync>;

/// How a field obtains its value from the owning instance.
#[derive(Clone)]
pub(crate) enum Accessor {
    /// Reads a value directly off the instance. Takes no arguments.
    Property(PropertyFn),
    /// Invokes a callable with positionally mapped arguments and injected
    /// context members.
    Method { arity: usize, call: MethodFn },
}

impl Accessor {
    pub(crate) fn arity(&self) -> usize {
        match self {
            Accessor::Property(_) => 0,
            Accessor::Method { arity, .. } => *arity,
        }
    }
}

/// Field marker: exposes one field on the declaring class `T`.
///
/// Property fields wrap an infallible getter. Method fields wrap a callable
/// that receives an [`Invocation`] carrying positional arguments and
/// injected context members, and may finish asynchronously through
/// [`FieldOutcome`]. An async body must own its captures; clone whatever it
/// needs from the receiver before moving it into the future.
pub struct FieldDeclaration<T> {
    pub(crate) name: String,
    pub(crate) returns: TypeSpec,
    pub(crate) accessor: Accessor,
    pub(crate) description: Option<String>,
    pub(crate) arguments: Vec<ArgumentDeclaration>,
    pub(crate) _owner: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> FieldDeclaration<T> {
    pub fn property<V, F>(name: impl Into<String>, returns: TypeSpec, getter: F) -> Self
    where
        V: IntoResolved,
        F: Fn(&T) -> V + Send + Sync + 'static,
    {
        let read: PropertyFn = Arc::new(move |source| {
            source
                .downcast_ref::<T>()
                .map(|owner| getter(owner).into_resolved())
        });
        Self {
            name: name.into(),
            returns,
            accessor: Accessor::Property(read),
            description: None,
            arguments: Vec::new(),
            _owner: PhantomData,
        }
    }

    pub fn method<F>(name: impl Into<String>, returns: TypeSpec, arity: usize, call: F) -> Self
    where
        F: Fn(&T, Invocation) -> FieldOutcome + Send + Sync + 'static,
    {
        let invoke: MethodFn = Arc::new(move |source, invocation| {
            source
                .downcast_ref::<T>()
                .map(|owner| call(owner, invocation))
        });
        Self {
            name: name.into(),
            returns,
            accessor: Accessor::Method {
                arity,
                call: invoke,
            },
            description: None,
            arguments: Vec::new(),
            _owner: PhantomData,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares an argument inline. Equivalent to registering it separately
    /// against the same method name.
    #[must_use]
    pub fn argument(mut self, argument: ArgumentDeclaration) -> Self {
        self.arguments.push(argument);
        self
    }

    pub fn owner(&self) -> ClassId {
        ClassId::of::<T>()
    }
}

/// Argument marker: names one positional parameter of a method field.
///
/// `position` indexes into the callable's parameter order; the exposed name
/// is what queries pass the value under.
#[derive(Debug, Clone)]
pub struct ArgumentDeclaration {
    pub(crate) name: String,
    pub(crate) position: usize,
    pub(crate) input: ScalarKind,
    pub(crate) description: Option<String>,
}

impl ArgumentDeclaration {
    pub fn new(name: impl Into<String>, position: usize, input: ScalarKind) -> Self {
        Self {
            name: name.into(),
            position,
            input,
            description: None,
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn input(&self) -> ScalarKind {
        self.input
    }
}
