//! Resolver output values.
//!
//! Accessors produce a [`Resolved`] value: null, a scalar payload, a
//! type-erased [`Instance`] of a registered class, or a list of these.
//! Method accessors wrap theirs in a [`FieldOutcome`] so the result may
//! arrive asynchronously; the binder settles it before handing the value to
//! the execution engine.

use std::any::Any;
use std::fmt;
use std::future::Future;

use async_graphql::indexmap::IndexMap;
use async_graphql::{Name, Number, Value};
use futures_util::future::BoxFuture;

use crate::declaration::ClassId;
use crate::error::FieldError;

/// A type-erased instance of a registered class, carried between resolvers.
///
/// The recorded class is the runtime class of the boxed value; nested field
/// accessors use it to project onto the class that declared them.
pub struct Instance {
    class: ClassId,
    value: Box<dyn Any + Send + Sync>,
}

impl Instance {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            class: ClassId::of::<T>(),
            value: Box::new(value),
        }
    }

    pub fn class(&self) -> ClassId {
        self.class
    }

    pub(crate) fn as_any(&self) -> &(dyn Any + Send + Sync) {
        self.value.as_ref()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("class", &self.class)
            .finish_non_exhaustive()
    }
}

/// A settled resolver result.
#[derive(Debug)]
pub enum Resolved {
    Null,
    Scalar(Value),
    Object(Instance),
    List(Vec<Resolved>),
}

impl Resolved {
    /// Wraps a registered-class value for an object-typed field.
    pub fn object<T: Any + Send + Sync>(value: T) -> Self {
        Resolved::Object(Instance::new(value))
    }

    pub(crate) fn kind(&self) -> &'static str {
        match self {
            Resolved::Null => "null",
            Resolved::Scalar(_) => "scalar",
            Resolved::Object(_) => "object",
            Resolved::List(_) => "list",
        }
    }
}

/// Conversion into a settled resolver result.
///
/// Implemented for the scalar primitives, `String`/`&str`, engine values,
/// `serde_json::Value`, [`Instance`], and `Option`/`Vec` of any of these.
pub trait IntoResolved {
    fn into_resolved(self) -> Resolved;
}

impl IntoResolved for Resolved {
    fn into_resolved(self) -> Resolved {
        self
    }
}

impl IntoResolved for Instance {
    fn into_resolved(self) -> Resolved {
        Resolved::Object(self)
    }
}

impl IntoResolved for () {
    fn into_resolved(self) -> Resolved {
        Resolved::Null
    }
}

impl IntoResolved for bool {
    fn into_resolved(self) -> Resolved {
        Resolved::Scalar(Value::Boolean(self))
    }
}

macro_rules! integer_into_resolved {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoResolved for $ty {
                fn into_resolved(self) -> Resolved {
                    Resolved::Scalar(Value::Number(self.into()))
                }
            }
        )*
    };
}

integer_into_resolved!(i32, i64, u32, u64);

impl IntoResolved for f64 {
    fn into_resolved(self) -> Resolved {
        match Number::from_f64(self) {
            Some(number) => Resolved::Scalar(Value::Number(number)),
            None => Resolved::Null,
        }
    }
}

impl IntoResolved for f32 {
    fn into_resolved(self) -> Resolved {
        f64::from(self).into_resolved()
    }
}

impl IntoResolved for String {
    fn into_resolved(self) -> Resolved {
        Resolved::Scalar(Value::String(self))
    }
}

impl IntoResolved for &str {
    fn into_resolved(self) -> Resolved {
        Resolved::Scalar(Value::String(self.to_string()))
    }
}

impl IntoResolved for Value {
    fn into_resolved(self) -> Resolved {
        match self {
            Value::Null => Resolved::Null,
            Value::List(items) => {
                Resolved::List(items.into_iter().map(IntoResolved::into_resolved).collect())
            }
            other => Resolved::Scalar(other),
        }
    }
}

impl IntoResolved for serde_json::Value {
    fn into_resolved(self) -> Resolved {
        json_to_value(self).into_resolved()
    }
}

impl<V: IntoResolved> IntoResolved for Option<V> {
    fn into_resolved(self) -> Resolved {
        match self {
            Some(value) => value.into_resolved(),
            None => Resolved::Null,
        }
    }
}

impl<V: IntoResolved> IntoResolved for Vec<V> {
    fn into_resolved(self) -> Resolved {
        Resolved::List(self.into_iter().map(IntoResolved::into_resolved).collect())
    }
}

/// Converts a JSON value into the engine's value representation.
pub(crate) fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(flag) => Value::Boolean(flag),
        serde_json::Value::Number(number) => Value::Number(number),
        serde_json::Value::String(text) => Value::String(text),
        serde_json::Value::Array(items) => {
            Value::List(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(entries) => {
            let mut object = IndexMap::new();
            for (key, value) in entries {
                object.insert(Name::new(key), json_to_value(value));
            }
            Value::Object(object)
        }
    }
}

/// What a method accessor hands back: a settled result, or an in-flight
/// computation settled by the binder before the engine sees the value.
pub enum FieldOutcome {
    Ready(Result<Resolved, FieldError>),
    Pending(BoxFuture<'static, Result<Resolved, FieldError>>),
}

impl FieldOutcome {
    pub fn ok(value: impl IntoResolved) -> Self {
        FieldOutcome::Ready(Ok(value.into_resolved()))
    }

    pub fn err(error: impl Into<FieldError>) -> Self {
        FieldOutcome::Ready(Err(error.into()))
    }

    /// Defers settlement to a future. The future must own everything it
    /// touches.
    pub fn future<F, V>(future: F) -> Self
    where
        F: Future<Output = Result<V, FieldError>> + Send + 'static,
        V: IntoResolved,
    {
        FieldOutcome::Pending(Box::pin(async move {
            future.await.map(IntoResolved::into_resolved)
        }))
    }

    pub(crate) async fn settle(self) -> Result<Resolved, FieldError> {
        match self {
            FieldOutcome::Ready(result) => result,
            FieldOutcome::Pending(future) => future.await,
        }
    }
}
