//! Per-request context and the per-call view handed to method accessors.
//!
//! The transport attaches one [`RequestContext`] to each engine request.
//! Before a method accessor runs, the binder injects that context under
//! every member name the owning class (or an ancestor) declared a context
//! binding for, alongside the positionally mapped arguments. The accessor
//! sees both through an [`Invocation`].

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_graphql::Value;

use crate::error::FieldError;

/// Opaque per-request state, injected into declared members.
///
/// Attach one to the engine request with
/// `Request::new(query).data(RequestContext::new(state))`. The engine treats
/// it as inert data; only declared context bindings ever see it.
#[derive(Clone)]
pub struct RequestContext(Arc<dyn Any + Send + Sync>);

impl RequestContext {
    pub fn new<C: Any + Send + Sync>(state: C) -> Self {
        Self(Arc::new(state))
    }

    pub fn downcast_ref<C: Any + Send + Sync>(&self) -> Option<&C> {
        self.0.downcast_ref()
    }
}

impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RequestContext(..)")
    }
}

/// Per-call view a method accessor receives: the argument vector mapped by
/// declared positions, plus the context members injected for the owning
/// class.
pub struct Invocation {
    args: Vec<Option<Value>>,
    injected: BTreeMap<String, RequestContext>,
}

impl Invocation {
    pub(crate) fn new(args: Vec<Option<Value>>, injected: BTreeMap<String, RequestContext>) -> Self {
        Self { args, injected }
    }

    /// Number of parameter slots, equal to the declared arity.
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Raw value at a parameter position. `None` when the position is out
    /// of range, has no declared argument, or the query omitted the value.
    pub fn arg(&self, position: usize) -> Option<&Value> {
        self.args.get(position).and_then(|slot| slot.as_ref())
    }

    pub fn string_arg(&self, position: usize) -> Result<&str, FieldError> {
        match self.arg(position) {
            Some(Value::String(text)) => Ok(text),
            Some(other) => Err(FieldError::new(format!(
                "argument at position {position} is not a string: {other}"
            ))),
            None => Err(FieldError::new(format!(
                "argument at position {position} was not supplied"
            ))),
        }
    }

    pub fn int_arg(&self, position: usize) -> Result<i64, FieldError> {
        match self.arg(position) {
            Some(Value::Number(number)) => number.as_i64().ok_or_else(|| {
                FieldError::new(format!(
                    "argument at position {position} is not an integer: {number}"
                ))
            }),
            Some(other) => Err(FieldError::new(format!(
                "argument at position {position} is not an integer: {other}"
            ))),
            None => Err(FieldError::new(format!(
                "argument at position {position} was not supplied"
            ))),
        }
    }

    pub fn float_arg(&self, position: usize) -> Result<f64, FieldError> {
        match self.arg(position) {
            Some(Value::Number(number)) => number.as_f64().ok_or_else(|| {
                FieldError::new(format!(
                    "argument at position {position} is not a float: {number}"
                ))
            }),
            Some(other) => Err(FieldError::new(format!(
                "argument at position {position} is not a float: {other}"
            ))),
            None => Err(FieldError::new(format!(
                "argument at position {position} was not supplied"
            ))),
        }
    }

    pub fn bool_arg(&self, position: usize) -> Result<bool, FieldError> {
        match self.arg(position) {
            Some(Value::Boolean(flag)) => Ok(*flag),
            Some(other) => Err(FieldError::new(format!(
                "argument at position {position} is not a boolean: {other}"
            ))),
            None => Err(FieldError::new(format!(
                "argument at position {position} was not supplied"
            ))),
        }
    }

    /// Borrows the context injected under `member`, downcast to `C`.
    pub fn context<C: Any + Send + Sync>(&self, member: &str) -> Result<&C, FieldError> {
        let handle = self.injected.get(member).ok_or_else(|| missing_member(member))?;
        handle
            .downcast_ref::<C>()
            .ok_or_else(|| FieldError::new(format!(
                "context member `{member}` holds a different type than requested"
            )))
    }

    /// Clones out the context under `member` for use inside an async body.
    pub fn context_arc<C: Any + Send + Sync>(&self, member: &str) -> Result<Arc<C>, FieldError> {
        let handle = self.injected.get(member).ok_or_else(|| missing_member(member))?;
        handle.0.clone().downcast::<C>().map_err(|_| {
            FieldError::new(format!(
                "context member `{member}` holds a different type than requested"
            ))
        })
    }
}

fn missing_member(member: &str) -> FieldError {
    FieldError::new(format!(
        "context member `{member}` was not injected; declare a context binding for it \
         and attach a RequestContext to the request"
    ))
}
