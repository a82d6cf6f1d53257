//! Resolver binding.
//!
//! At build time every effective field is wrapped in a [`BoundResolver`]
//! holding everything the call needs: the accessor, the owning class, the
//! positional argument slots, the context members to inject, and the
//! build-resolved return shape. At request time the bound resolver recovers
//! the source instance from the engine (or instantiates a root), projects
//! it onto the owning class, maps arguments, injects context, settles the
//! outcome, and normalizes the value. Failures become engine errors on the
//! failing field's path; sibling fields are unaffected.

use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_graphql::dynamic::{
    Field, FieldFuture, FieldValue, ResolverContext, TypeRef, ValueAccessor,
};
use async_graphql::indexmap::IndexMap;
use async_graphql::{Error, ErrorExtensions, Number, Value};
use tracing::trace;

use crate::context::{Invocation, RequestContext};
use crate::declaration::{Accessor, ClassId, ParentLink};
use crate::error::{FIELD_RESOLUTION_CODE, FieldError};
use crate::registry::RegistrySnapshot;
use crate::schema::type_graph::ResolvedShape;
use crate::value::{Instance, Resolved};

/// Creates a fresh root instance when the engine supplies no source value.
pub(crate) type InstanceFactory = Arc<dyn Fn() -> Instance + Send + Sync>;

/// All `extends` projections recorded in a snapshot, keyed by child class.
/// Shared by every bound resolver of one build.
pub(crate) struct ProjectionTable {
    links: HashMap<ClassId, ParentLink>,
}

impl ProjectionTable {
    pub(crate) fn from_snapshot(snapshot: &RegistrySnapshot) -> Self {
        let links = snapshot
            .iter()
            .filter_map(|(class, record)| {
                let link = record.marker.as_ref()?.parent.clone()?;
                Some((*class, link))
            })
            .collect();
        Self { links }
    }

    /// Walks `source` upward from its runtime class until `target` is
    /// reached. `None` when `target` is not an ancestor.
    pub(crate) fn project<'a>(
        &self,
        from: ClassId,
        source: &'a (dyn Any + Send + Sync),
        target: ClassId,
    ) -> Option<&'a (dyn Any + Send + Sync)> {
        let mut class = from;
        let mut value = source;
        // Bounded by the link count so malformed chains cannot spin.
        for _ in 0..=self.links.len() {
            if class == target {
                return Some(value);
            }
            let link = self.links.get(&class)?;
            value = (link.upcast)(value)?;
            class = link.parent;
        }
        None
    }

    /// Whether `declared` is `runtime` itself or one of its ancestors.
    pub(crate) fn accepts(&self, runtime: ClassId, declared: ClassId) -> bool {
        let mut class = runtime;
        for _ in 0..=self.links.len() {
            if class == declared {
                return true;
            }
            match self.links.get(&class) {
                Some(link) => class = link.parent,
                None => return false,
            }
        }
        false
    }
}

/// One field's resolver, fixed at build time.
pub(crate) struct BoundResolver {
    pub(crate) type_name: String,
    pub(crate) field_name: String,
    /// Class whose accessor runs; the source instance is projected onto it.
    pub(crate) owner: ClassId,
    pub(crate) accessor: Accessor,
    /// Position to exposed argument name. `None` slots stay unmapped.
    pub(crate) argument_slots: Vec<Option<String>>,
    /// Context member names injected before each call.
    pub(crate) bindings: Vec<String>,
    pub(crate) shape: ResolvedShape,
    pub(crate) projections: Arc<ProjectionTable>,
    /// Set for root classes only; used when the engine supplies no source.
    pub(crate) factory: Option<InstanceFactory>,
}

impl BoundResolver {
    /// Wraps the bound state in an engine field with the given type
    /// reference.
    pub(crate) fn into_field(self, type_ref: TypeRef) -> Field {
        let name = self.field_name.clone();
        let bound = Arc::new(self);
        Field::new(name, type_ref, move |ctx| {
            let bound = bound.clone();
            FieldFuture::new(async move { bound.resolve(ctx).await })
        })
    }

    async fn resolve<'a>(
        &self,
        ctx: ResolverContext<'a>,
    ) -> Result<Option<FieldValue<'a>>, Error> {
        match self.run(ctx).await {
            Ok(value) => Ok(value),
            Err(error) => {
                trace!(
                    type_name = %self.type_name,
                    field = %self.field_name,
                    error = %error,
                    "field resolution failed"
                );
                Err(Error::new(error.to_string())
                    .extend_with(|_, extensions| extensions.set("code", FIELD_RESOLUTION_CODE)))
            }
        }
    }

    async fn run<'a>(
        &self,
        ctx: ResolverContext<'a>,
    ) -> Result<Option<FieldValue<'a>>, FieldError> {
        let made;
        let (runtime_class, source) = if let Some(instance) =
            ctx.parent_value.downcast_ref::<Instance>()
        {
            (instance.class(), instance.as_any())
        } else if let Some(factory) = &self.factory {
            made = factory();
            (made.class(), made.as_any())
        } else {
            return Err(FieldError::new(format!(
                "no source instance available for {}.{}",
                self.type_name, self.field_name
            )));
        };

        let projected = self
            .projections
            .project(runtime_class, source, self.owner)
            .ok_or_else(|| {
                FieldError::new(format!(
                    "instance of {} cannot be projected to {} for {}.{}",
                    runtime_class, self.owner, self.type_name, self.field_name
                ))
            })?;

        let resolved = match &self.accessor {
            Accessor::Property(read) => {
                read(projected).ok_or_else(|| self.owner_mismatch(runtime_class))?
            }
            Accessor::Method { call, .. } => {
                let invocation = self.invocation(&ctx);
                let outcome =
                    call(projected, invocation).ok_or_else(|| self.owner_mismatch(runtime_class))?;
                outcome.settle().await?
            }
        };

        normalize(
            resolved,
            &self.shape,
            &self.projections,
            &self.type_name,
            &self.field_name,
        )
    }

    fn invocation(&self, ctx: &ResolverContext<'_>) -> Invocation {
        let mut args = Vec::with_capacity(self.argument_slots.len());
        for slot in &self.argument_slots {
            let value = slot
                .as_ref()
                .and_then(|name| ctx.args.get(name.as_str()))
                .map(|accessor| accessor_to_value(&accessor));
            args.push(value);
        }

        let mut injected = BTreeMap::new();
        if !self.bindings.is_empty() {
            if let Ok(handle) = ctx.ctx.data::<RequestContext>() {
                for member in &self.bindings {
                    injected.insert(member.clone(), handle.clone());
                }
            }
        }
        Invocation::new(args, injected)
    }

    fn owner_mismatch(&self, runtime: ClassId) -> FieldError {
        FieldError::new(format!(
            "accessor of {}.{} expected an instance of {}, got {}",
            self.type_name, self.field_name, self.owner, runtime
        ))
    }
}

/// Checks a settled value against the build-resolved shape and converts it
/// into the engine representation. Null is accepted everywhere.
fn normalize(
    resolved: Resolved,
    shape: &ResolvedShape,
    projections: &ProjectionTable,
    type_name: &str,
    field_name: &str,
) -> Result<Option<FieldValue<'static>>, FieldError> {
    match (resolved, shape) {
        (Resolved::Null, _) => Ok(None),
        (Resolved::Scalar(value), ResolvedShape::Scalar(_)) => {
            Ok(Some(FieldValue::value(value)))
        }
        (Resolved::Object(instance), ResolvedShape::Node(declared)) => {
            if !projections.accepts(instance.class(), *declared) {
                return Err(FieldError::new(format!(
                    "{type_name}.{field_name} resolved to an instance of {}, \
                     which is not {declared} or a descendant of it",
                    instance.class()
                )));
            }
            Ok(Some(FieldValue::owned_any(instance)))
        }
        (Resolved::List(items), ResolvedShape::List(inner)) => {
            let mut values = Vec::with_capacity(items.len());
            for item in items {
                let value = normalize(item, inner, projections, type_name, field_name)?
                    .unwrap_or_else(|| FieldValue::value(Value::Null));
                values.push(value);
            }
            Ok(Some(FieldValue::list(values)))
        }
        (other, expected) => Err(FieldError::new(format!(
            "{type_name}.{field_name} resolved to {} where the schema declares {}",
            other.kind(),
            expected.kind()
        ))),
    }
}

/// Converts an engine argument accessor into an owned value by probing the
/// scalar readers, then lists and objects.
fn accessor_to_value(accessor: &ValueAccessor<'_>) -> Value {
    if accessor.is_null() {
        return Value::Null;
    }
    if let Ok(flag) = accessor.boolean() {
        return Value::Boolean(flag);
    }
    if let Ok(integer) = accessor.i64() {
        return Value::Number(integer.into());
    }
    if let Ok(float) = accessor.f64() {
        return Number::from_f64(float)
            .map(Value::Number)
            .unwrap_or(Value::Null);
    }
    if let Ok(text) = accessor.string() {
        return Value::String(text.to_string());
    }
    if let Ok(list) = accessor.list() {
        return Value::List(list.iter().map(|item| accessor_to_value(&item)).collect());
    }
    if let Ok(object) = accessor.object() {
        let mut map = IndexMap::new();
        for (key, item) in object.iter() {
            map.insert(key.clone(), accessor_to_value(&item));
        }
        return Value::Object(map);
    }
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{ScalarKind, TypeDeclaration};
    use crate::registry::MetadataRegistry;

    struct Base {
        id: String,
    }

    struct Leaf {
        base: Base,
    }

    struct Stranger;

    fn table_with_chain() -> ProjectionTable {
        let registry = MetadataRegistry::new();
        registry.register_type(TypeDeclaration::<Base>::new());
        registry.register_type(TypeDeclaration::<Leaf>::new().extends(|leaf: &Leaf| &leaf.base));
        registry.register_type(TypeDeclaration::<Stranger>::new());
        ProjectionTable::from_snapshot(&registry.snapshot())
    }

    #[test]
    fn projection_walks_to_the_declared_ancestor() {
        let table = table_with_chain();
        let leaf = Leaf {
            base: Base {
                id: "b1".to_string(),
            },
        };
        let erased: &(dyn Any + Send + Sync) = &leaf;

        let projected = table
            .project(ClassId::of::<Leaf>(), erased, ClassId::of::<Base>())
            .expect("Base is an ancestor of Leaf");
        assert_eq!(projected.downcast_ref::<Base>().map(|b| b.id.as_str()), Some("b1"));

        let identity = table
            .project(ClassId::of::<Leaf>(), erased, ClassId::of::<Leaf>())
            .expect("projection to the runtime class is the identity");
        assert!(identity.downcast_ref::<Leaf>().is_some());

        assert!(
            table
                .project(ClassId::of::<Leaf>(), erased, ClassId::of::<Stranger>())
                .is_none(),
            "unrelated classes are rejected"
        );
    }

    #[test]
    fn accepts_covers_identity_and_ancestry_only() {
        let table = table_with_chain();
        assert!(table.accepts(ClassId::of::<Leaf>(), ClassId::of::<Base>()));
        assert!(table.accepts(ClassId::of::<Leaf>(), ClassId::of::<Leaf>()));
        assert!(!table.accepts(ClassId::of::<Base>(), ClassId::of::<Leaf>()));
        assert!(!table.accepts(ClassId::of::<Stranger>(), ClassId::of::<Base>()));
    }

    #[test]
    fn normalize_passes_scalars_and_nulls() {
        let table = table_with_chain();
        let shape = ResolvedShape::Scalar(ScalarKind::String);

        let value = normalize(
            Resolved::Scalar(Value::String("ok".to_string())),
            &shape,
            &table,
            "Query",
            "field",
        )
        .expect("scalar should normalize")
        .expect("scalar should produce a value");
        assert_eq!(value.as_value(), Some(&Value::String("ok".to_string())));

        let null = normalize(Resolved::Null, &shape, &table, "Query", "field")
            .expect("null should normalize");
        assert!(null.is_none());
    }

    #[test]
    fn normalize_accepts_descendants_for_object_shapes() {
        let table = table_with_chain();
        let shape = ResolvedShape::Node(ClassId::of::<Base>());

        let accepted = normalize(
            Resolved::object(Leaf {
                base: Base {
                    id: "b2".to_string(),
                },
            }),
            &shape,
            &table,
            "Query",
            "item",
        )
        .expect("a descendant instance satisfies an ancestor-typed field")
        .expect("an instance should produce a value");
        let instance = accepted
            .downcast_ref::<Instance>()
            .expect("object values carry the instance");
        assert_eq!(instance.class(), ClassId::of::<Leaf>(), "runtime class is preserved");

        let rejected = normalize(
            Resolved::object(Stranger),
            &shape,
            &table,
            "Query",
            "item",
        )
        .expect_err("an unrelated instance must be rejected");
        assert!(rejected.message().contains("not"));
    }

    #[test]
    fn normalize_rejects_shape_mismatches() {
        let table = table_with_chain();
        let error = normalize(
            Resolved::Scalar(Value::Boolean(true)),
            &ResolvedShape::Node(ClassId::of::<Base>()),
            &table,
            "Query",
            "item",
        )
        .expect_err("a scalar cannot satisfy an object shape");
        assert!(error.message().contains("declares object"));
    }

    #[test]
    fn normalize_keeps_null_items_inside_lists() {
        let table = table_with_chain();
        let shape = ResolvedShape::List(Box::new(ResolvedShape::Scalar(ScalarKind::Int)));
        let value = normalize(
            Resolved::List(vec![
                Resolved::Scalar(Value::Number(1.into())),
                Resolved::Null,
            ]),
            &shape,
            &table,
            "Query",
            "numbers",
        )
        .expect("the list should normalize")
        .expect("the list should produce a value");
        assert!(value.as_value().is_none(), "lists are composed values, not plain scalars");
    }
}
