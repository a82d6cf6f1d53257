//! Ancestor-chain merging of field declarations.
//!
//! A class exposes its own fields plus everything declared along its
//! `extends` chain. The walk starts at the class itself and follows parent
//! links until it runs off the chain or meets an ancestor without a type
//! marker; that ancestor and everything above it stay invisible. When two
//! classes in the chain declare the same field name, the more derived
//! declaration replaces the ancestor's wholesale, argument list included.

use std::collections::{BTreeSet, HashSet};

use async_graphql::indexmap::IndexMap;
use tracing::trace;

use crate::declaration::{ArgumentDeclaration, ClassId};
use crate::error::SchemaError;
use crate::registry::{RegistrySnapshot, StoredField};

/// A field declaration after the merge: what the schema actually exposes,
/// together with the class whose accessor will run.
#[derive(Clone)]
pub(crate) struct EffectiveField {
    pub(crate) owner: ClassId,
    pub(crate) field: StoredField,
    /// Arguments attached by the owner, ordered by position.
    pub(crate) arguments: Vec<ArgumentDeclaration>,
}

/// The merged declaration set for one class.
pub(crate) struct MergedDeclarations {
    /// Field name to effective declaration, in declaration order with the
    /// most derived class first.
    pub(crate) fields: IndexMap<String, EffectiveField>,
    /// Union of context-bound member names along the annotated chain.
    pub(crate) context_bindings: BTreeSet<String>,
}

/// Walks the `extends` chain of `class` and merges its declarations.
pub(crate) fn effective_declarations(
    snapshot: &RegistrySnapshot,
    class: ClassId,
) -> Result<MergedDeclarations, SchemaError> {
    let mut fields: IndexMap<String, EffectiveField> = IndexMap::new();
    let mut context_bindings: BTreeSet<String> = BTreeSet::new();
    let mut seen: HashSet<ClassId> = HashSet::new();
    let mut current = Some(class);

    while let Some(link) = current {
        if !seen.insert(link) {
            return Err(SchemaError::InheritanceCycle { class });
        }
        let Some(record) = snapshot.record(link) else {
            break;
        };
        let Some(marker) = &record.marker else {
            break;
        };

        for (method, declared) in &record.arguments {
            if !record.fields.iter().any(|field| field.name == *method) {
                if let Some(first) = declared.first() {
                    return Err(SchemaError::UnknownArgumentTarget {
                        type_name: marker.name.clone(),
                        method: method.clone(),
                        argument: first.name.clone(),
                    });
                }
            }
        }

        for field in &record.fields {
            if fields.contains_key(&field.name) {
                trace!(
                    class = %link,
                    field = %field.name,
                    "shadowed by a more derived declaration"
                );
                continue;
            }
            let mut arguments = record
                .arguments
                .get(&field.name)
                .cloned()
                .unwrap_or_default();
            arguments.sort_by_key(|argument| argument.position);
            fields.insert(
                field.name.clone(),
                EffectiveField {
                    owner: link,
                    field: field.clone(),
                    arguments,
                },
            );
        }

        context_bindings.extend(record.context_bindings.iter().cloned());
        current = marker.parent.as_ref().map(|parent| parent.parent);
    }

    Ok(MergedDeclarations {
        fields,
        context_bindings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::{
        ArgumentDeclaration, FieldDeclaration, ScalarKind, TypeDeclaration, TypeSpec,
    };
    use crate::registry::MetadataRegistry;
    use crate::value::FieldOutcome;

    #[derive(Clone)]
    struct Base {
        id: String,
    }

    #[derive(Clone)]
    struct Mid {
        base: Base,
        label: String,
    }

    #[derive(Clone)]
    struct Leaf {
        mid: Mid,
    }

    struct Orphan {
        secret: String,
    }

    struct RingA;
    struct RingB;

    fn declare_chain(registry: &MetadataRegistry) {
        registry.register_type(TypeDeclaration::<Base>::new());
        registry.register_field(FieldDeclaration::property("id", TypeSpec::ID, |base: &Base| {
            base.id.clone()
        }));
        registry.register_context_binding::<Base>("ctx");

        registry.register_type(TypeDeclaration::<Mid>::new().extends(|mid: &Mid| &mid.base));
        registry.register_field(FieldDeclaration::property(
            "label",
            TypeSpec::STRING,
            |mid: &Mid| mid.label.clone(),
        ));
        registry.register_field(
            FieldDeclaration::method("find", TypeSpec::STRING, 1, |_mid: &Mid, _call| {
                FieldOutcome::ok("from mid")
            })
            .argument(ArgumentDeclaration::new("needle", 0, ScalarKind::String)),
        );

        registry.register_type(TypeDeclaration::<Leaf>::new().extends(|leaf: &Leaf| &leaf.mid));
        registry.register_field(FieldDeclaration::method(
            "find",
            TypeSpec::STRING,
            0,
            |_leaf: &Leaf, _call| FieldOutcome::ok("from leaf"),
        ));
        registry.register_context_binding::<Leaf>("auth");
    }

    #[test]
    fn merge_walks_the_whole_annotated_chain() {
        let registry = MetadataRegistry::new();
        declare_chain(&registry);
        let merged = effective_declarations(&registry.snapshot(), ClassId::of::<Leaf>())
            .expect("chain should merge");

        let names: Vec<_> = merged.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["find", "label", "id"]);
        assert_eq!(
            merged.fields["id"].owner,
            ClassId::of::<Base>(),
            "ancestor fields keep their declaring class"
        );
    }

    #[test]
    fn override_replaces_the_declaration_wholesale() {
        let registry = MetadataRegistry::new();
        declare_chain(&registry);
        let merged = effective_declarations(&registry.snapshot(), ClassId::of::<Leaf>())
            .expect("chain should merge");

        let find = &merged.fields["find"];
        assert_eq!(find.owner, ClassId::of::<Leaf>());
        assert_eq!(find.field.accessor.arity(), 0, "override takes the new arity");
        assert!(
            find.arguments.is_empty(),
            "the shadowed declaration's arguments must not leak into the override"
        );
    }

    #[test]
    fn ancestor_arguments_survive_when_not_overridden() {
        let registry = MetadataRegistry::new();
        declare_chain(&registry);
        let merged = effective_declarations(&registry.snapshot(), ClassId::of::<Mid>())
            .expect("chain should merge");

        let find = &merged.fields["find"];
        assert_eq!(find.arguments.len(), 1);
        assert_eq!(find.arguments[0].name(), "needle");
    }

    #[test]
    fn context_bindings_union_along_the_chain() {
        let registry = MetadataRegistry::new();
        declare_chain(&registry);
        let merged = effective_declarations(&registry.snapshot(), ClassId::of::<Leaf>())
            .expect("chain should merge");
        let members: Vec<_> = merged.context_bindings.iter().map(String::as_str).collect();
        assert_eq!(members, vec!["auth", "ctx"]);
    }

    #[test]
    fn walk_stops_at_an_unmarked_ancestor() {
        let registry = MetadataRegistry::new();
        registry.register_field(FieldDeclaration::property(
            "secret",
            TypeSpec::STRING,
            |orphan: &Orphan| orphan.secret.clone(),
        ));
        registry.register_type(
            TypeDeclaration::<Base>::new().extends(|_base: &Base| -> &Orphan {
                unreachable!("projection is never applied when the walk stops")
            }),
        );
        registry.register_field(FieldDeclaration::property("id", TypeSpec::ID, |base: &Base| {
            base.id.clone()
        }));

        let merged = effective_declarations(&registry.snapshot(), ClassId::of::<Base>())
            .expect("unmarked ancestors end the walk without failing it");
        let names: Vec<_> = merged.fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["id"], "unmarked ancestor fields stay invisible");
    }

    #[test]
    fn cyclic_extends_chains_are_rejected() {
        let registry = MetadataRegistry::new();
        registry.register_type(
            TypeDeclaration::<RingA>::new().extends(|_a: &RingA| -> &RingB { unreachable!() }),
        );
        registry.register_type(
            TypeDeclaration::<RingB>::new().extends(|_b: &RingB| -> &RingA { unreachable!() }),
        );

        let Err(error) = effective_declarations(&registry.snapshot(), ClassId::of::<RingA>())
        else {
            panic!("a cycle must fail the build");
        };
        assert!(matches!(error, SchemaError::InheritanceCycle { .. }));
    }

    #[test]
    fn arguments_for_undeclared_methods_are_rejected() {
        let registry = MetadataRegistry::new();
        registry.register_type(TypeDeclaration::<Base>::new());
        registry.register_argument::<Base>(
            "missing",
            ArgumentDeclaration::new("needle", 0, ScalarKind::String),
        );

        let Err(error) = effective_declarations(&registry.snapshot(), ClassId::of::<Base>())
        else {
            panic!("dangling arguments must fail the build");
        };
        match error {
            SchemaError::UnknownArgumentTarget { method, argument, .. } => {
                assert_eq!(method, "missing");
                assert_eq!(argument, "needle");
            }
            other => panic!("expected UnknownArgumentTarget, got {other}"),
        }
    }
}
