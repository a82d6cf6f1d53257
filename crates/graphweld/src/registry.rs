//! Process-wide metadata registry.
//!
//! Declarations accumulate here during the declare phase, before any schema
//! is assembled. Writes are idempotent-additive: re-registering the same
//! marker is a no-op and the first registration wins, so declare code may
//! run more than once without changing the outcome. Registering members
//! against a class that never receives a type marker is accepted; the
//! failure is reported at build time, when the class is used as a type.

use std::any::Any;
use std::collections::{BTreeSet, HashMap};
use std::sync::{OnceLock, RwLock};

use tracing::{debug, trace};

use crate::declaration::{
    Accessor, ArgumentDeclaration, ClassId, FieldDeclaration, ParentLink, TypeDeclaration,
    TypeSpec,
};

/// Erased field declaration as stored per class.
#[derive(Clone)]
pub(crate) struct StoredField {
    pub(crate) name: String,
    pub(crate) returns: TypeSpec,
    pub(crate) accessor: Accessor,
    pub(crate) description: Option<String>,
}

/// Erased type marker as stored per class.
#[derive(Clone)]
pub(crate) struct StoredType {
    pub(crate) name: String,
    pub(crate) description: Option<String>,
    pub(crate) parent: Option<ParentLink>,
}

/// Everything registered against one class.
#[derive(Clone)]
pub(crate) struct ClassRecord {
    pub(crate) marker: Option<StoredType>,
    pub(crate) fields: Vec<StoredField>,
    pub(crate) arguments: HashMap<String, Vec<ArgumentDeclaration>>,
    pub(crate) context_bindings: BTreeSet<String>,
}

impl ClassRecord {
    fn new() -> Self {
        Self {
            marker: None,
            fields: Vec::new(),
            arguments: HashMap::new(),
            context_bindings: BTreeSet::new(),
        }
    }

    pub(crate) fn has_member_metadata(&self) -> bool {
        !self.fields.is_empty() || !self.arguments.is_empty() || !self.context_bindings.is_empty()
    }
}

/// Store of declaration metadata, read by every schema build.
///
/// One process-wide instance is available through [`global`](Self::global);
/// scoped instances keep independent declaration sets, which tests rely on.
pub struct MetadataRegistry {
    inner: RwLock<HashMap<ClassId, ClassRecord>>,
}

impl MetadataRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry.
    pub fn global() -> &'static MetadataRegistry {
        static GLOBAL: OnceLock<MetadataRegistry> = OnceLock::new();
        GLOBAL.get_or_init(MetadataRegistry::new)
    }

    /// Applies a type marker. The first marker for a class wins; later ones
    /// are no-ops.
    pub fn register_type<T: Any + Send + Sync>(&self, declaration: TypeDeclaration<T>) {
        let class = declaration.class();
        let mut inner = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = inner.entry(class).or_insert_with(ClassRecord::new);
        if record.marker.is_some() {
            trace!(class = %class, "type marker already present, keeping the first");
            return;
        }
        debug!(class = %class, type_name = %declaration.name, "registered type");
        record.marker = Some(StoredType {
            name: declaration.name,
            description: declaration.description,
            parent: declaration.parent,
        });
    }

    /// Applies a field marker. A field name already present on the class is
    /// a no-op; inline-declared arguments merge by position like separately
    /// registered ones.
    pub fn register_field<T: Any + Send + Sync>(&self, declaration: FieldDeclaration<T>) {
        let class = declaration.owner();
        let FieldDeclaration {
            name,
            returns,
            accessor,
            description,
            arguments,
            _owner: _,
        } = declaration;

        let mut inner = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = inner.entry(class).or_insert_with(ClassRecord::new);
        if record.fields.iter().any(|field| field.name == name) {
            trace!(class = %class, field = %name, "field already declared, keeping the first");
            return;
        }
        debug!(class = %class, field = %name, "registered field");
        for argument in arguments {
            Self::insert_argument(record, class, &name, argument);
        }
        record.fields.push(StoredField {
            name,
            returns,
            accessor,
            description,
        });
    }

    /// Applies an argument marker against a method field of `T`. A position
    /// already declared for that method is a no-op.
    pub fn register_argument<T: Any + Send + Sync>(
        &self,
        method: impl Into<String>,
        argument: ArgumentDeclaration,
    ) {
        let class = ClassId::of::<T>();
        let method = method.into();
        let mut inner = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = inner.entry(class).or_insert_with(ClassRecord::new);
        Self::insert_argument(record, class, &method, argument);
    }

    /// Declares a member of `T` populated from the request context.
    pub fn register_context_binding<T: Any + Send + Sync>(&self, member: impl Into<String>) {
        let class = ClassId::of::<T>();
        let member = member.into();
        let mut inner = self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = inner.entry(class).or_insert_with(ClassRecord::new);
        if record.context_bindings.insert(member.clone()) {
            debug!(class = %class, member = %member, "registered context binding");
        } else {
            trace!(class = %class, member = %member, "context binding already declared");
        }
    }

    /// The accumulated raw declaration set for exactly `class`, with no
    /// inheritance walk applied.
    pub fn declarations(&self, class: ClassId) -> Option<ClassDeclarations> {
        let inner = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        let record = inner.get(&class)?;
        let argument_names = record
            .arguments
            .iter()
            .map(|(method, declared)| {
                let mut sorted = declared.clone();
                sorted.sort_by_key(|argument| argument.position);
                (
                    method.clone(),
                    sorted.into_iter().map(|argument| argument.name).collect(),
                )
            })
            .collect();
        Some(ClassDeclarations {
            class,
            type_name: record.marker.as_ref().map(|marker| marker.name.clone()),
            parent: record
                .marker
                .as_ref()
                .and_then(|marker| marker.parent.as_ref())
                .map(|link| link.parent),
            field_names: record.fields.iter().map(|field| field.name.clone()).collect(),
            argument_names,
            context_bindings: record.context_bindings.clone(),
        })
    }

    /// Immutable copy of the whole store. Builds work off a snapshot so
    /// registrations racing a build never produce a half-updated schema,
    /// and repeated builds share no mutable state.
    pub(crate) fn snapshot(&self) -> RegistrySnapshot {
        let inner = self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner());
        RegistrySnapshot {
            classes: inner.clone(),
        }
    }

    fn insert_argument(
        record: &mut ClassRecord,
        class: ClassId,
        method: &str,
        argument: ArgumentDeclaration,
    ) {
        let slots = record.arguments.entry(method.to_string()).or_default();
        if slots.iter().any(|existing| existing.position == argument.position) {
            trace!(
                class = %class,
                method = %method,
                position = argument.position,
                "argument position already declared, keeping the first"
            );
            return;
        }
        debug!(class = %class, method = %method, argument = %argument.name, "registered argument");
        slots.push(argument);
    }
}

impl Default for MetadataRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only view of one class's raw declarations.
#[derive(Debug, Clone)]
pub struct ClassDeclarations {
    pub class: ClassId,
    pub type_name: Option<String>,
    pub parent: Option<ClassId>,
    pub field_names: Vec<String>,
    /// Method name to argument names, ordered by declared position.
    pub argument_names: HashMap<String, Vec<String>>,
    pub context_bindings: BTreeSet<String>,
}

/// Frozen copy of the registry taken at the start of a build.
#[derive(Clone)]
pub(crate) struct RegistrySnapshot {
    classes: HashMap<ClassId, ClassRecord>,
}

impl RegistrySnapshot {
    pub(crate) fn record(&self, class: ClassId) -> Option<&ClassRecord> {
        self.classes.get(&class)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&ClassId, &ClassRecord)> {
        self.classes.iter()
    }
}
