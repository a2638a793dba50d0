//! Dynamic objects - reference implementation of the managed object model
//!
//! Classes are built once and shared; field tokens are indices into the
//! flattened field list (inherited fields first), so a token resolved on a
//! base class stays valid for every subclass.

use super::{ClassId, FieldId, ManagedClass, ManagedKind, ManagedObject, ManagedValue};
use crate::error::AccessError;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

static NEXT_CLASS_ID: AtomicU64 = AtomicU64::new(1);

/// Class with a fixed list of named, typed fields
#[derive(Debug)]
pub struct DynClass {
    id: ClassId,
    name: String,
    parent: Option<Arc<DynClass>>,
    fields: Vec<(String, ManagedKind)>,
    lookups: AtomicUsize,
}

impl DynClass {
    pub fn builder(name: impl Into<String>) -> DynClassBuilder {
        DynClassBuilder {
            name: name.into(),
            parent: None,
            fields: Vec::new(),
        }
    }

    pub fn parent(&self) -> Option<&Arc<DynClass>> {
        self.parent.as_ref()
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Number of by-name lookups served so far
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::Relaxed)
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        // Search from the end so a subclass field shadows an inherited one
        self.fields.iter().rposition(|(n, _)| n == name)
    }
}

impl ManagedClass for DynClass {
    fn id(&self) -> ClassId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn resolve_field(&self, name: &str, kind: ManagedKind) -> Option<FieldId> {
        self.lookups.fetch_add(1, Ordering::Relaxed);
        let index = self.index_of(name)?;
        (self.fields[index].1 == kind).then_some(FieldId(index as u32))
    }

    fn is_assignable_to(&self, other: ClassId) -> bool {
        let mut class = Some(self);
        while let Some(c) = class {
            if c.id == other {
                return true;
            }
            class = c.parent.as_deref();
        }
        false
    }
}

pub struct DynClassBuilder {
    name: String,
    parent: Option<Arc<DynClass>>,
    fields: Vec<(String, ManagedKind)>,
}

impl DynClassBuilder {
    pub fn extends(mut self, parent: &Arc<DynClass>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    pub fn field(mut self, name: impl Into<String>, kind: ManagedKind) -> Self {
        self.fields.push((name.into(), kind));
        self
    }

    pub fn build(self) -> Arc<DynClass> {
        let mut fields = self
            .parent
            .as_ref()
            .map(|p| p.fields.clone())
            .unwrap_or_default();
        fields.extend(self.fields);

        Arc::new(DynClass {
            id: ClassId(NEXT_CLASS_ID.fetch_add(1, Ordering::Relaxed)),
            name: self.name,
            parent: self.parent,
            fields,
            lookups: AtomicUsize::new(0),
        })
    }
}

/// Instance of a `DynClass`; fields start at their zero value
#[derive(Debug, Clone)]
pub struct DynObject {
    class: Arc<DynClass>,
    values: Vec<ManagedValue>,
}

impl DynObject {
    pub fn new(class: &Arc<DynClass>) -> Self {
        let values = class.fields.iter().map(|(_, kind)| kind.zero()).collect();
        Self {
            class: Arc::clone(class),
            values,
        }
    }

    pub fn dyn_class(&self) -> &Arc<DynClass> {
        &self.class
    }

    /// Read a field by name, bypassing token resolution
    pub fn get(&self, name: &str) -> Option<ManagedValue> {
        self.class.index_of(name).map(|i| self.values[i])
    }

    /// Write a field by name; the value must match the declared kind
    pub fn set(&mut self, name: &str, value: ManagedValue) -> bool {
        match self.class.index_of(name) {
            Some(i) if self.class.fields[i].1 == value.kind() => {
                self.values[i] = value;
                true
            }
            _ => false,
        }
    }

    pub fn with(mut self, name: &str, value: ManagedValue) -> Self {
        self.set(name, value);
        self
    }

    fn slot(&self, field: FieldId) -> Result<(usize, ManagedKind), AccessError> {
        let index = field.0 as usize;
        self.class
            .fields
            .get(index)
            .map(|(_, kind)| (index, *kind))
            .ok_or(AccessError::UnknownField(field))
    }
}

impl ManagedObject for DynObject {
    fn class(&self) -> &dyn ManagedClass {
        &*self.class
    }

    fn get_field(&self, field: FieldId, kind: ManagedKind) -> Result<ManagedValue, AccessError> {
        let (index, declared) = self.slot(field)?;
        if declared != kind {
            return Err(AccessError::KindMismatch {
                field,
                expected: kind,
                found: declared,
            });
        }
        Ok(self.values[index])
    }

    fn set_field(&mut self, field: FieldId, value: ManagedValue) -> Result<(), AccessError> {
        let (index, declared) = self.slot(field)?;
        if declared != value.kind() {
            return Err(AccessError::KindMismatch {
                field,
                expected: value.kind(),
                found: declared,
            });
        }
        self.values[index] = value;
        Ok(())
    }
}
