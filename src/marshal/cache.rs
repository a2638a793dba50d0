//! Field-accessor cache - by-name field lookups done once per struct kind
//!
//! Design: process-wide registry of write-once entries. Each entry wraps a
//! `OnceCell`, so concurrent first use runs resolution once and publishes
//! the complete token table atomically. A failed resolution publishes
//! nothing; the next call starts over.

use super::descriptor::StructDescriptor;
use crate::error::{DescriptorError, MarshalError};
use crate::logging::{log_cache_failure, log_cache_populated};
use crate::managed::{ClassId, FieldId, ManagedObject};
use crate::pin::critical;
use dashmap::DashMap;
use once_cell::sync::{Lazy, OnceCell};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Global registry, keyed by descriptor name
static REGISTRY: Lazy<DashMap<&'static str, &'static FieldCache>> = Lazy::new(DashMap::new);

/// Link from a descriptor to its registry entry, set on first use
///
/// Lets the hot path skip the registry lookup: after the first call,
/// [`cache_for`] is a single load.
pub struct CacheSlot(OnceCell<&'static FieldCache>);

impl CacheSlot {
    pub const fn new() -> Self {
        Self(OnceCell::new())
    }

    #[inline]
    pub fn get(&self) -> Option<&'static FieldCache> {
        self.0.get().copied()
    }
}

impl Default for CacheSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for CacheSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("CacheSlot").field(&self.0.get().is_some()).finish()
    }
}

/// Accessor tokens resolved for one struct kind
#[derive(Debug)]
pub struct ResolvedFields {
    class: ClassId,
    class_name: String,
    tokens: Vec<FieldId>,
}

impl ResolvedFields {
    #[inline]
    pub fn class(&self) -> ClassId {
        self.class
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Tokens in descriptor order; split fields contribute low then high
    #[inline]
    pub fn tokens(&self) -> &[FieldId] {
        &self.tokens
    }

    /// Reject objects whose class cannot use these tokens
    pub fn check_class(
        &self,
        descriptor: &StructDescriptor,
        obj: &dyn ManagedObject,
    ) -> Result<(), MarshalError> {
        let class = obj.class();
        if class.id() == self.class || class.is_assignable_to(self.class) {
            return Ok(());
        }
        Err(MarshalError::ClassMismatch {
            structure: descriptor.name,
            cached: self.class_name.clone(),
            found: class.name().to_string(),
        })
    }
}

/// Write-once accessor table for one struct kind
pub struct FieldCache {
    descriptor: &'static StructDescriptor,
    resolved: OnceCell<ResolvedFields>,
    resolutions: AtomicUsize,
}

impl FieldCache {
    pub const fn new(descriptor: &'static StructDescriptor) -> Self {
        Self {
            descriptor,
            resolved: OnceCell::new(),
            resolutions: AtomicUsize::new(0),
        }
    }

    #[inline]
    pub fn descriptor(&self) -> &'static StructDescriptor {
        self.descriptor
    }

    #[inline]
    pub fn is_cached(&self) -> bool {
        self.resolved.get().is_some()
    }

    /// Number of resolution passes that ran (successful or not)
    pub fn resolutions(&self) -> usize {
        self.resolutions.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn get(&self) -> Option<&ResolvedFields> {
        self.resolved.get()
    }

    /// Resolve every field against `sample`'s class unless already cached
    #[inline]
    pub fn ensure_cached(&self, sample: &dyn ManagedObject) -> Result<&ResolvedFields, MarshalError> {
        if let Some(resolved) = self.resolved.get() {
            return Ok(resolved);
        }
        self.populate(sample)
    }

    #[cold]
    fn populate(&self, sample: &dyn ManagedObject) -> Result<&ResolvedFields, MarshalError> {
        if critical::is_active() {
            return Err(MarshalError::CriticalRegion {
                operation: "field accessor resolution",
            });
        }
        self.resolved
            .get_or_try_init(|| self.resolve(sample))
            .map_err(|err| {
                log_cache_failure(self.descriptor.name, &err.to_string());
                err
            })
    }

    fn resolve(&self, sample: &dyn ManagedObject) -> Result<ResolvedFields, MarshalError> {
        self.resolutions.fetch_add(1, Ordering::Relaxed);

        let class = sample.class();
        let mut tokens = Vec::with_capacity(self.descriptor.accessor_count());
        for field in self.descriptor.all_fields() {
            for (name, kind) in field.accessors() {
                let token = class.resolve_field(name, kind).ok_or_else(|| {
                    MarshalError::FieldResolution {
                        structure: self.descriptor.name,
                        field: name,
                        kind,
                        class: class.name().to_string(),
                    }
                })?;
                tokens.push(token);
            }
        }

        log_cache_populated(self.descriptor.name, class.name(), tokens.len());
        Ok(ResolvedFields {
            class: class.id(),
            class_name: class.name().to_string(),
            tokens,
        })
    }
}

impl core::fmt::Debug for FieldCache {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FieldCache")
            .field("structure", &self.descriptor.name)
            .field("cached", &self.is_cached())
            .field("resolutions", &self.resolutions())
            .finish()
    }
}

/// Registry entry for `descriptor`, created and validated on first use
///
/// Entries live for the rest of the process.
#[inline]
pub fn cache_for(descriptor: &'static StructDescriptor) -> Result<&'static FieldCache, DescriptorError> {
    descriptor
        .cache
        .0
        .get_or_try_init(|| register(descriptor))
        .copied()
}

#[cold]
fn register(descriptor: &'static StructDescriptor) -> Result<&'static FieldCache, DescriptorError> {
    if let Some(entry) = REGISTRY.get(descriptor.name) {
        return same_descriptor(*entry, descriptor);
    }

    descriptor.validate()?;
    let entry = *REGISTRY
        .entry(descriptor.name)
        .or_insert_with(|| Box::leak(Box::new(FieldCache::new(descriptor))));
    same_descriptor(entry, descriptor)
}

fn same_descriptor(
    entry: &'static FieldCache,
    descriptor: &'static StructDescriptor,
) -> Result<&'static FieldCache, DescriptorError> {
    if core::ptr::eq(entry.descriptor, descriptor) {
        Ok(entry)
    } else {
        Err(DescriptorError::DuplicateName(descriptor.name))
    }
}

/// Resolve `descriptor`'s accessors against `sample` if not done yet
pub fn ensure_cached(
    descriptor: &'static StructDescriptor,
    sample: &dyn ManagedObject,
) -> Result<&'static FieldCache, MarshalError> {
    let cache = cache_for(descriptor)?;
    cache.ensure_cached(sample)?;
    Ok(cache)
}

/// Names of all struct kinds with a registry entry
pub fn registered() -> Vec<&'static str> {
    let mut names: Vec<_> = REGISTRY.iter().map(|entry| *entry.key()).collect();
    names.sort_unstable();
    names
}
