//! Struct marshaling - managed objects ↔ fixed-layout native structs
//!
//! Architecture:
//! - `descriptor.rs` - compile-time struct layouts (`StructDescriptor`)
//! - `cache.rs` - write-once field-accessor tokens per struct kind
//! - `convert.rs` - C-cast integer and bit-exact float conversions
//! - `macros.rs` - `native_struct!` for declaring native structs
//!
//! Both directions run in two phases: every source value is fetched before
//! anything is written, so a failure while reading leaves the destination
//! untouched. A failure while committing managed fields stops at the
//! failing field.

mod cache;
mod convert;
mod descriptor;
mod macros;

#[cfg(test)]
mod tests;

pub use cache::{cache_for, ensure_cached, registered, CacheSlot, FieldCache, ResolvedFields};
pub use descriptor::{FieldDescriptor, FieldSource, NativeField, NativeKind, StructDescriptor};

use crate::error::{AccessError, DescriptorError, MarshalError};
use crate::managed::{FieldId, ManagedKind, ManagedObject, ManagedValue};
use crate::pin::critical;
use convert::Encoded;
use core::mem::MaybeUninit;
use smallvec::SmallVec;

/// Rust mirror of a native struct with a static descriptor
///
/// # Safety
/// The type must be `#[repr(C)]`, its descriptor must describe its real
/// layout, and the all-zero bit pattern must be a valid value. Every
/// described field must have the native kind's exact width, and a `bool`
/// field may only be described as `NativeKind::Bool`. Use
/// [`native_struct!`](crate::native_struct) rather than implementing this by hand.
pub unsafe trait NativeStruct: Copy + 'static {
    fn descriptor() -> &'static StructDescriptor;

    fn field_cache() -> Result<&'static FieldCache, DescriptorError> {
        cache_for(Self::descriptor())
    }
}

/// Per-argument copy directions for struct parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ArgFlags(u8);

impl ArgFlags {
    pub const NONE: Self = Self(0);
    /// Native call only writes the struct; skip the managed → native copy
    pub const NO_IN: Self = Self(1);
    /// Native call only reads the struct; skip the write-back
    pub const NO_OUT: Self = Self(1 << 1);

    #[inline]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub const fn copies_in(self) -> bool {
        !self.contains(Self::NO_IN)
    }

    #[inline]
    pub const fn copies_out(self) -> bool {
        !self.contains(Self::NO_OUT)
    }
}

impl core::ops::BitOr for ArgFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

fn outside_critical(operation: &'static str) -> Result<(), MarshalError> {
    if critical::is_active() {
        return Err(MarshalError::CriticalRegion { operation });
    }
    Ok(())
}

/// Copy `obj`'s fields into the native struct bytes `dst`
pub fn read_into_native(
    descriptor: &'static StructDescriptor,
    obj: &dyn ManagedObject,
    dst: &mut [u8],
) -> Result<(), MarshalError> {
    check_len(descriptor, dst.len())?;
    let cache = cache_for(descriptor)?;
    // Safety: `dst` covers the descriptor's size
    unsafe { read_with(cache, obj, dst.as_mut_ptr()) }
}

/// Copy the native struct bytes `src` back into `obj`'s fields
pub fn write_from_native(
    descriptor: &'static StructDescriptor,
    src: &[u8],
    obj: &mut dyn ManagedObject,
) -> Result<(), MarshalError> {
    check_len(descriptor, src.len())?;
    let cache = cache_for(descriptor)?;
    // Safety: `src` covers the descriptor's size
    unsafe { write_with(cache, src.as_ptr(), obj) }
}

/// Build a native struct from `obj`
pub fn read_struct<T: NativeStruct>(obj: &dyn ManagedObject) -> Result<T, MarshalError> {
    let cache = T::field_cache()?;
    let mut value = MaybeUninit::<T>::zeroed();
    // Safety: zeroed `T` is valid per the `NativeStruct` contract, and the
    // descriptor only touches bytes inside `T`
    unsafe {
        read_with(cache, obj, value.as_mut_ptr() as *mut u8)?;
        Ok(value.assume_init())
    }
}

/// Copy `value`'s fields back into `obj`
pub fn write_struct<T: NativeStruct>(value: &T, obj: &mut dyn ManagedObject) -> Result<(), MarshalError> {
    let cache = T::field_cache()?;
    // Safety: the descriptor only reads field bytes inside `T`
    unsafe { write_with(cache, value as *const T as *const u8, obj) }
}

/// Copy a native struct out of raw memory
///
/// # Safety
/// `src` must be valid for reads of `T` (alignment not required).
#[inline]
pub unsafe fn read_struct_at<T: NativeStruct>(src: *const T) -> T {
    core::ptr::read_unaligned(src)
}

/// Copy a native struct into raw memory
///
/// # Safety
/// `dst` must be valid for writes of `T` (alignment not required).
#[inline]
pub unsafe fn write_struct_at<T: NativeStruct>(dst: *mut T, value: T) {
    core::ptr::write_unaligned(dst, value)
}

/// Fill the native struct at `dst` from `obj`
///
/// # Safety
/// `dst` must be valid for writes of `T` (alignment not required).
pub unsafe fn move_to_native<T: NativeStruct>(obj: &dyn ManagedObject, dst: *mut T) -> Result<(), MarshalError> {
    let cache = T::field_cache()?;
    read_with(cache, obj, dst as *mut u8)
}

/// Update `obj` from the native struct at `src`
///
/// # Safety
/// `src` must be valid for reads of `T` (alignment not required).
pub unsafe fn move_from_native<T: NativeStruct>(src: *const T, obj: &mut dyn ManagedObject) -> Result<(), MarshalError> {
    let cache = T::field_cache()?;
    write_with(cache, src as *const u8, obj)
}

fn check_len(descriptor: &StructDescriptor, len: usize) -> Result<(), MarshalError> {
    if len < descriptor.size {
        return Err(MarshalError::BufferTooSmall {
            structure: descriptor.name,
            needed: descriptor.size,
            got: len,
        });
    }
    Ok(())
}

unsafe fn read_with(cache: &FieldCache, obj: &dyn ManagedObject, dst: *mut u8) -> Result<(), MarshalError> {
    outside_critical("struct marshaling")?;
    let descriptor = cache.descriptor();
    let resolved = cache.ensure_cached(obj)?;
    resolved.check_class(descriptor, obj)?;

    // Phase 1: fetch and encode every managed value
    let mut staged = SmallVec::<[(usize, Encoded); 16]>::new();
    let mut tokens = resolved.tokens().iter().copied();
    for field in descriptor.all_fields() {
        let value = match field.source {
            FieldSource::Direct { name, managed } => {
                let token = next_token(&mut tokens, descriptor, name, managed, resolved)?;
                fetch(descriptor, obj, token, name, managed)?
            }
            FieldSource::Split { low, high } => {
                let low_token = next_token(&mut tokens, descriptor, low, ManagedKind::Int, resolved)?;
                let high_token = next_token(&mut tokens, descriptor, high, ManagedKind::Int, resolved)?;
                let low = fetch_int(descriptor, obj, low_token, low)?;
                let high = fetch_int(descriptor, obj, high_token, high)?;
                ManagedValue::Long(convert::join_halves(low, high))
            }
        };
        let encoded = convert::encode(field.native, value)
            .ok_or_else(|| incompatible(descriptor, field, value.kind()))?;
        staged.push((field.offset, encoded));
    }

    // Phase 2: write native bytes
    for &(offset, encoded) in &staged {
        convert::store(dst.add(offset), encoded);
    }
    Ok(())
}

unsafe fn write_with(cache: &FieldCache, src: *const u8, obj: &mut dyn ManagedObject) -> Result<(), MarshalError> {
    outside_critical("struct marshaling")?;
    let descriptor = cache.descriptor();
    let resolved = cache.ensure_cached(&*obj)?;
    resolved.check_class(descriptor, &*obj)?;

    // Phase 1: decode every native field
    let mut staged = SmallVec::<[(FieldId, &'static str, ManagedValue); 16]>::new();
    let mut tokens = resolved.tokens().iter().copied();
    for field in descriptor.all_fields() {
        let source = src.add(field.offset);
        match field.source {
            FieldSource::Direct { name, managed } => {
                let token = next_token(&mut tokens, descriptor, name, managed, resolved)?;
                let value = convert::decode(field.native, source, managed)
                    .ok_or_else(|| incompatible(descriptor, field, managed))?;
                staged.push((token, name, value));
            }
            FieldSource::Split { low, high } => {
                let low_token = next_token(&mut tokens, descriptor, low, ManagedKind::Int, resolved)?;
                let high_token = next_token(&mut tokens, descriptor, high, ManagedKind::Int, resolved)?;
                let whole = convert::decode_integral(field.native, source)
                    .ok_or_else(|| incompatible(descriptor, field, ManagedKind::Int))?;
                let (lo, hi) = convert::split_halves(whole);
                staged.push((low_token, low, ManagedValue::Int(lo)));
                staged.push((high_token, high, ManagedValue::Int(hi)));
            }
        }
    }

    // Phase 2: commit into the managed object
    for &(token, name, value) in &staged {
        obj.set_field(token, value).map_err(|source| MarshalError::FieldAccess {
            structure: descriptor.name,
            field: name,
            source,
        })?;
    }
    Ok(())
}

/// Read one managed field, insisting on the requested kind
fn fetch(
    descriptor: &StructDescriptor,
    obj: &dyn ManagedObject,
    token: FieldId,
    name: &'static str,
    kind: ManagedKind,
) -> Result<ManagedValue, MarshalError> {
    let value = obj.get_field(token, kind).map_err(|source| MarshalError::FieldAccess {
        structure: descriptor.name,
        field: name,
        source,
    })?;
    if value.kind() != kind {
        return Err(MarshalError::FieldAccess {
            structure: descriptor.name,
            field: name,
            source: AccessError::KindMismatch {
                field: token,
                expected: kind,
                found: value.kind(),
            },
        });
    }
    Ok(value)
}

fn fetch_int(
    descriptor: &StructDescriptor,
    obj: &dyn ManagedObject,
    token: FieldId,
    name: &'static str,
) -> Result<i32, MarshalError> {
    match fetch(descriptor, obj, token, name, ManagedKind::Int)? {
        ManagedValue::Int(v) => Ok(v),
        other => Err(MarshalError::FieldAccess {
            structure: descriptor.name,
            field: name,
            source: AccessError::KindMismatch {
                field: token,
                expected: ManagedKind::Int,
                found: other.kind(),
            },
        }),
    }
}

fn incompatible(descriptor: &StructDescriptor, field: &FieldDescriptor, managed: ManagedKind) -> MarshalError {
    MarshalError::Descriptor(DescriptorError::IncompatibleKinds {
        structure: descriptor.name,
        field: field.name(),
        managed,
        native: field.native,
    })
}

fn next_token(
    tokens: &mut impl Iterator<Item = FieldId>,
    descriptor: &StructDescriptor,
    field: &'static str,
    kind: ManagedKind,
    resolved: &ResolvedFields,
) -> Result<FieldId, MarshalError> {
    tokens.next().ok_or_else(|| MarshalError::FieldResolution {
        structure: descriptor.name,
        field,
        kind,
        class: resolved.class_name().to_string(),
    })
}
