//! Value conversion between managed fields and native field bytes
//!
//! Integers follow C cast semantics: widen to 64 bits by the source's
//! signedness, then truncate to the destination width. Floats are copied
//! bit for bit and never change width.

use super::descriptor::NativeKind;
use crate::managed::{ManagedKind, ManagedValue};
use core::ptr;

/// Native field bytes, sized to the field's width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Encoded {
    B8(u8),
    B16(u16),
    B32(u32),
    B64(u64),
}

/// Native representation of `value` for a field of kind `native`
///
/// `None` when the value cannot live there: a float in an integral field,
/// an integer in a float field, or a float of the other width.
pub(crate) fn encode(native: NativeKind, value: ManagedValue) -> Option<Encoded> {
    match (native, value) {
        (NativeKind::F32, ManagedValue::Float(v)) => Some(Encoded::B32(v.to_bits())),
        (NativeKind::F64, ManagedValue::Double(v)) => Some(Encoded::B64(v.to_bits())),
        (NativeKind::F32 | NativeKind::F64, _) => None,
        (NativeKind::Bool, _) => value.as_i64().map(|v| Encoded::B8((v != 0) as u8)),
        _ => value.as_i64().map(|v| truncate(native.width(), v)),
    }
}

#[inline]
const fn truncate(width: usize, v: i64) -> Encoded {
    match width {
        1 => Encoded::B8(v as u8),
        2 => Encoded::B16(v as u16),
        4 => Encoded::B32(v as u32),
        _ => Encoded::B64(v as u64),
    }
}

/// Write encoded field bytes at `dst`
///
/// # Safety
/// `dst` must be valid for writes of the encoded width.
#[inline]
pub(crate) unsafe fn store(dst: *mut u8, encoded: Encoded) {
    match encoded {
        Encoded::B8(v) => ptr::write_unaligned(dst, v),
        Encoded::B16(v) => ptr::write_unaligned(dst as *mut u16, v),
        Encoded::B32(v) => ptr::write_unaligned(dst as *mut u32, v),
        Encoded::B64(v) => ptr::write_unaligned(dst as *mut u64, v),
    }
}

/// Read the native field at `src` as a managed value of kind `managed`
///
/// `None` when `managed` cannot carry `native`.
///
/// # Safety
/// `src` must be valid for `native.width()` bytes of reads.
pub(crate) unsafe fn decode(native: NativeKind, src: *const u8, managed: ManagedKind) -> Option<ManagedValue> {
    match (native, managed) {
        (NativeKind::F32, ManagedKind::Float) => {
            Some(ManagedValue::Float(f32::from_bits(ptr::read_unaligned(src as *const u32))))
        }
        (NativeKind::F64, ManagedKind::Double) => {
            Some(ManagedValue::Double(f64::from_bits(ptr::read_unaligned(src as *const u64))))
        }
        _ => ManagedValue::from_i64(managed, decode_integral(native, src)?),
    }
}

/// Integral native field widened to 64 bits by its signedness; `None` for floats
///
/// # Safety
/// `src` must be valid for `native.width()` bytes of reads.
#[inline]
pub(crate) unsafe fn decode_integral(native: NativeKind, src: *const u8) -> Option<i64> {
    Some(match native {
        NativeKind::Bool => (ptr::read_unaligned(src) != 0) as i64,
        NativeKind::I8 => ptr::read_unaligned(src as *const i8) as i64,
        NativeKind::U8 => ptr::read_unaligned(src) as i64,
        NativeKind::I16 => ptr::read_unaligned(src as *const i16) as i64,
        NativeKind::U16 | NativeKind::Char16 => ptr::read_unaligned(src as *const u16) as i64,
        NativeKind::I32 => ptr::read_unaligned(src as *const i32) as i64,
        NativeKind::U32 => ptr::read_unaligned(src as *const u32) as i64,
        NativeKind::I64 | NativeKind::U64 => ptr::read_unaligned(src as *const i64),
        NativeKind::Word => ptr::read_unaligned(src as *const isize) as i64,
        NativeKind::F32 | NativeKind::F64 => return None,
    })
}

/// Join two managed `Int` halves into one 64-bit value
#[inline]
pub(crate) const fn join_halves(low: i32, high: i32) -> i64 {
    (((high as u32 as u64) << 32) | (low as u32 as u64)) as i64
}

/// Split a 64-bit value into managed `Int` halves (low, high)
#[inline]
pub(crate) const fn split_halves(v: i64) -> (i32, i32) {
    (v as u64 as u32 as i32, ((v as u64) >> 32) as u32 as i32)
}
