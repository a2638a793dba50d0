//! Native handles - opaque pointer-sized values owned by the native side
//!
//! Design: one handle type whose width follows the target, instead of a
//! 32-bit and a 64-bit copy of every entry point. The managed side carries
//! handles in an `Int` field on 32-bit targets and a `Long` field on 64-bit.

use crate::managed::{ManagedKind, ManagedValue};
use core::fmt;
use core::hash::{Hash, Hasher};
use core::marker::PhantomData;

/// Signed integer with the width of a native pointer
#[cfg(target_pointer_width = "64")]
pub type NativeWord = i64;

/// Signed integer with the width of a native pointer
#[cfg(target_pointer_width = "32")]
pub type NativeWord = i32;

/// Width of a native pointer in bytes
pub const WORD_BYTES: usize = core::mem::size_of::<usize>();

/// Untyped native handle. Never dereferenced or freed by the core.
#[repr(transparent)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord)]
pub struct NativeHandle(isize);

impl NativeHandle {
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn from_raw(raw: isize) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> isize {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn from_ptr<T>(ptr: *const T) -> Self {
        Self(ptr as isize)
    }

    #[inline]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    #[inline]
    pub const fn to_word(self) -> NativeWord {
        self.0 as NativeWord
    }

    #[inline]
    pub const fn from_word(word: NativeWord) -> Self {
        Self(word as isize)
    }

    /// Managed representation: `Int` or `Long` depending on pointer width
    pub fn to_managed(self) -> ManagedValue {
        #[cfg(target_pointer_width = "64")]
        {
            ManagedValue::Long(self.0 as i64)
        }
        #[cfg(target_pointer_width = "32")]
        {
            ManagedValue::Int(self.0 as i32)
        }
    }

    /// Accepts either managed width; a 64-bit value on a 32-bit target is truncated
    pub fn from_managed(value: ManagedValue) -> Option<Self> {
        match value {
            ManagedValue::Int(v) => Some(Self(v as isize)),
            ManagedValue::Long(v) => Some(Self(v as isize)),
            _ => None,
        }
    }

    /// Managed field kind used to carry a handle on this target
    pub const fn managed_kind() -> ManagedKind {
        ManagedKind::WORD
    }
}

impl fmt::Debug for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NativeHandle({:#x})", self.0 as usize)
    }
}

/// Marker for the resource family a typed handle refers to
pub trait HandleKind: 'static {
    const NAME: &'static str;
}

macro_rules! handle_kinds {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
            pub enum $name {}

            impl HandleKind for $name {
                const NAME: &'static str = stringify!($name);
            }
        )*
    };
}

handle_kinds!(
    /// Top-level or child window
    Window,
    /// Device context for drawing
    DeviceContext,
    /// Graphics library rendering context
    GraphicsContext,
    /// Interface pointer of a component object
    ComObject,
    /// Loaded native module
    Module,
);

/// Native handle tagged with the kind of resource it names
#[repr(transparent)]
pub struct Handle<K: HandleKind> {
    raw: NativeHandle,
    _kind: PhantomData<fn() -> K>,
}

impl<K: HandleKind> Handle<K> {
    pub const NULL: Self = Self::new(NativeHandle::NULL);

    #[inline]
    pub const fn new(raw: NativeHandle) -> Self {
        Self { raw, _kind: PhantomData }
    }

    #[inline]
    pub const fn raw(self) -> NativeHandle {
        self.raw
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.raw.is_null()
    }
}

impl<K: HandleKind> Clone for Handle<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K: HandleKind> Copy for Handle<K> {}

impl<K: HandleKind> Default for Handle<K> {
    fn default() -> Self {
        Self::NULL
    }
}

impl<K: HandleKind> PartialEq for Handle<K> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<K: HandleKind> Eq for Handle<K> {}

impl<K: HandleKind> Hash for Handle<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<K: HandleKind> fmt::Debug for Handle<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:#x})", K::NAME, self.raw.raw() as usize)
    }
}

impl<K: HandleKind> From<NativeHandle> for Handle<K> {
    fn from(raw: NativeHandle) -> Self {
        Self::new(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_matches_pointer_width() {
        assert_eq!(core::mem::size_of::<NativeWord>(), WORD_BYTES);
        assert_eq!(core::mem::size_of::<NativeHandle>(), WORD_BYTES);
        assert_eq!(core::mem::size_of::<Handle<Window>>(), WORD_BYTES);
    }

    #[test]
    fn managed_round_trip_uses_platform_width() {
        let handle = NativeHandle::from_raw(0x1234);
        let managed = handle.to_managed();
        assert_eq!(managed.kind(), ManagedKind::WORD);
        assert_eq!(NativeHandle::from_managed(managed), Some(handle));
        assert_eq!(NativeHandle::from_managed(ManagedValue::Float(1.0)), None);
    }

    #[test]
    fn typed_handles_compare_by_raw_value() {
        let a: Handle<DeviceContext> = NativeHandle::from_raw(7).into();
        let b = Handle::<DeviceContext>::new(NativeHandle::from_raw(7));
        assert_eq!(a, b);
        assert!(Handle::<Window>::NULL.is_null());
        assert_eq!(format!("{:?}", a), "DeviceContext(0x7)");
    }
}
