//! Vtable calls - invoke a method of an opaque native object by slot number
//!
//! The object's first word points at a table of function pointers. Every
//! method takes the object pointer followed by word-sized arguments and
//! returns a 32-bit status, using the platform's system calling convention.
//!
//! Methods are described by a type implementing [`VtblMethod`], so the slot
//! number and argument arity are fixed at compile time:
//!
//! ```
//! use native_bridge::handle::NativeWord;
//! use native_bridge::vtable::{VtblMethod, VtblSlot};
//!
//! struct GetExtent;
//!
//! impl VtblMethod for GetExtent {
//!     const SLOT: VtblSlot = VtblSlot(8);
//!     type Args = (NativeWord, NativeWord);
//! }
//! ```

use crate::handle::{NativeHandle, NativeWord};
use core::ffi::c_void;

/// Index into an object's method table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VtblSlot(pub usize);

impl VtblSlot {
    pub const QUERY_INTERFACE: Self = Self(0);
    pub const ADD_REF: Self = Self(1);
    pub const RELEASE: Self = Self(2);
}

/// Status returned for calls on a null object
pub const E_POINTER: i32 = 0x8000_4003_u32 as i32;

/// Argument lists a vtable method can be called with
///
/// # Safety
/// `invoke` must call `entry` with exactly the object pointer followed by
/// the tuple's words.
pub unsafe trait VtblArgs {
    const ARITY: usize;

    /// # Safety
    /// `entry` must be a function taking `this` and `Self::ARITY` words.
    unsafe fn invoke(self, entry: *const c_void, this: *mut c_void) -> i32;
}

macro_rules! vtbl_args {
    (@word $arg:ident) => { NativeWord };
    (@one $arg:ident) => { 1 };
    ($($arg:ident),*) => {
        unsafe impl VtblArgs for ($(vtbl_args!(@word $arg),)*) {
            const ARITY: usize = 0 $(+ vtbl_args!(@one $arg))*;

            #[inline]
            unsafe fn invoke(self, entry: *const c_void, this: *mut c_void) -> i32 {
                let ($($arg,)*) = self;
                let method: extern "system" fn(*mut c_void $(, vtbl_args!(@word $arg))*) -> i32 =
                    core::mem::transmute(entry);
                method(this $(, $arg)*)
            }
        }
    };
}

vtbl_args!();
vtbl_args!(a);
vtbl_args!(a, b);
vtbl_args!(a, b, c);
vtbl_args!(a, b, c, d);
vtbl_args!(a, b, c, d, e);
vtbl_args!(a, b, c, d, e, f);

/// Compile-time description of one method
pub trait VtblMethod {
    const SLOT: VtblSlot;
    type Args: VtblArgs;
}

/// Pointer to a native object with a method table
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ComPtr(NativeHandle);

impl ComPtr {
    #[inline]
    pub const fn new(handle: NativeHandle) -> Self {
        Self(handle)
    }

    #[inline]
    pub const fn handle(self) -> NativeHandle {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0.is_null()
    }

    /// Call the method at `slot`; a null object yields [`E_POINTER`]
    ///
    /// # Safety
    /// A non-null `self` must point at a live object whose table has an
    /// entry at `slot` taking exactly `A::ARITY` word arguments.
    pub unsafe fn call<A: VtblArgs>(self, slot: VtblSlot, args: A) -> i32 {
        if self.is_null() {
            return E_POINTER;
        }
        let this = self.0.as_ptr::<c_void>();
        let table = *(this as *const *const *const c_void);
        let entry = *table.add(slot.0);
        args.invoke(entry, this)
    }

    /// Call method `M`
    ///
    /// # Safety
    /// Same as [`ComPtr::call`] for `M::SLOT`.
    #[inline]
    pub unsafe fn invoke<M: VtblMethod>(self, args: M::Args) -> i32 {
        self.call(M::SLOT, args)
    }
}
