//! Call frames - one native call composed from the marshaling pieces
//!
//! A call site works through a frame in a fixed order:
//! 1. `struct_arg` for each struct parameter (before any critical pin)
//! 2. `pin` for each bulk buffer
//! 3. `invoke` the native function under its dispatch slot
//! 4. `struct_result` for each struct parameter, which releases all pins
//!    first, newest first
//!
//! Any error returned along the way drops the frame, and dropping releases
//! whatever is still pinned. `finish_or` turns the error into the call's
//! sentinel return value.
//!
//! ```
//! use native_bridge::error::InteropError;
//! use native_bridge::managed::ManagedArray;
//! use native_bridge::pin::{PinMode, Release};
//! use native_bridge::shim::{finish_or, CallFrame};
//!
//! native_bridge::native_functions! {
//!     enum Os in "OS" {
//!         FillBytes,
//!     }
//! }
//!
//! fn fill_bytes(buffer: &mut ManagedArray<i8>, value: i8) -> i32 {
//!     let len = buffer.as_slice().len();
//!     let result = (|| -> Result<i32, InteropError> {
//!         let mut frame = CallFrame::new(Os::FillBytes);
//!         let ptr = frame.pin(Some(buffer), PinMode::Critical, Release::Commit)? as *mut i8;
//!         frame.invoke(|| unsafe { core::ptr::write_bytes(ptr, value as u8, len) });
//!         frame.release_pins()?;
//!         Ok(1)
//!     })();
//!     finish_or(Os::FillBytes, 0, result)
//! }
//!
//! let mut buffer = ManagedArray::<i8>::new(4);
//! assert_eq!(fill_bytes(&mut buffer, 7), 1);
//! assert_eq!(buffer.as_slice(), &[7, 7, 7, 7]);
//! ```

use crate::dispatch::{dispatch, NativeFunction};
use crate::error::{InteropError, MarshalError, PinError};
use crate::logging::log_call_failure;
use crate::managed::{ManagedBuffer, ManagedObject};
use crate::marshal::{read_struct, write_struct, ArgFlags, NativeStruct};
use crate::pin::{PinMode, PinSet, Release};
use core::ffi::c_void;
use core::mem::MaybeUninit;

/// Per-call state: the function being called and the pins it holds
pub struct CallFrame<'a, F: NativeFunction> {
    function: F,
    pins: PinSet<'a>,
}

impl<'a, F: NativeFunction> CallFrame<'a, F> {
    pub fn new(function: F) -> Self {
        Self {
            function,
            pins: PinSet::new(),
        }
    }

    #[inline]
    pub fn function(&self) -> F {
        self.function
    }

    /// Number of buffers currently pinned
    pub fn pinned(&self) -> usize {
        self.pins.len()
    }

    /// Native copy of a struct argument; `None` for a null argument
    ///
    /// With `NO_IN` the struct starts zeroed instead of being read.
    pub fn struct_arg<T: NativeStruct>(
        &self,
        obj: Option<&dyn ManagedObject>,
        flags: ArgFlags,
    ) -> Result<Option<T>, MarshalError> {
        let Some(obj) = obj else {
            return Ok(None);
        };
        if flags.copies_in() {
            return read_struct(obj).map(Some);
        }
        T::field_cache()?.ensure_cached(obj)?;
        // Safety: all-zero is a valid `T` per the `NativeStruct` contract
        Ok(Some(unsafe { MaybeUninit::<T>::zeroed().assume_init() }))
    }

    /// Pin a buffer argument for the rest of the call; null for `None`
    pub fn pin(
        &mut self,
        buffer: Option<&'a mut dyn ManagedBuffer>,
        mode: PinMode,
        on_release: Release,
    ) -> Result<*mut c_void, PinError> {
        let Some(buffer) = buffer else {
            return Ok(core::ptr::null_mut());
        };
        let index = self.pins.pin(buffer, mode, on_release)?;
        Ok(self.pins.ptr(index))
    }

    /// Run the native call; its result is returned unchanged
    #[inline]
    pub fn invoke<R>(&mut self, call: impl FnOnce() -> R) -> R {
        dispatch(self.function, call)
    }

    /// Release every pin now, newest first
    pub fn release_pins(&mut self) -> Result<(), PinError> {
        self.pins.release_all()
    }

    /// Write a struct argument back after the native call
    ///
    /// Pins are released first so the managed runtime is usable again.
    pub fn struct_result<T: NativeStruct>(
        &mut self,
        value: Option<&T>,
        obj: Option<&mut dyn ManagedObject>,
        flags: ArgFlags,
    ) -> Result<(), InteropError> {
        self.release_pins()?;
        if !flags.copies_out() {
            return Ok(());
        }
        if let (Some(value), Some(obj)) = (value, obj) {
            write_struct(value, obj)?;
        }
        Ok(())
    }
}

impl<F: NativeFunction> core::fmt::Debug for CallFrame<'_, F> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CallFrame")
            .field("function", &self.function.name())
            .field("pinned", &self.pins.len())
            .finish()
    }
}

/// Result of a call, or `sentinel` after logging the failure
pub fn finish_or<F: NativeFunction, R, E: core::fmt::Display>(
    function: F,
    sentinel: R,
    result: Result<R, E>,
) -> R {
    match result {
        Ok(value) => value,
        Err(err) => {
            log_call_failure(function.name(), &err.to_string());
            sentinel
        }
    }
}
