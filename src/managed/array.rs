//! Managed arrays - reference implementation of `ManagedBuffer`

use super::{ElementKind, ManagedBuffer};
use crate::error::PinError;
use crate::pin::PinMode;
use core::ptr::NonNull;

/// Primitive element stored in a managed array
///
/// # Safety
/// Every bit pattern of `size_of::<Self>()` bytes must be a valid value
/// and the size must equal `KIND.width()`.
pub unsafe trait Element: Copy + Default + 'static {
    const KIND: ElementKind;
}

unsafe impl Element for i8 {
    const KIND: ElementKind = ElementKind::Byte;
}
unsafe impl Element for u16 {
    const KIND: ElementKind = ElementKind::Char;
}
unsafe impl Element for i16 {
    const KIND: ElementKind = ElementKind::Short;
}
unsafe impl Element for i32 {
    const KIND: ElementKind = ElementKind::Int;
}
unsafe impl Element for i64 {
    const KIND: ElementKind = ElementKind::Long;
}
unsafe impl Element for f32 {
    const KIND: ElementKind = ElementKind::Float;
}
unsafe impl Element for f64 {
    const KIND: ElementKind = ElementKind::Double;
}

/// Pin traffic observed by one array
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PinEvents {
    pub direct_pins: usize,
    pub direct_unpins: usize,
    pub copies_out: usize,
    pub copies_in: usize,
}

/// Growable managed array with pin bookkeeping
#[derive(Debug, Clone)]
pub struct ManagedArray<T: Element> {
    data: Vec<T>,
    pinned: bool,
    direct_limit: Option<usize>,
    direct_supported: bool,
    events: PinEvents,
}

impl<T: Element> ManagedArray<T> {
    pub fn new(len: usize) -> Self {
        Self::from_vec(vec![T::default(); len])
    }

    pub fn from_vec(data: Vec<T>) -> Self {
        Self {
            data,
            pinned: false,
            direct_limit: None,
            direct_supported: true,
            events: PinEvents::default(),
        }
    }

    /// Refuse direct pins of more than `bytes`
    pub fn with_direct_limit(mut self, bytes: usize) -> Self {
        self.direct_limit = Some(bytes);
        self
    }

    /// Act like a runtime without direct access to array storage
    pub fn without_direct(mut self) -> Self {
        self.direct_supported = false;
        self
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable access from managed code; refused while the storage is lent out
    pub fn as_mut_slice(&mut self) -> Option<&mut [T]> {
        (!self.pinned).then_some(self.data.as_mut_slice())
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    pub fn events(&self) -> PinEvents {
        self.events
    }

    fn bytes(&self) -> &[u8] {
        // Safety: `T: Element` has no padding and no invalid bit patterns
        unsafe {
            core::slice::from_raw_parts(self.data.as_ptr() as *const u8, self.byte_len())
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        let len = self.byte_len();
        // Safety: see `bytes`
        unsafe { core::slice::from_raw_parts_mut(self.data.as_mut_ptr() as *mut u8, len) }
    }
}

impl<T: Element> ManagedBuffer for ManagedArray<T> {
    fn element_kind(&self) -> ElementKind {
        T::KIND
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn supports_direct(&self) -> bool {
        self.direct_supported
    }

    fn pin_direct(&mut self) -> Result<NonNull<u8>, PinError> {
        if self.pinned {
            return Err(PinError::AlreadyPinned { mode: PinMode::Critical });
        }
        let bytes = self.byte_len();
        if let Some(limit) = self.direct_limit {
            if bytes > limit {
                return Err(PinError::TooLarge { bytes, limit });
            }
        }
        self.pinned = true;
        self.events.direct_pins += 1;
        Ok(NonNull::new(self.data.as_mut_ptr() as *mut u8).unwrap_or(NonNull::dangling()))
    }

    fn unpin_direct(&mut self) -> Result<(), PinError> {
        if !self.pinned {
            return Err(PinError::NotPinned);
        }
        self.pinned = false;
        self.events.direct_unpins += 1;
        Ok(())
    }

    fn copy_out(&mut self, dst: &mut [u8]) -> Result<(), PinError> {
        if self.pinned {
            return Err(PinError::AlreadyPinned { mode: PinMode::Critical });
        }
        if dst.len() != self.byte_len() {
            return Err(PinError::SizeMismatch {
                expected: self.byte_len(),
                got: dst.len(),
            });
        }
        dst.copy_from_slice(self.bytes());
        self.events.copies_out += 1;
        Ok(())
    }

    fn copy_in(&mut self, src: &[u8]) -> Result<(), PinError> {
        if self.pinned {
            return Err(PinError::AlreadyPinned { mode: PinMode::Critical });
        }
        if src.len() != self.byte_len() {
            return Err(PinError::SizeMismatch {
                expected: self.byte_len(),
                got: src.len(),
            });
        }
        self.bytes_mut().copy_from_slice(src);
        self.events.copies_in += 1;
        Ok(())
    }
}

impl<T: Element> From<Vec<T>> for ManagedArray<T> {
    fn from(data: Vec<T>) -> Self {
        Self::from_vec(data)
    }
}
