//! Pin sets - several pins for one call, released in reverse order

use super::{pin, PinMode, PinnedBuffer, Release};
use crate::error::PinError;
use crate::managed::ManagedBuffer;
use core::ffi::c_void;
use smallvec::SmallVec;

/// Stack of pins owned by one call site
///
/// Dropping the set releases every pin, most recent first, with each pin's
/// own `Release` policy.
#[derive(Default)]
pub struct PinSet<'a> {
    pins: SmallVec<[PinnedBuffer<'a>; 4]>,
}

impl<'a> PinSet<'a> {
    pub fn new() -> Self {
        Self { pins: SmallVec::new() }
    }

    /// Pin another buffer; returns its index in the set
    pub fn pin(
        &mut self,
        buffer: &'a mut dyn ManagedBuffer,
        mode: PinMode,
        on_drop: Release,
    ) -> Result<usize, PinError> {
        let pinned = pin(buffer, mode, on_drop)?;
        self.pins.push(pinned);
        Ok(self.pins.len() - 1)
    }

    pub fn push(&mut self, pinned: PinnedBuffer<'a>) -> usize {
        self.pins.push(pinned);
        self.pins.len() - 1
    }

    pub fn get(&self, index: usize) -> Option<&PinnedBuffer<'a>> {
        self.pins.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut PinnedBuffer<'a>> {
        self.pins.get_mut(index)
    }

    /// Native pointer of pin `index`, or null when out of range
    pub fn ptr(&mut self, index: usize) -> *mut c_void {
        self.pins
            .get_mut(index)
            .map_or(core::ptr::null_mut(), PinnedBuffer::as_mut_ptr)
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }

    /// Release everything now, in reverse order
    ///
    /// Every pin is released even if an earlier release fails; the first
    /// error is returned.
    pub fn release_all(&mut self) -> Result<(), PinError> {
        self.drain(None)
    }

    /// Release everything now, in reverse order, committing all or none
    ///
    /// Overrides each pin's own `Release` policy.
    pub fn release_all_with(&mut self, commit: bool) -> Result<(), PinError> {
        self.drain(Some(commit))
    }

    fn drain(&mut self, commit: Option<bool>) -> Result<(), PinError> {
        let mut first_error = None;
        while let Some(pinned) = self.pins.pop() {
            let commit = commit.unwrap_or_else(|| pinned.on_drop.commits());
            if let Err(err) = pinned.release(commit) {
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Drop for PinSet<'_> {
    fn drop(&mut self) {
        // SmallVec drops front to back; pop to release newest first
        while let Some(pinned) = self.pins.pop() {
            drop(pinned);
        }
    }
}
