//! Buffer pinning - stable native pointers into managed bulk buffers
//!
//! Design: scoped acquisition. A `PinnedBuffer` borrows the managed buffer
//! mutably for as long as the pointer is valid, and releases itself on drop
//! if the call site returns early. Two modes:
//! 1. Critical: direct access to the buffer's storage, no runtime calls
//!    allowed on this thread until released
//! 2. Relaxed: the contents are staged in native memory and copied back on
//!    commit
//!
//! A critical request degrades to relaxed when the runtime cannot hand out
//! its storage, critical pins are disabled, or the buffer exceeds the
//! configured limit.

pub mod critical;
mod set;


pub use set::PinSet;

use crate::config;
use crate::error::PinError;
use crate::logging::{log_pin, log_release, warn};
use crate::managed::{ElementKind, ManagedBuffer};
use core::ffi::c_void;
use core::ptr::NonNull;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PinMode {
    Critical,
    Relaxed,
}

/// What an unreleased pin does when it goes out of scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// Copy native-side changes back (in/out parameters)
    Commit,
    /// Drop native-side changes (inputs the native call only reads)
    Discard,
}

impl Release {
    #[inline]
    pub const fn commits(self) -> bool {
        matches!(self, Self::Commit)
    }
}

enum Storage {
    Direct,
    // u64 words keep the staging area aligned for every element kind
    Staged(Vec<u64>),
}

/// Native view of a pinned managed buffer
///
/// With a direct pin the native side writes straight into managed storage,
/// so `commit = false` cannot undo those writes; use it only for buffers the
/// native call does not modify.
#[must_use = "dropping a pin releases it immediately"]
pub struct PinnedBuffer<'a> {
    buffer: &'a mut dyn ManagedBuffer,
    ptr: NonNull<u8>,
    bytes: usize,
    element: ElementKind,
    mode: PinMode,
    storage: Storage,
    on_drop: Release,
    released: bool,
}

/// Pin `buffer` for one native call
pub fn pin<'a>(
    buffer: &'a mut dyn ManagedBuffer,
    mode: PinMode,
    on_drop: Release,
) -> Result<PinnedBuffer<'a>, PinError> {
    let bytes = buffer.byte_len();
    let element = buffer.element_kind();
    let effective = effective_mode(&*buffer, mode, bytes);

    let result = match effective {
        PinMode::Critical => buffer.pin_direct().map(|ptr| {
            critical::enter();
            (ptr, Storage::Direct)
        }),
        PinMode::Relaxed => stage(&mut *buffer, bytes),
    };

    let (ptr, storage) = match result {
        Ok(pinned) => pinned,
        Err(err) => {
            PIN_STATS.failures.fetch_add(1, Ordering::Relaxed);
            warn!(event = "pin_failed", mode = ?effective, bytes, error = %err, "pin failed");
            return Err(err);
        }
    };

    PIN_STATS.record_pin(effective);
    log_pin(effective, bytes);

    Ok(PinnedBuffer {
        buffer,
        ptr,
        bytes,
        element,
        mode: effective,
        storage,
        on_drop,
        released: false,
    })
}

fn effective_mode(buffer: &dyn ManagedBuffer, requested: PinMode, bytes: usize) -> PinMode {
    if requested == PinMode::Relaxed {
        return PinMode::Relaxed;
    }
    let policy = &config::current().pinning;
    if policy.allow_critical && buffer.supports_direct() && bytes <= policy.max_critical_bytes {
        PinMode::Critical
    } else {
        PIN_STATS.fallbacks.fetch_add(1, Ordering::Relaxed);
        PinMode::Relaxed
    }
}

fn stage(buffer: &mut dyn ManagedBuffer, bytes: usize) -> Result<(NonNull<u8>, Storage), PinError> {
    if critical::is_active() {
        return Err(PinError::CriticalRegion { operation: "relaxed pin" });
    }
    let mut words = vec![0u64; bytes.div_ceil(8)];
    // Safety: `words` holds at least `bytes` initialised bytes
    let staging = unsafe { core::slice::from_raw_parts_mut(words.as_mut_ptr() as *mut u8, bytes) };
    buffer.copy_out(staging)?;
    let ptr = NonNull::new(words.as_mut_ptr() as *mut u8).unwrap_or(NonNull::dangling());
    Ok((ptr, Storage::Staged(words)))
}

impl<'a> PinnedBuffer<'a> {
    #[inline]
    pub fn as_ptr(&self) -> *const c_void {
        self.ptr.as_ptr() as *const c_void
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut c_void {
        self.ptr.as_ptr() as *mut c_void
    }

    /// Size of the native view in bytes
    #[inline]
    pub fn byte_len(&self) -> usize {
        self.bytes
    }

    #[inline]
    pub fn element_kind(&self) -> ElementKind {
        self.element
    }

    /// Mode actually in effect, after any fallback
    #[inline]
    pub fn mode(&self) -> PinMode {
        self.mode
    }

    /// Native view as bytes
    pub fn as_bytes(&self) -> &[u8] {
        // Safety: `ptr` covers `bytes` bytes for the lifetime of the pin
        unsafe { core::slice::from_raw_parts(self.ptr.as_ptr(), self.bytes) }
    }

    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        // Safety: see `as_bytes`; `&mut self` gives exclusive access
        unsafe { core::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.bytes) }
    }

    /// Release now; `commit` decides whether staged changes are copied back
    pub fn release(mut self, commit: bool) -> Result<(), PinError> {
        self.release_inner(commit)
    }

    fn release_inner(&mut self, commit: bool) -> Result<(), PinError> {
        if self.released {
            return Ok(());
        }
        self.released = true;
        PIN_STATS.releases.fetch_add(1, Ordering::Relaxed);
        log_release(self.mode, self.bytes, commit);

        match &self.storage {
            Storage::Direct => {
                critical::exit();
                self.buffer.unpin_direct()
            }
            Storage::Staged(words) if commit => {
                // Safety: same region handed out by `stage`
                let staged = unsafe {
                    core::slice::from_raw_parts(words.as_ptr() as *const u8, self.bytes)
                };
                self.buffer.copy_in(staged)
            }
            Storage::Staged(_) => Ok(()),
        }
    }
}

impl Drop for PinnedBuffer<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(err) = self.release_inner(self.on_drop.commits()) {
            warn!(event = "release_failed", mode = ?self.mode, error = %err, "implicit release failed");
        }
    }
}

impl core::fmt::Debug for PinnedBuffer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PinnedBuffer")
            .field("ptr", &self.ptr)
            .field("bytes", &self.bytes)
            .field("mode", &self.mode)
            .field("released", &self.released)
            .finish()
    }
}

static PIN_STATS: Lazy<PinCounters> = Lazy::new(PinCounters::default);

#[derive(Default)]
struct PinCounters {
    critical: AtomicU64,
    relaxed: AtomicU64,
    fallbacks: AtomicU64,
    releases: AtomicU64,
    failures: AtomicU64,
}

impl PinCounters {
    #[inline]
    fn record_pin(&self, mode: PinMode) {
        match mode {
            PinMode::Critical => self.critical.fetch_add(1, Ordering::Relaxed),
            PinMode::Relaxed => self.relaxed.fetch_add(1, Ordering::Relaxed),
        };
    }
}

/// Process-wide pin accounting, for leak diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PinStats {
    pub critical_pins: u64,
    pub relaxed_pins: u64,
    pub fallbacks: u64,
    pub releases: u64,
    pub failures: u64,
}

impl PinStats {
    /// Pins acquired but not yet released
    pub fn live(&self) -> u64 {
        (self.critical_pins + self.relaxed_pins).saturating_sub(self.releases)
    }
}

pub fn stats() -> PinStats {
    PinStats {
        critical_pins: PIN_STATS.critical.load(Ordering::Relaxed),
        relaxed_pins: PIN_STATS.relaxed.load(Ordering::Relaxed),
        fallbacks: PIN_STATS.fallbacks.load(Ordering::Relaxed),
        releases: PIN_STATS.releases.load(Ordering::Relaxed),
        failures: PIN_STATS.failures.load(Ordering::Relaxed),
    }
}
