//! Per-thread critical region tracking
//!
//! While a direct pin is held the thread must not call back into the
//! managed runtime. The depth counter lets every runtime-touching operation
//! refuse instead of corrupting the pin.

use std::cell::Cell;

thread_local! {
    static DEPTH: Cell<usize> = const { Cell::new(0) };
}

#[inline]
pub(crate) fn enter() {
    DEPTH.with(|d| d.set(d.get() + 1));
}

#[inline]
pub(crate) fn exit() {
    DEPTH.with(|d| d.set(d.get().saturating_sub(1)));
}

/// Number of direct pins currently held by this thread
#[inline]
pub fn depth() -> usize {
    DEPTH.with(Cell::get)
}

#[inline]
pub fn is_active() -> bool {
    depth() != 0
}
