//! Introspection - C API over the call-count tables
//!
//! Module indices follow registration order; function indices are the
//! module's slot numbers.

use super::to_index;
use crate::dispatch::{self, StatsTable};
use crate::pin;
use core::ffi::c_char;
use std::ffi::{CStr, CString};

fn table(module: i32) -> Option<&'static dyn StatsTable> {
    dispatch::module(to_index(module)?)
}

/// Number of registered modules
#[no_mangle]
pub extern "C" fn native_bridge_module_count() -> i32 {
    dispatch::modules().len() as i32
}

/// NUL-terminated module name, or null
#[no_mangle]
pub extern "C" fn native_bridge_module_name(module: i32) -> *const c_char {
    table(module).map_or(core::ptr::null(), |t| t.module_cname().as_ptr())
}

/// Index of the module called `name`, or -1
///
/// # Safety
/// `name` must be null or a valid NUL-terminated string.
#[no_mangle]
pub unsafe extern "C" fn native_bridge_find_module(name: *const c_char) -> i32 {
    if name.is_null() {
        return -1;
    }
    let Ok(name) = CStr::from_ptr(name).to_str() else {
        return -1;
    };
    dispatch::modules()
        .iter()
        .position(|t| t.module() == name)
        .map_or(-1, |index| index as i32)
}

/// Number of instrumented functions in `module`, or -1
#[no_mangle]
pub extern "C" fn native_bridge_function_count(module: i32) -> i32 {
    table(module).map_or(-1, |t| t.function_count() as i32)
}

/// NUL-terminated name of function `index`, or null
#[no_mangle]
pub extern "C" fn native_bridge_function_name(module: i32, index: i32) -> *const c_char {
    table(module)
        .zip(to_index(index))
        .and_then(|(t, i)| t.function_cname(i))
        .map_or(core::ptr::null(), CStr::as_ptr)
}

/// Calls made to function `index` so far, or -1
#[no_mangle]
pub extern "C" fn native_bridge_call_count(module: i32, index: i32) -> i32 {
    table(module)
        .zip(to_index(index))
        .and_then(|(t, i)| t.call_count(i))
        .map_or(-1, |count| count as i32)
}

/// Pins acquired and not yet released, process-wide
#[no_mangle]
pub extern "C" fn native_bridge_live_pins() -> u64 {
    pin::stats().live()
}

/// JSON snapshot of every module's counters
///
/// The caller owns the string and frees it with `native_bridge_string_free`.
/// Returns null if serialisation fails.
#[no_mangle]
pub extern "C" fn native_bridge_stats_json() -> *mut c_char {
    dispatch::snapshot_json()
        .ok()
        .and_then(|json| CString::new(json).ok())
        .map_or(core::ptr::null_mut(), CString::into_raw)
}

/// Free a string returned by this library
///
/// # Safety
/// `ptr` must be null or come from `native_bridge_stats_json`, and must not
/// be used afterwards.
#[no_mangle]
pub unsafe extern "C" fn native_bridge_string_free(ptr: *mut c_char) {
    if ptr.is_null() {
        return;
    }
    drop(CString::from_raw(ptr));
}
