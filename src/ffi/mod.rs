//! C FFI - stable ABI for external tooling
//!
//! Design: plain `extern "C"` functions over the dispatch registry:
//! 1. Initialisation (config + logging)
//! 2. Call-count introspection (module, function name, call count)
//! 3. Pin accounting for leak checks
//!
//! Indices out of range yield -1 or a null pointer; nothing here panics
//! across the boundary.

mod stats;

pub use stats::{
    native_bridge_call_count, native_bridge_find_module, native_bridge_function_count,
    native_bridge_function_name, native_bridge_live_pins, native_bridge_module_count,
    native_bridge_module_name, native_bridge_stats_json, native_bridge_string_free,
};

use crate::logging::{debug, error};

/// Load configuration from the environment and start logging
///
/// Returns 0 on success (including repeated calls) and -1 when the
/// environment holds an invalid setting.
#[no_mangle]
pub extern "C" fn native_bridge_init() -> i32 {
    match crate::init() {
        Ok(()) => {
            debug!("native bridge ready");
            0
        }
        Err(err) => {
            error!(error = %err, "native bridge initialisation failed");
            -1
        }
    }
}

/// Index argument from C, if non-negative
#[inline(always)]
pub(crate) fn to_index(value: i32) -> Option<usize> {
    usize::try_from(value).ok()
}
