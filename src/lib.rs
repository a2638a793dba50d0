//! native-bridge - marshaling core for managed ↔ native call shims
//!
//! Architecture:
//! - `handle` - pointer-width native handles
//! - `managed` - traits the embedding runtime implements, plus an in-process model
//! - `marshal` - struct descriptors, cached field accessors, two-phase copies
//! - `pin` - scoped buffer pinning (critical or relaxed)
//! - `dispatch` - per-function call counters and their registry
//! - `vtable` - method calls through an opaque object's function table
//! - `shim` - `CallFrame`, composing the above around one native call
//! - `ffi` - C ABI for introspection
//!
//! Ambient: `config`, `logging`, `error`.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod ffi;
pub mod handle;
pub mod logging;
pub mod managed;
pub mod marshal;
pub mod pin;
pub mod shim;
pub mod vtable;

pub use config::InteropConfig;
pub use dispatch::{dispatch, CallGuard, NativeFunction, NativeStats, StatsTable};
pub use error::{ConfigError, DescriptorError, InteropError, MarshalError, PinError, Result};
pub use handle::{Handle, NativeHandle, NativeWord};
pub use managed::{ManagedBuffer, ManagedClass, ManagedKind, ManagedObject, ManagedValue};
pub use marshal::{read_struct, write_struct, ArgFlags, NativeStruct, StructDescriptor};
pub use pin::{PinMode, PinSet, PinnedBuffer, Release};
pub use shim::{finish_or, CallFrame};
pub use vtable::{ComPtr, VtblMethod, VtblSlot};

use logging::{info, LogConfig};

/// Load configuration from the environment and start logging
///
/// Safe to call more than once; only the first call installs anything.
pub fn init() -> std::result::Result<(), ConfigError> {
    let config = InteropConfig::from_env()?;
    logging::init_with_config(LogConfig::from(&config.logging));

    match config::install(config) {
        Ok(()) => {
            let pinning = &config::current().pinning;
            info!(
                allow_critical = pinning.allow_critical,
                max_critical_bytes = pinning.max_critical_bytes,
                "native bridge initialised"
            );
            Ok(())
        }
        Err(ConfigError::AlreadyInstalled) => Ok(()),
        Err(err) => Err(err),
    }
}

#[doc(hidden)]
pub mod __private {
    /// NUL-terminated literal as a `CStr`, checked at compile time
    pub const fn cstr(s: &'static str) -> &'static core::ffi::CStr {
        match core::ffi::CStr::from_bytes_with_nul(s.as_bytes()) {
            Ok(c) => c,
            Err(_) => panic!("name must end in a single NUL"),
        }
    }
}
