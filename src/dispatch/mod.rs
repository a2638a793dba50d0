//! Call dispatch - per-function call counters for native modules
//!
//! Every wrapped native module declares its functions with
//! `native_functions!`, which produces a dense `#[repr(u32)]` slot enum and
//! a static counter table. Entering a call bumps the slot's counter when
//! the `native-stats` feature is enabled; nothing else about the call
//! changes.
//!
//! The slot order of each module is the index space of the introspection
//! queries (`function_count`, `function_name`, `call_count`).

mod macros;


#[cfg(feature = "native-stats")]
use crate::logging::{log_native_call, trace};
use core::ffi::CStr;
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};

/// One instrumented native function
pub trait NativeFunction: Copy + 'static {
    /// Slot in the module's counter table
    fn index(self) -> usize;

    fn name(self) -> &'static str;

    /// Counter table shared by every function of the module
    fn table() -> &'static dyn StatsTable;
}

/// Read-only view of one module's call counters
pub trait StatsTable: Send + Sync {
    fn module(&self) -> &'static str;

    fn module_cname(&self) -> &'static CStr;

    fn function_count(&self) -> usize;

    fn function_name(&self, index: usize) -> Option<&'static str>;

    fn function_cname(&self, index: usize) -> Option<&'static CStr>;

    fn call_count(&self, index: usize) -> Option<u32>;

    /// Count one call; out-of-range slots are ignored
    fn record(&self, index: usize);

    #[doc(hidden)]
    fn reset(&self);
}

#[allow(clippy::declare_interior_mutable_const)]
const ZERO: AtomicU32 = AtomicU32::new(0);

/// Fixed-size counter table for a module with `N` functions
///
/// Names are stored NUL-terminated so the C surface can hand them out
/// without copying.
pub struct NativeStats<const N: usize> {
    module: &'static CStr,
    names: [&'static CStr; N],
    counts: [AtomicU32; N],
}

impl<const N: usize> NativeStats<N> {
    pub const fn new(module: &'static CStr, names: [&'static CStr; N]) -> Self {
        Self {
            module,
            names,
            counts: [ZERO; N],
        }
    }

    fn counter(&self, index: usize) -> Option<&AtomicU32> {
        self.counts.get(index)
    }
}

impl<const N: usize> StatsTable for NativeStats<N> {
    fn module(&self) -> &'static str {
        self.module.to_str().unwrap_or("")
    }

    fn module_cname(&self) -> &'static CStr {
        self.module
    }

    fn function_count(&self) -> usize {
        N
    }

    fn function_name(&self, index: usize) -> Option<&'static str> {
        self.names.get(index).and_then(|name| name.to_str().ok())
    }

    fn function_cname(&self, index: usize) -> Option<&'static CStr> {
        self.names.get(index).copied()
    }

    fn call_count(&self, index: usize) -> Option<u32> {
        self.counter(index).map(|count| count.load(Ordering::Relaxed))
    }

    #[inline]
    fn record(&self, index: usize) {
        if let Some(count) = self.counter(index) {
            // Wraps like the C int counters external tooling expects
            count.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn reset(&self) {
        for count in &self.counts {
            count.store(0, Ordering::Relaxed);
        }
    }
}

impl<const N: usize> core::fmt::Debug for NativeStats<N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("NativeStats")
            .field("module", &self.module)
            .field("functions", &N)
            .finish()
    }
}

/// Count a call into `func`; empty without the `native-stats` feature
#[inline]
pub fn enter<F: NativeFunction>(func: F) {
    #[cfg(feature = "native-stats")]
    {
        F::table().record(func.index());
        log_native_call(F::table().module(), func.name());
    }
    #[cfg(not(feature = "native-stats"))]
    let _ = func;
}

/// Hook run after the native call returns; counters are not touched
#[inline]
pub fn exit<F: NativeFunction>(func: F) {
    #[cfg(feature = "native-stats")]
    trace!(event = "native_exit", function = func.name());
    #[cfg(not(feature = "native-stats"))]
    let _ = func;
}

/// Scope guard pairing `enter` with `exit`
#[must_use = "the call is exited as soon as the guard is dropped"]
pub struct CallGuard<F: NativeFunction> {
    func: F,
}

impl<F: NativeFunction> CallGuard<F> {
    pub fn new(func: F) -> Self {
        enter(func);
        Self { func }
    }
}

impl<F: NativeFunction> Drop for CallGuard<F> {
    fn drop(&mut self) {
        exit(self.func);
    }
}

/// Run `call` as native function `func`, returning its result unchanged
#[inline]
pub fn dispatch<F: NativeFunction, R>(func: F, call: impl FnOnce() -> R) -> R {
    let _guard = CallGuard::new(func);
    call()
}

/// Global module registry
static MODULES: Lazy<RwLock<Vec<&'static dyn StatsTable>>> = Lazy::new(|| RwLock::new(Vec::new()));

/// Make `table` visible to the introspection queries
///
/// Registering the same module twice is a no-op. Returns the module's index.
pub fn register_module(table: &'static dyn StatsTable) -> usize {
    let mut modules = MODULES.write();
    if let Some(index) = modules.iter().position(|m| m.module() == table.module()) {
        return index;
    }
    modules.push(table);
    modules.len() - 1
}

/// Register the module that declares `F`
pub fn register<F: NativeFunction>() -> usize {
    register_module(F::table())
}

/// Registered modules in registration order
pub fn modules() -> Vec<&'static dyn StatsTable> {
    MODULES.read().clone()
}

pub fn module(index: usize) -> Option<&'static dyn StatsTable> {
    MODULES.read().get(index).copied()
}

pub fn find_module(name: &str) -> Option<&'static dyn StatsTable> {
    MODULES.read().iter().copied().find(|m| m.module() == name)
}

/// Call counts for one function
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionStats {
    pub index: usize,
    pub name: &'static str,
    pub calls: u32,
}

/// Call counts for one module
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleStats {
    pub module: &'static str,
    pub functions: Vec<FunctionStats>,
}

impl ModuleStats {
    pub fn of(table: &dyn StatsTable) -> Self {
        let functions = (0..table.function_count())
            .map(|index| FunctionStats {
                index,
                name: table.function_name(index).unwrap_or(""),
                calls: table.call_count(index).unwrap_or(0),
            })
            .collect();
        Self {
            module: table.module(),
            functions,
        }
    }

    /// Total calls across the module
    pub fn total(&self) -> u64 {
        self.functions.iter().map(|f| f.calls as u64).sum()
    }
}

/// Current counters of every registered module
pub fn snapshot() -> Vec<ModuleStats> {
    modules().into_iter().map(ModuleStats::of).collect()
}

pub fn snapshot_json() -> serde_json::Result<String> {
    serde_json::to_string_pretty(&snapshot())
}

#[doc(hidden)]
pub fn reset() {
    for table in MODULES.read().iter() {
        table.reset();
    }
}
