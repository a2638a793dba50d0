//! `native_functions!` - declare the instrumented functions of one native module

/// Declare a module's native functions as a dense slot enum with its own
/// call-counter table
///
/// ```
/// native_bridge::native_functions! {
///     pub enum Gdi in "GDI" {
///         BitBlt,
///         CreateCompatibleDC,
///         DeleteDC,
///     }
/// }
///
/// use native_bridge::dispatch::{self, NativeFunction};
/// assert_eq!(Gdi::COUNT, 3);
/// assert_eq!(Gdi::DeleteDC.index(), 2);
/// let status = dispatch::dispatch(Gdi::BitBlt, || 1);
/// assert_eq!(status, 1);
/// ```
#[macro_export]
macro_rules! native_functions {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident in $module:literal {
            $(
                $(#[$func_meta:meta])*
                $func:ident
            ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(u32)]
        #[allow(non_camel_case_types)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        $vis enum $name {
            $(
                $(#[$func_meta])*
                $func,
            )+
        }

        impl $name {
            pub const MODULE: &'static str = $module;
            pub const COUNT: usize = [$(stringify!($func)),+].len();
            pub const ALL: [Self; Self::COUNT] = [$(Self::$func),+];

            pub fn from_index(index: usize) -> ::core::option::Option<Self> {
                Self::ALL.get(index).copied()
            }
        }

        impl $crate::dispatch::NativeFunction for $name {
            #[inline]
            fn index(self) -> usize {
                self as usize
            }

            fn name(self) -> &'static str {
                match self {
                    $(Self::$func => stringify!($func),)+
                }
            }

            #[inline]
            fn table() -> &'static dyn $crate::dispatch::StatsTable {
                static STATS: $crate::dispatch::NativeStats<{ $name::COUNT }> =
                    $crate::dispatch::NativeStats::new(
                        $crate::__private::cstr(concat!($module, "\0")),
                        [$($crate::__private::cstr(concat!(stringify!($func), "\0"))),+],
                    );
                &STATS
            }
        }
    };
}
