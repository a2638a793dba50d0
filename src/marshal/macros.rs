//! `native_struct!` - declare a `#[repr(C)]` struct together with its descriptor

/// Declare a native struct and implement [`NativeStruct`](crate::marshal::NativeStruct) for it
///
/// Each field names the managed kind that carries it and its native kind:
///
/// ```
/// native_bridge::native_struct! {
///     /// Window rectangle
///     pub struct Rect as "RECT" {
///         pub left: i32 => Int as I32,
///         pub top: i32 => Int as I32,
///         pub right: i32 => Int as I32,
///         pub bottom: i32 => Int as I32,
///     }
/// }
///
/// use native_bridge::marshal::NativeStruct;
/// assert_eq!(Rect::descriptor().size, 16);
/// ```
///
/// Field types must implement [`NativeField`](crate::marshal::NativeField)
/// with exactly the native kind's width; anything else fails to compile:
///
/// ```compile_fail
/// native_bridge::native_struct! {
///     struct Narrow as "NARROW" {
///         a: u8 => Int as I32,
///     }
/// }
/// ```
///
/// ```compile_fail
/// native_bridge::native_struct! {
///     struct Flagged as "FLAGGED" {
///         flag: bool => Int as U8,
///     }
/// }
/// ```
///
/// ```compile_fail
/// native_bridge::native_struct! {
///     struct Labelled as "LABELLED" {
///         label: &'static str => Long as I64,
///     }
/// }
/// ```
#[macro_export]
macro_rules! native_struct {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident as $native_name:literal {
            $(
                $(#[$field_meta:meta])*
                $field_vis:vis $field:ident : $ty:ty => $managed:ident as $native:ident
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(C)]
        #[derive(Debug, Clone, Copy, Default, PartialEq)]
        $vis struct $name {
            $(
                $(#[$field_meta])*
                $field_vis $field: $ty,
            )*
        }

        const _: () = {
            $(
                assert!(
                    $crate::marshal::NativeKind::$native.holds::<$ty>(),
                    "native_struct! field type does not match its native kind",
                );
            )*
        };

        unsafe impl $crate::marshal::NativeStruct for $name {
            fn descriptor() -> &'static $crate::marshal::StructDescriptor {
                static DESCRIPTOR: $crate::marshal::StructDescriptor = $crate::marshal::StructDescriptor {
                    name: $native_name,
                    size: ::core::mem::size_of::<$name>(),
                    align: ::core::mem::align_of::<$name>(),
                    parent: None,
                    fields: &[
                        $(
                            $crate::marshal::FieldDescriptor::direct(
                                stringify!($field),
                                $crate::managed::ManagedKind::$managed,
                                $crate::marshal::NativeKind::$native,
                                ::core::mem::offset_of!($name, $field),
                            ),
                        )*
                    ],
                    cache: $crate::marshal::CacheSlot::new(),
                };
                &DESCRIPTOR
            }
        }
    };
}
