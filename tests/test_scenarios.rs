use native_bridge::dispatch::{self, NativeFunction};
use native_bridge::ffi;
use native_bridge::managed::{DynClass, DynObject, ManagedArray, ManagedKind, ManagedValue};
use native_bridge::marshal::{self, NativeStruct};
use native_bridge::pin::{self, PinMode, Release};
use std::ffi::CStr;

native_bridge::native_struct! {
    struct Point as "POINT" {
        x: i32 => Int as I32,
        y: i32 => Int as I32,
    }
}

native_bridge::native_functions! {
    enum Gdi in "GDI" {
        Arc,
        BitBlt,
        CreatePen,
        DeleteDC,
        Ellipse,
        FillRect,
        GetPixel,
        LineTo,
    }
}

/// Stand-in for a native call that moves a point
fn offset_point(point: &mut Point) {
    point.x = 100;
}

#[test]
fn test_point_marshaled_both_ways() {
    let class = DynClass::builder("Point")
        .field("x", ManagedKind::Int)
        .field("y", ManagedKind::Int)
        .build();
    let mut obj = DynObject::new(&class)
        .with("x", ManagedValue::Int(12))
        .with("y", ManagedValue::Int(-7));

    let mut bytes = [0u8; 8];
    marshal::read_into_native(Point::descriptor(), &obj, &mut bytes).unwrap();
    assert_eq!(&bytes[0..4], &12i32.to_ne_bytes());
    assert_eq!(&bytes[4..8], &(-7i32).to_ne_bytes());

    let mut native: Point = marshal::read_struct(&obj).unwrap();
    offset_point(&mut native);
    marshal::write_struct(&native, &mut obj).unwrap();

    assert_eq!(obj.get("x"), Some(ManagedValue::Int(100)));
    assert_eq!(obj.get("y"), Some(ManagedValue::Int(-7)));
    assert_eq!(Point::field_cache().unwrap().resolutions(), 1);
}

#[test]
fn test_critical_pin_without_commit_leaves_buffer_unchanged() {
    let original: Vec<i8> = (0..1024).map(|i| (i % 251) as i8).collect();
    let mut buffer = ManagedArray::from_vec(original.clone());

    let pinned = pin::pin(&mut buffer, PinMode::Critical, Release::Commit).unwrap();
    assert_eq!(pinned.mode(), PinMode::Critical);
    assert_eq!(pinned.byte_len(), 1024);
    let ptr = pinned.as_ptr();
    // No-op native call
    let _ = std::hint::black_box(ptr);
    pinned.release(false).unwrap();

    assert!(!buffer.is_pinned());
    assert_eq!(buffer.as_slice(), original.as_slice());
    let events = buffer.events();
    assert_eq!((events.direct_pins, events.direct_unpins), (1, 1));
}

#[test]
#[cfg(feature = "native-stats")]
fn test_call_counts_through_introspection() {
    let module = dispatch::register::<Gdi>() as i32;

    let function = Gdi::from_index(5).unwrap();
    for _ in 0..3 {
        dispatch::dispatch(function, || ());
    }

    assert_eq!(ffi::native_bridge_function_count(module), 8);
    let name = unsafe { CStr::from_ptr(ffi::native_bridge_function_name(module, 5)) };
    assert_eq!(name.to_str().unwrap(), function.name());
    for index in 0..8 {
        let expected = if index == 5 { 3 } else { 0 };
        assert_eq!(ffi::native_bridge_call_count(module, index), expected, "slot {}", index);
    }
}
