//! Tests for struct marshaling and the field-accessor cache
//!
//! The accessor registry is process-wide, so every test declares its own
//! struct kind and shares one class per kind.

use super::*;
use crate::error::{AccessError, MarshalError};
use crate::managed::{DynClass, DynObject, ManagedArray, ManagedClass, ManagedKind, ManagedValue};
use crate::pin::{self, PinMode, Release};
use core::mem::{align_of, offset_of, size_of};
use once_cell::sync::Lazy;
use proptest::prelude::*;
use std::sync::Arc;
use std::thread;

crate::native_struct! {
    struct Point as "TEST_POINT" {
        x: i32 => Int as I32,
        y: i32 => Int as I32,
    }
}

static POINT_CLASS: Lazy<Arc<DynClass>> = Lazy::new(|| {
    DynClass::builder("Point")
        .field("x", ManagedKind::Int)
        .field("y", ManagedKind::Int)
        .build()
});

fn point(x: i32, y: i32) -> DynObject {
    DynObject::new(&POINT_CLASS)
        .with("x", ManagedValue::Int(x))
        .with("y", ManagedValue::Int(y))
}

#[test]
fn test_point_round_trip() {
    let mut obj = point(12, -7);

    let mut native: Point = read_struct(&obj).unwrap();
    assert_eq!(native, Point { x: 12, y: -7 });

    // Native code updates one field
    native.x = 100;
    write_struct(&native, &mut obj).unwrap();

    assert_eq!(obj.get("x"), Some(ManagedValue::Int(100)));
    assert_eq!(obj.get("y"), Some(ManagedValue::Int(-7)));
}

#[test]
fn test_byte_level_round_trip() {
    let obj = point(1, 2);
    let mut bytes = [0u8; 8];
    read_into_native(Point::descriptor(), &obj, &mut bytes).unwrap();
    assert_eq!(&bytes[..4], &1i32.to_ne_bytes());
    assert_eq!(&bytes[4..], &2i32.to_ne_bytes());

    bytes[4..].copy_from_slice(&(-5i32).to_ne_bytes());
    let mut target = point(0, 0);
    write_from_native(Point::descriptor(), &bytes, &mut target).unwrap();
    assert_eq!(target.get("y"), Some(ManagedValue::Int(-5)));
}

#[test]
fn test_buffer_too_small() {
    let obj = point(1, 2);
    let mut bytes = [0u8; 4];
    let err = read_into_native(Point::descriptor(), &obj, &mut bytes).unwrap_err();
    assert!(matches!(err, MarshalError::BufferTooSmall { needed: 8, got: 4, .. }));
}

#[test]
fn test_raw_moves() {
    let mut obj = point(3, 4);
    let mut native = Point::default();
    unsafe {
        move_to_native(&obj, &mut native).unwrap();
    }
    assert_eq!(native, Point { x: 3, y: 4 });

    native.y = 40;
    unsafe {
        move_from_native(&native, &mut obj).unwrap();
    }
    assert_eq!(obj.get("y"), Some(ManagedValue::Int(40)));
}

crate::native_struct! {
    struct Size as "TEST_IDEMPOTENT" {
        cx: i32 => Int as I32,
        cy: i32 => Int as I32,
    }
}

#[test]
fn test_cache_resolves_once() {
    let class = DynClass::builder("Size")
        .field("cx", ManagedKind::Int)
        .field("cy", ManagedKind::Int)
        .build();
    let obj = DynObject::new(&class).with("cx", ManagedValue::Int(640));

    let cache = Size::field_cache().unwrap();
    assert!(!cache.is_cached());

    for _ in 0..100 {
        let size: Size = read_struct(&obj).unwrap();
        assert_eq!(size.cx, 640);
    }

    assert!(cache.is_cached());
    assert_eq!(cache.resolutions(), 1);
    // One by-name lookup per field, all during the first call
    assert_eq!(class.lookups(), 2);
    assert!(registered().contains(&"TEST_IDEMPOTENT"));
}

crate::native_struct! {
    struct Pair as "TEST_MISSING_FIELD" {
        first: i32 => Int as I32,
        second: i32 => Int as I32,
    }
}

#[test]
fn test_missing_field_fails_fast() {
    let class = DynClass::builder("Half").field("first", ManagedKind::Int).build();
    let obj = DynObject::new(&class);

    let mut bytes = [0xaau8; 8];
    let err = read_into_native(Pair::descriptor(), &obj, &mut bytes).unwrap_err();
    match err {
        MarshalError::FieldResolution { structure, field, kind, class } => {
            assert_eq!(structure, "TEST_MISSING_FIELD");
            assert_eq!(field, "second");
            assert_eq!(kind, ManagedKind::Int);
            assert_eq!(class, "Half");
        }
        other => panic!("unexpected error: {}", other),
    }
    // Native side untouched, nothing published
    assert_eq!(bytes, [0xaa; 8]);
    let cache = Pair::field_cache().unwrap();
    assert!(!cache.is_cached());

    // The next call retries resolution from scratch
    assert!(read_struct::<Pair>(&obj).is_err());
    assert_eq!(cache.resolutions(), 2);
}

crate::native_struct! {
    struct Typed as "TEST_WRONG_KIND" {
        value: i32 => Int as I32,
    }
}

#[test]
fn test_field_kind_mismatch_is_resolution_failure() {
    let class = DynClass::builder("Typed").field("value", ManagedKind::Long).build();
    let obj = DynObject::new(&class);
    let err = read_struct::<Typed>(&obj).unwrap_err();
    assert!(matches!(err, MarshalError::FieldResolution { field: "value", .. }));
}

crate::native_struct! {
    struct Guarded as "TEST_GUARDED" {
        tag: i32 => Int as I32,
    }
}

#[test]
fn test_class_mismatch() {
    let base = DynClass::builder("Widget").field("tag", ManagedKind::Int).build();
    let derived = DynClass::builder("Button").extends(&base).build();
    let stranger = DynClass::builder("Stranger").field("tag", ManagedKind::Int).build();

    read_struct::<Guarded>(&DynObject::new(&base).with("tag", ManagedValue::Int(1))).unwrap();

    // Subclass instances reuse the base class tokens
    let button = DynObject::new(&derived).with("tag", ManagedValue::Int(9));
    assert_eq!(read_struct::<Guarded>(&button).unwrap().tag, 9);

    let err = read_struct::<Guarded>(&DynObject::new(&stranger)).unwrap_err();
    match err {
        MarshalError::ClassMismatch { cached, found, .. } => {
            assert_eq!(cached, "Widget");
            assert_eq!(found, "Stranger");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Stamp {
    id: i32,
    flags: u16,
    ticks: i64,
    ratio: f32,
    scale: f64,
}

static STAMP: StructDescriptor = StructDescriptor {
    name: "TEST_STAMP",
    size: size_of::<Stamp>(),
    align: align_of::<Stamp>(),
    parent: None,
    fields: &[
        FieldDescriptor::direct("id", ManagedKind::Int, NativeKind::I32, offset_of!(Stamp, id)),
        FieldDescriptor::direct("flags", ManagedKind::Int, NativeKind::U16, offset_of!(Stamp, flags)),
        FieldDescriptor::split("ticksLow", "ticksHigh", NativeKind::I64, offset_of!(Stamp, ticks)),
        FieldDescriptor::direct("ratio", ManagedKind::Float, NativeKind::F32, offset_of!(Stamp, ratio)),
        FieldDescriptor::direct("scale", ManagedKind::Double, NativeKind::F64, offset_of!(Stamp, scale)),
    ],    cache: CacheSlot::new(),
};

unsafe impl NativeStruct for Stamp {
    fn descriptor() -> &'static StructDescriptor {
        &STAMP
    }
}

static STAMP_CLASS: Lazy<Arc<DynClass>> = Lazy::new(|| {
    DynClass::builder("Stamp")
        .field("id", ManagedKind::Int)
        .field("flags", ManagedKind::Int)
        .field("ticksLow", ManagedKind::Int)
        .field("ticksHigh", ManagedKind::Int)
        .field("ratio", ManagedKind::Float)
        .field("scale", ManagedKind::Double)
        .build()
});

#[test]
fn test_split_and_mixed_fields() {
    let ticks = 0x0123_4567_89ab_cdefi64;
    let mut obj = DynObject::new(&STAMP_CLASS)
        .with("id", ManagedValue::Int(-3))
        .with("flags", ManagedValue::Int(0x1_ffff))
        .with("ticksLow", ManagedValue::Int(ticks as i32))
        .with("ticksHigh", ManagedValue::Int((ticks >> 32) as i32))
        .with("ratio", ManagedValue::Float(0.25))
        .with("scale", ManagedValue::Double(-1.5e300));

    let mut stamp: Stamp = read_struct(&obj).unwrap();
    assert_eq!(stamp.id, -3);
    // Narrowed to 16 bits
    assert_eq!(stamp.flags, 0xffff);
    assert_eq!(stamp.ticks, ticks);
    assert_eq!(stamp.ratio, 0.25);
    assert_eq!(stamp.scale, -1.5e300);

    stamp.ticks = -2;
    write_struct(&stamp, &mut obj).unwrap();
    assert_eq!(obj.get("ticksLow"), Some(ManagedValue::Int(-2)));
    assert_eq!(obj.get("ticksHigh"), Some(ManagedValue::Int(-1)));
    // Unsigned native field zero-extends on the way back
    assert_eq!(obj.get("flags"), Some(ManagedValue::Int(0xffff)));
}

/// Object whose runtime hands back the wrong kind for one field
struct Mislabeled {
    inner: DynObject,
    field: FieldId,
    value: ManagedValue,
}

impl ManagedObject for Mislabeled {
    fn class(&self) -> &dyn ManagedClass {
        self.inner.class()
    }

    fn get_field(&self, field: FieldId, kind: ManagedKind) -> Result<ManagedValue, AccessError> {
        if field == self.field {
            return Ok(self.value);
        }
        self.inner.get_field(field, kind)
    }

    fn set_field(&mut self, field: FieldId, value: ManagedValue) -> Result<(), AccessError> {
        self.inner.set_field(field, value)
    }
}

fn mislabeled(field: &str, value: ManagedValue) -> Mislabeled {
    let inner = DynObject::new(&STAMP_CLASS)
        .with("id", ManagedValue::Int(1))
        .with("ticksLow", ManagedValue::Int(2))
        .with("ticksHigh", ManagedValue::Int(3));
    Mislabeled {
        inner,
        field: STAMP_CLASS.resolve_field(field, ManagedKind::Int).unwrap(),
        value,
    }
}

#[test]
fn test_wrong_value_kind_aborts_before_writing() {
    let obj = mislabeled("id", ManagedValue::Float(2.5));
    let mut bytes = [0xaau8; size_of::<Stamp>()];

    let err = read_into_native(&STAMP, &obj, &mut bytes).unwrap_err();

    match err {
        MarshalError::FieldAccess {
            field: "id",
            source: AccessError::KindMismatch { expected, found, .. },
            ..
        } => {
            assert_eq!(expected, ManagedKind::Int);
            assert_eq!(found, ManagedKind::Float);
        }
        other => panic!("unexpected {:?}", other),
    }
    assert!(bytes.iter().all(|&b| b == 0xaa));
}

#[test]
fn test_wrong_split_half_kind_is_an_error() {
    let obj = mislabeled("ticksHigh", ManagedValue::Long(3));
    let err = read_struct::<Stamp>(&obj).unwrap_err();
    assert!(matches!(
        err,
        MarshalError::FieldAccess {
            field: "ticksHigh",
            source: AccessError::KindMismatch { found: ManagedKind::Long, .. },
            ..
        }
    ));
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct Header {
    kind: u32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
struct Extent {
    header: Header,
    width: i16,
    height: i16,
}

static HEADER: StructDescriptor = StructDescriptor {
    name: "TEST_HEADER",
    size: size_of::<Header>(),
    align: align_of::<Header>(),
    parent: None,
    fields: &[FieldDescriptor::direct("kind", ManagedKind::Int, NativeKind::U32, offset_of!(Header, kind))],    cache: CacheSlot::new(),
};

static EXTENT: StructDescriptor = StructDescriptor {
    name: "TEST_EXTENT",
    size: size_of::<Extent>(),
    align: align_of::<Extent>(),
    parent: Some(&HEADER),
    fields: &[
        FieldDescriptor::direct("width", ManagedKind::Short, NativeKind::I16, offset_of!(Extent, width)),
        FieldDescriptor::direct("height", ManagedKind::Short, NativeKind::I16, offset_of!(Extent, height)),
    ],    cache: CacheSlot::new(),
};

unsafe impl NativeStruct for Extent {
    fn descriptor() -> &'static StructDescriptor {
        &EXTENT
    }
}

#[test]
fn test_parent_fields_come_first() {
    let header = DynClass::builder("Header").field("kind", ManagedKind::Int).build();
    let extent = DynClass::builder("Extent")
        .extends(&header)
        .field("width", ManagedKind::Short)
        .field("height", ManagedKind::Short)
        .build();
    let obj = DynObject::new(&extent)
        .with("kind", ManagedValue::Int(7))
        .with("width", ManagedValue::Short(320))
        .with("height", ManagedValue::Short(200));

    let names: Vec<_> = EXTENT.all_fields().map(FieldDescriptor::name).collect();
    assert_eq!(names, ["kind", "width", "height"]);
    assert_eq!(EXTENT.accessor_count(), 3);

    let native: Extent = read_struct(&obj).unwrap();
    assert_eq!(native.header.kind, 7);
    assert_eq!((native.width, native.height), (320, 200));
}

static OVERLAPPING: StructDescriptor = StructDescriptor {
    name: "TEST_OVERLAPPING",
    size: 8,
    align: 4,
    parent: None,
    fields: &[
        FieldDescriptor::direct("a", ManagedKind::Int, NativeKind::I32, 0),
        FieldDescriptor::direct("b", ManagedKind::Int, NativeKind::I32, 2),
    ],    cache: CacheSlot::new(),
};

static OUT_OF_BOUNDS: StructDescriptor = StructDescriptor {
    name: "TEST_OUT_OF_BOUNDS",
    size: 4,
    align: 4,
    parent: None,
    fields: &[FieldDescriptor::direct("wide", ManagedKind::Long, NativeKind::I64, 0)],    cache: CacheSlot::new(),
};

static FLOAT_WIDENING: StructDescriptor = StructDescriptor {
    name: "TEST_FLOAT_WIDENING",
    size: 8,
    align: 8,
    parent: None,
    fields: &[FieldDescriptor::direct("value", ManagedKind::Float, NativeKind::F64, 0)],    cache: CacheSlot::new(),
};

static SMALL_CHILD: StructDescriptor = StructDescriptor {
    name: "TEST_SMALL_CHILD",
    size: 2,
    align: 2,
    parent: Some(&HEADER),
    fields: &[],    cache: CacheSlot::new(),
};

#[test]
fn test_invalid_descriptors_rejected() {
    assert!(matches!(
        cache_for(&OVERLAPPING),
        Err(DescriptorError::Overlap { first: "a", second: "b", .. })
    ));
    assert!(matches!(
        cache_for(&OUT_OF_BOUNDS),
        Err(DescriptorError::FieldOutOfBounds { end: 8, size: 4, .. })
    ));
    assert!(matches!(
        cache_for(&FLOAT_WIDENING),
        Err(DescriptorError::IncompatibleKinds { field: "value", .. })
    ));
    assert!(matches!(
        cache_for(&SMALL_CHILD),
        Err(DescriptorError::ParentTooLarge { parent: "TEST_HEADER", .. })
    ));

    let names = registered();
    assert!(!names.contains(&"TEST_OVERLAPPING"));
    assert!(!names.contains(&"TEST_FLOAT_WIDENING"));
}

static POINT_IMPOSTER: StructDescriptor = StructDescriptor {
    name: "TEST_POINT",
    size: 8,
    align: 4,
    parent: None,
    fields: &[],    cache: CacheSlot::new(),
};

#[test]
fn test_duplicate_name_rejected() {
    Point::field_cache().unwrap();
    assert!(matches!(
        cache_for(&POINT_IMPOSTER),
        Err(DescriptorError::DuplicateName("TEST_POINT"))
    ));
}

#[test]
fn test_marshaling_refused_in_critical_region() {
    let obj = point(1, 1);
    let mut array = ManagedArray::<i32>::new(4);
    let pinned = pin::pin(&mut array, PinMode::Critical, Release::Discard).unwrap();
    if pinned.mode() == PinMode::Critical {
        let err = read_struct::<Point>(&obj).unwrap_err();
        assert!(matches!(err, MarshalError::CriticalRegion { .. }));
    }
    drop(pinned);
    assert!(read_struct::<Point>(&obj).is_ok());
}

#[test]
fn test_arg_flags() {
    let both = ArgFlags::NO_IN | ArgFlags::NO_OUT;
    assert!(both.contains(ArgFlags::NO_IN));
    assert!(!ArgFlags::NONE.contains(ArgFlags::NO_OUT));
    assert!(ArgFlags::NONE.copies_in() && ArgFlags::NONE.copies_out());
    assert!(!ArgFlags::NO_IN.copies_in());
    assert!(ArgFlags::NO_IN.copies_out());
    assert!(!both.copies_out());
}

crate::native_struct! {
    struct Shared as "TEST_SHARED" {
        id: i32 => Int as I32,
    }
}

#[test]
fn test_concurrent_first_use() {
    let class = DynClass::builder("Shared").field("id", ManagedKind::Int).build();

    let workers: Vec<_> = (0..8)
        .map(|n| {
            let class = Arc::clone(&class);
            thread::spawn(move || {
                let obj = DynObject::new(&class).with("id", ManagedValue::Int(n));
                for _ in 0..200 {
                    let native: Shared = read_struct(&obj).unwrap();
                    assert_eq!(native.id, n);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().unwrap();
    }

    let cache = Shared::field_cache().unwrap();
    assert_eq!(cache.resolutions(), 1);
    assert_eq!(cache.get().map(|r| r.class()), Some(class.id()));
    assert_eq!(class.lookups(), 1);
}

crate::native_struct! {
    struct Sample as "TEST_PROPERTY" {
        count: i32 => Int as I32,
        small: i16 => Short as I16,
        byte: u8 => Byte as U8,
        flag: u8 => Boolean as Bool,
        weight: f64 => Double as F64,
    }
}

static SAMPLE_CLASS: Lazy<Arc<DynClass>> = Lazy::new(|| {
    DynClass::builder("Sample")
        .field("count", ManagedKind::Int)
        .field("small", ManagedKind::Short)
        .field("byte", ManagedKind::Byte)
        .field("flag", ManagedKind::Boolean)
        .field("weight", ManagedKind::Double)
        .build()
});

proptest! {
    #[test]
    fn prop_same_width_fields_survive_round_trip(
        count in any::<i32>(),
        small in any::<i16>(),
        byte in any::<i8>(),
        flag in any::<bool>(),
        weight_bits in any::<u64>(),
    ) {
        let source = DynObject::new(&SAMPLE_CLASS)
            .with("count", ManagedValue::Int(count))
            .with("small", ManagedValue::Short(small))
            .with("byte", ManagedValue::Byte(byte))
            .with("flag", ManagedValue::Boolean(flag))
            .with("weight", ManagedValue::Double(f64::from_bits(weight_bits)));

        let native: Sample = read_struct(&source).unwrap();
        prop_assert_eq!(native.byte, byte as u8);
        prop_assert_eq!(native.weight.to_bits(), weight_bits);

        let mut target = DynObject::new(&SAMPLE_CLASS);
        write_struct(&native, &mut target).unwrap();
        for name in ["count", "small", "byte", "flag", "weight"] {
            let (a, b) = (source.get(name).unwrap(), target.get(name).unwrap());
            prop_assert!(a.bits_eq(&b), "{} differs: {:?} vs {:?}", name, a, b);
        }
    }
}

#[test]
fn test_unaligned_struct_at() {
    let mut raw = [0u8; 9];
    let dst = raw[1..].as_mut_ptr() as *mut Point;
    unsafe {
        write_struct_at(dst, Point { x: -1, y: 77 });
        assert_eq!(read_struct_at(dst as *const Point), Point { x: -1, y: 77 });
    }
    assert_eq!(raw[0], 0);
}

#[test]
fn test_descriptor_remembers_its_cache_entry() {
    let obj = point(3, 4);
    let mut bytes = [0u8; 8];
    read_into_native(Point::descriptor(), &obj, &mut bytes).unwrap();

    let slot = Point::descriptor().cache.get().unwrap();
    assert!(core::ptr::eq(slot, cache_for(Point::descriptor()).unwrap()));
    assert!(core::ptr::eq(slot, Point::field_cache().unwrap()));
    assert!(OVERLAPPING.cache.get().is_none());
}

#[test]
fn test_field_types_must_hold_their_native_kind() {
    assert!(NativeKind::I32.holds::<i32>());
    assert!(NativeKind::U32.holds::<i32>());
    assert!(NativeKind::Bool.holds::<bool>());
    assert!(NativeKind::Bool.holds::<u8>());
    assert!(NativeKind::F64.holds::<f64>());
    assert!(NativeKind::Word.holds::<crate::handle::NativeHandle>());
    assert!(NativeKind::Word.holds::<crate::handle::Handle<crate::handle::Window>>());

    assert!(!NativeKind::I32.holds::<u8>());
    assert!(!NativeKind::U8.holds::<bool>());
    assert!(!NativeKind::I32.holds::<f32>());
    assert!(!NativeKind::F32.holds::<u32>());
    assert!(!NativeKind::F64.holds::<f32>());
}
