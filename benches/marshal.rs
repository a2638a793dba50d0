use criterion::{black_box, criterion_group, criterion_main, Criterion};
use native_bridge::dispatch;
use native_bridge::managed::{DynClass, DynObject, ManagedArray, ManagedKind, ManagedValue};
use native_bridge::marshal::{read_struct, write_struct};
use native_bridge::pin::{pin, PinMode, Release};

native_bridge::native_struct! {
    struct Rect as "RECT" {
        left: i32 => Int as I32,
        top: i32 => Int as I32,
        right: i32 => Int as I32,
        bottom: i32 => Int as I32,
    }
}

native_bridge::native_functions! {
    enum User in "USER" {
        InvalidateRect,
    }
}

fn bench_struct_marshaling(c: &mut Criterion) {
    let class = DynClass::builder("Rect")
        .field("left", ManagedKind::Int)
        .field("top", ManagedKind::Int)
        .field("right", ManagedKind::Int)
        .field("bottom", ManagedKind::Int)
        .build();
    let mut obj = DynObject::new(&class)
        .with("right", ManagedValue::Int(640))
        .with("bottom", ManagedValue::Int(480));

    c.bench_function("read_struct_rect", |b| {
        b.iter(|| {
            let rect: Rect = read_struct(black_box(&obj)).unwrap();
            black_box(rect)
        });
    });

    let rect = Rect { left: 1, top: 2, right: 3, bottom: 4 };
    c.bench_function("write_struct_rect", |b| {
        b.iter(|| write_struct(black_box(&rect), &mut obj).unwrap());
    });
}

fn bench_pinning(c: &mut Criterion) {
    let mut buffer = ManagedArray::<i8>::new(4096);

    c.bench_function("pin_critical_4k", |b| {
        b.iter(|| {
            let pinned = pin(&mut buffer, PinMode::Critical, Release::Discard).unwrap();
            black_box(pinned.as_ptr());
        });
    });

    c.bench_function("pin_relaxed_4k", |b| {
        b.iter(|| {
            let pinned = pin(&mut buffer, PinMode::Relaxed, Release::Commit).unwrap();
            black_box(pinned.as_ptr());
        });
    });
}

fn bench_dispatch(c: &mut Criterion) {
    c.bench_function("dispatch_counted_call", |b| {
        b.iter(|| dispatch::dispatch(User::InvalidateRect, || black_box(1)));
    });
}

criterion_group!(benches, bench_struct_marshaling, bench_pinning, bench_dispatch);
criterion_main!(benches);
