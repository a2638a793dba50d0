//! Struct descriptors - compile-time layout of native structs
//!
//! A descriptor lists every native field with its byte offset, its native
//! kind, and the managed field (or pair of fields) that carries it.

use super::cache::CacheSlot;
use crate::error::DescriptorError;
use crate::handle::{Handle, HandleKind, NativeHandle, WORD_BYTES};
use crate::managed::ManagedKind;
use smallvec::SmallVec;

/// Native field kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NativeKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    Char16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
    /// Pointer-sized integer or handle
    Word,
}

impl NativeKind {
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 | Self::Char16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
            Self::Word => WORD_BYTES,
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::Word)
    }

    /// Whether a managed field of `managed` kind can carry this native kind
    pub const fn accepts(self, managed: ManagedKind) -> bool {
        match self {
            Self::F32 => matches!(managed, ManagedKind::Float),
            Self::F64 => matches!(managed, ManagedKind::Double),
            Self::Word => matches!(managed, ManagedKind::Int | ManagedKind::Long),
            _ => managed.is_integral() || matches!(managed, ManagedKind::Boolean),
        }
    }

    /// Whether a Rust field of type `T` can hold this native kind exactly
    ///
    /// Widths must match. `bool` only holds `Bool`, and floats only hold
    /// floats of their own width.
    pub const fn holds<T: NativeField>(self) -> bool {
        if T::WIDTH != self.width() {
            return false;
        }
        if T::BOOL {
            return matches!(self, Self::Bool);
        }
        T::FLOAT == self.is_float()
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust types allowed as `native_struct!` fields
///
/// Sealed: every implementor is plain data and valid when all-zero.
/// Apart from `bool`, every bit pattern of its width is a valid value.
pub trait NativeField: sealed::Sealed + Copy + 'static {
    const WIDTH: usize;
    const FLOAT: bool;
    const BOOL: bool;
}

macro_rules! native_fields {
    ($float:literal, $boolean:literal => $($ty:ty),+) => {
        $(
            impl sealed::Sealed for $ty {}

            impl NativeField for $ty {
                const WIDTH: usize = core::mem::size_of::<$ty>();
                const FLOAT: bool = $float;
                const BOOL: bool = $boolean;
            }
        )+
    };
}

native_fields!(false, false => i8, u8, i16, u16, i32, u32, i64, u64, isize, usize, NativeHandle);
native_fields!(true, false => f32, f64);
native_fields!(false, true => bool);

impl<K: HandleKind> sealed::Sealed for Handle<K> {}

impl<K: HandleKind> NativeField for Handle<K> {
    const WIDTH: usize = WORD_BYTES;
    const FLOAT: bool = false;
    const BOOL: bool = false;
}

/// Where a native field's value lives on the managed side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    Direct {
        name: &'static str,
        managed: ManagedKind,
    },
    /// A native 64-bit field carried by two managed `Int` halves
    Split {
        low: &'static str,
        high: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub source: FieldSource,
    pub native: NativeKind,
    pub offset: usize,
}

impl FieldDescriptor {
    pub const fn direct(
        name: &'static str,
        managed: ManagedKind,
        native: NativeKind,
        offset: usize,
    ) -> Self {
        Self {
            source: FieldSource::Direct { name, managed },
            native,
            offset,
        }
    }

    pub const fn split(
        low: &'static str,
        high: &'static str,
        native: NativeKind,
        offset: usize,
    ) -> Self {
        Self {
            source: FieldSource::Split { low, high },
            native,
            offset,
        }
    }

    /// Name used in diagnostics (the low half for split fields)
    pub const fn name(&self) -> &'static str {
        match self.source {
            FieldSource::Direct { name, .. } => name,
            FieldSource::Split { low, .. } => low,
        }
    }

    #[inline]
    pub const fn end(&self) -> usize {
        self.offset + self.native.width()
    }

    /// Managed fields backing this native field, in token order
    pub fn accessors(&self) -> SmallVec<[(&'static str, ManagedKind); 2]> {
        let mut out = SmallVec::new();
        match self.source {
            FieldSource::Direct { name, managed } => out.push((name, managed)),
            FieldSource::Split { low, high } => {
                out.push((low, ManagedKind::Int));
                out.push((high, ManagedKind::Int));
            }
        }
        out
    }

    #[inline]
    pub const fn accessor_count(&self) -> usize {
        match self.source {
            FieldSource::Direct { .. } => 1,
            FieldSource::Split { .. } => 2,
        }
    }

    fn check_kinds(&self, structure: &'static str) -> Result<(), DescriptorError> {
        let compatible = match self.source {
            FieldSource::Direct { managed, .. } => self.native.accepts(managed),
            FieldSource::Split { .. } => matches!(self.native, NativeKind::I64 | NativeKind::U64),
        };
        if compatible {
            return Ok(());
        }
        let managed = match self.source {
            FieldSource::Direct { managed, .. } => managed,
            FieldSource::Split { .. } => ManagedKind::Int,
        };
        Err(DescriptorError::IncompatibleKinds {
            structure,
            field: self.name(),
            managed,
            native: self.native,
        })
    }
}

/// Layout of one native struct kind
///
/// Parent fields sit at the start of the derived struct and are visited
/// before the struct's own fields.
#[derive(Debug)]
pub struct StructDescriptor {
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    pub parent: Option<&'static StructDescriptor>,
    pub fields: &'static [FieldDescriptor],
    /// Registry entry, filled in by `cache_for`
    pub cache: CacheSlot,
}

impl StructDescriptor {
    /// Descriptors from the root ancestor down to `self`
    pub fn chain(&'static self) -> SmallVec<[&'static StructDescriptor; 4]> {
        let mut chain = SmallVec::new();
        let mut current = Some(self);
        while let Some(desc) = current {
            chain.push(desc);
            current = desc.parent;
        }
        chain.reverse();
        chain
    }

    /// Every field including inherited ones, in marshaling order
    pub fn all_fields(&'static self) -> impl Iterator<Item = &'static FieldDescriptor> {
        self.chain().into_iter().flat_map(|desc| desc.fields.iter())
    }

    /// Number of accessor tokens the cache holds for this struct
    pub fn accessor_count(&'static self) -> usize {
        self.all_fields().map(FieldDescriptor::accessor_count).sum()
    }

    pub fn validate(&'static self) -> Result<(), DescriptorError> {
        if let Some(parent) = self.parent {
            if parent.size > self.size {
                return Err(DescriptorError::ParentTooLarge {
                    structure: self.name,
                    parent: parent.name,
                });
            }
            parent.validate()?;
        }

        let mut spans: Vec<(usize, usize, &'static str)> = Vec::new();
        for field in self.all_fields() {
            field.check_kinds(self.name)?;
            if field.end() > self.size {
                return Err(DescriptorError::FieldOutOfBounds {
                    structure: self.name,
                    field: field.name(),
                    end: field.end(),
                    size: self.size,
                });
            }
            spans.push((field.offset, field.end(), field.name()));
        }

        spans.sort_unstable_by_key(|&(start, _, _)| start);
        for pair in spans.windows(2) {
            let (_, first_end, first) = pair[0];
            let (second_start, _, second) = pair[1];
            if second_start < first_end {
                return Err(DescriptorError::Overlap {
                    structure: self.name,
                    first,
                    second,
                });
            }
        }
        Ok(())
    }
}
