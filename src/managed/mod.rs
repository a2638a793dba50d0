//! Managed side of the boundary - the seam to the embedding runtime
//!
//! The core only sees the embedding runtime through these traits:
//! - `ManagedClass` resolves field names to accessor tokens
//! - `ManagedObject` reads and writes fields through those tokens
//! - `ManagedBuffer` exposes bulk arrays for pinning
//!
//! `object` and `array` hold an in-process implementation used by
//! embedders without a foreign runtime and by the test suite.

mod array;
mod object;

pub use array::{Element, ManagedArray, PinEvents};
pub use object::{DynClass, DynClassBuilder, DynObject};

use crate::error::{AccessError, PinError};
use core::fmt;
use core::ptr::NonNull;

/// Runtime type identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub u64);

/// Accessor token handed out by the runtime for one field of one class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId(pub u32);

/// Managed field kinds, keyed by their type signature letter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ManagedKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl ManagedKind {
    /// Kind used for pointer-sized values on this target
    #[cfg(target_pointer_width = "64")]
    pub const WORD: Self = Self::Long;
    #[cfg(target_pointer_width = "32")]
    pub const WORD: Self = Self::Int;

    #[inline]
    pub const fn signature(self) -> char {
        match self {
            Self::Boolean => 'Z',
            Self::Byte => 'B',
            Self::Char => 'C',
            Self::Short => 'S',
            Self::Int => 'I',
            Self::Long => 'J',
            Self::Float => 'F',
            Self::Double => 'D',
        }
    }

    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::Boolean | Self::Byte => 1,
            Self::Char | Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double => 8,
        }
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(self, Self::Byte | Self::Char | Self::Short | Self::Int | Self::Long)
    }

    /// Zero value of this kind
    pub const fn zero(self) -> ManagedValue {
        match self {
            Self::Boolean => ManagedValue::Boolean(false),
            Self::Byte => ManagedValue::Byte(0),
            Self::Char => ManagedValue::Char(0),
            Self::Short => ManagedValue::Short(0),
            Self::Int => ManagedValue::Int(0),
            Self::Long => ManagedValue::Long(0),
            Self::Float => ManagedValue::Float(0.0),
            Self::Double => ManagedValue::Double(0.0),
        }
    }
}

impl fmt::Display for ManagedKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.signature())
    }
}

/// A single managed field value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ManagedValue {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl ManagedValue {
    pub const fn kind(&self) -> ManagedKind {
        match self {
            Self::Boolean(_) => ManagedKind::Boolean,
            Self::Byte(_) => ManagedKind::Byte,
            Self::Char(_) => ManagedKind::Char,
            Self::Short(_) => ManagedKind::Short,
            Self::Int(_) => ManagedKind::Int,
            Self::Long(_) => ManagedKind::Long,
            Self::Float(_) => ManagedKind::Float,
            Self::Double(_) => ManagedKind::Double,
        }
    }

    /// Integral value widened to 64 bits (`Char` zero-extends, the rest sign-extend)
    pub const fn as_i64(&self) -> Option<i64> {
        match *self {
            Self::Boolean(b) => Some(b as i64),
            Self::Byte(v) => Some(v as i64),
            Self::Char(v) => Some(v as i64),
            Self::Short(v) => Some(v as i64),
            Self::Int(v) => Some(v as i64),
            Self::Long(v) => Some(v),
            Self::Float(_) | Self::Double(_) => None,
        }
    }

    /// Narrow a 64-bit integer into `kind`, truncating like a C cast
    pub const fn from_i64(kind: ManagedKind, v: i64) -> Option<Self> {
        Some(match kind {
            ManagedKind::Boolean => Self::Boolean(v != 0),
            ManagedKind::Byte => Self::Byte(v as i8),
            ManagedKind::Char => Self::Char(v as u16),
            ManagedKind::Short => Self::Short(v as i16),
            ManagedKind::Int => Self::Int(v as i32),
            ManagedKind::Long => Self::Long(v),
            ManagedKind::Float | ManagedKind::Double => return None,
        })
    }

    /// Bitwise equality, so NaN payloads compare equal to themselves
    pub fn bits_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

/// Runtime type of a managed object
pub trait ManagedClass {
    fn id(&self) -> ClassId;

    fn name(&self) -> &str;

    /// By-name field lookup; the expensive call the accessor cache avoids repeating
    fn resolve_field(&self, name: &str, kind: ManagedKind) -> Option<FieldId>;

    /// True when tokens resolved on `other` are valid for instances of this class
    fn is_assignable_to(&self, other: ClassId) -> bool {
        self.id() == other
    }
}

/// Managed object with named, typed fields
pub trait ManagedObject {
    fn class(&self) -> &dyn ManagedClass;

    fn get_field(&self, field: FieldId, kind: ManagedKind) -> Result<ManagedValue, AccessError>;

    fn set_field(&mut self, field: FieldId, value: ManagedValue) -> Result<(), AccessError>;
}

/// Element flavours of managed bulk buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementKind {
    Byte,
    Char,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl ElementKind {
    #[inline]
    pub const fn width(self) -> usize {
        match self {
            Self::Byte => 1,
            Self::Char | Self::Short => 2,
            Self::Int | Self::Float => 4,
            Self::Long | Self::Double => 8,
        }
    }
}

/// Managed bulk buffer that can be pinned for the duration of a native call
///
/// The direct path hands out the buffer's own storage and must not move or
/// free it until `unpin_direct`. The relaxed path copies through caller
/// provided staging memory.
pub trait ManagedBuffer {
    fn element_kind(&self) -> ElementKind;

    /// Number of elements
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn byte_len(&self) -> usize {
        self.len() * self.element_kind().width()
    }

    /// Whether the runtime can hand out its storage directly
    fn supports_direct(&self) -> bool {
        true
    }

    fn pin_direct(&mut self) -> Result<NonNull<u8>, PinError>;

    fn unpin_direct(&mut self) -> Result<(), PinError>;

    /// Copy the contents into `dst` (exactly `byte_len` bytes)
    fn copy_out(&mut self, dst: &mut [u8]) -> Result<(), PinError>;

    /// Replace the contents with `src` (exactly `byte_len` bytes)
    fn copy_in(&mut self, src: &[u8]) -> Result<(), PinError>;
}
