//! Error taxonomy for the marshaling core
//!
//! Cache-resolution and pin-acquisition failures are local to one call and
//! abort it; native-call failures never pass through here, their status is
//! returned verbatim by the call site.

use crate::managed::{FieldId, ManagedKind};
use crate::marshal::NativeKind;
use crate::pin::PinMode;
use std::fmt;

/// Failure reported by the embedding runtime when a field token is used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    UnknownField(FieldId),
    KindMismatch {
        field: FieldId,
        expected: ManagedKind,
        found: ManagedKind,
    },
}

impl fmt::Display for AccessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownField(id) => write!(f, "unknown field token {}", id.0),
            Self::KindMismatch { field, expected, found } => write!(
                f,
                "field token {} holds {} but {} was requested",
                field.0, found, expected
            ),
        }
    }
}

impl std::error::Error for AccessError {}

/// Structural problems in a struct descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    FieldOutOfBounds {
        structure: &'static str,
        field: &'static str,
        end: usize,
        size: usize,
    },
    Overlap {
        structure: &'static str,
        first: &'static str,
        second: &'static str,
    },
    IncompatibleKinds {
        structure: &'static str,
        field: &'static str,
        managed: ManagedKind,
        native: NativeKind,
    },
    ParentTooLarge {
        structure: &'static str,
        parent: &'static str,
    },
    DuplicateName(&'static str),
}

impl fmt::Display for DescriptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldOutOfBounds { structure, field, end, size } => write!(
                f,
                "{}.{} ends at byte {} but the struct is {} bytes",
                structure, field, end, size
            ),
            Self::Overlap { structure, first, second } => {
                write!(f, "{}.{} overlaps {}.{}", structure, first, structure, second)
            }
            Self::IncompatibleKinds { structure, field, managed, native } => write!(
                f,
                "{}.{}: managed {} cannot carry native {:?}",
                structure, field, managed, native
            ),
            Self::ParentTooLarge { structure, parent } => {
                write!(f, "{} is smaller than its parent {}", structure, parent)
            }
            Self::DuplicateName(name) => {
                write!(f, "another descriptor is already registered as {}", name)
            }
        }
    }
}

impl std::error::Error for DescriptorError {}

/// Struct marshaling errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarshalError {
    FieldResolution {
        structure: &'static str,
        field: &'static str,
        kind: ManagedKind,
        class: String,
    },
    ClassMismatch {
        structure: &'static str,
        cached: String,
        found: String,
    },
    FieldAccess {
        structure: &'static str,
        field: &'static str,
        source: AccessError,
    },
    BufferTooSmall {
        structure: &'static str,
        needed: usize,
        got: usize,
    },
    CriticalRegion {
        operation: &'static str,
    },
    Descriptor(DescriptorError),
}

impl fmt::Display for MarshalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FieldResolution { structure, field, kind, class } => write!(
                f,
                "cannot resolve {}.{} ({}) on class {}",
                structure, field, kind, class
            ),
            Self::ClassMismatch { structure, cached, found } => write!(
                f,
                "{} accessors were resolved on {} and cannot be used with {}",
                structure, cached, found
            ),
            Self::FieldAccess { structure, field, source } => {
                write!(f, "{}.{}: {}", structure, field, source)
            }
            Self::BufferTooSmall { structure, needed, got } => write!(
                f,
                "{} needs {} bytes of native storage, got {}",
                structure, needed, got
            ),
            Self::CriticalRegion { operation } => write!(
                f,
                "{} is not allowed while a critical pin is held",
                operation
            ),
            Self::Descriptor(err) => write!(f, "invalid descriptor: {}", err),
        }
    }
}

impl std::error::Error for MarshalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::FieldAccess { source, .. } => Some(source),
            Self::Descriptor(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DescriptorError> for MarshalError {
    fn from(err: DescriptorError) -> Self {
        Self::Descriptor(err)
    }
}

/// Pin acquisition and release errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    TooLarge { bytes: usize, limit: usize },
    AlreadyPinned { mode: PinMode },
    NotPinned,
    CriticalRegion { operation: &'static str },
    SizeMismatch { expected: usize, got: usize },
}

impl fmt::Display for PinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLarge { bytes, limit } => write!(
                f,
                "buffer of {} bytes exceeds the direct pin limit of {} bytes",
                bytes, limit
            ),
            Self::AlreadyPinned { mode } => write!(f, "buffer is already pinned ({:?})", mode),
            Self::NotPinned => write!(f, "buffer is not pinned"),
            Self::CriticalRegion { operation } => write!(
                f,
                "{} is not allowed while a critical pin is held",
                operation
            ),
            Self::SizeMismatch { expected, got } => write!(
                f,
                "staging size mismatch: expected {} bytes, got {}",
                expected, got
            ),
        }
    }
}

impl std::error::Error for PinError {}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
    AlreadyInstalled,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(err) => write!(f, "cannot read config: {}", err),
            Self::Parse(err) => write!(f, "cannot parse config: {}", err),
            Self::Invalid(msg) => write!(f, "invalid config: {}", msg),
            Self::AlreadyInstalled => write!(f, "configuration already installed"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        Self::Parse(err)
    }
}

/// Any failure the core can report to a call site
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InteropError {
    Marshal(MarshalError),
    Pin(PinError),
}

impl fmt::Display for InteropError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Marshal(err) => write!(f, "marshal: {}", err),
            Self::Pin(err) => write!(f, "pin: {}", err),
        }
    }
}

impl std::error::Error for InteropError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Marshal(err) => Some(err),
            Self::Pin(err) => Some(err),
        }
    }
}

impl From<MarshalError> for InteropError {
    fn from(err: MarshalError) -> Self {
        Self::Marshal(err)
    }
}

impl From<PinError> for InteropError {
    fn from(err: PinError) -> Self {
        Self::Pin(err)
    }
}

impl From<DescriptorError> for InteropError {
    fn from(err: DescriptorError) -> Self {
        Self::Marshal(MarshalError::Descriptor(err))
    }
}

pub type Result<T> = std::result::Result<T, InteropError>;
