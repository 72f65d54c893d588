use std::fmt;
use std::str::Utf8Error;

use crate::marker::{LogicalType, TypeMarker};

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Clone, Debug, PartialEq)]
pub enum Error {
    /// An exact marker was required, but a different one was found.
    UnexpectedTypeMarker {
        expected: TypeMarker,
        actual: TypeMarker,
    },
    /// A marker of the given logical type was required, but the marker found belongs to another
    /// type.
    UnexpectedType {
        expected: LogicalType,
        actual: TypeMarker,
    },
    /// A struct header was read whose tag isn't known to the active registry, or isn't the struct
    /// the caller asked for.
    UnexpectedStruct { tag: u8, length: u64 },
    /// A declared length, size, or count is larger than the allowed ceiling.
    LimitExceeded { limit: u64, actual: u64 },
    /// A map contained the same key more than once.
    DuplicateMapKey(String),
    /// A struct field decoded correctly, but its value isn't valid for the struct.
    IllegalStructArgument { field: &'static str, message: String },
    /// A known struct was declared with the wrong number of fields.
    IllegalStructSize { tag: u8, expected: u64, actual: u64 },
    /// The caller asked for something that can't be encoded.
    IllegalArgument(String),
    /// Length prefix kinds that live inside the marker byte can't be read or written on their
    /// own.
    UnsupportedOperation(&'static str),
    /// Input ended before the value did.
    UnexpectedEnd {
        step: &'static str,
        expected: usize,
        actual: usize,
    },
    /// String payload wasn't valid UTF-8.
    InvalidUtf8(Utf8Error),
    /// Values were nested deeper than the configured maximum.
    DepthLimitExceeded(usize),
    /// A reserved marker byte was found where any value could have been.
    ReservedMarker(u8),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Error::UnexpectedTypeMarker { expected, actual } => write!(
                f,
                "Unexpected type marker: expected {:?} but got {:?}",
                expected, actual
            ),
            Error::UnexpectedType { expected, actual } => write!(
                f,
                "Unexpected type: expected {:?} but got {:?} ({:?})",
                expected,
                actual.logical_type(),
                actual
            ),
            Error::UnexpectedStruct { tag, length } => write!(
                f,
                "Unexpected struct: tag 0x{:02X} with {} fields",
                tag, length
            ),
            Error::LimitExceeded { limit, actual } => {
                write!(f, "Value of {} exceeds limit of {}", actual, limit)
            }
            Error::DuplicateMapKey(ref key) => write!(f, "Duplicate map key: \"{}\"", key),
            Error::IllegalStructArgument {
                field,
                ref message,
            } => write!(f, "Illegal value for field \"{}\": {}", field, message),
            Error::IllegalStructSize {
                tag,
                expected,
                actual,
            } => write!(
                f,
                "Illegal struct size for tag 0x{:02X}: expected {} fields but got {}",
                tag, expected, actual
            ),
            Error::IllegalArgument(ref msg) => write!(f, "Illegal argument: {}", msg),
            Error::UnsupportedOperation(ref msg) => write!(f, "Unsupported operation: {}", msg),
            Error::UnexpectedEnd {
                step,
                expected,
                actual,
            } => write!(
                f,
                "Expected {} more bytes, but got {} on step [{}]",
                expected, actual, step
            ),
            Error::InvalidUtf8(ref err) => write!(f, "String is not valid UTF-8: {}", err),
            Error::DepthLimitExceeded(limit) => {
                write!(f, "Values nested deeper than the limit of {}", limit)
            }
            Error::ReservedMarker(byte) => write!(f, "Reserved marker byte 0x{:02X}", byte),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match *self {
            Error::InvalidUtf8(ref err) => Some(err),
            _ => None,
        }
    }
}

impl std::convert::From<Utf8Error> for Error {
    fn from(e: Utf8Error) -> Self {
        Self::InvalidUtf8(e)
    }
}

impl Error {
    /// Shorthand for an [`Error::IllegalStructArgument`].
    pub fn illegal_struct_argument(field: &'static str, message: impl Into<String>) -> Self {
        Error::IllegalStructArgument {
            field,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn display_names_both_markers() {
        let err = Error::UnexpectedTypeMarker {
            expected: TypeMarker::Null,
            actual: TypeMarker::True,
        };
        let msg = err.to_string();
        assert!(msg.contains("Null"));
        assert!(msg.contains("True"));
    }

    #[test]
    fn display_limit_carries_both_values() {
        let msg = Error::LimitExceeded {
            limit: 42,
            actual: 43,
        }
        .to_string();
        assert!(msg.contains("42"));
        assert!(msg.contains("43"));
    }

    #[test]
    fn utf8_source() {
        use std::error::Error as _;
        let bad: Vec<u8> = vec![0xff, 0xfe];
        let err: Error = std::str::from_utf8(&bad).unwrap_err().into();
        assert!(err.source().is_some());
    }
}
