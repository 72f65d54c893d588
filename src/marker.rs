use crate::error::{Error, Result};
use crate::length_prefix::LengthPrefix;

/// Smallest value encoded as a [`TypeMarker::TinyInt`].
pub const TINY_INT_MIN: i64 = -16;
/// Largest value encoded as a [`TypeMarker::TinyInt`].
pub const TINY_INT_MAX: i64 = 127;
pub const INT8_MIN: i64 = i8::MIN as i64;
pub const INT16_MIN: i64 = i16::MIN as i64;
pub const INT16_MAX: i64 = i16::MAX as i64;
pub const INT32_MIN: i64 = i32::MIN as i64;
pub const INT32_MAX: i64 = i32::MAX as i64;

/// First byte of the marker window. Bytes outside the window are TinyInt payloads.
pub const MARKER_WINDOW_START: u8 = 0x80;
/// Last byte of the marker window.
pub const MARKER_WINDOW_END: u8 = 0xEF;

const WINDOW_SIZE: usize = (MARKER_WINDOW_END - MARKER_WINDOW_START) as usize + 1;

/// Logical classification of an encoded value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogicalType {
    None,
    Bytes,
    Boolean,
    Float,
    Int,
    List,
    Map,
    String,
    Struct,
    Reserved,
}

/// Every marker byte identity of the format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeMarker {
    TinyInt,
    TinyString,
    TinyList,
    TinyMap,
    TinyStruct,
    Null,
    Float64,
    False,
    True,
    Int8,
    Int16,
    Int32,
    Int64,
    Bytes8,
    Bytes16,
    Bytes32,
    String8,
    String16,
    String32,
    List8,
    List16,
    List32,
    Map8,
    Map16,
    Map32,
    /// Deprecated. Decoded for compatibility, never written.
    Struct8,
    /// Deprecated. Decoded for compatibility, never written.
    Struct16,
    /// Stands in for any in-window byte without a meaning. Never written.
    Reserved,
}

pub const BYTES_TYPES: &[TypeMarker] = &[TypeMarker::Bytes8, TypeMarker::Bytes16, TypeMarker::Bytes32];
pub const STRING_TYPES: &[TypeMarker] = &[
    TypeMarker::TinyString,
    TypeMarker::String8,
    TypeMarker::String16,
    TypeMarker::String32,
];
pub const LIST_TYPES: &[TypeMarker] = &[
    TypeMarker::TinyList,
    TypeMarker::List8,
    TypeMarker::List16,
    TypeMarker::List32,
];
pub const MAP_TYPES: &[TypeMarker] = &[
    TypeMarker::TinyMap,
    TypeMarker::Map8,
    TypeMarker::Map16,
    TypeMarker::Map32,
];
pub const STRUCT_TYPES: &[TypeMarker] = &[TypeMarker::TinyStruct];

static LOOKUP: [TypeMarker; WINDOW_SIZE] = build_lookup();

const fn build_lookup() -> [TypeMarker; WINDOW_SIZE] {
    let mut table = [TypeMarker::Reserved; WINDOW_SIZE];
    let mut i = 0;
    while i < TypeMarker::ALL.len() {
        let marker = TypeMarker::ALL[i];
        i += 1;
        if matches!(marker, TypeMarker::TinyInt | TypeMarker::Reserved) {
            continue;
        }
        let base = (marker.value() - MARKER_WINDOW_START) as usize;
        if marker.is_nibble_marker() {
            let mut n = 0;
            while n < 16 {
                table[base ^ n] = marker;
                n += 1;
            }
        } else {
            table[base] = marker;
        }
    }
    table
}

impl TypeMarker {
    pub const ALL: [TypeMarker; 28] = [
        TypeMarker::TinyInt,
        TypeMarker::TinyString,
        TypeMarker::TinyList,
        TypeMarker::TinyMap,
        TypeMarker::TinyStruct,
        TypeMarker::Null,
        TypeMarker::Float64,
        TypeMarker::False,
        TypeMarker::True,
        TypeMarker::Int8,
        TypeMarker::Int16,
        TypeMarker::Int32,
        TypeMarker::Int64,
        TypeMarker::Bytes8,
        TypeMarker::Bytes16,
        TypeMarker::Bytes32,
        TypeMarker::String8,
        TypeMarker::String16,
        TypeMarker::String32,
        TypeMarker::List8,
        TypeMarker::List16,
        TypeMarker::List32,
        TypeMarker::Map8,
        TypeMarker::Map16,
        TypeMarker::Map32,
        TypeMarker::Struct8,
        TypeMarker::Struct16,
        TypeMarker::Reserved,
    ];

    /// Classify a raw byte. Bytes outside the marker window are TinyInt values, bytes inside it
    /// resolve through a precomputed table.
    pub fn by_encoded(byte: u8) -> TypeMarker {
        if !(MARKER_WINDOW_START..=MARKER_WINDOW_END).contains(&byte) {
            return TypeMarker::TinyInt;
        }
        LOOKUP[(byte - MARKER_WINDOW_START) as usize]
    }

    /// The canonical byte for fixed markers, or the base pattern for nibble markers.
    pub const fn value(self) -> u8 {
        use self::TypeMarker::*;
        match self {
            TinyInt => 0x00,
            TinyString => 0x80,
            TinyList => 0x90,
            TinyMap => 0xA0,
            TinyStruct => 0xB0,
            Null => 0xC0,
            Float64 => 0xC1,
            False => 0xC2,
            True => 0xC3,
            Int8 => 0xC8,
            Int16 => 0xC9,
            Int32 => 0xCA,
            Int64 => 0xCB,
            Bytes8 => 0xCC,
            Bytes16 => 0xCD,
            Bytes32 => 0xCE,
            String8 => 0xD0,
            String16 => 0xD1,
            String32 => 0xD2,
            List8 => 0xD4,
            List16 => 0xD5,
            List32 => 0xD6,
            Map8 => 0xD8,
            Map16 => 0xD9,
            Map32 => 0xDA,
            Struct8 => 0xDC,
            Struct16 => 0xDD,
            Reserved => 0xC4,
        }
    }

    pub const fn logical_type(self) -> LogicalType {
        use self::TypeMarker::*;
        match self {
            TinyInt | Int8 | Int16 | Int32 | Int64 => LogicalType::Int,
            TinyString | String8 | String16 | String32 => LogicalType::String,
            TinyList | List8 | List16 | List32 => LogicalType::List,
            TinyMap | Map8 | Map16 | Map32 => LogicalType::Map,
            TinyStruct | Struct8 | Struct16 => LogicalType::Struct,
            Null => LogicalType::None,
            Float64 => LogicalType::Float,
            False | True => LogicalType::Boolean,
            Bytes8 | Bytes16 | Bytes32 => LogicalType::Bytes,
            Reserved => LogicalType::Reserved,
        }
    }

    pub const fn length_prefix(self) -> LengthPrefix {
        use self::TypeMarker::*;
        match self {
            TinyString | TinyList | TinyMap | TinyStruct => LengthPrefix::Nibble,
            Bytes8 | String8 | List8 | Map8 | Struct8 => LengthPrefix::UInt8,
            Bytes16 | String16 | List16 | Map16 | Struct16 => LengthPrefix::UInt16,
            Bytes32 | String32 | List32 | Map32 => LengthPrefix::UInt32,
            _ => LengthPrefix::None,
        }
    }

    pub const fn has_length_prefix(self) -> bool {
        !matches!(self.length_prefix(), LengthPrefix::None)
    }

    pub const fn is_nibble_marker(self) -> bool {
        matches!(self.length_prefix(), LengthPrefix::Nibble)
    }

    pub const fn can_encode_length(self, length: u64) -> bool {
        self.length_prefix().can_encode(length)
    }
}

/// Extract the length stored in the low 4 bits of a nibble marker byte.
pub fn decode_length_nibble(byte: u8) -> u64 {
    u64::from(byte & 0x0F)
}

/// Combine a marker's base pattern with a length. The length must already be known to fit the
/// marker.
pub fn encode_length_nibble(marker: TypeMarker, length: u8) -> u8 {
    marker.value() ^ length
}

pub fn require_encodable_length(marker: TypeMarker, length: u64) -> Result<()> {
    if !marker.can_encode_length(length) {
        return Err(Error::IllegalArgument(format!(
            "{:?} cannot store value of length {} (limit is {})",
            marker,
            length,
            marker.length_prefix().max_value()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn classification_is_total() {
        for byte in 0..=255u8 {
            let marker = TypeMarker::by_encoded(byte);
            assert_eq!(marker, TypeMarker::by_encoded(byte), "0x{:02X}", byte);
            if (0x80..=0xEF).contains(&byte) {
                assert_ne!(marker, TypeMarker::TinyInt, "0x{:02X}", byte);
            } else {
                assert_eq!(marker, TypeMarker::TinyInt, "0x{:02X}", byte);
            }
        }
    }

    #[test]
    fn wire_format() {
        let cases: &[(u8, TypeMarker)] = &[
            (0x00, TypeMarker::TinyInt),
            (0x7F, TypeMarker::TinyInt),
            (0xF0, TypeMarker::TinyInt),
            (0xFF, TypeMarker::TinyInt),
            (0x80, TypeMarker::TinyString),
            (0x8F, TypeMarker::TinyString),
            (0x90, TypeMarker::TinyList),
            (0x9F, TypeMarker::TinyList),
            (0xA0, TypeMarker::TinyMap),
            (0xAF, TypeMarker::TinyMap),
            (0xB0, TypeMarker::TinyStruct),
            (0xBF, TypeMarker::TinyStruct),
            (0xC0, TypeMarker::Null),
            (0xC1, TypeMarker::Float64),
            (0xC2, TypeMarker::False),
            (0xC3, TypeMarker::True),
            (0xC8, TypeMarker::Int8),
            (0xC9, TypeMarker::Int16),
            (0xCA, TypeMarker::Int32),
            (0xCB, TypeMarker::Int64),
            (0xCC, TypeMarker::Bytes8),
            (0xCD, TypeMarker::Bytes16),
            (0xCE, TypeMarker::Bytes32),
            (0xD0, TypeMarker::String8),
            (0xD1, TypeMarker::String16),
            (0xD2, TypeMarker::String32),
            (0xD4, TypeMarker::List8),
            (0xD5, TypeMarker::List16),
            (0xD6, TypeMarker::List32),
            (0xD8, TypeMarker::Map8),
            (0xD9, TypeMarker::Map16),
            (0xDA, TypeMarker::Map32),
            (0xDC, TypeMarker::Struct8),
            (0xDD, TypeMarker::Struct16),
        ];
        for &(byte, marker) in cases {
            assert_eq!(TypeMarker::by_encoded(byte), marker, "0x{:02X}", byte);
        }
    }

    #[test]
    fn reserved() {
        let reserved = [
            0xC4, 0xC5, 0xC6, 0xC7, 0xCF, 0xD3, 0xD7, 0xDB, 0xDE, 0xDF, 0xE0, 0xEA, 0xEF,
        ];
        for byte in reserved {
            let marker = TypeMarker::by_encoded(byte);
            assert_eq!(marker, TypeMarker::Reserved, "0x{:02X}", byte);
            assert_eq!(marker.logical_type(), LogicalType::Reserved);
        }
    }

    #[test]
    fn fixed_markers_round_trip_their_value() {
        for marker in TypeMarker::ALL {
            if matches!(marker, TypeMarker::TinyInt | TypeMarker::Reserved) {
                continue;
            }
            assert_eq!(TypeMarker::by_encoded(marker.value()), marker);
        }
    }

    #[test]
    fn nibbles() {
        for length in 0..16u8 {
            let byte = encode_length_nibble(TypeMarker::TinyMap, length);
            assert_eq!(byte, 0xA0 | length);
            assert_eq!(decode_length_nibble(byte), length as u64);
            assert_eq!(TypeMarker::by_encoded(byte), TypeMarker::TinyMap);
        }
        // TinyInt has a zero base, so the "nibble" is the whole byte
        assert_eq!(encode_length_nibble(TypeMarker::TinyInt, (-16i8) as u8), 0xF0);
    }

    #[test]
    fn length_prefix_flags() {
        assert!(TypeMarker::TinyString.is_nibble_marker());
        assert!(TypeMarker::TinyString.has_length_prefix());
        assert!(!TypeMarker::TinyInt.is_nibble_marker());
        assert!(!TypeMarker::TinyInt.has_length_prefix());
        assert!(!TypeMarker::Null.has_length_prefix());
        assert!(TypeMarker::Bytes16.has_length_prefix());
        assert_eq!(TypeMarker::Struct16.length_prefix(), LengthPrefix::UInt16);
    }

    #[test]
    fn encodable_lengths() {
        assert!(require_encodable_length(TypeMarker::TinyList, 15).is_ok());
        assert!(matches!(
            require_encodable_length(TypeMarker::TinyList, 16),
            Err(Error::IllegalArgument(_))
        ));
        assert!(require_encodable_length(TypeMarker::String32, u32::MAX as u64).is_ok());
        assert!(require_encodable_length(TypeMarker::Null, 1).is_err());
    }
}
