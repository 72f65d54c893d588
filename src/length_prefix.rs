use byteorder::{BigEndian, ReadBytesExt};

use crate::error::{Error, Result};

/// The ways a length can precede variable-length data.
///
/// `None` and `Nibble` have no bytes of their own on the wire: a nibble length lives in the low 4
/// bits of the marker byte and is handled by the marker layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LengthPrefix {
    None,
    Nibble,
    UInt8,
    UInt16,
    UInt32,
}

impl LengthPrefix {
    /// Number of bytes the prefix occupies after the marker byte.
    pub const fn byte_width(self) -> usize {
        match self {
            LengthPrefix::None | LengthPrefix::Nibble => 0,
            LengthPrefix::UInt8 => 1,
            LengthPrefix::UInt16 => 2,
            LengthPrefix::UInt32 => 4,
        }
    }

    /// Largest length the prefix can represent.
    pub const fn max_value(self) -> u64 {
        match self {
            LengthPrefix::None => 0,
            LengthPrefix::Nibble => 0x0F,
            LengthPrefix::UInt8 => u8::MAX as u64,
            LengthPrefix::UInt16 => u16::MAX as u64,
            LengthPrefix::UInt32 => u32::MAX as u64,
        }
    }

    pub const fn can_encode(self, length: u64) -> bool {
        length <= self.max_value()
    }

    /// Read an unsigned big-endian length from the front of `src`, advancing it.
    pub fn read_from(self, src: &mut &[u8]) -> Result<u64> {
        let available = src.len();
        let short = |step| Error::UnexpectedEnd {
            step,
            expected: self.byte_width(),
            actual: available,
        };
        match self {
            LengthPrefix::None | LengthPrefix::Nibble => Err(Error::UnsupportedOperation(
                "length is encoded within the marker byte",
            )),
            LengthPrefix::UInt8 => src
                .read_u8()
                .map(u64::from)
                .map_err(|_| short("decode UInt8 length")),
            LengthPrefix::UInt16 => src
                .read_u16::<BigEndian>()
                .map(u64::from)
                .map_err(|_| short("decode UInt16 length")),
            LengthPrefix::UInt32 => src
                .read_u32::<BigEndian>()
                .map(u64::from)
                .map_err(|_| short("decode UInt32 length")),
        }
    }

    /// Append `length` as an unsigned big-endian integer of this prefix's width.
    pub fn write_to(self, target: &mut Vec<u8>, length: u64) -> Result<()> {
        if let LengthPrefix::None | LengthPrefix::Nibble = self {
            return Err(Error::UnsupportedOperation(
                "length is encoded within the marker byte",
            ));
        }
        if !self.can_encode(length) {
            return Err(Error::IllegalArgument(format!(
                "length {} does not fit {:?} (limit is {})",
                length,
                self,
                self.max_value()
            )));
        }
        match self {
            LengthPrefix::UInt8 => target.push(length as u8),
            LengthPrefix::UInt16 => target.extend_from_slice(&(length as u16).to_be_bytes()),
            _ => target.extend_from_slice(&(length as u32).to_be_bytes()),
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn widths_and_limits() {
        let cases = [
            (LengthPrefix::None, 0, 0),
            (LengthPrefix::Nibble, 0, 15),
            (LengthPrefix::UInt8, 1, 255),
            (LengthPrefix::UInt16, 2, 65535),
            (LengthPrefix::UInt32, 4, 4294967295),
        ];
        for (prefix, width, max) in cases {
            assert_eq!(prefix.byte_width(), width, "{:?}", prefix);
            assert_eq!(prefix.max_value(), max, "{:?}", prefix);
            assert!(prefix.can_encode(max));
            assert!(!prefix.can_encode(max + 1));
        }
    }

    #[test]
    fn wire_format() {
        let mut enc = Vec::new();
        LengthPrefix::UInt8.write_to(&mut enc, 0xAB).unwrap();
        LengthPrefix::UInt16.write_to(&mut enc, 0x0102).unwrap();
        LengthPrefix::UInt32.write_to(&mut enc, 0xDEADBEEF).unwrap();
        assert_eq!(enc, &[0xAB, 0x01, 0x02, 0xDE, 0xAD, 0xBE, 0xEF]);

        let mut src = enc.as_slice();
        assert_eq!(LengthPrefix::UInt8.read_from(&mut src).unwrap(), 0xAB);
        assert_eq!(LengthPrefix::UInt16.read_from(&mut src).unwrap(), 0x0102);
        assert_eq!(LengthPrefix::UInt32.read_from(&mut src).unwrap(), 0xDEADBEEF);
        assert!(src.is_empty());
    }

    #[test]
    fn marker_embedded_kinds_are_unsupported() {
        for prefix in [LengthPrefix::None, LengthPrefix::Nibble] {
            let mut src: &[u8] = &[0x01, 0x02];
            assert!(matches!(
                prefix.read_from(&mut src),
                Err(Error::UnsupportedOperation(_))
            ));
            assert_eq!(src.len(), 2);
            let mut enc = Vec::new();
            assert!(matches!(
                prefix.write_to(&mut enc, 1),
                Err(Error::UnsupportedOperation(_))
            ));
            assert!(enc.is_empty());
        }
    }

    #[test]
    fn write_rejects_oversized_length() {
        let mut enc = Vec::new();
        let result = LengthPrefix::UInt8.write_to(&mut enc, 256);
        assert!(matches!(result, Err(Error::IllegalArgument(_))));
        assert!(enc.is_empty());
    }

    #[test]
    fn not_enough_bytes() {
        let mut src: &[u8] = &[0x01];
        assert!(matches!(
            LengthPrefix::UInt16.read_from(&mut src),
            Err(Error::UnexpectedEnd { expected: 2, .. })
        ));
        let mut src: &[u8] = &[0x01, 0x02, 0x03];
        assert!(matches!(
            LengthPrefix::UInt32.read_from(&mut src),
            Err(Error::UnexpectedEnd { expected: 4, actual: 3, .. })
        ));
    }
}
