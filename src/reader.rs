use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::marker::{decode_length_nibble, LogicalType, TypeMarker};
use crate::structure::{StructHeader, StructRegistry};

/// Largest length that can become a slice on this host.
const HOST_LIMIT: u64 = isize::MAX as u64;

/// Decodes values from a borrowed byte slice.
///
/// Every read consumes exactly one encoded value: the marker byte and its payload. Byte arrays and
/// strings are returned as slices of the source and live as long as it does; copy them out with
/// `to_vec`/`to_owned` to keep them past the source buffer.
///
/// A failed read does not rewind. Bytes consumed before the failure stay consumed, so callers that
/// want to retry or skip should [`peek`](Self::peek) first.
#[derive(Clone, Debug)]
pub struct PackstreamReader<'a> {
    data: &'a [u8],
    total: usize,
    limits: Limits,
    depth: usize,
}

impl<'a> PackstreamReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_limits(data, Limits::default())
    }

    pub fn with_limits(data: &'a [u8], limits: Limits) -> Self {
        Self {
            data,
            total: data.len(),
            limits,
            depth: 0,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.total - self.data.len()
    }

    /// The unread part of the input.
    pub fn remaining(&self) -> &'a [u8] {
        self.data
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Run `f` and put the cursor back where it was, whether `f` succeeded or not.
    pub fn peek<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let mark = self.data;
        let depth = self.depth;
        let result = f(self);
        self.data = mark;
        self.depth = depth;
        result
    }

    fn take(&mut self, len: usize, step: &'static str) -> Result<&'a [u8]> {
        if len > self.data.len() {
            return Err(Error::UnexpectedEnd {
                step,
                expected: len,
                actual: self.data.len(),
            });
        }
        let (bytes, rest) = self.data.split_at(len);
        self.data = rest;
        Ok(bytes)
    }

    fn check_limit(limit: u64, actual: u64) -> Result<()> {
        if actual > limit {
            tracing::debug!(limit, actual, "declared length exceeds limit");
            return Err(Error::LimitExceeded { limit, actual });
        }
        Ok(())
    }

    fn configured_limit(&self, ty: LogicalType) -> u64 {
        match ty {
            LogicalType::Bytes => self.limits.max_bytes_length,
            LogicalType::String => self.limits.max_string_length,
            LogicalType::List => self.limits.max_list_length,
            LogicalType::Map => self.limits.max_map_length,
            _ => u64::MAX,
        }
    }

    fn require_type(marker: TypeMarker, expected: LogicalType) -> Result<()> {
        if marker.logical_type() != expected {
            return Err(Error::UnexpectedType {
                expected,
                actual: marker,
            });
        }
        Ok(())
    }

    /// Run a read of nested values, failing if it would go past the depth limit.
    pub(crate) fn nested<R>(&mut self, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        if self.depth >= self.limits.max_depth {
            tracing::debug!(limit = self.limits.max_depth, "nesting depth limit reached");
            return Err(Error::DepthLimitExceeded(self.limits.max_depth));
        }
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        result
    }

    pub fn read_marker_byte(&mut self) -> Result<u8> {
        Ok(self.take(1, "read marker")?[0])
    }

    pub fn read_marker(&mut self) -> Result<TypeMarker> {
        self.read_marker_byte().map(TypeMarker::by_encoded)
    }

    /// Read a marker that must be exactly `expected`. Returns the nibble length for nibble
    /// markers and the raw marker byte otherwise.
    pub fn read_expected_marker(&mut self, expected: TypeMarker) -> Result<u64> {
        let byte = self.read_marker_byte()?;
        let actual = TypeMarker::by_encoded(byte);
        if actual != expected {
            return Err(Error::UnexpectedTypeMarker { expected, actual });
        }
        if expected.is_nibble_marker() {
            return Ok(decode_length_nibble(byte));
        }
        Ok(u64::from(byte))
    }

    /// Read any marker of the given type along with the length it declares. `limit` overrides the
    /// configured ceiling for the type.
    pub fn read_length_prefix_marker(
        &mut self,
        expected: LogicalType,
        limit: Option<u64>,
    ) -> Result<u64> {
        let byte = self.read_marker_byte()?;
        let marker = TypeMarker::by_encoded(byte);
        Self::require_type(marker, expected)?;
        let length = if marker.is_nibble_marker() {
            decode_length_nibble(byte)
        } else {
            marker.length_prefix().read_from(&mut self.data)?
        };
        Self::check_limit(limit.unwrap_or_else(|| self.configured_limit(expected)), length)?;
        Ok(length)
    }

    // Length of a value whose exact marker is known
    fn read_sized_length(&mut self, marker: TypeMarker) -> Result<u64> {
        let length = self.read_expected_marker(marker)?;
        let length = if marker.is_nibble_marker() {
            length
        } else {
            marker.length_prefix().read_from(&mut self.data)?
        };
        Self::check_limit(self.configured_limit(marker.logical_type()), length)?;
        Ok(length)
    }

    pub fn peek_marker_byte(&self) -> Result<u8> {
        self.data.first().copied().ok_or(Error::UnexpectedEnd {
            step: "peek marker",
            expected: 1,
            actual: 0,
        })
    }

    pub fn peek_marker(&self) -> Result<TypeMarker> {
        self.peek_marker_byte().map(TypeMarker::by_encoded)
    }

    pub fn peek_type(&self) -> Result<LogicalType> {
        self.peek_marker().map(TypeMarker::logical_type)
    }

    /// Skip one value of the given type without materializing it.
    pub fn skip_type(&mut self, ty: LogicalType) -> Result<()> {
        match ty {
            LogicalType::None => self.skip_null(),
            LogicalType::Boolean => self.skip_boolean(),
            LogicalType::Bytes => self.skip_bytes(None),
            LogicalType::Float => self.skip_float(),
            LogicalType::Int => self.skip_int(),
            LogicalType::List => self.skip_list(None),
            LogicalType::Map => self.skip_map(None),
            LogicalType::String => self.skip_string(None),
            LogicalType::Struct => self.skip_struct(),
            LogicalType::Reserved => Err(Error::IllegalArgument(String::from(
                "Unsupported data type: Reserved",
            ))),
        }
    }

    /// Skip the next value, whatever its type.
    pub fn skip(&mut self) -> Result<()> {
        let byte = self.peek_marker_byte()?;
        let marker = TypeMarker::by_encoded(byte);
        if marker == TypeMarker::Reserved {
            tracing::debug!(marker = byte, "reserved marker byte");
            return Err(Error::ReservedMarker(byte));
        }
        self.skip_type(marker.logical_type())
    }

    pub fn read_null(&mut self) -> Result<()> {
        self.read_expected_marker(TypeMarker::Null).map(|_| ())
    }

    pub fn skip_null(&mut self) -> Result<()> {
        self.read_null()
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        let marker = self.read_marker()?;
        Self::require_type(marker, LogicalType::Boolean)?;
        Ok(marker == TypeMarker::True)
    }

    pub fn skip_boolean(&mut self) -> Result<()> {
        self.read_boolean().map(|_| ())
    }

    /// Read an integer in any of its encodings.
    pub fn read_int(&mut self) -> Result<i64> {
        let byte = self.read_marker_byte()?;
        let marker = TypeMarker::by_encoded(byte);
        Self::require_type(marker, LogicalType::Int)?;
        match marker {
            TypeMarker::TinyInt => Ok(i64::from(byte as i8)),
            TypeMarker::Int8 => self.int8_payload().map(i64::from),
            TypeMarker::Int16 => self.int16_payload().map(i64::from),
            TypeMarker::Int32 => self.int32_payload().map(i64::from),
            _ => self.int64_payload(),
        }
    }

    pub fn skip_int(&mut self) -> Result<()> {
        let marker = self.read_marker()?;
        Self::require_type(marker, LogicalType::Int)?;
        let width = match marker {
            TypeMarker::TinyInt => 0,
            TypeMarker::Int8 => 1,
            TypeMarker::Int16 => 2,
            TypeMarker::Int32 => 4,
            _ => 8,
        };
        self.take(width, "skip Int").map(|_| ())
    }

    fn int8_payload(&mut self) -> Result<i8> {
        Ok(self.take(1, "decode Int8")?[0] as i8)
    }

    fn int16_payload(&mut self) -> Result<i16> {
        Ok(BigEndian::read_i16(self.take(2, "decode Int16")?))
    }

    fn int32_payload(&mut self) -> Result<i32> {
        Ok(BigEndian::read_i32(self.take(4, "decode Int32")?))
    }

    fn int64_payload(&mut self) -> Result<i64> {
        Ok(BigEndian::read_i64(self.take(8, "decode Int64")?))
    }

    pub fn read_tiny_int(&mut self) -> Result<i8> {
        self.read_expected_marker(TypeMarker::TinyInt)
            .map(|byte| byte as u8 as i8)
    }

    pub fn read_int8(&mut self) -> Result<i8> {
        self.read_expected_marker(TypeMarker::Int8)?;
        self.int8_payload()
    }

    pub fn read_int16(&mut self) -> Result<i16> {
        self.read_expected_marker(TypeMarker::Int16)?;
        self.int16_payload()
    }

    pub fn read_int32(&mut self) -> Result<i32> {
        self.read_expected_marker(TypeMarker::Int32)?;
        self.int32_payload()
    }

    pub fn read_int64(&mut self) -> Result<i64> {
        self.read_expected_marker(TypeMarker::Int64)?;
        self.int64_payload()
    }

    pub fn read_float(&mut self) -> Result<f64> {
        self.read_expected_marker(TypeMarker::Float64)?;
        Ok(BigEndian::read_f64(self.take(8, "decode Float64")?))
    }

    pub fn skip_float(&mut self) -> Result<()> {
        self.read_expected_marker(TypeMarker::Float64)?;
        self.take(8, "skip Float64").map(|_| ())
    }

    fn read_bytes_value(&mut self, length: u64, step: &'static str) -> Result<&'a [u8]> {
        Self::check_limit(HOST_LIMIT, length)?;
        self.take(length as usize, step)
    }

    fn read_sized_bytes(&mut self, marker: TypeMarker, step: &'static str) -> Result<&'a [u8]> {
        let length = self.read_sized_length(marker)?;
        self.read_bytes_value(length, step)
    }

    /// Read a byte array of any width. Fails with [`Error::LimitExceeded`] before touching the
    /// payload if the declared length is over `limit` (or the configured ceiling).
    pub fn read_bytes(&mut self, limit: Option<u64>) -> Result<&'a [u8]> {
        let length = self.read_length_prefix_marker(LogicalType::Bytes, limit)?;
        self.read_bytes_value(length, "read Bytes")
    }

    pub fn skip_bytes(&mut self, limit: Option<u64>) -> Result<()> {
        let length = self.read_length_prefix_marker(LogicalType::Bytes, limit)?;
        self.read_bytes_value(length, "skip Bytes").map(|_| ())
    }

    pub fn read_bytes8(&mut self) -> Result<&'a [u8]> {
        self.read_sized_bytes(TypeMarker::Bytes8, "read Bytes8")
    }

    pub fn read_bytes16(&mut self) -> Result<&'a [u8]> {
        self.read_sized_bytes(TypeMarker::Bytes16, "read Bytes16")
    }

    pub fn read_bytes32(&mut self) -> Result<&'a [u8]> {
        self.read_sized_bytes(TypeMarker::Bytes32, "read Bytes32")
    }

    fn read_string_value(&mut self, length: u64) -> Result<&'a str> {
        let bytes = self.read_bytes_value(length, "read String")?;
        Ok(std::str::from_utf8(bytes)?)
    }

    fn read_sized_string(&mut self, marker: TypeMarker) -> Result<&'a str> {
        let length = self.read_sized_length(marker)?;
        self.read_string_value(length)
    }

    /// Read a string of any width. The limit counts UTF-8 bytes.
    pub fn read_string(&mut self, limit: Option<u64>) -> Result<&'a str> {
        let length = self.read_length_prefix_marker(LogicalType::String, limit)?;
        self.read_string_value(length)
    }

    pub fn skip_string(&mut self, limit: Option<u64>) -> Result<()> {
        let length = self.read_length_prefix_marker(LogicalType::String, limit)?;
        self.read_bytes_value(length, "skip String").map(|_| ())
    }

    pub fn read_tiny_string(&mut self) -> Result<&'a str> {
        self.read_sized_string(TypeMarker::TinyString)
    }

    pub fn read_string8(&mut self) -> Result<&'a str> {
        self.read_sized_string(TypeMarker::String8)
    }

    pub fn read_string16(&mut self) -> Result<&'a str> {
        self.read_sized_string(TypeMarker::String16)
    }

    pub fn read_string32(&mut self) -> Result<&'a str> {
        self.read_sized_string(TypeMarker::String32)
    }

    fn read_list_value<O, F>(&mut self, length: u64, mut reader: F) -> Result<Vec<O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        Self::check_limit(HOST_LIMIT, length)?;
        // Every element takes at least one byte
        if length > self.data.len() as u64 {
            return Err(Error::UnexpectedEnd {
                step: "read List elements",
                expected: length as usize,
                actual: self.data.len(),
            });
        }
        self.nested(|buf| {
            let mut elements = Vec::with_capacity(length as usize);
            for _ in 0..length {
                elements.push(reader(buf)?);
            }
            Ok(elements)
        })
    }

    fn read_sized_list<O, F>(&mut self, marker: TypeMarker, reader: F) -> Result<Vec<O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        let length = self.read_sized_length(marker)?;
        self.read_list_value(length, reader)
    }

    /// Read a list of any width, decoding each element with `reader`.
    pub fn read_list<O, F>(&mut self, limit: Option<u64>, reader: F) -> Result<Vec<O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        let length = self.read_length_prefix_marker(LogicalType::List, limit)?;
        self.read_list_value(length, reader)
    }

    /// Skip a list. Elements are skipped one by one according to their own markers.
    pub fn skip_list(&mut self, limit: Option<u64>) -> Result<()> {
        let length = self.read_length_prefix_marker(LogicalType::List, limit)?;
        self.nested(|buf| {
            for _ in 0..length {
                buf.skip()?;
            }
            Ok(())
        })
    }

    pub fn read_tiny_list<O, F>(&mut self, reader: F) -> Result<Vec<O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        self.read_sized_list(TypeMarker::TinyList, reader)
    }

    pub fn read_list8<O, F>(&mut self, reader: F) -> Result<Vec<O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        self.read_sized_list(TypeMarker::List8, reader)
    }

    pub fn read_list16<O, F>(&mut self, reader: F) -> Result<Vec<O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        self.read_sized_list(TypeMarker::List16, reader)
    }

    pub fn read_list32<O, F>(&mut self, reader: F) -> Result<Vec<O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        self.read_sized_list(TypeMarker::List32, reader)
    }

    fn read_map_value<O, F>(&mut self, length: u64, mut reader: F) -> Result<BTreeMap<String, O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        Self::check_limit(HOST_LIMIT, length)?;
        // Every entry takes at least a key byte and a value byte
        if length.saturating_mul(2) > self.data.len() as u64 {
            return Err(Error::UnexpectedEnd {
                step: "read Map entries",
                expected: length.saturating_mul(2) as usize,
                actual: self.data.len(),
            });
        }
        self.nested(|buf| {
            let mut entries = BTreeMap::new();
            for _ in 0..length {
                let key = buf.read_string(None)?;
                if entries.contains_key(key) {
                    tracing::debug!(key, "duplicate map key");
                    return Err(Error::DuplicateMapKey(key.to_owned()));
                }
                let value = reader(buf)?;
                entries.insert(key.to_owned(), value);
            }
            Ok(entries)
        })
    }

    fn read_sized_map<O, F>(&mut self, marker: TypeMarker, reader: F) -> Result<BTreeMap<String, O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        let length = self.read_sized_length(marker)?;
        self.read_map_value(length, reader)
    }

    /// Read a map of any width, decoding each value with `reader`. A key appearing twice fails
    /// the whole read with [`Error::DuplicateMapKey`].
    pub fn read_map<O, F>(&mut self, limit: Option<u64>, reader: F) -> Result<BTreeMap<String, O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        let length = self.read_length_prefix_marker(LogicalType::Map, limit)?;
        self.read_map_value(length, reader)
    }

    /// Skip a map. Keys are not checked for duplicates.
    pub fn skip_map(&mut self, limit: Option<u64>) -> Result<()> {
        let length = self.read_length_prefix_marker(LogicalType::Map, limit)?;
        self.nested(|buf| {
            for _ in 0..length {
                buf.skip_string(None)?;
                buf.skip()?;
            }
            Ok(())
        })
    }

    pub fn read_tiny_map<O, F>(&mut self, reader: F) -> Result<BTreeMap<String, O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        self.read_sized_map(TypeMarker::TinyMap, reader)
    }

    pub fn read_map8<O, F>(&mut self, reader: F) -> Result<BTreeMap<String, O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        self.read_sized_map(TypeMarker::Map8, reader)
    }

    pub fn read_map16<O, F>(&mut self, reader: F) -> Result<BTreeMap<String, O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        self.read_sized_map(TypeMarker::Map16, reader)
    }

    pub fn read_map32<O, F>(&mut self, reader: F) -> Result<BTreeMap<String, O>>
    where
        F: FnMut(&mut Self) -> Result<O>,
    {
        self.read_sized_map(TypeMarker::Map32, reader)
    }

    /// Read the next struct header without consuming it.
    pub fn peek_struct_header(&mut self) -> Result<StructHeader> {
        self.peek(|buf| buf.read_struct_header())
    }

    pub fn read_struct_header(&mut self) -> Result<StructHeader> {
        let length = self.read_length_prefix_marker(LogicalType::Struct, None)?;
        let tag = self.take(1, "read Struct tag")?[0];
        Ok(StructHeader::new(length, tag))
    }

    /// Read a struct through the reader the registry holds for its tag.
    pub fn read_struct<C, O, R>(&mut self, ctx: &C, registry: &R) -> Result<O>
    where
        R: StructRegistry<C, O> + ?Sized,
    {
        let header = self.read_struct_header()?;
        let reader = registry.reader(&header).ok_or_else(|| {
            tracing::debug!(tag = header.tag, length = header.length, "no reader for struct");
            Error::UnexpectedStruct {
                tag: header.tag,
                length: header.length,
            }
        })?;
        tracing::trace!(tag = header.tag, length = header.length, "decoding struct");
        self.nested(|buf| reader.read(ctx, buf, header))
    }

    pub fn skip_struct(&mut self) -> Result<()> {
        let header = self.read_struct_header()?;
        self.nested(|buf| {
            for _ in 0..header.length {
                buf.skip()?;
            }
            Ok(())
        })
    }
}
