use crate::error::{Error, Result};
use crate::marker::*;
use crate::structure::{StructHeader, StructRegistry};

/// Encodes values into an owned, growable buffer.
///
/// Writes that can't fail return `&mut Self` so they can be chained. Writes that can fail check
/// their arguments before emitting anything, and compound writes (lists written through a
/// callback, structs, dynamic values) truncate the buffer back to where they started if any
/// part of them fails. A failed write never leaves a partial value behind.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackstreamWriter {
    buf: Vec<u8>,
}

impl PackstreamWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Append to an existing buffer.
    pub fn from_vec(buf: Vec<u8>) -> Self {
        Self { buf }
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.buf
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn clear(&mut self) {
        self.buf.clear()
    }

    /// Run `f`, dropping everything it wrote if it fails.
    pub(crate) fn atomic(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<()>,
    ) -> Result<&mut Self> {
        let start = self.buf.len();
        match f(self) {
            Ok(()) => Ok(self),
            Err(e) => {
                self.buf.truncate(start);
                Err(e)
            }
        }
    }

    pub fn write_marker_byte(&mut self, byte: u8) -> &mut Self {
        self.buf.push(byte);
        self
    }

    /// Write a marker that carries no length.
    pub fn write_marker(&mut self, marker: TypeMarker) -> Result<&mut Self> {
        if marker == TypeMarker::Reserved {
            return Err(Error::IllegalArgument(String::from(
                "Reserved markers cannot be written",
            )));
        }
        if marker.has_length_prefix() {
            return Err(Error::IllegalArgument(format!(
                "{:?} requires a length",
                marker
            )));
        }
        Ok(self.write_marker_byte(marker.value()))
    }

    /// Write a marker along with its length, either folded into the marker byte or as a
    /// big-endian prefix after it.
    pub fn write_marker_with_length(&mut self, marker: TypeMarker, length: u64) -> Result<&mut Self> {
        if matches!(marker, TypeMarker::Struct8 | TypeMarker::Struct16) {
            return Err(Error::IllegalArgument(format!(
                "{:?} is deprecated and cannot be written",
                marker
            )));
        }
        if !marker.has_length_prefix() {
            return Err(Error::IllegalArgument(format!(
                "{:?} does not carry a length",
                marker
            )));
        }
        require_encodable_length(marker, length)?;
        if marker.is_nibble_marker() {
            return Ok(self.write_marker_byte(encode_length_nibble(marker, length as u8)));
        }
        self.buf.push(marker.value());
        marker.length_prefix().write_to(&mut self.buf, length)?;
        Ok(self)
    }

    /// Write the first marker of `markers` able to hold `length`.
    pub fn write_marker_from(&mut self, markers: &[TypeMarker], length: u64) -> Result<&mut Self> {
        match markers.iter().find(|m| m.can_encode_length(length)) {
            Some(&marker) => self.write_marker_with_length(marker, length),
            None => {
                let maxima: Vec<String> = markers
                    .iter()
                    .map(|m| format!("{:?}={}", m, m.length_prefix().max_value()))
                    .collect();
                Err(Error::IllegalArgument(format!(
                    "length {} exceeds every available marker ({})",
                    length,
                    maxima.join(", ")
                )))
            }
        }
    }

    fn write_sized_marker(&mut self, marker: TypeMarker, length: usize) -> Result<&mut Self> {
        self.write_marker_with_length(marker, length as u64)
    }

    pub fn write_null(&mut self) -> &mut Self {
        self.write_marker_byte(TypeMarker::Null.value())
    }

    pub fn write_boolean(&mut self, value: bool) -> &mut Self {
        let marker = if value { TypeMarker::True } else { TypeMarker::False };
        self.write_marker_byte(marker.value())
    }

    /// Write an integer in the narrowest encoding able to hold it.
    pub fn write_int(&mut self, value: i64) -> &mut Self {
        if (TINY_INT_MIN..=TINY_INT_MAX).contains(&value) {
            return self.write_marker_byte(value as i8 as u8);
        }
        if (INT8_MIN..TINY_INT_MIN).contains(&value) {
            return self.write_int8(value as i8);
        }
        if (INT16_MIN..=INT16_MAX).contains(&value) {
            return self.write_int16(value as i16);
        }
        if (INT32_MIN..=INT32_MAX).contains(&value) {
            return self.write_int32(value as i32);
        }
        self.write_int64(value)
    }

    /// Write a single-byte integer. Only values in the TinyInt range are accepted.
    pub fn write_tiny_int(&mut self, value: i8) -> Result<&mut Self> {
        if i64::from(value) < TINY_INT_MIN {
            return Err(Error::IllegalArgument(format!(
                "{} is outside the TinyInt range [{}, {}]",
                value, TINY_INT_MIN, TINY_INT_MAX
            )));
        }
        Ok(self.write_marker_byte(value as u8))
    }

    pub fn write_int8(&mut self, value: i8) -> &mut Self {
        self.buf.push(TypeMarker::Int8.value());
        self.buf.push(value as u8);
        self
    }

    pub fn write_int16(&mut self, value: i16) -> &mut Self {
        self.buf.push(TypeMarker::Int16.value());
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn write_int32(&mut self, value: i32) -> &mut Self {
        self.buf.push(TypeMarker::Int32.value());
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn write_int64(&mut self, value: i64) -> &mut Self {
        self.buf.push(TypeMarker::Int64.value());
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn write_float(&mut self, value: f64) -> &mut Self {
        self.buf.push(TypeMarker::Float64.value());
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    fn write_sized_bytes(&mut self, marker: TypeMarker, value: &[u8]) -> Result<&mut Self> {
        self.write_sized_marker(marker, value.len())?;
        self.buf.extend_from_slice(value);
        Ok(self)
    }

    /// Write a byte array with the narrowest length prefix able to hold it.
    pub fn write_bytes(&mut self, value: &[u8]) -> Result<&mut Self> {
        self.write_marker_from(BYTES_TYPES, value.len() as u64)?;
        self.buf.extend_from_slice(value);
        Ok(self)
    }

    pub fn write_bytes8(&mut self, value: &[u8]) -> Result<&mut Self> {
        self.write_sized_bytes(TypeMarker::Bytes8, value)
    }

    pub fn write_bytes16(&mut self, value: &[u8]) -> Result<&mut Self> {
        self.write_sized_bytes(TypeMarker::Bytes16, value)
    }

    pub fn write_bytes32(&mut self, value: &[u8]) -> Result<&mut Self> {
        self.write_sized_bytes(TypeMarker::Bytes32, value)
    }

    /// Write a string with the narrowest marker able to hold its UTF-8 length.
    pub fn write_string(&mut self, value: &str) -> Result<&mut Self> {
        self.write_marker_from(STRING_TYPES, value.len() as u64)?;
        self.buf.extend_from_slice(value.as_bytes());
        Ok(self)
    }

    pub fn write_tiny_string(&mut self, value: &str) -> Result<&mut Self> {
        self.write_sized_bytes(TypeMarker::TinyString, value.as_bytes())
    }

    pub fn write_string8(&mut self, value: &str) -> Result<&mut Self> {
        self.write_sized_bytes(TypeMarker::String8, value.as_bytes())
    }

    pub fn write_string16(&mut self, value: &str) -> Result<&mut Self> {
        self.write_sized_bytes(TypeMarker::String16, value.as_bytes())
    }

    pub fn write_string32(&mut self, value: &str) -> Result<&mut Self> {
        self.write_sized_bytes(TypeMarker::String32, value.as_bytes())
    }

    /// Write only the header of a list. Exactly `length` values must follow.
    pub fn write_list_header(&mut self, length: usize) -> Result<&mut Self> {
        self.write_marker_from(LIST_TYPES, length as u64)
    }

    fn write_elements<I, F>(&mut self, items: I, mut writer: F) -> Result<()>
    where
        I: Iterator,
        F: FnMut(&mut Self, I::Item) -> Result<()>,
    {
        for item in items {
            writer(self, item)?;
        }
        Ok(())
    }

    fn write_list_with<I, F>(&mut self, header: Option<TypeMarker>, items: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(&mut Self, I::Item) -> Result<()>,
    {
        let items = items.into_iter();
        let length = items.len();
        self.atomic(|buf| {
            match header {
                Some(marker) => buf.write_sized_marker(marker, length)?,
                None => buf.write_list_header(length)?,
            };
            buf.write_elements(items, writer)
        })
    }

    /// Write a list, encoding each element through `writer`.
    pub fn write_list<I, F>(&mut self, items: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(&mut Self, I::Item) -> Result<()>,
    {
        self.write_list_with(None, items, writer)
    }

    pub fn write_tiny_list<I, F>(&mut self, items: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(&mut Self, I::Item) -> Result<()>,
    {
        self.write_list_with(Some(TypeMarker::TinyList), items, writer)
    }

    pub fn write_list8<I, F>(&mut self, items: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(&mut Self, I::Item) -> Result<()>,
    {
        self.write_list_with(Some(TypeMarker::List8), items, writer)
    }

    pub fn write_list16<I, F>(&mut self, items: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(&mut Self, I::Item) -> Result<()>,
    {
        self.write_list_with(Some(TypeMarker::List16), items, writer)
    }

    pub fn write_list32<I, F>(&mut self, items: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator,
        F: FnMut(&mut Self, I::Item) -> Result<()>,
    {
        self.write_list_with(Some(TypeMarker::List32), items, writer)
    }

    /// Write only the header of a map. Exactly `length` key/value pairs must follow.
    pub fn write_map_header(&mut self, length: usize) -> Result<&mut Self> {
        self.write_marker_from(MAP_TYPES, length as u64)
    }

    fn write_map_with<I, K, V, F>(&mut self, header: Option<TypeMarker>, entries: I, mut writer: F) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        I::IntoIter: ExactSizeIterator,
        K: AsRef<str>,
        F: FnMut(&mut Self, V) -> Result<()>,
    {
        let entries = entries.into_iter();
        let length = entries.len();
        self.atomic(|buf| {
            match header {
                Some(marker) => buf.write_sized_marker(marker, length)?,
                None => buf.write_map_header(length)?,
            };
            for (key, value) in entries {
                buf.write_string(key.as_ref())?;
                writer(buf, value)?;
            }
            Ok(())
        })
    }

    /// Write a map, encoding each key as a string and each value through `writer`. Keys are
    /// written in iteration order and aren't checked for duplicates.
    pub fn write_map<I, K, V, F>(&mut self, entries: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        I::IntoIter: ExactSizeIterator,
        K: AsRef<str>,
        F: FnMut(&mut Self, V) -> Result<()>,
    {
        self.write_map_with(None, entries, writer)
    }

    pub fn write_tiny_map<I, K, V, F>(&mut self, entries: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        I::IntoIter: ExactSizeIterator,
        K: AsRef<str>,
        F: FnMut(&mut Self, V) -> Result<()>,
    {
        self.write_map_with(Some(TypeMarker::TinyMap), entries, writer)
    }

    pub fn write_map8<I, K, V, F>(&mut self, entries: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        I::IntoIter: ExactSizeIterator,
        K: AsRef<str>,
        F: FnMut(&mut Self, V) -> Result<()>,
    {
        self.write_map_with(Some(TypeMarker::Map8), entries, writer)
    }

    pub fn write_map16<I, K, V, F>(&mut self, entries: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        I::IntoIter: ExactSizeIterator,
        K: AsRef<str>,
        F: FnMut(&mut Self, V) -> Result<()>,
    {
        self.write_map_with(Some(TypeMarker::Map16), entries, writer)
    }

    pub fn write_map32<I, K, V, F>(&mut self, entries: I, writer: F) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, V)>,
        I::IntoIter: ExactSizeIterator,
        K: AsRef<str>,
        F: FnMut(&mut Self, V) -> Result<()>,
    {
        self.write_map_with(Some(TypeMarker::Map32), entries, writer)
    }

    /// Write a struct header: the TinyStruct marker with the field count, then the tag byte.
    pub fn write_struct_header(&mut self, header: StructHeader) -> Result<&mut Self> {
        self.write_marker_from(STRUCT_TYPES, header.length)?;
        Ok(self.write_marker_byte(header.tag))
    }

    /// Write a struct through whichever writer in the registry accepts `payload`.
    pub fn write_struct<C, S, R>(&mut self, ctx: &C, registry: &R, payload: &S) -> Result<&mut Self>
    where
        R: StructRegistry<C, S> + ?Sized,
    {
        let writer = registry.writer(payload).ok_or_else(|| {
            tracing::debug!("no struct writer accepts the payload");
            Error::IllegalArgument(String::from("Illegal struct: no writer accepts the payload"))
        })?;
        let header = StructHeader::new(writer.length(payload), writer.tag(payload));
        tracing::trace!(tag = header.tag, length = header.length, "encoding struct");
        self.atomic(|buf| {
            buf.write_struct_header(header)?;
            writer.write(ctx, buf, payload)
        })
    }
}
