use std::collections::BTreeMap;
use std::ops::Index;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::error::{Error, Result};
use crate::marker::{LogicalType, TypeMarker};
use crate::reader::PackstreamReader;
use crate::structure::StructHeader;
use crate::writer::PackstreamWriter;

/// Largest number of fields a struct can be written with.
pub const MAX_STRUCT_FIELDS: usize = 15;

/// A decoded value of any type.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Bytes(Vec<u8>),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Struct(RawStruct),
}

/// A struct read without interpreting its tag.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RawStruct {
    pub tag: u8,
    pub fields: Vec<Value>,
}

impl RawStruct {
    pub fn new(tag: u8, fields: Vec<Value>) -> Self {
        Self { tag, fields }
    }

    pub fn header(&self) -> StructHeader {
        StructHeader::new(self.fields.len() as u64, self.tag)
    }
}

impl Value {
    pub fn logical_type(&self) -> LogicalType {
        match *self {
            Value::Null => LogicalType::None,
            Value::Bool(_) => LogicalType::Boolean,
            Value::Int(_) => LogicalType::Int,
            Value::Float(_) => LogicalType::Float,
            Value::Bytes(_) => LogicalType::Bytes,
            Value::String(_) => LogicalType::String,
            Value::List(_) => LogicalType::List,
            Value::Map(_) => LogicalType::Map,
            Value::Struct(_) => LogicalType::Struct,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let Value::Bool(val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        if let Value::Int(val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Value::Float(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let Value::String(ref val) = *self {
            Some(val.as_str())
        } else {
            None
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Value::Bytes(ref val) = *self {
            Some(val)
        } else {
            None
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        if let Value::List(ref list) = *self {
            Some(list)
        } else {
            None
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Value>> {
        match *self {
            Value::List(ref mut list) => Some(list),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        if let Value::Map(ref map) = *self {
            Some(map)
        } else {
            None
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match *self {
            Value::Map(ref mut map) => Some(map),
            _ => None,
        }
    }

    pub fn as_struct(&self) -> Option<&RawStruct> {
        match *self {
            Value::Struct(ref s) => Some(s),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Null
    }
}

static NULL: Value = Value::Null;

impl Index<usize> for Value {
    type Output = Value;

    fn index(&self, index: usize) -> &Self::Output {
        let item = match *self {
            Value::List(ref list) => list.get(index),
            Value::Struct(ref s) => s.fields.get(index),
            _ => None,
        };
        item.unwrap_or(&NULL)
    }
}

impl Index<&str> for Value {
    type Output = Value;

    fn index(&self, index: &str) -> &Self::Output {
        self.as_map().and_then(|v| v.get(index)).unwrap_or(&NULL)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match *self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(v),
            Value::Int(v) => serializer.serialize_i64(v),
            Value::Float(v) => serializer.serialize_f64(v),
            Value::Bytes(ref v) => serde_bytes::Bytes::new(v).serialize(serializer),
            Value::String(ref v) => serializer.serialize_str(v),
            Value::List(ref list) => {
                let mut seq = serializer.serialize_seq(Some(list.len()))?;
                for item in list {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Value::Map(ref map) => {
                let mut ser = serializer.serialize_map(Some(map.len()))?;
                for (k, v) in map {
                    ser.serialize_entry(k, v)?;
                }
                ser.end()
            }
            Value::Struct(ref s) => s.serialize(serializer),
        }
    }
}

macro_rules! impl_value_from_integer {
    ($t: ty) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::Int(i64::from(v))
            }
        }
    };
}

macro_rules! impl_value_from {
    ($t: ty, $p: ident) => {
        impl From<$t> for Value {
            fn from(v: $t) -> Self {
                Value::$p(v)
            }
        }
    };
}

impl_value_from!(bool, Bool);
impl_value_from!(i64, Int);
impl_value_from!(f64, Float);
impl_value_from!(String, String);
impl_value_from!(Vec<u8>, Bytes);
impl_value_from!(Vec<Value>, List);
impl_value_from!(BTreeMap<String, Value>, Map);
impl_value_from!(RawStruct, Struct);
impl_value_from_integer!(u8);
impl_value_from_integer!(u16);
impl_value_from_integer!(u32);
impl_value_from_integer!(i8);
impl_value_from_integer!(i16);
impl_value_from_integer!(i32);

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}

impl<'a> From<&'a str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_owned())
    }
}

impl<'a> From<&'a [u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Bytes(v.to_vec())
    }
}

impl<V: Into<Value>> From<Option<V>> for Value {
    fn from(v: Option<V>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<V: Into<Value>> std::iter::FromIterator<V> for Value {
    fn from_iter<T: IntoIterator<Item = V>>(iter: T) -> Self {
        Value::List(iter.into_iter().map(Into::into).collect())
    }
}

macro_rules! impl_value_try_from_unsigned {
    ($t: ty) => {
        impl TryFrom<$t> for Value {
            type Error = Error;
            fn try_from(v: $t) -> Result<Self> {
                i64::try_from(v).map(Value::Int).map_err(|_| {
                    Error::IllegalArgument(format!("{} does not fit a signed 64-bit integer", v))
                })
            }
        }
    };
}

impl_value_try_from_unsigned!(u64);
impl_value_try_from_unsigned!(usize);

macro_rules! impl_try_from_value {
    ($t: ty, $p: ident) => {
        impl TryFrom<Value> for $t {
            type Error = Value;
            fn try_from(v: Value) -> std::result::Result<Self, Self::Error> {
                match v {
                    Value::$p(v) => Ok(v),
                    _ => Err(v),
                }
            }
        }
    };
}

impl_try_from_value!(bool, Bool);
impl_try_from_value!(i64, Int);
impl_try_from_value!(f64, Float);
impl_try_from_value!(String, String);
impl_try_from_value!(Vec<u8>, Bytes);
impl_try_from_value!(Vec<Value>, List);
impl_try_from_value!(BTreeMap<String, Value>, Map);
impl_try_from_value!(RawStruct, Struct);

impl PackstreamWriter {
    /// Write a value tree using the most compact encoding for every node. Nothing is written if
    /// any part of the tree can't be encoded.
    pub fn write_value(&mut self, value: &Value) -> Result<&mut Self> {
        self.atomic(|buf| buf.write_value_inner(value))
    }

    fn write_value_inner(&mut self, value: &Value) -> Result<()> {
        match *value {
            Value::Null => {
                self.write_null();
            }
            Value::Bool(v) => {
                self.write_boolean(v);
            }
            Value::Int(v) => {
                self.write_int(v);
            }
            Value::Float(v) => {
                self.write_float(v);
            }
            Value::Bytes(ref v) => {
                self.write_bytes(v)?;
            }
            Value::String(ref v) => {
                self.write_string(v)?;
            }
            Value::List(ref list) => {
                self.write_list_header(list.len())?;
                for item in list {
                    self.write_value_inner(item)?;
                }
            }
            Value::Map(ref map) => {
                self.write_map_header(map.len())?;
                for (key, item) in map {
                    self.write_string(key)?;
                    self.write_value_inner(item)?;
                }
            }
            Value::Struct(ref s) => {
                if s.fields.len() > MAX_STRUCT_FIELDS {
                    return Err(Error::IllegalArgument(format!(
                        "struct 0x{:02X} has {} fields, at most {} can be written",
                        s.tag,
                        s.fields.len(),
                        MAX_STRUCT_FIELDS
                    )));
                }
                self.write_struct_header(s.header())?;
                for field in s.fields.iter() {
                    self.write_value_inner(field)?;
                }
            }
        }
        Ok(())
    }
}

impl<'a> PackstreamReader<'a> {
    /// Read the next value, whatever its type. Structs come back as [`RawStruct`]s; use a
    /// registry with [`read_struct`](Self::read_struct) to interpret them.
    pub fn read_value(&mut self) -> Result<Value> {
        let byte = self.peek_marker_byte()?;
        match TypeMarker::by_encoded(byte).logical_type() {
            LogicalType::None => self.read_null().map(|_| Value::Null),
            LogicalType::Boolean => self.read_boolean().map(Value::Bool),
            LogicalType::Int => self.read_int().map(Value::Int),
            LogicalType::Float => self.read_float().map(Value::Float),
            LogicalType::Bytes => self.read_bytes(None).map(|v| Value::Bytes(v.to_vec())),
            LogicalType::String => self.read_string(None).map(|v| Value::String(v.to_owned())),
            LogicalType::List => self.read_list(None, |buf| buf.read_value()).map(Value::List),
            LogicalType::Map => self.read_map(None, |buf| buf.read_value()).map(Value::Map),
            LogicalType::Struct => self.read_raw_struct().map(Value::Struct),
            LogicalType::Reserved => {
                tracing::debug!(marker = byte, "reserved marker byte");
                Err(Error::ReservedMarker(byte))
            }
        }
    }

    /// Read a struct of any tag, decoding each field as a generic value.
    pub fn read_raw_struct(&mut self) -> Result<RawStruct> {
        let header = self.read_struct_header()?;
        if header.length > self.remaining().len() as u64 {
            return Err(Error::UnexpectedEnd {
                step: "read Struct fields",
                expected: header.length as usize,
                actual: self.remaining().len(),
            });
        }
        let fields = self.nested(|buf| {
            (0..header.length)
                .map(|_| buf.read_value())
                .collect::<Result<Vec<Value>>>()
        })?;
        Ok(RawStruct::new(header.tag, fields))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::limits::Limits;

    fn sample() -> Value {
        let mut map = BTreeMap::new();
        map.insert(String::from("name"), Value::from("Ada"));
        map.insert(String::from("age"), Value::from(36));
        map.insert(String::from("scores"), vec![1.5f64, -2.0].into_iter().collect());
        map.insert(String::from("blob"), Value::from(vec![0u8, 1, 2]));
        map.insert(String::from("missing"), Value::Null);
        map.insert(
            String::from("node"),
            Value::from(RawStruct::new(b'N', vec![Value::from(7), Value::from(true)])),
        );
        Value::Map(map)
    }

    #[test]
    fn roundtrip() {
        let value = sample();
        let mut enc = PackstreamWriter::new();
        enc.write_value(&value).unwrap();
        let mut dec = PackstreamReader::new(enc.as_bytes());
        assert_eq!(dec.read_value().unwrap(), value);
        assert!(dec.is_empty());
    }

    #[test]
    fn compact_encoding() {
        let value: Value = vec![Value::from(42), Value::from("hi"), Value::Null]
            .into_iter()
            .collect();
        let mut enc = PackstreamWriter::new();
        enc.write_value(&value).unwrap();
        assert_eq!(enc.as_bytes(), &[0x93, 0x2A, 0x82, b'h', b'i', 0xC0]);
    }

    #[test]
    fn map_keys_in_order() {
        let mut map = BTreeMap::new();
        map.insert(String::from("b"), Value::from(2));
        map.insert(String::from("a"), Value::from(1));
        let mut enc = PackstreamWriter::new();
        enc.write_value(&Value::Map(map)).unwrap();
        assert_eq!(enc.as_bytes(), &[0xA2, 0x81, b'a', 0x01, 0x81, b'b', 0x02]);
    }

    #[test]
    fn struct_legacy_markers() {
        // Struct8 header with 2 fields
        let data = [0xDC, 0x02, b'Q', 0x01, 0x02];
        let mut dec = PackstreamReader::new(&data);
        let value = dec.read_value().unwrap();
        assert_eq!(
            value,
            Value::Struct(RawStruct::new(b'Q', vec![Value::Int(1), Value::Int(2)]))
        );
        // Rewritten with the tiny marker
        let mut enc = PackstreamWriter::new();
        enc.write_value(&value).unwrap();
        assert_eq!(enc.as_bytes(), &[0xB2, b'Q', 0x01, 0x02]);
        // Struct16
        let data = [0xDD, 0x00, 0x01, b'Q', 0xC0];
        let value = PackstreamReader::new(&data).read_value().unwrap();
        assert_eq!(value[0], Value::Null);
    }

    #[test]
    fn too_many_struct_fields() {
        let fields = vec![Value::Null; MAX_STRUCT_FIELDS + 1];
        let value = Value::List(vec![
            Value::from(1),
            Value::Struct(RawStruct::new(b'Z', fields)),
        ]);
        let mut enc = PackstreamWriter::new();
        enc.write_null();
        let result = enc.write_value(&value);
        assert!(matches!(result, Err(Error::IllegalArgument(_))));
        // The list header and its first element are gone as well
        assert_eq!(enc.as_bytes(), &[0xC0]);
    }

    #[test]
    fn reserved_marker() {
        let data = [0x92, 0x01, 0xDE];
        let result = PackstreamReader::new(&data).read_value();
        assert_eq!(result, Err(Error::ReservedMarker(0xDE)));
    }

    #[test]
    fn truncated() {
        let value = sample();
        let mut enc = PackstreamWriter::new();
        enc.write_value(&value).unwrap();
        let bytes = enc.into_inner();
        for len in 0..bytes.len() {
            let result = PackstreamReader::new(&bytes[..len]).read_value();
            assert!(result.is_err(), "decoded from {} of {} bytes", len, bytes.len());
        }
    }

    #[test]
    fn struct_length_larger_than_input() {
        let data = [0xDD, 0xFF, 0xFF, b'Q'];
        let result = PackstreamReader::new(&data).read_value();
        assert!(matches!(result, Err(Error::UnexpectedEnd { .. })));
    }

    #[test]
    fn depth_limit() {
        let mut value = Value::Null;
        for _ in 0..10 {
            value = Value::List(vec![value]);
        }
        let mut enc = PackstreamWriter::new();
        enc.write_value(&value).unwrap();
        let limits = Limits {
            max_depth: 9,
            ..Limits::default()
        };
        let mut dec = PackstreamReader::with_limits(enc.as_bytes(), limits);
        assert_eq!(dec.read_value(), Err(Error::DepthLimitExceeded(9)));
        let mut dec = PackstreamReader::new(enc.as_bytes());
        assert_eq!(dec.read_value().unwrap(), value);
    }

    #[test]
    fn index() {
        let value = sample();
        assert_eq!(value["name"].as_str(), Some("Ada"));
        assert_eq!(value["scores"][1].as_float(), Some(-2.0));
        assert_eq!(value["node"][0].as_int(), Some(7));
        assert!(value["nope"].is_null());
        assert!(value["name"][3].is_null());
    }

    #[test]
    fn conversions() {
        assert_eq!(Value::from(7u8), Value::Int(7));
        assert_eq!(Value::from(-7i16), Value::Int(-7));
        assert_eq!(Value::from(1.5f32), Value::Float(1.5));
        assert_eq!(Value::from(()), Value::Null);
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("x")), Value::String(String::from("x")));
        assert_eq!(Value::try_from(u64::MAX >> 1).unwrap(), Value::Int(i64::MAX));
        assert!(matches!(
            Value::try_from(u64::MAX),
            Err(Error::IllegalArgument(_))
        ));
        assert_eq!(i64::try_from(Value::Int(3)), Ok(3));
        assert_eq!(String::try_from(Value::Int(3)), Err(Value::Int(3)));
        assert_eq!(Value::from("x").logical_type(), LogicalType::String);
    }

    #[test]
    fn serialize() {
        let value = sample();
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json["name"], "Ada");
        assert_eq!(json["age"], 36);
        assert_eq!(json["blob"], serde_json::json!([0, 1, 2]));
        assert!(json["missing"].is_null());
        assert_eq!(json["node"]["tag"], 78);
        assert_eq!(json["node"]["fields"][1], true);
    }
}
