//! Date, time, duration, and point values carried as tagged structs.
//!
//! Every extension type has a fixed tag and field count. [`NativeValue::read`] peeks at the next
//! struct header and dispatches on its tag, [`NativeValue::write`] picks the struct form from the
//! value. For use alongside other struct families, [`registry`] exposes the same codecs through a
//! [`TaggedStructRegistry`].

mod duration;
mod spatial;
mod temporal;

pub use self::duration::Duration;
pub use self::spatial::{Crs, Point};
pub use self::temporal::{OffsetTime, Zone, ZonedDateTime};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reader::PackstreamReader;
use crate::structure::{StructHeader, StructReader, StructWriter, TaggedStructRegistry};
use crate::writer::PackstreamWriter;

/// The extension struct types and their tags.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NativeStructType {
    Date,
    Time,
    LocalTime,
    DateTime,
    DateTimeZoneId,
    LocalDateTime,
    Duration,
    Point2D,
    Point3D,
}

impl NativeStructType {
    pub const ALL: [NativeStructType; 9] = [
        NativeStructType::Date,
        NativeStructType::Time,
        NativeStructType::LocalTime,
        NativeStructType::DateTime,
        NativeStructType::DateTimeZoneId,
        NativeStructType::LocalDateTime,
        NativeStructType::Duration,
        NativeStructType::Point2D,
        NativeStructType::Point3D,
    ];

    pub const fn tag(self) -> u8 {
        match self {
            NativeStructType::Date => b'D',
            NativeStructType::Time => b'T',
            NativeStructType::LocalTime => b't',
            NativeStructType::DateTime => b'F',
            NativeStructType::DateTimeZoneId => b'f',
            NativeStructType::LocalDateTime => b'd',
            NativeStructType::Duration => b'E',
            NativeStructType::Point2D => b'X',
            NativeStructType::Point3D => b'Y',
        }
    }

    /// Number of fields the struct is written with.
    pub const fn default_size(self) -> u64 {
        match self {
            NativeStructType::Date | NativeStructType::LocalTime => 1,
            NativeStructType::Time | NativeStructType::LocalDateTime => 2,
            NativeStructType::DateTime
            | NativeStructType::DateTimeZoneId
            | NativeStructType::Point2D => 3,
            NativeStructType::Duration | NativeStructType::Point3D => 4,
        }
    }

    pub fn from_tag(tag: u8) -> Option<NativeStructType> {
        NativeStructType::ALL.iter().copied().find(|t| t.tag() == tag)
    }
}

/// A decoded extension value.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum NativeValue {
    Date(NaiveDate),
    LocalTime(NaiveTime),
    Time(OffsetTime),
    LocalDateTime(NaiveDateTime),
    /// Written as `DateTime` for fixed offsets and `DateTimeZoneId` for named zones.
    DateTime(ZonedDateTime),
    Duration(Duration),
    /// Written as `Point2D` or `Point3D` depending on whether `z` is set.
    Point(Point),
}

impl NativeValue {
    /// The struct form this value is written as.
    pub fn struct_type(&self) -> NativeStructType {
        match *self {
            NativeValue::Date(_) => NativeStructType::Date,
            NativeValue::LocalTime(_) => NativeStructType::LocalTime,
            NativeValue::Time(_) => NativeStructType::Time,
            NativeValue::LocalDateTime(_) => NativeStructType::LocalDateTime,
            NativeValue::DateTime(ref v) => match v.zone.canonical() {
                Ok(Zone::Named(_)) => NativeStructType::DateTimeZoneId,
                _ => NativeStructType::DateTime,
            },
            NativeValue::Duration(_) => NativeStructType::Duration,
            NativeValue::Point(ref p) => {
                if p.z.is_some() {
                    NativeStructType::Point3D
                } else {
                    NativeStructType::Point2D
                }
            }
        }
    }

    /// Read one extension struct. If the next struct's tag isn't an extension type, the cursor is
    /// left on its header and [`Error::UnexpectedStruct`] is returned.
    pub fn read(buf: &mut PackstreamReader<'_>) -> Result<NativeValue> {
        let header = buf.peek_struct_header()?;
        let ty = NativeStructType::from_tag(header.tag).ok_or_else(|| {
            tracing::debug!(tag = header.tag, length = header.length, "not an extension struct");
            Error::UnexpectedStruct {
                tag: header.tag,
                length: header.length,
            }
        })?;
        buf.read_struct_header()?;
        buf.nested(|buf| Self::read_fields(ty, buf, header))
    }

    fn read_fields(
        ty: NativeStructType,
        buf: &mut PackstreamReader<'_>,
        header: StructHeader,
    ) -> Result<NativeValue> {
        if header.length != ty.default_size() {
            tracing::debug!(tag = header.tag, length = header.length, "wrong extension struct size");
            return Err(Error::IllegalStructSize {
                tag: header.tag,
                expected: ty.default_size(),
                actual: header.length,
            });
        }
        match ty {
            NativeStructType::Date => temporal::read_date(buf).map(NativeValue::Date),
            NativeStructType::LocalTime => temporal::read_local_time(buf).map(NativeValue::LocalTime),
            NativeStructType::Time => temporal::read_time(buf).map(NativeValue::Time),
            NativeStructType::LocalDateTime => {
                temporal::read_local_datetime(buf).map(NativeValue::LocalDateTime)
            }
            NativeStructType::DateTime => temporal::read_datetime(buf).map(NativeValue::DateTime),
            NativeStructType::DateTimeZoneId => {
                temporal::read_datetime_zone_id(buf).map(NativeValue::DateTime)
            }
            NativeStructType::Duration => duration::read_duration(buf).map(NativeValue::Duration),
            NativeStructType::Point2D => spatial::read_point_2d(buf).map(NativeValue::Point),
            NativeStructType::Point3D => spatial::read_point_3d(buf).map(NativeValue::Point),
        }
    }

    /// Write this value as its extension struct. Nothing is written on failure.
    pub fn write(&self, buf: &mut PackstreamWriter) -> Result<()> {
        let ty = self.struct_type();
        buf.atomic(|buf| {
            buf.write_struct_header(StructHeader::new(ty.default_size(), ty.tag()))?;
            self.write_fields(buf)
        })?;
        Ok(())
    }

    fn write_fields(&self, buf: &mut PackstreamWriter) -> Result<()> {
        match *self {
            NativeValue::Date(ref v) => temporal::write_date(buf, v),
            NativeValue::LocalTime(ref v) => temporal::write_local_time(buf, v),
            NativeValue::Time(ref v) => temporal::write_time(buf, v),
            NativeValue::LocalDateTime(ref v) => temporal::write_local_datetime(buf, v),
            NativeValue::DateTime(ref v) => temporal::write_zoned_datetime(buf, v),
            NativeValue::Duration(ref v) => duration::write_duration(buf, v),
            NativeValue::Point(ref v) => spatial::write_point(buf, v),
        }
    }
}

macro_rules! impl_native_from {
    ($t: ty, $p: ident) => {
        impl From<$t> for NativeValue {
            fn from(v: $t) -> Self {
                NativeValue::$p(v)
            }
        }
    };
}

impl_native_from!(NaiveDate, Date);
impl_native_from!(NaiveTime, LocalTime);
impl_native_from!(OffsetTime, Time);
impl_native_from!(NaiveDateTime, LocalDateTime);
impl_native_from!(ZonedDateTime, DateTime);
impl_native_from!(Duration, Duration);
impl_native_from!(Point, Point);

/// Struct codec for one extension type, for use in a [`TaggedStructRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NativeCodec(pub NativeStructType);

impl<C> StructReader<C, NativeValue> for NativeCodec {
    fn read(&self, _: &C, buf: &mut PackstreamReader<'_>, header: StructHeader) -> Result<NativeValue> {
        NativeValue::read_fields(self.0, buf, header)
    }
}

impl<C> StructWriter<C, NativeValue> for NativeCodec {
    fn accepts(&self, payload: &NativeValue) -> bool {
        payload.struct_type() == self.0
    }

    fn tag(&self, _: &NativeValue) -> u8 {
        self.0.tag()
    }

    fn length(&self, _: &NativeValue) -> u64 {
        self.0.default_size()
    }

    fn write(&self, _: &C, buf: &mut PackstreamWriter, payload: &NativeValue) -> Result<()> {
        payload.write_fields(buf)
    }
}

/// A registry with a codec for every extension type.
pub fn registry<C>() -> TaggedStructRegistry<C, NativeValue> {
    NativeStructType::ALL
        .iter()
        .fold(TaggedStructRegistry::new(), |registry, &ty| {
            registry.with_codec(ty.tag(), NativeCodec(ty))
        })
}
