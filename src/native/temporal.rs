use std::fmt;
use std::sync::OnceLock;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeDelta, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reader::PackstreamReader;
use crate::writer::PackstreamWriter;

const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_DAY: i64 = 86_400 * NANOS_PER_SECOND;
/// Days from 0001-01-01 (day 1 of the common era) to 1970-01-01.
const UNIX_EPOCH_DAY_FROM_CE: i64 = 719_163;

/// A time of day with a fixed UTC offset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OffsetTime {
    pub time: NaiveTime,
    pub offset_seconds: i32,
}

impl OffsetTime {
    pub fn new(time: NaiveTime, offset: FixedOffset) -> Self {
        Self {
            time,
            offset_seconds: offset.local_minus_utc(),
        }
    }

    pub fn offset(&self) -> Result<FixedOffset> {
        offset_from_seconds(i64::from(self.offset_seconds))
    }
}

/// The zone part of a zoned date-time.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Zone {
    /// Seconds east of UTC.
    Offset(i32),
    /// A time-zone database identifier, like `Europe/Stockholm`.
    Named(String),
}

fn offset_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([+-])(\d{2})(?::?(\d{2})(?::?(\d{2}))?)?$").expect("offset pattern is valid")
    })
}

fn zone_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z][A-Za-z0-9_.+-]*(?:/[A-Za-z0-9_.+-]+)*$")
            .expect("zone id pattern is valid")
    })
}

impl Zone {
    /// Classify a zone id: `Z`, `UTC` and `±HH[:MM[:SS]]` forms become fixed offsets, anything else
    /// that looks like a tz database name becomes a named zone.
    pub fn parse(id: &str) -> Result<Zone> {
        if id == "Z" || id == "UTC" {
            return Ok(Zone::Offset(0));
        }
        if let Some(caps) = offset_regex().captures(id) {
            let part = |i: usize| -> i64 {
                caps.get(i)
                    .and_then(|m| m.as_str().parse::<i64>().ok())
                    .unwrap_or(0)
            };
            let (hours, minutes, seconds) = (part(2), part(3), part(4));
            if minutes > 59 || seconds > 59 {
                return Err(Error::IllegalArgument(format!("invalid zone offset \"{}\"", id)));
            }
            let mut total = hours * 3600 + minutes * 60 + seconds;
            if &caps[1] == "-" {
                total = -total;
            }
            let offset = offset_from_seconds(total)
                .map_err(|_| Error::IllegalArgument(format!("zone offset \"{}\" out of range", id)))?;
            return Ok(Zone::Offset(offset.local_minus_utc()));
        }
        if zone_id_regex().is_match(id) {
            return Ok(Zone::Named(id.to_owned()));
        }
        Err(Error::IllegalArgument(format!("invalid zone id \"{}\"", id)))
    }

    pub fn offset(&self) -> Option<i32> {
        match *self {
            Zone::Offset(seconds) => Some(seconds),
            Zone::Named(_) => None,
        }
    }

    /// The form this zone goes on the wire as. Named ids that are really offsets (`UTC`, `+01:00`)
    /// become [`Zone::Offset`], and ids that aren't zones at all are rejected.
    pub fn canonical(&self) -> Result<Zone> {
        match *self {
            Zone::Offset(seconds) => {
                offset_for_write(seconds)?;
                Ok(Zone::Offset(seconds))
            }
            Zone::Named(ref id) => Zone::parse(id),
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Zone::Offset(0) => f.write_str("Z"),
            Zone::Offset(seconds) => {
                let sign = if seconds < 0 { '-' } else { '+' };
                let abs = seconds.unsigned_abs();
                write!(f, "{}{:02}:{:02}", sign, abs / 3600, (abs / 60) % 60)?;
                if abs % 60 != 0 {
                    write!(f, ":{:02}", abs % 60)?;
                }
                Ok(())
            }
            Zone::Named(ref name) => f.write_str(name),
        }
    }
}

/// A wall-clock date-time in a zone.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ZonedDateTime {
    /// Local date and time as read on a clock in `zone`.
    pub datetime: NaiveDateTime,
    pub zone: Zone,
}

impl ZonedDateTime {
    pub fn new(datetime: NaiveDateTime, zone: Zone) -> Self {
        Self { datetime, zone }
    }

    pub fn from_fixed(datetime: DateTime<FixedOffset>) -> Self {
        Self {
            datetime: datetime.naive_local(),
            zone: Zone::Offset(datetime.offset().local_minus_utc()),
        }
    }
}

fn offset_from_seconds(seconds: i64) -> Result<FixedOffset> {
    let fits = i32::try_from(seconds).map_err(|_| {
        Error::illegal_struct_argument(
            "tz_offset_seconds",
            format!("{} does not fit a 32-bit offset", seconds),
        )
    })?;
    FixedOffset::east_opt(fits).ok_or_else(|| {
        Error::illegal_struct_argument(
            "tz_offset_seconds",
            format!("{} is not a valid UTC offset", seconds),
        )
    })
}

fn offset_for_write(seconds: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(seconds)
        .ok_or_else(|| Error::IllegalArgument(format!("{} is not a valid UTC offset", seconds)))
}

fn time_from_nanos(nanos: i64) -> Result<NaiveTime> {
    if !(0..NANOS_PER_DAY).contains(&nanos) {
        return Err(Error::illegal_struct_argument(
            "nanoseconds_of_day",
            format!("{} is outside of a day", nanos),
        ));
    }
    let seconds = (nanos / NANOS_PER_SECOND) as u32;
    let fraction = (nanos % NANOS_PER_SECOND) as u32;
    NaiveTime::from_num_seconds_from_midnight_opt(seconds, fraction).ok_or_else(|| {
        Error::illegal_struct_argument("nanoseconds_of_day", format!("{} is not a time", nanos))
    })
}

fn nanos_of_day(time: &NaiveTime) -> Result<i64> {
    if i64::from(time.nanosecond()) >= NANOS_PER_SECOND {
        return Err(Error::IllegalArgument(format!(
            "leap second {} cannot be encoded",
            time
        )));
    }
    Ok(i64::from(time.num_seconds_from_midnight()) * NANOS_PER_SECOND + i64::from(time.nanosecond()))
}

fn datetime_from_epoch(seconds: i64, nanos: i64) -> Result<NaiveDateTime> {
    if !(0..NANOS_PER_SECOND).contains(&nanos) {
        return Err(Error::illegal_struct_argument(
            "nanoseconds",
            format!("{} is outside of a second", nanos),
        ));
    }
    DateTime::from_timestamp(seconds, nanos as u32)
        .map(|dt| dt.naive_utc())
        .ok_or_else(|| {
            Error::illegal_struct_argument("seconds", format!("{} is out of the calendar range", seconds))
        })
}

fn epoch_of(datetime: &NaiveDateTime) -> Result<(i64, i64)> {
    let utc = datetime.and_utc();
    let nanos = i64::from(utc.timestamp_subsec_nanos());
    if nanos >= NANOS_PER_SECOND {
        return Err(Error::IllegalArgument(format!(
            "leap second {} cannot be encoded",
            datetime
        )));
    }
    Ok((utc.timestamp(), nanos))
}

pub(crate) fn read_date(buf: &mut PackstreamReader<'_>) -> Result<NaiveDate> {
    let days = buf.read_int()?;
    days.checked_add(UNIX_EPOCH_DAY_FROM_CE)
        .and_then(|d| i32::try_from(d).ok())
        .and_then(NaiveDate::from_num_days_from_ce_opt)
        .ok_or_else(|| {
            Error::illegal_struct_argument("epoch_day", format!("{} is out of the calendar range", days))
        })
}

pub(crate) fn write_date(buf: &mut PackstreamWriter, date: &NaiveDate) -> Result<()> {
    buf.write_int(i64::from(date.num_days_from_ce()) - UNIX_EPOCH_DAY_FROM_CE);
    Ok(())
}

pub(crate) fn read_local_time(buf: &mut PackstreamReader<'_>) -> Result<NaiveTime> {
    let nanos = buf.read_int()?;
    time_from_nanos(nanos)
}

pub(crate) fn write_local_time(buf: &mut PackstreamWriter, time: &NaiveTime) -> Result<()> {
    buf.write_int(nanos_of_day(time)?);
    Ok(())
}

pub(crate) fn read_time(buf: &mut PackstreamReader<'_>) -> Result<OffsetTime> {
    let time = time_from_nanos(buf.read_int()?)?;
    let offset = offset_from_seconds(buf.read_int()?)?;
    Ok(OffsetTime::new(time, offset))
}

pub(crate) fn write_time(buf: &mut PackstreamWriter, time: &OffsetTime) -> Result<()> {
    let offset = offset_for_write(time.offset_seconds)?;
    buf.write_int(nanos_of_day(&time.time)?)
        .write_int(i64::from(offset.local_minus_utc()));
    Ok(())
}

pub(crate) fn read_local_datetime(buf: &mut PackstreamReader<'_>) -> Result<NaiveDateTime> {
    let seconds = buf.read_int()?;
    let nanos = buf.read_int()?;
    datetime_from_epoch(seconds, nanos)
}

pub(crate) fn write_local_datetime(buf: &mut PackstreamWriter, datetime: &NaiveDateTime) -> Result<()> {
    let (seconds, nanos) = epoch_of(datetime)?;
    buf.write_int(seconds).write_int(nanos);
    Ok(())
}

/// A date-time with a fixed offset. The seconds field holds the local wall-clock time.
pub(crate) fn read_datetime(buf: &mut PackstreamReader<'_>) -> Result<ZonedDateTime> {
    let seconds = buf.read_int()?;
    let nanos = buf.read_int()?;
    let offset = offset_from_seconds(buf.read_int()?)?;
    let datetime = datetime_from_epoch(seconds, nanos)?;
    // The instant must exist too, not just the wall-clock reading
    let offset_seconds = offset.local_minus_utc();
    datetime
        .checked_sub_signed(TimeDelta::seconds(i64::from(offset_seconds)))
        .ok_or_else(|| {
            Error::illegal_struct_argument(
                "seconds",
                format!("{} with offset {} is out of the calendar range", seconds, offset_seconds),
            )
        })?;
    Ok(ZonedDateTime::new(datetime, Zone::Offset(offset_seconds)))
}

pub(crate) fn read_datetime_zone_id(buf: &mut PackstreamReader<'_>) -> Result<ZonedDateTime> {
    let seconds = buf.read_int()?;
    let nanos = buf.read_int()?;
    let id = buf.read_string(None)?;
    let zone = Zone::parse(id).map_err(|_| {
        Error::illegal_struct_argument("tz_id", format!("\"{}\" is not a zone id", id))
    })?;
    let datetime = datetime_from_epoch(seconds, nanos)?;
    Ok(ZonedDateTime::new(datetime, zone))
}

/// Write the fields of either zoned form; which one is decided by the zone.
pub(crate) fn write_zoned_datetime(buf: &mut PackstreamWriter, value: &ZonedDateTime) -> Result<()> {
    let (seconds, nanos) = epoch_of(&value.datetime)?;
    match value.zone.canonical()? {
        Zone::Offset(offset) => {
            buf.write_int(seconds).write_int(nanos).write_int(i64::from(offset));
        }
        Zone::Named(ref id) => {
            buf.write_int(seconds).write_int(nanos);
            buf.write_string(id)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn zone_parse() {
        let cases = [
            ("Z", Zone::Offset(0)),
            ("UTC", Zone::Offset(0)),
            ("+01:00", Zone::Offset(3600)),
            ("-0530", Zone::Offset(-19800)),
            ("+02", Zone::Offset(7200)),
            ("+01:00:30", Zone::Offset(3630)),
            ("Europe/Stockholm", Zone::Named(String::from("Europe/Stockholm"))),
            ("America/Argentina/Buenos_Aires", Zone::Named(String::from("America/Argentina/Buenos_Aires"))),
            ("Etc/GMT+5", Zone::Named(String::from("Etc/GMT+5"))),
        ];
        for (id, expected) in cases {
            assert_eq!(Zone::parse(id).unwrap(), expected, "{}", id);
        }
        for bad in ["", "+1:00", "+01:75", "+25:00", "Europe//Paris", "/UTC", "Mars Base"] {
            assert!(
                matches!(Zone::parse(bad), Err(Error::IllegalArgument(_))),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn zone_display() {
        assert_eq!(Zone::Offset(0).to_string(), "Z");
        assert_eq!(Zone::Offset(-19800).to_string(), "-05:30");
        assert_eq!(Zone::Offset(3630).to_string(), "+01:00:30");
        assert_eq!(Zone::Named(String::from("Asia/Tokyo")).to_string(), "Asia/Tokyo");
        for zone in [Zone::Offset(-19800), Zone::Offset(3630)] {
            assert_eq!(Zone::parse(&zone.to_string()).unwrap(), zone);
        }
    }

    #[test]
    fn zone_canonical() {
        let named = |id: &str| Zone::Named(String::from(id));
        assert_eq!(named("UTC").canonical().unwrap(), Zone::Offset(0));
        assert_eq!(named("+01:00").canonical().unwrap(), Zone::Offset(3600));
        assert_eq!(named("Asia/Tokyo").canonical().unwrap(), named("Asia/Tokyo"));
        assert_eq!(Zone::Offset(-3600).canonical().unwrap(), Zone::Offset(-3600));
        for bad in [named(""), named("not a zone"), Zone::Offset(86_400)] {
            assert!(
                matches!(bad.canonical(), Err(Error::IllegalArgument(_))),
                "{:?}",
                bad
            );
        }
    }

    #[test]
    fn nanos_of_day_bounds() {
        assert_eq!(time_from_nanos(0).unwrap(), NaiveTime::from_hms_opt(0, 0, 0).unwrap());
        let last = time_from_nanos(NANOS_PER_DAY - 1).unwrap();
        assert_eq!(nanos_of_day(&last).unwrap(), NANOS_PER_DAY - 1);
        assert!(time_from_nanos(NANOS_PER_DAY).is_err());
        assert!(time_from_nanos(-1).is_err());
    }

    #[test]
    fn offset_bounds() {
        assert!(offset_from_seconds(86_399).is_ok());
        assert!(offset_from_seconds(86_400).is_err());
        match offset_from_seconds(i64::from(i32::MAX) + 1) {
            Err(Error::IllegalStructArgument { field, .. }) => assert_eq!(field, "tz_offset_seconds"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn epoch_conversion() {
        let dt = NaiveDate::from_ymd_opt(2021, 3, 4)
            .unwrap()
            .and_hms_nano_opt(5, 6, 7, 8)
            .unwrap();
        let (seconds, nanos) = epoch_of(&dt).unwrap();
        assert_eq!(seconds, 1_614_834_367);
        assert_eq!(nanos, 8);
        assert_eq!(datetime_from_epoch(seconds, nanos).unwrap(), dt);
        assert!(datetime_from_epoch(0, NANOS_PER_SECOND).is_err());
        assert!(datetime_from_epoch(i64::MAX, 0).is_err());
    }
}
