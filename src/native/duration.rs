use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::reader::PackstreamReader;
use crate::writer::PackstreamWriter;

/// A calendar-aware amount of time. The four components are carried as-is: nanoseconds are not
/// folded into seconds, nor days into months.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Duration {
    pub months: i64,
    pub days: i64,
    pub seconds: i64,
    pub nanoseconds: i64,
}

impl Duration {
    pub fn new(months: i64, days: i64, seconds: i64, nanoseconds: i64) -> Self {
        Self {
            months,
            days,
            seconds,
            nanoseconds,
        }
    }
}

pub(crate) fn read_duration(buf: &mut PackstreamReader<'_>) -> Result<Duration> {
    Ok(Duration {
        months: buf.read_int()?,
        days: buf.read_int()?,
        seconds: buf.read_int()?,
        nanoseconds: buf.read_int()?,
    })
}

pub(crate) fn write_duration(buf: &mut PackstreamWriter, value: &Duration) -> Result<()> {
    buf.write_int(value.months)
        .write_int(value.days)
        .write_int(value.seconds)
        .write_int(value.nanoseconds);
    Ok(())
}
