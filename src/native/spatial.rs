use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::reader::PackstreamReader;
use crate::writer::PackstreamWriter;

/// Coordinate reference systems a point can be expressed in.
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    Cartesian,
    Cartesian3D,
    Wgs84,
    Wgs84_3D,
}

impl Crs {
    pub const ALL: [Crs; 4] = [Crs::Cartesian, Crs::Cartesian3D, Crs::Wgs84, Crs::Wgs84_3D];

    /// The EPSG/SR-ORG code sent on the wire.
    pub const fn srid(self) -> i32 {
        match self {
            Crs::Cartesian => 7203,
            Crs::Cartesian3D => 9157,
            Crs::Wgs84 => 4326,
            Crs::Wgs84_3D => 4979,
        }
    }

    pub const fn dimension(self) -> usize {
        match self {
            Crs::Cartesian | Crs::Wgs84 => 2,
            Crs::Cartesian3D | Crs::Wgs84_3D => 3,
        }
    }

    pub const fn is_geographic(self) -> bool {
        matches!(self, Crs::Wgs84 | Crs::Wgs84_3D)
    }

    pub fn from_srid(srid: i32) -> Option<Crs> {
        Crs::ALL.iter().copied().find(|crs| crs.srid() == srid)
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Crs::Cartesian => "cartesian",
            Crs::Cartesian3D => "cartesian-3d",
            Crs::Wgs84 => "wgs-84",
            Crs::Wgs84_3D => "wgs-84-3d",
        };
        f.write_str(name)
    }
}

/// A 2D or 3D point. `z` is present exactly when the CRS is three-dimensional.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub crs: Crs,
    pub x: f64,
    pub y: f64,
    pub z: Option<f64>,
}

impl Point {
    pub fn new_2d(crs: Crs, x: f64, y: f64) -> Result<Self> {
        let point = Self { crs, x, y, z: None };
        point.validate()?;
        Ok(point)
    }

    pub fn new_3d(crs: Crs, x: f64, y: f64, z: f64) -> Result<Self> {
        let point = Self {
            crs,
            x,
            y,
            z: Some(z),
        };
        point.validate()?;
        Ok(point)
    }

    pub fn dimension(&self) -> usize {
        if self.z.is_some() {
            3
        } else {
            2
        }
    }

    /// Check the coordinates against the CRS.
    pub fn validate(&self) -> Result<()> {
        if self.crs.dimension() != self.dimension() {
            return Err(Error::illegal_struct_argument(
                "crs",
                format!(
                    "{} is {}-dimensional but the point has {} coordinates",
                    self.crs,
                    self.crs.dimension(),
                    self.dimension()
                ),
            ));
        }
        let coords = [("x", Some(self.x)), ("y", Some(self.y)), ("z", self.z)];
        for (field, value) in coords {
            if let Some(value) = value {
                if !value.is_finite() {
                    return Err(Error::illegal_struct_argument(
                        field,
                        format!("coordinate must be finite, got {}", value),
                    ));
                }
            }
        }
        if self.crs.is_geographic() && !(-180.0..=180.0).contains(&self.x) {
            return Err(Error::illegal_struct_argument(
                "x",
                format!("longitude must be within [-180, 180], got {}", self.x),
            ));
        }
        if self.crs.is_geographic() && !(-90.0..=90.0).contains(&self.y) {
            return Err(Error::illegal_struct_argument(
                "y",
                format!("latitude must be within [-90, 90], got {}", self.y),
            ));
        }
        Ok(())
    }
}

fn read_crs(buf: &mut PackstreamReader<'_>, dimension: usize) -> Result<Crs> {
    let srid = buf.read_int()?;
    let srid = i32::try_from(srid).map_err(|_| {
        Error::illegal_struct_argument("crs", format!("{} does not fit a 32-bit code", srid))
    })?;
    let crs = Crs::from_srid(srid).ok_or_else(|| {
        Error::illegal_struct_argument("crs", format!("unknown coordinate reference system {}", srid))
    })?;
    if crs.dimension() != dimension {
        return Err(Error::illegal_struct_argument(
            "crs",
            format!("{} ({}) cannot hold a {}D point", crs, srid, dimension),
        ));
    }
    Ok(crs)
}

pub(crate) fn read_point_2d(buf: &mut PackstreamReader<'_>) -> Result<Point> {
    let crs = read_crs(buf, 2)?;
    let x = buf.read_float()?;
    let y = buf.read_float()?;
    Point::new_2d(crs, x, y)
}

pub(crate) fn read_point_3d(buf: &mut PackstreamReader<'_>) -> Result<Point> {
    let crs = read_crs(buf, 3)?;
    let x = buf.read_float()?;
    let y = buf.read_float()?;
    let z = buf.read_float()?;
    Point::new_3d(crs, x, y, z)
}

pub(crate) fn write_point(buf: &mut PackstreamWriter, point: &Point) -> Result<()> {
    point.validate()?;
    buf.write_int(i64::from(point.crs.srid()))
        .write_float(point.x)
        .write_float(point.y);
    if let Some(z) = point.z {
        buf.write_float(z);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn srid_lookup() {
        for crs in Crs::ALL {
            assert_eq!(Crs::from_srid(crs.srid()), Some(crs));
        }
        assert_eq!(Crs::from_srid(0), None);
        assert_eq!(Crs::from_srid(4327), None);
    }

    #[test]
    fn validation() {
        assert!(Point::new_2d(Crs::Cartesian, 1.0, 2.0).is_ok());
        assert!(Point::new_3d(Crs::Wgs84_3D, 12.5, 55.6, 10.0).is_ok());
        let cases = [
            (Point::new_2d(Crs::Cartesian3D, 1.0, 2.0), "crs"),
            (Point::new_3d(Crs::Wgs84, 1.0, 2.0, 3.0), "crs"),
            (Point::new_2d(Crs::Cartesian, f64::NAN, 2.0), "x"),
            (Point::new_2d(Crs::Cartesian, 1.0, f64::INFINITY), "y"),
            (Point::new_3d(Crs::Cartesian3D, 1.0, 2.0, f64::NEG_INFINITY), "z"),
            (Point::new_2d(Crs::Wgs84, 10.0, 90.5), "y"),
            (Point::new_2d(Crs::Wgs84, 1000.0, 0.0), "x"),
            (Point::new_3d(Crs::Wgs84_3D, -180.5, 0.0, 0.0), "x"),
        ];
        for (result, expected) in cases {
            match result {
                Err(Error::IllegalStructArgument { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected failure on {}, got {:?}", expected, other),
            }
        }
        assert!(Point::new_2d(Crs::Wgs84, -180.0, 90.0).is_ok());
        // Latitude and longitude bounds don't apply to cartesian points
        assert!(Point::new_2d(Crs::Cartesian, 1000.0, 90.5).is_ok());
    }
}
