//! packstream is a compact, self-describing binary encoding for typed values: null, booleans,
//! integers, floats, byte arrays, strings, lists, string-keyed maps, and tagged structs.
//!
//! Every value starts with a marker byte that names its type and, for short values, its length.
//! Small integers are stored in the marker byte itself, and lengths up to 15 fold into the low
//! nibble of the marker. Larger values carry an explicit big-endian length prefix. Writers always
//! pick the most compact encoding; readers accept every valid encoding.
//!
//! - [`PackstreamWriter`] appends encoded values to an owned buffer.
//! - [`PackstreamReader`] decodes from a borrowed slice, with [`Limits`] guarding every declared
//!   length against hostile input.
//! - [`Value`] is a generic tree for when the shape of the data isn't known ahead of time.
//! - Structs are decoded through a [`StructRegistry`] that maps tag bytes to codecs. The
//!   [`native`] module provides codecs for dates, times, durations, and spatial points.
//!
//! ```
//! use packstream::{PackstreamReader, PackstreamWriter};
//!
//! let mut enc = PackstreamWriter::new();
//! enc.write_list(["a", "b"], |buf, s| {
//!     buf.write_string(s)?;
//!     Ok(())
//! })?;
//! assert_eq!(enc.as_bytes(), &[0x92, 0x81, b'a', 0x81, b'b']);
//!
//! let mut dec = PackstreamReader::new(enc.as_bytes());
//! let list = dec.read_list(None, |buf| buf.read_string(None).map(str::to_owned))?;
//! assert_eq!(list, vec!["a", "b"]);
//! # Ok::<(), packstream::Error>(())
//! ```

mod error;
mod length_prefix;
mod limits;
mod marker;
mod reader;
mod structure;
mod value;
mod writer;

pub mod native;

pub use self::error::{Error, Result};
pub use self::length_prefix::LengthPrefix;
pub use self::limits::Limits;
pub use self::marker::{
    decode_length_nibble, encode_length_nibble, require_encodable_length, LogicalType, TypeMarker,
    BYTES_TYPES, INT16_MAX, INT16_MIN, INT32_MAX, INT32_MIN, INT8_MIN, LIST_TYPES, MAP_TYPES,
    MARKER_WINDOW_END, MARKER_WINDOW_START, STRING_TYPES, STRUCT_TYPES, TINY_INT_MAX, TINY_INT_MIN,
};
pub use self::reader::PackstreamReader;
pub use self::structure::{
    StructHeader, StructReader, StructRegistry, StructWriter, TaggedStructRegistry,
};
pub use self::value::{RawStruct, Value, MAX_STRUCT_FIELDS};
pub use self::writer::PackstreamWriter;

/// Default maximum nesting depth of lists, maps, and structs accepted by a reader.
pub const MAX_DEPTH: usize = 100;
