//! Struct headers and the registries that map struct tags to codecs.
//!
//! A struct on the wire is a TinyStruct marker carrying the number of fields, one raw tag byte,
//! and then that many values. The codec itself knows nothing about what a tag means: a
//! [`StructRegistry`] is handed to [`PackstreamReader::read_struct`] and
//! [`PackstreamWriter::write_struct`], and resolves the reader for a tag or the writer for a
//! payload.

use std::collections::HashMap;
use std::fmt;

use crate::error::Result;
use crate::reader::PackstreamReader;
use crate::writer::PackstreamWriter;

/// Number of fields and tag byte of one encoded struct.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StructHeader {
    pub length: u64,
    pub tag: u8,
}

impl StructHeader {
    pub fn new(length: u64, tag: u8) -> Self {
        Self { length, tag }
    }
}

impl fmt::Display for StructHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "struct 0x{:02X} ({} fields)", self.tag, self.length)
    }
}

/// Decodes the fields of a struct whose header has already been read.
pub trait StructReader<C, O> {
    fn read(&self, ctx: &C, buf: &mut PackstreamReader<'_>, header: StructHeader) -> Result<O>;
}

impl<C, O, F> StructReader<C, O> for F
where
    F: Fn(&C, &mut PackstreamReader<'_>, StructHeader) -> Result<O>,
{
    fn read(&self, ctx: &C, buf: &mut PackstreamReader<'_>, header: StructHeader) -> Result<O> {
        self(ctx, buf, header)
    }
}

/// Encodes one family of payloads as structs. The header is written by the caller from
/// [`tag`](Self::tag) and [`length`](Self::length); [`write`](Self::write) only emits the fields.
pub trait StructWriter<C, S> {
    /// Whether this writer handles the payload.
    fn accepts(&self, payload: &S) -> bool;
    fn tag(&self, payload: &S) -> u8;
    fn length(&self, payload: &S) -> u64;
    fn write(&self, ctx: &C, buf: &mut PackstreamWriter, payload: &S) -> Result<()>;
}

/// Lookup of struct codecs, injected into struct reads and writes.
pub trait StructRegistry<C, S> {
    fn reader(&self, header: &StructHeader) -> Option<&dyn StructReader<C, S>>;
    fn writer(&self, payload: &S) -> Option<&dyn StructWriter<C, S>>;
}

/// A registry holding readers keyed by tag, and writers checked in registration order.
pub struct TaggedStructRegistry<C, S> {
    readers: HashMap<u8, Box<dyn StructReader<C, S>>>,
    writers: Vec<Box<dyn StructWriter<C, S>>>,
}

impl<C, S> TaggedStructRegistry<C, S> {
    pub fn new() -> Self {
        Self {
            readers: HashMap::new(),
            writers: Vec::new(),
        }
    }

    /// Register the reader for a tag, replacing any earlier one.
    pub fn with_reader<R>(mut self, tag: u8, reader: R) -> Self
    where
        R: StructReader<C, S> + 'static,
    {
        self.readers.insert(tag, Box::new(reader));
        self
    }

    pub fn with_writer<W>(mut self, writer: W) -> Self
    where
        W: StructWriter<C, S> + 'static,
    {
        self.writers.push(Box::new(writer));
        self
    }

    /// Register a codec that both reads `tag` and writes the payloads it accepts.
    pub fn with_codec<T>(self, tag: u8, codec: T) -> Self
    where
        T: StructReader<C, S> + StructWriter<C, S> + Clone + 'static,
    {
        self.with_reader(tag, codec.clone()).with_writer(codec)
    }

    pub fn tags(&self) -> impl Iterator<Item = u8> + '_ {
        self.readers.keys().copied()
    }
}

impl<C, S> Default for TaggedStructRegistry<C, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, S> fmt::Debug for TaggedStructRegistry<C, S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut tags: Vec<u8> = self.tags().collect();
        tags.sort_unstable();
        f.debug_struct("TaggedStructRegistry")
            .field("tags", &tags)
            .field("writers", &self.writers.len())
            .finish()
    }
}

impl<C, S> StructRegistry<C, S> for TaggedStructRegistry<C, S> {
    fn reader(&self, header: &StructHeader) -> Option<&dyn StructReader<C, S>> {
        self.readers.get(&header.tag).map(|r| r.as_ref())
    }

    fn writer(&self, payload: &S) -> Option<&dyn StructWriter<C, S>> {
        self.writers
            .iter()
            .find(|w| w.accepts(payload))
            .map(|w| w.as_ref())
    }
}
