#![no_main]
use libfuzzer_sys::fuzz_target;
use packstream::native::NativeValue;
use packstream::{Limits, PackstreamReader, PackstreamWriter, Value, MAX_STRUCT_FIELDS};

/// Struct8 and Struct16 decode but are never written.
fn writable(value: &Value) -> bool {
    match value {
        Value::List(items) => items.iter().all(writable),
        Value::Map(entries) => entries.values().all(writable),
        Value::Struct(s) => s.fields.len() <= MAX_STRUCT_FIELDS && s.fields.iter().all(writable),
        _ => true,
    }
}

fuzz_target!(|data: &[u8]| {
    let mut dec = PackstreamReader::with_limits(data, Limits::strict());
    if let Ok(value) = dec.read_value() {
        // Anything decoded must encode again, and skipping must land on the same spot
        let consumed = dec.position();
        let mut enc = PackstreamWriter::new();
        let written = enc.write_value(&value);
        if writable(&value) {
            assert!(written.is_ok(), "{:?}", written);
            assert!(PackstreamReader::new(enc.as_bytes()).read_value().is_ok());
        }
        let mut skip = PackstreamReader::with_limits(data, Limits::strict());
        skip.skip().unwrap();
        assert_eq!(skip.position(), consumed);
    }
    let _ = NativeValue::read(&mut PackstreamReader::new(data));
});
