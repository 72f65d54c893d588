use educe::Educe;
use serde::{Deserialize, Serialize};

use crate::MAX_DEPTH;

/// Ceilings applied while reading. A limit passed directly to a read or skip call takes precedence
/// over the matching field here.
///
/// Length limits count bytes for strings and byte arrays, elements for lists, and entries for
/// maps. The defaults are the widest length prefix the format has, so they never reject anything
/// a conforming writer can produce.
#[derive(Educe, Clone, Debug, Serialize, Deserialize)]
#[educe(PartialEq, Default)]
#[serde(deny_unknown_fields, default)]
pub struct Limits {
    #[educe(Default(expression = u32::MAX as u64))]
    pub max_bytes_length: u64,
    #[educe(Default(expression = u32::MAX as u64))]
    pub max_string_length: u64,
    #[educe(Default(expression = u32::MAX as u64))]
    pub max_list_length: u64,
    #[educe(Default(expression = u32::MAX as u64))]
    pub max_map_length: u64,
    /// Maximum nesting of lists, maps, and structs.
    #[educe(Default(expression = MAX_DEPTH))]
    pub max_depth: usize,
}

impl Limits {
    /// Limits suited to untrusted peers: 1 MiB strings and byte arrays, 64 Ki-element
    /// collections.
    pub fn strict() -> Self {
        Self {
            max_bytes_length: 1 << 20,
            max_string_length: 1 << 20,
            max_list_length: 1 << 16,
            max_map_length: 1 << 16,
            max_depth: 32,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let limits = Limits::default();
        assert_eq!(limits.max_bytes_length, u32::MAX as u64);
        assert_eq!(limits.max_string_length, u32::MAX as u64);
        assert_eq!(limits.max_list_length, u32::MAX as u64);
        assert_eq!(limits.max_map_length, u32::MAX as u64);
        assert_eq!(limits.max_depth, MAX_DEPTH);
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let limits: Limits = serde_json::from_str(r#"{ "max_string_length": 64 }"#).unwrap();
        assert_eq!(limits.max_string_length, 64);
        assert_eq!(limits.max_list_length, u32::MAX as u64);
        assert_eq!(limits.max_depth, MAX_DEPTH);
    }

    #[test]
    fn unknown_fields_rejected() {
        let result: Result<Limits, _> = serde_json::from_str(r#"{ "max_strings": 64 }"#);
        assert!(result.is_err());
    }
}
