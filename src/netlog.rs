//! Loader for net-log dumps of disk cache activity.
//!
//! The dump is a JSON document with an `events` array. Each event names a
//! cache key, the stream it touched, and a byte offset and length. Offsets
//! come straight from the network stack and may be serialized either as
//! JSON numbers or as decimal strings, so they are parsed here before
//! reaching the range sets.

use std::{
    collections::{BTreeMap, btree_map},
    fmt::{self, Display},
    path::Path,
};

use serde::Deserialize;
use serde_json::Value;

use crate::cache_entry::{CacheEntry, CacheEntryError, StreamKind};

#[derive(Debug)]
pub enum NetLogError {
    Io(std::io::Error),
    Json(serde_json::Error),
    /// Event `index` has a `field` that is not a non-negative integer.
    InvalidOffset {
        index: usize,
        field: &'static str,
        value: Value,
    },
    Entry {
        index: usize,
        source: CacheEntryError,
    },
}

impl Display for NetLogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetLogError::Io(e) => write!(f, "failed to read net-log: {e}"),
            NetLogError::Json(e) => write!(f, "malformed net-log: {e}"),
            NetLogError::InvalidOffset {
                index,
                field,
                value,
            } => write!(f, "event {index}: invalid {field} {value}"),
            NetLogError::Entry { index, source } => write!(f, "event {index}: {source}"),
        }
    }
}

impl std::error::Error for NetLogError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            NetLogError::Io(e) => Some(e),
            NetLogError::Json(e) => Some(e),
            NetLogError::InvalidOffset { .. } => None,
            NetLogError::Entry { source, .. } => Some(source),
        }
    }
}

impl From<std::io::Error> for NetLogError {
    fn from(e: std::io::Error) -> Self {
        NetLogError::Io(e)
    }
}

impl From<serde_json::Error> for NetLogError {
    fn from(e: serde_json::Error) -> Self {
        NetLogError::Json(e)
    }
}

/// A single byte-range observation, as found in the dump.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub key: String,
    #[serde(rename = "type")]
    pub kind: StreamKind,
    pub offset: Value,
    pub len: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NetLog {
    pub events: Vec<Event>,
}

impl NetLog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NetLogError> {
        let path = path.as_ref();
        log::debug!("Loading net-log from {}", path.display());
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, NetLogError> {
        let log: NetLog = serde_json::from_str(text)?;
        log::debug!("Parsed {} net-log events", log.events.len());
        Ok(log)
    }

    /// Groups the events by cache key, ordered by key.
    pub fn entries(&self) -> Result<BTreeMap<String, CacheEntry>, NetLogError> {
        let mut entries = BTreeMap::new();

        for (index, event) in self.events.iter().enumerate() {
            let offset = parse_byte_count(&event.offset).ok_or_else(|| {
                NetLogError::InvalidOffset {
                    index,
                    field: "offset",
                    value: event.offset.clone(),
                }
            })?;
            let len = parse_byte_count(&event.len).ok_or_else(|| NetLogError::InvalidOffset {
                index,
                field: "len",
                value: event.len.clone(),
            })?;

            let mut observed = CacheEntry::new(event.key.as_str());
            observed
                .record(event.kind, offset, len)
                .map_err(|source| NetLogError::Entry { index, source })?;

            match entries.entry(event.key.clone()) {
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(observed);
                }
                btree_map::Entry::Occupied(mut slot) => {
                    slot.get_mut()
                        .merge(&observed)
                        .map_err(|source| NetLogError::Entry { index, source })?;
                }
            }
        }

        log::debug!("Net-log describes {} cache entries", entries.len());
        Ok(entries)
    }
}

/// Accepts a non-negative JSON integer or a string of decimal digits.
/// Signs and surrounding whitespace are rejected.
fn parse_byte_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
            s.parse().ok()
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempfile::NamedTempFile;
    use test_log::test;

    use super::*;

    const SAMPLE: &str = r#"{
        "events": [
            { "key": "http://b/", "type": "read", "offset": 100, "len": 50 },
            { "key": "http://a/", "type": "write", "offset": "0", "len": "1024" },
            { "key": "http://b/", "type": "read", "offset": "0", "len": 50 },
            { "key": "http://b/", "type": "read", "offset": 50, "len": "50" },
            { "key": "http://b/", "type": "read", "offset": 200, "len": 10 },
            { "key": "http://a/", "type": "read", "offset": 1024, "len": 0 }
        ]
    }"#;

    #[test]
    fn groups_events_by_key() {
        let entries = NetLog::parse(SAMPLE).unwrap().entries().unwrap();
        let keys: Vec<_> = entries.keys().map(String::as_str).collect();
        assert_eq!(keys, ["http://a/", "http://b/"]);

        let b = &entries["http://b/"];
        assert_eq!(b.read.map(|s, e| (s, e)), vec![(0, 150), (200, 210)]);
        assert_eq!(b.summary(StreamKind::Read), "0-149, 200-209");

        let a = &entries["http://a/"];
        assert_eq!(a.summary(StreamKind::Written), "0-1023");
        assert_eq!(a.summary(StreamKind::Available), "0-1023");
        assert!(a.read.is_empty());
    }

    #[test]
    fn rejects_non_numeric_offset() {
        let log = NetLog::parse(
            r#"{"events": [
                { "key": "k", "type": "read", "offset": 0, "len": 1 },
                { "key": "k", "type": "read", "offset": "abc", "len": 1 }
            ]}"#,
        )
        .unwrap();
        match log.entries() {
            Err(NetLogError::InvalidOffset { index, field, .. }) => {
                assert_eq!(index, 1);
                assert_eq!(field, "offset");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rejects_negative_and_fractional_lengths() {
        for len in ["-1", "1.5", "null"] {
            let text = format!(
                r#"{{"events": [{{ "key": "k", "type": "read", "offset": 0, "len": {len} }}]}}"#
            );
            let err = NetLog::parse(&text).unwrap().entries().unwrap_err();
            assert!(
                matches!(err, NetLogError::InvalidOffset { field: "len", .. }),
                "{len}: {err}"
            );
        }
    }

    #[test]
    fn string_offsets_must_be_plain_digits() {
        assert_eq!(parse_byte_count(&Value::from("0042")), Some(42));
        assert_eq!(parse_byte_count(&Value::from(7u64)), Some(7));
        for text in ["+5", " 5", "5 ", "", "-0", "0x10", "18446744073709551616"] {
            assert_eq!(parse_byte_count(&Value::from(text)), None, "{text:?}");
        }

        let log = NetLog::parse(
            r#"{"events": [{ "key": "k", "type": "read", "offset": "+5", "len": 1 }]}"#,
        )
        .unwrap();
        assert!(matches!(
            log.entries(),
            Err(NetLogError::InvalidOffset {
                index: 0,
                field: "offset",
                ..
            })
        ));
    }

    #[test]
    fn reports_overflow_with_event_index() {
        let text = format!(
            r#"{{"events": [{{ "key": "k", "type": "read", "offset": {}, "len": 2 }}]}}"#,
            u64::MAX
        );
        let err = NetLog::parse(&text).unwrap().entries().unwrap_err();
        assert!(matches!(err, NetLogError::Entry { index: 0, .. }));
        assert_eq!(
            err.to_string(),
            format!(
                "event 0: byte range at offset {} with length 2 overflows",
                u64::MAX
            )
        );
    }

    #[test]
    fn rejects_unknown_stream() {
        let err =
            NetLog::parse(r#"{"events": [{ "key": "k", "type": "seek", "offset": 0, "len": 1 }]}"#)
                .unwrap_err();
        assert!(matches!(err, NetLogError::Json(_)));
    }

    #[test]
    fn loads_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let log = NetLog::load(file.path()).unwrap();
        assert_eq!(log.events.len(), 6);
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = NetLog::load(dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, NetLogError::Io(_)));
    }
}
