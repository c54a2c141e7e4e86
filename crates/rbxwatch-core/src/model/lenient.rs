// Forgiving decoders for hand-edited or older JSON documents.
//
// A single bad entry is skipped with a warning instead of failing the
// whole document.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serializer};
use serde_json::Value;
use tracing::warn;

/// Decode `{ "<numeric id>": T, ... }`, skipping non-numeric keys
/// (`_version` and friends) and entries that do not decode as `T`.
pub(crate) fn id_map_from_value<T: DeserializeOwned>(value: Value, what: &str) -> BTreeMap<u64, T> {
    if value.is_null() {
        return BTreeMap::new();
    }
    id_map_from_document(value, what).unwrap_or_else(|| {
        warn!(document = what, "expected a JSON object, ignoring contents");
        BTreeMap::new()
    })
}

/// Like [`id_map_from_value`], but `None` when the top level is not an
/// object at all.
pub(crate) fn id_map_from_document<T: DeserializeOwned>(
    value: Value,
    what: &str,
) -> Option<BTreeMap<u64, T>> {
    let Value::Object(entries) = value else {
        return None;
    };

    let mut out = BTreeMap::new();
    for (key, raw) in entries {
        let Ok(id) = key.parse::<u64>() else {
            continue;
        };
        match serde_json::from_value::<T>(raw) {
            Ok(v) => {
                out.insert(id, v);
            }
            Err(e) => warn!(document = what, key = %key, error = %e, "skipping unreadable entry"),
        }
    }
    Some(out)
}

pub(crate) fn id_map<'de, D, T>(d: D) -> Result<BTreeMap<u64, T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    Ok(id_map_from_value(Value::deserialize(d)?, "map"))
}

/// Ids may have been written as numbers or as strings.
pub(crate) fn opt_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u64>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

/// RFC 3339, or a naive ISO timestamp taken as UTC.
pub(crate) fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

pub(crate) fn opt_timestamp<'de, D: Deserializer<'de>>(
    d: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Value::deserialize(d)? {
        Value::String(s) => parse_timestamp(&s),
        _ => None,
    })
}

/// Write `{ "_version": N, "<id>": value, ... }`.
pub(crate) fn serialize_versioned<S, T>(
    version: u32,
    map: &BTreeMap<u64, T>,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: Serializer,
    T: serde::Serialize,
{
    use serde::ser::SerializeMap;

    let mut out = serializer.serialize_map(Some(map.len() + 1))?;
    out.serialize_entry("_version", &version)?;
    for (id, value) in map {
        out.serialize_entry(&id.to_string(), value)?;
    }
    out.end()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Datelike, Timelike};
    use serde_json::json;

    use super::*;

    #[test]
    fn id_map_skips_bad_keys_and_entries() {
        let map: BTreeMap<u64, u8> = id_map_from_value(
            json!({ "_version": 1, "12": 2, "13": "oops", "abc": 1, "14": 0 }),
            "test",
        );
        assert_eq!(map.len(), 2);
        assert_eq!(map[&12], 2);
        assert_eq!(map[&14], 0);
    }

    #[test]
    fn non_object_values_are_empty() {
        let map: BTreeMap<u64, u8> = id_map_from_value(json!([1, 2, 3]), "test");
        assert!(map.is_empty());
        let map: BTreeMap<u64, u8> = id_map_from_value(Value::Null, "test");
        assert!(map.is_empty());
    }

    #[test]
    fn non_object_documents_are_rejected() {
        assert!(id_map_from_document::<u8>(json!([[156, 1]]), "test").is_none());
        assert!(id_map_from_document::<u8>(Value::Null, "test").is_none());
        assert_eq!(
            id_map_from_document::<u8>(json!({ "_version": 1 }), "test"),
            Some(BTreeMap::new())
        );
    }

    #[test]
    fn naive_timestamps_are_utc() {
        let dt = parse_timestamp("2024-03-05T10:20:30.123456").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 5));
        assert_eq!(dt.hour(), 10);
        assert!(parse_timestamp("2024-03-05T10:20:30Z").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }
}
