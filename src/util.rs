//! Small helpers shared across modules.

use chrono::{DateTime, Utc};
use serde::{Deserializer, Serialize, Serializer};
use std::fmt;

pub use crate::json::merge as merge_values;

/// `serde(with = "crate::util::dt")` for fields that carry MediaWiki's
/// RFC-3339-ish timestamps but that callers want as [`chrono::DateTime<Utc>`]
/// rather than our own [`crate::date::Date`] (used by response structs that
/// are deserialized straight off the wire before being lifted into richer
/// types).
pub mod dt {
    use super::*;

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        struct Visitor;
        impl<'a> serde::de::Visitor<'a> for Visitor {
            type Value = DateTime<Utc>;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.pad("a string")
            }
            fn visit_str<E>(self, s: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                DateTime::parse_from_rfc3339(s)
                    .map(|d| d.into())
                    .map_err(E::custom)
            }
        }
        d.deserialize_str(Visitor)
    }

    pub fn serialize<S: Serializer>(d: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
        d.to_rfc3339().serialize(s)
    }
}

/// URL-encode percent escapes the way MediaWiki link targets require
/// (§4.3 title parsing step (b)). `+` is intentionally left alone since it
/// is a literal character in wiki titles, not a space encoding, here.
pub fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.to_owned())
}

pub fn percent_encode(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}
