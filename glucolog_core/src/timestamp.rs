//! Timestamp normalization for heterogeneous diary records.
//!
//! Entries written by different generations of the app carry timestamps as a
//! structured seconds/nanoseconds pair, epoch milliseconds, or an RFC 3339
//! string. Everything funnels through [`normalize`] so sorting and decay
//! arithmetic see a single epoch-millisecond representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::DiaryEntry;

pub(crate) const MILLIS_PER_MINUTE: f64 = 60_000.0;

/// A timestamp as it may appear in a stored diary record.
///
/// Untagged so legacy WAL lines deserialize without a discriminant. Variant
/// order matters: RFC 3339 strings parse as `DateTime`, anything else lands
/// in `Text` and is resolved (or rejected) at normalization time.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum RawTimestamp {
    /// Document-store shape: `{ "seconds": ..., "nanoseconds": ... }`
    Structured {
        seconds: i64,
        #[serde(default)]
        nanoseconds: u32,
    },
    /// Epoch milliseconds
    Millis(i64),
    /// A parsed datetime; serializes as RFC 3339
    DateTime(DateTime<Utc>),
    /// Any other string, parsed as RFC 3339 on normalization
    Text(String),
}

/// Convert any raw timestamp shape to epoch milliseconds.
///
/// Unparseable or missing inputs yield 0 so downstream sorting stays total;
/// a record at the epoch sorts as oldest instead of crashing a sort routine.
/// Callers that must distinguish "no timestamp" from "timestamp = epoch"
/// check for 0 explicitly.
pub fn normalize(raw: Option<&RawTimestamp>) -> i64 {
    match raw {
        None => 0,
        Some(RawTimestamp::Structured { seconds, .. }) => seconds.saturating_mul(1000),
        Some(RawTimestamp::Millis(millis)) => *millis,
        Some(RawTimestamp::DateTime(dt)) => dt.timestamp_millis(),
        Some(RawTimestamp::Text(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .unwrap_or(0),
    }
}

/// Sort diary entries newest first.
///
/// Ties on the normalized timestamp break on the entry id so reloading a
/// history never reorders entries logged in the same millisecond.
pub fn sort_entries_desc(entries: &mut [DiaryEntry]) {
    entries.sort_by(|a, b| {
        b.timestamp_millis()
            .cmp(&a.timestamp_millis())
            .then_with(|| b.id.cmp(&a.id))
    });
}
