//! Extraction heuristic
//!
//! Explorer and indexer responses have no common schema. The visitor walks a
//! decoded `serde_json::Value` looking for well-known field names in a fixed
//! priority order, descends a bounded number of levels into nested objects,
//! and finally coerces whatever is left into a number.
//!
//! A candidate that cannot be interpreted yields `None` and the search goes
//! on with the next candidate; nothing here can fail the whole extraction.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::{Map, Value};

use crate::models::types::ExtractionMode;
use crate::utils::constants::{EPOCH_MILLIS_THRESHOLD, MAX_EXTRACTION_DEPTH};

/// Count fields, highest priority first
pub const COUNT_FIELDS: [&str; 4] = ["txCount", "transactions", "tx_count", "count"];

/// Age fields, highest priority first. Names containing "first" hold timestamps.
pub const AGE_FIELDS: [&str; 6] = ["firstSeen", "first_seen", "ageDays", "age_days", "age", "days"];

/// Scam database hit fields
pub const FLAG_FIELDS: [&str; 7] = [
    "scam",
    "isScam",
    "is_scam",
    "flagged",
    "malicious",
    "blacklisted",
    "found",
];

/// Key of the per-shard list in multi-chain responses
pub const CHAINS_FIELD: &str = "chains";

/// Extract a value in `mode`, measuring ages against `now`
pub fn extract(value: &Value, mode: ExtractionMode, now: DateTime<Utc>) -> Option<u64> {
    Extractor { mode, now }.visit(value, 0)
}

/// Extract with the current wall clock
pub fn extract_now(value: &Value, mode: ExtractionMode) -> Option<u64> {
    extract(value, mode, Utc::now())
}

struct Extractor {
    mode: ExtractionMode,
    now: DateTime<Utc>,
}

impl Extractor {
    fn fields(&self) -> &'static [&'static str] {
        match self.mode {
            ExtractionMode::Count => &COUNT_FIELDS,
            ExtractionMode::AgeDays => &AGE_FIELDS,
            ExtractionMode::Flag => &FLAG_FIELDS,
        }
    }

    fn visit(&self, value: &Value, depth: usize) -> Option<u64> {
        match value {
            Value::Null => None,
            Value::Array(items) => match self.mode {
                ExtractionMode::Count => Some(items.len() as u64),
                _ => None,
            },
            Value::Object(map) => self.visit_object(map, depth),
            primitive => self.coerce(primitive),
        }
    }

    fn visit_object(&self, map: &Map<String, Value>, depth: usize) -> Option<u64> {
        if let Some(Value::Array(chains)) = map.get(CHAINS_FIELD) {
            if let Some(combined) = self.combine_chains(chains, depth) {
                return Some(combined);
            }
        }

        for name in self.fields() {
            if let Some(field) = map.get(*name) {
                if let Some(n) = self.read_field(name, field) {
                    return Some(n);
                }
            }
        }

        if depth >= MAX_EXTRACTION_DEPTH {
            return None;
        }

        // shallow dive into nested objects
        map.values()
            .filter(|v| v.is_object())
            .find_map(|v| self.visit(v, depth + 1))
    }

    /// Sum counts, keep the oldest age, or any hit across shard entries
    fn combine_chains(&self, chains: &[Value], depth: usize) -> Option<u64> {
        if depth >= MAX_EXTRACTION_DEPTH {
            return None;
        }
        let found: Vec<u64> = chains
            .iter()
            .filter(|entry| entry.is_object())
            .filter_map(|entry| self.visit(entry, depth + 1))
            .collect();
        if found.is_empty() {
            return None;
        }

        match self.mode {
            ExtractionMode::Count => Some(found.iter().fold(0u64, |acc, n| acc.saturating_add(*n))),
            ExtractionMode::AgeDays => found.into_iter().max(),
            ExtractionMode::Flag => Some(u64::from(found.iter().any(|n| *n > 0))),
        }
    }

    fn read_field(&self, name: &str, field: &Value) -> Option<u64> {
        match self.mode {
            ExtractionMode::Count => match field {
                Value::Array(items) => Some(items.len() as u64),
                other => coerce_count(other),
            },
            ExtractionMode::AgeDays if name.contains("first") => {
                age_days_from_first_seen(field, self.now)
            }
            ExtractionMode::AgeDays => coerce_count(field),
            ExtractionMode::Flag => coerce_flag(field),
        }
    }

    fn coerce(&self, value: &Value) -> Option<u64> {
        match self.mode {
            ExtractionMode::Flag => coerce_flag(value),
            _ => coerce_count(value),
        }
    }
}

/// Number-like coercion: floats truncate, strings keep only their digits
pub fn coerce_count(value: &Value) -> Option<u64> {
    match value {
        Value::Bool(b) => Some(u64::from(*b)),
        Value::Number(n) => {
            if let Some(u) = n.as_u64() {
                Some(u)
            } else {
                let f = n.as_f64()?;
                (f.is_finite() && f >= 0.0).then(|| f.trunc() as u64)
            }
        }
        Value::String(s) => {
            let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse::<u64>().ok()
        }
        _ => None,
    }
}

fn coerce_flag(value: &Value) -> Option<u64> {
    match value {
        Value::Bool(b) => Some(u64::from(*b)),
        Value::Number(n) => n.as_f64().map(|f| u64::from(f != 0.0)),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(1),
            "false" | "no" | "0" => Some(0),
            _ => None,
        },
        _ => None,
    }
}

/// Whole days since a first-seen timestamp, never negative
pub fn age_days_from_first_seen(value: &Value, now: DateTime<Utc>) -> Option<u64> {
    let first_seen = match value {
        Value::Number(n) => from_epoch(n.as_f64()?)?,
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
                from_epoch(s.parse::<f64>().ok()?)?
            } else {
                parse_iso8601(s)?
            }
        }
        _ => return None,
    };

    let days = (now - first_seen).num_days();
    Some(days.max(0) as u64)
}

fn from_epoch(raw: f64) -> Option<DateTime<Utc>> {
    if !raw.is_finite() {
        return None;
    }
    let secs = if raw > EPOCH_MILLIS_THRESHOLD { raw / 1000.0 } else { raw };
    let whole = secs.floor();
    let nanos = ((secs - whole) * 1e9) as u32;
    Utc.timestamp_opt(whole as i64, nanos).single()
}

/// RFC 3339 (with `Z` or offset), naive date-time taken as UTC, or a bare date
pub fn parse_iso8601(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
