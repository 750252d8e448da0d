use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

/// Last identifier handed out by `next_record_id` in this process.
static LAST_ISSUED_ID: AtomicU64 = AtomicU64::new(0);

/// Largest id a floor may push new ids up to (2^53 - 1). Stored ids above it
/// did not come from a millisecond clock and are not chased.
pub const MAX_SEQUENTIAL_ID: u64 = 9_007_199_254_740_991;

/// Generate a fresh record identifier.
///
/// Identifiers are millisecond timestamps rendered as decimal strings. Two
/// creates in the same millisecond would collide, so the value is bumped to
/// stay strictly above every id issued earlier in this process and above
/// `floor` (the largest numeric id already present in the target collection).
/// A floor beyond `MAX_SEQUENTIAL_ID` is ignored; such an id can never equal
/// one issued here.
pub fn next_record_id(floor: u64) -> String {
    let now = Utc::now().timestamp_millis().max(0) as u64;
    let floor = if floor > MAX_SEQUENTIAL_ID { 0 } else { floor };
    let mut prev = LAST_ISSUED_ID.load(Ordering::Relaxed);
    loop {
        let candidate = now
            .max(prev.saturating_add(1))
            .max(floor.saturating_add(1));
        match LAST_ISSUED_ID.compare_exchange_weak(
            prev,
            candidate,
            Ordering::AcqRel,
            Ordering::Relaxed,
        ) {
            Ok(_) => return candidate.to_string(),
            Err(actual) => prev = actual,
        }
    }
}

/// Numeric value of an identifier, if it is one.
pub fn numeric_id(id: &str) -> Option<u64> {
    id.trim().parse::<u64>().ok()
}

/// Case-insensitive substring test. `needle` must already be lower-cased.
pub fn contains_ci(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// Parse `YYYY-MM-DD`, or the date part of an RFC 3339 timestamp.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
}

pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}

pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

// ---------------------------------------------------------------------------
// Lenient serde helpers.
//
// Stored documents were written by a browser form layer that kept numbers as
// strings ("5000"), empty strings or null. These accept any of those shapes.
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseNumber {
    Num(f64),
    Text(String),
    // matched only so a stray boolean reads as 0 instead of failing the record
    Flag(#[allow(dead_code)] bool),
}

impl LooseNumber {
    fn to_f64(&self) -> Option<f64> {
        match self {
            LooseNumber::Num(n) if n.is_finite() => Some(*n),
            LooseNumber::Num(_) => None,
            LooseNumber::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            LooseNumber::Flag(_) => None,
        }
    }
}

/// Number, numeric string, empty string or null. Anything unparsable is 0.
pub fn de_lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<LooseNumber>::deserialize(deserializer)?;
    Ok(raw.and_then(|n| n.to_f64()).unwrap_or(0.0))
}

/// Non-negative count; negatives and garbage read as 0.
pub fn de_lenient_u32<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = de_lenient_f64(deserializer)?;
    Ok(value.max(0.0).min(u32::MAX as f64).round() as u32)
}

/// Percentage clamped into [0, 100].
pub fn de_progress<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = de_lenient_f64(deserializer)?;
    Ok(clamp_progress(value))
}

pub fn clamp_progress(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.clamp(0.0, 100.0).round() as u8
}

/// Identifiers were numbers in some older documents; accept both.
pub fn de_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(u64),
        Float(f64),
    }

    Ok(match Option::<RawId>::deserialize(deserializer)? {
        Some(RawId::Text(s)) => s,
        Some(RawId::Int(n)) => n.to_string(),
        Some(RawId::Float(f)) => format!("{}", f),
        None => String::new(),
    })
}

/// Free-text field that some forms stored as a number (`budget: 5000`).
pub fn de_lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawText {
        Text(String),
        Int(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(match Option::<RawText>::deserialize(deserializer)? {
        Some(RawText::Text(s)) => s,
        Some(RawText::Int(n)) => n.to_string(),
        Some(RawText::Float(f)) => f.to_string(),
        Some(RawText::Flag(b)) => b.to_string(),
        None => String::new(),
    })
}

/// `null` and missing both become the type's default.
pub fn de_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
