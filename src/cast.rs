//! Conversion of raw row cells into typed values.
//!
//! Casting never panics and never guesses silently: a blank (or, for
//! non-string kinds, null-like) cell is absent, a convertible cell yields a
//! [`Value`], and anything else is a [`PopulationError::CastFailure`] that the
//! caller attributes to the single attribute being set.

use std::sync::OnceLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::error::PopulationError;
use crate::value::{Value, ValueKind};

const NULL_TOKENS: [&str; 5] = ["null", "none", "na", "n/a", "?"];

const TIMESTAMP_FORMATS: [&str; 8] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
    "%m/%d/%Y %I:%M:%S %p",
    "%d.%m.%Y %H:%M:%S",
];

fn whitespace_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s+").unwrap_or_else(|_| unreachable!()))
}

fn month_day_only() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\d{1,2}/\d{1,2}$").unwrap_or_else(|_| unreachable!()))
}

fn is_null_token(s: &str) -> bool {
    NULL_TOKENS.iter().any(|t| s.eq_ignore_ascii_case(t))
}

/// Casts a raw cell to the given kind.
///
/// Returns `Ok(None)` when the cell is absent. `lang` is only consulted for
/// [`ValueKind::TaggedString`].
///
/// # Errors
///
/// Returns [`PopulationError::CastFailure`] if the cell cannot be converted.
///
/// # Examples
///
/// ```
/// use plantgraph::cast::cast_cell;
/// use plantgraph::{Value, ValueKind};
///
/// let v = cast_cell("count", "224.0", ValueKind::Integer, "en").unwrap();
/// assert_eq!(v, Some(Value::Integer(224)));
///
/// assert_eq!(cast_cell("count", "  ", ValueKind::Integer, "en").unwrap(), None);
/// assert!(cast_cell("count", "many", ValueKind::Integer, "en").is_err());
/// ```
pub fn cast_cell(
    attribute: &str,
    raw: &str,
    kind: ValueKind,
    lang: &str,
) -> Result<Option<Value>, PopulationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let is_text = matches!(kind, ValueKind::String | ValueKind::TaggedString);
    if !is_text && is_null_token(trimmed) {
        return Ok(None);
    }

    let failure = |reason: &str| PopulationError::CastFailure {
        attribute: attribute.to_string(),
        raw: raw.to_string(),
        kind: kind.to_string(),
        reason: reason.to_string(),
    };

    let value = match kind {
        ValueKind::String => Value::String(trimmed.to_string()),
        ValueKind::TaggedString => Value::tagged(trimmed, lang),
        ValueKind::Integer => Value::Integer(parse_integer(trimmed).ok_or_else(|| failure("not an integer"))?),
        ValueKind::Real => Value::Real(
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| failure("not a finite number"))?,
        ),
        ValueKind::Boolean => Value::Boolean(parse_bool(trimmed).ok_or_else(|| failure("not a boolean"))?),
        ValueKind::Timestamp => {
            let cleaned = whitespace_run().replace_all(trimmed, " ");
            if month_day_only().is_match(&cleaned) {
                return Err(failure("date without year"));
            }
            Value::Timestamp(parse_timestamp(&cleaned).ok_or_else(|| failure("unrecognized timestamp format"))?)
        }
        ValueKind::Date => Value::Date(parse_date(trimmed).ok_or_else(|| failure("expected YYYY-MM-DD or MM/DD/YYYY"))?),
        ValueKind::Time => Value::Time(parse_time(trimmed).ok_or_else(|| failure("expected HH:MM[:SS]"))?),
    };
    Ok(Some(value))
}

fn parse_integer(s: &str) -> Option<i64> {
    if let Ok(v) = s.parse::<i64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if !f.is_finite() || f.fract() != 0.0 || f.abs() > 9.0e15 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    Some(f as i64)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "1" | "t" | "y" | "yes" => Some(true),
        "false" | "0" | "f" | "n" | "no" => Some(false),
        _ => None,
    }
}

/// Parses a timestamp, dropping any UTC offset (wall-clock time is kept).
#[must_use]
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%:z") {
        return Some(dt.naive_local());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| parse_date(s).and_then(|d| d.and_hms_opt(0, 0, 0)))
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%m/%d/%Y"))
        .ok()
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}
