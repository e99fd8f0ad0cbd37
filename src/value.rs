//! Scalar values that attributes can hold.
//!
//! Values are produced by casting raw row cells (see [`crate::cast`]) and
//! stored on entity instances. Relations never hold values; they hold
//! instance identities.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

/// Possible values an attribute can hold.
///
/// # Examples
///
/// ```
/// use plantgraph::Value;
///
/// let count = Value::Integer(224);
/// let label = Value::tagged("Arranque", "es");
///
/// assert!(count.is_integer());
/// assert_eq!(label.language(), Some("es"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    String(String),
    Integer(i64),
    Real(f64),
    Boolean(bool),
    Timestamp(NaiveDateTime),
    Date(NaiveDate),
    Time(NaiveTime),
    /// Text carrying a language tag (e.g. `es`, `en`).
    Tagged {
        text: String,
        lang: String,
    },
}

impl Value {
    /// Creates a language-tagged string.
    #[must_use]
    pub fn tagged(text: impl Into<String>, lang: impl Into<String>) -> Self {
        Self::Tagged {
            text: text.into(),
            lang: lang.into(),
        }
    }

    /// Returns the kind of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::String(_) => ValueKind::String,
            Self::Integer(_) => ValueKind::Integer,
            Self::Real(_) => ValueKind::Real,
            Self::Boolean(_) => ValueKind::Boolean,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::Date(_) => ValueKind::Date,
            Self::Time(_) => ValueKind::Time,
            Self::Tagged { .. } => ValueKind::TaggedString,
        }
    }

    pub const fn is_integer(&self) -> bool {
        matches!(self, Self::Integer(_))
    }

    pub const fn is_timestamp(&self) -> bool {
        matches!(self, Self::Timestamp(_))
    }

    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_real(&self) -> Option<f64> {
        match self {
            Self::Real(v) => Some(*v),
            #[allow(clippy::cast_precision_loss)]
            Self::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub const fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the textual content of string-like values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::String(v) | Self::Tagged { text: v, .. } => Some(v),
            _ => None,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            Self::Tagged { lang, .. } => Some(lang),
            _ => None,
        }
    }

    /// Renders the value as a plain identifier-friendly string.
    ///
    /// Used when a value feeds a natural key or a derived match.
    #[must_use]
    pub fn to_key_string(&self) -> String {
        match self {
            Self::String(v) | Self::Tagged { text: v, .. } => v.clone(),
            Self::Integer(v) => v.to_string(),
            Self::Real(v) => v.to_string(),
            Self::Boolean(v) => v.to_string(),
            Self::Timestamp(v) => v.format("%Y-%m-%dT%H:%M:%S").to_string(),
            Self::Date(v) => v.format("%Y-%m-%d").to_string(),
            Self::Time(v) => v.format("%H:%M:%S").to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tagged { text, lang } => write!(f, "\"{text}\"@{lang}"),
            other => write!(f, "{}", other.to_key_string()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Real(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

/// The scalar kind an attribute is declared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    String,
    Integer,
    Real,
    Boolean,
    Timestamp,
    Date,
    Time,
    TaggedString,
}

impl ValueKind {
    /// Maps an XSD datatype name onto a value kind.
    ///
    /// Unknown datatypes fall back to [`ValueKind::String`].
    #[must_use]
    pub fn from_xsd(datatype: &str) -> Self {
        match datatype.trim() {
            "xsd:decimal" | "xsd:double" | "xsd:float" => Self::Real,
            "xsd:integer" | "xsd:int" | "xsd:long" | "xsd:short" | "xsd:byte"
            | "xsd:nonNegativeInteger" | "xsd:positiveInteger" | "xsd:negativeInteger"
            | "xsd:nonPositiveInteger" | "xsd:unsignedLong" | "xsd:unsignedInt"
            | "xsd:unsignedShort" | "xsd:unsignedByte" => Self::Integer,
            "xsd:dateTime" => Self::Timestamp,
            "xsd:date" => Self::Date,
            "xsd:time" => Self::Time,
            "xsd:boolean" => Self::Boolean,
            "xsd:string (with lang tag)" => Self::TaggedString,
            _ => Self::String,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Real => "real",
            Self::Boolean => "boolean",
            Self::Timestamp => "timestamp",
            Self::Date => "date",
            Self::Time => "time",
            Self::TaggedString => "tagged-string",
        };
        f.write_str(name)
    }
}

/// Whether an attribute or relation holds one value or a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// At most one value; re-setting replaces.
    #[default]
    Single,
    /// A set of values; re-adding an existing value is a no-op.
    Multi,
}

impl Cardinality {
    pub const fn is_single(self) -> bool {
        matches!(self, Self::Single)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_single() { "single" } else { "multi" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_value_kind() {
        assert_eq!(Value::Integer(1).kind(), ValueKind::Integer);
        assert_eq!(Value::tagged("hola", "es").kind(), ValueKind::TaggedString);
        assert_eq!(Value::Timestamp(ts("2024-01-01 10:00:00")).kind(), ValueKind::Timestamp);
    }

    #[test]
    fn test_value_accessors() {
        assert_eq!(Value::Integer(4).as_real(), Some(4.0));
        assert_eq!(Value::Real(2.5).as_integer(), None);
        assert_eq!(Value::from("L1").as_text(), Some("L1"));
        assert_eq!(Value::tagged("Paro", "es").as_text(), Some("Paro"));
        assert_eq!(Value::from("x").language(), None);
    }

    #[test]
    fn test_value_key_string() {
        assert_eq!(Value::Integer(7).to_key_string(), "7");
        assert_eq!(
            Value::Timestamp(ts("2024-03-01 06:30:00")).to_key_string(),
            "2024-03-01T06:30:00"
        );
        assert_eq!(Value::Boolean(true).to_key_string(), "true");
    }

    #[test]
    fn test_value_display_tagged() {
        assert_eq!(format!("{}", Value::tagged("Stop", "en")), "\"Stop\"@en");
    }

    #[test]
    fn test_value_kind_from_xsd() {
        assert_eq!(ValueKind::from_xsd("xsd:decimal"), ValueKind::Real);
        assert_eq!(ValueKind::from_xsd("xsd:unsignedInt"), ValueKind::Integer);
        assert_eq!(ValueKind::from_xsd("xsd:dateTime"), ValueKind::Timestamp);
        assert_eq!(
            ValueKind::from_xsd("xsd:string (with lang tag)"),
            ValueKind::TaggedString
        );
        assert_eq!(ValueKind::from_xsd("xsd:anyURI"), ValueKind::String);
    }

    #[test]
    fn test_value_serialization() {
        let value = Value::tagged("Arranque", "es");
        let json = serde_json::to_string(&value).unwrap();
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value, back);
    }

    #[test]
    fn test_cardinality_default_single() {
        assert!(Cardinality::default().is_single());
        assert!(!Cardinality::Multi.is_single());
    }
}
