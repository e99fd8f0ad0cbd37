//! Identifier sanitization and instance identity.
//!
//! Every instance is identified by a [`NaturalKey`]: an identity scope (an
//! entity type name shared by a type hierarchy) plus a sanitized base
//! identifier. The [`InstanceId`] is derived deterministically from the key,
//! so the same rows always produce the same identifiers.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Namespace for name-based instance identifiers.
const INSTANCE_NAMESPACE: Uuid = Uuid::from_u128(0x6c3f_1a52_9d0e_4b7a_8e21_55f0_c4d7_a913);

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\s+|[<>:"/\\|?*#%']"#).unwrap_or_else(|_| unreachable!()))
}

fn disallowed_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^\w\-.]").unwrap_or_else(|_| unreachable!()))
}

/// Sanitizes a raw identifier into a safe name.
///
/// Whitespace runs and path/query punctuation become `_`, anything outside
/// word characters, `-` and `.` is dropped, and names starting with a digit
/// or `-` are prefixed with `_`. A name that sanitizes to nothing becomes
/// `UnnamedData_<hash>` where the hash is taken over the trimmed input.
///
/// # Examples
///
/// ```
/// use plantgraph::naming::sanitize_name;
///
/// assert_eq!(sanitize_name("Line 1/A"), "Line_1_A");
/// assert_eq!(sanitize_name("009-Filler"), "_009-Filler");
/// assert_eq!(sanitize_name("  "), "unnamed");
/// ```
#[must_use]
pub fn sanitize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "unnamed".to_string();
    }
    let replaced = unsafe_chars().replace_all(trimmed, "_");
    let mut safe = disallowed_chars().replace_all(&replaced, "").into_owned();

    if safe.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        safe.insert(0, '_');
    }
    if safe.is_empty() {
        let hash = blake3::hash(trimmed.as_bytes()).to_hex();
        return format!("UnnamedData_{}", &hash.as_str()[..16]);
    }
    safe
}

/// Joins the present parts of a composite identifier with `_`.
///
/// Blank parts are skipped. Returns `None` if every part is blank.
#[must_use]
pub fn compose_base<'a>(parts: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let present: Vec<&str> = parts
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();
    if present.is_empty() {
        None
    } else {
        Some(present.join("_"))
    }
}

/// Deduplication key of an instance.
///
/// Two requests map to the same instance exactly when their scope and
/// sanitized base are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NaturalKey {
    scope: String,
    base: String,
}

impl NaturalKey {
    /// Creates a key, sanitizing the raw base identifier.
    #[must_use]
    pub fn new(scope: impl Into<String>, raw_base: &str) -> Self {
        Self {
            scope: scope.into(),
            base: sanitize_name(raw_base),
        }
    }

    #[must_use]
    pub fn scope(&self) -> &str {
        &self.scope
    }

    #[must_use]
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Returns the instance name this key produces (`{scope}_{base}`).
    #[must_use]
    pub fn instance_name(&self) -> String {
        format!("{}_{}", self.scope, self.base)
    }
}

impl fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.scope, self.base)
    }
}

/// Stable identifier of an entity instance.
///
/// Derived from the natural key with a name-based UUID, so it never
/// changes across runs over the same data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(Uuid);

impl InstanceId {
    /// Derives the identifier for a natural key.
    #[must_use]
    pub fn for_key(key: &NaturalKey) -> Self {
        Self(Uuid::new_v5(&INSTANCE_NAMESPACE, key.to_string().as_bytes()))
    }

    /// Creates an instance ID from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<InstanceId> for Uuid {
    fn from(id: InstanceId) -> Self {
        id.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_unsafe_chars() {
        assert_eq!(sanitize_name("Case Packer #2"), "Case_Packer__2");
        assert_eq!(sanitize_name("a<b>c"), "a_b_c");
        assert_eq!(sanitize_name("O'Brien"), "O_Brien");
        assert_eq!(sanitize_name("FIPCO009_Filler"), "FIPCO009_Filler");
    }

    #[test]
    fn test_sanitize_drops_disallowed_chars() {
        assert_eq!(sanitize_name("v1.2(beta)"), "v1.2beta");
        assert_eq!(sanitize_name("a&b"), "ab");
    }

    #[test]
    fn test_sanitize_prefixes_leading_digit_or_hyphen() {
        assert_eq!(sanitize_name("123"), "_123");
        assert_eq!(sanitize_name("-x"), "_-x");
    }

    #[test]
    fn test_sanitize_fallbacks() {
        assert_eq!(sanitize_name(""), "unnamed");
        let hashed = sanitize_name("()");
        assert!(hashed.starts_with("UnnamedData_"));
        assert_eq!(hashed, sanitize_name("()"));
        assert_ne!(hashed, sanitize_name("[]"));
    }

    #[test]
    fn test_compose_base() {
        assert_eq!(compose_base(["R1", " ", "B7"]), Some("R1_B7".to_string()));
        assert_eq!(compose_base(["", "  "]), None);
    }

    #[test]
    fn test_natural_key_sanitizes_base() {
        let key = NaturalKey::new("Equipment", "EQ 42");
        assert_eq!(key.scope(), "Equipment");
        assert_eq!(key.base(), "EQ_42");
        assert_eq!(key.instance_name(), "Equipment_EQ_42");
        assert_eq!(key, NaturalKey::new("Equipment", "EQ   42"));
    }

    #[test]
    fn test_instance_id_is_deterministic() {
        let a = InstanceId::for_key(&NaturalKey::new("Plant", "P1"));
        let b = InstanceId::for_key(&NaturalKey::new("Plant", "P1"));
        let c = InstanceId::for_key(&NaturalKey::new("Plant", "P2"));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
