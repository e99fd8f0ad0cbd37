//! Population configuration.
//!
//! Every section has working defaults, so an empty JSON object is a valid
//! configuration. Values are validated once when loaded.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ConfigError;
use crate::layout::RowLayout;
use crate::row::Row;
use crate::sequence::SequenceConfig;
use crate::temporal::LinkerConfig;

/// Language tags for tagged-string attributes, chosen per row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// Column holding the plant's country.
    pub country_column: String,
    pub country_to_language: BTreeMap<String, String>,
    pub default_language: String,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        let country_to_language = [
            ("Mexico", "es"),
            ("United States", "en"),
            ("Brazil", "pt"),
            ("France", "fr"),
            ("Germany", "de"),
            ("Italy", "it"),
            ("Spain", "es"),
            ("Japan", "ja"),
            ("China", "zh"),
        ]
        .into_iter()
        .map(|(c, l)| (c.to_string(), l.to_string()))
        .collect();
        Self {
            country_column: "PLANT_COUNTRY_DESCRIPTION".to_string(),
            country_to_language,
            default_language: "en".to_string(),
        }
    }
}

impl LanguageConfig {
    /// Returns the language tag for a row.
    ///
    /// Countries match case-insensitively; unknown or missing countries get
    /// the default language.
    #[must_use]
    pub fn language_for(&self, row: &Row) -> &str {
        row.get(&self.country_column)
            .and_then(|country| {
                self.country_to_language
                    .iter()
                    .find(|(c, _)| c.eq_ignore_ascii_case(country))
                    .map(|(_, lang)| lang.as_str())
            })
            .unwrap_or(&self.default_language)
    }

    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the default language or any mapped
    /// language tag is blank.
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.default_language.trim().is_empty() {
            return Err(ConfigError::invalid("language.default_language", "must not be blank"));
        }
        if let Some((country, _)) = self.country_to_language.iter().find(|(_, l)| l.trim().is_empty()) {
            return Err(ConfigError::invalid(
                "language.country_to_language",
                format!("language tag for '{country}' is blank"),
            ));
        }
        Ok(self)
    }
}

/// Complete configuration of a population run.
///
/// # Examples
///
/// ```
/// use plantgraph::PopulationConfig;
///
/// let config = PopulationConfig::from_json_str(r#"{"linker": {"buffer_minutes": 10}}"#).unwrap();
/// assert_eq!(config.linker.buffer_minutes, 10);
/// assert_eq!(config.linker.default_duration_minutes, 60);
/// assert!(!config.linker.enable_proximity);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub linker: LinkerConfig,
    pub sequence: SequenceConfig,
    pub language: LanguageConfig,
    pub layout: RowLayout,
}

impl PopulationConfig {
    /// Parses and validates a JSON configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON and
    /// [`ConfigError::Invalid`] for out-of-range values.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()
    }

    /// Reads, parses and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_json_str`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "Loading configuration");
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError::Invalid`] found.
    pub fn validate(self) -> Result<Self, ConfigError> {
        Ok(Self {
            linker: self.linker.validate()?,
            sequence: self.sequence.validate()?,
            language: self.language.validate()?,
            layout: self.layout,
        })
    }

    /// Serializes the configuration as pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if serialization fails.
    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
