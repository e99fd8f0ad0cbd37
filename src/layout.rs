//! How one row decomposes into instances.
//!
//! A [`RowLayout`] names the entity types playing each role in a row: the
//! context hierarchy, the resource the row is about, auxiliary descriptive
//! entities and the event. Key columns are never named here; they come from
//! the attribute mapping of each role's key attribute.

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schema::Schema;

/// One level of the context hierarchy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextLevel {
    pub entity_type: String,
    pub key_attribute: String,
    /// A row without this level fails.
    #[serde(default)]
    pub mandatory: bool,
}

impl ContextLevel {
    #[must_use]
    pub fn new(entity_type: impl Into<String>, key_attribute: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_attribute: key_attribute.into(),
            mandatory: false,
        }
    }

    #[must_use]
    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }
}

/// The resource a row reports on: the whole line, or one piece of equipment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLayout {
    /// Column telling line rows from equipment rows.
    pub kind_column: String,
    /// Value of `kind_column` marking a line row (case-insensitive).
    pub line_kind: String,
    pub equipment_type: String,
    pub key_attribute: String,
    /// Attribute whose value labels the equipment and feeds class parsing.
    pub name_attribute: String,
    pub class_type: String,
    pub class_key_attribute: String,
    /// Attribute receiving the class's default sequence position.
    pub class_position_attribute: String,
    /// Class used when none can be determined.
    pub fallback_class: String,
}

impl Default for ResourceLayout {
    fn default() -> Self {
        Self {
            kind_column: "EQUIPMENT_TYPE".to_string(),
            line_kind: "Line".to_string(),
            equipment_type: "Equipment".to_string(),
            key_attribute: "equipmentId".to_string(),
            name_attribute: "equipmentName".to_string(),
            class_type: "EquipmentClass".to_string(),
            class_key_attribute: "equipmentClassId".to_string(),
            class_position_attribute: "defaultSequencePosition".to_string(),
            fallback_class: "GenericEquipment".to_string(),
        }
    }
}

impl ResourceLayout {
    /// Returns true if a kind cell marks a line row.
    #[must_use]
    pub fn is_line_kind(&self, kind: Option<&str>) -> bool {
        kind.is_some_and(|k| k.eq_ignore_ascii_case(&self.line_kind))
    }
}

/// A descriptive entity keyed by one or more attributes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliaryEntity {
    pub entity_type: String,
    /// The first attribute is required (or its fallback); the rest are
    /// appended to the key when present.
    pub key_attributes: Vec<String>,
    /// Used when the first key attribute is blank.
    #[serde(default)]
    pub fallback_attribute: Option<String>,
}

impl AuxiliaryEntity {
    #[must_use]
    pub fn new<'a>(entity_type: impl Into<String>, key_attributes: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entity_type: entity_type.into(),
            key_attributes: key_attributes.into_iter().map(str::to_string).collect(),
            fallback_attribute: None,
        }
    }

    #[must_use]
    pub fn with_fallback(mut self, attribute: impl Into<String>) -> Self {
        self.fallback_attribute = Some(attribute.into());
        self
    }
}

/// The event recorded by a row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EventLayout {
    pub event_type: String,
    pub interval_type: String,
    pub start_attribute: String,
    pub end_attribute: String,
}

impl Default for EventLayout {
    fn default() -> Self {
        Self {
            event_type: "EventRecord".to_string(),
            interval_type: "TimeInterval".to_string(),
            start_attribute: "startTime".to_string(),
            end_attribute: "endTime".to_string(),
        }
    }
}

/// Decomposition of a row into roles.
///
/// The default is the manufacturing layout: plant, area, process cell and
/// production line contexts, a line-or-equipment resource, material,
/// production request, shift, state and reason auxiliaries, and one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RowLayout {
    /// Context levels, top-down.
    pub context: Vec<ContextLevel>,
    /// The context level that scopes sequencing and linking.
    pub grouping_type: String,
    pub resource: ResourceLayout,
    pub auxiliaries: Vec<AuxiliaryEntity>,
    pub event: EventLayout,
    /// Row-local key under which the resource is recorded for pass 2.
    pub resource_key: String,
}

impl Default for RowLayout {
    fn default() -> Self {
        Self {
            context: vec![
                ContextLevel::new("Plant", "plantId").mandatory(),
                ContextLevel::new("Area", "areaId"),
                ContextLevel::new("ProcessCell", "processCellId"),
                ContextLevel::new("ProductionLine", "lineId"),
            ],
            grouping_type: "ProductionLine".to_string(),
            resource: ResourceLayout::default(),
            auxiliaries: vec![
                AuxiliaryEntity::new("Material", ["materialId"]),
                AuxiliaryEntity::new("ProductionRequest", ["requestId", "batchId"]),
                AuxiliaryEntity::new("Shift", ["shiftId", "shiftStartTime"]),
                AuxiliaryEntity::new("OperationalState", ["stateDescription"]),
                AuxiliaryEntity::new("OperationalReason", ["reasonDescription"])
                    .with_fallback("altReasonDescription"),
            ],
            event: EventLayout::default(),
            resource_key: "Resource".to_string(),
        }
    }
}

impl RowLayout {
    /// Checks every role names a type the schema defines.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first offending role.
    pub fn validate(&self, schema: &Schema) -> Result<(), ConfigError> {
        let require = |field: &str, entity_type: &str| {
            if schema.contains(entity_type) {
                Ok(())
            } else {
                Err(ConfigError::invalid(
                    field,
                    format!("entity type '{entity_type}' is not defined in the schema"),
                ))
            }
        };

        if self.context.is_empty() {
            return Err(ConfigError::invalid("layout.context", "at least one context level is required"));
        }
        for level in &self.context {
            require("layout.context", &level.entity_type)?;
        }
        if !self.context.iter().any(|l| l.entity_type == self.grouping_type) {
            return Err(ConfigError::invalid(
                "layout.grouping_type",
                format!("'{}' is not one of the context levels", self.grouping_type),
            ));
        }
        require("layout.resource.equipment_type", &self.resource.equipment_type)?;
        require("layout.resource.class_type", &self.resource.class_type)?;
        for aux in &self.auxiliaries {
            if aux.key_attributes.is_empty() {
                return Err(ConfigError::invalid(
                    "layout.auxiliaries",
                    format!("'{}' has no key attributes", aux.entity_type),
                ));
            }
            require("layout.auxiliaries", &aux.entity_type)?;
        }
        require("layout.event.event_type", &self.event.event_type)?;
        require("layout.event.interval_type", &self.event.interval_type)?;
        Ok(())
    }
}

fn trailing_digits() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+$").unwrap_or_else(|_| unreachable!()))
}

fn non_alphanumeric() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9]").unwrap_or_else(|_| unreachable!()))
}

fn line_identifier() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^(FIPCO|LINE)\d*$").unwrap_or_else(|_| unreachable!()))
}

/// Derives an equipment class name from an equipment name.
///
/// The part after the last `_` (or the whole name) is stripped of trailing
/// digits and punctuation. A case-insensitive match against `known` returns
/// the known spelling; otherwise a name of at least three characters
/// containing a letter is taken as-is. Failing that, the longest known class
/// embedded in the name is used.
///
/// # Examples
///
/// ```
/// use plantgraph::layout::parse_equipment_class;
///
/// let known = ["Filler", "CasePacker"];
/// assert_eq!(parse_equipment_class("FIPCO009_Filler2", known).as_deref(), Some("Filler"));
/// assert_eq!(parse_equipment_class("FIPCO009_casepacker", known).as_deref(), Some("CasePacker"));
/// assert_eq!(parse_equipment_class("FIPCO009_Labeler", known).as_deref(), Some("Labeler"));
/// assert_eq!(parse_equipment_class("FIPCO009", known), None);
/// ```
#[must_use]
pub fn parse_equipment_class<'a>(name: &str, known: impl IntoIterator<Item = &'a str>) -> Option<String> {
    let known: Vec<&str> = known.into_iter().collect();
    let suffix = name.rsplit('_').next().unwrap_or(name).trim();
    let stripped = trailing_digits().replace(suffix, "");
    let base = non_alphanumeric().replace_all(&stripped, "");

    if !base.is_empty() && !line_identifier().is_match(&base) {
        if let Some(hit) = known.iter().find(|k| k.eq_ignore_ascii_case(&base)) {
            return Some((*hit).to_string());
        }
        if base.len() >= 3 && base.chars().any(|c| c.is_ascii_alphabetic()) {
            return Some(base.into_owned());
        }
    }

    let lowered = name.to_ascii_lowercase();
    known
        .iter()
        .filter(|k| lowered.contains(&k.to_ascii_lowercase()))
        .max_by_key(|k| k.len())
        .map(|k| (*k).to_string())
}
