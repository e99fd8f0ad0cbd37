//! Mapping from row columns onto schema members.
//!
//! A [`SchemaMapping`] says, per entity type, which column feeds each
//! attribute and how each relation's target is found. Parsing mapping files
//! is left to callers; this module only holds the typed tables and checks
//! them against a [`Schema`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{ResolvedType, Schema};
use crate::error::PopulationError;
use crate::value::{Cardinality, ValueKind};

/// Where an attribute value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeSource {
    /// The named column of the row.
    Column(String),
    /// Computed during population rather than read from a column.
    Derived,
}

/// How one attribute of an entity type is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMapping {
    pub attribute: String,
    pub source: AttributeSource,
    pub kind: ValueKind,
    #[serde(default)]
    pub cardinality: Cardinality,
    /// Raw fallback used when the cell cannot be cast.
    #[serde(default)]
    pub default: Option<String>,
}

impl AttributeMapping {
    /// Maps an attribute onto a column.
    #[must_use]
    pub fn column(attribute: impl Into<String>, column: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            attribute: attribute.into(),
            source: AttributeSource::Column(column.into()),
            kind,
            cardinality: Cardinality::Single,
            default: None,
        }
    }

    /// Declares an attribute computed during population.
    #[must_use]
    pub fn derived(attribute: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            attribute: attribute.into(),
            source: AttributeSource::Derived,
            kind,
            cardinality: Cardinality::Single,
            default: None,
        }
    }

    #[must_use]
    pub fn multi(mut self) -> Self {
        self.cardinality = Cardinality::Multi;
        self
    }

    #[must_use]
    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Returns the source column, if the attribute is column-driven.
    #[must_use]
    pub fn source_column(&self) -> Option<&str> {
        match &self.source {
            AttributeSource::Column(c) => Some(c),
            AttributeSource::Derived => None,
        }
    }
}

/// How a derived relation compares attribute values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchMode {
    #[default]
    Exact,
    /// The source value contains the target value.
    Contains,
    CaseInsensitive,
}

impl MatchMode {
    /// Returns true if a source value matches a target value.
    #[must_use]
    pub fn matches(self, source: &str, target: &str) -> bool {
        if target.is_empty() {
            return false;
        }
        match self {
            Self::Exact => source == target,
            Self::Contains => source.contains(target),
            Self::CaseInsensitive => source.eq_ignore_ascii_case(target),
        }
    }
}

/// Rule linking instances through attribute values after all rows ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivedRule {
    pub source_attribute: String,
    pub target_attribute: String,
    #[serde(default)]
    pub matching: MatchMode,
}

/// Where a relation's target comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationSource {
    /// The column holds the target's natural key.
    Column(String),
    /// The target was created in the same row under this context key.
    RowContext(String),
    /// Resolved by the structural pass.
    Derived(DerivedRule),
}

/// How one relation of an entity type is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMapping {
    pub relation: String,
    pub target_type: String,
    pub source: RelationSource,
    #[serde(default)]
    pub cardinality: Cardinality,
}

impl RelationMapping {
    /// Resolves the target by natural key read from a column.
    #[must_use]
    pub fn column(relation: impl Into<String>, target_type: impl Into<String>, column: impl Into<String>) -> Self {
        Self::with_source(relation, target_type, RelationSource::Column(column.into()))
    }

    /// Resolves the target from the instances created in the same row.
    #[must_use]
    pub fn row_context(relation: impl Into<String>, target_type: impl Into<String>, key: impl Into<String>) -> Self {
        Self::with_source(relation, target_type, RelationSource::RowContext(key.into()))
    }

    /// Resolves the target in the structural pass.
    #[must_use]
    pub fn derived(relation: impl Into<String>, target_type: impl Into<String>, rule: DerivedRule) -> Self {
        Self::with_source(relation, target_type, RelationSource::Derived(rule))
    }

    fn with_source(relation: impl Into<String>, target_type: impl Into<String>, source: RelationSource) -> Self {
        Self {
            relation: relation.into(),
            target_type: target_type.into(),
            source,
            cardinality: Cardinality::Single,
        }
    }

    #[must_use]
    pub fn multi(mut self) -> Self {
        self.cardinality = Cardinality::Multi;
        self
    }

    #[must_use]
    pub const fn is_derived(&self) -> bool {
        matches!(self.source, RelationSource::Derived(_))
    }
}

/// Attribute and relation mappings of one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMapping {
    #[serde(default)]
    pub attributes: Vec<AttributeMapping>,
    #[serde(default)]
    pub relations: Vec<RelationMapping>,
}

impl EntityMapping {
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeMapping> {
        self.attributes.iter().find(|a| a.attribute == name)
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationMapping> {
        self.relations.iter().find(|r| r.relation == name)
    }
}

/// Per entity type mapping tables.
///
/// # Examples
///
/// ```
/// use plantgraph::schema::{AttributeMapping, RelationMapping, SchemaMapping};
/// use plantgraph::ValueKind;
///
/// let mapping = SchemaMapping::new()
///     .attribute("Plant", AttributeMapping::column("plantId", "PLANT_ID", ValueKind::String))
///     .relation("Area", RelationMapping::row_context("locatedInPlant", "Plant", "Plant"));
///
/// assert_eq!(mapping.column_for("Plant", "plantId"), Some("PLANT_ID"));
/// assert!(mapping.entity("Area").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SchemaMapping {
    entities: BTreeMap<String, EntityMapping>,
}

impl SchemaMapping {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an attribute mapping for an entity type.
    #[must_use]
    pub fn attribute(mut self, entity_type: impl Into<String>, mapping: AttributeMapping) -> Self {
        self.entities
            .entry(entity_type.into())
            .or_default()
            .attributes
            .push(mapping);
        self
    }

    /// Adds a relation mapping for an entity type.
    #[must_use]
    pub fn relation(mut self, entity_type: impl Into<String>, mapping: RelationMapping) -> Self {
        self.entities
            .entry(entity_type.into())
            .or_default()
            .relations
            .push(mapping);
        self
    }

    #[must_use]
    pub fn entity(&self, entity_type: &str) -> Option<&EntityMapping> {
        self.entities.get(entity_type)
    }

    /// Mapped entity types with their mappings, sorted by type name.
    pub fn entities(&self) -> impl Iterator<Item = (&str, &EntityMapping)> {
        self.entities.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the column feeding an attribute, if it is column-driven.
    #[must_use]
    pub fn column_for(&self, entity_type: &str, attribute: &str) -> Option<&str> {
        self.entity(entity_type)?.attribute(attribute)?.source_column()
    }

    /// Reports entries the schema cannot honour.
    ///
    /// An entry is rejected when it names an undefined type or member, or
    /// when it maps a single-valued member as multi. A single mapping on a
    /// multi-valued member is accepted: each row adds one value to the set.
    /// The returned errors are one per offending entry; an empty vector
    /// means every entry can be applied.
    #[must_use]
    pub fn validate(&self, schema: &Schema) -> Vec<PopulationError> {
        let mut problems = Vec::new();
        for (entity_type, mapping) in &self.entities {
            let Some(resolved) = schema.get(entity_type) else {
                problems.push(PopulationError::UnknownEntityType {
                    name: entity_type.clone(),
                });
                continue;
            };
            for attr in &mapping.attributes {
                if let Some(def) = resolved.attribute(&attr.attribute) {
                    if def.kind != attr.kind {
                        warn!(
                            entity_type = %entity_type,
                            attribute = %attr.attribute,
                            declared = %def.kind,
                            mapped = %attr.kind,
                            "Mapped value kind differs from schema; casting with the mapped kind"
                        );
                    }
                }
                problems.extend(attribute_issue(entity_type, resolved, attr));
            }
            for rel in &mapping.relations {
                problems.extend(relation_issue(schema, entity_type, resolved, rel));
            }
        }
        problems
    }

    /// Returns a copy keeping only the entries [`Self::validate`] accepts.
    #[must_use]
    pub fn retain_valid(&self, schema: &Schema) -> Self {
        let entities = self
            .entities
            .iter()
            .filter_map(|(name, mapping)| {
                let resolved = schema.get(name)?;
                let attributes = mapping
                    .attributes
                    .iter()
                    .filter(|a| attribute_issue(name, resolved, a).is_none())
                    .cloned()
                    .collect();
                let relations = mapping
                    .relations
                    .iter()
                    .filter(|r| relation_issue(schema, name, resolved, r).is_none())
                    .cloned()
                    .collect();
                Some((name.clone(), EntityMapping { attributes, relations }))
            })
            .collect();
        Self { entities }
    }
}

fn cardinality_issue(
    entity_type: &str,
    member: &str,
    declared: Cardinality,
    mapped: Cardinality,
) -> Option<PopulationError> {
    (declared.is_single() && !mapped.is_single()).then(|| PopulationError::CardinalityMismatch {
        entity_type: entity_type.to_string(),
        member: member.to_string(),
        declared,
        mapped,
    })
}

fn attribute_issue(entity_type: &str, resolved: &ResolvedType, attr: &AttributeMapping) -> Option<PopulationError> {
    match resolved.attribute(&attr.attribute) {
        None => Some(PopulationError::UndefinedAttribute {
            entity_type: entity_type.to_string(),
            attribute: attr.attribute.clone(),
        }),
        Some(def) => cardinality_issue(entity_type, &attr.attribute, def.cardinality, attr.cardinality),
    }
}

fn relation_issue(
    schema: &Schema,
    entity_type: &str,
    resolved: &ResolvedType,
    rel: &RelationMapping,
) -> Option<PopulationError> {
    let Some(def) = resolved.relation(&rel.relation) else {
        return Some(PopulationError::UndefinedRelation {
            entity_type: entity_type.to_string(),
            relation: rel.relation.clone(),
        });
    };
    if !schema.contains(&rel.target_type) {
        return Some(PopulationError::UnknownEntityType {
            name: rel.target_type.clone(),
        });
    }
    cardinality_issue(entity_type, &rel.relation, def.cardinality, rel.cardinality)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityType, RelationDefinition};

    fn schema() -> Schema {
        Schema::builder()
            .entity_type(EntityType::new("Plant").attribute("plantId", ValueKind::String))
            .entity_type(
                EntityType::new("Area")
                    .attribute("areaId", ValueKind::String)
                    .relation(RelationDefinition::new("locatedInPlant", "Plant")),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_match_mode() {
        assert!(MatchMode::Exact.matches("L1", "L1"));
        assert!(!MatchMode::Exact.matches("l1", "L1"));
        assert!(MatchMode::CaseInsensitive.matches("l1", "L1"));
        assert!(MatchMode::Contains.matches("L1-EQ7", "L1"));
        assert!(!MatchMode::Contains.matches("L1-EQ7", ""));
    }

    #[test]
    fn test_validate_reports_unknown_names() {
        let mapping = SchemaMapping::new()
            .attribute("Plant", AttributeMapping::column("plantId", "PLANT_ID", ValueKind::String))
            .attribute("Plant", AttributeMapping::column("plantName", "PLANT_NAME", ValueKind::String))
            .relation("Area", RelationMapping::row_context("inSite", "Plant", "Plant"))
            .relation("Area", RelationMapping::row_context("locatedInPlant", "Site", "Site"))
            .attribute("Robot", AttributeMapping::column("robotId", "ROBOT_ID", ValueKind::String));

        let problems = mapping.validate(&schema());
        assert_eq!(
            problems,
            vec![
                PopulationError::UndefinedRelation {
                    entity_type: "Area".to_string(),
                    relation: "inSite".to_string(),
                },
                PopulationError::UnknownEntityType {
                    name: "Site".to_string(),
                },
                PopulationError::UndefinedAttribute {
                    entity_type: "Plant".to_string(),
                    attribute: "plantName".to_string(),
                },
                PopulationError::UnknownEntityType {
                    name: "Robot".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_multi_mapping_on_single_member_is_rejected() {
        let mapping = SchemaMapping::new()
            .attribute("Plant", AttributeMapping::column("plantId", "PLANT_ID", ValueKind::String).multi())
            .relation(
                "Area",
                RelationMapping::column("locatedInPlant", "Plant", "PLANT_ID").multi(),
            )
            .attribute("Area", AttributeMapping::column("areaId", "AREA_ID", ValueKind::String));

        let problems = mapping.validate(&schema());
        assert_eq!(
            problems,
            vec![
                PopulationError::CardinalityMismatch {
                    entity_type: "Area".to_string(),
                    member: "locatedInPlant".to_string(),
                    declared: Cardinality::Single,
                    mapped: Cardinality::Multi,
                },
                PopulationError::CardinalityMismatch {
                    entity_type: "Plant".to_string(),
                    member: "plantId".to_string(),
                    declared: Cardinality::Single,
                    mapped: Cardinality::Multi,
                },
            ]
        );

        let kept = mapping.retain_valid(&schema());
        assert!(kept.validate(&schema()).is_empty());
        assert!(kept.entity("Area").unwrap().relation("locatedInPlant").is_none());
        assert_eq!(kept.column_for("Plant", "plantId"), None);
        assert_eq!(kept.column_for("Area", "areaId"), Some("AREA_ID"));
    }

    #[test]
    fn test_single_mapping_on_multi_member_is_accepted() {
        let schema = Schema::builder()
            .entity_type(EntityType::new("Plant"))
            .entity_type(EntityType::new("Area").relation(RelationDefinition::new("feeds", "Area").multi()))
            .build()
            .unwrap();
        let mapping = SchemaMapping::new().relation("Area", RelationMapping::column("feeds", "Area", "FEEDS"));
        assert!(mapping.validate(&schema).is_empty());
    }

    #[test]
    fn test_retain_valid_drops_bad_entries() {
        let mapping = SchemaMapping::new()
            .attribute("Plant", AttributeMapping::column("plantId", "PLANT_ID", ValueKind::String))
            .attribute("Plant", AttributeMapping::column("plantName", "PLANT_NAME", ValueKind::String))
            .attribute("Robot", AttributeMapping::column("robotId", "ROBOT_ID", ValueKind::String));

        let kept = mapping.retain_valid(&schema());
        assert!(kept.validate(&schema()).is_empty());
        assert_eq!(kept.column_for("Plant", "plantId"), Some("PLANT_ID"));
        assert_eq!(kept.column_for("Plant", "plantName"), None);
        assert!(kept.entity("Robot").is_none());
    }

    #[test]
    fn test_mapping_serde() {
        let mapping = SchemaMapping::new()
            .attribute(
                "Plant",
                AttributeMapping::column("plantId", "PLANT_ID", ValueKind::String).with_default("UNKNOWN"),
            )
            .relation(
                "Equipment",
                RelationMapping::derived(
                    "isPartOfProductionLine",
                    "ProductionLine",
                    DerivedRule {
                        source_attribute: "equipmentId".to_string(),
                        target_attribute: "lineId".to_string(),
                        matching: MatchMode::Contains,
                    },
                ),
            );
        let json = serde_json::to_string(&mapping).unwrap();
        let back: SchemaMapping = serde_json::from_str(&json).unwrap();
        assert_eq!(mapping, back);
        assert!(back.entity("Equipment").unwrap().relations[0].is_derived());
    }
}
