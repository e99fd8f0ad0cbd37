//! Declared entity types and their members.

use serde::{Deserialize, Serialize};

use crate::value::{Cardinality, ValueKind};

/// A scalar attribute declared on an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDefinition {
    pub name: String,
    pub kind: ValueKind,
    #[serde(default)]
    pub cardinality: Cardinality,
}

impl AttributeDefinition {
    /// Creates a single-valued attribute.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ValueKind) -> Self {
        Self {
            name: name.into(),
            kind,
            cardinality: Cardinality::Single,
        }
    }

    #[must_use]
    pub fn multi(mut self) -> Self {
        self.cardinality = Cardinality::Multi;
        self
    }
}

/// A typed relation declared on an entity type.
///
/// A relation may accept instances of several target types. When an
/// inverse is declared, setting the relation also sets the inverse on the
/// target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDefinition {
    pub name: String,
    pub targets: Vec<String>,
    #[serde(default)]
    pub cardinality: Cardinality,
    #[serde(default)]
    pub inverse: Option<String>,
}

impl RelationDefinition {
    /// Creates a single-valued relation to one target type.
    #[must_use]
    pub fn new(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: vec![target.into()],
            cardinality: Cardinality::Single,
            inverse: None,
        }
    }

    /// Accepts an additional target type.
    #[must_use]
    pub fn or_target(mut self, target: impl Into<String>) -> Self {
        self.targets.push(target.into());
        self
    }

    #[must_use]
    pub fn multi(mut self) -> Self {
        self.cardinality = Cardinality::Multi;
        self
    }

    #[must_use]
    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }
}

/// A named entity type with at most one supertype.
///
/// # Examples
///
/// ```
/// use plantgraph::schema::{EntityType, RelationDefinition};
/// use plantgraph::ValueKind;
///
/// let filler = EntityType::new("Filler")
///     .with_supertype("Equipment")
///     .attribute("fillVolume", ValueKind::Real)
///     .relation(RelationDefinition::new("feeds", "Equipment").multi());
///
/// assert_eq!(filler.supertype.as_deref(), Some("Equipment"));
/// assert_eq!(filler.attributes.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    #[serde(default)]
    pub supertype: Option<String>,
    /// Overrides the identity scope otherwise inherited from the root type.
    #[serde(default)]
    pub identity_scope: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDefinition>,
    #[serde(default)]
    pub relations: Vec<RelationDefinition>,
}

impl EntityType {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            supertype: None,
            identity_scope: None,
            attributes: Vec::new(),
            relations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_supertype(mut self, supertype: impl Into<String>) -> Self {
        self.supertype = Some(supertype.into());
        self
    }

    #[must_use]
    pub fn with_identity_scope(mut self, scope: impl Into<String>) -> Self {
        self.identity_scope = Some(scope.into());
        self
    }

    /// Declares a single-valued attribute.
    #[must_use]
    pub fn attribute(mut self, name: impl Into<String>, kind: ValueKind) -> Self {
        self.attributes.push(AttributeDefinition::new(name, kind));
        self
    }

    #[must_use]
    pub fn attribute_def(mut self, definition: AttributeDefinition) -> Self {
        self.attributes.push(definition);
        self
    }

    #[must_use]
    pub fn relation(mut self, definition: RelationDefinition) -> Self {
        self.relations.push(definition);
        self
    }

    /// Iterates over the names of every member declared directly on this type.
    pub fn member_names(&self) -> impl Iterator<Item = &str> {
        self.attributes
            .iter()
            .map(|a| a.name.as_str())
            .chain(self.relations.iter().map(|r| r.name.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_builder() {
        let rel = RelationDefinition::new("isPartOfLineEvent", "EventRecord")
            .with_inverse("hasDetailedEquipmentEvent");
        assert!(rel.cardinality.is_single());
        assert_eq!(rel.inverse.as_deref(), Some("hasDetailedEquipmentEvent"));

        let rel = RelationDefinition::new("involvesResource", "Equipment")
            .or_target("ProductionLine")
            .multi();
        assert_eq!(rel.targets, vec!["Equipment", "ProductionLine"]);
        assert!(!rel.cardinality.is_single());
    }

    #[test]
    fn test_member_names() {
        let t = EntityType::new("Equipment")
            .attribute("equipmentId", ValueKind::String)
            .relation(RelationDefinition::new("memberOfClass", "EquipmentClass"));
        assert_eq!(t.member_names().collect::<Vec<_>>(), vec!["equipmentId", "memberOfClass"]);
    }

    #[test]
    fn test_entity_type_deserialize_defaults() {
        let t: EntityType = serde_json::from_str(r#"{"name":"Plant"}"#).unwrap();
        assert_eq!(t, EntityType::new("Plant"));
    }
}
