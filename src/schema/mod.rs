//! Closed, pre-validated schema.
//!
//! Entity types are declared through a [`SchemaBuilder`] and resolved once
//! into an immutable [`Schema`] before any row is processed. Resolution
//! flattens inheritance, so each [`ResolvedType`] answers member lookups
//! for its own and inherited attributes and relations.

mod builder;
pub mod mapping;
mod types;

use std::collections::BTreeMap;

pub use builder::SchemaBuilder;
pub use mapping::{
    AttributeMapping, AttributeSource, DerivedRule, EntityMapping, MatchMode, RelationMapping,
    RelationSource, SchemaMapping,
};
pub use types::{AttributeDefinition, EntityType, RelationDefinition};

/// An entity type with its inheritance resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedType {
    definition: EntityType,
    /// The type itself followed by its ancestors, root last.
    lineage: Vec<String>,
    identity_scope: String,
    attributes: BTreeMap<String, AttributeDefinition>,
    relations: BTreeMap<String, RelationDefinition>,
}

impl ResolvedType {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    #[must_use]
    pub fn supertype(&self) -> Option<&str> {
        self.definition.supertype.as_deref()
    }

    #[must_use]
    pub fn definition(&self) -> &EntityType {
        &self.definition
    }

    #[must_use]
    pub fn lineage(&self) -> &[String] {
        &self.lineage
    }

    /// Scope under which instances of this type are deduplicated.
    #[must_use]
    pub fn identity_scope(&self) -> &str {
        &self.identity_scope
    }

    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&AttributeDefinition> {
        self.attributes.get(name)
    }

    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationDefinition> {
        self.relations.get(name)
    }

    /// Own and inherited attributes, sorted by name.
    pub fn attributes(&self) -> impl Iterator<Item = &AttributeDefinition> {
        self.attributes.values()
    }

    /// Own and inherited relations, sorted by name.
    pub fn relations(&self) -> impl Iterator<Item = &RelationDefinition> {
        self.relations.values()
    }

    #[must_use]
    pub fn is_a(&self, ancestor: &str) -> bool {
        self.lineage.iter().any(|t| t == ancestor)
    }
}

/// Immutable set of resolved entity types.
///
/// # Examples
///
/// ```
/// use plantgraph::schema::{EntityType, Schema};
/// use plantgraph::ValueKind;
///
/// let schema = Schema::builder()
///     .entity_type(EntityType::new("Filler").with_supertype("Equipment"))
///     .entity_type(EntityType::new("Equipment").attribute("equipmentId", ValueKind::String))
///     .build()
///     .unwrap();
///
/// assert!(schema.is_subtype_of("Filler", "Equipment"));
/// assert!(schema.attribute("Filler", "equipmentId").is_some());
/// assert_eq!(schema.identity_scope("Filler"), Some("Equipment"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Schema {
    types: BTreeMap<String, ResolvedType>,
}

impl Schema {
    #[must_use]
    pub fn builder() -> SchemaBuilder {
        SchemaBuilder::new()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ResolvedType> {
        self.types.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Returns true if `sub` is `sup` or inherits from it.
    #[must_use]
    pub fn is_subtype_of(&self, sub: &str, sup: &str) -> bool {
        self.types.get(sub).is_some_and(|t| t.is_a(sup))
    }

    /// Returns true if either type is a subtype of the other.
    #[must_use]
    pub fn are_compatible(&self, a: &str, b: &str) -> bool {
        self.is_subtype_of(a, b) || self.is_subtype_of(b, a)
    }

    #[must_use]
    pub fn identity_scope(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(ResolvedType::identity_scope)
    }

    #[must_use]
    pub fn attribute(&self, entity_type: &str, attribute: &str) -> Option<&AttributeDefinition> {
        self.types.get(entity_type)?.attribute(attribute)
    }

    #[must_use]
    pub fn relation(&self, entity_type: &str, relation: &str) -> Option<&RelationDefinition> {
        self.types.get(entity_type)?.relation(relation)
    }

    /// Type names in sorted order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn types(&self) -> impl Iterator<Item = &ResolvedType> {
        self.types.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub(crate) fn from_resolved(types: BTreeMap<String, ResolvedType>) -> Self {
        Self { types }
    }
}

impl ResolvedType {
    pub(crate) fn resolve(definition: EntityType, parent: Option<&Self>) -> Self {
        let mut lineage = vec![definition.name.clone()];
        let mut attributes = BTreeMap::new();
        let mut relations = BTreeMap::new();
        let mut inherited_scope = None;

        if let Some(parent) = parent {
            lineage.extend(parent.lineage.iter().cloned());
            attributes.clone_from(&parent.attributes);
            relations.clone_from(&parent.relations);
            inherited_scope = Some(parent.identity_scope.clone());
        }
        for attr in &definition.attributes {
            attributes.insert(attr.name.clone(), attr.clone());
        }
        for rel in &definition.relations {
            relations.insert(rel.name.clone(), rel.clone());
        }

        let identity_scope = definition
            .identity_scope
            .clone()
            .or(inherited_scope)
            .unwrap_or_else(|| definition.name.clone());

        Self {
            definition,
            lineage,
            identity_scope,
            attributes,
            relations,
        }
    }
}
