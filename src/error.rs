//! Error types for plantgraph.
//!
//! Errors are strongly typed using thiserror and split by layer: schema
//! definition, population, and configuration. Population errors are also
//! accumulated into reports, so they are `Clone` and comparable.

use thiserror::Error;

use crate::value::Cardinality;

/// A single problem found while resolving a schema definition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Entity type '{name}' is defined more than once")]
    DuplicateType {
        name: String,
    },

    #[error("Entity type '{name}' declares unknown supertype '{supertype}'")]
    MissingSupertype {
        name: String,
        supertype: String,
    },

    #[error("Entity type '{name}' is part of a supertype cycle: {}", .cycle.join(" -> "))]
    CyclicSupertype {
        name: String,
        cycle: Vec<String>,
    },

    #[error("Entity type '{name}' cannot be resolved because its supertype '{supertype}' cannot")]
    UnresolvedSupertype {
        name: String,
        supertype: String,
    },

    #[error("Relation '{entity_type}.{relation}' targets unknown entity type '{target}'")]
    UnknownRelationTarget {
        entity_type: String,
        relation: String,
        target: String,
    },

    #[error("Relation '{entity_type}.{relation}' declares inverse '{inverse}' that no target type defines")]
    UnknownInverse {
        entity_type: String,
        relation: String,
        inverse: String,
    },

    #[error("Entity type '{entity_type}' defines member '{member}' more than once")]
    DuplicateMember {
        entity_type: String,
        member: String,
    },

    #[error("Schema could not be resolved ({} issue(s)): {}", .issues.len(), render_issues(.issues))]
    Unresolved {
        issues: Vec<SchemaError>,
    },
}

fn render_issues(issues: &[SchemaError]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Errors raised while populating the graph.
///
/// Every variant is attributable to the smallest unit of work (one
/// attribute, one relation, one instance, one row). Only
/// [`PopulationError::IdentityCollision`] is surfaced as a hard error from
/// the registry; everything else is collected into row reports.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PopulationError {
    #[error("Identity collision on '{key}': existing instance is '{existing_type}', requested '{requested_type}'")]
    IdentityCollision {
        key: String,
        existing_type: String,
        requested_type: String,
    },

    #[error("Row {row}: mandatory context '{entity_type}' could not be established ({reason})")]
    MissingMandatoryContext {
        row: usize,
        entity_type: String,
        reason: String,
    },

    #[error("Attribute '{attribute}' is not defined for entity type '{entity_type}'")]
    UndefinedAttribute {
        entity_type: String,
        attribute: String,
    },

    #[error("Relation '{relation}' is not defined for entity type '{entity_type}'")]
    UndefinedRelation {
        entity_type: String,
        relation: String,
    },

    #[error("Mapping declares '{member}' of '{entity_type}' as {mapped}, but the schema defines it as {declared}")]
    CardinalityMismatch {
        entity_type: String,
        member: String,
        declared: Cardinality,
        mapped: Cardinality,
    },

    #[error("Entity type '{name}' is not defined in the schema")]
    UnknownEntityType {
        name: String,
    },

    #[error("Cannot cast '{raw}' to {kind} for '{attribute}': {reason}")]
    CastFailure {
        attribute: String,
        raw: String,
        kind: String,
        reason: String,
    },

    #[error("Relation '{relation}' target '{target_key}' ({target_type}) was not found")]
    RelationTargetNotFound {
        relation: String,
        target_type: String,
        target_key: String,
    },

    #[error("Relation '{relation}' cannot point at an instance of '{target_type}'")]
    IncompatibleRelationTarget {
        relation: String,
        target_type: String,
    },

    #[error("Cannot create an instance of '{entity_type}' from an empty identifier")]
    EmptyIdentifier {
        entity_type: String,
    },

    #[error("Instance '{name}' is not registered")]
    UnknownInstance {
        name: String,
    },
}

impl PopulationError {
    /// Returns true if this error fails the whole row.
    #[must_use]
    pub const fn is_row_fatal(&self) -> bool {
        matches!(self, Self::MissingMandatoryContext { .. })
    }

    /// Returns true if this error indicates a naming-scheme defect.
    #[must_use]
    pub const fn is_collision(&self) -> bool {
        matches!(self, Self::IdentityCollision { .. })
    }
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration value for '{field}': {reason}")]
    Invalid {
        field: String,
        reason: String,
    },
}

impl ConfigError {
    /// Creates an invalid-value error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Top-level error type for plantgraph.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Population error: {0}")]
    Population(#[from] PopulationError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl GraphError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true if this is a schema error.
    #[must_use]
    pub const fn is_schema(&self) -> bool {
        matches!(self, Self::Schema(_))
    }

    /// Returns true if this is a population error.
    #[must_use]
    pub const fn is_population(&self) -> bool {
        matches!(self, Self::Population(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}

/// Result type alias for plantgraph operations.
pub type GraphResult<T> = Result<T, GraphError>;
