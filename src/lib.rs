//! # plantgraph - tabular operational records to a typed entity graph
//!
//! plantgraph materializes flat manufacturing records (one row per event on
//! a production line or a piece of equipment) into a graph of typed entity
//! instances, then derives the structure the rows only imply: which line
//! event each equipment event belongs to, and how equipment is ordered
//! along each line.
//!
//! ## Core Concepts
//!
//! - **Schema**: entity types with attributes, relations and inverses
//! - **Identity Registry**: one instance per natural key, found again on every later row
//! - **Pipeline**: two passes over the rows (instances and attributes, then relations)
//! - **Sequence Builder**: upstream/downstream chains per production line
//! - **Temporal Linker**: equipment events attached to their containing line event
//!
//! ## Usage
//!
//! ```
//! use std::sync::Arc;
//! use plantgraph::{manufacturing, Pipeline, PopulationConfig, Row};
//!
//! let pipeline = Pipeline::new(
//!     Arc::new(manufacturing::schema()?),
//!     manufacturing::mapping(),
//!     PopulationConfig::default(),
//! )?;
//!
//! let row = Row::new(0)
//!     .with("PLANT", "P1")
//!     .with("GH_FOCUSFACTORY", "Beverage")
//!     .with("PHYSICAL_AREA", "Hall 2")
//!     .with("LINE_NAME", "L1")
//!     .with("EQUIPMENT_TYPE", "Equipment")
//!     .with("EQUIPMENT_ID", "101")
//!     .with("EQUIPMENT_NAME", "L1_Filler")
//!     .with("START_TIME_UTC", "2024-03-01 10:00:00");
//!
//! let outcome = pipeline.run(&[row]);
//! assert!(outcome.registry.lookup("Equipment", "101").is_some());
//! # Ok::<(), plantgraph::GraphError>(())
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod cast;
pub mod error;
pub mod naming;
pub mod row;
pub mod value;

// Schema and graph
pub mod graph;
pub mod manufacturing;
pub mod schema;

// Population
pub mod apply;
pub mod config;
pub mod layout;
pub mod pipeline;

// Reconciliation and reporting
pub mod analysis;
pub mod sequence;
pub mod temporal;

// Re-export primary types at crate root for convenience
pub use analysis::{summarize, PopulationSummary};
pub use config::{LanguageConfig, PopulationConfig};
pub use error::{ConfigError, GraphError, GraphResult, PopulationError, SchemaError};
pub use graph::{
    ConsistencyChecker, ConsistencyVerdict, EntityInstance, GraphSink, GraphSnapshot, IdentityRegistry,
    MemorySink, StructuralChecker,
};
pub use layout::RowLayout;
pub use naming::{InstanceId, NaturalKey};
pub use pipeline::{Pipeline, PopulationOutcome, PopulationReport, RowReport, RowState, RunOutcome};
pub use row::Row;
pub use schema::{Schema, SchemaBuilder, SchemaMapping};
pub use sequence::{SequenceBuilder, SequenceConfig, SequenceDiagnostic, SequenceReport};
pub use temporal::{LinkReport, LinkerConfig, MatchStrategy, TemporalLinker, TimeInterval};
pub use value::{Cardinality, Value, ValueKind};
