//! Two-pass population pipeline.
//!
//! Pass 1 creates (or finds) every instance a row describes and applies
//! scalar attributes. Pass 2 resolves relations once all rows finished
//! pass 1, so a relation may point at an instance created by a later row.
//! The structural pass then resolves derived relations over the whole
//! registry. Only a missing mandatory context fails a row; nothing fails
//! the batch.
//!
//! # Examples
//!
//! ```
//! use std::sync::Arc;
//! use plantgraph::{manufacturing, Pipeline, PopulationConfig, Row};
//!
//! let pipeline = Pipeline::new(
//!     Arc::new(manufacturing::schema().unwrap()),
//!     manufacturing::mapping(),
//!     PopulationConfig::default(),
//! )
//! .unwrap();
//!
//! let rows = vec![
//!     Row::new(0)
//!         .with("PLANT", "P1")
//!         .with("GH_FOCUSFACTORY", "Beverage")
//!         .with("PHYSICAL_AREA", "Hall 2")
//!         .with("LINE_NAME", "L1")
//!         .with("EQUIPMENT_TYPE", "Line")
//!         .with("START_TIME_UTC", "2024-03-01 09:00:00")
//!         .with("END_TIME_UTC", "2024-03-01 11:00:00"),
//!     Row::new(1).with("LINE_NAME", "L1"),
//! ];
//! let outcome = pipeline.populate(&rows);
//!
//! assert_eq!(outcome.report.succeeded, 1);
//! assert_eq!(outcome.report.failed, 1);
//! assert_eq!(outcome.report.event_contexts.len(), 1);
//! ```

mod pass1;
mod pass2;
mod report;
mod structural;

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::config::PopulationConfig;
use crate::error::{GraphResult, PopulationError};
use crate::graph::IdentityRegistry;
use crate::row::Row;
use crate::schema::{Schema, SchemaMapping};
use crate::sequence::{SequenceBuilder, SequenceReport};
use crate::temporal::{LinkReport, TemporalLinker};

use pass1::{Pass1, RowWork};

pub use report::{PopulationReport, RowReport, RowState, StructuralReport};

/// A populated registry with its report.
#[derive(Debug, Clone)]
pub struct PopulationOutcome {
    pub registry: IdentityRegistry,
    pub report: PopulationReport,
}

/// Population followed by sequencing and temporal linking.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub registry: IdentityRegistry,
    pub population: PopulationReport,
    pub sequence: SequenceReport,
    pub linking: LinkReport,
}

/// The population engine: schema, mapping and configuration, checked once.
#[derive(Debug, Clone)]
pub struct Pipeline {
    schema: Arc<Schema>,
    mapping: SchemaMapping,
    config: PopulationConfig,
    mapping_issues: Vec<PopulationError>,
}

impl Pipeline {
    /// Creates a pipeline.
    ///
    /// Mapping entries the schema does not define are logged, reported in
    /// every [`PopulationReport::mapping_issues`], and dropped.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `config` is invalid or its layout
    /// names types the schema lacks.
    pub fn new(schema: Arc<Schema>, mapping: SchemaMapping, config: PopulationConfig) -> GraphResult<Self> {
        let config = config.validate()?;
        config.layout.validate(&schema)?;

        let mapping_issues = mapping.validate(&schema);
        let mapping = if mapping_issues.is_empty() {
            mapping
        } else {
            for issue in &mapping_issues {
                warn!(error = %issue, "Mapping entry skipped");
            }
            mapping.retain_valid(&schema)
        };

        Ok(Self {
            schema,
            mapping,
            config,
            mapping_issues,
        })
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    /// The mapping actually applied (invalid entries removed).
    #[must_use]
    pub const fn mapping(&self) -> &SchemaMapping {
        &self.mapping
    }

    #[must_use]
    pub const fn config(&self) -> &PopulationConfig {
        &self.config
    }

    /// An empty registry over this pipeline's schema.
    #[must_use]
    pub fn registry(&self) -> IdentityRegistry {
        IdentityRegistry::new(Arc::clone(&self.schema))
    }

    /// Populates a fresh registry from `rows`.
    #[must_use]
    pub fn populate(&self, rows: &[Row]) -> PopulationOutcome {
        let mut registry = self.registry();
        let report = self.populate_into(&mut registry, rows);
        PopulationOutcome { registry, report }
    }

    /// Populates an existing registry from `rows`.
    pub fn populate_into(&self, registry: &mut IdentityRegistry, rows: &[Row]) -> PopulationReport {
        info!(rows = rows.len(), "Population started");
        let mut report = PopulationReport::new(self.mapping_issues.clone());
        let mut row_reports: Vec<RowReport> = Vec::with_capacity(rows.len());
        let mut works: Vec<Option<RowWork>> = Vec::with_capacity(rows.len());

        let pass1 = Pass1 {
            mapping: &self.mapping,
            config: &self.config,
        };
        for row in rows {
            let mut row_report = RowReport::new(row.index());
            match pass1.run_row(registry, row, &mut row_report, &mut report) {
                Ok(work) => {
                    row_report.state = RowState::Pass1Applied;
                    works.push(Some(work));
                }
                Err(e) => {
                    error!(row = row.index(), error = %e, "Row failed");
                    row_report.fail(e);
                    works.push(None);
                }
            }
            row_reports.push(row_report);
        }
        info!(instances = registry.len(), "Pass 1 finished");

        for ((row, row_report), work) in rows.iter().zip(row_reports.iter_mut()).zip(&works) {
            if let Some(work) = work {
                pass2::run_row(&self.mapping, registry, row, work, row_report);
                row_report.state = RowState::Pass2Applied;
            }
        }
        info!(
            relations = row_reports.iter().map(|r| r.relations_applied).sum::<usize>(),
            "Pass 2 finished"
        );

        report.structural = structural::reconcile(&self.mapping, registry);

        for row_report in &mut row_reports {
            row_report.finish();
        }
        report.event_contexts = works.into_iter().flatten().flat_map(|w| w.events).collect();
        report.rows = row_reports;
        report.tally();

        info!(
            succeeded = report.succeeded,
            partial = report.partial,
            failed = report.failed,
            instances = registry.len(),
            events = report.event_contexts.len(),
            "Population finished"
        );
        report
    }

    /// Populates a fresh registry, then builds sequences and links events.
    #[must_use]
    pub fn run(&self, rows: &[Row]) -> RunOutcome {
        let PopulationOutcome { mut registry, report } = self.populate(rows);
        let sequence = SequenceBuilder::new(self.config.sequence.clone()).build(&mut registry, &report.positions);
        let linking = TemporalLinker::new(self.config.linker.clone()).link(&mut registry, &report.event_contexts);
        RunOutcome {
            registry,
            population: report,
            sequence,
            linking,
        }
    }
}
