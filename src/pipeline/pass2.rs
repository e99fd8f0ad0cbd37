//! Pass 2: relations of the instances each row touched.

use super::pass1::RowWork;
use super::report::RowReport;
use crate::apply::apply_relations;
use crate::graph::IdentityRegistry;
use crate::row::Row;
use crate::schema::SchemaMapping;

/// Applies every non-derived relation mapping to the row's instances.
///
/// Targets come either from the registry (column keys, any row) or from the
/// row's own instances. Misses are recorded on the report.
pub(super) fn run_row(
    mapping: &SchemaMapping,
    registry: &mut IdentityRegistry,
    row: &Row,
    work: &RowWork,
    report: &mut RowReport,
) {
    for (entity_type, id) in work.instances.touched() {
        let Some(entity) = mapping.entity(entity_type) else {
            continue;
        };
        let outcome = apply_relations(registry, id, entity, row, &work.instances);
        report.absorb_relations(outcome);
    }
}
