use std::collections::BTreeSet;
use std::sync::Arc;

use plantgraph::schema::RelationMapping;
use plantgraph::{
    manufacturing, summarize, ConsistencyChecker, GraphSink, MemorySink, Pipeline, PopulationConfig, PopulationError,
    Row, RowState, StructuralChecker, Value,
};
use proptest::prelude::*;

fn pipeline() -> Pipeline {
    Pipeline::new(
        Arc::new(manufacturing::schema().unwrap()),
        manufacturing::mapping(),
        PopulationConfig::default(),
    )
    .unwrap()
}

fn base_row(index: usize, line: &str) -> Row {
    Row::new(index)
        .with("PLANT", "P1")
        .with("PLANT_DESCRIPTION", "Planta Toluca")
        .with("PLANT_COUNTRY_DESCRIPTION", "Mexico")
        .with("GH_FOCUSFACTORY", "Beverage")
        .with("PHYSICAL_AREA", "Hall 2")
        .with("LINE_NAME", line)
        .with("SHIFT_NAME", "A")
        .with("SHIFT_START_DATE_LOC", "2024-03-01 06:00:00")
        .with("SHIFT_END_DATE_LOC", "2024-03-01 14:00:00")
        .with("MATERIAL_ID", "M-7")
        .with("MATERIAL_DESC", "Botella 600ml")
        .with("PRODUCTION_ORDER_ID", "PO-1")
}

/// Two lines, each with one line event and four equipment events.
fn plant_rows() -> Vec<Row> {
    let mut rows = Vec::new();
    for line in ["L1", "L2"] {
        rows.push(
            base_row(rows.len(), line)
                .with("EQUIPMENT_TYPE", "Line")
                .with("UTIL_STATE_DESCRIPTION", "Running")
                .with("START_TIME_UTC", "2024-03-01 08:00:00")
                .with("END_TIME_UTC", "2024-03-01 12:00:00")
                .with("GOOD_PRODUCTION_QTY", "1200"),
        );
        for (i, class) in ["Filler", "Cartoner", "CasePacker", "Palletizer"].into_iter().enumerate() {
            let minute = 10 * i;
            rows.push(
                base_row(rows.len(), line)
                    .with("EQUIPMENT_TYPE", "Equipment")
                    .with("EQUIPMENT_ID", &format!("{line}-{}", i + 1))
                    .with("EQUIPMENT_NAME", &format!("{line}_{class}"))
                    .with("UTIL_STATE_DESCRIPTION", "Unplanned Stop")
                    .with("UTIL_REASON_DESCRIPTION", "Jam")
                    .with("UTIL_ALT_LANGUAGE_REASON", "Atasco")
                    .with("START_TIME_UTC", &format!("2024-03-01 09:{minute:02}:00"))
                    .with("END_TIME_UTC", &format!("2024-03-01 09:{:02}:00", minute + 5))
                    .with("REJECT_PRODUCTION_QTY", "3"),
            );
        }
    }
    rows
}

#[test]
fn populate_plant_export() {
    let outcome = pipeline().populate(&plant_rows());
    let report = &outcome.report;
    let registry = &outcome.registry;

    assert_eq!(report.total_rows(), 10);
    assert_eq!(report.failed, 0);
    assert_eq!(report.partial, 0, "issues: {:?}", report.issues().collect::<Vec<_>>());
    assert_eq!(report.event_contexts.len(), 10);

    let counts = registry.count_by_type();
    assert_eq!(counts["Plant"], 1);
    assert_eq!(counts["ProductionLine"], 2);
    assert_eq!(counts["Equipment"], 8);
    assert_eq!(counts["EquipmentClass"], 4);
    assert_eq!(counts["EventRecord"], 10);
    assert_eq!(counts["Shift"], 1);

    let plant = registry.get(registry.lookup("Plant", "P1").unwrap()).unwrap();
    assert_eq!(
        plant.attribute("plantDescription"),
        Some(&Value::tagged("Planta Toluca", "es"))
    );

    let line = registry.lookup("ProductionLine", "L1").unwrap();
    assert_eq!(registry.relation_targets(line, "hasEquipmentPart").len(), 4);

    let verdict = StructuralChecker::new(registry.schema()).check(&registry.snapshot());
    assert!(verdict.is_consistent(), "{verdict:?}");
}

#[test]
fn row_order_does_not_change_the_graph() {
    let rows = plant_rows();
    let mut reversed = rows.clone();
    reversed.reverse();

    let pipeline = pipeline();
    let forward = pipeline.populate(&rows).registry.snapshot();
    let backward = pipeline.populate(&reversed).registry.snapshot();
    assert_eq!(forward, backward);
}

#[test]
fn repopulating_is_idempotent() {
    let pipeline = pipeline();
    let rows = plant_rows();
    let mut registry = pipeline.registry();

    pipeline.populate_into(&mut registry, &rows);
    let once = registry.snapshot();
    let again = pipeline.populate_into(&mut registry, &rows);
    assert_eq!(registry.snapshot(), once);
    assert_eq!(again.failed, 0);
}

#[test]
fn missing_plant_fails_only_that_row() {
    let mut rows = plant_rows();
    rows.push(
        Row::new(rows.len())
            .with("LINE_NAME", "L9")
            .with("EQUIPMENT_TYPE", "Line")
            .with("START_TIME_UTC", "2024-03-01 08:00:00"),
    );
    let outcome = pipeline().populate(&rows);
    let report = &outcome.report;

    assert_eq!(report.failed, 1);
    assert_eq!(report.rows.last().unwrap().state, RowState::Failed);
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert!(matches!(
        failures[0].1,
        PopulationError::MissingMandatoryContext { entity_type, .. } if entity_type == "Plant"
    ));
    assert!(outcome.registry.lookup("ProductionLine", "L9").is_none());
    assert_eq!(report.succeeded, 10);
}

#[test]
fn bad_cells_are_skipped_not_fatal() {
    let rows = vec![base_row(0, "L1")
        .with("EQUIPMENT_TYPE", "Equipment")
        .with("EQUIPMENT_ID", "L1-1")
        .with("EQUIPMENT_NAME", "L1_Filler")
        .with("START_TIME_UTC", "2024-03-01 09:00:00")
        .with("GOOD_PRODUCTION_QTY", "lots")
        .with("TOTAL_TIME_SECONDS", "n/a")];
    let outcome = pipeline().populate(&rows);
    let row = &outcome.report.rows[0];

    assert_eq!(row.state, RowState::FailedPartial);
    assert_eq!(row.issues.len(), 1);
    let event = outcome.registry.get(outcome.report.event_contexts[0].event).unwrap();
    assert_eq!(event.attribute("goodProductionQuantity"), Some(&Value::Integer(0)));
    assert_eq!(event.attribute("reportedDurationSeconds"), None);
}

#[test]
fn snapshot_reaches_sink_and_summary() {
    let outcome = pipeline().populate(&plant_rows());
    let mut sink = MemorySink::new();
    sink.write(&outcome.registry.snapshot()).unwrap();
    assert_eq!(sink.last().unwrap().instance_count(), outcome.registry.len());

    let summary = summarize(&outcome.registry);
    assert_eq!(summary.count("Equipment"), 8);
    assert!(summary.empty_types().next().is_none());
    assert!(summary.types["Equipment"]
        .unused_relations
        .contains(&"isImmediatelyUpstreamOf".to_string()));
}

#[test]
fn structural_pass_links_equipment_without_line_context() {
    let equipment = |index: usize, id: &str| {
        Row::new(index)
            .with("PLANT", "P1")
            .with("EQUIPMENT_TYPE", "Equipment")
            .with("EQUIPMENT_ID", id)
            .with("EQUIPMENT_NAME", "L1_Filler")
            .with("START_TIME_UTC", "2024-03-01 09:00:00")
    };
    let rows = vec![
        equipment(0, "L1-7"),
        equipment(1, "L2-3"),
        base_row(2, "L1")
            .with("EQUIPMENT_TYPE", "Line")
            .with("START_TIME_UTC", "2024-03-01 08:00:00"),
    ];
    let outcome = pipeline().populate(&rows);
    let structural = &outcome.report.structural;
    let registry = &outcome.registry;

    assert_eq!(structural.links.get("Equipment.isPartOfProductionLine"), Some(&1));
    assert_eq!(structural.unmatched, 1);
    assert!(structural.issues.is_empty());

    let line = registry.lookup("ProductionLine", "L1").unwrap();
    let placed = registry.lookup("Equipment", "L1-7").unwrap();
    let stray = registry.lookup("Equipment", "L2-3").unwrap();
    assert_eq!(registry.get(placed).unwrap().related("isPartOfProductionLine"), Some(line));
    assert!(registry.relation_targets(line, "hasEquipmentPart").contains(&placed));
    assert!(!registry.get(stray).unwrap().has_relation("isPartOfProductionLine"));
}

#[test]
fn column_relation_resolves_target_from_later_row() {
    let mapping = manufacturing::mapping().relation(
        "ProductionRequest",
        RelationMapping::column("usesMaterial", "Material", "MAT_REF"),
    );
    let pipeline = Pipeline::new(
        Arc::new(manufacturing::schema().unwrap()),
        mapping,
        PopulationConfig::default(),
    )
    .unwrap();
    let rows = vec![
        base_row(0, "L1")
            .with("MATERIAL_ID", "")
            .with("MAT_REF", "M-9")
            .with("EQUIPMENT_TYPE", "Line")
            .with("START_TIME_UTC", "2024-03-01 08:00:00"),
        base_row(1, "L1")
            .with("PRODUCTION_ORDER_ID", "")
            .with("MATERIAL_ID", "M-9")
            .with("EQUIPMENT_TYPE", "Line")
            .with("START_TIME_UTC", "2024-03-01 09:00:00"),
    ];
    let mut reversed = rows.clone();
    reversed.reverse();

    let forward = pipeline.populate(&rows);
    let backward = pipeline.populate(&reversed);
    for outcome in [&forward, &backward] {
        assert_eq!(outcome.report.failed, 0);
        assert_eq!(outcome.report.issues().count(), 0);
        let registry = &outcome.registry;
        let request = registry.lookup("ProductionRequest", "PO-1").unwrap();
        let material = registry.lookup("Material", "M-9").unwrap();
        assert_eq!(registry.relation_targets(request, "usesMaterial"), vec![material]);
    }
    assert_eq!(forward.registry.snapshot(), backward.registry.snapshot());
}

proptest! {
    #[test]
    fn one_instance_per_natural_key(
        cells in prop::collection::vec(("L[1-3]", "[A-D][0-9]", 0u32..24), 1..40)
    ) {
        let rows: Vec<Row> = cells
            .iter()
            .enumerate()
            .map(|(i, (line, equipment, hour))| {
                base_row(i, line)
                    .with("EQUIPMENT_TYPE", "Equipment")
                    .with("EQUIPMENT_ID", equipment)
                    .with("START_TIME_UTC", &format!("2024-03-01 {hour:02}:00:00"))
            })
            .collect();
        let outcome = pipeline().populate(&rows);

        let lines: BTreeSet<&str> = cells.iter().map(|(l, _, _)| l.as_str()).collect();
        let equipment: BTreeSet<&str> = cells.iter().map(|(_, e, _)| e.as_str()).collect();
        let events: BTreeSet<(&str, u32)> = cells.iter().map(|(_, e, h)| (e.as_str(), *h)).collect();
        let counts = outcome.registry.count_by_type();

        prop_assert_eq!(outcome.report.failed, 0);
        prop_assert_eq!(counts["ProductionLine"], lines.len());
        prop_assert_eq!(counts["Equipment"], equipment.len());
        prop_assert_eq!(counts["EventRecord"], events.len());

        let names: BTreeSet<&str> = outcome.registry.instances().map(|i| i.name()).collect();
        prop_assert_eq!(names.len(), outcome.registry.len());
    }
}
