use std::sync::Arc;

use plantgraph::temporal::FailureCategory;
use plantgraph::{manufacturing, MatchStrategy, Pipeline, PopulationConfig, Row, RunOutcome};

fn row(index: usize, line: &str, equipment: Option<&str>, start: &str, end: &str) -> Row {
    let row = Row::new(index)
        .with("PLANT", "P1")
        .with("GH_FOCUSFACTORY", "Beverage")
        .with("PHYSICAL_AREA", "Hall 2")
        .with("LINE_NAME", line)
        .with("START_TIME_UTC", &format!("2024-03-01 {start}:00"))
        .with("END_TIME_UTC", &format!("2024-03-01 {end}:00"));
    match equipment {
        Some(id) => row
            .with("EQUIPMENT_TYPE", "Equipment")
            .with("EQUIPMENT_ID", id)
            .with("EQUIPMENT_NAME", &format!("{line}_Filler")),
        None => row.with("EQUIPMENT_TYPE", "Line"),
    }
}

fn rows() -> Vec<Row> {
    vec![
        row(0, "L1", None, "08:00", "10:00"),
        row(1, "L1", Some("E1"), "09:00", "09:30"),
        row(2, "L1", Some("E2"), "07:30", "08:40"),
        row(3, "L1", Some("E3"), "09:50", "11:00"),
        row(4, "L1", Some("E4"), "06:00", "07:57"),
        row(5, "L1", Some("E5"), "13:00", "13:30"),
        row(6, "L2", Some("E6"), "09:00", "09:10"),
    ]
}

fn run(config: PopulationConfig) -> RunOutcome {
    Pipeline::new(Arc::new(manufacturing::schema().unwrap()), manufacturing::mapping(), config)
        .unwrap()
        .run(&rows())
}

#[test]
fn strategies_are_tried_in_order() {
    let outcome = run(PopulationConfig::default());
    let report = &outcome.linking;

    assert_eq!(report.line_events, 1);
    assert_eq!(report.equipment_events, 6);
    assert_eq!(report.links_created, 4);
    assert_eq!(report.matched_by(MatchStrategy::StrictContainment), 1);
    assert_eq!(report.matched_by(MatchStrategy::SignificantOverlap), 1);
    assert_eq!(report.matched_by(MatchStrategy::StartContainment), 1);
    assert_eq!(report.matched_by(MatchStrategy::EndContainment), 1);
    assert_eq!(report.matched_by(MatchStrategy::Proximity), 0);
    assert!((report.success_rate() - 4.0 / 6.0).abs() < 1e-9);

    let registry = &outcome.registry;
    let line_event = outcome.population.event_contexts[0].event;
    assert_eq!(registry.relation_targets(line_event, "hasDetailedEquipmentEvent").len(), 4);
}

#[test]
fn unmatched_events_are_categorized() {
    let outcome = run(PopulationConfig::default());
    let report = &outcome.linking;

    let counts = report.category_counts();
    assert_eq!(counts.get(&FailureCategory::GapTooLarge), Some(&1));
    assert_eq!(counts.get(&FailureCategory::NoCandidates), Some(&1));

    let far = report
        .failures
        .iter()
        .find(|f| f.category == FailureCategory::GapTooLarge)
        .unwrap();
    assert_eq!(far.row, 5);
    assert_eq!(far.gap_seconds, Some(3 * 3600));
    assert_eq!(far.nearest.as_deref(), Some("EventRecord_ProductionLine_L1_20240301T080000"));

    let lonely = report
        .failures
        .iter()
        .find(|f| f.category == FailureCategory::NoCandidates)
        .unwrap();
    assert_eq!(lonely.resource, "Equipment_E6");
    assert!(lonely.nearest.is_none());

    assert_eq!(report.near_miss.count, 1);
    assert_eq!(report.near_miss.within_double_buffer, 0);
}

#[test]
fn zero_buffer_from_config_tightens_matching() {
    let config = PopulationConfig::from_json_str(r#"{"linker": {"buffer_minutes": 0}}"#).unwrap();
    let outcome = run(config);
    let report = &outcome.linking;

    assert_eq!(report.links_created, 3);
    assert_eq!(report.matched_by(MatchStrategy::EndContainment), 0);
    let near = report.failures.iter().find(|f| f.row == 4).unwrap();
    assert_eq!(near.category, FailureCategory::GapTooLarge);
    assert_eq!(near.gap_seconds, Some(180));
}

#[test]
fn relinking_is_stable() {
    let outcome = run(PopulationConfig::default());
    let mut registry = outcome.registry.clone();
    let before = registry.snapshot();

    let again = plantgraph::TemporalLinker::new(Default::default())
        .link(&mut registry, &outcome.population.event_contexts);
    assert_eq!(again.links_created, outcome.linking.links_created);
    assert_eq!(registry.snapshot(), before);
}
