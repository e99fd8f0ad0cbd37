use std::collections::BTreeMap;
use std::sync::Arc;

use plantgraph::{
    manufacturing, IdentityRegistry, Pipeline, PopulationConfig, Row, SequenceBuilder, SequenceDiagnostic, Value,
};

fn equipment_row(index: usize, line: &str, id: &str, name: &str) -> Row {
    Row::new(index)
        .with("PLANT", "P1")
        .with("GH_FOCUSFACTORY", "Beverage")
        .with("PHYSICAL_AREA", "Hall 2")
        .with("LINE_NAME", line)
        .with("EQUIPMENT_TYPE", "Equipment")
        .with("EQUIPMENT_ID", id)
        .with("EQUIPMENT_NAME", name)
}

fn rows() -> Vec<Row> {
    [
        ("L1", "L1-4", "L1_Palletizer"),
        ("L1", "L1-2b", "L1_Cartoner2"),
        ("L1", "L1-1", "L1_Filler"),
        ("L1", "L1-2a", "L1_Cartoner1"),
        ("L1", "L1-9", "FIPCO009"),
        ("L2", "L2-1", "L2_Filler"),
        ("L2", "L2-2", "L2_Cartoner"),
        ("L2", "L2-4", "L2_Palletizer"),
    ]
    .into_iter()
    .enumerate()
    .map(|(i, (line, id, name))| equipment_row(i, line, id, name))
    .collect()
}

fn config() -> PopulationConfig {
    let mut config = PopulationConfig::default();
    config.sequence.context_overrides.insert(
        "L2".to_string(),
        BTreeMap::from([("Palletizer".to_string(), 1), ("Filler".to_string(), 2)]),
    );
    config
}

fn pipeline() -> Pipeline {
    Pipeline::new(Arc::new(manufacturing::schema().unwrap()), manufacturing::mapping(), config()).unwrap()
}

fn downstream_of(registry: &IdentityRegistry, id: &str) -> Option<String> {
    let equipment = registry.get(registry.lookup("Equipment", id)?)?;
    equipment
        .related("isImmediatelyUpstreamOf")
        .map(|next| registry.name_of(next))
}

#[test]
fn chains_follow_class_positions() {
    let outcome = pipeline().run(&rows());
    let registry = &outcome.registry;
    let report = &outcome.sequence;

    assert_eq!(report.contexts, 2);
    assert_eq!(report.overridden_contexts, 1);
    assert_eq!(report.class_links, 3);
    assert_eq!(report.instance_links, 4);
    assert_eq!(report.positioned_instances, 6);

    assert_eq!(downstream_of(registry, "L1-1").as_deref(), Some("Equipment_L1-2a"));
    assert_eq!(downstream_of(registry, "L1-2a").as_deref(), Some("Equipment_L1-2b"));
    assert_eq!(downstream_of(registry, "L1-2b").as_deref(), Some("Equipment_L1-4"));
    assert_eq!(downstream_of(registry, "L1-4"), None);
    assert_eq!(downstream_of(registry, "L1-9"), None);

    let cartoner = registry.get(registry.lookup("Equipment", "L1-2b").unwrap()).unwrap();
    assert_eq!(cartoner.attribute("sequencePosition"), Some(&Value::Integer(2)));
    let back = cartoner.related("isImmediatelyDownstreamOf").unwrap();
    assert_eq!(registry.name_of(back), "Equipment_L1-2a");
}

#[test]
fn context_override_replaces_default_order() {
    let outcome = pipeline().run(&rows());
    let registry = &outcome.registry;

    assert_eq!(downstream_of(registry, "L2-4").as_deref(), Some("Equipment_L2-1"));
    assert_eq!(downstream_of(registry, "L2-1"), None);
    assert_eq!(downstream_of(registry, "L2-2"), None);

    let palletizer = registry.get(registry.lookup("Equipment", "L2-4").unwrap()).unwrap();
    assert_eq!(palletizer.attribute("sequencePosition"), Some(&Value::Integer(1)));

    assert!(outcome.sequence.diagnostics.contains(&SequenceDiagnostic::NoSequencePosition {
        entity_type: "Cartoner".to_string(),
        context: Some("ProductionLine_L2".to_string()),
    }));
}

#[test]
fn unknown_class_is_ordered_last_and_reported() {
    let outcome = pipeline().run(&rows());
    let report = &outcome.sequence;

    assert_eq!(
        report.class_order.last(),
        Some(&("GenericEquipment".to_string(), None))
    );
    let missing: Vec<_> = report.missing_positions().collect();
    assert!(missing.contains(&&SequenceDiagnostic::NoSequencePosition {
        entity_type: "GenericEquipment".to_string(),
        context: None,
    }));
    assert!(missing.contains(&&SequenceDiagnostic::NoSequencePosition {
        entity_type: "GenericEquipment".to_string(),
        context: Some("ProductionLine_L1".to_string()),
    }));

    let registry = &outcome.registry;
    let palletizer = registry.lookup("EquipmentClass", "Palletizer").unwrap();
    let generic = registry.lookup("EquipmentClass", "GenericEquipment").unwrap();
    assert_eq!(
        registry.get(palletizer).unwrap().related("classIsUpstreamOf"),
        Some(generic)
    );
}

#[test]
fn rebuilding_leaves_the_graph_unchanged() {
    let pipeline = pipeline();
    let mut outcome = pipeline.run(&rows());
    let before = outcome.registry.snapshot();

    let again = SequenceBuilder::new(pipeline.config().sequence.clone())
        .build(&mut outcome.registry, &outcome.population.positions);
    assert_eq!(outcome.registry.snapshot(), before);
    assert_eq!(again.instance_links, outcome.sequence.instance_links);
}
