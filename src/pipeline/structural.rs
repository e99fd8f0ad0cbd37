//! Structural reconciliation: derived relations over the whole registry.

use tracing::{debug, info, warn};

use super::report::StructuralReport;
use crate::graph::IdentityRegistry;
use crate::naming::InstanceId;
use crate::schema::{DerivedRule, RelationMapping, RelationSource, SchemaMapping};
use crate::value::Value;

/// Resolves every derived relation mapping.
///
/// A source instance that has no edge for the relation yet is linked to the
/// first target instance, by name, whose target attribute matches one of the
/// source attribute values.
pub(super) fn reconcile(mapping: &SchemaMapping, registry: &mut IdentityRegistry) -> StructuralReport {
    let mut report = StructuralReport::default();
    for (entity_type, entity) in mapping.entities() {
        for relation in &entity.relations {
            let RelationSource::Derived(rule) = &relation.source else {
                continue;
            };
            let key = format!("{entity_type}.{}", relation.relation);
            let (planned, unmatched) = plan(registry, entity_type, relation, rule);
            report.unmatched += unmatched;

            for (source, target) in planned {
                match registry.set_relation(source, &relation.relation, Some(target)) {
                    Ok(true) => *report.links.entry(key.clone()).or_insert(0) += 1,
                    Ok(false) => {}
                    Err(e) => {
                        warn!(source = %registry.name_of(source), relation = %key, error = %e, "Derived relation skipped");
                        report.issues.push(e);
                    }
                }
            }
            debug!(relation = %key, links = report.links.get(&key).copied().unwrap_or(0), "Derived relation resolved");
        }
    }
    info!(
        links = report.total_links(),
        unmatched = report.unmatched,
        issues = report.issues.len(),
        "Structural reconciliation finished"
    );
    report
}

fn texts(values: &[Value]) -> Vec<String> {
    values.iter().map(Value::to_key_string).collect()
}

/// Returns the `(source, target)` pairs to link and the number of sources
/// that had values but no match.
fn plan(
    registry: &IdentityRegistry,
    entity_type: &str,
    relation: &RelationMapping,
    rule: &DerivedRule,
) -> (Vec<(InstanceId, InstanceId)>, usize) {
    let targets: Vec<(InstanceId, Vec<String>)> = registry
        .instances_of(&relation.target_type)
        .into_iter()
        .map(|t| (t.id(), texts(t.attribute_values(&rule.target_attribute))))
        .collect();

    let mut planned = Vec::new();
    let mut unmatched = 0;
    for source in registry.instances_of(entity_type) {
        if source.has_relation(&relation.relation) {
            continue;
        }
        let values = texts(source.attribute_values(&rule.source_attribute));
        if values.is_empty() {
            continue;
        }
        let hit = targets.iter().find(|(id, target_values)| {
            *id != source.id()
                && target_values
                    .iter()
                    .any(|tv| values.iter().any(|sv| rule.matching.matches(sv, tv)))
        });
        match hit {
            Some((target, _)) => planned.push((source.id(), *target)),
            None => unmatched += 1,
        }
    }
    (planned, unmatched)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::{EntityType, MatchMode, RelationDefinition, Schema};
    use crate::value::ValueKind;

    fn registry() -> IdentityRegistry {
        let schema = Schema::builder()
            .entity_type(
                EntityType::new("Equipment")
                    .attribute("equipmentName", ValueKind::String)
                    .relation(RelationDefinition::new("memberOfClass", "EquipmentClass")),
            )
            .entity_type(EntityType::new("EquipmentClass").attribute("equipmentClassId", ValueKind::String))
            .build()
            .unwrap();
        IdentityRegistry::new(Arc::new(schema))
    }

    fn mapping(matching: MatchMode) -> SchemaMapping {
        SchemaMapping::new().relation(
            "Equipment",
            RelationMapping::derived(
                "memberOfClass",
                "EquipmentClass",
                DerivedRule {
                    source_attribute: "equipmentName".to_string(),
                    target_attribute: "equipmentClassId".to_string(),
                    matching,
                },
            ),
        )
    }

    fn named(reg: &mut IdentityRegistry, entity_type: &str, base: &str, attribute: &str, value: &str) -> InstanceId {
        let id = reg.get_or_create(entity_type, base, &[]).unwrap();
        reg.set_attribute(id, attribute, Some(Value::from(value))).unwrap();
        id
    }

    #[test]
    fn test_contains_rule_links_by_parsed_name() {
        let mut reg = registry();
        let eq = named(&mut reg, "Equipment", "101", "equipmentName", "L1_CasePacker2");
        let orphan = named(&mut reg, "Equipment", "102", "equipmentName", "L1_Mystery");
        let packer = named(&mut reg, "EquipmentClass", "CasePacker", "equipmentClassId", "CasePacker");
        named(&mut reg, "EquipmentClass", "Filler", "equipmentClassId", "Filler");

        let report = reconcile(&mapping(MatchMode::Contains), &mut reg);
        assert_eq!(report.links.get("Equipment.memberOfClass"), Some(&1));
        assert_eq!(report.unmatched, 1);
        assert_eq!(reg.get(eq).unwrap().related("memberOfClass"), Some(packer));
        assert!(!reg.get(orphan).unwrap().has_relation("memberOfClass"));

        let again = reconcile(&mapping(MatchMode::Contains), &mut reg);
        assert_eq!(again.total_links(), 0);
    }

    #[test]
    fn test_case_insensitive_rule() {
        let mut reg = registry();
        let eq = named(&mut reg, "Equipment", "101", "equipmentName", "filler");
        let filler = named(&mut reg, "EquipmentClass", "Filler", "equipmentClassId", "Filler");

        assert_eq!(reconcile(&mapping(MatchMode::Exact), &mut reg).total_links(), 0);
        assert_eq!(reconcile(&mapping(MatchMode::CaseInsensitive), &mut reg).total_links(), 1);
        assert_eq!(reg.get(eq).unwrap().related("memberOfClass"), Some(filler));
    }

    #[test]
    fn test_first_target_by_name_wins() {
        let mut reg = registry();
        let eq = named(&mut reg, "Equipment", "101", "equipmentName", "CaseFormer_CasePacker");
        let former = named(&mut reg, "EquipmentClass", "CaseFormer", "equipmentClassId", "CaseFormer");
        named(&mut reg, "EquipmentClass", "CasePacker", "equipmentClassId", "CasePacker");

        reconcile(&mapping(MatchMode::Contains), &mut reg);
        assert_eq!(reg.get(eq).unwrap().related("memberOfClass"), Some(former));
    }
}
