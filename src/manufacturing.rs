//! Manufacturing schema and mapping matching the default [`RowLayout`].
//!
//! These tables describe plant operations exports: one row per utilization
//! interval of a line or a piece of equipment.
//!
//! [`RowLayout`]: crate::layout::RowLayout

use crate::error::SchemaError;
use crate::schema::{
    AttributeMapping, DerivedRule, EntityType, MatchMode, RelationDefinition, RelationMapping, Schema, SchemaMapping,
};
use crate::value::ValueKind;

/// Builds the manufacturing schema.
///
/// # Errors
///
/// Never in practice; the definitions are static, but resolution goes
/// through [`Schema::builder`] like any other schema.
pub fn schema() -> Result<Schema, SchemaError> {
    use ValueKind::{Integer, Real, String, TaggedString, Timestamp};

    Schema::builder()
        .entity_type(
            EntityType::new("Plant")
                .attribute("plantId", String)
                .attribute("plantDescription", TaggedString)
                .attribute("countryDescription", String),
        )
        .entity_type(
            EntityType::new("Area")
                .attribute("areaId", String)
                .relation(RelationDefinition::new("locatedInPlant", "Plant")),
        )
        .entity_type(
            EntityType::new("ProcessCell")
                .attribute("processCellId", String)
                .relation(RelationDefinition::new("partOfArea", "Area")),
        )
        .entity_type(
            EntityType::new("ProductionLine")
                .attribute("lineId", String)
                .relation(RelationDefinition::new("locatedInProcessCell", "ProcessCell"))
                .relation(
                    RelationDefinition::new("hasEquipmentPart", "Equipment")
                        .multi()
                        .with_inverse("isPartOfProductionLine"),
                ),
        )
        .entity_type(
            EntityType::new("EquipmentClass")
                .attribute("equipmentClassId", String)
                .attribute("defaultSequencePosition", Integer)
                .relation(
                    RelationDefinition::new("classIsUpstreamOf", "EquipmentClass").with_inverse("classIsDownstreamOf"),
                )
                .relation(
                    RelationDefinition::new("classIsDownstreamOf", "EquipmentClass").with_inverse("classIsUpstreamOf"),
                ),
        )
        .entity_type(
            EntityType::new("Equipment")
                .attribute("equipmentId", String)
                .attribute("equipmentName", String)
                .attribute("equipmentModel", String)
                .attribute("sequencePosition", Integer)
                .relation(
                    RelationDefinition::new("isPartOfProductionLine", "ProductionLine").with_inverse("hasEquipmentPart"),
                )
                .relation(RelationDefinition::new("memberOfClass", "EquipmentClass"))
                .relation(
                    RelationDefinition::new("isImmediatelyUpstreamOf", "Equipment")
                        .with_inverse("isImmediatelyDownstreamOf"),
                )
                .relation(
                    RelationDefinition::new("isImmediatelyDownstreamOf", "Equipment")
                        .with_inverse("isImmediatelyUpstreamOf"),
                ),
        )
        .entity_type(
            EntityType::new("Material")
                .attribute("materialId", String)
                .attribute("materialDescription", TaggedString),
        )
        .entity_type(
            EntityType::new("ProductionRequest")
                .attribute("requestId", String)
                .attribute("batchId", String)
                .attribute("requestDescription", String)
                .relation(RelationDefinition::new("usesMaterial", "Material")),
        )
        .entity_type(
            EntityType::new("Shift")
                .attribute("shiftId", String)
                .attribute("shiftStartTime", Timestamp)
                .attribute("shiftEndTime", Timestamp),
        )
        .entity_type(EntityType::new("OperationalState").attribute("stateDescription", String))
        .entity_type(
            EntityType::new("OperationalReason")
                .attribute("reasonDescription", String)
                .attribute("altReasonDescription", TaggedString),
        )
        .entity_type(
            EntityType::new("TimeInterval")
                .attribute("startTime", Timestamp)
                .attribute("endTime", Timestamp),
        )
        .entity_type(
            EntityType::new("EventRecord")
                .attribute("goodProductionQuantity", Integer)
                .attribute("rejectProductionQuantity", Integer)
                .attribute("reportedDurationSeconds", Real)
                .attribute("crewId", String)
                .relation(RelationDefinition::new("involvesResource", "ProductionLine").or_target("Equipment"))
                .relation(RelationDefinition::new("occursDuring", "TimeInterval"))
                .relation(RelationDefinition::new("duringShift", "Shift"))
                .relation(RelationDefinition::new("eventHasState", "OperationalState"))
                .relation(RelationDefinition::new("eventHasReason", "OperationalReason"))
                .relation(RelationDefinition::new("associatedWithProductionRequest", "ProductionRequest"))
                .relation(RelationDefinition::new("usesMaterial", "Material"))
                .relation(RelationDefinition::new("isPartOfLineEvent", "EventRecord").with_inverse("hasDetailedEquipmentEvent"))
                .relation(
                    RelationDefinition::new("hasDetailedEquipmentEvent", "EventRecord")
                        .multi()
                        .with_inverse("isPartOfLineEvent"),
                ),
        )
        .build()
}

/// Builds the column mapping for plant operations exports.
#[must_use]
pub fn mapping() -> SchemaMapping {
    use ValueKind::{Integer, Real, String, TaggedString, Timestamp};

    SchemaMapping::new()
        .attribute("Plant", AttributeMapping::column("plantId", "PLANT", String))
        .attribute("Plant", AttributeMapping::column("plantDescription", "PLANT_DESCRIPTION", TaggedString))
        .attribute("Plant", AttributeMapping::column("countryDescription", "PLANT_COUNTRY_DESCRIPTION", String))
        .attribute("Area", AttributeMapping::column("areaId", "GH_FOCUSFACTORY", String))
        .relation("Area", RelationMapping::row_context("locatedInPlant", "Plant", "Plant"))
        .attribute("ProcessCell", AttributeMapping::column("processCellId", "PHYSICAL_AREA", String))
        .relation("ProcessCell", RelationMapping::row_context("partOfArea", "Area", "Area"))
        .attribute("ProductionLine", AttributeMapping::column("lineId", "LINE_NAME", String))
        .relation(
            "ProductionLine",
            RelationMapping::row_context("locatedInProcessCell", "ProcessCell", "ProcessCell"),
        )
        .attribute("EquipmentClass", AttributeMapping::column("equipmentClassId", "EQUIPMENT_CLASS", String))
        .attribute("Equipment", AttributeMapping::column("equipmentId", "EQUIPMENT_ID", String))
        .attribute("Equipment", AttributeMapping::column("equipmentName", "EQUIPMENT_NAME", String))
        .attribute("Equipment", AttributeMapping::column("equipmentModel", "EQUIPMENT_MODEL", String))
        .attribute("Equipment", AttributeMapping::derived("sequencePosition", Integer))
        .relation(
            "Equipment",
            RelationMapping::row_context("isPartOfProductionLine", "ProductionLine", "ProductionLine"),
        )
        .relation("Equipment", RelationMapping::row_context("memberOfClass", "EquipmentClass", "EquipmentClass"))
        .relation(
            "Equipment",
            RelationMapping::derived("isPartOfProductionLine", "ProductionLine", contains("equipmentId", "lineId")),
        )
        .relation(
            "Equipment",
            RelationMapping::derived("memberOfClass", "EquipmentClass", contains("equipmentName", "equipmentClassId")),
        )
        .attribute("Material", AttributeMapping::column("materialId", "MATERIAL_ID", String))
        .attribute("Material", AttributeMapping::column("materialDescription", "MATERIAL_DESC", TaggedString))
        .attribute("ProductionRequest", AttributeMapping::column("requestId", "PRODUCTION_ORDER_ID", String))
        .attribute("ProductionRequest", AttributeMapping::column("batchId", "BATCH_ID", String))
        .attribute(
            "ProductionRequest",
            AttributeMapping::column("requestDescription", "PRODUCTION_ORDER_DESC", String),
        )
        .relation("ProductionRequest", RelationMapping::row_context("usesMaterial", "Material", "Material"))
        .attribute("Shift", AttributeMapping::column("shiftId", "SHIFT_NAME", String))
        .attribute("Shift", AttributeMapping::column("shiftStartTime", "SHIFT_START_DATE_LOC", Timestamp))
        .attribute("Shift", AttributeMapping::column("shiftEndTime", "SHIFT_END_DATE_LOC", Timestamp))
        .attribute(
            "OperationalState",
            AttributeMapping::column("stateDescription", "UTIL_STATE_DESCRIPTION", String),
        )
        .attribute(
            "OperationalReason",
            AttributeMapping::column("reasonDescription", "UTIL_REASON_DESCRIPTION", String),
        )
        .attribute(
            "OperationalReason",
            AttributeMapping::column("altReasonDescription", "UTIL_ALT_LANGUAGE_REASON", TaggedString),
        )
        .attribute("TimeInterval", AttributeMapping::column("startTime", "START_TIME_UTC", Timestamp))
        .attribute("TimeInterval", AttributeMapping::column("endTime", "END_TIME_UTC", Timestamp))
        .attribute(
            "EventRecord",
            AttributeMapping::column("goodProductionQuantity", "GOOD_PRODUCTION_QTY", Integer).with_default("0"),
        )
        .attribute(
            "EventRecord",
            AttributeMapping::column("rejectProductionQuantity", "REJECT_PRODUCTION_QTY", Integer).with_default("0"),
        )
        .attribute(
            "EventRecord",
            AttributeMapping::column("reportedDurationSeconds", "TOTAL_TIME_SECONDS", Real),
        )
        .attribute("EventRecord", AttributeMapping::column("crewId", "CREW_ID", String))
        .relation("EventRecord", RelationMapping::row_context("involvesResource", "ProductionLine", "Resource"))
        .relation("EventRecord", RelationMapping::row_context("occursDuring", "TimeInterval", "TimeInterval"))
        .relation("EventRecord", RelationMapping::row_context("duringShift", "Shift", "Shift"))
        .relation(
            "EventRecord",
            RelationMapping::row_context("eventHasState", "OperationalState", "OperationalState"),
        )
        .relation(
            "EventRecord",
            RelationMapping::row_context("eventHasReason", "OperationalReason", "OperationalReason"),
        )
        .relation(
            "EventRecord",
            RelationMapping::row_context("associatedWithProductionRequest", "ProductionRequest", "ProductionRequest"),
        )
        .relation("EventRecord", RelationMapping::row_context("usesMaterial", "Material", "Material"))
}

/// Links when the source attribute contains the target attribute, e.g. an
/// equipment id `L1-7` naming line `L1`.
fn contains(source_attribute: &str, target_attribute: &str) -> DerivedRule {
    DerivedRule {
        source_attribute: source_attribute.to_string(),
        target_attribute: target_attribute.to_string(),
        matching: MatchMode::Contains,
    }
}
