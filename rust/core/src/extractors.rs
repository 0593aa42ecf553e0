// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Second-pass extractors.
//!
//! Walk the decoded-entity map to assemble property sets, quantity sets
//! and the relationship graph. Unresolved references are recorded gaps:
//! the extractors skip them and keep going, they never fail the parse.

use crate::decoder::{AttributeValue, DecodedEntity};
use crate::schema;
use crate::strings::{StringTable, NULL_IDX};
use crate::tables::{
    EntityRow, PropertyKind, PropertyRow, PropertyTableBuilder, QuantityKind, QuantityRow,
    QuantityTableBuilder, RelKind, RelationshipGraphBuilder,
};
use crate::units;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Decoded entities keyed by express id.
pub type EntityMap = FxHashMap<u32, DecodedEntity>;

// Attribute positions for entities the schema does not declare:
// GlobalId, Name, Description, ObjectType at the IfcRoot/IfcObject slots.
const FALLBACK_GLOBAL_ID: usize = 0;
const FALLBACK_NAME: usize = 2;
const FALLBACK_DESCRIPTION: usize = 3;
const FALLBACK_OBJECT_TYPE: usize = 4;
const FALLBACK_REPRESENTATION: usize = 6;

#[derive(Debug, Clone, Copy)]
struct AttrPositions {
    global_id: usize,
    name: usize,
    description: usize,
    object_type: usize,
    representation: usize,
    is_geometry: bool,
}

/// Per-parse cache of resolved attribute positions. The schema walk
/// allocates, so it runs once per distinct type name instead of once per
/// entity.
#[derive(Debug, Default)]
pub struct AttrPositionCache {
    map: FxHashMap<String, AttrPositions>,
}

impl AttrPositionCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn resolve(&mut self, type_name: &str) -> AttrPositions {
        if let Some(&positions) = self.map.get(type_name) {
            return positions;
        }
        let pos = |attr: &str, fallback: usize| {
            schema::attribute_position(type_name, attr).unwrap_or(fallback)
        };
        let positions = AttrPositions {
            global_id: pos("GlobalId", FALLBACK_GLOBAL_ID),
            name: pos("Name", FALLBACK_NAME),
            description: pos("Description", FALLBACK_DESCRIPTION),
            object_type: pos("ObjectType", FALLBACK_OBJECT_TYPE),
            representation: pos("Representation", FALLBACK_REPRESENTATION),
            is_geometry: schema::is_geometry_type(type_name),
        };
        self.map.insert(type_name.to_string(), positions);
        positions
    }
}

/// Build one entity-table row from a decoded entity.
pub fn entity_row(
    entity: &DecodedEntity,
    strings: &mut StringTable,
    cache: &mut AttrPositionCache,
) -> EntityRow {
    let positions = cache.resolve(&entity.type_name);
    let has_geometry =
        positions.is_geometry && entity.get_ref(positions.representation).is_some();

    EntityRow {
        express_id: entity.id,
        type_name: entity.type_name.clone(),
        global_id: strings.intern_opt(entity.get_string(positions.global_id)),
        name: strings.intern_opt(entity.get_string(positions.name)),
        description: strings.intern_opt(entity.get_string(positions.description)),
        object_type: strings.intern_opt(entity.get_string(positions.object_type)),
        has_geometry,
    }
}

/// Assembles the property table from IfcPropertySet definitions and the
/// IfcRelDefinesByProperties relationships that attach them to elements.
pub struct PropertyExtractor<'a> {
    entities: &'a EntityMap,
}

/// One extracted property member, pre-interning.
struct MemberValue {
    name: String,
    kind: PropertyKind,
    text: Option<String>,
    number: f64,
}

impl<'a> PropertyExtractor<'a> {
    pub fn new(entities: &'a EntityMap) -> Self {
        Self { entities }
    }

    pub fn extract(&self, strings: &mut StringTable, builder: &mut PropertyTableBuilder) {
        // Pset definitions: id -> (set name, members).
        let mut psets: FxHashMap<u32, (String, Vec<MemberValue>)> = FxHashMap::default();
        for entity in self.entities.values() {
            if !entity.type_name.eq_ignore_ascii_case("IFCPROPERTYSET") {
                continue;
            }
            // IfcPropertySet: [2]=Name, [4]=HasProperties
            let set_name = match entity.get_string(2) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let member_refs = entity.get_list(4).unwrap_or(&[]);
            let mut members = Vec::with_capacity(member_refs.len());
            for member_ref in member_refs {
                let Some(member_id) = member_ref.as_entity_ref() else {
                    continue;
                };
                // Dangling member reference: recorded gap.
                let Some(member) = self.entities.get(&member_id) else {
                    continue;
                };
                if let Some(value) = extract_member(member) {
                    members.push(value);
                }
            }
            psets.insert(entity.id, (set_name, members));
        }

        let mut dangling = 0usize;
        for rel in self.entities.values() {
            if !rel
                .type_name
                .eq_ignore_ascii_case("IFCRELDEFINESBYPROPERTIES")
            {
                continue;
            }
            // [4]=RelatedObjects, [5]=RelatingPropertyDefinition
            let Some(def_id) = rel.get_ref(5) else { continue };
            let Some((set_name, members)) = psets.get(&def_id) else {
                continue;
            };
            let set_idx = strings.intern(set_name);

            let related: SmallVec<[u32; 8]> = rel
                .get_list(4)
                .unwrap_or(&[])
                .iter()
                .filter_map(|v| v.as_entity_ref())
                .collect();
            for entity_id in related {
                if !self.entities.contains_key(&entity_id) {
                    dangling += 1;
                    continue;
                }
                for member in members {
                    builder.add(PropertyRow {
                        entity_id,
                        set_name: set_idx,
                        name: strings.intern(&member.name),
                        kind: member.kind,
                        text: member
                            .text
                            .as_deref()
                            .map(|t| strings.intern(t))
                            .unwrap_or(NULL_IDX),
                        number: member.number,
                    });
                }
            }
        }

        if dangling > 0 {
            tracing::debug!(dangling, "skipped property rows for unresolved entities");
        }
    }
}

/// Extract one IfcProperty member into a typed value.
fn extract_member(member: &DecodedEntity) -> Option<MemberValue> {
    // Every IfcProperty subtype declares [0]=Name.
    let name = member.get_string(0)?.to_string();
    let type_name = member.type_name.as_str();

    if type_name.eq_ignore_ascii_case("IFCPROPERTYSINGLEVALUE") {
        // [2]=NominalValue, possibly wrapped (IFCTEXT('A'), IFCBOOLEAN(.T.))
        let value = member.get(2)?.innermost();
        let (kind, text, number) = match value {
            AttributeValue::String(s) => (PropertyKind::Text, Some(s.clone()), 0.0),
            AttributeValue::Float(f) => (PropertyKind::Number, None, *f),
            AttributeValue::Integer(i) => (PropertyKind::Integer, None, *i as f64),
            AttributeValue::Enum(e) if e == "T" || e == "TRUE" => {
                (PropertyKind::Boolean, None, 1.0)
            }
            AttributeValue::Enum(e) if e == "F" || e == "FALSE" => {
                (PropertyKind::Boolean, None, 0.0)
            }
            AttributeValue::Enum(e) => (PropertyKind::EnumToken, Some(e.clone()), 0.0),
            _ => (PropertyKind::Null, None, 0.0),
        };
        return Some(MemberValue {
            name,
            kind,
            text,
            number,
        });
    }

    if type_name.eq_ignore_ascii_case("IFCPROPERTYENUMERATEDVALUE") {
        // [2]=EnumerationValues
        let values = member.get_list(2)?;
        let joined = join_values(values);
        return Some(MemberValue {
            name,
            kind: PropertyKind::Text,
            text: Some(joined),
            number: 0.0,
        });
    }

    if type_name.eq_ignore_ascii_case("IFCPROPERTYBOUNDEDVALUE") {
        // [2]=UpperBoundValue, [3]=LowerBoundValue
        let upper = member.get(2).filter(|v| !v.is_null()).map(format_value);
        let lower = member.get(3).filter(|v| !v.is_null()).map(format_value);
        let text = match (lower, upper) {
            (Some(l), Some(u)) => format!("{l} - {u}"),
            (Some(l), None) => format!(">= {l}"),
            (None, Some(u)) => format!("<= {u}"),
            (None, None) => return None,
        };
        return Some(MemberValue {
            name,
            kind: PropertyKind::Text,
            text: Some(text),
            number: 0.0,
        });
    }

    if type_name.eq_ignore_ascii_case("IFCPROPERTYLISTVALUE") {
        // [2]=ListValues
        let values = member.get_list(2)?;
        return Some(MemberValue {
            name,
            kind: PropertyKind::Text,
            text: Some(join_values(values)),
            number: 0.0,
        });
    }

    None
}

/// Flatten an attribute value to display text.
fn format_value(value: &AttributeValue) -> String {
    match value.innermost() {
        AttributeValue::String(s) => s.clone(),
        AttributeValue::Integer(i) => i.to_string(),
        AttributeValue::Float(f) => {
            let formatted = format!("{f:.6}");
            formatted
                .trim_end_matches('0')
                .trim_end_matches('.')
                .to_string()
        }
        AttributeValue::Enum(e) => e.clone(),
        AttributeValue::Ref(id) => format!("#{id}"),
        AttributeValue::Null | AttributeValue::Derived => String::new(),
        other => format!("{other:?}"),
    }
}

fn join_values(values: &[AttributeValue]) -> String {
    values
        .iter()
        .map(format_value)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Assembles the quantity table from IfcElementQuantity definitions.
pub struct QuantityExtractor<'a> {
    entities: &'a EntityMap,
}

struct QuantityMember {
    name: String,
    kind: QuantityKind,
    value: f64,
    unit: Option<String>,
    formula: Option<String>,
}

impl<'a> QuantityExtractor<'a> {
    pub fn new(entities: &'a EntityMap) -> Self {
        Self { entities }
    }

    pub fn extract(&self, strings: &mut StringTable, builder: &mut QuantityTableBuilder) {
        let mut qsets: FxHashMap<u32, (String, Vec<QuantityMember>)> = FxHashMap::default();
        for entity in self.entities.values() {
            if !entity.type_name.eq_ignore_ascii_case("IFCELEMENTQUANTITY") {
                continue;
            }
            // IfcElementQuantity: [2]=Name, [5]=Quantities
            let set_name = match entity.get_string(2) {
                Some(name) => name.to_string(),
                None => continue,
            };
            let member_refs = entity.get_list(5).unwrap_or(&[]);
            let mut members = Vec::with_capacity(member_refs.len());
            for member_ref in member_refs {
                let Some(member_id) = member_ref.as_entity_ref() else {
                    continue;
                };
                let Some(member) = self.entities.get(&member_id) else {
                    continue;
                };
                if let Some(value) = self.extract_quantity(member) {
                    members.push(value);
                }
            }
            qsets.insert(entity.id, (set_name, members));
        }

        let mut dangling = 0usize;
        for rel in self.entities.values() {
            if !rel
                .type_name
                .eq_ignore_ascii_case("IFCRELDEFINESBYPROPERTIES")
            {
                continue;
            }
            let Some(def_id) = rel.get_ref(5) else { continue };
            let Some((set_name, members)) = qsets.get(&def_id) else {
                continue;
            };
            let set_idx = strings.intern(set_name);

            let related: SmallVec<[u32; 8]> = rel
                .get_list(4)
                .unwrap_or(&[])
                .iter()
                .filter_map(|v| v.as_entity_ref())
                .collect();
            for entity_id in related {
                if !self.entities.contains_key(&entity_id) {
                    dangling += 1;
                    continue;
                }
                for member in members {
                    builder.add(QuantityRow {
                        entity_id,
                        set_name: set_idx,
                        name: strings.intern(&member.name),
                        kind: member.kind,
                        value: member.value,
                        unit: member
                            .unit
                            .as_deref()
                            .map(|u| strings.intern(u))
                            .unwrap_or(NULL_IDX),
                        formula: member
                            .formula
                            .as_deref()
                            .map(|f| strings.intern(f))
                            .unwrap_or(NULL_IDX),
                    });
                }
            }
        }

        if dangling > 0 {
            tracing::debug!(dangling, "skipped quantity rows for unresolved entities");
        }
    }

    /// Extract one IfcPhysicalSimpleQuantity member.
    /// [0]=Name, [2]=Unit, [3]=*Value, [4]=Formula (IFC4).
    fn extract_quantity(&self, member: &DecodedEntity) -> Option<QuantityMember> {
        let kind = QuantityKind::from_type_name(&member.type_name)?;
        let name = member.get_string(0)?.to_string();
        let value = member.get_float(3)?;

        let unit = member
            .get_ref(2)
            .and_then(|unit_id| self.entities.get(&unit_id))
            .and_then(units::unit_symbol);
        let formula = member.get_string(4).map(|s| s.to_string());

        Some(QuantityMember {
            name,
            kind,
            value,
            unit,
            formula,
        })
    }
}

/// Resolves relationship records into directed graph edges.
pub struct RelationshipExtractor<'a> {
    entities: &'a EntityMap,
}

impl<'a> RelationshipExtractor<'a> {
    pub fn new(entities: &'a EntityMap) -> Self {
        Self { entities }
    }

    pub fn extract(&self, builder: &mut RelationshipGraphBuilder) {
        let mut dangling = 0usize;

        for rel in self.entities.values() {
            let type_upper = rel.type_name.to_ascii_uppercase();
            match type_upper.as_str() {
                // [4]=RelatedElements (list), [5]=RelatingStructure
                "IFCRELCONTAINEDINSPATIALSTRUCTURE" => {
                    self.add_one_to_many(rel, RelKind::ContainedInStructure, 5, 4, builder, &mut dangling)
                }
                // [4]=RelatingObject, [5]=RelatedObjects (list)
                "IFCRELAGGREGATES" => {
                    self.add_one_to_many(rel, RelKind::Aggregates, 4, 5, builder, &mut dangling)
                }
                // [4]=RelatedObjects (list), [5]=RelatingType
                "IFCRELDEFINESBYTYPE" => {
                    self.add_one_to_many(rel, RelKind::DefinesByType, 5, 4, builder, &mut dangling)
                }
                // [4]=RelatingBuildingElement, [5]=RelatedOpeningElement
                "IFCRELVOIDSELEMENT" => {
                    self.add_one_to_one(rel, RelKind::Voids, 4, 5, builder, &mut dangling)
                }
                // [4]=RelatingOpeningElement, [5]=RelatedBuildingElement
                "IFCRELFILLSELEMENT" => {
                    self.add_one_to_one(rel, RelKind::Fills, 4, 5, builder, &mut dangling)
                }
                _ => {}
            }
        }

        if dangling > 0 {
            tracing::debug!(dangling, "omitted relationship edges with unresolved endpoints");
        }
    }

    fn add_one_to_many(
        &self,
        rel: &DecodedEntity,
        kind: RelKind,
        relating_idx: usize,
        related_idx: usize,
        builder: &mut RelationshipGraphBuilder,
        dangling: &mut usize,
    ) {
        let Some(source) = rel.get_ref(relating_idx) else {
            return;
        };
        if !self.entities.contains_key(&source) {
            *dangling += 1;
            return;
        }
        let targets: SmallVec<[u32; 8]> = rel
            .get_list(related_idx)
            .unwrap_or(&[])
            .iter()
            .filter_map(|v| v.as_entity_ref())
            .collect();
        for target in targets {
            if self.entities.contains_key(&target) {
                builder.add(kind, source, target);
            } else {
                *dangling += 1;
            }
        }
    }

    fn add_one_to_one(
        &self,
        rel: &DecodedEntity,
        kind: RelKind,
        relating_idx: usize,
        related_idx: usize,
        builder: &mut RelationshipGraphBuilder,
        dangling: &mut usize,
    ) {
        let (Some(source), Some(target)) = (rel.get_ref(relating_idx), rel.get_ref(related_idx))
        else {
            return;
        };
        if self.entities.contains_key(&source) && self.entities.contains_key(&target) {
            builder.add(kind, source, target);
        } else {
            *dangling += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::parse_record;
    use crate::strings::StringTable;
    use crate::tables::PropertyValue;
    use std::sync::Arc;

    fn decode_all(records: &[&str]) -> EntityMap {
        let mut map = EntityMap::default();
        for record in records {
            let entity = parse_record(record).unwrap();
            map.insert(entity.id, entity);
        }
        map
    }

    #[test]
    fn test_entity_row_uses_schema_positions() {
        let mut strings = StringTable::new();
        let mut cache = AttrPositionCache::new();
        let entity = parse_record(
            "#1=IFCWALL('GUID1',#99,'Wall-01','A wall','LoadBearing',#5,#6,'TAG',.SOLIDWALL.)",
        )
        .unwrap();
        let row = entity_row(&entity, &mut strings, &mut cache);
        assert_eq!(strings.get(row.global_id), "GUID1");
        assert_eq!(strings.get(row.name), "Wall-01");
        assert_eq!(strings.get(row.description), "A wall");
        assert_eq!(strings.get(row.object_type), "LoadBearing");
        assert!(row.has_geometry);
    }

    #[test]
    fn test_entity_row_without_representation() {
        let mut strings = StringTable::new();
        let mut cache = AttrPositionCache::new();
        let entity =
            parse_record("#1=IFCWALL('GUID1',#99,'Wall-01',$,$,#5,$,$,$)").unwrap();
        let row = entity_row(&entity, &mut strings, &mut cache);
        assert!(!row.has_geometry);
        assert_eq!(row.description, NULL_IDX);
    }

    #[test]
    fn test_property_extraction() {
        let entities = decode_all(&[
            "#1=IFCWALL('GUID1',$,'Wall-01',$,$,$,$,$,$)",
            "#10=IFCPROPERTYSINGLEVALUE('FireRating',$,IFCTEXT('A'),$)",
            "#11=IFCPROPERTYSINGLEVALUE('LoadBearing',$,IFCBOOLEAN(.T.),$)",
            "#20=IFCPROPERTYSET('PSGUID',$,'Pset_WallCommon',$,(#10,#11))",
            "#30=IFCRELDEFINESBYPROPERTIES('RGUID',$,$,$,(#1),#20)",
        ]);
        let mut strings = StringTable::new();
        let mut builder = PropertyTableBuilder::new();
        PropertyExtractor::new(&entities).extract(&mut strings, &mut builder);
        let table = builder.build(Arc::new(strings));

        assert_eq!(
            table.get_value(1, "Pset_WallCommon", "FireRating"),
            Some(PropertyValue::Text("A"))
        );
        assert_eq!(
            table.get_value(1, "Pset_WallCommon", "LoadBearing"),
            Some(PropertyValue::Boolean(true))
        );
    }

    #[test]
    fn test_property_rel_to_missing_entity_skipped() {
        let entities = decode_all(&[
            "#10=IFCPROPERTYSINGLEVALUE('FireRating',$,'A',$)",
            "#20=IFCPROPERTYSET('PSGUID',$,'Pset_WallCommon',$,(#10))",
            "#30=IFCRELDEFINESBYPROPERTIES('RGUID',$,$,$,(#999),#20)",
        ]);
        let mut strings = StringTable::new();
        let mut builder = PropertyTableBuilder::new();
        PropertyExtractor::new(&entities).extract(&mut strings, &mut builder);
        let table = builder.build(Arc::new(strings));
        assert!(table.is_empty());
    }

    #[test]
    fn test_quantity_extraction_with_unit() {
        let entities = decode_all(&[
            "#1=IFCWALL('GUID1',$,'Wall-01',$,$,$,$,$,$)",
            "#5=IFCSIUNIT(*,.AREAUNIT.,$,.SQUARE_METRE.)",
            "#40=IFCQUANTITYAREA('NetSideArea',$,#5,12.5,$)",
            "#41=IFCQUANTITYVOLUME('NetVolume',$,$,3.25,'W*H*T')",
            "#50=IFCELEMENTQUANTITY('QGUID',$,'BaseQuantities',$,$,(#40,#41))",
            "#60=IFCRELDEFINESBYPROPERTIES('RGUID',$,$,$,(#1),#50)",
        ]);
        let mut strings = StringTable::new();
        let mut builder = QuantityTableBuilder::new();
        QuantityExtractor::new(&entities).extract(&mut strings, &mut builder);
        let table = builder.build(Arc::new(strings));

        assert_eq!(table.sum_by_type("NetSideArea"), 12.5);
        let sets = table.get_for_entity(1);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].quantities[0].unit, Some("m²"));
        assert_eq!(sets[0].quantities[0].kind, QuantityKind::Area);
        assert_eq!(sets[0].quantities[1].formula, Some("W*H*T"));
    }

    #[test]
    fn test_relationship_extraction() {
        let entities = decode_all(&[
            "#1=IFCPROJECT('P',$,'Project',$,$,$,$,$,$)",
            "#2=IFCSITE('S',$,'Site',$,$,$,$,$,.ELEMENT.,$,$,$,$,$)",
            "#3=IFCBUILDINGSTOREY('B',$,'EG',$,$,$,$,$,.ELEMENT.,0.)",
            "#10=IFCWALL('W',$,'Wall',$,$,$,$,$,$)",
            "#90=IFCRELAGGREGATES('A1',$,$,$,#1,(#2))",
            "#91=IFCRELCONTAINEDINSPATIALSTRUCTURE('C1',$,$,$,(#10),#3)",
            // Dangling: #999 does not exist.
            "#92=IFCRELCONTAINEDINSPATIALSTRUCTURE('C2',$,$,$,(#999),#3)",
        ]);
        let mut builder = RelationshipGraphBuilder::new();
        RelationshipExtractor::new(&entities).extract(&mut builder);
        let graph = builder.build();

        assert_eq!(graph.related(1, RelKind::Aggregates), &[2]);
        assert_eq!(graph.related(3, RelKind::ContainedInStructure), &[10]);
        // The dangling edge is omitted entirely.
        assert_eq!(graph.len(), 2);
    }
}
