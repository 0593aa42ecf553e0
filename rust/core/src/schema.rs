// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Static IFC type schema.
//!
//! Immutable, process-wide lookup from normalized type name to declared
//! attribute list and parent type, built once behind `OnceLock` and never
//! mutated afterward. Attribute resolution for a type is the root-first
//! concatenation of ancestor attribute lists; the parent walk carries a
//! visited set so malformed schema data cannot loop.
//!
//! Lookups are case-insensitive and tolerate a missing `IFC` prefix:
//! `IFCWALL`, `ifcwall`, `IfcWall` and `Wall` all resolve identically.

use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::OnceLock;

/// One type declaration: canonical display name, parent link and the
/// attributes the type itself declares (inherited ones excluded).
#[derive(Debug, Clone, Copy)]
pub struct TypeDef {
    pub name: &'static str,
    pub parent: Option<&'static str>,
    pub attributes: &'static [&'static str],
}

/// Declared subset of the IFC4 schema: the spatial, element, relationship,
/// property and quantity types the extraction pipeline resolves by name.
/// Unknown types fall back to indexed-attribute behavior.
const TYPES: &[TypeDef] = &[
    // Abstract roots
    TypeDef { name: "IfcRoot", parent: None, attributes: &["GlobalId", "OwnerHistory", "Name", "Description"] },
    TypeDef { name: "IfcObjectDefinition", parent: Some("IfcRoot"), attributes: &[] },
    TypeDef { name: "IfcObject", parent: Some("IfcObjectDefinition"), attributes: &["ObjectType"] },
    TypeDef { name: "IfcProduct", parent: Some("IfcObject"), attributes: &["ObjectPlacement", "Representation"] },
    TypeDef { name: "IfcElement", parent: Some("IfcProduct"), attributes: &["Tag"] },
    TypeDef { name: "IfcBuildingElement", parent: Some("IfcElement"), attributes: &[] },
    // Project and spatial structure
    TypeDef { name: "IfcProject", parent: Some("IfcObject"), attributes: &["LongName", "Phase", "RepresentationContexts", "UnitsInContext"] },
    TypeDef { name: "IfcSpatialStructureElement", parent: Some("IfcProduct"), attributes: &["LongName", "CompositionType"] },
    TypeDef { name: "IfcSite", parent: Some("IfcSpatialStructureElement"), attributes: &["RefLatitude", "RefLongitude", "RefElevation", "LandTitleNumber", "SiteAddress"] },
    TypeDef { name: "IfcBuilding", parent: Some("IfcSpatialStructureElement"), attributes: &["ElevationOfRefHeight", "ElevationOfTerrain", "BuildingAddress"] },
    TypeDef { name: "IfcBuildingStorey", parent: Some("IfcSpatialStructureElement"), attributes: &["Elevation"] },
    TypeDef { name: "IfcSpace", parent: Some("IfcSpatialStructureElement"), attributes: &["PredefinedType", "ElevationWithFlooring"] },
    // Building elements
    TypeDef { name: "IfcWall", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcWallStandardCase", parent: Some("IfcWall"), attributes: &[] },
    TypeDef { name: "IfcSlab", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcBeam", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcColumn", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcRoof", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcStair", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcRamp", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcRailing", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcCurtainWall", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcPlate", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcMember", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcCovering", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcFooting", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcPile", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType", "ConstructionType"] },
    TypeDef { name: "IfcBuildingElementProxy", parent: Some("IfcBuildingElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcDoor", parent: Some("IfcBuildingElement"), attributes: &["OverallHeight", "OverallWidth", "PredefinedType", "OperationType", "UserDefinedOperationType"] },
    TypeDef { name: "IfcWindow", parent: Some("IfcBuildingElement"), attributes: &["OverallHeight", "OverallWidth", "PredefinedType", "PartitioningType", "UserDefinedPartitioningType"] },
    TypeDef { name: "IfcOpeningElement", parent: Some("IfcElement"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcFurnishingElement", parent: Some("IfcElement"), attributes: &[] },
    TypeDef { name: "IfcDistributionElement", parent: Some("IfcElement"), attributes: &[] },
    TypeDef { name: "IfcFlowSegment", parent: Some("IfcDistributionElement"), attributes: &[] },
    TypeDef { name: "IfcFlowFitting", parent: Some("IfcDistributionElement"), attributes: &[] },
    TypeDef { name: "IfcFlowTerminal", parent: Some("IfcDistributionElement"), attributes: &[] },
    // Type objects
    TypeDef { name: "IfcTypeObject", parent: Some("IfcObjectDefinition"), attributes: &["ApplicableOccurrence", "HasPropertySets"] },
    TypeDef { name: "IfcTypeProduct", parent: Some("IfcTypeObject"), attributes: &["RepresentationMaps", "Tag"] },
    TypeDef { name: "IfcElementType", parent: Some("IfcTypeProduct"), attributes: &["ElementType"] },
    TypeDef { name: "IfcWallType", parent: Some("IfcElementType"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcSlabType", parent: Some("IfcElementType"), attributes: &["PredefinedType"] },
    TypeDef { name: "IfcDoorType", parent: Some("IfcElementType"), attributes: &["PredefinedType", "OperationType", "ParameterTakesPrecedence", "UserDefinedOperationType"] },
    TypeDef { name: "IfcWindowType", parent: Some("IfcElementType"), attributes: &["PredefinedType", "PartitioningType", "ParameterTakesPrecedence", "UserDefinedPartitioningType"] },
    // Relationships
    TypeDef { name: "IfcRelationship", parent: Some("IfcRoot"), attributes: &[] },
    TypeDef { name: "IfcRelDefinesByProperties", parent: Some("IfcRelationship"), attributes: &["RelatedObjects", "RelatingPropertyDefinition"] },
    TypeDef { name: "IfcRelDefinesByType", parent: Some("IfcRelationship"), attributes: &["RelatedObjects", "RelatingType"] },
    TypeDef { name: "IfcRelContainedInSpatialStructure", parent: Some("IfcRelationship"), attributes: &["RelatedElements", "RelatingStructure"] },
    TypeDef { name: "IfcRelAggregates", parent: Some("IfcRelationship"), attributes: &["RelatingObject", "RelatedObjects"] },
    TypeDef { name: "IfcRelVoidsElement", parent: Some("IfcRelationship"), attributes: &["RelatingBuildingElement", "RelatedOpeningElement"] },
    TypeDef { name: "IfcRelFillsElement", parent: Some("IfcRelationship"), attributes: &["RelatingOpeningElement", "RelatedBuildingElement"] },
    // Property sets
    TypeDef { name: "IfcPropertySet", parent: Some("IfcRoot"), attributes: &["HasProperties"] },
    TypeDef { name: "IfcProperty", parent: None, attributes: &["Name", "Description"] },
    TypeDef { name: "IfcPropertySingleValue", parent: Some("IfcProperty"), attributes: &["NominalValue", "Unit"] },
    TypeDef { name: "IfcPropertyEnumeratedValue", parent: Some("IfcProperty"), attributes: &["EnumerationValues", "EnumerationReference"] },
    TypeDef { name: "IfcPropertyBoundedValue", parent: Some("IfcProperty"), attributes: &["UpperBoundValue", "LowerBoundValue", "Unit", "SetPointValue"] },
    TypeDef { name: "IfcPropertyListValue", parent: Some("IfcProperty"), attributes: &["ListValues", "Unit"] },
    // Quantity sets
    TypeDef { name: "IfcElementQuantity", parent: Some("IfcRoot"), attributes: &["MethodOfMeasurement", "Quantities"] },
    TypeDef { name: "IfcPhysicalQuantity", parent: None, attributes: &["Name", "Description"] },
    TypeDef { name: "IfcPhysicalSimpleQuantity", parent: Some("IfcPhysicalQuantity"), attributes: &["Unit"] },
    TypeDef { name: "IfcQuantityLength", parent: Some("IfcPhysicalSimpleQuantity"), attributes: &["LengthValue", "Formula"] },
    TypeDef { name: "IfcQuantityArea", parent: Some("IfcPhysicalSimpleQuantity"), attributes: &["AreaValue", "Formula"] },
    TypeDef { name: "IfcQuantityVolume", parent: Some("IfcPhysicalSimpleQuantity"), attributes: &["VolumeValue", "Formula"] },
    TypeDef { name: "IfcQuantityCount", parent: Some("IfcPhysicalSimpleQuantity"), attributes: &["CountValue", "Formula"] },
    TypeDef { name: "IfcQuantityWeight", parent: Some("IfcPhysicalSimpleQuantity"), attributes: &["WeightValue", "Formula"] },
    TypeDef { name: "IfcQuantityTime", parent: Some("IfcPhysicalSimpleQuantity"), attributes: &["TimeValue", "Formula"] },
];

struct Schema {
    by_key: FxHashMap<&'static str, &'static TypeDef>,
    upper_keys: FxHashMap<String, &'static TypeDef>,
}

fn schema() -> &'static Schema {
    static SCHEMA: OnceLock<Schema> = OnceLock::new();
    SCHEMA.get_or_init(|| {
        let mut by_key = FxHashMap::default();
        let mut upper_keys = FxHashMap::default();
        for def in TYPES {
            by_key.insert(def.name, def);
            upper_keys.insert(def.name.to_ascii_uppercase(), def);
        }
        Schema { by_key, upper_keys }
    })
}

/// Normalize a type name for lookups and registry keys: uppercase, with
/// the `IFC` prefix added when missing.
pub fn normalize(name: &str) -> String {
    let upper = name.to_ascii_uppercase();
    if upper.starts_with("IFC") {
        upper
    } else {
        format!("IFC{upper}")
    }
}

/// Look up a declared type by any spelling.
pub fn lookup(name: &str) -> Option<&'static TypeDef> {
    let s = schema();
    s.by_key
        .get(name)
        .copied()
        .or_else(|| s.upper_keys.get(&normalize(name)).copied())
}

/// Canonical display name (`IfcWall`) for any spelling; falls back to the
/// input as given for unknown types.
pub fn display_name(name: &str) -> Option<&'static str> {
    lookup(name).map(|def| def.name)
}

/// Parent type display name, if declared.
pub fn parent_of(name: &str) -> Option<&'static str> {
    lookup(name).and_then(|def| def.parent)
}

/// Full positional attribute list: root-first concatenation of ancestor
/// declarations. Returns an empty list for unknown types (callers fall
/// back to indexed attributes).
pub fn attributes_for(name: &str) -> Vec<&'static str> {
    let mut chain = Vec::new();
    let mut visited: FxHashSet<&'static str> = FxHashSet::default();
    let mut current = lookup(name);
    while let Some(def) = current {
        if !visited.insert(def.name) {
            // Cycle in parent links: stop the walk rather than recurse forever.
            break;
        }
        chain.push(def);
        current = def.parent.and_then(lookup);
    }
    chain
        .iter()
        .rev()
        .flat_map(|def| def.attributes.iter().copied())
        .collect()
}

/// Position of a named attribute within the resolved list.
pub fn attribute_position(type_name: &str, attribute: &str) -> Option<usize> {
    attributes_for(type_name)
        .iter()
        .position(|&a| a.eq_ignore_ascii_case(attribute))
}

/// Whether `name` inherits from (or is) `ancestor`.
pub fn inherits_from(name: &str, ancestor: &str) -> bool {
    let target = normalize(ancestor);
    let mut visited: FxHashSet<&'static str> = FxHashSet::default();
    let mut current = lookup(name);
    while let Some(def) = current {
        if def.name.eq_ignore_ascii_case(&target) || normalize(def.name) == target {
            return true;
        }
        if !visited.insert(def.name) {
            break;
        }
        current = def.parent.and_then(lookup);
    }
    false
}

/// Spatial structure classification (project through space).
pub fn is_spatial(name: &str) -> bool {
    inherits_from(name, "IfcSpatialStructureElement")
        || normalize(name) == "IFCPROJECT"
}

/// Geometry-bearing classification: element subtypes carry product
/// geometry; spatial structure and relationship records do not.
pub fn is_geometry_type(name: &str) -> bool {
    inherits_from(name, "IfcElement")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_case_and_prefix_normalization() {
        let a = lookup("IFCWALL").unwrap();
        let b = lookup("ifcwall").unwrap();
        let c = lookup("IfcWall").unwrap();
        let d = lookup("Wall").unwrap();
        assert_eq!(a.name, "IfcWall");
        assert!(std::ptr::eq(a, b));
        assert!(std::ptr::eq(a, c));
        assert!(std::ptr::eq(a, d));
    }

    #[test]
    fn test_attribute_resolution_root_first() {
        let attrs = attributes_for("IFCWALL");
        assert_eq!(
            &attrs[..5],
            &["GlobalId", "OwnerHistory", "Name", "Description", "ObjectType"]
        );
        assert_eq!(attrs[7], "Tag");
        assert_eq!(*attrs.last().unwrap(), "PredefinedType");

        assert_eq!(attribute_position("IfcWall", "GlobalId"), Some(0));
        assert_eq!(attribute_position("IfcWall", "Name"), Some(2));
        assert_eq!(attribute_position("IfcWall", "Representation"), Some(6));
    }

    #[test]
    fn test_storey_elevation_position() {
        // [0..3]=Root, [4]=ObjectType, [5..6]=Placement/Representation,
        // [7]=LongName, [8]=CompositionType, [9]=Elevation
        assert_eq!(attribute_position("IfcBuildingStorey", "Elevation"), Some(9));
    }

    #[test]
    fn test_quantity_value_positions() {
        assert_eq!(attribute_position("IfcQuantityArea", "Name"), Some(0));
        assert_eq!(attribute_position("IfcQuantityArea", "Unit"), Some(2));
        assert_eq!(attribute_position("IfcQuantityArea", "AreaValue"), Some(3));
        assert_eq!(attribute_position("IfcQuantityArea", "Formula"), Some(4));
    }

    #[test]
    fn test_unknown_type_falls_back_empty() {
        assert!(lookup("IFCCUSTOMWIDGET").is_none());
        assert!(attributes_for("IFCCUSTOMWIDGET").is_empty());
        assert!(parent_of("IFCCUSTOMWIDGET").is_none());
    }

    #[test]
    fn test_classification() {
        assert!(is_geometry_type("IFCWALL"));
        assert!(is_geometry_type("IfcDoor"));
        assert!(!is_geometry_type("IFCBUILDINGSTOREY"));
        assert!(!is_geometry_type("IFCRELAGGREGATES"));
        assert!(is_spatial("IFCSITE"));
        assert!(is_spatial("IfcProject"));
        assert!(!is_spatial("IFCWALL"));
    }

    #[test]
    fn test_inheritance_walk_terminates() {
        // Every declared type resolves without looping.
        for def in TYPES {
            let attrs = attributes_for(def.name);
            assert!(attrs.len() <= 32, "{} resolved too many attributes", def.name);
        }
        assert!(inherits_from("IfcWallStandardCase", "IfcWall"));
        assert!(inherits_from("IfcWallStandardCase", "IfcRoot"));
        assert!(!inherits_from("IfcWall", "IfcWallStandardCase"));
    }
}
