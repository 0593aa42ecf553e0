// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Columnar quantity table.
//!
//! Mirrors the property table for IfcElementQuantity members: one row per
//! (entity, quantity set, member) with a measure-kind tag, numeric value
//! and optional unit/formula strings.

use crate::strings::StringTable;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// Measure kind stored in the `kinds` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum QuantityKind {
    Length = 0,
    Area = 1,
    Volume = 2,
    Count = 3,
    Weight = 4,
    Time = 5,
}

impl QuantityKind {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(QuantityKind::Length),
            1 => Some(QuantityKind::Area),
            2 => Some(QuantityKind::Volume),
            3 => Some(QuantityKind::Count),
            4 => Some(QuantityKind::Weight),
            5 => Some(QuantityKind::Time),
            _ => None,
        }
    }

    /// Map an IFC quantity entity type to its measure kind.
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        if type_name.eq_ignore_ascii_case("IFCQUANTITYLENGTH") {
            Some(QuantityKind::Length)
        } else if type_name.eq_ignore_ascii_case("IFCQUANTITYAREA") {
            Some(QuantityKind::Area)
        } else if type_name.eq_ignore_ascii_case("IFCQUANTITYVOLUME") {
            Some(QuantityKind::Volume)
        } else if type_name.eq_ignore_ascii_case("IFCQUANTITYCOUNT") {
            Some(QuantityKind::Count)
        } else if type_name.eq_ignore_ascii_case("IFCQUANTITYWEIGHT") {
            Some(QuantityKind::Weight)
        } else if type_name.eq_ignore_ascii_case("IFCQUANTITYTIME") {
            Some(QuantityKind::Time)
        } else {
            None
        }
    }

    /// Default display unit for the kind.
    pub fn default_unit(&self) -> &'static str {
        match self {
            QuantityKind::Length => "m",
            QuantityKind::Area => "m²",
            QuantityKind::Volume => "m³",
            QuantityKind::Count => "",
            QuantityKind::Weight => "kg",
            QuantityKind::Time => "s",
        }
    }
}

/// Intermediate row fed to the builder; strings already interned.
#[derive(Debug, Clone, Copy)]
pub struct QuantityRow {
    pub entity_id: u32,
    pub set_name: u32,
    pub name: u32,
    pub kind: QuantityKind,
    pub value: f64,
    /// Unit symbol index, `NULL_IDX` when absent.
    pub unit: u32,
    /// Formula string index, `NULL_IDX` when absent.
    pub formula: u32,
}

#[derive(Debug, Default)]
pub struct QuantityTableBuilder {
    rows: Vec<QuantityRow>,
}

impl QuantityTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row: QuantityRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn build(self, strings: Arc<StringTable>) -> QuantityTable {
        let n = self.rows.len();
        let mut cols = QuantityColumns {
            entity_ids: Vec::with_capacity(n),
            set_names: Vec::with_capacity(n),
            names: Vec::with_capacity(n),
            kinds: Vec::with_capacity(n),
            values: Vec::with_capacity(n),
            units: Vec::with_capacity(n),
            formulas: Vec::with_capacity(n),
        };
        for row in self.rows {
            cols.entity_ids.push(row.entity_id);
            cols.set_names.push(row.set_name);
            cols.names.push(row.name);
            cols.kinds.push(row.kind as u8);
            cols.values.push(row.value);
            cols.units.push(row.unit);
            cols.formulas.push(row.formula);
        }
        QuantityTable::from_parts(cols, strings)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct QuantityColumns {
    pub entity_ids: Vec<u32>,
    pub set_names: Vec<u32>,
    pub names: Vec<u32>,
    pub kinds: Vec<u8>,
    pub values: Vec<f64>,
    pub units: Vec<u32>,
    pub formulas: Vec<u32>,
}

/// One quantity member, as returned by `get_for_entity`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QuantityView<'a> {
    pub name: &'a str,
    pub kind: QuantityKind,
    pub value: f64,
    pub unit: Option<&'a str>,
    pub formula: Option<&'a str>,
}

/// A named quantity set grouping, first-seen order preserved.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct QuantitySetView<'a> {
    pub name: &'a str,
    pub quantities: Vec<QuantityView<'a>>,
}

/// Immutable columnar quantity table.
#[derive(Debug, Clone)]
pub struct QuantityTable {
    cols: QuantityColumns,
    by_entity: FxHashMap<u32, Vec<u32>>,
    by_set: FxHashMap<u32, Vec<u32>>,
    by_member: FxHashMap<u32, Vec<u32>>,
    strings: Arc<StringTable>,
}

impl QuantityTable {
    pub(crate) fn from_parts(cols: QuantityColumns, strings: Arc<StringTable>) -> Self {
        let mut by_entity: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
        let mut by_set: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
        let mut by_member: FxHashMap<u32, Vec<u32>> = FxHashMap::default();
        for row in 0..cols.entity_ids.len() {
            let r = row as u32;
            by_entity.entry(cols.entity_ids[row]).or_default().push(r);
            by_set.entry(cols.set_names[row]).or_default().push(r);
            by_member.entry(cols.names[row]).or_default().push(r);
        }
        Self {
            cols,
            by_entity,
            by_set,
            by_member,
            strings,
        }
    }

    pub(crate) fn columns(&self) -> &QuantityColumns {
        &self.cols
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cols.entity_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cols.entity_ids.is_empty()
    }

    fn view_at(&self, row: usize) -> QuantityView<'_> {
        QuantityView {
            name: self.strings.get(self.cols.names[row]),
            kind: QuantityKind::from_u8(self.cols.kinds[row]).unwrap_or(QuantityKind::Count),
            value: self.cols.values[row],
            unit: self.strings.get_opt(self.cols.units[row]),
            formula: self.strings.get_opt(self.cols.formulas[row]),
        }
    }

    /// All quantity sets of an entity, grouped with first-seen set order.
    pub fn get_for_entity(&self, entity_id: u32) -> Vec<QuantitySetView<'_>> {
        let rows = match self.by_entity.get(&entity_id) {
            Some(rows) => rows,
            None => return Vec::new(),
        };

        let mut sets: Vec<QuantitySetView<'_>> = Vec::new();
        let mut set_at: FxHashMap<u32, usize> = FxHashMap::default();
        for &row in rows {
            let row = row as usize;
            let set_idx = self.cols.set_names[row];
            let at = *set_at.entry(set_idx).or_insert_with(|| {
                sets.push(QuantitySetView {
                    name: self.strings.get(set_idx),
                    quantities: Vec::new(),
                });
                sets.len() - 1
            });
            sets[at].quantities.push(self.view_at(row));
        }
        sets
    }

    /// Look up one quantity value by set and member name.
    pub fn get_value(&self, entity_id: u32, set_name: &str, quantity_name: &str) -> Option<f64> {
        let set_idx = self.strings.lookup(set_name)?;
        let name_idx = self.strings.lookup(quantity_name)?;
        let rows = self.by_entity.get(&entity_id)?;
        rows.iter()
            .map(|&r| r as usize)
            .find(|&r| self.cols.set_names[r] == set_idx && self.cols.names[r] == name_idx)
            .map(|r| self.cols.values[r])
    }

    /// Sum of all values whose member name matches; 0.0 for unknown names.
    pub fn sum_by_type(&self, quantity_name: &str) -> f64 {
        self.strings
            .lookup(quantity_name)
            .and_then(|idx| self.by_member.get(&idx))
            .map(|rows| rows.iter().map(|&r| self.cols.values[r as usize]).sum())
            .unwrap_or(0.0)
    }

    /// Sum restricted to an entity-id set (the element-type filter of the
    /// store-level API).
    pub fn sum_by_type_filtered(&self, quantity_name: &str, entity_ids: &FxHashSet<u32>) -> f64 {
        self.strings
            .lookup(quantity_name)
            .and_then(|idx| self.by_member.get(&idx))
            .map(|rows| {
                rows.iter()
                    .map(|&r| r as usize)
                    .filter(|&r| entity_ids.contains(&self.cols.entity_ids[r]))
                    .map(|r| self.cols.values[r])
                    .sum()
            })
            .unwrap_or(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::NULL_IDX;

    fn build_sample() -> QuantityTable {
        let mut strings = StringTable::new();
        let mut builder = QuantityTableBuilder::new();

        let base = strings.intern("BaseQuantities");
        let area = strings.intern("NetSideArea");
        let volume = strings.intern("NetVolume");
        let sqm = strings.intern("m²");

        builder.add(QuantityRow {
            entity_id: 1,
            set_name: base,
            name: area,
            kind: QuantityKind::Area,
            value: 12.5,
            unit: sqm,
            formula: NULL_IDX,
        });
        builder.add(QuantityRow {
            entity_id: 2,
            set_name: base,
            name: area,
            kind: QuantityKind::Area,
            value: 7.5,
            unit: sqm,
            formula: NULL_IDX,
        });
        builder.add(QuantityRow {
            entity_id: 1,
            set_name: base,
            name: volume,
            kind: QuantityKind::Volume,
            value: 3.0,
            unit: NULL_IDX,
            formula: NULL_IDX,
        });
        builder.build(Arc::new(strings))
    }

    #[test]
    fn test_sum_by_type() {
        let table = build_sample();
        assert_eq!(table.sum_by_type("NetSideArea"), 20.0);
        assert_eq!(table.sum_by_type("NetVolume"), 3.0);
        assert_eq!(table.sum_by_type("DoesNotExist"), 0.0);
    }

    #[test]
    fn test_sum_filtered() {
        let table = build_sample();
        let only_two: FxHashSet<u32> = [2].into_iter().collect();
        assert_eq!(table.sum_by_type_filtered("NetSideArea", &only_two), 7.5);
        let neither: FxHashSet<u32> = [9].into_iter().collect();
        assert_eq!(table.sum_by_type_filtered("NetSideArea", &neither), 0.0);
    }

    #[test]
    fn test_get_for_entity() {
        let table = build_sample();
        let sets = table.get_for_entity(1);
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].name, "BaseQuantities");
        assert_eq!(sets[0].quantities.len(), 2);
        assert_eq!(sets[0].quantities[0].name, "NetSideArea");
        assert_eq!(sets[0].quantities[0].unit, Some("m²"));
        assert_eq!(sets[0].quantities[1].kind, QuantityKind::Volume);
        assert_eq!(sets[0].quantities[1].unit, None);
    }

    #[test]
    fn test_get_value() {
        let table = build_sample();
        assert_eq!(table.get_value(1, "BaseQuantities", "NetVolume"), Some(3.0));
        assert_eq!(table.get_value(2, "BaseQuantities", "NetVolume"), None);
    }
}
