// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Columnar property table.
//!
//! One row per (entity, property set, member). Three secondary indices —
//! by entity, by set name, by member name — are built once in `build()`.

use crate::strings::StringTable;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Value-type tag stored in the `kinds` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum PropertyKind {
    Text = 0,
    Number = 1,
    Integer = 2,
    Boolean = 3,
    EnumToken = 4,
    Null = 5,
}

impl PropertyKind {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(PropertyKind::Text),
            1 => Some(PropertyKind::Number),
            2 => Some(PropertyKind::Integer),
            3 => Some(PropertyKind::Boolean),
            4 => Some(PropertyKind::EnumToken),
            5 => Some(PropertyKind::Null),
            _ => None,
        }
    }
}

/// Resolved property value, borrowing from the string table.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PropertyValue<'a> {
    Text(&'a str),
    Number(f64),
    Integer(i64),
    Boolean(bool),
    EnumToken(&'a str),
    Null,
}

/// Intermediate row fed to the builder; strings already interned.
#[derive(Debug, Clone, Copy)]
pub struct PropertyRow {
    pub entity_id: u32,
    pub set_name: u32,
    pub name: u32,
    pub kind: PropertyKind,
    /// String-table index for text/enum kinds, `NULL_IDX` otherwise.
    pub text: u32,
    /// Numeric payload for number/integer/boolean kinds, 0 otherwise.
    pub number: f64,
}

#[derive(Debug, Default)]
pub struct PropertyTableBuilder {
    rows: Vec<PropertyRow>,
}

impl PropertyTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, row: PropertyRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn build(self, strings: Arc<StringTable>) -> PropertyTable {
        let n = self.rows.len();
        let mut cols = PropertyColumns {
            entity_ids: Vec::with_capacity(n),
            set_names: Vec::with_capacity(n),
            names: Vec::with_capacity(n),
            kinds: Vec::with_capacity(n),
            texts: Vec::with_capacity(n),
            numbers: Vec::with_capacity(n),
        };
        for row in self.rows {
            cols.entity_ids.push(row.entity_id);
            cols.set_names.push(row.set_name);
            cols.names.push(row.name);
            cols.kinds.push(row.kind as u8);
            cols.texts.push(row.text);
            cols.numbers.push(row.number);
        }
        PropertyTable::from_parts(cols, strings)
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PropertyColumns {
    pub entity_ids: Vec<u32>,
    pub set_names: Vec<u32>,
    pub names: Vec<u32>,
    pub kinds: Vec<u8>,
    pub texts: Vec<u32>,
    pub numbers: Vec<f64>,
}

/// One property of a set, as returned by `get_for_entity`.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PropertyView<'a> {
    pub name: &'a str,
    pub value: PropertyValue<'a>,
}

/// A named property set grouping, first-seen order preserved.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PropertySetView<'a> {
    pub name: &'a str,
    pub properties: Vec<PropertyView<'a>>,
}

/// Immutable columnar property table.
#[derive(Debug, Clone)]
pub struct PropertyTable {
    cols: PropertyColumns,
    by_entity: FxHashMap<u32, Vec<u32>>,
    by_set: FxHashMap<u32, Vec<u32>>,
    by_member: FxHashMap<u32, Vec<u32>>,
    strings: Arc<StringTable>,
}

impl PropertyTable {
    pub(crate) fn from_parts(cols: PropertyColumns, strings: Arc<StringTable>) -> Self {
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

    pub(crate) fn columns(&self) -> &PropertyColumns {
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

    fn value_at(&self, row: usize) -> PropertyValue<'_> {
        match PropertyKind::from_u8(self.cols.kinds[row]).unwrap_or(PropertyKind::Null) {
            PropertyKind::Text => PropertyValue::Text(self.strings.get(self.cols.texts[row])),
            PropertyKind::Number => PropertyValue::Number(self.cols.numbers[row]),
            PropertyKind::Integer => PropertyValue::Integer(self.cols.numbers[row] as i64),
            PropertyKind::Boolean => PropertyValue::Boolean(self.cols.numbers[row] != 0.0),
            PropertyKind::EnumToken => {
                PropertyValue::EnumToken(self.strings.get(self.cols.texts[row]))
            }
            PropertyKind::Null => PropertyValue::Null,
        }
    }

    /// All property sets of an entity, grouped by set name with first-seen
    /// set order preserved.
    pub fn get_for_entity(&self, entity_id: u32) -> Vec<PropertySetView<'_>> {
        let rows = match self.by_entity.get(&entity_id) {
            Some(rows) => rows,
            None => return Vec::new(),
        };

        let mut sets: Vec<PropertySetView<'_>> = Vec::new();
        let mut set_at: FxHashMap<u32, usize> = FxHashMap::default();
        for &row in rows {
            let row = row as usize;
            let set_idx = self.cols.set_names[row];
            let at = *set_at.entry(set_idx).or_insert_with(|| {
                sets.push(PropertySetView {
                    name: self.strings.get(set_idx),
                    properties: Vec::new(),
                });
                sets.len() - 1
            });
            sets[at].properties.push(PropertyView {
                name: self.strings.get(self.cols.names[row]),
                value: self.value_at(row),
            });
        }
        sets
    }

    /// Look up one property by set and member name.
    pub fn get_value(
        &self,
        entity_id: u32,
        set_name: &str,
        property_name: &str,
    ) -> Option<PropertyValue<'_>> {
        let set_idx = self.strings.lookup(set_name)?;
        let name_idx = self.strings.lookup(property_name)?;
        let rows = self.by_entity.get(&entity_id)?;
        rows.iter()
            .map(|&r| r as usize)
            .find(|&r| self.cols.set_names[r] == set_idx && self.cols.names[r] == name_idx)
            .map(|r| self.value_at(r))
    }

    /// Row indices carrying a member name, across all entities.
    pub fn rows_with_member(&self, property_name: &str) -> &[u32] {
        self.strings
            .lookup(property_name)
            .and_then(|idx| self.by_member.get(&idx))
            .map(|rows| rows.as_slice())
            .unwrap_or(&[])
    }

    /// Entity ids that carry a set with the given name.
    pub fn entities_with_set(&self, set_name: &str) -> Vec<u32> {
        let rows = match self
            .strings
            .lookup(set_name)
            .and_then(|idx| self.by_set.get(&idx))
        {
            Some(rows) => rows,
            None => return Vec::new(),
        };
        let mut ids: Vec<u32> = rows
            .iter()
            .map(|&r| self.cols.entity_ids[r as usize])
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}
