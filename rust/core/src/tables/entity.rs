// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Columnar entity table.
//!
//! Parallel arrays indexed by row, clustered by type so `get_by_type` can
//! answer from a contiguous `[start, end)` range. Clustering is a build-time
//! guarantee: the builder buckets rows by type code (stable insertion order
//! within a type) before assigning ranges. Express ids are sparse, so a
//! derived id → row map is built once for O(1) lookup.

use crate::schema;
use crate::strings::StringTable;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// `flags` bit 0: entity carries product geometry.
pub const FLAG_HAS_GEOMETRY: u8 = 0x01;

/// Intermediate row fed to the builder. String attributes are already
/// interned through the shared [`StringTable`].
#[derive(Debug, Clone)]
pub struct EntityRow {
    pub express_id: u32,
    /// Type name as written in the source file.
    pub type_name: String,
    pub global_id: u32,
    pub name: u32,
    pub description: u32,
    pub object_type: u32,
    pub has_geometry: bool,
}

#[derive(Debug, Clone)]
struct TypeEntry {
    /// Normalized registry key (e.g. `IFCWALL`).
    key: String,
    /// Canonical display name (`IfcWall`), or the source spelling for
    /// types the schema does not declare.
    display: String,
}

/// Accumulates entity rows plus relationship-derived column patches.
#[derive(Debug, Default)]
pub struct EntityTableBuilder {
    rows: Vec<EntityRow>,
    by_id: FxHashMap<u32, usize>,
    contained_in_storey: FxHashMap<u32, u32>,
    defined_by_type: FxHashMap<u32, u32>,
}

impl EntityTableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a row. Re-adding an express id overwrites the earlier row.
    pub fn add(&mut self, row: EntityRow) {
        match self.by_id.get(&row.express_id) {
            Some(&at) => self.rows[at] = row,
            None => {
                self.by_id.insert(row.express_id, self.rows.len());
                self.rows.push(row);
            }
        }
    }

    /// Patch the containing-storey column for an element.
    pub fn set_contained_in_storey(&mut self, express_id: u32, storey_id: u32) {
        self.contained_in_storey.insert(express_id, storey_id);
    }

    /// Patch the defining-type column for an element.
    pub fn set_defined_by_type(&mut self, express_id: u32, type_entity_id: u32) {
        self.defined_by_type.insert(express_id, type_entity_id);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Build the immutable table: assign type codes in first-seen order,
    /// bucket rows by code, then fill every column and secondary index in
    /// one O(n) pass.
    pub fn build(self, strings: Arc<StringTable>) -> EntityTable {
        let n = self.rows.len();

        // Type registry in first-seen order.
        let mut code_by_key: FxHashMap<String, u16> = FxHashMap::default();
        let mut registry: Vec<TypeEntry> = Vec::new();
        let mut row_codes: Vec<u16> = Vec::with_capacity(n);
        for row in &self.rows {
            let key = schema::normalize(&row.type_name);
            let code = match code_by_key.get(&key) {
                Some(&c) => c,
                None => {
                    let c = registry.len() as u16;
                    let display = schema::display_name(&key)
                        .map(str::to_string)
                        .unwrap_or_else(|| row.type_name.clone());
                    registry.push(TypeEntry { key: key.clone(), display });
                    code_by_key.insert(key, c);
                    c
                }
            };
            row_codes.push(code);
        }

        // Stable bucket sort by type code.
        let type_count = registry.len();
        let mut counts = vec![0u32; type_count];
        for &code in &row_codes {
            counts[code as usize] += 1;
        }
        let mut starts = vec![0u32; type_count];
        let mut acc = 0u32;
        for (code, &count) in counts.iter().enumerate() {
            starts[code] = acc;
            acc += count;
        }
        let type_ranges: Vec<(u32, u32)> = starts
            .iter()
            .zip(counts.iter())
            .map(|(&s, &c)| (s, s + c))
            .collect();

        let mut order = vec![0u32; n];
        let mut cursor = starts;
        for (i, &code) in row_codes.iter().enumerate() {
            order[cursor[code as usize] as usize] = i as u32;
            cursor[code as usize] += 1;
        }

        // Fill columns in bucketed order.
        let mut express_ids = Vec::with_capacity(n);
        let mut type_codes = Vec::with_capacity(n);
        let mut global_ids = Vec::with_capacity(n);
        let mut names = Vec::with_capacity(n);
        let mut descriptions = Vec::with_capacity(n);
        let mut object_types = Vec::with_capacity(n);
        let mut flags = Vec::with_capacity(n);
        let mut contained = Vec::with_capacity(n);
        let mut defined_by = Vec::with_capacity(n);
        let mut geometry_index = Vec::with_capacity(n);

        let mut next_geometry = 0i32;
        for &src in &order {
            let row = &self.rows[src as usize];
            express_ids.push(row.express_id);
            type_codes.push(row_codes[src as usize]);
            global_ids.push(row.global_id);
            names.push(row.name);
            descriptions.push(row.description);
            object_types.push(row.object_type);
            flags.push(if row.has_geometry { FLAG_HAS_GEOMETRY } else { 0 });
            contained.push(
                self.contained_in_storey
                    .get(&row.express_id)
                    .copied()
                    .unwrap_or(0),
            );
            defined_by.push(
                self.defined_by_type
                    .get(&row.express_id)
                    .copied()
                    .unwrap_or(0),
            );
            geometry_index.push(if row.has_geometry {
                let idx = next_geometry;
                next_geometry += 1;
                idx
            } else {
                -1
            });
        }

        EntityTable::from_parts(
            EntityColumns {
                express_ids,
                type_codes,
                global_ids,
                names,
                descriptions,
                object_types,
                flags,
                contained_in_storey: contained,
                defined_by_type: defined_by,
                geometry_index,
            },
            registry,
            type_ranges,
            strings,
        )
    }
}

/// Raw column storage, shared between the builder and the codec.
#[derive(Debug, Clone, Default)]
pub(crate) struct EntityColumns {
    pub express_ids: Vec<u32>,
    pub type_codes: Vec<u16>,
    pub global_ids: Vec<u32>,
    pub names: Vec<u32>,
    pub descriptions: Vec<u32>,
    pub object_types: Vec<u32>,
    pub flags: Vec<u8>,
    pub contained_in_storey: Vec<u32>,
    pub defined_by_type: Vec<u32>,
    pub geometry_index: Vec<i32>,
}

/// Immutable columnar entity table.
#[derive(Debug, Clone)]
pub struct EntityTable {
    cols: EntityColumns,
    registry: Vec<TypeEntry>,
    /// `[start, end)` row range per type code.
    type_ranges: Vec<(u32, u32)>,
    /// Derived: normalized type key → code. Rebuilt, never persisted.
    code_by_key: FxHashMap<String, u16>,
    /// Derived: express id → row. Rebuilt, never persisted.
    row_by_id: FxHashMap<u32, u32>,
    strings: Arc<StringTable>,
}

impl EntityTable {
    fn from_parts(
        cols: EntityColumns,
        registry: Vec<TypeEntry>,
        type_ranges: Vec<(u32, u32)>,
        strings: Arc<StringTable>,
    ) -> Self {
        let mut code_by_key = FxHashMap::default();
        for (code, entry) in registry.iter().enumerate() {
            code_by_key.insert(entry.key.clone(), code as u16);
        }
        let mut row_by_id =
            FxHashMap::with_capacity_and_hasher(cols.express_ids.len(), Default::default());
        for (row, &id) in cols.express_ids.iter().enumerate() {
            row_by_id.insert(id, row as u32);
        }
        Self {
            cols,
            registry,
            type_ranges,
            code_by_key,
            row_by_id,
            strings,
        }
    }

    /// Codec entry point: reattach columns read from a blob and rebuild
    /// the derived indices.
    pub(crate) fn from_codec_parts(
        cols: EntityColumns,
        registry: Vec<(String, String)>,
        type_ranges: Vec<(u32, u32)>,
        strings: Arc<StringTable>,
    ) -> Self {
        let registry = registry
            .into_iter()
            .map(|(key, display)| TypeEntry { key, display })
            .collect();
        Self::from_parts(cols, registry, type_ranges, strings)
    }

    pub(crate) fn codec_parts(
        &self,
    ) -> (&EntityColumns, Vec<(&str, &str)>, &[(u32, u32)]) {
        (
            &self.cols,
            self.registry
                .iter()
                .map(|e| (e.key.as_str(), e.display.as_str()))
                .collect(),
            &self.type_ranges,
        )
    }

    /// Number of rows.
    #[inline]
    pub fn len(&self) -> usize {
        self.cols.express_ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cols.express_ids.is_empty()
    }

    /// Row index for an express id.
    #[inline]
    pub fn row_of(&self, express_id: u32) -> Option<usize> {
        self.row_by_id.get(&express_id).map(|&r| r as usize)
    }

    #[inline]
    pub fn contains(&self, express_id: u32) -> bool {
        self.row_by_id.contains_key(&express_id)
    }

    fn string_at(&self, column: &[u32], express_id: u32) -> Option<&str> {
        let row = self.row_of(express_id)?;
        self.strings.get_opt(column[row])
    }

    pub fn global_id(&self, express_id: u32) -> Option<&str> {
        self.string_at(&self.cols.global_ids, express_id)
    }

    pub fn name(&self, express_id: u32) -> Option<&str> {
        self.string_at(&self.cols.names, express_id)
    }

    pub fn description(&self, express_id: u32) -> Option<&str> {
        self.string_at(&self.cols.descriptions, express_id)
    }

    pub fn object_type(&self, express_id: u32) -> Option<&str> {
        self.string_at(&self.cols.object_types, express_id)
    }

    /// Canonical type display name (`IfcWall`).
    pub fn type_name(&self, express_id: u32) -> Option<&str> {
        let row = self.row_of(express_id)?;
        Some(self.registry[self.cols.type_codes[row] as usize].display.as_str())
    }

    pub fn type_code(&self, express_id: u32) -> Option<u16> {
        self.row_of(express_id).map(|r| self.cols.type_codes[r])
    }

    pub fn has_geometry(&self, express_id: u32) -> bool {
        self.row_of(express_id)
            .map(|r| self.cols.flags[r] & FLAG_HAS_GEOMETRY != 0)
            .unwrap_or(false)
    }

    /// Index into the external geometry buffer list; `None` when absent.
    pub fn geometry_index(&self, express_id: u32) -> Option<i32> {
        let row = self.row_of(express_id)?;
        let idx = self.cols.geometry_index[row];
        (idx >= 0).then_some(idx)
    }

    /// Express id of the containing storey, if any.
    pub fn contained_in_storey(&self, express_id: u32) -> Option<u32> {
        let row = self.row_of(express_id)?;
        let id = self.cols.contained_in_storey[row];
        (id != 0).then_some(id)
    }

    /// Express id of the defining type object, if any.
    pub fn defined_by_type(&self, express_id: u32) -> Option<u32> {
        let row = self.row_of(express_id)?;
        let id = self.cols.defined_by_type[row];
        (id != 0).then_some(id)
    }

    /// All express ids of a type, in ascending row order. Relies on the
    /// build-time clustering invariant: rows of one type are contiguous.
    pub fn get_by_type(&self, type_name: &str) -> &[u32] {
        match self.code_by_key.get(&schema::normalize(type_name)) {
            Some(&code) => {
                let (start, end) = self.type_ranges[code as usize];
                &self.cols.express_ids[start as usize..end as usize]
            }
            None => &[],
        }
    }

    /// Distinct type names present, in code order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.registry.iter().map(|e| e.display.as_str())
    }

    /// All express ids in row order.
    pub fn express_ids(&self) -> &[u32] {
        &self.cols.express_ids
    }

    pub(crate) fn strings(&self) -> &Arc<StringTable> {
        &self.strings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strings::NULL_IDX;

    fn build_sample() -> EntityTable {
        let mut strings = StringTable::new();
        let mut builder = EntityTableBuilder::new();
        let g1 = strings.intern("GUID-W1");
        let n1 = strings.intern("Wall-01");
        builder.add(EntityRow {
            express_id: 10,
            type_name: "IFCWALL".to_string(),
            global_id: g1,
            name: n1,
            description: NULL_IDX,
            object_type: NULL_IDX,
            has_geometry: true,
        });
        let n2 = strings.intern("Door-01");
        builder.add(EntityRow {
            express_id: 4,
            type_name: "IFCDOOR".to_string(),
            global_id: NULL_IDX,
            name: n2,
            description: NULL_IDX,
            object_type: NULL_IDX,
            has_geometry: true,
        });
        let n3 = strings.intern("Wall-02");
        builder.add(EntityRow {
            express_id: 7,
            type_name: "IFCWALL".to_string(),
            global_id: NULL_IDX,
            name: n3,
            description: NULL_IDX,
            object_type: NULL_IDX,
            has_geometry: false,
        });
        builder.set_contained_in_storey(10, 99);
        builder.build(Arc::new(strings))
    }

    #[test]
    fn test_accessors() {
        let table = build_sample();
        assert_eq!(table.len(), 3);
        assert_eq!(table.global_id(10), Some("GUID-W1"));
        assert_eq!(table.name(10), Some("Wall-01"));
        assert_eq!(table.description(10), None);
        assert_eq!(table.type_name(10), Some("IfcWall"));
        assert_eq!(table.type_name(4), Some("IfcDoor"));
        assert!(table.has_geometry(4));
        assert!(!table.has_geometry(7));
        assert_eq!(table.contained_in_storey(10), Some(99));
        assert_eq!(table.contained_in_storey(4), None);
        assert_eq!(table.name(9999), None);
    }

    #[test]
    fn test_type_clustering() {
        let table = build_sample();
        // Walls were seen first: both wall rows are contiguous, in
        // insertion order, regardless of the interleaved door.
        assert_eq!(table.get_by_type("IFCWALL"), &[10, 7]);
        assert_eq!(table.get_by_type("IfcWall"), &[10, 7]);
        assert_eq!(table.get_by_type("ifcdoor"), &[4]);
        assert_eq!(table.get_by_type("IFCSLAB"), &[] as &[u32]);
    }

    #[test]
    fn test_geometry_index_assignment() {
        let table = build_sample();
        // Geometry slots count only geometry-bearing rows.
        assert!(table.geometry_index(10).is_some());
        assert!(table.geometry_index(4).is_some());
        assert_eq!(table.geometry_index(7), None);
        let mut slots = vec![
            table.geometry_index(10).unwrap(),
            table.geometry_index(4).unwrap(),
        ];
        slots.sort_unstable();
        assert_eq!(slots, vec![0, 1]);
    }

    #[test]
    fn test_duplicate_express_id_overwrites() {
        let mut strings = StringTable::new();
        let mut builder = EntityTableBuilder::new();
        let a = strings.intern("first");
        let b = strings.intern("second");
        builder.add(EntityRow {
            express_id: 1,
            type_name: "IFCWALL".to_string(),
            global_id: NULL_IDX,
            name: a,
            description: NULL_IDX,
            object_type: NULL_IDX,
            has_geometry: false,
        });
        builder.add(EntityRow {
            express_id: 1,
            type_name: "IFCWALL".to_string(),
            global_id: NULL_IDX,
            name: b,
            description: NULL_IDX,
            object_type: NULL_IDX,
            has_geometry: false,
        });
        let table = builder.build(Arc::new(strings));
        assert_eq!(table.len(), 1);
        assert_eq!(table.name(1), Some("second"));
    }
}
