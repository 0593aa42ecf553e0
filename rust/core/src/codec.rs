// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary cache codec.
//!
//! Fixed, versioned, self-describing little-endian layout: an 8-byte
//! header (magic, version, blob kind), then one section per table — a
//! `count: u32` followed by one fixed-width array per column in declared
//! order and a table-specific trailer. Derived structures (id → row maps,
//! adjacency, the per-table secondary indices, spatial child/element
//! links) are rebuilt on read rather than persisted: they are cheap to
//! derive and persisting them risks divergence from the columns.
//!
//! Round-trip contract: `read_store(write_store(store))` is observably
//! equal to `store` through every accessor.

use crate::error::{Error, Result};
use crate::spatial::{relink, SpatialHierarchy, SpatialNode};
use crate::store::IfcDataStore;
use crate::strings::StringTable;
use crate::tables::entity::EntityColumns;
use crate::tables::property::PropertyColumns;
use crate::tables::quantity::QuantityColumns;
use crate::tables::{EntityTable, PropertyTable, QuantityTable, RelEdge, RelKind, RelationshipGraph};
use std::sync::Arc;

/// Magic bytes identifying a store blob.
pub const MAGIC: [u8; 4] = *b"IFCS";

/// Current format version.
pub const VERSION: u8 = 1;

/// Header size in bytes (fixed).
pub const HEADER_LEN: usize = 8;

/// Blob kinds.
const KIND_STORE: u8 = 0;
const KIND_ENTITY_TABLE: u8 = 1;

// =============================================================================
// Write
// =============================================================================

fn put_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn put_str16(buf: &mut Vec<u8>, s: &str) {
    put_u16(buf, s.len() as u16);
    buf.extend_from_slice(s.as_bytes());
}

fn write_header(buf: &mut Vec<u8>, kind: u8) {
    buf.extend_from_slice(&MAGIC);
    buf.push(VERSION);
    buf.push(kind);
    buf.extend_from_slice(&[0, 0]); // reserved
}

fn write_strings_section(buf: &mut Vec<u8>, strings: &StringTable) {
    put_u32(buf, strings.len() as u32);
    for value in strings.iter() {
        put_u32(buf, value.len() as u32);
        buf.extend_from_slice(value.as_bytes());
    }
}

fn write_entity_section(buf: &mut Vec<u8>, table: &EntityTable) {
    let (cols, registry, ranges) = table.codec_parts();
    let n = cols.express_ids.len();
    put_u32(buf, n as u32);
    for &v in &cols.express_ids {
        put_u32(buf, v);
    }
    for &v in &cols.type_codes {
        put_u16(buf, v);
    }
    for column in [
        &cols.global_ids,
        &cols.names,
        &cols.descriptions,
        &cols.object_types,
    ] {
        for &v in column.iter() {
            put_u32(buf, v);
        }
    }
    buf.extend_from_slice(&cols.flags);
    for &v in &cols.contained_in_storey {
        put_u32(buf, v);
    }
    for &v in &cols.defined_by_type {
        put_u32(buf, v);
    }
    for &v in &cols.geometry_index {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    // Trailer: type registry, then the per-type row ranges.
    put_u16(buf, registry.len() as u16);
    for (key, display) in registry {
        put_str16(buf, key);
        put_str16(buf, display);
    }
    put_u16(buf, ranges.len() as u16);
    for (code, &(start, end)) in ranges.iter().enumerate() {
        put_u16(buf, code as u16);
        put_u32(buf, start);
        put_u32(buf, end);
    }
}

fn write_property_section(buf: &mut Vec<u8>, table: &PropertyTable) {
    let cols = table.columns();
    put_u32(buf, cols.entity_ids.len() as u32);
    for column in [&cols.entity_ids, &cols.set_names, &cols.names] {
        for &v in column.iter() {
            put_u32(buf, v);
        }
    }
    buf.extend_from_slice(&cols.kinds);
    for &v in &cols.texts {
        put_u32(buf, v);
    }
    for &v in &cols.numbers {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

fn write_quantity_section(buf: &mut Vec<u8>, table: &QuantityTable) {
    let cols = table.columns();
    put_u32(buf, cols.entity_ids.len() as u32);
    for column in [&cols.entity_ids, &cols.set_names, &cols.names] {
        for &v in column.iter() {
            put_u32(buf, v);
        }
    }
    buf.extend_from_slice(&cols.kinds);
    for &v in &cols.values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
    for column in [&cols.units, &cols.formulas] {
        for &v in column.iter() {
            put_u32(buf, v);
        }
    }
}

fn write_relation_section(buf: &mut Vec<u8>, graph: &RelationshipGraph) {
    let (kinds, sources, targets) = graph.columns();
    put_u32(buf, kinds.len() as u32);
    buf.extend_from_slice(kinds);
    for &v in sources {
        put_u32(buf, v);
    }
    for &v in targets {
        put_u32(buf, v);
    }
}

fn write_spatial_section(buf: &mut Vec<u8>, spatial: Option<&SpatialHierarchy>) {
    match spatial {
        None => buf.push(0),
        Some(hierarchy) => {
            buf.push(1);
            let nodes = hierarchy.nodes();
            put_u32(buf, nodes.len() as u32);
            put_u32(buf, hierarchy.project_id());
            for node in nodes {
                put_u32(buf, node.entity_id);
            }
            for node in nodes {
                put_u32(buf, node.parent_id);
            }
            for node in nodes {
                put_u16(buf, node.level);
            }
            for node in nodes {
                put_u32(buf, node.name);
            }
            for node in nodes {
                put_u32(buf, node.type_name);
            }
            for node in nodes {
                buf.push(node.elevation.is_some() as u8);
            }
            for node in nodes {
                buf.extend_from_slice(&node.elevation.unwrap_or(0.0).to_le_bytes());
            }
        }
    }
}

/// Serialize a full store to a cache blob.
pub fn write_store(store: &IfcDataStore) -> Vec<u8> {
    let mut buf = Vec::new();
    write_header(&mut buf, KIND_STORE);
    buf.extend_from_slice(&store.file_size.to_le_bytes());
    put_u32(&mut buf, store.entity_count);
    write_strings_section(&mut buf, store.strings());
    write_entity_section(&mut buf, &store.entities);
    write_property_section(&mut buf, &store.properties);
    write_quantity_section(&mut buf, &store.quantities);
    write_relation_section(&mut buf, &store.relationships);
    write_spatial_section(&mut buf, store.spatial.as_ref());
    buf
}

/// Serialize a standalone entity table (with its string table) to a blob.
pub fn write_entities(table: &EntityTable) -> Vec<u8> {
    let mut buf = Vec::new();
    write_header(&mut buf, KIND_ENTITY_TABLE);
    write_strings_section(&mut buf, table.strings());
    write_entity_section(&mut buf, table);
    buf
}

// =============================================================================
// Read
// =============================================================================

/// Forward-only cursor over a blob.
struct Cursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(n).ok_or(Error::Truncated {
            got: self.buf.len(),
            min: usize::MAX,
        })?;
        if end > self.buf.len() {
            return Err(Error::Truncated {
                got: self.buf.len(),
                min: end,
            });
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn read_str16(&mut self) -> Result<String> {
        let len = self.read_u16()? as usize;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidStringData)
    }

    fn read_u32_vec(&mut self, n: usize) -> Result<Vec<u32>> {
        let mut out = Vec::with_capacity(n);
        for _ in 0..n {
            out.push(self.read_u32()?);
        }
        Ok(out)
    }
}

fn read_header(cursor: &mut Cursor<'_>, expected_kind: u8) -> Result<()> {
    if cursor.buf.len() < HEADER_LEN {
        return Err(Error::Truncated {
            got: cursor.buf.len(),
            min: HEADER_LEN,
        });
    }
    if cursor.take(4)? != MAGIC {
        return Err(Error::InvalidMagic);
    }
    let version = cursor.read_u8()?;
    if version != VERSION {
        return Err(Error::UnsupportedVersion(version));
    }
    let kind = cursor.read_u8()?;
    if kind != expected_kind {
        return Err(Error::CorruptBlob(format!("unexpected blob kind {kind}")));
    }
    cursor.take(2)?; // reserved
    Ok(())
}

fn read_strings_section(cursor: &mut Cursor<'_>) -> Result<StringTable> {
    let count = cursor.read_u32()? as usize;
    let mut values = Vec::with_capacity(count);
    for _ in 0..count {
        let len = cursor.read_u32()? as usize;
        let bytes = cursor.take(len)?;
        values.push(String::from_utf8(bytes.to_vec()).map_err(|_| Error::InvalidStringData)?);
    }
    if values.len() < 2 {
        return Err(Error::CorruptBlob(
            "string table is missing reserved slots".to_string(),
        ));
    }
    Ok(StringTable::from_values(values))
}

/// Check that every index in a string column resolves.
fn check_string_column(column: &[u32], strings: &StringTable) -> Result<()> {
    let limit = strings.len() as u32;
    if column.iter().any(|&idx| idx >= limit) {
        return Err(Error::CorruptBlob(
            "string index out of bounds".to_string(),
        ));
    }
    Ok(())
}

fn read_entity_section(cursor: &mut Cursor<'_>, strings: &Arc<StringTable>) -> Result<EntityTable> {
    let n = cursor.read_u32()? as usize;
    let express_ids = cursor.read_u32_vec(n)?;
    let mut type_codes = Vec::with_capacity(n);
    for _ in 0..n {
        type_codes.push(cursor.read_u16()?);
    }
    let global_ids = cursor.read_u32_vec(n)?;
    let names = cursor.read_u32_vec(n)?;
    let descriptions = cursor.read_u32_vec(n)?;
    let object_types = cursor.read_u32_vec(n)?;
    let flags = cursor.take(n)?.to_vec();
    let contained_in_storey = cursor.read_u32_vec(n)?;
    let defined_by_type = cursor.read_u32_vec(n)?;
    let mut geometry_index = Vec::with_capacity(n);
    for _ in 0..n {
        geometry_index.push(cursor.read_i32()?);
    }

    let registry_count = cursor.read_u16()? as usize;
    let mut registry = Vec::with_capacity(registry_count);
    for _ in 0..registry_count {
        let key = cursor.read_str16()?;
        let display = cursor.read_str16()?;
        registry.push((key, display));
    }
    let range_count = cursor.read_u16()? as usize;
    if range_count != registry_count {
        return Err(Error::CorruptBlob(format!(
            "type range count {range_count} does not match registry size {registry_count}"
        )));
    }
    let mut type_ranges = vec![(0u32, 0u32); range_count];
    for _ in 0..range_count {
        let code = cursor.read_u16()? as usize;
        let start = cursor.read_u32()?;
        let end = cursor.read_u32()?;
        if code >= range_count || start > end || end as usize > n {
            return Err(Error::CorruptBlob("invalid type range".to_string()));
        }
        type_ranges[code] = (start, end);
    }

    for column in [&global_ids, &names, &descriptions, &object_types] {
        check_string_column(column, strings)?;
    }

    Ok(EntityTable::from_codec_parts(
        EntityColumns {
            express_ids,
            type_codes,
            global_ids,
            names,
            descriptions,
            object_types,
            flags,
            contained_in_storey,
            defined_by_type,
            geometry_index,
        },
        registry,
        type_ranges,
        strings.clone(),
    ))
}

fn read_property_section(
    cursor: &mut Cursor<'_>,
    strings: &Arc<StringTable>,
) -> Result<PropertyTable> {
    let n = cursor.read_u32()? as usize;
    let entity_ids = cursor.read_u32_vec(n)?;
    let set_names = cursor.read_u32_vec(n)?;
    let names = cursor.read_u32_vec(n)?;
    let kinds = cursor.take(n)?.to_vec();
    let texts = cursor.read_u32_vec(n)?;
    let mut numbers = Vec::with_capacity(n);
    for _ in 0..n {
        numbers.push(cursor.read_f64()?);
    }
    for column in [&set_names, &names, &texts] {
        check_string_column(column, strings)?;
    }
    Ok(PropertyTable::from_parts(
        PropertyColumns {
            entity_ids,
            set_names,
            names,
            kinds,
            texts,
            numbers,
        },
        strings.clone(),
    ))
}

fn read_quantity_section(
    cursor: &mut Cursor<'_>,
    strings: &Arc<StringTable>,
) -> Result<QuantityTable> {
    let n = cursor.read_u32()? as usize;
    let entity_ids = cursor.read_u32_vec(n)?;
    let set_names = cursor.read_u32_vec(n)?;
    let names = cursor.read_u32_vec(n)?;
    let kinds = cursor.take(n)?.to_vec();
    let mut values = Vec::with_capacity(n);
    for _ in 0..n {
        values.push(cursor.read_f64()?);
    }
    let units = cursor.read_u32_vec(n)?;
    let formulas = cursor.read_u32_vec(n)?;
    for column in [&set_names, &names, &units, &formulas] {
        check_string_column(column, strings)?;
    }
    Ok(QuantityTable::from_parts(
        QuantityColumns {
            entity_ids,
            set_names,
            names,
            kinds,
            values,
            units,
            formulas,
        },
        strings.clone(),
    ))
}

fn read_relation_section(cursor: &mut Cursor<'_>) -> Result<RelationshipGraph> {
    let n = cursor.read_u32()? as usize;
    let kinds = cursor.take(n)?.to_vec();
    let sources = cursor.read_u32_vec(n)?;
    let targets = cursor.read_u32_vec(n)?;
    let mut edges = Vec::with_capacity(n);
    for i in 0..n {
        let kind = RelKind::from_u8(kinds[i])
            .ok_or_else(|| Error::CorruptBlob(format!("invalid relationship kind {}", kinds[i])))?;
        edges.push(RelEdge {
            kind,
            source: sources[i],
            target: targets[i],
        });
    }
    Ok(RelationshipGraph::from_edges(edges))
}

fn read_spatial_section(
    cursor: &mut Cursor<'_>,
    graph: &RelationshipGraph,
    strings: &Arc<StringTable>,
) -> Result<Option<SpatialHierarchy>> {
    if cursor.read_u8()? == 0 {
        return Ok(None);
    }
    let n = cursor.read_u32()? as usize;
    let project_id = cursor.read_u32()?;
    let entity_ids = cursor.read_u32_vec(n)?;
    let parent_ids = cursor.read_u32_vec(n)?;
    let mut levels = Vec::with_capacity(n);
    for _ in 0..n {
        levels.push(cursor.read_u16()?);
    }
    let names = cursor.read_u32_vec(n)?;
    let type_names = cursor.read_u32_vec(n)?;
    let elev_flags = cursor.take(n)?.to_vec();
    let mut elevations = Vec::with_capacity(n);
    for _ in 0..n {
        elevations.push(cursor.read_f64()?);
    }
    for column in [&names, &type_names] {
        check_string_column(column, strings)?;
    }

    let mut nodes = Vec::with_capacity(n);
    for i in 0..n {
        nodes.push(SpatialNode {
            entity_id: entity_ids[i],
            parent_id: parent_ids[i],
            level: levels[i],
            name: names[i],
            type_name: type_names[i],
            elevation: (elev_flags[i] != 0).then(|| elevations[i]),
            children: Vec::new(),
            elements: Vec::new(),
        });
    }
    // Child/element links are derived; rebuild them from the graph.
    relink(&mut nodes, graph);
    Ok(Some(SpatialHierarchy::from_parts(
        nodes,
        project_id,
        strings.clone(),
    )))
}

/// Read a full store from a cache blob.
pub fn read_store(buf: &[u8]) -> Result<IfcDataStore> {
    let mut cursor = Cursor::new(buf);
    read_header(&mut cursor, KIND_STORE)?;
    let file_size = cursor.read_u64()?;
    let entity_count = cursor.read_u32()?;
    let strings = Arc::new(read_strings_section(&mut cursor)?);
    let entities = read_entity_section(&mut cursor, &strings)?;
    let properties = read_property_section(&mut cursor, &strings)?;
    let quantities = read_quantity_section(&mut cursor, &strings)?;
    let relationships = read_relation_section(&mut cursor)?;
    let spatial = read_spatial_section(&mut cursor, &relationships, &strings)?;
    Ok(IfcDataStore::new(
        entities,
        properties,
        quantities,
        relationships,
        spatial,
        file_size,
        entity_count,
        strings,
    ))
}

/// Read a standalone entity table blob.
pub fn read_entities(buf: &[u8]) -> Result<EntityTable> {
    let mut cursor = Cursor::new(buf);
    read_header(&mut cursor, KIND_ENTITY_TABLE)?;
    let strings = Arc::new(read_strings_section(&mut cursor)?);
    read_entity_section(&mut cursor, &strings)
}
