// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The immutable columnar data store.
//!
//! Constructed once per parse call and owned exclusively by the caller;
//! every table is written exactly once during `build()` and read-only
//! afterward, so no locking discipline is needed for readers.

use crate::spatial::SpatialHierarchy;
use crate::strings::StringTable;
use crate::tables::{EntityTable, PropertyTable, QuantityTable, RelationshipGraph};
use rustc_hash::FxHashSet;
use std::sync::Arc;

/// Read-only aggregate of all columnar tables for one parsed file.
#[derive(Debug, Clone)]
pub struct IfcDataStore {
    pub entities: EntityTable,
    pub properties: PropertyTable,
    pub quantities: QuantityTable,
    pub relationships: RelationshipGraph,
    pub spatial: Option<SpatialHierarchy>,
    /// Size of the source buffer in bytes.
    pub file_size: u64,
    /// Entities that survived extraction. Comparing against the scan count
    /// exposes tokenization/extraction gaps.
    pub entity_count: u32,
    strings: Arc<StringTable>,
}

impl IfcDataStore {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        entities: EntityTable,
        properties: PropertyTable,
        quantities: QuantityTable,
        relationships: RelationshipGraph,
        spatial: Option<SpatialHierarchy>,
        file_size: u64,
        entity_count: u32,
        strings: Arc<StringTable>,
    ) -> Self {
        Self {
            entities,
            properties,
            quantities,
            relationships,
            spatial,
            file_size,
            entity_count,
            strings,
        }
    }

    pub(crate) fn strings(&self) -> &Arc<StringTable> {
        &self.strings
    }

    /// Sum a named quantity across the whole model, optionally restricted
    /// to one element type (resolved through the entity table).
    pub fn sum_quantity_by_type(&self, quantity_name: &str, element_type: Option<&str>) -> f64 {
        match element_type {
            None => self.quantities.sum_by_type(quantity_name),
            Some(type_name) => {
                let ids: FxHashSet<u32> =
                    self.entities.get_by_type(type_name).iter().copied().collect();
                self.quantities.sum_by_type_filtered(quantity_name, &ids)
            }
        }
    }
}
