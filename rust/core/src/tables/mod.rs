// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Columnar tables: structure-of-arrays storage with secondary indices.
//!
//! Each builder accepts intermediate rows via `add()` and produces an
//! immutable table via `build()`. Build-time work is O(n): columns are
//! allocated to the final row count, populated in insertion order, and
//! every secondary index is constructed in the same pass — never lazily
//! per query.

pub mod entity;
pub mod property;
pub mod quantity;
pub mod relations;

pub use entity::{EntityRow, EntityTable, EntityTableBuilder, FLAG_HAS_GEOMETRY};
pub use property::{
    PropertyKind, PropertyRow, PropertySetView, PropertyTable, PropertyTableBuilder, PropertyValue,
    PropertyView,
};
pub use quantity::{
    QuantityKind, QuantityRow, QuantitySetView, QuantityTable, QuantityTableBuilder, QuantityView,
};
pub use relations::{RelEdge, RelKind, RelationshipGraph, RelationshipGraphBuilder};
