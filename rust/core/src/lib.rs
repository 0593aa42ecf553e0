// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # IFC-Store Core
//!
//! Columnar IFC/STEP data store with a high-throughput ingestion pipeline.
//! Turns a raw STEP text buffer into an immutable, queryable
//! [`IfcDataStore`]: byte-level tokenization with
//! [memchr](https://docs.rs/memchr), multi-phase extraction of entities,
//! property sets, quantity sets and relationships, and structure-of-arrays
//! tables backed by a deduplicating string table, with a versioned binary
//! codec for cache round-trips.
//!
//! ## Overview
//!
//! - **Tokenization**: single forward scan producing one [`EntityRef`] per
//!   `#N = TYPE(...)` record; malformed spans are skipped, never raised.
//! - **Extraction**: [nom](https://docs.rs/nom)-based attribute decoding
//!   into a closed tagged union ([`AttributeValue`]).
//! - **Columnar storage**: entity/property/quantity tables plus a directed
//!   relationship graph, every secondary index built once at `build()`.
//! - **Binary codec**: little-endian, versioned blob layout; derived
//!   indices are rebuilt on read rather than persisted.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ifc_store_core::parse;
//!
//! let content = std::fs::read_to_string("model.ifc")?;
//! let store = parse(&content)?;
//!
//! for &id in store.entities.get_by_type("IfcWall") {
//!     println!("#{id}: {:?}", store.entities.name(id));
//! }
//! let area = store.sum_quantity_by_type("NetSideArea", Some("IfcWall"));
//! ```
//!
//! ## Progress and streaming
//!
//! ```rust,ignore
//! use ifc_store_core::{ColumnarParser, ParseOptions};
//!
//! let options = ParseOptions::default()
//!     .with_progress(Box::new(|phase, pct| println!("{phase}: {pct:.0}%")));
//! let store = ColumnarParser::with_options(options).parse(&content)?;
//! ```
//!
//! For host event loops, [`parse_async`] suspends at scan/extract batch
//! boundaries and [`ScanStream`] exposes the scan as a stream of
//! reference batches. Cancellation is dropping the future or stream.
//!
//! ## Error model
//!
//! Malformed records, dangling references and unknown types are coverage
//! gaps, not errors: the parse always returns a best-effort store, and
//! callers compare `entity_count` against expected counts to detect loss.
//! [`Error`] is reserved for invalid input buffers, caller misuse and
//! cache-blob failures.
//!
//! ## Feature Flags
//!
//! - `serde`: serialization derives for the public view types

pub mod codec;
pub mod decoder;
pub mod error;
pub mod extractors;
pub mod index;
pub mod parse;
pub mod schema;
pub mod spatial;
pub mod store;
pub mod streaming;
pub mod strings;
pub mod tables;
pub mod tokenizer;
pub mod units;

pub use codec::{read_entities, read_store, write_entities, write_store};
pub use decoder::{AttributeValue, DecodedEntity, EntityExtractor};
pub use error::{Error, Result};
pub use extractors::{PropertyExtractor, QuantityExtractor, RelationshipExtractor};
pub use index::{EntityIndex, EntityIndexBuilder, EntitySpan};
pub use parse::{parse, ColumnarParser, ParseOptions, ParsePhase, ProgressFn};
pub use spatial::{SpatialHierarchy, SpatialNode};
pub use store::IfcDataStore;
pub use streaming::{parse_async, ParseEvent, ScanStream, StreamConfig};
pub use strings::{StringTable, EMPTY_IDX, NULL_IDX};
pub use tables::{
    EntityRow, EntityTable, EntityTableBuilder, PropertyKind, PropertyRow, PropertySetView,
    PropertyTable, PropertyTableBuilder, PropertyValue, PropertyView, QuantityKind, QuantityRow,
    QuantitySetView, QuantityTable, QuantityTableBuilder, QuantityView, RelEdge, RelKind,
    RelationshipGraph, RelationshipGraphBuilder,
};
pub use tokenizer::{EntityRef, StepTokenizer};
