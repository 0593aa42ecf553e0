// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Multi-phase columnar parser.
//!
//! Phases run strictly in order: scan → extract → properties →
//! relationships → done. Each reports progress through the injected
//! callback, throttled to batch boundaries because the callback cost
//! dominates at per-entity granularity. A parse call owns all of its
//! state; independent buffers can be parsed concurrently from separate
//! execution contexts.

use crate::decoder::EntityExtractor;
use crate::error::Result;
use crate::extractors::{
    entity_row, AttrPositionCache, EntityMap, PropertyExtractor, QuantityExtractor,
    RelationshipExtractor,
};
use crate::index::EntityIndexBuilder;
use crate::spatial::{build_spatial_nodes, SpatialHierarchy};
use crate::store::IfcDataStore;
use crate::strings::StringTable;
use crate::tables::{
    EntityTableBuilder, PropertyTableBuilder, QuantityTableBuilder, RelKind,
    RelationshipGraphBuilder,
};
use crate::tokenizer::{EntityRef, StepTokenizer};
use std::sync::Arc;
use std::time::Instant;

/// Pipeline phase, reported through the progress callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ParsePhase {
    Scan,
    Extract,
    Properties,
    Relationships,
    Done,
}

impl ParsePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParsePhase::Scan => "scan",
            ParsePhase::Extract => "extract",
            ParsePhase::Properties => "properties",
            ParsePhase::Relationships => "relationships",
            ParsePhase::Done => "done",
        }
    }
}

impl std::fmt::Display for ParsePhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress callback: `(phase, percent)` with 0 and 100 per phase.
pub type ProgressFn = Box<dyn FnMut(ParsePhase, f32) + Send>;

/// Parser configuration.
pub struct ParseOptions {
    /// Progress callback, invoked at phase boundaries and every
    /// `progress_every` entities within a phase.
    pub on_progress: Option<ProgressFn>,
    /// Intermediate progress granularity in entities.
    pub progress_every: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            on_progress: None,
            progress_every: 1000,
        }
    }
}

impl ParseOptions {
    pub fn with_progress(mut self, callback: ProgressFn) -> Self {
        self.on_progress = Some(callback);
        self
    }
}

impl std::fmt::Debug for ParseOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOptions")
            .field("on_progress", &self.on_progress.is_some())
            .field("progress_every", &self.progress_every)
            .finish()
    }
}

/// Parse with default options.
pub fn parse(content: &str) -> Result<IfcDataStore> {
    ColumnarParser::new().parse(content)
}

/// Multi-phase parser. Reusable across independent buffers; no state
/// survives a parse call except the options.
#[derive(Debug, Default)]
pub struct ColumnarParser {
    options: ParseOptions,
}

impl ColumnarParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ParseOptions) -> Self {
        Self { options }
    }

    /// Parse a raw byte buffer. The only buffer error that propagates is
    /// invalid UTF-8; malformed records inside a valid buffer are skipped.
    pub fn parse_bytes(&mut self, buffer: &[u8]) -> Result<IfcDataStore> {
        let content = std::str::from_utf8(buffer)?;
        self.parse(content)
    }

    /// Run all phases over one buffer and assemble the immutable store.
    /// Never fails on malformed entity records: the result is a
    /// best-effort partial store.
    pub fn parse(&mut self, content: &str) -> Result<IfcDataStore> {
        let started = Instant::now();
        let granularity = self.options.progress_every.max(1);
        let callback = &mut self.options.on_progress;
        let mut report = move |phase: ParsePhase, percent: f32| {
            if let Some(cb) = callback.as_mut() {
                cb(phase, percent);
            }
        };
        tracing::info!(content_size = content.len(), "starting columnar parse");

        // Phase 1: scan. One forward pass locates every record.
        report(ParsePhase::Scan, 0.0);
        let mut tokenizer = StepTokenizer::new(content);
        let mut index_builder = EntityIndexBuilder::with_capacity_for(content.len());
        let mut jobs = Vec::new();
        let total_bytes = content.len().max(1) as f32;
        while let Some(entity) = tokenizer.next_entity() {
            index_builder.add(&entity);
            jobs.push(entity);
            if jobs.len() % granularity == 0 {
                let percent = entity.byte_offset as f32 / total_bytes * 100.0;
                report(ParsePhase::Scan, percent.min(99.0));
            }
        }
        let index = index_builder.build();
        report(ParsePhase::Scan, 100.0);
        tracing::debug!(
            scanned = index.scanned_count(),
            distinct = index.len(),
            "scan complete"
        );

        // Phase 2: extract. Decode every indexed record's attribute list,
        // resolved through the index so duplicate ids decode the later
        // declaration exactly once.
        report(ParsePhase::Extract, 0.0);
        let extractor = EntityExtractor::new(content);
        let mut entities = EntityMap::with_capacity_and_hasher(index.len(), Default::default());
        let mut gaps = 0usize;
        let total_jobs = jobs.len().max(1) as f32;
        for (i, job) in jobs.iter().enumerate() {
            if !entities.contains_key(&job.express_id) {
                if let Some(span) = index.get(job.express_id) {
                    match extractor.extract(span) {
                        Ok(entity) => {
                            entities.insert(entity.id, entity);
                        }
                        Err(_) => gaps += 1,
                    }
                }
            }
            if (i + 1) % granularity == 0 {
                report(ParsePhase::Extract, (i + 1) as f32 / total_jobs * 100.0);
            }
        }
        report(ParsePhase::Extract, 100.0);
        if gaps > 0 {
            tracing::debug!(gaps, "records skipped during attribute extraction");
        }

        let store = finish_pipeline(&jobs, &entities, content.len() as u64, &mut report);

        tracing::info!(
            entities = store.entity_count,
            properties = store.properties.len(),
            quantities = store.quantities.len(),
            relationships = store.relationships.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "columnar parse complete"
        );
        Ok(store)
    }
}

/// Phases 3 and 4 plus table assembly, shared by the sync and async
/// entry points. `jobs` preserves scan order for entity-table rows.
pub(crate) fn finish_pipeline(
    jobs: &[EntityRef<'_>],
    entities: &EntityMap,
    file_size: u64,
    report: &mut dyn FnMut(ParsePhase, f32),
) -> IfcDataStore {
    let mut strings = StringTable::new();

    // Phase 3: property and quantity sets.
    report(ParsePhase::Properties, 0.0);
    let mut property_builder = PropertyTableBuilder::new();
    PropertyExtractor::new(entities).extract(&mut strings, &mut property_builder);
    report(ParsePhase::Properties, 50.0);
    let mut quantity_builder = QuantityTableBuilder::new();
    QuantityExtractor::new(entities).extract(&mut strings, &mut quantity_builder);
    report(ParsePhase::Properties, 100.0);

    // Phase 4: relationship graph and spatial hierarchy.
    report(ParsePhase::Relationships, 0.0);
    let mut graph_builder = RelationshipGraphBuilder::new();
    RelationshipExtractor::new(entities).extract(&mut graph_builder);
    let graph = graph_builder.build();
    let spatial_parts = build_spatial_nodes(entities, &graph, &mut strings);
    report(ParsePhase::Relationships, 100.0);

    // Assemble the columnar tables: rows in scan order, relationship
    // columns patched from the graph.
    let mut entity_builder = EntityTableBuilder::new();
    let mut positions = AttrPositionCache::new();
    for job in jobs {
        if let Some(entity) = entities.get(&job.express_id) {
            entity_builder.add(entity_row(entity, &mut strings, &mut positions));
        }
    }
    for edge in graph.edges() {
        match edge.kind {
            RelKind::ContainedInStructure => {
                let is_storey = entities
                    .get(&edge.source)
                    .map(|e| e.type_name.eq_ignore_ascii_case("IFCBUILDINGSTOREY"))
                    .unwrap_or(false);
                if is_storey {
                    entity_builder.set_contained_in_storey(edge.target, edge.source);
                }
            }
            RelKind::DefinesByType => {
                entity_builder.set_defined_by_type(edge.target, edge.source);
            }
            _ => {}
        }
    }

    let strings = Arc::new(strings);
    let entity_table = entity_builder.build(strings.clone());
    let property_table = property_builder.build(strings.clone());
    let quantity_table = quantity_builder.build(strings.clone());
    let spatial = spatial_parts
        .map(|(nodes, project_id)| SpatialHierarchy::from_parts(nodes, project_id, strings.clone()));

    let entity_count = entity_table.len() as u32;
    let store = IfcDataStore::new(
        entity_table,
        property_table,
        quantity_table,
        graph,
        spatial,
        file_size,
        entity_count,
        strings,
    );
    report(ParsePhase::Done, 100.0);
    store
}
