// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Entity index for O(1) random access during multi-pass extraction.
//!
//! The scan pass feeds [`EntityRef`]s into an [`EntityIndexBuilder`]; the
//! frozen [`EntityIndex`] maps express ids (sparse, non-contiguous) to byte
//! ranges. Re-adding an id overwrites: ambiguous source files resolve to
//! the later declaration.

use crate::tokenizer::EntityRef;
use rustc_hash::FxHashMap;

/// Byte span of one record, plus scan diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntitySpan {
    pub offset: u32,
    pub len: u32,
    pub line: u32,
}

impl EntitySpan {
    #[inline]
    pub fn range(&self) -> std::ops::Range<usize> {
        self.offset as usize..(self.offset + self.len) as usize
    }
}

/// Accumulates scan output into an id-keyed index.
#[derive(Debug, Default)]
pub struct EntityIndexBuilder {
    spans: FxHashMap<u32, EntitySpan>,
    scanned: usize,
}

impl EntityIndexBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-size for an estimated entity count (roughly 1 per 50 bytes of
    /// input, matching observed IFC record density).
    pub fn with_capacity_for(content_len: usize) -> Self {
        Self {
            spans: FxHashMap::with_capacity_and_hasher(content_len / 50, Default::default()),
            scanned: 0,
        }
    }

    /// Record one scanned entity. Last write wins on duplicate ids.
    pub fn add(&mut self, entity: &EntityRef<'_>) {
        self.scanned += 1;
        self.spans.insert(
            entity.express_id,
            EntitySpan {
                offset: entity.byte_offset,
                len: entity.byte_len,
                line: entity.line,
            },
        );
    }

    /// Freeze into the queryable index.
    pub fn build(self) -> EntityIndex {
        EntityIndex {
            spans: self.spans,
            scanned: self.scanned,
        }
    }
}

/// Immutable id → byte-range lookup.
#[derive(Debug, Clone, Default)]
pub struct EntityIndex {
    spans: FxHashMap<u32, EntitySpan>,
    scanned: usize,
}

impl EntityIndex {
    #[inline]
    pub fn get(&self, express_id: u32) -> Option<EntitySpan> {
        self.spans.get(&express_id).copied()
    }

    #[inline]
    pub fn contains(&self, express_id: u32) -> bool {
        self.spans.contains_key(&express_id)
    }

    /// Number of distinct indexed ids.
    #[inline]
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Total records seen by the scan, duplicates included. Comparing this
    /// against `len()` exposes id collisions in the source file.
    #[inline]
    pub fn scanned_count(&self) -> usize {
        self.scanned
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, EntitySpan)> + '_ {
        self.spans.iter().map(|(&id, &span)| (id, span))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::StepTokenizer;

    #[test]
    fn test_build_index() {
        let content = "#1=IFCPROJECT($,$,$,$,$,$,$,$,#2);\n#5=IFCWALL($,$,$,$,$,$,$,$);";
        let mut builder = EntityIndexBuilder::new();
        for entity in StepTokenizer::new(content) {
            builder.add(&entity);
        }
        let index = builder.build();
        assert_eq!(index.len(), 2);
        assert!(index.contains(1));
        assert!(index.contains(5));
        assert!(!index.contains(2));

        let span = index.get(5).unwrap();
        assert!(content[span.range()].starts_with("#5=IFCWALL"));
    }

    #[test]
    fn test_duplicate_id_last_write_wins() {
        let content = "#7=IFCWALL('first',$,$,$,$,$,$,$);\n#7=IFCDOOR('second',$,$,$,$,$,$,$);";
        let mut builder = EntityIndexBuilder::new();
        for entity in StepTokenizer::new(content) {
            builder.add(&entity);
        }
        let index = builder.build();
        assert_eq!(index.len(), 1);
        assert_eq!(index.scanned_count(), 2);
        let span = index.get(7).unwrap();
        assert!(content[span.range()].contains("IFCDOOR"));
    }
}
