// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Deduplicated string interning table.
//!
//! Every columnar table stores string attributes as `u32` indices into one
//! shared `StringTable`. Index 0 is the empty string, index 1 the sentinel
//! for null/absent values ($ in STEP), so an absent name never collides
//! with a genuinely empty one.

use rustc_hash::FxHashMap;

/// Reserved index for the empty string.
pub const EMPTY_IDX: u32 = 0;

/// Reserved index for null/absent values.
pub const NULL_IDX: u32 = 1;

/// Ordered, deduplicated string store.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    values: Vec<String>,
    index: FxHashMap<String, u32>,
}

impl StringTable {
    /// Create a table with the two reserved entries in place.
    pub fn new() -> Self {
        let mut table = Self {
            values: Vec::new(),
            index: FxHashMap::default(),
        };
        // Slot 0: empty string. Slot 1: null sentinel (never matched by
        // content, looked up only through NULL_IDX).
        table.values.push(String::new());
        table.index.insert(String::new(), EMPTY_IDX);
        table.values.push("\0<null>".to_string());
        table
    }

    /// Intern a string, returning the existing index or appending a new one.
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.index.get(value) {
            return idx;
        }
        let idx = self.values.len() as u32;
        self.values.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }

    /// Intern an optional string; `None` maps to the null sentinel.
    pub fn intern_opt(&mut self, value: Option<&str>) -> u32 {
        match value {
            Some(v) => self.intern(v),
            None => NULL_IDX,
        }
    }

    /// O(1) lookup by index.
    #[inline]
    pub fn get(&self, idx: u32) -> &str {
        &self.values[idx as usize]
    }

    /// Lookup as an option: the null sentinel reads back as `None`.
    #[inline]
    pub fn get_opt(&self, idx: u32) -> Option<&str> {
        if idx == NULL_IDX {
            None
        } else {
            Some(self.get(idx))
        }
    }

    /// Find the index of an already-interned string without inserting.
    #[inline]
    pub fn lookup(&self, value: &str) -> Option<u32> {
        self.index.get(value).copied()
    }

    /// Number of entries, reserved slots included.
    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        // Reserved slots always exist after new().
        self.values.is_empty()
    }

    /// Iterate entries in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|s| s.as_str())
    }

    /// Rebuild a table from raw values in index order (codec path).
    /// The reverse index is re-derived, not trusted from the blob.
    pub(crate) fn from_values(values: Vec<String>) -> Self {
        let mut index = FxHashMap::with_capacity_and_hasher(values.len(), Default::default());
        for (i, v) in values.iter().enumerate() {
            if i as u32 == NULL_IDX {
                continue;
            }
            index.entry(v.clone()).or_insert(i as u32);
        }
        Self { values, index }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_idempotent() {
        let mut table = StringTable::new();
        let a = table.intern("Wall-01");
        let b = table.intern("Wall-01");
        assert_eq!(a, b);
        assert_eq!(table.get(a), "Wall-01");
    }

    #[test]
    fn test_reserved_slots() {
        let mut table = StringTable::new();
        assert_eq!(table.intern(""), EMPTY_IDX);
        assert_eq!(table.intern_opt(None), NULL_IDX);
        assert_ne!(table.intern_opt(None), EMPTY_IDX);
        assert_eq!(table.get_opt(NULL_IDX), None);
        assert_eq!(table.get_opt(EMPTY_IDX), Some(""));
    }

    #[test]
    fn test_distinct_indices_distinct_content() {
        let mut table = StringTable::new();
        let a = table.intern("FireRating");
        let b = table.intern("LoadBearing");
        assert_ne!(a, b);
        assert_eq!(table.get(a), "FireRating");
        assert_eq!(table.get(b), "LoadBearing");
    }

    #[test]
    fn test_lookup_without_insert() {
        let mut table = StringTable::new();
        assert_eq!(table.lookup("Pset_WallCommon"), None);
        let idx = table.intern("Pset_WallCommon");
        assert_eq!(table.lookup("Pset_WallCommon"), Some(idx));
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_from_values_round_trip() {
        let mut table = StringTable::new();
        table.intern("a");
        table.intern("b");
        let rebuilt = StringTable::from_values(table.values.clone());
        assert_eq!(rebuilt.lookup("a"), table.lookup("a"));
        assert_eq!(rebuilt.lookup("b"), table.lookup("b"));
        assert_eq!(rebuilt.len(), table.len());
    }
}
