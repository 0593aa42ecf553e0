// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP record tokenizer.
//!
//! Single forward scan over the raw byte buffer producing one [`EntityRef`]
//! per syntactically valid `#N = TYPE(...)` record. Uses [memchr](https://docs.rs/memchr)
//! for SIMD-accelerated `#` search. Malformed spans are skipped silently:
//! any failed step abandons the candidate and resumes one byte after the
//! `#`, so the tokenizer always makes forward progress and never errors.

use memchr::memchr;

/// Reference to one entity record found during the scan.
///
/// Owned by the scan pass only: the index builder and extractor consume it
/// immediately, nothing retains it past the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRef<'a> {
    /// Express id (`#N`).
    pub express_id: u32,
    /// Type name as written in the file (e.g. `IFCWALL`).
    pub type_name: &'a str,
    /// Offset of the `#` in the buffer.
    pub byte_offset: u32,
    /// Length from `#` through the matching `)` inclusive.
    pub byte_len: u32,
    /// 1-based line number of the record start, for diagnostics.
    pub line: u32,
}

/// Restartable cursor over the records of a STEP buffer.
pub struct StepTokenizer<'a> {
    content: &'a [u8],
    pos: usize,
    /// Bytes already counted into `line`.
    line_pos: usize,
    line: u32,
}

impl<'a> StepTokenizer<'a> {
    pub fn new(content: &'a str) -> Self {
        Self {
            content: content.as_bytes(),
            pos: 0,
            line_pos: 0,
            line: 1,
        }
    }

    /// Rescan from offset 0.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.line_pos = 0;
        self.line = 1;
    }

    /// Line number at `offset`, counting newlines lazily up to it.
    fn line_at(&mut self, offset: usize) -> u32 {
        while self.line_pos < offset {
            if self.content[self.line_pos] == b'\n' {
                self.line += 1;
            }
            self.line_pos += 1;
        }
        self.line
    }

    /// Scan forward to the next valid record.
    pub fn next_entity(&mut self) -> Option<EntityRef<'a>> {
        let bytes = self.content;
        let len = bytes.len();

        while self.pos < len {
            let hash = self.pos + memchr(b'#', &bytes[self.pos..])?;
            let line = self.line_at(hash);
            // Whatever happens, the next candidate starts after this '#'.
            self.pos = hash + 1;

            let mut i = hash + 1;

            // Unsigned decimal express id, at least one digit.
            let id_start = i;
            let mut id: u32 = 0;
            while i < len && bytes[i].is_ascii_digit() {
                id = id.wrapping_mul(10).wrapping_add((bytes[i] - b'0') as u32);
                i += 1;
            }
            if i == id_start {
                continue;
            }

            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= len || bytes[i] != b'=' {
                continue;
            }
            i += 1;
            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }

            // Type name: uppercase letter, then letters/digits/underscore.
            let type_start = i;
            if i >= len || !bytes[i].is_ascii_uppercase() {
                continue;
            }
            i += 1;
            while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let type_end = i;

            while i < len && bytes[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= len || bytes[i] != b'(' {
                continue;
            }

            let close = match find_matching_paren(bytes, i) {
                Some(c) => c,
                None => continue,
            };

            // The type name was accepted byte-by-byte as ASCII above.
            let type_name = match std::str::from_utf8(&bytes[type_start..type_end]) {
                Ok(name) => name,
                Err(_) => continue,
            };
            self.pos = close + 1;

            return Some(EntityRef {
                express_id: id,
                type_name,
                byte_offset: hash as u32,
                byte_len: (close - hash + 1) as u32,
                line,
            });
        }

        None
    }
}

impl<'a> StepTokenizer<'a> {
    /// Count records per type name, consuming the rest of the scan.
    pub fn count_by_type(&mut self) -> rustc_hash::FxHashMap<String, usize> {
        let mut counts = rustc_hash::FxHashMap::default();
        while let Some(entity) = self.next_entity() {
            *counts.entry(entity.type_name.to_string()).or_insert(0) += 1;
        }
        counts
    }

    /// Collect all records of one type, consuming the rest of the scan.
    pub fn find_by_type(&mut self, target_type: &str) -> Vec<EntityRef<'a>> {
        let mut results = Vec::new();
        while let Some(entity) = self.next_entity() {
            if entity.type_name.eq_ignore_ascii_case(target_type) {
                results.push(entity);
            }
        }
        results
    }
}

impl<'a> Iterator for StepTokenizer<'a> {
    type Item = EntityRef<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entity()
    }
}

/// Find the `)` matching the `(` at `open`, tracking nesting depth and
/// honoring single-quoted string literals with backslash escapes so
/// parentheses inside strings do not affect depth. Returns `None` when the
/// record is truncated before the depth returns to zero.
fn find_matching_paren(bytes: &[u8], open: usize) -> Option<usize> {
    debug_assert_eq!(bytes[open], b'(');
    let len = bytes.len();
    let mut depth = 0usize;
    let mut in_string = false;
    let mut i = open;

    while i < len {
        let b = bytes[i];
        if in_string {
            match b {
                b'\\' => i += 1, // skip the escaped byte
                b'\'' => in_string = false,
                _ => {}
            }
        } else {
            match b {
                b'\'' => in_string = true,
                b'(' => depth += 1,
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        i += 1;
    }

    None
}
