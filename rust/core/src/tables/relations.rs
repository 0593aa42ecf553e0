// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Directed relationship graph.
//!
//! Edges run from the relating side to the related side: a containment
//! edge points storey → element, an aggregation edge parent → child, a
//! typing edge type-object → instance. Forward and reverse adjacency are
//! both indexed at build time.

use rustc_hash::FxHashMap;

/// Relationship kind, one per resolved IFC relationship family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RelKind {
    /// IfcRelContainedInSpatialStructure: structure → element
    ContainedInStructure = 0,
    /// IfcRelAggregates: whole → part
    Aggregates = 1,
    /// IfcRelDefinesByType: type object → instance
    DefinesByType = 2,
    /// IfcRelVoidsElement: element → opening
    Voids = 3,
    /// IfcRelFillsElement: opening → filler
    Fills = 4,
}

impl RelKind {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(RelKind::ContainedInStructure),
            1 => Some(RelKind::Aggregates),
            2 => Some(RelKind::DefinesByType),
            3 => Some(RelKind::Voids),
            4 => Some(RelKind::Fills),
            _ => None,
        }
    }
}

/// One directed edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RelEdge {
    pub kind: RelKind,
    pub source: u32,
    pub target: u32,
}

#[derive(Debug, Default)]
pub struct RelationshipGraphBuilder {
    edges: Vec<RelEdge>,
}

impl RelationshipGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: RelKind, source: u32, target: u32) {
        self.edges.push(RelEdge {
            kind,
            source,
            target,
        });
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn build(self) -> RelationshipGraph {
        RelationshipGraph::from_edges(self.edges)
    }
}

/// Immutable edge store with forward and reverse adjacency.
#[derive(Debug, Clone, Default)]
pub struct RelationshipGraph {
    kinds: Vec<u8>,
    sources: Vec<u32>,
    targets: Vec<u32>,
    forward: FxHashMap<(u8, u32), Vec<u32>>,
    reverse: FxHashMap<(u8, u32), Vec<u32>>,
}

impl RelationshipGraph {
    pub(crate) fn from_edges(edges: Vec<RelEdge>) -> Self {
        let n = edges.len();
        let mut kinds = Vec::with_capacity(n);
        let mut sources = Vec::with_capacity(n);
        let mut targets = Vec::with_capacity(n);
        let mut forward: FxHashMap<(u8, u32), Vec<u32>> = FxHashMap::default();
        let mut reverse: FxHashMap<(u8, u32), Vec<u32>> = FxHashMap::default();

        for edge in edges {
            let k = edge.kind as u8;
            kinds.push(k);
            sources.push(edge.source);
            targets.push(edge.target);
            forward.entry((k, edge.source)).or_default().push(edge.target);
            reverse.entry((k, edge.target)).or_default().push(edge.source);
        }

        Self {
            kinds,
            sources,
            targets,
            forward,
            reverse,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Targets related from `source` by `kind` (forward adjacency).
    pub fn related(&self, source: u32, kind: RelKind) -> &[u32] {
        self.forward
            .get(&(kind as u8, source))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Sources relating `target` by `kind` (reverse adjacency).
    pub fn relating(&self, target: u32, kind: RelKind) -> &[u32] {
        self.reverse
            .get(&(kind as u8, target))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Iterate all edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = RelEdge> + '_ {
        (0..self.kinds.len()).map(move |i| RelEdge {
            kind: RelKind::from_u8(self.kinds[i]).unwrap_or(RelKind::Aggregates),
            source: self.sources[i],
            target: self.targets[i],
        })
    }

    pub(crate) fn columns(&self) -> (&[u8], &[u32], &[u32]) {
        (&self.kinds, &self.sources, &self.targets)
    }
}
