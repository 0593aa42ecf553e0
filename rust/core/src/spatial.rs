// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial hierarchy: project → site → building → storey → space.
//!
//! Built from aggregation and containment edges after relationship
//! extraction. Optional in the store: a file without an IfcProject yields
//! no hierarchy, which is a recorded gap rather than an error.

use crate::decoder::DecodedEntity;
use crate::extractors::EntityMap;
use crate::schema;
use crate::strings::{StringTable, NULL_IDX};
use crate::tables::{RelKind, RelationshipGraph};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;

/// One spatial structure node.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialNode {
    pub entity_id: u32,
    /// 0 for the project root.
    pub parent_id: u32,
    /// Depth below the root, 0 for the root.
    pub level: u16,
    /// Name string index (`NULL_IDX` when unnamed).
    pub name: u32,
    /// Canonical type display name string index.
    pub type_name: u32,
    /// Storey elevation, where declared.
    pub elevation: Option<f64>,
    /// Child spatial nodes (aggregation).
    pub children: Vec<u32>,
    /// Contained elements (containment).
    pub elements: Vec<u32>,
}

/// Immutable spatial hierarchy with id lookup.
#[derive(Debug, Clone)]
pub struct SpatialHierarchy {
    nodes: Vec<SpatialNode>,
    by_id: FxHashMap<u32, u32>,
    project_id: u32,
    strings: Arc<StringTable>,
}

impl SpatialHierarchy {
    pub(crate) fn from_parts(
        nodes: Vec<SpatialNode>,
        project_id: u32,
        strings: Arc<StringTable>,
    ) -> Self {
        let mut by_id = FxHashMap::with_capacity_and_hasher(nodes.len(), Default::default());
        for (i, node) in nodes.iter().enumerate() {
            by_id.insert(node.entity_id, i as u32);
        }
        Self {
            nodes,
            by_id,
            project_id,
            strings,
        }
    }

    pub fn project_id(&self) -> u32 {
        self.project_id
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[SpatialNode] {
        &self.nodes
    }

    pub fn node(&self, entity_id: u32) -> Option<&SpatialNode> {
        self.by_id.get(&entity_id).map(|&i| &self.nodes[i as usize])
    }

    pub fn name_of(&self, node: &SpatialNode) -> Option<&str> {
        self.strings.get_opt(node.name)
    }

    pub fn type_of(&self, node: &SpatialNode) -> &str {
        self.strings.get(node.type_name)
    }

    /// Slash-separated path from the root, e.g. `Project/Site/Building/EG`.
    pub fn path(&self, entity_id: u32) -> Option<String> {
        let mut segments: Vec<&str> = Vec::new();
        let mut current = self.node(entity_id)?;
        let mut guard = 0;
        loop {
            segments.push(self.name_of(current).unwrap_or(self.type_of(current)));
            if current.parent_id == 0 {
                break;
            }
            current = match self.node(current.parent_id) {
                Some(parent) => parent,
                None => break,
            };
            guard += 1;
            if guard > self.nodes.len() {
                break;
            }
        }
        segments.reverse();
        Some(segments.join("/"))
    }

    /// Storey entity ids ordered by elevation (unknowns last).
    pub fn storeys(&self) -> Vec<u32> {
        let mut storeys: Vec<&SpatialNode> = self
            .nodes
            .iter()
            .filter(|n| self.type_of(n).eq_ignore_ascii_case("IfcBuildingStorey"))
            .collect();
        storeys.sort_by(|a, b| {
            let ae = a.elevation.unwrap_or(f64::MAX);
            let be = b.elevation.unwrap_or(f64::MAX);
            ae.partial_cmp(&be).unwrap_or(std::cmp::Ordering::Equal)
        });
        storeys.iter().map(|n| n.entity_id).collect()
    }
}

/// Storey elevation from the decoded record, via the schema position.
fn storey_elevation(entity: &DecodedEntity) -> Option<f64> {
    if !entity.type_name.eq_ignore_ascii_case("IFCBUILDINGSTOREY") {
        return None;
    }
    let pos = schema::attribute_position("IfcBuildingStorey", "Elevation")?;
    entity.get_float(pos)
}

/// Build the node list by walking aggregation edges down from the project.
/// Returns `None` when the file declares no IfcProject.
pub(crate) fn build_spatial_nodes(
    entities: &EntityMap,
    graph: &RelationshipGraph,
    strings: &mut StringTable,
) -> Option<(Vec<SpatialNode>, u32)> {
    let project = entities
        .values()
        .find(|e| e.type_name.eq_ignore_ascii_case("IFCPROJECT"))?;

    let mut nodes: Vec<SpatialNode> = Vec::new();
    let mut visited: FxHashSet<u32> = FxHashSet::default();
    let mut stack: Vec<(u32, u32, u16)> = vec![(project.id, 0, 0)];

    while let Some((id, parent_id, level)) = stack.pop() {
        if !visited.insert(id) {
            continue;
        }
        let Some(entity) = entities.get(&id) else {
            continue;
        };

        let name_pos = schema::attribute_position(&entity.type_name, "Name").unwrap_or(2);
        let display = schema::display_name(&entity.type_name)
            .map(str::to_string)
            .unwrap_or_else(|| entity.type_name.clone());

        nodes.push(SpatialNode {
            entity_id: id,
            parent_id,
            level,
            name: entity
                .get_string(name_pos)
                .map(|n| strings.intern(n))
                .unwrap_or(NULL_IDX),
            type_name: strings.intern(&display),
            elevation: storey_elevation(entity),
            children: Vec::new(),
            elements: Vec::new(),
        });

        for &child in graph.related(id, RelKind::Aggregates) {
            let is_spatial = entities
                .get(&child)
                .map(|e| schema::is_spatial(&e.type_name))
                .unwrap_or(false);
            if is_spatial {
                stack.push((child, id, level + 1));
            }
        }
    }

    relink(&mut nodes, graph);
    Some((nodes, project.id))
}

/// Fill the derived child/element lists from the relationship graph.
/// Also used by the codec: these links are rebuilt on read, not persisted.
pub(crate) fn relink(nodes: &mut [SpatialNode], graph: &RelationshipGraph) {
    let present: FxHashSet<u32> = nodes.iter().map(|n| n.entity_id).collect();
    for node in nodes.iter_mut() {
        node.children = graph
            .related(node.entity_id, RelKind::Aggregates)
            .iter()
            .copied()
            .filter(|child| present.contains(child))
            .collect();
        node.elements = graph
            .related(node.entity_id, RelKind::ContainedInStructure)
            .to_vec();
    }
}
