use std::collections::BTreeMap;

use serde::Serialize;

use crate::geometry::Point;
use crate::ir::ObjectKind;

/// Objects stacked at one branch position. `objects[0]` is the primary node;
/// the rest are constants attached beneath it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub objects: Vec<String>,
}

impl Column {
    pub fn new(primary: &str) -> Self {
        Self {
            objects: vec![primary.to_string()],
        }
    }

    pub fn primary(&self) -> &str {
        &self.objects[0]
    }
}

/// One root-to-leaf path through a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChildBranch {
    pub columns: Vec<Column>,
}

impl ChildBranch {
    pub fn primaries(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(Column::primary)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Branch {
    pub root: String,
    pub child_branches: Vec<ChildBranch>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MappingConstant {
    pub id: String,
    /// y of the output endpoint the constant feeds (the highest one if several).
    pub target_y: f32,
    /// Placed object sharing that output target; the constant is stacked in its column.
    pub consumer: Option<String>,
}

/// Result of connectivity analysis for one area.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Connectivity {
    pub branches: Vec<Branch>,
    /// Minimum depth (1-based) of every object reached from an entry edge.
    pub levels: BTreeMap<String, usize>,
    pub constants: Vec<MappingConstant>,
    /// Top-level objects neither reached nor feeding the output area.
    pub unreached: Vec<String>,
}

impl Connectivity {
    pub fn is_empty(&self) -> bool {
        self.branches.is_empty()
    }

    pub fn level(&self, id: &str) -> Option<usize> {
        self.levels.get(id).copied()
    }

    /// Objects that go to the free lane, in placement order.
    pub fn lane(&self) -> impl Iterator<Item = &str> {
        self.constants
            .iter()
            .filter(|constant| constant.consumer.is_none())
            .map(|constant| constant.id.as_str())
            .chain(self.unreached.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectMove {
    pub id: String,
    pub kind: ObjectKind,
    pub from: Point,
    pub to: Point,
}

/// A computed arrangement, not yet written to the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AutoLayout {
    pub connectivity: Connectivity,
    /// Every object (members included) whose position changes.
    pub moves: Vec<ObjectMove>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LayoutReport {
    pub branches: usize,
    pub attached_constants: usize,
    pub lane_objects: usize,
    pub moved: usize,
}
