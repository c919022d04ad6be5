use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Which world buffer an entity lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Building,
    Prop,
    Decal,
    Tree,
    Node,
    Segment,
}

impl EntityKind {
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Building,
        EntityKind::Prop,
        EntityKind::Decal,
        EntityKind::Tree,
        EntityKind::Node,
        EntityKind::Segment,
    ];
}

/// Reference to one entity in the world buffers: a kind plus an index into
/// that kind's buffer. Index 0 is reserved as "empty" for every kind and
/// never refers to a live entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId {
    pub kind: EntityKind,
    pub index: u32,
}

impl EntityId {
    pub fn new(kind: EntityKind, index: u32) -> Self {
        Self { kind, index }
    }

    pub fn none(kind: EntityKind) -> Self {
        Self { kind, index: 0 }
    }

    pub fn is_none(&self) -> bool {
        self.index == 0
    }

    pub fn building(index: u32) -> Self {
        Self::new(EntityKind::Building, index)
    }

    pub fn prop(index: u32) -> Self {
        Self::new(EntityKind::Prop, index)
    }

    pub fn decal(index: u32) -> Self {
        Self::new(EntityKind::Decal, index)
    }

    pub fn tree(index: u32) -> Self {
        Self::new(EntityKind::Tree, index)
    }

    pub fn node(index: u32) -> Self {
        Self::new(EntityKind::Node, index)
    }

    pub fn segment(index: u32) -> Self {
        Self::new(EntityKind::Segment, index)
    }
}

/// Immutable capture of one entity's state at the moment it became subject
/// to a pending operation. Actions apply their delta to this baseline on
/// every recompute and restore it verbatim on undo; the capture itself is
/// never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityState {
    pub id: EntityId,
    pub position: Vec3,
    pub angle: f32,
    pub extra: StateExtra,
}

impl EntityState {
    pub fn new(id: EntityId, position: Vec3, angle: f32, extra: StateExtra) -> Self {
        Self {
            id,
            position,
            angle,
            extra,
        }
    }
}

/// Kind-specific snapshot payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateExtra {
    None,
    /// Footprint in grid cells plus the building's attached sub-network
    /// nodes, captured with their positions so they move rigidly with the
    /// building and can be recreated on undo.
    Building {
        length: u32,
        width: u32,
        sub_nodes: Vec<(u32, Vec3)>,
    },
    /// A segment is defined by its endpoint nodes; the captured endpoint
    /// positions and tangent directions let a transform move both ends and
    /// let undo restore the exact curve.
    Segment {
        start_node: u32,
        end_node: u32,
        start_pos: Vec3,
        end_pos: Vec3,
        start_dir: Vec3,
        end_dir: Vec3,
    },
    /// Network parameters a node needs back when it is recreated on undo.
    Node {
        half_width: f32,
        min_node_distance: f32,
        middle: bool,
    },
    /// Visual variation seed; carried so clones and re-imports look the
    /// same as the original.
    Tree { scale: f32, brightness: f32 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_equality_is_kind_and_index() {
        assert_eq!(EntityId::node(3), EntityId::node(3));
        assert_ne!(EntityId::node(3), EntityId::segment(3));
        assert_ne!(EntityId::node(3), EntityId::node(4));
    }

    #[test]
    fn index_zero_is_empty() {
        assert!(EntityId::none(EntityKind::Tree).is_none());
        assert!(!EntityId::tree(1).is_none());
    }
}
