//! The world the tool edits, seen through a narrow query/mutation interface.
//!
//! The real backing store (fixed-size entity buffers plus a spatial grid
//! index) belongs to the host simulation; this crate only consumes the
//! queries below and the few mutation entry points the action layer
//! invokes. The [`arena::ArenaWorld`] implementation mirrors the host's
//! arena+sentinel storage shape and backs the test suite.

pub mod arena;
mod entity;

pub use arena::ArenaWorld;
pub use entity::{EntityId, EntityKind, EntityState, StateExtra};

use glam::Vec3;
use thiserror::Error;

use crate::util::geom::{Quad, Ray};

/// A node connects at most this many segments.
pub const MAX_NODE_SEGMENTS: usize = 8;

/// How many nearby segments a proximity query returns at most.
pub const CLOSE_SEGMENT_COUNT: usize = 16;

/// Read-only view of a network node.
#[derive(Debug, Clone, Copy)]
pub struct NodeData {
    pub position: Vec3,
    /// Half the road width; narrow roads shift the zoning grid half a cell.
    pub half_width: f32,
    /// Spacing rule of the node's network type; snap thresholds derive
    /// from it.
    pub min_node_distance: f32,
    /// True for shape nodes in the middle of a smooth run (curves blend
    /// through them instead of cornering).
    pub middle: bool,
    /// Incident segment indices, 0 = empty slot.
    pub segments: [u32; MAX_NODE_SEGMENTS],
}

/// Read-only view of a network segment.
#[derive(Debug, Clone, Copy)]
pub struct SegmentData {
    pub start_node: u32,
    pub end_node: u32,
    /// Tangent leaving the start node, normalized in the ground plane.
    pub start_dir: Vec3,
    /// Tangent leaving the end node (pointing back along the segment).
    pub end_dir: Vec3,
    pub min_node_distance: f32,
    /// Zoning blocks owned by this segment, 0 = empty slot.
    pub blocks: [u32; 4],
}

/// Read-only view of a zoning block: the local frame its 8-unit cell grid
/// is aligned to.
#[derive(Debug, Clone, Copy)]
pub struct BlockData {
    pub position: Vec3,
    pub angle: f32,
}

/// Which entity kinds a spatial query should report.
#[derive(Debug, Clone, Copy)]
pub struct KindFilter {
    pub buildings: bool,
    pub props: bool,
    pub decals: bool,
    pub trees: bool,
    pub nodes: bool,
    pub segments: bool,
}

impl KindFilter {
    pub const ALL: KindFilter = KindFilter {
        buildings: true,
        props: true,
        decals: true,
        trees: true,
        nodes: true,
        segments: true,
    };

    pub fn accepts(&self, kind: EntityKind) -> bool {
        match kind {
            EntityKind::Building => self.buildings,
            EntityKind::Prop => self.props,
            EntityKind::Decal => self.decals,
            EntityKind::Tree => self.trees,
            EntityKind::Node => self.nodes,
            EntityKind::Segment => self.segments,
        }
    }
}

impl Default for KindFilter {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("no such entity: {0:?}")]
    Missing(EntityId),
    #[error("mutation rejected: {0}")]
    Rejected(String),
}

/// Query and mutation surface of the host world.
///
/// Queries never change observable state. The three mutation entry points
/// are invoked only from action apply/undo paths, inside the session's
/// critical section.
pub trait World {
    /// Capture a snapshot of one entity, or None if the handle is dead.
    fn entity_state(&self, id: EntityId) -> Option<EntityState>;

    fn node(&self, index: u32) -> Option<NodeData>;

    fn segment(&self, index: u32) -> Option<SegmentData>;

    fn block(&self, index: u32) -> Option<BlockData>;

    fn terrain_height(&self, x: f32, z: f32) -> f32;

    /// Append up to [`CLOSE_SEGMENT_COUNT`] segment indices near `position`
    /// to `out`, closest first.
    fn nearest_segments(&self, position: Vec3, out: &mut Vec<u32>);

    /// Closest point on a segment's centerline to `position`, with the
    /// curve tangent there.
    fn closest_on_segment(&self, segment: u32, position: Vec3) -> Option<(Vec3, Vec3)>;

    /// Nearest entity hit by a pick ray, with the hit distance.
    fn ray_intersect(&self, ray: &Ray, filter: &KindFilter) -> Option<(EntityId, f32)>;

    /// All entities whose reference point lies inside a ground-plane quad.
    fn entities_in_quad(&self, quad: &Quad, filter: &KindFilter) -> Vec<EntityId>;

    /// True when `name` resolves against the world's asset catalog; imports
    /// skip states whose asset is unknown.
    fn knows_asset(&self, name: &str) -> bool;

    /// Move an entity to a new position/orientation. Dependent geometry
    /// (segment tangents, attached props) is the implementation's job.
    fn set_transform(&mut self, id: EntityId, position: Vec3, angle: f32)
    -> Result<(), WorldError>;

    /// Reshape a segment's curve by replacing its endpoint tangents; used
    /// to commit an auto-curve guide onto the moved node's connections.
    fn set_segment_geometry(
        &mut self,
        segment: u32,
        start_dir: Vec3,
        end_dir: Vec3,
    ) -> Result<(), WorldError>;

    /// Materialize an entity from a snapshot. The snapshot's own index is
    /// reused when that slot is free (making remove/recreate cycles handle
    /// stable); otherwise the lowest free index is allocated.
    fn create(&mut self, state: &EntityState) -> Result<EntityId, WorldError>;

    fn remove(&mut self, id: EntityId) -> Result<(), WorldError>;
}
