//! In-memory reference world: one arena per entity kind, index 0 reserved
//! as the empty sentinel, the storage shape the host simulation uses for
//! its own buffers. Queries are straightforward scans; the host's real
//! store answers them from its spatial grid instead.

use std::collections::HashSet;

use glam::Vec3;

use super::{
    BlockData, CLOSE_SEGMENT_COUNT, EntityId, EntityKind, EntityState, KindFilter,
    MAX_NODE_SEGMENTS, NodeData, SegmentData, StateExtra, World, WorldError,
};
use crate::util::geom::{self, Bezier, Quad, Ray};

pub const DEFAULT_MIN_NODE_DISTANCE: f32 = 16.0;
pub const DEFAULT_HALF_WIDTH: f32 = 6.0;

/// Slot arena with index 0 permanently empty.
#[derive(Debug, Clone)]
struct Slots<T> {
    items: Vec<Option<T>>,
}

impl<T> Slots<T> {
    fn new() -> Self {
        Self { items: vec![None] }
    }

    fn get(&self, index: u32) -> Option<&T> {
        if index == 0 {
            return None;
        }
        self.items.get(index as usize).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, index: u32) -> Option<&mut T> {
        if index == 0 {
            return None;
        }
        self.items.get_mut(index as usize).and_then(Option::as_mut)
    }

    /// Store `value` in the lowest free slot (never slot 0).
    fn alloc(&mut self, value: T) -> u32 {
        for (i, slot) in self.items.iter_mut().enumerate().skip(1) {
            if slot.is_none() {
                *slot = Some(value);
                return i as u32;
            }
        }
        self.items.push(Some(value));
        (self.items.len() - 1) as u32
    }

    /// Store `value` at `index` if that slot is free, else fall back to the
    /// lowest free slot.
    fn alloc_at(&mut self, index: u32, value: T) -> u32 {
        if index != 0 {
            while self.items.len() <= index as usize {
                self.items.push(None);
            }
            if self.items[index as usize].is_none() {
                self.items[index as usize] = Some(value);
                return index;
            }
        }
        self.alloc(value)
    }

    fn free(&mut self, index: u32) -> Option<T> {
        if index == 0 {
            return None;
        }
        self.items.get_mut(index as usize).and_then(Option::take)
    }

    fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.items
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|v| (i as u32, v)))
    }
}

#[derive(Debug, Clone)]
struct Building {
    position: Vec3,
    angle: f32,
    length: u32,
    width: u32,
    sub_nodes: Vec<u32>,
}

#[derive(Debug, Clone)]
struct Placed {
    position: Vec3,
    angle: f32,
}

#[derive(Debug, Clone)]
struct Tree {
    position: Vec3,
    scale: f32,
    brightness: f32,
}

#[derive(Debug, Clone)]
struct Node {
    position: Vec3,
    half_width: f32,
    min_node_distance: f32,
    middle: bool,
    segments: [u32; MAX_NODE_SEGMENTS],
}

#[derive(Debug, Clone)]
struct Segment {
    start_node: u32,
    end_node: u32,
    start_dir: Vec3,
    end_dir: Vec3,
    min_node_distance: f32,
    blocks: [u32; 4],
    curved: bool,
}

#[derive(Debug, Clone)]
struct Block {
    position: Vec3,
    angle: f32,
}

pub struct ArenaWorld {
    buildings: Slots<Building>,
    props: Slots<Placed>,
    decals: Slots<Placed>,
    trees: Slots<Tree>,
    nodes: Slots<Node>,
    segments: Slots<Segment>,
    blocks: Slots<Block>,
    assets: HashSet<String>,
    terrain: fn(f32, f32) -> f32,
}

fn flat_terrain(_x: f32, _z: f32) -> f32 {
    0.0
}

impl Default for ArenaWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaWorld {
    pub fn new() -> Self {
        Self {
            buildings: Slots::new(),
            props: Slots::new(),
            decals: Slots::new(),
            trees: Slots::new(),
            nodes: Slots::new(),
            segments: Slots::new(),
            blocks: Slots::new(),
            assets: HashSet::new(),
            terrain: flat_terrain,
        }
    }

    pub fn set_terrain(&mut self, terrain: fn(f32, f32) -> f32) {
        self.terrain = terrain;
    }

    pub fn register_asset(&mut self, name: impl Into<String>) {
        self.assets.insert(name.into());
    }

    pub fn add_building(&mut self, position: Vec3, angle: f32, length: u32, width: u32) -> u32 {
        self.buildings.alloc(Building {
            position,
            angle,
            length,
            width,
            sub_nodes: Vec::new(),
        })
    }

    /// Attach a node to a building's sub-network so it travels with it.
    pub fn attach_node(&mut self, building: u32, node: u32) {
        if let Some(b) = self.buildings.get_mut(building)
            && !b.sub_nodes.contains(&node)
        {
            b.sub_nodes.push(node);
        }
    }

    pub fn add_prop(&mut self, position: Vec3, angle: f32) -> u32 {
        self.props.alloc(Placed { position, angle })
    }

    pub fn add_decal(&mut self, position: Vec3, angle: f32) -> u32 {
        self.decals.alloc(Placed { position, angle })
    }

    pub fn add_tree(&mut self, position: Vec3, scale: f32, brightness: f32) -> u32 {
        self.trees.alloc(Tree {
            position,
            scale,
            brightness,
        })
    }

    pub fn add_node(&mut self, position: Vec3) -> u32 {
        self.nodes.alloc(Node {
            position,
            half_width: DEFAULT_HALF_WIDTH,
            min_node_distance: DEFAULT_MIN_NODE_DISTANCE,
            middle: false,
            segments: [0; MAX_NODE_SEGMENTS],
        })
    }

    pub fn set_node_params(&mut self, node: u32, half_width: f32, min_node_distance: f32) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.half_width = half_width;
            n.min_node_distance = min_node_distance;
        }
    }

    pub fn set_node_middle(&mut self, node: u32, middle: bool) {
        if let Some(n) = self.nodes.get_mut(node) {
            n.middle = middle;
        }
    }

    /// Straight segment between two existing nodes.
    pub fn add_segment(&mut self, start: u32, end: u32) -> u32 {
        let dir = self.chord_dir(start, end);
        self.insert_segment(start, end, dir, -dir, false)
    }

    /// Curved segment with explicit endpoint tangents.
    pub fn add_curved_segment(
        &mut self,
        start: u32,
        end: u32,
        start_dir: Vec3,
        end_dir: Vec3,
    ) -> u32 {
        self.insert_segment(
            start,
            end,
            start_dir.normalize_or_zero(),
            end_dir.normalize_or_zero(),
            true,
        )
    }

    pub fn add_block(&mut self, position: Vec3, angle: f32) -> u32 {
        self.blocks.alloc(Block { position, angle })
    }

    /// Hand a zoning block to a segment (first free of its four slots).
    pub fn attach_block(&mut self, segment: u32, block: u32) {
        if let Some(seg) = self.segments.get_mut(segment)
            && let Some(slot) = seg.blocks.iter_mut().find(|s| **s == 0)
        {
            *slot = block;
        }
    }

    fn chord_dir(&self, start: u32, end: u32) -> Vec3 {
        match (self.nodes.get(start), self.nodes.get(end)) {
            (Some(a), Some(b)) => (b.position - a.position).normalize_or_zero(),
            _ => Vec3::ZERO,
        }
    }

    fn insert_segment(
        &mut self,
        start: u32,
        end: u32,
        start_dir: Vec3,
        end_dir: Vec3,
        curved: bool,
    ) -> u32 {
        let index = self.segments.alloc(Segment {
            start_node: start,
            end_node: end,
            start_dir,
            end_dir,
            min_node_distance: DEFAULT_MIN_NODE_DISTANCE,
            blocks: [0; 4],
            curved,
        });
        self.register_segment(index, start);
        self.register_segment(index, end);
        index
    }

    fn register_segment(&mut self, segment: u32, node: u32) {
        if let Some(n) = self.nodes.get_mut(node)
            && let Some(slot) = n.segments.iter_mut().find(|s| **s == 0)
        {
            *slot = segment;
        }
    }

    fn unregister_segment(&mut self, segment: u32, node: u32) {
        if let Some(n) = self.nodes.get_mut(node) {
            for slot in n.segments.iter_mut() {
                if *slot == segment {
                    *slot = 0;
                }
            }
        }
    }

    fn segment_curve(&self, seg: &Segment) -> Option<Bezier> {
        let start = self.nodes.get(seg.start_node)?;
        let end = self.nodes.get(seg.end_node)?;
        Some(Bezier::from_directions(
            start.position,
            seg.start_dir,
            end.position,
            seg.end_dir,
            start.middle,
            end.middle,
        ))
    }

    fn segment_midpoint(&self, seg: &Segment) -> Option<Vec3> {
        let start = self.nodes.get(seg.start_node)?;
        let end = self.nodes.get(seg.end_node)?;
        Some((start.position + end.position) * 0.5)
    }

    /// Straight segments keep their tangents glued to the chord when an
    /// endpoint moves; curved segments keep their tangents.
    fn refresh_node_segments(&mut self, node: u32) {
        let incident: Vec<u32> = match self.nodes.get(node) {
            Some(n) => n.segments.iter().copied().filter(|s| *s != 0).collect(),
            None => return,
        };
        for index in incident {
            let Some(seg) = self.segments.get(index) else {
                continue;
            };
            if seg.curved {
                continue;
            }
            let dir = self.chord_dir(seg.start_node, seg.end_node);
            if let Some(seg) = self.segments.get_mut(index) {
                seg.start_dir = dir;
                seg.end_dir = -dir;
            }
        }
    }

    fn reference_position(&self, id: EntityId) -> Option<Vec3> {
        match id.kind {
            EntityKind::Building => self.buildings.get(id.index).map(|b| b.position),
            EntityKind::Prop => self.props.get(id.index).map(|p| p.position),
            EntityKind::Decal => self.decals.get(id.index).map(|d| d.position),
            EntityKind::Tree => self.trees.get(id.index).map(|t| t.position),
            EntityKind::Node => self.nodes.get(id.index).map(|n| n.position),
            EntityKind::Segment => self
                .segments
                .get(id.index)
                .and_then(|s| self.segment_midpoint(s)),
        }
    }

    fn pick_radius(&self, id: EntityId) -> f32 {
        match id.kind {
            EntityKind::Building => self
                .buildings
                .get(id.index)
                .map(|b| 4.0 * b.length.max(b.width) as f32)
                .unwrap_or(8.0),
            EntityKind::Prop | EntityKind::Decal => 2.0,
            EntityKind::Tree => 2.0,
            EntityKind::Node => self
                .nodes
                .get(id.index)
                .map(|n| n.half_width.max(3.0))
                .unwrap_or(3.0),
            EntityKind::Segment => 3.0,
        }
    }

    fn live_ids(&self, filter: &KindFilter) -> Vec<EntityId> {
        let mut out = Vec::new();
        if filter.buildings {
            out.extend(self.buildings.iter().map(|(i, _)| EntityId::building(i)));
        }
        if filter.props {
            out.extend(self.props.iter().map(|(i, _)| EntityId::prop(i)));
        }
        if filter.decals {
            out.extend(self.decals.iter().map(|(i, _)| EntityId::decal(i)));
        }
        if filter.trees {
            out.extend(self.trees.iter().map(|(i, _)| EntityId::tree(i)));
        }
        if filter.nodes {
            out.extend(self.nodes.iter().map(|(i, _)| EntityId::node(i)));
        }
        if filter.segments {
            out.extend(self.segments.iter().map(|(i, _)| EntityId::segment(i)));
        }
        out
    }
}

impl World for ArenaWorld {
    fn entity_state(&self, id: EntityId) -> Option<EntityState> {
        match id.kind {
            EntityKind::Building => self.buildings.get(id.index).map(|b| {
                let sub_nodes = b
                    .sub_nodes
                    .iter()
                    .filter_map(|&n| self.nodes.get(n).map(|node| (n, node.position)))
                    .collect();
                EntityState::new(
                    id,
                    b.position,
                    b.angle,
                    StateExtra::Building {
                        length: b.length,
                        width: b.width,
                        sub_nodes,
                    },
                )
            }),
            EntityKind::Prop => self
                .props
                .get(id.index)
                .map(|p| EntityState::new(id, p.position, p.angle, StateExtra::None)),
            EntityKind::Decal => self
                .decals
                .get(id.index)
                .map(|d| EntityState::new(id, d.position, d.angle, StateExtra::None)),
            EntityKind::Tree => self.trees.get(id.index).map(|t| {
                EntityState::new(
                    id,
                    t.position,
                    0.0,
                    StateExtra::Tree {
                        scale: t.scale,
                        brightness: t.brightness,
                    },
                )
            }),
            EntityKind::Node => self.nodes.get(id.index).map(|n| {
                EntityState::new(
                    id,
                    n.position,
                    0.0,
                    StateExtra::Node {
                        half_width: n.half_width,
                        min_node_distance: n.min_node_distance,
                        middle: n.middle,
                    },
                )
            }),
            EntityKind::Segment => self.segments.get(id.index).and_then(|s| {
                let start = self.nodes.get(s.start_node)?;
                let end = self.nodes.get(s.end_node)?;
                Some(EntityState::new(
                    id,
                    (start.position + end.position) * 0.5,
                    0.0,
                    StateExtra::Segment {
                        start_node: s.start_node,
                        end_node: s.end_node,
                        start_pos: start.position,
                        end_pos: end.position,
                        start_dir: s.start_dir,
                        end_dir: s.end_dir,
                    },
                ))
            }),
        }
    }

    fn node(&self, index: u32) -> Option<NodeData> {
        self.nodes.get(index).map(|n| NodeData {
            position: n.position,
            half_width: n.half_width,
            min_node_distance: n.min_node_distance,
            middle: n.middle,
            segments: n.segments,
        })
    }

    fn segment(&self, index: u32) -> Option<SegmentData> {
        self.segments.get(index).map(|s| SegmentData {
            start_node: s.start_node,
            end_node: s.end_node,
            start_dir: s.start_dir,
            end_dir: s.end_dir,
            min_node_distance: s.min_node_distance,
            blocks: s.blocks,
        })
    }

    fn block(&self, index: u32) -> Option<BlockData> {
        self.blocks.get(index).map(|b| BlockData {
            position: b.position,
            angle: b.angle,
        })
    }

    fn terrain_height(&self, x: f32, z: f32) -> f32 {
        (self.terrain)(x, z)
    }

    fn nearest_segments(&self, position: Vec3, out: &mut Vec<u32>) {
        let mut by_distance: Vec<(f32, u32)> = self
            .segments
            .iter()
            .filter_map(|(i, seg)| {
                let start = self.nodes.get(seg.start_node)?.position;
                let end = self.nodes.get(seg.end_node)?.position;
                let closest = geom::closest_on_segment_xz(start, end, position);
                Some((geom::dist_sq_xz(closest, position), i))
            })
            .collect();
        by_distance.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        out.extend(
            by_distance
                .into_iter()
                .take(CLOSE_SEGMENT_COUNT)
                .map(|(_, i)| i),
        );
    }

    fn closest_on_segment(&self, segment: u32, position: Vec3) -> Option<(Vec3, Vec3)> {
        let seg = self.segments.get(segment)?;
        if seg.curved {
            let curve = self.segment_curve(seg)?;
            Some(curve.closest_xz(position))
        } else {
            let start = self.nodes.get(seg.start_node)?.position;
            let end = self.nodes.get(seg.end_node)?.position;
            Some((
                geom::closest_on_segment_xz(start, end, position),
                seg.start_dir,
            ))
        }
    }

    fn ray_intersect(&self, ray: &Ray, filter: &KindFilter) -> Option<(EntityId, f32)> {
        let mut best: Option<(EntityId, f32)> = None;
        for id in self.live_ids(filter) {
            let Some(position) = self.reference_position(id) else {
                continue;
            };
            if let Some(t) = ray.intersect_sphere(position, self.pick_radius(id))
                && best.is_none_or(|(_, bt)| t < bt)
            {
                best = Some((id, t));
            }
        }
        best
    }

    fn entities_in_quad(&self, quad: &Quad, filter: &KindFilter) -> Vec<EntityId> {
        self.live_ids(filter)
            .into_iter()
            .filter(|id| {
                self.reference_position(*id)
                    .is_some_and(|p| quad.contains_xz(p))
            })
            .collect()
    }

    fn knows_asset(&self, name: &str) -> bool {
        self.assets.contains(name)
    }

    fn set_transform(&mut self, id: EntityId, position: Vec3, angle: f32) -> Result<(), WorldError> {
        match id.kind {
            EntityKind::Building => {
                let b = self
                    .buildings
                    .get_mut(id.index)
                    .ok_or(WorldError::Missing(id))?;
                b.position = position;
                b.angle = angle;
                Ok(())
            }
            EntityKind::Prop => {
                let p = self.props.get_mut(id.index).ok_or(WorldError::Missing(id))?;
                p.position = position;
                p.angle = angle;
                Ok(())
            }
            EntityKind::Decal => {
                let d = self
                    .decals
                    .get_mut(id.index)
                    .ok_or(WorldError::Missing(id))?;
                d.position = position;
                d.angle = angle;
                Ok(())
            }
            EntityKind::Tree => {
                let t = self.trees.get_mut(id.index).ok_or(WorldError::Missing(id))?;
                t.position = position;
                Ok(())
            }
            EntityKind::Node => {
                let n = self.nodes.get_mut(id.index).ok_or(WorldError::Missing(id))?;
                n.position = position;
                self.refresh_node_segments(id.index);
                Ok(())
            }
            EntityKind::Segment => {
                // Moving a whole segment moves both endpoint nodes by the
                // same offset; orientation comes from the nodes.
                let seg = self.segments.get(id.index).ok_or(WorldError::Missing(id))?;
                let (start, end) = (seg.start_node, seg.end_node);
                let midpoint = self
                    .segment_midpoint(seg)
                    .ok_or(WorldError::Missing(id))?;
                let offset = position - midpoint;
                for node in [start, end] {
                    if let Some(n) = self.nodes.get_mut(node) {
                        n.position += offset;
                    }
                    self.refresh_node_segments(node);
                }
                Ok(())
            }
        }
    }

    fn set_segment_geometry(
        &mut self,
        segment: u32,
        start_dir: Vec3,
        end_dir: Vec3,
    ) -> Result<(), WorldError> {
        let (start_node, end_node) = {
            let seg = self
                .segments
                .get(segment)
                .ok_or(WorldError::Missing(EntityId::segment(segment)))?;
            (seg.start_node, seg.end_node)
        };
        let chord = self.chord_dir(start_node, end_node);
        let seg = self
            .segments
            .get_mut(segment)
            .ok_or(WorldError::Missing(EntityId::segment(segment)))?;
        seg.start_dir = start_dir.normalize_or_zero();
        seg.end_dir = end_dir.normalize_or_zero();
        seg.curved = (seg.start_dir - chord).length() > 1e-3 || (seg.end_dir + chord).length() > 1e-3;
        Ok(())
    }

    fn create(&mut self, state: &EntityState) -> Result<EntityId, WorldError> {
        match (&state.id.kind, &state.extra) {
            (
                EntityKind::Building,
                StateExtra::Building {
                    length,
                    width,
                    sub_nodes,
                },
            ) => {
                let mut created_nodes = Vec::with_capacity(sub_nodes.len());
                for (old_index, position) in sub_nodes {
                    created_nodes.push(self.nodes.alloc_at(
                        *old_index,
                        Node {
                            position: *position,
                            half_width: DEFAULT_HALF_WIDTH,
                            min_node_distance: DEFAULT_MIN_NODE_DISTANCE,
                            middle: false,
                            segments: [0; MAX_NODE_SEGMENTS],
                        },
                    ));
                }
                let index = self.buildings.alloc_at(
                    state.id.index,
                    Building {
                        position: state.position,
                        angle: state.angle,
                        length: *length,
                        width: *width,
                        sub_nodes: created_nodes,
                    },
                );
                Ok(EntityId::building(index))
            }
            (EntityKind::Prop, _) => {
                let index = self.props.alloc_at(
                    state.id.index,
                    Placed {
                        position: state.position,
                        angle: state.angle,
                    },
                );
                Ok(EntityId::prop(index))
            }
            (EntityKind::Decal, _) => {
                let index = self.decals.alloc_at(
                    state.id.index,
                    Placed {
                        position: state.position,
                        angle: state.angle,
                    },
                );
                Ok(EntityId::decal(index))
            }
            (EntityKind::Tree, extra) => {
                let (scale, brightness) = match extra {
                    StateExtra::Tree { scale, brightness } => (*scale, *brightness),
                    _ => (1.0, 1.0),
                };
                let index = self.trees.alloc_at(
                    state.id.index,
                    Tree {
                        position: state.position,
                        scale,
                        brightness,
                    },
                );
                Ok(EntityId::tree(index))
            }
            (EntityKind::Node, extra) => {
                let (half_width, min_node_distance, middle) = match extra {
                    StateExtra::Node {
                        half_width,
                        min_node_distance,
                        middle,
                    } => (*half_width, *min_node_distance, *middle),
                    _ => (DEFAULT_HALF_WIDTH, DEFAULT_MIN_NODE_DISTANCE, false),
                };
                let index = self.nodes.alloc_at(
                    state.id.index,
                    Node {
                        position: state.position,
                        half_width,
                        min_node_distance,
                        middle,
                        segments: [0; MAX_NODE_SEGMENTS],
                    },
                );
                Ok(EntityId::node(index))
            }
            (
                EntityKind::Segment,
                StateExtra::Segment {
                    start_node,
                    end_node,
                    start_pos,
                    end_pos,
                    start_dir,
                    end_dir,
                },
            ) => {
                if self.nodes.get(*start_node).is_none() || self.nodes.get(*end_node).is_none() {
                    return Err(WorldError::Rejected(format!(
                        "segment endpoints missing: {start_node}, {end_node}"
                    )));
                }
                let curved = !geom::is_straight(*start_pos, *start_dir, *end_pos, *end_dir);
                let index = self.segments.alloc_at(
                    state.id.index,
                    Segment {
                        start_node: *start_node,
                        end_node: *end_node,
                        start_dir: *start_dir,
                        end_dir: *end_dir,
                        min_node_distance: DEFAULT_MIN_NODE_DISTANCE,
                        blocks: [0; 4],
                        curved,
                    },
                );
                self.register_segment(index, *start_node);
                self.register_segment(index, *end_node);
                Ok(EntityId::segment(index))
            }
            (kind, extra) => Err(WorldError::Rejected(format!(
                "cannot create {kind:?} from {extra:?}"
            ))),
        }
    }

    fn remove(&mut self, id: EntityId) -> Result<(), WorldError> {
        match id.kind {
            EntityKind::Building => {
                let building = self.buildings.free(id.index).ok_or(WorldError::Missing(id))?;
                for node in building.sub_nodes {
                    let has_segments = self
                        .nodes
                        .get(node)
                        .is_some_and(|n| n.segments.iter().any(|s| *s != 0));
                    if has_segments {
                        log::warn!("building {} sub-node {node} still has segments, keeping it", id.index);
                    } else {
                        self.nodes.free(node);
                    }
                }
                Ok(())
            }
            EntityKind::Prop => self
                .props
                .free(id.index)
                .map(|_| ())
                .ok_or(WorldError::Missing(id)),
            EntityKind::Decal => self
                .decals
                .free(id.index)
                .map(|_| ())
                .ok_or(WorldError::Missing(id)),
            EntityKind::Tree => self
                .trees
                .free(id.index)
                .map(|_| ())
                .ok_or(WorldError::Missing(id)),
            EntityKind::Node => {
                let attached = self
                    .nodes
                    .get(id.index)
                    .ok_or(WorldError::Missing(id))?
                    .segments
                    .iter()
                    .any(|s| *s != 0);
                if attached {
                    return Err(WorldError::Rejected(format!(
                        "node {} still has attached segments",
                        id.index
                    )));
                }
                self.nodes.free(id.index);
                Ok(())
            }
            EntityKind::Segment => {
                let seg = self.segments.free(id.index).ok_or(WorldError::Missing(id))?;
                self.unregister_segment(id.index, seg.start_node);
                self.unregister_segment(id.index, seg.end_node);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_slot_stays_empty() {
        let mut world = ArenaWorld::new();
        let first = world.add_tree(Vec3::ZERO, 1.0, 1.0);
        assert_eq!(first, 1);
        assert!(world.entity_state(EntityId::tree(0)).is_none());
    }

    #[test]
    fn remove_then_create_reuses_the_slot() {
        let mut world = ArenaWorld::new();
        let index = world.add_prop(Vec3::new(1.0, 0.0, 2.0), 0.5);
        let state = world.entity_state(EntityId::prop(index)).unwrap();
        world.remove(EntityId::prop(index)).unwrap();
        assert!(world.entity_state(EntityId::prop(index)).is_none());
        let recreated = world.create(&state).unwrap();
        assert_eq!(recreated, EntityId::prop(index));
        assert_eq!(world.entity_state(recreated).unwrap(), state);
    }

    #[test]
    fn node_removal_requires_detached() {
        let mut world = ArenaWorld::new();
        let a = world.add_node(Vec3::ZERO);
        let b = world.add_node(Vec3::new(32.0, 0.0, 0.0));
        let seg = world.add_segment(a, b);
        assert!(world.remove(EntityId::node(a)).is_err());
        world.remove(EntityId::segment(seg)).unwrap();
        world.remove(EntityId::node(a)).unwrap();
    }

    #[test]
    fn moving_a_node_refreshes_straight_tangents() {
        let mut world = ArenaWorld::new();
        let a = world.add_node(Vec3::ZERO);
        let b = world.add_node(Vec3::new(32.0, 0.0, 0.0));
        let seg = world.add_segment(a, b);
        world
            .set_transform(EntityId::node(b), Vec3::new(0.0, 0.0, 32.0), 0.0)
            .unwrap();
        let data = world.segment(seg).unwrap();
        assert!((data.start_dir - Vec3::new(0.0, 0.0, 1.0)).length() < 1e-5);
    }

    #[test]
    fn nearest_segments_sorted_by_distance() {
        let mut world = ArenaWorld::new();
        let a = world.add_node(Vec3::ZERO);
        let b = world.add_node(Vec3::new(32.0, 0.0, 0.0));
        let c = world.add_node(Vec3::new(0.0, 0.0, 100.0));
        let d = world.add_node(Vec3::new(32.0, 0.0, 100.0));
        let near = world.add_segment(a, b);
        let far = world.add_segment(c, d);
        let mut out = Vec::new();
        world.nearest_segments(Vec3::new(16.0, 0.0, 4.0), &mut out);
        assert_eq!(out, vec![near, far]);
    }

    #[test]
    fn quad_query_filters_by_kind() {
        let mut world = ArenaWorld::new();
        world.add_tree(Vec3::new(5.0, 0.0, 5.0), 1.0, 1.0);
        world.add_prop(Vec3::new(6.0, 0.0, 5.0), 0.0);
        let quad = Quad::new(
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 10.0),
            Vec3::new(10.0, 0.0, 0.0),
        );
        let trees_only = KindFilter {
            props: false,
            ..KindFilter::ALL
        };
        let hits = world.entities_in_quad(&quad, &trees_only);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].kind, EntityKind::Tree);
    }
}
