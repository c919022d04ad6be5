//! Geometry-aware snapping: given the prospective positions of the
//! entities being moved, search nearby network geometry and return a
//! corrected delta that lines the move up with something meaningful.
//!
//! Strategies run in strict priority order: direction constructions for a
//! lone node or segment, then endpoint nodes, then segment centerlines,
//! then the zoning grid, then (in asset-editing mode) a fixed world grid.
//! The first strategy that produces a hit wins. Every comparison is a
//! squared distance in the ground plane under a per-candidate threshold of
//! `(min_node_distance / 2)²`, strictly less-than. The vertical component
//! of the delta is never touched, and a delta with no planar movement
//! bypasses the whole search.

mod direction;
mod grid;

use std::collections::BTreeSet;

use glam::Vec3;

use crate::util::geom::{self, Bezier};
use crate::world::{EntityKind, EntityState, StateExtra, World};

/// A synthesized segment shape produced by direction snap: the connection
/// the moved node would complete. Rendered as a preview and committed as
/// the new segment's curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentGuide {
    pub start_node: u32,
    pub end_node: u32,
    pub start_dir: Vec3,
    pub end_dir: Vec3,
    pub smooth_start: bool,
    pub smooth_end: bool,
}

impl SegmentGuide {
    /// The guide's curve through the current node positions.
    pub fn curve(&self, world: &dyn World) -> Option<Bezier> {
        let start = world.node(self.start_node)?;
        let end = world.node(self.end_node)?;
        Some(Bezier::from_directions(
            start.position,
            self.start_dir,
            end.position,
            self.end_dir,
            self.smooth_start,
            self.smooth_end,
        ))
    }
}

/// One snap query. `states` are the prospective entity states under the
/// candidate delta (from `calculate_states`), not current world state.
#[derive(Debug, Clone)]
pub struct SnapRequest<'a> {
    pub states: &'a [EntityState],
    pub move_delta: Vec3,
    pub angle_delta: f32,
    pub center: Vec3,
    /// Clones may snap onto the geometry they were copied from.
    pub cloning: bool,
    /// Asset-editing mode: the fixed 8-unit world grid becomes a
    /// last-resort target.
    pub editor_grid: bool,
}

#[derive(Debug, Clone)]
pub struct SnapResult {
    pub delta: Vec3,
    pub guide: Option<SegmentGuide>,
    /// The guide describes a curve fit (not just a tangent line) and the
    /// moved segment should take its shape on commit.
    pub auto_curve: bool,
}

impl SnapResult {
    fn raw(delta: Vec3) -> Self {
        Self {
            delta,
            guide: None,
            auto_curve: false,
        }
    }
}

pub(crate) fn half_min_sq(min_node_distance: f32) -> f32 {
    let half = min_node_distance / 2.0;
    half * half
}

/// Candidate acceptance shared by every strategy: strictly closer than the
/// threshold and strictly closer than the best candidate so far, measured
/// in the ground plane. On success the corrected delta keeps the raw
/// vertical component.
pub(crate) fn try_snap(
    test_pos: Vec3,
    prospective: Vec3,
    threshold_sq: f32,
    best_sq: &mut f32,
    raw: Vec3,
    out: &mut Vec3,
) -> bool {
    let sq = geom::dist_sq_xz(test_pos, prospective);
    if sq < threshold_sq && sq < *best_sq {
        let mut corrected = raw + (test_pos - prospective);
        corrected.y = raw.y;
        *out = corrected;
        *best_sq = sq;
        true
    } else {
        false
    }
}

pub fn snap_delta(req: &SnapRequest, world: &dyn World) -> SnapResult {
    if geom::xz(req.move_delta) == glam::Vec2::ZERO {
        return SnapResult::raw(req.move_delta);
    }

    // Direction snap: only meaningful for exactly one network target.
    if let [state] = req.states {
        match state.id.kind {
            EntityKind::Segment => {
                return SnapResult::raw(direction::snap_segment_directions(
                    world,
                    state.id.index,
                    state.position,
                    req.move_delta,
                ));
            }
            EntityKind::Node => {
                if let Some(result) =
                    direction::snap_node_directions(world, state.id.index, state.position, req.move_delta)
                {
                    return result;
                }
            }
            _ => {}
        }
    }

    let segments = gather_segments(req, world);

    // Node snap: endpoint nodes of nearby segments.
    let mut best_sq = f32::MAX;
    let mut delta = req.move_delta;
    let mut snapped = false;
    for &seg in &segments {
        let Some(data) = world.segment(seg) else {
            continue;
        };
        let threshold = half_min_sq(data.min_node_distance);
        for state in req.states {
            for node in [data.start_node, data.end_node] {
                if let Some(n) = world.node(node) {
                    snapped |= try_snap(
                        n.position,
                        state.position,
                        threshold,
                        &mut best_sq,
                        req.move_delta,
                        &mut delta,
                    );
                }
            }
        }
    }
    if snapped {
        return SnapResult::raw(delta);
    }

    // Segment snap: closest point on nearby centerlines.
    for &seg in &segments {
        let Some(data) = world.segment(seg) else {
            continue;
        };
        let threshold = half_min_sq(data.min_node_distance);
        for state in req.states {
            if let Some((test_pos, _dir)) = world.closest_on_segment(seg, state.position) {
                snapped |= try_snap(
                    test_pos,
                    state.position,
                    threshold,
                    &mut best_sq,
                    req.move_delta,
                    &mut delta,
                );
            }
        }
    }
    if snapped {
        return SnapResult::raw(delta);
    }

    // Zoning grid of the nearest block.
    if let Some(delta) = grid::snap_to_zone_block(req, world, &segments) {
        return SnapResult::raw(delta);
    }

    // Fixed editor grid, asset mode only.
    if req.editor_grid
        && let Some(delta) = grid::snap_to_editor_grid(req)
    {
        return SnapResult::raw(delta);
    }

    SnapResult::raw(req.move_delta)
}

/// Segments near any target, in ascending index order (which makes the
/// first-found tie-break deterministic for a given world). The targets'
/// own attached segments are excluded, since a move must not snap to
/// geometry it is dragging along; while cloning they stay in, so the copy
/// can snap onto its source network.
fn gather_segments(req: &SnapRequest, world: &dyn World) -> Vec<u32> {
    let mut set: BTreeSet<u32> = BTreeSet::new();
    let mut buf = Vec::new();
    for state in req.states {
        buf.clear();
        world.nearest_segments(state.position, &mut buf);
        set.extend(buf.iter().copied());
    }
    set.remove(&0);
    if !req.cloning {
        for state in req.states {
            for seg in attached_segments(state, world) {
                set.remove(&seg);
            }
        }
    }
    set.into_iter().collect()
}

fn attached_segments(state: &EntityState, world: &dyn World) -> Vec<u32> {
    match (&state.id.kind, &state.extra) {
        (EntityKind::Node, _) => world
            .node(state.id.index)
            .map(|n| n.segments.iter().copied().filter(|s| *s != 0).collect())
            .unwrap_or_default(),
        (EntityKind::Segment, _) => vec![state.id.index],
        (EntityKind::Building, StateExtra::Building { sub_nodes, .. }) => sub_nodes
            .iter()
            .filter_map(|(node, _)| world.node(*node))
            .flat_map(|n| n.segments.into_iter().filter(|s| *s != 0))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{Selection, TransformAction};
    use crate::world::{ArenaWorld, EntityId};

    fn request<'a>(states: &'a [EntityState], delta: Vec3) -> SnapRequest<'a> {
        SnapRequest {
            states,
            move_delta: delta,
            angle_delta: 0.0,
            center: Vec3::ZERO,
            cloning: false,
            editor_grid: false,
        }
    }

    fn prospective(world: &ArenaWorld, id: EntityId, delta: Vec3) -> Vec<EntityState> {
        let selection: Selection = [id].into_iter().collect();
        let action = TransformAction::new(&selection, world).unwrap();
        action.calculate_states(delta, 0.0, action.center(), false, world)
    }

    #[test]
    fn zero_planar_delta_bypasses_everything() {
        let mut world = ArenaWorld::new();
        let a = world.add_node(Vec3::ZERO);
        let b = world.add_node(Vec3::new(32.0, 0.0, 0.0));
        world.add_segment(a, b);
        let prop = EntityId::prop(world.add_prop(Vec3::new(0.5, 0.0, 0.5), 0.0));

        let delta = Vec3::new(0.0, 5.0, 0.0);
        let states = prospective(&world, prop, delta);
        let result = snap_delta(&request(&states, delta), &world);
        assert_eq!(result.delta, delta);
    }

    #[test]
    fn node_snap_pulls_onto_endpoint() {
        let mut world = ArenaWorld::new();
        let a = world.add_node(Vec3::new(10.0, 0.0, 0.0));
        let b = world.add_node(Vec3::new(42.0, 0.0, 0.0));
        world.add_segment(a, b);
        let prop = EntityId::prop(world.add_prop(Vec3::new(5.0, 0.0, 3.0), 0.0));

        let delta = Vec3::new(2.0, 0.0, 0.0); // prospective (7, 0, 3)
        let states = prospective(&world, prop, delta);
        let result = snap_delta(&request(&states, delta), &world);
        // Corrected so the prop lands on node a.
        assert_eq!(
            result.delta,
            Vec3::new(2.0 + 3.0, 0.0, -3.0),
            "delta should be corrected onto the endpoint node"
        );
    }

    #[test]
    fn threshold_is_strictly_less_than() {
        let mut world = ArenaWorld::new();
        // Segment running away from the prop so only its near endpoint is a
        // candidate; default min node distance 16 puts the threshold at 8.
        let a = world.add_node(Vec3::new(1.0, 0.0, 8.0));
        let b = world.add_node(Vec3::new(1.0, 0.0, 48.0));
        world.add_segment(a, b);
        let prop = EntityId::prop(world.add_prop(Vec3::ZERO, 0.0));

        // Exactly at the threshold: excluded.
        let delta = Vec3::new(1.0, 0.0, 0.0); // prospective (1, 0, 0), endpoint 8.0 away
        let states = prospective(&world, prop, delta);
        let result = snap_delta(&request(&states, delta), &world);
        assert_eq!(result.delta, delta);

        // A hair inside: included.
        world
            .set_transform(EntityId::node(a), Vec3::new(1.0, 0.0, 7.9), 0.0)
            .unwrap();
        let states = prospective(&world, prop, delta);
        let result = snap_delta(&request(&states, delta), &world);
        assert!((result.delta - Vec3::new(1.0, 0.0, 7.9)).length() < 1e-5);
    }

    #[test]
    fn vertical_delta_survives_snapping() {
        let mut world = ArenaWorld::new();
        let a = world.add_node(Vec3::new(10.0, 3.0, 0.0));
        let b = world.add_node(Vec3::new(42.0, 3.0, 0.0));
        world.add_segment(a, b);
        let prop = EntityId::prop(world.add_prop(Vec3::new(5.0, 0.0, 3.0), 0.0));

        let delta = Vec3::new(2.0, 1.5, 0.0);
        let states = prospective(&world, prop, delta);
        let result = snap_delta(&request(&states, delta), &world);
        assert_eq!(result.delta.y, 1.5);
    }

    #[test]
    fn segment_snap_projects_onto_centerline() {
        let mut world = ArenaWorld::new();
        let a = world.add_node(Vec3::new(-40.0, 0.0, 10.0));
        let b = world.add_node(Vec3::new(40.0, 0.0, 10.0));
        world.add_segment(a, b);
        let prop = EntityId::prop(world.add_prop(Vec3::new(0.0, 0.0, 3.0), 0.0));

        let delta = Vec3::new(0.0, 0.0, 2.0); // prospective (0, 0, 5): 5 from line, 40+ from endpoints
        let states = prospective(&world, prop, delta);
        let result = snap_delta(&request(&states, delta), &world);
        assert!((result.delta - Vec3::new(0.0, 0.0, 10.0 - 3.0)).length() < 1e-5);
    }

    #[test]
    fn direction_snap_wins_over_node_snap() {
        let mut world = ArenaWorld::new();
        // Moving node n with one incident segment to a; a continues straight
        // on to b, so the tangent through a runs along the x axis.
        let n = world.add_node(Vec3::ZERO);
        let a = world.add_node(Vec3::new(32.0, 0.0, 0.0));
        let b = world.add_node(Vec3::new(64.0, 0.0, 0.0));
        world.add_segment(n, a);
        world.add_segment(a, b);
        // A competing node-snap candidate even closer to the prospective
        // position than the tangent line is.
        let c = world.add_node(Vec3::new(-5.0, 0.0, 2.0));
        let d = world.add_node(Vec3::new(-5.0, 0.0, 60.0));
        world.add_segment(c, d);

        let delta = Vec3::new(-5.0, 0.0, 3.0); // prospective (-5, 0, 3)
        let states = prospective(&world, EntityId::node(n), delta);
        let result = snap_delta(&request(&states, delta), &world);

        // Direction snap projects onto the tangent line (z = 0), even though
        // node c sits only 1 unit away while the line is 3 away.
        assert!(
            (result.delta - Vec3::new(-5.0, 0.0, 0.0)).length() < 1e-4,
            "expected tangent snap, got {:?}",
            result.delta
        );
        let guide = result.guide.expect("tangent snap carries a guide");
        assert_eq!(guide.start_node, n);
        assert_eq!(guide.end_node, a);
        assert!(!result.auto_curve);
    }

    #[test]
    fn straight_continuation_marks_auto_curve() {
        let mut world = ArenaWorld::new();
        // n sits between a and b; dragging it near the a-b chord offers the
        // straight continuation construction.
        let a = world.add_node(Vec3::new(-32.0, 0.0, 0.0));
        let n = world.add_node(Vec3::new(0.0, 0.0, 12.0));
        let b = world.add_node(Vec3::new(32.0, 0.0, 0.0));
        world.add_segment(a, n);
        world.add_segment(n, b);

        let delta = Vec3::new(5.0, 0.0, -8.0); // prospective (5, 0, 4), 4 above the chord
        let states = prospective(&world, EntityId::node(n), delta);
        let result = snap_delta(&request(&states, delta), &world);

        assert!(result.auto_curve);
        let guide = result.guide.expect("straight construction carries a guide");
        assert_eq!(guide.start_node, a);
        assert_eq!(guide.end_node, b);
        // Snapped onto the chord: prospective z becomes 0.
        assert!((result.delta - Vec3::new(5.0, 0.0, -12.0)).length() < 1e-4);
    }

    #[test]
    fn own_segments_are_ignored_unless_cloning() {
        let mut world = ArenaWorld::new();
        let a = world.add_node(Vec3::ZERO);
        let b = world.add_node(Vec3::new(32.0, 0.0, 0.0));
        world.add_segment(a, b);
        // Two targets so direction snap stays out of the picture.
        let prop = EntityId::prop(world.add_prop(Vec3::new(100.0, 0.0, 100.0), 0.0));

        let delta = Vec3::new(1.0, 0.0, 0.0);
        let node_states = prospective(&world, EntityId::node(a), delta);
        let mut both = node_states.clone();
        both.extend(prospective(&world, prop, delta));

        // Moving node a: its own segment's far endpoint b is 31 planar units
        // from the prospective position, outside threshold anyway; the point
        // here is that the segment list ends up empty, not merely missed.
        let req = request(&both, delta);
        assert!(gather_segments(&req, &world).is_empty());

        let cloning = SnapRequest {
            cloning: true,
            ..request(&both, delta)
        };
        assert_eq!(gather_segments(&cloning, &world).len(), 1);
    }

    #[test]
    fn zone_block_snaps_to_cell_grid() {
        let mut world = ArenaWorld::new();
        // Road far enough that node/segment snap cannot reach, but its
        // zoning block governs the area.
        let a = world.add_node(Vec3::new(-40.0, 0.0, 20.0));
        let b = world.add_node(Vec3::new(40.0, 0.0, 20.0));
        let seg = world.add_segment(a, b);
        let block = world.add_block(Vec3::ZERO, 0.0);
        world.attach_block(seg, block);
        let prop = EntityId::prop(world.add_prop(Vec3::new(2.0, 0.0, 2.0), 0.0));

        let delta = Vec3::new(1.0, 0.0, 1.0); // prospective (3, 0, 3)
        let states = prospective(&world, prop, delta);
        let result = snap_delta(&request(&states, delta), &world);
        // Nearest 8-unit cell corner in the block frame is the origin.
        assert!(
            (result.delta - Vec3::new(1.0 - 3.0, 0.0, 1.0 - 3.0)).length() < 1e-5,
            "got {:?}",
            result.delta
        );
    }

    #[test]
    fn editor_grid_snaps_when_enabled() {
        let mut world = ArenaWorld::new();
        let prop = EntityId::prop(world.add_prop(Vec3::new(2.0, 0.0, 4.0), 0.0));

        let delta = Vec3::new(1.0, 0.0, 1.0); // prospective (3, 0, 5)
        let states = prospective(&world, prop, delta);

        let off = snap_delta(&request(&states, delta), &world);
        assert_eq!(off.delta, delta);

        let on = SnapRequest {
            editor_grid: true,
            ..request(&states, delta)
        };
        let result = snap_delta(&on, &world);
        // (3, 5) rounds to the (0, 8) grid point.
        assert!((result.delta - Vec3::new(1.0 - 3.0, 0.0, 1.0 + 3.0)).length() < 1e-5);
    }
}
