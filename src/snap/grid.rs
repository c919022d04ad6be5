//! Grid snapping: the zoning grid owned by nearby roads, and the fixed
//! 8-unit world grid used while editing assets.

use glam::Vec3;

use super::SnapRequest;
use crate::util::geom;
use crate::world::{EntityKind, EntityState, StateExtra, World};

/// Cell size of both grids.
const CELL: f32 = 8.0;

/// Narrow roads get their zoning rows offset by half a cell.
const NARROW_HALF_WIDTH: f32 = 4.0;

/// The point that should land on the grid. A building aligns its
/// front-edge center (half a cell sideways when the footprint width is
/// odd), everything else its own position.
fn reference_point(state: &EntityState) -> Vec3 {
    if let StateExtra::Building { length, width, .. } = &state.extra {
        building_snap_point(state.position, state.angle, *length, *width)
    } else {
        state.position
    }
}

fn building_snap_point(position: Vec3, angle: f32, length: u32, width: u32) -> Vec3 {
    let x = if width % 2 != 0 { 4.0 } else { 0.0 };
    let z = length as f32 * 4.0;
    let (sin, cos) = angle.sin_cos();
    position + Vec3::new(cos * x - sin * z, 0.0, sin * x + cos * z)
}

/// Snap against the nearest zoning block among the nearby segments'
/// blocks. Segment targets have no meaningful grid reference and are
/// skipped. Returns the corrected delta, or None when no block is in
/// reach.
pub(super) fn snap_to_zone_block(
    req: &SnapRequest,
    world: &dyn World,
    segments: &[u32],
) -> Option<Vec3> {
    let mut best_sq = f32::MAX;
    let mut best_block = 0u32;
    let mut ref_position = Vec3::ZERO;
    let mut narrow = false;

    for &seg in segments {
        let Some(data) = world.segment(seg) else {
            continue;
        };
        for &block in data.blocks.iter().filter(|b| **b != 0) {
            let Some(block_data) = world.block(block) else {
                continue;
            };
            for state in req.states {
                if state.id.kind == EntityKind::Segment {
                    continue;
                }
                let test_position = reference_point(state);
                let sq = geom::dist_sq_xz(block_data.position, test_position);
                if sq < best_sq {
                    best_sq = sq;
                    best_block = block;
                    ref_position = test_position;
                    narrow = state.id.kind == EntityKind::Node
                        && world
                            .node(state.id.index)
                            .is_some_and(|n| n.half_width <= NARROW_HALF_WIDTH);
                }
            }
        }
    }

    if best_block == 0 {
        return None;
    }
    let block = world.block(best_block)?;
    let snapped = snap_point_to_block(ref_position, block.position, block.angle, narrow);
    Some(req.move_delta + snapped - ref_position)
}

/// Round `point` onto the block's local cell grid. The grid runs along the
/// block's angle in 8-unit steps; a narrow owning road shifts the origin
/// by half a cell on both axes.
fn snap_point_to_block(point: Vec3, ref_point: Vec3, ref_angle: f32, narrow: bool) -> Vec3 {
    let (sin, cos) = ref_angle.sin_cos();
    let forward = Vec3::new(cos * CELL, 0.0, sin * CELL);
    let right = Vec3::new(forward.z, 0.0, -forward.x);

    let mut origin = ref_point;
    if narrow {
        origin.x += forward.x * 0.5 + right.x * 0.5;
        origin.z += forward.z * 0.5 + right.z * 0.5;
    }

    let dx = point.x - origin.x;
    let dz = point.z - origin.z;
    // 1/64 = dot against a cell-length axis, in cells.
    let cells_fwd = ((dx * forward.x + dz * forward.z) * 0.015625).round();
    let cells_right = ((dx * right.x + dz * right.z) * 0.015625).round();

    Vec3::new(
        origin.x + cells_fwd * forward.x + cells_right * right.x,
        point.y,
        origin.z + cells_fwd * forward.z + cells_right * right.z,
    )
}

/// Snap to the fixed world-aligned 8-unit grid; the target whose reference
/// point is already closest to a grid point decides the correction.
pub(super) fn snap_to_editor_grid(req: &SnapRequest) -> Option<Vec3> {
    let mut best: Option<(f32, Vec3, Vec3)> = None;
    for state in req.states {
        let test = reference_point(state);
        let grid = Vec3::new(
            (test.x / CELL).round() * CELL,
            test.y,
            (test.z / CELL).round() * CELL,
        );
        let sq = geom::dist_sq_xz(grid, test);
        if best.is_none_or(|(b, _, _)| sq < b) {
            best = Some((sq, test, grid));
        }
    }
    best.map(|(_, reference, grid)| req.move_delta + grid - reference)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_grid_follows_block_angle() {
        // Block frame rotated 90°: forward is +z, right is +x.
        let snapped = snap_point_to_block(
            Vec3::new(1.0, 0.0, 7.0),
            Vec3::ZERO,
            std::f32::consts::FRAC_PI_2,
            false,
        );
        assert!((snapped - Vec3::new(0.0, 0.0, 8.0)).length() < 1e-4);
    }

    #[test]
    fn narrow_road_offsets_half_a_cell() {
        let snapped = snap_point_to_block(Vec3::new(3.0, 0.0, 3.0), Vec3::ZERO, 0.0, true);
        // Origin shifts to (4, -4); nearest cell corner to (3, 3) is (4, 4).
        assert!((snapped - Vec3::new(4.0, 0.0, 4.0)).length() < 1e-4);
    }

    #[test]
    fn building_reference_is_front_edge_center() {
        // Unrotated 2x4 footprint: front edge center sits length*4 ahead.
        let p = building_snap_point(Vec3::ZERO, 0.0, 2, 4);
        assert!((p - Vec3::new(0.0, 0.0, 8.0)).length() < 1e-4);

        // Odd width adds the half-cell sideways shift.
        let p = building_snap_point(Vec3::ZERO, 0.0, 2, 3);
        assert!((p - Vec3::new(4.0, 0.0, 8.0)).length() < 1e-4);
    }
}
