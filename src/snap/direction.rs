//! Direction snap: tangent and curve constructions for a single dragged
//! network node or segment. These look only at the target's own incident
//! topology, synthesizing the segment the move would complete.

use glam::Vec3;

use super::{SegmentGuide, SnapResult, half_min_sq, try_snap};
use crate::util::geom::{self, Bezier};
use crate::world::{SegmentData, World};

/// Incident segment indices of a node, skipping empty slots.
fn incident(world: &dyn World, node: u32) -> Vec<u32> {
    world
        .node(node)
        .map(|n| n.segments.iter().copied().filter(|s| *s != 0).collect())
        .unwrap_or_default()
}

/// The node on the other end of `seg` from `node`.
fn far_node(seg: &SegmentData, node: u32) -> u32 {
    if seg.start_node == node {
        seg.end_node
    } else {
        seg.start_node
    }
}

/// The segment's tangent at `node`.
fn dir_at(seg: &SegmentData, node: u32) -> Vec3 {
    if seg.start_node == node {
        seg.start_dir
    } else {
        seg.end_dir
    }
}

fn sign(v: f32) -> f32 {
    if v < 0.0 { -1.0 } else { 1.0 }
}

/// Snap a dragged node onto constructions through its incident segments:
/// the straight continuation between two neighbors, a curve fit honoring
/// the outer tangents, the curve's midpoint, or a neighbor's tangent line
/// (straight or rotated 90°). Curve hits set `auto_curve` so the commit
/// reshapes the segment along the guide.
pub(super) fn snap_node_directions(
    world: &dyn World,
    node_index: u32,
    new_pos: Vec3,
    raw: Vec3,
) -> Option<SnapResult> {
    let node = world.node(node_index)?;
    let threshold = half_min_sq(node.min_node_distance);

    let mut best_sq = threshold;
    let mut delta = raw;
    let mut guide = None;
    let mut auto_curve = false;
    let mut snapped = false;

    let segments = incident(world, node_index);

    // Constructions between each pair of neighbors.
    for (i, &seg_a) in segments.iter().enumerate() {
        for &seg_b in &segments[i + 1..] {
            let (Some(a), Some(b)) = (world.segment(seg_a), world.segment(seg_b)) else {
                continue;
            };
            let start = far_node(&a, node_index);
            let end = far_node(&b, node_index);
            let (Some(start_node), Some(end_node)) = (world.node(start), world.node(end)) else {
                continue;
            };

            // Straight continuation between the two neighbors.
            let chord = (end_node.position - start_node.position).normalize_or_zero();
            let candidate =
                geom::closest_on_segment_xz(start_node.position, end_node.position, new_pos);
            if try_snap(candidate, new_pos, threshold, &mut best_sq, raw, &mut delta) {
                guide = Some(SegmentGuide {
                    start_node: start,
                    end_node: end,
                    start_dir: chord,
                    end_dir: -chord,
                    smooth_start: start_node.middle,
                    smooth_end: end_node.middle,
                });
                auto_curve = true;
                snapped = true;
            }

            // Curve fits through the neighbors' outer tangents.
            for seg_c in incident(world, start) {
                if seg_c == seg_a {
                    continue;
                }
                let Some(c) = world.segment(seg_c) else {
                    continue;
                };
                for seg_d in incident(world, end) {
                    if seg_d == seg_b {
                        continue;
                    }
                    let Some(d) = world.segment(seg_d) else {
                        continue;
                    };

                    let start_dir = -dir_at(&c, start);
                    let end_dir = -dir_at(&d, end);

                    // Both tangents must bow to the same side of the chord
                    // and point along it, or the fit degenerates.
                    let chord_xz = geom::xz(end_node.position - start_node.position)
                        .normalize_or_zero();
                    let side1 = chord_xz.perp_dot(geom::xz(start_dir));
                    let side2 = chord_xz.perp_dot(geom::xz(end_dir));
                    if sign(side1) != sign(side2)
                        || (side1 != side2 && (side1 == 0.0 || side2 == 0.0))
                        || chord_xz.dot(geom::xz(start_dir)) < 0.0
                        || chord_xz.dot(geom::xz(end_dir)) > 0.0
                    {
                        continue;
                    }

                    let curve = Bezier::from_directions(
                        start_node.position,
                        start_dir,
                        end_node.position,
                        end_dir,
                        start_node.middle,
                        end_node.middle,
                    );
                    let fitted = SegmentGuide {
                        start_node: start,
                        end_node: end,
                        start_dir,
                        end_dir,
                        smooth_start: start_node.middle,
                        smooth_end: end_node.middle,
                    };

                    let midpoint = curve.position(0.5);
                    if try_snap(midpoint, new_pos, threshold, &mut best_sq, raw, &mut delta) {
                        guide = Some(fitted);
                        auto_curve = true;
                        snapped = true;
                    } else {
                        let (closest, _) = curve.closest_xz(new_pos);
                        if try_snap(closest, new_pos, threshold, &mut best_sq, raw, &mut delta) {
                            guide = Some(fitted);
                            auto_curve = true;
                            snapped = true;
                        }
                    }
                }
            }
        }
    }

    // Tangent lines through each neighbor's other segments.
    for &seg in &segments {
        let Some(s) = world.segment(seg) else {
            continue;
        };
        let far = far_node(&s, node_index);
        let Some(far_data) = world.node(far) else {
            continue;
        };
        for seg_a in incident(world, far) {
            if seg_a == seg {
                continue;
            }
            let Some(sa) = world.segment(seg_a) else {
                continue;
            };
            let dir = dir_at(&sa, far);

            // Straight continuation of the neighbor's tangent.
            let candidate = geom::project_onto_line_xz(far_data.position, dir, new_pos);
            if try_snap(candidate, new_pos, threshold, &mut best_sq, raw, &mut delta) {
                guide = Some(SegmentGuide {
                    start_node: node_index,
                    end_node: far,
                    start_dir: dir,
                    end_dir: -dir,
                    smooth_start: node.middle,
                    smooth_end: far_data.middle,
                });
                auto_curve = false;
                snapped = true;
            } else {
                // The same tangent rotated a quarter turn.
                let perp = Vec3::new(-dir.z, dir.y, dir.x);
                let candidate = geom::project_onto_line_xz(far_data.position, perp, new_pos);
                if try_snap(candidate, new_pos, threshold, &mut best_sq, raw, &mut delta) {
                    guide = Some(SegmentGuide {
                        start_node: node_index,
                        end_node: far,
                        start_dir: perp,
                        end_dir: -perp,
                        smooth_start: node.middle,
                        smooth_end: far_data.middle,
                    });
                    auto_curve = false;
                    snapped = true;
                }
            }
        }
    }

    snapped.then_some(SnapResult {
        delta,
        guide,
        auto_curve,
    })
}

/// Snap a dragged segment against its endpoints' other incident segments:
/// the intersection of the two outer tangents, then either tangent line on
/// its own, and finally the straight midpoint between the endpoints.
/// Always returns a delta; an unsatisfied search returns the input.
pub(super) fn snap_segment_directions(
    world: &dyn World,
    seg_index: u32,
    new_pos: Vec3,
    raw: Vec3,
) -> Vec3 {
    let Some(seg) = world.segment(seg_index) else {
        return raw;
    };
    let (Some(start), Some(end)) = (world.node(seg.start_node), world.node(seg.end_node)) else {
        return raw;
    };
    let threshold = half_min_sq(seg.min_node_distance);

    let mut best_sq = threshold;
    let mut delta = raw;
    let mut snapped = false;

    let start_segments: Vec<u32> = incident(world, seg.start_node)
        .into_iter()
        .filter(|s| *s != seg_index)
        .collect();
    let end_segments: Vec<u32> = incident(world, seg.end_node)
        .into_iter()
        .filter(|s| *s != seg_index)
        .collect();

    // Where the two outer tangents cross.
    for &seg_a in &start_segments {
        let Some(sa) = world.segment(seg_a) else {
            continue;
        };
        let start_dir = dir_at(&sa, seg.start_node);
        for &seg_b in &end_segments {
            let Some(sb) = world.segment(seg_b) else {
                continue;
            };
            let end_dir = dir_at(&sb, seg.end_node);

            if geom::is_straight(start.position, start_dir, end.position, end_dir) {
                continue;
            }
            let dot = start_dir.x * end_dir.x + start_dir.z * end_dir.z;
            if dot >= -0.999
                && let Some((u, _)) =
                    geom::line_intersect_xz(start.position, start_dir, end.position, end_dir)
            {
                snapped |= try_snap(
                    start.position + start_dir * u,
                    new_pos,
                    threshold,
                    &mut best_sq,
                    raw,
                    &mut delta,
                );
            }
        }
    }

    if !snapped {
        for &seg_a in &start_segments {
            let Some(sa) = world.segment(seg_a) else {
                continue;
            };
            let dir = dir_at(&sa, seg.start_node);
            let candidate = geom::project_onto_line_xz(start.position, dir, new_pos);
            try_snap(candidate, new_pos, threshold, &mut best_sq, raw, &mut delta);
        }
        for &seg_b in &end_segments {
            let Some(sb) = world.segment(seg_b) else {
                continue;
            };
            let dir = dir_at(&sb, seg.end_node);
            let candidate = geom::project_onto_line_xz(end.position, dir, new_pos);
            try_snap(candidate, new_pos, threshold, &mut best_sq, raw, &mut delta);
        }
    }

    // Halfway between the endpoints: the straight resting place.
    try_snap(
        (start.position + end.position) / 2.0,
        new_pos,
        threshold,
        &mut best_sq,
        raw,
        &mut delta,
    );

    delta
}
